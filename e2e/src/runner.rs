//! Sequential test execution and the console report

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use colored::Colorize;

use crate::backend;
use crate::types::{SharedBackendState, TestResult};

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A named async check against the running relay
pub struct TestCase {
    pub name: &'static str,
    pub description: &'static str,
    pub run: Box<dyn Fn(TestContext) -> TestFuture + Send + Sync>,
}

/// Everything a case needs: where the relay is and a handle on the mock backend
#[derive(Clone)]
pub struct TestContext {
    pub relay_addr: String,
    pub backend_state: SharedBackendState,
    pub http_client: reqwest::Client,
}

const RULE: &str = "═══════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────";

/// Run the cases matching `filter` one after another; true when none failed
pub async fn run_tests(cases: Vec<TestCase>, ctx: TestContext, filter: Option<&str>) -> bool {
    let selected: Vec<&TestCase> = cases
        .iter()
        .filter(|case| filter.map_or(true, |f| case.name.contains(f)))
        .collect();

    println!("\n{}", RULE.bright_blue());
    println!("{}", "  bananaphone relay e2e".bright_white().bold());
    println!("{}", RULE.bright_blue());
    println!("  Relay:   {}", ctx.relay_addr.bright_cyan());
    println!("  Cases:   {}\n", selected.len().to_string().bright_cyan());

    let mut results = Vec::with_capacity(selected.len());
    for case in selected {
        backend::reset(&ctx.backend_state);
        results.push(run_case(case, ctx.clone()).await);
    }

    report(&results)
}

async fn run_case(case: &TestCase, ctx: TestContext) -> TestResult {
    print!("  {} {} ... ", "▶".bright_blue(), case.name.bright_white());
    let started = Instant::now();
    let outcome = (case.run)(ctx).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            println!("{} ({duration_ms}ms)", "PASS".bright_green().bold());
            TestResult {
                name: case.name.to_string(),
                passed: true,
                error: None,
                duration_ms,
            }
        }
        Err(e) => {
            println!("{} ({duration_ms}ms)", "FAIL".bright_red().bold());
            for (depth, cause) in e.chain().enumerate() {
                let label = if depth == 0 { "Error:" } else { "Caused by:" };
                println!("    {} {}", label.bright_red(), cause);
            }
            TestResult {
                name: case.name.to_string(),
                passed: false,
                error: Some(format!("{:#}", e)),
                duration_ms,
            }
        }
    }
}

/// Summary line plus the names of failed cases
fn report(results: &[TestResult]) -> bool {
    let failed: Vec<&TestResult> = results.iter().filter(|r| !r.passed).collect();
    let total_ms: u64 = results.iter().map(|r| r.duration_ms).sum();

    println!("\n{}", THIN_RULE.bright_blue());
    let summary = format!(
        "  {} passed, {} failed in {}ms",
        results.len() - failed.len(),
        failed.len(),
        total_ms
    );
    if failed.is_empty() {
        println!("{}", summary.bright_green().bold());
    } else {
        println!("{}", summary.bright_red().bold());
        for result in &failed {
            println!("    {} {}", "✗".bright_red(), result.name);
        }
    }
    println!("{}\n", RULE.bright_blue());

    failed.is_empty()
}

pub fn list_tests(cases: &[TestCase]) {
    println!("\n{}", "Available tests:".bright_white().bold());
    for case in cases {
        println!("  {} - {}", case.name.bright_cyan(), case.description);
    }
    println!();
}
