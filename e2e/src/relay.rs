//! Launching and supervising the bananaphone binary under test

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Build outputs looked for when no binary is given, release first
const BUILD_OUTPUTS: &[&str] = &["../target/release/bananaphone", "../target/debug/bananaphone"];

const READY_DEADLINE: Duration = Duration::from_secs(15);
const READY_POLL: Duration = Duration::from_millis(150);

/// A relay child process; killed when dropped
pub struct RelayProcess {
    child: Child,
    pub addr: String,
}

impl RelayProcess {
    /// Start `bin` with `config`, overriding its listen port and backend URL
    ///
    /// The YAML supplies everything else (keys, prompt, registry), so the
    /// ports chosen by the runner always win over the ones written there.
    pub fn spawn(bin: &Path, config: &Path, port: u16, backend: SocketAddr) -> anyhow::Result<Self> {
        let args = launch_args(config, port, backend);
        println!(
            "Spawning relay: {} {}",
            bin.display(),
            args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );

        let child = Command::new(bin)
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn '{}': {}", bin.display(), e))?;

        Ok(Self {
            child,
            addr: format!("127.0.0.1:{}", port),
        })
    }

    /// Poll /health until it answers, failing early if the process exits
    pub async fn wait_ready(&mut self, client: &reqwest::Client) -> anyhow::Result<()> {
        let health = format!("http://{}/health", self.addr);
        let deadline = Instant::now() + READY_DEADLINE;

        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                anyhow::bail!("Relay exited before becoming ready ({})", status);
            }
            if let Ok(resp) = client.get(&health).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(READY_POLL).await;
        }

        anyhow::bail!(
            "Relay at {} not ready after {}s",
            self.addr,
            READY_DEADLINE.as_secs()
        )
    }

    pub async fn stop(mut self) {
        self.child.kill().await.ok();
    }
}

fn launch_args(config: &Path, port: u16, backend: SocketAddr) -> Vec<OsString> {
    vec![
        "--config".into(),
        config.as_os_str().to_owned(),
        "run".into(),
        "--port".into(),
        port.to_string().into(),
        "--backend-url".into(),
        format!("http://{}", backend).into(),
    ]
}

/// First existing build output, or an error telling how to build one
pub fn locate_binary() -> anyhow::Result<PathBuf> {
    let found = BUILD_OUTPUTS.iter().map(Path::new).find(|p| p.exists());
    match found {
        Some(path) => {
            println!("Using relay binary: {}", path.display().to_string().bright_cyan());
            Ok(path.to_path_buf())
        }
        None => Err(anyhow::anyhow!(
            "No relay binary found. Tried: {}\nBuild with: cd .. && cargo build --release",
            BUILD_OUTPUTS.join(", ")
        )),
    }
}
