//! bananaphone e2e runner
//!
//! With no subcommand it starts the mock backend on a free port, launches the
//! relay binary pointed at it and runs every case.
//!
//!   cargo run                              # spawn the relay, run everything
//!   cargo run -- --filter streaming        # only cases whose name matches
//!   cargo run -- spawn --relay-port 19066  # explicit binary, config or ports
//!   cargo run -- attach                    # relay already running elsewhere
//!   cargo run -- list

mod backend;
mod client;
mod relay;
mod runner;
mod tests;
mod types;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use relay::RelayProcess;
use runner::{list_tests, run_tests, TestContext};
use tests::all_tests;

#[derive(Parser)]
#[command(name = "e2e", about = "End-to-end tests for the bananaphone relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Only run tests whose name contains this string
    #[arg(long, short, global = true)]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the relay binary against the mock backend and run the tests
    Spawn(SpawnArgs),

    /// Run the tests against a relay that is already listening
    Attach {
        /// Address of the running relay
        #[arg(long, default_value = "127.0.0.1:18066")]
        relay_addr: String,

        /// Port the running relay dials for its backend
        #[arg(long, default_value_t = 18080)]
        backend_port: u16,
    },

    /// List all available tests
    List,
}

#[derive(Args)]
struct SpawnArgs {
    /// bananaphone binary (defaults to the newest build under ../target)
    #[arg(long)]
    relay_bin: Option<PathBuf>,

    /// Relay config supplying keys, prompt policy and registry
    #[arg(long, default_value = "test_configs/relay.yaml")]
    relay_config: PathBuf,

    /// Mock backend port, 0 for any free port
    #[arg(long, default_value_t = 0)]
    backend_port: u16,

    /// Port the relay is told to listen on
    #[arg(long, default_value_t = 18066)]
    relay_port: u16,
}

impl Default for SpawnArgs {
    fn default() -> Self {
        Self {
            relay_bin: None,
            relay_config: PathBuf::from("test_configs/relay.yaml"),
            backend_port: 0,
            relay_port: 18066,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let passed = match cli.command {
        None => spawn_and_run(SpawnArgs::default(), cli.filter).await?,
        Some(Command::Spawn(args)) => spawn_and_run(args, cli.filter).await?,
        Some(Command::Attach { relay_addr, backend_port }) => {
            let (backend_state, backend_addr) = backend::start(backend_port).await?;
            println!("Mock backend listening on {}", backend_addr);

            let ctx = TestContext {
                relay_addr,
                backend_state,
                http_client: client::build_client(),
            };
            run_tests(all_tests(), ctx, cli.filter.as_deref()).await
        }
        Some(Command::List) => {
            list_tests(&all_tests());
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

/// Mock backend first, so its real address can be handed to the relay
async fn spawn_and_run(args: SpawnArgs, filter: Option<String>) -> anyhow::Result<bool> {
    let bin = match args.relay_bin {
        Some(bin) => bin,
        None => relay::locate_binary()?,
    };

    let (backend_state, backend_addr) = backend::start(args.backend_port).await?;
    println!("Mock backend listening on {}", backend_addr);

    let http_client = client::build_client();
    let mut relay = RelayProcess::spawn(&bin, &args.relay_config, args.relay_port, backend_addr)?;
    relay.wait_ready(&http_client).await?;
    println!("Relay is ready at {}\n", relay.addr);

    let ctx = TestContext {
        relay_addr: relay.addr.clone(),
        backend_state,
        http_client,
    };
    let passed = run_tests(all_tests(), ctx, filter.as_deref()).await;

    relay.stop().await;
    Ok(passed)
}
