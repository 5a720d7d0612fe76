//! bananaphone: model-aware relay for OpenAI-style chat clients
//!
//! Sits between chat clients and a local completion backend and:
//! - Places a fixed system prompt according to policy
//! - Applies the active model's prompt template and stop sequences
//! - Rewrites streamed chunks so clients see bare model names

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use bananaphone::{
    api::bare_model_name,
    config::AppConfig,
    proxy::ProxyState,
    registry::{ActiveModelResolver, ModelRegistry},
    run_server,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "bananaphone")]
#[command(version)]
#[command(about = "Model-aware relay for OpenAI-style chat clients")]
#[command(long_about = "
bananaphone relays OpenAI-style chat requests to a local completion backend
(LM Studio, llama-server) and:
  - Inserts or forces a fixed system prompt
  - Detects the loaded model and applies its prompt template and stops
  - Rewrites streamed chunks so clients see bare model names

Example usage:
  bananaphone run --config config.yaml
  bananaphone list-profiles --verbose
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to the model profile registry (overrides config and environment)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override backend URL (e.g., "http://localhost:1234")
        #[arg(long)]
        backend_url: Option<String>,
    },

    /// List the model profiles in the registry
    ListProfiles {
        /// Show prefixes, suffixes and stops
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate configuration and registry
    CheckConfig,

    /// Ask the backend which model is loaded and which profile applies
    TestBackend,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format);

    match cli.command {
        Commands::Run { port, backend_url } => {
            let mut config = load_config(&cli.config, cli.registry.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(url) = backend_url {
                config.backend.url = url;
            }
            config.validate()?;

            let registry = ModelRegistry::from_file(&config.registry.path)
                .with_context(|| format!("loading registry {:?}", config.registry.path))?;
            run_server(config, registry).await?;
        }
        Commands::ListProfiles { verbose } => {
            let config = load_config(&cli.config, cli.registry.as_deref())?;
            let registry = ModelRegistry::from_file(&config.registry.path)
                .with_context(|| format!("loading registry {:?}", config.registry.path))?;
            list_profiles(&registry, verbose);
        }
        Commands::CheckConfig => {
            check_config(&cli.config, cli.registry.as_deref());
        }
        Commands::TestBackend => {
            let config = load_config(&cli.config, cli.registry.as_deref())?;
            test_backend(config).await?;
        }
    }

    Ok(())
}

fn init_logging(level: Option<LogLevel>, format: LogFormat) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level.to_string()),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// File (or defaults), then environment, then the `--registry` flag
fn load_config(path: &Path, registry_override: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_or_default(path)
        .with_context(|| format!("loading configuration {:?}", path))?;
    config.apply_env_overrides();
    if let Some(registry) = registry_override {
        config.registry.path = registry.to_path_buf();
    }
    Ok(config)
}

fn list_profiles(registry: &ModelRegistry, verbose: bool) {
    println!("Model profiles (first match wins):\n");

    for (key, profile) in registry.entries() {
        if verbose {
            println!("  {}:", key);
            println!("    Models:     {:?}", profile.members);
            println!("    Prefix:     {:?}", profile.user_prefix);
            println!("    Suffix:     {:?}", profile.user_suffix);
            println!("    SysPrefix:  {:?}", profile.system_prefix);
            println!("    SysSuffix:  {:?}", profile.system_suffix);
            println!("    Stops:      {:?}", profile.stop_sequences);
            println!();
        } else {
            println!("  {:20} {}", key, profile.members.join(", "));
        }
    }
}

fn check_config(config_path: &Path, registry_override: Option<&Path>) {
    let config = match load_config(config_path, registry_override) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("✗ Configuration error: {}", e);
        std::process::exit(1);
    }

    println!("✓ Configuration is valid\n");
    println!("Server:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("\nBackend:");
    println!("  URL: {}", config.backend.base_url());
    println!("  Completions: {}", config.backend.completions_path);
    println!("  Models: {}", config.backend.models_path);
    println!("  TLS: {}", if config.backend.is_tls() { "enabled" } else { "disabled" });
    if let Some(ref tls) = config.backend.tls {
        if tls.accept_invalid_certs {
            println!("  TLS: Accepting invalid certificates");
        }
        if let Some(ref ca) = tls.ca_cert_path {
            println!("  TLS CA: {}", ca);
        }
    }
    let timeouts = &config.backend.timeouts;
    println!(
        "  Timeouts: connect {}s, read {}s, resolve {}s, model list {}s",
        timeouts.connect_seconds, timeouts.read_seconds, timeouts.resolve_seconds, timeouts.model_list_seconds
    );
    println!("\nAuth:");
    println!("  Enabled: {}", config.auth.is_enabled());
    println!("\nPrompt:");
    println!("  System message: {:?}", config.prompt.system_message);
    println!("  Override: {}", config.prompt.system_override);
    println!("  Autostyle: {}", config.prompt.autostyle);

    println!("\nRegistry:");
    match ModelRegistry::from_file(&config.registry.path) {
        Ok(registry) => {
            println!("  {:?}: {} profiles", config.registry.path, registry.len());
        }
        Err(e) => {
            eprintln!("✗ Registry error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn test_backend(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    let registry = ModelRegistry::from_file(&config.registry.path)
        .with_context(|| format!("loading registry {:?}", config.registry.path))?;
    let state = ProxyState::new(config, registry)?;
    let backend = &state.config.backend;

    println!("Testing model list endpoint: {}", backend.models_url());

    let resolver = ActiveModelResolver::new(
        &state.http_client,
        &state.registry,
        backend.models_url(),
        backend.timeouts.resolve(),
    );

    match resolver.fetch_active_model_id().await {
        Ok(model_id) => {
            println!("✓ Backend is reachable");
            println!("  Active model: {}", model_id);
            println!("  Reported as: {}", bare_model_name(&model_id));
        }
        Err(e) => {
            println!("✗ Could not determine the active model: {}", e);
            std::process::exit(1);
        }
    }

    let resolution = resolver.resolve().await;
    println!("  Profile: {}", resolution.profile_key);

    Ok(())
}
