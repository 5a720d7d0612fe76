mod loader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Relay listen address
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Backend completion engine (LM Studio, llama-server, ...)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend URL (e.g., "http://localhost:1234"). A missing scheme means http.
    pub url: String,
    #[serde(default = "default_completions_path")]
    pub completions_path: String,
    #[serde(default = "default_models_path")]
    pub models_path: String,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Bearer token sent to the backend
    #[serde(default)]
    pub api_key: Option<String>,
}

/// TLS configuration for backend connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
    /// Path to client certificate for mTLS
    pub client_cert_path: Option<String>,
    /// Path to client private key for mTLS
    pub client_key_path: Option<String>,
}

/// Outbound call bounds, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_seconds")]
    pub connect_seconds: u64,
    /// Idle time allowed between two reads of a backend response
    #[serde(default = "default_read_seconds")]
    pub read_seconds: u64,
    /// Whole-request bound for the active model lookup
    #[serde(default = "default_resolve_seconds")]
    pub resolve_seconds: u64,
    /// Whole-request bound for the proxied model list
    #[serde(default = "default_model_list_seconds")]
    pub model_list_seconds: u64,
}

fn default_completions_path() -> String {
    "/v1/chat/completions".to_string()
}

fn default_models_path() -> String {
    "/v1/models".to_string()
}

fn default_connect_seconds() -> u64 {
    30
}

fn default_read_seconds() -> u64 {
    600
}

fn default_resolve_seconds() -> u64 {
    5
}

fn default_model_list_seconds() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_seconds: default_connect_seconds(),
            read_seconds: default_read_seconds(),
            resolve_seconds: default_resolve_seconds(),
            model_list_seconds: default_model_list_seconds(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_seconds)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_seconds)
    }

    pub fn resolve(&self) -> Duration {
        Duration::from_secs(self.resolve_seconds)
    }

    pub fn model_list(&self) -> Duration {
        Duration::from_secs(self.model_list_seconds)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:1234".to_string(),
            completions_path: default_completions_path(),
            models_path: default_models_path(),
            timeouts: TimeoutConfig::default(),
            tls: None,
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// Returns the base URL with a scheme and without a trailing slash
    pub fn base_url(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }

    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.base_url().to_lowercase().starts_with("https://")
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn completions_url(&self) -> String {
        self.endpoint_url(&self.completions_path)
    }

    pub fn models_url(&self) -> String {
        self.endpoint_url(&self.models_path)
    }
}

/// Inbound API-key gatekeeping. An empty key list disables it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_keys.iter().any(|k| !k.is_empty())
    }

    pub fn accepts(&self, token: &str) -> bool {
        !token.is_empty() && self.api_keys.iter().any(|k| k == token)
    }
}

/// Conversation shaping applied before dispatch
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// Fixed system message inserted (or forced, with `system_override`)
    #[serde(default = "default_system_message")]
    pub system_message: String,
    #[serde(default)]
    pub system_override: bool,
    /// Resolve the active model and apply its profile (templating and stops)
    #[serde(default = "default_autostyle")]
    pub autostyle: bool,
    /// Filled in when the client omits `temperature`
    #[serde(default = "default_temperature")]
    pub default_temperature: Option<f64>,
}

fn default_system_message() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_autostyle() -> bool {
    true
}

fn default_temperature() -> Option<f64> {
    Some(0.7)
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_message: default_system_message(),
            system_override: false,
            autostyle: default_autostyle(),
            default_temperature: default_temperature(),
        }
    }
}

/// Location of the model profile registry document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("models.json")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

/// Environment variables read by [`AppConfig::apply_env_overrides`]
pub mod env {
    pub const BACKEND_URL: &str = "BANANAPHONE_BACKEND_URL";
    pub const COMPLETIONS_PATH: &str = "BANANAPHONE_COMPLETIONS_PATH";
    pub const MODELS_PATH: &str = "BANANAPHONE_MODELS_PATH";
    pub const API_KEYS: &str = "BANANAPHONE_API_KEYS";
    pub const SYSTEM_MESSAGE: &str = "BANANAPHONE_SYSTEM_MESSAGE";
    pub const SYSTEM_OVERRIDE: &str = "BANANAPHONE_SYSTEM_OVERRIDE";
    pub const AUTOSTYLE: &str = "BANANAPHONE_AUTOSTYLE";
    pub const REGISTRY: &str = "BANANAPHONE_REGISTRY";
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load the file if it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env::BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(path) = lookup(env::COMPLETIONS_PATH) {
            self.backend.completions_path = path;
        }
        if let Some(path) = lookup(env::MODELS_PATH) {
            self.backend.models_path = path;
        }
        if let Some(keys) = lookup(env::API_KEYS) {
            self.auth.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(message) = lookup(env::SYSTEM_MESSAGE) {
            self.prompt.system_message = message;
        }
        if let Some(value) = lookup(env::SYSTEM_OVERRIDE) {
            match parse_flag(&value) {
                Some(flag) => self.prompt.system_override = flag,
                None => tracing::warn!(key = env::SYSTEM_OVERRIDE, value = %value, "Ignoring non-boolean override"),
            }
        }
        if let Some(value) = lookup(env::AUTOSTYLE) {
            match parse_flag(&value) {
                Some(flag) => self.prompt.autostyle = flag,
                None => tracing::warn!(key = env::AUTOSTYLE, value = %value, "Ignoring non-boolean override"),
            }
        }
        if let Some(path) = lookup(env::REGISTRY) {
            self.registry.path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.backend.base_url();
        let parsed = url::Url::parse(&base)
            .map_err(|e| ConfigError::Validation(format!("backend url {:?}: {}", base, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "backend url scheme must be http or https, got {:?}",
                parsed.scheme()
            )));
        }

        for (name, path) in [
            ("completions_path", &self.backend.completions_path),
            ("models_path", &self.backend.models_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "backend.{} must start with '/', got {:?}",
                    name, path
                )));
            }
        }

        if self.prompt.system_message.trim().is_empty() {
            return Err(ConfigError::Validation(
                "prompt.system_message must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
