//! bananaphone: model-aware relay for OpenAI-style chat clients
//!
//! Sits in front of a local completion backend (LM Studio, llama-server) and:
//! - Places a fixed system prompt according to policy
//! - Detects the loaded model and applies its prompt template and stops
//! - Rewrites streamed chunks so clients see bare model names
//! - Serves legacy `/v1/completions` on top of chat completions

pub mod api;
pub mod config;
pub mod error;
pub mod prompt;
pub mod proxy;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use error::{RelayError, ServerError};
pub use proxy::run_server;
pub use registry::ModelRegistry;
