//! Active model resolution against the backend's model list

use serde_json::Value;
use std::time::Duration;

use super::{ModelRegistry, DEFAULT_PROFILE};

/// Which backend model is loaded and which profile applies to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveModelResolution {
    /// `None` when the backend could not be asked
    pub backend_model_id: Option<String>,
    pub profile_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("model list request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model list returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("model list is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model list has no data[0].id")]
    MissingModelId,
}

/// Asks the backend which model is loaded. Nothing is cached: every call
/// queries the backend, so model swaps are picked up on the next request.
pub struct ActiveModelResolver<'a> {
    client: &'a reqwest::Client,
    registry: &'a ModelRegistry,
    models_url: String,
    timeout: Duration,
}

impl<'a> ActiveModelResolver<'a> {
    pub fn new(
        client: &'a reqwest::Client,
        registry: &'a ModelRegistry,
        models_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            models_url: models_url.into(),
            timeout,
        }
    }

    /// `data[0].id` of the backend's model list
    pub async fn fetch_active_model_id(&self) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(&self.models_url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status));
        }

        let body = response.bytes().await?;
        let list: Value = serde_json::from_slice(&body)?;

        list.pointer("/data/0/id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(ResolveError::MissingModelId)
    }

    /// Resolve the profile for the active model. Never fails: any problem
    /// talking to the backend is logged and resolves to `default`.
    pub async fn resolve(&self) -> ActiveModelResolution {
        match self.fetch_active_model_id().await {
            Ok(model_id) => {
                let profile_key = profile_key_for(self.registry, &model_id);
                tracing::debug!(
                    model = %model_id,
                    profile = %profile_key,
                    "Resolved active model"
                );
                ActiveModelResolution {
                    backend_model_id: Some(model_id),
                    profile_key,
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    url = %self.models_url,
                    "Failed to fetch active model, using default profile"
                );
                ActiveModelResolution {
                    backend_model_id: None,
                    profile_key: DEFAULT_PROFILE.to_string(),
                }
            }
        }
    }
}

/// Profile key for a backend model id, `default` when nothing matches
pub fn profile_key_for(registry: &ModelRegistry, model_id: &str) -> String {
    match registry.match_model(model_id) {
        Some((key, member)) => {
            tracing::debug!(model = %model_id, profile = %key, member = %member, "Model matched profile");
            key.to_string()
        }
        None => {
            tracing::info!(model = %model_id, "No profile matches model, using default");
            DEFAULT_PROFILE.to_string()
        }
    }
}
