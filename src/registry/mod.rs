//! Model profile registry
//!
//! Profiles describe how a family of backend models wants its prompt shaped:
//! prefixes and suffixes around user and system content, and the stop
//! sequences to send. The registry is loaded once at startup and shared
//! read-only between requests.

mod resolver;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use resolver::{profile_key_for, ActiveModelResolution, ActiveModelResolver, ResolveError};

/// Key of the mandatory fallback profile
pub const DEFAULT_PROFILE: &str = "default";

/// Prompt conventions for one model family
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ModelProfile {
    /// Substrings identifying backend models of this family
    #[serde(default, rename = "models")]
    pub members: Vec<String>,
    #[serde(default, rename = "prefix")]
    pub user_prefix: String,
    #[serde(default, rename = "suffix")]
    pub user_suffix: String,
    #[serde(default, rename = "sysPrefix")]
    pub system_prefix: String,
    #[serde(default, rename = "sysSuffix")]
    pub system_suffix: String,
    #[serde(default, rename = "stops")]
    pub stop_sequences: Vec<String>,
}

impl ModelProfile {
    /// First member that occurs inside `model_id`
    pub fn matching_member(&self, model_id: &str) -> Option<&str> {
        self.members
            .iter()
            .map(String::as_str)
            .find(|member| !member.is_empty() && model_id.contains(member))
    }
}

/// Ordered, immutable map of profile key to [`ModelProfile`]
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: IndexMap<String, ModelProfile>,
}

impl ModelRegistry {
    /// Build a registry, failing if the `default` profile is missing
    pub fn new(profiles: IndexMap<String, ModelProfile>) -> Result<Self, RegistryError> {
        if !profiles.contains_key(DEFAULT_PROFILE) {
            return Err(RegistryError::MissingDefault);
        }
        Ok(Self { profiles })
    }

    /// Load a registry document. `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RegistryError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let registry = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::new(serde_yaml::from_str(&content)?)?
        };

        tracing::info!(
            path = %path.display(),
            profiles = registry.len(),
            "Loaded model registry"
        );

        Ok(registry)
    }

    pub fn from_json_str(content: &str) -> Result<Self, RegistryError> {
        Self::new(serde_json::from_str(content)?)
    }

    pub fn lookup(&self, key: &str) -> Option<&ModelProfile> {
        self.profiles.get(key)
    }

    /// Profiles in document order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ModelProfile)> {
        self.profiles.iter().map(|(key, profile)| (key.as_str(), profile))
    }

    /// First profile, in document order, with a member contained in `model_id`.
    /// Returns the profile key and the member that matched.
    pub fn match_model(&self, model_id: &str) -> Option<(&str, &str)> {
        self.entries()
            .find_map(|(key, profile)| profile.matching_member(model_id).map(|member| (key, member)))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Model registry not found: {0}")]
    NotFound(String),

    #[error("Failed to read model registry: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model registry JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse model registry YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Model registry has no \"default\" profile")]
    MissingDefault,
}
