//! Conversation shaping: system prompt policy, empty-content
//! normalization, profile templating and stop injection

mod formatter;
mod policy;

pub use formatter::{format, inject_stops, normalize_empty, EMPTY_CONTENT_PLACEHOLDER};
pub use policy::{apply_policy, INSTRUCTIONS_NAME};
