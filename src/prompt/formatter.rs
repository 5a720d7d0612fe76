//! Profile templating of message content

use serde_json::Value;

use crate::api::{ChatCompletionRequest, Message, MessageContent, Role};
use crate::registry::ModelProfile;

/// Replacement for empty or whitespace-only content
pub const EMPTY_CONTENT_PLACEHOLDER: &str = ".";

/// Replace blank text content with [`EMPTY_CONTENT_PLACEHOLDER`]. Idempotent.
pub fn normalize_empty(conversation: &[Message]) -> Vec<Message> {
    conversation
        .iter()
        .cloned()
        .map(|mut message| {
            if let Some(MessageContent::Text(text)) = &mut message.content {
                if text.trim().is_empty() {
                    *text = EMPTY_CONTENT_PLACEHOLDER.to_string();
                }
            }
            message
        })
        .collect()
}

/// Wrap user and system text in the profile's prefix and suffix.
///
/// Other roles, content-part arrays and absent content pass through. Applying
/// this twice wraps twice.
pub fn format(conversation: &[Message], profile: &ModelProfile) -> Vec<Message> {
    conversation
        .iter()
        .cloned()
        .map(|mut message| {
            let (prefix, suffix) = match message.role {
                Role::User => (&profile.user_prefix, &profile.user_suffix),
                Role::System => (&profile.system_prefix, &profile.system_suffix),
                _ => return message,
            };
            if let Some(MessageContent::Text(text)) = &mut message.content {
                *text = format!("{}{}{}", prefix, text, suffix);
            }
            message
        })
        .collect()
}

/// Overwrite the request's `stop` with the profile's stop sequences
pub fn inject_stops(mut request: ChatCompletionRequest, profile: &ModelProfile) -> ChatCompletionRequest {
    if let Some(previous) = &request.stop {
        tracing::debug!(previous = %previous, "Replacing client stop sequences");
    }
    request.stop = Some(Value::from(profile.stop_sequences.clone()));
    request
}
