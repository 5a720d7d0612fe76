//! System prompt placement

use crate::api::{Message, Role};

/// `name` given to system messages the relay inserts
pub const INSTRUCTIONS_NAME: &str = "instructions";

/// Ensure the conversation opens with the configured system message.
///
/// - An empty conversation is returned unchanged.
/// - Without a leading system message, one is inserted at position 0.
/// - A leading system message is replaced when `override_enabled`, kept otherwise.
///
/// System messages further down the conversation are never touched.
pub fn apply_policy(
    conversation: &[Message],
    fixed_system_message: &str,
    override_enabled: bool,
) -> Vec<Message> {
    let Some(first) = conversation.first() else {
        return Vec::new();
    };

    let instructions =
        Message::new(Role::System, fixed_system_message).with_name(INSTRUCTIONS_NAME);
    let mut result = conversation.to_vec();

    if first.role != Role::System {
        tracing::debug!("Inserting system message");
        result.insert(0, instructions);
    } else if override_enabled {
        tracing::debug!("Overriding client system message");
        result[0] = instructions;
    }

    result
}
