//! OpenAI-compatible chat completion types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Message author role. Unknown roles are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        match role.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::Other(role),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message content - can be string or array of content parts
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(_) => None,
        }
    }

    /// Joined `text` parts, or the plain text
    pub fn flatten_text(&self) -> Option<String> {
        match self {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Parts(parts) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect();
                (!texts.is_empty()).then(|| texts.join(" "))
            }
        }
    }
}

/// Chat message. Fields other than role, content and name ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            name: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(MessageContent::as_text)
    }
}

/// Chat completion request as received from the client and forwarded to the backend.
///
/// Only the fields the relay reads or rewrites are typed; every other
/// generation parameter is kept in `params` and forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub stream: bool,
    /// Outer `None` when absent, `Some(None)` for an explicit `null`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Non-streaming chat completion response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Value>,
}

/// Response choice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response message
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_roundtrip_keeps_unknown() {
        let role: Role = serde_json::from_value(json!("developer")).unwrap();
        assert_eq!(role, Role::Other("developer".to_string()));
        assert_eq!(serde_json::to_value(&role).unwrap(), json!("developer"));

        let role: Role = serde_json::from_value(json!("system")).unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_message_preserves_extra_fields() {
        let raw = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "call_1", "type": "function"}]
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_none());
        assert!(msg.extra.contains_key("tool_calls"));

        let out = serde_json::to_value(&msg).unwrap();
        assert_eq!(out["tool_calls"][0]["id"], "call_1");
        assert!(out.get("name").is_none());
    }

    #[test]
    fn test_request_keeps_generation_params() {
        let raw = json!({
            "model": "whatever",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 64,
            "top_p": 0.9,
            "stream": true
        });
        let req: ChatCompletionRequest = serde_json::from_value(raw).unwrap();
        assert!(req.stream);
        assert_eq!(req.temperature, None);
        assert_eq!(req.params["max_tokens"], 64);
        assert_eq!(req.params["model"], "whatever");

        let out = serde_json::to_value(&req).unwrap();
        assert_eq!(out["top_p"], 0.9);
        assert!(out.get("stop").is_none());
    }

    #[test]
    fn test_request_null_stream_is_non_streaming() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "stream": null
        }))
        .unwrap();
        assert!(!req.stream);
    }

    #[test]
    fn test_request_temperature_null_differs_from_absent() {
        let explicit: ChatCompletionRequest =
            serde_json::from_value(json!({"messages": [], "temperature": null})).unwrap();
        assert_eq!(explicit.temperature, Some(None));
        assert_eq!(serde_json::to_value(&explicit).unwrap()["temperature"], Value::Null);
        assert!(serde_json::to_value(&explicit).unwrap().get("temperature").is_some());

        let set: ChatCompletionRequest =
            serde_json::from_value(json!({"messages": [], "temperature": 0.3})).unwrap();
        assert_eq!(set.temperature, Some(Some(0.3)));
    }

    #[test]
    fn test_content_parts_flatten_text() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "text", "text": "look at"},
            {"type": "image_url", "image_url": {"url": "data:..."}},
            {"type": "text", "text": "this"}
        ]))
        .unwrap();
        assert!(content.as_text().is_none());
        assert_eq!(content.flatten_text().as_deref(), Some("look at this"));
    }
}
