//! Compact one-line request summaries

use crate::api::{ChatCompletionRequest, Role};
use crate::registry::ActiveModelResolution;

/// Summary of an inbound request, before any transformation
pub fn format_request_log(request: &ChatCompletionRequest) -> String {
    let model = request
        .params
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown");

    let mut parts = vec![format!("model={}", model), format!("msgs={}", request.messages.len())];

    if request.stream {
        parts.push("stream".to_string());
    }

    if let Some(Some(temperature)) = request.temperature {
        parts.push(format!("temp={}", temperature));
    }

    if let Some(msg) = first_user_message(request) {
        parts.push(format!("\"{}\"", msg));
    }

    format!("→ {}", parts.join(" "))
}

/// Summary of what is about to be sent to the backend
pub fn format_dispatch_log(
    request: &ChatCompletionRequest,
    resolution: Option<&ActiveModelResolution>,
) -> String {
    let mut parts = Vec::new();

    match resolution {
        Some(resolution) => {
            parts.push(format!("profile={}", resolution.profile_key));
            parts.push(format!(
                "backend_model={}",
                resolution.backend_model_id.as_deref().unwrap_or("unknown")
            ));
        }
        None => parts.push("autostyle=off".to_string()),
    }

    parts.push(format!("msgs={}", request.messages.len()));

    if let Some(stops) = request.stop.as_ref().and_then(|s| s.as_array()) {
        parts.push(format!("stops={}", stops.len()));
    }

    format!("⇢ {}", parts.join(" "))
}

fn first_user_message(request: &ChatCompletionRequest) -> Option<String> {
    let content = request
        .messages
        .iter()
        .find(|m| m.role == Role::User)?
        .content
        .as_ref()?
        .flatten_text()?;

    Some(truncate_message(&normalize_whitespace(&content)))
}

/// Collapse runs of whitespace (including newlines and tabs) to single spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep short messages whole; otherwise the first 25 and last 75 characters
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = chars[..PREFIX_LEN].iter().collect();
    let suffix: String = chars[chars.len() - SUFFIX_LEN..].iter().collect();
    format!("{} ... {}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> ChatCompletionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_request_log_basic() {
        let req = request(json!({
            "model": "qwen3",
            "messages": [
                {"role": "system", "content": "You are helpful"},
                {"role": "user", "content": "Hello\n\tworld"}
            ],
            "stream": true,
            "temperature": 0.2
        }));
        assert_eq!(
            format_request_log(&req),
            "→ model=qwen3 msgs=2 stream temp=0.2 \"Hello world\""
        );
    }

    #[test]
    fn test_format_request_log_without_user_message() {
        let req = request(json!({"messages": [{"role": "system", "content": "x"}]}));
        assert_eq!(format_request_log(&req), "→ model=unknown msgs=1");
    }

    #[test]
    fn test_format_request_log_content_parts() {
        let req = request(json!({
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "describe"},
                {"type": "image_url", "image_url": {"url": "data:..."}}
            ]}]
        }));
        assert!(format_request_log(&req).ends_with("\"describe\""));
    }

    #[test]
    fn test_format_dispatch_log() {
        let req = request(json!({"messages": [], "stop": ["<|eot_id|>"]}));
        let resolution = ActiveModelResolution {
            backend_model_id: Some("/models/llama-3-8b.gguf".to_string()),
            profile_key: "llama3".to_string(),
        };
        assert_eq!(
            format_dispatch_log(&req, Some(&resolution)),
            "⇢ profile=llama3 backend_model=/models/llama-3-8b.gguf msgs=0 stops=1"
        );
        assert_eq!(format_dispatch_log(&req, None), "⇢ autostyle=off msgs=0 stops=1");
    }

    #[test]
    fn test_truncate_message() {
        let short = "a".repeat(100);
        assert_eq!(truncate_message(&short), short);

        let long: String = ('a'..='z').cycle().take(150).collect();
        let truncated = truncate_message(&long);
        assert!(truncated.starts_with(&long[..25]));
        assert!(truncated.ends_with(&long[75..]));
        assert!(truncated.contains(" ... "));
    }

    #[test]
    fn test_truncate_message_multibyte() {
        let long = "é".repeat(120);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.chars().filter(|c| *c == 'é').count(), 100);
    }
}
