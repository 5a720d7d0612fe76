//! Shared types for the e2e test framework

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Model id the mock backend reports when a test does not set one
pub const DEFAULT_MODEL_ID: &str = "/models/llama-3-8b-instruct.Q4_K_M.gguf";

/// A mock response the backend will serve for the next request to /v1/chat/completions
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

impl MockResponse {
    /// Create a standard JSON chat completion response
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    /// Create an error response
    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    /// Create an SSE body from `data:` payloads, without a trailing [DONE]
    pub fn sse(payloads: &[String]) -> Self {
        let body: String = payloads.iter().map(|p| format!("data: {}\n\n", p)).collect();
        Self {
            status: 200,
            body,
            content_type: "text/event-stream".to_string(),
        }
    }
}

/// Shared state for the mock backend server
#[derive(Debug)]
pub struct BackendState {
    /// Queue of responses to serve - tests push responses, backend pops and serves them
    pub response_queue: VecDeque<MockResponse>,
    /// All requests received by the backend (for inspection)
    pub received_requests: Vec<ReceivedRequest>,
    /// `data[0].id` of the /v1/models reply
    pub model_id: String,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            response_queue: VecDeque::new(),
            received_requests: Vec::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

/// A request received by the mock backend
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

pub type SharedBackendState = Arc<Mutex<BackendState>>;

/// A parsed SSE event from the relay streaming response
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub data: String,
    pub is_done: bool,
}

impl SseEvent {
    pub fn parse_json(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::from_str(&self.data).map_err(|e| anyhow::anyhow!("SSE JSON parse error: {}: {}", e, self.data))
    }
}

/// Result of a non-streaming relay request
#[derive(Debug)]
pub struct RelayResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RelayResponse {
    /// Get a nested field using dot notation (e.g. "choices.0.message.content")
    pub fn get(&self, path: &str) -> Option<&serde_json::Value> {
        let mut current = &self.body;
        for part in path.split('.') {
            current = if let Ok(idx) = part.parse::<usize>() {
                current.as_array()?.get(idx)?
            } else {
                current.as_object()?.get(part)?
            };
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }
}

/// Result of a streaming relay request - all parsed SSE events
#[derive(Debug)]
pub struct StreamingResponse {
    pub status: u16,
    pub content_type: String,
    pub events: Vec<SseEvent>,
}

impl StreamingResponse {
    /// Check that the stream ends with [DONE]
    pub fn has_done_marker(&self) -> bool {
        self.events.last().map(|e| e.is_done).unwrap_or(false)
    }

    /// Get all data events (excluding [DONE])
    pub fn data_events(&self) -> Vec<&SseEvent> {
        self.events.iter().filter(|e| !e.is_done).collect()
    }

    /// Accumulate all text content deltas
    pub fn accumulated_content(&self) -> String {
        let mut result = String::new();
        for event in self.data_events() {
            if let Ok(json) = event.parse_json() {
                if let Some(content) = json
                    .pointer("/choices/0/delta/content")
                    .and_then(|v| v.as_str())
                {
                    result.push_str(content);
                }
            }
        }
        result
    }

    /// `model` of every data event that carries one
    pub fn models(&self) -> Vec<String> {
        self.data_events()
            .iter()
            .filter_map(|e| e.parse_json().ok())
            .filter_map(|json| json.get("model").and_then(|m| m.as_str()).map(String::from))
            .collect()
    }
}

/// Result of a single test case
#[derive(Debug)]
#[allow(dead_code)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
