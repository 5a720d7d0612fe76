//! Mock backend server that simulates an LM Studio style completion engine
//!
//! Serves the model list (with a configurable loaded model), chat completions
//! from a queue of canned responses, and OPTIONS on both relayed paths.
//! Tests pre-configure responses via SharedBackendState before each request.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::types::{BackendState, MockResponse, ReceivedRequest, SharedBackendState, DEFAULT_MODEL_ID};

/// Default fallback response when no response is queued
fn default_completion_response() -> MockResponse {
    MockResponse::json(
        r#"{"id":"chatcmpl-default","object":"chat.completion","created":1700000000,"model":"test-model","choices":[{"index":0,"message":{"role":"assistant","content":"Default response (no mock queued)"},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
    )
}

/// Handle POST /v1/chat/completions - serves pre-configured mock responses
async fn handle_chat_completions(
    State(state): State<SharedBackendState>,
    request: Request<Body>,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let body_bytes = axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap_or_default();
    let body_json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    let received = ReceivedRequest {
        method: "POST".to_string(),
        path: "/v1/chat/completions".to_string(),
        authorization,
        body: body_json,
    };

    // Pop the next configured response (or use default)
    let mock_response = {
        let mut state = state.lock().unwrap();
        state.received_requests.push(received);
        state.response_queue.pop_front().unwrap_or_else(default_completion_response)
    };

    Response::builder()
        .status(mock_response.status)
        .header("Content-Type", &mock_response.content_type)
        .body(Body::from(mock_response.body))
        .unwrap()
        .into_response()
}

/// Handle GET /v1/models - reports the currently "loaded" model first
async fn handle_models(State(state): State<SharedBackendState>) -> impl IntoResponse {
    let model_id = state.lock().unwrap().model_id.clone();
    Json(serde_json::json!({
        "object": "list",
        "data": [
            {"id": model_id, "object": "model", "owned_by": "organization-owner"},
            {"id": "text-embedding-nomic-embed-text-v1.5", "object": "model", "owned_by": "organization-owner"}
        ]
    }))
}

/// Handle OPTIONS on relayed paths
async fn handle_options() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            ("Allow", "GET, POST, OPTIONS"),
            ("X-Mock-Backend", "options"),
        ],
    )
}

/// Start the mock backend on `port` (0 picks a free one)
///
/// Returns the shared state handle and the address actually bound.
pub async fn start(port: u16) -> anyhow::Result<(SharedBackendState, SocketAddr)> {
    let state: SharedBackendState = std::sync::Arc::new(std::sync::Mutex::new(BackendState::default()));

    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(handle_chat_completions).options(handle_options),
        )
        .route("/v1/models", get(handle_models).options(handle_options))
        .with_state(state.clone());

    let requested = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(requested).await
        .map_err(|e| anyhow::anyhow!("Failed to bind mock backend to {}: {}", requested, e))?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock backend server failed");
    });

    Ok((state, addr))
}

/// Forget queued replies and recorded requests, and reload the default model
pub fn reset(state: &SharedBackendState) {
    let mut s = state.lock().unwrap();
    s.response_queue.clear();
    s.received_requests.clear();
    s.model_id = DEFAULT_MODEL_ID.to_string();
}

/// Helper to configure the next response for /v1/chat/completions
pub fn queue_response(state: &SharedBackendState, response: MockResponse) {
    state.lock().unwrap().response_queue.push_back(response);
}

/// Helper to change which model the backend reports as loaded
pub fn set_model_id(state: &SharedBackendState, model_id: &str) {
    state.lock().unwrap().model_id = model_id.to_string();
}

/// Helper to get all requests received since last clear
pub fn drain_requests(state: &SharedBackendState) -> Vec<ReceivedRequest> {
    let mut s = state.lock().unwrap();
    s.received_requests.drain(..).collect()
}
