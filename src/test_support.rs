//! In-process mock backend and fixtures for unit tests

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::config::AppConfig;
use crate::registry::ModelRegistry;

pub const TEST_REGISTRY_JSON: &str = r#"{
    "llama3": {
        "models": ["llama-3", "llama3"],
        "prefix": "<|start_header_id|>user<|end_header_id|>\n\n",
        "suffix": "<|eot_id|>",
        "sysPrefix": "<|start_header_id|>system<|end_header_id|>\n\n",
        "sysSuffix": "<|eot_id|>",
        "stops": ["<|eot_id|>"]
    },
    "chatml": {
        "models": ["qwen", "chatml"],
        "prefix": "<|im_start|>user\n",
        "suffix": "<|im_end|>\n",
        "sysPrefix": "<|im_start|>system\n",
        "sysSuffix": "<|im_end|>\n",
        "stops": ["<|im_end|>", "<|im_start|>"]
    },
    "default": {
        "models": [],
        "prefix": "",
        "suffix": "",
        "sysPrefix": "",
        "sysSuffix": "",
        "stops": []
    }
}"#;

pub fn test_registry() -> ModelRegistry {
    ModelRegistry::from_json_str(TEST_REGISTRY_JSON).unwrap()
}

pub fn test_config(backend_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.url = backend_url.to_string();
    config.backend.timeouts.resolve_seconds = 2;
    config.backend.timeouts.model_list_seconds = 2;
    config
}

/// URL of a local port nothing listens on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Canned response served by the mock
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl MockReply {
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: value.to_string(),
        }
    }

    pub fn json_status(status: u16, value: Value) -> Self {
        Self {
            status,
            ..Self::json(value)
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }

    /// SSE body, one `\n\n`-terminated event per frame
    pub fn sse(frames: &[&str]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            body: frames.iter().map(|f| format!("{}\n\n", f)).collect(),
        }
    }

    fn into_response(self) -> Response {
        Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, self.content_type)
            .body(Body::from(self.body))
            .unwrap()
    }
}

struct MockState {
    model_id: String,
    models_reply: Option<MockReply>,
    models_delay: Duration,
    completion: MockReply,
    received: Vec<Value>,
    received_auth: Vec<Option<String>>,
}

/// Mock OpenAI-style backend bound to an ephemeral local port
#[derive(Clone)]
pub struct MockBackend {
    pub url: String,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState {
            model_id: "/models/llama-3-8b.gguf".to_string(),
            models_reply: None,
            models_delay: Duration::ZERO,
            completion: MockReply::json(json!({"choices": []})),
            received: Vec::new(),
            received_auth: Vec::new(),
        }));

        let app = Router::new()
            .route("/v1/models", get(list_models).options(options_reply))
            .route(
                "/v1/chat/completions",
                axum::routing::post(chat_completions).options(options_reply),
            )
            .route("/favicon.ico", get(favicon))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_model_id(&self, model_id: &str) {
        self.state.lock().unwrap().model_id = model_id.to_string();
    }

    pub fn set_models_reply(&self, reply: MockReply) {
        self.state.lock().unwrap().models_reply = Some(reply);
    }

    pub fn set_models_delay(&self, delay: Duration) {
        self.state.lock().unwrap().models_delay = delay;
    }

    pub fn set_completion(&self, reply: MockReply) {
        self.state.lock().unwrap().completion = reply;
    }

    /// Chat completion bodies received so far
    pub fn received(&self) -> Vec<Value> {
        self.state.lock().unwrap().received.clone()
    }

    /// Authorization headers of chat completion requests received so far
    pub fn received_auth(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().received_auth.clone()
    }
}

async fn list_models(State(state): State<Arc<Mutex<MockState>>>) -> Response {
    let (delay, reply) = {
        let state = state.lock().unwrap();
        let reply = state.models_reply.clone().unwrap_or_else(|| {
            MockReply::json(json!({
                "object": "list",
                "data": [{"id": state.model_id, "object": "model", "owned_by": "organization-owner"}]
            }))
        });
        (state.models_delay, reply)
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    reply.into_response()
}

async fn chat_completions(
    State(state): State<Arc<Mutex<MockState>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let reply = {
        let mut state = state.lock().unwrap();
        state.received.push(body);
        state.received_auth.push(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        );
        state.completion.clone()
    };
    reply.into_response()
}

async fn options_reply() -> Response {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ALLOW, "GET, POST, OPTIONS")
        .header("x-mock-backend", "options")
        .body(Body::empty())
        .unwrap()
}

async fn favicon() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/x-icon")
        .body(Body::from(vec![0u8, 0, 1, 0]))
        .unwrap()
}

/// Collects the name and field names of every span opened while installed
#[derive(Clone, Default)]
pub struct SpanRecorder {
    spans: Arc<Mutex<Vec<(String, HashSet<String>)>>>,
}

impl SpanRecorder {
    /// Current-thread default subscriber; restored when the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn spans(&self) -> Vec<(String, HashSet<String>)> {
        self.spans.lock().unwrap().clone()
    }
}

impl<S: tracing::Subscriber> Layer<S> for SpanRecorder {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let fields = attrs.fields().iter().map(|f| f.name().to_string()).collect();
        self.spans
            .lock()
            .unwrap()
            .push((attrs.metadata().name().to_string(), fields));
    }
}
