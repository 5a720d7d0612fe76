//! Chat completion relay

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::Instrument;

use super::request_log::{format_dispatch_log, format_request_log};
use super::server::ProxyState;
use super::streaming::handle_streaming_response;
use crate::api::ChatCompletionRequest;
use crate::error::RelayError;
use crate::prompt::{apply_policy, format, inject_stops, normalize_empty};
use crate::registry::ActiveModelResolver;

/// Runs one request through the transformation pipeline and the backend
pub struct ChatRelay {
    state: ProxyState,
}

impl ChatRelay {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    fn resolver(&self) -> ActiveModelResolver<'_> {
        let backend = &self.state.config.backend;
        ActiveModelResolver::new(
            &self.state.http_client,
            &self.state.registry,
            backend.models_url(),
            backend.timeouts.resolve(),
        )
    }

    /// System prompt policy and empty-content normalization, then (with
    /// autostyle) profile formatting and stop injection for the active model.
    pub async fn transform(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionRequest, RelayError> {
        let prompt = &self.state.config.prompt;

        if request.temperature.is_none() {
            request.temperature = prompt.default_temperature.map(Some);
        }

        let messages = apply_policy(&request.messages, &prompt.system_message, prompt.system_override);
        request.messages = normalize_empty(&messages);

        if !prompt.autostyle {
            tracing::info!("{}", format_dispatch_log(&request, None));
            return Ok(request);
        }

        let resolution = self.resolver().resolve().await;
        let profile = self
            .state
            .registry
            .lookup(&resolution.profile_key)
            .ok_or_else(|| RelayError::ConfigurationMissing(resolution.profile_key.clone()))?;

        request.messages = format(&request.messages, profile);
        let request = inject_stops(request, profile);

        tracing::info!("{}", format_dispatch_log(&request, Some(&resolution)));
        Ok(request)
    }

    fn backend_request(&self, request: &ChatCompletionRequest) -> reqwest::RequestBuilder {
        let mut backend_req = self
            .state
            .http_client
            .post(self.state.config.backend.completions_url())
            .json(request);

        if let Some(ref api_key) = self.state.config.backend.api_key {
            backend_req = backend_req.header(header::AUTHORIZATION, format!("Bearer {}", api_key));
        }

        backend_req
    }

    /// Forward a non-streaming request. The backend's JSON comes back as-is,
    /// or reduced to `{"error": ...}` when it reports an error.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<(StatusCode, Value), RelayError> {
        let backend_response = self.backend_request(request).send().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to backend");
            RelayError::from(e)
        })?;

        let status = backend_response.status();
        let body = backend_response.bytes().await?;

        if status.is_client_error() || status.is_server_error() {
            tracing::error!(
                status = %status,
                error_body = %String::from_utf8_lossy(&body),
                "Backend returned error response"
            );
        }

        let json: Value = serde_json::from_slice(&body).map_err(|e| {
            let preview = String::from_utf8_lossy(&body[..body.len().min(200)]).into_owned();
            RelayError::UnexpectedResponse(format!("status {}, body is not JSON ({}): {}", status, e, preview))
        })?;

        if let Some(error) = json.get("error") {
            return Ok((status, json!({ "error": error })));
        }

        Ok((status, json))
    }

    /// Forward a streaming request through the SSE rewriter
    pub async fn stream(&self, request: &ChatCompletionRequest) -> Result<Response, RelayError> {
        let backend_response = self.backend_request(request).send().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to backend");
            RelayError::from(e)
        })?;

        Ok(handle_streaming_response(backend_response).await)
    }

    pub async fn handle(&self, request: ChatCompletionRequest) -> Result<Response, RelayError> {
        let request = self.transform(request).await?;

        if request.stream {
            self.stream(&request).await
        } else {
            let (status, body) = self.complete(&request).await?;
            Ok((status, Json(body)).into_response())
        }
    }
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(State(state): State<ProxyState>, body: Bytes) -> Response {
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed chat completion request");
            return RelayError::InvalidRequest(e.to_string()).into_response();
        }
    };

    async move {
        tracing::info!("{}", format_request_log(&request));
        ChatRelay::new(state)
            .handle(request)
            .await
            .unwrap_or_else(IntoResponse::into_response)
    }
    .instrument(request_span())
    .await
}

/// Span every relayed request runs in, carrying a fresh request id
pub(super) fn request_span() -> tracing::Span {
    tracing::info_span!("chat", request_id = %uuid::Uuid::new_v4())
}
