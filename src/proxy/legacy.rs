//! `POST /v1/completions` on top of the chat relay

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use tracing::Instrument;

use super::handler::{request_span, ChatRelay};
use super::request_log::format_request_log;
use super::server::ProxyState;
use crate::api::{ChatCompletionRequest, ChatCompletionResponse, CompletionRequest, TextCompletionResponse};
use crate::error::RelayError;

pub async fn completions(State(state): State<ProxyState>, body: Bytes) -> Response {
    let legacy: CompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed completion request");
            return RelayError::InvalidRequest(e.to_string()).into_response();
        }
    };

    let request = legacy.into_chat_request();
    async move {
        tracing::info!("{}", format_request_log(&request));
        complete_prompt(ChatRelay::new(state), request)
            .await
            .unwrap_or_else(IntoResponse::into_response)
    }
    .instrument(request_span())
    .await
}

async fn complete_prompt(relay: ChatRelay, request: ChatCompletionRequest) -> Result<Response, RelayError> {
    let request = relay.transform(request).await?;
    let (status, body) = relay.complete(&request).await?;

    if body.get("error").is_some() {
        return Ok((status, Json(body)).into_response());
    }

    let chat: ChatCompletionResponse = serde_json::from_value(body)
        .map_err(|e| RelayError::UnexpectedResponse(format!("not a chat completion: {}", e)))?;
    let text = TextCompletionResponse::from_chat(chat)
        .ok_or_else(|| RelayError::UnexpectedResponse("backend returned no choices".to_string()))?;

    Ok((status, Json(text)).into_response())
}
