//! Bearer token gatekeeping for `/v1` routes

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::server::ProxyState;

const MISSING_KEY: &str = "No API key provided. You must provide a valid API key.";
const INVALID_KEY: &str = "Invalid or missing API key.";

/// Reject requests without a configured bearer token. OPTIONS always passes,
/// and nothing is checked when no keys are configured.
pub async fn require_api_key(State(state): State<ProxyState>, request: Request, next: Next) -> Response {
    let auth = &state.config.auth;
    if request.method() == Method::OPTIONS || !auth.is_enabled() {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        tracing::warn!(path = %path, "Rejected request without API key");
        return unauthorized(MISSING_KEY);
    };

    let authorized = value
        .to_str()
        .ok()
        .and_then(bearer_token)
        .is_some_and(|token| auth.accepts(token));

    if authorized {
        next.run(request).await
    } else {
        tracing::warn!(path = %path, "Rejected request with invalid API key");
        unauthorized(INVALID_KEY)
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}

fn unauthorized(message: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "unauthorized", "message": message}})),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
