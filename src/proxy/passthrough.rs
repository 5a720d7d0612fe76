//! Backend pass-through routes: model list, OPTIONS relays and favicon

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::server::ProxyState;
use crate::api::rewrite_model_list;

/// `GET /v1/models`: the backend list with the first id reduced to its bare name
pub async fn list_models(State(state): State<ProxyState>) -> Response {
    let backend = &state.config.backend;
    let mut backend_req = state
        .http_client
        .get(backend.models_url())
        .timeout(backend.timeouts.model_list());
    if let Some(ref api_key) = backend.api_key {
        backend_req = backend_req.header(header::AUTHORIZATION, format!("Bearer {}", api_key));
    }

    let backend_response = match backend_req.send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, "Failed to retrieve models from backend");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "Failed to retrieve models from the destination API."})),
            )
                .into_response();
        }
    };

    let status = backend_response.status();
    match backend_response.json::<Value>().await {
        Ok(mut list) => {
            rewrite_model_list(&mut list);
            (status, Json(list)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Backend model list is not JSON");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": format!("Request error: {}", e)})),
            )
                .into_response()
        }
    }
}

/// OPTIONS on a relayed path: ask the backend and mirror its answer
pub async fn relay_options(State(state): State<ProxyState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let backend_url = state.config.backend.endpoint_url(&path);

    tracing::debug!(path = %path, backend_url = %backend_url, "Relaying OPTIONS");

    let mut backend_req = state.http_client.request(Method::OPTIONS, &backend_url);
    for (name, value) in req.headers().iter() {
        if name == header::HOST || name == header::CONTENT_LENGTH || name == header::AUTHORIZATION {
            continue;
        }
        backend_req = backend_req.header(name, value);
    }
    if let Some(ref api_key) = state.config.backend.api_key {
        backend_req = backend_req.header(header::AUTHORIZATION, format!("Bearer {}", api_key));
    }

    let backend_response = match backend_req.send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, "OPTIONS relay failed");
            return (StatusCode::BAD_GATEWAY, format!("Backend error: {}", e)).into_response();
        }
    };

    mirror(backend_response).await
}

/// `GET /favicon.ico` from the backend, or 404
pub async fn favicon(State(state): State<ProxyState>) -> Response {
    let url = state.config.backend.endpoint_url("/favicon.ico");
    match state
        .http_client
        .get(&url)
        .timeout(state.config.backend.timeouts.model_list())
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => mirror(resp).await,
        Ok(resp) => {
            tracing::debug!(status = %resp.status(), "Backend has no favicon");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Favicon fetch failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Copy status, headers and body of a backend response
async fn mirror(backend_response: reqwest::Response) -> Response {
    let status = backend_response.status();
    let headers = backend_response.headers().clone();
    let body = match backend_response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            return (StatusCode::BAD_GATEWAY, format!("Failed to read response: {}", e))
                .into_response();
        }
    };

    let mut response = Response::builder().status(status);
    for (name, value) in headers.iter() {
        // axum sets these for the new body
        if name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING {
            continue;
        }
        response = response.header(name, value);
    }

    response.body(Body::from(body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build mirrored response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
