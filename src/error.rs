//! Relay error types and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors surfaced to relay callers
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Network failure or timeout talking to the backend
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The resolved profile key is not in the registry
    #[error("No configuration found for model: {0}")]
    ConfigurationMissing(String),

    /// A streamed frame could not be parsed
    #[error("Malformed upstream chunk: {0}")]
    MalformedUpstreamChunk(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The backend answered, but not with what the relay can use
    #[error("Unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BackendUnavailable(_) | RelayError::UnexpectedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::ConfigurationMissing(_) | RelayError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::MalformedUpstreamChunk(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            RelayError::BackendUnavailable(_) => "backend_unavailable",
            RelayError::ConfigurationMissing(_) => "configuration_missing",
            RelayError::MalformedUpstreamChunk(_) => "malformed_upstream_chunk",
            RelayError::InvalidRequest(_) => "invalid_request_error",
            RelayError::UnexpectedResponse(_) => "unexpected_response",
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::BackendUnavailable(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: &'static str,
    code: u16,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.to_string(),
                error_type: self.error_type(),
                code: status.as_u16(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Startup failures
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
}
