//! Error types for the proxy.
//!
//! Every handler funnels failures through [`ProxyError`], which renders the
//! JSON envelope `{"error": ..., "status"?: ..., "detail"?: ...}`.

use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors that can occur while proxying.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A required server-side setting is missing. Carries the setting key,
    /// never its value.
    #[error("Server misconfigured: missing {0}")]
    Config(String),

    /// Caller sent a missing or malformed field.
    #[error("{0}")]
    InvalidRequest(String),

    /// Caller credentials missing/invalid, or masked upstream 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Wrong method on a fixed-method endpoint.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Inbound body over `server.max_body_size`.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Network failure, timeout, or unreadable upstream response.
    #[error("{message}")]
    Network {
        message: String,
        status: Option<u16>,
        detail: Option<String>,
    },

    /// Identity provider rejected or mangled a token call.
    #[error("{0}")]
    TokenExchange(String),
}

impl ProxyError {
    /// Transport-level failure talking to Jira.
    pub fn network(message: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        ProxyError::Network {
            message: message.into(),
            status: None,
            detail: Some(detail.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Network { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::TokenExchange(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "Upstream request timed out"
        } else {
            "Upstream request failed"
        };
        ProxyError::Network {
            message: message.to_string(),
            status: e.status().map(|s| s.as_u16()),
            detail: Some(e.without_url().to_string()),
        }
    }
}

impl From<BytesRejection> for ProxyError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ProxyError::PayloadTooLarge
        } else {
            ProxyError::InvalidRequest(rejection.body_text())
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status.as_u16(), error = %error, "Proxy error");
        } else {
            tracing::warn!(status = %status.as_u16(), error = %error, "Client error");
        }

        let (upstream_status, detail) = match self {
            ProxyError::Network { status, detail, .. } => (status, detail),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error,
            status: upstream_status,
            detail,
        };

        (status, Json(body)).into_response()
    }
}
