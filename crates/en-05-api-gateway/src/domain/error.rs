//! Gateway error types.
//!
//! [`ApiError`] is what handlers return; it renders as
//! `{"error": "<message>", "kind": "<ErrorKind>"}` with the status code the
//! error kind maps to.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared_types::{EngagementError, ErrorKind};
use std::fmt;

/// Error returned by REST and webhook handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    kind: ErrorKind,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// REST mapping of an engagement error.
    pub fn rest(err: EngagementError) -> Self {
        let status = match err.kind {
            ErrorKind::Validation | ErrorKind::InvalidOperation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        };
        Self::new(status, err.kind, err.message)
    }

    /// Webhook mapping: every failure is a 400 so the bus redelivers on its
    /// own backoff schedule.
    pub fn webhook(err: EngagementError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.kind, err.message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorKind::Auth, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, ErrorKind::Upstream, message)
    }
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        Self::rest(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Server lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_status_mapping() {
        let cases = [
            (EngagementError::validation("v"), StatusCode::BAD_REQUEST),
            (EngagementError::invalid_operation("i"), StatusCode::BAD_REQUEST),
            (EngagementError::not_found("n"), StatusCode::NOT_FOUND),
            (EngagementError::conflict("c"), StatusCode::CONFLICT),
            (EngagementError::upstream("u"), StatusCode::INTERNAL_SERVER_ERROR),
            (EngagementError::auth("a"), StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::rest(err).status, status);
        }
    }

    #[test]
    fn test_webhook_failures_are_bad_requests() {
        let err = ApiError::webhook(EngagementError::auth("bad token"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "nope",
            kind: ErrorKind::NotFound,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "nope", "kind": "NotFound"}));
    }
}
