// src/api/error.rs
// The HTTP error envelope (ambient, C12): every non-SSE handler failure
// converts to `{error: true, message, status, error_code?}` through one
// `IntoResponse` implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::SessionError;

#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: Option<String>,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: StatusCode::INTERNAL_SERVER_ERROR, error_code: Some("INTERNAL_ERROR".into()) }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: StatusCode::BAD_REQUEST, error_code: Some("BAD_REQUEST".into()) }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: StatusCode::NOT_FOUND, error_code: Some("NOT_FOUND".into()) }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: StatusCode::UNAUTHORIZED, error_code: Some("UNAUTHORIZED".into()) }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16(),
        });
        if let Some(code) = self.error_code {
            body["error_code"] = json!(code);
        }
        (self.status_code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Typed-error-per-layer → HTTP status mapping (§7): a session error's own
/// variant decides 400 vs 404, everything else collapses to 500.
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidId(id) => ApiError::bad_request(format!("invalid session id: {id:?}")),
            SessionError::NotFound(id) => ApiError::not_found(format!("session {id} not found")),
            other => {
                error!(error = %other, "session error");
                ApiError::internal("session operation failed")
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(session_err) = err.downcast_ref::<SessionError>() {
            return match session_err {
                SessionError::InvalidId(id) => ApiError::bad_request(format!("invalid session id: {id:?}")),
                SessionError::NotFound(id) => ApiError::not_found(format!("session {id} not found")),
                other => {
                    error!(error = %other, "session error");
                    ApiError::internal("session operation failed")
                }
            };
        }
        error!(error = %err, "unhandled API error");
        ApiError::internal("internal server error")
    }
}
