// src/error.rs
// Typed error taxonomy. Each layer raises its own enum; only the boundaries
// (ToolResult, SSE `error` event, HTTP envelope) flatten these to strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathGuardError {
    #[error("path escapes workspace root: {0}")]
    Escape(String),
    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session id {0:?} does not match the required pattern")]
    InvalidId(String),
    #[error("session {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("server returned JSON-RPC error {code}: {message}")]
    Rpc { code: i32, message: String },
    #[error("request {0} timed out waiting for a response")]
    Timeout(i64),
    #[error("response channel for request {0} was dropped")]
    ChannelClosed(i64),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("maximum step count ({0}) exceeded")]
    MaxStepsExceeded(usize),
    #[error("tool call at index {0} has no id")]
    MissingToolCallId(i64),
}
