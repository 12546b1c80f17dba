// src/api/auth.rs
// Bearer-token extraction (§4.9): the token is taken verbatim as the
// user_id, with no signature validation — authentication is out of scope
// for this crate, this is only the seam a real deployment plugs into.

use axum::http::HeaderMap;

use super::error::ApiError;

pub fn extract_user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Authorization header must be a Bearer token"))?
        .trim();

    if token.is_empty() {
        return Err(ApiError::unauthorized("empty bearer token"));
    }

    Ok(token.to_string())
}
