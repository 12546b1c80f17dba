// src/api/handlers/sessions.rs
// GET /sessions, POST /sessions/new, POST /sessions/{id}/load, DELETE /sessions/{id}.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::auth::extract_user_id;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

#[derive(Serialize)]
pub struct SessionListEntry {
    pub id: String,
    pub mtime: i64,
}

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionListEntry>,
    pub active: Option<String>,
}

pub async fn list_sessions(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<SessionListResponse>> {
    let user_id = extract_user_id(&headers)?;
    let sessions = state.sessions.list(&user_id).await?;
    let active = state.sessions.active_session(&user_id).await;

    Ok(Json(SessionListResponse {
        sessions: sessions.into_iter().map(|s| SessionListEntry { id: s.id, mtime: s.mtime }).collect(),
        active,
    }))
}

pub async fn new_session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let user_id = extract_user_id(&headers)?;
    let session_id = state.sessions.new_session(&user_id).await?;
    Ok(Json(json!({ "session_id": session_id })))
}

pub async fn load_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = extract_user_id(&headers)?;
    let history = state.sessions.load(&user_id, &session_id).await?;
    Ok(Json(json!({ "history": history })))
}

pub async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = extract_user_id(&headers)?;
    state.sessions.delete(&user_id, &session_id).await?;
    Ok(Json(json!({ "deleted": session_id })))
}
