// src/api/routes.rs
// C9's HTTP surface (§4.9).

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{chat, sessions};
use super::state::AppState;

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/new", post(sessions::new_session))
        .route("/sessions/{id}/load", post(sessions::load_session))
        .route("/sessions/{id}", delete(sessions::delete_session))
        .route("/chat", post(chat::chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "agentcore"
}
