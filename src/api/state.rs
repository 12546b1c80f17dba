// src/api/state.rs
// Shared application state (C9), grounded on the teacher's `web::state::AppState`.

use std::sync::Arc;

use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}
