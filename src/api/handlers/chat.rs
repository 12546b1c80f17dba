// src/api/handlers/chat.rs
// POST /chat: runs one `Runtime::step` and streams its events as SSE.
// Grounded on the teacher's `web::chat::stream::chat_stream` pattern:
// spawn the turn on its own task, forward an mpsc channel into an SSE body.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::auth::extract_user_id;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::runtime::RuntimeEvent;

/// Per-event pacing delay (§5): a turn that fires many events in a tight
/// loop (e.g. a fast tool round-trip) must not starve the executor.
const SSE_PACING_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let user_id = extract_user_id(&headers)?;

    let session_id = match req.session_id {
        Some(id) => id,
        None => match state.sessions.active_session(&user_id).await {
            Some(id) => id,
            None => state.sessions.new_session(&user_id).await?,
        },
    };

    let runtime = state.sessions.get_or_create(&user_id, &session_id).await?;

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(100);
    tokio::spawn(async move {
        runtime.step(req.message, tx).await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok(Event::default().data(data)),
                Err(e) => {
                    warn!(error = %e, "failed to serialise runtime event for SSE");
                    continue;
                }
            }
            tokio::time::sleep(SSE_PACING_DELAY).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
