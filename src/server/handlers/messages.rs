//! Chat message endpoint: streams the agent's answer as it is produced.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::state::AppState;
use crate::verify::run_verification;

const HALLUCINATION_BANNER: &str = "\n\n\n[======= **HALLUCINATION_REPORT** =======]\n\n";

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    #[serde(default)]
    pub hallucination_check: bool,
}

/// POST /users/:user_id/threads/:thread_id/messages
///
/// Runs the agent turn in a spawned task and adapts its fragment channel
/// into a chunked `text/event-stream` body. Once streaming has begun, all
/// failures arrive in-band as content fragments.
pub async fn message_stream(
    State(state): State<Arc<AppState>>,
    Path((user_id, thread_id)): Path<(String, String)>,
    Json(req): Json<MessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Can't be empty space".to_string()));
    }

    let (tx, rx) = mpsc::channel::<String>(32);

    let turn_state = state.clone();
    tokio::spawn(async move {
        turn_state
            .agent
            .run_turn(&user_id, &thread_id, &content, &tx)
            .await;

        if req.hallucination_check {
            if tx.send(HALLUCINATION_BANNER.to_string()).await.is_err() {
                return;
            }
            let report = run_verification(
                &turn_state.checkpoints,
                turn_state.chat.clone(),
                &user_id,
                &thread_id,
            )
            .await;
            let _ = tx.send(report).await;
        }
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async {
        rx.recv()
            .await
            .map(|fragment| (Ok::<_, Infallible>(Bytes::from(fragment)), rx))
    }));

    Ok(([(header::CONTENT_TYPE, "text/event-stream")], body))
}
