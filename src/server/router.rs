use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::MAX_FILE_SIZE;
use crate::server::handlers::{documents, health, messages, search};
use crate::state::AppState;

/// Multipart framing overhead on top of the file size cap; the exact limit
/// is enforced in the upload handler.
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 64 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::home))
        .route("/health", get(health::health_check))
        .route(
            "/users/:user_id/threads/:thread_id/messages",
            post(messages::message_stream),
        )
        .route(
            "/users/:user_id/threads/:thread_id/documents",
            post(documents::upload_pdf),
        )
        .route("/users/:user_id/search", post(search::query_search))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
