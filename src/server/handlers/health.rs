use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// GET /health. Probes the retrieval collaborator with a fixed test query.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.retriever.search("test", 1, None).await {
        Ok(_) => "connected".to_string(),
        Err(err) => format!("error in vector store or embedding : {}", err),
    };

    Json(json!({
        "status": "healthy",
        "database": database,
        "service": "RAG API",
    }))
}

/// GET /
pub async fn home() -> impl IntoResponse {
    Json(json!({ "message": "Dark home page..." }))
}
