//! Semantic search endpoint. Always HTTP 200, errors folded into the body.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::retrieval::DocumentFilter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    1
}

/// POST /users/:user_id/search
///
/// Retrieval and collaborator errors come back as a human-readable `result`
/// string in a 200 response; only request validation gets a 4xx.
pub async fn query_search(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Can't be empty space".to_string()));
    }
    if req.top_k == 0 {
        return Err(ApiError::BadRequest("top_k must be greater than 0".to_string()));
    }

    let filter = DocumentFilter::for_user(user_id.clone());
    let result = match state.retriever.search(&query, req.top_k, Some(&filter)).await {
        Ok(passages) if passages.is_empty() => {
            format!("Awww! I found nothing for you \"{}\"", user_id)
        }
        Ok(passages) => passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Err(err) => format!("Oops! we get error here '{}'", err),
    };

    Ok(Json(json!({ "result": result })))
}
