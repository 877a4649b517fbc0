//! PDF upload endpoint.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::config::MAX_FILE_SIZE;
use crate::core::errors::ApiError;
use crate::ingest::ingest_pdf;
use crate::state::AppState;

/// POST /users/:user_id/threads/:thread_id/documents
///
/// Size and extension are validated before any parsing or embedding work:
/// at most 100 MiB, filename must end in `.pdf` (case-insensitive).
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    Path((user_id, thread_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(String::from) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("No file in upload".to_string()))?;

    validate_upload(&filename, data.len())?;

    ingest_pdf(
        &data,
        &filename,
        &user_id,
        &thread_id,
        state.embedder.clone(),
        &state.vector_store,
    )
    .await
    .map_err(|e| ApiError::Internal(format!("Error in embedding storing in DB: {}", e)))?;

    Ok(Json(json!({
        "status": "success",
        "filename": filename,
        "user_id": user_id,
        "thread_id": thread_id,
    })))
}

/// Rejects oversized files before the extension check, mirroring the
/// order clients see the errors in.
pub fn validate_upload(filename: &str, size: usize) -> Result<(), ApiError> {
    if size > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest(
            "File too large, 100MB max limit".to_string(),
        ));
    }
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::BadRequest("Only PDF file allowed".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate_upload("report.pdf", MAX_FILE_SIZE).is_ok());
        let err = validate_upload("report.pdf", MAX_FILE_SIZE + 1).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "File too large, 100MB max limit"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(validate_upload("Scan.PDF", 10).is_ok());
        let err = validate_upload("notes.txt", 10).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "Only PDF file allowed"));
    }

    #[test]
    fn oversized_non_pdf_reports_size_first() {
        let err = validate_upload("movie.mp4", MAX_FILE_SIZE + 1).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "File too large, 100MB max limit"));
    }
}
