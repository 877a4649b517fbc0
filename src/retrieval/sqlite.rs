//! Embedded vector store over sqlx/SQLite.
//!
//! Chunks are stored with their embedding vector and identity metadata;
//! search embeds the query, loads the candidate rows for the filter scope,
//! and ranks by cosine similarity in-process.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::ArrayView1;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use super::{DocumentFilter, Retriever, ScoredPassage};
use crate::core::errors::ApiError;
use crate::llm::provider::EmbeddingProvider;

/// A chunk ready for insertion.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub content: String,
    pub page_label: String,
    pub user_id: String,
    pub thread_id: String,
    pub source: String,
}

#[derive(Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteVectorStore {
    pub async fn new(
        db_path: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ApiError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to vector db: {}", e)))?;

        Self::with_pool(pool, embedder).await
    }

    /// Build over an existing pool (shared with the checkpoint store).
    pub async fn with_pool(
        pool: SqlitePool,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                page_label TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata JSON,
                embedding JSON NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init chunks table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_identity ON chunks(user_id, thread_id)")
            .execute(&pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create chunk index: {}", e)))?;

        Ok(Self { pool, embedder })
    }

    /// Insert chunks with their precomputed embeddings.
    pub async fn insert_batch(
        &self,
        items: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ApiError> {
        for (chunk, embedding) in items {
            let metadata = serde_json::json!({
                "user_id": chunk.user_id,
                "thread_id": chunk.thread_id,
                "page_label": chunk.page_label,
                "source": chunk.source,
            });
            let embedding_json =
                serde_json::to_string(&embedding).map_err(ApiError::internal)?;

            sqlx::query(
                "INSERT INTO chunks (id, user_id, thread_id, page_label, content, metadata, embedding)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&chunk.user_id)
            .bind(&chunk.thread_id)
            .bind(&chunk.page_label)
            .bind(&chunk.content)
            .bind(metadata.to_string())
            .bind(embedding_json)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn candidate_rows(
        &self,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<(String, String, Value, Vec<f32>)>, ApiError> {
        let rows = match filter {
            Some(DocumentFilter {
                user_id,
                thread_id: Some(thread_id),
            }) => {
                sqlx::query(
                    "SELECT content, page_label, metadata, embedding FROM chunks
                     WHERE user_id = ? AND thread_id = ?",
                )
                .bind(user_id)
                .bind(thread_id)
                .fetch_all(&self.pool)
                .await?
            }
            Some(DocumentFilter {
                user_id,
                thread_id: None,
            }) => {
                sqlx::query(
                    "SELECT content, page_label, metadata, embedding FROM chunks WHERE user_id = ?",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT content, page_label, metadata, embedding FROM chunks")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let content: String = row.try_get("content")?;
            let page_label: String = row.try_get("page_label")?;
            let metadata: Value = row
                .try_get::<String, _>("metadata")
                .ok()
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or(Value::Null);
            let embedding: Vec<f32> = row
                .try_get::<String, _>("embedding")
                .ok()
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_default();
            candidates.push((content, page_label, metadata, embedding));
        }
        Ok(candidates)
    }
}

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }
    let a = ArrayView1::from(query);
    let b = ArrayView1::from(candidate);
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    a.dot(&b) / denom
}

#[async_trait]
impl Retriever for SqliteVectorStore {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<ScoredPassage>, ApiError> {
        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("embedder returned no vector".to_string()))?;

        let candidates = self.candidate_rows(filter).await?;

        let mut scored: Vec<ScoredPassage> = candidates
            .into_iter()
            .map(|(text, page_label, metadata, embedding)| ScoredPassage {
                score: cosine_similarity(&query_embedding, &embedding),
                text,
                page_label,
                metadata,
            })
            .collect();

        scored.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-5);
    }

    #[test]
    fn cosine_handles_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
