//! Retrieval collaborator: top-k similarity search over ingested chunks.

pub mod sqlite;

pub use sqlite::{ChunkRecord, SqliteVectorStore};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::ApiError;

/// Identity scope applied to a search. `thread_id = None` means user-wide.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    pub user_id: String,
    pub thread_id: Option<String>,
}

impl DocumentFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: None,
        }
    }

    pub fn for_thread(user_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: Some(thread_id.into()),
        }
    }
}

/// A retrieved passage with its page locator and stored metadata.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub text: String,
    pub page_label: String,
    pub metadata: Value,
    /// Cosine similarity, higher is better.
    pub score: f32,
}

/// Abstract similarity-search collaborator.
///
/// `filter = None` runs unscoped (used only by the health probe); every
/// user-facing retrieval passes an identity filter.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<ScoredPassage>, ApiError>;
}
