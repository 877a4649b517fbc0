//! Conversation checkpoint store.
//!
//! Sole long-lived owner of transcripts, keyed by (user_id, thread_id).
//! Append order is insertion order; readers get the full ordered transcript.
//!
//! Concurrent turns on the same thread identity are not serialized here:
//! each append batch is transactional, but two interleaved turns will
//! interleave their messages.

use std::path::Path;
use std::sync::Arc;

use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::ApiError;
use crate::llm::types::{Message, ToolCallRequest};

#[derive(Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
}

impl CheckpointStore {
    pub async fn new(db_path: &Path) -> Result<Self, ApiError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to checkpoint db: {}", e)))?;

        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_calls JSON,
                tool_call_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init messages table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(user_id, thread_id)",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create message index: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Append a batch of messages in transcript order.
    pub async fn append(
        &self,
        user_id: &str,
        thread_id: &str,
        messages: &[Message],
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        for message in messages {
            let (role, content, tool_calls, tool_call_id) = match message {
                Message::User { content } => ("user", content.clone(), None, None),
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let calls = if tool_calls.is_empty() {
                        None
                    } else {
                        Some(serde_json::to_string(tool_calls).map_err(ApiError::internal)?)
                    };
                    ("assistant", content.clone(), calls, None)
                }
                Message::Tool {
                    tool_call_id,
                    content,
                } => ("tool", content.clone(), None, Some(tool_call_id.clone())),
            };

            sqlx::query(
                "INSERT INTO messages (user_id, thread_id, role, content, tool_calls, tool_call_id)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(thread_id)
            .bind(role)
            .bind(content)
            .bind(tool_calls)
            .bind(tool_call_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Full ordered transcript for one thread identity.
    pub async fn transcript(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let rows = sqlx::query(
            "SELECT role, content, tool_calls, tool_call_id FROM messages
             WHERE user_id = ? AND thread_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            let content: String = row.try_get("content")?;
            let message = match role.as_str() {
                "user" => Message::User { content },
                "assistant" => {
                    let tool_calls: Vec<ToolCallRequest> = row
                        .try_get::<Option<String>, _>("tool_calls")
                        .ok()
                        .flatten()
                        .and_then(|raw| serde_json::from_str(&raw).ok())
                        .unwrap_or_default();
                    Message::Assistant {
                        content,
                        tool_calls,
                    }
                }
                "tool" => Message::Tool {
                    tool_call_id: row
                        .try_get::<Option<String>, _>("tool_call_id")
                        .ok()
                        .flatten()
                        .unwrap_or_default(),
                    content,
                },
                other => {
                    return Err(ApiError::Internal(format!(
                        "unknown message role in checkpoint: {}",
                        other
                    )))
                }
            };
            messages.push(message);
        }
        Ok(messages)
    }
}

/// Shared handle type used across request-scoped orchestration.
pub type SharedCheckpoints = Arc<CheckpointStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> CheckpointStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        CheckpointStore::with_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn append_and_read_preserves_order_and_shape() {
        let store = store().await;
        let turn = vec![
            Message::user("question"),
            Message::Assistant {
                content: String::new(),
                tool_calls: vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "rag_tool".to_string(),
                    arguments: json!({"query1": "q"}),
                }],
            },
            Message::tool("call_1", "[\"doc (Page:1)\"]"),
            Message::assistant("answer"),
        ];

        store.append("u1", "t1", &turn).await.unwrap();
        let transcript = store.transcript("u1", "t1").await.unwrap();
        assert_eq!(transcript, turn);
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = store().await;
        store
            .append("u1", "t1", &[Message::user("for t1")])
            .await
            .unwrap();
        store
            .append("u1", "t2", &[Message::user("for t2")])
            .await
            .unwrap();

        let t1 = store.transcript("u1", "t1").await.unwrap();
        assert_eq!(t1, vec![Message::user("for t1")]);
        assert!(store.transcript("u2", "t1").await.unwrap().is_empty());
    }
}
