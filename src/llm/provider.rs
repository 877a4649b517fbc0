use async_trait::async_trait;
use serde_json::Value;

use super::types::{Message, Verification};
use crate::core::errors::ApiError;

/// Chat model client. Implementations must be safe for concurrent use by
/// multiple in-flight requests (read-only after construction).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Chat completion with the given tool schemas bound.
    ///
    /// Returns one assistant message; the model decides whether it carries
    /// content, tool calls, or both.
    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<Message, ApiError>;

    /// Structured-output fact-check call for hallucination verification.
    async fn verify(&self, system: &str, prompt: &str) -> Result<Verification, ApiError>;
}

/// Embedding model client.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed each input text into a vector.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
