//! Mistral API client (OpenAI-compatible wire format).
//!
//! One client instance serves three roles: tool-calling chat, structured
//! verification, and embeddings. Constructed once at startup and shared.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{ChatProvider, EmbeddingProvider};
use super::types::{Message, ToolCallRequest, Verification};
use crate::config::AppConfig;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct MistralProvider {
    base_url: String,
    api_key: String,
    chat_model: String,
    verification_model: String,
    embed_model: String,
    client: Client,
}

impl MistralProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            verification_model: config.verification_model.clone(),
            embed_model: config.embed_model.clone(),
            client: Client::new(),
        }
    }

    async fn completions(&self, body: Value) -> Result<Value, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("chat completion error: {}", text)));
        }

        res.json().await.map_err(ApiError::upstream)
    }
}

/// Convert a transcript message into the OpenAI-compatible wire object.
fn to_wire(message: &Message) -> Value {
    match message {
        Message::User { content } => json!({"role": "user", "content": content}),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut obj = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                obj["tool_calls"] = Value::Array(calls);
            }
            obj
        }
        Message::Tool {
            tool_call_id,
            content,
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
    }
}

/// Parse the assistant message out of a completion payload.
fn parse_assistant(payload: &Value) -> Result<Message, ApiError> {
    let message = payload
        .pointer("/choices/0/message")
        .ok_or_else(|| ApiError::Upstream("completion payload missing message".to_string()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let id = call.get("id")?.as_str()?.to_string();
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    // Arguments arrive as a JSON-encoded string.
                    let arguments = function
                        .get("arguments")
                        .and_then(|v| v.as_str())
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or_else(|| json!({}));
                    Some(ToolCallRequest {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(Message::Assistant {
        content,
        tool_calls,
    })
}

#[async_trait]
impl ChatProvider for MistralProvider {
    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<Message, ApiError> {
        let wire: Vec<Value> = messages.iter().map(to_wire).collect();
        let mut body = json!({
            "model": self.chat_model,
            "messages": wire,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = json!("auto");
        }

        let payload = self.completions(body).await?;
        parse_assistant(&payload)
    }

    async fn verify(&self, system: &str, prompt: &str) -> Result<Verification, ApiError> {
        let body = json!({
            "model": self.verification_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        let payload = self.completions(body).await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::Upstream("verification payload missing content".to_string()))?;

        serde_json::from_str(content)
            .map_err(|e| ApiError::Upstream(format!("malformed verification output: {}", e)))
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for MistralProvider {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.embed_model,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("embeddings error: {}", text)));
        }

        let payload: EmbeddingsResponse = res.json().await.map_err(ApiError::upstream)?;
        Ok(payload.data.into_iter().map(|row| row.embedding).collect())
    }
}
