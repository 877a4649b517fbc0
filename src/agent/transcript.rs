//! Tool-result serialization contract.
//!
//! A `Tool` message's content is a JSON-encoded list: string passages and/or
//! raw metadata objects. Decoding re-serializes objects to their canonical
//! JSON string so set semantics stay well-defined, and falls back to the raw
//! content as a single opaque document when the payload is not a JSON list.

use serde_json::Value;

use crate::core::errors::ApiError;

/// Serialize a tool output list for storage in a `Tool` message.
pub fn encode_tool_result(items: &[Value]) -> Result<String, ApiError> {
    serde_json::to_string(items).map_err(ApiError::internal)
}

/// Decode a `Tool` message's content back into context document strings.
pub fn decode_tool_result(content: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => vec![content.to_string()],
    }
}
