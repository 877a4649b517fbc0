use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool invocation requested by the chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Decoded argument object as produced by the model.
    pub arguments: Value,
}

/// Atomic transcript unit, discriminated by role.
///
/// A `Tool` message always immediately follows the `Assistant` message whose
/// `tool_calls` it answers, one message per call id, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        /// May be empty when the message is purely a tool-call request.
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        /// JSON-serialized passage list (see `agent::transcript`).
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// True for an assistant message carrying actual answer text.
    pub fn is_content_bearing_assistant(&self) -> bool {
        matches!(self, Message::Assistant { content, .. } if !content.is_empty())
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

/// Structured verdict returned by the verification model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// False when the answer is fully supported by the context documents.
    pub hallucination: bool,
    /// Confidence in the assessment, 0.0..=1.0.
    pub confidence: f64,
    /// Short explanation of the assessment.
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_roundtrips_through_json() {
        let messages = vec![
            Message::user("what is on page 2?"),
            Message::Assistant {
                content: String::new(),
                tool_calls: vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "rag_tool".to_string(),
                    arguments: json!({"query1": "page 2"}),
                }],
            },
            Message::tool("call_1", "[\"excerpt (Page:2)\"]"),
            Message::assistant("It says hello."),
        ];

        let encoded = serde_json::to_string(&messages).unwrap();
        let decoded: Vec<Message> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn role_tag_discriminates_variants() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value["role"], "user");

        let decoded: Message =
            serde_json::from_value(json!({"role": "assistant", "content": "hey"})).unwrap();
        assert!(decoded.is_content_bearing_assistant());
    }

    #[test]
    fn tool_call_only_assistant_is_not_content_bearing() {
        let msg = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: "c".to_string(),
                name: "rag_tool".to_string(),
                arguments: json!({}),
            }],
        };
        assert!(!msg.is_content_bearing_assistant());
    }
}
