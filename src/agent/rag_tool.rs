//! Tool-Invocation Layer: the retrieval capability exposed to the chat model.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::retrieval::{DocumentFilter, Retriever};

/// Placeholder passage returned when retrieval finds nothing. The model
/// relays it verbatim, so it reads like a real (empty-handed) result.
pub const NO_DOCUMENT_SENTINEL: &str = "Sorry! No document found - First upload the document";

pub const RAG_TOOL_NAME: &str = "rag_tool";

/// Arguments the model supplies. The identity filter is deliberately absent:
/// it is injected from the trusted execution context, never from here.
#[derive(Debug, Clone, Deserialize)]
pub struct RagToolArgs {
    #[serde(default)]
    pub query1: String,
    #[serde(default)]
    pub query2: Option<String>,
    #[serde(default)]
    pub query3: Option<String>,
    #[serde(default = "default_retrieved_docs")]
    pub retrieved_docs: usize,
    #[serde(default = "default_true")]
    pub page_content: bool,
    #[serde(default)]
    pub metadata: bool,
}

fn default_retrieved_docs() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// OpenAI-style function schema bound to every chat call.
pub fn rag_tool_schema() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": RAG_TOOL_NAME,
            "description": "Retrieve relevant information from uploaded PDFs.\n\
                - Always return factual excerpts (with humour).\n\
                - Always include page number citation.\n\
                - If nothing found, say explicitly no answer in documents.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query1": {"type": "string", "description": "Primary search query"},
                    "query2": {"type": "string", "description": "Optional second query"},
                    "query3": {"type": "string", "description": "Optional third query"},
                    "retrieved_docs": {"type": "integer", "default": 2},
                    "page_content": {"type": "boolean", "default": true},
                    "metadata": {"type": "boolean", "default": false}
                },
                "required": ["query1"]
            }
        }
    })
}

/// Execute the retrieval tool for one tool call.
///
/// Runs each non-empty sub-query against the retriever scoped to `identity`,
/// formats passages as `"<text> (Page:<label>)"`, deduplicates by exact match
/// in first-seen order, and falls back to the sentinel when nothing matched.
/// Retriever errors propagate to the control loop.
pub async fn run_rag_tool(
    args: &RagToolArgs,
    identity: &DocumentFilter,
    retriever: &dyn Retriever,
) -> Result<Vec<Value>, ApiError> {
    let queries: Vec<&str> = [
        Some(args.query1.as_str()),
        args.query2.as_deref(),
        args.query3.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|q| !q.trim().is_empty())
    .collect();

    let mut document: Vec<Value> = Vec::new();

    for query in queries {
        let passages = retriever
            .search(query, args.retrieved_docs, Some(identity))
            .await?;

        for passage in passages {
            if args.page_content {
                let formatted = format!("{} (Page:{})", passage.text, passage.page_label);
                let entry = Value::String(formatted);
                if !document.contains(&entry) {
                    document.push(entry);
                }
            }

            if args.metadata && !document.contains(&passage.metadata) {
                document.push(passage.metadata.clone());
            }
        }
    }

    if document.is_empty() {
        document.push(Value::String(NO_DOCUMENT_SENTINEL.to_string()));
    }

    Ok(document)
}
