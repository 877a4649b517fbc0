//! Conversational control loop.
//!
//! Alternates between the chat model and the retrieval tool until the model
//! answers directly, streaming answer fragments to the caller as they are
//! produced. A hard step cap bounds the model/tool cycle.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use super::rag_tool::{rag_tool_schema, run_rag_tool, RagToolArgs, RAG_TOOL_NAME};
use super::transcript::encode_tool_result;
use crate::checkpoint::SharedCheckpoints;
use crate::core::errors::ApiError;
use crate::llm::provider::ChatProvider;
use crate::llm::types::Message;
use crate::retrieval::{DocumentFilter, Retriever};

pub struct AgentRuntime {
    chat: Arc<dyn ChatProvider>,
    retriever: Arc<dyn Retriever>,
    checkpoints: SharedCheckpoints,
    max_steps: usize,
}

impl AgentRuntime {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        retriever: Arc<dyn Retriever>,
        checkpoints: SharedCheckpoints,
        max_steps: usize,
    ) -> Self {
        Self {
            chat,
            retriever,
            checkpoints,
            max_steps: max_steps.max(1),
        }
    }

    /// Run one conversational turn, streaming assistant fragments through
    /// `sender` in production order.
    ///
    /// Model or tool failures become a single apology fragment and end the
    /// stream; they never surface as a transport fault. Whatever messages the
    /// turn produced before stopping are persisted so verification can still
    /// inspect them.
    pub async fn run_turn(
        &self,
        user_id: &str,
        thread_id: &str,
        input: &str,
        sender: &mpsc::Sender<String>,
    ) {
        let mut new_messages = vec![Message::user(input)];

        let result = self
            .drive_loop(user_id, thread_id, sender, &mut new_messages)
            .await;

        if let Err(err) = result {
            tracing::warn!(
                "Agent turn failed for user={} thread={}: {}",
                user_id,
                thread_id,
                err
            );
            let _ = sender.send(format!("Sorry! I got problem ;) {}", err)).await;
        }

        if let Err(err) = self
            .checkpoints
            .append(user_id, thread_id, &new_messages)
            .await
        {
            tracing::error!("Failed to checkpoint turn for thread={}: {}", thread_id, err);
        }
    }

    async fn drive_loop(
        &self,
        user_id: &str,
        thread_id: &str,
        sender: &mpsc::Sender<String>,
        new_messages: &mut Vec<Message>,
    ) -> Result<(), ApiError> {
        let identity = DocumentFilter::for_thread(user_id, thread_id);
        let tools = [rag_tool_schema()];

        let mut transcript = self.checkpoints.transcript(user_id, thread_id).await?;
        transcript.extend(new_messages.iter().cloned());

        for _ in 0..self.max_steps {
            let assistant = self.chat.chat_with_tools(&transcript, &tools).await?;

            let (content, tool_calls) = match &assistant {
                Message::Assistant {
                    content,
                    tool_calls,
                } => (content.clone(), tool_calls.clone()),
                other => {
                    return Err(ApiError::Upstream(format!(
                        "chat model returned a non-assistant message: {}",
                        other.role()
                    )))
                }
            };

            transcript.push(assistant.clone());
            new_messages.push(assistant);

            // Content-bearing increments stream immediately; tool-call-only
            // messages stay internal.
            if !content.is_empty() && sender.send(content).await.is_err() {
                tracing::debug!("Client disconnected mid-stream, aborting turn");
                return Ok(());
            }

            if tool_calls.is_empty() {
                return Ok(());
            }

            // Dispatch in the order the model issued the calls, one result
            // message per call id.
            for call in tool_calls {
                let result = self.dispatch(&call.name, &call.arguments, &identity).await?;
                let tool_message = Message::tool(call.id, encode_tool_result(&result)?);
                transcript.push(tool_message.clone());
                new_messages.push(tool_message);
            }
        }

        // Step cap reached without a direct answer.
        let notice = format!(
            "Sorry! I hit my tool-call limit ({}) before finishing an answer - try asking again.",
            self.max_steps
        );
        let _ = sender.send(notice.clone()).await;
        new_messages.push(Message::assistant(notice));
        Ok(())
    }

    async fn dispatch(
        &self,
        tool_name: &str,
        arguments: &Value,
        identity: &DocumentFilter,
    ) -> Result<Vec<Value>, ApiError> {
        if tool_name != RAG_TOOL_NAME {
            // Only rag_tool is bound; answer a stray call in-band so the
            // one-result-per-call-id invariant holds.
            return Ok(vec![Value::String(format!("Unknown tool '{}'", tool_name))]);
        }

        let args: RagToolArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| ApiError::BadRequest(format!("Invalid rag_tool arguments: {}", e)))?;

        run_rag_tool(&args, identity, self.retriever.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;

    use crate::checkpoint::CheckpointStore;
    use crate::llm::types::{ToolCallRequest, Verification};
    use crate::retrieval::ScoredPassage;

    /// Chat model that replays a scripted sequence of assistant messages.
    struct ScriptedChat {
        script: Mutex<Vec<Message>>,
    }

    impl ScriptedChat {
        fn new(script: Vec<Message>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn chat_with_tools(
            &self,
            _messages: &[Message],
            _tools: &[Value],
        ) -> Result<Message, ApiError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(ApiError::Upstream("script exhausted".to_string()));
            }
            Ok(script.remove(0))
        }

        async fn verify(&self, _system: &str, _prompt: &str) -> Result<Verification, ApiError> {
            unreachable!("verification not exercised here")
        }
    }

    struct StubRetriever;

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn search(
            &self,
            _query: &str,
            _k: usize,
            _filter: Option<&DocumentFilter>,
        ) -> Result<Vec<ScoredPassage>, ApiError> {
            Ok(vec![ScoredPassage {
                text: "retrieved excerpt".to_string(),
                page_label: "2".to_string(),
                metadata: json!({"page_label": "2"}),
                score: 0.8,
            }])
        }
    }

    async fn checkpoints() -> SharedCheckpoints {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Arc::new(CheckpointStore::with_pool(pool).await.unwrap())
    }

    fn tool_call_message() -> Message {
        Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: RAG_TOOL_NAME.to_string(),
                arguments: json!({"query1": "page 2"}),
            }],
        }
    }

    async fn collect(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment);
        }
        fragments
    }

    #[tokio::test]
    async fn direct_answer_streams_one_fragment_and_persists() {
        let store = checkpoints().await;
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedChat::new(vec![Message::assistant("direct answer")])),
            Arc::new(StubRetriever),
            store.clone(),
            6,
        );

        let (tx, rx) = mpsc::channel(16);
        runtime.run_turn("u1", "t1", "hello", &tx).await;
        drop(tx);

        assert_eq!(collect(rx).await, vec!["direct answer".to_string()]);

        let transcript = store.transcript("u1", "t1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0], Message::user("hello"));
        assert!(transcript[1].is_content_bearing_assistant());
    }

    #[tokio::test]
    async fn tool_cycle_appends_result_then_answer() {
        let store = checkpoints().await;
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedChat::new(vec![
                tool_call_message(),
                Message::assistant("It says hello on page 2."),
            ])),
            Arc::new(StubRetriever),
            store.clone(),
            6,
        );

        let (tx, rx) = mpsc::channel(16);
        runtime.run_turn("u1", "t1", "what is on page 2?", &tx).await;
        drop(tx);

        // Tool-call-only message and tool result are internal.
        assert_eq!(
            collect(rx).await,
            vec!["It says hello on page 2.".to_string()]
        );

        let transcript = store.transcript("u1", "t1").await.unwrap();
        assert_eq!(transcript.len(), 4);
        match &transcript[2] {
            Message::Tool {
                tool_call_id,
                content,
            } => {
                assert_eq!(tool_call_id, "call_1");
                assert!(content.contains("(Page:2)"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn model_failure_becomes_apology_fragment() {
        let store = checkpoints().await;
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedChat::new(vec![])),
            Arc::new(StubRetriever),
            store.clone(),
            6,
        );

        let (tx, rx) = mpsc::channel(16);
        runtime.run_turn("u1", "t1", "hello", &tx).await;
        drop(tx);

        let fragments = collect(rx).await;
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].starts_with("Sorry! I got problem ;)"));

        // The user message is still checkpointed.
        let transcript = store.transcript("u1", "t1").await.unwrap();
        assert_eq!(transcript, vec![Message::user("hello")]);
    }

    #[tokio::test]
    async fn step_cap_ends_turn_with_fixed_message() {
        let store = checkpoints().await;
        // Model requests tools forever.
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedChat::new(vec![
                tool_call_message(),
                tool_call_message(),
                tool_call_message(),
            ])),
            Arc::new(StubRetriever),
            store.clone(),
            2,
        );

        let (tx, rx) = mpsc::channel(16);
        runtime.run_turn("u1", "t1", "loop forever", &tx).await;
        drop(tx);

        let fragments = collect(rx).await;
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].contains("tool-call limit (2)"));

        // user + 2x(assistant, tool result) + capped notice
        let transcript = store.transcript("u1", "t1").await.unwrap();
        assert_eq!(transcript.len(), 6);
        assert!(transcript.last().unwrap().is_content_bearing_assistant());
    }
}
