//! Post-hoc hallucination verification.
//!
//! Reconstructs the (query, answer, context) triple from a persisted
//! transcript and asks a structured-output model to judge whether the answer
//! is supported by the retrieved context.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::agent::transcript::decode_tool_result;
use crate::checkpoint::SharedCheckpoints;
use crate::core::errors::ApiError;
use crate::llm::provider::ChatProvider;
use crate::llm::types::Message;

const VERIFICATION_SYSTEM: &str = "You are a fact-checking assistant. Your task is to verify if the AI's response is \
fully supported by the provided context documents.\n\
Instructions:\n\
- Compare the AI's response against the context documents\n\
- Be strict - if it's not in the documents, it's hallucination\n\
Remember: The AI might rephrase or add humour, which is acceptable as long as the meaning matches the context.\n\
Respond with a JSON object: {\"hallucination\": <bool, false if the answer is fully supported by the context>, \
\"confidence\": <float 0-1>, \"description\": <short explanation, max 40 words>}";

const INSUFFICIENT_DATA_DESCRIPTION: &str =
    "Insufficient data for verification (probably no document fetched)";

/// Ephemeral triple reconstructed from a transcript. Never cached.
#[derive(Debug, Clone, Default)]
pub struct VerificationInput {
    pub user_query: Option<String>,
    pub ai_response: Option<String>,
    pub context_docs: BTreeSet<String>,
}

/// Final confidence-scored verdict. `hallucination = None` is a valid
/// terminal state meaning "insufficient data", not an error.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub hallucination: Option<bool>,
    pub confidence: f64,
    pub description: String,
    pub user_query: Option<String>,
    pub ai_response: Option<String>,
    pub context_used: Vec<String>,
}

/// Reconstruct the verification triple by scanning the transcript backward.
///
/// The anchor is the last assistant message with non-empty content. From that
/// index the nearest earlier user message is the query, and every tool result
/// at or before the anchor contributes context documents. There is no
/// stopping condition: older turns' retrievals are deliberately included.
pub fn reconstruct(messages: &[Message]) -> VerificationInput {
    let mut input = VerificationInput::default();

    let anchor = match messages
        .iter()
        .rposition(|m| m.is_content_bearing_assistant())
    {
        Some(i) => i,
        None => return input,
    };

    if let Message::Assistant { content, .. } = &messages[anchor] {
        input.ai_response = Some(content.clone());
    }

    for message in messages[..=anchor].iter().rev() {
        match message {
            Message::User { content } if input.user_query.is_none() => {
                input.user_query = Some(content.clone());
            }
            Message::Tool { content, .. } if !content.is_empty() => {
                for doc in decode_tool_result(content) {
                    input.context_docs.insert(doc);
                }
            }
            _ => {}
        }
    }

    input
}

fn insufficient_data_report(input: VerificationInput) -> VerificationReport {
    VerificationReport {
        hallucination: None,
        confidence: 0.8,
        description: INSUFFICIENT_DATA_DESCRIPTION.to_string(),
        user_query: input.user_query,
        ai_response: input.ai_response,
        context_used: input.context_docs.into_iter().collect(),
    }
}

/// Build the report for one transcript, invoking the verification model when
/// the reconstructed triple is complete.
pub async fn verification_report(
    messages: &[Message],
    chat: &dyn ChatProvider,
) -> Result<VerificationReport, ApiError> {
    let input = reconstruct(messages);

    let (query, answer) = match (&input.user_query, &input.ai_response) {
        (Some(q), Some(a)) if !input.context_docs.is_empty() => (q.clone(), a.clone()),
        _ => return Ok(insufficient_data_report(input)),
    };

    let context_docs: Vec<String> = input.context_docs.iter().cloned().collect();
    let prompt = format!(
        "USER QUERY: {}\n\nAI RESPONSE: {}\n\nCONTEXT DOCUMENTS (for verification):\n{}\n\nOutput your assessment in the specified format.",
        query,
        answer,
        context_docs.join("\n")
    );

    let verdict = chat.verify(VERIFICATION_SYSTEM, &prompt).await?;

    Ok(VerificationReport {
        hallucination: Some(verdict.hallucination),
        confidence: verdict.confidence,
        description: verdict.description,
        user_query: Some(query),
        ai_response: Some(answer),
        context_used: context_docs,
    })
}

/// Render the report in the fixed block format streamed to the caller.
pub fn format_report(report: &VerificationReport) -> String {
    let hallucination = match report.hallucination {
        Some(true) => "True",
        Some(false) => "False",
        None => "None",
    };

    format!(
        "\n    1. Hallucinating(T/F): {}\n    2. Confidence: {} %\n    3. Description: {}\n\n    Document:{:?}\n    ",
        hallucination,
        report.confidence * 100.0,
        report.description,
        report.context_used
    )
}

/// Full verification pass for one thread: grace period, checkpoint read-back,
/// reconstruction, scoring, formatting. Any failure is folded into an apology
/// string; it never aborts the answer already delivered.
pub async fn run_verification(
    checkpoints: &SharedCheckpoints,
    chat: Arc<dyn ChatProvider>,
    user_id: &str,
    thread_id: &str,
) -> String {
    // Let the turn's checkpoint write settle.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let result = async {
        let transcript = checkpoints.transcript(user_id, thread_id).await?;
        let report = verification_report(&transcript, chat.as_ref()).await?;
        Ok::<String, ApiError>(format_report(&report))
    }
    .await;

    match result {
        Ok(formatted) => formatted,
        Err(err) => format!("Sorry! we getting error here \n{}", err),
    }
}
