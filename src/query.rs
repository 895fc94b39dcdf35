//! Question answering on top of a built agent.

use crate::agent::{Agent, AgentRequest, AgentResponse, MessageContent};
use crate::error::{QaError, Result};

/// Asks `agent` a question and returns its answer as plain text.
///
/// Never fails: any error is turned into `Error querying database: <cause>`.
pub async fn query_database(agent: &Agent, question: &str) -> String {
    tracing::info!(question_len = question.len(), "Answering question");

    let answer = match agent.invoke(AgentRequest::user(question)).await {
        Ok(response) => extract_answer(&response),
        Err(e) => Err(e),
    };

    answer.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Question failed");
        format!("Error querying database: {}", e.detail())
    })
}

/// Extracts the answer text from the last message of `response`.
///
/// Text content is returned as is, block content yields the text of the
/// first block, and anything else is rendered as JSON text.
pub fn extract_answer(response: &AgentResponse) -> Result<String> {
    let last = response
        .messages
        .last()
        .ok_or_else(|| QaError::agent("agent returned no messages"))?;

    match &last.content {
        MessageContent::Text(text) => Ok(text.clone()),
        MessageContent::Blocks(blocks) => blocks
            .first()
            .ok_or_else(|| QaError::agent("agent returned an empty content list"))?
            .text
            .clone()
            .ok_or_else(|| QaError::agent("first content block has no text")),
        MessageContent::Other(value) => Ok(value.to_string()),
    }
}
