//! Mock LLM clients for testing.
//!
//! `MockLlmClient` replays a scripted queue of responses and falls back to a
//! deterministic tool-calling flow when the script runs out, so the agent can
//! run end to end without an API key. `FailingLlmClient` always errors.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{QaError, Result};
use crate::llm::parser::extract_sql;
use crate::llm::types::{LlmResponse, Message, Role, ToolCall, ToolDefinition};
use crate::llm::LlmClient;

/// Mock LLM client that returns scripted or canned responses.
///
/// Used for unit testing without making real API calls.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Responses handed out in order by `complete_with_tools`.
    script: Mutex<VecDeque<LlmResponse>>,
    /// Custom response mappings (pattern -> response) for `complete`.
    custom_responses: Vec<(String, String)>,
    /// Number of requests served.
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that replays `responses` in order.
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern`, `complete` returns `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Number of requests this client has served.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_scripted(&self) -> Option<LlmResponse> {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
    }

    /// Generates a mock plain-text response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        // Query-checker prompts embed the query in a code block; echo it back.
        if input.contains("```") {
            return extract_sql(input);
        }

        "I don't understand that question. Could you please rephrase it?".to_string()
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Deterministic tool flow: list the tables, then report them.
    fn fallback_with_tools(messages: &[Message], tools: &[ToolDefinition]) -> LlmResponse {
        let last = messages.last();

        if let Some(result) = last.filter(|m| m.role == Role::Tool) {
            return LlmResponse::text(format!(
                "The database contains these tables: {}",
                result.content
            ));
        }

        if tools.iter().any(|t| t.name == "sql_db_list_tables") {
            return LlmResponse::with_tool_calls(
                "",
                vec![ToolCall::new("mock_call_1", "sql_db_list_tables", "{}")],
            );
        }

        LlmResponse::text(format!(
            "Mock answer to: {}",
            Self::extract_user_input(messages)
        ))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.next_scripted() {
            return Ok(scripted.content);
        }
        let input = Self::extract_user_input(messages);
        Ok(self.mock_response(&input))
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .next_scripted()
            .unwrap_or_else(|| Self::fallback_with_tools(messages, tools)))
    }
}

/// LLM client whose every request fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingLlmClient {
    message: String,
}

impl FailingLlmClient {
    /// Creates a client failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        Err(QaError::llm(self.message.clone()))
    }

    async fn complete_with_tools(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        Err(QaError::llm(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_tables_tool() -> ToolDefinition {
        ToolDefinition {
            name: "sql_db_list_tables".to_string(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[tokio::test]
    async fn test_mock_returns_unknown_response() {
        let client = MockLlmClient::new();
        let messages = vec![Message::user("What is the meaning of life?")];

        let response = client.complete(&messages).await.unwrap();

        assert!(response.contains("don't understand"));
    }

    #[tokio::test]
    async fn test_mock_custom_response() {
        let client = MockLlmClient::new()
            .with_response("white nike", "SELECT SUM(stock_quantity) FROM t_shirts");

        let messages = vec![Message::user("How many White Nike shirts?")];
        let response = client.complete(&messages).await.unwrap();

        assert_eq!(response, "SELECT SUM(stock_quantity) FROM t_shirts");
    }

    #[tokio::test]
    async fn test_mock_echoes_fenced_query() {
        let client = MockLlmClient::new();
        let messages = vec![Message::user("Check this:\n```sql\nSELECT 1\n```")];

        assert_eq!(client.complete(&messages).await.unwrap(), "SELECT 1");
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let client = MockLlmClient::scripted(vec![
            LlmResponse::with_tool_calls("", vec![ToolCall::new("1", "sql_db_query", "{}")]),
            LlmResponse::text("done"),
        ]);

        let first = client.complete_with_tools(&[], &[]).await.unwrap();
        assert!(first.has_tool_calls());
        let second = client.complete_with_tools(&[], &[]).await.unwrap();
        assert_eq!(second.content, "done");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_lists_tables_then_answers() {
        let client = MockLlmClient::new();
        let tools = vec![list_tables_tool()];
        let mut messages = vec![Message::user("What tables are there?")];

        let first = client.complete_with_tools(&messages, &tools).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "sql_db_list_tables");

        messages.push(Message::assistant_tool_calls("", first.tool_calls.clone()));
        messages.push(Message::tool_result(&first.tool_calls[0], "discounts, t_shirts"));

        let second = client.complete_with_tools(&messages, &tools).await.unwrap();
        assert!(!second.has_tool_calls());
        assert!(second.content.contains("discounts, t_shirts"));
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = FailingLlmClient::new("boom");
        let err = client.complete(&[]).await.unwrap_err();
        assert_eq!(err.detail(), "boom");
        assert!(client.complete_with_tools(&[], &[]).await.is_err());
    }
}
