//! Tool-calling agent.
//!
//! The agent sends the conversation to the model together with the tool
//! declarations, runs whatever tools the model asks for, feeds the results
//! back and repeats until the model answers in plain text.
//!
//! # Invocation shape
//!
//! `Agent::invoke` takes an [`AgentRequest`] and returns an [`AgentResponse`],
//! both of which are `{ "messages": [{ "role": ..., "content": ... }] }` on the
//! wire. Message content is either a string, a list of content blocks, or
//! some other JSON value; [`MessageContent`] models the three cases.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QaError, Result};
use crate::llm::{LlmClient, Message, Role, ToolCall, ToolDefinition};
use crate::toolkit::{Tool, LIST_TABLES, QUERY, QUERY_CHECKER, SCHEMA};

/// Default number of model round trips per question.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Content of an agent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// A sequence of content blocks.
    Blocks(Vec<ContentBlock>),
    /// Anything else.
    Other(Value),
}

impl MessageContent {
    /// Flattens the content to text for the model.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Other(value) => value.to_string(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A structured unit of message content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Modality tag, e.g. `text` or `tool_call`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Text payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Tool name, for tool call blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool arguments, for tool call blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

impl ContentBlock {
    /// A text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A block recording a tool call.
    pub fn tool_call(call: &ToolCall) -> Self {
        Self {
            kind: Some("tool_call".to_string()),
            name: Some(call.name.clone()),
            input: call.parsed_arguments().ok(),
            ..Self::default()
        }
    }
}

/// A message exchanged with the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl AgentMessage {
    /// Creates a message.
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Input of an agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub messages: Vec<AgentMessage>,
}

impl AgentRequest {
    /// A request holding a single user message.
    pub fn user(question: impl Into<String>) -> Self {
        Self {
            messages: vec![AgentMessage::new(Role::User, question.into())],
        }
    }
}

/// Output of an agent invocation: the full transcript, final answer last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub messages: Vec<AgentMessage>,
}

/// Builds the system prompt for a SQL agent.
pub fn build_system_prompt(dialect: &str, top_k: usize) -> String {
    format!(
        "You are an agent designed to interact with a SQL database.\n\
         Given an input question, create a syntactically correct {dialect} query to run, then \
         look at the results of the query and return the answer.\n\
         Unless the user specifies a specific number of examples they wish to obtain, always \
         limit your query to at most {top_k} results.\n\
         You can order the results by a relevant column to return the most interesting \
         examples in the database.\n\
         Never query for all the columns from a specific table, only ask for the relevant \
         columns given the question.\n\
         You have access to tools for interacting with the database.\n\
         Only use the information returned by the tools to construct your final answer.\n\
         You MUST double check your query with {QUERY_CHECKER} before executing it with \
         {QUERY}. If you get an error while executing a query, rewrite the query and try \
         again.\n\n\
         DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.\n\n\
         To start you should ALWAYS call {LIST_TABLES} to see what you can query. Do NOT skip \
         this step.\n\
         Then you should call {SCHEMA} for the most relevant tables."
    )
}

/// Question-answering agent over a bound toolset.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn Tool>>,
    definitions: Vec<ToolDefinition>,
    system_prompt: String,
    max_iterations: usize,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tools", &self.tool_names())
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Creates an agent over `tools`.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Vec<Arc<dyn Tool>>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let definitions = tools.iter().map(|t| t.definition()).collect();
        Self {
            llm,
            tools,
            definitions,
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Sets the maximum number of model round trips per invocation.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Names of the bound tools.
    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// The system prompt sent with every invocation.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Runs the tool-calling loop for `request`.
    ///
    /// Returns the request messages followed by every assistant and tool
    /// message produced, ending with the final answer.
    pub async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse> {
        let start = Instant::now();
        let mut transcript = request.messages;

        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(self.system_prompt.as_str()));
        messages.extend(
            transcript
                .iter()
                .map(|m| Message::new(m.role, m.content.to_text())),
        );

        for iteration in 1..=self.max_iterations {
            let response = self
                .llm
                .complete_with_tools(&messages, &self.definitions)
                .await?;

            tracing::debug!(
                iteration,
                tool_calls = response.tool_calls.len(),
                response_len = response.content.len(),
                "Received model response"
            );

            if !response.has_tool_calls() {
                tracing::info!(
                    iterations = iteration,
                    duration_ms = start.elapsed().as_millis(),
                    "Agent finished"
                );
                transcript.push(AgentMessage::new(Role::Assistant, response.content));
                return Ok(AgentResponse {
                    messages: transcript,
                });
            }

            let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
            if !response.content.is_empty() {
                blocks.push(ContentBlock::text(response.content.as_str()));
            }
            blocks.extend(response.tool_calls.iter().map(ContentBlock::tool_call));
            transcript.push(AgentMessage::new(
                Role::Assistant,
                MessageContent::Blocks(blocks),
            ));

            let results = join_all(response.tool_calls.iter().map(|c| self.run_tool(c))).await;

            messages.push(Message::assistant_tool_calls(
                response.content,
                response.tool_calls.clone(),
            ));
            for (call, result) in response.tool_calls.iter().zip(results) {
                transcript.push(AgentMessage::new(Role::Tool, result.as_str()));
                messages.push(Message::tool_result(call, result));
            }
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            "Agent stopped without a final answer"
        );
        Err(QaError::agent(format!(
            "Agent stopped after {} iterations without a final answer",
            self.max_iterations
        )))
    }

    /// Runs one tool call. Failures become `Error: ...` text for the model.
    async fn run_tool(&self, call: &ToolCall) -> String {
        let start = Instant::now();

        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            tracing::warn!(tool_name = %call.name, "Unknown tool requested");
            return format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                self.tool_names().join(", ")
            );
        };

        let args = match call.parsed_arguments() {
            Ok(args) => args,
            Err(e) => return format!("Error: invalid arguments for {}: {}", call.name, e),
        };

        let result = match tool.call(args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(tool_name = %call.name, error = %e, "Tool failed");
                format!("Error: {}", e.detail())
            }
        };

        tracing::debug!(
            tool_name = %call.name,
            duration_ms = start.elapsed().as_millis(),
            result_len = result.len(),
            "Tool execution complete"
        );

        result
    }
}
