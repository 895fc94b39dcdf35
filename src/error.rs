//! Error types for db-qa.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for db-qa operations.
#[derive(Error, Debug)]
pub enum QaError {
    /// Configuration errors (missing credential, invalid config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connectivity errors (host unreachable, probe failed, etc.)
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Agent or toolset construction produced nothing usable.
    #[error("Construction error: {0}")]
    Construction(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Query execution errors (syntax errors, unknown tables, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Agent invocation errors (malformed responses, iteration limit, etc.)
    #[error("Agent error: {0}")]
    Agent(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QaError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connectivity error with the given message.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Creates a construction error with the given message.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an agent error with the given message.
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connectivity(_) => "Connectivity Error",
            Self::Construction(_) => "Construction Error",
            Self::Llm(_) => "LLM Error",
            Self::Query(_) => "Query Error",
            Self::Agent(_) => "Agent Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the bare message, without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Connectivity(msg)
            | Self::Construction(msg)
            | Self::Llm(msg)
            | Self::Query(msg)
            | Self::Agent(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

/// Result type alias using QaError.
pub type Result<T> = std::result::Result<T, QaError>;
