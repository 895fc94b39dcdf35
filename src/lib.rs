//! db-qa - ask questions about a SQL database in plain English.
//!
//! A model answers questions by calling SQL tools bound to the database:
//! [`build_agent`] wires the model, the database and the tools together, and
//! [`query_database`] turns a question into a plain-text answer.

pub mod agent;
pub mod builder;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod query;
pub mod safety;
pub mod toolkit;
pub mod web;

pub use agent::{Agent, AgentRequest, AgentResponse};
pub use builder::{build_agent, AgentBuilder};
pub use error::{QaError, Result};
pub use query::{extract_answer, query_database};
