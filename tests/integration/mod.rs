//! Integration tests for db-qa.

pub mod agent_test;
pub mod builder_test;
pub mod common;
pub mod live_test;
pub mod toolkit_test;
pub mod web_test;
