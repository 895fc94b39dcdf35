//! Tests against a live MySQL or PostgreSQL server.
//!
//! Set DATABASE_URL (e.g. mysql://root@localhost:3306/atliq_tshirts) to run
//! them; they skip otherwise.

use std::sync::Arc;

use db_qa::config::{Config, ConnectionConfig};
use db_qa::db::{self, DatabaseClient};
use db_qa::llm::MockLlmClient;
use db_qa::toolkit::{SqlToolkit, Tool, QUERY};
use db_qa::{build_agent, query_database};
use serde_json::json;

/// Helper to get the live database descriptor from the environment.
fn live_connection() -> Option<ConnectionConfig> {
    let url = std::env::var("DATABASE_URL").ok()?;
    ConnectionConfig::from_connection_string(&url).ok()
}

#[tokio::test]
async fn test_live_list_tables() {
    let Some(connection) = live_connection() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let client = db::connect(&connection).await.unwrap();
    let tables = client.list_tables().await.unwrap();

    let mut sorted = tables.clone();
    sorted.sort();
    assert_eq!(tables, sorted);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_live_build_and_ask() {
    let Some(connection) = live_connection() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let mut config = Config::default();
    config.llm.provider = "mock".to_string();
    config.database = connection;

    let agent = build_agent(&config).await.unwrap();
    let answer = query_database(&agent, "Which tables are there?").await;

    assert!(answer.starts_with("The database contains these tables:"));
}

#[tokio::test]
async fn test_live_query_tool_is_read_only() {
    let Some(connection) = live_connection() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let db: Arc<dyn DatabaseClient> = Arc::from(db::connect(&connection).await.unwrap());
    let toolkit = SqlToolkit::new(db, Arc::new(MockLlmClient::new()));
    let query = toolkit
        .tools()
        .into_iter()
        .find(|t| t.name() == QUERY)
        .unwrap();

    assert_eq!(query.call(json!({ "query": "SELECT 1" })).await.unwrap(), "[(1,)]");
    assert!(query
        .call(json!({ "query": "DROP TABLE t_shirts" }))
        .await
        .is_err());
}
