//! Agent construction against real database files.

use std::sync::Arc;

use db_qa::config::{Config, ConnectionConfig};
use db_qa::db::DatabaseBackend;
use db_qa::llm::FailingLlmClient;
use db_qa::{build_agent, query_database, AgentBuilder};

use super::common::{mock_config, seeded_store};

#[tokio::test]
async fn test_build_against_sqlite() {
    let (_dir, connection) = seeded_store().await;
    let agent = build_agent(&mock_config(connection)).await.unwrap();

    assert_eq!(
        agent.tool_names(),
        vec![
            "sql_db_query",
            "sql_db_schema",
            "sql_db_list_tables",
            "sql_db_query_checker"
        ]
    );
    assert!(agent.system_prompt().contains("SQLite"));
}

#[tokio::test]
async fn test_built_agent_answers() {
    let (_dir, connection) = seeded_store().await;
    let agent = build_agent(&mock_config(connection)).await.unwrap();

    let answer = query_database(&agent, "Which tables do we have?").await;
    assert_eq!(answer, "The database contains these tables: discounts, t_shirts");

    // The agent is reusable across questions.
    let again = query_database(&agent, "And now?").await;
    assert_eq!(again, answer);
}

#[tokio::test]
async fn test_missing_credential_fails_before_connecting() {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        eprintln!("Skipping test: OPENAI_API_KEY is set");
        return;
    }

    let mut config = Config::default();
    config.llm.provider = "openai".to_string();
    config.database = ConnectionConfig {
        backend: DatabaseBackend::Sqlite,
        database: Some("/nonexistent/dir/store.db".to_string()),
        ..Default::default()
    };

    let err = build_agent(&config).await.unwrap_err();
    assert_eq!(err.category(), "Configuration Error");
    assert_eq!(err.detail(), "OPENAI_API_KEY not found in environment variables");
}

#[tokio::test]
async fn test_missing_sqlite_file_is_connectivity_error() {
    let dir = tempfile::tempdir().unwrap();
    let connection = ConnectionConfig {
        backend: DatabaseBackend::Sqlite,
        database: Some(dir.path().join("missing.db").to_string_lossy().into_owned()),
        ..Default::default()
    };

    let err = build_agent(&mock_config(connection)).await.unwrap_err();
    assert_eq!(err.category(), "Connectivity Error");
}

#[tokio::test]
async fn test_unreachable_server_is_connectivity_error() {
    let connection = ConnectionConfig {
        backend: DatabaseBackend::MySql,
        host: Some("127.0.0.1".to_string()),
        port: Some(1),
        ..Default::default()
    };

    let err = build_agent(&mock_config(connection)).await.unwrap_err();
    assert_eq!(err.category(), "Connectivity Error");
}

#[tokio::test]
async fn test_model_failure_becomes_error_text() {
    let (_dir, connection) = seeded_store().await;
    let agent = AgentBuilder::new(mock_config(connection))
        .with_llm(Arc::new(FailingLlmClient::new("Rate limited. Please wait.")))
        .build()
        .await
        .unwrap();

    assert_eq!(
        query_database(&agent, "How many white Nike shirts?").await,
        "Error querying database: Rate limited. Please wait."
    );
}
