//! SQL tools against a real SQLite database.

use std::sync::Arc;

use db_qa::config::ConnectionConfig;
use db_qa::db::{self, DatabaseClient};
use db_qa::llm::MockLlmClient;
use db_qa::toolkit::{SqlToolkit, Tool, LIST_TABLES, QUERY, QUERY_CHECKER, SCHEMA};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::common::seeded_store;

async fn open(connection: &ConnectionConfig) -> Arc<dyn DatabaseClient> {
    Arc::from(db::connect(connection).await.unwrap())
}

fn find(toolkit: &SqlToolkit, name: &str) -> Arc<dyn Tool> {
    toolkit
        .tools()
        .into_iter()
        .find(|t| t.name() == name)
        .unwrap()
}

fn toolkit(db: Arc<dyn DatabaseClient>) -> SqlToolkit {
    SqlToolkit::new(db, Arc::new(MockLlmClient::new()))
}

#[tokio::test]
async fn test_list_tables() {
    let (_dir, connection) = seeded_store().await;
    let toolkit = toolkit(open(&connection).await);

    let result = find(&toolkit, LIST_TABLES).call(json!({})).await.unwrap();
    assert_eq!(result, "discounts, t_shirts");
}

#[tokio::test]
async fn test_schema_shows_columns_and_samples() {
    let (_dir, connection) = seeded_store().await;
    let toolkit = toolkit(open(&connection).await);

    let result = find(&toolkit, SCHEMA)
        .call(json!({ "table_names": "t_shirts" }))
        .await
        .unwrap();

    assert!(result.contains("CREATE TABLE t_shirts ("));
    assert!(result.contains("\tbrand TEXT NOT NULL"));
    assert!(result.contains("PRIMARY KEY (t_shirt_id)"));
    assert!(result.contains("3 rows from t_shirts table:"));
    assert!(result.contains("Adidas"));
    // Only three sample rows are shown.
    assert!(!result.contains("Levi"));
}

#[tokio::test]
async fn test_schema_unknown_table() {
    let (_dir, connection) = seeded_store().await;
    let toolkit = toolkit(open(&connection).await);

    let err = find(&toolkit, SCHEMA)
        .call(json!({ "table_names": "t_shirts, hoodies" }))
        .await
        .unwrap_err();
    assert!(err.detail().contains("'hoodies'"));
}

#[tokio::test]
async fn test_query_aggregates() {
    let (_dir, connection) = seeded_store().await;
    let toolkit = toolkit(open(&connection).await);

    let result = find(&toolkit, QUERY)
        .call(json!({
            "query": "SELECT SUM(stock_quantity) FROM t_shirts \
                      WHERE brand = 'Nike' AND color = 'White' AND size = 'M'"
        }))
        .await
        .unwrap();
    assert_eq!(result, "[(40,)]");
}

#[tokio::test]
async fn test_query_empty_result_is_empty_string() {
    let (_dir, connection) = seeded_store().await;
    let toolkit = toolkit(open(&connection).await);

    let result = find(&toolkit, QUERY)
        .call(json!({ "query": "SELECT brand FROM t_shirts WHERE size = 'XS'" }))
        .await
        .unwrap();
    assert_eq!(result, "");
}

#[tokio::test]
async fn test_query_refuses_writes_and_leaves_data_alone() {
    let (_dir, connection) = seeded_store().await;
    let db = open(&connection).await;
    let toolkit = toolkit(Arc::clone(&db));

    let err = find(&toolkit, QUERY)
        .call(json!({ "query": "DELETE FROM t_shirts" }))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Query Error");

    let count = db.execute_query("SELECT COUNT(*) FROM t_shirts").await.unwrap();
    assert_eq!(count.render_for_llm(), "[(4,)]");
}

#[tokio::test]
async fn test_query_writes_when_allowed() {
    let (_dir, connection) = seeded_store().await;
    let db = open(&connection).await;
    let toolkit = toolkit(Arc::clone(&db)).allow_writes(true);

    find(&toolkit, QUERY)
        .call(json!({ "query": "DELETE FROM discounts" }))
        .await
        .unwrap();

    let count = db.execute_query("SELECT COUNT(*) FROM discounts").await.unwrap();
    assert_eq!(count.render_for_llm(), "[(0,)]");
}

#[tokio::test]
async fn test_query_error_is_reported() {
    let (_dir, connection) = seeded_store().await;
    let toolkit = toolkit(open(&connection).await);

    let err = find(&toolkit, QUERY)
        .call(json!({ "query": "SELECT hue FROM t_shirts" }))
        .await
        .unwrap_err();
    assert!(err.detail().contains("no such column"));
}

#[tokio::test]
async fn test_query_checker_uses_model() {
    let (_dir, connection) = seeded_store().await;
    let llm = MockLlmClient::new().with_response(
        "double check",
        "```sql\nSELECT brand FROM t_shirts LIMIT 10\n```",
    );
    let toolkit = SqlToolkit::new(open(&connection).await, Arc::new(llm));

    let result = find(&toolkit, QUERY_CHECKER)
        .call(json!({ "query": "SELECT brand FROM t_shirts" }))
        .await
        .unwrap();
    assert_eq!(result, "SELECT brand FROM t_shirts LIMIT 10");
}
