//! The tool-calling loop end to end over SQLite, with a scripted model.

use std::sync::Arc;

use db_qa::agent::{AgentRequest, MessageContent};
use db_qa::llm::{LlmResponse, MockLlmClient, Role, ToolCall};
use db_qa::{query_database, AgentBuilder};
use pretty_assertions::assert_eq;

use super::common::{mock_config, seeded_store};

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

fn white_nike_script() -> Vec<LlmResponse> {
    let sql = "SELECT SUM(stock_quantity) FROM t_shirts \
               WHERE brand = 'Nike' AND color = 'White' AND size = 'M'";
    vec![
        LlmResponse::with_tool_calls(
            "",
            vec![call("1", "sql_db_list_tables", serde_json::json!({}))],
        ),
        LlmResponse::with_tool_calls(
            "",
            vec![call(
                "2",
                "sql_db_schema",
                serde_json::json!({ "table_names": "t_shirts" }),
            )],
        ),
        LlmResponse::with_tool_calls(
            "Checking the query first.",
            vec![call("3", "sql_db_query", serde_json::json!({ "query": sql }))],
        ),
        LlmResponse::text("We have 40 white Nike t-shirts in size M."),
    ]
}

#[tokio::test]
async fn test_scripted_question_runs_every_tool() {
    let (_dir, connection) = seeded_store().await;
    let llm = Arc::new(MockLlmClient::scripted(white_nike_script()));
    let agent = AgentBuilder::new(mock_config(connection))
        .with_llm(llm.clone())
        .build()
        .await
        .unwrap();

    let response = agent
        .invoke(AgentRequest::user(
            "How many white Nike t-shirts in size M do we have?",
        ))
        .await
        .unwrap();

    // user + 3 x (assistant, tool) + final answer
    assert_eq!(response.messages.len(), 8);
    assert_eq!(response.messages[0].role, Role::User);
    assert_eq!(response.messages[2].content.to_text(), "discounts, t_shirts");
    assert!(response.messages[4]
        .content
        .to_text()
        .contains("CREATE TABLE t_shirts"));
    assert_eq!(response.messages[6].content.to_text(), "[(40,)]");

    match &response.messages[5].content {
        MessageContent::Blocks(blocks) => {
            assert_eq!(blocks[0].text.as_deref(), Some("Checking the query first."));
            assert_eq!(blocks[1].name.as_deref(), Some("sql_db_query"));
        }
        other => panic!("expected blocks, got {other:?}"),
    }

    let last = response.messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(
        last.content,
        MessageContent::Text("We have 40 white Nike t-shirts in size M.".to_string())
    );
    assert_eq!(llm.call_count(), 4);
}

#[tokio::test]
async fn test_query_database_returns_final_text() {
    let (_dir, connection) = seeded_store().await;
    let agent = AgentBuilder::new(mock_config(connection))
        .with_llm(Arc::new(MockLlmClient::scripted(white_nike_script())))
        .build()
        .await
        .unwrap();

    assert_eq!(
        query_database(&agent, "How many white Nike t-shirts in size M do we have?").await,
        "We have 40 white Nike t-shirts in size M."
    );
}

#[tokio::test]
async fn test_iteration_limit_becomes_error_text() {
    let (_dir, connection) = seeded_store().await;
    let looping = (0..5)
        .map(|i| {
            LlmResponse::with_tool_calls(
                "",
                vec![call(&i.to_string(), "sql_db_list_tables", serde_json::json!({}))],
            )
        })
        .collect();
    let agent = AgentBuilder::new(mock_config(connection))
        .with_llm(Arc::new(MockLlmClient::scripted(looping)))
        .max_iterations(3)
        .build()
        .await
        .unwrap();

    assert_eq!(
        query_database(&agent, "Loop forever").await,
        "Error querying database: Agent stopped after 3 iterations without a final answer"
    );
}

#[tokio::test]
async fn test_response_round_trips_through_json() {
    let (_dir, connection) = seeded_store().await;
    let agent = AgentBuilder::new(mock_config(connection))
        .build()
        .await
        .unwrap();

    let response = agent.invoke(AgentRequest::user("Tables?")).await.unwrap();
    let json = serde_json::to_string(&response).unwrap();
    let decoded: db_qa::AgentResponse = serde_json::from_str(&json).unwrap();

    assert_eq!(
        db_qa::extract_answer(&decoded).unwrap(),
        "The database contains these tables: discounts, t_shirts"
    );
}
