//! The question form served by axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use db_qa::config::ConnectionConfig;
use db_qa::db::MockDatabaseClient;
use db_qa::llm::{LlmResponse, MockLlmClient};
use db_qa::web::{router, AppState, PLACEHOLDER};
use db_qa::{Agent, AgentBuilder, QaError};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::common::mock_config;

const TITLE: &str = "AtliQ T Shirts: Database Q&A";

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn ask(question: &str) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("question", question)
        .finish();
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

/// State building an agent over the mock database and mock model, counting builds.
fn mock_state(builds: Arc<AtomicUsize>) -> AppState {
    AppState::new(TITLE, move || {
        builds.fetch_add(1, Ordering::SeqCst);
        AgentBuilder::new(mock_config(ConnectionConfig::default()))
            .with_database(Arc::new(MockDatabaseClient::new()))
            .build()
    })
}

#[tokio::test]
async fn test_index_renders_form() {
    let state = mock_state(Arc::new(AtomicUsize::new(0)));
    let response = router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<h1>AtliQ T Shirts: Database Q&amp;A</h1>"));
    assert!(html.contains(PLACEHOLDER));
    assert!(html.contains("Get Answer"));
}

#[tokio::test]
async fn test_empty_question_warns_without_building() {
    let builds = Arc::new(AtomicUsize::new(0));
    let state = mock_state(Arc::clone(&builds));

    let response = router(state).oneshot(ask("   ")).await.unwrap();
    let html = body_text(response).await;

    assert!(html.contains("Please enter a question!"));
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_answer_is_escaped() {
    let state = AppState::new(TITLE, || {
        AgentBuilder::new(mock_config(ConnectionConfig::default()))
            .with_database(Arc::new(MockDatabaseClient::new()))
            .with_llm(Arc::new(MockLlmClient::scripted(vec![LlmResponse::text(
                "<b>40</b> shirts",
            )])))
            .build()
    });

    let html = body_text(router(state).oneshot(ask("How many?")).await.unwrap()).await;
    assert!(html.contains("<h2>Answer:</h2>"));
    assert!(html.contains("&lt;b&gt;40&lt;/b&gt; shirts"));
    assert!(!html.contains("<b>40</b>"));
}

#[tokio::test]
async fn test_agent_is_built_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let state = mock_state(Arc::clone(&builds));
    let app = router(state);

    for _ in 0..3 {
        let html = body_text(app.clone().oneshot(ask("How many?")).await.unwrap()).await;
        assert!(html.contains("The database contains these tables: discounts, t_shirts"));
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_first_requests_share_one_build() {
    let builds = Arc::new(AtomicUsize::new(0));
    let state = mock_state(Arc::clone(&builds));

    let first = state.clone();
    let second = state.clone();
    let (a, b) = tokio::join!(first.agent(), second.agent());

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_build_is_shown_and_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let state = AppState::new(TITLE, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            Err::<Agent, _>(QaError::config(
                "GOOGLE_API_KEY not found in environment variables",
            ))
        }
    });
    let app = router(state);

    let html = body_text(app.clone().oneshot(ask("How many?")).await.unwrap()).await;
    assert!(html.contains(
        "Error: Configuration error: GOOGLE_API_KEY not found in environment variables"
    ));

    app.oneshot(ask("How many?")).await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_health() {
    let state = mock_state(Arc::new(AtomicUsize::new(0)));
    let response = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
}
