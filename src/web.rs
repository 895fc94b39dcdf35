//! Web form for asking questions.
//!
//! A single page with a text area and a submit button. The agent is built
//! lazily on the first question and shared by every later request; a build
//! that fails is not cached, so the next question tries again.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::OnceCell;

use crate::agent::Agent;
use crate::error::Result;
use crate::query::query_database;

/// Placeholder shown in the empty question box.
pub const PLACEHOLDER: &str = "Example: How many white Nike t-shirts in size M do we have?";

type AgentFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<Agent>> + Send + Sync>;

/// Shared state of the web form.
#[derive(Clone)]
pub struct AppState {
    title: Arc<str>,
    factory: AgentFactory,
    agent: Arc<OnceCell<Arc<Agent>>>,
}

impl AppState {
    /// Creates state whose agent is built by `factory` on first use.
    pub fn new<F, Fut>(title: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Agent>> + Send + 'static,
    {
        let title: String = title.into();
        Self {
            title: title.into(),
            factory: Arc::new(move || -> BoxFuture<'static, Result<Agent>> { Box::pin(factory()) }),
            agent: Arc::new(OnceCell::new()),
        }
    }

    /// Returns the shared agent, building it if needed.
    ///
    /// Concurrent callers wait for a single build.
    pub async fn agent(&self) -> Result<Arc<Agent>> {
        self.agent
            .get_or_try_init(|| async {
                tracing::info!("Building agent");
                (self.factory)().await.map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }
}

#[derive(Debug, Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

/// What the page shows below the form.
enum Outcome<'a> {
    Warning(&'a str),
    Answer(&'a str),
    Error(&'a str),
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask))
        .route("/health", get(health))
        .with_state(state)
}

/// Serves the form on `bind` until Ctrl-C.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {bind}: {e}"))?;
    tracing::info!(address = %bind, "Serving question form");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received SIGINT"),
        Err(e) => tracing::warn!(error = %e, "Could not listen for Ctrl-C"),
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.title, "", None))
}

async fn ask(State(state): State<AppState>, Form(form): Form<AskForm>) -> Html<String> {
    let question = form.question.trim();
    if question.is_empty() {
        return Html(render_page(
            &state.title,
            &form.question,
            Some(Outcome::Warning("Please enter a question!")),
        ));
    }

    let page = match state.agent().await {
        Ok(agent) => {
            let answer = query_database(&agent, question).await;
            render_page(&state.title, &form.question, Some(Outcome::Answer(&answer)))
        }
        Err(e) => {
            tracing::error!("{}: {}", e.category(), e);
            let message = format!("Error: {e}");
            render_page(&state.title, &form.question, Some(Outcome::Error(&message)))
        }
    };
    Html(page)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn render_page(title: &str, question: &str, outcome: Option<Outcome<'_>>) -> String {
    let result = match outcome {
        None => String::new(),
        Some(Outcome::Warning(text)) => {
            format!("<p class=\"warning\">{}</p>", escape_html(text))
        }
        Some(Outcome::Answer(text)) => format!(
            "<h2>Answer:</h2>\n<div class=\"answer\">{}</div>",
            escape_html(text)
        ),
        Some(Outcome::Error(text)) => format!("<p class=\"error\">{}</p>", escape_html(text)),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
textarea {{ width: 100%; min-height: 6rem; }}
.answer {{ white-space: pre-wrap; }}
.warning {{ color: #8a6d00; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>{title}</h1>
<form method="post" action="/ask">
<label for="question">Question:</label>
<textarea id="question" name="question" placeholder="{placeholder}">{question}</textarea>
<button type="submit">Get Answer</button>
</form>
{result}
</body>
</html>
"#,
        title = escape_html(title),
        placeholder = escape_html(PLACEHOLDER),
        question = escape_html(question),
        result = result,
    )
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
