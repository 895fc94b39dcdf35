//! Agent construction.
//!
//! Building an agent resolves the model credential, opens the database
//! connection, probes it by listing tables, binds the SQL toolset to the
//! database and the model, and wraps everything in an [`Agent`]. Every step
//! that can fail does so before the agent exists, so holding an `Agent` means
//! the database answered at least once.

use std::sync::Arc;

use crate::agent::{build_system_prompt, Agent};
use crate::config::Config;
use crate::db::{self, DatabaseClient};
use crate::error::{QaError, Result};
use crate::llm::{create_client, LlmClient, LlmProvider};
use crate::toolkit::SqlToolkit;

/// Builder for a configured [`Agent`].
///
/// Model and database clients may be injected; anything not injected is
/// created from the configuration.
pub struct AgentBuilder {
    config: Config,
    llm: Option<Arc<dyn LlmClient>>,
    db: Option<Arc<dyn DatabaseClient>>,
    top_k: usize,
    max_iterations: usize,
    allow_writes: bool,
}

impl AgentBuilder {
    /// Creates a builder from configuration.
    pub fn new(config: Config) -> Self {
        let top_k = config.agent.top_k;
        let max_iterations = config.agent.max_iterations;
        let allow_writes = config.agent.allow_writes;
        Self {
            config,
            llm: None,
            db: None,
            top_k,
            max_iterations,
            allow_writes,
        }
    }

    /// Uses `llm` instead of creating a client from configuration.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Uses `db` instead of connecting with the configured descriptor.
    pub fn with_database(mut self, db: Arc<dyn DatabaseClient>) -> Self {
        self.db = Some(db);
        self
    }

    /// Row limit the model is asked to respect.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Maximum model round trips per question.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Lets the query tool run data-modifying statements.
    pub fn allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    /// Builds the agent.
    ///
    /// # Errors
    ///
    /// - `Config` if the credential is missing or the provider is unknown.
    ///   Nothing is sent over the network in that case.
    /// - `Connectivity` if the database cannot be opened or the table
    ///   listing probe fails.
    /// - `Construction` if the toolset comes back empty.
    pub async fn build(self) -> Result<Agent> {
        let llm = match self.llm {
            Some(llm) => llm,
            None => create_llm(&self.config)?,
        };

        let db = match self.db {
            Some(db) => db,
            None => open_database(&self.config).await?,
        };

        match db.list_tables().await {
            Ok(tables) => {
                tracing::info!("Database connection successful");
                tracing::info!("Tables in database: {:?}", tables);
            }
            Err(e) => {
                tracing::error!("Database connection failed: {}", e.detail());
                return Err(QaError::connectivity(e.detail()));
            }
        }

        let toolkit = SqlToolkit::new(Arc::clone(&db), Arc::clone(&llm))
            .allow_writes(self.allow_writes);
        let tools = toolkit.tools();
        if tools.is_empty() {
            return Err(QaError::construction("SQL toolkit returned no tools"));
        }

        let prompt = build_system_prompt(db.backend().dialect(), self.top_k);
        let agent = Agent::new(llm, tools, prompt).with_max_iterations(self.max_iterations);

        tracing::info!(tools = ?agent.tool_names(), "Agent created successfully");
        Ok(agent)
    }
}

/// Builds an agent from configuration alone.
pub async fn build_agent(config: &Config) -> Result<Agent> {
    AgentBuilder::new(config.clone()).build().await
}

/// Resolves the configured provider and the model to ask it for.
fn llm_selection(config: &Config) -> Result<(LlmProvider, &str)> {
    let provider: LlmProvider = config.llm.provider.parse().map_err(QaError::config)?;
    Ok((provider, config.llm.model_for(provider)))
}

/// Creates the model client named by the configuration.
fn create_llm(config: &Config) -> Result<Arc<dyn LlmClient>> {
    let (provider, model) = llm_selection(config)?;

    tracing::debug!(provider = %provider, model, "Creating LLM client");
    create_client(
        provider,
        model,
        config.llm.api_key.clone(),
        config.llm.timeout_secs,
    )
}

/// Opens the configured database, logging the cause on failure.
async fn open_database(config: &Config) -> Result<Arc<dyn DatabaseClient>> {
    tracing::debug!(database = %config.database.display_string(), "Connecting");
    match db::connect(&config.database).await {
        Ok(client) => Ok(Arc::from(client)),
        Err(e) => {
            tracing::error!("Database connection failed: {}", e.detail());
            Err(e)
        }
    }
}
