//! db-qa - ask questions about a SQL database in plain English.

use std::sync::Arc;

use db_qa::cli::{Cli, Command};
use db_qa::config::Config;
use db_qa::db::{self, DatabaseClient, MockDatabaseClient};
use db_qa::web::{self, AppState};
use db_qa::{logging, query_database, AgentBuilder, QaError, Result};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {e}");
        }
    }

    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides()?;
    cli.apply_to(&mut config)?;

    if cli.mock_db {
        info!("Using mock database");
    } else {
        info!("Connection: {}", config.database.display_string());
    }

    match cli.command {
        Command::Tables => {
            let db = open_database(&config, cli.mock_db).await?;
            for table in db.list_tables().await? {
                println!("{table}");
            }
            db.close().await
        }
        Command::Ask { question } => {
            let agent = agent_builder(&config, cli.mock_db).build().await?;
            let answer = query_database(&agent, &question.join(" ")).await;
            println!("{answer}");
            Ok(())
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let title = config.server.title.clone();
            let mock_db = cli.mock_db;
            let state = AppState::new(title, move || agent_builder(&config, mock_db).build());

            web::serve(state, &bind)
                .await
                .map_err(|e| QaError::internal(e.to_string()))
        }
    }
}

/// Agent builder for the configuration, with the mock database injected if requested.
fn agent_builder(config: &Config, mock_db: bool) -> AgentBuilder {
    let builder = AgentBuilder::new(config.clone());
    if mock_db {
        builder.with_database(Arc::new(MockDatabaseClient::new()))
    } else {
        builder
    }
}

async fn open_database(config: &Config, mock_db: bool) -> Result<Arc<dyn DatabaseClient>> {
    if mock_db {
        return Ok(Arc::new(MockDatabaseClient::new()));
    }
    match db::connect(&config.database).await {
        Ok(client) => Ok(Arc::from(client)),
        Err(e) => {
            warn!("Database connection failed: {}", e.detail());
            Err(e)
        }
    }
}
