//! Command-line argument parsing for db-qa.
//!
//! Uses clap to parse CLI arguments. Global flags override whatever the
//! config file and environment set.

use crate::config::{Config, ConnectionConfig};
use crate::error::{QaError, Result};
use crate::llm::LlmProvider;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ask questions about a SQL database in plain English.
#[derive(Parser, Debug)]
#[command(name = "db-qa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// What to do
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database connection string (e.g., mysql://root@localhost:3306/atliq_tshirts)
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,

    /// LLM provider: gemini, openai or mock
    #[arg(long, global = true, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Model name (defaults to the provider's default model)
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Use the built-in mock database instead of connecting
    #[arg(long, global = true)]
    pub mock_db: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the question form over HTTP
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Answer a single question and print the answer
    Ask {
        /// The question, in plain English
        #[arg(required = true, num_args = 1.., value_name = "QUESTION")]
        question: Vec<String>,
    },
    /// List the tables of the configured database
    Tables,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies the global flags on top of `config`.
    ///
    /// Choosing a provider without a model selects the provider's default
    /// model.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(url) = &self.database_url {
            config.database = ConnectionConfig::from_connection_string(url)?;
        }

        if let Some(llm) = &self.llm {
            let provider: LlmProvider = llm.parse().map_err(QaError::config)?;
            config.llm.provider = provider.as_str().to_string();
            if self.model.is_none() {
                config.llm.model = provider.default_model().to_string();
            }
        }

        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }

        Ok(())
    }
}
