//! Database abstraction layer for db-qa.
//!
//! Provides a trait-based interface for the handful of operations the SQL
//! toolkit needs, allowing different database backends to be used
//! interchangeably.

mod mock;
mod mysql;
mod postgres;
mod schema;
mod sqlite;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub(crate) use schema::split_table_names;
pub use schema::{table_info, Column, TableSchema, SAMPLE_ROWS};
pub use sqlite::SqliteClient;
pub(crate) use types::RawDecimal;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::{QaError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Query timeout in seconds.
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum rows to return from a query.
pub const MAX_ROWS: usize = 1000;

/// How long to wait for the single connection to open.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend (0 for file databases).
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::Sqlite => 0,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        self.as_str()
    }

    /// SQL dialect name shown to the model.
    pub fn dialect(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }

    /// Quotes an identifier for this dialect.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opens a connection for the given configuration.
///
/// This is the central factory function for database connections. The
/// returned client holds one connection for its whole lifetime.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    config.validate()?;
    match config.backend {
        DatabaseBackend::MySql => Ok(Box::new(MySqlClient::connect(config).await?)),
        DatabaseBackend::Postgres => Ok(Box::new(PostgresClient::connect(config).await?)),
        DatabaseBackend::Sqlite => Ok(Box::new(SqliteClient::connect(config).await?)),
    }
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with QaError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// The backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Lists the user tables of the connected database, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describes the columns of a single table.
    async fn describe_table(&self, table: &str) -> Result<TableSchema>;

    /// Executes a SQL query and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Runs a sqlx future under the query timeout.
pub(crate) async fn with_query_timeout<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    tokio::time::timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), fut)
        .await
        .map_err(|_| {
            QaError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| QaError::query(format_query_error(&e)))
}

/// Connection acquire timeout shared by the sqlx pools.
pub(crate) fn connect_timeout() -> Duration {
    Duration::from_secs(CONNECT_TIMEOUT_SECS)
}

/// Maps sqlx connection errors to user-friendly connectivity errors.
pub(crate) fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> QaError {
    let host = config.host();
    let port = config.port();
    let user = config.user();
    let database = config.database();

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        QaError::connectivity(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") || error_str.contains("authentication failed") {
        QaError::connectivity(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database")
        || (error_str.contains("does not exist") && error_str.contains("database"))
    {
        QaError::connectivity(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        QaError::connectivity(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        QaError::connectivity(error.to_string())
    }
}

/// Formats a query error, preferring the database's own message.
fn format_query_error(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("({code}) {}", db_error.message()),
            None => db_error.message().to_string(),
        },
        None => error.to_string(),
    }
}
