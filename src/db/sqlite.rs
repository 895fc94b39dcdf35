//! SQLite database client implementation.
//!
//! Used for local files and throughout the test suite. The file must already
//! exist; the client never creates a database.

use super::{
    connect_timeout, map_connection_error, with_query_timeout, Column, ColumnInfo,
    DatabaseBackend, DatabaseClient, QueryResult, Row, TableSchema, Value, MAX_ROWS,
};
use crate::config::ConnectionConfig;
use crate::error::{QaError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::Instant;
use tracing::debug;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database file named by `config.database`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        debug!(database = %config.display_string(), "Opening SQLite database");

        let options = SqliteConnectOptions::new()
            .filename(config.database())
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(connect_timeout())
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(e, config))?;

        Ok(Self { pool })
    }

    /// Creates a new SqliteClient from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        with_query_timeout(
            sqlx::query_scalar(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let pragma = format!(
            "PRAGMA table_info({})",
            DatabaseBackend::Sqlite.quote_ident(table)
        );
        // cid, name, type, notnull, dflt_value, pk
        let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
            with_query_timeout(sqlx::query_as(&pragma).fetch_all(&self.pool)).await?;

        if rows.is_empty() {
            return Err(QaError::query(format!("no such table: {table}")));
        }

        let columns = rows
            .into_iter()
            .map(|(_, name, data_type, not_null, _, pk)| Column {
                name,
                data_type,
                is_nullable: not_null == 0 && pk == 0,
                is_primary_key: pk > 0,
            })
            .collect();

        Ok(TableSchema::new(table, columns))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let result = with_query_timeout(sqlx::query(sql).fetch_all(&self.pool)).await?;
        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::from_rows(columns, rows, MAX_ROWS).with_execution_time(execution_time))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single column by storage class: integer, real, text, then blob.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    row.try_get::<Option<Vec<u8>>, _>(index)
        .ok()
        .flatten()
        .map(Value::Bytes)
        .unwrap_or(Value::Null)
}
