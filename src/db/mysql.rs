//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient` trait
//! for MySQL and MariaDB using sqlx. The pool holds a single connection.

use super::{
    connect_timeout, map_connection_error, with_query_timeout, Column, ColumnInfo,
    DatabaseBackend, DatabaseClient, QueryResult, RawDecimal, Row, TableSchema, Value, MAX_ROWS,
};
use crate::config::ConnectionConfig;
use crate::error::{QaError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::Instant;
use tracing::debug;

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Opens a connection described by `config`.
    ///
    /// A failed attempt is reported once; there is no retry.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        debug!(database = %config.display_string(), "Connecting to MySQL");

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(connect_timeout())
            .connect(&conn_str)
            .await
            .map_err(|e| map_connection_error(e, config))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = with_query_timeout(sqlx::query("SHOW TABLES").fetch_all(&self.pool)).await?;

        let mut tables: Vec<String> = rows
            .iter()
            .filter_map(|row| match convert_value(row, 0, "VARCHAR") {
                Value::String(name) => Some(name),
                Value::Bytes(bytes) => String::from_utf8(bytes).ok(),
                _ => None,
            })
            .collect();
        tables.sort();
        Ok(tables)
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let rows: Vec<(String, String, String, String)> = with_query_timeout(
            sqlx::query_as(
                r#"
                SELECT
                    CAST(column_name AS CHAR),
                    CAST(column_type AS CHAR),
                    CAST(is_nullable AS CHAR),
                    CAST(column_key AS CHAR)
                FROM information_schema.columns
                WHERE table_schema = DATABASE() AND table_name = ?
                ORDER BY ordinal_position
                "#,
            )
            .bind(table)
            .fetch_all(&self.pool),
        )
        .await?;

        if rows.is_empty() {
            return Err(QaError::query(format!("Table '{table}' doesn't exist")));
        }

        let columns = rows
            .into_iter()
            .map(|(name, data_type, is_nullable, key)| Column {
                name,
                data_type,
                is_nullable: is_nullable == "YES",
                is_primary_key: key == "PRI",
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
        debug!(rows = rows.len(), elapsed = ?execution_time, "Query executed");

        Ok(QueryResult::from_rows(columns, rows, MAX_ROWS).with_execution_time(execution_time))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx MySqlRow to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a MySqlRow to our Value type.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let type_name = type_name.to_uppercase();
    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        t if t.ends_with("UNSIGNED") => row
            .try_get::<Option<u64>, _>(index)
            .ok()
            .flatten()
            .map(|v| i64::try_from(v).map_or_else(|_| Value::String(v.to_string()), Value::Int))
            .unwrap_or(Value::Null),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "DECIMAL" | "NUMERIC" => row
            .try_get::<Option<RawDecimal>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::Decimal(d.0))
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),

        "DATETIME" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.naive_utc().to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),

        t if t.contains("BLOB") || t.contains("BINARY") => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // Text, ENUM, SET and anything else with a textual wire form.
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.map(Value::String).unwrap_or(Value::Null),
            Err(_) => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(index)
                .ok()
                .flatten()
                .map(|bytes| match String::from_utf8(bytes) {
                    Ok(s) => Value::String(s),
                    Err(e) => Value::Bytes(e.into_bytes()),
                })
                .unwrap_or(Value::Null),
        },
    }
}
