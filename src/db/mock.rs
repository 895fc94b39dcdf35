//! Mock database clients for testing.
//!
//! `MockDatabaseClient` serves a small in-memory t-shirt store so the whole
//! pipeline can run without a server (`--mock-db`).

use super::{Column, ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, TableSchema, Value};
use crate::error::{QaError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// One mock table: schema plus its rows.
#[derive(Debug, Clone)]
struct MockTable {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
}

/// A mock database client that returns predefined results.
#[derive(Debug, Clone)]
pub struct MockDatabaseClient {
    tables: Vec<MockTable>,
}

impl MockDatabaseClient {
    /// Creates a mock store with `discounts` and `t_shirts` tables.
    pub fn new() -> Self {
        let t_shirts = MockTable {
            schema: TableSchema::new(
                "t_shirts",
                vec![
                    Column::new("t_shirt_id", "int").primary_key(),
                    Column::new("brand", "enum('Van Huesen','Levi','Nike','Adidas')")
                        .not_null(),
                    Column::new("color", "enum('Red','Blue','Black','White')").not_null(),
                    Column::new("size", "enum('XS','S','M','L','XL')").not_null(),
                    Column::new("price", "int"),
                    Column::new("stock_quantity", "int").not_null(),
                ],
            ),
            rows: vec![
                shirt(1, "Nike", "White", "M", 30, 12),
                shirt(2, "Levi", "Blue", "L", 25, 40),
                shirt(3, "Adidas", "Black", "S", 28, 7),
            ],
        };

        let discounts = MockTable {
            schema: TableSchema::new(
                "discounts",
                vec![
                    Column::new("discount_id", "int").primary_key(),
                    Column::new("t_shirt_id", "int").not_null(),
                    Column::new("pct_discount", "decimal(5,2)"),
                ],
            ),
            rows: vec![vec![
                Value::Int(1),
                Value::Int(2),
                Value::Decimal("10.00".into()),
            ]],
        };

        Self {
            tables: vec![discounts, t_shirts],
        }
    }

    /// Creates a mock client with no tables.
    pub fn empty() -> Self {
        Self { tables: Vec::new() }
    }

    fn find(&self, name: &str) -> Option<&MockTable> {
        self.tables.iter().find(|t| t.schema.name == name)
    }
}

fn shirt(id: i64, brand: &str, color: &str, size: &str, price: i64, stock: i64) -> Vec<Value> {
    vec![
        Value::Int(id),
        brand.into(),
        color.into(),
        size.into(),
        Value::Int(price),
        Value::Int(stock),
    ]
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.schema.name.clone()).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        self.find(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| QaError::query(format!("Table '{table}' doesn't exist")))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let sql_upper = sql.trim_start().to_uppercase();
        if !sql_upper.starts_with("SELECT") {
            return Ok(QueryResult::default().with_execution_time(Duration::from_millis(1)));
        }

        // `SELECT * FROM <table> ...` returns the table's rows.
        let from_table = self.tables.iter().find(|t| {
            let quoted = DatabaseBackend::MySql.quote_ident(&t.schema.name);
            sql.contains(&format!("FROM {quoted}"))
                || sql.contains(&format!("FROM {}", t.schema.name))
        });

        let result = match from_table {
            Some(table) => QueryResult::with_data(
                table
                    .schema
                    .columns
                    .iter()
                    .map(|c| ColumnInfo::new(&c.name, &c.data_type))
                    .collect(),
                table.rows.clone(),
            ),
            None => QueryResult::with_data(
                vec![ColumnInfo::new("result", "text")],
                vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            ),
        };

        Ok(result.with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client whose every call fails, for exercising error paths.
#[derive(Debug, Clone)]
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    /// Creates a client failing with the given connectivity message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Err(QaError::connectivity(self.message.clone()))
    }

    async fn describe_table(&self, _table: &str) -> Result<TableSchema> {
        Err(QaError::connectivity(self.message.clone()))
    }

    async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(QaError::connectivity(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_lists_tables() {
        let client = MockDatabaseClient::new();
        let tables = client.list_tables().await.unwrap();
        assert_eq!(tables, vec!["discounts".to_string(), "t_shirts".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_select_from_table() {
        let client = MockDatabaseClient::new();
        let result = client
            .execute_query("SELECT * FROM `t_shirts` LIMIT 3")
            .await
            .unwrap();
        assert_eq!(result.row_count, 3);
        assert_eq!(result.columns.len(), 6);
    }

    #[tokio::test]
    async fn test_mock_select_other() {
        let client = MockDatabaseClient::new();
        let result = client.execute_query("SELECT 1").await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.columns.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_insert() {
        let client = MockDatabaseClient::new();
        let result = client
            .execute_query("INSERT INTO t_shirts VALUES (1)")
            .await
            .unwrap();
        assert_eq!(result.row_count, 0);
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = FailingDatabaseClient::new("connection reset");
        let err = client.list_tables().await.unwrap_err();
        assert_eq!(err.category(), "Connectivity Error");
    }
}
