//! Table descriptions for the model.
//!
//! Renders each requested table as a `CREATE TABLE` listing followed by a few
//! sample rows, which is what the schema tool hands back to the model.

use super::{ColumnInfo, DatabaseClient, QueryResult};
use crate::error::{QaError, Result};
use serde::Serialize;

/// Number of sample rows shown per table.
pub const SAMPLE_ROWS: usize = 3;

/// A column of a table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared data type.
    pub data_type: String,
    /// Whether NULL is allowed.
    pub is_nullable: bool,
    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

impl Column {
    /// Creates a nullable, non-key column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            is_primary_key: false,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Marks the column as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }
}

/// Column listing of one table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Creates a table schema.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Renders the table as a `CREATE TABLE` statement.
    pub fn to_create_statement(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("\t{} {}", c.name, c.data_type.to_uppercase());
                if !c.is_nullable {
                    line.push_str(" NOT NULL");
                }
                line
            })
            .collect();

        let pk: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect();
        if !pk.is_empty() {
            lines.push(format!("\tPRIMARY KEY ({})", pk.join(", ")));
        }

        format!("CREATE TABLE {} (\n{}\n)", self.name, lines.join(", \n"))
    }
}

/// Describes the given tables: schema plus `SAMPLE_ROWS` sample rows each.
///
/// Every name must be an existing table; unknown names are reported together.
pub async fn table_info(db: &dyn DatabaseClient, tables: &[String]) -> Result<String> {
    let known = db.list_tables().await?;

    let unknown: Vec<&str> = tables
        .iter()
        .filter(|t| !known.iter().any(|k| k == *t))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(QaError::query(format!(
            "table_names {{{}}} not found in database",
            unknown
                .iter()
                .map(|t| format!("'{t}'"))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let mut sections = Vec::with_capacity(tables.len());
    for table in tables {
        let schema = db.describe_table(table).await?;
        let sample_sql = format!(
            "SELECT * FROM {} LIMIT {}",
            db.backend().quote_ident(table),
            SAMPLE_ROWS
        );

        // Header from the schema: an empty result carries no column metadata.
        let mut sample = match db.execute_query(&sample_sql).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(table = %table, error = %e, "Could not fetch sample rows");
                QueryResult::default()
            }
        };
        sample.rows.truncate(SAMPLE_ROWS);
        sample.columns = schema
            .columns
            .iter()
            .map(|c| ColumnInfo::new(&c.name, &c.data_type))
            .collect();

        sections.push(format!(
            "\n{}\n\n/*\n{} rows from {} table:\n{}\n*/",
            schema.to_create_statement(),
            sample.rows.len(),
            table,
            sample.render_tabular()
        ));
    }

    Ok(sections.join("\n\n"))
}

/// Splits a comma-separated list of table names, trimming whitespace and
/// surrounding quotes.
pub(crate) fn split_table_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '`' || c == '"' || c == '\''))
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
