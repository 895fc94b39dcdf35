//! SQL tools exposed to the model.
//!
//! `SqlToolkit` binds a database client and a model client together and hands
//! out the four tools the agent can call: list tables, describe tables, run a
//! query and double-check a query.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::db::{split_table_names, table_info, DatabaseClient};
use crate::error::{QaError, Result};
use crate::llm::{extract_sql, LlmClient, Message, ToolDefinition};
use crate::safety::ensure_read_only;

/// Name of the table listing tool.
pub const LIST_TABLES: &str = "sql_db_list_tables";
/// Name of the schema tool.
pub const SCHEMA: &str = "sql_db_schema";
/// Name of the query tool.
pub const QUERY: &str = "sql_db_query";
/// Name of the query checker tool.
pub const QUERY_CHECKER: &str = "sql_db_query_checker";

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &'static str;

    /// What the tool does and when to use it.
    fn description(&self) -> String;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Runs the tool with the given arguments.
    async fn call(&self, args: Value) -> Result<String>;

    /// Declaration sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

/// Toolset bound to one database and one model.
pub struct SqlToolkit {
    db: Arc<dyn DatabaseClient>,
    llm: Arc<dyn LlmClient>,
    allow_writes: bool,
}

impl SqlToolkit {
    /// Creates a toolkit. Write statements are refused by default.
    pub fn new(db: Arc<dyn DatabaseClient>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            db,
            llm,
            allow_writes: false,
        }
    }

    /// Lets the query tool run data-modifying statements.
    pub fn allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    /// Returns the bound tools.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(QueryTool {
                db: Arc::clone(&self.db),
                allow_writes: self.allow_writes,
            }),
            Arc::new(SchemaTool {
                db: Arc::clone(&self.db),
            }),
            Arc::new(ListTablesTool {
                db: Arc::clone(&self.db),
            }),
            Arc::new(QueryCheckerTool {
                db: Arc::clone(&self.db),
                llm: Arc::clone(&self.llm),
            }),
        ]
    }
}

/// Reads a required string argument.
fn string_arg(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| QaError::query(format!("missing required argument '{key}'")))
}

fn single_string_schema(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: {
                "type": "string",
                "description": description
            }
        },
        "required": [key]
    })
}

/// Lists the tables of the database.
struct ListTablesTool {
    db: Arc<dyn DatabaseClient>,
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &'static str {
        LIST_TABLES
    }

    fn description(&self) -> String {
        "Returns a comma-separated list of the tables in the database. Takes no input.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _args: Value) -> Result<String> {
        Ok(self.db.list_tables().await?.join(", "))
    }
}

/// Describes tables: columns plus sample rows.
struct SchemaTool {
    db: Arc<dyn DatabaseClient>,
}

#[async_trait]
impl Tool for SchemaTool {
    fn name(&self) -> &'static str {
        SCHEMA
    }

    fn description(&self) -> String {
        format!(
            "Returns the schema and sample rows of the given tables. Input is a \
             comma-separated list of table names, e.g. 'table1, table2'. Call {LIST_TABLES} \
             first to be sure the tables exist."
        )
    }

    fn parameters(&self) -> Value {
        single_string_schema("table_names", "Comma-separated list of table names")
    }

    async fn call(&self, args: Value) -> Result<String> {
        let tables = split_table_names(&string_arg(&args, "table_names")?);
        if tables.is_empty() {
            return Err(QaError::query("no table names given"));
        }
        table_info(self.db.as_ref(), &tables).await
    }
}

/// Runs a SQL query and returns the rows.
struct QueryTool {
    db: Arc<dyn DatabaseClient>,
    allow_writes: bool,
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &'static str {
        QUERY
    }

    fn description(&self) -> String {
        format!(
            "Runs a detailed and correct SQL query against the database and returns the \
             result. If the query is not correct an error message is returned; rewrite the \
             query, check it, and try again. If you get an unknown column error, call \
             {SCHEMA} to see the correct table fields."
        )
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "The SQL query to run")
    }

    async fn call(&self, args: Value) -> Result<String> {
        let query = string_arg(&args, "query")?;
        if !self.allow_writes {
            ensure_read_only(&query, self.db.backend())?;
        }

        let result = self.db.execute_query(&query).await?;
        tracing::debug!(
            rows = result.row_count,
            truncated = result.was_truncated,
            duration_ms = result.execution_time.as_millis(),
            "Query tool finished"
        );
        Ok(result.render_for_llm())
    }
}

/// Asks the model to double-check a query before it is run.
struct QueryCheckerTool {
    db: Arc<dyn DatabaseClient>,
    llm: Arc<dyn LlmClient>,
}

impl QueryCheckerTool {
    fn prompt(&self, query: &str) -> String {
        format!(
            "```sql\n{query}\n```\n\
             Double check the {dialect} query above for common mistakes, including:\n\
             - Using NOT IN with NULL values\n\
             - Using UNION when UNION ALL should have been used\n\
             - Using BETWEEN for exclusive ranges\n\
             - Data type mismatch in predicates\n\
             - Properly quoting identifiers\n\
             - Using the correct number of arguments for functions\n\
             - Casting to the correct data type\n\
             - Using the proper columns for joins\n\n\
             If there are any of the above mistakes, rewrite the query. If there are no \
             mistakes, just reproduce the original query.\n\n\
             Output the final SQL query only.",
            dialect = self.db.backend().dialect()
        )
    }
}

#[async_trait]
impl Tool for QueryCheckerTool {
    fn name(&self) -> &'static str {
        QUERY_CHECKER
    }

    fn description(&self) -> String {
        format!(
            "Double checks whether a SQL query is correct before running it. Always call \
             this before executing a query with {QUERY}."
        )
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "The SQL query to check")
    }

    async fn call(&self, args: Value) -> Result<String> {
        let query = string_arg(&args, "query")?;
        let messages = [Message::user(self.prompt(&query))];
        let response = self.llm.complete(&messages).await?;
        Ok(extract_sql(&response))
    }
}
