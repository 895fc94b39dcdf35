//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the dialect of the connected backend to parse SQL
//! and classify statements by their safety level.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use crate::db::DatabaseBackend;
use crate::error::{QaError, Result};

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL queries.
pub struct SqlClassifier {
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl std::fmt::Debug for SqlClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlClassifier").finish_non_exhaustive()
    }
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new(DatabaseBackend::default())
    }
}

impl SqlClassifier {
    /// Creates a classifier parsing with the dialect of `backend`.
    pub fn new(backend: DatabaseBackend) -> Self {
        let dialect: Box<dyn Dialect + Send + Sync> = match backend {
            DatabaseBackend::MySql => Box::new(MySqlDialect {}),
            DatabaseBackend::Postgres => Box::new(PostgreSqlDialect {}),
            DatabaseBackend::Sqlite => Box::new(SQLiteDialect {}),
        };
        Self { dialect }
    }

    /// Classifies a SQL string and returns the classification result.
    ///
    /// SQL that cannot be parsed is treated as destructive with a warning
    /// carrying the parse error.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let statements = match Parser::parse_sql(self.dialect.as_ref(), sql) {
            Ok(statements) => statements,
            Err(e) => {
                return ClassificationResult::with_warning(
                    SafetyLevel::Destructive,
                    StatementType::Unknown,
                    format!("Could not parse SQL: {}", e),
                )
            }
        };

        match statements.as_slice() {
            [] => ClassificationResult::with_warning(
                SafetyLevel::Destructive,
                StatementType::Unknown,
                "Empty SQL statement",
            ),
            [single] => {
                let (level, stmt_type) = classify_statement(single);
                ClassificationResult::new(level, stmt_type)
            }
            many => {
                // Multiple statements: use the most dangerous classification
                let (level, stmt_type) = many
                    .iter()
                    .map(classify_statement)
                    .fold((SafetyLevel::Safe, StatementType::Unknown), most_dangerous);
                ClassificationResult::new(level, StatementType::Multiple(Box::new(stmt_type)))
            }
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str, backend: DatabaseBackend) -> ClassificationResult {
    SqlClassifier::new(backend).classify(sql)
}

/// Fails unless `sql` consists only of read-only statements.
pub fn ensure_read_only(sql: &str, backend: DatabaseBackend) -> Result<()> {
    let result = classify_sql(sql, backend);
    if result.level.is_read_only() {
        return Ok(());
    }

    let mut message = format!(
        "{} statements are not allowed; only read-only queries may be run",
        result.statement_type
    );
    if let Some(warning) = result.warning {
        message.push_str(&format!(" ({})", warning));
    }
    Err(QaError::query(message))
}

/// Keeps whichever classification is more dangerous; ties keep the first.
fn most_dangerous(
    current: (SafetyLevel, StatementType),
    candidate: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if candidate.0 > current.0 || current.1 == StatementType::Unknown {
        candidate
    } else {
        current
    }
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE executes the query
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ExplainTable { .. } => (SafetyLevel::Safe, StatementType::Describe),
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => (SafetyLevel::Safe, StatementType::Show),

        // Mutating: data modification
        Statement::Insert { .. } => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        // Destructive: data loss or schema changes
        Statement::Delete { .. } => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Truncate),
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::AlterRole { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateRole { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::Grant { .. } => (SafetyLevel::Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (SafetyLevel::Destructive, StatementType::Revoke),

        // Conservative default: treat unknown statements as destructive
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Query by recursively inspecting for data-modifying operations.
fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let mut max = (SafetyLevel::Safe, StatementType::Select);

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            max = most_dangerous_strict(max, classify_query(&cte.query));
        }
    }

    most_dangerous_strict(max, classify_set_expr(&query.body))
}

/// Like `most_dangerous`, but only a strictly higher level replaces `current`.
fn most_dangerous_strict(
    current: (SafetyLevel, StatementType),
    candidate: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if candidate.0 > current.0 {
        candidate
    } else {
        current
    }
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Select(select) => classify_select(select),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous_strict(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => (SafetyLevel::Safe, StatementType::Select),
        // Data-modifying CTE bodies (DELETE ... RETURNING and friends)
        SetExpr::Insert(stmt)
        | SetExpr::Update(stmt)
        | SetExpr::Delete(stmt)
        | SetExpr::Merge(stmt) => classify_statement(stmt),
    }
}

/// Classifies a Select by checking its FROM clause for subqueries.
fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    select
        .from
        .iter()
        .map(classify_table_with_joins)
        .fold((SafetyLevel::Safe, StatementType::Select), most_dangerous_strict)
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    twj.joins
        .iter()
        .map(|join| classify_table_factor(&join.relation))
        .fold(classify_table_factor(&twj.relation), most_dangerous_strict)
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_classification(
        sql: &str,
        backend: DatabaseBackend,
        expected_level: SafetyLevel,
        expected_type: StatementType,
    ) {
        let result = classify_sql(sql, backend);
        assert_eq!(
            result.level, expected_level,
            "SQL: '{}' - expected level {:?}, got {:?}",
            sql, expected_level, result.level
        );
        assert_eq!(
            result.statement_type, expected_type,
            "SQL: '{}' - expected type {:?}, got {:?}",
            sql, expected_type, result.statement_type
        );
    }

    #[test]
    fn test_select_is_safe() {
        assert_classification(
            "SELECT SUM(stock_quantity) FROM t_shirts WHERE brand = 'Nike' AND color = 'White' AND size = 'M'",
            DatabaseBackend::MySql,
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_select_with_join_and_subquery_is_safe() {
        assert_classification(
            "SELECT t.brand, d.pct_discount FROM t_shirts t \
             JOIN (SELECT * FROM discounts) d ON t.t_shirt_id = d.t_shirt_id",
            DatabaseBackend::MySql,
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_mysql_backticks_parse() {
        assert_classification(
            "SELECT `brand` FROM `t_shirts` LIMIT 3",
            DatabaseBackend::MySql,
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_show_and_describe_are_safe() {
        assert_classification(
            "SHOW TABLES",
            DatabaseBackend::MySql,
            SafetyLevel::Safe,
            StatementType::Show,
        );
        assert_classification(
            "DESCRIBE t_shirts",
            DatabaseBackend::MySql,
            SafetyLevel::Safe,
            StatementType::Describe,
        );
    }

    #[test]
    fn test_explain_is_safe() {
        assert_classification(
            "EXPLAIN SELECT * FROM t_shirts",
            DatabaseBackend::Postgres,
            SafetyLevel::Safe,
            StatementType::Explain,
        );
    }

    #[test]
    fn test_explain_analyze_delete_is_destructive() {
        assert_classification(
            "EXPLAIN ANALYZE DELETE FROM t_shirts",
            DatabaseBackend::Postgres,
            SafetyLevel::Destructive,
            StatementType::Explain,
        );
    }

    #[test]
    fn test_insert_and_update_are_mutating() {
        assert_classification(
            "INSERT INTO discounts (t_shirt_id, pct_discount) VALUES (1, 10.00)",
            DatabaseBackend::MySql,
            SafetyLevel::Mutating,
            StatementType::Insert,
        );
        assert_classification(
            "UPDATE t_shirts SET price = 20 WHERE t_shirt_id = 1",
            DatabaseBackend::MySql,
            SafetyLevel::Mutating,
            StatementType::Update,
        );
    }

    #[test]
    fn test_destructive_statements() {
        assert_classification(
            "DELETE FROM discounts",
            DatabaseBackend::MySql,
            SafetyLevel::Destructive,
            StatementType::Delete,
        );
        assert_classification(
            "DROP TABLE t_shirts",
            DatabaseBackend::Sqlite,
            SafetyLevel::Destructive,
            StatementType::Drop,
        );
        assert_classification(
            "ALTER TABLE t_shirts ADD COLUMN note TEXT",
            DatabaseBackend::Postgres,
            SafetyLevel::Destructive,
            StatementType::Alter,
        );
        assert_classification(
            "CREATE TABLE scratch (id INT)",
            DatabaseBackend::Sqlite,
            SafetyLevel::Destructive,
            StatementType::Create,
        );
    }

    #[test]
    fn test_cte_select_is_safe() {
        assert_classification(
            "WITH nike AS (SELECT * FROM t_shirts WHERE brand = 'Nike') SELECT COUNT(*) FROM nike",
            DatabaseBackend::Postgres,
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_data_modifying_cte_is_not_safe() {
        let result = classify_sql(
            "WITH d AS (DELETE FROM discounts RETURNING *) SELECT * FROM d",
            DatabaseBackend::Postgres,
        );
        assert_eq!(result.level, SafetyLevel::Destructive);

        let result = classify_sql(
            "WITH u AS (UPDATE t_shirts SET price = 1 RETURNING *) SELECT * FROM u",
            DatabaseBackend::Postgres,
        );
        assert!(!result.level.is_read_only());
    }

    #[test]
    fn test_multi_statement_uses_most_dangerous() {
        let result = classify_sql(
            "SELECT * FROM t_shirts; DELETE FROM discounts",
            DatabaseBackend::MySql,
        );
        assert_eq!(result.level, SafetyLevel::Destructive);
        match result.statement_type {
            StatementType::Multiple(inner) => assert_eq!(*inner, StatementType::Delete),
            _ => panic!("Expected Multiple statement type"),
        }
    }

    #[test]
    fn test_multi_statement_all_safe() {
        let result = classify_sql(
            "SELECT * FROM t_shirts; SELECT COUNT(*) FROM discounts",
            DatabaseBackend::MySql,
        );
        assert_eq!(result.level, SafetyLevel::Safe);
    }

    #[test]
    fn test_parse_failure_is_destructive() {
        let result = classify_sql("THIS IS NOT VALID SQL AT ALL", DatabaseBackend::MySql);
        assert_eq!(result.level, SafetyLevel::Destructive);
        assert_eq!(result.statement_type, StatementType::Unknown);
        assert!(result.warning.unwrap().contains("Could not parse SQL"));
    }

    #[test]
    fn test_whitespace_only_is_destructive() {
        let result = classify_sql("   \n\t  ", DatabaseBackend::MySql);
        assert_eq!(result.level, SafetyLevel::Destructive);
    }

    #[test]
    fn test_ensure_read_only() {
        assert!(ensure_read_only("SELECT 1", DatabaseBackend::Sqlite).is_ok());

        let err = ensure_read_only("DELETE FROM t_shirts", DatabaseBackend::Sqlite).unwrap_err();
        assert_eq!(err.category(), "Query Error");
        assert!(err.detail().starts_with("DELETE statements are not allowed"));
    }

    #[test]
    fn test_classifier_default_is_mysql() {
        let classifier = SqlClassifier::default();
        assert_eq!(classifier.classify("SHOW TABLES").level, SafetyLevel::Safe);
    }
}
