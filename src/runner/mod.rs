//! Read-only SQL execution against the analytics SQLite database.
//!
//! The runner is the only component that touches the data source. It enforces
//! two guards before anything reaches the database: statements must be
//! SELECTs, and unbounded SELECTs get a row cap appended. Execution faults
//! never escape `run_sql`; they come back inside the [`QueryResult`].

use async_trait::async_trait;
use serde_json::Value;

use crate::domains::query::{ColumnInfo, QueryResult};
use crate::error::{QueryPilotError, Result};
use crate::interfaces::stores::SqlRunner;

pub const DEFAULT_ROW_LIMIT: usize = 100;

#[derive(Clone)]
pub struct SqliteSqlRunner {
    conn: tokio_rusqlite::Connection,
    row_limit: usize,
}

impl SqliteSqlRunner {
    pub async fn open(path: &str, row_limit: usize) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        Ok(Self { conn, row_limit })
    }

    pub async fn open_in_memory(row_limit: usize) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| QueryPilotError::Runtime(e.to_string()))?;
        Ok(Self { conn, row_limit })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }
}

/// A statement is accepted when its first keyword is SELECT, or WITH for
/// CTE-prefixed selects.
pub fn is_select_statement(sql: &str) -> bool {
    let first = sql.trim_start().split_whitespace().next().unwrap_or("");
    first.eq_ignore_ascii_case("select") || first.eq_ignore_ascii_case("with")
}

/// Append ` LIMIT {cap}` to a SELECT that carries no LIMIT of its own. The
/// trailing semicolon is dropped first so the clause lands inside the
/// statement. Applied exactly once; statements that already bound themselves
/// pass through untouched.
pub fn inject_limit(sql: &str, cap: usize) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    if !is_select_statement(trimmed) {
        return trimmed.to_string();
    }
    let has_limit = trimmed
        .split_whitespace()
        .any(|token| token.eq_ignore_ascii_case("limit"));
    if has_limit {
        trimmed.to_string()
    } else {
        format!("{trimmed} LIMIT {cap}")
    }
}

fn column_value(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl SqlRunner for SqliteSqlRunner {
    async fn run_sql(&self, sql: &str) -> QueryResult {
        if !is_select_statement(sql) {
            return QueryResult::failure("only SELECT statements are allowed");
        }
        let bounded = inject_limit(sql, self.row_limit);
        let outcome = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&bounded)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|c| c.to_string()).collect();
                let column_count = columns.len();
                let mut rows = Vec::new();
                let mut raw = stmt.query([])?;
                while let Some(row) = raw.next()? {
                    let mut out = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        out.push(column_value(row.get_ref(i)?));
                    }
                    rows.push(out);
                }
                Ok((columns, rows))
            })
            .await;

        match outcome {
            Ok((columns, rows)) => {
                let row_count = rows.len();
                QueryResult {
                    columns,
                    rows,
                    row_count,
                    error: None,
                }
            }
            Err(e) => QueryResult::failure(e.to_string()),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(|e| QueryPilotError::Execution(e.to_string()))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        if !valid_identifier(table) {
            return Err(QueryPilotError::Validation(format!(
                "invalid table name: {table}"
            )));
        }
        let query = format!("PRAGMA table_info({table})");
        let columns = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt.query_map([], |row| {
                    Ok(ColumnInfo {
                        name: row.get(1)?,
                        data_type: row.get(2)?,
                        nullable: row.get::<_, i64>(3)? == 0,
                        default: row.get(4)?,
                    })
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(|e| QueryPilotError::Execution(e.to_string()))?;
        if columns.is_empty() {
            return Err(QueryPilotError::NotFound(format!("table {table}")));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_select_statements() {
        assert!(is_select_statement("SELECT 1"));
        assert!(is_select_statement("  select * from t"));
        assert!(is_select_statement("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_select_statement("DELETE FROM t"));
        assert!(!is_select_statement("UPDATE t SET a = 1"));
        assert!(!is_select_statement(""));
    }

    #[test]
    fn appends_limit_once() {
        assert_eq!(
            inject_limit("SELECT * FROM t;", 100),
            "SELECT * FROM t LIMIT 100"
        );
        assert_eq!(
            inject_limit("SELECT * FROM t LIMIT 5", 100),
            "SELECT * FROM t LIMIT 5"
        );
        let once = inject_limit("SELECT * FROM t", 100);
        assert_eq!(inject_limit(&once, 100), once);
    }

    #[test]
    fn identifier_validation() {
        assert!(valid_identifier("FactInternetSales"));
        assert!(valid_identifier("dim_customer"));
        assert!(!valid_identifier("t; DROP TABLE x"));
        assert!(!valid_identifier(""));
    }
}
