use crate::Value;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of statement handed to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryKind {
    pub fn label(self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
        }
    }
}

/// A single row of query results.
pub type Row = Vec<Value>;

/// Metadata for a result column as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name as returned by the database.
    pub name: String,

    /// JDBC type code of the column.
    pub sql_type: i32,

    /// Database-specific type name (e.g., "VARCHAR", "BLOB SUB_TYPE 0").
    pub type_name: String,

    /// Whether the column allows NULL values.
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(
        name: impl Into<String>,
        sql_type: i32,
        type_name: impl Into<String>,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            sql_type,
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Result of executing a statement.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Metadata for each column in the result set.
    pub columns: Vec<ColumnMeta>,

    /// Row data, where each row contains values matching `columns` order.
    pub rows: Vec<Row>,

    /// Number of rows affected by INSERT/UPDATE/DELETE statements.
    /// `None` for SELECT queries.
    pub affected_rows: Option<u64>,

    /// Wall-clock time taken to execute the statement.
    pub execution_time: Duration,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: None,
            execution_time: Duration::ZERO,
        }
    }

    pub fn table(columns: Vec<ColumnMeta>, rows: Vec<Row>, execution_time: Duration) -> Self {
        Self {
            columns,
            rows,
            affected_rows: None,
            execution_time,
        }
    }

    pub fn affected(affected_rows: u64, execution_time: Duration) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: Some(affected_rows),
            execution_time,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
