use crate::{
    ColumnAttributes, ColumnMeta, DbError, ForeignKeyConstraint, QueryKind, QueryResult, Value,
};

/// Runs statements against the connection behind a grid.
///
/// Implementations are not assumed to tolerate concurrent statements on the
/// same connection; the grid session keeps at most one outstanding request
/// per grid and cancels before issuing the next.
pub trait StatementExecutor: Send + Sync {
    /// Execute a statement synchronously.
    fn execute(&self, kind: QueryKind, sql: &str) -> Result<QueryResult, DbError>;

    /// Run a SELECT, reading at most `max_rows` rows from the cursor.
    ///
    /// Rows past the bound must not be fetched into the returned result.
    fn execute_bounded(&self, sql: &str, max_rows: usize) -> Result<QueryResult, DbError>;

    /// Cancel the statement currently running on this executor, if any.
    ///
    /// Must be callable from a thread other than the one blocked in `execute`.
    fn cancel(&self) -> Result<(), DbError>;

    /// Deferred reader for an out-of-line value.
    ///
    /// The default returns `None`, in which case the grid keeps whatever bytes
    /// the result set already carried for the cell.
    fn lob_loader(&self, _request: &LobRequest) -> Option<Box<dyn LobLoader>> {
        None
    }
}

/// Constraint and column metadata for a table.
pub trait TableMetadataProvider: Send + Sync {
    /// Names of the primary key columns, in key order.
    fn primary_keys(&self, table: &str) -> Result<Vec<String>, DbError>;

    /// Foreign keys declared on the table.
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyConstraint>, DbError>;

    /// Generated/editable attributes of the table's columns.
    fn column_attributes(&self, table: &str) -> Result<Vec<ColumnAttributes>, DbError>;

    /// Column layout of the table without reading any rows.
    ///
    /// Used to rebuild an empty grid when the data query fails.
    fn columns(&self, table: &str) -> Result<Vec<ColumnMeta>, DbError>;
}

/// Reads the bytes of one large object.
pub trait LobLoader: Send + Sync {
    fn read_lob(&self) -> Result<Vec<u8>, DbError>;
}

/// Identifies the out-of-line value behind one grid cell.
#[derive(Debug, Clone)]
pub struct LobRequest {
    pub table: String,
    pub column: String,
    pub row_index: usize,

    /// Value the result set carried for the cell (often a locator).
    pub value: Value,
}

/// Loader for bytes that were already materialized by the result set.
pub struct InlineLob(pub Vec<u8>);

impl LobLoader for InlineLob {
    fn read_lob(&self) -> Result<Vec<u8>, DbError> {
        Ok(self.0.clone())
    }
}
