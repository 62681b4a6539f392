use thiserror::Error;

/// Failure reported by an external collaborator (statement executor,
/// metadata provider, LOB loader).
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DbError {
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }
}

/// Error taxonomy of the grid engine.
///
/// `MetadataUnavailable` is normally logged and degraded to defaults rather
/// than returned; it only escapes from the raw metadata helpers.
#[derive(Debug, Error)]
pub enum RowsetError {
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Execution failed: {0}")]
    ExecutionFailure(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Column '{0}' is not editable")]
    NotEditable(String),

    #[error("Cell ({row}, {column}) is out of range")]
    OutOfRange { row: usize, column: usize },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RowsetError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<DbError> for RowsetError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Cancelled => Self::Cancelled,
            other => Self::ExecutionFailure(other.to_string()),
        }
    }
}
