mod cell;
mod change;
mod column;
mod config;
mod error;
mod foreign_key;
mod grid;
mod mutation;
mod query;
mod session;
mod sql_dialect;
mod sql_type;
mod task;
mod traits;
mod value;

pub use cell::{Cell, CellContent, LOB_HEX_BYTE_BUDGET, LobPayload, hex_dump};
pub use change::{CellSnapshot, TableDataChange};
pub use column::{
    ColumnAttributes, ColumnDescriptor, ColumnFlags, ForeignKeyConstraint, TableConstraints,
    describe_columns,
};
pub use config::{ConfigStore, DEFAULT_MAX_ROWS, ExportDefaults, GridConfig, RowsetConfig};
pub use error::{DbError, RowsetError};
pub use foreign_key::{ForeignKeyDomain, ForeignKeyResolver};
pub use grid::{CellInput, GridState, SharedGrid, apply_edit, lock_grid, shared_grid};
pub use mutation::{InsertField, MutationSynthesizer, submit};
pub use query::{ColumnMeta, QueryKind, QueryResult, Row};
pub use session::{GridSession, LoadProgress};
pub use sql_dialect::{DefaultSqlDialect, SqlDialect};
pub use sql_type::SqlType;
pub use task::{
    CancelToken, FINISHED_TASK_LIMIT, TaskCallbacks, TaskHandle, TaskId, TaskKind, TaskManager,
    TaskOutcome, TaskRunner, TaskSlot, TaskSnapshot, TaskStatus,
};
pub use traits::{InlineLob, LobLoader, LobRequest, StatementExecutor, TableMetadataProvider};
pub use value::Value;

pub use chrono;
