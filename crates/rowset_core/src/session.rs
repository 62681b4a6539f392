use std::sync::Arc;

use crate::cell::LobPayload;
use crate::change::TableDataChange;
use crate::column::{ColumnAttributes, TableConstraints, describe_columns};
use crate::config::RowsetConfig;
use crate::foreign_key::{ForeignKeyDomain, ForeignKeyResolver};
use crate::grid::{CellInput, SharedGrid, lock_grid, shared_grid};
use crate::mutation::{MutationSynthesizer, submit};
use crate::sql_dialect::{DefaultSqlDialect, SqlDialect};
use crate::task::{CancelToken, TaskCallbacks, TaskHandle, TaskKind, TaskRunner, TaskSlot};
use crate::traits::{LobRequest, StatementExecutor, TableMetadataProvider};
use crate::{DbError, QueryKind, QueryResult, RowsetError, Value};

/// Rows read so far by a running load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub rows_loaded: usize,
    pub total_rows: usize,
}

struct SessionShared {
    table: String,
    executor: Arc<dyn StatementExecutor>,
    metadata: Arc<dyn TableMetadataProvider>,
    dialect: Arc<dyn SqlDialect>,
    grid: SharedGrid,
    max_rows: usize,
}

/// Editable view of one table: loads it into a grid in the background and
/// turns edits, inserts and deletes into statements.
pub struct GridSession {
    shared: Arc<SessionShared>,
    config: RowsetConfig,
    runner: TaskRunner,
    slot: TaskSlot,
}

impl GridSession {
    pub fn new(
        table: impl Into<String>,
        executor: Arc<dyn StatementExecutor>,
        metadata: Arc<dyn TableMetadataProvider>,
        config: RowsetConfig,
    ) -> Self {
        Self::with_dialect(table, executor, metadata, Arc::new(DefaultSqlDialect), config)
    }

    pub fn with_dialect(
        table: impl Into<String>,
        executor: Arc<dyn StatementExecutor>,
        metadata: Arc<dyn TableMetadataProvider>,
        dialect: Arc<dyn SqlDialect>,
        config: RowsetConfig,
    ) -> Self {
        let runner = TaskRunner::new();

        Self {
            shared: Arc::new(SessionShared {
                table: table.into(),
                executor,
                metadata,
                dialect,
                grid: shared_grid(&config.grid),
                max_rows: config.grid.max_rows,
            }),
            config,
            slot: TaskSlot::new(runner.clone()),
            runner,
        }
    }

    pub fn table(&self) -> &str {
        &self.shared.table
    }

    /// The session's grid. Holding its lock (directly or through a running
    /// export) blocks edits and the next load until it is released.
    pub fn grid(&self) -> SharedGrid {
        self.shared.grid.clone()
    }

    pub fn config(&self) -> &RowsetConfig {
        &self.config
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Reload the table in the background.
    ///
    /// A load still in flight is cancelled and finishes before this one
    /// starts touching the grid.
    pub fn load(
        &self,
        callbacks: TaskCallbacks<usize>,
        progress: impl Fn(LoadProgress) + Send + 'static,
    ) -> TaskHandle<usize> {
        if self.slot.is_busy() {
            self.interrupt_statement();
        }

        let shared = self.shared.clone();
        let description = format!("Loading {}", shared.table);

        self.slot.spawn_exclusive(
            TaskKind::Load,
            description,
            move |token| {
                let result = load_table(&shared, token, &progress);
                if matches!(result, Err(RowsetError::Cancelled)) {
                    lock_grid(&shared.grid).clear();
                }
                result
            },
            callbacks,
        )
    }

    /// Cancel the running load and the statement behind it.
    pub fn cancel(&self) -> bool {
        let cancelled = self.slot.cancel();
        if cancelled {
            log::info!("[CANCEL] Load of {} cancelled", self.shared.table);
            self.interrupt_statement();
        }
        cancelled
    }

    fn interrupt_statement(&self) {
        if let Err(e) = self.shared.executor.cancel() {
            log::warn!("[CANCEL] Executor could not cancel statement: {}", e);
        }
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn apply_edit(&self, row: usize, column: usize, value: Value) -> Result<(), RowsetError> {
        lock_grid(&self.shared.grid).set_value_at(row, column, value)
    }

    pub fn pending_changes(&self) -> Vec<TableDataChange> {
        lock_grid(&self.shared.grid)
            .pending_changes()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        lock_grid(&self.shared.grid).has_changes()
    }

    /// Selectable values for every foreign key column of the loaded table.
    ///
    /// Rejected while a load is in flight, since the lookups share the
    /// load's connection.
    pub fn foreign_key_domains(&self) -> Result<Vec<ForeignKeyDomain>, RowsetError> {
        self.ensure_idle()?;

        let constraints = lock_grid(&self.shared.grid).constraints().foreign_keys.clone();

        Ok(
            ForeignKeyResolver::new(self.shared.executor.as_ref(), self.shared.dialect.as_ref())
                .resolve_all(&constraints),
        )
    }

    /// Insert a row from entered values, indexed like the grid's columns,
    /// then reload.
    pub fn insert_row(&self, values: &[Option<String>]) -> Result<TaskHandle<usize>, RowsetError> {
        self.ensure_idle()?;

        let sql = {
            let grid = lock_grid(&self.shared.grid);
            let synth = MutationSynthesizer::new(self.shared.dialect.as_ref());
            let fields = synth.insert_fields(&grid, values)?;
            synth.build_insert(&self.shared.table, &fields)?
        };

        self.submit_and_reload(QueryKind::Insert, &sql)
    }

    /// Delete the row at `row` as it was loaded, then reload.
    pub fn delete_row(&self, row: usize) -> Result<TaskHandle<usize>, RowsetError> {
        self.ensure_idle()?;

        let sql = {
            let grid = lock_grid(&self.shared.grid);
            let snapshot = grid
                .snapshot_row(row)
                .ok_or(RowsetError::OutOfRange { row, column: 0 })?;
            MutationSynthesizer::new(self.shared.dialect.as_ref())
                .build_delete(&self.shared.table, &snapshot)?
        };

        self.submit_and_reload(QueryKind::Delete, &sql)
    }

    /// Write every pending change back as an UPDATE, then reload.
    ///
    /// Stops at the first failing statement; statements already executed
    /// stay applied.
    pub fn apply_changes(&self) -> Result<TaskHandle<usize>, RowsetError> {
        self.ensure_idle()?;

        let statements: Vec<String> = {
            let grid = lock_grid(&self.shared.grid);
            if !grid.is_editable() {
                return Err(RowsetError::Validation(format!(
                    "{} has no primary key",
                    self.shared.table
                )));
            }

            let synth = MutationSynthesizer::new(self.shared.dialect.as_ref());
            let primary_keys = &grid.constraints().primary_keys;

            grid.pending_changes()
                .into_iter()
                .filter_map(|change| {
                    let sql = synth.build_update(&self.shared.table, change, primary_keys);
                    if sql.is_none() {
                        log::warn!("[UPDATE] Row {} has nothing to update", change.row_index());
                    }
                    sql
                })
                .collect()
        };

        if statements.is_empty() {
            return Err(RowsetError::Validation("No pending changes".to_string()));
        }

        for sql in &statements {
            submit(self.shared.executor.as_ref(), QueryKind::Update, sql)?;
        }

        Ok(self.load(TaskCallbacks::new(), |_| {}))
    }

    fn submit_and_reload(
        &self,
        kind: QueryKind,
        sql: &str,
    ) -> Result<TaskHandle<usize>, RowsetError> {
        let result = submit(self.shared.executor.as_ref(), kind, sql)?;
        if let Some(affected) = result.affected_rows {
            log::info!("[{}] {} row(s) affected", kind.label(), affected);
        }

        Ok(self.load(TaskCallbacks::new(), |_| {}))
    }

    fn ensure_idle(&self) -> Result<(), RowsetError> {
        if self.slot.is_busy() {
            return Err(RowsetError::Validation(format!(
                "{} is still loading",
                self.shared.table
            )));
        }
        Ok(())
    }
}

impl Drop for GridSession {
    fn drop(&mut self) {
        if self.slot.cancel() {
            log::info!("[CANCEL] Session for {} dropped during load", self.shared.table);
            self.interrupt_statement();
        }
        lock_grid(&self.shared.grid).dispose();
    }
}

fn load_table(
    shared: &SessionShared,
    token: &CancelToken,
    progress: &dyn Fn(LoadProgress),
) -> Result<usize, RowsetError> {
    let table = shared.table.as_str();
    log::info!("[LOAD] Loading {}", table);

    let constraints = fetch_constraints(shared.metadata.as_ref(), table);
    let attributes = fetch_attributes(shared.metadata.as_ref(), table);
    token.check()?;

    let sql = format!("SELECT * FROM {}", shared.dialect.quote_identifier(table));
    // One row past the ceiling lets the grid flag truncation.
    let fetch_limit = shared.max_rows.saturating_add(1);
    let result = match shared.executor.execute_bounded(&sql, fetch_limit) {
        Ok(result) => result,
        Err(DbError::Cancelled) => return Err(RowsetError::Cancelled),
        Err(_) if token.is_cancelled() => return Err(RowsetError::Cancelled),
        Err(e) => fallback_result(shared.metadata.as_ref(), table, e)?,
    };
    token.check()?;

    let columns = describe_columns(&result.columns, &attributes);
    let total_rows = result.rows.len();
    let mut rows = Vec::with_capacity(total_rows.min(fetch_limit));

    for (row_index, values) in result.rows.into_iter().take(fetch_limit).enumerate() {
        token.check()?;
        if values.len() != columns.len() {
            return Err(RowsetError::RowShape {
                row: row_index,
                expected: columns.len(),
                actual: values.len(),
            });
        }

        let inputs = columns
            .iter()
            .zip(values)
            .map(|(column, value)| {
                if !column.is_lob() {
                    return CellInput::Value(value);
                }
                if value.is_null() {
                    return CellInput::Lob(LobPayload::null());
                }

                let request = LobRequest {
                    table: table.to_string(),
                    column: column.name.clone(),
                    row_index,
                    value,
                };

                match shared.executor.lob_loader(&request) {
                    Some(loader) => CellInput::Lob(LobPayload::new(loader)),
                    None => CellInput::Value(request.value),
                }
            })
            .collect::<Vec<_>>();

        rows.push(inputs);
        progress(LoadProgress {
            rows_loaded: row_index + 1,
            total_rows,
        });
    }

    token.check()?;

    let loaded = lock_grid(&shared.grid).load(columns, constraints, rows)?;
    log::info!("[LOAD] Loaded {} rows from {}", loaded, table);

    Ok(loaded)
}

fn fallback_result(
    metadata: &dyn TableMetadataProvider,
    table: &str,
    error: DbError,
) -> Result<QueryResult, RowsetError> {
    log::error!("[LOAD] Query on {} failed: {}", table, error);

    match metadata.columns(table) {
        Ok(columns) => {
            log::warn!(
                "[LOAD] Showing {} column(s) of {} without rows",
                columns.len(),
                table
            );
            Ok(QueryResult::table(columns, Vec::new(), Default::default()))
        }
        Err(meta_error) => {
            log::error!("[LOAD] Column metadata for {} unavailable: {}", table, meta_error);
            Err(RowsetError::ExecutionFailure(error.to_string()))
        }
    }
}

fn fetch_constraints(metadata: &dyn TableMetadataProvider, table: &str) -> TableConstraints {
    let primary_keys = metadata.primary_keys(table).unwrap_or_else(|e| {
        log::warn!("[LOAD] Primary keys of {} unavailable: {}", table, e);
        Vec::new()
    });

    let foreign_keys = metadata.foreign_keys(table).unwrap_or_else(|e| {
        log::warn!("[LOAD] Foreign keys of {} unavailable: {}", table, e);
        Vec::new()
    });

    TableConstraints::new(primary_keys, foreign_keys)
}

fn fetch_attributes(metadata: &dyn TableMetadataProvider, table: &str) -> Vec<ColumnAttributes> {
    metadata.column_attributes(table).unwrap_or_else(|e| {
        log::warn!("[LOAD] Column attributes of {} unavailable: {}", table, e);
        Vec::new()
    })
}
