use rowset_core::{
    ColumnAttributes, ColumnMeta, DbError, ForeignKeyConstraint, LobLoader, LobRequest, QueryKind,
    QueryResult, StatementExecutor, TableMetadataProvider, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FakeQueryOutcome {
    Success(QueryResult),
    Error(String),
    Cancelled,
    /// Block the calling thread until the executor is cancelled.
    Block,
}

/// One bounded SELECT: the row limit asked for and the rows handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRead {
    pub limit: usize,
    pub returned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeExecutorStats {
    pub executed: Vec<(QueryKind, String)>,
    pub bounded_reads: Vec<BoundedRead>,
    pub cancel_calls: usize,
    pub lob_reads: usize,
}

impl FakeExecutorStats {
    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|(_, sql)| sql.as_str()).collect()
    }
}

#[derive(Default)]
struct Gate {
    waiting: usize,
    cancels: usize,
}

#[derive(Default)]
struct FakeExecutorState {
    query_outcomes: RwLock<HashMap<String, FakeQueryOutcome>>,
    default_outcome: RwLock<Option<FakeQueryOutcome>>,
    executed: Mutex<Vec<(QueryKind, String)>>,
    bounded_reads: Mutex<Vec<BoundedRead>>,
    cancel_calls: AtomicUsize,
    lob_reads: Arc<AtomicUsize>,
    lob_loading: RwLock<bool>,
    gate: Mutex<Gate>,
    gate_changed: Condvar,
}

/// Statement executor answering from canned outcomes keyed by SQL text.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<FakeExecutorState>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_result(self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.set_query_outcome(sql, FakeQueryOutcome::Success(result));
        self
    }

    pub fn with_query_error(self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.set_query_outcome(sql, FakeQueryOutcome::Error(message.into()));
        self
    }

    pub fn with_blocking_query(self, sql: impl Into<String>) -> Self {
        self.set_query_outcome(sql, FakeQueryOutcome::Block);
        self
    }

    pub fn with_default_result(self, result: QueryResult) -> Self {
        *rwlock_write(&self.state.default_outcome) = Some(FakeQueryOutcome::Success(result));
        self
    }

    pub fn with_default_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.default_outcome) = Some(FakeQueryOutcome::Error(message.into()));
        self
    }

    /// Hand out deferred loaders for LOB cells instead of inline bytes.
    pub fn with_lob_loading(self) -> Self {
        *rwlock_write(&self.state.lob_loading) = true;
        self
    }

    pub fn set_query_outcome(&self, sql: impl Into<String>, outcome: FakeQueryOutcome) {
        rwlock_write(&self.state.query_outcomes).insert(sql.into(), outcome);
    }

    /// Wait until some thread is parked on a blocking query.
    pub fn wait_until_blocked(&self, timeout: Duration) -> bool {
        let gate = mutex_lock(&self.state.gate);
        let (gate, _) = self
            .state
            .gate_changed
            .wait_timeout_while(gate, timeout, |gate| gate.waiting == 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        gate.waiting > 0
    }

    /// Wait until no thread is parked on a blocking query.
    pub fn wait_until_released(&self, timeout: Duration) -> bool {
        let gate = mutex_lock(&self.state.gate);
        let (gate, _) = self
            .state
            .gate_changed
            .wait_timeout_while(gate, timeout, |gate| gate.waiting > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        gate.waiting == 0
    }

    pub fn stats(&self) -> FakeExecutorStats {
        FakeExecutorStats {
            executed: mutex_lock(&self.state.executed).clone(),
            bounded_reads: mutex_lock(&self.state.bounded_reads).clone(),
            cancel_calls: self.state.cancel_calls.load(Ordering::SeqCst),
            lob_reads: self.state.lob_reads.load(Ordering::SeqCst),
        }
    }

    pub fn as_executor_arc(self) -> Arc<dyn StatementExecutor> {
        Arc::new(self)
    }

    fn block_until_cancelled(&self) -> Result<QueryResult, DbError> {
        let mut gate = mutex_lock(&self.state.gate);
        let generation = gate.cancels;
        gate.waiting += 1;
        self.state.gate_changed.notify_all();

        while gate.cancels == generation {
            gate = self
                .state
                .gate_changed
                .wait(gate)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        gate.waiting -= 1;
        self.state.gate_changed.notify_all();
        Err(DbError::Cancelled)
    }

    fn respond(&self, kind: QueryKind, sql: &str) -> Result<QueryResult, DbError> {
        mutex_lock(&self.state.executed).push((kind, sql.to_string()));

        let outcome = rwlock_read(&self.state.query_outcomes)
            .get(sql)
            .cloned()
            .or_else(|| rwlock_read(&self.state.default_outcome).clone());

        match outcome {
            Some(FakeQueryOutcome::Success(result)) => Ok(result),
            Some(FakeQueryOutcome::Error(message)) => Err(DbError::query_failed(message)),
            Some(FakeQueryOutcome::Cancelled) => Err(DbError::Cancelled),
            Some(FakeQueryOutcome::Block) => self.block_until_cancelled(),
            None if kind == QueryKind::Select => Ok(QueryResult::empty()),
            None => Ok(QueryResult::affected(1, Duration::ZERO)),
        }
    }
}

impl StatementExecutor for FakeExecutor {
    fn execute(&self, kind: QueryKind, sql: &str) -> Result<QueryResult, DbError> {
        self.respond(kind, sql)
    }

    fn execute_bounded(&self, sql: &str, max_rows: usize) -> Result<QueryResult, DbError> {
        let mut result = self.respond(QueryKind::Select, sql)?;
        result.rows.truncate(max_rows);

        mutex_lock(&self.state.bounded_reads).push(BoundedRead {
            limit: max_rows,
            returned: result.rows.len(),
        });

        Ok(result)
    }

    fn cancel(&self) -> Result<(), DbError> {
        self.state.cancel_calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = mutex_lock(&self.state.gate);
        gate.cancels += 1;
        self.state.gate_changed.notify_all();
        Ok(())
    }

    fn lob_loader(&self, request: &LobRequest) -> Option<Box<dyn LobLoader>> {
        if !*rwlock_read(&self.state.lob_loading) {
            return None;
        }

        let bytes = match &request.value {
            Value::Bytes(bytes) => bytes.clone(),
            other => other.as_display_string().into_bytes(),
        };

        Some(Box::new(FakeLob {
            bytes,
            reads: self.state.lob_reads.clone(),
        }))
    }
}

struct FakeLob {
    bytes: Vec<u8>,
    reads: Arc<AtomicUsize>,
}

impl LobLoader for FakeLob {
    fn read_lob(&self) -> Result<Vec<u8>, DbError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes.clone())
    }
}

/// Table metadata served from fixed values.
///
/// `columns` left unset makes the column lookup fail.
#[derive(Debug, Clone, Default)]
pub struct FakeMetadata {
    primary_keys: Vec<String>,
    foreign_keys: Vec<ForeignKeyConstraint>,
    attributes: Vec<ColumnAttributes>,
    columns: Option<Vec<ColumnMeta>>,
    failing: bool,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary_keys(mut self, keys: &[&str]) -> Self {
        self.primary_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_foreign_key(mut self, constraint: ForeignKeyConstraint) -> Self {
        self.foreign_keys.push(constraint);
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<ColumnAttributes>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnMeta>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Fail every key and attribute lookup.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn as_provider_arc(self) -> Arc<dyn TableMetadataProvider> {
        Arc::new(self)
    }

    fn check(&self) -> Result<(), DbError> {
        if self.failing {
            return Err(DbError::query_failed("metadata unavailable"));
        }
        Ok(())
    }
}

impl TableMetadataProvider for FakeMetadata {
    fn primary_keys(&self, _table: &str) -> Result<Vec<String>, DbError> {
        self.check()?;
        Ok(self.primary_keys.clone())
    }

    fn foreign_keys(&self, _table: &str) -> Result<Vec<ForeignKeyConstraint>, DbError> {
        self.check()?;
        Ok(self.foreign_keys.clone())
    }

    fn column_attributes(&self, _table: &str) -> Result<Vec<ColumnAttributes>, DbError> {
        self.check()?;
        Ok(self.attributes.clone())
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnMeta>, DbError> {
        self.columns
            .clone()
            .ok_or_else(|| DbError::query_failed(format!("no columns for {}", table)))
    }
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
