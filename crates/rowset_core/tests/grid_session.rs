use rowset_core::{
    FINISHED_TASK_LIMIT, GridSession, LoadProgress, RowsetConfig, RowsetError, TaskCallbacks,
    TaskOutcome, Value, lock_grid,
};
use rowset_test_support::fixtures::{
    EMPLOYEE_SELECT, EMPLOYEE_TABLE, employee_columns, employee_metadata, employee_result,
};
use rowset_test_support::{BoundedRead, FakeExecutor, FakeMetadata, init_logging};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn session(executor: &FakeExecutor, metadata: FakeMetadata) -> GridSession {
    GridSession::new(
        EMPLOYEE_TABLE,
        executor.clone().as_executor_arc(),
        metadata.as_provider_arc(),
        RowsetConfig::default(),
    )
}

fn load_and_wait(session: &GridSession) -> TaskOutcome<usize> {
    session.load(TaskCallbacks::new(), |_| {}).wait()
}

#[derive(Clone, Default)]
struct CallbackCounts {
    successes: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl CallbackCounts {
    fn callbacks(&self) -> TaskCallbacks<usize> {
        let successes = self.successes.clone();
        let failures = self.failures.clone();
        TaskCallbacks::new()
            .on_success(move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            })
            .on_failure(move |_| {
                failures.fetch_add(1, Ordering::SeqCst);
            })
    }

    fn get(&self) -> (usize, usize) {
        (
            self.successes.load(Ordering::SeqCst),
            self.failures.load(Ordering::SeqCst),
        )
    }
}

#[test]
fn load_populates_grid_with_key_metadata() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(3));
    let session = session(&executor, employee_metadata());
    let progress = Arc::new(Mutex::new(Vec::new()));

    let events = progress.clone();
    let outcome = session
        .load(TaskCallbacks::new(), move |p: LoadProgress| {
            events.lock().unwrap().push(p);
        })
        .wait();

    assert!(matches!(outcome, TaskOutcome::Completed(3)));

    let grid = session.grid();
    let grid = lock_grid(&grid);
    assert_eq!(grid.row_count(), 3);
    assert_eq!(grid.column_count(), 4);
    assert!(grid.is_primary_key("ID"));
    assert!(grid.is_foreign_key("DEPT_ID"));
    assert!(!grid.is_column_editable(0));
    assert!(grid.is_column_editable(1));
    assert!(grid.cell(0, 3).unwrap().is_lob());

    let progress = progress.lock().unwrap();
    assert_eq!(progress.len(), 3);
    assert_eq!(
        progress.last(),
        Some(&LoadProgress {
            rows_loaded: 3,
            total_rows: 3
        })
    );
}

#[test]
fn lob_bytes_are_fetched_on_first_access_only() {
    init_logging();
    let executor = FakeExecutor::new()
        .with_query_result(EMPLOYEE_SELECT, employee_result(2))
        .with_lob_loading();
    let session = session(&executor, employee_metadata());

    assert!(load_and_wait(&session).is_completed());
    assert_eq!(executor.stats().lob_reads, 0);

    let grid = session.grid();
    let grid = lock_grid(&grid);
    let photo = grid.cell(0, 3).unwrap();

    assert_eq!(photo.as_binary_string().as_deref(), Some("01 01 01 01"));
    assert_eq!(photo.as_binary_string().as_deref(), Some("01 01 01 01"));
    assert_eq!(executor.stats().lob_reads, 1);

    assert!(grid.cell(1, 3).unwrap().is_null());
}

#[test]
fn metadata_failure_leaves_grid_read_only() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(2));
    let session = session(&executor, FakeMetadata::new().failing());

    assert!(load_and_wait(&session).is_completed());

    let err = session
        .apply_edit(0, 1, Value::Text("x".into()))
        .unwrap_err();
    assert!(matches!(err, RowsetError::NotEditable(_)));
    assert!(!session.has_changes());
}

#[test]
fn failed_query_falls_back_to_column_metadata() {
    init_logging();
    let executor = FakeExecutor::new().with_query_error(EMPLOYEE_SELECT, "table locked");
    let session = session(&executor, employee_metadata());
    let counts = CallbackCounts::default();

    let outcome = session.load(counts.callbacks(), |_| {}).wait();

    assert!(matches!(outcome, TaskOutcome::Completed(0)));
    assert_eq!(counts.get(), (1, 0));

    let grid = session.grid();
    let grid = lock_grid(&grid);
    assert_eq!(grid.column_count(), employee_columns().len());
    assert_eq!(grid.row_count(), 0);
}

#[test]
fn failed_query_without_metadata_reports_failure() {
    init_logging();
    let executor = FakeExecutor::new().with_query_error(EMPLOYEE_SELECT, "table locked");
    let session = session(&executor, FakeMetadata::new());
    let counts = CallbackCounts::default();

    let outcome = session.load(counts.callbacks(), |_| {}).wait();

    assert!(matches!(
        outcome,
        TaskOutcome::Failed(RowsetError::ExecutionFailure(_))
    ));
    assert_eq!(counts.get(), (0, 1));
}

#[test]
fn new_load_interrupts_the_previous_one() {
    init_logging();
    let executor = FakeExecutor::new().with_blocking_query(EMPLOYEE_SELECT);
    let session = session(&executor, employee_metadata());
    let first_counts = CallbackCounts::default();

    let first = session.load(first_counts.callbacks(), |_| {});
    assert!(executor.wait_until_blocked(Duration::from_secs(5)));

    executor.set_query_outcome(
        EMPLOYEE_SELECT,
        rowset_test_support::FakeQueryOutcome::Success(employee_result(2)),
    );
    let second = session.load(TaskCallbacks::new(), |_| {});

    assert!(first.wait().is_cancelled());
    assert!(matches!(second.wait(), TaskOutcome::Completed(2)));
    assert_eq!(first_counts.get(), (0, 0));
    assert!(executor.stats().cancel_calls >= 1);

    let grid = session.grid();
    assert_eq!(lock_grid(&grid).row_count(), 2);
}

#[test]
fn cancel_ends_load_without_callbacks() {
    init_logging();
    let executor = FakeExecutor::new().with_blocking_query(EMPLOYEE_SELECT);
    let session = session(&executor, employee_metadata());
    let counts = CallbackCounts::default();

    let handle = session.load(counts.callbacks(), |_| {});
    assert!(executor.wait_until_blocked(Duration::from_secs(5)));

    assert!(session.cancel());

    assert!(handle.wait().is_cancelled());
    assert_eq!(counts.get(), (0, 0));
    assert_eq!(lock_grid(&session.grid()).row_count(), 0);
}

#[test]
fn mutations_are_rejected_while_loading() {
    init_logging();
    let executor = FakeExecutor::new().with_blocking_query(EMPLOYEE_SELECT);
    let session = session(&executor, employee_metadata());

    let handle = session.load(TaskCallbacks::new(), |_| {});
    assert!(executor.wait_until_blocked(Duration::from_secs(5)));
    assert!(session.is_loading());

    assert!(matches!(
        session.delete_row(0),
        Err(RowsetError::Validation(_))
    ));

    session.cancel();
    assert!(handle.wait().is_cancelled());
}

#[test]
fn edits_are_written_back_as_updates() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(3));
    let session = session(&executor, employee_metadata());
    assert!(load_and_wait(&session).is_completed());

    session
        .apply_edit(0, 1, Value::Text("Renamed".into()))
        .unwrap();
    assert_eq!(session.pending_changes().len(), 1);

    let reload = session.apply_changes().unwrap();
    assert!(reload.wait().is_completed());

    let stats = executor.stats();
    assert!(
        stats
            .executed_sql()
            .contains(&"UPDATE EMPLOYEE SET NAME = 'Renamed' WHERE (ID = 1)")
    );
    assert!(!session.has_changes());
}

#[test]
fn apply_without_changes_is_rejected() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(1));
    let session = session(&executor, employee_metadata());
    assert!(load_and_wait(&session).is_completed());

    assert!(matches!(
        session.apply_changes(),
        Err(RowsetError::Validation(_))
    ));
}

#[test]
fn insert_row_quotes_text_and_nulls_blanks() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(1));
    let session = session(&executor, employee_metadata());
    assert!(load_and_wait(&session).is_completed());

    let reload = session
        .insert_row(&[Some("4".into()), Some("New".into()), Some(String::new()), None])
        .unwrap();
    assert!(reload.wait().is_completed());

    assert!(executor.stats().executed_sql().contains(
        &"INSERT INTO EMPLOYEE (ID, NAME, DEPT_ID, PHOTO) VALUES (4, 'New', NULL, NULL)"
    ));
}

#[test]
fn delete_row_limits_to_one_row() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(2));
    let session = session(&executor, employee_metadata());
    assert!(load_and_wait(&session).is_completed());

    let reload = session.delete_row(1).unwrap();
    assert!(reload.wait().is_completed());

    assert!(executor.stats().executed_sql().contains(
        &"DELETE FROM EMPLOYEE WHERE (ID = 2) AND (NAME = 'Employee 2') AND (DEPT_ID = 30) ORDER BY DEPT_ID ROWS 1"
    ));
}

#[test]
fn failed_delete_surfaces_execution_failure() {
    init_logging();
    let delete = "DELETE FROM EMPLOYEE WHERE (ID = 1) AND (NAME = 'Employee 1') AND (DEPT_ID = 20) ORDER BY DEPT_ID ROWS 1";
    let executor = FakeExecutor::new()
        .with_query_result(EMPLOYEE_SELECT, employee_result(1))
        .with_query_error(delete, "row locked");
    let session = session(&executor, employee_metadata());
    assert!(load_and_wait(&session).is_completed());

    let err = session.delete_row(0).unwrap_err();

    assert!(matches!(err, RowsetError::ExecutionFailure(message) if message.contains("row locked")));
    let selects = executor
        .stats()
        .executed_sql()
        .iter()
        .filter(|sql| **sql == EMPLOYEE_SELECT)
        .count();
    assert_eq!(selects, 1);
}

#[test]
fn rows_past_configured_ceiling_are_dropped() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(10));
    let mut config = RowsetConfig::default();
    config.grid.max_rows = 4;
    let session = GridSession::new(
        EMPLOYEE_TABLE,
        executor.clone().as_executor_arc(),
        employee_metadata().as_provider_arc(),
        config,
    );

    assert!(matches!(load_and_wait(&session), TaskOutcome::Completed(4)));
    assert!(lock_grid(&session.grid()).is_truncated());
    assert_eq!(
        executor.stats().bounded_reads,
        vec![BoundedRead {
            limit: 5,
            returned: 5
        }]
    );
}

#[test]
fn dropping_a_session_releases_its_blocked_load() {
    init_logging();
    let executor = FakeExecutor::new().with_blocking_query(EMPLOYEE_SELECT);
    let session = session(&executor, employee_metadata());

    let handle = session.load(TaskCallbacks::new(), |_| {});
    assert!(executor.wait_until_blocked(Duration::from_secs(5)));

    drop(session);

    assert!(executor.stats().cancel_calls >= 1);
    assert!(executor.wait_until_released(Duration::from_secs(5)));
    assert!(handle.wait().is_cancelled());
}

#[test]
fn repeated_reloads_keep_task_registry_bounded() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(EMPLOYEE_SELECT, employee_result(1));
    let session = session(&executor, employee_metadata());

    let first = session.load(TaskCallbacks::new(), |_| {});
    let first_id = first.id();
    assert!(first.wait().is_completed());

    for _ in 0..FINISHED_TASK_LIMIT {
        assert!(load_and_wait(&session).is_completed());
    }

    assert!(session.runner().snapshot(first_id).is_none());
    assert!(session.runner().tracked_tasks() <= FINISHED_TASK_LIMIT);
}
