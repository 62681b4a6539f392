use rowset_core::{
    DefaultSqlDialect, ForeignKeyConstraint, ForeignKeyResolver, GridSession, RowsetConfig,
    RowsetError, TaskCallbacks, Value,
};
use rowset_test_support::fixtures::{
    DEPARTMENT_VALUES, EMPLOYEE_SELECT, EMPLOYEE_TABLE, department_result, employee_metadata,
    employee_result,
};
use rowset_test_support::{FakeExecutor, init_logging};
use std::time::Duration;

fn department_fk() -> ForeignKeyConstraint {
    ForeignKeyConstraint::new("DEPT_ID", "DEPARTMENT", "ID")
}

#[test]
fn domain_is_ordered_distinct_values_then_null() {
    init_logging();
    let executor =
        FakeExecutor::new().with_query_result(DEPARTMENT_VALUES, department_result(&[10, 20, 20, 30]));

    let domain = ForeignKeyResolver::new(&executor, &DefaultSqlDialect).resolve(&department_fk());

    assert_eq!(
        domain.values,
        vec![
            Some(Value::Int(10)),
            Some(Value::Int(20)),
            Some(Value::Int(30)),
            None
        ]
    );
    assert_eq!(domain.column(), "DEPT_ID");
    assert_eq!(domain.choices().count(), 3);
    assert_eq!(executor.stats().executed_sql(), vec![DEPARTMENT_VALUES]);
}

#[test]
fn failed_lookup_still_offers_null() {
    init_logging();
    let executor = FakeExecutor::new().with_query_error(DEPARTMENT_VALUES, "no such table");

    let domain = ForeignKeyResolver::new(&executor, &DefaultSqlDialect).resolve(&department_fk());

    assert_eq!(domain.values, vec![None]);
}

#[test]
fn empty_referenced_table_yields_only_null() {
    init_logging();
    let executor = FakeExecutor::new().with_query_result(DEPARTMENT_VALUES, department_result(&[]));

    let domain = ForeignKeyResolver::new(&executor, &DefaultSqlDialect).resolve(&department_fk());

    assert_eq!(domain.values, vec![None]);
}

#[test]
fn session_resolves_every_foreign_key_column() {
    init_logging();
    let executor = FakeExecutor::new()
        .with_query_result(EMPLOYEE_SELECT, employee_result(2))
        .with_query_result(DEPARTMENT_VALUES, department_result(&[10, 20]));
    let session = GridSession::new(
        EMPLOYEE_TABLE,
        executor.clone().as_executor_arc(),
        employee_metadata().as_provider_arc(),
        RowsetConfig::default(),
    );
    assert!(session.load(TaskCallbacks::new(), |_| {}).wait().is_completed());

    let domains = session.foreign_key_domains().unwrap();

    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].column(), "DEPT_ID");
    assert_eq!(domains[0].values.last(), Some(&None));
    assert_eq!(domains[0].values.len(), 3);
}

#[test]
fn domains_wait_for_the_running_load() {
    init_logging();
    let executor = FakeExecutor::new()
        .with_blocking_query(EMPLOYEE_SELECT)
        .with_query_result(DEPARTMENT_VALUES, department_result(&[10]));
    let session = GridSession::new(
        EMPLOYEE_TABLE,
        executor.clone().as_executor_arc(),
        employee_metadata().as_provider_arc(),
        RowsetConfig::default(),
    );

    let handle = session.load(TaskCallbacks::new(), |_| {});
    assert!(executor.wait_until_blocked(Duration::from_secs(5)));

    assert!(matches!(
        session.foreign_key_domains(),
        Err(RowsetError::Validation(_))
    ));
    assert_eq!(executor.stats().executed_sql(), vec![EMPLOYEE_SELECT]);

    session.cancel();
    assert!(handle.wait().is_cancelled());
}
