use crate::FakeMetadata;
use rowset_core::{
    ColumnAttributes, ColumnMeta, ForeignKeyConstraint, QueryResult, Row, SqlType, Value,
};
use std::time::Duration;

pub const EMPLOYEE_TABLE: &str = "EMPLOYEE";
pub const EMPLOYEE_SELECT: &str = "SELECT * FROM EMPLOYEE";
pub const DEPARTMENT_VALUES: &str = "SELECT DISTINCT ID FROM DEPARTMENT ORDER BY 1";

pub fn table_result(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> QueryResult {
    QueryResult::table(columns, rows, Duration::ZERO)
}

pub fn column(name: impl Into<String>, sql_type: SqlType, nullable: bool) -> ColumnMeta {
    ColumnMeta::new(name, sql_type.code(), format!("{:?}", sql_type).to_uppercase(), nullable)
}

pub fn int_cell(value: i64) -> Value {
    Value::Int(value)
}

pub fn text_cell(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

/// `ID INTEGER` key, `NAME VARCHAR`, `DEPT_ID INTEGER` referencing
/// `DEPARTMENT.ID`, `PHOTO BLOB`.
pub fn employee_columns() -> Vec<ColumnMeta> {
    vec![
        column("ID", SqlType::Integer, false),
        column("NAME", SqlType::VarChar, true),
        column("DEPT_ID", SqlType::Integer, true),
        column("PHOTO", SqlType::Blob, true),
    ]
}

pub fn employee_rows(count: i64) -> Vec<Row> {
    (1..=count)
        .map(|id| {
            vec![
                int_cell(id),
                text_cell(format!("Employee {}", id)),
                int_cell(10 * (id % 3 + 1)),
                if id % 2 == 0 {
                    Value::Null
                } else {
                    Value::Bytes(vec![id as u8; 4])
                },
            ]
        })
        .collect()
}

pub fn employee_result(count: i64) -> QueryResult {
    table_result(employee_columns(), employee_rows(count))
}

pub fn employee_metadata() -> FakeMetadata {
    FakeMetadata::new()
        .with_primary_keys(&["ID"])
        .with_foreign_key(ForeignKeyConstraint::new("DEPT_ID", "DEPARTMENT", "ID"))
        .with_attributes(vec![
            ColumnAttributes::new("ID", false, true),
            ColumnAttributes::new("NAME", false, true),
            ColumnAttributes::new("DEPT_ID", false, true),
            ColumnAttributes::new("PHOTO", false, true),
        ])
        .with_columns(employee_columns())
}

pub fn department_result(ids: &[i64]) -> QueryResult {
    table_result(
        vec![column("ID", SqlType::Integer, false)],
        ids.iter().map(|id| vec![int_cell(*id)]).collect(),
    )
}
