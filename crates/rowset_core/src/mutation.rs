use crate::change::{CellSnapshot, TableDataChange};
use crate::grid::GridState;
use crate::sql_dialect::SqlDialect;
use crate::sql_type::SqlType;
use crate::traits::StatementExecutor;
use crate::{QueryKind, QueryResult, RowsetError};

/// One column of a row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertField {
    pub column: String,
    pub sql_type: SqlType,

    /// Text entered for the column. `None` and empty text both insert `NULL`.
    pub value: Option<String>,
}

impl InsertField {
    pub fn new(column: impl Into<String>, sql_type: SqlType, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            sql_type,
            value,
        }
    }
}

/// Builds INSERT, UPDATE and DELETE statements for grid rows.
pub struct MutationSynthesizer<'a> {
    dialect: &'a dyn SqlDialect,
}

impl<'a> MutationSynthesizer<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// `INSERT INTO table (c1, c2) VALUES (v1, v2)`.
    pub fn build_insert(&self, table: &str, fields: &[InsertField]) -> Result<String, RowsetError> {
        if fields.is_empty() {
            return Err(RowsetError::Validation(format!(
                "No insertable columns in {}",
                table
            )));
        }

        let columns: Vec<String> = fields
            .iter()
            .map(|f| self.dialect.quote_identifier(&f.column))
            .collect();

        let values: Vec<String> = fields
            .iter()
            .map(|f| {
                let text = f.value.as_deref().filter(|v| !v.is_empty());
                self.dialect.literal(text, f.sql_type)
            })
            .collect();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_identifier(table),
            columns.join(", "),
            values.join(", ")
        ))
    }

    /// Pair the grid's insertable columns with entered values.
    ///
    /// `values` is indexed like the grid's columns. Generated columns are
    /// skipped whatever was entered for them.
    pub fn insert_fields(
        &self,
        grid: &GridState,
        values: &[Option<String>],
    ) -> Result<Vec<InsertField>, RowsetError> {
        if values.len() != grid.column_count() {
            return Err(RowsetError::Validation(format!(
                "Expected {} values, got {}",
                grid.column_count(),
                values.len()
            )));
        }

        Ok(grid
            .columns()
            .iter()
            .zip(values)
            .filter(|(column, _)| !column.is_generated())
            .map(|(column, value)| InsertField::new(&column.name, column.sql_type, value.clone()))
            .collect())
    }

    /// Delete exactly one row matching the loaded values of `row`.
    ///
    /// `DELETE FROM t WHERE (c1 = v1) AND (c2 IS NULL) ORDER BY <last> ROWS 1`.
    /// LOB columns are left out of the predicate and never used as the
    /// ordering column; `<last>` is the last non-LOB column.
    pub fn build_delete(&self, table: &str, row: &TableDataChange) -> Result<String, RowsetError> {
        let comparable: Vec<&CellSnapshot> = row.cells().iter().filter(|cell| !cell.lob).collect();

        let Some(last) = comparable.last() else {
            return Err(RowsetError::Validation(format!(
                "Row {} has no comparable columns",
                row.row_index()
            )));
        };

        let predicates: Vec<String> = comparable.iter().map(|cell| self.predicate(cell)).collect();

        Ok(format!(
            "DELETE FROM {} WHERE {} ORDER BY {} {}",
            self.dialect.quote_identifier(table),
            predicates.join(" AND "),
            self.dialect.quote_identifier(&last.column),
            self.dialect.row_limit_clause(1)
        ))
    }

    /// `UPDATE t SET c = v WHERE (pk = v)` for the changed cells of a row.
    ///
    /// Returns `None` when nothing changed or the row cannot be keyed.
    pub fn build_update(
        &self,
        table: &str,
        change: &TableDataChange,
        primary_keys: &[String],
    ) -> Option<String> {
        if primary_keys.is_empty() {
            return None;
        }

        let assignments: Vec<String> = change
            .changed_cells()
            .filter(|cell| !cell.lob)
            .map(|cell| {
                format!(
                    "{} = {}",
                    self.dialect.quote_identifier(&cell.column),
                    self.dialect.value_to_literal(&cell.current, cell.sql_type)
                )
            })
            .collect();

        if assignments.is_empty() {
            return None;
        }

        let mut predicates = Vec::with_capacity(primary_keys.len());
        for pk in primary_keys {
            predicates.push(self.predicate(change.cell(pk)?));
        }

        Some(format!(
            "UPDATE {} SET {} WHERE {}",
            self.dialect.quote_identifier(table),
            assignments.join(", "),
            predicates.join(" AND ")
        ))
    }

    fn predicate(&self, cell: &CellSnapshot) -> String {
        let column = self.dialect.quote_identifier(&cell.column);

        if cell.original.is_null() {
            format!("({} IS NULL)", column)
        } else {
            format!(
                "({} = {})",
                column,
                self.dialect.value_to_literal(&cell.original, cell.sql_type)
            )
        }
    }
}

/// Execute a synthesized statement. Failures are reported, never retried.
pub fn submit(
    executor: &dyn StatementExecutor,
    kind: QueryKind,
    sql: &str,
) -> Result<QueryResult, RowsetError> {
    log::info!("[{}] {}", kind.label(), sql);

    executor.execute(kind, sql).map_err(|e| {
        log::error!("[{}] Statement failed: {}", kind.label(), e);
        RowsetError::from(e)
    })
}
