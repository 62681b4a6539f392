use crate::column::ForeignKeyConstraint;
use crate::sql_dialect::SqlDialect;
use crate::traits::StatementExecutor;
use crate::{QueryKind, Value};

/// Selectable values for a foreign key column.
///
/// The list always ends with `None`, the "no value" choice, even when the
/// lookup failed and nothing else was collected.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDomain {
    pub constraint: ForeignKeyConstraint,
    pub values: Vec<Option<Value>>,
}

impl ForeignKeyDomain {
    pub fn column(&self) -> &str {
        &self.constraint.column_name
    }

    /// Values excluding the trailing null choice.
    pub fn choices(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().flatten()
    }
}

/// Fetches the distinct referenced values behind foreign key columns.
pub struct ForeignKeyResolver<'a> {
    executor: &'a dyn StatementExecutor,
    dialect: &'a dyn SqlDialect,
}

impl<'a> ForeignKeyResolver<'a> {
    pub fn new(executor: &'a dyn StatementExecutor, dialect: &'a dyn SqlDialect) -> Self {
        Self { executor, dialect }
    }

    pub fn resolve(&self, constraint: &ForeignKeyConstraint) -> ForeignKeyDomain {
        let sql = format!(
            "SELECT DISTINCT {} FROM {} ORDER BY 1",
            self.dialect.quote_identifier(&constraint.referenced_column),
            self.dialect.quote_identifier(&constraint.referenced_table)
        );

        log::debug!("[FK] {}", sql);

        let mut values: Vec<Option<Value>> = Vec::new();

        match self.executor.execute(QueryKind::Select, &sql) {
            Ok(result) => {
                for row in result.rows {
                    let Some(value) = row.into_iter().next() else {
                        continue;
                    };

                    if values.last() != Some(&Some(value.clone())) {
                        values.push(Some(value));
                    }
                }
            }
            Err(e) => {
                log::error!(
                    "[FK] Failed to load values of {}.{}: {}",
                    constraint.referenced_table,
                    constraint.referenced_column,
                    e
                );
            }
        }

        values.push(None);

        ForeignKeyDomain {
            constraint: constraint.clone(),
            values,
        }
    }

    /// One domain per constraint, in constraint order.
    pub fn resolve_all(&self, constraints: &[ForeignKeyConstraint]) -> Vec<ForeignKeyDomain> {
        constraints.iter().map(|fk| self.resolve(fk)).collect()
    }
}
