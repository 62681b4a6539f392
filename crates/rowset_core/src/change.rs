use crate::Value;
use crate::sql_type::SqlType;

/// Frozen copy of one cell, taken when its row was detected as changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSnapshot {
    pub column: String,
    pub sql_type: SqlType,

    /// Value loaded from the database.
    pub original: Value,

    /// Value after the user's edits.
    pub current: Value,

    pub changed: bool,

    /// LOB cells carry no comparable value and are left out of predicates.
    pub lob: bool,
}

/// Immutable snapshot of a row with at least one changed cell.
///
/// The grid keeps at most one change per row; a newer snapshot of the same
/// row replaces the older one.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDataChange {
    row_index: usize,
    cells: Vec<CellSnapshot>,
}

impl TableDataChange {
    pub fn new(row_index: usize, cells: Vec<CellSnapshot>) -> Self {
        Self { row_index, cells }
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn cells(&self) -> &[CellSnapshot] {
        &self.cells
    }

    pub fn changed_cells(&self) -> impl Iterator<Item = &CellSnapshot> {
        self.cells.iter().filter(|cell| cell.changed)
    }

    pub fn has_changes(&self) -> bool {
        self.cells.iter().any(|cell| cell.changed)
    }

    pub fn cell(&self, column: &str) -> Option<&CellSnapshot> {
        self.cells.iter().find(|cell| cell.column == column)
    }
}
