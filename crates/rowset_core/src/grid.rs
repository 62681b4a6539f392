use crate::cell::{Cell, LobPayload};
use crate::change::TableDataChange;
use crate::column::{ColumnDescriptor, TableConstraints};
use crate::config::GridConfig;
use crate::traits::InlineLob;
use crate::{RowsetError, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A grid shared between the interactive side and background tasks.
///
/// The mutex is the per-grid exclusion lock: reloads and edits never
/// interleave.
pub type SharedGrid = Arc<Mutex<GridState>>;

pub fn shared_grid(config: &GridConfig) -> SharedGrid {
    Arc::new(Mutex::new(GridState::new(config)))
}

/// Lock a shared grid, recovering the state if a previous holder panicked.
pub fn lock_grid(grid: &SharedGrid) -> MutexGuard<'_, GridState> {
    grid.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Raw value for one cell of a row being loaded.
#[derive(Debug)]
pub enum CellInput {
    Value(Value),
    Lob(LobPayload),
}

impl From<Value> for CellInput {
    fn from(value: Value) -> Self {
        CellInput::Value(value)
    }
}

impl From<LobPayload> for CellInput {
    fn from(payload: LobPayload) -> Self {
        CellInput::Lob(payload)
    }
}

/// Rows, columns and pending edits of one result grid.
#[derive(Debug)]
pub struct GridState {
    columns: Vec<Arc<ColumnDescriptor>>,
    rows: Vec<Vec<Cell>>,
    constraints: TableConstraints,
    max_rows: usize,
    truncated: bool,
    pending: BTreeMap<usize, TableDataChange>,
}

impl GridState {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            constraints: TableConstraints::default(),
            max_rows: config.max_rows,
            truncated: false,
            pending: BTreeMap::new(),
        }
    }

    /// Replace the whole grid with freshly loaded rows.
    ///
    /// Rows past the configured ceiling are not materialized. A row whose
    /// length differs from the column count rejects the load and leaves the
    /// grid empty.
    pub fn load<I>(
        &mut self,
        columns: Vec<ColumnDescriptor>,
        constraints: TableConstraints,
        rows: I,
    ) -> Result<usize, RowsetError>
    where
        I: IntoIterator<Item = Vec<CellInput>>,
    {
        self.clear();

        let columns: Vec<Arc<ColumnDescriptor>> = columns.into_iter().map(Arc::new).collect();
        let mut loaded = Vec::new();
        let mut truncated = false;

        for (row_index, inputs) in rows.into_iter().enumerate() {
            if row_index >= self.max_rows {
                truncated = true;
                break;
            }

            if inputs.len() != columns.len() {
                return Err(RowsetError::RowShape {
                    row: row_index,
                    expected: columns.len(),
                    actual: inputs.len(),
                });
            }

            let row = columns
                .iter()
                .zip(inputs)
                .map(|(column, input)| build_cell(column, row_index, input))
                .collect();
            loaded.push(row);
        }

        if truncated {
            log::info!(
                "[LOAD] Row limit of {} reached, remaining rows not loaded",
                self.max_rows
            );
        }

        self.columns = columns;
        self.rows = loaded;
        self.constraints = constraints;
        self.truncated = truncated;

        Ok(self.rows.len())
    }

    /// Set a cell's value and refresh the pending change for its row.
    pub fn set_value_at(
        &mut self,
        row: usize,
        column: usize,
        value: Value,
    ) -> Result<(), RowsetError> {
        if self.cell(row, column).is_none() {
            return Err(RowsetError::OutOfRange { row, column });
        }

        if !self.is_column_editable(column) {
            return Err(RowsetError::NotEditable(self.columns[column].name.clone()));
        }

        let cell = &mut self.rows[row][column];
        cell.set_value(value)?;

        if cell.is_changed() {
            log::debug!(
                "[EDIT] Change detected in column [ {} ] - value [ {} ]",
                cell.column_name(),
                cell.display_value()
            );
        }

        self.refresh_change(row);
        Ok(())
    }

    pub fn revert_at(&mut self, row: usize, column: usize) -> Result<(), RowsetError> {
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|cells| cells.get_mut(column))
            .ok_or(RowsetError::OutOfRange { row, column })?;

        cell.revert();
        self.refresh_change(row);
        Ok(())
    }

    pub fn revert_all(&mut self) {
        for row in self.rows.iter_mut() {
            for cell in row.iter_mut() {
                cell.revert();
            }
        }
        self.pending.clear();
    }

    fn refresh_change(&mut self, row: usize) {
        let Some(cells) = self.rows.get(row) else {
            return;
        };

        if cells.iter().any(Cell::is_changed) {
            let snapshot = cells.iter().map(Cell::snapshot).collect();
            self.pending
                .insert(row, TableDataChange::new(row, snapshot));
        } else {
            self.pending.remove(&row);
        }
    }

    /// Pending changes in row order.
    pub fn pending_changes(&self) -> Vec<&TableDataChange> {
        self.pending.values().collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Snapshot of a row as it currently stands, changed or not.
    pub fn snapshot_row(&self, row: usize) -> Option<TableDataChange> {
        self.rows
            .get(row)
            .map(|cells| TableDataChange::new(row, cells.iter().map(Cell::snapshot).collect()))
    }

    /// Whether edits to a column are accepted.
    ///
    /// Primary key columns are never editable, whatever the source reports,
    /// and a table without a primary key is read-only.
    pub fn is_column_editable(&self, column: usize) -> bool {
        let Some(descriptor) = self.columns.get(column) else {
            return false;
        };

        self.constraints.has_primary_key()
            && !self.constraints.is_primary_key(&descriptor.name)
            && descriptor.is_source_editable()
            && !descriptor.is_lob()
    }

    pub fn is_editable(&self) -> bool {
        self.constraints.has_primary_key()
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.constraints.is_primary_key(column)
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.constraints.is_foreign_key(column)
    }

    pub fn constraints(&self) -> &TableConstraints {
        &self.constraints
    }

    pub fn columns(&self) -> &[Arc<ColumnDescriptor>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index).map(Arc::as_ref)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn set_max_rows(&mut self, max_rows: usize) {
        self.max_rows = max_rows;
    }

    /// Whether the last load stopped at the row ceiling.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Drop rows, columns and pending changes.
    pub fn clear(&mut self) {
        self.dispose();
        self.rows.clear();
        self.columns.clear();
        self.pending.clear();
        self.constraints = TableConstraints::default();
        self.truncated = false;
    }

    /// Release LOB buffers held by the grid's cells.
    pub fn dispose(&mut self) {
        for row in self.rows.iter_mut() {
            for cell in row.iter_mut() {
                cell.release();
            }
        }
    }
}

/// Apply a user edit to a grid.
pub fn apply_edit(
    grid: &mut GridState,
    row: usize,
    column: usize,
    value: Value,
) -> Result<(), RowsetError> {
    grid.set_value_at(row, column, value)
}

fn build_cell(column: &Arc<ColumnDescriptor>, row_index: usize, input: CellInput) -> Cell {
    match input {
        CellInput::Lob(payload) => Cell::lob(column.clone(), row_index, payload),
        CellInput::Value(value) if column.is_lob() => {
            let payload = match value {
                Value::Null => LobPayload::null(),
                Value::Bytes(bytes) => LobPayload::new(Box::new(InlineLob(bytes))),
                Value::Text(text) => LobPayload::new(Box::new(InlineLob(text.into_bytes()))),
                other => LobPayload::new(Box::new(InlineLob(
                    other.as_display_string().into_bytes(),
                ))),
            };
            Cell::lob(column.clone(), row_index, payload)
        }
        CellInput::Value(value) => Cell::scalar(column.clone(), row_index, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnFlags;
    use crate::sql_type::SqlType;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", SqlType::Integer, "INTEGER"),
            ColumnDescriptor::new("name", SqlType::VarChar, "VARCHAR"),
        ]
    }

    fn keyed() -> TableConstraints {
        TableConstraints::new(vec!["id".to_string()], Vec::new())
    }

    fn rows(n: i64) -> Vec<Vec<CellInput>> {
        (0..n)
            .map(|i| {
                vec![
                    Value::Int(i).into(),
                    Value::Text(format!("row {}", i)).into(),
                ]
            })
            .collect()
    }

    fn loaded_grid() -> GridState {
        let mut grid = GridState::new(&GridConfig::default());
        grid.load(columns(), keyed(), rows(3)).unwrap();
        grid
    }

    #[test]
    fn every_row_matches_column_count() {
        let grid = loaded_grid();
        assert!(grid.rows().iter().all(|r| r.len() == grid.column_count()));
    }

    #[test]
    fn misaligned_row_rejects_load() {
        let mut grid = loaded_grid();
        let bad: Vec<Vec<CellInput>> = vec![vec![Value::Int(1).into()]];

        let err = grid.load(columns(), keyed(), bad).unwrap_err();

        assert!(matches!(
            err,
            RowsetError::RowShape { row: 0, expected: 2, actual: 1 }
        ));
        assert_eq!(grid.row_count(), 0);
    }

    #[test]
    fn rows_past_ceiling_are_not_materialized() {
        let mut grid = GridState::new(&GridConfig { max_rows: 2 });
        let count = grid.load(columns(), keyed(), rows(5)).unwrap();

        assert_eq!(count, 2);
        assert!(grid.is_truncated());
    }

    #[test]
    fn edit_records_single_change_per_row() {
        let mut grid = loaded_grid();

        grid.set_value_at(1, 1, Value::Text("a".into())).unwrap();
        grid.set_value_at(1, 1, Value::Text("b".into())).unwrap();

        let changes = grid.pending_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].row_index(), 1);
        assert_eq!(
            changes[0].cell("name").map(|c| &c.current),
            Some(&Value::Text("b".into()))
        );
    }

    #[test]
    fn changes_come_back_in_row_order() {
        let mut grid = loaded_grid();

        grid.set_value_at(2, 1, Value::Text("x".into())).unwrap();
        grid.set_value_at(0, 1, Value::Text("y".into())).unwrap();

        let order: Vec<usize> = grid.pending_changes().iter().map(|c| c.row_index()).collect();
        assert_eq!(order, vec![0, 2]);
    }

    #[test]
    fn reverting_drops_pending_change() {
        let mut grid = loaded_grid();

        grid.set_value_at(0, 1, Value::Text("x".into())).unwrap();
        grid.revert_at(0, 1).unwrap();

        assert!(!grid.has_changes());
        let cell = grid.cell(0, 1).unwrap();
        assert!(!cell.is_changed());
        assert_eq!(cell.current_value(), Some(&Value::Text("row 0".into())));
    }

    #[test]
    fn primary_key_column_is_never_editable() {
        let mut grid = loaded_grid();
        assert!(grid.column(0).unwrap().is_source_editable());

        let err = grid.set_value_at(0, 0, Value::Int(99)).unwrap_err();

        assert!(matches!(err, RowsetError::NotEditable(name) if name == "id"));
        assert_eq!(grid.cell(0, 0).unwrap().current_value(), Some(&Value::Int(0)));
        assert!(!grid.has_changes());
    }

    #[test]
    fn table_without_primary_key_is_read_only() {
        let mut grid = GridState::new(&GridConfig::default());
        grid.load(columns(), TableConstraints::default(), rows(1))
            .unwrap();

        assert!(!grid.is_editable());
        assert!(grid.set_value_at(0, 1, Value::Text("x".into())).is_err());
    }

    #[test]
    fn generated_column_is_not_editable() {
        let mut cols = columns();
        cols[1] = cols[1].clone().with_flags(ColumnFlags::GENERATED);
        let mut grid = GridState::new(&GridConfig::default());
        grid.load(cols, keyed(), rows(1)).unwrap();

        assert!(!grid.is_column_editable(1));
    }

    #[test]
    fn out_of_range_edit_is_rejected() {
        let mut grid = loaded_grid();
        let err = grid.set_value_at(10, 0, Value::Null).unwrap_err();
        assert!(matches!(err, RowsetError::OutOfRange { row: 10, column: 0 }));
    }

    #[test]
    fn reload_discards_previous_changes() {
        let mut grid = loaded_grid();
        grid.set_value_at(0, 1, Value::Text("x".into())).unwrap();

        grid.load(columns(), keyed(), rows(2)).unwrap();

        assert!(!grid.has_changes());
        assert_eq!(grid.row_count(), 2);
    }

    #[test]
    fn lob_columns_become_lob_cells() {
        let cols = vec![
            ColumnDescriptor::new("id", SqlType::Integer, "INTEGER"),
            ColumnDescriptor::new("data", SqlType::Blob, "BLOB"),
        ];
        let mut grid = GridState::new(&GridConfig::default());
        grid.load(
            cols,
            keyed(),
            vec![
                vec![CellInput::from(Value::Int(1)), Value::Bytes(vec![0x0A]).into()],
                vec![CellInput::from(Value::Int(2)), Value::Null.into()],
            ],
        )
        .unwrap();

        assert!(grid.cell(0, 1).unwrap().is_lob());
        assert_eq!(grid.cell(0, 1).unwrap().as_binary_string().as_deref(), Some("0A"));
        assert!(grid.cell(1, 1).unwrap().is_null());
        assert!(!grid.is_column_editable(1));
    }

    #[test]
    fn apply_edit_delegates_to_grid() {
        let mut grid = loaded_grid();
        apply_edit(&mut grid, 0, 1, Value::Text("z".into())).unwrap();
        assert!(grid.has_changes());
    }
}
