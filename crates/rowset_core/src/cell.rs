use crate::change::CellSnapshot;
use crate::column::ColumnDescriptor;
use crate::sql_type::SqlType;
use crate::traits::LobLoader;
use crate::{RowsetError, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Number of leading bytes rendered by [`hex_dump`] for a LOB cell.
pub const LOB_HEX_BYTE_BUDGET: usize = 496;

/// Render bytes as space-separated uppercase hex pairs.
///
/// At most `budget` bytes are rendered; a trailing `..` marks a payload that
/// was longer than the budget.
pub fn hex_dump(data: &[u8], budget: usize) -> String {
    let shown = &data[..data.len().min(budget)];

    let mut out = shown
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ");

    if data.len() > budget {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str("..");
    }

    out
}

/// Lazily materialized bytes of a large object.
///
/// The loader runs at most once per payload lifetime; a failed read is
/// logged and cached as an empty buffer.
pub struct LobPayload {
    null: bool,
    loader: Option<Box<dyn LobLoader>>,
    bytes: OnceLock<Vec<u8>>,
}

impl LobPayload {
    pub fn new(loader: Box<dyn LobLoader>) -> Self {
        Self {
            null: false,
            loader: Some(loader),
            bytes: OnceLock::new(),
        }
    }

    pub fn null() -> Self {
        Self {
            null: true,
            loader: None,
            bytes: OnceLock::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn is_loaded(&self) -> bool {
        self.bytes.get().is_some()
    }

    /// Bytes of the payload, fetching them on first access.
    pub fn data(&self) -> &[u8] {
        self.bytes.get_or_init(|| {
            let Some(loader) = self.loader.as_ref() else {
                return Vec::new();
            };

            match loader.read_lob() {
                Ok(bytes) => {
                    log::debug!("[LOB] Loaded {} bytes", bytes.len());
                    bytes
                }
                Err(e) => {
                    log::warn!("[LOB] Failed to read large object: {}", e);
                    Vec::new()
                }
            }
        })
    }

    /// Length of the materialized payload; zero until loaded.
    pub fn len(&self) -> usize {
        self.bytes.get().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the cached buffer and the loader holding the database resource.
    pub fn release(&mut self) {
        self.bytes = OnceLock::new();
        self.loader = None;
    }
}

impl fmt::Debug for LobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobPayload")
            .field("null", &self.null)
            .field("has_loader", &self.loader.is_some())
            .field("loaded_len", &self.bytes.get().map(Vec::len))
            .finish()
    }
}

/// What a cell holds, by value kind.
#[derive(Debug)]
pub enum CellContent {
    Scalar { original: Value, current: Value },
    Lob(LobPayload),
}

/// One column's value for one row of a grid.
#[derive(Debug)]
pub struct Cell {
    column: Arc<ColumnDescriptor>,
    row_index: usize,
    content: CellContent,
    changed: bool,
}

impl Cell {
    pub fn scalar(column: Arc<ColumnDescriptor>, row_index: usize, value: Value) -> Self {
        Self {
            column,
            row_index,
            content: CellContent::Scalar {
                original: value.clone(),
                current: value,
            },
            changed: false,
        }
    }

    pub fn lob(column: Arc<ColumnDescriptor>, row_index: usize, payload: LobPayload) -> Self {
        Self {
            column,
            row_index,
            content: CellContent::Lob(payload),
            changed: false,
        }
    }

    pub fn column(&self) -> &ColumnDescriptor {
        &self.column
    }

    pub fn column_name(&self) -> &str {
        &self.column.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.column.sql_type
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub fn is_lob(&self) -> bool {
        matches!(self.content, CellContent::Lob(_))
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Current value of a scalar cell; `None` for LOB cells.
    pub fn current_value(&self) -> Option<&Value> {
        match &self.content {
            CellContent::Scalar { current, .. } => Some(current),
            CellContent::Lob(_) => None,
        }
    }

    /// Value loaded from the database; `None` for LOB cells.
    pub fn original_value(&self) -> Option<&Value> {
        match &self.content {
            CellContent::Scalar { original, .. } => Some(original),
            CellContent::Lob(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        match &self.content {
            CellContent::Scalar { current, .. } => current.is_null(),
            CellContent::Lob(payload) => payload.is_null(),
        }
    }

    /// Replace the current value and recompute the change flag.
    ///
    /// LOB cells are read-only in the grid.
    pub fn set_value(&mut self, value: Value) -> Result<(), RowsetError> {
        match &mut self.content {
            CellContent::Scalar { original, current } => {
                self.changed = value != *original;
                *current = value;
                Ok(())
            }
            CellContent::Lob(_) => Err(RowsetError::NotEditable(self.column.name.clone())),
        }
    }

    /// Restore the value loaded from the database.
    pub fn revert(&mut self) {
        if let CellContent::Scalar { original, current } = &mut self.content {
            *current = original.clone();
        }
        self.changed = false;
    }

    /// Bytes of a LOB cell, fetched on first access. `None` for scalar cells.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.content {
            CellContent::Lob(payload) => Some(payload.data()),
            CellContent::Scalar { .. } => None,
        }
    }

    /// Hex dump of a LOB cell, truncated at [`LOB_HEX_BYTE_BUDGET`] bytes.
    pub fn as_binary_string(&self) -> Option<String> {
        self.data()
            .map(|bytes| hex_dump(bytes, LOB_HEX_BYTE_BUDGET))
    }

    /// Text shown for the cell. Null cells render as `NULL`.
    pub fn display_value(&self) -> String {
        match &self.content {
            CellContent::Scalar { current, .. } => current.as_display_string(),
            CellContent::Lob(payload) if payload.is_null() => Value::Null.as_display_string(),
            CellContent::Lob(payload) => hex_dump(payload.data(), LOB_HEX_BYTE_BUDGET),
        }
    }

    pub fn snapshot(&self) -> CellSnapshot {
        let (original, current) = match &self.content {
            CellContent::Scalar { original, current } => (original.clone(), current.clone()),
            CellContent::Lob(_) => (Value::Null, Value::Null),
        };

        CellSnapshot {
            column: self.column.name.clone(),
            sql_type: self.column.sql_type,
            original,
            current,
            changed: self.changed,
            lob: self.is_lob(),
        }
    }

    /// Release any cached LOB buffer held by the cell.
    pub fn release(&mut self) {
        if let CellContent::Lob(payload) = &mut self.content {
            payload.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        bytes: Vec<u8>,
        reads: Arc<AtomicUsize>,
    }

    impl LobLoader for CountingLoader {
        fn read_lob(&self) -> Result<Vec<u8>, DbError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    struct FailingLoader;

    impl LobLoader for FailingLoader {
        fn read_lob(&self) -> Result<Vec<u8>, DbError> {
            Err(DbError::query_failed("cursor closed"))
        }
    }

    fn text_column() -> Arc<ColumnDescriptor> {
        Arc::new(ColumnDescriptor::new("name", SqlType::VarChar, "VARCHAR"))
    }

    fn blob_column() -> Arc<ColumnDescriptor> {
        Arc::new(ColumnDescriptor::new("data", SqlType::Blob, "BLOB"))
    }

    #[test]
    fn set_value_then_revert_restores_original() {
        let mut cell = Cell::scalar(text_column(), 0, Value::Text("a".into()));

        cell.set_value(Value::Text("b".into())).unwrap();
        assert!(cell.is_changed());

        cell.revert();
        assert!(!cell.is_changed());
        assert_eq!(cell.current_value(), Some(&Value::Text("a".into())));
    }

    #[test]
    fn setting_back_to_original_clears_changed() {
        let mut cell = Cell::scalar(text_column(), 0, Value::Text("a".into()));

        cell.set_value(Value::Text("b".into())).unwrap();
        cell.set_value(Value::Text("a".into())).unwrap();

        assert!(!cell.is_changed());
    }

    #[test]
    fn null_reporting_follows_current_value() {
        let mut cell = Cell::scalar(text_column(), 0, Value::Text("a".into()));
        assert!(!cell.is_null());

        cell.set_value(Value::Null).unwrap();
        assert!(cell.is_null());
        assert!(cell.is_changed());
    }

    #[test]
    fn lob_is_fetched_exactly_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let payload = LobPayload::new(Box::new(CountingLoader {
            bytes: vec![1, 2, 3],
            reads: reads.clone(),
        }));
        let cell = Cell::lob(blob_column(), 0, payload);

        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(cell.data(), Some(&[1u8, 2, 3][..]));
        assert_eq!(cell.data(), Some(&[1u8, 2, 3][..]));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_lob_read_caches_empty_payload() {
        let cell = Cell::lob(blob_column(), 0, LobPayload::new(Box::new(FailingLoader)));

        assert_eq!(cell.data(), Some(&[][..]));
        assert_eq!(cell.as_binary_string().as_deref(), Some(""));
    }

    #[test]
    fn lob_cells_reject_edits() {
        let mut cell = Cell::lob(blob_column(), 0, LobPayload::null());

        let err = cell.set_value(Value::Bytes(vec![1])).unwrap_err();
        assert!(matches!(err, RowsetError::NotEditable(name) if name == "data"));
        assert!(cell.is_null());
    }

    #[test]
    fn hex_dump_truncates_at_budget() {
        let data = vec![0xABu8; 1000];
        let rendered = hex_dump(&data, LOB_HEX_BYTE_BUDGET);

        assert!(rendered.ends_with(" .."));
        let pairs: Vec<&str> = rendered.trim_end_matches(" ..").split(' ').collect();
        assert_eq!(pairs.len(), 496);
        assert!(pairs.iter().all(|p| *p == "AB"));
    }

    #[test]
    fn hex_dump_of_short_payload_has_no_marker() {
        let data: Vec<u8> = (0..10).collect();
        let rendered = hex_dump(&data, LOB_HEX_BYTE_BUDGET);

        assert_eq!(rendered, "00 01 02 03 04 05 06 07 08 09");
    }

    #[test]
    fn hex_dump_pads_single_digit_bytes() {
        assert_eq!(hex_dump(&[0x0A], LOB_HEX_BYTE_BUDGET), "0A");
        assert_eq!(hex_dump(&[0xFF, 0x00], LOB_HEX_BYTE_BUDGET), "FF 00");
    }

    #[test]
    fn payload_of_exactly_budget_is_not_marked() {
        let data = vec![0x01u8; LOB_HEX_BYTE_BUDGET];
        assert!(!hex_dump(&data, LOB_HEX_BYTE_BUDGET).ends_with(".."));
    }

    #[test]
    fn release_drops_cached_bytes() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut payload = LobPayload::new(Box::new(CountingLoader {
            bytes: vec![9; 4],
            reads,
        }));

        assert_eq!(payload.data().len(), 4);
        assert_eq!(payload.len(), 4);

        payload.release();
        assert!(!payload.is_loaded());
        assert_eq!(payload.len(), 0);
    }
}
