use rowset_export::WorkbookBuilder;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// What a [`RecordingWorkbook`] was asked to build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookRecord {
    pub sheets: Vec<String>,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    pub written: bool,
}

/// Workbook builder that records calls and writes rows as tab-separated text.
///
/// Clones share one record, so a test can keep a clone and inspect it after
/// handing another to the export engine.
#[derive(Clone, Default)]
pub struct RecordingWorkbook {
    record: Arc<Mutex<WorkbookRecord>>,
}

impl RecordingWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> WorkbookRecord {
        lock(&self.record).clone()
    }
}

impl WorkbookBuilder for RecordingWorkbook {
    fn create_sheet(&mut self, name: &str) {
        lock(&self.record).sheets.push(name.to_string());
    }

    fn add_row_header(&mut self, headers: &[String]) {
        lock(&self.record).header = Some(headers.to_vec());
    }

    fn add_row(&mut self, values: &[String]) {
        lock(&self.record).rows.push(values.to_vec());
    }

    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let mut record = lock(&self.record);

        if let Some(header) = &record.header {
            writeln!(out, "{}", header.join("\t"))?;
        }
        for row in &record.rows {
            writeln!(out, "{}", row.join("\t"))?;
        }

        record.written = true;
        Ok(())
    }
}

fn lock(record: &Mutex<WorkbookRecord>) -> MutexGuard<'_, WorkbookRecord> {
    match record.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
