use crate::{ExportError, ExportProgress, cell_text};
use rowset_core::{CancelToken, GridState};
use std::io::{self, Write};

pub const SPREADSHEET_SHEET_NAME: &str = "Result Set Export";

/// Accumulates rows into a workbook and serializes it in one go.
pub trait WorkbookBuilder: Send {
    fn create_sheet(&mut self, name: &str);

    fn add_row_header(&mut self, headers: &[String]);

    fn add_row(&mut self, values: &[String]);

    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()>;
}

/// Writes a grid as a single-sheet workbook.
pub struct SpreadsheetExporter {
    pub include_headers: bool,
}

impl SpreadsheetExporter {
    pub fn export(
        &self,
        grid: &GridState,
        builder: &mut dyn WorkbookBuilder,
        out: &mut dyn Write,
        token: &CancelToken,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<usize, ExportError> {
        builder.create_sheet(SPREADSHEET_SHEET_NAME);

        if self.include_headers {
            let headers: Vec<String> = grid.column_names().into_iter().map(String::from).collect();
            builder.add_row_header(&headers);
        }

        let total_rows = grid.row_count();
        let mut values = Vec::with_capacity(grid.column_count());
        let mut written = 0;

        for row in grid.rows() {
            if token.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            values.clear();
            values.extend(row.iter().map(cell_text));
            builder.add_row(&values);

            written += 1;
            progress(ExportProgress {
                rows_completed: written,
                total_rows,
            });
        }

        builder.write_to(out)?;
        Ok(written)
    }
}
