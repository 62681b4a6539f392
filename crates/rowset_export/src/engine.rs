use crate::{
    DelimitedExporter, ExportError, ExportFormat, ExportProgress, ExportReport, ExportRequest,
    ExportState, OverwriteChoice, OverwritePrompt, ResultSetXmlWriter, SpreadsheetExporter,
    WorkbookBuilder, XmlWriter,
};
use rowset_core::{
    CancelToken, GridState, RowsetError, SharedGrid, TaskCallbacks, TaskHandle, TaskKind,
    TaskRunner, lock_grid,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

type WorkbookFactory = Arc<dyn Fn() -> Box<dyn WorkbookBuilder> + Send + Sync>;

/// Runs exports of a grid to a file.
///
/// Spreadsheet export is only available once a workbook factory is set.
#[derive(Clone)]
pub struct ExportEngine {
    workbooks: Option<WorkbookFactory>,
    xml_writer: Arc<dyn XmlWriter>,
}

impl Default for ExportEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportEngine {
    pub fn new() -> Self {
        Self {
            workbooks: None,
            xml_writer: Arc::new(ResultSetXmlWriter),
        }
    }

    pub fn with_workbooks(
        mut self,
        factory: impl Fn() -> Box<dyn WorkbookBuilder> + Send + Sync + 'static,
    ) -> Self {
        self.workbooks = Some(Arc::new(factory));
        self
    }

    pub fn with_xml_writer(mut self, writer: Arc<dyn XmlWriter>) -> Self {
        self.xml_writer = writer;
        self
    }

    pub fn supports(&self, format: ExportFormat) -> bool {
        match format {
            ExportFormat::Spreadsheet => self.workbooks.is_some(),
            ExportFormat::Delimited | ExportFormat::Xml => true,
        }
    }

    /// Validate the request, then write the grid to its destination.
    ///
    /// Output already written when the export is cancelled or fails is left
    /// in place.
    pub fn run(
        &self,
        grid: &GridState,
        request: &ExportRequest,
        prompt: &dyn OverwritePrompt,
        token: &CancelToken,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<ExportReport, ExportError> {
        log::debug!(
            "[EXPORT] Validating export to {}",
            request.destination.display()
        );
        self.validate(request, prompt)?;
        token.check().map_err(|_| ExportError::Cancelled)?;

        log::info!(
            "[EXPORT] Writing {} rows as {} to {}",
            grid.row_count(),
            request.format.name(),
            request.destination.display()
        );

        let result = self.write(grid, request, token, progress);

        match &result {
            Ok(rows) => log::info!("[EXPORT] Completed, {} rows written", rows),
            Err(ExportError::Cancelled) => log::info!("[EXPORT] Cancelled"),
            Err(e) => log::error!("[EXPORT] Failed: {}", e),
        }

        Ok(ExportReport {
            format: request.format,
            destination: request.destination.clone(),
            rows_written: result?,
            state: ExportState::Completed,
        })
    }

    fn validate(
        &self,
        request: &ExportRequest,
        prompt: &dyn OverwritePrompt,
    ) -> Result<(), ExportError> {
        if request.destination.as_os_str().is_empty() {
            return Err(ExportError::Validation(
                "You must specify a file to export to".to_string(),
            ));
        }

        if request.format == ExportFormat::Delimited {
            request.delimiter.as_byte()?;
        }

        if !self.supports(request.format) {
            return Err(ExportError::Validation(format!(
                "{} export is not available",
                request.format.name()
            )));
        }

        if request.destination.exists() {
            match prompt.confirm_overwrite(&request.destination) {
                OverwriteChoice::Overwrite => {}
                OverwriteChoice::Cancel => return Err(ExportError::Cancelled),
                OverwriteChoice::ChooseAnother => {
                    return Err(ExportError::Validation(format!(
                        "{} already exists, choose another file",
                        request.destination.display()
                    )));
                }
            }
        }

        Ok(())
    }

    fn write(
        &self,
        grid: &GridState,
        request: &ExportRequest,
        token: &CancelToken,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<usize, ExportError> {
        let file = File::create(&request.destination)?;
        let mut out = BufWriter::new(file);

        let written = match request.format {
            ExportFormat::Delimited => {
                let exporter = DelimitedExporter {
                    delimiter: request.delimiter.as_byte()?,
                    include_headers: request.include_headers,
                    quote_text_types: request.quote_text_types,
                };
                exporter.export(grid, &mut out, token, progress)
            }
            ExportFormat::Spreadsheet => {
                let factory = self.workbooks.as_ref().ok_or_else(|| {
                    ExportError::Failed("No workbook builder configured".to_string())
                })?;
                let mut builder = factory();
                let exporter = SpreadsheetExporter {
                    include_headers: request.include_headers,
                };
                exporter.export(grid, builder.as_mut(), &mut out, token, progress)
            }
            ExportFormat::Xml => {
                self.xml_writer.write(grid, &mut out, token).map(|()| {
                    let total_rows = grid.row_count();
                    progress(ExportProgress {
                        rows_completed: total_rows,
                        total_rows,
                    });
                    total_rows
                })
            }
        };

        // Flush even a partial export before reporting.
        let flushed = out.flush();
        let written = written?;
        flushed?;

        Ok(written)
    }

    /// Run an export of a shared grid on a background task.
    ///
    /// The grid stays locked while the export runs, so edits and the next
    /// load on the same grid wait until it finishes or is cancelled.
    pub fn spawn(
        &self,
        runner: &TaskRunner,
        grid: SharedGrid,
        request: ExportRequest,
        prompt: Arc<dyn OverwritePrompt>,
        mut progress: impl FnMut(ExportProgress) + Send + 'static,
        callbacks: TaskCallbacks<ExportReport>,
    ) -> TaskHandle<ExportReport> {
        let engine = self.clone();
        let description = format!("Export to {}", request.destination.display());

        runner.spawn(
            TaskKind::Export,
            description,
            move |token| {
                let grid = lock_grid(&grid);
                engine
                    .run(&grid, &request, prompt.as_ref(), token, &mut progress)
                    .map_err(RowsetError::from)
            },
            callbacks,
        )
    }
}
