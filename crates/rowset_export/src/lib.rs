mod delimited;
mod engine;
mod spreadsheet;
mod xml;

use rowset_core::{Cell, ExportDefaults, RowsetError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use delimited::DelimitedExporter;
pub use engine::ExportEngine;
pub use spreadsheet::{SPREADSHEET_SHEET_NAME, SpreadsheetExporter, WorkbookBuilder};
pub use xml::{ResultSetXmlWriter, XmlWriter};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Export failed: {0}")]
    Failed(String),
}

impl From<ExportError> for RowsetError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Cancelled => RowsetError::Cancelled,
            ExportError::Validation(message) => RowsetError::Validation(message),
            other => RowsetError::ExecutionFailure(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Delimited,
    Spreadsheet,
    Xml,
}

impl ExportFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Delimited => "Delimited File",
            Self::Spreadsheet => "Excel Spreadsheet",
            Self::Xml => "XML",
        }
    }

    /// Extension appended to destinations that lack it. Delimited files
    /// keep whatever name they were given.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Delimited => None,
            Self::Spreadsheet => Some("xls"),
            Self::Xml => Some("xml"),
        }
    }

    /// Whether a header row can be requested for this format.
    pub fn supports_headers(self) -> bool {
        !matches!(self, Self::Xml)
    }
}

/// Append the format's extension when the path does not already end in it.
pub fn with_default_extension(path: &Path, format: ExportFormat) -> PathBuf {
    let Some(extension) = format.extension() else {
        return path.to_path_buf();
    };

    if path.extension().is_some_and(|ext| ext == extension) {
        return path.to_path_buf();
    }

    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiter {
    Pipe,
    Comma,
    Semicolon,
    Hash,
    Custom(String),
}

impl Delimiter {
    /// Map a configured delimiter string onto a preset where one matches.
    pub fn from_setting(value: &str) -> Self {
        match value {
            "|" => Self::Pipe,
            "," => Self::Comma,
            ";" => Self::Semicolon,
            "#" => Self::Hash,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The single byte written between fields.
    pub fn as_byte(&self) -> Result<u8, ExportError> {
        match self {
            Self::Pipe => Ok(b'|'),
            Self::Comma => Ok(b','),
            Self::Semicolon => Ok(b';'),
            Self::Hash => Ok(b'#'),
            Self::Custom(value) => match value.as_bytes() {
                [] => Err(ExportError::Validation(
                    "You must enter a custom delimiter".to_string(),
                )),
                [byte] if byte.is_ascii() => Ok(*byte),
                _ => Err(ExportError::Validation(format!(
                    "Custom delimiter must be a single ASCII character, got '{}'",
                    value
                ))),
            },
        }
    }
}

/// Parameters of one export, built per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub destination: PathBuf,
    pub delimiter: Delimiter,
    pub include_headers: bool,
    pub quote_text_types: bool,
}

impl ExportRequest {
    pub fn new(format: ExportFormat, destination: impl Into<PathBuf>) -> Self {
        Self::from_defaults(&ExportDefaults::default(), format, destination)
    }

    pub fn from_defaults(
        defaults: &ExportDefaults,
        format: ExportFormat,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            format,
            destination: destination.into(),
            delimiter: Delimiter::from_setting(&defaults.delimiter),
            include_headers: defaults.include_headers,
            quote_text_types: defaults.quote_text_types,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, include_headers: bool) -> Self {
        self.include_headers = include_headers;
        self
    }

    pub fn with_quoting(mut self, quote_text_types: bool) -> Self {
        self.quote_text_types = quote_text_types;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Validating,
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed(_))
    }
}

impl From<&ExportError> for ExportState {
    fn from(err: &ExportError) -> Self {
        match err {
            ExportError::Cancelled => ExportState::Cancelled,
            other => ExportState::Failed(other.to_string()),
        }
    }
}

/// Reported after every written row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub rows_completed: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub format: ExportFormat,
    pub destination: PathBuf,
    pub rows_written: usize,
    pub state: ExportState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteChoice {
    Overwrite,
    Cancel,
    ChooseAnother,
}

/// Asked before an existing destination file is replaced.
pub trait OverwritePrompt: Send + Sync {
    fn confirm_overwrite(&self, path: &Path) -> OverwriteChoice;
}

/// A fixed answer, for non-interactive callers.
impl OverwritePrompt for OverwriteChoice {
    fn confirm_overwrite(&self, _path: &Path) -> OverwriteChoice {
        *self
    }
}

/// Exported text of a cell: empty for null, the display value otherwise.
pub(crate) fn cell_text(cell: &Cell) -> String {
    if cell.is_null() {
        String::new()
    } else {
        cell.display_value()
    }
}
