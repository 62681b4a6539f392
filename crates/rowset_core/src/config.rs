use crate::RowsetError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// Settings handed to every component at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsetConfig {
    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub export: ExportDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Rows past this count are not materialized on load.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

/// Initial values of an export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDefaults {
    #[serde(default)]
    pub include_headers: bool,

    #[serde(default = "default_true")]
    pub quote_text_types: bool,

    /// Single-character delimiter for delimited exports.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            include_headers: false,
            quote_text_types: true,
            delimiter: default_delimiter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> String {
    "|".to_string()
}

/// Reads and writes `config.json` in the user's config directory.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self, RowsetError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| std::io::Error::other("Could not find config directory"))?;

        let app_dir = config_dir.join("rowset");
        fs::create_dir_all(&app_dir)?;

        Ok(Self {
            path: app_dir.join("config.json"),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<RowsetConfig, RowsetError> {
        if !self.path.exists() {
            return Ok(RowsetConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: RowsetConfig = serde_json::from_str(&content)
            .map_err(|e| RowsetError::Validation(format!("Invalid config file: {}", e)))?;

        Ok(config)
    }

    pub fn save(&self, config: &RowsetConfig) -> Result<(), RowsetError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| RowsetError::Validation(e.to_string()))?;
        fs::write(&self.path, content)?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
