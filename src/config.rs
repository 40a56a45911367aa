use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ImportError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Directory scanned for .xlsx/.xls files
    pub source_dir: PathBuf,
    /// SQLite database the records are upserted into
    pub database: PathBuf,
    /// Worksheet to read; defaults to the first sheet of each workbook
    pub sheet: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data"),
            database: PathBuf::from("captures.db"),
            sheet: None,
        }
    }
}

impl Config {
    /// Loads the config from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
