//! Application settings: defaults, then a TOML file, then the environment.
//!
//! ```toml
//! db_url = "sqlite://exam.sqlite3"
//! points_per_question = 5
//! outbox_capacity = 32
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use exam_core::model::POINTS_PER_QUESTION;
use services::outbox::DEFAULT_OUTBOX_CAPACITY;

pub const DEFAULT_DB_URL: &str = "sqlite://exam.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_url: String,
    pub points_per_question: u32,
    pub outbox_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.into(),
            points_per_question: POINTS_PER_QUESTION,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load from `EXAM_CONFIG` (if set), then apply `EXAM_DB_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the named file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("EXAM_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_path(path.trim())?,
            _ => Self::default(),
        };
        match std::env::var("EXAM_DB_URL") {
            Ok(url) if !url.trim().is_empty() => config.db_url = url,
            _ => {}
        }
        Ok(config)
    }

    /// Parse a TOML file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
