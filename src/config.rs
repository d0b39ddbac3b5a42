//! Engine settings, loadable from JSON.
use crate::store::registry::DEFAULT_TIME_FORMAT;
use crate::store::Registry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What a matrix build does when one record fails to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// The whole build fails with the record's error.
    #[default]
    Abort,
    /// The record is left out of the matrix and a warning is logged.
    SkipRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// strftime-style format given to views created in a registry built by
    /// [`EngineConfig::new_registry`]. Existing views keep their own format.
    pub default_time_format: String,
    /// Caches (record, indicator) values for the duration of one build.
    pub memoize: bool,
    pub on_row_error: RowErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_time_format: DEFAULT_TIME_FORMAT.to_string(),
            memoize: true,
            on_row_error: RowErrorPolicy::Abort,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// An empty registry honoring `default_time_format`.
    pub fn new_registry(&self) -> Registry {
        Registry::with_time_format(self.default_time_format.clone())
    }
}
