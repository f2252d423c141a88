//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    pub level: String,

    /// Console log format
    pub format: LogFormat,

    /// Base directory for log files; console only when `None`
    pub file_dir: Option<PathBuf>,

    /// Remove run folders older than this many days (default: 30)
    pub retention_days: Option<u64>,

    /// Keep at most this many run folders (default: 10)
    pub retention_runs: Option<usize>,
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
            file_dir: None,
            retention_days: None,
            retention_runs: None,
        }
    }
}
