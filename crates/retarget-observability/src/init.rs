// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Installs a console layer and, with the `file-logging` feature, a rolling
//! JSON log file under a timestamped run folder:
//!
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── retarget.log
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps background log writers alive; dropping it flushes them
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Initialize the global subscriber
///
/// Crates enabled in `debug_flags` log at debug level; everything else uses
/// `config.level`. Fails if the filter does not parse, the log folder cannot
/// be created, or a global subscriber is already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: LoggingConfig) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with(&config.level);

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(env_filter(&filter)?)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(env_filter(&filter)?)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let mut file_guards = Vec::new();
    #[cfg(feature = "file-logging")]
    let log_dir = match &config.file_dir {
        Some(base_log_dir) => {
            let (layer, guard, run_folder) = file_layer(base_log_dir, &config, &filter)?;
            layers.push(layer);
            file_guards.push(guard);
            Some(run_folder)
        }
        None => None,
    };
    #[cfg(not(feature = "file-logging"))]
    let log_dir: Option<PathBuf> = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    #[cfg(not(feature = "file-logging"))]
    {
        if let Some(dir) = &config.file_dir {
            tracing::warn!(
                "[RETARGET-LOGGING] file_dir {} ignored: built without the file-logging feature",
                dir.display()
            );
        }
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

/// Initialize console logging at info level
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, LoggingConfig::default())
}

fn env_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter: {}", directives))
}

#[cfg(feature = "file-logging")]
fn file_layer(
    base_log_dir: &Path,
    config: &LoggingConfig,
    filter: &str,
) -> Result<(
    BoxedLayer,
    tracing_appender::non_blocking::WorkerGuard,
    PathBuf,
)> {
    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(base_log_dir, config.retention_days, config.retention_runs)?;

    let appender = tracing_appender::rolling::daily(&run_folder, "retarget.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(env_filter(filter)?)
        .boxed();

    Ok((layer, guard, run_folder))
}

/// Remove old `run_*` folders under `base_log_dir`
///
/// Folders older than `retention_days` (default 30) go first; then the oldest
/// remaining ones are removed until at most `retention_runs` (default 10) are
/// left. Entries that are not run folders are never touched. Returns the number
/// of folders removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: Option<u64>,
    retention_runs: Option<usize>,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let retention_days = retention_days.unwrap_or(30);
    let retention_runs = retention_runs.unwrap_or(10);
    let cutoff_date = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
            .and_then(|ts| NaiveDateTime::parse_from_str(ts, RUN_TIMESTAMP_FORMAT).ok());
        if let Some(naive) = started {
            runs.push((path, Utc.from_utc_datetime(&naive)));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);

    let expired = runs.iter().take_while(|(_, dt)| *dt < cutoff_date).count();
    let over_quota = (runs.len() - expired).saturating_sub(retention_runs);

    let mut removed = 0;
    for (path, _) in runs.iter().take(expired + over_quota) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_run(base: &Path, started: DateTime<Utc>) -> PathBuf {
        let path = base.join(format!("{}{}", RUN_PREFIX, started.format(RUN_TIMESTAMP_FORMAT)));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        let removed = cleanup_old_logs(&dir.path().join("absent"), None, None).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_cleanup_applies_age_then_count() {
        let dir = tempdir().unwrap();
        let now = Utc::now();

        let ancient = make_run(dir.path(), now - chrono::Duration::days(90));
        let recent: Vec<PathBuf> = (0..5)
            .map(|i| make_run(dir.path(), now - chrono::Duration::minutes(10 * (5 - i))))
            .collect();
        let unrelated = dir.path().join("notes");
        std::fs::create_dir_all(&unrelated).unwrap();

        let removed = cleanup_old_logs(dir.path(), Some(30), Some(3)).unwrap();

        assert_eq!(removed, 3);
        assert!(!ancient.exists());
        assert!(!recent[0].exists());
        assert!(!recent[1].exists());
        assert!(recent[2].exists());
        assert!(recent[4].exists());
        assert!(unrelated.exists());
    }
}
