//! Tracing setup: console and/or a rolling log file, per `[logging]`

use anyhow::{Context, Result};
use radiogate_common::{LogRotation, LogTarget, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Flushes the file writer when dropped; hold it for the life of the process.
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<LogGuard> {
    let fallback = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let console = config.wants(LogTarget::Console).then(fmt::layer);

    let (file, guard) = match (&config.file_path, config.wants(LogTarget::File)) {
        (Some(path), true) => {
            let appender = file_appender(path, config.rotation, config.backup_count)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(LogGuard { _file: guard })
}

/// Rolling appender for `path`; keeps the live file plus `backups` rolled ones.
pub fn file_appender(path: &Path, rotation: LogRotation, backups: usize) -> Result<RollingFileAppender> {
    let (dir, prefix) = split_log_path(path)
        .with_context(|| format!("Log path {} does not name a file", path.display()))?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let rotation = match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .max_log_files(backups + 1)
        .build(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

fn split_log_path(path: &Path) -> Option<(PathBuf, String)> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}
