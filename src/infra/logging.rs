use std::{ffi::OsStr, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

const DEFAULT_LOG_FILE: &str = "conversation-core.log";

/// Keeps the background log writer alive; dropping it flushes buffered lines.
pub struct LogGuard {
    _writer: Option<WorkerGuard>,
}

pub fn init(config: &LogConfig) -> Result<LogGuard, AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.file {
        Some(path) => {
            let (directory, file_name) = split_log_path(path);
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(
                    directory, file_name,
                ));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(AppError::LoggingInit)?;

            Ok(LogGuard {
                _writer: Some(guard),
            })
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
                .map_err(AppError::LoggingInit)?;

            Ok(LogGuard { _writer: None })
        }
    }
}

fn split_log_path(path: &Path) -> (&Path, &OsStr) {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));

    (directory, file_name)
}
