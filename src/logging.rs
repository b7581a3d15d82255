use crate::config::LoggingConfig;
use crate::error::{OrmError, Result};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging with console output and, when a directory is
/// configured, a daily-rotated JSON file.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process. Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| OrmError::Config(format!("Invalid log filter '{}': {}", config.filter, e)))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            fs::create_dir_all(directory)?;
            let file_appender = tracing_appender::rolling::daily(directory, &config.file_name);
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().json().with_writer(non_blocking_writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stdout))
        .try_init()
        .map_err(|e| OrmError::Config(format!("Failed to install subscriber: {}", e)))?;

    Ok(guard)
}
