//! Logging infrastructure for aidaeon
//!
//! Logs are written to `~/.local/state/aidaeon/aidaeon.log.<date>` following XDG standards.

use crate::config::{Config, LoggingConfig};
use crate::error::Error;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily rotation, keeping `max_files` files
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("aidaeon.log")
        .max_log_files(config.max_files)
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path (without the rotation date suffix)
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
