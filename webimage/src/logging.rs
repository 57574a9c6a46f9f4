//! Logging setup for binaries embedding the loader.
//!
//! The library itself only emits `tracing` events. Applications call
//! [`init_logging`] once at startup to get:
//! - a log file (truncated each session) written through a non-blocking
//!   appender
//! - compact output on stderr
//! - filtering from `RUST_LOG`, falling back to the configured level

use crate::config::LoggingSettings;
use std::fs;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initializes the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created, the log file
/// cannot be truncated, or a global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> io::Result<LoggingGuard> {
    prepare_log_file(settings)?;

    let file_appender = tracing_appender::rolling::never(&settings.directory, &settings.file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(&settings.level))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// `RUST_LOG` if set and valid, otherwise `level`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Creates the log directory and truncates the log file.
fn prepare_log_file(settings: &LoggingSettings) -> io::Result<()> {
    fs::create_dir_all(&settings.directory)?;
    fs::write(settings.path(), "")
}
