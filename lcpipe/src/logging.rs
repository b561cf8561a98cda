//! Logging infrastructure for LCPipe.
//!
//! Provides structured logging with file output and console output:
//! - Writes to `<output>/logs/extraction_<timestamp>.log` (one file per run)
//! - Also prints to stdout for interactive tailing
//! - Configurable via RUST_LOG environment variable
//!
//! Each run gets its own timestamped log file so that concurrent shard jobs
//! sharing one output directory never interleave writes into the same file.

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging system.
///
/// Creates the logs directory if needed and sets up dual output to both
/// the given file and stdout.
///
/// # Arguments
///
/// * `log_dir` - Directory for log files (e.g., `<output>/logs`)
/// * `log_file` - Log filename (e.g., `extraction_20240101_120000.log`)
///
/// # Returns
///
/// LoggingGuard that must be kept alive for logging to work
///
/// # Errors
///
/// Returns error if the log directory cannot be created
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;

    // Create file appender with non-blocking writer
    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false) // No ANSI colors in file
        .with_target(false);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true) // ANSI colors for terminal
        .with_target(false);

    // Create env filter (defaults to INFO if RUST_LOG not set)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Build the log filename for a run.
///
/// Unsharded runs log to `extraction_<timestamp>.log`; shard jobs log to
/// `shard<N>_<timestamp>.log` so each shard's output is separable.
pub fn run_log_file(shard: Option<u32>) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    match shard {
        Some(index) => format!("shard{}_{}.log", index, timestamp),
        None => format!("extraction_{}.log", timestamp),
    }
}
