//! Logging Infrastructure
//!
//! Structured logging with `tracing`: console output, optional JSON format,
//! optional daily rolling file.

use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "cheers_server={level},shared={level},tower_http={level}";

/// Initialize the logger with default settings
pub fn init_logger() {
    init_logger_with_file(None, false, None);
}

/// Initialize the logger
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES.replace("{level}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true);

    let file_writer = log_dir.and_then(|dir| {
        let path = Path::new(dir);
        if let Err(e) = std::fs::create_dir_all(path) {
            eprintln!("Failed to create log directory {dir}: {e}");
            return None;
        }
        Some(tracing_appender::rolling::daily(path, "cheers-server"))
    });

    // try_init: tests may initialize more than once
    let result = match (json, file_writer) {
        (true, Some(writer)) => builder.json().with_writer(writer).try_init(),
        (true, None) => builder.json().try_init(),
        (false, Some(writer)) => builder.with_ansi(false).with_writer(writer).try_init(),
        (false, None) => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logger already initialized: {e}");
    }
}
