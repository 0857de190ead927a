//! Tracing configuration and log routing.
//!
//! Logs go to stdout using a compact formatter and to a file. When [`Config::log_file`] is set,
//! logs are appended to that path; otherwise a daily-rotated logger writes `logs/caution.log.*`.
//! The file writer is non-blocking so chunk fan-out never waits on disk.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "caution.log";

/// Configure tracing subscribers for stdout and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a compact stdout layer and, when available, a file layer.
/// - Keeps the non-blocking writer guard alive for the process lifetime.
pub fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer(config.log_file.as_deref()) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non-blocking writer for file logging.
///
/// Returns `None` when the logs directory cannot be created or the target file cannot be opened.
fn configure_file_writer(log_file: Option<&str>) -> Option<NonBlocking> {
    if let Some(path) = log_file {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                let _ = LOG_GUARD.set(guard);
                Some(non_blocking)
            }
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                None
            }
        }
    } else {
        if let Err(err) = std::fs::create_dir_all(LOG_DIR) {
            eprintln!("Failed to create logs directory: {err}");
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(non_blocking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_log_file_is_opened_for_append() {
        let path = std::env::temp_dir().join(format!("caution-log-{}.log", std::process::id()));
        let path_str = path.to_str().expect("utf-8 temp path");

        assert!(configure_file_writer(Some(path_str)).is_some());
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unopenable_log_file_disables_the_file_layer() {
        let missing_dir = std::env::temp_dir()
            .join(format!("caution-missing-{}", std::process::id()))
            .join("nested")
            .join("caution.log");
        let path_str = missing_dir.to_str().expect("utf-8 temp path");

        assert!(configure_file_writer(Some(path_str)).is_none());
    }
}
