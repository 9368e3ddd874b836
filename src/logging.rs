//! Logging setup for binaries embedding the converter.
//!
//! Library code only emits `tracing` events; nothing here runs unless a
//! caller asks for it.

use crate::config::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset: this crate at `info`, dependencies
/// (reqwest, hyper, rustls) at `warn`.
pub const DEFAULT_FILTER: &str = "warn,artifact_notes=info";

/// Prefix of the daily log files written under `Config::log_dir`.
pub const LOG_FILE_PREFIX: &str = "artifact-notes.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// With `log_to_file`, events go to daily rolling files in `log_dir` without
/// ANSI colours; otherwise to stdout. Hold the returned guard until exit so
/// buffered file output is flushed.
pub fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = env_filter();

    if !config.log_to_file {
        fmt().with_env_filter(filter).with_target(false).init();
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(&config.log_dir, LOG_FILE_PREFIX));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Some(guard)
}
