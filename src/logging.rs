//! Tracing setup: daily-rolling log files plus an optional console layer.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix for the rolled log files (`readaloud.<date>`).
pub const LOG_FILE_PREFIX: &str = "readaloud";

/// How verbose the subscriber should be.
///
/// `RUST_LOG` in the environment overrides either choice, so a one-off
/// trace-level run needs no settings change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
}

impl LogLevel {
    /// Level from the preferences' debug flag.
    pub fn from_debug_flag(debug_mode: bool) -> Self {
        if debug_mode { Self::Debug } else { Self::Info }
    }

    fn directive(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Install the global subscriber: a non-blocking daily-rolling file layer,
/// and a console layer when `console` is set.
///
/// The returned [`WorkerGuard`] flushes buffered lines when dropped and must
/// stay alive for the whole run, or the tail of the log is lost on exit.
/// Installing a second subscriber in the same process is an error.
pub fn init(log_dir: &Utf8Path, level: LogLevel, console: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir}"))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // `registry().with(...)` fixes the layer type, so the console branch
    // repeats the chain instead of assembling it conditionally.
    if console {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!(
        "Logging to {}/{}.<date> at {:?} level (console: {})",
        log_dir,
        LOG_FILE_PREFIX,
        level,
        console
    );
    Ok(guard)
}
