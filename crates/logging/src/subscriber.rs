//! Global subscriber installation.

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Builds the event filter for `config`.
///
/// `RUST_LOG` wins when it is set and `honor_env` is on.
#[must_use]
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if config.honor_env {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::new(config.verbosity.directives())
}

/// Installs the global subscriber: a compact layer on stderr and, when a log
/// folder is configured, a plain layer appending to `DiffBuilder.log`.
///
/// Returns `Ok(false)` when a global subscriber was already installed, which
/// leaves the existing one in place. The log folder is created if missing.
pub fn init_tracing(config: &LoggingConfig) -> io::Result<bool> {
    let file_layer = match config.log_file() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(io::stderr);

    Ok(tracing_subscriber::registry()
        .with(build_filter(config))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok())
}
