//! Logging configuration.

use std::path::PathBuf;

use crate::verbosity::Verbosity;

/// File name of the run log inside the log folder.
pub const LOG_FILE_NAME: &str = "DiffBuilder.log";

/// Where and how much to log.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoggingConfig {
    /// Level for workspace targets.
    pub verbosity: Verbosity,
    /// Folder receiving [`LOG_FILE_NAME`]; stderr only when `None`.
    pub log_folder: Option<PathBuf>,
    /// Use `RUST_LOG` instead of `verbosity` when it is set.
    pub honor_env: bool,
}

impl LoggingConfig {
    /// Creates a stderr-only configuration for a `-v` count.
    #[must_use]
    pub fn from_verbose_level(level: u8) -> Self {
        Self {
            verbosity: Verbosity::from_verbose_level(level),
            log_folder: None,
            honor_env: true,
        }
    }

    /// Also appends to `<folder>/DiffBuilder.log`.
    #[must_use]
    pub fn with_log_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.log_folder = Some(folder.into());
        self
    }

    /// Path of the run log, if file logging is enabled.
    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_folder.as_ref().map(|folder| folder.join(LOG_FILE_NAME))
    }
}
