#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` installs the process-wide `tracing` subscriber used by the
//! `diffgen` binary. Library crates only emit events; this crate decides
//! where they go and how many of them survive.
//!
//! # Design
//!
//! - [`Verbosity`] maps the CLI's `-v` count onto a [`LevelFilter`](tracing::level_filters::LevelFilter)
//!   for `diffgen::*` targets. Other crates are held at `warn`.
//! - [`init_tracing`] layers an [`EnvFilter`](tracing_subscriber::EnvFilter)
//!   over a compact stderr formatter and, when a log folder is configured, a
//!   plain formatter appending to [`LOG_FILE_NAME`].
//!
//! # Errors
//!
//! [`init_tracing`] reports I/O errors from creating the log folder or file.
//! A second installation is not an error.
//!
//! # Examples
//!
//! ```
//! use logging::{LoggingConfig, Verbosity};
//!
//! let config = LoggingConfig::from_verbose_level(2);
//! assert_eq!(config.verbosity, Verbosity::Debug);
//! assert!(config.log_file().is_none());
//! ```

mod config;
mod subscriber;
mod verbosity;

pub use config::{LOG_FILE_NAME, LoggingConfig};
pub use subscriber::{build_filter, init_tracing};
pub use verbosity::{TARGET_PREFIX, Verbosity};
