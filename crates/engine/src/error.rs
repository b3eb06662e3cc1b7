//! Error taxonomy for the diff pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use archive::ArchiveError;
use items::ItemError;
use patch::PatchError;

use crate::config::ValidationIssue;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that end a diff build.
///
/// Recoverable conditions never reach this type: a parser declining a
/// stream and a delta tool failing on one candidate are handled where they
/// happen.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No parser recognised an input, or an input is corrupt.
    #[error("Format error: {0}")]
    Format(String),

    /// The item graph is inconsistent.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// The working folder holds state for a different input.
    #[error("Bad working folder {path}: {reason}")]
    BadWorkingFolder {
        /// Offending file inside the working folder.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// Too many target bytes have no recipe beyond the remainder.
    #[error("Not diffable: {undiffable} undiffable bytes exceed the threshold of {threshold}")]
    NotDiffable {
        /// Bytes with neither a target recipe nor a source solution.
        undiffable: u64,
        /// Configured ceiling.
        threshold: u64,
    },

    /// The finished patch or one of its blobs failed a check.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// The cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error on a known path.
    #[error("I/O error while trying to {action} {path}: {source}")]
    IoAt {
        /// What was being done.
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// I/O error without path context.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),

    /// A required external tool failed.
    #[error("{program} failed: {status}")]
    Tool {
        /// Executable that was run.
        program: PathBuf,
        /// Exit status or timeout description.
        status: String,
    },

    /// Command-line or configuration parameters are incomplete.
    #[error("Invalid parameters: {}", join(.0))]
    InvalidParameters(Vec<ValidationIssue>),

    /// External executables required by the run are missing.
    #[error("Missing binaries: {}", join(.0))]
    MissingBinaries(Vec<ValidationIssue>),
}

fn join(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Wraps an I/O error with the action and path it happened on.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::IoAt {
            action,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors that mean the inputs or the item graph are
    /// unusable, as opposed to environmental failures.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::Fatal(_) | Self::NotDiffable { .. } | Self::Verification(_)
        )
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidParameters(_) | Self::MissingBinaries(_) => 1,
            Self::Format(_) => 2,
            Self::NotDiffable { .. } => 3,
            Self::Verification(_) => 4,
            Self::BadWorkingFolder { .. } => 5,
            Self::Fatal(_) | Self::Tool { .. } => 6,
            Self::IoAt { .. } | Self::Io(_) => 7,
            Self::Cancelled => 8,
        }
    }
}

impl From<ArchiveError> for EngineError {
    fn from(err: ArchiveError) -> Self {
        if err.is_format_error() {
            return Self::Format(err.to_string());
        }
        match err {
            ArchiveError::Io(source) => Self::Io(source),
            ArchiveError::Item(item) => item.into(),
            other => Self::Fatal(other.to_string()),
        }
    }
}

impl From<ItemError> for EngineError {
    fn from(err: ItemError) -> Self {
        match err {
            ItemError::ContentMismatch { .. } => Self::Verification(err.to_string()),
            ItemError::Truncated { .. } => Self::Format(err.to_string()),
            ItemError::Io(source) => Self::Io(source),
            other => Self::Fatal(other.to_string()),
        }
    }
}

impl From<PatchError> for EngineError {
    fn from(err: PatchError) -> Self {
        if err.is_verification_failure() {
            return Self::Verification(err.to_string());
        }
        if err.is_format_error() {
            return Self::Format(err.to_string());
        }
        match err {
            PatchError::Io(source) => Self::Io(source),
            PatchError::Tool { program, status } => Self::Tool { program, status },
            other => Self::Fatal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Fatal(format!("JSON document: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_taxonomy() {
        assert_eq!(EngineError::Format("x".into()).exit_code(), 2);
        assert_eq!(
            EngineError::NotDiffable {
                undiffable: 10,
                threshold: 5
            }
            .exit_code(),
            3
        );
        assert_eq!(EngineError::Verification("x".into()).exit_code(), 4);
        assert_eq!(EngineError::Cancelled.exit_code(), 8);
        assert_eq!(EngineError::InvalidParameters(Vec::new()).exit_code(), 1);
    }

    #[test]
    fn content_mismatch_is_a_verification_failure() {
        let item = items::ItemDefinition::from_bytes(b"expected");
        let err: EngineError = item.verify(b"actual").expect_err("mismatch").into();
        assert!(matches!(err, EngineError::Verification(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn unknown_archive_format_maps_to_format() {
        let err: EngineError = ArchiveError::UnknownFormat {
            tried: "cpio".into(),
        }
        .into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn io_context_is_rendered() {
        let err = EngineError::io(
            "read",
            "/nowhere/file",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("/nowhere/file"));
        assert!(!err.is_fatal());
    }
}
