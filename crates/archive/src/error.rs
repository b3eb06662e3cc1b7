//! Error types for archive tokenization.

use std::io;

use thiserror::Error;

use items::ItemError;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// A parser declined a stream because it is not in the parser's format.
///
/// This is an expected outcome, not an error: the loader moves on to the
/// next registered parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatMismatch {
    reason: String,
}

impl FormatMismatch {
    /// Creates a mismatch with a short reason for the debug log.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason the parser declined.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors raised while tokenizing, persisting or loading archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Every registered parser declined the stream.
    #[error("Format error: no registered parser recognises the archive (tried {tried})")]
    UnknownFormat {
        /// Comma-separated parser names, in the order they were tried.
        tried: String,
    },

    /// A parser accepted the stream but found it inconsistent further in.
    #[error("Format error: malformed {format} archive at offset {offset}: {reason}")]
    Malformed {
        /// Parser name.
        format: &'static str,
        /// Byte offset where parsing failed.
        offset: u64,
        /// What was wrong.
        reason: String,
    },

    /// The same identity or offset was recorded twice.
    #[error("Duplicate {what} in tokenization: {key}")]
    Duplicate {
        /// Which index saw the duplicate.
        what: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// Chunks do not tile the archive exactly.
    #[error("Chunks do not partition the archive: {0}")]
    Partition(String),

    /// An item or recipe could not be built.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// A tokenization document could not be read or written.
    #[error("Tokenization JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading an archive.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}

impl ArchiveError {
    /// Returns `true` when the archive was not recognised or is corrupt.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(self, Self::UnknownFormat { .. } | Self::Malformed { .. })
    }

    /// Returns `true` for inconsistent graphs that abort a build without retry.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Duplicate { .. } | Self::Partition(_) | Self::Json(_) => true,
            Self::Item(err) => err.is_fatal(),
            Self::UnknownFormat { .. } | Self::Malformed { .. } | Self::Io(_) => false,
        }
    }

    pub(crate) fn malformed(format: &'static str, offset: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_fatal_but_unknown_formats_are_not() {
        let duplicate = ArchiveError::Duplicate {
            what: "chunk offset",
            key: "0".to_string(),
        };
        assert!(duplicate.is_fatal());
        let unknown = ArchiveError::UnknownFormat {
            tried: "cpio".to_string(),
        };
        assert!(!unknown.is_fatal());
        assert!(unknown.is_format_error());
    }
}
