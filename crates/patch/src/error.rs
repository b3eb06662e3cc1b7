//! Error types for patch encoding and application.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use checksums::ChecksumError;
use items::ItemError;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors raised while writing, reading or applying a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The file does not start with the patch magic.
    #[error("Format error: not a patch file (magic {found:02x?})")]
    BadMagic {
        /// The four bytes found instead.
        found: [u8; 4],
    },

    /// The file uses a format version this build cannot read.
    #[error("Format error: unsupported patch version {0}")]
    UnsupportedVersion(u64),

    /// A recipe tag has no known variant.
    #[error("Format error: unknown recipe tag {0}")]
    UnknownRecipeTag(u8),

    /// A hash algorithm tag has no known algorithm.
    #[error("Format error: unknown hash algorithm tag {0}")]
    UnknownHashAlgorithm(u8),

    /// A counted field is larger than its wire width allows.
    #[error("{what} count {count} does not fit the patch encoding")]
    CountOverflow {
        /// Field being written.
        what: &'static str,
        /// Offending count.
        count: usize,
    },

    /// A recipe has no binary tag.
    #[error("{0} recipes cannot be stored in a patch")]
    UnencodableRecipe(String),

    /// No recipe or blob in the patch produces the requested item.
    #[error("No way to produce {item} from the patch and source")]
    MissingItem {
        /// The requested item.
        item: String,
    },

    /// A byte range runs past the end of the blob it addresses.
    #[error("{blob} range {offset}+{length} exceeds its {available} bytes")]
    OutOfRange {
        /// Blob addressed.
        blob: &'static str,
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        length: u64,
        /// Bytes available.
        available: u64,
    },

    /// A compression recipe was recorded with another zstd library version.
    #[error("zstd {recorded_major}.{recorded_minor} recipe cannot be reproduced with zstd {major}.{minor}")]
    CompressorVersion {
        /// Major version recorded in the recipe.
        recorded_major: u64,
        /// Minor version recorded in the recipe.
        recorded_minor: u64,
        /// Major version linked into this build.
        major: u64,
        /// Minor version linked into this build.
        minor: u64,
    },

    /// An external patch tool failed.
    #[error("{program} exited with {status}")]
    Tool {
        /// Program that was run.
        program: PathBuf,
        /// Exit status description.
        status: String,
    },

    /// Recipes nest deeper than the evaluator allows.
    #[error("recipe chain for {item} is deeper than {limit}")]
    TooDeep {
        /// Item being produced when the limit was hit.
        item: String,
        /// Depth limit.
        limit: usize,
    },

    /// Item construction or verification failed.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// A digest in the patch was malformed.
    #[error("Format error: {0}")]
    Checksum(#[from] ChecksumError),

    /// The dump could not be rendered.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading or writing patch data.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}

impl PatchError {
    /// Returns `true` when the bytes read are not a valid patch.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::UnsupportedVersion(_)
                | Self::UnknownRecipeTag(_)
                | Self::UnknownHashAlgorithm(_)
                | Self::Checksum(_)
        )
    }

    /// Returns `true` when applying produced bytes with the wrong identity.
    #[must_use]
    pub const fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Item(ItemError::ContentMismatch { .. }))
    }

    pub(crate) fn out_of_range(blob: &'static str, offset: u64, length: u64, available: usize) -> Self {
        Self::OutOfRange {
            blob,
            offset,
            length,
            available: available as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_errors_are_format_errors() {
        let err = PatchError::BadMagic { found: *b"NOPE" };
        assert!(err.is_format_error());
        assert!(err.to_string().starts_with("Format error"));
    }

    #[test]
    fn content_mismatch_is_a_verification_failure() {
        let err = PatchError::from(ItemError::ContentMismatch {
            expected: "a".into(),
            actual: "b".into(),
        });
        assert!(err.is_verification_failure());
        assert!(!err.is_format_error());
    }
}
