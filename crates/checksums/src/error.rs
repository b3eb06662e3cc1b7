//! Error types for hash parsing.

use thiserror::Error;

/// Result alias for checksum operations.
pub type ChecksumResult<T> = Result<T, ChecksumError>;

/// Errors raised while parsing hash algorithms or digest strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// The algorithm name is not recognised.
    #[error("unsupported hash algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// The digest string is not valid hexadecimal.
    #[error("invalid hex digest '{value}': {reason}")]
    InvalidHex {
        /// Offending input.
        value: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The digest length does not match the algorithm.
    #[error("{algorithm} digest must be {expected} bytes, got {actual}")]
    DigestLength {
        /// Algorithm name.
        algorithm: &'static str,
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },
}
