//! Error types for item identity and recipe construction.

use std::io;

use thiserror::Error;

use checksums::ChecksumError;

/// Result type for item and recipe operations.
pub type ItemResult<T> = Result<T, ItemError>;

/// Errors raised while hashing items or building recipes.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The stream ended before the declared item length was read.
    ///
    /// A truncated or corrupt stream cannot be retried.
    #[error("Format error: expected {expected} bytes, stream ended after {actual}")]
    Truncated {
        /// Declared item length.
        expected: u64,
        /// Bytes actually read.
        actual: u64,
    },

    /// Hashed content does not match the expected identity.
    #[error("Content mismatch: expected {expected}, found {actual}")]
    ContentMismatch {
        /// Identity the bytes were supposed to have.
        expected: String,
        /// Identity the bytes actually have.
        actual: String,
    },

    /// A recipe lists its own result among its ingredients.
    #[error("{recipe} recipe for {item} depends on itself")]
    SelfReferentialRecipe {
        /// Recipe name.
        recipe: &'static str,
        /// Result item.
        item: String,
    },

    /// Recipe parameters are inconsistent with the result or ingredients.
    #[error("Invalid {recipe} recipe: {reason}")]
    InvalidRecipe {
        /// Recipe name.
        recipe: String,
        /// What was wrong.
        reason: String,
    },

    /// The recipe name is not one this build knows.
    #[error("Unknown recipe '{0}'")]
    UnknownRecipe(String),

    /// A digest could not be parsed.
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    /// I/O error while reading item content.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}

impl ItemError {
    /// Returns `true` when the error reflects a graph or content inconsistency
    /// that must abort the build rather than be retried.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    pub(crate) fn invalid(recipe: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecipe {
            recipe: recipe.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_a_fatal_format_error() {
        let err = ItemError::Truncated {
            expected: 10,
            actual: 4,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Format error"));
    }

    #[test]
    fn io_errors_are_not_fatal() {
        let err: ItemError = io::Error::new(io::ErrorKind::Interrupted, "interrupted").into();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("I/O error"));
    }
}
