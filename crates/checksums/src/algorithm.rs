//! Hash algorithms recognised by the workspace.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChecksumError;

/// Hash algorithms used for item identity.
///
/// Variant order defines the ordering of `(algorithm, digest)` pairs when
/// items are compared, so new algorithms are appended at the end.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// MD5 (RFC 1321). Kept for compatibility with existing manifests.
    Md5,
    /// SHA-256 (FIPS 180-4). Always present on freshly hashed items.
    Sha256,
}

impl HashAlgorithm {
    /// Algorithms applied when hashing new content.
    pub const DEFAULT_SET: &'static [Self] = &[Self::Md5, Self::Sha256];

    /// Returns the canonical display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "Md5",
            Self::Sha256 => "Sha256",
        }
    }

    /// Returns the digest length in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha256 => 32,
        }
    }

    /// Returns the wire tag used by the binary patch format.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Md5 => 1,
            Self::Sha256 => 2,
        }
    }

    /// Resolves a wire tag written by [`HashAlgorithm::tag`].
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Md5),
            2 => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("md5") {
            Ok(Self::Md5)
        } else if s.eq_ignore_ascii_case("sha256") || s.eq_ignore_ascii_case("sha-256") {
            Ok(Self::Sha256)
        } else {
            Err(ChecksumError::UnknownAlgorithm(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_orders_before_sha256() {
        assert!(HashAlgorithm::Md5 < HashAlgorithm::Sha256);
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!("SHA256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!("md5".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Md5));
    }

    #[test]
    fn parsing_rejects_unknown_algorithms() {
        let err = "crc32".parse::<HashAlgorithm>().expect_err("crc32 unsupported");
        assert_eq!(err, ChecksumError::UnknownAlgorithm("crc32".to_string()));
    }

    #[test]
    fn tags_round_trip() {
        for algorithm in HashAlgorithm::DEFAULT_SET {
            assert_eq!(HashAlgorithm::from_tag(algorithm.tag()), Some(*algorithm));
        }
        assert_eq!(HashAlgorithm::from_tag(0), None);
    }
}
