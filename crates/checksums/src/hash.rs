//! Digest values tagged with their algorithm.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::algorithm::HashAlgorithm;
use crate::error::{ChecksumError, ChecksumResult};

/// A digest produced by one [`HashAlgorithm`].
///
/// Ordering compares the algorithm first, then the digest bytes, which is the
/// `(algorithm, digest)` ordering item identities rely on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Hash {
    algorithm: HashAlgorithm,
    #[serde(serialize_with = "serialize_hex", deserialize_with = "deserialize_hex")]
    value: Vec<u8>,
}

impl Hash {
    /// Wraps a digest, validating its length against the algorithm.
    pub fn new(algorithm: HashAlgorithm, value: Vec<u8>) -> ChecksumResult<Self> {
        if value.len() != algorithm.digest_len() {
            return Err(ChecksumError::DigestLength {
                algorithm: algorithm.name(),
                expected: algorithm.digest_len(),
                actual: value.len(),
            });
        }
        Ok(Self { algorithm, value })
    }

    /// Wraps a digest whose length is fixed by the backend that produced it.
    pub(crate) const fn from_digest(algorithm: HashAlgorithm, value: Vec<u8>) -> Self {
        Self { algorithm, value }
    }

    /// Parses a lowercase or uppercase hex digest.
    pub fn from_hex(algorithm: HashAlgorithm, text: &str) -> ChecksumResult<Self> {
        let value = hex::decode(text).map_err(|error| ChecksumError::InvalidHex {
            value: text.to_string(),
            reason: error.to_string(),
        })?;
        Self::new(algorithm, value)
    }

    /// Returns the algorithm that produced this digest.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the digest as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.value)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn serialize_hex<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(value))
}

fn deserialize_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    hex::decode(&text).map_err(serde::de::Error::custom)
}
