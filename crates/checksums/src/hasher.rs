//! Multi-algorithm streaming hasher.

use std::collections::BTreeMap;

use crate::algorithm::HashAlgorithm;
use crate::hash::Hash;
use crate::strong::{Md5, Sha256, StrongDigest};

/// Digests keyed by algorithm, in algorithm order.
pub type Hashes = BTreeMap<HashAlgorithm, Hash>;

#[derive(Clone, Debug)]
enum Backend {
    Md5(Md5),
    Sha256(Sha256),
}

impl Backend {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(inner) => inner.update(data),
            Self::Sha256(inner) => inner.update(data),
        }
    }

    fn finalize(self) -> Hash {
        let (algorithm, digest) = match self {
            Self::Md5(inner) => (HashAlgorithm::Md5, inner.finalize().to_vec()),
            Self::Sha256(inner) => (HashAlgorithm::Sha256, inner.finalize().to_vec()),
        };
        Hash::from_digest(algorithm, digest)
    }
}

/// Feeds a single byte stream into several digest algorithms.
#[derive(Clone, Debug)]
pub struct ItemHasher {
    backends: Vec<Backend>,
    bytes: u64,
}

impl ItemHasher {
    /// Creates a hasher computing every algorithm in `algorithms`.
    ///
    /// Duplicate algorithms are hashed once.
    #[must_use]
    pub fn new(algorithms: &[HashAlgorithm]) -> Self {
        let mut unique = algorithms.to_vec();
        unique.sort_unstable();
        unique.dedup();
        Self {
            backends: unique.into_iter().map(Backend::new).collect(),
            bytes: 0,
        }
    }

    /// Appends data to every digest.
    pub fn update(&mut self, data: &[u8]) {
        for backend in &mut self.backends {
            backend.update(data);
        }
        self.bytes = self.bytes.saturating_add(data.len() as u64);
    }

    /// Returns the number of bytes hashed so far.
    #[must_use]
    pub const fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Completes every digest.
    #[must_use]
    pub fn finalize(self) -> Hashes {
        self.backends
            .into_iter()
            .map(|backend| {
                let hash = backend.finalize();
                (hash.algorithm(), hash)
            })
            .collect()
    }

    /// Hashes `data` with the default algorithm set.
    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> Hashes {
        let mut hasher = Self::new(HashAlgorithm::DEFAULT_SET);
        hasher.update(data);
        hasher.finalize()
    }
}

impl Default for ItemHasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::DEFAULT_SET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_set_produces_both_digests() {
        let hashes = ItemHasher::hash_bytes(b"abc");
        assert_eq!(hashes.len(), 2);
        assert_eq!(
            hashes[&HashAlgorithm::Md5].to_hex(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn duplicate_algorithms_are_collapsed() {
        let hasher = ItemHasher::new(&[HashAlgorithm::Sha256, HashAlgorithm::Sha256]);
        assert_eq!(hasher.finalize().len(), 1);
    }

    #[test]
    fn tracks_bytes_hashed() {
        let mut hasher = ItemHasher::default();
        hasher.update(&[0u8; 100]);
        hasher.update(&[0u8; 28]);
        assert_eq!(hasher.bytes_hashed(), 128);
    }

    proptest! {
        #[test]
        fn split_updates_match_single_update(data in proptest::collection::vec(any::<u8>(), 0..2048), split in 0usize..2048) {
            let split = split.min(data.len());
            let mut hasher = ItemHasher::default();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            prop_assert_eq!(hasher.finalize(), ItemHasher::hash_bytes(&data));
        }
    }
}
