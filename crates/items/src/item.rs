//! Content-addressed item identity.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash as StdHash, Hasher};
use std::io::Read;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use checksums::{Hash, HashAlgorithm, Hashes, ItemHasher};

use crate::error::{ItemError, ItemResult};

/// Block size used when hashing streams.
pub const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Identity of a byte range: its length, its digests and optional names.
///
/// Two items with matching digests are the same item no matter which archive
/// or offset they came from. Names are diagnostic aliases and only take part
/// in comparisons when an item carries no digests at all.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDefinition {
    length: u64,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        serialize_with = "serialize_hashes",
        deserialize_with = "deserialize_hashes"
    )]
    hashes: Hashes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    names: Vec<String>,
}

impl ItemDefinition {
    /// Creates an item from known parts.
    #[must_use]
    pub fn new(length: u64, hashes: Hashes) -> Self {
        Self {
            length,
            hashes,
            names: Vec::new(),
        }
    }

    /// Hashes `data` with every default algorithm.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::new(data.len() as u64, ItemHasher::hash_bytes(data))
    }

    /// Hashes exactly `length` bytes from `reader` in fixed-size blocks.
    ///
    /// Returns [`ItemError::Truncated`] when the reader ends early.
    pub fn from_reader<R: Read>(reader: &mut R, length: u64) -> ItemResult<Self> {
        let mut hasher = ItemHasher::default();
        let mut buffer = vec![0u8; HASH_BLOCK_SIZE];
        let mut remaining = length;

        while remaining > 0 {
            let want = remaining.min(HASH_BLOCK_SIZE as u64) as usize;
            let read = reader.read(&mut buffer[..want])?;
            if read == 0 {
                return Err(ItemError::Truncated {
                    expected: length,
                    actual: length - remaining,
                });
            }
            hasher.update(&buffer[..read]);
            remaining -= read as u64;
        }

        Ok(Self::new(length, hasher.finalize()))
    }

    /// Returns a copy carrying `name` as an additional alias.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
        self
    }

    /// Returns a copy stripped of every name, suitable as a pure content key.
    #[must_use]
    pub fn without_names(&self) -> Self {
        Self::new(self.length, self.hashes.clone())
    }

    /// Returns the item length in bytes.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Returns every digest.
    #[must_use]
    pub const fn hashes(&self) -> &Hashes {
        &self.hashes
    }

    /// Returns the digest for one algorithm.
    #[must_use]
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&Hash> {
        self.hashes.get(&algorithm)
    }

    /// Returns the aliases in insertion order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the first alias, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Returns the SHA-256 digest as hex, or an empty string.
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        self.hash(HashAlgorithm::Sha256)
            .map(Hash::to_hex)
            .unwrap_or_default()
    }

    /// Checks that `data` has this identity.
    ///
    /// Only the algorithms present on `self` are computed.
    pub fn verify(&self, data: &[u8]) -> ItemResult<()> {
        let algorithms: Vec<HashAlgorithm> = self.hashes.keys().copied().collect();
        let mut hasher = ItemHasher::new(&algorithms);
        hasher.update(data);
        let actual = Self::new(data.len() as u64, hasher.finalize());
        if actual == *self {
            Ok(())
        } else {
            Err(ItemError::ContentMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    fn identity_cmp(&self, other: &Self) -> Ordering {
        self.length
            .cmp(&other.length)
            .then_with(|| self.hashes.len().cmp(&other.hashes.len()))
            .then_with(|| self.hashes.values().cmp(other.hashes.values()))
            .then_with(|| {
                if self.hashes.is_empty() {
                    self.names.cmp(&other.names)
                } else {
                    Ordering::Equal
                }
            })
    }
}

impl PartialEq for ItemDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.identity_cmp(other) == Ordering::Equal
    }
}

impl Eq for ItemDefinition {}

impl PartialOrd for ItemDefinition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ItemDefinition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity_cmp(other)
    }
}

impl StdHash for ItemDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        self.hashes.len().hash(state);
        for hash in self.hashes.values() {
            hash.hash(state);
        }
        if self.hashes.is_empty() {
            self.names.hash(state);
        }
    }
}

impl fmt::Display for ItemDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or("<unnamed>");
        let sha = self.sha256_hex();
        let short = sha.get(..12).unwrap_or(&sha);
        write!(f, "{name} ({} bytes, sha256 {short})", self.length)
    }
}

fn serialize_hashes<S: Serializer>(hashes: &Hashes, serializer: S) -> Result<S::Ok, S::Error> {
    let text: BTreeMap<HashAlgorithm, String> = hashes
        .iter()
        .map(|(algorithm, hash)| (*algorithm, hash.to_hex()))
        .collect();
    text.serialize(serializer)
}

fn deserialize_hashes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hashes, D::Error> {
    let text = BTreeMap::<HashAlgorithm, String>::deserialize(deserializer)?;
    text.into_iter()
        .map(|(algorithm, value)| {
            Hash::from_hex(algorithm, &value)
                .map(|hash| (algorithm, hash))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Cursor;

    #[test]
    fn identical_content_yields_identical_items() {
        assert_eq!(
            ItemDefinition::from_bytes(b"content"),
            ItemDefinition::from_bytes(b"content")
        );
        assert_ne!(
            ItemDefinition::from_bytes(b"content"),
            ItemDefinition::from_bytes(b"contenT")
        );
    }

    #[test]
    fn names_do_not_affect_identity_when_hashed() {
        let a = ItemDefinition::from_bytes(b"x").with_name("a.txt");
        let b = ItemDefinition::from_bytes(b"x").with_name("b.txt");
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn names_decide_identity_without_hashes() {
        let a = ItemDefinition::new(4, Hashes::new()).with_name("a");
        let b = ItemDefinition::new(4, Hashes::new()).with_name("b");
        assert_ne!(a, b);
        assert_eq!(a, ItemDefinition::new(4, Hashes::new()).with_name("a"));
    }

    #[test]
    fn ordering_compares_length_first() {
        let short = ItemDefinition::from_bytes(&[0xff; 2]);
        let long = ItemDefinition::from_bytes(&[0x00; 3]);
        assert!(short < long);
    }

    #[test]
    fn from_reader_matches_from_bytes() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let streamed =
            ItemDefinition::from_reader(&mut Cursor::new(&data), data.len() as u64).expect("hash");
        assert_eq!(streamed, ItemDefinition::from_bytes(&data));
    }

    #[test]
    fn from_reader_reports_truncation() {
        let err = ItemDefinition::from_reader(&mut Cursor::new(vec![1u8; 10]), 20)
            .expect_err("stream too short");
        assert!(matches!(
            err,
            ItemError::Truncated {
                expected: 20,
                actual: 10
            }
        ));
    }

    #[test]
    fn with_name_does_not_duplicate_aliases() {
        let item = ItemDefinition::from_bytes(b"x").with_name("a").with_name("a");
        assert_eq!(item.names(), ["a".to_string()]);
        assert!(item.without_names().names().is_empty());
    }

    #[test]
    fn verify_detects_mismatch() {
        let item = ItemDefinition::from_bytes(b"expected");
        item.verify(b"expected").expect("matching content");
        assert!(matches!(
            item.verify(b"EXPECTED"),
            Err(ItemError::ContentMismatch { .. })
        ));
    }

    #[test]
    fn json_round_trip_keeps_hashes_and_names() {
        let item = ItemDefinition::from_bytes(b"json").with_name("file.bin");
        let json = serde_json::to_string(&item).expect("serialize");
        assert!(json.contains("\"Sha256\""));
        let back: ItemDefinition = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, item);
        assert_eq!(back.names(), item.names());
    }
}
