//! Strong digest wrappers.
//!
//! Each wrapper implements [`StrongDigest`] so callers can stay generic over
//! the algorithm when hashing streams.

mod md5;
mod sha256;

pub use md5::Md5;
pub use sha256::Sha256;

/// Common interface for the strong digests used to identify items.
pub trait StrongDigest: Sized {
    /// Fixed-size digest output.
    type Digest: AsRef<[u8]>;

    /// Digest length in bytes.
    const DIGEST_LEN: usize;

    /// Creates a fresh hasher.
    fn new() -> Self;

    /// Feeds bytes into the hasher.
    fn update(&mut self, data: &[u8]);

    /// Consumes the hasher and returns the digest.
    fn finalize(self) -> Self::Digest;

    /// Hashes `data` in one call.
    fn digest(data: &[u8]) -> Self::Digest {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}
