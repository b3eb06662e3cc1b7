//! Stream formats recognised by decompression recipes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Compressed stream formats recipes can reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompressionFormat {
    /// Zstandard frames.
    Zstd,
    /// gzip (RFC 1952) members.
    Gzip,
    /// zlib (RFC 1950) streams.
    Zlib,
    /// Raw deflate (RFC 1951) without framing. Only used for remainder blobs.
    Deflate,
}

/// A fixed byte pattern identifying a stream format.
#[derive(Clone, Copy, Debug)]
pub struct MagicSignature {
    /// Expected leading bytes.
    pub bytes: &'static [u8],
    /// Format the bytes identify.
    pub format: CompressionFormat,
}

impl MagicSignature {
    /// Creates a new magic signature.
    #[must_use]
    pub const fn new(bytes: &'static [u8], format: CompressionFormat) -> Self {
        Self { bytes, format }
    }

    /// Checks if `data` starts with this signature.
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        data.starts_with(self.bytes)
    }
}

/// Signatures checked by [`CompressionFormat::detect`].
pub const KNOWN_SIGNATURES: &[MagicSignature] = &[
    MagicSignature::new(b"\x28\xb5\x2f\xfd", CompressionFormat::Zstd),
    MagicSignature::new(b"\x1f\x8b", CompressionFormat::Gzip),
];

impl CompressionFormat {
    /// Returns the canonical display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
            Self::Deflate => "deflate",
        }
    }

    /// Detects a format from the leading bytes of a stream.
    ///
    /// zlib has no magic number; a stream is reported as zlib when its two
    /// header bytes form a valid CMF/FLG pair using the deflate method.
    /// Raw deflate is never detected.
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        if let Some(signature) = KNOWN_SIGNATURES.iter().find(|sig| sig.matches(data)) {
            return Some(signature.format);
        }
        match data {
            [cmf, flg, ..]
                if (cmf & 0x0f) == 8
                    && (cmf >> 4) <= 7
                    && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0 =>
            {
                Some(Self::Zlib)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
