#![allow(clippy::module_name_repetitions)]

//! Zstandard helpers.
//!
//! Besides plain frames this module provides dictionary deltas: the basis is
//! loaded as a raw content dictionary, so a target that shares most of its
//! bytes with the basis compresses to a small frame that can only be decoded
//! with the same basis. This is the in-process counterpart of
//! `zstd --patch-from`.

use std::io::{self, Write};

use crate::zlib::CompressionLevel;
use zstd::bulk::{Compressor, Decompressor};
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};
use zstd::zstd_safe::{CParameter, DParameter};

/// Compresses `input` into a new [`Vec`].
pub fn compress_to_vec(input: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    compress_with_level(input, zstd_level(level))
}

/// Compresses `input` with an explicit numeric zstd level.
pub fn compress_with_level(input: &[u8], level: i32) -> io::Result<Vec<u8>> {
    let mut encoder = ZstdEncoder::new(Vec::new(), level).map_err(io::Error::other)?;
    encoder.write_all(input)?;
    encoder.finish().map_err(io::Error::other)
}

/// Decompresses `input` into a new [`Vec`].
pub fn decompress_to_vec(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZstdDecoder::new(input).map_err(io::Error::other)?;
    let mut output = Vec::new();
    io::copy(&mut decoder, &mut output)?;
    Ok(output)
}

/// Version of the linked zstd library as `(major, minor)`.
///
/// Recompression is only reproducible with the same library version, so the
/// pair is recorded alongside every compression recipe.
#[must_use]
pub fn library_version() -> (u64, u64) {
    let number = u64::from(zstd::zstd_safe::version_number());
    (number / 10_000, (number / 100) % 100)
}

/// Parameters for dictionary deltas.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeltaParameters {
    /// Numeric zstd level.
    pub level: i32,
    /// Window log; must cover the basis so matches anywhere in it are reachable.
    pub window_log: u32,
}

impl Default for DeltaParameters {
    fn default() -> Self {
        Self {
            level: 19,
            window_log: 27,
        }
    }
}

/// Encodes `target` as a zstd frame using `basis` as a raw content dictionary.
pub fn delta_compress(basis: &[u8], target: &[u8], params: DeltaParameters) -> io::Result<Vec<u8>> {
    let mut compressor = Compressor::with_dictionary(params.level, basis)?;
    compressor.set_parameter(CParameter::WindowLog(params.window_log))?;
    compressor.set_parameter(CParameter::EnableLongDistanceMatching(true))?;
    compressor.compress(target)
}

/// Decodes a frame written by [`delta_compress`]. `capacity` is the expected output length.
pub fn delta_decompress(
    basis: &[u8],
    delta: &[u8],
    capacity: usize,
    params: DeltaParameters,
) -> io::Result<Vec<u8>> {
    let mut decompressor = Decompressor::with_dictionary(basis)?;
    decompressor.set_parameter(DParameter::WindowLogMax(params.window_log))?;
    decompressor.decompress(delta, capacity)
}

fn zstd_level(level: CompressionLevel) -> i32 {
    match level {
        CompressionLevel::Fast => 1,
        CompressionLevel::Default => 3,
        CompressionLevel::Best => 19,
        CompressionLevel::Precise(value) => i32::from(value.get()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn same_level_recompression_is_deterministic() {
        let data = b"deterministic zstd output".repeat(64);
        let first = compress_with_level(&data, 7).expect("compress");
        let second = compress_with_level(&data, 7).expect("compress");
        assert_eq!(first, second);
    }

    #[test]
    fn dictionary_delta_is_small_for_similar_inputs() {
        let mut rng = StdRng::seed_from_u64(7);
        let basis: Vec<u8> = (0..64 * 1024).map(|_| rng.r#gen()).collect();
        let mut target = basis.clone();
        target[1000..1016].copy_from_slice(&[0xAA; 16]);

        let params = DeltaParameters::default();
        let delta = delta_compress(&basis, &target, params).expect("delta");
        assert!(delta.len() < target.len() / 10, "delta was {} bytes", delta.len());

        let rebuilt = delta_decompress(&basis, &delta, target.len(), params).expect("apply");
        assert_eq!(rebuilt, target);
    }

    #[test]
    fn library_version_is_plausible() {
        let (major, minor) = library_version();
        assert_eq!(major, 1);
        assert!(minor >= 4);
    }
}
