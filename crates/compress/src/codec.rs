//! Format-dispatching entry points.

use std::io;

use crate::algorithm::CompressionFormat;
use crate::zlib::{self, CompressionLevel};
use crate::zstd;

/// Decompresses `input` according to `format`.
pub fn decompress(format: CompressionFormat, input: &[u8]) -> io::Result<Vec<u8>> {
    match format {
        CompressionFormat::Zstd => zstd::decompress_to_vec(input),
        CompressionFormat::Gzip => zlib::gunzip_to_vec(input),
        CompressionFormat::Zlib => zlib::decompress_to_vec(input),
        CompressionFormat::Deflate => zlib::inflate_to_vec(input),
    }
}

/// Compresses `input` according to `format`.
pub fn compress(format: CompressionFormat, input: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    match format {
        CompressionFormat::Zstd => zstd::compress_to_vec(input, level),
        CompressionFormat::Gzip => zlib::gzip_to_vec(input, level),
        CompressionFormat::Zlib => zlib::compress_to_vec(input, level),
        CompressionFormat::Deflate => zlib::deflate_to_vec(input, level),
    }
}

/// Returns the first zstd level in `levels` whose output reproduces `compressed`.
///
/// Used to decide whether a compressed archive member can be regenerated from
/// its payload, which is what makes a `ZstdCompression` recipe trustworthy.
pub fn find_reproducing_zstd_level(
    payload: &[u8],
    compressed: &[u8],
    levels: impl IntoIterator<Item = i32>,
) -> io::Result<Option<i32>> {
    for level in levels {
        if recompresses_identically(payload, compressed, level)? {
            return Ok(Some(level));
        }
    }
    Ok(None)
}

/// Checks whether compressing `payload` at `level` yields exactly `compressed`.
pub fn recompresses_identically(payload: &[u8], compressed: &[u8], level: i32) -> io::Result<bool> {
    Ok(zstd::compress_with_level(payload, level)? == compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_round_trips_every_format() {
        let data = b"dispatch payload ".repeat(32);
        for format in [
            CompressionFormat::Zstd,
            CompressionFormat::Gzip,
            CompressionFormat::Zlib,
            CompressionFormat::Deflate,
        ] {
            let packed = compress(format, &data, CompressionLevel::Default).expect("compress");
            assert_eq!(decompress(format, &packed).expect("decompress"), data, "{format}");
        }
    }

    #[test]
    fn finds_the_level_used_to_compress() {
        let payload = b"recompression candidate ".repeat(100);
        let compressed = zstd::compress_with_level(&payload, 9).expect("compress");
        let level = find_reproducing_zstd_level(&payload, &compressed, 1..=19).expect("search");
        let level = level.expect("level found");
        assert!(recompresses_identically(&payload, &compressed, level).expect("check"));
    }

    #[test]
    fn reports_none_when_no_level_matches() {
        let payload = b"abc".repeat(100);
        let mut compressed = zstd::compress_with_level(&payload, 3).expect("compress");
        let last = compressed.len() - 1;
        compressed[last] ^= 0xff;
        assert_eq!(
            find_reproducing_zstd_level(&payload, &compressed, [1, 3, 19]).expect("search"),
            None
        );
    }

    #[test]
    fn rejects_corrupt_input() {
        assert!(decompress(CompressionFormat::Zstd, b"not zstd").is_err());
    }
}
