//! # Overview
//!
//! Deflate-family helpers: zlib streams, gzip members and raw deflate. Raw
//! deflate backs the remainder blob stored in patch files, gzip and zlib back
//! the decompression recipes produced when an archive member is compressed.
//!
//! # Examples
//!
//! Compress a remainder blob into a counting encoder and read it back:
//!
//! ```
//! use compress::zlib::{CompressionLevel, CountingDeflateEncoder, inflate_to_vec};
//!
//! let mut encoder = CountingDeflateEncoder::with_sink(Vec::new(), CompressionLevel::Best);
//! encoder.write(b"remainder bytes").unwrap();
//! let (compressed, len) = encoder.finish_into_inner().unwrap();
//! assert_eq!(len as usize, compressed.len());
//! assert_eq!(inflate_to_vec(&compressed).unwrap(), b"remainder bytes");
//! ```

use std::{
    fmt,
    io::{self, Read, Write},
    num::NonZeroU8,
};

use flate2::{
    Compression,
    read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder},
    write::{DeflateEncoder, GzEncoder, ZlibEncoder},
};

use crate::common::CountingWriter;

/// Compression levels shared by the deflate and zstd helpers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionLevel {
    /// Favour speed over compression ratio.
    Fast,
    /// Use the codec's default balance between speed and ratio.
    Default,
    /// Favour the best possible compression ratio.
    Best,
    /// Use an explicit codec level.
    Precise(NonZeroU8),
}

impl CompressionLevel {
    /// Highest level accepted by [`CompressionLevel::from_numeric`] (the zstd ceiling).
    pub const MAX_NUMERIC: u32 = 22;

    /// Creates a [`CompressionLevel::Precise`] value from an explicit numeric level.
    ///
    /// Levels must fall within `1..=22`. Deflate codecs clamp anything above 9.
    pub fn from_numeric(level: u32) -> Result<Self, CompressionLevelError> {
        if level > Self::MAX_NUMERIC {
            return Err(CompressionLevelError::new(level));
        }
        u8::try_from(level)
            .ok()
            .and_then(NonZeroU8::new)
            .map(Self::Precise)
            .ok_or(CompressionLevelError::new(level))
    }

    /// Constructs a [`CompressionLevel::Precise`] variant from the provided level.
    #[must_use]
    pub const fn precise(level: NonZeroU8) -> Self {
        Self::Precise(level)
    }
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Fast => Compression::fast(),
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::Best => Compression::best(),
            CompressionLevel::Precise(value) => Compression::new(u32::from(value.get()).min(9)),
        }
    }
}

/// Error returned when a requested compression level falls outside the
/// permissible range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompressionLevelError {
    level: u32,
}

impl CompressionLevelError {
    const fn new(level: u32) -> Self {
        Self { level }
    }

    /// Returns the invalid compression level that triggered the error.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }
}

impl fmt::Display for CompressionLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compression level {} is outside the supported range 1-{}",
            self.level,
            CompressionLevel::MAX_NUMERIC
        )
    }
}

impl std::error::Error for CompressionLevelError {}

/// Raw-deflate encoder for the patch remainder that tracks how many
/// compressed bytes reached `W`.
pub struct CountingDeflateEncoder<W>
where
    W: Write,
{
    inner: DeflateEncoder<CountingWriter<W>>,
}

impl<W> CountingDeflateEncoder<W>
where
    W: Write,
{
    /// Creates an encoder that writes compressed bytes into `sink`.
    pub fn with_sink(sink: W, level: CompressionLevel) -> Self {
        Self {
            inner: DeflateEncoder::new(CountingWriter::new(sink), level.into()),
        }
    }

    /// Appends data to the compression stream.
    pub fn write(&mut self, input: &[u8]) -> io::Result<()> {
        self.inner.write_all(input)
    }

    /// Returns the number of compressed bytes produced so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.inner.get_ref().bytes()
    }

    /// Completes the stream and returns the sink together with the number of compressed bytes.
    pub fn finish_into_inner(self) -> io::Result<(W, u64)> {
        let writer = self.inner.finish()?;
        Ok(writer.into_parts())
    }
}

impl<W: Write> Write for CountingDeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Compresses `input` as a zlib stream.
pub fn compress_to_vec(input: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level.into());
    encoder.write_all(input)?;
    encoder.finish()
}

/// Decompresses a zlib stream.
pub fn decompress_to_vec(input: &[u8]) -> io::Result<Vec<u8>> {
    read_all(ZlibDecoder::new(input))
}

/// Compresses `input` as a single gzip member.
pub fn gzip_to_vec(input: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), level.into());
    encoder.write_all(input)?;
    encoder.finish()
}

/// Decompresses every gzip member in `input`.
pub fn gunzip_to_vec(input: &[u8]) -> io::Result<Vec<u8>> {
    read_all(MultiGzDecoder::new(input))
}

/// Compresses `input` as raw deflate.
pub fn deflate_to_vec(input: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), level.into());
    encoder.write_all(input)?;
    encoder.finish()
}

/// Decompresses raw deflate.
pub fn inflate_to_vec(input: &[u8]) -> io::Result<Vec<u8>> {
    read_all(DeflateDecoder::new(input))
}

fn read_all<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    reader.read_to_end(&mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_encoder_matches_its_sink() {
        let mut encoder = CountingDeflateEncoder::with_sink(Vec::new(), CompressionLevel::Default);
        encoder.write(b"payload").expect("compress payload");
        let (compressed, bytes) = encoder.finish_into_inner().expect("finish stream");
        assert!(bytes > 0);
        assert_eq!(bytes as usize, compressed.len());
        assert_eq!(inflate_to_vec(&compressed).expect("inflate"), b"payload");
    }

    #[test]
    fn counting_encoder_reports_incremental_bytes() {
        let mut encoder = CountingDeflateEncoder::with_sink(Vec::new(), CompressionLevel::Default);
        assert_eq!(encoder.bytes_written(), 0);
        encoder.write(b"payload").expect("compress payload");
        let after_first = encoder.bytes_written();
        encoder.write(b"more payload").expect("compress payload");
        assert!(encoder.bytes_written() >= after_first);
    }

    #[test]
    fn raw_deflate_round_trip() {
        let input = b"The quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = deflate_to_vec(&input, CompressionLevel::Best).expect("compress");
        assert!(compressed.len() < input.len());
        assert_eq!(inflate_to_vec(&compressed).expect("inflate"), input);
    }

    #[test]
    fn gzip_and_zlib_round_trip() {
        let payload = b"highly compressible payload".repeat(4);
        let gz = gzip_to_vec(&payload, CompressionLevel::Default).expect("gzip");
        assert_eq!(gunzip_to_vec(&gz).expect("gunzip"), payload);
        let zl = compress_to_vec(&payload, CompressionLevel::Default).expect("zlib");
        assert_eq!(decompress_to_vec(&zl).expect("unzlib"), payload);
    }

    #[test]
    fn concatenated_gzip_members_decode_fully() {
        let mut joined = gzip_to_vec(b"first ", CompressionLevel::Fast).expect("gzip");
        joined.extend(gzip_to_vec(b"second", CompressionLevel::Fast).expect("gzip"));
        assert_eq!(gunzip_to_vec(&joined).expect("gunzip"), b"first second");
    }

    #[test]
    fn precise_level_is_clamped_for_deflate() {
        let level = CompressionLevel::from_numeric(19).expect("valid level");
        assert_eq!(Compression::from(level).level(), 9);
    }

    #[test]
    fn numeric_level_constructor_rejects_out_of_range() {
        assert_eq!(CompressionLevel::from_numeric(0).expect_err("zero").level(), 0);
        assert_eq!(CompressionLevel::from_numeric(23).expect_err("too high").level(), 23);
    }
}
