#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `compress` exposes the codecs diffgen needs to turn compressed archive
//! members into their payloads and back. Decompression recipes, the
//! recompression check that guards `ZstdCompression` recipes, the raw-deflate
//! remainder blob and the in-process zstd delta builder all go through here.
//!
//! # Design
//!
//! - [`algorithm::CompressionFormat`] names the stream formats recipes can
//!   reference and detects them from leading magic bytes.
//! - [`zlib`] wraps [`flate2`](https://docs.rs/flate2) for zlib, gzip and raw
//!   deflate streams.
//! - [`zstd`] wraps [`zstd`](https://docs.rs/zstd) for frames and for
//!   dictionary ("patch-from") deltas.
//! - [`codec`] dispatches on a format value so callers stay format-agnostic.
//!
//! # Invariants
//!
//! - [`zlib::CountingDeflateEncoder`] reports exactly the bytes its sink received.
//! - [`codec::recompresses_identically`] only reports success when the
//!   recompressed stream is byte-for-byte equal to the original.
//!
//! # Errors
//!
//! All fallible functions return [`std::io::Result`]. Library errors from the
//! zstd bindings are wrapped with [`std::io::Error::other`].
//!
//! # Examples
//!
//! ```
//! use compress::algorithm::CompressionFormat;
//! use compress::codec::{compress, decompress};
//! use compress::zlib::CompressionLevel;
//!
//! # fn main() -> std::io::Result<()> {
//! let data = b"payload payload payload";
//! let packed = compress(CompressionFormat::Gzip, data, CompressionLevel::Default)?;
//! assert_eq!(CompressionFormat::detect(&packed), Some(CompressionFormat::Gzip));
//! assert_eq!(decompress(CompressionFormat::Gzip, &packed)?, data);
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - `items::Recipe`, whose decompression variants carry a [`algorithm::CompressionFormat`].

pub mod algorithm;
pub mod codec;
mod common;
pub mod zlib;
pub mod zstd;
