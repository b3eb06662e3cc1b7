#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `archive` turns an archive file into an [`ArchiveTokenization`]: the
//! physical chunks that tile the file, the logical payload items decoded
//! from it, and the recipes that move between the two. The diff engine
//! only ever sees tokenizations, never raw archive formats.
//!
//! # Design
//!
//! - [`ArchiveLoader`] is an explicit registry of [`ArchiveParser`]s tried
//!   by descending priority, then by name. A parser that does not recognise
//!   a stream returns [`FormatMismatch`] as a value so the loader can move on.
//! - After a parser succeeds, the loader fills every uncovered byte range
//!   with gap chunks ([`gaps::split_gap`]) and checks that the chunks tile
//!   the archive exactly.
//! - [`cpio::CpioParser`] handles newc cpio streams and
//!   [`compressed::CompressedStreamParser`] handles whole-file zstd and gzip
//!   streams, importing the tokenization of a nested archive when the
//!   decompressed stream is one.
//! - Tokenizations persist as JSON documents ([`ArchiveTokenization::to_json`])
//!   so a pipeline stage can be resumed without re-parsing.
//!
//! # Invariants
//!
//! - Chunk offsets partition `[0, archive length)` with no overlap once gaps
//!   are filled.
//! - Each result identity has at most one forward and one reverse recipe.
//! - Loading a document with a duplicate recipe result or chunk offset fails
//!   with [`ArchiveError::Duplicate`].
//!
//! # Errors
//!
//! [`ArchiveError`] separates unrecognised or corrupt input
//! ([`ArchiveError::is_format_error`]) from graph inconsistencies
//! ([`ArchiveError::is_fatal`]).
//!
//! # Examples
//!
//! ```
//! use std::io::Cursor;
//! use archive::{ArchiveLoader, cpio::CpioWriter};
//!
//! let mut writer = CpioWriter::new();
//! writer.add_file("etc/hostname", b"device-a\n");
//! let bytes = writer.finish_padded(512);
//!
//! let tokens = ArchiveLoader::with_default_parsers()
//!     .load(&mut Cursor::new(bytes))
//!     .unwrap();
//! assert_eq!(tokens.format(), "cpio");
//! assert!(tokens.payload().contains_name("etc/hostname"));
//! tokens.check_partition().unwrap();
//! ```
//!
//! # See also
//!
//! - `items` for the item and recipe types stored here.
//! - `engine` for the diff assembly that consumes two tokenizations.

pub mod compressed;
pub mod cpio;
mod document;
mod error;
pub mod gaps;
mod loader;
pub mod names;
mod payload;
mod tokenization;

pub use error::{ArchiveError, ArchiveResult, FormatMismatch};
pub use loader::{
    ArchiveInput, ArchiveLoader, ArchiveParser, LoadContext, MAX_NESTING_DEPTH, ParseOutcome,
};
pub use payload::PayloadCatalog;
pub use tokenization::{ArchiveTokenization, Chunk};
