#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` provides the content hashes that give every diffgen item its
//! identity. An item is the same item wherever it appears (source archive,
//! target archive, generated delta) as long as its digests match, so all
//! higher layers key their maps by the values produced here.
//!
//! # Design
//!
//! - [`HashAlgorithm`] enumerates the supported algorithms. The ordering of
//!   the variants is part of item identity ordering and must not change.
//! - [`Hash`] pairs an algorithm with its digest bytes and serializes as a
//!   lowercase hex string.
//! - [`strong`] wraps the RustCrypto implementations behind the
//!   [`strong::StrongDigest`] trait.
//! - [`ItemHasher`] feeds one byte stream into several algorithms at once.
//!
//! # Examples
//!
//! ```
//! use checksums::{HashAlgorithm, ItemHasher};
//!
//! let mut hasher = ItemHasher::new(HashAlgorithm::DEFAULT_SET);
//! hasher.update(b"abc");
//! let hashes = hasher.finalize();
//! assert_eq!(
//!     hashes[&HashAlgorithm::Sha256].to_string(),
//!     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
//! );
//! ```
//!
//! # See also
//!
//! - `items::ItemDefinition`, which stores the map returned by
//!   [`ItemHasher::finalize`].

mod algorithm;
mod error;
mod hash;
mod hasher;
pub mod strong;

pub use algorithm::HashAlgorithm;
pub use error::{ChecksumError, ChecksumResult};
pub use hash::Hash;
pub use hasher::{Hashes, ItemHasher};
