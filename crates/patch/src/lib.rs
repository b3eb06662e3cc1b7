#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `patch` stores a finished diff as a single binary file and reproduces the
//! target from it. [`CreateSession`] gathers the target and source identities,
//! the recipe list and the two blobs (inline assets and remainder) and writes
//! a [`PatchFile`]. [`ApplySession`] loads a patch together with the source
//! archive and produces any item by identity.
//!
//! # Design
//!
//! - Integers are little-endian; items are written without their names.
//! - Recipes are stored by tag and rebuilt through [`items::RecipeRecord`],
//!   so the patch decoder enforces the same arity and length checks as the
//!   JSON documents.
//! - The remainder is stored as raw deflate. Inline assets are stored as-is
//!   and addressed by `InlineAssetCopy` recipes.
//! - Nested patches (`ApplyNestedDiff`) are applied by a fresh session whose
//!   source is the recipe's basis item.
//!
//! # Invariants
//!
//! - Every item an [`ApplySession`] returns has been verified against its
//!   identity, including every intermediate ingredient.
//! - A session refuses a source whose identity differs from the one the patch
//!   was built against.
//!
//! # Errors
//!
//! [`PatchError::is_format_error`] flags undecodable files and
//! [`PatchError::is_verification_failure`] flags bytes that do not match
//! their identity.
//!
//! # Examples
//!
//! ```
//! use items::{ItemDefinition, Recipe};
//! use patch::{ApplyOptions, ApplySession, PatchFile};
//!
//! let source = b"0123456789".to_vec();
//! let target = ItemDefinition::from_bytes(b"345");
//! let patch = PatchFile {
//!     target: target.clone(),
//!     source: ItemDefinition::from_bytes(&source),
//!     recipes: vec![Recipe::copy_source(target, 3).unwrap()],
//!     inline_assets: Vec::new(),
//!     remainder: Default::default(),
//! };
//!
//! let mut session = ApplySession::new(patch, source, ApplyOptions::default()).unwrap();
//! assert_eq!(session.apply().unwrap(), b"345");
//! ```
//!
//! # See also
//!
//! - `engine` for the pipeline that creates and self-verifies patches.

mod apply;
mod create;
mod dump;
mod error;
mod file;
mod wire;

pub use apply::{ApplyOptions, ApplySession, MAX_RECIPE_DEPTH};
pub use create::CreateSession;
pub use dump::{PatchSummary, dump_json};
pub use error::{PatchError, PatchResult};
pub use file::{CompressedRemainder, PATCH_MAGIC, PATCH_VERSION, PatchFile};
