#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `items` defines the vocabulary of the diff engine: an
//! [`ItemDefinition`] is a content-addressed byte range, and a [`Recipe`]
//! explains how to produce one item from others. Archives, deltas and the
//! final patch are all expressed as graphs of these two types.
//!
//! # Design
//!
//! - Item equality, ordering and hashing look at the length and digests
//!   only. Names are aliases for diagnostics and never split an identity,
//!   except for items that carry no digests.
//! - [`RecipeKind`] is a closed enum. Constructors on [`Recipe`] validate
//!   lengths and reject self-referential recipes, so a recipe value in hand
//!   is always structurally sound.
//! - Recipes hold ingredients by value. Graph owners key their maps by item
//!   and look ingredients up again; nothing points back at its producer.
//! - [`RecipeRecord`] is the flat name-plus-ingredients form used by JSON
//!   documents and the patch encoder.
//!
//! # Invariants
//!
//! - `Copy` ingredients share the result's identity.
//! - `Region` and `Slice` ranges fit inside their ingredient.
//! - `Concatenation` part lengths sum to the result length.
//! - No recipe other than `Copy` lists its own result as an ingredient.
//!
//! # Errors
//!
//! Every fallible operation returns [`ItemError`]. Format and graph errors
//! are fatal ([`ItemError::is_fatal`]); only I/O failures may be retried.
//!
//! # Examples
//!
//! ```
//! use items::{ItemDefinition, Recipe};
//!
//! let archive = ItemDefinition::from_bytes(b"headerpayload");
//! let payload = ItemDefinition::from_bytes(b"payload").with_name("payload");
//! let recipe = Recipe::region(payload.clone(), archive, 6).unwrap();
//! assert_eq!(recipe.name(), "Region");
//! assert_eq!(recipe.number_ingredients(), vec![6, 7]);
//! ```
//!
//! # See also
//!
//! - `checksums` for the digests behind item identity.
//! - `archive` for the tokenizers that produce recipes from archive bytes.

mod error;
mod item;
pub mod recipe;

pub use error::{ItemError, ItemResult};
pub use item::{HASH_BLOCK_SIZE, ItemDefinition};
pub use recipe::{DeltaFormat, Recipe, RecipeKind, RecipeRecord};
