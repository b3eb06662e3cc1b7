#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` builds a patch that turns a source archive into a target
//! archive. Both archives are tokenized, every target item is resolved to a
//! recipe grounded in the source, a delta, or the remainder, and the result
//! is written and verified by applying it before it is committed.
//!
//! # Design
//!
//! - [`DiffBuilder`] runs the stages in order: recompress (optional),
//!   tokenize, plan and build deltas, assemble, analyze, inline assets,
//!   remainder, write and verify. Stage state lives in a
//!   [`WorkingFolder`] guarded by cookies and input hashes, so an
//!   interrupted build resumes where it stopped.
//! - [`SourceClosure`] is the fixed point of everything the source archive
//!   can produce. [`Assembler`] walks the target graph from its archive item
//!   against that closure.
//! - [`DeltaBuilder`] implementations ([`ToolDeltaBuilder`],
//!   [`ZstdDeltaBuilder`], [`NestedDeltaBuilder`]) run in parallel over
//!   [`DeltaPlan`]s and offer their assets to a concurrent [`DeltaCatalog`]
//!   that keeps the smallest per target.
//! - External programs run through [`ToolCommand`] with a size-scaled
//!   timeout and are killed when the [`CancellationToken`] fires.
//!
//! # Invariants
//!
//! - A [`Diff`] holds at most one recipe per identity, so duplicated target
//!   content is produced once.
//! - Delta recipes are only adopted when their basis is producible from the
//!   source.
//! - The patch file only appears at its final path after it was applied to
//!   the source and reproduced the target exactly.
//!
//! # Errors
//!
//! Every failure is an [`EngineError`]; [`EngineError::exit_code`] maps it
//! to the process status. Delta tools failing on one candidate are not
//! errors: the candidate simply gets no delta.
//!
//! # Examples
//!
//! ```no_run
//! use engine::{DiffBuilder, DiffConfig, Parameters};
//!
//! let params = Parameters {
//!     source: "old.cpio".into(),
//!     target: "new.cpio".into(),
//!     output: "update.patch".into(),
//!     log_folder: "logs".into(),
//!     working_folder: "work".into(),
//!     ..Parameters::default()
//! };
//! let outcome = DiffBuilder::new(params, DiffConfig::default()).run()?;
//! println!("{} byte patch", outcome.patch_size);
//! # Ok::<(), engine::EngineError>(())
//! ```
//!
//! # See also
//!
//! - `archive` for tokenization.
//! - `patch` for the patch file and the apply session used in verification.

mod analysis;
mod assembly;
mod blob;
mod cancel;
mod config;
pub mod delta;
mod diff;
mod error;
mod extract;
mod inline;
mod pipeline;
mod process;
mod remainder;
mod tools;
mod workdir;

pub use analysis::{check_diffable, undiffable_bytes};
pub use assembly::{Assembler, SourceClosure};
pub use blob::{Blob, BlobWriter};
pub use cancel::CancellationToken;
pub use config::{DeltaConfig, DiffConfig, Parameters, ToolPaths, ValidationIssue};
pub use delta::{
    DeltaBuilder, DeltaCatalog, DeltaEntry, DeltaPlan, NestedDeltaBuilder, ToolDeltaBuilder,
    ZstdDeltaBuilder,
};
pub use diff::{Diff, DiffStats, RecipeTally, delta_asset};
pub use error::{EngineError, EngineResult};
pub use extract::{ItemExtractor, hash_file, item_path};
pub use inline::{INLINE_ASSETS_FILE, INLINE_ASSETS_NAME, write_inline_assets};
pub use pipeline::{DIFF_DOCUMENT, DiffBuilder, DiffOutcome};
pub use process::{BYTES_PER_MINUTE, MAX_TIMEOUT, MIN_TIMEOUT, ToolCommand, ToolOutcome, timeout_for};
pub use remainder::{REMAINDER_FILE, REMAINDER_MANIFEST, REMAINDER_NAME, verify_remainder_items, write_remainder};
pub use tools::{binary_candidates, resolve_binary};
pub use workdir::{MoveRetry, OutputGuard, WorkingFolder, move_with_retries};
