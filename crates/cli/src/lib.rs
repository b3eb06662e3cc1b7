#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` is the command-line front-end of `diffgen`:
//!
//! ```text
//! diffgen <source> <target> <output> <logFolder> <workingFolder> [recompressedTarget] [signingCommand]
//! ```
//!
//! It parses the arguments, merges an optional JSON config file with the
//! flags, installs logging into the log folder and hands the build to
//! [`engine::DiffBuilder`].
//!
//! # Design
//!
//! [`run`] takes the argument list and the two output streams, so the binary
//! and the tests drive the same code path. The `clap` command is built with
//! the builder API. Operands are all optional at the parser level; missing
//! ones are reported together by [`engine::Parameters::validate`].
//!
//! # Invariants
//!
//! - `run` never panics; every failure becomes a non-zero exit status.
//! - Flags always override values from `--config`.
//!
//! # Errors
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 0 | Patch written and verified |
//! | 1 | Invalid parameters or missing binaries (listed on stdout) |
//! | 2 | Unrecognised or corrupt archive |
//! | 3 | Target is not diffable under the threshold |
//! | 4 | Patch failed verification |
//! | 5 | Working folder belongs to other inputs |
//! | 6 | Inconsistent item graph or failing recompression tool |
//! | 7 | I/O error |
//! | 8 | Cancelled |
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let status = cli::run(["diffgen", "--version"], &mut stdout, &mut stderr);
//!
//! assert_eq!(status, 0);
//! assert!(String::from_utf8_lossy(&stdout).contains("diffgen"));
//! ```
//!
//! # See also
//!
//! - `src/bin/diffgen.rs` at the workspace root, which wires [`run`] into `main`.

mod frontend;

pub use frontend::{
    EXIT_INVALID_PARAMETERS, EXIT_OK, PROGRAM_NAME, ParsedArgs, parse_args, run,
};

/// Renders the `--help` text.
#[must_use]
pub fn render_help() -> String {
    let mut command = frontend::clap_command(PROGRAM_NAME);
    command.render_help().to_string()
}
