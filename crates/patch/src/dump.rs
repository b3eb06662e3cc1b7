//! Human-readable rendering of a patch.

use std::path::Path;

use serde::Serialize;

use items::{ItemDefinition, Recipe};

use crate::error::PatchResult;
use crate::file::{PATCH_VERSION, PatchFile};

/// JSON view of a patch, without the blob contents.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatchSummary {
    /// Format version.
    pub version: u64,
    /// Item the patch reproduces.
    pub target_item: ItemDefinition,
    /// Item the patch applies to.
    pub source_item: ItemDefinition,
    /// Recipes in stored order.
    pub recipes: Vec<Recipe>,
    /// Bytes of inline assets.
    pub inline_assets_length: u64,
    /// Bytes of remainder once inflated.
    pub remainder_length: u64,
    /// Bytes of remainder as stored.
    pub remainder_compressed_length: u64,
}

impl PatchFile {
    /// Describes the patch without its blob contents.
    #[must_use]
    pub fn summary(&self) -> PatchSummary {
        PatchSummary {
            version: PATCH_VERSION,
            target_item: self.target.clone(),
            source_item: self.source.clone(),
            recipes: self.recipes.clone(),
            inline_assets_length: self.inline_assets.len() as u64,
            remainder_length: self.remainder.uncompressed_length(),
            remainder_compressed_length: self.remainder.compressed_length(),
        }
    }
}

/// Reads the patch at `path` and renders its summary as pretty JSON.
pub fn dump_json(path: &Path) -> PatchResult<String> {
    let patch = PatchFile::read_path(path)?;
    Ok(serde_json::to_string_pretty(&patch.summary())?)
}
