//! Packing adopted delta assets into the inline asset blob.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::blob::{Blob, BlobWriter};
use crate::delta::DeltaCatalog;
use crate::diff::Diff;
use crate::error::{EngineError, EngineResult};

/// File name of the inline asset blob in the working folder.
pub const INLINE_ASSETS_FILE: &str = "InlineAssets.dat";

/// Name carried by the inline asset blob item.
pub const INLINE_ASSETS_NAME: &str = "inline_assets";

/// Writes every delta asset `diff` references into `folder` and adds the
/// slices that read them back.
///
/// Assets are deduplicated and written in identity order. Returns `None`
/// when the diff adopted no delta.
pub fn write_inline_assets(
    diff: &mut Diff,
    catalog: &DeltaCatalog,
    folder: &Path,
) -> EngineResult<Option<Blob>> {
    let assets = diff.delta_assets();
    if assets.is_empty() {
        return Ok(None);
    }

    let path = folder.join(INLINE_ASSETS_FILE);
    let mut writer = BlobWriter::create(&path, INLINE_ASSETS_NAME)?;
    for asset in &assets {
        let source = catalog.asset_path(asset).ok_or_else(|| {
            EngineError::Fatal(format!("delta asset {asset} is not in the delta catalog"))
        })?;
        let data = fs::read(&source).map_err(|err| EngineError::io("read", &source, err))?;
        writer.push(asset, &data)?;
    }

    let blob = writer.finish()?;
    blob.verify_members()?;
    for recipe in &blob.recipes {
        diff.add_recipe(recipe.clone());
    }
    info!(
        target: "diffgen::remainder",
        assets = blob.members.len(),
        bytes = blob.len(),
        "wrote inline assets"
    );
    Ok(Some(blob))
}
