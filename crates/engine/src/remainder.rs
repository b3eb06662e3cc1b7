//! The remainder: target bytes nothing else can produce.

use std::cmp::Reverse;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use items::ItemDefinition;

use crate::blob::{Blob, BlobWriter};
use crate::diff::Diff;
use crate::error::{EngineError, EngineResult};
use crate::extract::ItemExtractor;

/// File name of the remainder blob in the working folder.
pub const REMAINDER_FILE: &str = "Remainder.dat";

/// Name carried by the remainder blob item.
pub const REMAINDER_NAME: &str = "remainder";

/// File listing the remainder members next to the blob.
pub const REMAINDER_MANIFEST: &str = "remainder.json";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestEntry<'a> {
    item: &'a ItemDefinition,
    offset: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Manifest<'a> {
    remainder_item: &'a ItemDefinition,
    items: Vec<ManifestEntry<'a>>,
}

/// Extracts every needed item from the target into the remainder blob.
///
/// Items go in by descending length, then identity, and each gets a slice
/// recipe against the blob (unless it is the only member). The blob is
/// read back and every slice checked before the recipes are adopted.
/// Returns `None` when nothing is needed.
pub fn write_remainder(
    diff: &mut Diff,
    target: &mut ItemExtractor,
    folder: &Path,
) -> EngineResult<Option<Blob>> {
    let mut needed: Vec<ItemDefinition> = diff.needed().iter().cloned().collect();
    if needed.is_empty() {
        return Ok(None);
    }
    needed.sort_by(|a, b| (Reverse(a.length()), a).cmp(&(Reverse(b.length()), b)));

    let path = folder.join(REMAINDER_FILE);
    let mut writer = BlobWriter::create(&path, REMAINDER_NAME)?;
    for item in &needed {
        let data = target.extract(item).map_err(|err| {
            EngineError::Fatal(format!("cannot read {item} from the target: {err}"))
        })?;
        let offset = writer.push(item, &data)?;
        debug!(target: "diffgen::remainder", item = %item, offset, "added to remainder");
    }

    let blob = writer.finish()?;
    verify_remainder_items(&blob)?;
    for recipe in &blob.recipes {
        diff.add_recipe(recipe.clone());
    }
    // A single member is the blob itself.
    diff.retain_needed(|item| *item != blob.item);

    write_manifest(&blob, &folder.join(REMAINDER_MANIFEST))?;
    info!(
        target: "diffgen::remainder",
        items = blob.members.len(),
        bytes = blob.len(),
        "wrote remainder"
    );
    Ok(Some(blob))
}

/// Re-reads the remainder blob and checks every member against its identity.
pub fn verify_remainder_items(blob: &Blob) -> EngineResult<()> {
    blob.verify_members()?;
    debug!(target: "diffgen::remainder", items = blob.members.len(), "remainder items verified");
    Ok(())
}

fn write_manifest(blob: &Blob, path: &Path) -> EngineResult<()> {
    let manifest = Manifest {
        remainder_item: &blob.item,
        items: blob
            .members
            .iter()
            .map(|(item, offset)| ManifestEntry {
                item,
                offset: *offset,
            })
            .collect(),
    };
    let text = serde_json::to_string_pretty(&manifest)?;
    fs::write(path, text).map_err(|err| EngineError::io("write", path, err))
}
