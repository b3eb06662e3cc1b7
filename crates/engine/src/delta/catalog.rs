//! The best delta found for each target item.

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use items::{ItemDefinition, Recipe};

use crate::diff::delta_asset;
use crate::error::{EngineError, EngineResult};

/// A delta asset on disk and the recipe that applies it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeltaEntry {
    /// Builder that produced the asset.
    pub builder: String,
    /// Asset file.
    pub path: PathBuf,
    /// Recipe rebuilding the target from the asset and its basis.
    pub recipe: Recipe,
}

impl DeltaEntry {
    /// Target item the entry rebuilds.
    #[must_use]
    pub fn target(&self) -> &ItemDefinition {
        self.recipe.result()
    }

    /// Identity of the delta asset.
    #[must_use]
    pub fn asset(&self) -> Option<&ItemDefinition> {
        delta_asset(&self.recipe)
    }

    /// Asset length, the value entries compete on.
    #[must_use]
    pub fn asset_length(&self) -> u64 {
        self.asset().map_or(u64::MAX, ItemDefinition::length)
    }
}

/// Concurrent map from target item to its smallest delta.
///
/// Builders running in parallel [`offer`](Self::offer) entries; the map
/// keeps the smaller asset per target, and the earlier offer on a tie.
#[derive(Debug, Default)]
pub struct DeltaCatalog {
    entries: DashMap<ItemDefinition, DeltaEntry>,
}

impl DeltaCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `entry` if its target has no entry or only a larger one.
    pub fn offer(&self, entry: DeltaEntry) -> bool {
        let key = entry.target().without_names();
        let mut accepted = true;
        self.entries
            .entry(key)
            .and_modify(|existing| {
                if entry.asset_length() < existing.asset_length() {
                    *existing = entry.clone();
                } else {
                    accepted = false;
                }
            })
            .or_insert_with(|| entry.clone());
        if accepted {
            debug!(
                target: "diffgen::delta",
                item = %entry.target(),
                builder = %entry.builder,
                bytes = entry.asset_length(),
                "delta accepted"
            );
        }
        accepted
    }

    /// Best entry for `item`.
    #[must_use]
    pub fn get(&self, item: &ItemDefinition) -> Option<DeltaEntry> {
        self.entries.get(item).map(|entry| entry.value().clone())
    }

    /// Number of targets with a delta.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no delta was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by target identity.
    #[must_use]
    pub fn entries(&self) -> Vec<DeltaEntry> {
        let mut entries: Vec<DeltaEntry> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by(|a, b| a.target().cmp(b.target()));
        entries
    }

    /// Path of the asset with identity `asset`.
    #[must_use]
    pub fn asset_path(&self, asset: &ItemDefinition) -> Option<PathBuf> {
        self.entries
            .iter()
            .find(|entry| entry.value().asset() == Some(asset))
            .map(|entry| entry.value().path.clone())
    }

    /// Writes the entries as a JSON array.
    pub fn write_json(&self, path: &Path) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(&self.entries())?;
        fs::write(path, text).map_err(|err| EngineError::io("write", path, err))
    }

    /// Reads a catalog written by [`write_json`](Self::write_json).
    pub fn read_json(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| EngineError::io("read", path, err))?;
        let entries: Vec<DeltaEntry> = serde_json::from_str(&text)?;
        let catalog = Self::new();
        for entry in entries {
            catalog.offer(entry);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use items::DeltaFormat;

    fn entry(target: &ItemDefinition, delta: &[u8], builder: &str) -> DeltaEntry {
        let basis = ItemDefinition::from_bytes(b"basis content");
        DeltaEntry {
            builder: builder.to_string(),
            path: PathBuf::from(format!("/deltas/{builder}")),
            recipe: Recipe::apply_delta(
                DeltaFormat::Zstd,
                target.clone(),
                ItemDefinition::from_bytes(delta),
                basis,
            )
            .expect("recipe"),
        }
    }

    #[test]
    fn smaller_delta_wins_and_ties_keep_the_first() {
        let target = ItemDefinition::from_bytes(&[7u8; 4096]);
        let catalog = DeltaCatalog::new();
        assert!(catalog.offer(entry(&target, &[1u8; 300], "bsdiff")));
        assert!(catalog.offer(entry(&target, &[2u8; 100], "zstd")));
        assert!(!catalog.offer(entry(&target, &[3u8; 100], "other")));
        assert!(!catalog.offer(entry(&target, &[4u8; 200], "bigger")));

        let best = catalog.get(&target).expect("entry");
        assert_eq!(best.builder, "zstd");
        assert_eq!(catalog.len(), 1);
        let asset = best.asset().expect("asset").clone();
        assert_eq!(catalog.asset_path(&asset), Some(PathBuf::from("/deltas/zstd")));
    }

    #[test]
    fn catalog_survives_a_json_file() {
        let catalog = DeltaCatalog::new();
        catalog.offer(entry(&ItemDefinition::from_bytes(&[1u8; 1000]), b"d1", "zstd"));
        catalog.offer(entry(&ItemDefinition::from_bytes(&[2u8; 1000]), b"d2", "zstd"));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deltas.json");
        catalog.write_json(&path).expect("write");
        let loaded = DeltaCatalog::read_json(&path).expect("read");
        assert_eq!(loaded.entries(), catalog.entries());
    }
}
