//! Choosing which source payload to diff each target payload against.

use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use archive::ArchiveTokenization;
use items::ItemDefinition;

use crate::assembly::SourceClosure;
use crate::error::{EngineError, EngineResult};

/// One candidate pairing of a target item with a source basis.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeltaPlan {
    /// Item to rebuild.
    pub target: ItemDefinition,
    /// Source item the delta is computed against.
    pub source: ItemDefinition,
    /// Target payload name that produced the pairing.
    pub name: String,
}

/// Outcome of delta selection, with the name lists written for diagnosis.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlanSelection {
    /// Candidate pairings, sorted and without duplicates.
    pub plans: Vec<DeltaPlan>,
    /// Target payload names with no source counterpart.
    pub new_items: Vec<String>,
    /// Target payload names whose content the source already has under a
    /// matching name.
    pub identical_items: Vec<String>,
    /// Target payload names paired with differing source content.
    pub different_items: Vec<String>,
}

impl PlanSelection {
    /// Writes `DeltaPlans.json` and the three name lists into `folder`.
    pub fn write_to(&self, folder: &Path) -> EngineResult<()> {
        let write = |name: &str, text: String| {
            let path = folder.join(name);
            fs::write(&path, text).map_err(|err| EngineError::io("write", &path, err))
        };
        write("DeltaPlans.json", serde_json::to_string_pretty(&self.plans)?)?;
        write("NewItems.txt", lines(&self.new_items))?;
        write("IdenticalItems.txt", lines(&self.identical_items))?;
        write("DifferentItems.txt", lines(&self.different_items))?;
        Ok(())
    }

    /// Reads a plan list written by [`write_to`](Self::write_to).
    pub fn read_plans(folder: &Path) -> EngineResult<Vec<DeltaPlan>> {
        let path = folder.join("DeltaPlans.json");
        let text = fs::read_to_string(&path).map_err(|err| EngineError::io("read", &path, err))?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn lines(names: &[String]) -> String {
    names.iter().map(|name| format!("{name}\n")).collect()
}

/// Items the target can be asked for while rebuilding its archive item.
///
/// Walks the target's forward recipes from the archive item. Payload items
/// that no forward recipe reaches would never be requested, so diffing them
/// is wasted work.
#[must_use]
pub fn reachable_target_items(target: &ArchiveTokenization) -> BTreeSet<ItemDefinition> {
    let mut reached = BTreeSet::new();
    let mut queue = VecDeque::from([target.archive_item().without_names()]);
    while let Some(item) = queue.pop_front() {
        if !reached.insert(item.clone()) {
            continue;
        }
        if let Some(recipe) = target.forward_recipe(&item) {
            queue.extend(
                recipe
                    .item_ingredients()
                    .into_iter()
                    .map(ItemDefinition::without_names),
            );
        }
    }
    reached
}

/// Pairs target payload items the source cannot produce with source payload
/// items of the same or wildcard-equal name.
///
/// Target items with a forward recipe of their own (nested archives) are
/// rebuilt from their parts and never diffed as a whole. Pairs whose
/// content is identical are skipped. The wildcard match is a heuristic:
/// unrelated files can pair up, and delta-size arbitration rejects them.
#[must_use]
pub fn select_plans(
    source: &ArchiveTokenization,
    target: &ArchiveTokenization,
    closure: &SourceClosure,
) -> PlanSelection {
    let reachable = reachable_target_items(target);
    let mut plans = BTreeSet::new();
    let mut selection = PlanSelection::default();

    for (name, target_item) in target.payload().entries() {
        let key = target_item.without_names();
        if target.forward_recipe(&key).is_some() {
            continue;
        }

        let candidates: BTreeSet<ItemDefinition> = source
            .payload()
            .matching_wildcard(name)
            .map(ItemDefinition::without_names)
            .collect();

        if candidates.is_empty() {
            selection.new_items.push(name.to_string());
            continue;
        }
        if candidates.contains(&key) {
            selection.identical_items.push(name.to_string());
            continue;
        }
        selection.different_items.push(name.to_string());

        if closure.covers(&key) || !reachable.contains(&key) || key.length() == 0 {
            debug!(target: "diffgen::delta", name, "target payload is not needed");
            continue;
        }

        for basis in candidates {
            plans.insert(DeltaPlan {
                target: key.clone(),
                source: basis,
                name: name.to_string(),
            });
        }
    }

    selection.plans = dedup_pairs(plans);
    info!(
        target: "diffgen::delta",
        plans = selection.plans.len(),
        new = selection.new_items.len(),
        identical = selection.identical_items.len(),
        different = selection.different_items.len(),
        "selected delta candidates"
    );
    selection
}

/// Keeps the first plan (by name) for each `(target, source)` pair.
fn dedup_pairs(plans: BTreeSet<DeltaPlan>) -> Vec<DeltaPlan> {
    let mut pairs = BTreeSet::new();
    plans
        .into_iter()
        .filter(|plan| pairs.insert((plan.target.clone(), plan.source.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive::ArchiveLoader;
    use archive::cpio::CpioWriter;
    use std::io::Cursor;

    fn tokens(files: &[(&str, &[u8])]) -> ArchiveTokenization {
        let mut writer = CpioWriter::new();
        for (name, data) in files {
            writer.add_file(name, data);
        }
        ArchiveLoader::with_default_parsers()
            .load(&mut Cursor::new(writer.finish_padded(512)))
            .expect("load")
    }

    #[test]
    fn versioned_names_pair_up_and_identical_content_is_skipped() {
        let source = tokens(&[
            ("lib/libdemo.so.1.2", b"old library"),
            ("etc/config", b"same config"),
            ("bin/tool", b"old tool"),
        ]);
        let target = tokens(&[
            ("lib/libdemo.so.1.3", b"new library"),
            ("etc/config", b"same config"),
            ("bin/tool", b"new tool"),
            ("share/readme", b"brand new"),
        ]);
        let closure = SourceClosure::compute(&source);
        let selection = select_plans(&source, &target, &closure);

        assert_eq!(selection.new_items, vec!["share/readme"]);
        assert_eq!(selection.identical_items, vec!["etc/config"]);
        assert_eq!(selection.different_items, vec!["bin/tool", "lib/libdemo.so.1.3"]);
        assert_eq!(selection.plans.len(), 2);

        let library = selection
            .plans
            .iter()
            .find(|plan| plan.name == "lib/libdemo.so.1.3")
            .expect("library plan");
        assert_eq!(library.source, ItemDefinition::from_bytes(b"old library"));
    }

    #[test]
    fn content_the_source_has_elsewhere_is_not_planned() {
        let source = tokens(&[("a", b"moved content"), ("b", b"old b")]);
        let target = tokens(&[("b", b"moved content")]);
        let closure = SourceClosure::compute(&source);
        let selection = select_plans(&source, &target, &closure);
        assert_eq!(selection.different_items, vec!["b"]);
        assert!(selection.plans.is_empty());
    }

    #[test]
    fn selection_files_are_written() {
        let source = tokens(&[("x", b"one")]);
        let target = tokens(&[("x", b"two"), ("y", b"three")]);
        let selection = select_plans(&source, &target, &SourceClosure::compute(&source));
        let dir = tempfile::tempdir().expect("tempdir");
        selection.write_to(dir.path()).expect("write");
        assert_eq!(
            fs::read_to_string(dir.path().join("NewItems.txt")).expect("read"),
            "y\n"
        );
        assert_eq!(
            PlanSelection::read_plans(dir.path()).expect("plans"),
            selection.plans
        );
    }
}
