//! Everything the source archive can produce.

use std::collections::BTreeMap;

use tracing::debug;

use archive::ArchiveTokenization;
use items::{ItemDefinition, Recipe};

/// The forward closure of a source tokenization.
///
/// Starting from the archive item, a result is covered once every
/// ingredient of one of its recipes is covered. Recipes are scanned
/// cheapest first (fewest item ingredients) and the scan repeats until
/// nothing changes, so each covered item keeps the first, cheapest
/// derivation found. Derivations only point at items covered earlier,
/// which keeps them acyclic.
#[derive(Clone, Debug)]
pub struct SourceClosure {
    root: ItemDefinition,
    derivations: BTreeMap<ItemDefinition, Recipe>,
    passes: usize,
}

impl SourceClosure {
    /// Computes the closure of `tokens`, using both its forward and reverse
    /// recipes.
    #[must_use]
    pub fn compute(tokens: &ArchiveTokenization) -> Self {
        let root = tokens.archive_item().without_names();
        let mut candidates: Vec<&Recipe> = tokens
            .reverse_recipes()
            .chain(tokens.forward_recipes())
            .collect();
        candidates.sort_by_key(|recipe| recipe.item_ingredients().len());

        let mut derivations: BTreeMap<ItemDefinition, Recipe> = BTreeMap::new();
        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for recipe in &candidates {
                let key = recipe.result().without_names();
                if key == root || derivations.contains_key(&key) {
                    continue;
                }
                let ready = recipe
                    .item_ingredients()
                    .into_iter()
                    .all(|ingredient| *ingredient == root || derivations.contains_key(ingredient));
                if ready {
                    derivations.insert(key, (*recipe).clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        debug!(
            target: "diffgen::assembly",
            covered = derivations.len() + 1,
            passes,
            "computed source closure"
        );
        Self {
            root,
            derivations,
            passes,
        }
    }

    /// The source archive item.
    #[must_use]
    pub const fn root(&self) -> &ItemDefinition {
        &self.root
    }

    /// Returns `true` when the source can produce `item`.
    #[must_use]
    pub fn covers(&self, item: &ItemDefinition) -> bool {
        *item == self.root || self.derivations.contains_key(item)
    }

    /// The recipe that derives `item` from other covered items.
    #[must_use]
    pub fn derivation(&self, item: &ItemDefinition) -> Option<&Recipe> {
        self.derivations.get(item)
    }

    /// Number of covered items, the archive included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.derivations.len() + 1
    }

    /// Always `false`: the archive covers itself.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Scans needed to reach the fixed point.
    #[must_use]
    pub const fn passes(&self) -> usize {
        self.passes
    }

    /// Every recipe needed to derive `item`, the item's own first.
    ///
    /// Returns `None` when the source cannot produce it; the archive item
    /// itself needs no recipes.
    #[must_use]
    pub fn solve(&self, item: &ItemDefinition) -> Option<Vec<Recipe>> {
        if !self.covers(item) {
            return None;
        }
        let mut recipes = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        let mut pending = vec![item.without_names()];
        while let Some(next) = pending.pop() {
            if next == self.root || !seen.insert(next.clone()) {
                continue;
            }
            if let Some(recipe) = self.derivations.get(&next) {
                pending.extend(
                    recipe
                        .item_ingredients()
                        .into_iter()
                        .map(ItemDefinition::without_names),
                );
                recipes.push(recipe.clone());
            }
        }
        Some(recipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive::ArchiveLoader;
    use archive::cpio::CpioWriter;
    use std::io::Cursor;

    fn load(bytes: Vec<u8>) -> ArchiveTokenization {
        ArchiveLoader::with_default_parsers()
            .load(&mut Cursor::new(bytes))
            .expect("load")
    }

    #[test]
    fn every_chunk_and_payload_is_covered() {
        let mut writer = CpioWriter::new();
        writer.add_file("a", b"alpha").add_file("b", b"bravo!");
        let tokens = load(writer.finish_padded(512));
        let closure = SourceClosure::compute(&tokens);

        for chunk in tokens.chunks() {
            assert!(closure.covers(&chunk.item), "chunk at {}", chunk.offset);
        }
        for item in tokens.payload_items() {
            assert!(closure.covers(&item));
        }
        assert!(!closure.covers(&ItemDefinition::from_bytes(b"charlie")));
    }

    #[test]
    fn nested_payload_is_solved_through_decompression() {
        let mut writer = CpioWriter::new();
        writer.add_file("inner/file", &b"nested content ".repeat(20));
        let packed =
            compress::zstd::compress_with_level(&writer.finish_padded(512), 3).expect("compress");
        let tokens = load(packed);
        let closure = SourceClosure::compute(&tokens);

        let file = ItemDefinition::from_bytes(&b"nested content ".repeat(20));
        let recipes = closure.solve(&file).expect("covered");
        let names: Vec<&str> = recipes.iter().map(Recipe::name).collect();
        assert_eq!(names, vec!["Region", "ZstdDecompression"]);
        assert!(closure.passes() >= 2);
    }

    #[test]
    fn root_needs_no_recipes() {
        let tokens = load(CpioWriter::new().finish());
        let closure = SourceClosure::compute(&tokens);
        assert_eq!(closure.solve(tokens.archive_item()), Some(Vec::new()));
    }
}
