//! The accumulating result of diff assembly.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Serialize;

use items::{ItemDefinition, Recipe, RecipeKind};

use crate::error::{EngineError, EngineResult};

/// Recipes that rebuild a target archive, keyed by result identity.
///
/// Each identity has at most one recipe, so target content that appears
/// more than once is produced by a single shared recipe. Items without a
/// recipe yet are tracked in the needed set until a delta or the remainder
/// covers them.
#[derive(Clone, Debug)]
pub struct Diff {
    target: ItemDefinition,
    source: ItemDefinition,
    recipes: BTreeMap<ItemDefinition, Recipe>,
    needed: BTreeSet<ItemDefinition>,
    duplicate_hits: usize,
}

/// Per-recipe-kind totals for logging and `diff.json`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecipeTally {
    /// Number of recipes.
    pub count: usize,
    /// Sum of result lengths.
    pub bytes: u64,
}

/// Summary statistics of a diff.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffStats {
    /// Totals keyed by recipe name.
    pub recipes: BTreeMap<&'static str, RecipeTally>,
    /// Items still waiting for a recipe.
    pub needed_items: usize,
    /// Bytes still waiting for a recipe.
    pub needed_bytes: u64,
    /// Target occurrences satisfied by an identity resolved earlier.
    pub duplicate_hits: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DiffDocument<'a> {
    target_item: &'a ItemDefinition,
    source_item: &'a ItemDefinition,
    recipes: Vec<&'a Recipe>,
    needed_items: Vec<&'a ItemDefinition>,
    stats: DiffStats,
}

impl Diff {
    /// Starts an empty diff from `source` to `target`.
    #[must_use]
    pub fn new(target: ItemDefinition, source: ItemDefinition) -> Self {
        Self {
            target,
            source,
            recipes: BTreeMap::new(),
            needed: BTreeSet::new(),
            duplicate_hits: 0,
        }
    }

    /// The item the diff rebuilds.
    #[must_use]
    pub const fn target(&self) -> &ItemDefinition {
        &self.target
    }

    /// The archive the diff starts from.
    #[must_use]
    pub const fn source(&self) -> &ItemDefinition {
        &self.source
    }

    /// Recipe producing `item`, if one was adopted.
    #[must_use]
    pub fn recipe(&self, item: &ItemDefinition) -> Option<&Recipe> {
        self.recipes.get(item)
    }

    /// Returns `true` when `item` already has a recipe.
    #[must_use]
    pub fn has_recipe(&self, item: &ItemDefinition) -> bool {
        self.recipes.contains_key(item)
    }

    /// Adopts `recipe` unless its result already has one.
    ///
    /// Adopting a recipe also clears the result from the needed set.
    pub fn add_recipe(&mut self, recipe: Recipe) -> bool {
        let key = recipe.result().without_names();
        if self.recipes.contains_key(&key) {
            return false;
        }
        self.needed.remove(&key);
        self.recipes.insert(key, recipe);
        true
    }

    /// Recipes in result order.
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    /// Number of recipes.
    #[must_use]
    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// Marks `item` as waiting for a delta or the remainder.
    pub fn mark_needed(&mut self, item: &ItemDefinition) {
        let key = item.without_names();
        if !self.recipes.contains_key(&key) && key.length() > 0 {
            self.needed.insert(key);
        }
    }

    /// Returns `true` when `item` is waiting for a recipe.
    #[must_use]
    pub fn is_needed(&self, item: &ItemDefinition) -> bool {
        self.needed.contains(item)
    }

    /// Items waiting for a recipe, in identity order.
    #[must_use]
    pub const fn needed(&self) -> &BTreeSet<ItemDefinition> {
        &self.needed
    }

    /// Drops needed items `keep` rejects and returns how many were dropped.
    pub fn retain_needed<F: FnMut(&ItemDefinition) -> bool>(&mut self, keep: F) -> usize {
        let before = self.needed.len();
        self.needed.retain(keep);
        before - self.needed.len()
    }

    /// Records that a target occurrence reused an already resolved identity.
    pub fn count_duplicate(&mut self) {
        self.duplicate_hits += 1;
    }

    /// Target occurrences that reused an already resolved identity.
    #[must_use]
    pub const fn duplicate_hits(&self) -> usize {
        self.duplicate_hits
    }

    /// Delta assets referenced by adopted delta recipes.
    #[must_use]
    pub fn delta_assets(&self) -> BTreeSet<ItemDefinition> {
        self.recipes
            .values()
            .filter_map(delta_asset)
            .map(ItemDefinition::without_names)
            .collect()
    }

    /// Items reachable from the target that nothing can produce.
    ///
    /// `provided` names blobs the patch carries directly (inline assets and
    /// the remainder). The source archive and empty items are always
    /// available. An empty result means the diff is complete.
    #[must_use]
    pub fn unresolved(&self, provided: &[&ItemDefinition]) -> Vec<ItemDefinition> {
        let mut missing = Vec::new();
        let mut seen = BTreeSet::new();
        let mut pending = vec![self.target.without_names()];

        while let Some(item) = pending.pop() {
            if !seen.insert(item.clone()) || item.length() == 0 || item == self.source {
                continue;
            }
            if provided.iter().any(|blob| **blob == item) {
                continue;
            }
            match self.recipes.get(&item) {
                Some(recipe) => pending.extend(
                    recipe
                        .item_ingredients()
                        .into_iter()
                        .map(ItemDefinition::without_names),
                ),
                None => missing.push(item),
            }
        }

        missing
    }

    /// Totals per recipe kind plus the needed set.
    #[must_use]
    pub fn stats(&self) -> DiffStats {
        let mut stats = DiffStats {
            needed_items: self.needed.len(),
            needed_bytes: self.needed.iter().map(ItemDefinition::length).sum(),
            duplicate_hits: self.duplicate_hits,
            ..DiffStats::default()
        };
        for recipe in self.recipes.values() {
            let tally = stats.recipes.entry(recipe.name()).or_default();
            tally.count += 1;
            tally.bytes += recipe.result().length();
        }
        stats
    }

    /// Renders the diff as a JSON document.
    pub fn to_json(&self) -> EngineResult<String> {
        let document = DiffDocument {
            target_item: &self.target,
            source_item: &self.source,
            recipes: self.recipes.values().collect(),
            needed_items: self.needed.iter().collect(),
            stats: self.stats(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Writes [`to_json`](Self::to_json) to `path`.
    pub fn write_json(&self, path: &Path) -> EngineResult<()> {
        let text = self.to_json()?;
        fs::write(path, text).map_err(|err| EngineError::io("write", path, err))
    }
}

/// The delta asset a delta recipe depends on.
#[must_use]
pub fn delta_asset(recipe: &Recipe) -> Option<&ItemDefinition> {
    match recipe.kind() {
        RecipeKind::ApplyDelta { delta, .. } => Some(delta),
        RecipeKind::NestedDiff { diff, .. } => Some(diff),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(data: &[u8]) -> ItemDefinition {
        ItemDefinition::from_bytes(data)
    }

    #[test]
    fn one_recipe_per_identity() {
        let source = item(b"source archive bytes");
        let piece = item(b"source");
        let mut diff = Diff::new(item(b"target"), source.clone());
        assert!(diff.add_recipe(Recipe::region(piece.clone(), source.clone(), 0).expect("region")));
        assert!(!diff.add_recipe(Recipe::copy_source(piece.clone(), 0).expect("copy")));
        assert_eq!(diff.recipe_count(), 1);
        assert_eq!(diff.recipe(&piece).map(Recipe::name), Some("Region"));
    }

    #[test]
    fn adopting_a_recipe_clears_needed() {
        let source = item(b"abc");
        let wanted = item(b"b");
        let mut diff = Diff::new(item(b"target"), source.clone());
        diff.mark_needed(&wanted);
        diff.mark_needed(&item(b""));
        assert_eq!(diff.needed().len(), 1);
        diff.add_recipe(Recipe::copy_source(wanted.clone(), 1).expect("copy"));
        assert!(!diff.is_needed(&wanted));
    }

    #[test]
    fn unresolved_walks_from_the_target() {
        let source = item(b"0123456789");
        let head = item(b"0123");
        let tail = item(b"zz");
        let target = item(b"0123zz");
        let mut diff = Diff::new(target.clone(), source.clone());
        diff.add_recipe(
            Recipe::concatenation(target, vec![head.clone(), tail.clone()]).expect("concat"),
        );
        diff.add_recipe(Recipe::region(head, source, 0).expect("region"));

        assert_eq!(diff.unresolved(&[]), vec![tail.clone()]);
        assert!(diff.unresolved(&[&tail]).is_empty());
    }

    #[test]
    fn stats_group_by_recipe_name() {
        let source = item(b"abcdef");
        let mut diff = Diff::new(item(b"target"), source);
        diff.add_recipe(Recipe::copy_source(item(b"ab"), 0).expect("copy"));
        diff.add_recipe(Recipe::copy_source(item(b"cdef"), 2).expect("copy"));
        diff.count_duplicate();
        let stats = diff.stats();
        assert_eq!(
            stats.recipes.get("CopySource"),
            Some(&RecipeTally { count: 2, bytes: 6 })
        );
        assert_eq!(stats.duplicate_hits, 1);
        assert!(diff.to_json().expect("json").contains("\"CopySource\""));
    }
}
