//! Diff assembly: resolving the target's item graph against the source.

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, info, trace};

use archive::ArchiveTokenization;
use items::{ItemDefinition, Recipe};

use crate::cancel::CancellationToken;
use crate::delta::DeltaCatalog;
use crate::diff::{Diff, delta_asset};
use crate::error::{EngineError, EngineResult};

mod closure;

pub use closure::SourceClosure;

/// Resolves every target item to a recipe grounded in the source, a delta,
/// or (later) the remainder.
///
/// The walk starts at the target archive item. An item the source can
/// produce gets the source's derivation, rewritten into source-relative
/// copies. Otherwise the target's own forward recipe is adopted (when
/// allowed) and its ingredients are queued. Anything else is needed. Needed
/// items are then offered to the delta catalog; a delta is adopted only
/// when its basis is itself producible from the source.
pub struct Assembler<'a> {
    source: &'a ArchiveTokenization,
    target: &'a ArchiveTokenization,
    closure: &'a SourceClosure,
    use_target_recipes: bool,
    cancel: CancellationToken,
}

impl<'a> Assembler<'a> {
    /// Prepares an assembly of `target` against `source`.
    #[must_use]
    pub fn new(
        source: &'a ArchiveTokenization,
        target: &'a ArchiveTokenization,
        closure: &'a SourceClosure,
    ) -> Self {
        Self {
            source,
            target,
            closure,
            use_target_recipes: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Allows or forbids adopting target forward recipes.
    #[must_use]
    pub const fn use_target_recipes(mut self, allowed: bool) -> Self {
        self.use_target_recipes = allowed;
        self
    }

    /// Checks `cancel` once per visited item.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the worklist, then applies deltas from `catalog`.
    ///
    /// Items still needed afterwards are left in [`Diff::needed`] for the
    /// remainder.
    pub fn assemble(&self, catalog: &DeltaCatalog) -> EngineResult<Diff> {
        let mut diff = Diff::new(
            self.target.archive_item().without_names(),
            self.source.archive_item().without_names(),
        );

        for item in self.target.payload_items() {
            if !self.closure.covers(&item) {
                diff.mark_needed(&item);
            }
        }

        let reached = self.walk(&mut diff)?;
        let pruned = diff.retain_needed(|item| reached.contains(item));
        if pruned > 0 {
            debug!(target: "diffgen::assembly", pruned, "dropped payload the target never asks for");
        }

        let adopted = self.apply_deltas(&mut diff, catalog)?;
        let stats = diff.stats();
        info!(
            target: "diffgen::assembly",
            recipes = diff.recipe_count(),
            deltas = adopted,
            needed = stats.needed_items,
            needed_bytes = stats.needed_bytes,
            duplicates = diff.duplicate_hits(),
            "assembled diff"
        );
        Ok(diff)
    }

    fn walk(&self, diff: &mut Diff) -> EngineResult<BTreeSet<ItemDefinition>> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([self.target.archive_item().without_names()]);

        while let Some(item) = queue.pop_front() {
            self.cancel.check()?;
            if item.length() == 0 {
                continue;
            }
            if !seen.insert(item.clone()) {
                diff.count_duplicate();
                continue;
            }

            if self.closure.covers(&item) {
                self.splice(diff, &item)?;
                trace!(target: "diffgen::assembly", item = %item, "solved from source");
                continue;
            }

            if self.use_target_recipes
                && let Some(recipe) = self.target.forward_recipe(&item)
            {
                diff.add_recipe(recipe.clone());
                queue.extend(
                    recipe
                        .item_ingredients()
                        .into_iter()
                        .map(ItemDefinition::without_names),
                );
                trace!(target: "diffgen::assembly", item = %item, recipe = recipe.name(), "adopted target recipe");
                continue;
            }

            diff.mark_needed(&item);
        }

        Ok(seen)
    }

    /// Adds the source derivation of `item` and of everything it depends on.
    fn splice(&self, diff: &mut Diff, item: &ItemDefinition) -> EngineResult<()> {
        let recipes = self.closure.solve(item).ok_or_else(|| {
            EngineError::Fatal(format!("{item} is covered by the source but has no derivation"))
        })?;
        for recipe in recipes {
            diff.add_recipe(self.export(&recipe));
        }
        Ok(())
    }

    /// Rewrites copies of source chunks into source-relative copies.
    fn export(&self, recipe: &Recipe) -> Recipe {
        let root = self.closure.root();
        recipe.export(|item| {
            if item == root {
                Some(0)
            } else {
                self.source.chunk_offset(item)
            }
        })
    }

    fn apply_deltas(&self, diff: &mut Diff, catalog: &DeltaCatalog) -> EngineResult<usize> {
        let needed: Vec<ItemDefinition> = diff.needed().iter().cloned().collect();
        let mut adopted = 0;

        for item in needed {
            self.cancel.check()?;
            let Some(entry) = catalog.get(&item) else {
                continue;
            };
            let asset = delta_asset(&entry.recipe).map(ItemDefinition::without_names);
            let bases: Vec<ItemDefinition> = entry
                .recipe
                .item_ingredients()
                .into_iter()
                .map(ItemDefinition::without_names)
                .filter(|ingredient| Some(ingredient) != asset.as_ref())
                .collect();
            if !bases.iter().all(|basis| self.closure.covers(basis)) {
                debug!(target: "diffgen::assembly", item = %item, "delta basis is not in the source");
                continue;
            }

            for basis in &bases {
                self.splice(diff, basis)?;
            }
            diff.add_recipe(entry.recipe.clone());
            adopted += 1;
            trace!(target: "diffgen::assembly", item = %item, builder = %entry.builder, "adopted delta");
        }

        Ok(adopted)
    }
}
