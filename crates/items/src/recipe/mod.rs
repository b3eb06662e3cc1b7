//! Typed recipes: how one item is derived from ingredient items and numbers.
//!
//! A [`Recipe`] pairs a result item with a [`RecipeKind`]. Recipes reference
//! ingredients by identity only; whoever owns a recipe map resolves an
//! ingredient to its own recipe by looking the ingredient up again. Nothing
//! holds a pointer back to where an item came from.

mod kind;
mod record;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use compress::algorithm::CompressionFormat;

use crate::error::{ItemError, ItemResult};
use crate::item::ItemDefinition;

pub use kind::{DeltaFormat, RecipeKind, recipe_name_for_tag, recipe_tag_for_name};
pub use record::RecipeRecord;

/// A rule producing `result` from the ingredients described by its kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecipeRecord", into = "RecipeRecord")]
pub struct Recipe {
    result: ItemDefinition,
    kind: RecipeKind,
}

impl Recipe {
    /// Builds a recipe after checking the kind against the result.
    pub fn new(result: ItemDefinition, kind: RecipeKind) -> ItemResult<Self> {
        validate(&result, &kind)?;
        Ok(Self { result, kind })
    }

    /// `result` is `item` under another name.
    pub fn copy(result: ItemDefinition, item: ItemDefinition) -> ItemResult<Self> {
        Self::new(result, RecipeKind::Copy { item })
    }

    /// `result` is the range `[offset, offset + result.length)` of `item`.
    pub fn region(result: ItemDefinition, item: ItemDefinition, offset: u64) -> ItemResult<Self> {
        Self::new(result, RecipeKind::Region { item, offset })
    }

    /// `result` is `items` joined in order.
    pub fn concatenation(result: ItemDefinition, items: Vec<ItemDefinition>) -> ItemResult<Self> {
        Self::new(result, RecipeKind::Concatenation { items })
    }

    /// `result` is `delta` applied to `basis`.
    pub fn apply_delta(
        format: DeltaFormat,
        result: ItemDefinition,
        delta: ItemDefinition,
        basis: ItemDefinition,
    ) -> ItemResult<Self> {
        Self::new(
            result,
            RecipeKind::ApplyDelta {
                format,
                delta,
                basis,
            },
        )
    }

    /// `result` is `item` decompressed.
    pub fn decompression(
        format: CompressionFormat,
        result: ItemDefinition,
        item: ItemDefinition,
    ) -> ItemResult<Self> {
        Self::new(result, RecipeKind::Decompression { format, item })
    }

    /// `result` is `item` compressed with zstd at `level` by library `major.minor`.
    pub fn zstd_compression(
        result: ItemDefinition,
        item: ItemDefinition,
        (major, minor): (u64, u64),
        level: u64,
    ) -> ItemResult<Self> {
        Self::new(
            result,
            RecipeKind::Compression {
                format: CompressionFormat::Zstd,
                item,
                major,
                minor,
                level,
            },
        )
    }

    /// `result` is all zero bytes.
    pub fn all_zero(result: ItemDefinition) -> ItemResult<Self> {
        Self::new(result, RecipeKind::AllZero)
    }

    /// `result` is a slice of a shared blob.
    pub fn slice(result: ItemDefinition, blob: ItemDefinition, offset: u64) -> ItemResult<Self> {
        Self::new(result, RecipeKind::Slice { blob, offset })
    }

    /// `result` is a range of the patch's inline asset stream.
    pub fn inline_asset_copy(result: ItemDefinition, offset: u64) -> ItemResult<Self> {
        Self::new(result, RecipeKind::InlineAssetCopy { offset })
    }

    /// `result` is a range of the source archive.
    pub fn copy_source(result: ItemDefinition, offset: u64) -> ItemResult<Self> {
        Self::new(result, RecipeKind::CopySource { offset })
    }

    /// `result` is a nested patch applied to `basis`.
    pub fn nested_diff(
        result: ItemDefinition,
        diff: ItemDefinition,
        basis: ItemDefinition,
    ) -> ItemResult<Self> {
        Self::new(result, RecipeKind::NestedDiff { diff, basis })
    }

    /// Returns the boundary name of the variant.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Returns the item this recipe produces.
    #[must_use]
    pub const fn result(&self) -> &ItemDefinition {
        &self.result
    }

    /// Returns the variant.
    #[must_use]
    pub const fn kind(&self) -> &RecipeKind {
        &self.kind
    }

    /// Item ingredients in positional order.
    #[must_use]
    pub fn item_ingredients(&self) -> Vec<&ItemDefinition> {
        self.kind.item_ingredients()
    }

    /// Numeric ingredients in positional order.
    #[must_use]
    pub fn number_ingredients(&self) -> Vec<u64> {
        let length = self.result.length();
        match &self.kind {
            RecipeKind::Region { offset, .. } => vec![*offset, length],
            RecipeKind::Compression {
                major,
                minor,
                level,
                ..
            } => vec![*major, *minor, *level],
            RecipeKind::AllZero => vec![length],
            RecipeKind::Slice { offset, .. }
            | RecipeKind::InlineAssetCopy { offset }
            | RecipeKind::CopySource { offset } => vec![*offset],
            RecipeKind::Copy { .. }
            | RecipeKind::Concatenation { .. }
            | RecipeKind::ApplyDelta { .. }
            | RecipeKind::Decompression { .. }
            | RecipeKind::NestedDiff { .. } => Vec::new(),
        }
    }

    /// Returns `true` for binary-delta and nested-diff recipes.
    #[must_use]
    pub const fn is_delta(&self) -> bool {
        matches!(
            self.kind,
            RecipeKind::ApplyDelta { .. } | RecipeKind::NestedDiff { .. }
        )
    }

    /// Transitive item ingredients.
    ///
    /// `lookup` resolves an ingredient to the recipe that produces it, if the
    /// owning map has one; the walk recurses through those recipes. Each item
    /// is reported once, in depth-first order.
    #[must_use]
    pub fn dependencies<'r, F>(&self, lookup: F) -> Vec<ItemDefinition>
    where
        F: Fn(&ItemDefinition) -> Option<&'r Recipe>,
    {
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::new();
        let mut pending: Vec<ItemDefinition> =
            self.item_ingredients().into_iter().rev().cloned().collect();

        while let Some(item) = pending.pop() {
            if !seen.insert(item.clone()) {
                continue;
            }
            if let Some(recipe) = lookup(&item) {
                pending.extend(recipe.item_ingredients().into_iter().rev().cloned());
            }
            ordered.push(item);
        }

        ordered
    }

    /// Replaces every ingredient equal to `old` with `new`.
    ///
    /// The rebuilt recipe is validated again, so a replacement with a
    /// different length or one that makes the recipe self-referential fails.
    pub fn replace_item(&self, old: &ItemDefinition, new: &ItemDefinition) -> ItemResult<Self> {
        let mut kind = self.kind.clone();
        for ingredient in kind.item_ingredients_mut() {
            if ingredient == old {
                *ingredient = new.clone();
            }
        }
        Self::new(self.result.clone(), kind)
    }

    /// Maps every ingredient into another namespace, all or nothing.
    ///
    /// Returns `None` when any ingredient has no mapping or the mapped recipe
    /// is invalid; a partially mapped recipe is never produced.
    pub fn map_ingredients<F>(&self, mut map: F) -> Option<Self>
    where
        F: FnMut(&ItemDefinition) -> Option<ItemDefinition>,
    {
        let mut kind = self.kind.clone();
        for ingredient in kind.item_ingredients_mut() {
            *ingredient = map(ingredient)?;
        }
        Self::new(self.result.clone(), kind).ok()
    }

    /// Rewrites in-archive copies into source-relative copies.
    ///
    /// `locate` returns the offset of an item inside the source archive when
    /// the item is a source chunk (or the source archive itself at 0). A
    /// `Copy` of such an item becomes `CopySource(offset)`, a `Region` of it
    /// becomes `CopySource(offset + region offset)`. Other recipes are
    /// returned unchanged.
    #[must_use]
    pub fn export<F>(&self, locate: F) -> Self
    where
        F: Fn(&ItemDefinition) -> Option<u64>,
    {
        let offset = match &self.kind {
            RecipeKind::Copy { item } => locate(item),
            RecipeKind::Region { item, offset } => {
                locate(item).and_then(|base| base.checked_add(*offset))
            }
            _ => None,
        };

        match offset {
            Some(offset) => Self {
                result: self.result.clone(),
                kind: RecipeKind::CopySource { offset },
            },
            None => self.clone(),
        }
    }

    /// Returns the same recipe producing `result`, which must share identity
    /// with the current result (only names differ).
    pub fn with_result(&self, result: ItemDefinition) -> ItemResult<Self> {
        if result != self.result {
            return Err(ItemError::invalid(
                self.name(),
                format!("{result} is not the same item as {}", self.result),
            ));
        }
        Ok(Self {
            result,
            kind: self.kind.clone(),
        })
    }
}

fn validate(result: &ItemDefinition, kind: &RecipeKind) -> ItemResult<()> {
    let name = kind.name();
    let length = result.length();

    match kind {
        RecipeKind::Copy { item } => {
            if item != result {
                return Err(ItemError::invalid(name, format!("{item} differs from {result}")));
            }
            return Ok(());
        }
        RecipeKind::Region { item, offset } | RecipeKind::Slice { blob: item, offset } => {
            let end = offset.checked_add(length);
            if end.is_none_or(|end| end > item.length()) {
                return Err(ItemError::invalid(
                    name,
                    format!(
                        "range {offset}+{length} exceeds {} bytes of {item}",
                        item.length()
                    ),
                ));
            }
        }
        RecipeKind::Concatenation { items } => {
            let total = items
                .iter()
                .try_fold(0u64, |acc, item| acc.checked_add(item.length()));
            if total != Some(length) {
                return Err(ItemError::invalid(
                    name,
                    format!("parts do not add up to {length} bytes"),
                ));
            }
        }
        RecipeKind::Decompression { format, .. } => {
            if *format == CompressionFormat::Deflate {
                return Err(ItemError::invalid(name, "raw deflate members are not supported"));
            }
        }
        RecipeKind::Compression { format, .. } => {
            if *format != CompressionFormat::Zstd {
                return Err(ItemError::invalid(name, format!("{format} recompression is not supported")));
            }
        }
        RecipeKind::ApplyDelta { .. }
        | RecipeKind::NestedDiff { .. }
        | RecipeKind::AllZero
        | RecipeKind::InlineAssetCopy { .. }
        | RecipeKind::CopySource { .. } => {}
    }

    if kind.item_ingredients().into_iter().any(|item| item == result) {
        return Err(ItemError::SelfReferentialRecipe {
            recipe: name,
            item: result.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(data: &[u8]) -> ItemDefinition {
        ItemDefinition::from_bytes(data)
    }

    #[test]
    fn region_must_fit_inside_ingredient() {
        let whole = item(b"0123456789");
        Recipe::region(item(b"345"), whole.clone(), 3).expect("valid region");
        let err = Recipe::region(item(b"89x"), whole, 8).expect_err("overruns");
        assert!(matches!(err, ItemError::InvalidRecipe { .. }));
    }

    #[test]
    fn concatenation_lengths_must_sum() {
        let result = item(b"abcdef");
        Recipe::concatenation(result.clone(), vec![item(b"abc"), item(b"def")]).expect("valid");
        assert!(Recipe::concatenation(result, vec![item(b"abc")]).is_err());
    }

    #[test]
    fn copy_requires_same_content() {
        let a = item(b"same").with_name("chunk");
        Recipe::copy(a.clone(), item(b"same").with_name("payload")).expect("valid copy");
        assert!(Recipe::copy(a, item(b"other")).is_err());
    }

    #[test]
    fn self_referential_recipes_are_rejected() {
        let x = item(b"xx");
        let err = Recipe::decompression(CompressionFormat::Zstd, x.clone(), x).expect_err("cycle");
        assert!(matches!(err, ItemError::SelfReferentialRecipe { .. }));
    }

    #[test]
    fn number_ingredients_follow_variant() {
        let whole = item(b"0123456789");
        let region = Recipe::region(item(b"345"), whole, 3).expect("region");
        assert_eq!(region.number_ingredients(), vec![3, 3]);
        let zero = Recipe::all_zero(item(&[0; 4])).expect("zero");
        assert_eq!(zero.number_ingredients(), vec![4]);
        assert!(zero.item_ingredients().is_empty());
    }

    #[test]
    fn dependencies_recurse_through_lookup() {
        let archive = item(b"compressed-archive");
        let payload = item(b"payload");
        let file = item(b"pay");
        let decompress =
            Recipe::decompression(CompressionFormat::Zstd, payload.clone(), archive.clone())
                .expect("decompress");
        let region = Recipe::region(file, payload.clone(), 0).expect("region");

        let mut recipes = BTreeMap::new();
        recipes.insert(payload.clone(), decompress);

        let deps = region.dependencies(|ingredient| recipes.get(ingredient));
        assert_eq!(deps, vec![payload, archive]);
    }

    #[test]
    fn dependencies_report_shared_ingredients_once() {
        let part = item(b"ab");
        let result = item(b"abab");
        let recipe = Recipe::concatenation(result, vec![part.clone(), part.clone()]).expect("cat");
        assert_eq!(recipe.dependencies(|_| None), vec![part]);
    }

    #[test]
    fn replace_item_substitutes_matching_ingredients() {
        let old = item(b"old-basis").with_name("target/file");
        let new = item(b"old-basis").with_name("source/file");
        let delta = item(b"delta");
        let recipe = Recipe::apply_delta(DeltaFormat::Zstd, item(b"result"), delta, old.clone())
            .expect("delta");
        let replaced = recipe.replace_item(&old, &new).expect("replace");
        assert_eq!(replaced.item_ingredients()[1].name(), Some("source/file"));
    }

    #[test]
    fn map_ingredients_is_all_or_nothing() {
        let a = item(b"aa");
        let b = item(b"bb");
        let recipe = Recipe::concatenation(item(b"aabb"), vec![a.clone(), b]).expect("cat");

        let partial = recipe.map_ingredients(|ingredient| {
            (ingredient == &a).then(|| ingredient.clone().with_name("mapped"))
        });
        assert!(partial.is_none());

        let full = recipe
            .map_ingredients(|ingredient| Some(ingredient.clone().with_name("mapped")))
            .expect("all mapped");
        assert!(full.item_ingredients().iter().all(|i| i.name() == Some("mapped")));
    }

    #[test]
    fn export_rewrites_copies_of_located_chunks() {
        let chunk = item(b"chunk-bytes").with_name("Chunk.Payload=a");
        let copy = Recipe::copy(chunk.clone(), chunk.clone()).expect("copy");
        let exported = copy.export(|candidate| (candidate == &chunk).then_some(4096));
        assert_eq!(exported.kind(), &RecipeKind::CopySource { offset: 4096 });
        assert_eq!(exported.result(), &chunk);
    }

    #[test]
    fn export_rewrites_regions_of_the_source_archive() {
        let archive = item(b"0123456789");
        let region = Recipe::region(item(b"456"), archive.clone(), 4).expect("region");
        let exported = region.export(|candidate| (candidate == &archive).then_some(0));
        assert_eq!(exported.kind(), &RecipeKind::CopySource { offset: 4 });
    }

    #[test]
    fn export_leaves_unlocated_recipes_alone() {
        let recipe = Recipe::all_zero(item(&[0; 8])).expect("zero");
        assert_eq!(recipe.export(|_| Some(0)), recipe);
    }
}
