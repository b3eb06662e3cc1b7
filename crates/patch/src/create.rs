//! Building a patch from a finished diff.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use compress::zlib::CompressionLevel;
use items::{ItemDefinition, Recipe, RecipeKind};

use crate::error::PatchResult;
use crate::file::{CompressedRemainder, PatchFile};

/// Collects the pieces of a patch and writes it.
///
/// Recipes that slice the inline asset blob are rewritten into
/// `InlineAssetCopy` recipes, since the blob itself is embedded in the patch
/// rather than produced by a recipe. The remainder blob is deflated and its
/// slices are kept as they are.
#[derive(Debug)]
pub struct CreateSession {
    target: ItemDefinition,
    source: ItemDefinition,
    recipes: Vec<Recipe>,
    inline_assets: Option<(PathBuf, ItemDefinition)>,
    remainder: Option<(PathBuf, ItemDefinition)>,
    level: CompressionLevel,
}

impl CreateSession {
    /// Starts a patch from `source` to `target`.
    #[must_use]
    pub fn new(target: ItemDefinition, source: ItemDefinition) -> Self {
        Self {
            target,
            source,
            recipes: Vec::new(),
            inline_assets: None,
            remainder: None,
            level: CompressionLevel::Best,
        }
    }

    /// Adds one recipe.
    pub fn add_recipe(&mut self, recipe: Recipe) -> &mut Self {
        self.recipes.push(recipe);
        self
    }

    /// Adds every recipe in `recipes`.
    pub fn add_recipes<I: IntoIterator<Item = Recipe>>(&mut self, recipes: I) -> &mut Self {
        self.recipes.extend(recipes);
        self
    }

    /// Embeds the inline asset blob stored at `path`, whose identity is `item`.
    pub fn set_inline_assets(&mut self, path: impl Into<PathBuf>, item: ItemDefinition) -> &mut Self {
        self.inline_assets = Some((path.into(), item));
        self
    }

    /// Embeds the remainder blob stored at `path`, whose identity is `item`.
    pub fn set_remainder(&mut self, path: impl Into<PathBuf>, item: ItemDefinition) -> &mut Self {
        self.remainder = Some((path.into(), item));
        self
    }

    /// Overrides the deflate level used for the remainder.
    pub fn set_compression_level(&mut self, level: CompressionLevel) -> &mut Self {
        self.level = level;
        self
    }

    /// Reads the blobs, rewrites inline slices and returns the patch in memory.
    pub fn build(&self) -> PatchResult<PatchFile> {
        let inline_assets = read_blob(self.inline_assets.as_ref())?;
        let remainder = read_blob(self.remainder.as_ref())?;
        let inline_item = self.inline_assets.as_ref().map(|(_, item)| item);
        let remainder_item = self.remainder.as_ref().map(|(_, item)| item);

        let mut recipes = Vec::with_capacity(self.recipes.len());
        for recipe in &self.recipes {
            // The blobs are stored verbatim, so recipes producing them are dropped.
            if Some(recipe.result()) == inline_item || Some(recipe.result()) == remainder_item {
                continue;
            }
            recipes.push(match recipe.kind() {
                RecipeKind::Slice { blob, offset } if Some(blob) == inline_item => {
                    Recipe::inline_asset_copy(recipe.result().clone(), *offset)?
                }
                _ => recipe.clone(),
            });
        }

        Ok(PatchFile {
            target: self.target.clone(),
            source: self.source.clone(),
            recipes,
            inline_assets,
            remainder: CompressedRemainder::compress(&remainder, self.level)?,
        })
    }

    /// Writes the patch to `output` and returns its size in bytes.
    pub fn write(&self, output: &Path) -> PatchResult<u64> {
        let patch = self.build()?;
        let bytes = patch.to_bytes()?;
        fs::write(output, &bytes)?;
        info!(
            target: "diffgen::patch",
            path = %output.display(),
            bytes = bytes.len(),
            recipes = patch.recipes.len(),
            inline_assets = patch.inline_assets.len(),
            remainder = patch.remainder.uncompressed_length(),
            remainder_compressed = patch.remainder.compressed_length(),
            "wrote patch"
        );
        Ok(bytes.len() as u64)
    }
}

fn read_blob(blob: Option<&(PathBuf, ItemDefinition)>) -> PatchResult<Vec<u8>> {
    let Some((path, item)) = blob else {
        return Ok(Vec::new());
    };
    let data = fs::read(path)?;
    item.verify(&data)?;
    Ok(data)
}
