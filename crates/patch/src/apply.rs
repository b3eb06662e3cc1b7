//! Applying a patch to a source archive.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, trace};

use compress::codec::decompress;
use compress::zstd::{DeltaParameters, compress_with_level, delta_decompress, library_version};
use items::{DeltaFormat, ItemDefinition, ItemError, Recipe, RecipeKind};

use crate::error::{PatchError, PatchResult};
use crate::file::PatchFile;

/// Recipe chains longer than this are treated as corrupt.
pub const MAX_RECIPE_DEPTH: usize = 512;

/// Tools and parameters used while applying deltas.
#[derive(Clone, Debug)]
pub struct ApplyOptions {
    /// `bspatch` executable for `BsDiffDelta` recipes.
    pub bspatch: PathBuf,
    /// Parameters for `ZstdDelta` recipes.
    pub zstd_delta: DeltaParameters,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            bspatch: PathBuf::from("bspatch"),
            zstd_delta: DeltaParameters::default(),
        }
    }
}

/// Where a session's source bytes live.
///
/// File-backed sources are read range by range, so copying a region of a
/// large archive does not load the archive.
enum SourceBytes {
    Memory(Vec<u8>),
    File { reader: BufReader<File>, length: u64 },
}

impl SourceBytes {
    /// Opens `path` and checks that its content has the identity `expected`.
    fn open(path: &Path, expected: &ItemDefinition) -> PatchResult<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let actual = ItemDefinition::from_reader(&mut reader, length)?;
        if actual != *expected {
            return Err(ItemError::ContentMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }
        Ok(Self::File { reader, length })
    }

    fn read_range(&mut self, blob: &'static str, offset: u64, length: u64) -> PatchResult<Vec<u8>> {
        match self {
            Self::Memory(data) => range(blob, data, offset, length),
            Self::File { reader, length: available } => {
                let available = *available;
                match offset.checked_add(length) {
                    Some(end) if end <= available => {}
                    _ => {
                        return Err(PatchError::out_of_range(
                            blob,
                            offset,
                            length,
                            usize::try_from(available).unwrap_or(usize::MAX),
                        ));
                    }
                }
                let size = usize::try_from(length)
                    .map_err(|_| PatchError::out_of_range(blob, offset, length, usize::MAX))?;
                let mut data = vec![0u8; size];
                reader.seek(SeekFrom::Start(offset))?;
                reader.read_exact(&mut data)?;
                Ok(data)
            }
        }
    }

    fn read_all(&mut self) -> PatchResult<Vec<u8>> {
        match self {
            Self::Memory(data) => Ok(data.clone()),
            Self::File { reader, length } => {
                let mut data = Vec::with_capacity(usize::try_from(*length).unwrap_or(0));
                reader.seek(SeekFrom::Start(0))?;
                reader.read_to_end(&mut data)?;
                Ok(data)
            }
        }
    }
}

/// A loaded patch plus the source it applies to.
///
/// Items are produced on demand by identity. Every produced item, including
/// intermediate ingredients, is checked against its identity before use.
/// Ingredients referenced by more than one recipe are cached.
pub struct ApplySession {
    target: ItemDefinition,
    source_item: ItemDefinition,
    source: SourceBytes,
    recipes: HashMap<ItemDefinition, Recipe>,
    inline_item: ItemDefinition,
    inline_assets: Vec<u8>,
    remainder_item: ItemDefinition,
    remainder: Vec<u8>,
    shared: HashSet<ItemDefinition>,
    cache: HashMap<ItemDefinition, Vec<u8>>,
    options: ApplyOptions,
}

impl ApplySession {
    /// Prepares `patch` for application against `source`.
    ///
    /// Fails when `source` does not have the identity the patch was built for.
    pub fn new(patch: PatchFile, source: Vec<u8>, options: ApplyOptions) -> PatchResult<Self> {
        patch.source.verify(&source)?;
        Self::with_source(patch, SourceBytes::Memory(source), options)
    }

    fn with_source(
        patch: PatchFile,
        source: SourceBytes,
        options: ApplyOptions,
    ) -> PatchResult<Self> {
        let remainder = patch.remainder.inflate()?;
        let session = Self::assemble(patch.target, patch.source, source, patch.recipes, options)?;

        debug!(
            target: "diffgen::patch",
            recipes = session.recipes.len(),
            inline_assets = patch.inline_assets.len(),
            remainder = remainder.len(),
            "loaded patch"
        );

        Ok(Self {
            inline_item: ItemDefinition::from_bytes(&patch.inline_assets),
            inline_assets: patch.inline_assets,
            remainder_item: ItemDefinition::from_bytes(&remainder),
            remainder,
            ..session
        })
    }

    /// Prepares a session that extracts items out of an archive through the
    /// archive's own recipes, with no inline assets or remainder.
    ///
    /// This is how chunk and payload bytes are read back from a tokenized
    /// archive: the archive is the session's source and its reverse recipes
    /// (regions, decompressions) derive every other item.
    pub fn for_archive<I>(archive: Vec<u8>, recipes: I, options: ApplyOptions) -> PatchResult<Self>
    where
        I: IntoIterator<Item = Recipe>,
    {
        let archive_item = ItemDefinition::from_bytes(&archive);
        let recipes = recipes.into_iter().collect();
        Self::assemble(
            archive_item.clone(),
            archive_item,
            SourceBytes::Memory(archive),
            recipes,
            options,
        )
    }

    /// Like [`ApplySession::for_archive`], but reads the archive at `path`
    /// on demand instead of holding it in memory.
    ///
    /// The file is hashed once up front and must have the identity `archive`.
    pub fn for_archive_file<I>(
        path: &Path,
        archive: &ItemDefinition,
        recipes: I,
        options: ApplyOptions,
    ) -> PatchResult<Self>
    where
        I: IntoIterator<Item = Recipe>,
    {
        let source = SourceBytes::open(path, archive)?;
        let recipes = recipes.into_iter().collect();
        Self::assemble(archive.clone(), archive.clone(), source, recipes, options)
    }

    fn assemble(
        target: ItemDefinition,
        source_item: ItemDefinition,
        source: SourceBytes,
        all_recipes: Vec<Recipe>,
        options: ApplyOptions,
    ) -> PatchResult<Self> {
        let mut uses: HashMap<ItemDefinition, usize> = HashMap::new();
        let mut recipes = HashMap::with_capacity(all_recipes.len());
        for recipe in all_recipes {
            for ingredient in recipe.item_ingredients() {
                *uses.entry(ingredient.without_names()).or_default() += 1;
            }
            recipes.entry(recipe.result().without_names()).or_insert(recipe);
        }
        let shared = uses
            .into_iter()
            .filter_map(|(item, count)| (count > 1).then_some(item))
            .collect();

        let empty = ItemDefinition::from_bytes(&[]);
        Ok(Self {
            target,
            source_item: source_item.without_names(),
            source,
            recipes,
            inline_item: empty.clone(),
            inline_assets: Vec::new(),
            remainder_item: empty,
            remainder: Vec::new(),
            shared,
            cache: HashMap::new(),
            options,
        })
    }

    /// Loads the patch at `patch_path` and the source at `source_path`.
    pub fn open(patch_path: &Path, source_path: &Path, options: ApplyOptions) -> PatchResult<Self> {
        let patch = PatchFile::read_path(patch_path)?;
        let source = SourceBytes::open(source_path, &patch.source)?;
        Self::with_source(patch, source, options)
    }

    /// Identity of the item the patch reproduces.
    #[must_use]
    pub const fn target(&self) -> &ItemDefinition {
        &self.target
    }

    /// Identity of the source the patch applies to.
    #[must_use]
    pub const fn source_item(&self) -> &ItemDefinition {
        &self.source_item
    }

    /// Number of distinct recipe results.
    #[must_use]
    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// Produces and verifies the bytes of `item`.
    pub fn extract(&mut self, item: &ItemDefinition) -> PatchResult<Vec<u8>> {
        self.produce(item, 0)
    }

    /// Produces the target.
    pub fn apply(&mut self) -> PatchResult<Vec<u8>> {
        let target = self.target.clone();
        let data = self.extract(&target)?;
        info!(target: "diffgen::patch", item = %target, "reproduced target");
        Ok(data)
    }

    /// Produces the target and writes it to `output`.
    pub fn apply_to(&mut self, output: &Path) -> PatchResult<u64> {
        let data = self.apply()?;
        fs::write(output, &data)?;
        Ok(data.len() as u64)
    }

    fn produce(&mut self, item: &ItemDefinition, depth: usize) -> PatchResult<Vec<u8>> {
        if depth > MAX_RECIPE_DEPTH {
            return Err(PatchError::TooDeep {
                item: item.to_string(),
                limit: MAX_RECIPE_DEPTH,
            });
        }

        let key = item.without_names();
        if let Some(data) = self.cache.get(&key) {
            return Ok(data.clone());
        }

        let data = if key.length() == 0 {
            Vec::new()
        } else if key == self.source_item {
            self.source.read_all()?
        } else if key == self.inline_item {
            self.inline_assets.clone()
        } else if key == self.remainder_item {
            self.remainder.clone()
        } else if let Some(recipe) = self.recipes.get(&key).cloned() {
            trace!(target: "diffgen::patch", recipe = recipe.name(), item = %key, depth, "evaluating");
            self.evaluate(&recipe, depth)?
        } else {
            return Err(PatchError::MissingItem {
                item: item.to_string(),
            });
        };

        item.verify(&data)?;
        if self.shared.contains(&key) {
            self.cache.insert(key, data.clone());
        }
        Ok(data)
    }

    /// Blobs held in memory for the whole session, borrowed without a copy.
    /// The source is read through [`ApplySession::region`] instead.
    fn resident(&self, item: &ItemDefinition) -> Option<&[u8]> {
        let key = item.without_names();
        if key.length() == 0 {
            None
        } else if key == self.inline_item {
            Some(&self.inline_assets)
        } else if key == self.remainder_item {
            Some(&self.remainder)
        } else {
            None
        }
    }

    fn region(
        &mut self,
        blob: &'static str,
        item: &ItemDefinition,
        offset: u64,
        length: u64,
        depth: usize,
    ) -> PatchResult<Vec<u8>> {
        if item.length() > 0 && item.without_names() == self.source_item {
            return self.source.read_range(blob, offset, length);
        }
        match self.resident(item) {
            Some(whole) => range(blob, whole, offset, length),
            None => {
                let whole = self.produce(item, depth)?;
                range(blob, &whole, offset, length)
            }
        }
    }

    fn evaluate(&mut self, recipe: &Recipe, depth: usize) -> PatchResult<Vec<u8>> {
        let length = recipe.result().length();
        let next = depth + 1;

        match recipe.kind() {
            RecipeKind::Copy { item } => self.produce(item, next),
            RecipeKind::Region { item, offset } => {
                self.region("region", item, *offset, length, next)
            }
            RecipeKind::Concatenation { items } => {
                let mut out = Vec::with_capacity(usize::try_from(length).unwrap_or(0));
                for part in items {
                    out.extend_from_slice(&self.produce(part, next)?);
                }
                Ok(out)
            }
            RecipeKind::ApplyDelta {
                format,
                delta,
                basis,
            } => {
                let delta = self.produce(delta, next)?;
                let basis = self.produce(basis, next)?;
                match format {
                    DeltaFormat::Zstd => Ok(delta_decompress(
                        &basis,
                        &delta,
                        usize::try_from(length).unwrap_or(usize::MAX),
                        self.options.zstd_delta,
                    )?),
                    DeltaFormat::BsDiff => run_bspatch(&self.options.bspatch, &basis, &delta),
                }
            }
            RecipeKind::Decompression { format, item } => {
                let compressed = self.produce(item, next)?;
                Ok(decompress(*format, &compressed)?)
            }
            RecipeKind::Compression {
                item,
                major,
                minor,
                level,
                ..
            } => {
                let (linked_major, linked_minor) = library_version();
                if (*major, *minor) != (linked_major, linked_minor) {
                    return Err(PatchError::CompressorVersion {
                        recorded_major: *major,
                        recorded_minor: *minor,
                        major: linked_major,
                        minor: linked_minor,
                    });
                }
                let level = i32::try_from(*level).map_err(|_| ItemError::InvalidRecipe {
                    recipe: recipe.name().to_string(),
                    reason: format!("level {level} out of range"),
                })?;
                let payload = self.produce(item, next)?;
                Ok(compress_with_level(&payload, level)?)
            }
            RecipeKind::AllZero => Ok(vec![0u8; usize::try_from(length).unwrap_or(0)]),
            RecipeKind::Slice { blob, offset } => {
                self.region("slice", blob, *offset, length, next)
            }
            RecipeKind::InlineAssetCopy { offset } => {
                range("inline assets", &self.inline_assets, *offset, length)
            }
            RecipeKind::CopySource { offset } => {
                self.source.read_range("source", *offset, length)
            }
            RecipeKind::NestedDiff { diff, basis } => {
                let diff = self.produce(diff, next)?;
                let basis = self.produce(basis, next)?;
                let nested = PatchFile::from_bytes(&diff)?;
                debug!(
                    target: "diffgen::patch",
                    basis = %nested.source,
                    result = %nested.target,
                    "applying nested patch"
                );
                ApplySession::new(nested, basis, self.options.clone())?.apply()
            }
        }
    }
}

fn range(blob: &'static str, data: &[u8], offset: u64, length: u64) -> PatchResult<Vec<u8>> {
    let start = usize::try_from(offset).ok();
    let end = offset.checked_add(length).and_then(|end| usize::try_from(end).ok());
    match (start, end) {
        (Some(start), Some(end)) if end <= data.len() => Ok(data[start..end].to_vec()),
        _ => Err(PatchError::out_of_range(blob, offset, length, data.len())),
    }
}

fn run_bspatch(program: &Path, basis: &[u8], delta: &[u8]) -> PatchResult<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let basis_path = dir.path().join("basis");
    let delta_path = dir.path().join("delta");
    let output_path = dir.path().join("output");
    fs::write(&basis_path, basis)?;
    fs::write(&delta_path, delta)?;

    let status = Command::new(program)
        .arg(&basis_path)
        .arg(&output_path)
        .arg(&delta_path)
        .status()?;
    if !status.success() {
        return Err(PatchError::Tool {
            program: program.to_path_buf(),
            status: status.to_string(),
        });
    }
    Ok(fs::read(&output_path)?)
}
