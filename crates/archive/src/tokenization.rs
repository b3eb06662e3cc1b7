//! The item/recipe graph describing one archive.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use items::{ItemDefinition, Recipe};

use crate::document::TokenizationDocument;
use crate::error::{ArchiveError, ArchiveResult};
use crate::gaps;
use crate::payload::PayloadCatalog;

/// A physical byte range of the archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chunk {
    /// Start of the chunk within the archive.
    pub offset: u64,
    /// Identity of the chunk bytes.
    pub item: ItemDefinition,
}

/// Chunks, payload and recipe indices of one archive.
///
/// Chunks are keyed by offset and, once [`fill_gaps`](Self::fill_gaps) has
/// run, tile `[0, archive length)` exactly. Recipes are stored once per
/// result identity in two maps:
///
/// - forward recipes build an item from more primitive ingredients (the
///   archive from its chunks, a zero run from nothing);
/// - reverse recipes recover an item from the archive it lives in (a chunk
///   as a region of the archive, a decompressed stream from its compressed
///   form).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenizationDocument", into = "TokenizationDocument")]
pub struct ArchiveTokenization {
    pub(crate) format: String,
    pub(crate) archive_item: ItemDefinition,
    pub(crate) source_item: Option<ItemDefinition>,
    pub(crate) chunks: BTreeMap<u64, ItemDefinition>,
    pub(crate) chunk_offsets: BTreeMap<ItemDefinition, u64>,
    pub(crate) payload: PayloadCatalog,
    pub(crate) forward: BTreeMap<ItemDefinition, Recipe>,
    pub(crate) reverse: BTreeMap<ItemDefinition, Recipe>,
}

impl ArchiveTokenization {
    /// Starts an empty tokenization of `archive_item` in `format`.
    pub fn new(format: impl Into<String>, archive_item: ItemDefinition) -> Self {
        Self {
            format: format.into(),
            archive_item,
            source_item: None,
            chunks: BTreeMap::new(),
            chunk_offsets: BTreeMap::new(),
            payload: PayloadCatalog::new(),
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Name of the parser that produced this tokenization.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Identity of the whole archive.
    #[must_use]
    pub const fn archive_item(&self) -> &ItemDefinition {
        &self.archive_item
    }

    /// Item this archive may depend on without containing it.
    #[must_use]
    pub const fn source_item(&self) -> Option<&ItemDefinition> {
        self.source_item.as_ref()
    }

    /// Records the item a diff tokenization is allowed to depend on.
    pub fn set_source_item(&mut self, item: ItemDefinition) {
        self.source_item = Some(item);
    }

    /// Records a chunk at `offset`.
    ///
    /// Unless the chunk spans the whole archive, a reverse `Region` recipe
    /// recovering it from the archive is recorded too. Zero-length chunks
    /// carry no bytes and are ignored.
    pub fn add_chunk(&mut self, offset: u64, item: ItemDefinition) -> ArchiveResult<()> {
        if item.length() == 0 {
            trace!(target: "diffgen::archive", offset, "ignoring empty chunk");
            return Ok(());
        }

        let end = offset.checked_add(item.length());
        if end.is_none_or(|end| end > self.archive_item.length()) {
            return Err(ArchiveError::Partition(format!(
                "chunk {item} at {offset} ends past the archive ({} bytes)",
                self.archive_item.length()
            )));
        }

        if item != self.archive_item {
            let region = Recipe::region(item.clone(), self.archive_item.clone(), offset)?;
            self.reverse.entry(item.without_names()).or_insert(region);
        }

        self.insert_chunk(offset, item)
    }

    pub(crate) fn insert_chunk(&mut self, offset: u64, item: ItemDefinition) -> ArchiveResult<()> {
        if self.chunks.contains_key(&offset) {
            return Err(ArchiveError::Duplicate {
                what: "chunk offset",
                key: offset.to_string(),
            });
        }
        self.chunk_offsets
            .entry(item.without_names())
            .or_insert(offset);
        self.chunks.insert(offset, item);
        Ok(())
    }

    /// Records a payload item under `name`.
    ///
    /// A payload stored verbatim shares its identity with its data chunk, so
    /// both resolve to one arena entry: the chunk's reverse `Region` recovers
    /// the payload and any recipe for the payload produces the chunk. No
    /// `Copy` link is stored for that pair; a `Copy` between equal identities
    /// would be a recipe for its own ingredient.
    pub fn add_payload(&mut self, name: &str, item: ItemDefinition) {
        self.payload.add(name, item);
    }

    /// Records a forward recipe. Returns `false` when its result already has one.
    pub fn add_forward_recipe(&mut self, recipe: Recipe) -> bool {
        insert_once(&mut self.forward, recipe)
    }

    /// Records a reverse recipe. Returns `false` when its result already has one.
    pub fn add_reverse_recipe(&mut self, recipe: Recipe) -> bool {
        insert_once(&mut self.reverse, recipe)
    }

    /// Chunks in offset order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        self.chunks.iter().map(|(offset, item)| Chunk {
            offset: *offset,
            item: item.clone(),
        })
    }

    /// Number of chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Offset of the first chunk with the identity of `item`.
    #[must_use]
    pub fn chunk_offset(&self, item: &ItemDefinition) -> Option<u64> {
        self.chunk_offsets.get(item).copied()
    }

    /// Returns `true` when some chunk has the identity of `item`.
    #[must_use]
    pub fn is_chunk(&self, item: &ItemDefinition) -> bool {
        self.chunk_offsets.contains_key(item)
    }

    /// The payload catalog.
    #[must_use]
    pub const fn payload(&self) -> &PayloadCatalog {
        &self.payload
    }

    /// Distinct payload items, each carrying its payload names.
    #[must_use]
    pub fn payload_items(&self) -> Vec<ItemDefinition> {
        self.payload.items()
    }

    /// Forward recipe producing `item`, if any.
    #[must_use]
    pub fn forward_recipe(&self, item: &ItemDefinition) -> Option<&Recipe> {
        self.forward.get(item)
    }

    /// Reverse recipe recovering `item`, if any.
    #[must_use]
    pub fn reverse_recipe(&self, item: &ItemDefinition) -> Option<&Recipe> {
        self.reverse.get(item)
    }

    /// Forward recipes in result order.
    pub fn forward_recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.forward.values()
    }

    /// Reverse recipes in result order.
    pub fn reverse_recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.reverse.values()
    }

    /// Every identity mentioned by this tokenization.
    #[must_use]
    pub fn all_items(&self) -> BTreeSet<ItemDefinition> {
        let mut all = BTreeSet::new();
        all.insert(self.archive_item.without_names());
        all.extend(self.chunks.values().map(ItemDefinition::without_names));
        all.extend(self.payload.items().iter().map(ItemDefinition::without_names));
        for recipe in self.forward.values().chain(self.reverse.values()) {
            all.insert(recipe.result().without_names());
            all.extend(recipe.item_ingredients().into_iter().map(ItemDefinition::without_names));
        }
        all
    }

    /// Merges the recipes and payload of a nested archive.
    ///
    /// The nested archive's chunks describe offsets inside the nested
    /// stream, not inside this archive, so they are reachable only through
    /// the imported reverse recipes.
    pub fn import(&mut self, nested: &Self) {
        debug!(
            target: "diffgen::archive",
            nested = %nested.archive_item,
            into = %self.archive_item,
            recipes = nested.forward.len() + nested.reverse.len(),
            "importing nested archive"
        );
        for recipe in nested.forward.values() {
            self.add_forward_recipe(recipe.clone());
        }
        for recipe in nested.reverse.values() {
            self.add_reverse_recipe(recipe.clone());
        }
        self.payload.merge(&nested.payload);
    }

    /// Splits every uncovered byte range into gap chunks.
    ///
    /// Gap chunks are aligned to [`gaps::GAP_ALIGNMENT`] where possible and
    /// never exceed [`gaps::MAX_GAP_CHUNK`]. All-zero gaps get an `AllZero`
    /// forward recipe. Afterwards, unless the archive is a single chunk, a
    /// `Concatenation` of every chunk is recorded as the archive's forward
    /// recipe. Returns the number of gap chunks added.
    pub fn fill_gaps<R: Read + Seek + ?Sized>(&mut self, reader: &mut R) -> ArchiveResult<usize> {
        let mut uncovered = Vec::new();
        let mut expected = 0u64;
        for (offset, item) in &self.chunks {
            if *offset < expected {
                return Err(ArchiveError::Partition(format!(
                    "chunk at {offset} overlaps the previous chunk ending at {expected}"
                )));
            }
            if *offset > expected {
                uncovered.push((expected, *offset - expected));
            }
            expected = *offset + item.length();
        }
        if expected < self.archive_item.length() {
            uncovered.push((expected, self.archive_item.length() - expected));
        }

        let mut added = 0;
        for (offset, length) in uncovered {
            for (begin, len) in gaps::split_gap(offset, length) {
                let (item, all_zero) = gaps::read_gap(reader, begin, len)?;
                if all_zero {
                    self.add_forward_recipe(Recipe::all_zero(item.clone())?);
                }
                self.add_chunk(begin, item)?;
                added += 1;
            }
        }

        if added > 0 {
            debug!(target: "diffgen::archive", gaps = added, "filled gaps between chunks");
        }

        if !self.forward.contains_key(&self.archive_item) && self.chunks.len() > 1 {
            let parts: Vec<ItemDefinition> = self.chunks.values().cloned().collect();
            let recipe = Recipe::concatenation(self.archive_item.clone(), parts)?;
            self.forward.insert(self.archive_item.without_names(), recipe);
        }

        Ok(added)
    }

    /// Checks that chunks tile `[0, archive length)` without overlap.
    pub fn check_partition(&self) -> ArchiveResult<()> {
        let mut expected = 0u64;
        for (offset, item) in &self.chunks {
            if *offset != expected {
                return Err(ArchiveError::Partition(format!(
                    "expected a chunk at {expected}, found one at {offset}"
                )));
            }
            expected += item.length();
        }
        if expected != self.archive_item.length() {
            return Err(ArchiveError::Partition(format!(
                "chunks cover {expected} of {} bytes",
                self.archive_item.length()
            )));
        }
        Ok(())
    }

    /// Serializes the tokenization as JSON.
    pub fn to_json(&self, pretty: bool) -> ArchiveResult<String> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }

    /// Parses a tokenization document.
    ///
    /// Duplicate recipe results or chunk offsets are fatal.
    pub fn from_json(text: &str) -> ArchiveResult<Self> {
        let document: TokenizationDocument = serde_json::from_str(text)?;
        Self::try_from(document)
    }

    /// Writes the tokenization as pretty JSON to `path`.
    pub fn write_json(&self, path: &std::path::Path) -> ArchiveResult<()> {
        std::fs::write(path, self.to_json(true)?)?;
        Ok(())
    }

    /// Reads a tokenization written by [`write_json`](Self::write_json).
    pub fn read_json(path: &std::path::Path) -> ArchiveResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

fn insert_once(map: &mut BTreeMap<ItemDefinition, Recipe>, recipe: Recipe) -> bool {
    let key = recipe.result().without_names();
    if map.contains_key(&key) {
        return false;
    }
    map.insert(key, recipe);
    true
}
