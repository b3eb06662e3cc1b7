//! Recipe variants and their boundary names.

use core::fmt;

use serde::{Deserialize, Serialize};

use compress::algorithm::CompressionFormat;

use crate::item::ItemDefinition;

/// Binary delta encodings an `ApplyDelta` recipe can carry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeltaFormat {
    /// Classic bsdiff patches, applied with `bspatch`.
    BsDiff,
    /// zstd frames compressed against the basis as a dictionary.
    Zstd,
}

impl DeltaFormat {
    /// Returns the canonical display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BsDiff => "bsdiff",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for DeltaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The transformation a recipe applies to its ingredients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipeKind {
    /// The result is the ingredient under another name.
    Copy {
        /// Ingredient with the same content as the result.
        item: ItemDefinition,
    },
    /// `result.length` bytes of `item` starting at `offset`.
    Region {
        /// Enclosing item.
        item: ItemDefinition,
        /// Start of the region.
        offset: u64,
    },
    /// Ingredients joined in order.
    Concatenation {
        /// Parts, in output order.
        items: Vec<ItemDefinition>,
    },
    /// A binary delta applied to a basis.
    ApplyDelta {
        /// Delta encoding.
        format: DeltaFormat,
        /// The delta asset.
        delta: ItemDefinition,
        /// The item the delta was computed against.
        basis: ItemDefinition,
    },
    /// The decompressed content of `item`.
    Decompression {
        /// Stream format of `item`.
        format: CompressionFormat,
        /// Compressed ingredient.
        item: ItemDefinition,
    },
    /// `item` recompressed with a pinned library version and level.
    Compression {
        /// Stream format produced.
        format: CompressionFormat,
        /// Uncompressed ingredient.
        item: ItemDefinition,
        /// Library major version.
        major: u64,
        /// Library minor version.
        minor: u64,
        /// Compression level.
        level: u64,
    },
    /// `result.length` zero bytes.
    AllZero,
    /// `result.length` bytes of a shared blob starting at `offset`.
    Slice {
        /// The blob (remainder or inline assets).
        blob: ItemDefinition,
        /// Start of the slice.
        offset: u64,
    },
    /// `result.length` bytes of the patch's inline asset stream starting at `offset`.
    InlineAssetCopy {
        /// Start within the inline asset stream.
        offset: u64,
    },
    /// `result.length` bytes of the source archive starting at `offset`.
    CopySource {
        /// Start within the source archive.
        offset: u64,
    },
    /// A nested patch applied to a basis.
    NestedDiff {
        /// The nested patch file.
        diff: ItemDefinition,
        /// The item the nested patch was built against.
        basis: ItemDefinition,
    },
}

/// Boundary names and binary tags, in tag order.
pub(crate) const RECIPE_NAMES: &[(u8, &str)] = &[
    (1, "Copy"),
    (2, "Region"),
    (3, "Concatenation"),
    (4, "BsDiffDelta"),
    (5, "ZstdDelta"),
    (6, "ZstdDecompression"),
    (7, "GzDecompression"),
    (8, "ZlibDecompression"),
    (9, "ZstdCompression"),
    (10, "AllZero"),
    (11, "Slice"),
    (12, "InlineAssetCopy"),
    (13, "CopySource"),
    (14, "ApplyNestedDiff"),
];

/// Returns the boundary name for a binary tag.
#[must_use]
pub fn recipe_name_for_tag(tag: u8) -> Option<&'static str> {
    RECIPE_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == tag)
        .map(|(_, name)| *name)
}

/// Returns the binary tag for a boundary name.
#[must_use]
pub fn recipe_tag_for_name(name: &str) -> Option<u8> {
    RECIPE_NAMES
        .iter()
        .find(|(_, candidate)| *candidate == name)
        .map(|(tag, _)| *tag)
}

impl RecipeKind {
    /// Returns the boundary name for this variant.
    ///
    /// Decompression of raw deflate and compression to anything but zstd have
    /// no boundary name; constructors reject them before a name is needed.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Copy { .. } => "Copy",
            Self::Region { .. } => "Region",
            Self::Concatenation { .. } => "Concatenation",
            Self::ApplyDelta {
                format: DeltaFormat::BsDiff,
                ..
            } => "BsDiffDelta",
            Self::ApplyDelta {
                format: DeltaFormat::Zstd,
                ..
            } => "ZstdDelta",
            Self::Decompression { format, .. } => match format {
                CompressionFormat::Gzip => "GzDecompression",
                CompressionFormat::Zlib => "ZlibDecompression",
                CompressionFormat::Zstd | CompressionFormat::Deflate => "ZstdDecompression",
            },
            Self::Compression { .. } => "ZstdCompression",
            Self::AllZero => "AllZero",
            Self::Slice { .. } => "Slice",
            Self::InlineAssetCopy { .. } => "InlineAssetCopy",
            Self::CopySource { .. } => "CopySource",
            Self::NestedDiff { .. } => "ApplyNestedDiff",
        }
    }

    /// Item ingredients in positional order.
    #[must_use]
    pub fn item_ingredients(&self) -> Vec<&ItemDefinition> {
        match self {
            Self::Copy { item }
            | Self::Region { item, .. }
            | Self::Decompression { item, .. }
            | Self::Compression { item, .. } => vec![item],
            Self::Concatenation { items } => items.iter().collect(),
            Self::ApplyDelta { delta, basis, .. } => vec![delta, basis],
            Self::NestedDiff { diff, basis } => vec![diff, basis],
            Self::Slice { blob, .. } => vec![blob],
            Self::AllZero | Self::InlineAssetCopy { .. } | Self::CopySource { .. } => Vec::new(),
        }
    }

    pub(crate) fn item_ingredients_mut(&mut self) -> Vec<&mut ItemDefinition> {
        match self {
            Self::Copy { item }
            | Self::Region { item, .. }
            | Self::Decompression { item, .. }
            | Self::Compression { item, .. } => vec![item],
            Self::Concatenation { items } => items.iter_mut().collect(),
            Self::ApplyDelta { delta, basis, .. } => vec![delta, basis],
            Self::NestedDiff { diff, basis } => vec![diff, basis],
            Self::Slice { blob, .. } => vec![blob],
            Self::AllZero | Self::InlineAssetCopy { .. } | Self::CopySource { .. } => Vec::new(),
        }
    }
}
