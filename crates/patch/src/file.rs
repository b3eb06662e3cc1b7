//! The on-disk patch container.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use compress::zlib::{CompressionLevel, CountingDeflateEncoder, inflate_to_vec};
use items::{ItemDefinition, Recipe};

use crate::error::{PatchError, PatchResult};
use crate::wire::{read_bytes, read_item, read_recipe, read_u64, write_item, write_recipe, write_u64};

/// Leading bytes of every patch file.
pub const PATCH_MAGIC: [u8; 4] = *b"PAMZ";

/// Format version written by this build.
pub const PATCH_VERSION: u64 = 0;

/// Remainder bytes as stored in a patch: raw deflate plus the inflated length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompressedRemainder {
    uncompressed_length: u64,
    deflated: Vec<u8>,
}

impl CompressedRemainder {
    /// Deflates `data`. An empty blob stores no compressed bytes at all.
    pub fn compress(data: &[u8], level: CompressionLevel) -> io::Result<Self> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        let mut encoder = CountingDeflateEncoder::with_sink(Vec::new(), level);
        encoder.write(data)?;
        let (deflated, written) = encoder.finish_into_inner()?;
        debug_assert_eq!(written, deflated.len() as u64);
        Ok(Self {
            uncompressed_length: data.len() as u64,
            deflated,
        })
    }

    /// Length of the remainder once inflated.
    #[must_use]
    pub const fn uncompressed_length(&self) -> u64 {
        self.uncompressed_length
    }

    /// Length of the stored deflate stream.
    #[must_use]
    pub fn compressed_length(&self) -> u64 {
        self.deflated.len() as u64
    }

    /// Returns `true` when there is no remainder.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.uncompressed_length == 0
    }

    /// Inflates the stream and checks its length.
    pub fn inflate(&self) -> PatchResult<Vec<u8>> {
        if self.deflated.is_empty() {
            return Ok(Vec::new());
        }
        let data = inflate_to_vec(&self.deflated)?;
        if data.len() as u64 != self.uncompressed_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "remainder inflates to {} bytes, header says {}",
                    data.len(),
                    self.uncompressed_length
                ),
            )
            .into());
        }
        Ok(data)
    }
}

/// A decoded patch: identities, recipes and the two embedded blobs.
///
/// ```
/// use items::{ItemDefinition, Recipe};
/// use patch::PatchFile;
///
/// let source = ItemDefinition::from_bytes(b"source bytes");
/// let target = ItemDefinition::from_bytes(b"source");
/// let patch = PatchFile {
///     target: target.clone(),
///     source,
///     recipes: vec![Recipe::copy_source(target, 0).unwrap()],
///     inline_assets: Vec::new(),
///     remainder: Default::default(),
/// };
/// let bytes = patch.to_bytes().unwrap();
/// assert_eq!(&bytes[..4], b"PAMZ");
/// assert_eq!(patch::PatchFile::from_bytes(&bytes).unwrap(), patch);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchFile {
    /// Item the patch reproduces.
    pub target: ItemDefinition,
    /// Item the patch applies to.
    pub source: ItemDefinition,
    /// Recipes, keyed by their results when applied.
    pub recipes: Vec<Recipe>,
    /// Concatenated inline assets addressed by `InlineAssetCopy`.
    pub inline_assets: Vec<u8>,
    /// Deflated remainder blob addressed by `Slice`.
    pub remainder: CompressedRemainder,
}

impl PatchFile {
    /// Serializes the patch.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> PatchResult<()> {
        writer.write_all(&PATCH_MAGIC)?;
        write_u64(writer, PATCH_VERSION)?;
        write_item(writer, &self.target)?;
        write_item(writer, &self.source)?;

        write_u64(writer, self.recipes.len() as u64)?;
        for recipe in &self.recipes {
            write_recipe(writer, recipe)?;
        }

        write_u64(writer, self.inline_assets.len() as u64)?;
        writer.write_all(&self.inline_assets)?;

        write_u64(writer, self.remainder.uncompressed_length)?;
        write_u64(writer, self.remainder.compressed_length())?;
        writer.write_all(&self.remainder.deflated)?;
        Ok(())
    }

    /// Serializes the patch into memory.
    pub fn to_bytes(&self) -> PatchResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parses a patch.
    pub fn read_from<R: Read>(reader: &mut R) -> PatchResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != PATCH_MAGIC {
            return Err(PatchError::BadMagic { found: magic });
        }
        let version = read_u64(reader)?;
        if version != PATCH_VERSION {
            return Err(PatchError::UnsupportedVersion(version));
        }

        let target = read_item(reader)?;
        let source = read_item(reader)?;

        let count = read_u64(reader)?;
        let mut recipes = Vec::new();
        for _ in 0..count {
            recipes.push(read_recipe(reader)?);
        }

        let inline_length = read_u64(reader)?;
        let inline_assets = read_bytes(reader, inline_length)?;

        let uncompressed_length = read_u64(reader)?;
        let compressed_length = read_u64(reader)?;
        let deflated = read_bytes(reader, compressed_length)?;

        Ok(Self {
            target,
            source,
            recipes,
            inline_assets,
            remainder: CompressedRemainder {
                uncompressed_length,
                deflated,
            },
        })
    }

    /// Parses a patch held in memory.
    pub fn from_bytes(data: &[u8]) -> PatchResult<Self> {
        Self::read_from(&mut Cursor::new(data))
    }

    /// Reads and parses the patch at `path`.
    pub fn read_path(path: &Path) -> PatchResult<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatchFile {
        let source = ItemDefinition::from_bytes(b"0123456789");
        let target = ItemDefinition::from_bytes(b"2345");
        PatchFile {
            target: target.clone(),
            source,
            recipes: vec![Recipe::copy_source(target, 2).expect("recipe")],
            inline_assets: b"asset".to_vec(),
            remainder: CompressedRemainder::compress(b"left over bytes", CompressionLevel::Best)
                .expect("deflate"),
        }
    }

    #[test]
    fn header_layout() {
        let bytes = sample().to_bytes().expect("encode");
        assert_eq!(&bytes[..4], b"PAMZ");
        assert_eq!(&bytes[4..12], &[0u8; 8]);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let patch = sample();
        let back = PatchFile::from_bytes(&patch.to_bytes().expect("encode")).expect("decode");
        assert_eq!(back, patch);
        assert_eq!(back.remainder.inflate().expect("inflate"), b"left over bytes");
    }

    #[test]
    fn rejects_other_magic_and_versions() {
        let mut bytes = sample().to_bytes().expect("encode");
        bytes[4] = 7;
        assert!(matches!(
            PatchFile::from_bytes(&bytes),
            Err(PatchError::UnsupportedVersion(7))
        ));
        bytes[0] = b'X';
        assert!(matches!(PatchFile::from_bytes(&bytes), Err(PatchError::BadMagic { .. })));
    }

    #[test]
    fn truncated_patches_fail() {
        let bytes = sample().to_bytes().expect("encode");
        let err = PatchFile::from_bytes(&bytes[..bytes.len() - 3]).expect_err("truncated");
        assert!(matches!(err, PatchError::Io(_)));
    }

    #[test]
    fn empty_remainder_stores_nothing() {
        let remainder = CompressedRemainder::compress(b"", CompressionLevel::Best).expect("deflate");
        assert!(remainder.is_empty());
        assert_eq!(remainder.compressed_length(), 0);
        assert!(remainder.inflate().expect("inflate").is_empty());
    }

    #[test]
    fn remainder_is_raw_deflate() {
        let data = b"left over bytes, left over bytes, left over bytes".repeat(16);
        let remainder =
            CompressedRemainder::compress(&data, CompressionLevel::Best).expect("deflate");
        assert_eq!(remainder.uncompressed_length(), data.len() as u64);
        assert!(remainder.compressed_length() < data.len() as u64);
        let stored =
            compress::zlib::deflate_to_vec(&data, CompressionLevel::Best).expect("deflate");
        assert_eq!(remainder.compressed_length(), stored.len() as u64);
        assert_eq!(remainder.inflate().expect("inflate"), data);
    }
}
