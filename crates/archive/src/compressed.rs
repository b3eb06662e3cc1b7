//! Tokenizer for single-stream zstd and gzip archives.

use std::io::Read;

use tracing::{debug, info};

use compress::algorithm::CompressionFormat;
use compress::codec::{decompress, find_reproducing_zstd_level};
use compress::zstd::library_version;
use items::{ItemDefinition, Recipe};

use crate::error::{ArchiveResult, FormatMismatch};
use crate::loader::{ArchiveInput, ArchiveParser, LoadContext, ParseOutcome};
use crate::names::payload_chunk_name;
use crate::tokenization::ArchiveTokenization;

/// Payload name of the decompressed stream.
pub const DECOMPRESSED_PAYLOAD_NAME: &str = "decompressed";

/// zstd levels tried, in order, when checking that a stream recompresses.
pub const DEFAULT_RECOMPRESSION_LEVELS: &[i32] = &[3, 19, 1, 9, 6, 12, 15, 22];

/// Parser for a whole-file compressed stream.
///
/// The stream is one chunk. Its decompressed content is a payload item with
/// a reverse `Decompression` recipe. For zstd, a forward `ZstdCompression`
/// recipe is recorded only when recompressing the payload at one of
/// [`levels`](Self::with_levels) reproduces the stream exactly. When the
/// decompressed content is itself an archive, its tokenization is imported.
#[derive(Clone, Debug)]
pub struct CompressedStreamParser {
    format: CompressionFormat,
    levels: Vec<i32>,
}

impl CompressedStreamParser {
    /// Parser for zstd frames.
    #[must_use]
    pub fn zstd() -> Self {
        Self {
            format: CompressionFormat::Zstd,
            levels: DEFAULT_RECOMPRESSION_LEVELS.to_vec(),
        }
    }

    /// Parser for gzip members.
    #[must_use]
    pub fn gzip() -> Self {
        Self {
            format: CompressionFormat::Gzip,
            levels: Vec::new(),
        }
    }

    /// Replaces the recompression levels to try.
    #[must_use]
    pub fn with_levels(mut self, levels: Vec<i32>) -> Self {
        self.levels = levels;
        self
    }

    fn expose_compressed_payload(
        &self,
        tokens: &mut ArchiveTokenization,
        compressed: &[u8],
        payload: &[u8],
        payload_item: &ItemDefinition,
    ) -> ArchiveResult<()> {
        if self.format != CompressionFormat::Zstd {
            return Ok(());
        }

        let level = find_reproducing_zstd_level(payload, compressed, self.levels.iter().copied())?;
        match level {
            Some(level) => {
                let recipe = Recipe::zstd_compression(
                    tokens.archive_item().clone(),
                    payload_item.clone(),
                    library_version(),
                    level as u64,
                )?;
                tokens.add_forward_recipe(recipe);
                debug!(target: "diffgen::archive", level, "zstd stream recompresses identically");
            }
            None => {
                debug!(
                    target: "diffgen::archive",
                    levels = ?self.levels,
                    "zstd stream does not recompress identically"
                );
            }
        }
        Ok(())
    }
}

impl ArchiveParser for CompressedStreamParser {
    fn name(&self) -> &'static str {
        self.format.name()
    }

    fn priority(&self) -> u32 {
        50
    }

    fn tokenize(
        &self,
        input: &mut dyn ArchiveInput,
        archive: &ItemDefinition,
        context: &LoadContext<'_>,
    ) -> ParseOutcome {
        let mut compressed = Vec::with_capacity(archive.length() as usize);
        input.read_to_end(&mut compressed)?;

        if CompressionFormat::detect(&compressed) != Some(self.format) {
            return Ok(Err(FormatMismatch::new(format!("no {} magic", self.format))));
        }

        let payload = match decompress(self.format, &compressed) {
            Ok(payload) => payload,
            Err(err) => {
                return Ok(Err(FormatMismatch::new(format!(
                    "{} stream does not decode: {err}",
                    self.format
                ))));
            }
        };

        let mut tokens = ArchiveTokenization::new(self.name(), archive.clone());
        tokens.add_chunk(0, archive.clone().with_name(payload_chunk_name(self.name())))?;

        let payload_item = ItemDefinition::from_bytes(&payload).with_name(DECOMPRESSED_PAYLOAD_NAME);
        tokens.add_payload(DECOMPRESSED_PAYLOAD_NAME, payload_item.clone());
        tokens.add_reverse_recipe(Recipe::decompression(
            self.format,
            payload_item.clone(),
            archive.clone(),
        )?);

        self.expose_compressed_payload(&mut tokens, &compressed, &payload, &payload_item)?;

        if let Some(nested) = context.load_nested(&payload)? {
            info!(
                target: "diffgen::archive",
                format = nested.format(),
                outer = self.name(),
                "decompressed stream is itself an archive"
            );
            tokens.import(&nested);
        }

        Ok(Ok(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpio::CpioWriter;
    use crate::loader::ArchiveLoader;
    use compress::zlib::CompressionLevel;
    use items::RecipeKind;
    use std::io::Cursor;

    #[test]
    fn zstd_stream_gets_both_directions() {
        let payload = b"payload ".repeat(512);
        let packed = compress::zstd::compress_with_level(&payload, 3).expect("compress");
        let tokens = ArchiveLoader::with_default_parsers()
            .load(&mut Cursor::new(packed))
            .expect("load");

        assert_eq!(tokens.format(), "zstd");
        let payload_item = ItemDefinition::from_bytes(&payload);
        assert_eq!(
            tokens.reverse_recipe(&payload_item).map(Recipe::name),
            Some("ZstdDecompression")
        );
        let forward = tokens
            .forward_recipe(tokens.archive_item())
            .expect("recompression recipe");
        assert!(matches!(forward.kind(), RecipeKind::Compression { level: 3, .. }));
        tokens.check_partition().expect("partition");
    }

    #[test]
    fn gzip_stream_is_only_decompressible() {
        let payload = b"gzip payload".repeat(64);
        let packed = compress::codec::compress(CompressionFormat::Gzip, &payload, CompressionLevel::Default)
            .expect("gzip");
        let tokens = ArchiveLoader::with_default_parsers()
            .load(&mut Cursor::new(packed))
            .expect("load");

        assert_eq!(tokens.format(), "gzip");
        assert!(tokens.forward_recipe(tokens.archive_item()).is_none());
        let payload_item = ItemDefinition::from_bytes(&payload);
        assert_eq!(
            tokens.reverse_recipe(&payload_item).map(Recipe::name),
            Some("GzDecompression")
        );
    }

    #[test]
    fn compressed_cpio_exposes_inner_files() {
        let mut writer = CpioWriter::new();
        writer.add_file("etc/motd", b"hello from inside");
        let cpio = writer.finish_padded(512);
        let packed = compress::zstd::compress_with_level(&cpio, 3).expect("compress");

        let tokens = ArchiveLoader::with_default_parsers()
            .load(&mut Cursor::new(packed))
            .expect("load");
        let motd = ItemDefinition::from_bytes(b"hello from inside");
        assert_eq!(tokens.payload().with_name("etc/motd").next(), Some(&motd));
        let region = tokens.reverse_recipe(&motd).expect("nested region");
        assert_eq!(region.item_ingredients()[0], &ItemDefinition::from_bytes(&cpio));
    }
}
