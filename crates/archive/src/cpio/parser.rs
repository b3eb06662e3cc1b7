//! Tokenizer for newc cpio streams.

use std::io::{Read, Seek, SeekFrom};

use tracing::trace;

use items::{ItemDefinition, Recipe};

use super::header::{HEADER_LEN, NewcHeader, TRAILER_NAME, padding_for};
use crate::error::{ArchiveError, ArchiveResult, FormatMismatch};
use crate::loader::{ArchiveInput, ArchiveParser, LoadContext, ParseOutcome};
use crate::names::{TRAILER_CHUNK_NAME, header_chunk_name, padding_chunk_name, payload_chunk_name};
use crate::tokenization::ArchiveTokenization;

const FORMAT: &str = "cpio";

/// Parser for `070701` / `070702` cpio archives.
///
/// Every entry yields a header chunk. Non-empty file data becomes a payload
/// item named by its path and a data chunk with the same identity. Alignment
/// padding after file data becomes a padding chunk with an `AllZero` recipe.
/// The trailer entry becomes `Chunk.Trailer`; bytes after it are left for
/// gap filling.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpioParser;

impl ArchiveParser for CpioParser {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn priority(&self) -> u32 {
        100
    }

    fn tokenize(
        &self,
        input: &mut dyn ArchiveInput,
        archive: &ItemDefinition,
        _context: &LoadContext<'_>,
    ) -> ParseOutcome {
        let mut tokens = ArchiveTokenization::new(FORMAT, archive.clone());
        let length = archive.length();
        let mut offset = 0u64;
        let mut first = true;

        loop {
            // A broken first header means this is not a cpio stream at all;
            // later on it means a corrupt one.
            let fail = |offset: u64, reason: String| -> ParseOutcome {
                if first {
                    Ok(Err(FormatMismatch::new(reason)))
                } else {
                    Err(ArchiveError::malformed(FORMAT, offset, reason))
                }
            };

            if offset + HEADER_LEN as u64 > length {
                return fail(offset, "stream ends before the TRAILER!!! entry".to_string());
            }

            let mut raw = [0u8; HEADER_LEN];
            input.seek(SeekFrom::Start(offset))?;
            input.read_exact(&mut raw)?;
            let header = match NewcHeader::parse(&raw) {
                Ok(header) => header,
                Err(reason) => return fail(offset, reason),
            };

            let header_len = header.padded_len();
            let data_len = u64::from(header.file_size);
            if offset + header_len > length {
                return fail(offset, "path runs past the end of the stream".to_string());
            }
            if offset + header_len + data_len > length {
                return fail(offset, format!("{data_len} bytes of data run past the end"));
            }

            let mut name_bytes = vec![0u8; header.name_size as usize];
            input.read_exact(&mut name_bytes)?;
            let name = decode_name(&name_bytes);
            first = false;

            input.seek(SeekFrom::Start(offset))?;
            let header_item = hash_next(input, header_len)?;

            if name == TRAILER_NAME {
                tokens.add_chunk(offset, header_item.with_name(TRAILER_CHUNK_NAME))?;
                trace!(target: "diffgen::archive", offset, "cpio trailer");
                break;
            }

            tokens.add_chunk(offset, header_item.with_name(header_chunk_name(&name)))?;
            offset += header_len;

            if data_len == 0 {
                continue;
            }

            let data_item = hash_next(input, data_len)?;
            tokens.add_payload(&name, data_item.clone().with_name(name.clone()));
            tokens.add_chunk(offset, data_item.with_name(payload_chunk_name(&name)))?;
            trace!(target: "diffgen::archive", name = %name, offset, bytes = data_len, "cpio entry");
            offset += data_len;

            let pad = padding_for(offset).min(length - offset);
            if pad > 0 {
                let mut padding = vec![0u8; pad as usize];
                input.read_exact(&mut padding)?;
                let item = ItemDefinition::from_bytes(&padding).with_name(padding_chunk_name(offset));
                if padding.iter().all(|byte| *byte == 0) {
                    tokens.add_forward_recipe(Recipe::all_zero(item.clone())?);
                }
                tokens.add_chunk(offset, item)?;
                offset += pad;
            }
        }

        Ok(Ok(tokens))
    }
}

fn hash_next(input: &mut dyn ArchiveInput, length: u64) -> ArchiveResult<ItemDefinition> {
    let mut reader = input;
    Ok(ItemDefinition::from_reader(&mut reader, length)?)
}

fn decode_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
