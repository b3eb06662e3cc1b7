//! Reading item bytes back out of a tokenized archive.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use archive::ArchiveTokenization;
use items::ItemDefinition;
use patch::{ApplyOptions, ApplySession};

use crate::error::{EngineError, EngineResult};

/// Produces any item of an archive by evaluating the archive's reverse
/// recipes against its bytes.
pub struct ItemExtractor {
    session: ApplySession,
}

impl ItemExtractor {
    /// Reads items out of the archive at `path`, which must be the one
    /// `tokens` describes.
    ///
    /// The archive stays on disk: region recipes seek into the file through
    /// a buffered reader, so only the items asked for are held in memory.
    pub fn open(path: &Path, tokens: &ArchiveTokenization) -> EngineResult<Self> {
        let recipes = tokens.reverse_recipes().cloned();
        let archive = tokens.archive_item();
        let session =
            ApplySession::for_archive_file(path, archive, recipes, ApplyOptions::default())?;
        debug!(
            target: "diffgen::delta",
            path = %path.display(),
            archive = %archive,
            "streaming archive items"
        );
        Ok(Self { session })
    }

    /// Wraps archive bytes already in memory.
    pub fn new(bytes: Vec<u8>, tokens: &ArchiveTokenization) -> EngineResult<Self> {
        tokens.archive_item().verify(&bytes)?;
        let recipes = tokens.reverse_recipes().cloned();
        let session = ApplySession::for_archive(bytes, recipes, ApplyOptions::default())?;
        Ok(Self { session })
    }

    /// Bytes of `item`, verified against its identity.
    pub fn extract(&mut self, item: &ItemDefinition) -> EngineResult<Vec<u8>> {
        Ok(self.session.extract(item)?)
    }

    /// Writes `item` into `folder` under its SHA-256 and returns the path.
    ///
    /// An existing file of the right length is assumed to be a previous
    /// extraction and kept.
    pub fn extract_to(&mut self, item: &ItemDefinition, folder: &Path) -> EngineResult<PathBuf> {
        let path = item_path(folder, item);
        if path.metadata().is_ok_and(|meta| meta.len() == item.length()) {
            return Ok(path);
        }
        let data = self.extract(item)?;
        fs::write(&path, &data).map_err(|err| EngineError::io("write", &path, err))?;
        trace!(target: "diffgen::delta", item = %item, path = %path.display(), "extracted item");
        Ok(path)
    }
}

/// Where an extracted copy of `item` lives inside `folder`.
#[must_use]
pub fn item_path(folder: &Path, item: &ItemDefinition) -> PathBuf {
    folder.join(item.sha256_hex())
}

/// Hashes a file on disk into an item.
pub fn hash_file(path: &Path) -> EngineResult<ItemDefinition> {
    let file = fs::File::open(path).map_err(|err| EngineError::io("open", path, err))?;
    let length = file
        .metadata()
        .map_err(|err| EngineError::io("stat", path, err))?
        .len();
    let mut reader = BufReader::new(file);
    Ok(ItemDefinition::from_reader(&mut reader, length)?)
}
