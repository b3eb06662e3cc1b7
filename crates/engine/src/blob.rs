//! Concatenated item blobs carried verbatim in the patch.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use items::{ItemDefinition, Recipe};

use crate::error::{EngineError, EngineResult};

/// A finished blob: its file, identity, and the slices that read items back.
#[derive(Clone, Debug)]
pub struct Blob {
    /// File holding the blob.
    pub path: PathBuf,
    /// Identity of the whole blob, named after its role.
    pub item: ItemDefinition,
    /// One recipe per member, in blob order.
    pub recipes: Vec<Recipe>,
    /// Member identities and their offsets, in blob order.
    pub members: Vec<(ItemDefinition, u64)>,
}

impl Blob {
    /// Total length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.item.length()
    }

    /// Returns `true` for a blob without members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Re-reads the blob from disk and checks every member at its offset.
    pub fn verify_members(&self) -> EngineResult<()> {
        let data = fs::read(&self.path).map_err(|err| EngineError::io("read", &self.path, err))?;
        self.item.verify(&data)?;
        for (member, offset) in &self.members {
            let start = usize::try_from(*offset)
                .map_err(|_| EngineError::Fatal(format!("blob offset {offset} out of range")))?;
            let end = usize::try_from(offset + member.length())
                .map_err(|_| EngineError::Fatal(format!("blob member {member} out of range")))?;
            let bytes = data.get(start..end).ok_or_else(|| {
                EngineError::Verification(format!(
                    "{member} at offset {offset} runs past the end of {}",
                    self.path.display()
                ))
            })?;
            member.verify(bytes).map_err(|err| {
                EngineError::Verification(format!(
                    "{member} at offset {offset} of {}: {err}",
                    self.path.display()
                ))
            })?;
        }
        Ok(())
    }
}

/// Writes members back to back into one file.
///
/// Members are written in the order they are pushed; the caller decides
/// the ordering. Each member's bytes are checked against its identity
/// before they are written.
pub struct BlobWriter {
    name: &'static str,
    path: PathBuf,
    writer: BufWriter<File>,
    members: Vec<(ItemDefinition, u64)>,
    position: u64,
}

impl BlobWriter {
    /// Creates (or truncates) the blob file at `path`.
    pub fn create(path: &Path, name: &'static str) -> EngineResult<Self> {
        let file = File::create(path).map_err(|err| EngineError::io("create", path, err))?;
        Ok(Self {
            name,
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            members: Vec::new(),
            position: 0,
        })
    }

    /// Appends `data` as `item` and returns its offset.
    pub fn push(&mut self, item: &ItemDefinition, data: &[u8]) -> EngineResult<u64> {
        item.verify(data)?;
        let offset = self.position;
        self.writer
            .write_all(data)
            .map_err(|err| EngineError::io("write", &self.path, err))?;
        self.position += data.len() as u64;
        self.members.push((item.without_names(), offset));
        Ok(offset)
    }

    /// Flushes the file, hashes it and builds the member slices.
    ///
    /// A member spanning the whole blob is the blob itself and gets no
    /// slice.
    pub fn finish(self) -> EngineResult<Blob> {
        let Self {
            name,
            path,
            writer,
            members,
            position,
        } = self;
        writer
            .into_inner()
            .map_err(|err| EngineError::io("flush", &path, err.into_error()))?
            .sync_all()
            .map_err(|err| EngineError::io("sync", &path, err))?;

        let data = fs::read(&path).map_err(|err| EngineError::io("read", &path, err))?;
        if data.len() as u64 != position {
            return Err(EngineError::Fatal(format!(
                "{} holds {} bytes, expected {position}",
                path.display(),
                data.len()
            )));
        }
        let item = ItemDefinition::from_bytes(&data).with_name(name);

        let mut recipes = Vec::with_capacity(members.len());
        for (member, offset) in &members {
            if member.length() == item.length() {
                continue;
            }
            recipes.push(Recipe::slice(member.clone(), item.clone(), *offset)?);
        }

        Ok(Blob {
            path,
            item,
            recipes,
            members,
        })
    }
}
