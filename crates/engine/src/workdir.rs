//! Working folder layout, stage cookies and input hash files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use items::ItemDefinition;

use crate::error::{EngineError, EngineResult};

/// The folder a build keeps its intermediate state in.
///
/// Each stage writes into its own files or subfolder and marks completion
/// with a zero-byte `<stage>.cookie`. A cookie only lets a re-run skip
/// work; deleting one forces that stage to run again.
#[derive(Clone, Debug)]
pub struct WorkingFolder {
    root: PathBuf,
}

impl WorkingFolder {
    /// Creates the folder if needed.
    pub fn open(root: impl Into<PathBuf>) -> EngineResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| EngineError::io("create", &root, err))?;
        Ok(Self { root })
    }

    /// Folder root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a file directly inside the folder.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Creates and returns a subfolder.
    pub fn subfolder(&self, name: &str) -> EngineResult<PathBuf> {
        let path = self.root.join(name);
        fs::create_dir_all(&path).map_err(|err| EngineError::io("create", &path, err))?;
        Ok(path)
    }

    fn cookie_path(&self, stage: &str) -> PathBuf {
        self.root.join(format!("{stage}.cookie"))
    }

    /// Returns `true` when `stage` completed in an earlier run.
    #[must_use]
    pub fn has_cookie(&self, stage: &str) -> bool {
        self.cookie_path(stage).is_file()
    }

    /// Marks `stage` complete.
    pub fn write_cookie(&self, stage: &str) -> EngineResult<()> {
        let path = self.cookie_path(stage);
        fs::write(&path, []).map_err(|err| EngineError::io("write", &path, err))?;
        debug!(target: "diffgen::pipeline", stage, "cookie written");
        Ok(())
    }

    /// Forgets that `stage` completed.
    pub fn clear_cookie(&self, stage: &str) -> EngineResult<()> {
        let path = self.cookie_path(stage);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(EngineError::io("remove", &path, err)),
        }
    }

    /// Binds the folder to the content of input `name`.
    ///
    /// The first call records the SHA-256 of `item` in `<name>.hash`. Later
    /// calls fail with [`EngineError::BadWorkingFolder`] when the recorded
    /// hash belongs to different content, so state from another input is
    /// never reused.
    pub fn bind_input(&self, name: &str, item: &ItemDefinition) -> EngineResult<()> {
        let path = self.root.join(format!("{name}.hash"));
        let expected = item.sha256_hex();
        match fs::read_to_string(&path) {
            Ok(recorded) if recorded.trim() == expected => Ok(()),
            Ok(recorded) => Err(EngineError::BadWorkingFolder {
                path,
                reason: format!(
                    "{name} hash is {expected} but the folder was built for {}",
                    recorded.trim()
                ),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::write(&path, &expected).map_err(|err| EngineError::io("write", &path, err))
            }
            Err(err) => Err(EngineError::io("read", &path, err)),
        }
    }

    /// Deletes the folder and everything in it.
    pub fn remove(self) -> EngineResult<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(EngineError::io("remove", &self.root, err)),
        }
    }
}

/// Retry policy for renames.
#[derive(Clone, Copy, Debug)]
pub struct MoveRetry {
    /// Total attempts, at least one is always made.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl MoveRetry {
    /// Builds a policy from config values.
    #[must_use]
    pub const fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts,
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// Renames `from` to `to`, replacing `to`.
///
/// Transient failures (a reader holding the file, for instance) are retried
/// per `policy`. A missing `from` fails at once. Moves across filesystems
/// fall back to copy and remove.
pub fn move_with_retries(from: &Path, to: &Path, policy: MoveRetry) -> EngineResult<()> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match fs::rename(from, to) {
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                fs::copy(from, to).and_then(|_| fs::remove_file(from))
            }
            other => other,
        };
        match result {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound || attempt >= attempts => {
                return Err(EngineError::io("move", from, err));
            }
            Err(err) => {
                warn!(
                    target: "diffgen::pipeline",
                    from = %from.display(),
                    to = %to.display(),
                    attempt,
                    error = %err,
                    "move failed, retrying"
                );
                attempt += 1;
                thread::sleep(policy.backoff);
            }
        }
    }
}

/// Stages a file at `<final>.tmp` and promotes it only on commit.
///
/// Dropping the guard without committing deletes the staged file, so a
/// failed build never leaves a partial output behind.
#[derive(Debug)]
pub struct OutputGuard {
    final_path: PathBuf,
    temp_path: PathBuf,
    committed: bool,
}

impl OutputGuard {
    /// Prepares a guard for `final_path`, removing a stale staged file.
    pub fn new(final_path: &Path) -> EngineResult<Self> {
        let mut name = final_path.as_os_str().to_os_string();
        name.push(".tmp");
        let temp_path = PathBuf::from(name);
        match fs::remove_file(&temp_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(EngineError::io("remove", &temp_path, err)),
        }
        Ok(Self {
            final_path: final_path.to_path_buf(),
            temp_path,
            committed: false,
        })
    }

    /// Where the file is written before commit.
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.temp_path
    }

    /// Final destination.
    #[must_use]
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Renames the staged file into place.
    pub fn commit(mut self, policy: MoveRetry) -> EngineResult<()> {
        move_with_retries(&self.temp_path, &self.final_path, policy)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.temp_path) {
            Ok(()) => debug!(
                target: "diffgen::pipeline",
                path = %self.temp_path.display(),
                "discarded staged output"
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => debug!(
                target: "diffgen::pipeline",
                path = %self.temp_path.display(),
                error = %err,
                "staged output left behind"
            ),
        }
    }
}
