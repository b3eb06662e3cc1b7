//! Delta planning, delta builders and the delta catalog.
//!
//! [`select_plans`] pairs target payload items with source candidates,
//! [`create_deltas`] runs every [`DeltaBuilder`] on every pairing in
//! parallel, and the [`DeltaCatalog`] keeps the smallest asset per target.
//!
//! Builders share one file protocol inside the delta folder: an asset for
//! source `S` and target `T` is `{S}_{T}.{builder}` (SHA-256 hex digests).
//! It is produced at `.tmp` and moved into place; a pairing that failed or
//! produced nothing smaller than the target leaves a `.bad` marker that
//! later runs honour. An existing asset is reused as-is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use items::ItemDefinition;

use crate::cancel::CancellationToken;
use crate::error::{EngineError, EngineResult};
use crate::extract::hash_file;
use crate::workdir::{MoveRetry, move_with_retries};

mod catalog;
mod create;
mod nested;
mod plan;
mod tool;
mod zstd;

pub use catalog::{DeltaCatalog, DeltaEntry};
pub use create::{DeltaFolders, DeltaRunStats, create_deltas};
pub use nested::NestedDeltaBuilder;
pub use plan::{DeltaPlan, PlanSelection, reachable_target_items, select_plans};
pub use tool::ToolDeltaBuilder;
pub use zstd::ZstdDeltaBuilder;

/// Everything a builder needs for one pairing.
#[derive(Clone, Copy, Debug)]
pub struct DeltaJob<'a> {
    /// The pairing.
    pub plan: &'a DeltaPlan,
    /// Extracted basis.
    pub source_path: &'a Path,
    /// Extracted target.
    pub target_path: &'a Path,
    /// Folder assets are written to.
    pub folder: &'a Path,
    /// Run cancellation.
    pub cancel: &'a CancellationToken,
}

/// A way of encoding a target item relative to a basis.
pub trait DeltaBuilder: Send + Sync {
    /// Short name, also the asset file extension.
    fn name(&self) -> &'static str;

    /// Size gate: returns `false` for pairings this builder never tries.
    fn accepts(&self, plan: &DeltaPlan) -> bool;

    /// Builds an asset for `job`.
    ///
    /// `Ok(None)` means no usable delta; only cancellation and errors in
    /// the working folder itself are returned as `Err`.
    fn build(&self, job: &DeltaJob<'_>) -> EngineResult<Option<DeltaEntry>>;
}

/// File protocol shared by the builders.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AssetFiles {
    pub(crate) bad_markers: bool,
    pub(crate) retry: MoveRetry,
}

impl AssetFiles {
    /// Produces or reuses the asset for `job`.
    ///
    /// `produce` writes the asset to the path it is given and returns
    /// whether it succeeded. Returns the final path and asset identity when
    /// a usable asset exists.
    pub(crate) fn stage<F>(
        &self,
        job: &DeltaJob<'_>,
        builder: &str,
        produce: F,
    ) -> EngineResult<Option<(PathBuf, ItemDefinition)>>
    where
        F: FnOnce(&Path) -> EngineResult<bool>,
    {
        let final_path = asset_path(job.folder, job.plan, builder);
        let temp_path = sibling(&final_path, "tmp");
        let bad_path = sibling(&final_path, "bad");
        let limit = job.plan.target.length();

        if self.bad_markers && bad_path.exists() {
            debug!(target: "diffgen::delta", builder, name = %job.plan.name, "skipping pairing marked bad");
            return Ok(None);
        }

        if final_path.is_file() {
            let asset = hash_file(&final_path)?;
            if asset.length() > 0 && asset.length() < limit {
                debug!(target: "diffgen::delta", builder, name = %job.plan.name, "reusing existing delta");
                return Ok(Some((final_path, asset)));
            }
            self.mark_bad(&bad_path, "existing delta is not smaller than the target")?;
            return Ok(None);
        }

        remove_if_present(&temp_path)?;
        job.cancel.check()?;

        let produced = match produce(&temp_path) {
            Ok(produced) => produced,
            Err(EngineError::Cancelled) => {
                remove_if_present(&temp_path)?;
                return Err(EngineError::Cancelled);
            }
            Err(err) => {
                warn!(target: "diffgen::delta", builder, name = %job.plan.name, error = %err, "delta builder failed");
                false
            }
        };

        let length = temp_path.metadata().map(|meta| meta.len()).ok();
        match length {
            Some(length) if produced && length > 0 && length < limit => {
                move_with_retries(&temp_path, &final_path, self.retry)?;
                let asset = hash_file(&final_path)?;
                Ok(Some((final_path, asset)))
            }
            _ => {
                remove_if_present(&temp_path)?;
                let reason = match length {
                    Some(length) if produced => format!("{length} byte delta for a {limit} byte target"),
                    _ => "builder produced no delta".to_string(),
                };
                self.mark_bad(&bad_path, &reason)?;
                Ok(None)
            }
        }
    }

    fn mark_bad(&self, bad_path: &Path, reason: &str) -> EngineResult<()> {
        debug!(target: "diffgen::delta", marker = %bad_path.display(), reason, "no usable delta");
        if self.bad_markers {
            fs::write(bad_path, reason).map_err(|err| EngineError::io("write", bad_path, err))?;
        }
        Ok(())
    }
}

/// Final asset path for `plan` produced by `builder`.
#[must_use]
pub fn asset_path(folder: &Path, plan: &DeltaPlan, builder: &str) -> PathBuf {
    folder.join(format!(
        "{}_{}.{builder}",
        plan.source.sha256_hex(),
        plan.target.sha256_hex()
    ))
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> EngineResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(EngineError::io("remove", path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DeltaPlan {
        DeltaPlan {
            target: ItemDefinition::from_bytes(&[1u8; 1000]),
            source: ItemDefinition::from_bytes(&[2u8; 1000]),
            name: "file".to_string(),
        }
    }

    const FILES: AssetFiles = AssetFiles {
        bad_markers: true,
        retry: MoveRetry {
            attempts: 1,
            backoff: std::time::Duration::from_millis(1),
        },
    };

    #[test]
    fn successful_asset_is_moved_into_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plan = plan();
        let cancel = CancellationToken::new();
        let job = DeltaJob {
            plan: &plan,
            source_path: Path::new("unused"),
            target_path: Path::new("unused"),
            folder: dir.path(),
            cancel: &cancel,
        };

        let (path, asset) = FILES
            .stage(&job, "test", |tmp| {
                fs::write(tmp, b"small delta")?;
                Ok(true)
            })
            .expect("stage")
            .expect("asset");
        assert_eq!(path, asset_path(dir.path(), &plan, "test"));
        assert_eq!(asset, ItemDefinition::from_bytes(b"small delta"));

        let reused = FILES
            .stage(&job, "test", |_| panic!("must not rebuild"))
            .expect("stage");
        assert!(reused.is_some());
    }

    #[test]
    fn oversized_asset_leaves_a_bad_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plan = plan();
        let cancel = CancellationToken::new();
        let job = DeltaJob {
            plan: &plan,
            source_path: Path::new("unused"),
            target_path: Path::new("unused"),
            folder: dir.path(),
            cancel: &cancel,
        };

        let outcome = FILES
            .stage(&job, "test", |tmp| {
                fs::write(tmp, vec![0u8; 1000])?;
                Ok(true)
            })
            .expect("stage");
        assert!(outcome.is_none());
        let final_path = asset_path(dir.path(), &plan, "test");
        assert!(sibling(&final_path, "bad").exists());
        assert!(!sibling(&final_path, "tmp").exists());

        let retried = FILES
            .stage(&job, "test", |_| panic!("bad pairings are skipped"))
            .expect("stage");
        assert!(retried.is_none());
    }

    #[test]
    fn builder_errors_are_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plan = plan();
        let cancel = CancellationToken::new();
        let job = DeltaJob {
            plan: &plan,
            source_path: Path::new("unused"),
            target_path: Path::new("unused"),
            folder: dir.path(),
            cancel: &cancel,
        };
        let outcome = FILES
            .stage(&job, "test", |_| Err(EngineError::Fatal("tool exploded".into())))
            .expect("stage");
        assert!(outcome.is_none());
    }
}
