//! Deltas that are themselves patches between nested archives.

use std::fs;
use std::path::Path;

use tracing::debug;

use items::Recipe;

use super::{AssetFiles, DeltaBuilder, DeltaEntry, DeltaJob, DeltaPlan, asset_path};
use crate::config::{DiffConfig, Parameters};
use crate::error::{EngineError, EngineResult};
use crate::pipeline::DiffBuilder;
use crate::workdir::MoveRetry;

/// Payloads nested deeper than this are only diffed as flat bytes.
pub const MAX_NESTING_DEPTH: usize = 2;

/// Diffs a payload that is itself an archive by running the whole pipeline
/// on the pair.
///
/// The sub-patch becomes the asset of an `ApplyNestedDiff` recipe. Each
/// level works on a strictly smaller payload and the depth is capped by
/// [`MAX_NESTING_DEPTH`], so recursion always ends. Payloads that are not
/// archives simply produce no delta.
#[derive(Clone, Debug)]
pub struct NestedDeltaBuilder {
    config: DiffConfig,
    depth: usize,
    min_size: u64,
    max_size: u64,
    files: AssetFiles,
}

impl NestedDeltaBuilder {
    /// Builder for payloads of a build running at nesting `depth`.
    #[must_use]
    pub fn new(config: &DiffConfig, depth: usize) -> Self {
        let mut nested = config.clone();
        nested.keep_working_folder = false;
        nested.threads = None;
        nested.not_diffable_threshold = u64::MAX;
        Self {
            min_size: config.delta.nested_min_size,
            max_size: config.delta.nested_max_size,
            files: AssetFiles {
                bad_markers: config.delta.bad_delta_markers,
                retry: MoveRetry::new(config.move_retries, config.move_retry_backoff_ms),
            },
            config: nested,
            depth,
        }
    }

    fn run_nested(&self, job: &DeltaJob<'_>, output: &Path) -> EngineResult<bool> {
        let work = sibling_folder(job, "nested");
        let params = Parameters {
            source: job.source_path.to_path_buf(),
            target: job.target_path.to_path_buf(),
            output: output.to_path_buf(),
            log_folder: work.join("log"),
            working_folder: work.join("work"),
            recompressed_target: None,
            signing_command: None,
        };

        let outcome = DiffBuilder::new(params, self.config.clone())
            .at_depth(self.depth + 1)
            .with_cancellation(job.cancel.clone())
            .run();
        if let Err(err) = fs::remove_dir_all(&work) {
            debug!(target: "diffgen::delta", path = %work.display(), error = %err, "nested working folder left behind");
        }

        match outcome {
            Ok(outcome) => {
                debug!(
                    target: "diffgen::delta",
                    name = %job.plan.name,
                    bytes = outcome.patch_size,
                    depth = self.depth + 1,
                    "nested diff built"
                );
                Ok(true)
            }
            Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
            Err(err) => {
                debug!(target: "diffgen::delta", name = %job.plan.name, error = %err, "payload is not nested-diffable");
                Ok(false)
            }
        }
    }
}

impl DeltaBuilder for NestedDeltaBuilder {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn accepts(&self, plan: &DeltaPlan) -> bool {
        let length = plan.target.length();
        self.depth < MAX_NESTING_DEPTH && length >= self.min_size && length <= self.max_size
    }

    fn build(&self, job: &DeltaJob<'_>) -> EngineResult<Option<DeltaEntry>> {
        let staged = self
            .files
            .stage(job, self.name(), |output| self.run_nested(job, output))?;

        let Some((path, asset)) = staged else {
            return Ok(None);
        };
        let recipe = Recipe::nested_diff(job.plan.target.clone(), asset, job.plan.source.clone())?;
        Ok(Some(DeltaEntry {
            builder: self.name().to_string(),
            path,
            recipe,
        }))
    }
}

fn sibling_folder(job: &DeltaJob<'_>, builder: &str) -> std::path::PathBuf {
    let mut name = asset_path(job.folder, job.plan, builder).into_os_string();
    name.push(".work");
    name.into()
}
