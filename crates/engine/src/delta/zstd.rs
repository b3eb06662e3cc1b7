//! In-process dictionary deltas with zstd.

use std::fs;

use compress::zstd::{DeltaParameters, delta_compress};
use items::{DeltaFormat, Recipe};

use super::{AssetFiles, DeltaBuilder, DeltaEntry, DeltaJob, DeltaPlan};
use crate::config::DiffConfig;
use crate::error::{EngineError, EngineResult};
use crate::workdir::MoveRetry;

/// Compresses the target with the basis as a raw zstd dictionary.
#[derive(Clone, Debug)]
pub struct ZstdDeltaBuilder {
    params: DeltaParameters,
    min_size: u64,
    max_size: u64,
    files: AssetFiles,
}

impl ZstdDeltaBuilder {
    /// Builder using the configured level and window.
    #[must_use]
    pub fn new(config: &DiffConfig) -> Self {
        Self {
            params: config.delta.zstd_parameters(),
            min_size: config.delta.min_size,
            max_size: config.delta.max_size,
            files: AssetFiles {
                bad_markers: config.delta.bad_delta_markers,
                retry: MoveRetry::new(config.move_retries, config.move_retry_backoff_ms),
            },
        }
    }
}

impl DeltaBuilder for ZstdDeltaBuilder {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn accepts(&self, plan: &DeltaPlan) -> bool {
        let length = plan.target.length();
        length >= self.min_size && length <= self.max_size && plan.source.length() <= self.max_size
    }

    fn build(&self, job: &DeltaJob<'_>) -> EngineResult<Option<DeltaEntry>> {
        let staged = self.files.stage(job, self.name(), |output| {
            let basis = fs::read(job.source_path)
                .map_err(|err| EngineError::io("read", job.source_path, err))?;
            let target = fs::read(job.target_path)
                .map_err(|err| EngineError::io("read", job.target_path, err))?;
            job.cancel.check()?;
            let delta = delta_compress(&basis, &target, self.params)?;
            fs::write(output, delta).map_err(|err| EngineError::io("write", output, err))?;
            Ok(true)
        })?;

        let Some((path, asset)) = staged else {
            return Ok(None);
        };
        let recipe = Recipe::apply_delta(
            DeltaFormat::Zstd,
            job.plan.target.clone(),
            asset,
            job.plan.source.clone(),
        )?;
        Ok(Some(DeltaEntry {
            builder: self.name().to_string(),
            path,
            recipe,
        }))
    }
}
