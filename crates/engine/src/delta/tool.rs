//! Deltas produced by an external binary diff tool.

use std::path::PathBuf;

use items::{DeltaFormat, Recipe};

use super::{AssetFiles, DeltaBuilder, DeltaEntry, DeltaJob, DeltaPlan};
use crate::config::{DeltaConfig, DiffConfig};
use crate::error::EngineResult;
use crate::process::{ToolCommand, timeout_for};
use crate::workdir::MoveRetry;

/// Runs `bsdiff <source> <target> <delta>` with a size-scaled timeout.
///
/// A non-zero exit or a timeout means no delta for the pairing.
#[derive(Clone, Debug)]
pub struct ToolDeltaBuilder {
    program: PathBuf,
    min_size: u64,
    max_size: u64,
    files: AssetFiles,
}

impl ToolDeltaBuilder {
    /// Builder for the configured `bsdiff`.
    #[must_use]
    pub fn bsdiff(config: &DiffConfig) -> Self {
        Self::with_program(config.tools.bsdiff.clone(), &config.delta, config)
    }

    /// Builder running `program`, which must follow the `bsdiff` calling
    /// convention and output format.
    #[must_use]
    pub fn with_program(program: PathBuf, delta: &DeltaConfig, config: &DiffConfig) -> Self {
        Self {
            program,
            min_size: delta.min_size,
            max_size: delta.max_size,
            files: AssetFiles {
                bad_markers: delta.bad_delta_markers,
                retry: MoveRetry::new(config.move_retries, config.move_retry_backoff_ms),
            },
        }
    }
}

impl DeltaBuilder for ToolDeltaBuilder {
    fn name(&self) -> &'static str {
        "bsdiff"
    }

    fn accepts(&self, plan: &DeltaPlan) -> bool {
        let length = plan.target.length();
        length >= self.min_size && length <= self.max_size && plan.source.length() <= self.max_size
    }

    fn build(&self, job: &DeltaJob<'_>) -> EngineResult<Option<DeltaEntry>> {
        let timeout = timeout_for(job.plan.source.length() + job.plan.target.length());
        let staged = self.files.stage(job, self.name(), |output| {
            let outcome = ToolCommand::new(&self.program)
                .arg(job.source_path)
                .arg(job.target_path)
                .arg(output)
                .timeout(timeout)
                .run(job.cancel)?;
            Ok(outcome.success())
        })?;

        let Some((path, asset)) = staged else {
            return Ok(None);
        };
        let recipe = Recipe::apply_delta(
            DeltaFormat::BsDiff,
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

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("fake-bsdiff.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    fn plan() -> DeltaPlan {
        DeltaPlan {
            target: items::ItemDefinition::from_bytes(&[5u8; 2000]),
            source: items::ItemDefinition::from_bytes(&[6u8; 2000]),
            name: "payload".to_string(),
        }
    }

    #[test]
    fn tool_output_becomes_a_bsdiff_recipe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let program = script(dir.path(), "printf 'tiny patch' > \"$3\"");
        let config = DiffConfig::default();
        let builder = ToolDeltaBuilder::with_program(program, &config.delta, &config);
        let plan = plan();
        let cancel = CancellationToken::new();
        let job = DeltaJob {
            plan: &plan,
            source_path: std::path::Path::new("/dev/null"),
            target_path: std::path::Path::new("/dev/null"),
            folder: dir.path(),
            cancel: &cancel,
        };

        let entry = builder.build(&job).expect("build").expect("delta");
        assert_eq!(entry.recipe.name(), "BsDiffDelta");
        assert_eq!(fs::read(&entry.path).expect("read"), b"tiny patch");
    }

    #[test]
    fn failing_tool_yields_no_delta() {
        let dir = tempfile::tempdir().expect("tempdir");
        let program = script(dir.path(), "exit 1");
        let config = DiffConfig::default();
        let builder = ToolDeltaBuilder::with_program(program, &config.delta, &config);
        let plan = plan();
        let cancel = CancellationToken::new();
        let job = DeltaJob {
            plan: &plan,
            source_path: std::path::Path::new("/dev/null"),
            target_path: std::path::Path::new("/dev/null"),
            folder: dir.path(),
            cancel: &cancel,
        };
        assert!(builder.build(&job).expect("build").is_none());
    }

    #[test]
    fn small_targets_are_not_attempted() {
        let config = DiffConfig::default();
        let builder = ToolDeltaBuilder::bsdiff(&config);
        let mut plan = plan();
        plan.target = items::ItemDefinition::from_bytes(&[0u8; 512]);
        assert!(!builder.accepts(&plan));
    }
}
