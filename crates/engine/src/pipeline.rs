//! The staged diff build.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, info_span};

use archive::{ArchiveLoader, ArchiveTokenization};
use patch::{ApplyOptions, ApplySession, CreateSession};

use crate::analysis::check_diffable;
use crate::assembly::{Assembler, SourceClosure};
use crate::blob::Blob;
use crate::cancel::CancellationToken;
use crate::config::{DiffConfig, Parameters};
use crate::delta::{
    DeltaBuilder, DeltaCatalog, DeltaFolders, DeltaRunStats, NestedDeltaBuilder, PlanSelection,
    ToolDeltaBuilder, ZstdDeltaBuilder, create_deltas, select_plans,
};
use crate::diff::{Diff, DiffStats};
use crate::error::{EngineError, EngineResult};
use crate::extract::{ItemExtractor, hash_file};
use crate::inline::write_inline_assets;
use crate::process::{ToolCommand, timeout_for};
use crate::remainder::write_remainder;
use crate::tools::resolve_binary;
use crate::workdir::{MoveRetry, OutputGuard, WorkingFolder};

/// Name of the diff dump written to the log folder.
pub const DIFF_DOCUMENT: &str = "diff.json";

/// What a successful build produced.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffOutcome {
    /// The committed patch.
    pub output: PathBuf,
    /// Patch size in bytes.
    pub patch_size: u64,
    /// Target archive size in bytes.
    pub target_size: u64,
    /// Target bytes neither the source, the target's recipes nor a delta
    /// accounts for.
    pub undiffable_bytes: u64,
    /// Delta builder counters.
    #[serde(skip)]
    pub deltas: DeltaRunStats,
    /// Inline asset blob size.
    pub inline_bytes: u64,
    /// Remainder blob size before compression.
    pub remainder_bytes: u64,
    /// Recipe totals of the final diff.
    pub stats: DiffStats,
}

/// Runs every stage of a build from two archives to a verified patch.
///
/// Stages whose cookie is present in the working folder reuse the state
/// they left behind. Every stage starts with a cancellation check.
pub struct DiffBuilder {
    params: Parameters,
    config: DiffConfig,
    loader: ArchiveLoader,
    cancel: CancellationToken,
    depth: usize,
}

struct Inputs {
    source_path: PathBuf,
    target_path: PathBuf,
    source: ArchiveTokenization,
    target: ArchiveTokenization,
}

impl DiffBuilder {
    /// Prepares a build with the default archive parsers.
    #[must_use]
    pub fn new(params: Parameters, config: DiffConfig) -> Self {
        Self {
            params,
            config,
            loader: ArchiveLoader::with_default_parsers(),
            cancel: CancellationToken::new(),
            depth: 0,
        }
    }

    /// Replaces the archive loader.
    #[must_use]
    pub fn with_loader(mut self, loader: ArchiveLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Uses `cancel` for every stage and child process.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) const fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Token that cancels this build.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Validates the parameters and runs the build.
    ///
    /// A dedicated thread pool is used when the config sets `threads`.
    pub fn run(&self) -> EngineResult<DiffOutcome> {
        self.params.check(&self.config)?;
        match self.config.threads {
            Some(threads) if self.depth == 0 => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("diffgen-{index}"))
                    .build()
                    .map_err(|err| EngineError::Fatal(format!("cannot start thread pool: {err}")))?;
                pool.install(|| self.run_stages())
            }
            _ => self.run_stages(),
        }
    }

    fn run_stages(&self) -> EngineResult<DiffOutcome> {
        let span = info_span!(target: "diffgen::pipeline", "diff", depth = self.depth);
        let _entered = span.enter();

        let work = WorkingFolder::open(&self.params.working_folder)?;
        let log_folder = &self.params.log_folder;
        fs::create_dir_all(log_folder).map_err(|err| EngineError::io("create", log_folder, err))?;

        let target_path = self.recompress(&work)?;
        let inputs = self.tokenize(&work, target_path)?;

        let closure = SourceClosure::compute(&inputs.source);

        let mut source_items = ItemExtractor::open(&inputs.source_path, &inputs.source)?;
        let mut target_items = ItemExtractor::open(&inputs.target_path, &inputs.target)?;

        let (catalog, deltas) =
            self.deltas(&work, &inputs, &closure, &mut source_items, &mut target_items)?;

        self.stage("assemble")?;
        let mut diff = Assembler::new(&inputs.source, &inputs.target, &closure)
            .use_target_recipes(self.config.use_copy_target_recipes)
            .with_cancellation(self.cancel.clone())
            .assemble(&catalog)?;

        self.stage("analyze")?;
        let undiffable = check_diffable(&diff, self.config.not_diffable_threshold)?;

        self.stage("inline-assets")?;
        let inline = write_inline_assets(&mut diff, &catalog, work.root())?;
        self.stage("remainder")?;
        let remainder = write_remainder(&mut diff, &mut target_items, work.root())?;
        drop(source_items);
        drop(target_items);

        let provided: Vec<_> = inline.iter().chain(remainder.iter()).map(|blob| &blob.item).collect();
        let unresolved = diff.unresolved(&provided);
        if let Some(item) = unresolved.first() {
            return Err(EngineError::Fatal(format!(
                "{} target items have no recipe, first {item}",
                unresolved.len()
            )));
        }
        diff.write_json(&log_folder.join(DIFF_DOCUMENT))?;

        self.stage("write")?;
        let guard = OutputGuard::new(&self.params.output)?;
        let patch_size = self.write_patch(&diff, inline.as_ref(), remainder.as_ref(), guard.staging_path())?;

        self.stage("verify")?;
        self.verify(&inputs, patch_size, guard.staging_path())?;
        guard.commit(self.move_retry())?;

        let outcome = DiffOutcome {
            output: self.params.output.clone(),
            patch_size,
            target_size: inputs.target.archive_item().length(),
            undiffable_bytes: undiffable,
            deltas,
            inline_bytes: inline.as_ref().map_or(0, Blob::len),
            remainder_bytes: remainder.as_ref().map_or(0, Blob::len),
            stats: diff.stats(),
        };
        self.log_outcome(&outcome);

        if self.config.keep_working_folder {
            debug!(target: "diffgen::pipeline", path = %work.root().display(), "keeping working folder");
        } else {
            work.remove()?;
        }
        Ok(outcome)
    }

    fn stage(&self, name: &'static str) -> EngineResult<()> {
        self.cancel.check()?;
        debug!(target: "diffgen::pipeline", stage = name, "stage started");
        Ok(())
    }

    fn move_retry(&self) -> MoveRetry {
        MoveRetry::new(self.config.move_retries, self.config.move_retry_backoff_ms)
    }

    /// Runs the recompression tool when a recompressed target is requested
    /// and returns the archive to use as the target.
    fn recompress(&self, work: &WorkingFolder) -> EngineResult<PathBuf> {
        let Some(recompressed) = &self.params.recompressed_target else {
            return Ok(self.params.target.clone());
        };
        self.stage("recompress")?;
        if work.has_cookie("recompress") && recompressed.is_file() {
            info!(target: "diffgen::pipeline", path = %recompressed.display(), "reusing recompressed target");
            return Ok(recompressed.clone());
        }

        let size = fs::metadata(&self.params.target)
            .map_err(|err| EngineError::io("stat", &self.params.target, err))?
            .len();
        let mut command = ToolCommand::new(&self.config.tools.recompress)
            .arg("swu")
            .arg(&self.params.target)
            .arg(recompressed)
            .timeout(timeout_for(size))
            .capture(
                self.params.log_folder.join("recompress.stdout.txt"),
                self.params.log_folder.join("recompress.stderr.txt"),
            );
        if let Some(signing) = &self.params.signing_command {
            command = command.arg(signing);
        }

        let outcome = command.run(&self.cancel)?;
        if !outcome.success() || !recompressed.is_file() {
            return Err(EngineError::Tool {
                program: command.program().to_path_buf(),
                status: outcome.describe(),
            });
        }
        work.write_cookie("recompress")?;
        info!(target: "diffgen::pipeline", path = %recompressed.display(), "target recompressed");
        Ok(recompressed.clone())
    }

    fn tokenize(&self, work: &WorkingFolder, target_path: PathBuf) -> EngineResult<Inputs> {
        self.stage("tokenize")?;
        let source_path = self.params.source.clone();
        let (source, target) = rayon::join(
            || self.tokenize_one(work, "source", &source_path),
            || self.tokenize_one(work, "target", &target_path),
        );
        Ok(Inputs {
            source_path,
            target_path,
            source: source?,
            target: target?,
        })
    }

    fn tokenize_one(&self, work: &WorkingFolder, name: &str, path: &Path) -> EngineResult<ArchiveTokenization> {
        let item = hash_file(path)?;
        work.bind_input(name, &item)?;

        let json = work.file(&format!("{name}.json"));
        let tokens = if work.has_cookie(name) && json.is_file() {
            let tokens = ArchiveTokenization::read_json(&json)?;
            if *tokens.archive_item() != item {
                return Err(EngineError::BadWorkingFolder {
                    path: json,
                    reason: format!("{name} tokenization describes {}", tokens.archive_item()),
                });
            }
            debug!(target: "diffgen::pipeline", input = name, "reusing tokenization");
            tokens
        } else {
            self.cancel.check()?;
            let tokens = self.loader.load_path(path)?;
            tokens.write_json(&json)?;
            work.write_cookie(name)?;
            tokens
        };

        let copy = self.params.log_folder.join(format!("{name}.archive.json"));
        fs::copy(&json, &copy).map_err(|err| EngineError::io("copy", &copy, err))?;
        info!(
            target: "diffgen::pipeline",
            input = name,
            format = tokens.format(),
            chunks = tokens.chunk_count(),
            payload = tokens.payload().len(),
            bytes = item.length(),
            "tokenized"
        );
        Ok(tokens)
    }

    fn builders(&self) -> Vec<Box<dyn DeltaBuilder>> {
        let mut builders: Vec<Box<dyn DeltaBuilder>> = Vec::new();
        let tools = &self.config.tools;
        if resolve_binary(&tools.bsdiff).is_some() && resolve_binary(&tools.bspatch).is_some() {
            builders.push(Box::new(ToolDeltaBuilder::bsdiff(&self.config)));
        } else {
            debug!(target: "diffgen::delta", bsdiff = %tools.bsdiff.display(), "bsdiff unavailable");
        }
        builders.push(Box::new(ZstdDeltaBuilder::new(&self.config)));
        builders.push(Box::new(NestedDeltaBuilder::new(&self.config, self.depth)));
        builders
    }

    fn deltas(
        &self,
        work: &WorkingFolder,
        inputs: &Inputs,
        closure: &SourceClosure,
        source_items: &mut ItemExtractor,
        target_items: &mut ItemExtractor,
    ) -> EngineResult<(DeltaCatalog, DeltaRunStats)> {
        self.stage("plan")?;
        let folder = work.subfolder("deltas")?;
        let catalog_path = work.file("deltas.json");

        if work.has_cookie("deltas") && catalog_path.is_file() {
            let catalog = DeltaCatalog::read_json(&catalog_path)?;
            info!(target: "diffgen::delta", targets = catalog.len(), "reusing delta catalog");
            let stats = DeltaRunStats {
                targets: catalog.len(),
                ..DeltaRunStats::default()
            };
            return Ok((catalog, stats));
        }

        let selection: PlanSelection = select_plans(&inputs.source, &inputs.target, closure);
        selection.write_to(&folder)?;
        info!(
            target: "diffgen::delta",
            plans = selection.plans.len(),
            new = selection.new_items.len(),
            identical = selection.identical_items.len(),
            different = selection.different_items.len(),
            "selected delta candidates"
        );

        self.stage("deltas")?;
        let source_folder = work.subfolder("source_items")?;
        let target_folder = work.subfolder("target_items")?;
        let folders = DeltaFolders {
            source_items: &source_folder,
            target_items: &target_folder,
            assets: &folder,
        };
        let (catalog, stats) = create_deltas(
            &selection.plans,
            &self.builders(),
            source_items,
            target_items,
            folders,
            &self.cancel,
        )?;
        catalog.write_json(&catalog_path)?;
        work.write_cookie("deltas")?;
        Ok((catalog, stats))
    }

    fn write_patch(
        &self,
        diff: &Diff,
        inline: Option<&Blob>,
        remainder: Option<&Blob>,
        output: &Path,
    ) -> EngineResult<u64> {
        let mut session = CreateSession::new(diff.target().clone(), diff.source().clone());
        session.add_recipes(diff.recipes().cloned());
        if let Some(blob) = inline {
            session.set_inline_assets(&blob.path, blob.item.clone());
        }
        if let Some(blob) = remainder {
            session.set_remainder(&blob.path, blob.item.clone());
        }
        Ok(session.write(output)?)
    }

    fn verify(&self, inputs: &Inputs, patch_size: u64, staged: &Path) -> EngineResult<()> {
        let target = inputs.target.archive_item();
        if patch_size >= target.length() {
            return Err(EngineError::Verification(format!(
                "{patch_size} byte patch is not smaller than the {} byte target",
                target.length()
            )));
        }

        let options = ApplyOptions {
            bspatch: self.config.tools.bspatch.clone(),
            zstd_delta: self.config.delta.zstd_parameters(),
        };
        let rebuilt = ApplySession::open(staged, &inputs.source_path, options)
            .and_then(|mut session| session.apply())
            .map_err(|err| EngineError::Verification(format!("patch does not apply: {err}")))?;
        target
            .verify(&rebuilt)
            .map_err(|err| EngineError::Verification(format!("patch rebuilds the wrong target: {err}")))?;
        info!(target: "diffgen::pipeline", bytes = patch_size, "patch verified");
        Ok(())
    }

    fn log_outcome(&self, outcome: &DiffOutcome) {
        for (name, tally) in &outcome.stats.recipes {
            debug!(target: "diffgen::pipeline", recipe = name, count = tally.count, bytes = tally.bytes, "recipe totals");
        }
        info!(
            target: "diffgen::pipeline",
            output = %outcome.output.display(),
            patch = outcome.patch_size,
            target_bytes = outcome.target_size,
            deltas = outcome.deltas.targets,
            inline = outcome.inline_bytes,
            remainder = outcome.remainder_bytes,
            duplicates = outcome.stats.duplicate_hits,
            "diff complete"
        );
    }
}
