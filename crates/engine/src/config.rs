//! Run configuration and per-run parameters.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use compress::zstd::DeltaParameters;
use logging::Verbosity;

use crate::error::{EngineError, EngineResult};
use crate::tools::resolve_binary;

const MIB: u64 = 1024 * 1024;

/// Paths of the external tools a run may need.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ToolPaths {
    /// Binary diff tool, invoked as `bsdiff <source> <target> <delta>`.
    pub bsdiff: PathBuf,
    /// Its inverse, invoked as `bspatch <source> <target> <delta>`.
    pub bspatch: PathBuf,
    /// Target recompression tool, only needed with a recompressed target.
    pub recompress: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            bsdiff: PathBuf::from("bsdiff"),
            bspatch: PathBuf::from("bspatch"),
            recompress: PathBuf::from("recompress"),
        }
    }
}

/// Size gates and parameters for delta builders.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DeltaConfig {
    /// Targets smaller than this are not worth a delta.
    pub min_size: u64,
    /// Largest target the tool and zstd builders accept.
    pub max_size: u64,
    /// Smallest payload the nested-archive builder recurses into.
    pub nested_min_size: u64,
    /// Largest payload the nested-archive builder recurses into.
    pub nested_max_size: u64,
    /// zstd level for dictionary deltas.
    pub zstd_level: i32,
    /// zstd window log for dictionary deltas.
    pub zstd_window_log: u32,
    /// Record failed pairings so later runs skip them.
    pub bad_delta_markers: bool,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        let zstd = DeltaParameters::default();
        Self {
            min_size: 513,
            max_size: 250 * MIB,
            nested_min_size: MIB,
            nested_max_size: 10 * 1024 * MIB,
            zstd_level: zstd.level,
            zstd_window_log: zstd.window_log,
            bad_delta_markers: true,
        }
    }
}

impl DeltaConfig {
    /// zstd parameters for building and applying dictionary deltas.
    #[must_use]
    pub const fn zstd_parameters(&self) -> DeltaParameters {
        DeltaParameters {
            level: self.zstd_level,
            window_log: self.zstd_window_log,
        }
    }
}

/// Tunables for a diff build.
///
/// Every field has a default, so a JSON config file only needs to name
/// the values it changes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DiffConfig {
    /// Fail as not diffable when more bytes than this would fall back to the
    /// remainder.
    pub not_diffable_threshold: u64,
    /// Leave the working folder in place after a successful run.
    pub keep_working_folder: bool,
    /// Allow target forward recipes (recompression, concatenation) in the diff.
    pub use_copy_target_recipes: bool,
    /// Worker threads for parallel stages; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// External tools.
    pub tools: ToolPaths,
    /// Delta builder settings.
    pub delta: DeltaConfig,
    /// Attempts for renames that hit transient errors.
    pub move_retries: u32,
    /// Pause between rename attempts.
    pub move_retry_backoff_ms: u64,
    /// Logging level used when the CLI does not override it.
    pub verbosity: Verbosity,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            not_diffable_threshold: u64::MAX,
            keep_working_folder: false,
            use_copy_target_recipes: true,
            threads: None,
            tools: ToolPaths::default(),
            delta: DeltaConfig::default(),
            move_retries: 5,
            move_retry_backoff_ms: 1000,
            verbosity: Verbosity::Normal,
        }
    }
}

impl DiffConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text =
            fs::read_to_string(path).map_err(|err| EngineError::io("read config", path, err))?;
        serde_json::from_str(&text).map_err(|err| {
            EngineError::InvalidParameters(vec![ValidationIssue::InvalidConfig {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }])
        })
    }
}

/// Per-run input and output locations.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Parameters {
    /// Archive the device already has.
    pub source: PathBuf,
    /// Archive the device should end up with.
    pub target: PathBuf,
    /// Patch file to write.
    pub output: PathBuf,
    /// Folder for the run log and diagnostic documents.
    pub log_folder: PathBuf,
    /// Folder for intermediate state and stage cookies.
    pub working_folder: PathBuf,
    /// When set, the target is recompressed into this file first.
    pub recompressed_target: Option<PathBuf>,
    /// Signing command handed to the recompression tool.
    pub signing_command: Option<String>,
}

/// A problem that prevents a run from starting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationIssue {
    /// A required parameter is empty.
    MissingParameter(&'static str),
    /// An input file does not exist.
    MissingFile {
        /// Parameter name.
        parameter: &'static str,
        /// Path given.
        path: PathBuf,
    },
    /// A required executable was not found.
    MissingBinary {
        /// Tool role.
        tool: &'static str,
        /// Path or name given.
        path: PathBuf,
    },
    /// A config file could not be parsed.
    InvalidConfig {
        /// Config file path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
}

impl ValidationIssue {
    /// Returns `true` for missing executables, which get their own exit status.
    #[must_use]
    pub const fn is_missing_binary(&self) -> bool {
        matches!(self, Self::MissingBinary { .. })
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter(name) => write!(f, "missing parameter: {name}"),
            Self::MissingFile { parameter, path } => {
                write!(f, "{parameter} file does not exist: {}", path.display())
            }
            Self::MissingBinary { tool, path } => {
                write!(f, "{tool} binary not found: {}", path.display())
            }
            Self::InvalidConfig { path, reason } => {
                write!(f, "invalid config file {}: {reason}", path.display())
            }
        }
    }
}

impl Parameters {
    /// Lists every problem that would stop a run, in parameter order.
    ///
    /// The recompression tool is only required when a recompressed target is
    /// requested. Delta tools are optional: a missing `bsdiff` only means its
    /// builder never produces a delta.
    #[must_use]
    pub fn validate(&self, config: &DiffConfig) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let required = [
            ("source", &self.source),
            ("target", &self.target),
            ("output", &self.output),
            ("log folder", &self.log_folder),
            ("working folder", &self.working_folder),
        ];
        for (name, path) in required {
            if path.as_os_str().is_empty() {
                issues.push(ValidationIssue::MissingParameter(name));
            }
        }

        for (name, path) in [("source", &self.source), ("target", &self.target)] {
            if !path.as_os_str().is_empty() && !path.is_file() {
                issues.push(ValidationIssue::MissingFile {
                    parameter: name,
                    path: path.clone(),
                });
            }
        }

        if self.recompressed_target.is_some() && resolve_binary(&config.tools.recompress).is_none()
        {
            issues.push(ValidationIssue::MissingBinary {
                tool: "recompress",
                path: config.tools.recompress.clone(),
            });
        }

        issues
    }

    /// Turns validation issues into the matching error, if there are any.
    pub fn check(&self, config: &DiffConfig) -> EngineResult<()> {
        let issues = self.validate(config);
        if issues.is_empty() {
            Ok(())
        } else if issues.iter().all(ValidationIssue::is_missing_binary) {
            Err(EngineError::MissingBinaries(issues))
        } else {
            Err(EngineError::InvalidParameters(issues))
        }
    }
}
