//! Argument parsing and command execution.

mod command;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use clap::ArgMatches;
use clap::error::ErrorKind;
use tracing::error;

use engine::{DiffBuilder, DiffConfig, EngineError, Parameters, ValidationIssue};
use logging::{LoggingConfig, Verbosity, init_tracing};

pub(crate) use command::clap_command;
use command::OPERANDS;

/// Program name used when the argument list is empty.
pub const PROGRAM_NAME: &str = "diffgen";

/// Exit status for a completed build.
pub const EXIT_OK: i32 = 0;

/// Exit status for unusable arguments, missing files or missing tools.
pub const EXIT_INVALID_PARAMETERS: i32 = 1;

/// Parsed command line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedArgs {
    /// Positional operands in order; absent ones are empty.
    pub operands: Vec<OsString>,
    /// `--config`.
    pub config: Option<PathBuf>,
    /// `--keep-working-folder`.
    pub keep_working_folder: bool,
    /// `--not-diffable-threshold`.
    pub not_diffable_threshold: Option<u64>,
    /// `--no-target-recipes`.
    pub no_target_recipes: bool,
    /// `--threads`.
    pub threads: Option<usize>,
    /// `--bsdiff`.
    pub bsdiff: Option<PathBuf>,
    /// `--bspatch`.
    pub bspatch: Option<PathBuf>,
    /// `--recompress`.
    pub recompress: Option<PathBuf>,
    /// Number of `-v` flags.
    pub verbose: u8,
    /// `-q`.
    pub quiet: bool,
    /// `--dump`.
    pub dump: Option<PathBuf>,
}

impl ParsedArgs {
    fn operand(&self, index: usize) -> Option<&OsString> {
        self.operands.get(index).filter(|value| !value.is_empty())
    }

    /// Per-run paths from the operands.
    #[must_use]
    pub fn parameters(&self) -> Parameters {
        let path = |index| self.operand(index).map(PathBuf::from).unwrap_or_default();
        Parameters {
            source: path(0),
            target: path(1),
            output: path(2),
            log_folder: path(3),
            working_folder: path(4),
            recompressed_target: self.operand(5).map(PathBuf::from),
            signing_command: self
                .operand(6)
                .map(|value| value.to_string_lossy().into_owned()),
        }
    }

    /// The config file (or defaults) with command-line overrides applied.
    pub fn diff_config(&self) -> Result<DiffConfig, EngineError> {
        let mut config = match &self.config {
            Some(path) => DiffConfig::load(path)?,
            None => DiffConfig::default(),
        };
        if self.keep_working_folder {
            config.keep_working_folder = true;
        }
        if let Some(threshold) = self.not_diffable_threshold {
            config.not_diffable_threshold = threshold;
        }
        if self.no_target_recipes {
            config.use_copy_target_recipes = false;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if let Some(program) = &self.bsdiff {
            config.tools.bsdiff.clone_from(program);
        }
        if let Some(program) = &self.bspatch {
            config.tools.bspatch.clone_from(program);
        }
        if let Some(program) = &self.recompress {
            config.tools.recompress.clone_from(program);
        }
        config.verbosity = self.verbosity(config.verbosity);
        Ok(config)
    }

    /// `-q` wins, each `-v` raises the level above info, otherwise the
    /// configured level applies.
    #[must_use]
    pub fn verbosity(&self, configured: Verbosity) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose > 0 {
            Verbosity::from_verbose_level(self.verbose.saturating_add(1))
        } else {
            configured
        }
    }
}

/// Parses `arguments`, including the program name.
pub fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let matches = clap_command(PROGRAM_NAME).try_get_matches_from(arguments)?;
    Ok(parsed_from(&matches))
}

fn parsed_from(matches: &ArgMatches) -> ParsedArgs {
    let path = |name: &str| matches.get_one::<OsString>(name).map(PathBuf::from);
    ParsedArgs {
        operands: OPERANDS
            .iter()
            .map(|name| matches.get_one::<OsString>(name).cloned().unwrap_or_default())
            .collect(),
        config: path("config"),
        keep_working_folder: matches.get_flag("keep-working-folder"),
        not_diffable_threshold: matches.get_one::<u64>("not-diffable-threshold").copied(),
        no_target_recipes: matches.get_flag("no-target-recipes"),
        threads: matches
            .get_one::<u64>("threads")
            .and_then(|count| usize::try_from(*count).ok()),
        bsdiff: path("bsdiff"),
        bspatch: path("bspatch"),
        recompress: path("recompress"),
        verbose: matches.get_count("verbose"),
        quiet: matches.get_flag("quiet"),
        dump: path("dump"),
    }
}

/// Runs the command line and returns the process exit status.
///
/// Invalid parameters and missing tools are listed on `stdout`, one per
/// line; every other failure is reported on `stderr` and mapped through
/// [`EngineError::exit_code`].
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from(PROGRAM_NAME));
    }

    let parsed = match parse_args(args) {
        Ok(parsed) => parsed,
        Err(err) => return report_clap_error(&err, stdout, stderr),
    };

    if let Some(patch) = &parsed.dump {
        return dump(patch, stdout, stderr);
    }

    let config = match parsed.diff_config() {
        Ok(config) => config,
        Err(err) => return report_error(&err, stdout, stderr),
    };
    let params = parsed.parameters();
    let issues = params.validate(&config);
    if !issues.is_empty() {
        return report_issues(&issues, stdout);
    }

    let logging = LoggingConfig {
        verbosity: config.verbosity,
        log_folder: Some(params.log_folder.clone()),
        honor_env: true,
    };
    if let Err(err) = init_tracing(&logging) {
        let _ = writeln!(stderr, "{PROGRAM_NAME}: cannot open the run log: {err}");
        return EngineError::io("open", params.log_folder.clone(), err).exit_code();
    }

    match DiffBuilder::new(params, config).run() {
        Ok(outcome) => {
            let _ = writeln!(
                stdout,
                "{}: {} bytes for a {} byte target",
                outcome.output.display(),
                outcome.patch_size,
                outcome.target_size
            );
            EXIT_OK
        }
        Err(err) => {
            error!(target: "diffgen::pipeline", error = %err, "build failed");
            report_error(&err, stdout, stderr)
        }
    }
}

fn dump<Out: Write, Err: Write>(patch: &std::path::Path, stdout: &mut Out, stderr: &mut Err) -> i32 {
    match patch::dump_json(patch) {
        Ok(text) => {
            let _ = writeln!(stdout, "{text}");
            EXIT_OK
        }
        Err(err) => {
            let _ = writeln!(stderr, "{PROGRAM_NAME}: {}: {err}", patch.display());
            if err.is_format_error() {
                EngineError::Format(err.to_string()).exit_code()
            } else {
                EngineError::from(err).exit_code()
            }
        }
    }
}

fn report_clap_error<Out: Write, Err: Write>(
    err: &clap::Error,
    stdout: &mut Out,
    stderr: &mut Err,
) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{}", err.render());
            EXIT_OK
        }
        _ => {
            let _ = write!(stderr, "{}", err.render());
            EXIT_INVALID_PARAMETERS
        }
    }
}

fn report_issues<Out: Write>(issues: &[ValidationIssue], stdout: &mut Out) -> i32 {
    for issue in issues {
        let _ = writeln!(stdout, "{issue}");
    }
    EXIT_INVALID_PARAMETERS
}

fn report_error<Out: Write, Err: Write>(err: &EngineError, stdout: &mut Out, stderr: &mut Err) -> i32 {
    match err {
        EngineError::InvalidParameters(issues) | EngineError::MissingBinaries(issues) => {
            report_issues(issues, stdout)
        }
        _ => {
            let _ = writeln!(stderr, "{PROGRAM_NAME}: {err}");
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operands_fill_parameters_in_order() {
        let parsed = parse_args(["diffgen", "a", "b", "c", "log", "work", "re", "sign it"])
            .expect("parse");
        let params = parsed.parameters();
        assert_eq!(params.source, PathBuf::from("a"));
        assert_eq!(params.working_folder, PathBuf::from("work"));
        assert_eq!(params.recompressed_target, Some(PathBuf::from("re")));
        assert_eq!(params.signing_command.as_deref(), Some("sign it"));
    }

    #[test]
    fn flags_override_defaults() {
        let parsed = parse_args([
            "diffgen",
            "--keep-working-folder",
            "--not-diffable-threshold",
            "4096",
            "--no-target-recipes",
            "--threads",
            "3",
            "--bsdiff",
            "/opt/bsdiff",
        ])
        .expect("parse");
        let config = parsed.diff_config().expect("config");
        assert!(config.keep_working_folder);
        assert_eq!(config.not_diffable_threshold, 4096);
        assert!(!config.use_copy_target_recipes);
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.tools.bsdiff, PathBuf::from("/opt/bsdiff"));
        assert_eq!(config.tools.bspatch, PathBuf::from("bspatch"));
    }

    #[test]
    fn verbosity_follows_flags_then_config() {
        let quiet = parse_args(["diffgen", "-q"]).expect("parse");
        assert_eq!(quiet.verbosity(Verbosity::Debug), Verbosity::Quiet);
        let loud = parse_args(["diffgen", "-vv"]).expect("parse");
        assert_eq!(loud.verbosity(Verbosity::Normal), Verbosity::Trace);
        let plain = parse_args(["diffgen"]).expect("parse");
        assert_eq!(plain.verbosity(Verbosity::Debug), Verbosity::Debug);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(parse_args(["diffgen", "--threads", "0"]).is_err());
    }

    #[test]
    fn config_file_values_are_overridden_by_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "not_diffable_threshold": 10, "keep_working_folder": true }"#)
            .expect("write config");
        let parsed = parse_args([
            OsString::from("diffgen"),
            OsString::from("--config"),
            path.clone().into_os_string(),
            OsString::from("--not-diffable-threshold"),
            OsString::from("20"),
        ])
        .expect("parse");
        let config = parsed.diff_config().expect("config");
        assert_eq!(config.not_diffable_threshold, 20);
        assert!(config.keep_working_folder);
    }

    #[test]
    fn broken_config_file_is_an_invalid_parameter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").expect("write config");
        let parsed = ParsedArgs {
            config: Some(path),
            ..ParsedArgs::default()
        };
        assert!(matches!(
            parsed.diff_config(),
            Err(EngineError::InvalidParameters(_))
        ));
    }
}
