//! Running external tools with a timeout.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::{EngineError, EngineResult};

/// Shortest timeout given to any tool run.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest timeout given to any tool run.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Input size that earns one minute of run time.
pub const BYTES_PER_MINUTE: u64 = 50 * 1024 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Timeout for a tool that processes `bytes` of input.
///
/// One minute per 50 MiB, clamped to [`MIN_TIMEOUT`]..=[`MAX_TIMEOUT`].
#[must_use]
pub fn timeout_for(bytes: u64) -> Duration {
    let millis = u128::from(bytes) * 60_000 / u128::from(BYTES_PER_MINUTE);
    let scaled = Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX));
    scaled.clamp(MIN_TIMEOUT, MAX_TIMEOUT)
}

/// How a tool run ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ToolOutcome {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The process was killed after the timeout elapsed.
    TimedOut(Duration),
}

impl ToolOutcome {
    /// Returns `true` for a zero exit status.
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(status) if status.success())
    }

    /// Human-readable description for logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Exited(status) => status.to_string(),
            Self::TimedOut(after) => format!("timed out after {}s", after.as_secs()),
        }
    }
}

/// One invocation of an external program.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
}

impl ToolCommand {
    /// Prepares `program` with the minimum timeout and discarded output.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: MIN_TIMEOUT,
            stdout: None,
            stderr: None,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Captures standard output and error into files.
    #[must_use]
    pub fn capture(mut self, stdout: impl Into<PathBuf>, stderr: impl Into<PathBuf>) -> Self {
        self.stdout = Some(stdout.into());
        self.stderr = Some(stderr.into());
        self
    }

    /// Program being run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the program to completion, the timeout, or cancellation.
    ///
    /// A process still running when the timeout elapses or `cancel` fires is
    /// killed. Cancellation is reported as [`EngineError::Cancelled`]; a
    /// timeout is an ordinary [`ToolOutcome`].
    pub fn run(&self, cancel: &CancellationToken) -> EngineResult<ToolOutcome> {
        cancel.check()?;
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        command.stdout(redirect(self.stdout.as_deref())?);
        command.stderr(redirect(self.stderr.as_deref())?);

        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|err| EngineError::io("start", &self.program, err))?;
        debug!(
            target: "diffgen::process",
            program = %self.program.display(),
            pid = child.id(),
            timeout_secs = self.timeout.as_secs(),
            "started tool"
        );

        loop {
            if let Some(status) = child.try_wait()? {
                debug!(
                    target: "diffgen::process",
                    program = %self.program.display(),
                    %status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool exited"
                );
                return Ok(ToolOutcome::Exited(status));
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                warn!(target: "diffgen::process", program = %self.program.display(), "killed on cancellation");
                return Err(EngineError::Cancelled);
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    target: "diffgen::process",
                    program = %self.program.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "killed after timeout"
                );
                return Ok(ToolOutcome::TimedOut(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn redirect(path: Option<&Path>) -> EngineResult<Stdio> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|err| EngineError::io("create", path, err))?;
            Ok(Stdio::from(file))
        }
        None => Ok(Stdio::null()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_scales_with_input_and_is_clamped() {
        assert_eq!(timeout_for(0), MIN_TIMEOUT);
        assert_eq!(timeout_for(BYTES_PER_MINUTE), Duration::from_secs(60));
        assert_eq!(timeout_for(5 * BYTES_PER_MINUTE), Duration::from_secs(300));
        assert_eq!(timeout_for(u64::MAX), MAX_TIMEOUT);
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_is_reported() {
        let cancel = CancellationToken::new();
        let ok = ToolCommand::new("sh").arg("-c").arg("exit 0").run(&cancel).expect("run");
        assert!(ok.success());
        let failed = ToolCommand::new("sh").arg("-c").arg("exit 3").run(&cancel).expect("run");
        assert!(!failed.success());
    }

    #[cfg(unix)]
    #[test]
    fn slow_tools_are_killed() {
        let outcome = ToolCommand::new("sh")
            .arg("-c")
            .arg("sleep 5")
            .timeout(Duration::from_millis(100))
            .run(&CancellationToken::new())
            .expect("run");
        assert!(matches!(outcome, ToolOutcome::TimedOut(_)));
        assert!(outcome.describe().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn output_is_captured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("tool.stdout.txt");
        let err = dir.path().join("tool.stderr.txt");
        ToolCommand::new("sh")
            .arg("-c")
            .arg("echo hello; echo oops >&2")
            .capture(&out, &err)
            .run(&CancellationToken::new())
            .expect("run");
        assert_eq!(std::fs::read_to_string(out).expect("stdout"), "hello\n");
        assert_eq!(std::fs::read_to_string(err).expect("stderr"), "oops\n");
    }

    #[test]
    fn cancelled_token_prevents_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ToolCommand::new("never-started").run(&cancel).expect_err("cancelled");
        assert!(matches!(err, EngineError::Cancelled));
    }
}
