// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process launching.
//!
//! Every house-keeping command eventually hands its work to some standard
//! system utility, e.g., rsync, pg_dump, sha1sum, journalctl, etc. This module
//! provides the one piece of machinery they all share: spawn a program, let
//! it run to completion, and report how it finished as an [`ExitCode`].
//!
//! # Launch Modes
//!
//! A launch runs in one of two modes:
//!
//! 1. __Direct mode__: the child inherits the standard streams of the current
//!    process. Nothing is intercepted. Use this for interactive programs like
//!    `journalctl -f` or `git pull` that may need a terminal.
//! 2. __Captured mode__: the child's stdout and stderr are piped back to us.
//!    Each line is echoed to our own stdout or stderr respectively, and then
//!    handed to every [`OutputSinks`] callback registered for that stream.
//!
//! # Exit Codes
//!
//! By default a launch __collapses__ every failure into exit code 1. Failing
//! to spawn, failing to wait, or a child that exited with code 2 or 127 all
//! look the same to the caller. Launches can opt into
//! [`ExitPolicy::Propagate`] to keep the child's own exit code instead.
//!
//! Launch failures never surface as errors to the caller. They are logged,
//! and folded into the reported exit code.

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    process::{ExitStatus, Stdio},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};
use tracing::{debug, error, instrument, warn};

/// Exit code reported by a launch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Clean exit.
    pub const SUCCESS: Self = Self(0);

    /// Generic failure.
    pub const FAILURE: Self = Self(1);

    /// Construct new exit code from raw value.
    pub fn new(code: i32) -> Self {
        Self(code)
    }

    /// Raw exit code value.
    pub fn code(self) -> i32 {
        self.0
    }

    /// Check if exit code signals success.
    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl Display for ExitCode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0)
    }
}

/// How to report a child that exited unsuccessfully.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Report any failure as [`ExitCode::FAILURE`].
    #[default]
    Collapse,

    /// Report the child's own exit code.
    ///
    /// Children terminated by a signal have no exit code, so they are still
    /// reported as [`ExitCode::FAILURE`].
    Propagate,
}

/// Environment handed to the child.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Inherit environment of current process as-is.
    #[default]
    Inherit,

    /// Inherit environment of current process plus extra variables.
    Extend(Vec<(OsString, OsString)>),

    /// Only use the given variables.
    Replace(Vec<(OsString, OsString)>),
}

/// Line callback for captured output.
pub type Sink<'a> = Box<dyn FnMut(&str) + 'a>;

/// Callbacks invoked for each line of captured output.
///
/// Sinks are always called in registration order, one line at a time, never
/// concurrently with each other.
#[derive(Default)]
pub struct OutputSinks<'a> {
    stdout: Vec<Sink<'a>>,
    stderr: Vec<Sink<'a>>,
}

impl<'a> OutputSinks<'a> {
    /// Construct new empty set of sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register callback for lines written to stdout.
    pub fn on_stdout(mut self, sink: impl FnMut(&str) + 'a) -> Self {
        self.stdout.push(Box::new(sink));
        self
    }

    /// Register callback for lines written to stderr.
    pub fn on_stderr(mut self, sink: impl FnMut(&str) + 'a) -> Self {
        self.stderr.push(Box::new(sink));
        self
    }

    fn emit_stdout(&mut self, line: &str) {
        println!("{line}");
        for sink in self.stdout.iter_mut() {
            sink(line);
        }
    }

    fn emit_stderr(&mut self, line: &str) {
        eprintln!("{line}");
        for sink in self.stderr.iter_mut() {
            sink(line);
        }
    }
}

/// Request to launch external program.
///
/// Arguments and environment are snapshotted when the launch happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    program: OsString,
    args: Vec<OsString>,
    env: Environment,
    current_dir: Option<PathBuf>,
    policy: ExitPolicy,
}

impl Launch {
    /// Construct new launch request for target program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Environment::default(),
            current_dir: None,
            policy: ExitPolicy::default(),
        }
    }

    /// Append argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set environment policy.
    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Run child inside target directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Keep exit code of child instead of collapsing it.
    pub fn propagate_exit_code(mut self) -> Self {
        self.policy = ExitPolicy::Propagate;
        self
    }

    /// Name of program to launch.
    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }

    /// Arguments to pass to program.
    pub fn arguments(&self) -> &[OsString] {
        self.args.as_slice()
    }

    /// Environment policy of launch.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Exit policy of launch.
    pub fn exit_policy(&self) -> ExitPolicy {
        self.policy
    }

    /// Run program with standard streams inherited from current process.
    ///
    /// Blocks until the child exits.
    #[instrument(skip(self), fields(program = ?self.program), level = "debug")]
    pub async fn run_direct(self) -> ExitCode {
        let mut command = self.command();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!("problem when starting {:?}: {err}", self.program);
                return ExitCode::FAILURE;
            }
        };

        self.finish(&mut child).await
    }

    /// Run program while capturing its stdout and stderr line by line.
    ///
    /// Both streams are drained to end of file before waiting on the child.
    /// Lines are echoed to the matching stream of the current process, and
    /// then passed to each registered sink.
    #[instrument(skip(self, sinks), fields(program = ?self.program), level = "debug")]
    pub async fn run_captured(self, mut sinks: OutputSinks<'_>) -> ExitCode {
        let mut command = self.command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!("problem when starting {:?}: {err}", self.program);
                return ExitCode::FAILURE;
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            error!("failed to open output pipes of {:?}", self.program);
            let _ = child.start_kill();
            let _ = child.wait().await;
            return ExitCode::FAILURE;
        };

        drain(stdout, stderr, &mut sinks).await;
        self.finish(&mut child).await
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        match &self.env {
            Environment::Inherit => {}
            Environment::Extend(vars) => {
                command.envs(vars.iter().map(|(key, value)| (key, value)));
            }
            Environment::Replace(vars) => {
                command
                    .env_clear()
                    .envs(vars.iter().map(|(key, value)| (key, value)));
            }
        }

        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        command
    }

    async fn finish(&self, child: &mut Child) -> ExitCode {
        match child.wait().await {
            Ok(status) => {
                debug!("{:?} finished with {status}", self.program);
                self.report(status)
            }
            Err(err) => {
                error!("problem when waiting process {:?}: {err}", self.program);
                ExitCode::FAILURE
            }
        }
    }

    fn report(&self, status: ExitStatus) -> ExitCode {
        if status.success() {
            return ExitCode::SUCCESS;
        }

        match self.policy {
            ExitPolicy::Collapse => ExitCode::FAILURE,
            ExitPolicy::Propagate => status.code().map_or(ExitCode::FAILURE, ExitCode::new),
        }
    }
}

impl Display for Launch {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.to_string_lossy().as_ref())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

async fn drain(
    stdout: impl AsyncRead + Unpin,
    stderr: impl AsyncRead + Unpin,
    sinks: &mut OutputSinks<'_>,
) {
    let mut stdout = BufReader::new(stdout).split(b'\n');
    let mut stderr = BufReader::new(stderr).split(b'\n');
    let mut stdout_open = true;
    let mut stderr_open = true;

    // INVARIANT: Keep reading until both streams hit end of file.
    while stdout_open || stderr_open {
        tokio::select! {
            segment = stdout.next_segment(), if stdout_open => match segment {
                Ok(Some(bytes)) => sinks.emit_stdout(&chomp(&bytes)),
                Ok(None) => stdout_open = false,
                Err(err) => {
                    warn!("failed to read stdout of child: {err}");
                    stdout_open = false;
                }
            },
            segment = stderr.next_segment(), if stderr_open => match segment {
                Ok(Some(bytes)) => sinks.emit_stderr(&chomp(&bytes)),
                Ok(None) => stderr_open = false,
                Err(err) => {
                    warn!("failed to read stderr of child: {err}");
                    stderr_open = false;
                }
            },
        }
    }
}

fn chomp(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::cell::RefCell;

    #[tokio::test]
    async fn run_captured_splits_lines_in_order() {
        let lines = RefCell::new(Vec::new());
        let sinks = OutputSinks::new().on_stdout(|line| lines.borrow_mut().push(line.to_owned()));

        let code = Launch::new("printf").arg("a\\nb\\n").run_captured(sinks).await;

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(lines.into_inner(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn run_captured_routes_each_stream_to_its_sinks() {
        let stdout = RefCell::new(Vec::new());
        let stderr = RefCell::new(Vec::new());
        let also_stdout = RefCell::new(0usize);
        let sinks = OutputSinks::new()
            .on_stdout(|line| stdout.borrow_mut().push(line.to_owned()))
            .on_stdout(|_| *also_stdout.borrow_mut() += 1)
            .on_stderr(|line| stderr.borrow_mut().push(line.to_owned()));

        let script = "echo one; echo two >&2; echo three; echo four >&2; printf 'five'";
        let code = Launch::new("sh")
            .args(["-c", script])
            .run_captured(sinks)
            .await;

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(stdout.into_inner(), vec!["one", "three", "five"]);
        assert_eq!(stderr.into_inner(), vec!["two", "four"]);
        assert_eq!(also_stdout.into_inner(), 3);
    }

    #[tokio::test]
    async fn run_captured_strips_carriage_returns() {
        let lines = RefCell::new(Vec::new());
        let sinks = OutputSinks::new().on_stdout(|line| lines.borrow_mut().push(line.to_owned()));

        let _ = Launch::new("printf")
            .arg("dos\\r\\nline\\n")
            .run_captured(sinks)
            .await;

        assert_eq!(lines.into_inner(), vec!["dos", "line"]);
    }

    #[test_case(ExitPolicy::Collapse, 1; "collapse")]
    #[test_case(ExitPolicy::Propagate, 3; "propagate")]
    #[tokio::test]
    async fn run_captured_reports_failed_exit(policy: ExitPolicy, expect: i32) {
        let mut launch = Launch::new("sh").args(["-c", "echo failing >&2; exit 3"]);
        if policy == ExitPolicy::Propagate {
            launch = launch.propagate_exit_code();
        }

        let code = launch.run_captured(OutputSinks::new()).await;
        pretty_assertions::assert_eq!(code.code(), expect);
    }

    #[test_case(ExitPolicy::Collapse, 1; "collapse")]
    #[test_case(ExitPolicy::Propagate, 42; "propagate")]
    #[tokio::test]
    async fn run_direct_reports_failed_exit(policy: ExitPolicy, expect: i32) {
        let mut launch = Launch::new("sh").args(["-c", "exit 42"]);
        if policy == ExitPolicy::Propagate {
            launch = launch.propagate_exit_code();
        }

        pretty_assertions::assert_eq!(launch.run_direct().await.code(), expect);
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let program = "/nonexistent/house-keeper/definitely-not-here";
        assert_eq!(Launch::new(program).run_direct().await, ExitCode::FAILURE);

        let called = RefCell::new(false);
        let sinks = OutputSinks::new().on_stdout(|_| *called.borrow_mut() = true);
        let code = Launch::new(program).propagate_exit_code().run_captured(sinks).await;
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!called.into_inner());
    }

    #[tokio::test]
    async fn environment_policies() {
        let lines = RefCell::new(Vec::new());
        let sinks = OutputSinks::new().on_stdout(|line| lines.borrow_mut().push(line.to_owned()));
        let _ = Launch::new("sh")
            .args(["-c", "echo \"$HKD_TEST_VAR\""])
            .env(Environment::Extend(vec![("HKD_TEST_VAR".into(), "extended".into())]))
            .run_captured(sinks)
            .await;
        assert_eq!(lines.into_inner(), vec!["extended"]);

        let lines = RefCell::new(Vec::new());
        let sinks = OutputSinks::new().on_stdout(|line| lines.borrow_mut().push(line.to_owned()));
        let _ = Launch::new("/bin/sh")
            .args(["-c", "echo \"${HOME:-unset}\""])
            .env(Environment::Replace(vec![("HKD_TEST_VAR".into(), "x".into())]))
            .run_captured(sinks)
            .await;
        assert_eq!(lines.into_inner(), vec!["unset"]);
    }

    #[test]
    fn display_launch() {
        let launch = Launch::new("rsync").args(["--stats", "src", "dest"]);
        assert_eq!(launch.to_string(), "rsync --stats src dest");
    }
}
