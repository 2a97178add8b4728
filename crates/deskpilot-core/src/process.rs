//! External process runner.
//!
//! Runs a command to completion or until its timeout, capturing stdout and
//! stderr. Each child leads its own process group; on timeout the whole group
//! is killed and the child reaped before returning. Background descendants of
//! a command that finished in time are left running, but their pipes are only
//! drained for [`PIPE_DRAIN_GRACE`].

use crate::shell_dialect::{self, ShellDialect};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How the executable is specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Free-form text run by a shell interpreter. Injection-prone: only for
    /// operator-typed commands.
    Shell(String),
    /// Fixed program with an argument vector; no shell involved.
    Argv {
        /// Executable name or path.
        program: String,
        /// Arguments.
        args: Vec<String>,
    },
}

impl Invocation {
    /// Argument-vector invocation.
    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The program that will actually be spawned.
    #[must_use]
    pub fn program(&self) -> String {
        match self {
            Self::Shell(text) => shell_dialect::detect(text).interpreter().0.to_string(),
            Self::Argv { program, .. } => program.clone(),
        }
    }

    fn command(&self) -> Command {
        match self {
            Self::Shell(text) => {
                let dialect = shell_dialect::detect(text);
                if dialect == ShellDialect::PowerShell {
                    debug!(command = %text, "Routing shell command to PowerShell");
                }
                shell_command(text, dialect)
            }
            Self::Argv { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                command
            }
        }
    }
}

fn shell_command(text: &str, dialect: ShellDialect) -> Command {
    let (program, leading) = dialect.interpreter();
    let mut command = Command::new(program);
    command.args(leading).arg(text);
    command
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(text) => write!(f, "{text}"),
            Self::Argv { program, args } => {
                write!(f, "{program}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// One process execution request.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// What to run.
    pub invocation: Invocation,
    /// Working directory; inherits the bot's cwd when `None`.
    pub cwd: Option<PathBuf>,
    /// Wall-clock budget.
    pub timeout: Duration,
}

impl ProcessRequest {
    /// Request with no cwd override.
    #[must_use]
    pub const fn new(invocation: Invocation, timeout: Duration) -> Self {
        Self {
            invocation,
            cwd: None,
            timeout,
        }
    }

    /// Run in `dir`.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Result of a process that exited with code 0.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code.
    pub exit_code: i32,
    /// Decoded stdout.
    pub stdout: String,
    /// Decoded stderr.
    pub stderr: String,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    /// Budget the run was allowed.
    pub timeout: Duration,
}

impl ProcessOutput {
    /// Stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    /// Combined output, or `(no output, exit code N)` when it is blank.
    #[must_use]
    pub fn display_text(&self) -> String {
        let combined = self.combined();
        if combined.trim().is_empty() {
            format!("(no output, exit code {})", self.exit_code)
        } else {
            combined
        }
    }
}

/// Process runner failures.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The executable does not exist.
    #[error("{program}: executable not found")]
    NotFound {
        /// Program that could not be spawned.
        program: String,
    },
    /// The process exceeded its budget and was killed.
    #[error("timed out after {}s", budget.as_secs())]
    TimedOut {
        /// The exceeded budget.
        budget: Duration,
        /// Pid of the killed process, if it was known.
        pid: Option<u32>,
    },
    /// The process exited with a nonzero code (or was killed by a signal).
    #[error("exited with code {exit_code}")]
    ExecutionFailed {
        /// Exit code, -1 when terminated by a signal.
        exit_code: i32,
        /// Combined stdout and stderr.
        output: String,
    },
    /// Any other spawn or wait failure.
    #[error("failed to run process: {0}")]
    Spawn(#[source] io::Error),
}

/// Executes external commands with a timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Run a request to completion or timeout.
    ///
    /// # Errors
    ///
    /// See [`ProcessError`]. A zero exit with empty output is `Ok`.
    #[instrument(skip(self, request), fields(command = %request.invocation))]
    pub async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, ProcessError> {
        let ProcessRequest {
            invocation,
            cwd,
            timeout,
        } = request;

        if matches!(invocation, Invocation::Shell(_)) {
            info!(command = %invocation, "Running operator shell command");
        }

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut child = match spawn(invocation.command(), cwd.as_deref()) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => match &invocation {
                Invocation::Shell(text)
                    if shell_dialect::detect(text) == ShellDialect::PowerShell =>
                {
                    warn!("PowerShell is not installed, using the default shell");
                    spawn(shell_command(text, ShellDialect::Default), cwd.as_deref())
                }
                _ => Err(e),
            },
            other => other,
        }
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: invocation.program(),
                }
            } else {
                warn!(error = %e, "Failed to spawn process");
                ProcessError::Spawn(e)
            }
        })?;
        let pid = child.id();
        debug!(pid = ?pid, cwd = ?cwd, timeout_secs = timeout.as_secs(), "Process spawned");

        let (mut stdout_task, stdout_buf) = capture(child.stdout.take());
        let (mut stderr_task, stderr_buf) = capture(child.stderr.take());

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status.map_err(ProcessError::Spawn)?,
            Err(_) => {
                warn!(pid = ?pid, timeout_secs = timeout.as_secs(), "Process timed out, killing");
                kill_tree(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(ProcessError::TimedOut {
                    budget: timeout,
                    pid,
                });
            }
        };

        // Background descendants may still hold the pipes open.
        let drain_deadline = deadline.min(tokio::time::Instant::now() + PIPE_DRAIN_GRACE);
        let drained = tokio::time::timeout_at(drain_deadline, async {
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
        })
        .await
        .is_ok();
        if !drained {
            warn!(pid = ?pid, "Output pipes held by background processes, returning partial output");
            stdout_task.abort();
            stderr_task.abort();
        }

        let stdout = decode_output(&take(&stdout_buf));
        let stderr = decode_output(&take(&stderr_buf));
        let exit_code = status.code().unwrap_or(-1);
        let elapsed = start.elapsed();

        debug!(
            exit_code,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Process completed"
        );

        let output = ProcessOutput {
            exit_code,
            stdout,
            stderr,
            elapsed,
            timeout,
        };
        if status.success() {
            Ok(output)
        } else {
            Err(ProcessError::ExecutionFailed {
                exit_code,
                output: output.display_text(),
            })
        }
    }
}

/// How long output is still collected after the direct child exits.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

type Captured = Arc<Mutex<Vec<u8>>>;

fn spawn(mut command: Command, cwd: Option<&Path>) -> io::Result<Child> {
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    #[cfg(unix)]
    command.process_group(0);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Read a pipe in the background; bytes stay available if the task is aborted.
fn capture<R>(pipe: Option<R>) -> (JoinHandle<()>, Captured)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Captured::default();
    let sink = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!(error = %e, "Output pipe closed with error");
                    break;
                }
            }
        }
    });
    (task, buf)
}

fn take(buf: &Captured) -> Vec<u8> {
    std::mem::take(&mut *buf.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Kill the child's process group, then kill and reap the child itself.
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_group(pid).await;
    }
    if let Err(e) = child.kill().await {
        warn!(pid = ?pid, error = %e, "Failed to kill timed out process");
    }
}

#[cfg(unix)]
async fn kill_group(pid: u32) {
    // The child leads its own group, so its pgid equals its pid.
    let group = format!("-{pid}");
    let result = Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => debug!(pgid = pid, "Process group killed"),
        Ok(status) => debug!(pgid = pid, ?status, "Process group already gone"),
        Err(e) => warn!(pgid = pid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(windows)]
async fn kill_group(pid: u32) {
    let pid_arg = pid.to_string();
    let result = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid_arg])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        warn!(pid, error = %e, "Failed to kill process tree");
    }
}

/// Decode process output: UTF-8 first, then the IBM866 console code page.
///
/// Never fails; undecodable bytes become replacement characters.
#[must_use]
pub fn decode_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::IBM866.decode(bytes);
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_output("héllo".as_bytes()), "héllo");
        assert_eq!(decode_output(b""), "");
    }

    #[test]
    fn test_decode_cp866_fallback() {
        // "Привет" in IBM866
        let bytes = [0x8F, 0xE0, 0xA8, 0xA2, 0xA5, 0xE2];
        assert_eq!(decode_output(&bytes), "Привет");
    }

    #[test]
    fn test_display_text_for_empty_output() {
        let output = ProcessOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: "  \n".to_string(),
            elapsed: Duration::ZERO,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(output.display_text(), "(no output, exit code 0)");
    }

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::argv("git", ["log", "--oneline"]);
        assert_eq!(inv.to_string(), "git log --oneline");
        assert_eq!(inv.program(), "git");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(ProcessRequest::new(
                Invocation::argv("deskpilot-definitely-missing-tool", Vec::<String>::new()),
                Duration::from_secs(5),
            ))
            .await
            .expect_err("missing tool");
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_true_has_empty_output() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(ProcessRequest::new(
                Invocation::argv("true", Vec::<String>::new()),
                Duration::from_secs(5),
            ))
            .await
            .expect("true succeeds");
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.display_text(), "(no output, exit code 0)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_keeps_output() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(ProcessRequest::new(
                Invocation::Shell("echo boom >&2; exit 3".to_string()),
                Duration::from_secs(5),
            ))
            .await
            .expect_err("exit 3");
        match err {
            ProcessError::ExecutionFailed { exit_code, output } => {
                assert_eq!(exit_code, 3);
                assert_eq!(output.trim(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_mode_combines_streams_in_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marker.txt"), "x").expect("write");
        let runner = ProcessRunner::new();
        let output = runner
            .run(
                ProcessRequest::new(
                    Invocation::Shell("ls; echo warn >&2".to_string()),
                    Duration::from_secs(5),
                )
                .in_dir(dir.path()),
            )
            .await
            .expect("ls succeeds");
        assert_eq!(output.combined(), "marker.txt\nwarn\n");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = ProcessRunner::new();
        let started = Instant::now();
        let err = runner
            .run(ProcessRequest::new(
                Invocation::argv("sleep", ["30"]),
                Duration::from_millis(200),
            ))
            .await
            .expect_err("must time out");
        assert!(started.elapsed() < Duration::from_secs(10));

        let ProcessError::TimedOut { budget, pid } = err else {
            panic!("expected timeout, got {err}");
        };
        assert_eq!(budget, Duration::from_millis(200));
        let pid = pid.expect("pid known");
        assert!(wait_until_gone(pid).await, "process {pid} still running");
    }

    /// Running unless missing from /proc or a zombie.
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                let state = stat.rsplit_once(')')?.1.trim_start().chars().next()?;
                Some(state != 'Z')
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: u32) -> bool {
        for _ in 0..40 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        !is_running(pid)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_shell_grandchild() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pidfile = dir.path().join("child.pid");
        let runner = ProcessRunner::new();
        let err = runner
            .run(ProcessRequest::new(
                Invocation::Shell(format!("sleep 31 & echo $! > {}; wait", pidfile.display())),
                Duration::from_millis(300),
            ))
            .await
            .expect_err("must time out");
        assert!(matches!(err, ProcessError::TimedOut { .. }), "got {err}");

        let grandchild: u32 = std::fs::read_to_string(&pidfile)
            .expect("pid file written")
            .trim()
            .parse()
            .expect("numeric pid");
        assert!(
            wait_until_gone(grandchild).await,
            "grandchild {grandchild} outlived the timeout"
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_background_child_does_not_hold_reply() {
        let runner = ProcessRunner::new();
        let started = Instant::now();
        let output = runner
            .run(ProcessRequest::new(
                Invocation::Shell("sleep 33 & echo $!".to_string()),
                Duration::from_secs(5),
            ))
            .await
            .expect("shell exits at once");
        assert!(started.elapsed() < PIPE_DRAIN_GRACE + Duration::from_secs(2));

        let background: u32 = output.stdout.trim().parse().expect("pid printed");
        assert!(is_running(background), "background job was killed");
        let _ = std::process::Command::new("kill")
            .arg(background.to_string())
            .status();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_posix_path_flag_runs_in_sh() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(ProcessRequest::new(
                Invocation::Shell("find /tmp -maxdepth 0 -path /tmp".to_string()),
                Duration::from_secs(5),
            ))
            .await
            .expect("find succeeds");
        assert_eq!(output.stdout.trim(), "/tmp");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cmdlet_without_pwsh_falls_back_to_sh() {
        if which_pwsh() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = ProcessRunner::new();
        // sh reports the unknown command instead of the runner failing to spawn
        let err = runner
            .run(
                ProcessRequest::new(
                    Invocation::Shell("Get-ChildItem".to_string()),
                    Duration::from_secs(5),
                )
                .in_dir(dir.path()),
            )
            .await
            .expect_err("no such command in sh");
        let ProcessError::ExecutionFailed { exit_code, output } = err else {
            panic!("expected sh to run, got {err}");
        };
        assert_eq!(exit_code, 127);
        assert!(output.contains("Get-ChildItem"));
    }

    #[cfg(unix)]
    fn which_pwsh() -> bool {
        std::env::var_os("PATH").is_some_and(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join("pwsh").is_file())
        })
    }
}
