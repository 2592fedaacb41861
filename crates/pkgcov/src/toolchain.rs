//! External toolchain invocations
//!
//! The build toolchain is a black box reached through three commands:
//! `go list ./...`, `go test -coverprofile=.. -covermode=.. <pkg>` and
//! `go tool cover -func=..`. The [`Toolchain`] trait is the seam the pipeline
//! talks to, so tests can substitute a scripted fake.

use crate::config::{CliConfig, CoverageMode};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for captured output after a killed process.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    /// Exited with status zero
    Success,
    /// Exited non-zero; `None` when killed by a signal
    Failed(Option<i32>),
    /// Killed after exceeding the timeout
    TimedOut,
    /// The process could not be started
    SpawnFailed(String),
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed(Some(code)) => write!(f, "exit status: {code}"),
            Self::Failed(None) => f.write_str("terminated by signal"),
            Self::TimedOut => f.write_str("timed out"),
            Self::SpawnFailed(reason) => write!(f, "cannot start: {reason}"),
        }
    }
}

/// Result of one external invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// How the process ended
    pub status: InvocationStatus,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl Invocation {
    /// Successful invocation with the given stdout
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Success,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Invocation that exited with `code`
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Failed(Some(code)),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Invocation that could not be started
    #[must_use]
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::SpawnFailed(reason.into()),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Whether the process exited with status zero
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == InvocationStatus::Success
    }
}

/// Operations the pipeline needs from the build toolchain
pub trait Toolchain {
    /// List every testable package in the project
    fn list_packages(&self) -> Invocation;

    /// Run one package's tests, writing its coverage profile to `profile`
    fn test_package(&self, package: &str, mode: CoverageMode, profile: &Path) -> Invocation;

    /// Produce the per-function report for a profile
    fn cover_func(&self, profile: &Path) -> Invocation;
}

/// The real `go` command
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
    dir: PathBuf,
    timeout: Option<Duration>,
}

impl GoToolchain {
    /// Create a toolchain running `program` inside `dir`
    #[must_use]
    pub fn new(program: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            dir: dir.into(),
            timeout: None,
        }
    }

    /// Build from CLI configuration
    #[must_use]
    pub fn from_config(config: &CliConfig) -> Self {
        Self::new(config.go_program.clone(), config.project_dir.clone())
            .with_timeout(config.timeout())
    }

    /// Set the per-invocation timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executable name or path
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn invoke(&self, args: &[String]) -> Invocation {
        debug!(program = %self.program, ?args, dir = %self.dir.display(), "invoking toolchain");
        let mut command = Command::new(&self.program);
        command.args(args).current_dir(&self.dir);

        match spawn_captured(&mut command) {
            Ok(child) => wait_with_timeout(child, self.timeout),
            Err(e) => Invocation::spawn_failed(format!("{}: {e}", self.program)),
        }
    }
}

impl Toolchain for GoToolchain {
    fn list_packages(&self) -> Invocation {
        self.invoke(&["list".to_string(), "./...".to_string()])
    }

    fn test_package(&self, package: &str, mode: CoverageMode, profile: &Path) -> Invocation {
        self.invoke(&[
            "test".to_string(),
            format!("-coverprofile={}", profile.display()),
            format!("-covermode={mode}"),
            package.to_string(),
        ])
    }

    fn cover_func(&self, profile: &Path) -> Invocation {
        self.invoke(&[
            "tool".to_string(),
            "cover".to_string(),
            format!("-func={}", profile.display()),
        ])
    }
}

/// Spawn with captured output, leading a fresh process group on unix so a
/// timeout can take down everything the command started.
fn spawn_captured(command: &mut Command) -> std::io::Result<Child> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(command, 0);
    command.spawn()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Captured output of one pipe. After a kill, a descendant that escaped the
/// process group may still hold the pipe open, so the wait is bounded.
fn collect(rx: Option<Receiver<String>>, killed: bool) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    if killed {
        rx.recv_timeout(DRAIN_GRACE).unwrap_or_default()
    } else {
        rx.recv().unwrap_or_default()
    }
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(child.id()) {
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(pid, error = %e, "cannot kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Kill `child` and its process group, then reap it.
fn terminate(child: &mut Child) {
    kill_group(child);
    if let Err(e) = child.kill() {
        debug!(error = %e, "cannot kill process");
    }
    let _ = child.wait();
}

/// Wait for `child`, killing it and its descendants once `timeout` elapses.
fn wait_with_timeout(mut child: Child, timeout: Option<Duration>) -> Invocation {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = timeout.map(|t| Instant::now() + t);

    let status = loop {
        match child.try_wait() {
            Ok(Some(exit)) => break classify_exit(exit),
            Ok(None) => {}
            Err(e) => {
                terminate(&mut child);
                break InvocationStatus::SpawnFailed(e.to_string());
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            terminate(&mut child);
            break InvocationStatus::TimedOut;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let killed = matches!(
        status,
        InvocationStatus::TimedOut | InvocationStatus::SpawnFailed(_)
    );
    Invocation {
        status,
        stdout: collect(stdout, killed),
        stderr: collect(stderr, killed),
    }
}

fn classify_exit(exit: ExitStatus) -> InvocationStatus {
    if exit.success() {
        InvocationStatus::Success
    } else {
        InvocationStatus::Failed(exit.code())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(InvocationStatus::Success.to_string(), "success");
        assert_eq!(InvocationStatus::Failed(Some(2)).to_string(), "exit status: 2");
        assert_eq!(InvocationStatus::TimedOut.to_string(), "timed out");
        assert!(InvocationStatus::SpawnFailed("nope".into())
            .to_string()
            .contains("nope"));
    }

    #[test]
    fn test_invocation_constructors() {
        assert!(Invocation::success("a\n").succeeded());
        assert!(!Invocation::failed(1, "boom").succeeded());
        assert!(!Invocation::spawn_failed("missing").succeeded());
    }

    #[test]
    fn test_from_config() {
        let config = CliConfig::new()
            .with_go_program("go1.22")
            .with_timeout_secs(0);
        let go = GoToolchain::from_config(&config);
        assert_eq!(go.program(), "go1.22");
        assert!(go.timeout.is_none());
    }

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let go = GoToolchain::new("definitely-not-a-real-go-binary", ".");
        let inv = go.list_packages();
        assert!(matches!(inv.status, InvocationStatus::SpawnFailed(_)));
    }

    #[cfg(unix)]
    mod process_tests {
        use super::*;

        #[test]
        fn test_captures_stdout_and_success() {
            let go = GoToolchain::new("echo", ".");
            let inv = go.list_packages();
            assert!(inv.succeeded());
            assert_eq!(inv.stdout.trim(), "list ./...");
        }

        #[test]
        fn test_nonzero_exit_is_failed() {
            let go = GoToolchain::new("false", ".");
            let inv = go.cover_func(Path::new("/tmp/x"));
            assert_eq!(inv.status, InvocationStatus::Failed(Some(1)));
        }

        #[test]
        fn test_timeout_kills_process() {
            let child = spawn_captured(Command::new("sleep").arg("5")).unwrap();
            let start = Instant::now();
            let inv = wait_with_timeout(child, Some(Duration::from_millis(100)));
            assert_eq!(inv.status, InvocationStatus::TimedOut);
            assert!(start.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn test_timeout_bounds_wait_when_grandchild_holds_pipes() {
            let child = spawn_captured(Command::new("sh").args(["-c", "sleep 6; true"])).unwrap();
            let start = Instant::now();
            let inv = wait_with_timeout(child, Some(Duration::from_millis(100)));
            assert_eq!(inv.status, InvocationStatus::TimedOut);
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "timeout did not bound the wait: {:?}",
                start.elapsed()
            );
        }

        #[test]
        fn test_timeout_kills_grandchild() {
            let temp = tempfile::TempDir::new().unwrap();
            let marker = temp.path().join("late");
            let script = format!("sleep 1; touch {}", marker.display());
            let child = spawn_captured(Command::new("sh").args(["-c", &script])).unwrap();
            let inv = wait_with_timeout(child, Some(Duration::from_millis(100)));
            assert_eq!(inv.status, InvocationStatus::TimedOut);
            std::thread::sleep(Duration::from_millis(1500));
            assert!(!marker.exists());
        }

        #[test]
        fn test_output_of_quick_exit_is_complete() {
            let child = spawn_captured(Command::new("sh").args(["-c", "echo out; echo err >&2"]))
                .unwrap();
            let inv = wait_with_timeout(child, Some(Duration::from_secs(30)));
            assert!(inv.succeeded());
            assert_eq!(inv.stdout, "out\n");
            assert_eq!(inv.stderr, "err\n");
        }
    }
}
