//! Subprocess execution with timeout and output caps.
//!
//! Invokes the configured artillery binary with safety controls:
//!
//! - Wall-clock deadline with SIGTERM → SIGKILL escalation
//! - Per-stream output caps; overflow bytes are dropped, not buffered
//! - Independent capture of stdout and stderr as they are produced
//!
//! The runner holds no shared mutable state, so concurrent calls are
//! independent subprocesses with no cross-call locking.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use am_config::ExecutionConfig;

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const KILL_GRACE_MS: u64 = 500;

/// Poll sleep when no output is pending, in milliseconds.
const IDLE_POLL_MS: u64 = 10;

/// Read chunk size in bytes.
const CHUNK_SIZE: usize = 8192;

/// Exit code reported when the child died without one (killed by a signal
/// the OS does not surface).
pub const SIGNAL_EXIT_SENTINEL: i32 = -1;

/// Errors that can occur while running the external binary.
///
/// A nonzero exit code is NOT an error; it is a successfully-reported
/// outcome. Only failure to start and timeout are call-level failures.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn subprocess: {0}")]
    Spawn(String),

    #[error("subprocess timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RunnerError> for am_common::Error {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Spawn(reason) => am_common::Error::Spawn(reason),
            RunnerError::Timeout { timeout_ms } => am_common::Error::Timeout { timeout_ms },
            RunnerError::Io(io) => am_common::Error::Io(io),
        }
    }
}

/// Captured outcome of a completed subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code; signal death normalizes to `128 + signal` or the sentinel.
    pub exit_code: i32,

    /// Captured stdout, truncated at the configured cap.
    pub stdout: Vec<u8>,

    /// Captured stderr, truncated at the configured cap.
    pub stderr: Vec<u8>,

    /// Wall-clock runtime.
    pub elapsed: Duration,

    /// Whether stdout hit the cap.
    pub stdout_truncated: bool,

    /// Whether stderr hit the cap.
    pub stderr_truncated: bool,
}

impl ProcessOutcome {
    /// Stdout as a lossy UTF-8 string.
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Stderr as a lossy UTF-8 string.
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Whether the subprocess exited cleanly.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Per-call run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory for the subprocess.
    pub cwd: Option<PathBuf>,

    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,

    /// Timeout override (None = configured default).
    pub timeout: Option<Duration>,
}

/// Spawns the configured binary under timeout and output bounds.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
    default_timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessRunner {
    /// Create a runner bound to the process-wide configuration.
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            default_timeout: config.timeout,
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Create a runner with explicit limits (tests and probes).
    pub fn with_limits(binary: PathBuf, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            binary,
            default_timeout: timeout,
            max_output_bytes,
        }
    }

    /// Run the binary with `args` and wait for it to finish.
    #[instrument(skip(self, args, options), fields(binary = %self.binary.display()))]
    pub fn run(&self, args: &[String], options: &RunOptions) -> Result<ProcessOutcome, RunnerError> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &options.env {
            command.env(key, value);
        }

        debug!(args = ?args, timeout_ms = timeout.as_millis() as u64, "spawning");
        let start = Instant::now();

        let mut child = command.spawn().map_err(|e| {
            warn!(error = %e, "spawn failed");
            RunnerError::Spawn(format!("{}: {e}", self.binary.display()))
        })?;

        let outcome = self.supervise(&mut child, timeout, start)?;
        info!(
            exit_code = outcome.exit_code,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "subprocess exited"
        );
        Ok(outcome)
    }

    /// Capture output and enforce the deadline until the child exits.
    fn supervise(
        &self,
        child: &mut Child,
        timeout: Duration,
        start: Instant,
    ) -> Result<ProcessOutcome, RunnerError> {
        let deadline = start + timeout;
        let mut stdout_buf = CappedBuf::new(self.max_output_bytes);
        let mut stderr_buf = CappedBuf::new(self.max_output_bytes);
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            if Instant::now() >= deadline {
                warn!(timeout_ms = timeout.as_millis() as u64, "deadline reached, killing");
                kill_with_grace(child);
                // A timed-out run is an error, never a partial outcome.
                return Err(RunnerError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }

            let mut read_any = false;
            if let Some(pipe) = stdout_pipe.as_mut() {
                let n = read_available(pipe, &mut chunk)?;
                if n > 0 {
                    read_any = true;
                    stdout_buf.push(&chunk[..n]);
                }
            }
            if let Some(pipe) = stderr_pipe.as_mut() {
                let n = read_available(pipe, &mut chunk)?;
                if n > 0 {
                    read_any = true;
                    stderr_buf.push(&chunk[..n]);
                }
            }

            match child.try_wait()? {
                Some(status) => {
                    // Child is gone; drain whatever is still buffered in the
                    // pipes without blocking on grandchildren that may hold
                    // the write end open.
                    if let Some(pipe) = stdout_pipe.as_mut() {
                        drain_available(pipe, &mut stdout_buf)?;
                    }
                    if let Some(pipe) = stderr_pipe.as_mut() {
                        drain_available(pipe, &mut stderr_buf)?;
                    }
                    return Ok(ProcessOutcome {
                        exit_code: normalize_exit(status),
                        stdout_truncated: stdout_buf.truncated,
                        stderr_truncated: stderr_buf.truncated,
                        stdout: stdout_buf.into_bytes(),
                        stderr: stderr_buf.into_bytes(),
                        elapsed: start.elapsed(),
                    });
                }
                None if !read_any => thread::sleep(Duration::from_millis(IDLE_POLL_MS)),
                None => {}
            }
        }
    }
}

/// Byte buffer that silently drops input past its cap.
#[derive(Debug)]
struct CappedBuf {
    buf: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl CappedBuf {
    fn new(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap.min(65536)),
            cap,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let space = self.cap.saturating_sub(self.buf.len());
        let take = chunk.len().min(space);
        self.buf.extend_from_slice(&chunk[..take]);
        if take < chunk.len() {
            self.truncated = true;
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Map an exit status to a plain code; signal death becomes `128 + signal`.
#[cfg(unix)]
fn normalize_exit(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => code,
        None => status
            .signal()
            .map(|sig| 128 + sig)
            .unwrap_or(SIGNAL_EXIT_SENTINEL),
    }
}

#[cfg(not(unix))]
fn normalize_exit(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNAL_EXIT_SENTINEL)
}

/// Kill a child with SIGTERM, then SIGKILL after a grace period.
#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as i32;

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    debug!(pid, "sent SIGTERM");

    thread::sleep(Duration::from_millis(KILL_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            warn!(pid, "no exit after SIGTERM, sending SIGKILL");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
            let _ = child.wait();
        }
    }
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Drain immediately-available data from a pipe into the capped buffer.
fn drain_available<R>(pipe: &mut R, buf: &mut CappedBuf) -> std::io::Result<()>
where
    R: Read + MaybeRawFd,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        // Once the cap is hit there is nothing left to keep; stop reading so
        // a grandchild holding the pipe open cannot pin this loop.
        if buf.truncated {
            return Ok(());
        }
        match read_available(pipe, &mut chunk)? {
            0 => return Ok(()),
            n => buf.push(&chunk[..n]),
        }
    }
}

/// Read from a pipe without blocking; `Ok(0)` means nothing is available
/// right now (or the stream is at EOF).
#[cfg(unix)]
fn read_available<R>(pipe: &mut R, chunk: &mut [u8]) -> std::io::Result<usize>
where
    R: Read + MaybeRawFd,
{
    let fd = pipe.raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking {
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    let result = pipe.read(chunk);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn read_available<R>(pipe: &mut R, chunk: &mut [u8]) -> std::io::Result<usize>
where
    R: Read + MaybeRawFd,
{
    pipe.read(chunk)
}

/// Access to the raw descriptor where the platform has one.
trait MaybeRawFd {
    #[cfg(unix)]
    fn raw_fd(&self) -> i32;
}

#[cfg(unix)]
impl<T: std::os::unix::io::AsRawFd> MaybeRawFd for T {
    fn raw_fd(&self) -> i32 {
        self.as_raw_fd()
    }
}

#[cfg(not(unix))]
impl<T> MaybeRawFd for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_runner() -> ProcessRunner {
        ProcessRunner::with_limits(
            PathBuf::from("sh"),
            Duration::from_secs(20),
            1024 * 1024,
        )
    }

    fn run_sh(runner: &ProcessRunner, script: &str) -> Result<ProcessOutcome, RunnerError> {
        runner.run(
            &["-c".to_string(), script.to_string()],
            &RunOptions::default(),
        )
    }

    #[test]
    fn captures_stdout() {
        let outcome = run_sh(&sh_runner(), "echo hello world").unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout_str().trim(), "hello world");
        assert!(!outcome.stdout_truncated);
    }

    #[test]
    fn captures_stderr_independently() {
        let outcome = run_sh(&sh_runner(), "echo out; echo err >&2").unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout_str().trim(), "out");
        assert_eq!(outcome.stderr_str().trim(), "err");
    }

    #[test]
    fn nonzero_exit_is_an_outcome_not_an_error() {
        let outcome = run_sh(&sh_runner(), "exit 42").unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, 42);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let runner = ProcessRunner::with_limits(
            PathBuf::from("/nonexistent/bin/artillery"),
            Duration::from_secs(1),
            1024,
        );
        let err = runner.run(&[], &RunOptions::default()).unwrap_err();
        assert!(matches!(err, RunnerError::Spawn(_)));
    }

    #[test]
    fn timeout_kills_and_errors() {
        let runner = ProcessRunner::with_limits(
            PathBuf::from("sleep"),
            Duration::from_millis(200),
            1024,
        );
        let start = Instant::now();
        let err = runner
            .run(&["10".to_string()], &RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
        // Deadline + SIGTERM grace, with slack for slow CI hosts.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn stdout_is_capped_not_failed() {
        let runner = ProcessRunner::with_limits(PathBuf::from("sh"), Duration::from_secs(20), 100);
        let outcome = run_sh(&runner, "yes | head -n 1000").unwrap();
        assert!(outcome.stdout.len() <= 100);
        assert!(outcome.stdout_truncated);
        assert!(!outcome.stderr_truncated);
    }

    #[test]
    fn env_overrides_are_applied() {
        let runner = sh_runner();
        let options = RunOptions {
            env: vec![("AM_TEST_VALUE".to_string(), "live".to_string())],
            ..Default::default()
        };
        let outcome = runner
            .run(
                &["-c".to_string(), "echo $AM_TEST_VALUE".to_string()],
                &options,
            )
            .unwrap();
        assert_eq!(outcome.stdout_str().trim(), "live");
    }

    #[test]
    fn cwd_override_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner();
        let options = RunOptions {
            cwd: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let outcome = runner
            .run(&["-c".to_string(), "pwd".to_string()], &options)
            .unwrap();
        let reported = PathBuf::from(outcome.stdout_str().trim().to_string());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn timeout_override_wins_over_default() {
        let runner = ProcessRunner::with_limits(
            PathBuf::from("sleep"),
            Duration::from_secs(60),
            1024,
        );
        let options = RunOptions {
            timeout: Some(Duration::from_millis(150)),
            ..Default::default()
        };
        let err = runner.run(&["10".to_string()], &options).unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { timeout_ms: 150 }));
    }

    #[test]
    fn capped_buf_drops_overflow() {
        let mut buf = CappedBuf::new(4);
        buf.push(b"ab");
        assert!(!buf.truncated);
        buf.push(b"cdef");
        assert!(buf.truncated);
        assert_eq!(buf.into_bytes(), b"abcd");
    }
}
