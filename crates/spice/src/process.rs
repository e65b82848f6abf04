//! External process execution
//!
//! All OS process handling lives behind `ToolRunner`, so the pipeline only
//! sees typed `ProcessResult` values and can be driven by a fake runner in
//! tests. `SystemRunner` bounds every tool run by a timeout and a
//! `CancelToken` that is flipped from the Ctrl-C handler.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::diagnostics::{Result, SpiceError};

/// Interval between two polls of a running child
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time an interrupted program gets to shut down before the next, harsher
/// signal is sent
const INTERRUPT_GRACE: Duration = Duration::from_secs(1);

/// Outcome of one finished tool process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Standard output followed by standard error
    pub fn combined_output(&self) -> String {
        let mut combined = self.stdout.clone();
        if !combined.is_empty() && !self.stderr.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }
}

/// Runs external programs on behalf of the pipeline
pub trait ToolRunner {
    /// Run a tool to completion, capturing its output
    fn run(&self, program: &Path, args: &[String]) -> Result<ProcessResult>;

    /// Run a program with inherited standard streams and return its exit code
    fn run_interactive(&self, program: &Path, args: &[String]) -> Result<Option<i32>>;
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Flip this token when the user presses Ctrl-C.
    ///
    /// Can only be installed once per process.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || token.cancel())
            .map_err(|e| SpiceError::other(format!("Failed to install interrupt handler: {}", e)))
    }
}

/// `ToolRunner` backed by real OS processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl SystemRunner {
    /// `timeout` of `None` lets tools run indefinitely
    pub fn new(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self { timeout, cancel }
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<ProcessResult> {
        let tool = tool_name(program);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SpiceError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_bounded(&mut child, self.timeout, &self.cancel, &tool)?;

        Ok(ProcessResult {
            exit_code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }

    fn run_interactive(&self, program: &Path, args: &[String]) -> Result<Option<i32>> {
        let tool = tool_name(program);
        let mut child = Command::new(program)
            .args(args)
            .spawn()
            .map_err(|source| SpiceError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        loop {
            if let Some(status) = child.try_wait()? {
                // The terminal interrupts the whole process group, so the
                // program may have exited on the same Ctrl-C
                if self.cancel.is_cancelled() {
                    return Err(interrupted(tool));
                }
                return Ok(status.code());
            }
            if self.cancel.is_cancelled() {
                shut_down(&mut child)?;
                return Err(interrupted(tool));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Read a child pipe to the end on a background thread
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Poll `child` until it exits, the deadline passes, or `cancel` is set.
/// The child is killed and reaped in the latter two cases.
fn wait_bounded(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel: &CancelToken,
    tool: &str,
) -> Result<ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let reason = if cancel.is_cancelled() {
            Some("interrupted by user".to_string())
        } else {
            timeout
                .filter(|limit| start.elapsed() > *limit)
                .map(|limit| format!("timed out after {}s", limit.as_secs()))
        };
        if let Some(reason) = reason {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SpiceError::Cancelled {
                tool: tool.to_string(),
                reason,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn interrupted(tool: String) -> SpiceError {
    SpiceError::Cancelled {
        tool,
        reason: "interrupted by user".to_string(),
    }
}

/// Let an interrupted program wind down, escalating from waiting to a
/// forwarded SIGINT to a kill. The child is always reaped.
fn shut_down(child: &mut Child) -> Result<()> {
    if wait_within(child, INTERRUPT_GRACE)?.is_some() {
        return Ok(());
    }
    forward_interrupt(child);
    if wait_within(child, INTERRUPT_GRACE)?.is_some() {
        return Ok(());
    }
    let _ = child.kill();
    child.wait()?;
    Ok(())
}

fn wait_within(child: &mut Child, limit: Duration) -> Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > limit {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn forward_interrupt(child: &mut Child) {
    // SAFETY: plain kill(2) on the pid of a child we have not reaped yet
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn forward_interrupt(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_joins_streams() {
        let result = ProcessResult {
            exit_code: Some(1),
            stdout: "compiling".to_string(),
            stderr: "error: boom\n".to_string(),
        };
        assert_eq!(result.combined_output(), "compiling\nerror: boom\n");
        assert!(!result.success());
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_code() {
        let runner = SystemRunner::new(Some(Duration::from_secs(10)), CancelToken::new());
        let args = vec![
            "-c".to_string(),
            "echo out; echo err >&2; exit 3".to_string(),
        ];
        let result = runner.run(Path::new("/bin/sh"), &args).unwrap();
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let runner = SystemRunner::new(Some(Duration::from_millis(200)), CancelToken::new());
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let started = Instant::now();
        let err = runner.run(Path::new("/bin/sh"), &args).unwrap_err();
        assert!(matches!(err, SpiceError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_token_stops_the_child() {
        let token = CancelToken::new();
        token.cancel();
        let runner = SystemRunner::new(None, token);
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let err = runner.run(Path::new("/bin/sh"), &args).unwrap_err();
        assert!(err.to_string().contains("interrupted"));
    }

    #[cfg(unix)]
    #[test]
    fn interrupted_program_is_reaped_and_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let runner = SystemRunner::new(None, token);
        let temp = tempfile::TempDir::new().unwrap();
        let pid_file = temp.path().join("pid");
        let args = vec![
            "-c".to_string(),
            format!("echo $$ > {}; exec sleep 30", pid_file.display()),
        ];
        let started = Instant::now();
        let err = runner
            .run_interactive(Path::new("/bin/sh"), &args)
            .unwrap_err();
        assert!(matches!(err, SpiceError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));

        // A reaped child no longer exists, not even as a zombie
        let pid = std::fs::read_to_string(&pid_file).unwrap_or_default();
        if let Ok(pid) = pid.trim().parse::<libc::pid_t>() {
            // SAFETY: signal 0 only checks that the pid exists
            let rc = unsafe { libc::kill(pid, 0) };
            assert_eq!(rc, -1);
        }
    }

    #[cfg(unix)]
    #[test]
    fn program_exiting_on_interrupt_is_still_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let runner = SystemRunner::new(None, token);
        let args = vec!["-c".to_string(), "exit 0".to_string()];
        let err = runner
            .run_interactive(Path::new("/bin/sh"), &args)
            .unwrap_err();
        assert!(matches!(err, SpiceError::Cancelled { .. }));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = SystemRunner::new(None, CancelToken::new());
        let err = runner
            .run(Path::new("/definitely/not/a/tool"), &[])
            .unwrap_err();
        assert!(matches!(err, SpiceError::Spawn { .. }));
    }
}
