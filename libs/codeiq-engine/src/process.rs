/// Process Execution Primitive
///
/// **Core Responsibility:**
/// Spawn exactly one child, feed it one input stream, capture stdout/stderr,
/// enforce a wall-clock limit, and classify how the child ended.
///
/// **Boundary:**
/// - `ProcessExecutor` is the OS-facing capability (spawn, write stdin, await
///   exit, kill). Production uses `TokioExecutor`; tests inject fakes.
/// - `classify_termination` is the pure exit-code/signal/timeout table.
/// - `run_once` glues the two into the `Result<stdout, ExecutionFailure>`
///   contract every process-based runner consumes.

use async_trait::async_trait;
use codeiq_common::{ErrorKind, ExecutionFailure};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Output beyond this many bytes per stream is drained and discarded
pub const MAX_CAPTURE_BYTES: usize = 16 * 1024 * 1024;

/// How long pipes may stay open after the child has gone
const DRAIN_GRACE: Duration = Duration::from_millis(100);

const SIGABRT: i32 = 6;
const SIGKILL: i32 = 9;
const SIGSEGV: i32 = 11;

/// A fully rendered command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Termination {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// Set only when our own timer fired and we killed the child
    pub timed_out: bool,
}

impl Termination {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    pub fn signalled(signal: i32) -> Self {
        Self {
            signal: Some(signal),
            ..Default::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            signal: Some(SIGKILL),
            timed_out: true,
            ..Default::default()
        }
    }
}

/// Raw captured output of one child process
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl RawOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// OS process capability
///
/// Any implementation must guarantee:
/// 1. Exactly one child per call
/// 2. `stdin` written in full, then the pipe closed
/// 3. stdout/stderr captured separately
/// 4. On timeout the whole process tree is killed and `timed_out` is set
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// An `Err` means the child never started
    async fn spawn_and_wait(
        &self,
        command: &CommandSpec,
        stdin: &[u8],
        timeout: Duration,
    ) -> io::Result<RawOutput>;
}

/// Production executor on top of `tokio::process`
///
/// Children are placed in their own process group so a timeout can take down
/// anything they forked.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        TokioExecutor
    }
}

#[async_trait]
impl ProcessExecutor for TokioExecutor {
    async fn spawn_and_wait(
        &self,
        command: &CommandSpec,
        stdin: &[u8],
        timeout: Duration,
    ) -> io::Result<RawOutput> {
        let mut std_cmd = std::process::Command::new(&command.program);
        std_cmd
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut child = cmd.spawn()?;
        let pid = child.id();

        let writer = {
            let pipe = child.stdin.take();
            let input = stdin.to_vec();
            tokio::spawn(async move {
                if let Some(mut pipe) = pipe {
                    // A child that exits without reading closes the pipe first
                    let _ = pipe.write_all(&input).await;
                    let _ = pipe.shutdown().await;
                }
            })
        };
        let stdout_reader = spawn_capture(child.stdout.take());
        let stderr_reader = spawn_capture(child.stderr.take());

        let mut timed_out = !wait_for_exit(&mut child, pid, deadline).await;
        if timed_out {
            debug!(program = %command.program, timeout_ms = timeout.as_millis() as u64, "Killing timed-out process tree");
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill timed-out child");
            }
        }
        let status = child.wait().await?;
        writer.abort();

        // A descendant that left our group can still hold the pipes open
        let drain_deadline = deadline.max(tokio::time::Instant::now()) + DRAIN_GRACE;
        let stdout = collect(stdout_reader, drain_deadline).await;
        let stderr = collect(stderr_reader, drain_deadline).await;
        if stdout.is_none() || stderr.is_none() {
            if !timed_out {
                debug!(program = %command.program, "Output still open at the deadline");
            }
            timed_out = true;
        }
        let (stdout, stderr) = (stdout.unwrap_or_default(), stderr.unwrap_or_default());

        Ok(RawOutput {
            stdout,
            stderr,
            termination: termination_of(status, timed_out),
            elapsed: start.elapsed(),
        })
    }
}

fn spawn_capture<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        let Some(mut pipe) = pipe else {
            return captured;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = MAX_CAPTURE_BYTES.saturating_sub(captured.len());
                    captured.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
        captured
    })
}

/// Wait for the child to exit or for the deadline, without reaping it
///
/// Returns `false` on timeout. Either way the group is killed while the
/// leader is still unreaped, so its pid (and with it the group id) cannot
/// have been handed to an unrelated process yet.
#[cfg(target_os = "linux")]
async fn wait_for_exit(
    _child: &mut tokio::process::Child,
    pid: Option<u32>,
    deadline: tokio::time::Instant,
) -> bool {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return true;
    };
    let exited = tokio::task::spawn_blocking(move || loop {
        let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT;
        match waitid(Id::Pid(Pid::from_raw(raw)), flags) {
            Err(Errno::EINTR) => continue,
            _ => break,
        }
    });
    let in_time = tokio::time::timeout_at(deadline, exited).await.is_ok();
    kill_process_group(pid);
    in_time
}

/// Without `waitid` the group is only killed on timeout, since after a
/// normal exit the leader has been reaped and its pid may be reused
#[cfg(not(target_os = "linux"))]
async fn wait_for_exit(
    child: &mut tokio::process::Child,
    pid: Option<u32>,
    deadline: tokio::time::Instant,
) -> bool {
    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(_) => true,
        Err(_) => {
            kill_process_group(pid);
            false
        }
    }
}

/// `None` when the pipe was still open at `deadline`
async fn collect(mut reader: JoinHandle<Vec<u8>>, deadline: tokio::time::Instant) -> Option<Vec<u8>> {
    match tokio::time::timeout_at(deadline, &mut reader).await {
        Ok(captured) => Some(captured.unwrap_or_default()),
        Err(_) => {
            reader.abort();
            None
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        // ESRCH just means the group is already gone
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn termination_of(status: ExitStatus, timed_out: bool) -> Termination {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Termination {
        exit_code: status.code(),
        signal,
        timed_out,
    }
}

/// Classify a termination
///
/// Precedence:
/// 1. Our own timeout → TimeLimitExceeded, whatever the exit status says
/// 2. SIGSEGV / SIGABRT / SIGKILL → MemoryLimitExceeded. This is a heuristic:
///    these signals usually mean a blown stack, a failed allocation, or the
///    OOM killer, but no memory is actually measured.
/// 3. Any other signal → RuntimeError
/// 4. Non-zero exit → RuntimeError
/// 5. Zero exit → `None` (success)
pub fn classify_termination(
    exit_code: Option<i32>,
    signal: Option<i32>,
    timed_out: bool,
) -> Option<ErrorKind> {
    if timed_out {
        return Some(ErrorKind::TimeLimitExceeded);
    }
    match (signal, exit_code) {
        (Some(SIGSEGV | SIGABRT | SIGKILL), _) => Some(ErrorKind::MemoryLimitExceeded),
        (Some(_), _) => Some(ErrorKind::RuntimeError),
        (None, Some(0)) => None,
        (None, _) => Some(ErrorKind::RuntimeError),
    }
}

/// Human-readable signal name (`SIGSEGV`), falling back to the number
pub fn signal_name(signal: i32) -> String {
    #[cfg(unix)]
    {
        if let Ok(sig) = nix::sys::signal::Signal::try_from(signal) {
            return sig.as_str().to_string();
        }
    }
    format!("signal {}", signal)
}

/// Turn raw output into the run-stage contract
pub fn interpret(raw: &RawOutput, time_limit: Duration) -> Result<String, ExecutionFailure> {
    let t = raw.termination;
    let Some(kind) = classify_termination(t.exit_code, t.signal, t.timed_out) else {
        return Ok(raw.stdout_lossy().trim_end().to_string());
    };

    let message = match (kind, t.signal, t.exit_code) {
        (ErrorKind::TimeLimitExceeded, _, _) => {
            format!("Terminated after {}ms", time_limit.as_millis())
        }
        (ErrorKind::MemoryLimitExceeded, Some(sig), _) => {
            format!("Process killed with signal {}", signal_name(sig))
        }
        (_, Some(sig), _) => format!("Process killed by {}", signal_name(sig)),
        (_, None, code) => {
            let stderr = raw.stderr_lossy();
            if stderr.is_empty() {
                match code {
                    Some(code) => format!("Exited with code {}", code),
                    None => "Exited abnormally".to_string(),
                }
            } else {
                stderr
            }
        }
    };

    Err(ExecutionFailure::run(kind, message))
}

/// Run one command against one input under a wall-clock limit
pub async fn run_once(
    executor: &dyn ProcessExecutor,
    command: &CommandSpec,
    stdin: &str,
    time_limit: Duration,
) -> Result<String, ExecutionFailure> {
    match executor
        .spawn_and_wait(command, stdin.as_bytes(), time_limit)
        .await
    {
        Ok(raw) => {
            debug!(
                program = %command.program,
                elapsed_ms = raw.elapsed.as_millis() as u64,
                exit_code = ?raw.termination.exit_code,
                signal = ?raw.termination.signal,
                timed_out = raw.termination.timed_out,
                "Process finished"
            );
            interpret(&raw, time_limit)
        }
        Err(e) => Err(ExecutionFailure::run(
            ErrorKind::RuntimeError,
            format!("Failed to start {}: {}", command.program, e),
        )),
    }
}
