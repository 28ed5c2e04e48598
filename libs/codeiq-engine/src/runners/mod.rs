/// Per-Language Runners
///
/// One runner per language kind, all sharing the process primitive:
/// - `native`: compile once to an executable, run per case (cpp)
/// - `managed`: rename to the primary type, compile once, run per case (java)
/// - `interpreted`: interpreter per case, no compile stage (py)
/// - `script`: fresh isolated script context per case (js)
///
/// A runner never deletes the staged source itself: the `StagedSource`
/// guard owned by the dispatcher does, after the runner returns or unwinds.

pub mod interpreted;
pub mod managed;
pub mod native;
pub mod script;

use crate::process::{CommandSpec, ProcessExecutor};
use crate::toolchain::Toolchain;
use crate::workspace::StagedSource;
use async_trait::async_trait;
use codeiq_common::{CaseOutcome, ExecutionFailure, FailurePolicy, RunResult, TestCase};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use interpreted::InterpretedRunner;
pub use managed::ManagedRunner;
pub use native::NativeRunner;
pub use script::ScriptRunner;

#[async_trait]
pub trait Runner: Send + Sync {
    /// Evaluate every test case against the staged source
    async fn run(&self, staged: &mut StagedSource, test_cases: &[TestCase]) -> RunResult;
}

/// Wall-clock limits shared by all runners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Per test case
    pub run: Duration,
    /// Per compiler invocation
    pub compile: Duration,
    /// Added to `run` for the script host process
    pub script_grace: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            run: Duration::from_millis(codeiq_common::config::DEFAULT_TIME_LIMIT_MS),
            compile: Duration::from_millis(codeiq_common::config::DEFAULT_COMPILE_TIME_LIMIT_MS),
            script_grace: Duration::from_millis(codeiq_common::config::DEFAULT_SCRIPT_GRACE_MS),
        }
    }
}

/// Everything a runner needs besides the submission itself
#[derive(Clone)]
pub struct RunnerContext {
    pub executor: Arc<dyn ProcessExecutor>,
    pub toolchain: Toolchain,
    pub limits: Limits,
    pub policy: FailurePolicy,
}

/// Ordered outcome collector applying the batch failure policy
pub(crate) struct Batch {
    policy: FailurePolicy,
    outcomes: Vec<CaseOutcome>,
}

impl Batch {
    pub(crate) fn new(policy: FailurePolicy, capacity: usize) -> Self {
        Self {
            policy,
            outcomes: Vec::with_capacity(capacity),
        }
    }

    /// Record one case; `Break` carries the failure that ends a fail-fast batch
    pub(crate) fn record(
        &mut self,
        name: &str,
        result: Result<String, ExecutionFailure>,
    ) -> ControlFlow<ExecutionFailure> {
        match result {
            Ok(output) => {
                debug!(test = name, "Test case succeeded");
                self.outcomes.push(CaseOutcome::Success {
                    name: name.to_string(),
                    output,
                });
                ControlFlow::Continue(())
            }
            Err(error) => {
                warn!(test = name, kind = %error.kind, stage = %error.stage, "Test case failed");
                match self.policy {
                    FailurePolicy::FailFast => ControlFlow::Break(error),
                    FailurePolicy::Isolated => {
                        self.outcomes.push(CaseOutcome::Failure {
                            name: name.to_string(),
                            error,
                        });
                        ControlFlow::Continue(())
                    }
                }
            }
        }
    }

    pub(crate) fn finish(self) -> RunResult {
        RunResult::Completed(self.outcomes)
    }
}

/// Run the compiler once; any failure is a batch-level CompilationError
///
/// With `strict_diagnostics` anything on stderr fails the build, even when
/// the compiler exits 0.
pub(crate) async fn compile(
    executor: &dyn ProcessExecutor,
    command: &CommandSpec,
    limit: Duration,
    strict_diagnostics: bool,
) -> Result<(), ExecutionFailure> {
    let raw = executor
        .spawn_and_wait(command, b"", limit)
        .await
        .map_err(|e| ExecutionFailure::compile(format!("Failed to start {}: {}", command.program, e)))?;

    let t = raw.termination;
    if t.timed_out {
        return Err(ExecutionFailure::compile(format!(
            "Compilation exceeded {}ms",
            limit.as_millis()
        )));
    }

    let exited_cleanly = t.signal.is_none() && t.exit_code == Some(0);
    let noisy = strict_diagnostics && !raw.stderr.is_empty();
    if exited_cleanly && !noisy {
        debug!(compiler = %command.program, elapsed_ms = raw.elapsed.as_millis() as u64, "Compilation succeeded");
        return Ok(());
    }

    let stderr = raw.stderr_lossy();
    let stdout = raw.stdout_lossy();
    let message = if !stderr.trim().is_empty() {
        stderr
    } else if !stdout.trim().is_empty() {
        stdout
    } else if let Some(sig) = t.signal {
        format!("Compiler killed by {}", crate::process::signal_name(sig))
    } else {
        format!("Compiler exited with code {}", t.exit_code.unwrap_or(-1))
    };
    warn!(
        compiler = %command.program,
        error_preview = message.lines().next().unwrap_or(""),
        "Compilation failed"
    );
    Err(ExecutionFailure::compile(message))
}
