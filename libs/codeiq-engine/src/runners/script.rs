/// Script Runner
///
/// Each test case gets a fresh host process running `HARNESS`, which
/// evaluates the submission in a new isolated context with an injected
/// `console.log` and a line-oriented `prompt()`. The host enforces the
/// evaluation timeout itself; our process timeout is only a backstop.
///
/// Host stdin framing: `<source byte length>\n<source><test input>`. The
/// source is read from the scratch file once and re-sent per case, so no
/// size limit on command-line arguments applies.

use super::{Batch, Runner, RunnerContext};
use crate::process::{self, RawOutput};
use crate::toolchain::Placeholders;
use crate::workspace::StagedSource;
use async_trait::async_trait;
use codeiq_common::{ErrorKind, ExecutionFailure, RunResult, Stage, TestCase};
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Exit status the harness uses for a parse failure
pub const SYNTAX_EXIT: i32 = 3;

/// Prefix of the host engine's own timeout error
pub const TIMEOUT_MARKER: &str = "Script execution timed out";

pub const HARNESS: &str = r#"
const vm = require('vm');
const limit = Number(process.argv[1]) || 2000;
const raw = require('fs').readFileSync(0);
const nl = raw.indexOf(10);
const size = Number(raw.subarray(0, nl).toString());
const code = raw.subarray(nl + 1, nl + 1 + size).toString('utf8');
const lines = raw.subarray(nl + 1 + size).toString('utf8').trim().split('\n');
let cursor = 0;
const out = [];
const sandbox = {
  console: { log: (...args) => { out.push(args.map(String).join(' ')); } },
  prompt: () => (cursor < lines.length ? lines[cursor++] : ''),
};
const fail = (e, status) => {
  process.stderr.write(String((e && e.message) || e));
  process.exit(status);
};
let script;
try {
  script = new vm.Script(code, { filename: 'solution.js' });
} catch (e) {
  fail(e, 3);
}
try {
  script.runInNewContext(sandbox, { timeout: limit });
} catch (e) {
  fail(e, 1);
}
process.stdout.write(out.join('\n'));
"#;

pub struct ScriptRunner {
    ctx: RunnerContext,
}

impl ScriptRunner {
    pub fn new(ctx: RunnerContext) -> Self {
        Self { ctx }
    }

    async fn evaluate(
        &self,
        command: &process::CommandSpec,
        source: &str,
        input: &str,
    ) -> Result<String, ExecutionFailure> {
        let stdin = format!("{}\n{}{}", source.len(), source, input);
        let backstop = self.ctx.limits.run + self.ctx.limits.script_grace;
        match self
            .ctx
            .executor
            .spawn_and_wait(command, stdin.as_bytes(), backstop)
            .await
        {
            Ok(raw) => interpret_script(&raw, self.ctx.limits.run),
            Err(e) => Err(ExecutionFailure::run(
                ErrorKind::RuntimeError,
                format!("Failed to start {}: {}", command.program, e),
            )),
        }
    }
}

/// Classify one harness run
///
/// Timeouts from either the engine or our backstop report `>{limit}ms`.
pub fn interpret_script(raw: &RawOutput, time_limit: Duration) -> Result<String, ExecutionFailure> {
    let t = raw.termination;
    let over_limit = || {
        ExecutionFailure::run(
            ErrorKind::TimeLimitExceeded,
            format!(">{}ms", time_limit.as_millis()),
        )
    };

    if t.timed_out {
        return Err(over_limit());
    }
    if t.signal.is_none() && t.exit_code == Some(SYNTAX_EXIT) {
        let detail = raw.stderr_lossy();
        let message = if detail.trim().is_empty() {
            ErrorKind::SyntaxError.to_string()
        } else {
            detail
        };
        return Err(ExecutionFailure::new(Stage::Compile, ErrorKind::SyntaxError, message));
    }
    if t.exit_code != Some(0) && raw.stderr_lossy().contains(TIMEOUT_MARKER) {
        return Err(over_limit());
    }
    process::interpret(raw, time_limit)
}

#[async_trait]
impl Runner for ScriptRunner {
    #[instrument(skip_all, fields(runner = "script", cases = test_cases.len()))]
    async fn run(&self, staged: &mut StagedSource, test_cases: &[TestCase]) -> RunResult {
        let source = match tokio::fs::read_to_string(staged.path()).await {
            Ok(source) => source,
            Err(e) => {
                return RunResult::Failed(ExecutionFailure::read(format!(
                    "Could not read staged source: {}",
                    e
                )))
            }
        };

        let command = self.ctx.toolchain.run.render(
            &Placeholders::new()
                .set("harness", HARNESS)
                .set("time_limit_ms", self.ctx.limits.run.as_millis().to_string())
                .set_path("source", staged.path()),
        );

        let mut batch = Batch::new(self.ctx.policy, test_cases.len());
        for tc in test_cases {
            debug!(test = %tc.name, "Evaluating script");
            let result = self.evaluate(&command, &source, &tc.input).await;
            if let ControlFlow::Break(failure) = batch.record(&tc.name, result) {
                return RunResult::Failed(failure);
            }
        }
        info!(cases = test_cases.len(), "Script batch finished");
        batch.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Termination;
    use crate::runners::testing::ScriptedExecutor;
    use crate::runners::Limits;
    use crate::toolchain::Toolchain;
    use crate::workspace::Workspace;
    use codeiq_common::{CaseOutcome, FailurePolicy, Language};
    use std::sync::Arc;

    const LIMIT: Duration = Duration::from_millis(2000);

    fn runner(exec: Arc<ScriptedExecutor>, policy: FailurePolicy) -> ScriptRunner {
        ScriptRunner::new(RunnerContext {
            executor: exec,
            toolchain: Toolchain::builtin(Language::JavaScript),
            limits: Limits::default(),
            policy,
        })
    }

    fn raw(code: i32, stdout: &str, stderr: &str) -> RawOutput {
        RawOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            termination: Termination::exited(code),
            ..Default::default()
        }
    }

    #[test]
    fn test_interpret_success() {
        assert_eq!(interpret_script(&raw(0, "1\n2", ""), LIMIT), Ok("1\n2".to_string()));
    }

    #[test]
    fn test_interpret_syntax_error() {
        let failure = interpret_script(&raw(3, "", "Unexpected token '}'"), LIMIT).unwrap_err();
        assert_eq!(failure.stage, Stage::Compile);
        assert_eq!(failure.kind, ErrorKind::SyntaxError);
        assert_eq!(failure.message, "Unexpected token '}'");

        let failure = interpret_script(&raw(3, "", ""), LIMIT).unwrap_err();
        assert_eq!(failure.message, "Syntax Error");
    }

    #[test]
    fn test_interpret_engine_timeout() {
        let failure = interpret_script(
            &raw(1, "", "Script execution timed out after 2000ms"),
            LIMIT,
        )
        .unwrap_err();
        assert_eq!(failure.stage, Stage::Run);
        assert_eq!(failure.kind, ErrorKind::TimeLimitExceeded);
        assert_eq!(failure.message, ">2000ms");
    }

    #[test]
    fn test_interpret_backstop_timeout() {
        let timed_out = RawOutput {
            termination: Termination::timed_out(),
            ..Default::default()
        };
        let failure = interpret_script(&timed_out, LIMIT).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::TimeLimitExceeded);
    }

    #[test]
    fn test_interpret_thrown_error() {
        let failure = interpret_script(&raw(1, "", "x is not defined"), LIMIT).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::RuntimeError);
        assert_eq!(failure.message, "x is not defined");
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_case() {
        let tmp = tempfile::tempdir().unwrap();
        let mut staged = Workspace::new(tmp.path())
            .stage("console.log(prompt())", "js")
            .await
            .unwrap();
        let exec = Arc::new(
            ScriptedExecutor::new()
                .ok("a")
                .exit(1, "", "boom")
                .exit(1, "", "Script execution timed out after 2000ms")
                .ok("d"),
        );

        let result = runner(exec.clone(), FailurePolicy::Isolated)
            .run(
                &mut staged,
                &[
                    TestCase::new("t1", "a"),
                    TestCase::new("t2", "b"),
                    TestCase::new("t3", "c"),
                    TestCase::new("t4", "d"),
                ],
            )
            .await;

        let RunResult::Completed(outcomes) = result else {
            panic!("isolated batch must complete");
        };
        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            outcomes[0],
            CaseOutcome::Success { name: "t1".into(), output: "a".into() }
        );
        let CaseOutcome::Failure { error, .. } = &outcomes[2] else {
            panic!("t3 should have failed");
        };
        assert_eq!(error.kind, ErrorKind::TimeLimitExceeded);
        assert!(outcomes[3].is_success());

        let calls = exec.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].command.program, "node");
        assert_eq!(calls[0].command.args[2], "2000");
        assert_eq!(calls[0].stdin, "21\nconsole.log(prompt())a");
        assert_eq!(calls[0].timeout, Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_unreadable_source_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut staged = Workspace::new(tmp.path()).stage("1", "js").await.unwrap();
        std::fs::remove_file(staged.path()).unwrap();
        let exec = Arc::new(ScriptedExecutor::new());

        let result = runner(exec.clone(), FailurePolicy::Isolated)
            .run(&mut staged, &[TestCase::new("t1", "")])
            .await;

        let RunResult::Failed(failure) = result else {
            panic!("expected batch-level read error");
        };
        assert_eq!(failure.stage, Stage::Read);
        assert_eq!(failure.kind, ErrorKind::ReadError);
        assert!(exec.calls().is_empty());
    }
}
