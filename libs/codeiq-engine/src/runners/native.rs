// Native compiled runner: one compile, then the executable per test case

use super::{compile, Batch, Runner, RunnerContext};
use crate::process::run_once;
use crate::toolchain::Placeholders;
use crate::workspace::StagedSource;
use async_trait::async_trait;
use codeiq_common::{ExecutionFailure, RunResult, TestCase};
use std::ops::ControlFlow;
use tracing::{debug, info, instrument};

pub struct NativeRunner {
    ctx: RunnerContext,
}

impl NativeRunner {
    pub fn new(ctx: RunnerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Runner for NativeRunner {
    #[instrument(skip_all, fields(runner = "native", cases = test_cases.len()))]
    async fn run(&self, staged: &mut StagedSource, test_cases: &[TestCase]) -> RunResult {
        let artifact = staged.artifact("out");
        let vars = Placeholders::new()
            .set_path("source", staged.path())
            .set_path("artifact", &artifact);

        let Some(compile_template) = &self.ctx.toolchain.compile else {
            return RunResult::Failed(ExecutionFailure::compile(format!(
                "No compiler configured for {}",
                self.ctx.toolchain.name
            )));
        };
        let compile_cmd = compile_template.render(&vars);
        if let Err(failure) = compile(
            self.ctx.executor.as_ref(),
            &compile_cmd,
            self.ctx.limits.compile,
            self.ctx.toolchain.strict_diagnostics,
        )
        .await
        {
            return RunResult::Failed(failure);
        }
        info!(artifact = %staged.token(), "Compiled native executable");

        let run_cmd = self.ctx.toolchain.run.render(&vars);
        let mut batch = Batch::new(self.ctx.policy, test_cases.len());
        for tc in test_cases {
            debug!(test = %tc.name, "Running test case");
            let result = run_once(
                self.ctx.executor.as_ref(),
                &run_cmd,
                &tc.input,
                self.ctx.limits.run,
            )
            .await;
            if let ControlFlow::Break(failure) = batch.record(&tc.name, result) {
                return RunResult::Failed(failure);
            }
        }
        batch.finish()
    }
}
