// Interpreted runner: the interpreter is launched on the staged file per case

use super::{Batch, Runner, RunnerContext};
use crate::process::run_once;
use crate::toolchain::Placeholders;
use crate::workspace::StagedSource;
use async_trait::async_trait;
use codeiq_common::{RunResult, TestCase};
use std::ops::ControlFlow;
use tracing::{debug, instrument};

pub struct InterpretedRunner {
    ctx: RunnerContext,
}

impl InterpretedRunner {
    pub fn new(ctx: RunnerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Runner for InterpretedRunner {
    #[instrument(skip_all, fields(runner = "interpreted", cases = test_cases.len()))]
    async fn run(&self, staged: &mut StagedSource, test_cases: &[TestCase]) -> RunResult {
        // Syntax errors surface on the first case as a run-stage RuntimeError
        let run_cmd = self
            .ctx
            .toolchain
            .run
            .render(&Placeholders::new().set_path("source", staged.path()));

        let mut batch = Batch::new(self.ctx.policy, test_cases.len());
        for tc in test_cases {
            debug!(test = %tc.name, interpreter = %run_cmd.program, "Running test case");
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
