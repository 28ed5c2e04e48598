/// Dispatch Layer
///
/// **Core Responsibility:**
/// Stage a submission, route it to the runner for its language, and hand
/// back whatever the runner produced.
///
/// **Guarantees:**
/// - No retries; the runner's result is returned as-is apart from redacting
///   the scratch root out of diagnostics
/// - The staged source and every artifact registered on it are gone before
///   `execute` returns
/// - Submissions share nothing but the scratch root, partitioned by token

use crate::process::{ProcessExecutor, TokioExecutor};
use crate::runners::{
    InterpretedRunner, Limits, ManagedRunner, NativeRunner, Runner, RunnerContext, ScriptRunner,
};
use crate::toolchain::Toolchains;
use crate::workspace::{StagedSource, Workspace};
use anyhow::{Context, Result};
use codeiq_common::types::LanguageKind;
use codeiq_common::{CaseOutcome, Config, ExecutionFailure, FailurePolicy, Language, RunResult, TestCase};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workspace_root: PathBuf,
    pub limits: Limits,
    /// Overrides every runner's default batch policy when set
    pub failure_policy: Option<FailurePolicy>,
    pub toolchains: Toolchains,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let toolchains = match &config.languages_config {
            Some(path) => Toolchains::load(path)
                .with_context(|| format!("Failed to load toolchains from {}", path.display()))?,
            None => Toolchains::builtin(),
        };

        Ok(Self {
            workspace_root: config.scratch_dir.clone(),
            limits: Limits {
                run: Duration::from_millis(config.time_limit_ms),
                compile: Duration::from_millis(config.compile_time_limit_ms),
                script_grace: Duration::from_millis(config.script_grace_ms),
            },
            failure_policy: config.failure_policy,
            toolchains,
        })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: root.into(),
            limits: Limits::default(),
            failure_policy: None,
            toolchains: Toolchains::builtin(),
        }
    }
}

pub struct Engine {
    workspace: Workspace,
    executor: Arc<dyn ProcessExecutor>,
    limits: Limits,
    failure_policy: Option<FailurePolicy>,
    toolchains: Toolchains,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_executor(config, Arc::new(TokioExecutor::new()))
    }

    pub fn with_executor(config: EngineConfig, executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            workspace: Workspace::new(config.workspace_root),
            executor,
            limits: config.limits,
            failure_policy: config.failure_policy,
            toolchains: config.toolchains,
        }
    }

    pub fn toolchains(&self) -> &Toolchains {
        &self.toolchains
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    fn runner_for(&self, language: Language) -> Box<dyn Runner> {
        let ctx = RunnerContext {
            executor: Arc::clone(&self.executor),
            toolchain: self.toolchains.get(language).clone(),
            limits: self.limits,
            policy: self
                .failure_policy
                .unwrap_or_else(|| language.default_failure_policy()),
        };
        match language.kind() {
            LanguageKind::NativeCompiled => Box::new(NativeRunner::new(ctx)),
            LanguageKind::Managed => Box::new(ManagedRunner::new(ctx)),
            LanguageKind::Interpreted => Box::new(InterpretedRunner::new(ctx)),
            LanguageKind::EmbeddedScript => Box::new(ScriptRunner::new(ctx)),
        }
    }

    /// Evaluate one submission against its test cases, in order
    #[instrument(skip_all, fields(language = %language, test_cases = test_cases.len()))]
    pub async fn execute(&self, source: &str, language: Language, test_cases: &[TestCase]) -> RunResult {
        let start = Instant::now();

        let mut staged = match self.workspace.stage(source, language.extension()).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(error = %e, "Failed to stage source");
                return RunResult::Failed(ExecutionFailure::read(format!(
                    "Could not stage source: {}",
                    e
                )));
            }
        };

        let result = self.runner_for(language).run(&mut staged, test_cases).await;
        let result = redact(&staged, result);
        drop(staged);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            RunResult::Completed(outcomes) => info!(
                elapsed_ms,
                succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
                "Submission completed"
            ),
            RunResult::Failed(failure) => info!(
                elapsed_ms,
                stage = %failure.stage,
                kind = %failure.kind,
                "Submission failed"
            ),
        }
        result
    }
}

fn redact(staged: &StagedSource, result: RunResult) -> RunResult {
    match result {
        RunResult::Failed(failure) => RunResult::Failed(staged.redact_failure(failure)),
        RunResult::Completed(outcomes) => RunResult::Completed(
            outcomes
                .into_iter()
                .map(|outcome| match outcome {
                    CaseOutcome::Failure { name, error } => CaseOutcome::Failure {
                        name,
                        error: staged.redact_failure(error),
                    },
                    success => success,
                })
                .collect(),
        ),
    }
}
