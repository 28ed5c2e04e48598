/// Managed Runner
///
/// The managed toolchain insists the file be named after its public type,
/// so the source is copied into a private per-submission directory as
/// `<Name>.java` and compiled there. Two submissions that both declare
/// `public class Main` therefore never see each other's class files.

use super::{compile, Batch, Runner, RunnerContext};
use crate::process::run_once;
use crate::toolchain::Placeholders;
use crate::workspace::StagedSource;
use async_trait::async_trait;
use codeiq_common::{ExecutionFailure, RunResult, TestCase};
use lazy_static::lazy_static;
use regex::Regex;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Used when the source declares no public class
pub const DEFAULT_TYPE_NAME: &str = "Main";

lazy_static! {
    static ref PRIMARY_TYPE: Regex = Regex::new(
        r"public\s+(?:(?:final|abstract|strictfp)\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)"
    )
    .unwrap();
}

/// First `public class <Name>` declaration in the source, if any
pub fn extract_primary_type_name(source: &str) -> Option<String> {
    PRIMARY_TYPE
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct ManagedRunner {
    ctx: RunnerContext,
}

impl ManagedRunner {
    pub fn new(ctx: RunnerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Runner for ManagedRunner {
    #[instrument(skip_all, fields(runner = "managed", cases = test_cases.len()))]
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

        let class_name = extract_primary_type_name(&source).unwrap_or_else(|| {
            debug!("No public class found, falling back to {}", DEFAULT_TYPE_NAME);
            DEFAULT_TYPE_NAME.to_string()
        });

        let build_dir = match staged.private_dir().await {
            Ok(dir) => dir,
            Err(e) => {
                return RunResult::Failed(ExecutionFailure::read(format!(
                    "Could not prepare build directory: {}",
                    e
                )))
            }
        };
        let _class_files = ClassArtifacts::new(&build_dir, &class_name);

        let renamed = build_dir.join(format!("{}.java", class_name));
        if let Err(e) = tokio::fs::write(&renamed, &source).await {
            return RunResult::Failed(ExecutionFailure::read(format!(
                "Could not write {}.java: {}",
                class_name, e
            )));
        }

        let vars = Placeholders::new()
            .set_path("source", &renamed)
            .set_path("dir", &build_dir)
            .set("class", class_name.clone());

        let Some(compile_template) = &self.ctx.toolchain.compile else {
            return RunResult::Failed(ExecutionFailure::compile(format!(
                "No compiler configured for {}",
                self.ctx.toolchain.name
            )));
        };
        if let Err(failure) = compile(
            self.ctx.executor.as_ref(),
            &compile_template.render(&vars),
            self.ctx.limits.compile,
            self.ctx.toolchain.strict_diagnostics,
        )
        .await
        {
            return RunResult::Failed(failure);
        }
        info!(class = %class_name, "Compiled managed class");

        let run_cmd = self.ctx.toolchain.run.render(&vars);
        let mut batch = Batch::new(self.ctx.policy, test_cases.len());
        for tc in test_cases {
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

/// Removes `<Name>.class`, every `<Name>$*.class` and `<Name>.java` on drop
struct ClassArtifacts {
    dir: PathBuf,
    class_name: String,
}

impl ClassArtifacts {
    fn new(dir: &Path, class_name: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            class_name: class_name.to_string(),
        }
    }

    fn is_owned(&self, file_name: &str) -> bool {
        let name = self.class_name.as_str();
        file_name == format!("{}.class", name)
            || file_name == format!("{}.java", name)
            || (file_name.starts_with(&format!("{}$", name)) && file_name.ends_with(".class"))
    }
}

impl Drop for ClassArtifacts {
    fn drop(&mut self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list class files");
                return;
            }
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            if !self.is_owned(&file_name.to_string_lossy()) {
                continue;
            }
            if let Err(e) = std::fs::remove_file(entry.path()) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %entry.path().display(), error = %e, "Failed to remove class file");
                }
            }
        }
    }
}
