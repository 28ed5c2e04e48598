use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported submission languages
///
/// The wire tags double as the scratch file extension. The set is closed:
/// anything else is rejected at the deserialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "cpp", alias = "c++")]
    Cpp,
    #[serde(rename = "py", alias = "python")]
    Python,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "js", alias = "javascript")]
    JavaScript,
}

/// How a language gets from source text to a running program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageKind {
    /// Compiled once to a native executable, then run per test case
    NativeCompiled,
    /// Compiled once to bytecode named after the primary type
    Managed,
    /// Interpreter launched on the staged file per test case
    Interpreted,
    /// Evaluated in a fresh isolated script context per test case
    EmbeddedScript,
}

impl Language {
    /// Returns all language variants
    /// This is the single source of truth for available languages
    pub fn all_variants() -> &'static [Language] {
        &[
            Language::Cpp,
            Language::Python,
            Language::Java,
            Language::JavaScript,
        ]
    }

    /// Wire tag, also used as the staged file extension
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Python => "py",
            Language::Java => "java",
            Language::JavaScript => "js",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.tag()
    }

    pub fn kind(&self) -> LanguageKind {
        match self {
            Language::Cpp => LanguageKind::NativeCompiled,
            Language::Java => LanguageKind::Managed,
            Language::Python => LanguageKind::Interpreted,
            Language::JavaScript => LanguageKind::EmbeddedScript,
        }
    }

    /// Batch policy each runner follows unless configuration overrides it
    pub fn default_failure_policy(&self) -> FailurePolicy {
        match self.kind() {
            LanguageKind::EmbeddedScript => FailurePolicy::Isolated,
            _ => FailurePolicy::FailFast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown language '{0}' (expected one of: cpp, py, java, js)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Parse a language tag (case-insensitive, long names accepted)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpp" | "c++" => Ok(Language::Cpp),
            "py" | "python" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "js" | "javascript" => Ok(Language::JavaScript),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What a batch does after one test case fails at run stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// First failure aborts the batch and becomes the batch result
    FailFast,
    /// Each failure is recorded against its test case and the batch continues
    Isolated,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(FailurePolicy::FailFast),
            "isolated" => Ok(FailurePolicy::Isolated),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Test Case Definition (Immutable Input)
/// Ordering matters - execution is sequential and results keep this order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(rename = "data", alias = "inputData")]
    pub input: String,
}

impl TestCase {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
        }
    }
}

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Run,
    Read,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => write!(f, "compile"),
            Stage::Run => write!(f, "run"),
            Stage::Read => write!(f, "read"),
        }
    }
}

/// Stable error taxonomy surfaced to callers
/// Declaration order mirrors classification precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Read Error")]
    ReadError,
    #[serde(rename = "Syntax Error")]
    SyntaxError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::CompilationError => "Compilation Error",
            ErrorKind::RuntimeError => "Runtime Error",
            ErrorKind::TimeLimitExceeded => "Time Limit Exceeded",
            ErrorKind::MemoryLimitExceeded => "Memory Limit Exceeded",
            ErrorKind::ReadError => "Read Error",
            ErrorKind::SyntaxError => "Syntax Error",
        };
        f.write_str(label)
    }
}

/// A classified failure, returned as data rather than raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind} ({stage}): {message}")]
pub struct ExecutionFailure {
    #[serde(rename = "step")]
    pub stage: Stage,
    #[serde(rename = "errorType")]
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(Stage::Compile, ErrorKind::CompilationError, message)
    }

    pub fn run(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(Stage::Run, kind, message)
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::new(Stage::Read, ErrorKind::ReadError, message)
    }
}

/// Per-test-case outcome
///
/// Serializes as `{name, output}` or `{name, error: {step, errorType, error}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseOutcome {
    Success { name: String, output: String },
    Failure { name: String, error: ExecutionFailure },
}

impl CaseOutcome {
    pub fn name(&self) -> &str {
        match self {
            CaseOutcome::Success { name, .. } | CaseOutcome::Failure { name, .. } => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaseOutcome::Success { .. })
    }
}

/// Result of evaluating one submission
///
/// `Completed` holds one outcome per test case in input order. `Failed` is a
/// batch-level failure: a compile error, a read error, or the first run
/// failure of a fail-fast batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Completed(Vec<CaseOutcome>),
    Failed(ExecutionFailure),
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunResult::Completed(_))
    }
}

/// Response contract consumed by the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunResponse {
    Success {
        output: Vec<CaseOutcome>,
        /// Echoed test inputs (sample-run mode only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Vec<TestCase>>,
        /// Expected outputs for UI diffing (sample-run mode only)
        #[serde(
            rename = "expectedOutput",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        expected_output: Option<Vec<TestCase>>,
    },
    Error {
        step: Stage,
        #[serde(rename = "errorType")]
        error_type: ErrorKind,
        message: String,
    },
}

impl From<ExecutionFailure> for RunResponse {
    fn from(failure: ExecutionFailure) -> Self {
        RunResponse::Error {
            step: failure.stage,
            error_type: failure.kind,
            message: failure.message,
        }
    }
}
