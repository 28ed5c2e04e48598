pub mod types;
pub mod config;
pub mod bundle;

// Re-export commonly used types for convenience
pub use types::{
    CaseOutcome, ErrorKind, ExecutionFailure, FailurePolicy, Language, RunResponse, RunResult,
    Stage, TestCase,
};
pub use config::{Config, InvalidVar};
