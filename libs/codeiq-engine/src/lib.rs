pub mod aggregate;
pub mod dispatch;
pub mod process;
pub mod runners;
pub mod toolchain;
pub mod workspace;

#[cfg(test)]
mod engine_tests;

pub use aggregate::{into_response, into_sample_response, BatchSummary};
pub use dispatch::{Engine, EngineConfig};
pub use process::{ProcessExecutor, TokioExecutor};
pub use runners::Limits;
pub use toolchain::{Toolchain, Toolchains};
pub use workspace::{StagedSource, Workspace};
