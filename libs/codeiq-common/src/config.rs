use crate::types::FailurePolicy;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the scratch area for staged sources and compiled artifacts
    pub scratch_dir: PathBuf,
    /// Wall-clock limit for a single test case run
    pub time_limit_ms: u64,
    /// Wall-clock limit for one compiler invocation
    pub compile_time_limit_ms: u64,
    /// Extra wall-clock granted to the script host process on top of the
    /// in-engine evaluation limit (process startup, context creation)
    pub script_grace_ms: u64,
    /// Forces one batch policy for every runner when set
    pub failure_policy: Option<FailurePolicy>,
    /// Optional languages.json overriding the built-in toolchains
    pub languages_config: Option<PathBuf>,
    pub bind_addr: String,
}

/// A configuration variable was set to something that does not parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {name}")]
pub struct InvalidVar {
    pub name: &'static str,
    pub value: String,
}

pub const DEFAULT_TIME_LIMIT_MS: u64 = 2000;
pub const DEFAULT_COMPILE_TIME_LIMIT_MS: u64 = 10_000;
pub const DEFAULT_SCRIPT_GRACE_MS: u64 = 1000;

impl Config {
    /// Unset variables take their defaults; set but unparseable ones are errors
    pub fn from_env() -> Result<Self, InvalidVar> {
        Ok(Self {
            scratch_dir: env::var("CODEIQ_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_scratch_dir()),
            time_limit_ms: parse_var("CODEIQ_TIME_LIMIT_MS")?.unwrap_or(DEFAULT_TIME_LIMIT_MS),
            compile_time_limit_ms: parse_var("CODEIQ_COMPILE_TIME_LIMIT_MS")?
                .unwrap_or(DEFAULT_COMPILE_TIME_LIMIT_MS),
            script_grace_ms: parse_var("CODEIQ_SCRIPT_GRACE_MS")?.unwrap_or(DEFAULT_SCRIPT_GRACE_MS),
            failure_policy: parse_var("CODEIQ_FAILURE_POLICY")?,
            languages_config: env::var("CODEIQ_LANGUAGES_CONFIG").ok().map(PathBuf::from),
            bind_addr: env::var("CODEIQ_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }

    /// Same defaults as `from_env`, rooted at an explicit scratch directory
    pub fn with_scratch_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            compile_time_limit_ms: DEFAULT_COMPILE_TIME_LIMIT_MS,
            script_grace_ms: DEFAULT_SCRIPT_GRACE_MS,
            failure_policy: None,
            languages_config: None,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    env::temp_dir().join("codeiq-scratch")
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, InvalidVar> {
    parse_value(name, env::var(name).ok())
}

fn parse_value<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, InvalidVar> {
    match raw {
        None => Ok(None),
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(InvalidVar { name, value }),
        },
    }
}
