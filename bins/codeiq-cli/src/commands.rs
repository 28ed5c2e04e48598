// CLI commands for running submissions locally
use anyhow::{Context, Result};
use codeiq_common::bundle::parse_bundle;
use codeiq_common::{Config, Language, TestCase};
use codeiq_engine::toolchain::CommandTemplate;
use codeiq_engine::{into_response, into_sample_response, Engine, EngineConfig, Toolchain};
use std::fs;
use std::path::Path;

fn read_bundle(path: &Path) -> Result<Vec<TestCase>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle {}", path.display()))?;
    Ok(parse_bundle(&text))
}

/// Test cases for a run; without a bundle the program gets one empty input
fn load_cases(input: Option<&Path>) -> Result<Vec<TestCase>> {
    match input {
        Some(path) => read_bundle(path),
        None => Ok(vec![TestCase::new("testcase 1", "")]),
    }
}

pub async fn run_source(
    language: Language,
    source: &Path,
    input: Option<&Path>,
    expected: Option<&Path>,
    time_limit_ms: Option<u64>,
) -> Result<()> {
    let code = fs::read_to_string(source)
        .with_context(|| format!("Failed to read source {}", source.display()))?;
    let test_cases = load_cases(input)?;
    let expected_output = expected.map(read_bundle).transpose()?;

    let mut config = Config::from_env()?;
    if let Some(ms) = time_limit_ms {
        config.time_limit_ms = ms;
    }
    let engine = Engine::new(EngineConfig::from_config(&config)?);

    let result = engine.execute(&code, language, &test_cases).await;
    let response = match expected_output {
        Some(expected) => into_sample_response(result, &test_cases, Some(expected)),
        None => into_response(result),
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub fn split_bundle(file: &Path) -> Result<()> {
    let cases = read_bundle(file)?;
    println!("{}", serde_json::to_string_pretty(&cases)?);
    Ok(())
}

fn render_template(template: &CommandTemplate) -> String {
    std::iter::once(template.command.as_str())
        .chain(template.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(toolchain: &Toolchain) -> String {
    let mut line = format!("{:<5}", toolchain.name.tag());
    if let Some(compile) = &toolchain.compile {
        line.push_str(&format!(" compile: {}", render_template(compile)));
        if toolchain.strict_diagnostics {
            line.push_str(" (warnings fatal)");
        }
        line.push(';');
    }
    line.push_str(&format!(" run: {}", render_template(&toolchain.run)));
    line
}

pub fn list_languages() -> Result<()> {
    let engine_config = EngineConfig::from_config(&Config::from_env()?)?;
    let toolchains = &engine_config.toolchains;

    println!("Configured languages:");
    for lang in toolchains.list_languages() {
        println!("  {}", describe(toolchains.get(lang)));
    }
    Ok(())
}
