mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codeiq_common::Language;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codeiq-cli")]
#[command(about = "CodeIQ CLI - Run submissions locally and inspect testcase bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file against a testcase bundle and print the JSON response
    Run {
        /// Language tag (cpp, py, java, js)
        #[arg(short, long)]
        language: Language,

        /// Source file to execute
        #[arg(short, long)]
        source: PathBuf,

        /// Input bundle, test cases separated by blank lines
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Expected-output bundle; switches to a sample-run response
        #[arg(short, long)]
        expected: Option<PathBuf>,

        /// Per-test-case time limit in milliseconds
        #[arg(short, long)]
        time_limit_ms: Option<u64>,
    },

    /// Split a testcase bundle and print the named test cases as JSON
    Split {
        /// Bundle file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List configured languages and their toolchain commands
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            language,
            source,
            input,
            expected,
            time_limit_ms,
        } => {
            commands::run_source(
                language,
                &source,
                input.as_deref(),
                expected.as_deref(),
                time_limit_ms,
            )
            .await?;
        }
        Commands::Split { file } => {
            commands::split_bundle(&file)?;
        }
        Commands::Languages => {
            commands::list_languages()?;
        }
    }

    Ok(())
}
