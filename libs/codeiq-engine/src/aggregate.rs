/// Result Aggregator
///
/// **Core Responsibility:**
/// Fold a `RunResult` into the single response the caller sees.
///
/// - A completed batch becomes `{status: "success", output: [...]}`, which
///   for isolated batches may mix outputs and embedded error objects
/// - A batch-level failure becomes `{status: "error", step, errorType, message}`
/// - Sample runs additionally echo the inputs and expected outputs so a UI
///   can diff them; no verdict is assigned here

use codeiq_common::{CaseOutcome, RunResponse, RunResult, TestCase};
use tracing::{info, warn};

/// Counts over one completed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful outputs equal to their expected output, when one was given
    pub matched: Option<usize>,
}

/// Whitespace-insensitive at both ends, exact otherwise
fn normalize_output(output: &str) -> &str {
    output.trim()
}

pub fn summarize(outcomes: &[CaseOutcome], expected: Option<&[TestCase]>) -> BatchSummary {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let matched = expected.map(|expected| {
        outcomes
            .iter()
            .filter(|outcome| match outcome {
                CaseOutcome::Success { name, output } => expected
                    .iter()
                    .find(|e| &e.name == name)
                    .map_or(false, |e| normalize_output(&e.input) == normalize_output(output)),
                CaseOutcome::Failure { .. } => false,
            })
            .count()
    });

    BatchSummary {
        total: outcomes.len(),
        succeeded,
        failed: outcomes.len() - succeeded,
        matched,
    }
}

/// True when outcomes line up one-to-one with the test cases, by name
pub fn names_match(outcomes: &[CaseOutcome], test_cases: &[TestCase]) -> bool {
    outcomes.len() == test_cases.len()
        && outcomes
            .iter()
            .zip(test_cases)
            .all(|(outcome, tc)| outcome.name() == tc.name)
}

pub fn into_response(result: RunResult) -> RunResponse {
    match result {
        RunResult::Completed(output) => {
            let summary = summarize(&output, None);
            info!(
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Batch aggregated"
            );
            RunResponse::Success {
                output,
                input: None,
                expected_output: None,
            }
        }
        RunResult::Failed(failure) => {
            info!(step = %failure.stage, error_type = %failure.kind, "Batch failed");
            failure.into()
        }
    }
}

/// Sample-run response: outcomes plus the raw inputs and expected outputs
pub fn into_sample_response(
    result: RunResult,
    test_cases: &[TestCase],
    expected_output: Option<Vec<TestCase>>,
) -> RunResponse {
    match result {
        RunResult::Completed(output) => {
            if !names_match(&output, test_cases) {
                warn!(
                    outcomes = output.len(),
                    test_cases = test_cases.len(),
                    "Outcomes do not line up with test cases"
                );
            }
            let summary = summarize(&output, expected_output.as_deref());
            info!(
                total = summary.total,
                succeeded = summary.succeeded,
                matched = ?summary.matched,
                "Sample batch aggregated"
            );
            RunResponse::Success {
                output,
                input: Some(test_cases.to_vec()),
                expected_output,
            }
        }
        RunResult::Failed(failure) => into_response(RunResult::Failed(failure)),
    }
}
