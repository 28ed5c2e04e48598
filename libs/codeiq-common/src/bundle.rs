//! Testcase bundles
//!
//! Problem setters upload inputs (and expected outputs) as one text file with
//! test cases separated by blank lines. Blocks become `testcase 1`,
//! `testcase 2`, ... in file order, with surrounding whitespace trimmed.

use crate::types::TestCase;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BLANK_LINE: Regex = Regex::new(r"\r?\n\s*\r?\n").unwrap();
}

/// Split a bundle into named test cases; empty blocks are dropped but still
/// consume a number, so names line up with a paired expected-output bundle
pub fn parse_bundle(text: &str) -> Vec<TestCase> {
    BLANK_LINE
        .split(text)
        .enumerate()
        .map(|(idx, block)| TestCase::new(format!("testcase {}", idx + 1), block.trim()))
        .filter(|tc| !tc.input.is_empty())
        .collect()
}
