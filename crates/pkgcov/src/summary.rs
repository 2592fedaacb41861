//! Combined coverage summary
//!
//! `go tool cover -func` ends its report with a line such as
//! `total:	(statements)	81.3%`; only that percentage is kept.

use crate::error::{CliError, CliResult};
use crate::toolchain::Toolchain;
use regex::Regex;
use std::path::Path;
use tracing::debug;

const TOTAL_PATTERN: &str = r"total:[ \t]+\([a-z]+\)[ \t]+([0-9]*\.[0-9]*)";

/// Extract the percentage from a `total:` line
pub fn parse_total_line(line: &str) -> CliResult<f64> {
    let re = Regex::new(TOTAL_PATTERN).map_err(|e| CliError::summary_parse(e.to_string()))?;
    let captures = re
        .captures(line)
        .ok_or_else(|| CliError::summary_parse(format!("no total in {line:?}")))?;
    let value = &captures[1];
    value
        .parse::<f64>()
        .map_err(|e| CliError::summary_parse(format!("cannot convert coverage value {value:?}: {e}")))
}

/// Percentage from the last non-empty line of a report
pub fn parse_report(report: &str) -> CliResult<f64> {
    let last = report
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| CliError::summary_parse("report is empty"))?;
    parse_total_line(last)
}

/// Run the report tool on `profile` and return the total coverage.
pub fn summarize<T: Toolchain>(toolchain: &T, profile: &Path) -> CliResult<f64> {
    let invocation = toolchain.cover_func(profile);
    if !invocation.succeeded() {
        return Err(CliError::summary_unavailable(format!(
            "{}{}",
            invocation.status,
            first_line(&invocation.stderr)
                .map(|l| format!(": {l}"))
                .unwrap_or_default()
        )));
    }
    debug!(lines = invocation.stdout.lines().count(), "coverage report received");
    parse_report(&invocation.stdout)
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}
