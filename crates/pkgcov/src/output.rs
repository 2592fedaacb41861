//! Output formatting and progress reporting

use crate::error::{CliError, CliResult};
use crate::pipeline::RunSummary;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};

/// Output format for the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Percentage of attempted packages that had tests.
///
/// `attempted == 0` has no meaningful answer and is rejected.
pub fn tested_fraction(empty: usize, attempted: usize) -> CliResult<f64> {
    if attempted == 0 {
        return Err(CliError::invalid_argument(
            "tested fraction needs at least one attempted package",
        ));
    }
    if empty > attempted {
        return Err(CliError::invalid_argument(format!(
            "{empty} empty packages out of {attempted} attempted"
        )));
    }
    Ok(100.0 * (1.0 - empty as f64 / attempted as f64))
}

/// Format the one-line run status
pub fn format_summary(
    passed: bool,
    coverage: f64,
    empty: usize,
    attempted: usize,
) -> CliResult<String> {
    let with_tests = tested_fraction(empty, attempted)?;
    let status = if passed { "passed" } else { "failed" };
    Ok(format!(
        "status: {status}, coverage: {coverage:.1}%, packages with tests: {with_tests:.1}%"
    ))
}

/// JSON document for a run summary
#[derive(Debug, Serialize)]
struct SummaryDocument<'a> {
    status: &'static str,
    passed: bool,
    coverage: f64,
    empty: usize,
    attempted: usize,
    tested_fraction: f64,
    units: &'a [crate::runner::UnitRecord],
}

/// Render a summary in the requested format
pub fn render_summary(summary: &RunSummary, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Text => format_summary(
            summary.passed,
            summary.coverage,
            summary.empty,
            summary.attempted,
        ),
        OutputFormat::Json => {
            let doc = SummaryDocument {
                status: if summary.passed { "passed" } else { "failed" },
                passed: summary.passed,
                coverage: summary.coverage,
                empty: summary.empty,
                attempted: summary.attempted,
                tested_fraction: tested_fraction(summary.empty, summary.attempted)?,
                units: &summary.units,
            };
            serde_json::to_string(&doc).map_err(|e| CliError::invalid_argument(e.to_string()))
        }
    }
}

/// Progress reporter for the package loop
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` packages
    pub fn start_progress(&mut self, total: u64) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("Progress: {percent:>3}% [{bar:40.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.progress_bar = Some(pb);
    }

    /// Move the bar to `visited` packages out of the full list
    pub fn set_position(&self, visited: u64, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(visited);
            pb.set_message(message.to_string());
        }
    }

    /// Remove the bar so the summary line stands alone
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Whether a bar is active
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.progress_bar.is_some()
    }

    /// Print a per-package failure line
    pub fn failure(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a per-package note for packages without tests
    pub fn empty(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("∅").yellow().to_string()
        } else {
            "NONE".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    fn write_line(&self, line: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = self.term.write_line(line);
            }),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }
}
