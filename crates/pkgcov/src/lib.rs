//! pkgcov library
//!
//! Runs every package's tests in isolation with coverage enabled, merges the
//! per-package profiles into one, and reports a pass/fail status, the
//! combined coverage and the share of packages that have tests at all.
//!
//! The pipeline is sequential: one package at a time, one writer for the
//! combined profile.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod pipeline;
pub mod profile;
mod runner;
pub mod summary;
pub mod toolchain;

pub use commands::{Cli, ColorArg, FormatArg, ModeArg};
pub use config::{CliConfig, ColorChoice, CoverageMode, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_summary, render_summary, tested_fraction, OutputFormat, ProgressReporter};
pub use pipeline::{discover_units, Pipeline, RunSummary, RunTally};
pub use profile::{split_header_body, CombinedProfile, ProfileParts};
pub use runner::{Outcome, UnitRecord, UnitTestRunner};
pub use summary::{parse_total_line, summarize};
pub use toolchain::{GoToolchain, Invocation, InvocationStatus, Toolchain};

/// Run the whole pipeline with the real toolchain and render the summary.
pub fn run(config: &CliConfig) -> CliResult<(RunSummary, String)> {
    let go = GoToolchain::from_config(config);
    let summary = Pipeline::new(&go, config).execute()?;
    let line = render_summary(&summary, config.format)?;
    Ok((summary, line))
}
