//! Test pipeline: discover packages, test each, merge coverage, summarize.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::profile::CombinedProfile;
use crate::runner::{Outcome, UnitRecord, UnitTestRunner};
use crate::summary::summarize;
use crate::toolchain::Toolchain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use tracing::{debug, info};

const COMBINED_PROFILE: &str = "result.out";

/// List the project's packages in toolchain order.
pub fn discover_units<T: Toolchain>(toolchain: &T) -> CliResult<Vec<String>> {
    let invocation = toolchain.list_packages();
    if !invocation.succeeded() {
        return Err(CliError::discovery(invocation.status.to_string()));
    }

    let units: Vec<String> = invocation
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if units.is_empty() {
        return Err(CliError::NoUnits);
    }
    debug!(count = units.len(), "packages discovered");
    Ok(units)
}

/// Aggregate of the package loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    /// No attempted package failed
    pub passed: bool,
    /// Attempted packages that produced no coverage
    pub empty: usize,
    /// Packages not in the exclusion set
    pub attempted: usize,
    /// Outcome of each attempted package, in order
    pub units: Vec<UnitRecord>,
}

impl Default for RunTally {
    fn default() -> Self {
        Self {
            passed: true,
            empty: 0,
            attempted: 0,
            units: Vec::new(),
        }
    }
}

impl RunTally {
    /// Fold one package outcome into the tally
    pub fn record(&mut self, unit: &str, outcome: Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Passed => {}
            Outcome::Failed => self.passed = false,
            Outcome::Empty => self.empty += 1,
        }
        self.units.push(UnitRecord {
            unit: unit.to_string(),
            outcome,
        });
    }

    /// Number of packages with the given outcome
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.units.iter().filter(|r| r.outcome == outcome).count()
    }
}

/// Final result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// No attempted package failed
    pub passed: bool,
    /// Combined statement coverage in percent
    pub coverage: f64,
    /// Attempted packages that produced no coverage
    pub empty: usize,
    /// Packages not in the exclusion set
    pub attempted: usize,
    /// Outcome of each attempted package, in order
    pub units: Vec<UnitRecord>,
}

impl RunSummary {
    /// Combine a tally with the summarized coverage
    #[must_use]
    pub fn new(tally: RunTally, coverage: f64) -> Self {
        Self {
            passed: tally.passed,
            coverage,
            empty: tally.empty,
            attempted: tally.attempted,
            units: tally.units,
        }
    }
}

/// Drives one full run against a toolchain
#[derive(Debug)]
pub struct Pipeline<'a, T: Toolchain> {
    toolchain: &'a T,
    config: &'a CliConfig,
    reporter: ProgressReporter,
}

impl<'a, T: Toolchain> Pipeline<'a, T> {
    /// Create a pipeline; progress is shown only when enabled in `config`
    #[must_use]
    pub fn new(toolchain: &'a T, config: &'a CliConfig) -> Self {
        let quiet = config.verbosity.is_quiet() || !config.progress;
        let reporter = ProgressReporter::new(config.color.should_color(), quiet);
        Self {
            toolchain,
            config,
            reporter,
        }
    }

    /// Run every non-excluded package through `runner` in order.
    ///
    /// Per-package failures never stop the loop; an error here means the
    /// combined profile could not be written.
    pub fn orchestrate<W: Write>(
        &mut self,
        units: &[String],
        exclusions: &BTreeSet<String>,
        runner: &UnitTestRunner<'_, T>,
        combined: &mut CombinedProfile<W>,
    ) -> CliResult<RunTally> {
        let mut tally = RunTally::default();
        self.reporter.start_progress(units.len() as u64);

        for (index, unit) in units.iter().enumerate() {
            if exclusions.contains(unit) {
                debug!(package = %unit, "excluded");
                continue;
            }

            let outcome = match runner.run(unit, combined) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.reporter.finish();
                    return Err(e);
                }
            };
            tally.record(unit, outcome);

            match outcome {
                Outcome::Passed => {}
                Outcome::Failed => self.reporter.failure(unit),
                Outcome::Empty => self.reporter.empty(unit),
            }
            self.reporter.set_position(index as u64 + 1, unit);
        }

        self.reporter.finish();
        Ok(tally)
    }

    /// Discover, test, merge and summarize.
    pub fn execute(&mut self) -> CliResult<RunSummary> {
        let config = self.config;
        let units = discover_units(self.toolchain)?;

        let workdir = tempfile::Builder::new()
            .prefix("pkgcov-")
            .tempdir()
            .map_err(|e| CliError::result_store(format!("cannot create work directory: {e}")))?;
        let combined_path = workdir.path().join(COMBINED_PROFILE);
        let mut combined = CombinedProfile::create(&combined_path, config.mode)?;

        let runner = UnitTestRunner::new(self.toolchain, config.mode, workdir.path());
        let tally = self.orchestrate(&units, &config.exclusions, &runner, &mut combined)?;
        combined.flush()?;
        drop(combined);

        info!(
            attempted = tally.attempted,
            failed = tally.count(Outcome::Failed),
            empty = tally.empty,
            "package loop finished"
        );

        if tally.attempted == 0 {
            return Err(CliError::AllExcluded);
        }

        let coverage = summarize(self.toolchain, &combined_path)?;

        if let Some(ref keep) = config.keep_profile {
            std::fs::copy(&combined_path, keep).map_err(|e| {
                CliError::result_store(format!("cannot copy profile to {}: {e}", keep.display()))
            })?;
            info!(path = %keep.display(), "combined profile kept");
        }

        Ok(RunSummary::new(tally, coverage))
    }
}
