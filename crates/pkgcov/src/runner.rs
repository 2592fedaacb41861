//! Per-package test runner

use crate::config::CoverageMode;
use crate::error::{CliError, CliResult};
use crate::profile::{split_header_body, CombinedProfile};
use crate::toolchain::{InvocationStatus, Toolchain};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info};

/// Classification of one package's test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Tests ran and produced coverage records
    Passed,
    /// Build or tests failed, or the run timed out
    Failed,
    /// Tests ran but left no coverage records
    Empty,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Empty => "empty",
        })
    }
}

/// Outcome recorded for one attempted package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Package import path
    pub unit: String,
    /// How its test run ended
    pub outcome: Outcome,
}

/// Runs one package at a time and feeds passing profiles into the merge
#[derive(Debug)]
pub struct UnitTestRunner<'a, T: Toolchain> {
    toolchain: &'a T,
    mode: CoverageMode,
    scratch_dir: PathBuf,
}

impl<'a, T: Toolchain> UnitTestRunner<'a, T> {
    /// Create a runner writing transient profiles under `scratch_dir`
    #[must_use]
    pub fn new(toolchain: &'a T, mode: CoverageMode, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            mode,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Coverage mode passed to every invocation
    #[must_use]
    pub const fn mode(&self) -> CoverageMode {
        self.mode
    }

    /// Test `package` and append its coverage body to `combined` on success.
    ///
    /// Per-package problems come back as [`Outcome::Failed`] or
    /// [`Outcome::Empty`]. The only error is a failed append, which is fatal.
    pub fn run<W: Write>(
        &self,
        package: &str,
        combined: &mut CombinedProfile<W>,
    ) -> CliResult<Outcome> {
        let profile = self.transient_profile()?;
        let outcome = self.run_with_profile(package, &profile, combined);
        if let Err(e) = profile.close() {
            info!(package, error = %e, "cannot remove transient profile");
        }
        let outcome = outcome?;
        info!(package, %outcome, "package tested");
        Ok(outcome)
    }

    fn transient_profile(&self) -> CliResult<TempPath> {
        tempfile::Builder::new()
            .prefix("pkgcov-")
            .suffix(".out")
            .tempfile_in(&self.scratch_dir)
            .map(tempfile::NamedTempFile::into_temp_path)
            .map_err(|e| {
                CliError::result_store(format!(
                    "cannot create transient profile in {}: {e}",
                    self.scratch_dir.display()
                ))
            })
    }

    fn run_with_profile<W: Write>(
        &self,
        package: &str,
        profile: &Path,
        combined: &mut CombinedProfile<W>,
    ) -> CliResult<Outcome> {
        let invocation = self.toolchain.test_package(package, self.mode, profile);
        match &invocation.status {
            InvocationStatus::Success => {}
            InvocationStatus::TimedOut => {
                info!(package, "test run timed out");
                return Ok(Outcome::Failed);
            }
            status => {
                debug!(package, %status, stderr = %invocation.stderr, "test run failed");
                return Ok(Outcome::Failed);
            }
        }

        let Ok(raw) = std::fs::read(profile) else {
            return Ok(Outcome::Empty);
        };
        let Some(parts) = split_header_body(&raw) else {
            return Ok(Outcome::Empty);
        };

        combined.append_body(parts.body)?;
        Ok(Outcome::Passed)
    }
}
