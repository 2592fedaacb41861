//! CLI configuration

use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Default log filter directive for this level
    #[must_use]
    pub const fn log_directive(self) -> &'static str {
        match self {
            Self::Quiet | Self::Normal => "error",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Hit-counting strategy recorded in every profile of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMode {
    /// Whether each statement ran
    #[default]
    Set,
    /// Hit counts, safe under concurrent tests
    Atomic,
    /// Hit counts
    Count,
}

impl CoverageMode {
    /// Name as passed to `-covermode` and written in profile headers
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Atomic => "atomic",
            Self::Count => "count",
        }
    }

    /// Header line that opens a profile in this mode, newline included
    #[must_use]
    pub fn header(self) -> String {
        format!("mode: {}\n", self.as_str())
    }
}

impl fmt::Display for CoverageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Coverage mode for every test invocation
    pub mode: CoverageMode,
    /// Packages skipped entirely
    pub exclusions: BTreeSet<String>,
    /// Show a progress bar while testing
    pub progress: bool,
    /// Per-invocation timeout in seconds (0 = none)
    pub timeout_secs: u64,
    /// Summary output format
    pub format: OutputFormat,
    /// Project directory the toolchain runs in
    pub project_dir: PathBuf,
    /// Toolchain executable
    pub go_program: String,
    /// Copy the combined profile here before cleanup
    pub keep_profile: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
            mode: CoverageMode::Set,
            exclusions: BTreeSet::new(),
            progress: false,
            timeout_secs: 600,
            format: OutputFormat::Text,
            project_dir: PathBuf::from("."),
            go_program: "go".to_string(),
            keep_profile: None,
        }
    }
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set coverage mode
    #[must_use]
    pub const fn with_mode(mut self, mode: CoverageMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add packages to the exclusion set
    #[must_use]
    pub fn with_exclusions<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.extend(packages.into_iter().map(Into::into));
        self
    }

    /// Set progress display
    #[must_use]
    pub const fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Set per-invocation timeout in seconds
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set output format
    #[must_use]
    pub const fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set project directory
    #[must_use]
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Set toolchain executable
    #[must_use]
    pub fn with_go_program(mut self, program: impl Into<String>) -> Self {
        self.go_program = program.into();
        self
    }

    /// Keep the combined profile at the given path
    #[must_use]
    pub fn with_keep_profile(mut self, path: Option<PathBuf>) -> Self {
        self.keep_profile = path;
        self
    }

    /// Effective timeout, `None` when disabled
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}
