//! CLI command definitions using clap

use crate::config::{CliConfig, ColorChoice, CoverageMode, Verbosity};
use crate::output::OutputFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// pkgcov: test every package with coverage and report one combined number
#[derive(Parser, Debug)]
#[command(name = "pkgcov")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Exclude a package from the test pipeline (repeatable)
    #[arg(short = 'e', long = "exclude", value_name = "PACKAGE")]
    pub exclude: Vec<String>,

    /// Show progress of the test pipeline
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Coverage mode passed to every test run
    #[arg(short = 'm', long, default_value = "set")]
    pub mode: ModeArg,

    /// Per-invocation timeout in seconds (0 disables)
    #[arg(long, default_value = "600", value_name = "SECS")]
    pub timeout: u64,

    /// Summary output format
    #[arg(short = 'f', long, default_value = "text")]
    pub format: FormatArg,

    /// Project directory to run the toolchain in
    #[arg(short = 'C', long = "dir", default_value = ".")]
    pub dir: PathBuf,

    /// Toolchain executable
    #[arg(long = "go", env = "PKGCOV_GO", default_value = "go")]
    pub go: String,

    /// Keep the combined coverage profile at this path
    #[arg(long, value_name = "PATH")]
    pub keep_profile: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorArg,
}

impl Cli {
    /// Build the run configuration from parsed arguments
    #[must_use]
    pub fn to_config(&self) -> CliConfig {
        let verbosity = if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Debug,
            }
        };

        CliConfig::new()
            .with_verbosity(verbosity)
            .with_color(self.color.clone().into())
            .with_mode(self.mode.clone().into())
            .with_exclusions(self.exclude.iter().cloned())
            .with_progress(self.progress)
            .with_timeout_secs(self.timeout)
            .with_format(self.format.clone().into())
            .with_project_dir(self.dir.clone())
            .with_go_program(self.go.clone())
            .with_keep_profile(self.keep_profile.clone())
    }
}

/// Coverage mode argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ModeArg {
    /// Record whether each statement ran
    #[default]
    Set,
    /// Count hits, safe for parallel tests
    Atomic,
    /// Count hits
    Count,
}

impl From<ModeArg> for CoverageMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Set => Self::Set,
            ModeArg::Atomic => Self::Atomic,
            ModeArg::Count => Self::Count,
        }
    }
}

/// Summary format argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum FormatArg {
    /// One human-readable line
    #[default]
    Text,
    /// One JSON object
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color choice argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
