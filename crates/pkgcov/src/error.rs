//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
///
/// Every variant is fatal to the run. Per-package test failures are not
/// errors; they are folded into [`crate::Outcome`] and the run tally.
#[derive(Debug, Error)]
pub enum CliError {
    /// Package listing failed
    #[error("cannot get package list: {message}")]
    Discovery {
        /// Error message
        message: String,
    },

    /// Package listing succeeded but returned nothing
    #[error("no packages found")]
    NoUnits,

    /// Every listed package is in the exclusion set
    #[error("every discovered package is excluded")]
    AllExcluded,

    /// Combined profile could not be created or appended to
    #[error("cannot write coverage results: {message}")]
    ResultStore {
        /// Error message
        message: String,
    },

    /// Report tool failed on the combined profile
    #[error("cannot summarize coverage: {message}")]
    SummaryUnavailable {
        /// Error message
        message: String,
    },

    /// Report tool output did not contain a total line
    #[error("cannot parse coverage result: {message}")]
    SummaryParse {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a discovery error
    #[must_use]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Create a result store error
    #[must_use]
    pub fn result_store(message: impl Into<String>) -> Self {
        Self::ResultStore {
            message: message.into(),
        }
    }

    /// Create a summary unavailable error
    #[must_use]
    pub fn summary_unavailable(message: impl Into<String>) -> Self {
        Self::SummaryUnavailable {
            message: message.into(),
        }
    }

    /// Create a summary parse error
    #[must_use]
    pub fn summary_parse(message: impl Into<String>) -> Self {
        Self::SummaryParse {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Pipeline stage that produced the error
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Discovery { .. } | Self::NoUnits | Self::AllExcluded => "discovery",
            Self::ResultStore { .. } => "result store",
            Self::SummaryUnavailable { .. } | Self::SummaryParse { .. } => "summary",
            Self::InvalidArgument { .. } => "setup",
        }
    }

    /// Process exit code for this error class
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Discovery { .. } => 2,
            Self::NoUnits => 3,
            Self::ResultStore { .. } => 4,
            Self::SummaryUnavailable { .. } => 5,
            Self::SummaryParse { .. } => 6,
            Self::AllExcluded => 7,
            Self::InvalidArgument { .. } => 1,
        }
    }
}
