//! Build status tokens
//!
//! Copr reports a build's state as a short lowercase token. Only a handful
//! of them are terminal; anything unrecognised is treated as still running.

use std::fmt;
use std::str::FromStr;

/// State of a build as reported by the build service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    /// Source is being imported
    Importing,
    /// Waiting for a builder
    Pending,
    /// Builder is being prepared
    Starting,
    /// Build is in progress
    Running,
    /// Waiting on another build (`--after-build-id`)
    Waiting,
    /// Build finished successfully
    Succeeded,
    /// Copied from a forked project
    Forked,
    /// Skipped because an identical build already succeeded
    Skipped,
    /// Build failed
    Failed,
    /// Build was canceled
    Canceled,
    /// Token this tool does not know
    Unknown(String),
}

/// What a status means for whoever is waiting on the build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal, the build's outputs are available
    Success,
    /// Terminal, the build will never produce outputs
    Failure,
    /// Not terminal yet
    InProgress,
}

impl BuildStatus {
    /// Parse a status token as printed by the build service
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "importing" => Self::Importing,
            "pending" => Self::Pending,
            "starting" => Self::Starting,
            "running" => Self::Running,
            "waiting" => Self::Waiting,
            "succeeded" => Self::Succeeded,
            "forked" => Self::Forked,
            "skipped" => Self::Skipped,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Classify the status
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Succeeded | Self::Forked | Self::Skipped => Outcome::Success,
            Self::Failed | Self::Canceled => Outcome::Failure,
            _ => Outcome::InProgress,
        }
    }

    /// Check if no further transitions will happen
    pub fn is_terminal(&self) -> bool {
        self.outcome() != Outcome::InProgress
    }

    /// The status token
    pub fn as_str(&self) -> &str {
        match self {
            Self::Importing => "importing",
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Succeeded => "succeeded",
            Self::Forked => "forked",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown(token) => token,
        }
    }
}

impl FromStr for BuildStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
