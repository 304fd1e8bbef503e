//! Error types for copr-rebuild
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::package::BuildId;

/// Package metadata validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Package name is empty
    #[error("Package name must not be empty")]
    EmptyName,

    /// Package name contains whitespace
    #[error("Package name '{name}' must not contain whitespace")]
    InvalidName { name: String },

    /// Missing required field
    #[error("Package '{package}' is missing required field '{field}'")]
    MissingField { package: String, field: String },
}

/// Dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Packages that can never become ready
    #[error("Dependency cycle detected among: {}", packages.join(", "))]
    DependencyCycle { packages: Vec<String> },

    /// Map key does not match the metadata it points to
    #[error("Package key '{key}' does not match metadata name '{name}'")]
    NameMismatch { key: String, name: String },
}

/// Metadata lookup errors
#[derive(Error, Debug)]
pub enum MetadataError {
    /// No build or no SRPM for the identifier
    #[error("No build metadata found for '{identifier}': {reason}")]
    NotFound { identifier: String, reason: String },

    /// The metadata query tool failed
    #[error("Metadata query failed for '{identifier}': {source}")]
    Query {
        identifier: String,
        #[source]
        source: SubmissionError,
    },

    /// The query tool answered with something we could not read
    #[error("Unexpected metadata response for '{identifier}': {error}")]
    InvalidResponse { identifier: String, error: String },

    /// Returned metadata failed validation
    #[error("Invalid metadata for '{identifier}': {source}")]
    Invalid {
        identifier: String,
        #[source]
        source: PackageError,
    },
}

/// A call into an external tool failed
///
/// Carries the invoked command and its captured output so the failure can
/// be diagnosed without re-running it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Command `{}` failed: {message}", command.join(" "))]
pub struct SubmissionError {
    /// Program and arguments
    pub command: Vec<String>,
    /// Short description of what went wrong
    pub message: String,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl SubmissionError {
    /// Create an error for a command that produced no usable output
    pub fn new(command: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            command,
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Attach captured output
    #[must_use]
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }
}

/// A batch submission stopped partway through
///
/// `submitted` lists every build the service accepted before it gave up.
/// Those builds keep running remotely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source}")]
pub struct BatchSubmissionError {
    /// The command that failed
    #[source]
    pub source: SubmissionError,
    /// Builds created before the failure, in submission order
    pub submitted: Vec<BuildId>,
}

impl From<SubmissionError> for BatchSubmissionError {
    fn from(source: SubmissionError) -> Self {
        Self {
            source,
            submitted: Vec::new(),
        }
    }
}

/// Build execution errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Submitting or querying a build failed
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// A batch submission failed after some builds were created
    #[error("{source} (already created: {})", join_ids(submitted))]
    PartialSubmission {
        #[source]
        source: SubmissionError,
        submitted: Vec<BuildId>,
    },

    /// A build reached a terminal non-success state
    #[error("Build {build_id} of '{package}' ended with status: {status}")]
    BuildFailed {
        build_id: BuildId,
        package: String,
        status: String,
        /// Builds still being tracked when the failure was observed
        outstanding: Vec<BuildId>,
    },

    /// A wave names a package with no metadata
    #[error("Wave {wave} references package '{package}' with no metadata")]
    UnknownPackage { wave: usize, package: String },

    /// The build service answered a batch with the wrong shape
    #[error("Build service returned {got} build ids for wave {wave}, expected {expected}")]
    BatchMismatch {
        wave: usize,
        expected: usize,
        got: usize,
    },

    /// The run was cancelled before every build finished
    #[error("Cancelled while waiting for {} build(s)", outstanding.len())]
    Cancelled { outstanding: Vec<BuildId> },
}

fn join_ids(ids: &[BuildId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Manifest loading and validation errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("Failed to read manifest '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Manifest file is not valid TOML for the schema
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// Project is not in owner/name form
    #[error("Copr project '{project}' must be in owner/name format")]
    InvalidProject { project: String },

    /// Manifest lists no packages
    #[error("Manifest lists no packages")]
    NoPackages,

    /// Same package listed twice
    #[error("Package '{name}' is listed more than once")]
    DuplicatePackage { name: String },

    /// Missing required field
    #[error("Package entry '{package}' is missing required field '{field}'")]
    MissingField { package: String, field: String },
}

/// Top-level copr-rebuild error type
#[derive(Error, Debug)]
pub enum RebuildError {
    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Metadata error
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Resolver error
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// A required external tool is not installed
    #[error("Required tool '{tool}' not found in PATH")]
    ToolNotFound { tool: String },
}

impl RebuildError {
    /// The failed command behind this error, if any
    pub fn submission(&self) -> Option<&SubmissionError> {
        match self {
            Self::Build(BuildError::Submission(e) | BuildError::PartialSubmission { source: e, .. })
            | Self::Metadata(MetadataError::Query { source: e, .. }) => Some(e),
            _ => None,
        }
    }
}
