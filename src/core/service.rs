//! External service abstractions
//!
//! The orchestrator and the plan builder talk to Koji and Copr only
//! through these traits, so tests can script both sides.

use async_trait::async_trait;

use crate::core::package::{BuildId, PackageMetadata};
use crate::core::status::BuildStatus;
use crate::error::{BatchSubmissionError, MetadataError, SubmissionError};

/// Source of package metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up name, provides and build requirements for a package
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::NotFound` when no build or no source
    /// artifact exists for the identifier.
    async fn get_package_metadata(&self, identifier: &str)
        -> Result<PackageMetadata, MetadataError>;
}

/// Extra settings applied to a build environment before submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Packages installed into the buildroot in addition to the defaults
    pub packages: Vec<String>,
    /// Conditionals passed to rpmbuild as `--without`
    pub rpmbuild_without: Vec<String>,
}

impl EnvironmentConfig {
    /// Check if there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.rpmbuild_without.is_empty()
    }
}

/// Remote build farm
///
/// Submissions are never retried by callers: a retried submission may
/// create a duplicate build.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Submit one build from a source artifact URL
    async fn submit_build(&self, artifact_location: &str) -> Result<BuildId, SubmissionError>;

    /// Submit every wave at once, letting the service enforce wave order
    ///
    /// Returns one id list per wave, in the same shape as the input.
    ///
    /// # Errors
    ///
    /// On failure the error lists every build created before it, so
    /// callers can account for builds that keep running.
    async fn submit_all_waves(
        &self,
        wave_artifacts: &[Vec<String>],
        timeout: Option<u64>,
    ) -> Result<Vec<Vec<BuildId>>, BatchSubmissionError>;

    /// Current status of a build
    async fn get_build_status(&self, build_id: BuildId) -> Result<BuildStatus, SubmissionError>;

    /// Apply buildroot settings to a named environment
    async fn configure_environment(
        &self,
        environment: &str,
        config: &EnvironmentConfig,
    ) -> Result<(), SubmissionError>;
}
