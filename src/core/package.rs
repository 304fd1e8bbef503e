//! Package metadata and build plan records
//!
//! [`PackageMetadata`] is the identity and graph-edge information for one
//! source package. [`BuildWave`] and [`BuildResult`] are the values the
//! resolver and the orchestrator hand back to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::PackageError;

/// Opaque identifier assigned by the build service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(u64);

impl BuildId {
    /// Wrap a raw build service id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BuildId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Metadata about a source package
///
/// Immutable once built; construct through [`PackageMetadata::builder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageMetadata {
    name: String,
    version_identifier: String,
    artifact_location: String,
    provides: BTreeSet<String>,
    build_requires: BTreeSet<String>,
}

impl PackageMetadata {
    /// Start building metadata for the named source package
    pub fn builder(name: impl Into<String>) -> PackageMetadataBuilder {
        PackageMetadataBuilder::new(name)
    }

    /// Source package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name-version-release string
    pub fn version_identifier(&self) -> &str {
        &self.version_identifier
    }

    /// Where the buildable source artifact lives
    pub fn artifact_location(&self) -> &str {
        &self.artifact_location
    }

    /// Capabilities exposed by the package's binary outputs
    pub fn provides(&self) -> &BTreeSet<String> {
        &self.provides
    }

    /// Capabilities needed at build time
    pub fn build_requires(&self) -> &BTreeSet<String> {
        &self.build_requires
    }
}

/// Builder for [`PackageMetadata`]
#[derive(Debug, Clone, Default)]
pub struct PackageMetadataBuilder {
    name: String,
    version_identifier: String,
    artifact_location: String,
    provides: BTreeSet<String>,
    build_requires: BTreeSet<String>,
}

impl PackageMetadataBuilder {
    /// Create a builder for the named package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the name-version-release string
    #[must_use]
    pub fn version_identifier(mut self, nvr: impl Into<String>) -> Self {
        self.version_identifier = nvr.into();
        self
    }

    /// Set the source artifact location
    #[must_use]
    pub fn artifact_location(mut self, location: impl Into<String>) -> Self {
        self.artifact_location = location.into();
        self
    }

    /// Add provided capabilities
    #[must_use]
    pub fn provides<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.extend(caps.into_iter().map(Into::into));
        self
    }

    /// Add build-time requirements
    #[must_use]
    pub fn build_requires<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_requires.extend(caps.into_iter().map(Into::into));
        self
    }

    /// Validate and freeze the metadata
    pub fn build(self) -> Result<PackageMetadata, PackageError> {
        if self.name.is_empty() {
            return Err(PackageError::EmptyName);
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(PackageError::InvalidName { name: self.name });
        }
        if self.version_identifier.trim().is_empty() {
            return Err(PackageError::MissingField {
                package: self.name,
                field: "version_identifier".to_string(),
            });
        }
        if self.artifact_location.trim().is_empty() {
            return Err(PackageError::MissingField {
                package: self.name,
                field: "artifact_location".to_string(),
            });
        }

        Ok(PackageMetadata {
            name: self.name,
            version_identifier: self.version_identifier,
            artifact_location: self.artifact_location,
            provides: self.provides,
            build_requires: self.build_requires,
        })
    }
}

/// A group of packages that can be built in parallel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWave {
    /// Wave number (0-based)
    pub index: usize,
    /// Source package names in this wave, sorted
    pub packages: Vec<String>,
}

/// Result of a single finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    /// Source package name
    pub package_name: String,
    /// Build service id
    pub build_id: BuildId,
    /// Terminal status token
    pub status: String,
    /// Source artifact the build was submitted from
    pub artifact_location: String,
}
