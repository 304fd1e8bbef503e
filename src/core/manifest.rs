//! Rebuild manifest (packages.toml) parsing and validation
//!
//! The manifest names the Copr project to build in, optional chroot
//! settings, and the Koji builds whose sources should be rebuilt.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::defaults;
use crate::core::service::EnvironmentConfig;
use crate::error::ManifestError;

/// Declarative list of packages to rebuild
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Copr project in owner/name format
    pub copr_project: String,

    /// Koji tag the builds come from
    #[serde(default = "default_koji_tag")]
    pub koji_tag: String,

    /// Chroots to configure before building
    #[serde(default)]
    pub chroots: Vec<String>,

    /// Extra packages installed into every configured chroot
    #[serde(default)]
    pub chroot_packages: Vec<String>,

    /// rpmbuild `--without` conditionals for every configured chroot
    #[serde(default)]
    pub rpmbuild_without: Vec<String>,

    /// Packages to rebuild
    #[serde(default)]
    pub packages: Vec<PackageEntry>,
}

/// A single package in the manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageEntry {
    /// Source package name
    pub name: String,

    /// Koji name-version-release to take the source from
    pub nvr: String,

    /// Why the package is needed
    #[serde(default)]
    pub note: Option<String>,
}

fn default_koji_tag() -> String {
    defaults::DEFAULT_KOJI_TAG.to_string()
}

impl Manifest {
    /// Parse and validate a manifest from TOML
    pub fn from_toml(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read, parse and validate a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Check structural rules serde cannot express
    pub fn validate(&self) -> Result<(), ManifestError> {
        let valid_project = self
            .copr_project
            .split_once('/')
            .is_some_and(|(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            });
        if !valid_project {
            return Err(ManifestError::InvalidProject {
                project: self.copr_project.clone(),
            });
        }

        if self.packages.is_empty() {
            return Err(ManifestError::NoPackages);
        }

        let mut seen = HashSet::new();
        for entry in &self.packages {
            if entry.name.trim().is_empty() {
                return Err(ManifestError::MissingField {
                    package: entry.nvr.clone(),
                    field: "name".to_string(),
                });
            }
            if entry.nvr.trim().is_empty() {
                return Err(ManifestError::MissingField {
                    package: entry.name.clone(),
                    field: "nvr".to_string(),
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ManifestError::DuplicatePackage {
                    name: entry.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Buildroot settings to apply to every chroot
    pub fn environment_config(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            packages: self.chroot_packages.clone(),
            rpmbuild_without: self.rpmbuild_without.clone(),
        }
    }
}
