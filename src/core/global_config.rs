//! Global configuration management
//!
//! Reads user-level settings from `config.toml` in the config directory:
//! which Koji hub and Copr client to use, and default orchestration
//! settings. Values given on the command line win over everything here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::{defaults, urls};
use crate::core::orchestrator::Strategy;
use crate::infra::dirs::AppDirs;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global configuration for copr-rebuild
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// Koji settings
    #[serde(default)]
    pub koji: KojiConfig,

    /// Copr settings
    #[serde(default)]
    pub copr: CoprConfig,

    /// Default orchestration settings
    #[serde(default)]
    pub build: BuildConfig,
}

/// Koji configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KojiConfig {
    /// Hub URL passed to `koji --server`
    pub hub_url: Option<String>,

    /// Package download root used to build SRPM URLs
    pub topdir: Option<String>,

    /// Koji client executable
    pub cli: Option<PathBuf>,
}

/// Copr configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoprConfig {
    /// Copr client executable
    pub cli: Option<PathBuf>,

    /// Alternative copr-cli config file (`copr-cli --config`)
    pub config_file: Option<PathBuf>,
}

/// Default orchestration settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Submission strategy
    pub strategy: Option<Strategy>,

    /// Seconds between status polls
    pub poll_interval: Option<u64>,

    /// Per-build timeout handed to Copr, in seconds
    pub timeout: Option<u64>,

    /// Parallel metadata lookups
    pub metadata_jobs: Option<usize>,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    ///
    /// A missing file yields the default configuration.
    pub fn load(dirs: &AppDirs) -> Result<Self, GlobalConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| GlobalConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Get the effective Koji hub URL
    #[must_use]
    pub fn koji_hub_url(&self) -> &str {
        self.koji.hub_url.as_deref().unwrap_or(urls::KOJI_HUB)
    }

    /// Get the effective Koji download root
    #[must_use]
    pub fn koji_topdir(&self) -> &str {
        self.koji.topdir.as_deref().unwrap_or(urls::KOJI_TOPDIR)
    }

    /// Get the Koji client executable
    #[must_use]
    pub fn koji_cli(&self) -> &Path {
        self.koji
            .cli
            .as_deref()
            .unwrap_or_else(|| Path::new(defaults::KOJI_CLI))
    }

    /// Get the Copr client executable
    #[must_use]
    pub fn copr_cli(&self) -> &Path {
        self.copr
            .cli
            .as_deref()
            .unwrap_or_else(|| Path::new(defaults::COPR_CLI))
    }

    /// Get the effective submission strategy
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.build.strategy.unwrap_or_default()
    }

    /// Get the effective poll interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.build
                .poll_interval
                .unwrap_or(defaults::POLL_INTERVAL_SECS),
        )
    }

    /// Get the effective number of parallel metadata lookups
    #[must_use]
    pub fn metadata_jobs(&self) -> usize {
        self.build
            .metadata_jobs
            .unwrap_or(defaults::DEFAULT_METADATA_JOBS)
            .max(1)
    }
}
