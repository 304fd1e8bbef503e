//! Platform-specific directory lookup
//!
//! Only the config directory is used. `COPR_REBUILD_CONFIG_DIR` overrides
//! the platform default (`$XDG_CONFIG_HOME/copr-rebuild` on Linux).

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults;

/// Environment variable overriding the config directory
pub const ENV_CONFIG_DIR: &str = "COPR_REBUILD_CONFIG_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "copr-rebuild";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct AppDirs {
    config_dir: PathBuf,
}

impl AppDirs {
    /// Resolve directories from the environment or platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
        }
    }

    /// Use an explicit config directory
    #[must_use]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Get the config directory path
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the global config file path
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join(defaults::CONFIG_FILE)
    }

    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }
}

impl Default for AppDirs {
    fn default() -> Self {
        Self::new()
    }
}
