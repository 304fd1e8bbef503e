//! Default configuration values

/// Seconds between build status polls
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Default number of parallel metadata lookups
pub const DEFAULT_METADATA_JOBS: usize = 4;

/// Default Koji tag packages are taken from
pub const DEFAULT_KOJI_TAG: &str = "f44";

/// Default manifest file name
pub const MANIFEST_FILE: &str = "packages.toml";

/// Global config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Copr command-line client
pub const COPR_CLI: &str = "copr-cli";

/// Koji command-line client
pub const KOJI_CLI: &str = "koji";
