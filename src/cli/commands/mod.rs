//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod plan;
pub mod rebuild;
pub mod status;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::global_config::GlobalConfig;
use crate::core::manifest::Manifest;
use crate::core::orchestrator::Strategy;
use crate::core::package::BuildId;
use crate::error::RebuildError;
use crate::infra::copr::CoprClient;
use crate::infra::dirs::AppDirs;
use crate::infra::koji::KojiClient;
use crate::infra::process::require_tool;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute and display the build plan without submitting builds
    Plan {
        /// Path to the rebuild manifest
        #[arg(short, long, default_value = defaults::MANIFEST_FILE)]
        manifest: PathBuf,

        /// Show the in-project dependencies of each package
        #[arg(long)]
        deps: bool,

        /// Number of parallel metadata lookups
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Submit every package to Copr and wait for the builds
    Rebuild {
        /// Path to the rebuild manifest
        #[arg(short, long, default_value = defaults::MANIFEST_FILE)]
        manifest: PathBuf,

        /// Submission strategy (batch or sequential)
        #[arg(short, long)]
        strategy: Option<Strategy>,

        /// Seconds between status polls
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,

        /// Per-build timeout passed to Copr, in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Number of parallel metadata lookups
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Stop waiting after this many seconds
        #[arg(long, value_name = "SECS")]
        max_wait: Option<u64>,
    },

    /// Show the current status of Copr builds
    Status {
        /// Build IDs to query
        #[arg(required = true)]
        build_ids: Vec<BuildId>,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        let global = load_global_config()?;
        match self {
            Self::Plan {
                manifest,
                deps,
                jobs,
            } => plan::execute(&global, &manifest, deps, jobs).await,
            Self::Rebuild {
                manifest,
                strategy,
                poll_interval,
                timeout,
                jobs,
                max_wait,
            } => {
                let options = rebuild::RebuildOptions {
                    strategy,
                    poll_interval,
                    timeout,
                    jobs,
                    max_wait,
                };
                rebuild::execute(&global, &manifest, options).await
            }
            Self::Status { build_ids } => status::execute(&global, &build_ids).await,
        }
    }
}

fn load_global_config() -> Result<GlobalConfig> {
    let dirs = AppDirs::new();
    GlobalConfig::load(&dirs).with_context(|| {
        format!(
            "Failed to load global configuration from {}",
            dirs.global_config_path().display()
        )
    })
}

/// Load and validate the manifest
pub(crate) fn load_manifest(path: &Path) -> Result<Manifest> {
    let manifest = Manifest::load(path)
        .map_err(RebuildError::from)
        .with_context(|| format!("Failed to load manifest {}", path.display()))?;
    tracing::info!(
        "Loaded manifest for {} with {} packages",
        manifest.copr_project,
        manifest.packages.len()
    );
    Ok(manifest)
}

/// Koji client configured from the global config
pub(crate) fn koji_client(global: &GlobalConfig) -> Result<KojiClient> {
    let program = require_tool(global.koji_cli())?;
    Ok(KojiClient::new()
        .with_program(program)
        .with_hub_url(global.koji_hub_url())
        .with_topdir(global.koji_topdir()))
}

/// Copr client for `project` configured from the global config
pub(crate) fn copr_client(global: &GlobalConfig, project: &str) -> Result<CoprClient> {
    let program = require_tool(global.copr_cli())?;
    Ok(CoprClient::new(project)
        .with_program(program)
        .with_config_file(global.copr.config_file.clone()))
}
