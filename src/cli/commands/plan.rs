//! Plan command implementation
//!
//! Implements `copr-rebuild plan`: look up metadata, resolve the waves and
//! print them without touching Copr.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::commands::{koji_client, load_manifest};
use crate::cli::output::{create_spinner, is_json, is_quiet, verbosity};
use crate::core::global_config::GlobalConfig;
use crate::core::plan::{collect_metadata, RebuildPlan};
use crate::error::RebuildError;

/// Execute the plan command
pub async fn execute(
    global: &GlobalConfig,
    manifest_path: &Path,
    deps: bool,
    jobs: Option<usize>,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let koji = koji_client(global)?;
    let jobs = jobs.unwrap_or_else(|| global.metadata_jobs());

    let spinner = create_spinner(&format!(
        "Querying Koji for {} packages...",
        manifest.packages.len()
    ));
    let packages = collect_metadata(&koji, &manifest.packages, jobs).await;
    spinner.finish_and_clear();
    let packages = packages.map_err(RebuildError::from)?;

    let plan = RebuildPlan::new(&manifest, packages).map_err(RebuildError::from)?;

    if is_json() {
        let report = serde_json::to_string_pretty(&plan.report())
            .context("Failed to serialize build plan")?;
        println!("{report}");
    } else if !is_quiet() {
        print!("{}", plan.render_text(deps || verbosity() > 0));
    }

    Ok(())
}
