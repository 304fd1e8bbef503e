//! Status command implementation
//!
//! Implements `copr-rebuild status`: report the current state of builds,
//! for example the ones left running after a failed or interrupted run.

use anyhow::{bail, Result};
use futures::future::try_join_all;

use crate::cli::commands::copr_client;
use crate::cli::output::{is_json, is_quiet, status};
use crate::core::global_config::GlobalConfig;
use crate::core::package::BuildId;
use crate::core::service::BuildService;
use crate::core::status::Outcome;
use crate::error::{BuildError, RebuildError};

/// Execute the status command
pub async fn execute(global: &GlobalConfig, build_ids: &[BuildId]) -> Result<()> {
    // `copr-cli status` does not need a project
    let copr = copr_client(global, "")?;

    let statuses = try_join_all(build_ids.iter().map(|&id| copr.get_build_status(id)))
        .await
        .map_err(|e| RebuildError::from(BuildError::from(e)))?;

    if is_json() {
        let report: Vec<_> = build_ids
            .iter()
            .zip(&statuses)
            .map(|(id, build_status)| {
                serde_json::json!({
                    "build_id": id,
                    "status": build_status.as_str(),
                    "terminal": build_status.is_terminal(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !is_quiet() {
        for (id, build_status) in build_ids.iter().zip(&statuses) {
            let prefix = match build_status.outcome() {
                Outcome::Success => status::SUCCESS,
                Outcome::Failure => status::ERROR,
                Outcome::InProgress => status::INFO,
            };
            println!("{prefix} {id}: {build_status}");
        }
    }

    let failed = statuses
        .iter()
        .filter(|s| s.outcome() == Outcome::Failure)
        .count();
    if failed > 0 {
        bail!("{failed} of {} builds did not succeed", statuses.len());
    }
    Ok(())
}
