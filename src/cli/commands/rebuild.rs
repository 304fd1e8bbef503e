//! Rebuild command implementation
//!
//! Implements `copr-rebuild rebuild`: resolve the waves, configure the
//! chroots, submit every build and wait for the results.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::commands::{copr_client, koji_client, load_manifest};
use crate::cli::output::{
    create_spinner, is_json, is_quiet, print_detail, print_info, print_success, ProgressObserver,
};
use crate::core::global_config::GlobalConfig;
use crate::core::observer::{BuildObserver, TracingObserver};
use crate::core::orchestrator::{BuildOrchestrator, Strategy};
use crate::core::plan::{collect_metadata, RebuildPlan};
use crate::error::RebuildError;

/// Rebuild options from the command line
#[derive(Debug, Default)]
pub struct RebuildOptions {
    /// Submission strategy
    pub strategy: Option<Strategy>,
    /// Seconds between status polls
    pub poll_interval: Option<u64>,
    /// Per-build timeout passed to Copr
    pub timeout: Option<u64>,
    /// Parallel metadata lookups
    pub jobs: Option<usize>,
    /// Give up waiting after this many seconds
    pub max_wait: Option<u64>,
}

/// Execute the rebuild command
pub async fn execute(
    global: &GlobalConfig,
    manifest_path: &Path,
    options: RebuildOptions,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let koji = koji_client(global)?;
    let copr = copr_client(global, &manifest.copr_project)?;

    let jobs = options.jobs.unwrap_or_else(|| global.metadata_jobs());
    let spinner = create_spinner(&format!(
        "Querying Koji for {} packages...",
        manifest.packages.len()
    ));
    let packages = collect_metadata(&koji, &manifest.packages, jobs).await;
    spinner.finish_and_clear();
    let packages = packages.map_err(RebuildError::from)?;

    let plan = RebuildPlan::new(&manifest, packages).map_err(RebuildError::from)?;
    print_info(&format!(
        "Rebuilding {} packages in {} waves on {}",
        plan.packages().len(),
        plan.waves().len(),
        manifest.copr_project
    ));

    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());
    if let Some(secs) = options.max_wait {
        cancel_after(cancel.clone(), Duration::from_secs(secs));
    }

    let progress = (!is_quiet() && !is_json())
        .then(|| Arc::new(ProgressObserver::new(plan.packages().len())));
    let observer: Arc<dyn BuildObserver> = match &progress {
        Some(progress) => Arc::clone(progress) as Arc<dyn BuildObserver>,
        None => Arc::new(TracingObserver),
    };

    let poll_interval = options
        .poll_interval
        .map_or_else(|| global.poll_interval(), Duration::from_secs);
    let orchestrator = BuildOrchestrator::new(&copr)
        .with_strategy(options.strategy.unwrap_or_else(|| global.strategy()))
        .with_poll_interval(poll_interval)
        .with_submit_timeout(options.timeout.or(global.build.timeout))
        .with_observer(observer)
        .with_cancellation(cancel);

    orchestrator
        .configure_environments(&manifest.chroots, &manifest.environment_config())
        .await
        .map_err(RebuildError::from)
        .context("Failed to configure chroots")?;

    let outcome = orchestrator.execute(plan.waves(), plan.packages()).await;
    if let Some(progress) = &progress {
        progress.finish();
    }
    let results = outcome.map_err(RebuildError::from)?;

    if is_json() {
        let output = serde_json::to_string_pretty(&results)
            .context("Failed to serialize build results")?;
        println!("{output}");
        return Ok(());
    }

    print_success(&format!("All {} builds succeeded", results.len()));
    for result in &results {
        print_detail(&format!(
            "{} #{} {}",
            result.package_name, result.build_id, result.status
        ));
    }
    Ok(())
}

/// Cancel the run on Ctrl-C
fn watch_for_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            cancel.cancel();
        }
    });
}

/// Cancel the run once `deadline` has passed
fn cancel_after(cancel: CancellationToken, deadline: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(deadline) => {
                tracing::warn!("Gave up waiting after {}s", deadline.as_secs());
                cancel.cancel();
            }
        }
    });
}
