//! Build progress observation
//!
//! The orchestrator reports what it does through a [`BuildObserver`]
//! handed to it by the caller instead of a process-wide logger.

use crate::core::package::{BuildId, BuildResult, BuildWave};
use crate::core::status::BuildStatus;

/// Receives orchestrator events
///
/// All methods default to doing nothing.
pub trait BuildObserver: Send + Sync {
    /// A wave's builds were accepted by the build service
    fn wave_submitted(&self, _wave: &BuildWave, _build_ids: &[BuildId]) {}

    /// A status poll returned
    fn build_status(&self, _package: &str, _build_id: BuildId, _status: &BuildStatus) {}

    /// A build reached a successful terminal state
    fn build_finished(&self, _result: &BuildResult) {}

    /// Every build of a wave finished successfully
    fn wave_finished(&self, _wave: &BuildWave) {}

    /// The run stopped early; `outstanding` lists builds left running
    fn run_failed(&self, _reason: &str, _outstanding: &[(BuildId, Option<BuildStatus>)]) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}

/// Observer that logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn wave_submitted(&self, wave: &BuildWave, build_ids: &[BuildId]) {
        tracing::info!(
            wave = wave.index,
            "Submitted wave {}: {:?} as builds {:?}",
            wave.index,
            wave.packages,
            build_ids
        );
    }

    fn build_status(&self, package: &str, build_id: BuildId, status: &BuildStatus) {
        tracing::info!(%build_id, package, "Build {build_id}: {status}");
    }

    fn build_finished(&self, result: &BuildResult) {
        tracing::debug!(
            build_id = %result.build_id,
            "Build of {} finished: {}",
            result.package_name,
            result.status
        );
    }

    fn wave_finished(&self, wave: &BuildWave) {
        tracing::info!("Wave {} complete", wave.index);
    }

    fn run_failed(&self, reason: &str, outstanding: &[(BuildId, Option<BuildStatus>)]) {
        tracing::error!("{reason}");
        for (build_id, status) in outstanding {
            match status {
                Some(status) => tracing::warn!("Build {build_id} left in state {status}"),
                None => tracing::warn!("Build {build_id} left with unknown state"),
            }
        }
    }
}
