//! Build orchestration logic
//!
//! Submits build waves to a [`BuildService`] and waits for every build to
//! reach a terminal state, failing on the first build that does not
//! succeed.
//!
//! Two strategies are supported:
//!
//! - [`Strategy::Batch`] submits every wave in one call and lets the build
//!   service hold each wave back until the previous one is done.
//! - [`Strategy::Sequential`] submits one wave, waits for all of it, then
//!   moves on. No build of wave N+1 exists before wave N succeeded.
//!
//! Waiting polls all outstanding builds once per round and sleeps for the
//! poll interval between rounds. There is no upper bound on the number of
//! rounds; stop a run through its [`CancellationToken`].

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::defaults;
use crate::core::observer::{BuildObserver, TracingObserver};
use crate::core::package::{BuildId, BuildResult, BuildWave, PackageMetadata};
use crate::core::service::{BuildService, EnvironmentConfig};
use crate::core::status::{BuildStatus, Outcome};
use crate::error::{BatchSubmissionError, BuildError, SubmissionError};

/// How waves are handed to the build service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Submit everything up front with ordering hints
    #[default]
    Batch,
    /// Submit and finish one wave at a time
    Sequential,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => write!(f, "batch"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(Self::Batch),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!(
                "unknown strategy '{other}', expected 'batch' or 'sequential'"
            )),
        }
    }
}

/// A submitted build and the package it belongs to
#[derive(Debug, Clone, Copy)]
struct Tracked<'a> {
    package: &'a str,
    artifact: &'a str,
    build_id: BuildId,
}

/// Drives builds of resolved waves against a build service
pub struct BuildOrchestrator<'a> {
    service: &'a dyn BuildService,
    strategy: Strategy,
    poll_interval: Duration,
    submit_timeout: Option<u64>,
    observer: Arc<dyn BuildObserver>,
    cancel: CancellationToken,
}

impl<'a> BuildOrchestrator<'a> {
    /// Create an orchestrator with default settings
    pub fn new(service: &'a dyn BuildService) -> Self {
        Self {
            service,
            strategy: Strategy::default(),
            poll_interval: Duration::from_secs(defaults::POLL_INTERVAL_SECS),
            submit_timeout: None,
            observer: Arc::new(TracingObserver),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the submission strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the delay between status polls
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-build timeout passed to the build service (seconds)
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Option<u64>) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Set the observer that receives progress events
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the token that stops waiting when cancelled
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the submission strategy
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Apply buildroot settings to each environment
    ///
    /// Does nothing when the settings are empty.
    pub async fn configure_environments(
        &self,
        environments: &[String],
        config: &EnvironmentConfig,
    ) -> Result<(), BuildError> {
        if config.is_empty() {
            return Ok(());
        }
        for environment in environments {
            tracing::info!("Configuring build environment {environment}");
            self.service
                .configure_environment(environment, config)
                .await?;
        }
        Ok(())
    }

    /// Build every wave and wait for all builds to succeed
    ///
    /// Results are ordered by wave, then by position within the wave.
    pub async fn execute(
        &self,
        waves: &[BuildWave],
        metadata: &HashMap<String, PackageMetadata>,
    ) -> Result<Vec<BuildResult>, BuildError> {
        let planned = plan_artifacts(waves, metadata)?;
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled {
                outstanding: Vec::new(),
            });
        }

        tracing::info!(
            "Building {} packages in {} waves ({} strategy)",
            planned.iter().map(Vec::len).sum::<usize>(),
            waves.len(),
            self.strategy
        );

        match self.strategy {
            Strategy::Batch => self.execute_batch(waves, &planned).await,
            Strategy::Sequential => self.execute_sequential(waves, &planned).await,
        }
    }

    async fn execute_batch(
        &self,
        waves: &[BuildWave],
        planned: &[Vec<(&str, &str)>],
    ) -> Result<Vec<BuildResult>, BuildError> {
        let artifacts: Vec<Vec<String>> = planned
            .iter()
            .map(|wave| wave.iter().map(|(_, url)| (*url).to_string()).collect())
            .collect();

        let ids = match self
            .service
            .submit_all_waves(&artifacts, self.submit_timeout)
            .await
        {
            Ok(ids) => ids,
            Err(BatchSubmissionError { source, submitted }) => {
                let outstanding = submitted.iter().map(|id| (*id, None)).collect();
                let error = if submitted.is_empty() {
                    BuildError::Submission(source)
                } else {
                    BuildError::PartialSubmission { source, submitted }
                };
                self.report(&error, outstanding);
                return Err(error);
            }
        };

        let mut tracked = Vec::new();
        for (index, (wave, packages)) in waves.iter().zip(planned).enumerate() {
            let wave_ids = ids.get(index).map_or(&[][..], Vec::as_slice);
            if wave_ids.len() != packages.len() {
                let submitted: Vec<BuildId> = ids.iter().flatten().copied().collect();
                let error = BuildError::BatchMismatch {
                    wave: index,
                    expected: packages.len(),
                    got: wave_ids.len(),
                };
                self.report(&error, submitted.into_iter().map(|id| (id, None)).collect());
                return Err(error);
            }

            self.observer.wave_submitted(wave, wave_ids);
            tracked.extend(packages.iter().zip(wave_ids).map(
                |(&(package, artifact), &build_id)| Tracked {
                    package,
                    artifact,
                    build_id,
                },
            ));
        }

        self.wait_for_all(&tracked).await
    }

    async fn execute_sequential(
        &self,
        waves: &[BuildWave],
        planned: &[Vec<(&str, &str)>],
    ) -> Result<Vec<BuildResult>, BuildError> {
        let mut results = Vec::new();

        for (wave, packages) in waves.iter().zip(planned) {
            if self.cancel.is_cancelled() {
                let error = BuildError::Cancelled {
                    outstanding: Vec::new(),
                };
                self.report(&error, Vec::new());
                return Err(error);
            }

            let submitted = join_all(
                packages
                    .iter()
                    .map(|(_, artifact)| self.service.submit_build(artifact)),
            )
            .await;

            let (ok, failed): (Vec<_>, Vec<_>) = submitted.into_iter().partition(Result::is_ok);
            let ids: Vec<BuildId> = ok.into_iter().filter_map(Result::ok).collect();
            if let Some(error) = failed.into_iter().find_map(Result::err) {
                let error = BuildError::Submission(error);
                self.report(&error, ids.into_iter().map(|id| (id, None)).collect());
                return Err(error);
            }

            self.observer.wave_submitted(wave, &ids);
            let tracked: Vec<Tracked> = packages
                .iter()
                .zip(&ids)
                .map(|(&(package, artifact), &build_id)| Tracked {
                    package,
                    artifact,
                    build_id,
                })
                .collect();

            results.extend(self.wait_for_all(&tracked).await?);
            self.observer.wave_finished(wave);
        }

        Ok(results)
    }

    /// Poll until every tracked build is terminal
    async fn wait_for_all(&self, tracked: &[Tracked<'_>]) -> Result<Vec<BuildResult>, BuildError> {
        let mut finished: HashMap<BuildId, BuildResult> = HashMap::new();
        let mut last_seen: HashMap<BuildId, BuildStatus> = HashMap::new();

        loop {
            let pending: Vec<&Tracked> = tracked
                .iter()
                .filter(|t| !finished.contains_key(&t.build_id))
                .collect();
            if pending.is_empty() {
                break;
            }

            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&pending, &last_seen));
            }

            let polled = join_all(
                pending
                    .iter()
                    .map(|t| self.service.get_build_status(t.build_id)),
            )
            .await;

            let mut statuses = Vec::with_capacity(pending.len());
            for (t, status) in pending.iter().zip(polled) {
                match status {
                    Ok(status) => {
                        self.observer.build_status(t.package, t.build_id, &status);
                        last_seen.insert(t.build_id, status.clone());
                        statuses.push((*t, status));
                    }
                    Err(error) => {
                        return Err(self.query_failed(error, t.build_id, &pending, &last_seen));
                    }
                }
            }

            for (t, status) in statuses {
                match status.outcome() {
                    Outcome::Success => {
                        let result = BuildResult {
                            package_name: t.package.to_string(),
                            build_id: t.build_id,
                            status: status.to_string(),
                            artifact_location: t.artifact.to_string(),
                        };
                        self.observer.build_finished(&result);
                        finished.insert(t.build_id, result);
                    }
                    Outcome::Failure => {
                        let outstanding = outstanding(&pending, &last_seen, Some(t.build_id));
                        let error = BuildError::BuildFailed {
                            build_id: t.build_id,
                            package: t.package.to_string(),
                            status: status.to_string(),
                            outstanding: outstanding.iter().map(|(id, _)| *id).collect(),
                        };
                        self.report(&error, outstanding);
                        return Err(error);
                    }
                    Outcome::InProgress => {}
                }
            }

            if finished.len() == tracked.len() {
                break;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let pending: Vec<&Tracked> = tracked
                        .iter()
                        .filter(|t| !finished.contains_key(&t.build_id))
                        .collect();
                    return Err(self.cancelled(&pending, &last_seen));
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        Ok(tracked
            .iter()
            .filter_map(|t| finished.remove(&t.build_id))
            .collect())
    }

    fn cancelled(
        &self,
        pending: &[&Tracked<'_>],
        last_seen: &HashMap<BuildId, BuildStatus>,
    ) -> BuildError {
        let outstanding = outstanding(pending, last_seen, None);
        let error = BuildError::Cancelled {
            outstanding: outstanding.iter().map(|(id, _)| *id).collect(),
        };
        self.report(&error, outstanding);
        error
    }

    fn query_failed(
        &self,
        error: SubmissionError,
        build_id: BuildId,
        pending: &[&Tracked<'_>],
        last_seen: &HashMap<BuildId, BuildStatus>,
    ) -> BuildError {
        tracing::error!("Status query for build {build_id} failed");
        let outstanding = outstanding(pending, last_seen, None);
        let error = BuildError::Submission(error);
        self.report(&error, outstanding);
        error
    }

    fn report(&self, error: &BuildError, outstanding: Vec<(BuildId, Option<BuildStatus>)>) {
        self.observer.run_failed(&error.to_string(), &outstanding);
    }
}

/// Builds still running, with their last observed status
fn outstanding(
    pending: &[&Tracked<'_>],
    last_seen: &HashMap<BuildId, BuildStatus>,
    except: Option<BuildId>,
) -> Vec<(BuildId, Option<BuildStatus>)> {
    pending
        .iter()
        .filter(|t| Some(t.build_id) != except)
        .filter(|t| !last_seen.get(&t.build_id).is_some_and(BuildStatus::is_terminal))
        .map(|t| (t.build_id, last_seen.get(&t.build_id).cloned()))
        .collect()
}

/// Look up the artifact for every package of every wave
fn plan_artifacts<'m>(
    waves: &'m [BuildWave],
    metadata: &'m HashMap<String, PackageMetadata>,
) -> Result<Vec<Vec<(&'m str, &'m str)>>, BuildError> {
    waves
        .iter()
        .map(|wave| {
            wave.packages
                .iter()
                .map(|name| {
                    metadata
                        .get(name)
                        .map(|meta| (name.as_str(), meta.artifact_location()))
                        .ok_or_else(|| BuildError::UnknownPackage {
                            wave: wave.index,
                            package: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}
