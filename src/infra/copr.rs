//! Copr build service client
//!
//! Submits and monitors builds through `copr-cli`. Batch submission uses
//! Copr's build batches: the first build of every wave after the first is
//! submitted with `--after-build-id` pointing at the previous wave, and the
//! rest of a wave joins its first build with `--with-build-id`. Copr then
//! holds each wave back until the previous batch has finished.

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::path::PathBuf;

use crate::config::defaults;
use crate::core::package::BuildId;
use crate::core::service::{BuildService, EnvironmentConfig};
use crate::core::status::BuildStatus;
use crate::error::{BatchSubmissionError, SubmissionError};
use crate::infra::process::{command_line, CommandRunner, SystemRunner};

/// Where a build goes relative to other builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderHint {
    /// Start once the batch containing this build has finished
    After(BuildId),
    /// Join the batch containing this build
    With(BuildId),
}

/// Client for submitting and monitoring builds on Fedora Copr
#[derive(Debug, Clone)]
pub struct CoprClient<R = SystemRunner> {
    runner: R,
    program: PathBuf,
    config_file: Option<PathBuf>,
    project: String,
}

impl CoprClient {
    /// Create a client for a project in owner/name format
    pub fn new(project: impl Into<String>) -> Self {
        Self::with_runner(project, SystemRunner)
    }
}

impl<R: CommandRunner> CoprClient<R> {
    /// Create a client that runs commands through `runner`
    pub fn with_runner(project: impl Into<String>, runner: R) -> Self {
        Self {
            runner,
            program: PathBuf::from(defaults::COPR_CLI),
            config_file: None,
            project: project.into(),
        }
    }

    /// Use a different `copr-cli` executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Use an alternative copr-cli config file
    #[must_use]
    pub fn with_config_file(mut self, config_file: Option<PathBuf>) -> Self {
        self.config_file = config_file;
        self
    }

    /// Get the Copr project
    pub fn project(&self) -> &str {
        &self.project
    }

    fn args<I, S>(&self, rest: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = Vec::new();
        if let Some(config) = &self.config_file {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        args.extend(rest.into_iter().map(Into::into));
        args
    }

    /// Submit one build with an optional ordering hint
    pub async fn build(
        &self,
        srpm_url: &str,
        timeout: Option<u64>,
        hint: Option<OrderHint>,
    ) -> Result<BuildId, SubmissionError> {
        let mut rest = vec!["build".to_string(), "--nowait".to_string()];
        if let Some(timeout) = timeout {
            rest.push("--timeout".to_string());
            rest.push(timeout.to_string());
        }
        match hint {
            Some(OrderHint::After(id)) => {
                rest.push("--after-build-id".to_string());
                rest.push(id.to_string());
            }
            Some(OrderHint::With(id)) => {
                rest.push("--with-build-id".to_string());
                rest.push(id.to_string());
            }
            None => {}
        }
        rest.push(self.project.clone());
        rest.push(srpm_url.to_string());

        let args = self.args(rest);
        tracing::debug!("Submitting build to {}: {srpm_url}", self.project);
        let output = self.runner.run(&self.program, &args).await?;

        let id = parse_build_id(&output.stdout).ok_or_else(|| {
            SubmissionError::new(
                command_line(&self.program, &args),
                "could not parse build ID from copr-cli output",
            )
            .with_output(output.stdout, output.stderr)
        })?;
        tracing::info!("Created build {id} in {}: {srpm_url}", self.project);
        Ok(id)
    }
}

#[async_trait]
impl<R: CommandRunner> BuildService for CoprClient<R> {
    async fn submit_build(&self, artifact_location: &str) -> Result<BuildId, SubmissionError> {
        self.build(artifact_location, None, None).await
    }

    async fn submit_all_waves(
        &self,
        wave_artifacts: &[Vec<String>],
        timeout: Option<u64>,
    ) -> Result<Vec<Vec<BuildId>>, BatchSubmissionError> {
        let mut all_ids = Vec::with_capacity(wave_artifacts.len());
        let mut accepted: Vec<BuildId> = Vec::new();
        let mut previous_leader: Option<BuildId> = None;

        for (index, urls) in wave_artifacts.iter().enumerate() {
            let Some((first, rest)) = urls.split_first() else {
                all_ids.push(Vec::new());
                continue;
            };

            let leader = match self
                .build(first, timeout, previous_leader.map(OrderHint::After))
                .await
            {
                Ok(id) => id,
                Err(source) => {
                    return Err(BatchSubmissionError {
                        source,
                        submitted: accepted,
                    })
                }
            };

            // Every follower runs to completion so no created build goes unrecorded
            let followers = join_all(
                rest.iter()
                    .map(|url| self.build(url, timeout, Some(OrderHint::With(leader)))),
            )
            .await;

            let mut ids = Vec::with_capacity(urls.len());
            ids.push(leader);
            let mut failure = None;
            for result in followers {
                match result {
                    Ok(id) => ids.push(id),
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
            }
            accepted.extend(ids.iter().copied());

            if let Some(source) = failure {
                tracing::error!(
                    "Wave {index} submission failed; builds already created: {accepted:?}"
                );
                return Err(BatchSubmissionError {
                    source,
                    submitted: accepted,
                });
            }

            tracing::debug!("Wave {index} submitted as batch led by {leader}: {ids:?}");
            all_ids.push(ids);
            previous_leader = Some(leader);
        }

        Ok(all_ids)
    }

    async fn get_build_status(&self, build_id: BuildId) -> Result<BuildStatus, SubmissionError> {
        let args = self.args(["status".to_string(), build_id.to_string()]);
        let output = self.runner.run(&self.program, &args).await?;
        Ok(BuildStatus::parse(&output.stdout))
    }

    async fn configure_environment(
        &self,
        environment: &str,
        config: &EnvironmentConfig,
    ) -> Result<(), SubmissionError> {
        let mut rest = vec![
            "edit-chroot".to_string(),
            format!("{}/{environment}", self.project),
        ];
        if !config.packages.is_empty() {
            rest.push("--packages".to_string());
            rest.push(config.packages.join(" "));
        }
        for conditional in &config.rpmbuild_without {
            rest.push("--rpmbuild-without".to_string());
            rest.push(conditional.clone());
        }

        tracing::info!("Configuring chroot {}/{environment}", self.project);
        self.runner.run(&self.program, &self.args(rest)).await?;
        Ok(())
    }
}

/// Extract the build id from `copr-cli build` output
///
/// Looks for a line like `Created builds: 12345`.
pub fn parse_build_id(stdout: &str) -> Option<BuildId> {
    let re = Regex::new(r"Created builds?:\s*(\d+)").ok()?;
    re.captures(stdout)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
