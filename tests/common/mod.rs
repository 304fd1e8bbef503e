//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a temp
//! project directory, a scripted build service and an in-memory metadata
//! provider.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use copr_rebuild::core::package::{BuildId, BuildWave, PackageMetadata};
use copr_rebuild::core::service::{BuildService, EnvironmentConfig, MetadataProvider};
use copr_rebuild::core::status::BuildStatus;
use copr_rebuild::error::{BatchSubmissionError, MetadataError, SubmissionError};

/// Test project context
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample manifest TOML for testing
pub const SAMPLE_MANIFEST: &str = r#"
copr_project = "opendatahub/rhelai-el9"
chroots = ["epel-9-x86_64"]
chroot_packages = ["python3-devel"]

[[packages]]
name = "netcdf"
nvr = "netcdf-4.9.2-9.fc44"

[[packages]]
name = "hdf5"
nvr = "hdf5-1.14.6-7.fc44"
note = "needed by netcdf"

[[packages]]
name = "zlib-ng"
nvr = "zlib-ng-2.2.3-1.fc44"
"#;

/// SRPM URL used for a test package
pub fn srpm_url(name: &str) -> String {
    format!("https://kojipkgs.example.org/{name}.src.rpm")
}

/// Metadata for a test package
pub fn meta(name: &str, provides: &[&str], requires: &[&str]) -> PackageMetadata {
    PackageMetadata::builder(name)
        .version_identifier(format!("{name}-1.0-1.fc44"))
        .artifact_location(srpm_url(name))
        .provides(provides.iter().copied())
        .build_requires(requires.iter().copied())
        .build()
        .expect("valid test metadata")
}

/// Metadata map for packages with no edges
pub fn independent(names: &[&str]) -> HashMap<String, PackageMetadata> {
    names
        .iter()
        .map(|name| ((*name).to_string(), meta(name, &[], &[])))
        .collect()
}

/// A build wave
pub fn wave(index: usize, packages: &[&str]) -> BuildWave {
    BuildWave {
        index,
        packages: packages.iter().map(|p| (*p).to_string()).collect(),
    }
}

/// Build service that plays back scripted status sequences
///
/// Ids are handed out from 1 in submission order. Each artifact has a
/// status script; the last entry repeats once the script runs out.
/// Artifacts without a script succeed on the first poll.
#[derive(Default)]
pub struct ScriptedBuildService {
    next_id: AtomicU64,
    scripts: Mutex<HashMap<String, VecDeque<BuildStatus>>>,
    builds: Mutex<HashMap<BuildId, VecDeque<BuildStatus>>>,
    submitted: Mutex<Vec<String>>,
    batch_calls: Mutex<usize>,
    queries: Mutex<Vec<BuildId>>,
    configured: Mutex<Vec<(String, EnvironmentConfig)>>,
    reject_submission: HashSet<String>,
    broken_status: HashSet<String>,
    drop_last_batch_id: bool,
}

impl ScriptedBuildService {
    /// Create a service where every build succeeds immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the statuses reported for an artifact's build
    pub fn with_statuses(self, artifact: &str, statuses: &[&str]) -> Self {
        self.scripts.lock().unwrap().insert(
            artifact.to_string(),
            statuses.iter().map(|s| BuildStatus::parse(s)).collect(),
        );
        self
    }

    /// Refuse to submit this artifact
    pub fn rejecting(mut self, artifact: &str) -> Self {
        self.reject_submission.insert(artifact.to_string());
        self
    }

    /// Fail status queries for this artifact's build
    pub fn with_broken_status(mut self, artifact: &str) -> Self {
        self.broken_status.insert(artifact.to_string());
        self
    }

    /// Return one id too few from batch submissions
    pub fn dropping_batch_ids(mut self) -> Self {
        self.drop_last_batch_id = true;
        self
    }

    /// Artifacts submitted so far, in order
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    /// Number of `submit_all_waves` calls
    pub fn batch_calls(&self) -> usize {
        *self.batch_calls.lock().unwrap()
    }

    /// Status queries so far, in order
    pub fn queries(&self) -> Vec<BuildId> {
        self.queries.lock().unwrap().clone()
    }

    /// Environments configured so far
    pub fn configured(&self) -> Vec<(String, EnvironmentConfig)> {
        self.configured.lock().unwrap().clone()
    }

    /// Id assigned to an artifact, if it was submitted
    pub fn id_of(&self, artifact: &str) -> Option<BuildId> {
        self.submitted()
            .iter()
            .position(|a| a == artifact)
            .map(|i| BuildId::new(i as u64 + 1))
    }

    fn failure(&self, what: &str) -> SubmissionError {
        SubmissionError::new(vec!["scripted".to_string(), what.to_string()], "scripted failure")
            .with_output("", format!("{what} refused"))
    }

    fn submit(&self, artifact: &str) -> Result<BuildId, SubmissionError> {
        if self.reject_submission.contains(artifact) {
            return Err(self.failure(artifact));
        }
        let id = BuildId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.submitted.lock().unwrap().push(artifact.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .remove(artifact)
            .unwrap_or_else(|| VecDeque::from([BuildStatus::Succeeded]));
        self.builds.lock().unwrap().insert(id, script);
        Ok(id)
    }
}

#[async_trait]
impl BuildService for ScriptedBuildService {
    async fn submit_build(&self, artifact_location: &str) -> Result<BuildId, SubmissionError> {
        self.submit(artifact_location)
    }

    async fn submit_all_waves(
        &self,
        wave_artifacts: &[Vec<String>],
        _timeout: Option<u64>,
    ) -> Result<Vec<Vec<BuildId>>, BatchSubmissionError> {
        *self.batch_calls.lock().unwrap() += 1;
        let mut ids: Vec<Vec<BuildId>> = Vec::new();
        for wave in wave_artifacts {
            let mut wave_ids = Vec::new();
            for artifact in wave {
                match self.submit(artifact) {
                    Ok(id) => wave_ids.push(id),
                    Err(source) => {
                        let submitted = ids.iter().flatten().chain(&wave_ids).copied().collect();
                        return Err(BatchSubmissionError { source, submitted });
                    }
                }
            }
            ids.push(wave_ids);
        }
        if self.drop_last_batch_id {
            if let Some(last) = ids.last_mut() {
                last.pop();
            }
        }
        Ok(ids)
    }

    async fn get_build_status(&self, build_id: BuildId) -> Result<BuildStatus, SubmissionError> {
        self.queries.lock().unwrap().push(build_id);

        let artifact = self.submitted()[(build_id.get() - 1) as usize].clone();
        if self.broken_status.contains(&artifact) {
            return Err(self.failure("status"));
        }

        let mut builds = self.builds.lock().unwrap();
        let script = builds.get_mut(&build_id).expect("status query for unknown build");
        let status = if script.len() > 1 {
            script.pop_front().expect("non-empty script")
        } else {
            script.front().cloned().unwrap_or(BuildStatus::Succeeded)
        };
        Ok(status)
    }

    async fn configure_environment(
        &self,
        environment: &str,
        config: &EnvironmentConfig,
    ) -> Result<(), SubmissionError> {
        self.configured
            .lock()
            .unwrap()
            .push((environment.to_string(), config.clone()));
        Ok(())
    }
}

/// Metadata provider backed by a map from NVR to metadata
#[derive(Default)]
pub struct StaticMetadataProvider {
    builds: HashMap<String, PackageMetadata>,
}

impl StaticMetadataProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `metadata` for its version identifier
    pub fn with(mut self, metadata: PackageMetadata) -> Self {
        self.builds
            .insert(metadata.version_identifier().to_string(), metadata);
        self
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn get_package_metadata(
        &self,
        identifier: &str,
    ) -> Result<PackageMetadata, MetadataError> {
        self.builds
            .get(identifier)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound {
                identifier: identifier.to_string(),
                reason: "no such build".to_string(),
            })
    }
}
