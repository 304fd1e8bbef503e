//! Koji metadata provider
//!
//! Reads build metadata through `koji call --json-output`. A package's
//! provides are the capability names of all its binary RPMs, its build
//! requirements are the type-0 dependencies recorded on the source RPM.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::{defaults, urls};
use crate::core::package::PackageMetadata;
use crate::core::service::MetadataProvider;
use crate::error::MetadataError;
use crate::infra::process::{CommandRunner, SystemRunner};

/// Dependency type Koji uses for BuildRequires on source RPMs
const DEP_BUILDREQUIRES: u32 = 0;

/// Dependency type for Provides
const DEP_PROVIDES: u32 = 1;

/// Internal rpm features, never satisfied by a package
const RPMLIB_PREFIX: &str = "rpmlib(";

#[derive(Debug, Deserialize)]
struct KojiBuild {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct KojiRpm {
    id: u64,
    name: String,
    version: String,
    release: String,
    arch: String,
}

#[derive(Debug, Deserialize)]
struct KojiDep {
    name: String,
    #[serde(rename = "type")]
    dep_type: u32,
}

/// Client for reading build metadata from a Koji hub
#[derive(Debug, Clone)]
pub struct KojiClient<R = SystemRunner> {
    runner: R,
    program: PathBuf,
    hub_url: String,
    topdir: String,
}

impl KojiClient {
    /// Create a client for the Fedora Koji instance
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for KojiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> KojiClient<R> {
    /// Create a client that runs commands through `runner`
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            program: PathBuf::from(defaults::KOJI_CLI),
            hub_url: urls::KOJI_HUB.to_string(),
            topdir: urls::KOJI_TOPDIR.to_string(),
        }
    }

    /// Use a different `koji` executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Use a different hub
    #[must_use]
    pub fn with_hub_url(mut self, hub_url: impl Into<String>) -> Self {
        self.hub_url = hub_url.into();
        self
    }

    /// Use a different package download root
    #[must_use]
    pub fn with_topdir(mut self, topdir: impl Into<String>) -> Self {
        let topdir: String = topdir.into();
        self.topdir = topdir.trim_end_matches('/').to_string();
        self
    }

    /// Invoke a hub method and decode its JSON result
    async fn call<T: DeserializeOwned>(
        &self,
        identifier: &str,
        method: &str,
        params: Vec<String>,
    ) -> Result<T, MetadataError> {
        let mut args = vec![
            "--server".to_string(),
            self.hub_url.clone(),
            "call".to_string(),
            "--json-output".to_string(),
            method.to_string(),
        ];
        args.extend(params);

        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|source| MetadataError::Query {
                identifier: identifier.to_string(),
                source,
            })?;

        serde_json::from_str(&output.stdout).map_err(|e| MetadataError::InvalidResponse {
            identifier: identifier.to_string(),
            error: format!("{method}: {e}"),
        })
    }

    /// Download URL of a source RPM
    fn srpm_url(&self, srpm: &KojiRpm) -> String {
        format!(
            "{}/packages/{name}/{version}/{release}/src/{name}-{version}-{release}.src.rpm",
            self.topdir,
            name = srpm.name,
            version = srpm.version,
            release = srpm.release,
        )
    }
}

#[async_trait]
impl<R: CommandRunner> MetadataProvider for KojiClient<R> {
    async fn get_package_metadata(
        &self,
        identifier: &str,
    ) -> Result<PackageMetadata, MetadataError> {
        let build: Option<KojiBuild> = self
            .call(identifier, "getBuild", vec![identifier.to_string()])
            .await?;
        let build = build.ok_or_else(|| MetadataError::NotFound {
            identifier: identifier.to_string(),
            reason: "no such build".to_string(),
        })?;

        let rpms: Vec<KojiRpm> = self
            .call(identifier, "listRPMs", vec![format!("buildID={}", build.id)])
            .await?;

        let (sources, binaries): (Vec<_>, Vec<_>) =
            rpms.into_iter().partition(|rpm| rpm.arch == "src");
        let srpm = sources.into_iter().next().ok_or_else(|| MetadataError::NotFound {
            identifier: identifier.to_string(),
            reason: "build has no source RPM".to_string(),
        })?;

        let provides = try_join_all(binaries.iter().map(|rpm| {
            self.call::<Vec<KojiDep>>(
                identifier,
                "getRPMDeps",
                vec![rpm.id.to_string(), format!("depType={DEP_PROVIDES}")],
            )
        }))
        .await?
        .into_iter()
        .flatten()
        .map(|dep| dep.name)
        .collect::<BTreeSet<_>>();

        let srpm_deps: Vec<KojiDep> = self
            .call(identifier, "getRPMDeps", vec![srpm.id.to_string()])
            .await?;
        let build_requires = srpm_deps
            .into_iter()
            .filter(|dep| dep.dep_type == DEP_BUILDREQUIRES && !dep.name.starts_with(RPMLIB_PREFIX))
            .map(|dep| dep.name)
            .collect::<BTreeSet<_>>();

        tracing::info!(
            "Fetched metadata for {identifier}: {} provides, {} build requirements",
            provides.len(),
            build_requires.len()
        );

        PackageMetadata::builder(build.name)
            .version_identifier(identifier)
            .artifact_location(self.srpm_url(&srpm))
            .provides(provides)
            .build_requires(build_requires)
            .build()
            .map_err(|source| MetadataError::Invalid {
                identifier: identifier.to_string(),
                source,
            })
    }
}
