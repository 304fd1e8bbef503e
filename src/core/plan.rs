//! Rebuild planning
//!
//! Collects metadata for every manifest entry, resolves build waves and
//! renders the result for the `plan` command.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::core::manifest::{Manifest, PackageEntry};
use crate::core::package::{BuildWave, PackageMetadata};
use crate::core::resolver::DependencyGraph;
use crate::core::service::MetadataProvider;
use crate::error::{MetadataError, ResolverError};

/// Look up metadata for every manifest entry, `jobs` at a time
///
/// The result is keyed by the package name the provider reports. An entry
/// whose reported name differs from the manifest name is kept under the
/// reported name with a warning; a later entry reporting an already-seen
/// name is dropped.
pub async fn collect_metadata(
    provider: &dyn MetadataProvider,
    entries: &[PackageEntry],
    jobs: usize,
) -> Result<HashMap<String, PackageMetadata>, MetadataError> {
    let fetched: Vec<(&PackageEntry, PackageMetadata)> = stream::iter(entries)
        .map(|entry| async move {
            tracing::info!("Querying metadata for {}", entry.nvr);
            provider
                .get_package_metadata(&entry.nvr)
                .await
                .map(|meta| (entry, meta))
        })
        .buffered(jobs.max(1))
        .try_collect()
        .await?;

    let mut packages = HashMap::with_capacity(fetched.len());
    for (entry, meta) in fetched {
        if meta.name() != entry.name {
            tracing::warn!(
                "Manifest entry '{}' resolves to package '{}' ({})",
                entry.name,
                meta.name(),
                entry.nvr
            );
        }
        if packages.contains_key(meta.name()) {
            tracing::warn!(
                "Package '{}' listed twice, ignoring {}",
                meta.name(),
                entry.nvr
            );
            continue;
        }
        packages.insert(meta.name().to_string(), meta);
    }

    Ok(packages)
}

/// Resolved rebuild ready to be shown or executed
#[derive(Debug)]
pub struct RebuildPlan {
    project: String,
    koji_tag: String,
    chroots: Vec<String>,
    chroot_packages: Vec<String>,
    rpmbuild_without: Vec<String>,
    packages: HashMap<String, PackageMetadata>,
    graph: DependencyGraph,
    waves: Vec<BuildWave>,
}

impl RebuildPlan {
    /// Resolve build waves for the collected packages
    pub fn new(
        manifest: &Manifest,
        packages: HashMap<String, PackageMetadata>,
    ) -> Result<Self, ResolverError> {
        let graph = DependencyGraph::from_packages(&packages)?;
        let waves = graph.waves()?;

        Ok(Self {
            project: manifest.copr_project.clone(),
            koji_tag: manifest.koji_tag.clone(),
            chroots: manifest.chroots.clone(),
            chroot_packages: manifest.chroot_packages.clone(),
            rpmbuild_without: manifest.rpmbuild_without.clone(),
            packages,
            graph,
            waves,
        })
    }

    /// Build waves in order
    pub fn waves(&self) -> &[BuildWave] {
        &self.waves
    }

    /// Package metadata keyed by name
    pub fn packages(&self) -> &HashMap<String, PackageMetadata> {
        &self.packages
    }

    /// Human-readable plan
    pub fn render_text(&self, show_deps: bool) -> String {
        PlanText {
            plan: self,
            show_deps,
        }
        .to_string()
    }

    /// Machine-readable plan
    pub fn report(&self) -> PlanReport {
        PlanReport {
            copr_project: self.project.clone(),
            koji_tag: self.koji_tag.clone(),
            chroots: self.chroots.clone(),
            chroot_packages: self.chroot_packages.clone(),
            rpmbuild_without: self.rpmbuild_without.clone(),
            total_packages: self.packages.len(),
            waves: self
                .waves
                .iter()
                .map(|wave| WaveReport {
                    index: wave.index,
                    packages: wave
                        .packages
                        .iter()
                        .filter_map(|name| self.packages.get(name))
                        .map(|meta| PlannedBuild {
                            name: meta.name().to_string(),
                            nvr: meta.version_identifier().to_string(),
                            srpm_url: meta.artifact_location().to_string(),
                            dependencies: self
                                .graph
                                .dependencies(meta.name())
                                .map(|deps| deps.iter().cloned().collect())
                                .unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Text form of a plan, optionally listing what each package needs
struct PlanText<'a> {
    plan: &'a RebuildPlan,
    show_deps: bool,
}

impl fmt::Display for PlanText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.plan;
        writeln!(f, "Build plan:")?;
        writeln!(f, "  Copr project: {}", plan.project)?;
        writeln!(f, "  Koji tag: {}", plan.koji_tag)?;
        if !plan.chroots.is_empty() {
            writeln!(f, "  Chroots: {}", plan.chroots.join(", "))?;
            if !plan.chroot_packages.is_empty() {
                writeln!(
                    f,
                    "  Extra buildroot packages: {}",
                    plan.chroot_packages.join(", ")
                )?;
            }
            if !plan.rpmbuild_without.is_empty() {
                writeln!(f, "  rpmbuild --without: {}", plan.rpmbuild_without.join(", "))?;
            }
        }
        writeln!(f, "  Total packages: {}", plan.packages.len())?;
        writeln!(f, "  Total waves: {}", plan.waves.len())?;

        for wave in &plan.waves {
            writeln!(f)?;
            writeln!(f, "  Wave {}:", wave.index)?;
            for name in &wave.packages {
                let Some(meta) = plan.packages.get(name) else {
                    continue;
                };
                writeln!(f, "    - {}", meta.version_identifier())?;
                writeln!(f, "      SRPM: {}", meta.artifact_location())?;
                if self.show_deps {
                    if let Some(deps) = plan.graph.dependencies(name).filter(|d| !d.is_empty()) {
                        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                        writeln!(f, "      Needs: {}", deps.join(", "))?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// JSON form of a rebuild plan
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub copr_project: String,
    pub koji_tag: String,
    pub chroots: Vec<String>,
    pub chroot_packages: Vec<String>,
    pub rpmbuild_without: Vec<String>,
    pub total_packages: usize,
    pub waves: Vec<WaveReport>,
}

/// One wave of a [`PlanReport`]
#[derive(Debug, Serialize)]
pub struct WaveReport {
    pub index: usize,
    pub packages: Vec<PlannedBuild>,
}

/// One package of a [`WaveReport`]
#[derive(Debug, Serialize)]
pub struct PlannedBuild {
    pub name: String,
    pub nvr: String,
    pub srpm_url: String,
    pub dependencies: Vec<String>,
}
