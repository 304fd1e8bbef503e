//! Dependency resolution
//!
//! Turns a set of packages into ordered build waves. An edge exists from a
//! package to every other package in the set that provides one of its
//! build requirements; capabilities nobody in the set provides are assumed
//! to be available already.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::package::{BuildWave, PackageMetadata};
use crate::error::ResolverError;

/// In-project dependency graph for a set of packages
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// package -> in-project packages it needs built first
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// package -> packages waiting on it
    dependents: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph from package metadata keyed by name
    ///
    /// When two packages provide the same capability the lexicographically
    /// smallest name is chosen as its provider, so the result never depends
    /// on map iteration order.
    pub fn from_packages(
        packages: &HashMap<String, PackageMetadata>,
    ) -> Result<Self, ResolverError> {
        let mut names: Vec<&String> = packages.keys().collect();
        names.sort();

        let mut providers: HashMap<&str, &str> = HashMap::new();
        for name in &names {
            let pkg = &packages[*name];
            if pkg.name() != name.as_str() {
                return Err(ResolverError::NameMismatch {
                    key: (*name).clone(),
                    name: pkg.name().to_string(),
                });
            }
            for cap in pkg.provides() {
                match providers.entry(cap.as_str()) {
                    Entry::Occupied(existing) => tracing::warn!(
                        "Capability '{cap}' is provided by both '{}' and '{name}', using '{}'",
                        existing.get(),
                        existing.get()
                    ),
                    Entry::Vacant(slot) => {
                        slot.insert(name.as_str());
                    }
                }
            }
        }

        let mut graph = Self::default();
        for name in &names {
            let deps: BTreeSet<String> = packages[*name]
                .build_requires()
                .iter()
                .filter_map(|req| providers.get(req.as_str()))
                .filter(|provider| **provider != name.as_str())
                .map(|provider| (*provider).to_string())
                .collect();

            for dep in &deps {
                graph
                    .dependents
                    .entry(dep.clone())
                    .or_default()
                    .push((*name).clone());
            }
            graph.dependencies.insert((*name).clone(), deps);
        }

        tracing::debug!("Dependency edges: {:?}", graph.dependents);
        Ok(graph)
    }

    /// In-project dependencies of a package, sorted
    pub fn dependencies(&self, package: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(package)
    }

    /// Number of packages in the graph
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the graph has no packages
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Group packages into waves with Kahn's algorithm
    ///
    /// Every ready queue is sorted by name. Fails with the packages that
    /// never became ready if the graph contains a cycle.
    pub fn waves(&self) -> Result<Vec<BuildWave>, ResolverError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut waves = Vec::new();
        let mut scheduled = 0;

        while !queue.is_empty() {
            let mut next = Vec::new();
            for name in &queue {
                for dependent in self.dependents.get(*name).into_iter().flatten() {
                    if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                        *deg -= 1;
                        if *deg == 0 {
                            next.push(dependent.as_str());
                        }
                    }
                }
            }

            scheduled += queue.len();
            waves.push(BuildWave {
                index: waves.len(),
                packages: queue.iter().map(|name| (*name).to_string()).collect(),
            });

            next.sort_unstable();
            queue = next;
        }

        if scheduled != self.dependencies.len() {
            let packages = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(ResolverError::DependencyCycle { packages });
        }

        Ok(waves)
    }
}

/// Compute build waves for a set of packages
///
/// Packages within a wave have no dependencies on each other. Every package
/// appears in exactly one wave, after the waves of all its in-project
/// dependencies.
pub fn compute_build_waves(
    packages: &HashMap<String, PackageMetadata>,
) -> Result<Vec<BuildWave>, ResolverError> {
    if packages.is_empty() {
        return Ok(Vec::new());
    }
    DependencyGraph::from_packages(packages)?.waves()
}
