//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;
    use std::collections::HashMap;

    use crate::core::package::PackageMetadata;

    /// Generate a package set whose dependency graph has no cycle
    ///
    /// Packages get a random rank and may only require capabilities of
    /// lower-ranked packages. Names are shuffled against ranks so sorted
    /// order and dependency order disagree.
    pub fn acyclic_packages() -> impl Strategy<Value = HashMap<String, PackageMetadata>> {
        shape(1).prop_map(|(n, edges, order)| package_set(n, &edges, &order, false))
    }

    /// Generate a package set that always contains a dependency cycle
    pub fn cyclic_packages() -> impl Strategy<Value = HashMap<String, PackageMetadata>> {
        shape(2).prop_map(|(n, edges, order)| package_set(n, &edges, &order, true))
    }

    fn shape(min: usize) -> impl Strategy<Value = (usize, Vec<Vec<bool>>, Vec<usize>)> {
        (min..12).prop_flat_map(|n| {
            (
                Just(n),
                proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n),
                Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            )
        })
    }

    fn package_set(
        n: usize,
        edges: &[Vec<bool>],
        order: &[usize],
        close_cycle: bool,
    ) -> HashMap<String, PackageMetadata> {
        let name = |rank: usize| format!("pkg-{:02}", order[rank]);

        (0..n)
            .map(|rank| {
                let mut requires: Vec<String> = (0..rank)
                    .filter(|&lower| edges[rank][lower] || (close_cycle && lower + 1 == rank))
                    .map(|lower| format!("lib{}", name(lower)))
                    .collect();
                requires.push("gcc".to_string());
                if close_cycle && rank == 0 {
                    requires.push(format!("lib{}", name(n - 1)));
                }

                let pkg = PackageMetadata::builder(name(rank))
                    .version_identifier(format!("{}-1.0-1.fc44", name(rank)))
                    .artifact_location(format!("https://example.org/{}.src.rpm", name(rank)))
                    .provides([format!("lib{}", name(rank)), name(rank)])
                    .build_requires(requires)
                    .build()
                    .expect("generated metadata is valid");
                (name(rank), pkg)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_acyclic_generator_names_match_keys(packages in acyclic_packages()) {
            for (key, meta) in &packages {
                prop_assert_eq!(key.as_str(), meta.name());
            }
        }
    }
}
