//! Transitive closure over the dependency graph.
//!
//! Starting from the dependencies of the resolved releases, every reachable
//! package name is added to the [`IgnoreSet`]. A name is expanded at most once,
//! so cycles and diamonds terminate, and expanding again over the result adds
//! nothing.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::package::ReleaseId;
use crate::platform::PlatformFilter;
use crate::registry::PackageRegistry;

/// Names that must not be listed as top-level requirements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet(BTreeSet<String>);

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Extend<String> for IgnoreSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<String> for IgnoreSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Grows `ignore` with every package reachable from the dependencies of `seed`.
///
/// Names already ignored or rejected by the platform filter are not expanded.
pub fn expand<R>(
    registry: &R,
    filter: &PlatformFilter,
    seed: &[ReleaseId],
    mut ignore: IgnoreSet,
) -> Result<IgnoreSet>
where
    R: PackageRegistry + ?Sized,
{
    let mut frontier = next_frontier(registry.dependency_names(seed)?, filter, &ignore);
    let mut pass = 0;

    while !frontier.is_empty() {
        pass += 1;
        log::debug!("Dependency closure pass {}: {} new packages", pass, frontier.len());
        log::trace!("New packages: {:?}", frontier);

        ignore.extend(frontier.iter().cloned());
        let ids = registry.package_ids(&frontier)?;
        frontier = next_frontier(registry.package_dependency_names(&ids)?, filter, &ignore);
    }

    Ok(ignore)
}

fn next_frontier(names: BTreeSet<String>, filter: &PlatformFilter, ignore: &IgnoreSet) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !ignore.contains(name) && !filter.is_excluded(name))
        .collect()
}
