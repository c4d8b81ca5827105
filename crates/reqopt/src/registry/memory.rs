use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use reqopt_semver::Stability;

use super::{select_latest, PackageRegistry, WritableRegistry};
use crate::error::Result;
use crate::package::{Link, Package, PackageId, Release, ReleaseId};

/// Registry held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    packages: IndexMap<String, PackageId>,
    releases: Vec<Release>,
    requires: HashMap<ReleaseId, Vec<Link>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn release_count(&self) -> usize {
        self.releases.len()
    }

    fn requires_of(&self, release: ReleaseId) -> impl Iterator<Item = &Link> {
        self.requires.get(&release).into_iter().flatten()
    }
}

impl PackageRegistry for MemoryRegistry {
    fn latest_release(
        &self,
        name: &str,
        minimum_stability: Stability,
        constraint: &str,
    ) -> Result<Option<Release>> {
        let Some(&package_id) = self.packages.get(name) else {
            return Ok(None);
        };

        let candidates = self
            .releases
            .iter()
            .filter(|r| r.package_id == package_id)
            .cloned();

        Ok(select_latest(name, candidates, minimum_stability, constraint))
    }

    fn dependency_names(&self, releases: &[ReleaseId]) -> Result<BTreeSet<String>> {
        Ok(releases
            .iter()
            .flat_map(|id| self.requires_of(*id))
            .map(|link| link.target.clone())
            .collect())
    }

    fn package_dependency_names(&self, packages: &[PackageId]) -> Result<BTreeSet<String>> {
        let wanted: HashSet<PackageId> = packages.iter().copied().collect();

        Ok(self
            .releases
            .iter()
            .filter(|r| wanted.contains(&r.package_id))
            .flat_map(|r| self.requires_of(r.id))
            .map(|link| link.target.clone())
            .collect())
    }

    fn package_ids(&self, names: &[String]) -> Result<Vec<PackageId>> {
        Ok(names
            .iter()
            .filter_map(|name| self.packages.get(name).copied())
            .collect())
    }
}

impl WritableRegistry for MemoryRegistry {
    fn add_package(&mut self, name: &str) -> Result<Package> {
        let next = PackageId(self.packages.len() as i64 + 1);
        let id = *self.packages.entry(name.to_string()).or_insert(next);

        Ok(Package {
            id,
            name: name.to_string(),
        })
    }

    fn add_release(&mut self, package: &Package, version: &str, requires: &[Link]) -> Result<ReleaseId> {
        let next = ReleaseId(self.releases.len() as i64 + 1);
        let release = Release::from_version(next, package.id, &package.name, version)?;

        let existing = self
            .releases
            .iter()
            .find(|r| r.package_id == package.id && r.normalized == release.normalized)
            .map(|r| r.id);

        let id = match existing {
            Some(id) => id,
            None => {
                self.releases.push(release);
                next
            }
        };
        self.requires.insert(id, requires.to_vec());

        Ok(id)
    }
}
