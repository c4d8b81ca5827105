mod memory;
mod sqlite;

pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;

use std::collections::BTreeSet;

use reqopt_semver::{Semver, Stability, VersionParser};

use crate::error::Result;
use crate::package::{Link, Package, PackageId, Release, ReleaseId};

/// Read access to the package store.
///
/// Every query is a pure function of the store's contents. Names that the
/// store does not know are never an error: they simply produce nothing.
pub trait PackageRegistry {
    /// Newest release of `name` with stability at least `minimum_stability`
    /// whose version satisfies `constraint`.
    ///
    /// An unparsable constraint matches nothing and yields `None`.
    fn latest_release(
        &self,
        name: &str,
        minimum_stability: Stability,
        constraint: &str,
    ) -> Result<Option<Release>>;

    /// Distinct dependency names declared by the given releases
    fn dependency_names(&self, releases: &[ReleaseId]) -> Result<BTreeSet<String>>;

    /// Distinct dependency names declared by any release of the given packages
    fn package_dependency_names(&self, packages: &[PackageId]) -> Result<BTreeSet<String>>;

    /// Ids of the known packages among `names`
    fn package_ids(&self, names: &[String]) -> Result<Vec<PackageId>>;
}

/// Write access used when loading repository metadata.
pub trait WritableRegistry: PackageRegistry {
    /// Registers a package, returning the existing entry if the name is known.
    fn add_package(&mut self, name: &str) -> Result<Package>;

    /// Registers a release and its requirements.
    ///
    /// Re-adding a version that normalizes to an existing release replaces
    /// that release's requirements.
    fn add_release(&mut self, package: &Package, version: &str, requires: &[Link]) -> Result<ReleaseId>;

    fn publish(&mut self, name: &str, version: &str, requires: &[Link]) -> Result<ReleaseId> {
        let package = self.add_package(name)?;
        self.add_release(&package, version, requires)
    }

    /// Start a group of writes that should land together.
    fn begin_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Picks the newest acceptable release. Ties keep the earliest candidate.
pub(crate) fn select_latest<I>(
    name: &str,
    candidates: I,
    minimum_stability: Stability,
    constraint: &str,
) -> Option<Release>
where
    I: IntoIterator<Item = Release>,
{
    let parsed = match VersionParser::new().parse_constraints(constraint) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("Constraint {} for {} matches nothing: {}", constraint, name, e);
            return None;
        }
    };

    Semver::latest(candidates, &parsed, minimum_stability)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(id: i64, version: &str) -> Release {
        Release::from_version(ReleaseId(id), PackageId(1), "x/a", version).unwrap()
    }

    fn candidates() -> Vec<Release> {
        vec![
            release(1, "1.0.0"),
            release(2, "1.3.2"),
            release(3, "1.10.0-beta1"),
            release(4, "2.0.0"),
            release(5, "dev-main"),
            release(6, "dev-master"),
        ]
    }

    #[test]
    fn test_select_latest_respects_constraint() {
        let latest = select_latest("x/a", candidates(), Stability::Stable, "^1.0").unwrap();
        assert_eq!(latest.version, "1.3.2");
    }

    #[test]
    fn test_select_latest_respects_stability() {
        let latest = select_latest("x/a", candidates(), Stability::Beta, "^1.0").unwrap();
        assert_eq!(latest.version, "1.10.0-beta1");
    }

    #[test]
    fn test_select_latest_prefers_default_branch() {
        let latest = select_latest("x/a", candidates(), Stability::Dev, "*").unwrap();
        assert_eq!(latest.version, "dev-master");
    }

    #[test]
    fn test_select_latest_branch_constraint() {
        let latest = select_latest("x/a", candidates(), Stability::Dev, "dev-main").unwrap();
        assert_eq!(latest.id, ReleaseId(5));
    }

    #[test]
    fn test_select_latest_no_match() {
        assert!(select_latest("x/a", candidates(), Stability::Dev, "^9.9").is_none());
        assert!(select_latest("x/a", candidates(), Stability::Dev, "not a constraint").is_none());
        assert!(select_latest("x/a", Vec::new(), Stability::Dev, "*").is_none());
    }

    #[test]
    fn test_select_latest_tie_keeps_first() {
        let tied = vec![release(1, "1.0.0"), release(2, "v1.0.0")];
        let latest = select_latest("x/a", tied, Stability::Dev, "*").unwrap();
        assert_eq!(latest.id, ReleaseId(1));
    }
}
