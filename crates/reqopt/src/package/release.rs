use std::fmt;

use reqopt_semver::{Stability, VersionParser, Versioned};

use crate::error::{OptimizeError, Result};

/// Registry id of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(pub i64);

/// Registry id of a single release of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId(pub i64);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named package known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
}

/// A published version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: ReleaseId,
    pub package_id: PackageId,
    /// Version as published (`v1.3.2`, `dev-main`)
    pub version: String,
    /// Normalized version (`1.3.2.0`, `dev-main`)
    pub normalized: String,
    pub stability: Stability,
}

impl Release {
    /// Builds a release from its published version, normalizing it and
    /// classifying its stability.
    pub fn from_version(
        id: ReleaseId,
        package_id: PackageId,
        package_name: &str,
        version: &str,
    ) -> Result<Self> {
        let normalized = VersionParser::new()
            .normalize(version)
            .map_err(|_| OptimizeError::InvalidVersion {
                name: package_name.to_string(),
                version: version.to_string(),
            })?;
        let stability = VersionParser::parse_stability(&normalized);

        Ok(Self {
            id,
            package_id,
            version: version.to_string(),
            normalized,
            stability,
        })
    }
}

impl Versioned for Release {
    fn normalized_version(&self) -> &str {
        &self.normalized
    }

    fn stability(&self) -> Stability {
        self.stability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_from_version() {
        let release = Release::from_version(ReleaseId(7), PackageId(1), "x/a", "v1.3.2").unwrap();

        assert_eq!(release.version, "v1.3.2");
        assert_eq!(release.normalized, "1.3.2.0");
        assert_eq!(release.stability, Stability::Stable);
    }

    #[test]
    fn test_release_stability() {
        let beta = Release::from_version(ReleaseId(1), PackageId(1), "x/a", "2.0.0-beta1").unwrap();
        assert_eq!(beta.stability, Stability::Beta);

        let branch = Release::from_version(ReleaseId(2), PackageId(1), "x/a", "dev-main").unwrap();
        assert_eq!(branch.stability, Stability::Dev);
    }

    #[test]
    fn test_release_invalid_version() {
        let err = Release::from_version(ReleaseId(1), PackageId(1), "x/a", "not a version").unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidVersion { .. }));
    }
}
