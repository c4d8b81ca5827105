//! Names that never count as installable packages.
//!
//! Dependency lists mention the PHP runtime, its extensions, system libraries
//! and asset-manager shims alongside real packages. None of those can be
//! required at the top level, so the closure engine must not expand them and
//! the optimizer must never list them.

use reqopt_semver::{Comparator, Operator, VersionParser};

use crate::closure::IgnoreSet;
use crate::error::{OptimizeError, Result};

/// Synthetic and platform packages, matched exactly
pub const PLATFORM_PACKAGES: &[&str] = &[
    "__root__",
    "composer-plugin-api",
    "php",
    "php-64bit",
    "php-ipv6",
    "php-zts",
    "php-debug",
    "hhvm",
    "craftcms/cms",
];

/// Prefixes of extension, library and asset packages
pub const PLATFORM_PREFIXES: &[&str] = &["lib-", "ext-", "bower-asset/", "npm-asset/"];

/// Packages bundled with older platform releases, with the first platform
/// version that no longer bundles them
pub const DEFAULT_CONDITIONAL_RULES: &[(&str, &str)] = &[("composer/ca-bundle", "3.0.22")];

/// Check if a name is a platform or synthetic package.
///
/// # Examples
///
/// ```
/// use reqopt::platform::is_platform_package;
///
/// assert!(is_platform_package("php"));
/// assert!(is_platform_package("ext-json"));
/// assert!(is_platform_package("npm-asset/jquery"));
/// assert!(!is_platform_package("symfony/console"));
/// ```
pub fn is_platform_package(name: &str) -> bool {
    PLATFORM_PACKAGES.contains(&name) || PLATFORM_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// A package that is excluded while the platform is older than a given version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalRule {
    pub name: String,
    pub min_platform_version: String,
    normalized: String,
}

impl ConditionalRule {
    pub fn new(name: impl Into<String>, min_platform_version: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let min_platform_version = min_platform_version.into();
        let normalized = VersionParser::new()
            .normalize(&min_platform_version)
            .map_err(|_| OptimizeError::InvalidVersion {
                name: name.clone(),
                version: min_platform_version.clone(),
            })?;

        Ok(Self {
            name,
            min_platform_version,
            normalized,
        })
    }

    fn applies_below(&self, platform_version: &str) -> bool {
        Comparator::compare_normalized(platform_version, Operator::LessThan, &self.normalized)
    }
}

/// Platform filter for one caller's platform version
#[derive(Debug, Clone)]
pub struct PlatformFilter {
    /// Conditional rules active for this platform version
    excluded: Vec<String>,
}

impl PlatformFilter {
    /// Filter with the default conditional rules
    pub fn new(platform_version: &str) -> Self {
        let rules: Vec<ConditionalRule> = DEFAULT_CONDITIONAL_RULES
            .iter()
            .filter_map(|(name, min)| ConditionalRule::new(*name, *min).ok())
            .collect();
        Self::with_rules(platform_version, &rules)
    }

    /// Filter with an explicit conditional rule table.
    ///
    /// A platform version that does not parse triggers no conditional rule.
    pub fn with_rules(platform_version: &str, rules: &[ConditionalRule]) -> Self {
        let excluded = match VersionParser::new().normalize(platform_version) {
            Ok(normalized) => rules
                .iter()
                .filter(|rule| rule.applies_below(&normalized))
                .map(|rule| rule.name.clone())
                .collect(),
            Err(_) => {
                log::warn!("Unparsable platform version {:?}, conditional rules skipped", platform_version);
                Vec::new()
            }
        };

        Self { excluded }
    }

    /// Whether a dependency-derived name must not be expanded
    pub fn is_excluded(&self, name: &str) -> bool {
        is_platform_package(name) || self.excluded.iter().any(|excluded| excluded == name)
    }

    /// Initial ignore set: the exact platform names plus active conditional exclusions
    pub fn seed(&self) -> IgnoreSet {
        let mut ignore = IgnoreSet::new();
        ignore.extend(PLATFORM_PACKAGES.iter().map(|name| name.to_string()));
        ignore.extend(self.excluded.iter().cloned());
        ignore
    }
}
