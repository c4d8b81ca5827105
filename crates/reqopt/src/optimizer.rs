//! Reduces install requests and an installed snapshot to top-level requirements.

use indexmap::IndexMap;
use reqopt_semver::Stability;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::closure::{self, IgnoreSet};
use crate::error::{OptimizeError, Result};
use crate::package::{split_inline_alias, ReleaseId};
use crate::platform::PlatformFilter;
use crate::registry::PackageRegistry;

/// Optimized requirements: name to resolved version (plus any inline alias)
pub type OptimizedRequirements = IndexMap<String, String>;

/// Packages to install and, optionally, everything installed right now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// Package name to constraint, possibly carrying an inline alias
    #[serde(deserialize_with = "deserialize_php_map")]
    pub install: IndexMap<String, String>,
    /// Package name to exact installed version
    #[serde(
        default,
        deserialize_with = "deserialize_optional_php_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub installed: Option<IndexMap<String, String>>,
}

/// PHP encodes an empty associative array as `[]`
fn deserialize_php_map<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(list) if list.is_empty() => Ok(IndexMap::new()),
        value => IndexMap::deserialize(value).map_err(serde::de::Error::custom),
    }
}

fn deserialize_optional_php_map<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<IndexMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => deserialize_php_map(value).map(Some).map_err(serde::de::Error::custom),
    }
}

impl OptimizeRequest {
    pub fn new(install: IndexMap<String, String>) -> Self {
        Self {
            install,
            installed: None,
        }
    }

    pub fn with_installed(mut self, installed: IndexMap<String, String>) -> Self {
        self.installed = Some(installed);
        self
    }

    /// Parses a JSON request body
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| OptimizeError::InvalidPayload {
            message: e.to_string(),
        })
    }
}

/// Requirement optimizer over one registry and platform
pub struct RequirementOptimizer<'a, R: PackageRegistry + ?Sized> {
    registry: &'a R,
    filter: PlatformFilter,
    minimum_stability: Stability,
}

impl<'a, R: PackageRegistry + ?Sized> RequirementOptimizer<'a, R> {
    pub fn new(registry: &'a R, filter: PlatformFilter) -> Self {
        Self {
            registry,
            filter,
            minimum_stability: Stability::Dev,
        }
    }

    pub fn with_minimum_stability(mut self, stability: Stability) -> Self {
        self.minimum_stability = stability;
        self
    }

    /// Resolves every install request and keeps the installed packages that
    /// nothing requested pulls in.
    ///
    /// Install requests come first in request order, followed by the kept
    /// installed packages in snapshot order. A single unresolvable request
    /// fails the whole call.
    pub fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizedRequirements> {
        let mut ignore = self.filter.seed();
        let mut optimized = OptimizedRequirements::with_capacity(request.install.len());
        let mut releases: Vec<ReleaseId> = Vec::with_capacity(request.install.len());

        for (name, raw_constraint) in &request.install {
            let (constraint, alias) = split_inline_alias(raw_constraint);

            let release = self
                .registry
                .latest_release(name, self.minimum_stability, constraint)?
                .ok_or_else(|| OptimizeError::ResolutionNotFound {
                    name: name.clone(),
                    constraint: raw_constraint.clone(),
                })?;

            log::debug!("Resolved {}@{} to {}", name, raw_constraint, release.version);
            optimized.insert(name.clone(), format!("{}{}", release.version, alias));
            ignore.insert(name.clone());
            releases.push(release.id);
        }

        if let Some(installed) = &request.installed {
            let ignore = closure::expand(self.registry, &self.filter, &releases, ignore)?;
            self.keep_installed(installed, &ignore, &mut optimized);
        }

        log::info!(
            "Optimized {} install requests into {} requirements",
            request.install.len(),
            optimized.len()
        );
        Ok(optimized)
    }

    fn keep_installed(
        &self,
        installed: &IndexMap<String, String>,
        ignore: &IgnoreSet,
        optimized: &mut OptimizedRequirements,
    ) {
        for (name, version) in installed {
            if ignore.contains(name) || optimized.contains_key(name) || self.filter.is_excluded(name) {
                log::trace!("Dropping installed {}", name);
                continue;
            }
            optimized.insert(name.clone(), version.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Link;
    use crate::registry::{MemoryRegistry, WritableRegistry};

    fn map(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn registry() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.publish("x/a", "1.0.0", &[Link::new("x/b", "^2.0")]).unwrap();
        registry
            .publish("x/a", "1.3.2", &[Link::new("x/b", "^2.0"), Link::new("php", ">=8.0")])
            .unwrap();
        registry.publish("x/b", "2.1.0", &[]).unwrap();
        registry.publish("x/c", "3.0.0", &[]).unwrap();
        registry
    }

    #[test]
    fn test_optimize_without_snapshot() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/c", "*"), ("x/a", "^1.0")]));
        let optimized = optimizer.optimize(&request).unwrap();

        assert_eq!(optimized, map(&[("x/c", "3.0.0"), ("x/a", "1.3.2")]));
    }

    #[test]
    fn test_optimize_prunes_transitive_packages() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/a", "^1.0")]))
            .with_installed(map(&[("x/a", "1.0.0"), ("x/b", "2.1.0"), ("x/c", "3.0.0")]));
        let optimized = optimizer.optimize(&request).unwrap();

        assert_eq!(optimized, map(&[("x/a", "1.3.2"), ("x/c", "3.0.0")]));
    }

    #[test]
    fn test_optimize_keeps_alias_suffix() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/a", "^1.0 as 2.0")]));
        let optimized = optimizer.optimize(&request).unwrap();

        assert_eq!(optimized["x/a"], "1.3.2 as 2.0");
    }

    #[test]
    fn test_optimize_is_all_or_nothing() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/a", "^1.0"), ("x/bad", "^9.9")]));
        let err = optimizer.optimize(&request).unwrap_err();

        assert_eq!(err.to_string(), "Unknown package/constraint: x/bad@^9.9");
    }

    #[test]
    fn test_optimize_reports_raw_constraint() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/a", "^7.0 as 1.0")]));
        let err = optimizer.optimize(&request).unwrap_err();

        assert_eq!(err.to_string(), "Unknown package/constraint: x/a@^7.0 as 1.0");
    }

    #[test]
    fn test_optimize_never_lists_platform_packages_from_snapshot() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/c", "*")]))
            .with_installed(map(&[("php", "8.2.0"), ("craftcms/cms", "3.0.25"), ("x/b", "2.1.0")]));
        let optimized = optimizer.optimize(&request).unwrap();

        assert_eq!(optimized, map(&[("x/c", "3.0.0"), ("x/b", "2.1.0")]));
    }

    #[test]
    fn test_optimize_drops_prefixed_platform_packages_from_snapshot() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::new(map(&[("x/a", "^1.0")])).with_installed(map(&[
            ("ext-json", "1.0"),
            ("lib-icu", "72.1"),
            ("npm-asset/jquery", "3.7.1"),
            ("x/c", "3.0.0"),
        ]));
        let optimized = optimizer.optimize(&request).unwrap();

        assert_eq!(optimized, map(&[("x/a", "1.3.2"), ("x/c", "3.0.0")]));
    }

    #[test]
    fn test_optimize_respects_minimum_stability() {
        let mut registry = registry();
        registry.publish("x/c", "4.0.0-beta1", &[]).unwrap();

        let request = OptimizeRequest::new(map(&[("x/c", "*")]));

        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));
        assert_eq!(optimizer.optimize(&request).unwrap()["x/c"], "4.0.0-beta1");

        let optimizer = optimizer.with_minimum_stability(Stability::Stable);
        assert_eq!(optimizer.optimize(&request).unwrap()["x/c"], "3.0.0");
    }

    #[test]
    fn test_request_from_json() {
        let request = OptimizeRequest::from_json(
            r#"{"install": {"x/b": "^2.0", "x/a": "^1.0"}, "installed": {"x/c": "3.0.0"}}"#,
        )
        .unwrap();

        let names: Vec<&str> = request.install.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["x/b", "x/a"]);
        assert_eq!(request.installed, Some(map(&[("x/c", "3.0.0")])));
    }

    #[test]
    fn test_request_from_json_accepts_empty_php_arrays() {
        let request = OptimizeRequest::from_json(r#"{"install": {"x/a": "^1.0"}, "installed": []}"#).unwrap();
        assert_eq!(request.install, map(&[("x/a", "^1.0")]));
        assert_eq!(request.installed, Some(IndexMap::new()));

        let request = OptimizeRequest::from_json(r#"{"install": [], "installed": {"x/c": "3.0.0"}}"#).unwrap();
        assert!(request.install.is_empty());
        assert_eq!(request.installed, Some(map(&[("x/c", "3.0.0")])));

        let request = OptimizeRequest::from_json(r#"{"install": [], "installed": null}"#).unwrap();
        assert!(request.install.is_empty());
        assert_eq!(request.installed, None);
    }

    #[test]
    fn test_optimize_with_empty_install_keeps_snapshot() {
        let registry = registry();
        let optimizer = RequirementOptimizer::new(&registry, PlatformFilter::new("3.0.25"));

        let request = OptimizeRequest::from_json(r#"{"install": [], "installed": {"x/b": "2.1.0", "x/c": "3.0.0"}}"#)
            .unwrap();
        let optimized = optimizer.optimize(&request).unwrap();

        assert_eq!(optimized, map(&[("x/b", "2.1.0"), ("x/c", "3.0.0")]));
    }

    #[test]
    fn test_request_from_json_rejects_malformed_payloads() {
        for body in [
            "",
            "[]",
            "{}",
            r#"{"install": ["x/a"]}"#,
            r#"{"install": {"x/a": 1}}"#,
            r#"{"install": {}, "installed": ["x/a"]}"#,
        ] {
            let err = OptimizeRequest::from_json(body).unwrap_err();
            assert!(matches!(err, OptimizeError::InvalidPayload { .. }), "{}", body);
        }
    }
}
