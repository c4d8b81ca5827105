//! Loads Composer repository metadata into a writable registry.
//!
//! Two dump layouts are understood:
//!
//! - the classic `packages.json` layout, where every package maps version
//!   strings to version objects;
//! - the Composer 2 `p2/` layout, where every package maps to a list of
//!   version objects, optionally minified (`"minified": "composer/2.0"`).

use std::fs;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::error::{OptimizeError, Result};
use crate::package::Link;
use crate::registry::WritableRegistry;

const USER_AGENT: &str = concat!("reqopt/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(60);

/// Marker used by minified metadata to drop an inherited key
const UNSET_MARKER: &str = "__unset";

/// Counts from one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub packages: usize,
    pub releases: usize,
    /// Version entries skipped because their version does not parse
    pub skipped: usize,
}

impl std::ops::AddAssign for ImportSummary {
    fn add_assign(&mut self, other: Self) {
        self.packages += other.packages;
        self.releases += other.releases;
        self.skipped += other.skipped;
    }
}

/// Reads a dump from a local path or an `http(s)` URL
pub fn read_source(source: &str) -> Result<String> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => fetch(url),
        _ => {
            log::debug!("Reading repository dump from {}", source);
            Ok(fs::read_to_string(source)?)
        }
    }
}

fn fetch(url: Url) -> Result<String> {
    log::info!("Downloading {}", url);
    let client = reqwest::blocking::Client::builder()
        .timeout(TIMEOUT)
        .gzip(true)
        .user_agent(USER_AGENT)
        .build()?;

    let body = client.get(url).send()?.error_for_status()?.text()?;
    Ok(body)
}

/// Imports every source in order, all inside one write batch
pub fn import_sources<W>(registry: &mut W, sources: &[String]) -> Result<ImportSummary>
where
    W: WritableRegistry + ?Sized,
{
    let mut summary = ImportSummary::default();
    registry.begin_batch()?;

    for source in sources {
        let result = read_source(source).and_then(|json| import_dump(registry, &json));
        match result {
            Ok(imported) => {
                log::info!(
                    "Imported {} releases of {} packages from {}",
                    imported.releases,
                    imported.packages,
                    source
                );
                summary += imported;
            }
            Err(e) => {
                if let Err(rollback) = registry.rollback_batch() {
                    log::warn!("Rollback failed: {}", rollback);
                }
                return Err(e);
            }
        }
    }

    registry.commit_batch()?;
    Ok(summary)
}

/// Imports one JSON dump
pub fn import_dump<W>(registry: &mut W, json: &str) -> Result<ImportSummary>
where
    W: WritableRegistry + ?Sized,
{
    let root: Value = serde_json::from_str(json)?;
    let Some(root) = root.as_object() else {
        return Err(invalid("repository dump must be a JSON object"));
    };

    let minified = root.get("minified").and_then(Value::as_str) == Some("composer/2.0");
    let mut summary = ImportSummary::default();

    // root packages.json files of large repositories carry `"packages": []`
    let Some(packages) = root.get("packages").and_then(Value::as_object) else {
        return Ok(summary);
    };

    for (name, versions) in packages {
        let entries = match versions {
            Value::Object(by_version) => by_version
                .iter()
                .map(|(version, data)| version_entry(name, Some(version), data))
                .collect::<Result<Vec<_>>>()?,
            Value::Array(list) => {
                let list = list
                    .iter()
                    .map(|data| version_entry(name, None, data))
                    .collect::<Result<Vec<_>>>()?;
                if minified {
                    expand_minified(list)
                } else {
                    list
                }
            }
            _ => return Err(invalid(format!("versions of {} must be an object or a list", name))),
        };

        let package = registry.add_package(name)?;
        summary.packages += 1;

        for entry in entries {
            let Some(version) = entry.get("version").and_then(Value::as_str) else {
                return Err(invalid(format!("a release of {} has no version", name)));
            };

            match registry.add_release(&package, version, &requires(name, &entry)?) {
                Ok(_) => summary.releases += 1,
                Err(OptimizeError::InvalidVersion { name, version }) => {
                    log::warn!("Skipping {} {}: unparsable version", name, version);
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(summary)
}

/// The object for one version, with the map key as fallback version string
fn version_entry(name: &str, key: Option<&str>, data: &Value) -> Result<Map<String, Value>> {
    let Some(object) = data.as_object() else {
        return Err(invalid(format!("a release of {} is not an object", name)));
    };

    let mut object = object.clone();
    if let Some(key) = key {
        object
            .entry("version")
            .or_insert_with(|| Value::String(key.to_string()));
    }
    Ok(object)
}

/// Undo Composer 2 metadata minification: each entry only lists the keys
/// that differ from the entry before it.
fn expand_minified(entries: Vec<Map<String, Value>>) -> Vec<Map<String, Value>> {
    let mut expanded = Vec::with_capacity(entries.len());
    let mut current: Option<Map<String, Value>> = None;

    for entry in entries {
        let next = match current.take() {
            None => entry,
            Some(mut previous) => {
                for (key, value) in entry {
                    if value.as_str() == Some(UNSET_MARKER) {
                        previous.remove(&key);
                    } else {
                        previous.insert(key, value);
                    }
                }
                previous
            }
        };
        expanded.push(next.clone());
        current = Some(next);
    }

    expanded
}

fn requires(name: &str, entry: &Map<String, Value>) -> Result<Vec<Link>> {
    let Some(require) = entry.get("require") else {
        return Ok(Vec::new());
    };

    match require {
        Value::Object(links) => Ok(links
            .iter()
            .map(|(target, constraint)| {
                let constraint = match constraint {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Link::new(target.clone(), constraint)
            })
            .collect()),
        // empty PHP arrays serialize as `[]`
        Value::Array(list) if list.is_empty() => Ok(Vec::new()),
        Value::String(s) if s == UNSET_MARKER => Ok(Vec::new()),
        _ => Err(invalid(format!("require of {} must be an object", name))),
    }
}

fn invalid(message: impl Into<String>) -> OptimizeError {
    OptimizeError::InvalidPayload {
        message: message.into(),
    }
}
