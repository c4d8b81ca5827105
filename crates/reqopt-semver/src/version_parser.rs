//! Version parsing and normalization module

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::constraint::{Constraint, Operator};

/// Stability levels for versions, least stable first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    Dev,
    Alpha,
    Beta,
    RC,
    Stable,
}

impl Stability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Dev => "dev",
            Stability::Alpha => "alpha",
            Stability::Beta => "beta",
            Stability::RC => "RC",
            Stability::Stable => "stable",
        }
    }

    /// Whether a release of this stability is acceptable under `floor`.
    /// The floor is inclusive: `dev` accepts everything.
    pub fn is_at_least(&self, floor: Stability) -> bool {
        *self >= floor
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stability {
    type Err = VersionParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionParser::normalize_stability(s)
    }
}

/// Error type for version parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParserError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Invalid stability \"{0}\"")]
    InvalidStability(String),
    #[error("Could not parse version constraint {constraint}: {reason}")]
    ConstraintParseError { constraint: String, reason: String },
}

/// Pre-release modifier. Groups: stability word, stability number, dev suffix.
const MODIFIER_REGEX: &str =
    r"[._-]?(?:(stable|beta|b|RC|alpha|a|patch|pl|p)((?:[.-]?\d+)*)?)?([.-]?dev)?";

const STABILITIES_REGEX: &str = "stable|RC|beta|alpha|dev";

lazy_static! {
    /// A version inside a constraint. Groups: four numbers, the three
    /// modifier groups, and an `x-dev` wildcard suffix.
    static ref VERSION_REGEX: String = format!(
        r"v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:{}|\.([xX*][.-]?dev))(?:\+[^\s]+)?",
        MODIFIER_REGEX
    );

    static ref CLASSICAL_VERSION_RE: Regex = Regex::new(&format!(
        r"(?i)^v?(\d{{1,5}})(\.\d+)?(\.\d+)?(\.\d+)?{}$",
        MODIFIER_REGEX
    )).unwrap();

    static ref DATE_VERSION_RE: Regex = Regex::new(&format!(
        r"(?i)^v?(\d{{4}}(?:[.:-]?\d{{2}}){{1,6}}(?:[.:-]?\d{{1,3}}){{0,2}}){}$",
        MODIFIER_REGEX
    )).unwrap();

    static ref BRANCH_RE: Regex = Regex::new(
        r"(?i)^v?(\d+)(\.(?:\d+|[x*]))?(\.(?:\d+|[x*]))?(\.(?:\d+|[x*]))?$"
    ).unwrap();

    static ref ALIAS_RE: Regex = Regex::new(r"^([^,\s]+) +as +([^,\s]+)$").unwrap();

    static ref STABILITY_FLAG_RE: Regex = Regex::new(&format!(r"(?i)@(?:{})$", STABILITIES_REGEX)).unwrap();

    static ref BUILD_METADATA_RE: Regex = Regex::new(r"^([^,\s+]+)\+[^\s]+$").unwrap();

    static ref DEV_SUFFIX_RE: Regex = Regex::new(r"(?i)^(.*?)[.-]?dev$").unwrap();

    static ref STABILITY_PARSE_RE: Regex = Regex::new(&format!(r"(?i){}(?:\+.*)?$", MODIFIER_REGEX)).unwrap();

    static ref OR_SPLIT_RE: Regex = Regex::new(r"\s*\|\|?\s*").unwrap();

    static ref CONSTRAINT_STABILITY_RE: Regex = Regex::new(&format!(r"(?i)^([^,\s]*?)@({})$", STABILITIES_REGEX)).unwrap();

    static ref CONSTRAINT_REF_RE: Regex = Regex::new(r"(?i)^(dev-[^,\s@]+?|[^,\s@]+?\.x-dev)#.+$").unwrap();

    static ref WILDCARD_RE: Regex = Regex::new(r"(?i)^(v)?[x*](\.[x*])*$").unwrap();

    static ref X_RANGE_RE: Regex = Regex::new(r"(?i)^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.[x*])+$").unwrap();

    static ref TILDE_RE: Regex = Regex::new(&format!(r"(?i)^~>?{}$", *VERSION_REGEX)).unwrap();

    static ref CARET_RE: Regex = Regex::new(&format!(r"(?i)^\^{}$", *VERSION_REGEX)).unwrap();

    static ref HYPHEN_RE: Regex = Regex::new(&format!(
        r"(?i)^({}) +- +({})$",
        *VERSION_REGEX, *VERSION_REGEX
    )).unwrap();

    static ref BASIC_COMPARATOR_RE: Regex = Regex::new(r"^(<>|!=|>=?|<=?|==?)?\s*(.*)$").unwrap();

    static ref RECOVERABLE_DEV_RE: Regex = Regex::new(r"^[0-9a-zA-Z./-]+$").unwrap();
}

/// The pieces of one [`VERSION_REGEX`] match.
struct VersionCaptures<'t> {
    numbers: [Option<&'t str>; 4],
    stability: Option<&'t str>,
    dev: Option<&'t str>,
    x_dev: Option<&'t str>,
}

impl<'t> VersionCaptures<'t> {
    /// Read the eight version groups starting at group `first`.
    fn read(caps: &Captures<'t>, first: usize) -> Self {
        let group = |i: usize| caps.get(first + i).map(|m| m.as_str()).filter(|s| !s.is_empty());
        VersionCaptures {
            numbers: [group(0), group(1), group(2), group(3)],
            stability: group(4),
            dev: group(6),
            x_dev: group(7),
        }
    }

    fn has_modifier(&self) -> bool {
        self.stability.is_some() || self.dev.is_some() || self.x_dev.is_some()
    }

    /// Number of leading version components that were spelled out
    fn specified(&self) -> usize {
        self.numbers.iter().rposition(Option::is_some).map_or(1, |i| i + 1)
    }
}

/// Bump the component at `position` (1-based) and zero everything after it.
fn manipulate_version(numbers: &[Option<&str>; 4], position: usize, increment: u64) -> String {
    let mut parts = [0u64; 4];
    for (i, part) in parts.iter_mut().enumerate() {
        if i + 1 > position {
            break;
        }
        *part = numbers[i].and_then(|n| n.parse().ok()).unwrap_or(0);
        if i + 1 == position {
            *part += increment;
        }
    }
    format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3])
}

fn constraint_error(constraint: &str, reason: impl Into<String>) -> VersionParserError {
    VersionParserError::ConstraintParseError {
        constraint: constraint.to_string(),
        reason: reason.into(),
    }
}

fn is_bare_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, '<' | '>' | '=' | '!' | '~' | '^'))
}

/// Version parser for normalizing and parsing version strings
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionParser;

impl VersionParser {
    /// Create a new version parser
    pub fn new() -> Self {
        VersionParser
    }

    /// Returns the stability of a version
    pub fn parse_stability(version: &str) -> Stability {
        let version = version.split('#').next().unwrap_or(version);

        if version.starts_with("dev-") || version.ends_with("-dev") {
            return Stability::Dev;
        }

        let lower = version.to_lowercase();
        let Some(caps) = STABILITY_PARSE_RE.captures(&lower) else {
            return Stability::Stable;
        };

        if caps.get(3).is_some_and(|m| !m.as_str().is_empty()) {
            return Stability::Dev;
        }

        match caps.get(1).map(|m| m.as_str()) {
            Some("beta") | Some("b") => Stability::Beta,
            Some("alpha") | Some("a") => Stability::Alpha,
            Some("rc") => Stability::RC,
            _ => Stability::Stable,
        }
    }

    /// Normalize a stability string
    pub fn normalize_stability(stability: &str) -> Result<Stability, VersionParserError> {
        match stability.to_lowercase().as_str() {
            "stable" => Ok(Stability::Stable),
            "rc" => Ok(Stability::RC),
            "beta" => Ok(Stability::Beta),
            "alpha" => Ok(Stability::Alpha),
            "dev" => Ok(Stability::Dev),
            _ => Err(VersionParserError::InvalidStability(stability.to_string())),
        }
    }

    /// Normalizes a version string to be able to perform comparisons on it
    pub fn normalize(&self, version: &str) -> Result<String, VersionParserError> {
        let original = version.trim();
        if original.is_empty() {
            return Err(VersionParserError::InvalidVersion(version.to_string()));
        }

        let version = match ALIAS_RE.captures(original) {
            Some(caps) => caps.get(1).map_or(original, |m| m.as_str()),
            None => original,
        };
        let version = STABILITY_FLAG_RE.replace(version, "");

        if matches!(&*version, "master" | "trunk" | "default") {
            return Ok(format!("dev-{}", version));
        }

        if version.get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("dev-")) {
            return Ok(format!("dev-{}", &version[4..]));
        }

        let version = match BUILD_METADATA_RE.captures(&version) {
            Some(caps) => caps.get(1).map_or(version.to_string(), |m| m.as_str().to_string()),
            None => version.to_string(),
        };

        if let Some(caps) = CLASSICAL_VERSION_RE.captures(&version) {
            let mut normalized = caps.get(1).map_or("0", |m| m.as_str()).to_string();
            for i in 2..=4 {
                normalized.push_str(caps.get(i).map_or(".0", |m| m.as_str()));
            }
            self.append_modifiers(&caps, 5, &mut normalized);
            return Ok(normalized);
        }

        if let Some(caps) = DATE_VERSION_RE.captures(&version) {
            let mut normalized: String = caps
                .get(1)
                .map_or("", |m| m.as_str())
                .chars()
                .map(|c| if c.is_ascii_digit() { c } else { '.' })
                .collect();
            self.append_modifiers(&caps, 2, &mut normalized);
            return Ok(normalized);
        }

        if let Some(caps) = DEV_SUFFIX_RE.captures(&version) {
            if let Some(branch) = caps.get(1) {
                let normalized = self.normalize_branch(branch.as_str());
                // only numeric branches may carry a -dev suffix
                if !normalized.starts_with("dev-") {
                    return Ok(normalized);
                }
            }
        }

        Err(VersionParserError::InvalidVersion(original.to_string()))
    }

    fn append_modifiers(&self, caps: &Captures<'_>, first: usize, normalized: &mut String) {
        let modifier = caps
            .get(first)
            .map(|m| m.as_str())
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case("stable"));
        if let Some(modifier) = modifier {
            normalized.push('-');
            normalized.push_str(&Self::expand_stability(modifier));
            if let Some(number) = caps.get(first + 1) {
                normalized.push_str(number.as_str().trim_start_matches(['.', '-']));
            }
        }

        if caps.get(first + 2).is_some_and(|m| !m.as_str().is_empty()) {
            normalized.push_str("-dev");
        }
    }

    fn expand_stability(stability: &str) -> String {
        match stability.to_lowercase().as_str() {
            "a" => "alpha".to_string(),
            "b" => "beta".to_string(),
            "p" | "pl" => "patch".to_string(),
            "rc" => "RC".to_string(),
            other => other.to_string(),
        }
    }

    /// Normalizes a branch name: numeric branches become `x.y.9999999.9999999-dev`,
    /// anything else `dev-<name>`.
    pub fn normalize_branch(&self, name: &str) -> String {
        let name = name.trim();

        if let Some(caps) = BRANCH_RE.captures(name) {
            let parts: Vec<String> = (1..=4)
                .map(|i| {
                    caps.get(i)
                        .map(|m| m.as_str().trim_start_matches('.').to_lowercase())
                        .filter(|p| p != "x" && p != "*")
                        .unwrap_or_else(|| "9999999".to_string())
                })
                .collect();
            return format!("{}-dev", parts.join("."));
        }

        format!("dev-{}", name)
    }

    /// Normalizes a default branch name (master/default/trunk) to 9999999-dev
    pub fn normalize_default_branch(&self, name: &str) -> String {
        if matches!(name, "dev-master" | "dev-default" | "dev-trunk") {
            "9999999-dev".to_string()
        } else {
            name.to_string()
        }
    }

    /// Parse a constraint string into a constraint tree
    pub fn parse_constraints(&self, constraints: &str) -> Result<Constraint, VersionParserError> {
        let trimmed = constraints.trim();
        if trimmed.is_empty() {
            return Err(constraint_error(constraints, "empty constraint"));
        }

        let or_parts: Vec<&str> = OR_SPLIT_RE.split(trimmed).collect();
        if or_parts.first().is_some_and(|p| p.is_empty()) {
            return Err(constraint_error(trimmed, "leading operator"));
        }
        if or_parts.last().is_some_and(|p| p.is_empty()) {
            return Err(constraint_error(trimmed, "trailing operator"));
        }

        let mut or_groups = Vec::with_capacity(or_parts.len());
        for or_part in or_parts {
            let and_parts = Self::split_and_constraints(or_part);
            if and_parts.is_empty() {
                return Err(constraint_error(trimmed, "empty constraint group"));
            }

            let mut and_group = Vec::new();
            for and_part in and_parts {
                and_group.extend(self.parse_constraint(&and_part)?);
            }
            or_groups.push(Constraint::multi(and_group, true));
        }

        Ok(Constraint::multi(or_groups, false))
    }

    /// Split one OR group on commas and whitespace, keeping operators with
    /// their versions (`>= 1.0`), hyphen ranges (`1.0 - 2.0`) and inline
    /// aliases (`1.0 as 2.0`) together.
    fn split_and_constraints(input: &str) -> Vec<String> {
        let tokens: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        let mut parts: Vec<String> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            let next = tokens.get(i + 1);

            if let Some(next) = next {
                if is_bare_operator(token) {
                    parts.push(format!("{}{}", token, next));
                    i += 2;
                    continue;
                }
                if token == "-" || token == "as" {
                    if let Some(previous) = parts.pop() {
                        parts.push(format!("{} {} {}", previous, token, next));
                        i += 2;
                        continue;
                    }
                }
            }

            parts.push(token.to_string());
            i += 1;
        }

        parts
    }

    fn parse_constraint(&self, constraint: &str) -> Result<Vec<Constraint>, VersionParserError> {
        let constraint = match ALIAS_RE.captures(constraint) {
            Some(caps) => caps.get(1).map_or(constraint, |m| m.as_str()),
            None => constraint,
        };

        let constraint = match CONSTRAINT_STABILITY_RE.captures(constraint) {
            Some(caps) => caps.get(1).map(|m| m.as_str()).filter(|c| !c.is_empty()).unwrap_or("*"),
            None => constraint,
        };

        let constraint = match CONSTRAINT_REF_RE.captures(constraint) {
            Some(caps) => caps.get(1).map_or(constraint, |m| m.as_str()),
            None => constraint,
        };

        if let Some(caps) = WILDCARD_RE.captures(constraint) {
            if caps.get(1).is_some() || constraint.contains('.') {
                return Ok(vec![Constraint::single(Operator::GreaterThanOrEqual, "0.0.0.0-dev")]);
            }
            return Ok(vec![Constraint::MatchAll]);
        }

        if let Some(caps) = TILDE_RE.captures(constraint) {
            if constraint.starts_with("~>") {
                return Err(constraint_error(
                    constraint,
                    "Invalid operator \"~>\", you probably meant to use the \"~\" operator",
                ));
            }
            let version = VersionCaptures::read(&caps, 1);
            let mut position = version.specified();
            if version.x_dev.is_some() {
                position += 1;
            }
            let suffix = if version.has_modifier() { "" } else { "-dev" };

            let low = self.normalize(&format!("{}{}", &constraint[1..], suffix))?;
            let high = manipulate_version(&version.numbers, position.saturating_sub(1).max(1), 1);
            return Ok(vec![
                Constraint::single(Operator::GreaterThanOrEqual, low),
                Constraint::single(Operator::LessThan, format!("{}-dev", high)),
            ]);
        }

        if let Some(caps) = CARET_RE.captures(constraint) {
            let version = VersionCaptures::read(&caps, 1);
            let [major, minor, patch, _] = version.numbers;
            let position = if major != Some("0") || minor.is_none() {
                1
            } else if minor != Some("0") || patch.is_none() {
                2
            } else {
                3
            };
            let suffix = if version.has_modifier() { "" } else { "-dev" };

            let low = self.normalize(&format!("{}{}", &constraint[1..], suffix))?;
            let high = manipulate_version(&version.numbers, position, 1);
            return Ok(vec![
                Constraint::single(Operator::GreaterThanOrEqual, low),
                Constraint::single(Operator::LessThan, format!("{}-dev", high)),
            ]);
        }

        if let Some(caps) = X_RANGE_RE.captures(constraint) {
            let numbers = [
                caps.get(1).map(|m| m.as_str()),
                caps.get(2).map(|m| m.as_str()),
                caps.get(3).map(|m| m.as_str()),
                None,
            ];
            let position = numbers.iter().rposition(Option::is_some).map_or(1, |i| i + 1);

            let low = format!("{}-dev", manipulate_version(&numbers, position, 0));
            let high = format!("{}-dev", manipulate_version(&numbers, position, 1));
            if low == "0.0.0.0-dev" {
                return Ok(vec![Constraint::single(Operator::LessThan, high)]);
            }
            return Ok(vec![
                Constraint::single(Operator::GreaterThanOrEqual, low),
                Constraint::single(Operator::LessThan, high),
            ]);
        }

        if let Some(caps) = HYPHEN_RE.captures(constraint) {
            let from_str = caps.get(1).map_or("", |m| m.as_str());
            let to_str = caps.get(10).map_or("", |m| m.as_str());
            let from = VersionCaptures::read(&caps, 2);
            let to = VersionCaptures::read(&caps, 11);

            let suffix = if from.has_modifier() { "" } else { "-dev" };
            let low = format!("{}{}", self.normalize(from_str)?, suffix);

            let [_, to_minor, to_patch, _] = to.numbers;
            let upper = if (to_minor.is_some() && to_patch.is_some()) || to.stability.is_some() || to.dev.is_some() {
                Constraint::single(Operator::LessThanOrEqual, self.normalize(to_str)?)
            } else {
                self.normalize(to_str)?;
                let position = if to_minor.is_none() { 1 } else { 2 };
                Constraint::single(
                    Operator::LessThan,
                    format!("{}-dev", manipulate_version(&to.numbers, position, 1)),
                )
            };

            return Ok(vec![Constraint::single(Operator::GreaterThanOrEqual, low), upper]);
        }

        if let Some(caps) = BASIC_COMPARATOR_RE.captures(constraint) {
            let operator = caps.get(1).map_or("=", |m| m.as_str());
            let raw_version = caps.get(2).map_or("", |m| m.as_str()).trim();
            if raw_version.is_empty() {
                return Err(constraint_error(constraint, "empty version"));
            }

            let version = match self.normalize(raw_version) {
                Ok(v) => v,
                // recover from `foobar-dev`, which should have been `dev-foobar`
                Err(_) if raw_version.ends_with("-dev") && RECOVERABLE_DEV_RE.is_match(raw_version) => {
                    self.normalize(&format!("dev-{}", &raw_version[..raw_version.len() - 4]))?
                }
                Err(_) => {
                    return Err(constraint_error(constraint, format!("Invalid version \"{}\"", raw_version)));
                }
            };

            let operator = Operator::from_str(operator)
                .map_err(|e| constraint_error(constraint, e.to_string()))?;

            // let `<1.0` and `>=1.0` cover the pre-releases of 1.0
            let version = if matches!(operator, Operator::LessThan | Operator::GreaterThanOrEqual)
                && !version.contains('-')
            {
                format!("{}-dev", version)
            } else {
                version
            };

            return Ok(vec![Constraint::single(operator, version)]);
        }

        Err(constraint_error(constraint, "Could not parse constraint"))
    }
}
