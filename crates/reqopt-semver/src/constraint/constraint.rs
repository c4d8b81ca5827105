//! Parsed version constraint tree

use std::fmt;

use super::Operator;
use crate::Comparator;

/// A parsed Composer version constraint.
///
/// Versions held by [`Constraint::Single`] are always normalized
/// (`1.2.0.0`, `2.0.0.0-dev`, `dev-master`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Matches any version (`*`)
    MatchAll,
    /// Matches no version
    MatchNone,
    /// A single comparison against a normalized version
    Single { operator: Operator, version: String },
    /// AND (conjunctive) or OR (disjunctive) combination
    Multi {
        constraints: Vec<Constraint>,
        conjunctive: bool,
    },
}

impl Constraint {
    /// Create a single comparison constraint
    pub fn single(operator: Operator, version: impl Into<String>) -> Self {
        Constraint::Single {
            operator,
            version: version.into(),
        }
    }

    /// Combine constraints, collapsing trivial cases.
    ///
    /// No constraints yields [`Constraint::MatchAll`]; a single one is returned as-is.
    pub fn multi(mut constraints: Vec<Constraint>, conjunctive: bool) -> Self {
        match constraints.len() {
            0 => Constraint::MatchAll,
            1 => constraints.remove(0),
            _ => Constraint::Multi {
                constraints,
                conjunctive,
            },
        }
    }

    /// Check a normalized version against this constraint
    pub fn matches_normalized(&self, normalized: &str) -> bool {
        match self {
            Constraint::MatchAll => true,
            Constraint::MatchNone => false,
            Constraint::Single { operator, version } => {
                Comparator::compare_normalized(normalized, *operator, version)
            }
            Constraint::Multi {
                constraints,
                conjunctive: true,
            } => constraints.iter().all(|c| c.matches_normalized(normalized)),
            Constraint::Multi {
                constraints,
                conjunctive: false,
            } => constraints.iter().any(|c| c.matches_normalized(normalized)),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::MatchAll => write!(f, "*"),
            Constraint::MatchNone => write!(f, "[]"),
            Constraint::Single { operator, version } => write!(f, "{} {}", operator, version),
            Constraint::Multi {
                constraints,
                conjunctive,
            } => {
                let separator = if *conjunctive { " " } else { " || " };
                let parts: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", parts.join(separator))
            }
        }
    }
}
