use serde::{Deserialize, Serialize};
use std::fmt;

/// A `require` edge from a release to another package.
///
/// Only the target name takes part in closure expansion; the constraint is
/// stored for completeness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Target package name
    pub target: String,
    /// Version constraint string (e.g., "^1.0", ">=2.0,<3.0")
    pub constraint: String,
}

impl Link {
    pub fn new(target: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.constraint)
    }
}
