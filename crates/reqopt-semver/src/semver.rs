//! Newest-version selection over constraint matches

use std::cmp::Ordering;

use crate::{Comparator, Constraint, Stability};

/// A candidate that carries a normalized version and its stability
pub trait Versioned {
    fn normalized_version(&self) -> &str;
    fn stability(&self) -> Stability;
}

/// Main facade for semantic versioning operations
pub struct Semver;

impl Semver {
    /// Newest candidate matching `constraint` whose stability is at least `floor`.
    /// Ties keep the first candidate.
    pub fn latest<T, I>(candidates: I, constraint: &Constraint, floor: Stability) -> Option<T>
    where
        T: Versioned,
        I: IntoIterator<Item = T>,
    {
        let mut best: Option<T> = None;

        for candidate in candidates {
            if !candidate.stability().is_at_least(floor)
                || !constraint.matches_normalized(candidate.normalized_version())
            {
                continue;
            }
            let newer = match &best {
                Some(current) => {
                    Comparator::order(candidate.normalized_version(), current.normalized_version())
                        == Ordering::Greater
                }
                None => true,
            };
            if newer {
                best = Some(candidate);
            }
        }

        best
    }
}
