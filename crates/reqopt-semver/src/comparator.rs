//! Version comparison utilities

use std::cmp::Ordering;

use crate::constraint::Operator;
use crate::VersionParser;

/// Ordering of the special version forms understood by PHP's `version_compare`.
/// Forms are matched by prefix, so `patch` sorts with `p`.
const SPECIAL_FORMS: &[(&str, i32)] = &[
    ("dev", 0),
    ("alpha", 1),
    ("a", 1),
    ("beta", 2),
    ("b", 2),
    ("RC", 3),
    ("rc", 3),
    ("#", 4),
    ("pl", 5),
    ("p", 5),
];

/// Rank of a plain number among the special forms.
const NUMBER_ORDER: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part<'a> {
    Number(u64),
    Special(&'a str),
}

fn special_order(form: &str) -> i32 {
    SPECIAL_FORMS
        .iter()
        .find(|(name, _)| form.starts_with(name))
        .map(|(_, order)| *order)
        .unwrap_or(-6)
}

fn part_order(part: Part<'_>) -> i32 {
    match part {
        Part::Number(_) => NUMBER_ORDER,
        Part::Special(form) => special_order(form),
    }
}

/// Split a version the way PHP canonicalizes it: `-`, `_` and `+` act as dots
/// and every digit/non-digit transition starts a new part.
fn canonical_parts(version: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();

    for segment in version.split(|c| matches!(c, '.' | '-' | '_' | '+')) {
        let bytes = segment.as_bytes();
        let mut start = 0;
        for i in 1..=bytes.len() {
            if i < bytes.len() && bytes[i].is_ascii_digit() == bytes[start].is_ascii_digit() {
                continue;
            }
            let piece = &segment[start..i];
            if bytes[start].is_ascii_digit() {
                parts.push(Part::Number(piece.parse().unwrap_or(u64::MAX)));
            } else {
                parts.push(Part::Special(piece));
            }
            start = i;
        }
    }

    parts
}

/// Compare two versions with the semantics of PHP's `version_compare()`.
///
/// Intended for normalized versions (`1.2.0.0`, `1.0.0.0-beta2`, `2.0.0.0-dev`).
/// Branch names (`dev-foo`) are not handled here, see [`Comparator`].
pub fn php_version_compare(version1: &str, version2: &str) -> Ordering {
    let left = canonical_parts(version1);
    let right = canonical_parts(version2);

    for (a, b) in left.iter().zip(right.iter()) {
        let ordering = match (a, b) {
            (Part::Number(x), Part::Number(y)) => x.cmp(y),
            _ => part_order(*a).cmp(&part_order(*b)),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    match left.len().cmp(&right.len()) {
        Ordering::Greater => match left[right.len()] {
            Part::Number(_) => Ordering::Greater,
            part => part_order(part).cmp(&NUMBER_ORDER),
        },
        Ordering::Less => match right[left.len()] {
            Part::Number(_) => Ordering::Less,
            part => NUMBER_ORDER.cmp(&part_order(part)),
        },
        Ordering::Equal => Ordering::Equal,
    }
}

fn is_branch(version: &str) -> bool {
    version.starts_with("dev-")
}

/// Comparator for comparing version strings
pub struct Comparator;

impl Comparator {
    /// Compare two normalized versions.
    ///
    /// A `dev-` branch only ever equals itself: range operators never match it.
    pub fn compare_normalized(version1: &str, operator: Operator, version2: &str) -> bool {
        let left_branch = is_branch(version1);
        let right_branch = is_branch(version2);

        if operator == Operator::NotEqual && (left_branch || right_branch) {
            return version1 != version2;
        }

        if left_branch && right_branch {
            return operator == Operator::Equal && version1 == version2;
        }

        if left_branch || right_branch {
            return false;
        }

        operator.accepts(php_version_compare(version1, version2))
    }

    /// Total order used to pick the newest of several normalized versions.
    ///
    /// Default branches (`dev-master`, `dev-trunk`, `dev-default`) rank as
    /// `9999999-dev`; other branches rank below every numeric version and tie
    /// with each other.
    pub fn order(version1: &str, version2: &str) -> Ordering {
        let parser = VersionParser::new();
        let left = parser.normalize_default_branch(version1);
        let right = parser.normalize_default_branch(version2);

        match (is_branch(&left), is_branch(&right)) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => php_version_compare(&left, &right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_version_compare() {
        assert_eq!(php_version_compare("1.25.0", "1.24.0"), Ordering::Greater);
        assert_eq!(php_version_compare("1.0.0.0", "1.0.0.0"), Ordering::Equal);
        assert_eq!(php_version_compare("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(php_version_compare("1.0.0.0-dev", "1.0.0.0"), Ordering::Less);
        assert_eq!(php_version_compare("1.0.0.0-alpha1", "1.0.0.0-beta1"), Ordering::Less);
        assert_eq!(php_version_compare("1.0.0.0-beta2", "1.0.0.0-RC1"), Ordering::Less);
        assert_eq!(php_version_compare("1.0.0.0-RC1", "1.0.0.0"), Ordering::Less);
        assert_eq!(php_version_compare("1.0.0.0-patch1", "1.0.0.0"), Ordering::Greater);
        assert_eq!(php_version_compare("1.0.0.0-beta2-dev", "1.0.0.0-beta2"), Ordering::Less);
        assert_eq!(php_version_compare("2.0.0.0-dev", "1.9999.9999.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_normalized() {
        assert!(Comparator::compare_normalized("1.25.0.0", Operator::GreaterThan, "1.24.0.0"));
        assert!(!Comparator::compare_normalized("1.25.0.0", Operator::GreaterThan, "1.25.0.0"));
        assert!(Comparator::compare_normalized("3.0.21.0", Operator::LessThan, "3.0.22.0"));
        assert!(!Comparator::compare_normalized("3.0.22.0", Operator::LessThan, "3.0.22.0"));
        assert!(Comparator::compare_normalized("1.0.0.0", Operator::LessThan, "1.2.0.0-dev"));
        assert!(Comparator::compare_normalized("1.25.0.0", Operator::Equal, "1.25.0.0"));
        assert!(Comparator::compare_normalized("1.25.0.0", Operator::NotEqual, "1.24.0.0"));
    }

    #[test]
    fn test_compare_normalized_branches_never_match_ranges() {
        assert!(!Comparator::compare_normalized("dev-master", Operator::GreaterThanOrEqual, "1.0.0.0"));
        assert!(!Comparator::compare_normalized("dev-foo", Operator::LessThan, "3.0.22.0"));
        assert!(!Comparator::compare_normalized("dev-foo", Operator::Equal, "dev-bar"));
        assert!(Comparator::compare_normalized("dev-master", Operator::Equal, "dev-master"));
        assert!(Comparator::compare_normalized("dev-master", Operator::NotEqual, "1.0.0.0"));
    }

    #[test]
    fn test_order() {
        assert_eq!(Comparator::order("1.3.2.0", "1.3.10.0"), Ordering::Less);
        assert_eq!(Comparator::order("dev-feature", "0.0.1.0"), Ordering::Less);
        assert_eq!(Comparator::order("dev-master", "50.2.0.0"), Ordering::Greater);
        assert_eq!(Comparator::order("dev-foo", "dev-bar"), Ordering::Equal);
    }
}
