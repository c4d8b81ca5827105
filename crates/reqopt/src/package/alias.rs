use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INLINE_ALIAS_RE: Regex = Regex::new(r"^([^,\s]+)( +as +[^,\s]+)$").unwrap();
}

/// Splits an inline alias off a requirement constraint.
///
/// `"dev-main as 1.0.x-dev"` becomes `("dev-main", " as 1.0.x-dev")`. The
/// suffix keeps its original spacing so it can be appended to a resolved
/// version unchanged. Constraints without a well-formed alias come back whole
/// with an empty suffix.
///
/// # Examples
///
/// ```
/// use reqopt::package::split_inline_alias;
///
/// assert_eq!(split_inline_alias("^1.0 as 2.0"), ("^1.0", " as 2.0"));
/// assert_eq!(split_inline_alias("^1.0"), ("^1.0", ""));
/// ```
pub fn split_inline_alias(constraint: &str) -> (&str, &str) {
    match INLINE_ALIAS_RE.captures(constraint) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(actual), Some(suffix)) => (actual.as_str(), suffix.as_str()),
            _ => (constraint, ""),
        },
        None => (constraint, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_inline_alias() {
        assert_eq!(split_inline_alias("^1.0 as 2.0"), ("^1.0", " as 2.0"));
        assert_eq!(split_inline_alias("dev-main as 1.0.x-dev"), ("dev-main", " as 1.0.x-dev"));
    }

    #[test]
    fn test_split_inline_alias_keeps_spacing() {
        assert_eq!(split_inline_alias("dev-main   as  1.0.0"), ("dev-main", "   as  1.0.0"));
    }

    #[test]
    fn test_split_inline_alias_without_alias() {
        assert_eq!(split_inline_alias("^1.0"), ("^1.0", ""));
        assert_eq!(split_inline_alias(">=1.0 <2.0"), (">=1.0 <2.0", ""));
        assert_eq!(split_inline_alias(""), ("", ""));
    }

    #[test]
    fn test_split_inline_alias_malformed() {
        // multi-part constraints cannot carry an inline alias
        assert_eq!(split_inline_alias("^1.0 || ^2.0 as 3.0"), ("^1.0 || ^2.0 as 3.0", ""));
        assert_eq!(split_inline_alias("1.0,2.0 as 3.0"), ("1.0,2.0 as 3.0", ""));
        assert_eq!(split_inline_alias("as 2.0"), ("as 2.0", ""));
        assert_eq!(split_inline_alias("1.0 as"), ("1.0 as", ""));
    }
}
