//! Composer-compatible version handling for the requirement optimizer
//!
//! This crate normalizes version strings, classifies their stability, compares
//! them with PHP `version_compare` semantics and matches them against Composer
//! constraint expressions (`^1.2`, `~2.0`, `1.0.*`, `>=1.0 <2.0 || ^3.0`, ...).

pub mod constraint;
mod comparator;
mod semver;
mod version_parser;

pub use comparator::{php_version_compare, Comparator};
pub use constraint::{Constraint, Operator};
pub use semver::{Semver, Versioned};
pub use version_parser::{Stability, VersionParser, VersionParserError};
