//! Constraint types for version matching

mod constraint;
mod operator;

pub use constraint::Constraint;
pub use operator::{InvalidOperatorError, Operator};
