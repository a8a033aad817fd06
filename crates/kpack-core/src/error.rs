//! # Error Types
//!
//! Structured errors for the foundation types, built with `thiserror`.
//! Validation findings are not errors; see [`crate::Issue`].

use thiserror::Error;

/// Errors raised while parsing a semantic version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The input was empty or only whitespace.
    #[error("version string is empty")]
    Empty,

    /// The input did not have exactly three dot-separated components.
    #[error("version {input:?} must have exactly three components (MAJOR.MINOR.PATCH), found {found}")]
    ComponentCount {
        /// The rejected input.
        input: String,
        /// How many components were found.
        found: usize,
    },

    /// A component was not a non-negative decimal integer.
    #[error("version {input:?} has a non-numeric component {component:?}")]
    NonNumeric {
        /// The rejected input.
        input: String,
        /// The offending component.
        component: String,
    },

    /// A component had a leading zero (`01`).
    #[error("version {input:?} has a leading zero in component {component:?}")]
    LeadingZero {
        /// The rejected input.
        input: String,
        /// The offending component.
        component: String,
    },
}
