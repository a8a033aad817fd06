#![deny(missing_docs)]

//! # kpack-core — Foundational Types for Knowledge Pack Validation
//!
//! This crate defines the types shared by every other crate in the workspace.
//! It has no internal crate dependencies and performs no I/O.
//!
//! ## Design Principles
//!
//! 1. **Findings are values, not errors.** A validation finding is an
//!    [`Issue`] with a stable [`IssueCode`], an [`EntityPath`], a
//!    [`Severity`], and a human message. Nothing in the validation pipeline
//!    surfaces a finding through `Err`.
//!
//! 2. **Stable codes.** [`IssueCode`] serializes to its variant name
//!    (`UnboundPlaceholder`, `InvalidPattern`, ...). Automation keys on
//!    these strings, so variants are only ever added.
//!
//! 3. **One version type.** [`SemVer`] is used for both a pack's own
//!    `version` and its `compatibility` declaration.

pub mod error;
pub mod issue;
pub mod path;
pub mod version;

// Re-export primary types at crate root for ergonomic imports.
pub use error::VersionError;
pub use issue::{Issue, IssueCode, Severity, Stage};
pub use path::EntityPath;
pub use version::SemVer;
