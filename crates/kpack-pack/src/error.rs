//! Pack-specific error types.
//!
//! These are system errors only: conditions that prevent a report from being
//! produced at all. Problems in the pack itself are [`kpack_core::Issue`]s.

use std::path::PathBuf;

use kpack_schema::RegistryError;
use thiserror::Error;

/// Errors that can prevent validation from producing a report.
#[derive(Debug, Error)]
pub enum PackError {
    /// The primary document does not exist.
    #[error("required file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A structural pointer escapes the pack root.
    #[error("fragment pointer {pointer:?} escapes the pack directory")]
    PointerEscape { pointer: String },

    /// The schema registry could not supply a rule set.
    #[error("schema registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scaffold rendering failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No scaffold blueprint exists for this connection type.
    #[error("no scaffold for {connection} connections (supported: {supported})")]
    UnsupportedScaffold {
        connection: String,
        supported: String,
    },

    /// A scaffold was requested under a name that is not a pack name.
    #[error("invalid pack name {name:?}: start with a letter, then letters, digits, `-` or `_`")]
    InvalidPackName { name: String },
}

/// Result type alias for pack operations.
pub type PackResult<T> = Result<T, PackError>;
