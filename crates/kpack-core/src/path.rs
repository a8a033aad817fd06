//! # Entity Paths
//!
//! Dotted locations into a pack document, e.g.
//! `tools.search_customers.parameters[1].type`. Every [`crate::Issue`]
//! carries one so a reader can find the offending entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dotted path into a pack or guardrail document.
///
/// The empty path denotes the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityPath(String);

impl EntityPath {
    /// The document root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// A path starting at the given top-level key.
    pub fn new(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Append a mapping key.
    pub fn field(&self, key: &str) -> Self {
        if self.0.is_empty() {
            Self(key.to_string())
        } else {
            Self(format!("{}.{key}", self.0))
        }
    }

    /// Append a sequence index.
    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{i}]", self.0))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<EntityPath> for String {
    fn from(path: EntityPath) -> Self {
        path.0
    }
}

impl From<&EntityPath> for String {
    fn from(path: &EntityPath) -> Self {
        path.0.clone()
    }
}

impl From<&str> for EntityPath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&EntityPath> for EntityPath {
    fn from(p: &EntityPath) -> Self {
        p.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_dotted_and_indexed_paths() {
        let p = EntityPath::new("tools")
            .field("search_customers")
            .field("parameters")
            .index(1)
            .field("type");
        assert_eq!(p.as_str(), "tools.search_customers.parameters[1].type");
    }

    #[test]
    fn field_on_root_has_no_leading_dot() {
        assert_eq!(EntityPath::root().field("metadata").as_str(), "metadata");
    }

    #[test]
    fn root_displays_placeholder() {
        assert_eq!(EntityPath::root().to_string(), "<root>");
        assert!(EntityPath::root().is_root());
    }
}
