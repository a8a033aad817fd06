//! # Source Loading
//!
//! The validator never touches a filesystem. It asks a [`PackLoader`] for
//! raw text: the primary document, the fragments behind each structural
//! pointer, and the optional guardrail policy. The CLI supplies a
//! directory-backed loader; tests and embedders use [`MemoryLoader`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{PackError, PackResult};

/// File name of the primary pack document.
pub const PRIMARY_DOCUMENT: &str = "pack.yaml";

/// File names accepted for the guardrail policy, in lookup order.
pub const GUARDRAIL_DOCUMENTS: &[&str] = &["guardrails.yaml", "guardrails.yml"];

/// One file behind a structural pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    /// Path relative to the pack root, `/`-separated.
    pub name: String,
    /// File contents.
    pub text: String,
}

/// Supplies raw pack text to the parser.
///
/// Implementations return `Err` only for system failures (unreadable
/// files, permission errors). Absence is `Ok(None)`.
pub trait PackLoader {
    /// Logical name of the pack, usually its directory name.
    fn logical_name(&self) -> Option<String> {
        None
    }

    /// Text of the primary document.
    fn primary(&self) -> PackResult<String>;

    /// Files behind a structural pointer. A pointer may name a single file
    /// or a directory; a directory yields its direct children sorted by
    /// name. `pointer` is already normalized by [`normalize_pointer`].
    fn fragments(&self, pointer: &str) -> PackResult<Option<Vec<RawFragment>>>;

    /// Text of the guardrail policy, if the pack has one.
    fn guardrails(&self) -> PackResult<Option<String>>;
}

impl<L: PackLoader + ?Sized> PackLoader for &L {
    fn logical_name(&self) -> Option<String> {
        (**self).logical_name()
    }

    fn primary(&self) -> PackResult<String> {
        (**self).primary()
    }

    fn fragments(&self, pointer: &str) -> PackResult<Option<Vec<RawFragment>>> {
        (**self).fragments(pointer)
    }

    fn guardrails(&self) -> PackResult<Option<String>> {
        (**self).guardrails()
    }
}

/// Normalize a structural pointer to a `/`-separated path relative to the
/// pack root.
///
/// `./tools/`, `tools/` and `tools` all normalize to `tools`. Returns `None`
/// for absolute pointers and pointers that climb out of the pack with `..`.
pub fn normalize_pointer(pointer: &str) -> Option<String> {
    let trimmed = pointer.trim();
    if trimmed.starts_with('/') || trimmed.starts_with('\\') || trimmed.contains(':') {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in trimmed.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return None,
            s => parts.push(s),
        }
    }

    Some(parts.join("/"))
}

// ---------------------------------------------------------------------------
// In-memory loader
// ---------------------------------------------------------------------------

/// A loader over an in-memory map of relative path to file text.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    name: Option<String>,
    files: BTreeMap<String, String>,
}

impl MemoryLoader {
    /// An empty loader with no logical name.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty loader for the pack with the given logical name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            files: BTreeMap::new(),
        }
    }

    /// A loader holding only a primary document.
    pub fn from_primary(text: impl Into<String>) -> Self {
        Self::new().with_file(PRIMARY_DOCUMENT, text)
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    /// Add or replace a file. The path is normalized like a pointer.
    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        let path = path.into();
        let key = normalize_pointer(&path).unwrap_or(path);
        self.files.insert(key, text.into());
    }
}

impl PackLoader for MemoryLoader {
    fn logical_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn primary(&self) -> PackResult<String> {
        self.files
            .get(PRIMARY_DOCUMENT)
            .cloned()
            .ok_or_else(|| PackError::FileNotFound {
                path: PathBuf::from(PRIMARY_DOCUMENT),
            })
    }

    fn fragments(&self, pointer: &str) -> PackResult<Option<Vec<RawFragment>>> {
        if let Some(text) = self.files.get(pointer) {
            return Ok(Some(vec![RawFragment {
                name: pointer.to_string(),
                text: text.clone(),
            }]));
        }

        let prefix = if pointer.is_empty() {
            String::new()
        } else {
            format!("{pointer}/")
        };
        let children: Vec<RawFragment> = self
            .files
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(path, text)| RawFragment {
                name: path.clone(),
                text: text.clone(),
            })
            .collect();

        Ok(if children.is_empty() {
            None
        } else {
            Some(children)
        })
    }

    fn guardrails(&self) -> PackResult<Option<String>> {
        Ok(GUARDRAIL_DOCUMENTS
            .iter()
            .find_map(|name| self.files.get(*name).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_dot_and_trailing_slash() {
        assert_eq!(normalize_pointer("./tools/").as_deref(), Some("tools"));
        assert_eq!(normalize_pointer("tools").as_deref(), Some("tools"));
        assert_eq!(
            normalize_pointer("./tools//search.yaml").as_deref(),
            Some("tools/search.yaml")
        );
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert_eq!(normalize_pointer("../secrets"), None);
        assert_eq!(normalize_pointer("tools/../../etc"), None);
        assert_eq!(normalize_pointer("/etc/passwd"), None);
        assert_eq!(normalize_pointer("C:\\windows"), None);
    }

    #[test]
    fn memory_loader_resolves_directory_children_sorted() {
        let loader = MemoryLoader::from_primary("metadata: {}")
            .with_file("tools/b.yaml", "tools: {}")
            .with_file("tools/a.yaml", "tools: {}")
            .with_file("tools/nested/c.yaml", "tools: {}");
        let fragments = loader.fragments("tools").unwrap().unwrap();
        let names: Vec<_> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["tools/a.yaml", "tools/b.yaml"]);
    }

    #[test]
    fn memory_loader_resolves_single_file() {
        let loader = MemoryLoader::new().with_file("./tools/search.yaml", "tools: {}");
        let fragments = loader.fragments("tools/search.yaml").unwrap().unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].name, "tools/search.yaml");
    }

    #[test]
    fn memory_loader_missing_pointer_is_none() {
        let loader = MemoryLoader::from_primary("metadata: {}");
        assert!(loader.fragments("prompts").unwrap().is_none());
    }

    #[test]
    fn memory_loader_missing_primary_is_system_error() {
        let loader = MemoryLoader::new();
        assert!(matches!(
            loader.primary(),
            Err(PackError::FileNotFound { .. })
        ));
    }

    #[test]
    fn memory_loader_finds_guardrails_by_either_extension() {
        let loader = MemoryLoader::new().with_file("guardrails.yml", "blocked_patterns: {}");
        assert_eq!(
            loader.guardrails().unwrap().as_deref(),
            Some("blocked_patterns: {}")
        );
    }
}
