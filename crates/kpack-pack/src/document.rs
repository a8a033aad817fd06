//! # Pack Document
//!
//! The merged, immutable view of one pack that every validation stage
//! reads. Built once by [`crate::parser`] and never mutated afterwards.
//!
//! Nodes stay as `serde_json::Value` so the structural pass can report
//! every mistyped field instead of failing at the first one. Typed
//! accessors live here so validators do not repeat lookup code.

use std::collections::BTreeSet;
use std::fmt;

use kpack_core::EntityPath;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::loader::PRIMARY_DOCUMENT;

// ---------------------------------------------------------------------------
// Named entries
// ---------------------------------------------------------------------------

/// Which document an entry came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// The primary `pack.yaml`.
    Primary,
    /// A fragment, by its path relative to the pack root.
    Fragment(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str(PRIMARY_DOCUMENT),
            Self::Fragment(name) => f.write_str(name),
        }
    }
}

/// One tool, prompt or resource, keyed by its unique name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEntry {
    /// The mapping key under `tools` / `prompts` / `resources`.
    pub name: String,
    /// Where it was declared.
    pub origin: Origin,
    /// The raw body.
    pub body: Value,
    /// Entity path of the body, e.g. `tools.get_post`.
    pub path: EntityPath,
}

impl NamedEntry {
    /// Create an entry under the given top-level section.
    pub fn new(section: &str, name: impl Into<String>, origin: Origin, body: Value) -> Self {
        let name = name.into();
        let path = EntityPath::new(section).field(&name);
        Self {
            name,
            origin,
            body,
            path,
        }
    }

    /// The body as a mapping, if it is one.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.body.as_object()
    }

    /// A string field of the body.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// A non-null field of the body.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key).filter(|v| !v.is_null())
    }

    /// The declared parameters of a tool entry.
    pub fn parameters(&self) -> Parameters<'_> {
        let base = self.path.field("parameters");
        match self.body.get("parameters") {
            None | Some(Value::Null) => Parameters::Absent,
            Some(Value::Array(items)) => Parameters::Declared {
                form: ParamForm::List,
                entries: items
                    .iter()
                    .enumerate()
                    .map(|(i, body)| ParamEntry {
                        key: None,
                        declared_name: body.get("name").and_then(Value::as_str),
                        path: base.index(i),
                        body,
                    })
                    .collect(),
            },
            Some(Value::Object(map)) => Parameters::Declared {
                form: ParamForm::Mapping,
                entries: map
                    .iter()
                    .map(|(key, body)| ParamEntry {
                        key: Some(key.as_str()),
                        declared_name: body.get("name").and_then(Value::as_str),
                        path: base.field(key),
                        body,
                    })
                    .collect(),
            },
            Some(other) => Parameters::Malformed(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How a tool spelled its parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamForm {
    /// `parameters: [ { name: x, ... } ]`
    List,
    /// `parameters: { x: { ... } }`
    Mapping,
}

/// One parameter declaration, in either form.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry<'a> {
    /// Mapping key, for the mapping form.
    pub key: Option<&'a str>,
    /// The inner `name` field, if present and a string.
    pub declared_name: Option<&'a str>,
    /// Entity path of the declaration.
    pub path: EntityPath,
    /// The raw declaration.
    pub body: &'a Value,
}

impl<'a> ParamEntry<'a> {
    /// The effective parameter name: the mapping key when there is one,
    /// otherwise the inner `name`.
    pub fn name(&self) -> Option<&'a str> {
        self.key.or(self.declared_name)
    }

    /// A string field of the declaration.
    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// Whether the parameter is bound into the endpoint or statement
    /// template (`location: path`).
    pub fn is_path_bound(&self) -> bool {
        self.str_field("location") == Some("path")
    }
}

/// The parameter list of a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameters<'a> {
    /// No `parameters` key.
    Absent,
    /// A list or mapping of declarations.
    Declared {
        /// Which form was used.
        form: ParamForm,
        /// Declarations in document order.
        entries: Vec<ParamEntry<'a>>,
    },
    /// `parameters` is neither a list nor a mapping.
    Malformed(&'a Value),
}

impl<'a> Parameters<'a> {
    /// Declarations, empty when absent or malformed.
    pub fn entries(&self) -> &[ParamEntry<'a>] {
        match self {
            Self::Declared { entries, .. } => entries,
            Self::Absent | Self::Malformed(_) => &[],
        }
    }

    /// Effective names of all declarations that have one.
    pub fn names(&self) -> BTreeSet<&'a str> {
        self.entries().iter().filter_map(ParamEntry::name).collect()
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// The merged pack document for one validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PackDocument {
    /// Logical name from the loader, usually the directory name.
    pub logical_name: Option<String>,
    /// Primary document top level, minus the merged sections.
    pub root: Map<String, Value>,
    /// Whether `structure.tools` points at tool fragments.
    pub tools_pointer: bool,
    /// Tools, primary first, then fragments in name order.
    pub tools: Vec<NamedEntry>,
    /// Prompts, same ordering as tools.
    pub prompts: Vec<NamedEntry>,
    /// Resources, same ordering as tools.
    pub resources: Vec<NamedEntry>,
    /// Files behind `structure.transforms`, when that pointer is declared.
    pub transform_files: Option<BTreeSet<String>>,
    /// The parsed guardrail policy.
    pub guardrails: Option<Value>,
}

impl PackDocument {
    /// A top-level section of the primary document.
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.root.get(key).filter(|v| !v.is_null())
    }

    /// `metadata`, if it is a mapping.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.section("metadata").and_then(Value::as_object)
    }

    /// `connection`, if it is a mapping.
    pub fn connection(&self) -> Option<&Map<String, Value>> {
        self.section("connection").and_then(Value::as_object)
    }

    /// A string field of `metadata`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    /// The declared pack name.
    pub fn pack_name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    /// The raw compatibility declaration.
    pub fn compatibility(&self) -> Option<&str> {
        self.metadata_str("compatibility")
    }

    /// A tool by name.
    pub fn tool(&self, name: &str) -> Option<&NamedEntry> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// The whole merged document as one JSON value, sections in canonical
    /// order, merged entries in their merge order.
    pub fn to_value(&self) -> Value {
        let mut root = self.root.clone();
        for (key, entries) in [
            ("tools", &self.tools),
            ("prompts", &self.prompts),
            ("resources", &self.resources),
        ] {
            if entries.is_empty() {
                continue;
            }
            let merged: Map<String, Value> = entries
                .iter()
                .map(|e| (e.name.clone(), e.body.clone()))
                .collect();
            root.insert(key.to_string(), Value::Object(merged));
        }
        if let Some(policy) = &self.guardrails {
            root.insert("guardrails".to_string(), policy.clone());
        }
        Value::Object(root)
    }

    /// SHA-256 of the merged document, lowercase hex.
    ///
    /// Identical inputs yield identical digests; any change to any merged
    /// entry changes it.
    pub fn digest(&self) -> String {
        let bytes = self.to_value().to_string();
        let hash = Sha256::digest(bytes.as_bytes());
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// JSON type name used in messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
