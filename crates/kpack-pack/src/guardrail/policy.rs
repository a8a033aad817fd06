//! A lenient, borrowed view over a parsed guardrail policy.
//!
//! Nothing here reports issues. Nodes of the wrong shape are simply left
//! out of the view; [`super::rules::ShapeRule`] reports them.

use std::fmt;

use kpack_core::EntityPath;
use serde_json::{Map, Value};

/// Which section a pattern group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatternClass {
    /// `blocked_patterns`: a match rejects the request.
    Blocked,
    /// `warning_patterns`: a match is surfaced but allowed.
    Warning,
}

impl PatternClass {
    /// Both classes, blocked first.
    pub fn all() -> [Self; 2] {
        [Self::Blocked, Self::Warning]
    }

    /// The section key in the policy document.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked_patterns",
            Self::Warning => "warning_patterns",
        }
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked => f.write_str("blocked"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// One named pattern group.
#[derive(Debug, Clone)]
pub struct PatternGroup<'a> {
    /// Blocked or warning.
    pub class: PatternClass,
    /// Group name, e.g. `sql_injection`.
    pub name: &'a str,
    /// Entity path of the group body.
    pub path: EntityPath,
    /// The group body.
    pub body: &'a Map<String, Value>,
    /// Whether the group sits inside an override block.
    pub overridden: bool,
}

impl<'a> PatternGroup<'a> {
    /// `enabled`, defaulting to `true`.
    pub fn is_enabled(&self) -> bool {
        self.body
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// String patterns with their entity paths, in declaration order.
    pub fn patterns(&self) -> Vec<(EntityPath, &'a str)> {
        let base = self.path.field("patterns");
        self.body
            .get("patterns")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| item.as_str().map(|p| (base.index(i), p)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One named node of a mapping section: an auto-modification rule or an
/// override entry.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    /// Mapping key.
    pub name: &'a str,
    /// Entity path of the body.
    pub path: EntityPath,
    /// The body, whatever its type.
    pub body: &'a Value,
}

/// Override sections, in the order they are checked.
pub const OVERRIDE_SECTIONS: &[&str] = &["environment_overrides", "role_overrides", "user_overrides"];

/// The policy as the guardrail rules see it.
#[derive(Debug, Clone)]
pub struct GuardrailPolicy<'a> {
    /// Top level of the policy document.
    pub root: &'a Map<String, Value>,
    /// Path every issue is rooted at.
    pub path: EntityPath,
}

impl<'a> GuardrailPolicy<'a> {
    /// View a parsed policy. `None` when it is not a mapping.
    pub fn new(policy: &'a Value) -> Option<Self> {
        policy.as_object().map(|root| Self {
            root,
            path: EntityPath::new("guardrails"),
        })
    }

    /// A top-level section, if present and not `null`.
    pub fn section(&self, key: &str) -> Option<&'a Value> {
        self.root.get(key).filter(|v| !v.is_null())
    }

    /// Entries of a mapping-valued section, skipping it when it has
    /// another shape.
    pub fn nodes(&self, key: &str) -> Vec<Node<'a>> {
        mapping_nodes(self.section(key), &self.path.field(key))
    }

    /// Top-level pattern groups, blocked first, each section in
    /// declaration order.
    pub fn groups(&self) -> Vec<PatternGroup<'a>> {
        groups_in(self.root, &self.path, false)
    }

    /// Pattern groups declared inside override entries.
    pub fn override_groups(&self) -> Vec<PatternGroup<'a>> {
        OVERRIDE_SECTIONS
            .iter()
            .flat_map(|section| self.nodes(section))
            .filter_map(|entry| {
                let body = entry.body.as_object()?;
                Some(groups_in(body, &entry.path, true))
            })
            .flatten()
            .collect()
    }

    /// Top-level and override groups together.
    pub fn all_groups(&self) -> Vec<PatternGroup<'a>> {
        let mut groups = self.groups();
        groups.extend(self.override_groups());
        groups
    }
}

fn mapping_nodes<'a>(value: Option<&'a Value>, path: &EntityPath) -> Vec<Node<'a>> {
    let Some(map) = value.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, body)| Node {
            name,
            path: path.field(name),
            body,
        })
        .collect()
}

fn groups_in<'a>(owner: &'a Map<String, Value>, path: &EntityPath, overridden: bool) -> Vec<PatternGroup<'a>> {
    let mut groups = Vec::new();
    for class in PatternClass::all() {
        let section = owner.get(class.key()).filter(|v| !v.is_null());
        for node in mapping_nodes(section, &path.field(class.key())) {
            if let Some(body) = node.body.as_object() {
                groups.push(PatternGroup {
                    class,
                    name: node.name,
                    path: node.path,
                    body,
                    overridden,
                });
            }
        }
    }
    groups
}
