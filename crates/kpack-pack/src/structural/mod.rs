//! # Structural Validator
//!
//! Presence, type, closed-set membership and uniqueness checks over a
//! merged [`PackDocument`], driven entirely by the resolved [`RuleSet`].
//!
//! The pass never stops early. Entities are visited in declaration order
//! (top level, metadata, connection, tools with their parameters and
//! transforms, prompts, resources, structure, environment) and every
//! violation becomes one [`Issue`].
//!
//! Checks that depend on a field's meaning rather than its shape
//! (placeholders, environment references, URLs) belong to
//! [`crate::semantic`].

mod connection;
mod metadata;
mod parameters;
mod sections;
mod tools;

pub(crate) use tools::TransformSource;

use std::collections::BTreeSet;

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::{Entity, RuleSet, Vocabulary};
use serde_json::{Map, Value};

use crate::document::{type_name, PackDocument};

/// Run every structural check against `doc`.
pub fn check_structure(doc: &PackDocument, rules: &RuleSet) -> Vec<Issue> {
    let mut checker = Checker::new(rules);

    sections::check_top_level(&mut checker, doc);
    metadata::check(&mut checker, doc);
    connection::check(&mut checker, doc);
    tools::check(&mut checker, doc);
    sections::check_prompts(&mut checker, doc);
    sections::check_resources(&mut checker, doc);
    sections::check_structure_pointers(&mut checker, doc);
    sections::check_environment(&mut checker, doc);
    sections::check_guardrail_support(&mut checker, doc);

    let issues = checker.finish();
    tracing::debug!(issues = issues.len(), schema = %rules.version(), "structural pass complete");
    issues
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Issue accumulator with the shape checks shared by every entity.
pub(crate) struct Checker<'r> {
    pub(crate) rules: &'r RuleSet,
    issues: Vec<Issue>,
}

impl<'r> Checker<'r> {
    pub(crate) fn new(rules: &'r RuleSet) -> Self {
        Self {
            rules,
            issues: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub(crate) fn finish(self) -> Vec<Issue> {
        self.issues
    }

    /// One `UnknownField` warning per key the rule set does not recognize.
    pub(crate) fn unknown_fields(&mut self, entity: Entity, map: &Map<String, Value>, path: &EntityPath) {
        for key in map.keys() {
            if !self.rules.is_known_field(entity, key) {
                self.push(
                    Issue::warning(
                        IssueCode::UnknownField,
                        path.field(key),
                        format!(
                            "unknown field `{key}` for schema {}",
                            self.rules.version()
                        ),
                    )
                    .with_recommendation("remove the field or check its spelling"),
                );
            }
        }
    }

    /// Require a value to be a mapping.
    pub(crate) fn mapping<'v>(
        &mut self,
        value: &'v Value,
        path: &EntityPath,
        what: &str,
    ) -> Option<&'v Map<String, Value>> {
        let map = value.as_object();
        if map.is_none() {
            self.push(Issue::error(
                IssueCode::InvalidType,
                path,
                format!("{what} must be a mapping, found {}", type_name(value)),
            ));
        }
        map
    }

    /// A required, non-empty string field.
    pub(crate) fn required_str<'v>(
        &mut self,
        map: &'v Map<String, Value>,
        key: &str,
        path: &EntityPath,
    ) -> Option<&'v str> {
        match present(map, key) {
            None => {
                self.push(Issue::error(
                    IssueCode::MissingField,
                    path.field(key),
                    format!("missing required field `{key}`"),
                ));
                None
            }
            Some(value) => self.string(value, &path.field(key), key),
        }
    }

    /// An optional string field; when present it must be a non-empty string.
    pub(crate) fn optional_str<'v>(
        &mut self,
        map: &'v Map<String, Value>,
        key: &str,
        path: &EntityPath,
    ) -> Option<&'v str> {
        present(map, key).and_then(|value| self.string(value, &path.field(key), key))
    }

    fn string<'v>(&mut self, value: &'v Value, path: &EntityPath, key: &str) -> Option<&'v str> {
        match value {
            Value::String(s) if s.trim().is_empty() => {
                self.push(Issue::error(
                    IssueCode::EmptyValue,
                    path,
                    format!("`{key}` must not be empty"),
                ));
                None
            }
            Value::String(s) => Some(s),
            other => {
                self.push(Issue::error(
                    IssueCode::InvalidType,
                    path,
                    format!("`{key}` must be a string, found {}", type_name(other)),
                ));
                None
            }
        }
    }

    /// An optional boolean field.
    pub(crate) fn optional_bool(
        &mut self,
        map: &Map<String, Value>,
        key: &str,
        path: &EntityPath,
    ) -> Option<bool> {
        let value = present(map, key)?;
        let flag = value.as_bool();
        if flag.is_none() {
            self.push(Issue::error(
                IssueCode::InvalidType,
                path.field(key),
                format!("`{key}` must be true or false, found {}", type_name(value)),
            ));
        }
        flag
    }

    /// An optional strictly positive integer field.
    pub(crate) fn positive_int(
        &mut self,
        map: &Map<String, Value>,
        key: &str,
        path: &EntityPath,
    ) -> Option<u64> {
        let value = present(map, key)?;
        match (value.as_u64(), value.as_i64()) {
            (Some(n), _) if n > 0 => Some(n),
            (Some(n), _) => {
                self.non_positive(key, n.to_string(), path);
                None
            }
            (None, Some(n)) => {
                self.non_positive(key, n.to_string(), path);
                None
            }
            (None, None) => {
                self.push(Issue::error(
                    IssueCode::InvalidType,
                    path.field(key),
                    format!("`{key}` must be a positive integer, found {}", type_name(value)),
                ));
                None
            }
        }
    }

    fn non_positive(&mut self, key: &str, found: String, path: &EntityPath) {
        self.push(Issue::error(
            IssueCode::NonPositiveValue,
            path.field(key),
            format!("`{key}` must be a positive integer, found {found}"),
        ));
    }

    /// A list whose items are all strings.
    pub(crate) fn string_list<'v>(&mut self, value: &'v Value, path: &EntityPath, key: &str) -> Vec<&'v str> {
        let Some(items) = value.as_array() else {
            self.push(Issue::error(
                IssueCode::InvalidType,
                path,
                format!("`{key}` must be a list of strings, found {}", type_name(value)),
            ));
            return Vec::new();
        };
        let mut strings = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => strings.push(s),
                None => self.push(Issue::error(
                    IssueCode::InvalidType,
                    path.index(i),
                    format!("`{key}` items must be strings, found {}", type_name(item)),
                )),
            }
        }
        strings
    }

    /// A mapping of string to string, such as `headers`.
    pub(crate) fn string_map(&mut self, value: &Value, path: &EntityPath, key: &str) {
        let Some(map) = self.mapping(value, path, &format!("`{key}`")) else {
            return;
        };
        for (name, v) in map {
            if !v.is_string() {
                self.push(Issue::error(
                    IssueCode::InvalidType,
                    path.field(name),
                    format!("`{key}.{name}` must be a string, found {}", type_name(v)),
                ));
            }
        }
    }

    /// A closed-set value restricted to the variants the rule set allows.
    pub(crate) fn closed_in<V: Vocabulary>(
        &mut self,
        value: &Value,
        allowed: &BTreeSet<V>,
        path: EntityPath,
    ) -> Option<V> {
        let Some(raw) = value.as_str() else {
            self.push(Issue::error(
                IssueCode::InvalidType,
                path,
                format!("{} must be a string, found {}", V::LABEL, type_name(value)),
            ));
            return None;
        };

        match V::parse(raw) {
            Some(variant) if allowed.contains(&variant) => Some(variant),
            Some(variant) => {
                self.push(
                    Issue::error(
                        IssueCode::InvalidEnumValue,
                        path,
                        format!(
                            "{} `{variant}` is not supported by schema {}",
                            V::LABEL,
                            self.rules.version()
                        ),
                    )
                    .with_recommendation(format!(
                        "use one of: {}, or raise metadata.compatibility",
                        V::joined(allowed)
                    )),
                );
                None
            }
            None => {
                self.push(
                    Issue::error(
                        IssueCode::InvalidEnumValue,
                        path,
                        format!("unknown {} {raw:?}", V::LABEL),
                    )
                    .with_recommendation(format!("use one of: {}", V::joined(allowed))),
                );
                None
            }
        }
    }

    /// A closed-set value whose variants are not versioned.
    pub(crate) fn closed<V: Vocabulary>(&mut self, value: &Value, path: EntityPath) -> Option<V> {
        let all: BTreeSet<V> = V::all().iter().copied().collect();
        self.closed_in(value, &all, path)
    }
}

/// A field that is present and not `null`.
pub(crate) fn present<'v>(map: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    map.get(key).filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_schema::{ConnectionType, PricingTier, SchemaRegistry};
    use kpack_core::SemVer;
    use serde_json::json;

    fn v1() -> &'static RuleSet {
        SchemaRegistry::shared()
            .get(&SemVer::new(1, 0, 0))
            .unwrap()
    }

    #[test]
    fn closed_in_distinguishes_unknown_from_unsupported() {
        let mut checker = Checker::new(v1());
        let rules = checker.rules;
        let unsupported = checker.closed_in::<ConnectionType>(
            &json!("message_queue"),
            rules.connection_types(),
            EntityPath::new("connection").field("type"),
        );
        let unknown = checker.closed_in::<ConnectionType>(
            &json!("graphql"),
            rules.connection_types(),
            EntityPath::new("connection").field("type"),
        );
        assert!(unsupported.is_none() && unknown.is_none());

        let issues = checker.finish();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("not supported by schema 1.0.0"));
        assert!(issues[1].message.contains("unknown connection type"));
        assert!(issues.iter().all(|i| i.code == IssueCode::InvalidEnumValue));
    }

    #[test]
    fn closed_accepts_any_variant() {
        let mut checker = Checker::new(v1());
        let tier = checker.closed::<PricingTier>(&json!("premium"), EntityPath::new("tier"));
        assert_eq!(tier, Some(PricingTier::Premium));
        assert!(checker.finish().is_empty());
    }

    #[test]
    fn positive_int_rejects_zero_negative_and_floats() {
        let map = json!({"a": 0, "b": -3, "c": 1.5, "d": 30});
        let map = map.as_object().unwrap();
        let mut checker = Checker::new(v1());
        let path = EntityPath::new("connection");
        assert_eq!(checker.positive_int(map, "a", &path), None);
        assert_eq!(checker.positive_int(map, "b", &path), None);
        assert_eq!(checker.positive_int(map, "c", &path), None);
        assert_eq!(checker.positive_int(map, "d", &path), Some(30));
        assert_eq!(checker.positive_int(map, "missing", &path), None);

        let codes: Vec<_> = checker.finish().into_iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![
                IssueCode::NonPositiveValue,
                IssueCode::NonPositiveValue,
                IssueCode::InvalidType
            ]
        );
    }

    #[test]
    fn required_str_reports_missing_empty_and_mistyped() {
        let map = json!({"empty": "  ", "number": 3, "ok": "fine"});
        let map = map.as_object().unwrap();
        let mut checker = Checker::new(v1());
        let path = EntityPath::new("metadata");
        assert_eq!(checker.required_str(map, "ok", &path), Some("fine"));
        checker.required_str(map, "absent", &path);
        checker.required_str(map, "empty", &path);
        checker.required_str(map, "number", &path);

        let issues = checker.finish();
        let codes: Vec<_> = issues.iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![IssueCode::MissingField, IssueCode::EmptyValue, IssueCode::InvalidType]
        );
        assert_eq!(issues[0].path.as_str(), "metadata.absent");
    }
}
