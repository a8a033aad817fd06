//! Parameter checks.
//!
//! Both declaration forms are accepted: a list of mappings carrying `name`,
//! and a mapping keyed by name. In the mapping form an inner `name`, when
//! given, must agree with the key.

use std::collections::BTreeMap;

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::vocab::CONSTRAINT_KEYS;
use kpack_schema::{Entity, ParamLocation, ParamType};
use serde_json::{Map, Value};

use super::{present, Checker};
use crate::document::{type_name, NamedEntry, ParamEntry, Parameters};
use crate::template::is_identifier;

/// Lower/upper bound pairs checked for `min > max`.
const BOUNDS: &[(&str, &str)] = &[
    ("min_length", "max_length"),
    ("min_value", "max_value"),
    ("min", "max"),
    ("min_items", "max_items"),
];

pub(super) fn check(c: &mut Checker<'_>, tool: &NamedEntry) {
    let params = tool.parameters();
    let entries = match &params {
        Parameters::Absent => return,
        Parameters::Malformed(value) => {
            c.push(Issue::error(
                IssueCode::InvalidType,
                tool.path.field("parameters"),
                format!(
                    "`parameters` must be a list or a mapping, found {}",
                    type_name(value)
                ),
            ));
            return;
        }
        Parameters::Declared { entries, .. } => entries,
    };

    let mut seen: BTreeMap<&str, &EntityPath> = BTreeMap::new();
    for entry in entries {
        check_parameter(c, entry);

        let Some(name) = entry.name() else {
            continue;
        };
        if let Some(first) = seen.get(name) {
            c.push(Issue::error(
                IssueCode::DuplicateParameterName,
                &entry.path,
                format!("parameter '{name}' is already declared at {first}"),
            ));
        } else {
            seen.insert(name, &entry.path);
        }
    }
}

fn check_parameter(c: &mut Checker<'_>, entry: &ParamEntry<'_>) {
    let path = &entry.path;
    let Some(param) = c.mapping(entry.body, path, "parameter") else {
        return;
    };
    c.unknown_fields(Entity::Parameter, param, path);
    check_name(c, entry, param);

    let rules = c.rules;
    let kind = match present(param, "type") {
        None => {
            c.push(Issue::error(
                IssueCode::MissingField,
                path.field("type"),
                "parameter has no `type`",
            ));
            None
        }
        Some(v) => c.closed_in(v, rules.param_types(), path.field("type")),
    };

    let required = c.optional_bool(param, "required", path).unwrap_or(false);
    let default = present(param, "default");
    if required && default.is_some() {
        c.push(
            Issue::error(
                IssueCode::RequiredWithDefault,
                path.field("default"),
                "parameter is required but also declares a default",
            )
            .with_recommendation("drop the default or set `required: false`"),
        );
    }

    if let Some(location) = present(param, "location") {
        c.closed::<ParamLocation>(location, path.field("location"));
    }
    c.optional_str(param, "description", path);

    let Some(kind) = kind else {
        return;
    };
    check_constraints(c, kind, param, path);

    if let Some(default) = default {
        check_default(c, kind, param, default, path);
    }
}

fn check_name(c: &mut Checker<'_>, entry: &ParamEntry<'_>, param: &Map<String, Value>) {
    let path = &entry.path;
    match (entry.key, entry.declared_name) {
        (None, None) => match present(param, "name") {
            Some(other) => c.push(Issue::error(
                IssueCode::InvalidType,
                path.field("name"),
                format!("parameter name must be a string, found {}", type_name(other)),
            )),
            None => c.push(Issue::error(
                IssueCode::MissingField,
                path.field("name"),
                "parameter has no `name`",
            )),
        },
        (Some(key), Some(inner)) if key != inner => c.push(
            Issue::error(
                IssueCode::ParameterNameMismatch,
                path.field("name"),
                format!("parameter key '{key}' differs from its name '{inner}'"),
            )
            .with_recommendation("drop the inner `name` or make it match the key"),
        ),
        _ => {}
    }

    if let Some(name) = entry.name() {
        if !is_identifier(name) {
            c.push(Issue::warning(
                IssueCode::InvalidName,
                path,
                format!("parameter name '{name}' is not an identifier and cannot be a placeholder"),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

fn check_constraints(c: &mut Checker<'_>, kind: ParamType, param: &Map<String, Value>, path: &EntityPath) {
    let legal = kind.legal_constraints();

    for key in CONSTRAINT_KEYS {
        if param.contains_key(*key) && !legal.contains(key) {
            c.push(
                Issue::error(
                    IssueCode::IllegalConstraint,
                    path.field(key),
                    format!("`{key}` is not a constraint of {kind} parameters"),
                )
                .with_recommendation(if legal.is_empty() {
                    format!("{kind} parameters take no constraints")
                } else {
                    format!("{kind} parameters accept: {}", legal.join(", "))
                }),
            );
        }
    }

    let legal_value = |key: &str| {
        if legal.contains(&key) {
            present(param, key)
        } else {
            None
        }
    };

    if let Some(pattern) = legal_value("pattern") {
        check_pattern(c, pattern, path.field("pattern"));
    }
    for key in ["enum", "choices"] {
        if let Some(options) = legal_value(key) {
            check_options(c, kind, key, options, path.field(key));
        }
    }
    for &(low, high) in BOUNDS {
        let lower = legal_value(low).and_then(|v| bound(c, low, v, path));
        let upper = legal_value(high).and_then(|v| bound(c, high, v, path));
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower > upper {
                c.push(Issue::error(
                    IssueCode::InvalidConstraint,
                    path.field(high),
                    format!("`{low}` ({lower}) is greater than `{high}` ({upper})"),
                ));
            }
        }
    }
    if let Some(items) = legal_value("items") {
        if !(items.is_object() || items.is_string()) {
            c.push(Issue::error(
                IssueCode::InvalidType,
                path.field("items"),
                format!("`items` must be a type name or a mapping, found {}", type_name(items)),
            ));
        }
    }
    if let Some(properties) = legal_value("properties") {
        c.mapping(properties, &path.field("properties"), "`properties`");
    }
}

fn bound(c: &mut Checker<'_>, key: &str, value: &Value, path: &EntityPath) -> Option<f64> {
    let n = value.as_f64();
    if n.is_none() {
        c.push(Issue::error(
            IssueCode::InvalidType,
            path.field(key),
            format!("`{key}` must be a number, found {}", type_name(value)),
        ));
    }
    n
}

fn check_pattern(c: &mut Checker<'_>, value: &Value, path: EntityPath) {
    let Some(pattern) = value.as_str() else {
        c.push(Issue::error(
            IssueCode::InvalidType,
            path,
            format!("`pattern` must be a string, found {}", type_name(value)),
        ));
        return;
    };
    if let Err(e) = regex::Regex::new(pattern) {
        c.push(Issue::error(
            IssueCode::InvalidConstraint,
            path,
            format!("`pattern` is not a valid regular expression: {e}"),
        ));
    }
}

fn check_options(c: &mut Checker<'_>, kind: ParamType, key: &str, value: &Value, path: EntityPath) {
    let Some(options) = value.as_array() else {
        c.push(Issue::error(
            IssueCode::InvalidType,
            path,
            format!("`{key}` must be a list, found {}", type_name(value)),
        ));
        return;
    };
    if options.is_empty() {
        c.push(Issue::error(
            IssueCode::EmptyValue,
            path,
            format!("`{key}` must list at least one value"),
        ));
        return;
    }
    for (i, option) in options.iter().enumerate() {
        if !kind.conforms(option) {
            c.push(Issue::error(
                IssueCode::InvalidConstraint,
                path.index(i),
                format!("`{key}` value {option} is not a valid {kind}"),
            ));
        }
    }
}

fn check_default(
    c: &mut Checker<'_>,
    kind: ParamType,
    param: &Map<String, Value>,
    default: &Value,
    path: &EntityPath,
) {
    if !kind.conforms(default) {
        c.push(Issue::error(
            IssueCode::DefaultTypeMismatch,
            path.field("default"),
            format!("default {default} is not a valid {kind}"),
        ));
        return;
    }

    let options = ["enum", "choices"]
        .iter()
        .find_map(|k| present(param, k).and_then(Value::as_array));
    if let Some(options) = options {
        if !options.contains(default) {
            c.push(
                Issue::error(
                    IssueCode::DefaultNotInEnum,
                    path.field("default"),
                    format!("default {default} is not one of the allowed values"),
                )
                .with_recommendation(format!(
                    "use one of: {}",
                    options
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            );
        }
    }

    if let Some(message) = range_violation(param, default) {
        c.push(Issue::error(
            IssueCode::InvalidConstraint,
            path.field("default"),
            message,
        ));
    }
}

/// A default that falls outside its own declared bounds.
fn range_violation(param: &Map<String, Value>, default: &Value) -> Option<String> {
    let measure = match default {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        _ => None,
    }?;
    let kind_bounds: &[(&str, &str)] = match default {
        Value::Number(_) => &[("min_value", "max_value"), ("min", "max")],
        Value::String(_) => &[("min_length", "max_length")],
        _ => &[("min_items", "max_items")],
    };

    for &(low, high) in kind_bounds {
        if let Some(lower) = present(param, low).and_then(Value::as_f64) {
            if measure < lower {
                return Some(format!("default is below `{low}` ({lower})"));
            }
        }
        if let Some(upper) = present(param, high).and_then(Value::as_f64) {
            if measure > upper {
                return Some(format!("default is above `{high}` ({upper})"));
            }
        }
    }
    None
}
