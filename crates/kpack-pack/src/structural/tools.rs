//! Tool checks: type, description, method, transform shape.

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::{Entity, HttpMethod, Vocabulary};
use serde_json::{Map, Value};

use super::{parameters, present, Checker};
use crate::document::{type_name, NamedEntry, PackDocument};
use crate::template::is_snake_case;

pub(super) fn check(c: &mut Checker<'_>, doc: &PackDocument) {
    for tool in &doc.tools {
        check_tool(c, tool);
    }
}

fn check_tool(c: &mut Checker<'_>, tool: &NamedEntry) {
    let path = &tool.path;
    let Some(body) = c.mapping(&tool.body, path, "tool definition") else {
        return;
    };
    c.unknown_fields(Entity::Tool, body, path);

    if !is_snake_case(&tool.name) {
        c.push(
            Issue::warning(
                IssueCode::InvalidName,
                path,
                format!("tool name '{}' is not lowercase snake_case", tool.name),
            )
            .with_recommendation("agents discover tools by name; use e.g. search_customers"),
        );
    }

    let rules = c.rules;
    if let Some(kind) = present(body, "type") {
        c.closed_in(kind, rules.tool_types(), path.field("type"));
    }
    c.optional_str(body, "name", path);
    c.required_str(body, "description", path);
    c.optional_str(body, "endpoint", path);
    c.optional_str(body, "sql", path);
    if let Some(method) = present(body, "method") {
        check_method(c, method, path.field("method"));
    }
    c.positive_int(body, "timeout", path);
    c.positive_int(body, "cache_ttl", path);
    if let Some(headers) = present(body, "headers") {
        c.string_map(headers, &path.field("headers"), "headers");
    }
    for key in ["llm_metadata", "validation"] {
        if let Some(block) = present(body, key) {
            c.mapping(block, &path.field(key), &format!("`{key}`"));
        }
    }

    parameters::check(c, tool);

    if let Some(transform) = present(body, "transform") {
        check_transform(c, transform, path.field("transform"));
    }
}

fn check_method(c: &mut Checker<'_>, value: &Value, path: EntityPath) {
    match value.as_str() {
        None => c.push(Issue::error(
            IssueCode::InvalidType,
            path,
            format!("HTTP method must be a string, found {}", type_name(value)),
        )),
        Some(raw) if HttpMethod::parse_ignore_case(raw).is_none() => c.push(
            Issue::error(
                IssueCode::InvalidEnumValue,
                path,
                format!("unknown HTTP method {raw:?}"),
            )
            .with_recommendation(format!(
                "use one of: {}",
                HttpMethod::joined(HttpMethod::all())
            )),
        ),
        Some(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// How a transform supplies its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransformSource {
    /// `script` or `expression`.
    Inline,
    /// `file` + `function`.
    External,
    /// Both inline and external keys.
    Conflict,
    /// Neither.
    Missing,
    /// Only one of `file` / `function`.
    Incomplete,
}

impl TransformSource {
    pub(crate) fn of(transform: &Map<String, Value>) -> Self {
        let inline = ["script", "expression"]
            .iter()
            .any(|k| present(transform, k).is_some());
        let file = present(transform, "file").is_some();
        let function = present(transform, "function").is_some();

        match (inline, file || function) {
            (true, true) => Self::Conflict,
            (true, false) => Self::Inline,
            (false, false) => Self::Missing,
            (false, true) if file && function => Self::External,
            (false, true) => Self::Incomplete,
        }
    }
}

fn check_transform(c: &mut Checker<'_>, value: &Value, path: EntityPath) {
    let Some(transform) = c.mapping(value, &path, "transform") else {
        return;
    };
    c.unknown_fields(Entity::Transform, transform, &path);

    let rules = c.rules;
    match present(transform, "engine") {
        None => c.push(Issue::error(
            IssueCode::MissingField,
            path.field("engine"),
            "transform has no `engine`",
        )),
        Some(engine) => {
            c.closed_in(engine, rules.transform_engines(), path.field("engine"));
        }
    }
    for key in ["script", "expression", "file", "function", "description"] {
        c.optional_str(transform, key, &path);
    }

    match TransformSource::of(transform) {
        TransformSource::Conflict => c.push(
            Issue::error(
                IssueCode::TransformSourceConflict,
                &path,
                "transform declares both an inline script and a file reference",
            )
            .with_recommendation("keep either `script`/`expression` or the `file` + `function` pair"),
        ),
        TransformSource::Missing => c.push(
            Issue::error(
                IssueCode::TransformSourceMissing,
                &path,
                "transform declares neither an inline script nor a file reference",
            )
            .with_recommendation("add `expression` (or `script`), or `file` + `function`"),
        ),
        TransformSource::Incomplete => {
            let missing = if present(transform, "file").is_some() {
                "function"
            } else {
                "file"
            };
            c.push(Issue::error(
                IssueCode::IncompleteTransformReference,
                path.field(missing),
                format!("external transform reference is missing `{missing}`"),
            ));
        }
        TransformSource::Inline | TransformSource::External => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(v: Value) -> TransformSource {
        TransformSource::of(v.as_object().unwrap())
    }

    #[test]
    fn transform_sources_classify() {
        assert_eq!(source(json!({"engine": "jq", "expression": "."})), TransformSource::Inline);
        assert_eq!(
            source(json!({"engine": "python", "file": "t.py", "function": "run"})),
            TransformSource::External
        );
        assert_eq!(
            source(json!({"engine": "python", "script": "x", "file": "t.py"})),
            TransformSource::Conflict
        );
        assert_eq!(source(json!({"engine": "jq"})), TransformSource::Missing);
        assert_eq!(
            source(json!({"engine": "python", "file": "t.py"})),
            TransformSource::Incomplete
        );
        assert_eq!(
            source(json!({"engine": "jq", "expression": null})),
            TransformSource::Missing
        );
    }
}
