//! Top level, prompts, resources, `structure`, `environment`, and the
//! tool-count and guardrail-support checks.

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::Entity;
use serde_json::Value;

use super::{present, Checker};
use crate::document::{type_name, NamedEntry, PackDocument};

pub(super) fn check_top_level(c: &mut Checker<'_>, doc: &PackDocument) {
    c.unknown_fields(Entity::Pack, &doc.root, &EntityPath::root());

    if doc.tools.is_empty() && !doc.tools_pointer {
        c.push(
            Issue::error(IssueCode::NoTools, "tools", "pack declares no tools")
                .with_recommendation("a pack needs at least one tool to be useful to an agent"),
        );
    }
}

pub(super) fn check_prompts(c: &mut Checker<'_>, doc: &PackDocument) {
    for prompt in &doc.prompts {
        check_prompt(c, prompt);
    }
}

fn check_prompt(c: &mut Checker<'_>, prompt: &NamedEntry) {
    let path = &prompt.path;
    let Some(body) = c.mapping(&prompt.body, path, "prompt definition") else {
        return;
    };
    c.unknown_fields(Entity::Prompt, body, path);

    let has_text = ["template", "content"]
        .iter()
        .any(|k| present(body, k).is_some());
    if !has_text {
        c.push(Issue::error(
            IssueCode::MissingField,
            path.field("template"),
            "prompt has neither `template` nor `content`",
        ));
    }
    for key in ["name", "description", "template", "content"] {
        c.optional_str(body, key, path);
    }
    for key in ["variables", "arguments"] {
        if let Some(vars) = present(body, key) {
            if !(vars.is_array() || vars.is_object()) {
                c.push(Issue::error(
                    IssueCode::InvalidType,
                    path.field(key),
                    format!("`{key}` must be a list or a mapping, found {}", type_name(vars)),
                ));
            }
        }
    }
    if let Some(tags) = present(body, "tags") {
        c.string_list(tags, &path.field("tags"), "tags");
    }
}

pub(super) fn check_resources(c: &mut Checker<'_>, doc: &PackDocument) {
    for resource in &doc.resources {
        let path = &resource.path;
        let Some(body) = c.mapping(&resource.body, path, "resource definition") else {
            continue;
        };
        c.unknown_fields(Entity::Resource, body, path);
        c.required_str(body, "url", path);
        for key in ["name", "description", "type", "mime_type"] {
            c.optional_str(body, key, path);
        }
        if let Some(tags) = present(body, "tags") {
            c.string_list(tags, &path.field("tags"), "tags");
        }
    }
}

pub(super) fn check_structure_pointers(c: &mut Checker<'_>, doc: &PackDocument) {
    let Some(value) = doc.section("structure") else {
        return;
    };
    let path = EntityPath::new("structure");
    let Some(structure) = c.mapping(value, &path, "structure") else {
        return;
    };
    c.unknown_fields(Entity::Structure, structure, &path);

    for (key, pointer) in structure {
        let pointer_path = path.field(key);
        match pointer {
            Value::String(_) | Value::Null => {}
            Value::Array(_) => {
                c.string_list(pointer, &pointer_path, key);
            }
            other => c.push(Issue::error(
                IssueCode::InvalidType,
                pointer_path,
                format!(
                    "`structure.{key}` must be a path or a list of paths, found {}",
                    type_name(other)
                ),
            )),
        }
    }
}

pub(super) fn check_environment(c: &mut Checker<'_>, doc: &PackDocument) {
    let Some(value) = doc.section("environment") else {
        return;
    };
    let path = EntityPath::new("environment");
    match value {
        Value::Array(_) => {
            c.string_list(value, &path, "environment");
        }
        Value::Object(_) => {}
        other => c.push(Issue::error(
            IssueCode::InvalidType,
            path,
            format!(
                "`environment` must be a list of variable names or a mapping, found {}",
                type_name(other)
            ),
        )),
    }
}

pub(super) fn check_guardrail_support(c: &mut Checker<'_>, doc: &PackDocument) {
    if doc.guardrails.is_some() && !c.rules.supports_guardrails() {
        let version = c.rules.version();
        c.push(
            Issue::warning(
                IssueCode::UnsupportedFeature,
                "guardrails",
                format!("schema {version} does not define guardrail policies"),
            )
            .with_recommendation("raise metadata.compatibility to 2.0.0 or later"),
        );
    }
}
