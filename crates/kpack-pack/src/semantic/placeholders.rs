//! Endpoint and statement placeholders against declared parameters.

use std::collections::BTreeSet;

use kpack_core::{Issue, IssueCode};

use super::{RuleContext, SemanticRule};
use crate::document::{NamedEntry, Parameters};
use crate::template::placeholders;

const TEMPLATE_FIELDS: &[&str] = &["endpoint", "sql"];

/// Every `{x}` in `endpoint` or `sql` names a declared parameter, and every
/// `location: path` parameter appears as a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRule;

impl SemanticRule for PlaceholderRule {
    fn name(&self) -> &'static str {
        "placeholders"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        for tool in &ctx.doc.tools {
            check_tool(tool, issues);
        }
    }
}

fn check_tool(tool: &NamedEntry, issues: &mut Vec<Issue>) {
    if tool.fields().is_none() {
        return;
    }
    let params = tool.parameters();
    if matches!(params, Parameters::Malformed(_)) {
        return;
    }
    let declared = params.names();

    let mut referenced: BTreeSet<&str> = BTreeSet::new();
    let mut has_template = false;
    for field in TEMPLATE_FIELDS {
        let Some(template) = tool.str_field(field) else {
            continue;
        };
        has_template = true;
        for name in placeholders(template) {
            let first_sighting = referenced.insert(name);
            if first_sighting && !declared.contains(name) {
                issues.push(
                    Issue::error(
                        IssueCode::UnboundPlaceholder,
                        tool.path.field(field),
                        format!(
                            "placeholder {{{name}}} in tool '{}' has no matching parameter",
                            tool.name
                        ),
                    )
                    .with_recommendation(format!("declare a parameter named '{name}'")),
                );
            }
        }
    }

    if !has_template {
        return;
    }
    for entry in params.entries() {
        let Some(name) = entry.name() else {
            continue;
        };
        if entry.is_path_bound() && !referenced.contains(name) {
            issues.push(
                Issue::error(
                    IssueCode::UnusedPathParameter,
                    &entry.path,
                    format!(
                        "path parameter '{name}' is never used in the template of tool '{}'",
                        tool.name
                    ),
                )
                .with_recommendation(format!(
                    "add {{{name}}} to the endpoint or change its location"
                )),
            );
        }
    }
}
