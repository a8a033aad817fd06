//! Prompt template variables against their declaration.

use std::collections::BTreeSet;

use kpack_core::{Issue, IssueCode};
use serde_json::Value;

use super::{RuleContext, SemanticRule};
use crate::document::NamedEntry;
use crate::template::{interpolations, placeholders};

/// When a prompt declares `variables` (or `arguments`), every `{x}` and
/// `{{ x }}` in its template is declared.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptVariableRule;

impl SemanticRule for PromptVariableRule {
    fn name(&self) -> &'static str {
        "prompt_variables"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        for prompt in &ctx.doc.prompts {
            check_prompt(prompt, issues);
        }
    }
}

fn check_prompt(prompt: &NamedEntry, issues: &mut Vec<Issue>) {
    let Some((key, template)) = ["template", "content"]
        .iter()
        .find_map(|k| prompt.str_field(k).map(|t| (*k, t)))
    else {
        return;
    };
    let Some(declared) = declared_variables(prompt) else {
        return;
    };

    let mut used: Vec<&str> = placeholders(template);
    for name in interpolations(template) {
        if !used.contains(&name) {
            used.push(name);
        }
    }

    for name in used {
        if !declared.contains(name) {
            issues.push(
                Issue::warning(
                    IssueCode::UndeclaredPromptVariable,
                    prompt.path.field(key),
                    format!("prompt '{}' uses variable '{name}' it does not declare", prompt.name),
                )
                .with_recommendation(format!("add '{name}' to the prompt's variables")),
            );
        }
    }
}

/// Declared names: a list of strings, a list of mappings with `name`, or
/// a mapping keyed by name. `None` when nothing is declared.
fn declared_variables(prompt: &NamedEntry) -> Option<BTreeSet<&str>> {
    let value = prompt
        .field("variables")
        .or_else(|| prompt.field("arguments"))?;
    let names = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(m) => m.get("name").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        Value::Object(map) => map.keys().map(String::as_str).collect(),
        _ => return None,
    };
    Some(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Origin;
    use serde_json::json;

    fn run(body: Value) -> Vec<Issue> {
        let prompt = NamedEntry::new("prompts", "summarize", Origin::Primary, body);
        let mut issues = Vec::new();
        check_prompt(&prompt, &mut issues);
        issues
    }

    #[test]
    fn declared_variables_are_clean() {
        let issues = run(json!({
            "template": "Summarize {ticket_id} for {{ customer }}",
            "variables": ["ticket_id", {"name": "customer"}]
        }));
        assert!(issues.is_empty());
    }

    #[test]
    fn undeclared_variable_is_a_warning() {
        let issues = run(json!({
            "template": "Summarize {ticket_id} in {language}",
            "arguments": {"ticket_id": {"required": true}}
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::UndeclaredPromptVariable);
        assert!(issues[0].message.contains("language"));
    }

    #[test]
    fn undeclared_list_is_not_checked() {
        assert!(run(json!({"template": "Hello {name}"})).is_empty());
    }
}
