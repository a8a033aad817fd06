//! Engine-specific transform checks.

use std::collections::BTreeSet;
use std::path::Path;

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::{TransformEngine, Vocabulary};
use serde_json::{Map, Value};

use super::{RuleContext, SemanticRule};
use crate::loader::normalize_pointer;
use crate::structural::TransformSource;
use crate::template::{check_jq, check_template, is_identifier};

/// jq filters must be balanced pipelines, templates must have well-formed
/// markers, and external files must exist and match their engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformRule;

impl SemanticRule for TransformRule {
    fn name(&self) -> &'static str {
        "transforms"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        for tool in &ctx.doc.tools {
            let Some(transform) = tool.field("transform").and_then(Value::as_object) else {
                continue;
            };
            let engine = transform
                .get("engine")
                .and_then(Value::as_str)
                .and_then(TransformEngine::parse)
                .filter(|e| ctx.rules.transform_engines().contains(e));
            let Some(engine) = engine else {
                continue;
            };
            let path = tool.path.field("transform");

            match TransformSource::of(transform) {
                TransformSource::Inline => check_inline(engine, transform, &path, issues),
                TransformSource::External => check_external(
                    engine,
                    transform,
                    &path,
                    ctx.doc.transform_files.as_ref(),
                    issues,
                ),
                _ => {}
            }
        }
    }
}

fn check_inline(engine: TransformEngine, transform: &Map<String, Value>, path: &EntityPath, issues: &mut Vec<Issue>) {
    let Some((key, code)) = ["expression", "script"]
        .iter()
        .find_map(|k| transform.get(*k).and_then(Value::as_str).map(|c| (*k, c)))
    else {
        return;
    };

    match engine {
        TransformEngine::Jq => {
            if let Err(e) = check_jq(code) {
                issues.push(
                    Issue::error(
                        IssueCode::InvalidTransformExpression,
                        path.field(key),
                        format!("jq filter does not parse: {e}"),
                    )
                    .with_recommendation("check bracket, brace and quote balance"),
                );
            }
        }
        TransformEngine::Template => {
            if let Err(e) = check_template(code) {
                issues.push(Issue::error(
                    IssueCode::InvalidTemplate,
                    path.field(key),
                    format!("template is not well-formed: {e}"),
                ));
            }
        }
        TransformEngine::Python | TransformEngine::JavaScript => {}
    }
}

fn check_external(
    engine: TransformEngine,
    transform: &Map<String, Value>,
    path: &EntityPath,
    files: Option<&BTreeSet<String>>,
    issues: &mut Vec<Issue>,
) {
    if let Some(file) = transform.get("file").and_then(Value::as_str) {
        if let Some(files) = files {
            if !file_is_known(file, files) {
                issues.push(
                    Issue::error(
                        IssueCode::MissingTransformFile,
                        path.field("file"),
                        format!("transform file '{file}' is not among the files in structure.transforms"),
                    )
                    .with_recommendation("add the file to the transforms directory or fix the reference"),
                );
            }
        }

        let extension = Path::new(file).extension().and_then(|e| e.to_str());
        let expected = engine.file_extensions();
        if !extension.is_some_and(|ext| expected.contains(&ext)) {
            issues.push(
                Issue::warning(
                    IssueCode::TransformFileMismatch,
                    path.field("file"),
                    format!("transform file '{file}' does not look like a {engine} file"),
                )
                .with_recommendation(format!("expected extension: .{}", expected.join(", ."))),
            );
        }
    }

    if let Some(function) = transform.get("function").and_then(Value::as_str) {
        if !is_identifier(function) {
            issues.push(Issue::warning(
                IssueCode::InvalidName,
                path.field("function"),
                format!("transform function '{function}' is not an identifier"),
            ));
        }
    }
}

/// A reference may be relative to the pack root or to the transforms
/// directory.
fn file_is_known(file: &str, files: &BTreeSet<String>) -> bool {
    let Some(normalized) = normalize_pointer(file) else {
        return false;
    };
    let suffix = format!("/{normalized}");
    files
        .iter()
        .any(|known| *known == normalized || known.ends_with(&suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NamedEntry, Origin, PackDocument};
    use crate::parser::{fold, FragmentSet};
    use serde_json::json;

    fn run(transform: Value, files: Option<&[&str]>) -> Vec<Issue> {
        let mut set = FragmentSet::new();
        if let Some(files) = files {
            set.declare_transforms();
            for f in files {
                set.insert_transform_file(*f);
            }
        }
        let mut doc: PackDocument = fold(None, Map::new(), &set, None, &mut Vec::new());
        doc.tools.push(NamedEntry::new(
            "tools",
            "list_posts",
            Origin::Primary,
            json!({"transform": transform}),
        ));
        let rules = kpack_schema::SchemaRegistry::shared().latest();
        let mut issues = Vec::new();
        TransformRule.check(&RuleContext { doc: &doc, rules }, &mut issues);
        issues
    }

    #[test]
    fn balanced_jq_is_clean() {
        let issues = run(json!({"engine": "jq", "expression": ".data[] | {id, title}"}), None);
        assert!(issues.is_empty());
    }

    #[test]
    fn unbalanced_jq_is_an_error() {
        let issues = run(json!({"engine": "jq", "expression": ".data[] | {id, title"}), None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::InvalidTransformExpression);
        assert_eq!(issues[0].path.as_str(), "tools.list_posts.transform.expression");
    }

    #[test]
    fn template_without_markers_is_an_error() {
        let issues = run(json!({"engine": "template", "script": "plain text"}), None);
        assert_eq!(issues[0].code, IssueCode::InvalidTemplate);
    }

    #[test]
    fn external_file_must_exist_when_transforms_are_declared() {
        let transform = json!({"engine": "python", "file": "normalize.py", "function": "run"});
        assert!(run(transform.clone(), Some(&["transforms/normalize.py"])).is_empty());

        let issues = run(transform.clone(), Some(&["transforms/other.py"]));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MissingTransformFile);

        assert!(run(transform, None).is_empty());
    }

    #[test]
    fn extension_must_match_engine() {
        let issues = run(
            json!({"engine": "javascript", "file": "normalize.py", "function": "run"}),
            None,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::TransformFileMismatch);
        assert!(issues[0].is_warning());
    }

    #[test]
    fn conflicting_sources_are_left_to_the_structural_pass() {
        let issues = run(
            json!({"engine": "jq", "expression": ".a |", "file": "a.jq", "function": "f"}),
            None,
        );
        assert!(issues.is_empty());
    }
}
