//! `${VAR}` references: malformed tokens, credential binding consistency,
//! and the optional `environment` documentation section.
//!
//! Variables are compared by name only. Nothing here reads the process
//! environment.

use std::collections::BTreeMap;

use kpack_core::{EntityPath, Issue, IssueCode};
use serde_json::{Map, Value};

use super::{RuleContext, SemanticRule};
use crate::document::PackDocument;
use crate::template::{env_refs, malformed_env_refs};

const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Checks every `${VAR}` token in the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvReferenceRule;

impl SemanticRule for EnvReferenceRule {
    fn name(&self) -> &'static str {
        "env_references"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        let doc = ctx.doc;
        let mut refs = EnvRefs::default();
        refs.collect(doc, issues);

        check_credential_bindings(doc, issues);
        check_documentation(doc, &refs, issues);
    }
}

/// Every referenced variable with the first place it appears.
#[derive(Debug, Default)]
struct EnvRefs {
    first_use: BTreeMap<String, EntityPath>,
}

impl EnvRefs {
    fn collect(&mut self, doc: &PackDocument, issues: &mut Vec<Issue>) {
        for (key, value) in &doc.root {
            if key == "environment" {
                continue;
            }
            self.walk(value, EntityPath::new(key.as_str()), Some(&mut *issues));
        }
        for entry in doc.tools.iter().chain(&doc.prompts).chain(&doc.resources) {
            self.walk(&entry.body, entry.path.clone(), Some(&mut *issues));
        }
        // Policy strings are mostly regexes; only well-formed references count.
        if let Some(policy) = &doc.guardrails {
            self.walk(policy, EntityPath::new("guardrails"), None);
        }
    }

    fn walk(&mut self, value: &Value, path: EntityPath, mut issues: Option<&mut Vec<Issue>>) {
        match value {
            Value::String(s) => {
                for name in env_refs(s) {
                    self.first_use
                        .entry(name.to_string())
                        .or_insert_with(|| path.clone());
                }
                let Some(issues) = issues else {
                    return;
                };
                for token in malformed_env_refs(s) {
                    issues.push(
                        Issue::warning(
                            IssueCode::MalformedEnvReference,
                            &path,
                            format!("malformed environment reference `{token}`"),
                        )
                        .with_recommendation("use ${NAME} with letters, digits and underscores"),
                    );
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(item, path.index(i), issues.as_deref_mut());
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    self.walk(item, path.field(key), issues.as_deref_mut());
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Credential bindings
// ---------------------------------------------------------------------------

/// A field that carries a credential and the variables it binds.
struct Binding {
    path: EntityPath,
    vars: Vec<String>,
}

fn check_credential_bindings(doc: &PackDocument, issues: &mut Vec<Issue>) {
    let Some(conn) = doc.connection() else {
        return;
    };
    let base = EntityPath::new("connection");
    let auth = conn.get("auth").and_then(Value::as_object);
    let headers = conn.get("headers").and_then(Value::as_object);

    let token_fields = [
        auth_field(auth, "token", &base),
        header_field(headers, "Authorization", &base),
    ];
    report_conflicts("bearer token", &token_fields, issues);

    let header_name = auth
        .and_then(|a| credential(a, "header_name"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_API_KEY_HEADER);
    let key_fields = [
        auth_field(auth, "api_key", &base),
        header_field(headers, header_name, &base),
    ];
    report_conflicts("API key", &key_fields, issues);
}

/// A credential under `auth` or `auth.config`.
fn credential<'a>(auth: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    auth.get(key).or_else(|| {
        auth.get("config")
            .and_then(Value::as_object)
            .and_then(|config| config.get(key))
    })
}

fn auth_field(auth: Option<&Map<String, Value>>, key: &str, base: &EntityPath) -> Option<Binding> {
    let auth = auth?;
    let (path, value) = match auth.get(key) {
        Some(v) => (base.field("auth").field(key), v),
        None => (
            base.field("auth").field("config").field(key),
            credential(auth, key)?,
        ),
    };
    binding(path, value)
}

fn header_field(headers: Option<&Map<String, Value>>, name: &str, base: &EntityPath) -> Option<Binding> {
    let (key, value) = headers?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))?;
    binding(base.field("headers").field(key), value)
}

fn binding(path: EntityPath, value: &Value) -> Option<Binding> {
    let vars: Vec<String> = env_refs(value.as_str()?)
        .into_iter()
        .map(str::to_string)
        .collect();
    if vars.is_empty() {
        None
    } else {
        Some(Binding { path, vars })
    }
}

fn report_conflicts(purpose: &str, fields: &[Option<Binding>], issues: &mut Vec<Issue>) {
    let bound: Vec<&Binding> = fields.iter().flatten().collect();
    let Some((first, rest)) = bound.split_first() else {
        return;
    };
    for other in rest {
        let shared = other.vars.iter().any(|v| first.vars.contains(v));
        if shared {
            continue;
        }
        issues.push(
            Issue::warning(
                IssueCode::DuplicateCredentialBinding,
                &other.path,
                format!(
                    "possible duplicate credential binding: {purpose} is read from ${{{}}} at {} and from ${{{}}} here",
                    first.vars[0], first.path, other.vars[0]
                ),
            )
            .with_recommendation("bind both fields to the same environment variable"),
        );
    }
}

// ---------------------------------------------------------------------------
// Environment documentation
// ---------------------------------------------------------------------------

fn check_documentation(doc: &PackDocument, refs: &EnvRefs, issues: &mut Vec<Issue>) {
    let Some(documented) = documented_vars(doc) else {
        return;
    };

    for (name, path) in &refs.first_use {
        if !documented.contains_key(name.as_str()) {
            issues.push(
                Issue::warning(
                    IssueCode::UndocumentedEnvVar,
                    path,
                    format!("environment variable {name} is referenced but not listed in `environment`"),
                )
                .with_recommendation(format!("add {name} to the `environment` section")),
            );
        }
    }
    for (name, path) in documented {
        if !refs.first_use.contains_key(name) {
            issues.push(Issue::warning(
                IssueCode::UnusedEnvVar,
                path,
                format!("environment variable {name} is documented but never referenced"),
            ));
        }
    }
}

/// Names listed in `environment`, with their paths. `None` when the section
/// is absent or malformed.
fn documented_vars(doc: &PackDocument) -> Option<BTreeMap<&str, EntityPath>> {
    let base = EntityPath::new("environment");
    match doc.section("environment")? {
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_str().map(|name| (name, base.index(i))))
                .collect(),
        ),
        Value::Object(map) => Some(
            map.keys()
                .map(|name| (name.as_str(), base.field(name)))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{fold, FragmentSet};
    use serde_json::json;

    fn doc(value: Value, guardrails: Option<Value>) -> PackDocument {
        let Value::Object(map) = value else {
            panic!("fixture must be a mapping");
        };
        fold(None, map, &FragmentSet::new(), guardrails, &mut Vec::new())
    }

    fn run(value: Value) -> Vec<Issue> {
        run_with_policy(value, None)
    }

    fn run_with_policy(value: Value, guardrails: Option<Value>) -> Vec<Issue> {
        let doc = doc(value, guardrails);
        let rules = kpack_schema::SchemaRegistry::shared().latest();
        let mut issues = Vec::new();
        EnvReferenceRule.check(&RuleContext { doc: &doc, rules }, &mut issues);
        issues
    }

    #[test]
    fn token_and_authorization_header_with_different_vars_warn() {
        let issues = run(json!({
            "connection": {
                "type": "rest",
                "auth": {"method": "bearer", "token": "${API_TOKEN}"},
                "headers": {"Authorization": "Bearer ${CRM_TOKEN}"}
            }
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::DuplicateCredentialBinding);
        assert!(issues[0].message.starts_with("possible duplicate credential binding"));
        assert_eq!(issues[0].path.as_str(), "connection.headers.Authorization");
    }

    #[test]
    fn shared_variable_is_consistent() {
        let issues = run(json!({
            "connection": {
                "auth": {"method": "bearer", "config": {"token": "${API_TOKEN}"}},
                "headers": {"authorization": "Bearer ${API_TOKEN}"}
            }
        }));
        assert!(issues.is_empty());
    }

    #[test]
    fn api_key_header_follows_header_name() {
        let issues = run(json!({
            "connection": {
                "auth": {"method": "api_key", "api_key": "${KEY_A}", "header_name": "X-Token"},
                "headers": {"X-Token": "${KEY_B}"}
            }
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.as_str(), "connection.headers.X-Token");
    }

    #[test]
    fn malformed_reference_is_a_warning() {
        let issues = run(json!({
            "connection": {"base_url": "https://${HOST/api"}
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MalformedEnvReference);
        assert!(issues[0].is_warning());
    }

    #[test]
    fn environment_section_is_checked_both_ways() {
        let issues = run(json!({
            "environment": ["API_TOKEN", "LEGACY_SECRET"],
            "connection": {"auth": {"method": "bearer", "token": "${API_TOKEN}"}},
            "tools": {"t": {"endpoint": "${API_BASE}/t"}}
        }));
        let codes: Vec<_> = issues.iter().map(|i| (i.code, i.path.as_str().to_string())).collect();
        assert_eq!(
            codes,
            vec![
                (IssueCode::UndocumentedEnvVar, "tools.t.endpoint".to_string()),
                (IssueCode::UnusedEnvVar, "environment[1]".to_string()),
            ]
        );
    }

    #[test]
    fn without_environment_section_nothing_is_required() {
        let issues = run(json!({"tools": {"t": {"endpoint": "${API_BASE}/t"}}}));
        assert!(issues.is_empty());
    }

    #[test]
    fn variables_used_by_the_guardrail_policy_count_as_used() {
        let issues = run_with_policy(
            json!({
                "environment": {"AUDIT_WEBHOOK": "Receives blocked-query alerts"},
                "tools": {"t": {"endpoint": "/t"}}
            }),
            Some(json!({
                "blocked_patterns": {
                    "secrets": {
                        "patterns": ["secret=${[^}]+}"],
                        "notify": "${AUDIT_WEBHOOK}"
                    }
                }
            })),
        );
        assert!(issues.is_empty(), "{issues:#?}");
    }

    #[test]
    fn undocumented_guardrail_variable_points_into_the_policy() {
        let issues = run_with_policy(
            json!({"environment": [], "tools": {"t": {"endpoint": "/t"}}}),
            Some(json!({"compliance": {"gdpr": {"dpo_contact": "${DPO_EMAIL}"}}})),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::UndocumentedEnvVar);
        assert_eq!(issues[0].path.as_str(), "guardrails.compliance.gdpr.dpo_contact");
    }
}
