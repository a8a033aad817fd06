//! Policy-level rules: document shape, auto-modification conditions,
//! override blocks and compliance frameworks.

use std::collections::BTreeSet;

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::{ComplianceFramework, Entity, ModificationCondition, RuleSet, Vocabulary};
use serde_json::Value;

use super::policy::{GuardrailPolicy, PatternClass, OVERRIDE_SECTIONS};
use super::GuardrailRule;
use crate::document::type_name;
use crate::structural::{present, Checker};

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Field sets and value types of every policy node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeRule;

impl GuardrailRule for ShapeRule {
    fn name(&self) -> &'static str {
        "shape"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, rules: &RuleSet, issues: &mut Vec<Issue>) {
        let mut c = Checker::new(rules);
        c.unknown_fields(Entity::GuardrailPolicy, policy.root, &policy.path);
        c.optional_str(policy.root, "description", &policy.path);
        c.optional_str(policy.root, "default_environment", &policy.path);
        c.optional_str(policy.root, "default_role", &policy.path);

        check_group_sections(&mut c, policy.root, &policy.path);

        for node in policy.nodes("auto_modifications") {
            if let Some(body) = c.mapping(node.body, &node.path, "an auto-modification rule") {
                c.unknown_fields(Entity::AutoModification, body, &node.path);
                c.optional_bool(body, "enabled", &node.path);
                c.optional_str(body, "message", &node.path);
            }
        }
        mapping_section(&mut c, policy, "auto_modifications");
        mapping_section(&mut c, policy, "compliance");

        for section in OVERRIDE_SECTIONS {
            mapping_section(&mut c, policy, section);
            for node in policy.nodes(section) {
                if let Some(body) = c.mapping(node.body, &node.path, "an override") {
                    c.unknown_fields(Entity::Override, body, &node.path);
                    check_group_sections(&mut c, body, &node.path);
                }
            }
        }

        issues.extend(c.finish());
    }
}

fn mapping_section(c: &mut Checker<'_>, policy: &GuardrailPolicy<'_>, key: &str) {
    if let Some(value) = policy.section(key) {
        c.mapping(value, &policy.path.field(key), &format!("`{key}`"));
    }
}

fn check_group_sections(c: &mut Checker<'_>, owner: &serde_json::Map<String, Value>, path: &EntityPath) {
    for class in PatternClass::all() {
        let key = class.key();
        let Some(section) = present(owner, key) else {
            continue;
        };
        let section_path = path.field(key);
        let Some(groups) = c.mapping(section, &section_path, &format!("`{key}`")) else {
            continue;
        };
        for (name, body) in groups {
            let group_path = section_path.field(name);
            let Some(group) = c.mapping(body, &group_path, "a pattern group") else {
                continue;
            };
            c.unknown_fields(Entity::PatternGroup, group, &group_path);
            c.optional_bool(group, "enabled", &group_path);
            c.optional_bool(group, "case_sensitive", &group_path);
            c.optional_str(group, "message", &group_path);
            if let Some(patterns) = present(group, "patterns") {
                c.string_list(patterns, &group_path.field("patterns"), "patterns");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Each auto-modification names its trigger conditions from the rule
/// set's vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionRule;

impl GuardrailRule for ConditionRule {
    fn name(&self) -> &'static str {
        "conditions"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, rules: &RuleSet, issues: &mut Vec<Issue>) {
        let allowed = rules.conditions();
        for node in policy.nodes("auto_modifications") {
            let Some(body) = node.body.as_object() else {
                continue;
            };
            let path = node.path.field("conditions");
            let names: Vec<(EntityPath, &Value)> = match present(body, "conditions") {
                None => {
                    issues.push(
                        Issue::error(
                            IssueCode::MissingField,
                            path,
                            format!("auto-modification '{}' names no conditions", node.name),
                        )
                        .with_recommendation("add `conditions: [always]` to apply it unconditionally"),
                    );
                    continue;
                }
                Some(Value::Array(items)) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (path.index(i), item))
                    .collect(),
                Some(single) => vec![(path, single)],
            };

            for (path, value) in names {
                let Some(raw) = value.as_str() else {
                    issues.push(Issue::error(
                        IssueCode::UnknownCondition,
                        path,
                        format!("condition must be a string, found {}", type_name(value)),
                    ));
                    continue;
                };
                let message = match ModificationCondition::parse(raw) {
                    Some(known) if allowed.contains(&known) => continue,
                    Some(_) => format!(
                        "condition `{raw}` is not supported by schema {}",
                        rules.version()
                    ),
                    None => format!("unknown condition {raw:?} in auto-modification '{}'", node.name),
                };
                issues.push(
                    Issue::error(IssueCode::UnknownCondition, path, message).with_recommendation(
                        format!("use one of: {}", ModificationCondition::joined(allowed)),
                    ),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Override sections are non-empty, reference defined groups and rules,
/// and the policy defaults name an existing override.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideRule;

impl GuardrailRule for OverrideRule {
    fn name(&self) -> &'static str {
        "overrides"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, _rules: &RuleSet, issues: &mut Vec<Issue>) {
        let defined: BTreeSet<(&str, &str)> = policy
            .groups()
            .into_iter()
            .map(|g| (g.class.key(), g.name))
            .chain(
                policy
                    .nodes("auto_modifications")
                    .into_iter()
                    .map(|n| ("auto_modifications", n.name)),
            )
            .collect();

        for section in OVERRIDE_SECTIONS {
            let Some(value) = policy.section(section) else {
                continue;
            };
            if value.as_object().is_some_and(|m| m.is_empty()) {
                issues.push(
                    Issue::warning(
                        IssueCode::EmptyOverrideBlock,
                        policy.path.field(section),
                        format!("`{section}` declares no overrides"),
                    )
                    .with_recommendation(format!("remove `{section}` or add an entry")),
                );
                continue;
            }
            for entry in policy.nodes(section) {
                let Some(body) = entry.body.as_object() else {
                    continue;
                };
                if body.is_empty() {
                    issues.push(Issue::warning(
                        IssueCode::EmptyOverrideBlock,
                        entry.path.clone(),
                        format!("override '{}' in `{section}` changes nothing", entry.name),
                    ));
                    continue;
                }
                for key in ["blocked_patterns", "warning_patterns", "auto_modifications"] {
                    let Some(targets) = present(body, key).and_then(Value::as_object) else {
                        continue;
                    };
                    for target in targets.keys() {
                        if !defined.contains(&(key, target.as_str())) {
                            issues.push(
                                Issue::warning(
                                    IssueCode::UnknownOverrideTarget,
                                    entry.path.field(key).field(target),
                                    format!(
                                        "override '{}' adjusts `{key}.{target}`, which the policy does not define",
                                        entry.name
                                    ),
                                )
                                .with_recommendation(format!("define `{key}.{target}` at the top level")),
                            );
                        }
                    }
                }
            }
        }

        for (default_key, section) in [
            ("default_environment", "environment_overrides"),
            ("default_role", "role_overrides"),
        ] {
            let Some(name) = policy.section(default_key).and_then(Value::as_str) else {
                continue;
            };
            let names: Vec<&str> = policy.nodes(section).iter().map(|n| n.name).collect();
            if !names.contains(&name) {
                let issue = Issue::error(
                    IssueCode::UnknownEnvironment,
                    policy.path.field(default_key),
                    format!("`{default_key}` names '{name}', which `{section}` does not define"),
                );
                issues.push(if names.is_empty() {
                    issue
                } else {
                    issue.with_recommendation(format!("use one of: {}", names.join(", ")))
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

/// Compliance blocks name known frameworks, either as keys
/// (`compliance: {gdpr: {...}}`) or as a list (`compliance: {frameworks: [gdpr]}`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceRule;

impl GuardrailRule for ComplianceRule {
    fn name(&self) -> &'static str {
        "compliance"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, rules: &RuleSet, issues: &mut Vec<Issue>) {
        let Some(compliance) = policy.section("compliance").and_then(Value::as_object) else {
            return;
        };
        let path = policy.path.field("compliance");

        let named: Vec<(EntityPath, &str)> = match compliance.get("frameworks").and_then(Value::as_array) {
            Some(list) => list
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_str().map(|s| (path.field("frameworks").index(i), s)))
                .collect(),
            None => compliance
                .keys()
                .map(|k| (path.field(k), k.as_str()))
                .collect(),
        };

        let allowed = rules.frameworks();
        for (path, name) in named {
            let known = ComplianceFramework::parse(&name.to_ascii_lowercase())
                .is_some_and(|f| allowed.contains(&f));
            if !known {
                issues.push(
                    Issue::warning(
                        IssueCode::UnknownComplianceFramework,
                        path,
                        format!("unrecognized compliance framework {name:?}"),
                    )
                    .with_recommendation(format!(
                        "known frameworks: {}",
                        ComplianceFramework::joined(allowed)
                    )),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_core::SemVer;
    use kpack_schema::SchemaRegistry;
    use serde_json::json;

    fn run_with(rule: impl GuardrailRule, policy: Value, rules: &RuleSet) -> Vec<Issue> {
        let view = GuardrailPolicy::new(&policy).unwrap();
        let mut issues = Vec::new();
        rule.check(&view, rules, &mut issues);
        issues
    }

    fn run(rule: impl GuardrailRule, policy: Value) -> Vec<Issue> {
        run_with(rule, policy, SchemaRegistry::shared().latest())
    }

    fn codes(issues: &[Issue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn shape_flags_unknown_fields_and_bad_types() {
        let issues = run(
            ShapeRule,
            json!({
                "blocked_patterns": {"sql": {"enabled": "yes", "patterns": "DROP", "colour": "red"}},
                "role_overrides": []
            }),
        );
        assert_eq!(
            codes(&issues),
            vec![
                IssueCode::UnknownField,
                IssueCode::InvalidType,
                IssueCode::InvalidType,
                IssueCode::InvalidType
            ]
        );
        assert_eq!(issues[0].path.as_str(), "guardrails.blocked_patterns.sql.colour");
    }

    #[test]
    fn unknown_condition_is_an_error() {
        let issues = run(
            ConditionRule,
            json!({"auto_modifications": {
                "limit": {"conditions": ["no_limit_specified", "full_moon"]},
                "mask": {"conditions": "pii_detected"}
            }}),
        );
        assert_eq!(codes(&issues), vec![IssueCode::UnknownCondition]);
        assert_eq!(
            issues[0].path.as_str(),
            "guardrails.auto_modifications.limit.conditions[1]"
        );
    }

    #[test]
    fn newer_condition_is_rejected_by_older_rule_set() {
        let v1 = SchemaRegistry::shared().get(&SemVer::new(1, 0, 0)).unwrap();
        let issues = run_with(
            ConditionRule,
            json!({"auto_modifications": {"mask": {"conditions": ["pii_detected"]}}}),
            v1,
        );
        assert!(issues[0].message.contains("not supported by schema 1.0.0"));
    }

    #[test]
    fn missing_conditions_is_an_error() {
        let issues = run(ConditionRule, json!({"auto_modifications": {"limit": {"action": "add_limit"}}}));
        assert_eq!(codes(&issues), vec![IssueCode::MissingField]);
    }

    #[test]
    fn empty_override_section_and_entry_are_warnings() {
        let issues = run(
            OverrideRule,
            json!({"environment_overrides": {}, "role_overrides": {"admin": {}}}),
        );
        assert_eq!(
            codes(&issues),
            vec![IssueCode::EmptyOverrideBlock, IssueCode::EmptyOverrideBlock]
        );
        assert!(issues.iter().all(Issue::is_warning));
    }

    #[test]
    fn override_of_undefined_group_is_a_warning() {
        let issues = run(
            OverrideRule,
            json!({
                "blocked_patterns": {"sql": {"patterns": ["DROP"]}},
                "environment_overrides": {"dev": {
                    "blocked_patterns": {"sql": {"enabled": false}, "ssh": {"enabled": false}}
                }}
            }),
        );
        assert_eq!(codes(&issues), vec![IssueCode::UnknownOverrideTarget]);
        assert_eq!(
            issues[0].path.as_str(),
            "guardrails.environment_overrides.dev.blocked_patterns.ssh"
        );
    }

    #[test]
    fn default_environment_must_name_an_override() {
        let issues = run(
            OverrideRule,
            json!({
                "environment_overrides": {"development": {"description": "relaxed"}},
                "default_environment": "staging"
            }),
        );
        assert_eq!(codes(&issues), vec![IssueCode::UnknownEnvironment]);
        assert_eq!(issues[0].recommendation.as_deref(), Some("use one of: development"));
    }

    #[test]
    fn compliance_accepts_keys_and_lists() {
        assert!(run(ComplianceRule, json!({"compliance": {"gdpr": {}, "HIPAA": {}}})).is_empty());
        let issues = run(ComplianceRule, json!({"compliance": {"frameworks": ["sox", "fedramp"]}}));
        assert_eq!(codes(&issues), vec![IssueCode::UnknownComplianceFramework]);
        assert!(issues[0].is_warning());
    }
}
