//! Rules over pattern groups: syntax, severity, emptiness and
//! blocked/warning overlap.

use std::collections::BTreeMap;

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::{GuardrailSeverity, RuleSet, Vocabulary};
use regex::Regex;
use serde_json::Value;

use super::policy::{GuardrailPolicy, PatternClass};
use super::GuardrailRule;
use crate::document::type_name;

/// Every pattern, including those inside overrides, compiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSyntaxRule;

impl GuardrailRule for PatternSyntaxRule {
    fn name(&self) -> &'static str {
        "pattern_syntax"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, _rules: &RuleSet, issues: &mut Vec<Issue>) {
        for group in policy.all_groups() {
            for (path, pattern) in group.patterns() {
                if let Err(e) = Regex::new(pattern) {
                    issues.push(
                        Issue::error(
                            IssueCode::InvalidPattern,
                            path,
                            format!(
                                "{} group '{}' has a pattern that does not compile: {}",
                                group.class,
                                group.name,
                                summary_line(&e.to_string())
                            ),
                        )
                        .with_recommendation("escape regex metacharacters or fix the pattern"),
                    );
                }
            }
        }
    }
}

/// The last non-empty line of a multi-line regex error.
fn summary_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .unwrap_or(message)
        .to_string()
}

/// `severity` is one of the rule set's guardrail severities.
///
/// Top-level groups without a severity get a warning; override groups
/// inherit theirs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityRule;

impl GuardrailRule for SeverityRule {
    fn name(&self) -> &'static str {
        "severity"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, rules: &RuleSet, issues: &mut Vec<Issue>) {
        let allowed = rules.severities();
        for group in policy.all_groups() {
            let path = group.path.field("severity");
            match group.body.get("severity").filter(|v| !v.is_null()) {
                None if !group.overridden => issues.push(Issue::warning(
                    IssueCode::MissingField,
                    path,
                    format!("{} group '{}' declares no severity", group.class, group.name),
                )),
                None => {}
                Some(Value::String(raw)) => {
                    let known = GuardrailSeverity::parse(raw).is_some_and(|s| allowed.contains(&s));
                    if !known {
                        issues.push(
                            Issue::error(
                                IssueCode::InvalidSeverity,
                                path,
                                format!("unknown severity {raw:?} in {} group '{}'", group.class, group.name),
                            )
                            .with_recommendation(format!(
                                "use one of: {}",
                                GuardrailSeverity::joined(allowed)
                            )),
                        );
                    }
                }
                Some(other) => issues.push(Issue::error(
                    IssueCode::InvalidSeverity,
                    path,
                    format!("severity must be a string, found {}", type_name(other)),
                )),
            }
        }
    }
}

/// An enabled top-level group carries at least one pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyGroupRule;

impl GuardrailRule for EmptyGroupRule {
    fn name(&self) -> &'static str {
        "empty_groups"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, _rules: &RuleSet, issues: &mut Vec<Issue>) {
        for group in policy.groups() {
            let empty = match group.body.get("patterns") {
                None | Some(Value::Null) => true,
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
            };
            if group.is_enabled() && empty {
                issues.push(
                    Issue::warning(
                        IssueCode::EmptyPatternGroup,
                        group.path.field("patterns"),
                        format!("{} group '{}' is enabled but has no patterns", group.class, group.name),
                    )
                    .with_recommendation("add patterns or set `enabled: false`"),
                );
            }
        }
    }
}

/// No literal pattern is both blocked and warned about.
///
/// Reported once per literal, at its first warning occurrence. At
/// enforcement time blocked wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationRule;

impl GuardrailRule for ClassificationRule {
    fn name(&self) -> &'static str {
        "classification"
    }

    fn check(&self, policy: &GuardrailPolicy<'_>, _rules: &RuleSet, issues: &mut Vec<Issue>) {
        let groups = policy.groups();

        let mut blocked: BTreeMap<&str, (&str, EntityPath)> = BTreeMap::new();
        for group in groups.iter().filter(|g| g.class == PatternClass::Blocked) {
            for (path, pattern) in group.patterns() {
                blocked.entry(pattern).or_insert((group.name, path));
            }
        }

        let mut reported = Vec::new();
        for group in groups.iter().filter(|g| g.class == PatternClass::Warning) {
            for (path, pattern) in group.patterns() {
                let Some((blocked_group, blocked_path)) = blocked.get(pattern) else {
                    continue;
                };
                if reported.contains(&pattern) {
                    continue;
                }
                reported.push(pattern);
                issues.push(
                    Issue::warning(
                        IssueCode::ConflictingPatternClassification,
                        path,
                        format!(
                            "pattern {pattern:?} is both blocked ('{blocked_group}' at {blocked_path}) and a warning ('{}')",
                            group.name
                        ),
                    )
                    .with_recommendation(
                        "remove it from one group; when both match, blocked wins",
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_schema::SchemaRegistry;
    use serde_json::json;

    fn run(rule: impl GuardrailRule, policy: Value) -> Vec<Issue> {
        let view = GuardrailPolicy::new(&policy).unwrap();
        let mut issues = Vec::new();
        rule.check(&view, SchemaRegistry::shared().latest(), &mut issues);
        issues
    }

    #[test]
    fn each_bad_pattern_is_reported_once_with_its_index() {
        let issues = run(
            PatternSyntaxRule,
            json!({"blocked_patterns": {"sql_injection": {
                "patterns": ["UNION\\s+SELECT", "[unterminated", "ok", "(?<=x)y"]
            }}}),
        );
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "guardrails.blocked_patterns.sql_injection.patterns[1]",
                "guardrails.blocked_patterns.sql_injection.patterns[3]"
            ]
        );
    }

    #[test]
    fn override_patterns_are_compiled() {
        let issues = run(
            PatternSyntaxRule,
            json!({"role_overrides": {"analyst": {
                "blocked_patterns": {"extra": {"patterns": ["("]}}
            }}}),
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn severity_outside_closed_set_is_an_error() {
        let issues = run(
            SeverityRule,
            json!({"warning_patterns": {"a": {"patterns": ["x"], "severity": "urgent"}}}),
        );
        assert_eq!(issues[0].code, IssueCode::InvalidSeverity);
        assert!(issues[0].is_error());
    }

    #[test]
    fn missing_severity_is_a_warning_except_in_overrides() {
        let issues = run(
            SeverityRule,
            json!({
                "blocked_patterns": {"a": {"patterns": ["x"]}},
                "environment_overrides": {"dev": {"blocked_patterns": {"a": {"enabled": false}}}}
            }),
        );
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_warning());
    }

    #[test]
    fn shared_literal_is_one_warning() {
        let issues = run(
            ClassificationRule,
            json!({
                "blocked_patterns": {"writes": {"patterns": ["INSERT\\s+INTO"], "severity": "critical"}},
                "warning_patterns": {
                    "audit": {"patterns": ["INSERT\\s+INTO"], "severity": "medium"},
                    "audit_again": {"patterns": ["INSERT\\s+INTO"], "severity": "low"}
                }
            }),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::ConflictingPatternClassification);
        assert!(issues[0].is_warning());
        assert!(issues[0].recommendation.as_deref().unwrap().contains("blocked wins"));
    }

    #[test]
    fn disabled_empty_group_is_fine() {
        let issues = run(
            EmptyGroupRule,
            json!({"blocked_patterns": {"a": {"enabled": false}, "b": {"patterns": []}}}),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.as_str(), "guardrails.blocked_patterns.b.patterns");
    }
}
