//! # Guardrail Validator
//!
//! Checks the guardrail policy as an authoring artifact. Patterns are
//! compiled but never evaluated against data; enforcement belongs to the
//! host that later loads the policy.
//!
//! Like [`crate::semantic`], the pass is a list of independent
//! [`GuardrailRule`] objects run in registration order. Every issue is
//! rooted at `guardrails.`.

mod patterns;
mod policy;
mod rules;

use kpack_core::Issue;
use kpack_schema::RuleSet;
use serde_json::Value;

pub use patterns::{ClassificationRule, EmptyGroupRule, PatternSyntaxRule, SeverityRule};
pub use policy::{GuardrailPolicy, Node, PatternClass, PatternGroup, OVERRIDE_SECTIONS};
pub use rules::{ComplianceRule, ConditionRule, OverrideRule, ShapeRule};

/// One independent guardrail policy check.
pub trait GuardrailRule: Send + Sync {
    /// Short stable name, used in logs.
    fn name(&self) -> &'static str;

    /// Inspect the policy and append any issues.
    fn check(&self, policy: &GuardrailPolicy<'_>, rules: &RuleSet, issues: &mut Vec<Issue>);
}

/// An ordered set of guardrail rules.
pub struct GuardrailValidator {
    rules: Vec<Box<dyn GuardrailRule>>,
}

impl GuardrailValidator {
    /// A validator with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a rule after the existing ones.
    pub fn with_rule(mut self, rule: impl GuardrailRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the registered rules, in run order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule against a parsed policy.
    ///
    /// A policy that is not a mapping yields nothing here; the parser has
    /// already rejected it.
    pub fn check(&self, policy: &Value, rules: &RuleSet) -> Vec<Issue> {
        let Some(view) = GuardrailPolicy::new(policy) else {
            tracing::warn!("guardrail policy is not a mapping; skipping guardrail checks");
            return Vec::new();
        };
        let mut issues = Vec::new();
        for rule in &self.rules {
            let before = issues.len();
            rule.check(&view, rules, &mut issues);
            tracing::trace!(rule = rule.name(), issues = issues.len() - before, "guardrail rule ran");
        }
        tracing::debug!(issues = issues.len(), "guardrail pass complete");
        issues
    }
}

impl Default for GuardrailValidator {
    fn default() -> Self {
        Self::empty()
            .with_rule(ShapeRule)
            .with_rule(PatternSyntaxRule)
            .with_rule(SeverityRule)
            .with_rule(EmptyGroupRule)
            .with_rule(ClassificationRule)
            .with_rule(ConditionRule)
            .with_rule(OverrideRule)
            .with_rule(ComplianceRule)
    }
}

impl std::fmt::Debug for GuardrailValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailValidator")
            .field("rules", &self.rule_names())
            .finish()
    }
}

/// Run the built-in guardrail rules against a parsed policy.
pub fn check_guardrails(policy: &Value, rules: &RuleSet) -> Vec<Issue> {
    GuardrailValidator::default().check(policy, rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_core::IssueCode;
    use kpack_schema::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn well_formed_policy_is_clean() {
        let policy = json!({
            "version": "1.0",
            "blocked_patterns": {
                "sql_injection": {
                    "enabled": true,
                    "patterns": ["(?i)DROP\\s+TABLE", ";\\s*--"],
                    "message": "SQL injection attempt",
                    "severity": "critical"
                }
            },
            "warning_patterns": {
                "bulk_delete": {
                    "patterns": ["(?i)DELETE\\s+FROM\\s+\\w+\\s*$"],
                    "message": "DELETE without WHERE",
                    "severity": "medium"
                }
            },
            "auto_modifications": {
                "add_limit": {"conditions": ["no_limit_specified"], "action": "add_limit", "value": 1000}
            },
            "environment_overrides": {
                "development": {"warning_patterns": {"bulk_delete": {"enabled": false}}}
            },
            "default_environment": "development",
            "compliance": {"gdpr": {"enabled": true}}
        });
        let issues = check_guardrails(&policy, SchemaRegistry::shared().latest());
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn one_bad_pattern_does_not_stop_other_rules() {
        let policy = json!({
            "blocked_patterns": {
                "sql": {"patterns": ["(unclosed"], "severity": "extreme"}
            }
        });
        let issues = check_guardrails(&policy, SchemaRegistry::shared().latest());
        let codes: Vec<_> = issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::InvalidPattern, IssueCode::InvalidSeverity]);
    }

    #[test]
    fn default_rule_order() {
        assert_eq!(
            GuardrailValidator::default().rule_names(),
            vec![
                "shape",
                "pattern_syntax",
                "severity",
                "empty_groups",
                "classification",
                "conditions",
                "overrides",
                "compliance"
            ]
        );
    }
}
