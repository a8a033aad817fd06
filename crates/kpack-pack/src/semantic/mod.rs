//! # Semantic Validator
//!
//! Cross-field and cross-entity consistency checks over a merged
//! [`PackDocument`].
//!
//! Every check is a [`SemanticRule`]: an independent object that inspects
//! the document and appends issues. The [`SemanticValidator`] runs its
//! rules in registration order; no rule sees another rule's output, so a
//! failure in one never suppresses another. New heuristics are added by
//! registering another rule, not by editing existing ones.
//!
//! Rules skip an entity outright when its shape is already broken (a tool
//! that is not a mapping, a parameter list that is neither a list nor a
//! mapping). The structural pass has reported those.

mod env;
mod placeholders;
mod prompts;
mod targets;
mod transforms;
mod urls;
mod versions;

use kpack_core::Issue;
use kpack_schema::{RuleSet, ToolType, Vocabulary};

use crate::document::{NamedEntry, PackDocument};

pub use env::EnvReferenceRule;
pub use placeholders::PlaceholderRule;
pub use prompts::PromptVariableRule;
pub use targets::ToolTargetRule;
pub use transforms::TransformRule;
pub use urls::UrlRule;
pub use versions::VersionRule;

/// What a rule may inspect.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// The merged document.
    pub doc: &'a PackDocument,
    /// The rule set resolved for the document.
    pub rules: &'a RuleSet,
}

/// One independent consistency check.
pub trait SemanticRule: Send + Sync {
    /// Short stable name, used in logs.
    fn name(&self) -> &'static str;

    /// Inspect the document and append any issues.
    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>);
}

/// An ordered set of semantic rules.
pub struct SemanticValidator {
    rules: Vec<Box<dyn SemanticRule>>,
}

impl SemanticValidator {
    /// A validator with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a rule after the existing ones.
    pub fn with_rule(mut self, rule: impl SemanticRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the registered rules, in run order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule.
    pub fn check(&self, doc: &PackDocument, rules: &RuleSet) -> Vec<Issue> {
        let ctx = RuleContext { doc, rules };
        let mut issues = Vec::new();
        for rule in &self.rules {
            let before = issues.len();
            rule.check(&ctx, &mut issues);
            tracing::trace!(rule = rule.name(), issues = issues.len() - before, "semantic rule ran");
        }
        tracing::debug!(issues = issues.len(), "semantic pass complete");
        issues
    }
}

impl Default for SemanticValidator {
    /// Every built-in rule.
    fn default() -> Self {
        Self::empty()
            .with_rule(PlaceholderRule)
            .with_rule(EnvReferenceRule)
            .with_rule(TransformRule)
            .with_rule(VersionRule)
            .with_rule(ToolTargetRule)
            .with_rule(UrlRule)
            .with_rule(PromptVariableRule)
    }
}

impl std::fmt::Debug for SemanticValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticValidator")
            .field("rules", &self.rule_names())
            .finish()
    }
}

/// Run the built-in semantic rules against `doc`.
pub fn check_semantics(doc: &PackDocument, rules: &RuleSet) -> Vec<Issue> {
    SemanticValidator::default().check(doc, rules)
}

/// The effective type of a tool: `list` when absent, `None` when the
/// declared value is not a known tool type.
pub(crate) fn tool_type(tool: &NamedEntry) -> Option<ToolType> {
    match tool.field("type") {
        None => Some(ToolType::List),
        Some(value) => value.as_str().and_then(ToolType::parse),
    }
}
