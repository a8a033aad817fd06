//! # Schema Registry
//!
//! Maps a pack's `compatibility` declaration to the [`RuleSet`] that governs
//! it. Rule sets are registered once at start-up and never mutated, so one
//! registry is shared read-only by every concurrent validation.
//!
//! ## Resolution
//!
//! The greatest registered version `<=` the requested one, within the same
//! major, wins. Anything else (an unregistered major, or a version older
//! than the earliest registered one) is [`RegistryError::UnknownSchemaVersion`],
//! which still carries the closest registered version so callers can keep
//! validating.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use kpack_core::SemVer;
use thiserror::Error;

use crate::vocab::{
    AuthMethod, ComplianceFramework, ConnectionType, GuardrailSeverity, ModificationCondition,
    ParamType, ToolType, TransformEngine, Vocabulary, CONSTRAINT_KEYS, CREDENTIAL_FIELDS,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the schema registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The requested compatibility version is outside the registered range.
    #[error("schema version {requested} is not supported (closest supported: {closest})")]
    UnknownSchemaVersion {
        /// The version the pack asked for.
        requested: SemVer,
        /// The registered version used instead.
        closest: SemVer,
    },

    /// A registry was constructed with no rule sets.
    #[error("schema registry has no rule sets")]
    Empty,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A kind of node in a pack or guardrail document that has a known field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entity {
    /// The primary document's top level.
    Pack,
    /// `metadata`.
    Metadata,
    /// `connection`.
    Connection,
    /// `connection.auth`.
    Auth,
    /// `connection.rate_limit`.
    RateLimit,
    /// `connection.retry_policy`.
    RetryPolicy,
    /// One entry of `tools`.
    Tool,
    /// One tool parameter.
    Parameter,
    /// A tool's `transform`.
    Transform,
    /// One entry of `prompts`.
    Prompt,
    /// One entry of `resources`.
    Resource,
    /// `structure`.
    Structure,
    /// The guardrail document's top level.
    GuardrailPolicy,
    /// One blocked or warning pattern group.
    PatternGroup,
    /// One auto-modification rule.
    AutoModification,
    /// One environment, role, or user override.
    Override,
}

// ---------------------------------------------------------------------------
// Rule Sets
// ---------------------------------------------------------------------------

/// The legal field names and variant sets for one schema version.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: SemVer,
    connection_types: BTreeSet<ConnectionType>,
    auth_methods: BTreeSet<AuthMethod>,
    tool_types: BTreeSet<ToolType>,
    param_types: BTreeSet<ParamType>,
    transform_engines: BTreeSet<TransformEngine>,
    severities: BTreeSet<GuardrailSeverity>,
    conditions: BTreeSet<ModificationCondition>,
    frameworks: BTreeSet<ComplianceFramework>,
    fields: BTreeMap<Entity, BTreeSet<&'static str>>,
    supports_guardrails: bool,
}

impl RuleSet {
    /// The schema version this rule set describes.
    pub fn version(&self) -> SemVer {
        self.version
    }

    /// Connection types legal in this version.
    pub fn connection_types(&self) -> &BTreeSet<ConnectionType> {
        &self.connection_types
    }

    /// Auth methods legal in this version.
    pub fn auth_methods(&self) -> &BTreeSet<AuthMethod> {
        &self.auth_methods
    }

    /// Tool types legal in this version.
    pub fn tool_types(&self) -> &BTreeSet<ToolType> {
        &self.tool_types
    }

    /// Parameter types legal in this version.
    pub fn param_types(&self) -> &BTreeSet<ParamType> {
        &self.param_types
    }

    /// Transform engines legal in this version.
    pub fn transform_engines(&self) -> &BTreeSet<TransformEngine> {
        &self.transform_engines
    }

    /// Guardrail severities legal in this version.
    pub fn severities(&self) -> &BTreeSet<GuardrailSeverity> {
        &self.severities
    }

    /// Auto-modification conditions legal in this version.
    pub fn conditions(&self) -> &BTreeSet<ModificationCondition> {
        &self.conditions
    }

    /// Compliance frameworks recognized in this version.
    pub fn frameworks(&self) -> &BTreeSet<ComplianceFramework> {
        &self.frameworks
    }

    /// Whether `guardrails.yaml` is part of this schema version.
    pub fn supports_guardrails(&self) -> bool {
        self.supports_guardrails
    }

    /// Field names recognized on an entity.
    pub fn known_fields(&self, entity: Entity) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .get(&entity)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether a field name is recognized on an entity.
    pub fn is_known_field(&self, entity: Entity, field: &str) -> bool {
        self.fields
            .get(&entity)
            .is_some_and(|set| set.contains(field))
    }

    /// The 1.0.0 rule set: REST, database and SSH connections, no guardrails.
    fn v1_0() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            Entity::Pack,
            set(&["metadata", "connection", "tools", "prompts", "resources", "structure", "environment"]),
        );
        fields.insert(
            Entity::Metadata,
            set(&[
                "name",
                "version",
                "description",
                "vendor",
                "domain",
                "compatibility",
                "license",
                "tags",
                "pricing_tier",
                "author",
                "homepage",
            ]),
        );
        fields.insert(
            Entity::Connection,
            set(&[
                "type",
                "base_url",
                "timeout",
                "auth",
                "headers",
                "rate_limit",
                "retry_policy",
                "verify_ssl",
                "engine",
                "host",
                "port",
                "database",
                "hostname",
                "username",
                "private_key",
            ]),
        );
        let mut auth = set(&["method", "config"]);
        auth.extend(CREDENTIAL_FIELDS.iter().copied());
        fields.insert(Entity::Auth, auth);
        fields.insert(
            Entity::RateLimit,
            set(&["requests_per_second", "requests_per_minute", "requests_per_hour", "burst"]),
        );
        fields.insert(
            Entity::RetryPolicy,
            set(&["max_attempts", "backoff", "initial_delay_ms", "max_delay_ms", "retry_on"]),
        );
        fields.insert(
            Entity::Tool,
            set(&[
                "name",
                "type",
                "description",
                "endpoint",
                "method",
                "sql",
                "parameters",
                "transform",
                "timeout",
                "headers",
                "cache_ttl",
            ]),
        );
        let mut parameter = set(&[
            "name",
            "type",
            "required",
            "default",
            "description",
            "location",
            "example",
            "format",
        ]);
        parameter.extend(CONSTRAINT_KEYS.iter().copied());
        fields.insert(Entity::Parameter, parameter);
        fields.insert(
            Entity::Transform,
            set(&["engine", "script", "expression", "file", "function", "description"]),
        );
        fields.insert(
            Entity::Prompt,
            set(&["name", "description", "template", "content", "variables", "arguments", "tags"]),
        );
        fields.insert(
            Entity::Resource,
            set(&["name", "description", "type", "url", "tags", "mime_type"]),
        );
        fields.insert(
            Entity::Structure,
            set(&["tools", "prompts", "resources", "transforms"]),
        );

        Self {
            version: SemVer::new(1, 0, 0),
            connection_types: [ConnectionType::Rest, ConnectionType::Database, ConnectionType::Ssh]
                .into_iter()
                .collect(),
            auth_methods: [AuthMethod::Bearer, AuthMethod::Basic, AuthMethod::ApiKey]
                .into_iter()
                .collect(),
            tool_types: ToolType::all().iter().copied().collect(),
            param_types: ParamType::all().iter().copied().collect(),
            transform_engines: [
                TransformEngine::Jq,
                TransformEngine::Python,
                TransformEngine::Template,
            ]
            .into_iter()
            .collect(),
            severities: GuardrailSeverity::all().iter().copied().collect(),
            conditions: [
                ModificationCondition::Always,
                ModificationCondition::NoLimitSpecified,
                ModificationCondition::SensitiveFieldDetected,
            ]
            .into_iter()
            .collect(),
            frameworks: [
                ComplianceFramework::Gdpr,
                ComplianceFramework::Hipaa,
                ComplianceFramework::PciDss,
                ComplianceFramework::Sox,
            ]
            .into_iter()
            .collect(),
            fields,
            supports_guardrails: false,
        }
    }

    /// The 2.0.0 rule set: every vocabulary, guardrails, LLM metadata.
    fn v2_0() -> Self {
        let mut rules = Self::v1_0();
        rules.version = SemVer::new(2, 0, 0);
        rules.connection_types = ConnectionType::all().iter().copied().collect();
        rules.auth_methods = AuthMethod::all().iter().copied().collect();
        rules.transform_engines = TransformEngine::all().iter().copied().collect();
        rules.conditions = ModificationCondition::all().iter().copied().collect();
        rules.frameworks = ComplianceFramework::all().iter().copied().collect();
        rules.supports_guardrails = true;

        extend(&mut rules.fields, Entity::Connection, &["root_path", "broker_url", "queue"]);
        extend(&mut rules.fields, Entity::Tool, &["llm_metadata", "validation"]);
        rules.fields.insert(
            Entity::GuardrailPolicy,
            set(&[
                "version",
                "description",
                "blocked_patterns",
                "warning_patterns",
                "auto_modifications",
                "compliance",
                "environment_overrides",
                "role_overrides",
                "user_overrides",
                "default_environment",
                "default_role",
            ]),
        );
        rules.fields.insert(
            Entity::PatternGroup,
            set(&[
                "enabled",
                "patterns",
                "message",
                "severity",
                "description",
                "case_sensitive",
                "applies_to",
            ]),
        );
        rules.fields.insert(
            Entity::AutoModification,
            set(&[
                "enabled",
                "conditions",
                "action",
                "value",
                "message",
                "description",
                "applies_to",
            ]),
        );
        rules.fields.insert(
            Entity::Override,
            set(&[
                "description",
                "blocked_patterns",
                "warning_patterns",
                "auto_modifications",
            ]),
        );
        rules
    }
}

fn set(names: &[&'static str]) -> BTreeSet<&'static str> {
    names.iter().copied().collect()
}

fn extend(fields: &mut BTreeMap<Entity, BTreeSet<&'static str>>, entity: Entity, names: &[&'static str]) {
    fields.entry(entity).or_default().extend(names.iter().copied());
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// An immutable, ordered collection of rule sets.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    rule_sets: BTreeMap<SemVer, RuleSet>,
    latest: SemVer,
}

static SHARED: LazyLock<SchemaRegistry> = LazyLock::new(SchemaRegistry::builtin);

impl SchemaRegistry {
    /// Build a registry from explicit rule sets.
    pub fn new(rule_sets: impl IntoIterator<Item = RuleSet>) -> Result<Self, RegistryError> {
        let rule_sets: BTreeMap<SemVer, RuleSet> =
            rule_sets.into_iter().map(|r| (r.version, r)).collect();
        let latest = *rule_sets.keys().next_back().ok_or(RegistryError::Empty)?;
        Ok(Self { rule_sets, latest })
    }

    /// The registry with every built-in rule set.
    pub fn builtin() -> Self {
        let v2 = RuleSet::v2_0();
        let latest = v2.version;
        let rule_sets = [RuleSet::v1_0(), v2]
            .into_iter()
            .map(|r| (r.version, r))
            .collect();
        Self { rule_sets, latest }
    }

    /// A process-wide built-in registry, initialized on first use.
    pub fn shared() -> &'static SchemaRegistry {
        &SHARED
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> impl Iterator<Item = SemVer> + '_ {
        self.rule_sets.keys().copied()
    }

    /// The newest rule set.
    pub fn latest(&self) -> &RuleSet {
        &self.rule_sets[&self.latest]
    }

    /// The rule set registered at exactly `version`.
    pub fn get(&self, version: &SemVer) -> Option<&RuleSet> {
        self.rule_sets.get(version)
    }

    /// Resolve the rule set governing a pack that declares `compatibility`.
    pub fn rules_for(&self, compatibility: &SemVer) -> Result<&RuleSet, RegistryError> {
        let candidate = self
            .rule_sets
            .range(..=*compatibility)
            .next_back()
            .map(|(_, r)| r);

        match candidate {
            Some(rules) if rules.version.major == compatibility.major => {
                tracing::trace!(requested = %compatibility, resolved = %rules.version, "resolved schema version");
                Ok(rules)
            }
            _ => Err(RegistryError::UnknownSchemaVersion {
                requested: *compatibility,
                closest: self.closest(compatibility).version,
            }),
        }
    }

    /// The rule set nearest to `version`, preferring the greatest one not
    /// above it.
    pub fn closest(&self, version: &SemVer) -> &RuleSet {
        self.rule_sets
            .range(..=*version)
            .next_back()
            .or_else(|| self.rule_sets.range(*version..).next())
            .map(|(_, r)| r)
            .unwrap_or_else(|| self.latest())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
