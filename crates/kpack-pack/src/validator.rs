//! # Validation Pipeline
//!
//! Runs parse, structural, semantic and guardrail passes over one pack and
//! folds the result into a [`Report`].
//!
//! The pipeline holds only shared, immutable state (the registry and the
//! rule lists), so one [`PackValidator`] may validate many packs
//! concurrently.

use std::collections::BTreeSet;

use kpack_core::{EntityPath, Issue, IssueCode, SemVer, Stage};
use kpack_schema::{RegistryError, RuleSet, SchemaRegistry};

use crate::document::PackDocument;
use crate::error::PackResult;
use crate::guardrail::GuardrailValidator;
use crate::loader::{MemoryLoader, PackLoader};
use crate::parser::parse_pack;
use crate::report::{Report, ReportBuilder};
use crate::semantic::SemanticValidator;
use crate::structural::check_structure;

/// Caller policy for one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Fail the verdict on warnings too.
    pub strict: bool,
    /// Issue codes removed from the report before the verdict.
    pub suppressed: BTreeSet<IssueCode>,
}

impl ValidationOptions {
    /// Non-strict, nothing suppressed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Suppress one issue code.
    pub fn suppress(mut self, code: IssueCode) -> Self {
        self.suppressed.insert(code);
        self
    }
}

/// The validation pipeline.
#[derive(Debug)]
pub struct PackValidator<'r> {
    registry: &'r SchemaRegistry,
    semantic: SemanticValidator,
    guardrails: GuardrailValidator,
    options: ValidationOptions,
}

impl Default for PackValidator<'static> {
    fn default() -> Self {
        Self::new(SchemaRegistry::shared())
    }
}

impl<'r> PackValidator<'r> {
    /// A validator with every built-in rule and default options.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            semantic: SemanticValidator::default(),
            guardrails: GuardrailValidator::default(),
            options: ValidationOptions::default(),
        }
    }

    /// Replace the run options.
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the semantic rule list.
    pub fn with_semantic(mut self, semantic: SemanticValidator) -> Self {
        self.semantic = semantic;
        self
    }

    /// Replace the guardrail rule list.
    pub fn with_guardrails(mut self, guardrails: GuardrailValidator) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// The current run options.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validate one pack.
    ///
    /// `Err` means the loader or registry failed and no report exists.
    /// Every problem in the pack itself is an issue in the report.
    #[tracing::instrument(skip_all, fields(pack = ?loader.logical_name()))]
    pub fn validate(&self, loader: &dyn PackLoader) -> PackResult<Report> {
        let parsed = parse_pack(loader)?;

        let mut builder = ReportBuilder::new().strict(self.options.strict);
        builder.add(Stage::Parse, parsed.issues);

        let Some(doc) = parsed.document else {
            tracing::warn!("primary document unusable; later stages skipped");
            let report = self.finish(builder.pack(loader.logical_name()));
            return Ok(report);
        };

        let (rules, resolution) = self.resolve(&doc)?;
        let mut structural: Vec<Issue> = resolution.into_iter().collect();
        structural.extend(check_structure(&doc, rules));
        builder.add(Stage::Structural, structural);

        builder.add(Stage::Semantic, self.semantic.check(&doc, rules));

        if let Some(policy) = &doc.guardrails {
            let guardrail_rules = if rules.supports_guardrails() {
                rules
            } else {
                self.registry.latest()
            };
            builder.add(Stage::Guardrail, self.guardrails.check(policy, guardrail_rules));
        }

        let name = doc
            .pack_name()
            .map(str::to_string)
            .or_else(|| doc.logical_name.clone());
        let builder = builder
            .pack(name)
            .schema_version(rules.version())
            .digest(doc.digest());
        Ok(self.finish(builder))
    }

    fn finish(&self, mut builder: ReportBuilder) -> Report {
        if !self.options.suppressed.is_empty() {
            builder.retain(|i| !self.options.suppressed.contains(&i.code));
        }
        let report = builder.build();
        tracing::info!(
            pack = report.pack.as_deref().unwrap_or("<unnamed>"),
            verdict = %report.verdict,
            errors = report.summary.errors,
            warnings = report.summary.warnings,
            "validated pack"
        );
        report
    }

    /// Pick the rule set for `doc`.
    ///
    /// Missing or unparseable compatibility uses the latest rule set; the
    /// semantic pass reports the unparseable case. An unregistered version
    /// uses the closest rule set and yields an issue.
    fn resolve(&self, doc: &PackDocument) -> PackResult<(&'r RuleSet, Option<Issue>)> {
        let Some(requested) = doc
            .compatibility()
            .and_then(|raw| SemVer::parse_requirement(raw).ok())
        else {
            return Ok((self.registry.latest(), None));
        };

        match self.registry.rules_for(&requested) {
            Ok(rules) => Ok((rules, None)),
            Err(RegistryError::UnknownSchemaVersion { requested, closest }) => {
                let rules = self.registry.closest(&requested);
                let supported = self
                    .registry
                    .versions()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let issue = Issue::error(
                    IssueCode::UnknownSchemaVersion,
                    EntityPath::new("metadata").field("compatibility"),
                    format!("schema version {requested} is not supported; validating against {closest}"),
                )
                .with_recommendation(format!("use one of: {supported}"));
                tracing::warn!(%requested, %closest, "unknown schema version");
                Ok((rules, Some(issue)))
            }
            Err(other) => Err(other.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Validate a pack with the shared registry.
pub fn validate_pack(loader: &dyn PackLoader, options: ValidationOptions) -> PackResult<Report> {
    PackValidator::default().with_options(options).validate(loader)
}

/// Validate a single-document pack given as YAML text.
pub fn validate_str(yaml: &str, options: ValidationOptions) -> PackResult<Report> {
    validate_pack(&MemoryLoader::from_primary(yaml), options)
}
