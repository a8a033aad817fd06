//! # Schema Subcommand
//!
//! Lists the registered schema versions and the vocabularies of one rule
//! set, so authors can see what a given `compatibility` allows.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use kpack_core::SemVer;
use kpack_schema::{
    AuthMethod, ComplianceFramework, ConnectionType, GuardrailSeverity, ModificationCondition,
    ParamType, RuleSet, SchemaRegistry, ToolType, TransformEngine, Vocabulary,
};

use crate::config::{CliConfig, OutputFormat};
use crate::output;
use crate::EXIT_VALID;

/// Arguments for the `kpack schema` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct SchemaArgs {
    /// Show the rule set a pack declaring this compatibility would get.
    /// Defaults to the latest.
    #[arg(long = "version", value_name = "X.Y.Z")]
    pub schema_version: Option<String>,

    /// Output format.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Execute the schema subcommand.
pub fn run_schema(args: &SchemaArgs, config: &CliConfig) -> Result<u8> {
    let registry = SchemaRegistry::shared();
    let rules = select(registry, args.schema_version.as_deref())?;

    let rendered = match args.format.or(config.format).unwrap_or_default() {
        OutputFormat::Human => human(registry, rules),
        OutputFormat::Json => output::json(&describe(registry, rules))?,
    };
    println!("{}", rendered.trim_end());
    Ok(EXIT_VALID)
}

/// Resolve the requested version the way a pack's `compatibility` is
/// resolved.
pub fn select<'r>(registry: &'r SchemaRegistry, requested: Option<&str>) -> Result<&'r RuleSet> {
    let Some(requested) = requested else {
        return Ok(registry.latest());
    };
    let version = SemVer::parse_requirement(requested)
        .with_context(|| format!("invalid schema version {requested:?}"))?;
    Ok(registry.rules_for(&version)?)
}

fn versions(registry: &SchemaRegistry) -> Vec<String> {
    registry.versions().map(|v| v.to_string()).collect()
}

fn names<V: Vocabulary>(set: &BTreeSet<V>) -> Vec<&'static str> {
    set.iter().map(Vocabulary::as_str).collect()
}

fn vocabularies(rules: &RuleSet) -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("connection_types", names::<ConnectionType>(rules.connection_types())),
        ("auth_methods", names::<AuthMethod>(rules.auth_methods())),
        ("tool_types", names::<ToolType>(rules.tool_types())),
        ("parameter_types", names::<ParamType>(rules.param_types())),
        ("transform_engines", names::<TransformEngine>(rules.transform_engines())),
        ("guardrail_severities", names::<GuardrailSeverity>(rules.severities())),
        ("modification_conditions", names::<ModificationCondition>(rules.conditions())),
        ("compliance_frameworks", names::<ComplianceFramework>(rules.frameworks())),
    ]
}

/// JSON description of the registry and one rule set.
pub fn describe(registry: &SchemaRegistry, rules: &RuleSet) -> serde_json::Value {
    let vocab: serde_json::Map<String, serde_json::Value> = vocabularies(rules)
        .into_iter()
        .map(|(key, items)| (key.to_string(), json!(items)))
        .collect();
    json!({
        "versions": versions(registry),
        "latest": registry.latest().version().to_string(),
        "selected": rules.version().to_string(),
        "guardrails": rules.supports_guardrails(),
        "vocabularies": vocab,
    })
}

fn human(registry: &SchemaRegistry, rules: &RuleSet) -> String {
    let latest = registry.latest().version();
    let listed: Vec<String> = registry
        .versions()
        .map(|v| if v == latest { format!("{v} (latest)") } else { v.to_string() })
        .collect();

    let mut out = format!("Schema versions: {}\n\nRule set {}\n", listed.join(", "), rules.version());
    let entries = vocabularies(rules);
    let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, items) in entries {
        out.push_str(&format!("  {key:<width$}  {}\n", items.join(", ")));
    }
    let guardrails = if rules.supports_guardrails() {
        "supported"
    } else {
        "not supported"
    };
    out.push_str(&format!("  {:<width$}  {guardrails}\n", "guardrails"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection_is_latest() {
        let registry = SchemaRegistry::shared();
        let rules = select(registry, None).unwrap();
        assert_eq!(rules.version(), registry.latest().version());
    }

    #[test]
    fn selection_resolves_like_compatibility() {
        let registry = SchemaRegistry::shared();
        assert_eq!(select(registry, Some("1.4.0")).unwrap().version(), SemVer::new(1, 0, 0));
        assert_eq!(select(registry, Some(">=2.0.0")).unwrap().version(), SemVer::new(2, 0, 0));
        assert!(select(registry, Some("9.0.0")).is_err());
        assert!(select(registry, Some("two")).is_err());
    }

    #[test]
    fn v1_description_has_no_guardrails() {
        let registry = SchemaRegistry::shared();
        let rules = select(registry, Some("1.0.0")).unwrap();
        let value = describe(registry, rules);
        assert_eq!(value["selected"], "1.0.0");
        assert_eq!(value["guardrails"], false);
        let auth = value["vocabularies"]["auth_methods"].as_array().unwrap();
        assert!(!auth.iter().any(|m| m == "oauth2"));
    }

    #[test]
    fn human_output_marks_latest() {
        let registry = SchemaRegistry::shared();
        let text = human(registry, registry.latest());
        assert!(text.starts_with("Schema versions: 1.0.0, 2.0.0 (latest)"));
        assert!(text.contains("guardrails"));
        assert!(text.contains("oauth2"));
    }
}
