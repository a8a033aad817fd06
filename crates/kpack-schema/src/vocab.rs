//! # Closed-Set Vocabularies
//!
//! Every enumerated field of a pack is a Rust enum here. The string form of
//! each variant is exactly what authors write in YAML. Which variants a pack
//! may use depends on its schema version; that decision belongs to
//! [`crate::RuleSet`], not to these types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A string that names no variant of a closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {set} {value:?}")]
pub struct UnknownVariant {
    /// Human name of the closed set, e.g. `"tool type"`.
    pub set: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Behaviour shared by every closed set.
pub trait Vocabulary: Sized + Copy + Ord + fmt::Display + 'static {
    /// Human name of the closed set, used in messages.
    const LABEL: &'static str;

    /// Every variant, in declaration order.
    fn all() -> &'static [Self];

    /// The YAML spelling of this variant.
    fn as_str(&self) -> &'static str;

    /// Look up a variant by its exact YAML spelling.
    fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|v| v.as_str() == s)
    }

    /// Comma-separated YAML spellings of the given variants.
    fn joined<'a>(variants: impl IntoIterator<Item = &'a Self>) -> String {
        variants
            .into_iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant, )+
        }

        impl Vocabulary for $name {
            const LABEL: &'static str = $label;

            fn all() -> &'static [$name] {
                &[ $( Self::$variant, )+ ]
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| UnknownVariant {
                    set: $label,
                    value: s.to_string(),
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Connection and auth
// ---------------------------------------------------------------------------

closed_set! {
    /// How a pack's tools reach the backing system.
    ConnectionType ("connection type") {
        /// HTTP/REST API.
        Rest => "rest",
        /// SQL database.
        Database => "database",
        /// Remote shell.
        Ssh => "ssh",
        /// Local or mounted filesystem.
        Filesystem => "filesystem",
        /// Message broker.
        MessageQueue => "message_queue",
    }
}

impl ConnectionType {
    /// Locator fields that must be present for this connection type.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Rest => &["base_url"],
            Self::Database => &["engine", "host"],
            Self::Ssh => &["hostname", "username"],
            Self::Filesystem => &["root_path"],
            Self::MessageQueue => &["broker_url"],
        }
    }
}

closed_set! {
    /// Authentication method of a connection.
    AuthMethod ("auth method") {
        /// `Authorization: Bearer <token>`.
        Bearer => "bearer",
        /// HTTP basic auth.
        Basic => "basic",
        /// Static API key in a header or query parameter.
        ApiKey => "api_key",
        /// OAuth2 client credentials.
        OAuth2 => "oauth2",
    }
}

/// Every credential field any auth method may carry.
pub const CREDENTIAL_FIELDS: &[&str] = &[
    "token",
    "username",
    "password",
    "api_key",
    "header_name",
    "location",
    "param_name",
    "client_id",
    "client_secret",
    "token_url",
    "oauth_url",
    "scopes",
    "audience",
];

impl AuthMethod {
    /// Fields that must be present. Each inner slice is a set of
    /// alternatives of which at least one must appear.
    pub fn required_fields(&self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Bearer => &[&["token"]],
            Self::Basic => &[&["username"], &["password"]],
            Self::ApiKey => &[&["api_key"]],
            Self::OAuth2 => &[&["client_id"], &["client_secret"], &["token_url", "oauth_url"]],
        }
    }

    /// Every credential field this method accepts.
    pub fn allowed_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Bearer => &["token"],
            Self::Basic => &["username", "password"],
            Self::ApiKey => &["api_key", "header_name", "location", "param_name"],
            Self::OAuth2 => &[
                "client_id",
                "client_secret",
                "token_url",
                "oauth_url",
                "scopes",
                "audience",
            ],
        }
    }
}

closed_set! {
    /// Backoff strategy of a retry policy.
    RetryBackoff ("retry backoff") {
        /// Constant delay.
        Fixed => "fixed",
        /// Linearly growing delay.
        Linear => "linear",
        /// Exponentially growing delay.
        Exponential => "exponential",
    }
}

// ---------------------------------------------------------------------------
// Tools and parameters
// ---------------------------------------------------------------------------

closed_set! {
    /// The kind of operation a tool performs.
    ToolType ("tool type") {
        /// Enumerate a collection.
        List => "list",
        /// Fetch one record.
        Details => "details",
        /// Search a collection.
        Search => "search",
        /// Perform a mutating action.
        Execute => "execute",
        /// Run a statement against a database.
        Query => "query",
    }
}

impl ToolType {
    /// Whether the tool is dispatched as an HTTP request.
    pub fn is_http_shaped(&self) -> bool {
        !matches!(self, Self::Query)
    }
}

closed_set! {
    /// HTTP verb of an HTTP-shaped tool.
    HttpMethod ("HTTP method") {
        /// GET.
        Get => "GET",
        /// POST.
        Post => "POST",
        /// PUT.
        Put => "PUT",
        /// PATCH.
        Patch => "PATCH",
        /// DELETE.
        Delete => "DELETE",
        /// HEAD.
        Head => "HEAD",
        /// OPTIONS.
        Options => "OPTIONS",
    }
}

impl HttpMethod {
    /// Parse ignoring ASCII case; `get` and `GET` are the same verb.
    pub fn parse_ignore_case(s: &str) -> Option<Self> {
        Self::parse(&s.to_ascii_uppercase())
    }
}

closed_set! {
    /// Value type of a tool parameter.
    ParamType ("parameter type") {
        /// UTF-8 text.
        String => "string",
        /// Whole number.
        Integer => "integer",
        /// Any JSON number.
        Number => "number",
        /// true/false.
        Boolean => "boolean",
        /// Sequence.
        Array => "array",
        /// Mapping.
        Object => "object",
    }
}

/// Every constraint key any parameter type may carry.
pub const CONSTRAINT_KEYS: &[&str] = &[
    "min_length",
    "max_length",
    "pattern",
    "enum",
    "choices",
    "min_value",
    "max_value",
    "min",
    "max",
    "items",
    "min_items",
    "max_items",
    "properties",
];

impl ParamType {
    /// Constraint keys legal for this type.
    pub fn legal_constraints(&self) -> &'static [&'static str] {
        match self {
            Self::String => &["min_length", "max_length", "pattern", "enum", "choices"],
            Self::Integer | Self::Number => &["min_value", "max_value", "min", "max", "enum"],
            Self::Boolean => &[],
            Self::Array => &["items", "min_items", "max_items"],
            Self::Object => &["properties"],
        }
    }

    /// Whether a JSON value conforms to this type.
    pub fn conforms(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

closed_set! {
    /// Where a parameter is bound in the outgoing request.
    ParamLocation ("parameter location") {
        /// Substituted into the endpoint or statement template.
        Path => "path",
        /// Query string.
        Query => "query",
        /// Request body.
        Body => "body",
        /// Request header.
        Header => "header",
    }
}

closed_set! {
    /// Engine that runs a response transform.
    TransformEngine ("transform engine") {
        /// jq filter.
        Jq => "jq",
        /// Python function.
        Python => "python",
        /// JavaScript function.
        JavaScript => "javascript",
        /// Text template.
        Template => "template",
    }
}

impl TransformEngine {
    /// File extensions expected for external transform files.
    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Jq => &["jq"],
            Self::Python => &["py"],
            Self::JavaScript => &["js", "mjs", "cjs"],
            Self::Template => &["j2", "jinja", "jinja2", "tmpl", "tpl", "txt"],
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

closed_set! {
    /// Commercial tier of a pack.
    PricingTier ("pricing tier") {
        /// No charge.
        Free => "free",
        /// Entry paid tier.
        Basic => "basic",
        /// Higher paid tier.
        Premium => "premium",
        /// Negotiated tier.
        Enterprise => "enterprise",
    }
}

// ---------------------------------------------------------------------------
// Guardrails
// ---------------------------------------------------------------------------

closed_set! {
    /// Severity of a guardrail pattern group.
    GuardrailSeverity ("guardrail severity") {
        /// Informational.
        Low => "low",
        /// Worth review.
        Medium => "medium",
        /// Likely harmful.
        High => "high",
        /// Must never pass.
        Critical => "critical",
    }
}

closed_set! {
    /// Trigger of an auto-modification rule.
    ModificationCondition ("modification condition") {
        /// Every request.
        Always => "always",
        /// The request sets no result limit.
        NoLimitSpecified => "no_limit_specified",
        /// The request touches a field marked sensitive.
        SensitiveFieldDetected => "sensitive_field_detected",
        /// The expected result set is large.
        LargeResultSet => "large_result_set",
        /// A mutating statement lacks a WHERE clause.
        MissingWhereClause => "missing_where_clause",
        /// The request affects many records at once.
        BulkOperation => "bulk_operation",
        /// The request targets production.
        ProductionEnvironment => "production_environment",
        /// Personally identifiable information is present.
        PiiDetected => "pii_detected",
    }
}

closed_set! {
    /// Regulatory framework referenced by a compliance block.
    ComplianceFramework ("compliance framework") {
        /// EU General Data Protection Regulation.
        Gdpr => "gdpr",
        /// US health information privacy.
        Hipaa => "hipaa",
        /// Payment card industry standard.
        PciDss => "pci_dss",
        /// Sarbanes-Oxley.
        Sox => "sox",
        /// California Consumer Privacy Act.
        Ccpa => "ccpa",
        /// ISO/IEC 27001.
        Iso27001 => "iso27001",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_spelling_round_trips_through_parse() {
        for t in ToolType::all() {
            assert_eq!(ToolType::parse(t.as_str()), Some(*t));
        }
        for c in ConnectionType::all() {
            assert_eq!(c.as_str().parse::<ConnectionType>().unwrap(), *c);
        }
    }

    #[test]
    fn from_str_reports_the_set_name() {
        let err = "graphql".parse::<ConnectionType>().unwrap_err();
        assert_eq!(err.set, "connection type");
        assert!(err.to_string().contains("\"graphql\""));
    }

    #[test]
    fn serde_uses_yaml_spelling() {
        let json = serde_json::to_string(&ConnectionType::MessageQueue).unwrap();
        assert_eq!(json, "\"message_queue\"");
        let back: AuthMethod = serde_json::from_str("\"oauth2\"").unwrap();
        assert_eq!(back, AuthMethod::OAuth2);
    }

    #[test]
    fn only_query_is_not_http_shaped() {
        let http: Vec<_> = ToolType::all().iter().filter(|t| t.is_http_shaped()).collect();
        assert_eq!(http.len(), 4);
        assert!(!ToolType::Query.is_http_shaped());
    }

    #[test]
    fn joined_lists_yaml_spellings() {
        assert_eq!(
            GuardrailSeverity::joined(GuardrailSeverity::all()),
            "low, medium, high, critical"
        );
    }

    #[test]
    fn http_method_ignores_case() {
        assert_eq!(HttpMethod::parse_ignore_case("get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("get"), None);
    }

    #[test]
    fn legal_constraints_are_within_the_universe() {
        for t in ParamType::all() {
            for key in t.legal_constraints() {
                assert!(CONSTRAINT_KEYS.contains(key), "{key} missing from universe");
            }
        }
    }

    #[test]
    fn auth_required_fields_are_allowed() {
        for m in AuthMethod::all() {
            for alternatives in m.required_fields() {
                for f in *alternatives {
                    assert!(m.allowed_fields().contains(f));
                    assert!(CREDENTIAL_FIELDS.contains(f));
                }
            }
        }
    }

    #[test]
    fn conformance_distinguishes_integer_and_number() {
        assert!(ParamType::Integer.conforms(&serde_json::json!(3)));
        assert!(!ParamType::Integer.conforms(&serde_json::json!(3.5)));
        assert!(ParamType::Number.conforms(&serde_json::json!(3.5)));
        assert!(!ParamType::String.conforms(&serde_json::json!(3)));
    }
}
