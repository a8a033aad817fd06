//! # Validation Issues
//!
//! The finding model shared by every validation stage. A stage never
//! returns `Err` for a problem in the pack itself; it appends an [`Issue`]
//! and keeps going so one run surfaces every problem.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::EntityPath;

// ---------------------------------------------------------------------------
// Severity and Stage
// ---------------------------------------------------------------------------

/// How much an issue matters to the verdict.
///
/// Only [`Severity::Error`] fails a pack, unless the caller asks for strict
/// mode, in which case warnings fail it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Heuristic or stylistic finding.
    Warning,
    /// Definite defect.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// The pipeline stage that produced an issue.
///
/// The derived ordering is the report ordering: parser issues first,
/// guardrail issues last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Document parsing and fragment merge.
    Parse,
    /// Presence, type, enum membership, uniqueness.
    Structural,
    /// Cross-field and cross-entity consistency.
    Semantic,
    /// The guardrail policy document.
    Guardrail,
}

impl Stage {
    /// All stages in report order.
    pub fn all() -> &'static [Stage] {
        &[Self::Parse, Self::Structural, Self::Semantic, Self::Guardrail]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parse => "parse",
            Self::Structural => "structural",
            Self::Semantic => "semantic",
            Self::Guardrail => "guardrail",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Issue Codes
// ---------------------------------------------------------------------------

/// Stable machine-readable issue codes.
///
/// Serialized as the variant name. New codes are appended; existing codes
/// are never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    // Parse
    /// A document or fragment is not well-formed YAML.
    MalformedDocument,
    /// The primary document is empty.
    EmptyDocument,
    /// A structural pointer names a fragment that does not exist.
    MissingFragment,
    /// A fragment parsed but does not have the expected shape.
    InvalidFragment,
    /// The same tool name is declared twice across the pack.
    DuplicateToolName,
    /// The same prompt name is declared twice across the pack.
    DuplicatePromptName,
    /// The same resource name is declared twice across the pack.
    DuplicateResourceName,

    // Structural
    /// A required field is absent.
    MissingField,
    /// A field has the wrong value type.
    InvalidType,
    /// A field value is outside its closed set.
    InvalidEnumValue,
    /// A field that must be non-empty is empty.
    EmptyValue,
    /// A field is not recognized by the resolved schema version.
    UnknownField,
    /// The pack name differs from its containing directory name.
    NameMismatch,
    /// An identifier does not follow the naming convention.
    InvalidName,
    /// Two parameters of one tool share a name.
    DuplicateParameterName,
    /// A mapping-form parameter key disagrees with its inner `name`.
    ParameterNameMismatch,
    /// A parameter is both required and defaulted.
    RequiredWithDefault,
    /// A constraint key is not legal for the parameter type.
    IllegalConstraint,
    /// A constraint value is malformed or contradictory.
    InvalidConstraint,
    /// A default value is not a member of the declared enum.
    DefaultNotInEnum,
    /// A default value does not conform to the parameter type.
    DefaultTypeMismatch,
    /// A numeric field that must be positive is zero or negative.
    NonPositiveValue,
    /// Auth fields do not match the declared auth method.
    AuthFieldMismatch,
    /// A transform declares both an inline script and a file reference.
    TransformSourceConflict,
    /// A transform declares neither an inline script nor a file reference.
    TransformSourceMissing,
    /// A transform file reference lacks its file or its function.
    IncompleteTransformReference,
    /// The compatibility declaration is outside the registry's range.
    UnknownSchemaVersion,
    /// The pack declares no tools at all.
    NoTools,
    /// A section is present that the resolved schema version does not support.
    UnsupportedFeature,

    // Semantic
    /// A template placeholder has no matching parameter.
    UnboundPlaceholder,
    /// A path-bound parameter is never referenced by its template.
    UnusedPathParameter,
    /// Credential-carrying fields bind different environment variables.
    DuplicateCredentialBinding,
    /// A `${...}` token is unterminated or names an invalid variable.
    MalformedEnvReference,
    /// A referenced environment variable is missing from `environment`.
    UndocumentedEnvVar,
    /// A documented environment variable is never referenced.
    UnusedEnvVar,
    /// A transform expression is not well-formed for its engine.
    InvalidTransformExpression,
    /// A template transform has missing or unbalanced markers.
    InvalidTemplate,
    /// A transform file is not among the pack's transform fragments.
    MissingTransformFile,
    /// A transform file's extension does not match its engine.
    TransformFileMismatch,
    /// A version string is not a valid semantic version.
    InvalidVersion,
    /// The domain is not a lowercase slug.
    InvalidDomain,
    /// An HTTP-shaped tool has no endpoint.
    MissingEndpoint,
    /// A query tool has no statement.
    MissingStatement,
    /// A tool carries a target that its type forbids.
    ConflictingTarget,
    /// An HTTP-shaped tool has no method.
    MissingMethod,
    /// A tool's type does not suit the pack's connection type.
    ConnectionMismatch,
    /// A URL is not an absolute http(s) URL.
    InvalidUrl,
    /// A prompt template uses a variable it does not declare.
    UndeclaredPromptVariable,

    // Guardrail
    /// A guardrail pattern does not compile.
    InvalidPattern,
    /// A guardrail severity is outside the closed set.
    InvalidSeverity,
    /// One pattern is both blocked and warned on.
    ConflictingPatternClassification,
    /// An auto-modification condition is not in the vocabulary.
    UnknownCondition,
    /// An override section or entry is empty.
    EmptyOverrideBlock,
    /// An override refers to a group or rule the policy does not define.
    UnknownOverrideTarget,
    /// A default environment or role names no concrete override.
    UnknownEnvironment,
    /// An enabled pattern group has no patterns.
    EmptyPatternGroup,
    /// A compliance framework is not recognized.
    UnknownComplianceFramework,
}

impl IssueCode {
    /// The stable string form, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedDocument => "MalformedDocument",
            Self::EmptyDocument => "EmptyDocument",
            Self::MissingFragment => "MissingFragment",
            Self::InvalidFragment => "InvalidFragment",
            Self::DuplicateToolName => "DuplicateToolName",
            Self::DuplicatePromptName => "DuplicatePromptName",
            Self::DuplicateResourceName => "DuplicateResourceName",
            Self::MissingField => "MissingField",
            Self::InvalidType => "InvalidType",
            Self::InvalidEnumValue => "InvalidEnumValue",
            Self::EmptyValue => "EmptyValue",
            Self::UnknownField => "UnknownField",
            Self::NameMismatch => "NameMismatch",
            Self::InvalidName => "InvalidName",
            Self::DuplicateParameterName => "DuplicateParameterName",
            Self::ParameterNameMismatch => "ParameterNameMismatch",
            Self::RequiredWithDefault => "RequiredWithDefault",
            Self::IllegalConstraint => "IllegalConstraint",
            Self::InvalidConstraint => "InvalidConstraint",
            Self::DefaultNotInEnum => "DefaultNotInEnum",
            Self::DefaultTypeMismatch => "DefaultTypeMismatch",
            Self::NonPositiveValue => "NonPositiveValue",
            Self::AuthFieldMismatch => "AuthFieldMismatch",
            Self::TransformSourceConflict => "TransformSourceConflict",
            Self::TransformSourceMissing => "TransformSourceMissing",
            Self::IncompleteTransformReference => "IncompleteTransformReference",
            Self::UnknownSchemaVersion => "UnknownSchemaVersion",
            Self::NoTools => "NoTools",
            Self::UnsupportedFeature => "UnsupportedFeature",
            Self::UnboundPlaceholder => "UnboundPlaceholder",
            Self::UnusedPathParameter => "UnusedPathParameter",
            Self::DuplicateCredentialBinding => "DuplicateCredentialBinding",
            Self::MalformedEnvReference => "MalformedEnvReference",
            Self::UndocumentedEnvVar => "UndocumentedEnvVar",
            Self::UnusedEnvVar => "UnusedEnvVar",
            Self::InvalidTransformExpression => "InvalidTransformExpression",
            Self::InvalidTemplate => "InvalidTemplate",
            Self::MissingTransformFile => "MissingTransformFile",
            Self::TransformFileMismatch => "TransformFileMismatch",
            Self::InvalidVersion => "InvalidVersion",
            Self::InvalidDomain => "InvalidDomain",
            Self::MissingEndpoint => "MissingEndpoint",
            Self::MissingStatement => "MissingStatement",
            Self::ConflictingTarget => "ConflictingTarget",
            Self::MissingMethod => "MissingMethod",
            Self::ConnectionMismatch => "ConnectionMismatch",
            Self::InvalidUrl => "InvalidUrl",
            Self::UndeclaredPromptVariable => "UndeclaredPromptVariable",
            Self::InvalidPattern => "InvalidPattern",
            Self::InvalidSeverity => "InvalidSeverity",
            Self::ConflictingPatternClassification => "ConflictingPatternClassification",
            Self::UnknownCondition => "UnknownCondition",
            Self::EmptyOverrideBlock => "EmptyOverrideBlock",
            Self::UnknownOverrideTarget => "UnknownOverrideTarget",
            Self::UnknownEnvironment => "UnknownEnvironment",
            Self::EmptyPatternGroup => "EmptyPatternGroup",
            Self::UnknownComplianceFramework => "UnknownComplianceFramework",
        }
    }

    /// Look a code up by its stable string form.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == name)
    }

    /// Every code, in declaration order.
    pub fn all() -> &'static [IssueCode] {
        &[
            Self::MalformedDocument,
            Self::EmptyDocument,
            Self::MissingFragment,
            Self::InvalidFragment,
            Self::DuplicateToolName,
            Self::DuplicatePromptName,
            Self::DuplicateResourceName,
            Self::MissingField,
            Self::InvalidType,
            Self::InvalidEnumValue,
            Self::EmptyValue,
            Self::UnknownField,
            Self::NameMismatch,
            Self::InvalidName,
            Self::DuplicateParameterName,
            Self::ParameterNameMismatch,
            Self::RequiredWithDefault,
            Self::IllegalConstraint,
            Self::InvalidConstraint,
            Self::DefaultNotInEnum,
            Self::DefaultTypeMismatch,
            Self::NonPositiveValue,
            Self::AuthFieldMismatch,
            Self::TransformSourceConflict,
            Self::TransformSourceMissing,
            Self::IncompleteTransformReference,
            Self::UnknownSchemaVersion,
            Self::NoTools,
            Self::UnsupportedFeature,
            Self::UnboundPlaceholder,
            Self::UnusedPathParameter,
            Self::DuplicateCredentialBinding,
            Self::MalformedEnvReference,
            Self::UndocumentedEnvVar,
            Self::UnusedEnvVar,
            Self::InvalidTransformExpression,
            Self::InvalidTemplate,
            Self::MissingTransformFile,
            Self::TransformFileMismatch,
            Self::InvalidVersion,
            Self::InvalidDomain,
            Self::MissingEndpoint,
            Self::MissingStatement,
            Self::ConflictingTarget,
            Self::MissingMethod,
            Self::ConnectionMismatch,
            Self::InvalidUrl,
            Self::UndeclaredPromptVariable,
            Self::InvalidPattern,
            Self::InvalidSeverity,
            Self::ConflictingPatternClassification,
            Self::UnknownCondition,
            Self::EmptyOverrideBlock,
            Self::UnknownOverrideTarget,
            Self::UnknownEnvironment,
            Self::EmptyPatternGroup,
            Self::UnknownComplianceFramework,
        ]
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable machine-readable code.
    pub code: IssueCode,
    /// Where in the document the finding applies.
    pub path: EntityPath,
    /// Error or warning.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Suggested fix, when one is obvious.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Issue {
    /// Create an error-severity issue.
    pub fn error(code: IssueCode, path: impl Into<EntityPath>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            severity: Severity::Error,
            message: message.into(),
            recommendation: None,
        }
    }

    /// Create a warning-severity issue.
    pub fn warning(code: IssueCode, path: impl Into<EntityPath>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            severity: Severity::Warning,
            message: message.into(),
            recommendation: None,
        }
    }

    /// Attach a recommendation.
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// Whether this issue is error-severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Whether this issue is warning-severity.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.code, self.path, self.message
        )
    }
}
