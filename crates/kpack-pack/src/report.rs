//! # Report Builder
//!
//! Folds the issues of every pass into the one artifact handed to callers:
//! an ordered issue list, a severity summary, and a verdict.
//!
//! Issues are ordered by [`Stage`] (parse, structural, semantic,
//! guardrail); within a stage the producing pass's order is kept. Reports
//! carry no timestamps, so validating the same input twice yields
//! byte-identical JSON.

use std::fmt;

use kpack_core::{Issue, SemVer, Stage};
use serde::{Deserialize, Serialize};

use crate::error::PackResult;

/// Pass/fail outcome of one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No error-severity issue (and, under strict mode, no warning).
    Valid,
    /// At least one failing issue.
    Invalid,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("VALID"),
            Self::Invalid => f.write_str("INVALID"),
        }
    }
}

/// Issue counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Error-severity issues.
    pub errors: usize,
    /// Warning-severity issues.
    pub warnings: usize,
}

impl Summary {
    /// Count the issues in `issues`.
    pub fn of(issues: &[Issue]) -> Self {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        Self {
            errors,
            warnings: issues.len() - errors,
        }
    }
}

/// The result of validating one pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Declared pack name, falling back to the loader's logical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
    /// The schema version whose rules were applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<SemVer>,
    /// SHA-256 of the merged document, when one could be built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_digest: Option<String>,
    /// Whether warnings fail the verdict.
    pub strict: bool,
    /// Pass or fail.
    pub verdict: Verdict,
    /// Counts by severity.
    pub summary: Summary,
    /// Every issue, in stage order.
    pub issues: Vec<Issue>,
}

impl Report {
    /// Whether the verdict is [`Verdict::Valid`].
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    /// Error-severity issues.
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    /// Warning-severity issues.
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_warning())
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> PackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collects issues stage by stage, then orders them into a [`Report`].
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    pack: Option<String>,
    schema_version: Option<SemVer>,
    digest: Option<String>,
    strict: bool,
    issues: Vec<(Stage, Issue)>,
}

impl ReportBuilder {
    /// An empty, non-strict builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the verdict on warnings too.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Record the pack name.
    pub fn pack(mut self, name: Option<String>) -> Self {
        self.pack = name;
        self
    }

    /// Record the applied schema version.
    pub fn schema_version(mut self, version: SemVer) -> Self {
        self.schema_version = Some(version);
        self
    }

    /// Record the merged-document digest.
    pub fn digest(mut self, digest: String) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Append the issues of one pass. Passes may be added in any order.
    pub fn add(&mut self, stage: Stage, issues: impl IntoIterator<Item = Issue>) -> &mut Self {
        self.issues.extend(issues.into_iter().map(|i| (stage, i)));
        self
    }

    /// Drop issues the caller chose to ignore.
    pub fn retain(&mut self, mut keep: impl FnMut(&Issue) -> bool) -> &mut Self {
        self.issues.retain(|(_, i)| keep(i));
        self
    }

    /// Order the issues and compute the verdict.
    pub fn build(self) -> Report {
        let mut staged = self.issues;
        // Stable: intra-stage order survives.
        staged.sort_by_key(|(stage, _)| *stage);
        let issues: Vec<Issue> = staged.into_iter().map(|(_, i)| i).collect();

        let summary = Summary::of(&issues);
        let failing = summary.errors > 0 || (self.strict && summary.warnings > 0);
        Report {
            pack: self.pack,
            schema_version: self.schema_version,
            document_digest: self.digest,
            strict: self.strict,
            verdict: if failing { Verdict::Invalid } else { Verdict::Valid },
            summary,
            issues,
        }
    }
}

/// Build a non-strict report from per-stage issue lists.
pub fn build(passes: impl IntoIterator<Item = (Stage, Vec<Issue>)>) -> Report {
    let mut builder = ReportBuilder::new();
    for (stage, issues) in passes {
        builder.add(stage, issues);
    }
    builder.build()
}
