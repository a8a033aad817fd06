//! # Collection Validation
//!
//! Validates many packs at once. Packs share nothing but the read-only
//! registry, so they run across the rayon pool; results are sorted by pack
//! name afterwards, which keeps the collection report deterministic.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::loader::PackLoader;
use crate::report::Report;
use crate::validator::PackValidator;

/// Outcome for one pack of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackOutcome {
    /// Name the caller gave the pack, usually its directory.
    pub name: String,
    /// The report, when one could be produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    /// The system error that prevented a report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PackOutcome {
    /// Whether a report exists and is valid.
    pub fn is_valid(&self) -> bool {
        self.report.as_ref().is_some_and(Report::is_valid)
    }
}

/// Totals across a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Packs attempted.
    pub total_packs: usize,
    /// Packs with a valid report.
    pub valid_packs: usize,
    /// Packs with an invalid report.
    pub invalid_packs: usize,
    /// Packs that hit a system error.
    pub errored_packs: usize,
    /// Error-severity issues across every report.
    pub total_errors: usize,
    /// Warning-severity issues across every report.
    pub total_warnings: usize,
    /// `valid_packs / total_packs`, `0.0` for an empty collection.
    pub validation_rate: f64,
}

/// Per-pack outcomes plus totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    /// Outcomes sorted by name.
    pub packs: Vec<PackOutcome>,
    /// Totals.
    pub summary: CollectionSummary,
}

impl CollectionReport {
    /// Assemble a report from outcomes in any order.
    pub fn from_outcomes(mut packs: Vec<PackOutcome>) -> Self {
        packs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut summary = CollectionSummary {
            total_packs: packs.len(),
            ..CollectionSummary::default()
        };
        for outcome in &packs {
            match &outcome.report {
                Some(report) => {
                    if report.is_valid() {
                        summary.valid_packs += 1;
                    } else {
                        summary.invalid_packs += 1;
                    }
                    summary.total_errors += report.summary.errors;
                    summary.total_warnings += report.summary.warnings;
                }
                None => summary.errored_packs += 1,
            }
        }
        if summary.total_packs > 0 {
            summary.validation_rate = summary.valid_packs as f64 / summary.total_packs as f64;
        }

        Self { packs, summary }
    }

    /// Whether every pack produced a valid report.
    pub fn all_valid(&self) -> bool {
        self.summary.valid_packs == self.summary.total_packs
    }
}

/// Validate every `(name, loader)` pair in parallel.
///
/// A pack whose loader fails is recorded as errored; the rest still run.
pub fn validate_collection<L>(validator: &PackValidator<'_>, packs: Vec<(String, L)>) -> CollectionReport
where
    L: PackLoader + Send + Sync,
{
    let outcomes: Vec<PackOutcome> = packs
        .par_iter()
        .map(|(name, loader)| match validator.validate(loader) {
            Ok(report) => PackOutcome {
                name: name.clone(),
                report: Some(report),
                error: None,
            },
            Err(e) => {
                tracing::warn!(pack = %name, error = %e, "pack could not be validated");
                PackOutcome {
                    name: name.clone(),
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    let report = CollectionReport::from_outcomes(outcomes);
    tracing::info!(
        total = report.summary.total_packs,
        valid = report.summary.valid_packs,
        invalid = report.summary.invalid_packs,
        errored = report.summary.errored_packs,
        "validated collection"
    );
    report
}
