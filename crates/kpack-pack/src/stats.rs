//! # Pack Statistics and Index
//!
//! Inventory of packs without validating them: metadata, connection type,
//! entity counts and document digest per pack, plus totals for a
//! collection. Only the parse stage runs.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::PackDocument;
use crate::error::PackResult;
use crate::loader::PackLoader;
use crate::parser::{parse_pack, ParseOutcome};

/// Summary of one parsed pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackStatistics {
    /// `metadata.name`.
    pub name: Option<String>,
    /// `metadata.version`.
    pub version: Option<String>,
    /// `metadata.vendor`.
    pub vendor: Option<String>,
    /// `metadata.domain`.
    pub domain: Option<String>,
    /// `metadata.compatibility`.
    pub compatibility: Option<String>,
    /// `connection.type`.
    pub connection: Option<String>,
    /// Merged tool count.
    pub tools: usize,
    /// Tool count per type; a tool without `type` counts as `list`.
    pub tools_by_type: BTreeMap<String, usize>,
    /// Merged prompt count.
    pub prompts: usize,
    /// Merged resource count.
    pub resources: usize,
    /// Entries of the `environment` section.
    pub environment: usize,
    /// Whether a guardrail policy was found.
    pub guardrails: bool,
    /// SHA-256 of the merged document.
    pub digest: String,
}

impl PackStatistics {
    /// Statistics of a merged document.
    pub fn of(doc: &PackDocument) -> Self {
        let meta = |key: &str| doc.metadata_str(key).map(str::to_string);

        let mut tools_by_type = BTreeMap::new();
        for tool in &doc.tools {
            let kind = tool.str_field("type").unwrap_or("list");
            *tools_by_type.entry(kind.to_string()).or_insert(0) += 1;
        }

        let environment = match doc.section("environment") {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        };

        Self {
            name: meta("name"),
            version: meta("version"),
            vendor: meta("vendor"),
            domain: meta("domain"),
            compatibility: meta("compatibility"),
            connection: doc
                .connection()
                .and_then(|c| c.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string),
            tools: doc.tools.len(),
            tools_by_type,
            prompts: doc.prompts.len(),
            resources: doc.resources.len(),
            environment,
            guardrails: doc.guardrails.is_some(),
            digest: doc.digest(),
        }
    }

    /// Parse one pack and summarize it. `Ok(None)` when the primary
    /// document is unusable.
    pub fn load(loader: &dyn PackLoader) -> PackResult<Option<Self>> {
        Ok(parse_pack(loader)?.document.as_ref().map(Self::of))
    }
}

/// One pack of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Name the caller gave the pack, usually its relative directory.
    pub path: String,
    /// Statistics, when the pack could be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PackStatistics>,
    /// Why there are no statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals across an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTotals {
    /// Packs found.
    pub packs: usize,
    /// Packs without statistics.
    pub unreadable: usize,
    /// Tools across every pack.
    pub tools: usize,
    /// Prompts across every pack.
    pub prompts: usize,
    /// Resources across every pack.
    pub resources: usize,
    /// Packs carrying a guardrail policy.
    pub with_guardrails: usize,
    /// Pack count per domain.
    pub by_domain: BTreeMap<String, usize>,
    /// Pack count per connection type.
    pub by_connection: BTreeMap<String, usize>,
}

/// Inventory of a pack collection, sorted by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackIndex {
    /// Entries sorted by path.
    pub packs: Vec<IndexEntry>,
    /// Totals.
    pub totals: IndexTotals,
}

impl PackIndex {
    /// Assemble an index from entries in any order.
    pub fn from_entries(mut packs: Vec<IndexEntry>) -> Self {
        packs.sort_by(|a, b| a.path.cmp(&b.path));

        let mut totals = IndexTotals {
            packs: packs.len(),
            ..IndexTotals::default()
        };
        for entry in &packs {
            let Some(stats) = &entry.stats else {
                totals.unreadable += 1;
                continue;
            };
            totals.tools += stats.tools;
            totals.prompts += stats.prompts;
            totals.resources += stats.resources;
            if stats.guardrails {
                totals.with_guardrails += 1;
            }
            if let Some(domain) = &stats.domain {
                *totals.by_domain.entry(domain.clone()).or_insert(0) += 1;
            }
            if let Some(connection) = &stats.connection {
                *totals.by_connection.entry(connection.clone()).or_insert(0) += 1;
            }
        }

        Self { packs, totals }
    }
}

/// Parse every `(path, loader)` pair in parallel and index the results.
pub fn index_packs<L>(packs: Vec<(String, L)>) -> PackIndex
where
    L: PackLoader + Send + Sync,
{
    let entries: Vec<IndexEntry> = packs
        .par_iter()
        .map(|(path, loader)| {
            let (stats, error) = match parse_pack(loader) {
                Ok(ParseOutcome {
                    document: Some(doc),
                    ..
                }) => (Some(PackStatistics::of(&doc)), None),
                Ok(outcome) => {
                    let reason = outcome
                        .issues
                        .first()
                        .map(|i| i.message.clone())
                        .unwrap_or_else(|| "primary document is unusable".to_string());
                    (None, Some(reason))
                }
                Err(e) => (None, Some(e.to_string())),
            };
            if let Some(reason) = &error {
                tracing::debug!(pack = %path, %reason, "pack not indexed");
            }
            IndexEntry {
                path: path.clone(),
                stats,
                error,
            }
        })
        .collect();

    PackIndex::from_entries(entries)
}
