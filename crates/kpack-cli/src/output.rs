//! # Report Rendering
//!
//! Human rendering is an aligned issue table followed by a one-line
//! summary. JSON rendering is the serialized report itself.

use std::fmt::Write as _;

use anyhow::Result;
use kpack_core::{Issue, Severity};
use kpack_pack::{CollectionReport, PackIndex, PackOutcome, Report};
use serde::Serialize;

/// Pretty-printed JSON of any report.
pub fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render one report as a table.
pub fn human_report(report: &Report) -> String {
    let mut out = String::new();
    let name = report.pack.as_deref().unwrap_or("<unnamed pack>");
    match report.schema_version {
        Some(version) => {
            let _ = writeln!(out, "{name} (schema {version}): {}", report.verdict);
        }
        None => {
            let _ = writeln!(out, "{name}: {}", report.verdict);
        }
    }

    if !report.issues.is_empty() {
        write_issue_table(&mut out, &report.issues);
    }

    let _ = writeln!(
        out,
        "{}, {}{}",
        plural(report.summary.errors, "error"),
        plural(report.summary.warnings, "warning"),
        if report.strict { " (strict)" } else { "" }
    );
    out
}

/// Render a collection: one block per pack, then totals.
pub fn human_collection(report: &CollectionReport) -> String {
    let mut out = String::new();
    for outcome in &report.packs {
        out.push_str(&human_outcome(outcome));
        out.push('\n');
    }

    let s = &report.summary;
    let _ = writeln!(
        out,
        "Packs: {}/{} valid, {} invalid, {} errored ({:.1}%)",
        s.valid_packs,
        s.total_packs,
        s.invalid_packs,
        s.errored_packs,
        s.validation_rate * 100.0
    );
    let _ = writeln!(
        out,
        "Issues: {}, {}",
        plural(s.total_errors, "error"),
        plural(s.total_warnings, "warning")
    );
    out
}

fn human_outcome(outcome: &PackOutcome) -> String {
    match (&outcome.report, &outcome.error) {
        (Some(report), _) => {
            let mut text = format!("[{}] ", outcome.name);
            text.push_str(&human_report(report));
            text
        }
        (None, Some(error)) => format!("[{}] ERROR: {error}\n", outcome.name),
        (None, None) => format!("[{}] ERROR: no report\n", outcome.name),
    }
}

/// Render a pack index: one aligned row per pack, then totals.
pub fn human_index(index: &PackIndex) -> String {
    const HEADER: [&str; 8] = [
        "PATH", "NAME", "VERSION", "DOMAIN", "CONNECTION", "TOOLS", "PROMPTS", "RESOURCES",
    ];

    let dash = || "-".to_string();
    let rows: Vec<Result<[String; 8], String>> = index
        .packs
        .iter()
        .map(|entry| match &entry.stats {
            Some(s) => Ok([
                entry.path.clone(),
                s.name.clone().unwrap_or_else(dash),
                s.version.clone().unwrap_or_else(dash),
                s.domain.clone().unwrap_or_else(dash),
                s.connection.clone().unwrap_or_else(dash),
                s.tools.to_string(),
                s.prompts.to_string(),
                s.resources.to_string(),
            ]),
            None => Err(format!(
                "{}  ERROR: {}",
                entry.path,
                entry.error.as_deref().unwrap_or("unreadable")
            )),
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in rows.iter().flatten() {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let write_row = |out: &mut String, cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };

    let mut out = String::new();
    write_row(&mut out, &HEADER);
    for row in &rows {
        match row {
            Ok(cells) => write_row(&mut out, &cells.each_ref().map(String::as_str)),
            Err(line) => {
                let _ = writeln!(out, "{line}");
            }
        }
    }

    let t = &index.totals;
    let _ = writeln!(
        out,
        "\nPacks: {} ({} unreadable), {}, {}, {}, {} with guardrails",
        t.packs,
        t.unreadable,
        plural(t.tools, "tool"),
        plural(t.prompts, "prompt"),
        plural(t.resources, "resource"),
        t.with_guardrails
    );
    out
}

fn write_issue_table(out: &mut String, issues: &[Issue]) {
    let code_width = issues.iter().map(|i| i.code.as_str().len()).max().unwrap_or(0);
    let path_width = issues.iter().map(|i| i.path.as_str().len()).max().unwrap_or(0);

    for issue in issues {
        let severity = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        let _ = writeln!(
            out,
            "  {severity:<5}  {:<code_width$}  {:<path_width$}  {}",
            issue.code.as_str(),
            issue.path.as_str(),
            issue.message,
        );
        if let Some(recommendation) = &issue.recommendation {
            let indent = 2 + 5 + 2 + code_width + 2 + path_width + 2;
            let _ = writeln!(out, "{:indent$}-> {recommendation}", "");
        }
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_core::{IssueCode, Stage};
    use kpack_pack::ReportBuilder;

    fn sample() -> Report {
        let mut builder = ReportBuilder::new().pack(Some("blog-api".to_string()));
        builder.add(
            Stage::Semantic,
            vec![
                Issue::error(
                    IssueCode::UnboundPlaceholder,
                    "tools.get_post.endpoint",
                    "placeholder {post_id} has no parameter",
                )
                .with_recommendation("declare parameter post_id"),
                Issue::warning(IssueCode::UnusedEnvVar, "environment.OLD", "OLD is never used"),
            ],
        );
        builder.build()
    }

    #[test]
    fn human_report_lists_issues_and_summary() {
        let text = human_report(&sample());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "blog-api: INVALID");
        assert!(lines[1].starts_with("  ERROR  UnboundPlaceholder"));
        assert!(lines[2].trim_start().starts_with("-> declare parameter post_id"));
        assert!(lines[3].starts_with("  WARN "));
        assert_eq!(lines[4], "1 error, 1 warning");
    }

    #[test]
    fn issue_columns_are_aligned() {
        let text = human_report(&sample());
        let lines: Vec<_> = text.lines().collect();
        let col = |line: &str, needle: &str| line.find(needle).unwrap();
        assert_eq!(col(lines[1], "tools."), col(lines[3], "environment."));
    }

    #[test]
    fn clean_report_is_two_lines() {
        let report = ReportBuilder::new().pack(Some("demo".to_string())).build();
        assert_eq!(human_report(&report), "demo: VALID\n0 errors, 0 warnings\n");
    }

    #[test]
    fn collection_shows_errored_packs_and_totals() {
        let report = CollectionReport::from_outcomes(vec![
            PackOutcome {
                name: "broken".to_string(),
                report: None,
                error: Some("required file not found: broken/pack.yaml".to_string()),
            },
            PackOutcome {
                name: "blog-api".to_string(),
                report: Some(sample()),
                error: None,
            },
        ]);
        let text = human_collection(&report);
        assert!(text.starts_with("[blog-api] blog-api: INVALID"));
        assert!(text.contains("[broken] ERROR: required file not found"));
        assert!(text.contains("Packs: 0/2 valid, 1 invalid, 1 errored (0.0%)"));
        assert!(text.contains("Issues: 1 error, 1 warning"));
    }

    #[test]
    fn index_rows_are_aligned_and_errors_inline() {
        use kpack_pack::{IndexEntry, PackStatistics};

        let stats = PackStatistics {
            name: Some("blog-api".to_string()),
            version: Some("1.0.0".to_string()),
            vendor: None,
            domain: Some("content".to_string()),
            compatibility: None,
            connection: Some("rest".to_string()),
            tools: 3,
            tools_by_type: Default::default(),
            prompts: 1,
            resources: 0,
            environment: 0,
            guardrails: true,
            digest: String::new(),
        };
        let index = PackIndex::from_entries(vec![
            IndexEntry {
                path: "team/blog-api".to_string(),
                stats: Some(stats),
                error: None,
            },
            IndexEntry {
                path: "broken".to_string(),
                stats: None,
                error: Some("pack.yaml is empty".to_string()),
            },
        ]);

        let text = human_index(&index);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("PATH "));
        assert_eq!(lines[1], "broken  ERROR: pack.yaml is empty");
        assert!(lines[2].starts_with("team/blog-api  blog-api  1.0.0"));
        let name_col = lines[0].find("NAME").unwrap();
        assert!(lines[2][name_col..].starts_with("blog-api  1.0.0"));
        assert!(text.ends_with("Packs: 2 (1 unreadable), 3 tools, 1 prompt, 0 resources, 1 with guardrails\n"));
    }

    #[test]
    fn json_is_the_serialized_report() {
        let text = json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["verdict"], "INVALID");
        assert_eq!(value["issues"][0]["code"], "UnboundPlaceholder");
        assert_eq!(value["summary"]["errors"], 1);
    }
}
