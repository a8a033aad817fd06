//! Tool type against endpoint, statement, method and connection type.

use kpack_core::{Issue, IssueCode};
use kpack_schema::{ConnectionType, ToolType, Vocabulary};
use serde_json::Value;

use super::{tool_type, RuleContext, SemanticRule};
use crate::document::NamedEntry;

/// `query` tools carry `sql` and no `endpoint`; every other type carries
/// `endpoint`, `method` and no `sql`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolTargetRule;

impl SemanticRule for ToolTargetRule {
    fn name(&self) -> &'static str {
        "tool_targets"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        let connection = ctx
            .doc
            .connection()
            .and_then(|c| c.get("type"))
            .and_then(Value::as_str)
            .and_then(ConnectionType::parse);

        for tool in &ctx.doc.tools {
            if tool.fields().is_none() {
                continue;
            }
            let Some(kind) = tool_type(tool) else {
                continue;
            };
            check_targets(tool, kind, issues);
            if let Some(connection) = connection {
                check_connection(tool, kind, connection, issues);
            }
        }
    }
}

fn check_targets(tool: &NamedEntry, kind: ToolType, issues: &mut Vec<Issue>) {
    let has = |key: &str| tool.field(key).is_some();

    if kind.is_http_shaped() {
        if !has("endpoint") {
            issues.push(
                Issue::error(
                    IssueCode::MissingEndpoint,
                    tool.path.field("endpoint"),
                    format!("{kind} tool '{}' has no endpoint", tool.name),
                )
                .with_recommendation("add an endpoint path such as /items/{item_id}"),
            );
        }
        if has("sql") {
            issues.push(
                Issue::error(
                    IssueCode::ConflictingTarget,
                    tool.path.field("sql"),
                    format!("{kind} tool '{}' must not declare `sql`", tool.name),
                )
                .with_recommendation("use `type: query` for statement tools"),
            );
        }
        if !has("method") {
            issues.push(Issue::error(
                IssueCode::MissingMethod,
                tool.path.field("method"),
                format!("{kind} tool '{}' has no HTTP method", tool.name),
            ));
        }
    } else {
        if !has("sql") {
            issues.push(Issue::error(
                IssueCode::MissingStatement,
                tool.path.field("sql"),
                format!("query tool '{}' has no `sql` statement", tool.name),
            ));
        }
        if has("endpoint") {
            issues.push(Issue::error(
                IssueCode::ConflictingTarget,
                tool.path.field("endpoint"),
                format!("query tool '{}' must not declare an endpoint", tool.name),
            ));
        }
    }
}

fn check_connection(tool: &NamedEntry, kind: ToolType, connection: ConnectionType, issues: &mut Vec<Issue>) {
    let mismatch = match kind {
        ToolType::Query => connection != ConnectionType::Database,
        _ => connection == ConnectionType::Database,
    };
    if mismatch {
        issues.push(Issue::warning(
            IssueCode::ConnectionMismatch,
            tool.path.field("type"),
            format!(
                "{kind} tool '{}' does not suit a {} connection",
                tool.name,
                connection.as_str()
            ),
        ));
    }
}
