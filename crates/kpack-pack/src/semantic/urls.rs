//! Absolute URL checks for `connection.base_url` and resource URLs.

use kpack_core::{EntityPath, Issue, IssueCode};
use serde_json::Value;
use url::Url;

use super::{RuleContext, SemanticRule};

/// Literal URLs must be absolute `http` or `https` URLs. Values containing
/// `${VAR}` or `{placeholder}` tokens are resolved by the host and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlRule;

impl SemanticRule for UrlRule {
    fn name(&self) -> &'static str {
        "urls"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        let doc = ctx.doc;
        if let Some(base_url) = doc
            .connection()
            .and_then(|c| c.get("base_url"))
            .and_then(Value::as_str)
        {
            check_url(base_url, EntityPath::new("connection").field("base_url"), issues);
        }
        for resource in &doc.resources {
            if let Some(url) = resource.str_field("url") {
                check_url(url, resource.path.field("url"), issues);
            }
        }
    }
}

fn check_url(raw: &str, path: EntityPath, issues: &mut Vec<Issue>) {
    if raw.contains('{') || raw.trim().is_empty() {
        return;
    }
    let problem = match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => return,
        Ok(url) => format!("scheme `{}` is not http or https", url.scheme()),
        Err(e) => e.to_string(),
    };
    issues.push(
        Issue::error(
            IssueCode::InvalidUrl,
            path,
            format!("{raw:?} is not a valid absolute URL: {problem}"),
        )
        .with_recommendation("use a full URL such as https://api.example.com"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(raw: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        check_url(raw, EntityPath::new("connection").field("base_url"), &mut issues);
        issues
    }

    #[test]
    fn https_is_accepted() {
        assert!(run("https://jsonplaceholder.typicode.com").is_empty());
    }

    #[test]
    fn templated_urls_are_skipped() {
        assert!(run("${API_BASE_URL}").is_empty());
        assert!(run("https://{tenant}.example.com").is_empty());
    }

    #[test]
    fn relative_and_foreign_schemes_are_errors() {
        assert_eq!(run("api.example.com/v1")[0].code, IssueCode::InvalidUrl);
        assert!(run("ftp://files.example.com")[0].message.contains("ftp"));
    }
}
