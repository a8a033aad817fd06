//! `metadata.version`, `metadata.compatibility` and `metadata.domain`.

use kpack_core::{EntityPath, Issue, IssueCode, SemVer};

use super::{RuleContext, SemanticRule};
use crate::template::is_slug;

/// Versions are semantic versions; the domain is a lowercase slug.
///
/// A malformed pack `version` is only a warning: nothing downstream reads
/// it. A malformed `compatibility` is an error since it selects the rule
/// set. Whether the compatibility is *registered* is decided when the rule set
/// is resolved; this rule only checks that it parses.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionRule;

impl SemanticRule for VersionRule {
    fn name(&self) -> &'static str {
        "versions"
    }

    fn check(&self, ctx: &RuleContext<'_>, issues: &mut Vec<Issue>) {
        let doc = ctx.doc;
        let path = EntityPath::new("metadata");

        if let Some(version) = doc.metadata_str("version") {
            if let Err(e) = SemVer::parse(version) {
                issues.push(
                    Issue::warning(
                        IssueCode::InvalidVersion,
                        path.field("version"),
                        format!("pack version should follow semantic versioning: {e}"),
                    )
                    .with_recommendation("use MAJOR.MINOR.PATCH, e.g. 1.0.0"),
                );
            }
        }

        if let Some(compatibility) = doc.compatibility() {
            if let Err(e) = SemVer::parse_requirement(compatibility) {
                issues.push(
                    Issue::error(
                        IssueCode::InvalidVersion,
                        path.field("compatibility"),
                        format!("compatibility is not a semantic version: {e}"),
                    )
                    .with_recommendation("use a version such as 2.0.0 or >=2.0.0"),
                );
            }
        }

        if let Some(domain) = doc.metadata_str("domain") {
            if !domain.trim().is_empty() && !is_slug(domain) {
                issues.push(
                    Issue::warning(
                        IssueCode::InvalidDomain,
                        path.field("domain"),
                        format!("domain {domain:?} is not a lowercase slug"),
                    )
                    .with_recommendation(format!(
                        "use e.g. {:?}",
                        domain.trim().to_ascii_lowercase().replace(' ', "-")
                    )),
                );
            }
        }
    }
}
