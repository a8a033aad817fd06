//! `metadata` checks.

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::{Entity, PricingTier};

use super::{present, Checker};
use crate::document::PackDocument;
use crate::template::is_pack_name;

const REQUIRED: &[&str] = &["version", "description", "vendor", "domain"];
const OPTIONAL: &[&str] = &["compatibility", "license", "author", "homepage"];

pub(super) fn check(c: &mut Checker<'_>, doc: &PackDocument) {
    let path = EntityPath::new("metadata");
    let Some(value) = doc.section("metadata") else {
        c.push(
            Issue::error(IssueCode::MissingField, path, "pack has no `metadata` section")
                .with_recommendation("declare name, version, description, vendor and domain"),
        );
        return;
    };
    let Some(meta) = c.mapping(value, &path, "metadata") else {
        return;
    };

    c.unknown_fields(Entity::Metadata, meta, &path);

    if let Some(name) = c.required_str(meta, "name", &path) {
        check_name(c, doc, name, &path);
    }
    for key in REQUIRED {
        c.required_str(meta, key, &path);
    }
    for key in OPTIONAL {
        c.optional_str(meta, key, &path);
    }
    if let Some(tags) = present(meta, "tags") {
        c.string_list(tags, &path.field("tags"), "tags");
    }
    if let Some(tier) = present(meta, "pricing_tier") {
        c.closed::<PricingTier>(tier, path.field("pricing_tier"));
    }
}

fn check_name(c: &mut Checker<'_>, doc: &PackDocument, name: &str, path: &EntityPath) {
    let path = path.field("name");

    if !is_pack_name(name) {
        c.push(
            Issue::error(
                IssueCode::InvalidName,
                &path,
                format!("pack name {name:?} must start with a letter and contain only letters, digits, `-` or `_`"),
            )
            .with_recommendation("use the pack directory name"),
        );
    }

    if let Some(logical) = doc.logical_name.as_deref() {
        if logical != name {
            c.push(
                Issue::error(
                    IssueCode::NameMismatch,
                    path,
                    format!("pack name '{name}' does not match its directory '{logical}'"),
                )
                .with_recommendation(format!("rename the pack to '{logical}' or move it")),
            );
        }
    }
}
