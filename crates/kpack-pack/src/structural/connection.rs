//! `connection` checks: type-specific locators, auth shapes, headers,
//! rate limits and retry policy.

use std::collections::BTreeMap;

use kpack_core::{EntityPath, Issue, IssueCode};
use kpack_schema::vocab::CREDENTIAL_FIELDS;
use kpack_schema::{AuthMethod, Entity, RetryBackoff};
use serde_json::{Map, Value};

use super::{present, Checker};
use crate::document::{type_name, PackDocument};

pub(super) fn check(c: &mut Checker<'_>, doc: &PackDocument) {
    let path = EntityPath::new("connection");
    let Some(value) = doc.section("connection") else {
        c.push(Issue::error(
            IssueCode::MissingField,
            path,
            "pack has no `connection` section",
        ));
        return;
    };
    let Some(conn) = c.mapping(value, &path, "connection") else {
        return;
    };

    c.unknown_fields(Entity::Connection, conn, &path);

    let rules = c.rules;
    let kind = match present(conn, "type") {
        None => {
            c.push(Issue::error(
                IssueCode::MissingField,
                path.field("type"),
                "missing required field `type`",
            ));
            None
        }
        Some(v) => c.closed_in(v, rules.connection_types(), path.field("type")),
    };
    if let Some(kind) = kind {
        for field in kind.required_fields() {
            c.required_str(conn, field, &path);
        }
    }

    c.positive_int(conn, "timeout", &path);
    c.positive_int(conn, "port", &path);
    c.optional_bool(conn, "verify_ssl", &path);

    if let Some(headers) = present(conn, "headers") {
        c.string_map(headers, &path.field("headers"), "headers");
    }
    if let Some(auth) = present(conn, "auth") {
        check_auth(c, auth, path.field("auth"));
    }
    if let Some(limit) = present(conn, "rate_limit") {
        check_rate_limit(c, limit, path.field("rate_limit"));
    }
    if let Some(retry) = present(conn, "retry_policy") {
        check_retry_policy(c, retry, path.field("retry_policy"));
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

fn check_auth(c: &mut Checker<'_>, value: &Value, path: EntityPath) {
    let Some(auth) = c.mapping(value, &path, "auth") else {
        return;
    };
    c.unknown_fields(Entity::Auth, auth, &path);

    let rules = c.rules;
    let method = match present(auth, "method") {
        None => {
            c.push(Issue::error(
                IssueCode::MissingField,
                path.field("method"),
                "auth block has no `method`",
            ));
            None
        }
        Some(v) => c.closed_in(v, rules.auth_methods(), path.field("method")),
    };

    let config_path = path.field("config");
    let config = match present(auth, "config") {
        Some(v) => c.mapping(v, &config_path, "auth.config"),
        None => None,
    };
    if let Some(config) = config {
        for key in config.keys() {
            if !CREDENTIAL_FIELDS.contains(&key.as_str()) {
                c.push(Issue::warning(
                    IssueCode::UnknownField,
                    config_path.field(key),
                    format!("unknown auth field `{key}`"),
                ));
            }
        }
    }

    let Some(method) = method else {
        return;
    };
    let credentials = credential_fields(auth, config, &path);
    check_credentials(c, method, &credentials, &path);
}

/// Credential fields present directly under `auth` or under `auth.config`.
fn credential_fields(
    auth: &Map<String, Value>,
    config: Option<&Map<String, Value>>,
    path: &EntityPath,
) -> BTreeMap<&'static str, EntityPath> {
    CREDENTIAL_FIELDS
        .iter()
        .filter_map(|field| {
            if present(auth, field).is_some() {
                Some((*field, path.field(field)))
            } else if config.is_some_and(|m| present(m, field).is_some()) {
                Some((*field, path.field("config").field(field)))
            } else {
                None
            }
        })
        .collect()
}

fn check_credentials(
    c: &mut Checker<'_>,
    method: AuthMethod,
    found: &BTreeMap<&'static str, EntityPath>,
    path: &EntityPath,
) {
    for group in method.required_fields() {
        if !group.iter().any(|f| found.contains_key(f)) {
            c.push(
                Issue::error(
                    IssueCode::AuthFieldMismatch,
                    path,
                    format!("{method} auth requires `{}`", group.join("` or `")),
                )
                .with_recommendation("reference the credential through an environment variable, e.g. ${API_TOKEN}"),
            );
        }
    }
    for (field, field_path) in found {
        if !method.allowed_fields().contains(field) {
            c.push(Issue::error(
                IssueCode::AuthFieldMismatch,
                field_path,
                format!("`{field}` is not used by {method} auth"),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Rate limit and retry policy
// ---------------------------------------------------------------------------

fn check_rate_limit(c: &mut Checker<'_>, value: &Value, path: EntityPath) {
    let Some(limit) = c.mapping(value, &path, "rate_limit") else {
        return;
    };
    c.unknown_fields(Entity::RateLimit, limit, &path);
    for key in limit.keys() {
        c.positive_int(limit, key, &path);
    }
}

fn check_retry_policy(c: &mut Checker<'_>, value: &Value, path: EntityPath) {
    let Some(retry) = c.mapping(value, &path, "retry_policy") else {
        return;
    };
    c.unknown_fields(Entity::RetryPolicy, retry, &path);
    for key in ["max_attempts", "initial_delay_ms", "max_delay_ms"] {
        c.positive_int(retry, key, &path);
    }
    if let Some(backoff) = present(retry, "backoff") {
        c.closed::<RetryBackoff>(backoff, path.field("backoff"));
    }
    if let Some(retry_on) = present(retry, "retry_on") {
        if !retry_on.is_array() {
            c.push(Issue::error(
                IssueCode::InvalidType,
                path.field("retry_on"),
                format!("`retry_on` must be a list, found {}", type_name(retry_on)),
            ));
        }
    }
}
