//! Shared fixtures for kpack-pack integration tests.

#![allow(dead_code)]

use kpack_core::{Issue, IssueCode};
use kpack_pack::{MemoryLoader, Report};

/// Primary document of a complete, valid modular pack.
pub const PACK_YAML: &str = r#"
metadata:
  name: blog-api
  version: 1.2.0
  description: Blog posts, comments and authors
  vendor: Example Inc
  domain: content
  compatibility: 2.0.0
  license: MIT
  tags: [blog, demo]
  pricing_tier: free

connection:
  type: rest
  base_url: https://jsonplaceholder.typicode.com
  timeout: 30
  auth:
    method: bearer
    token: ${BLOG_API_TOKEN}
  headers:
    Accept: application/json
  rate_limit:
    requests_per_minute: 60
  retry_policy:
    max_attempts: 3
    backoff: exponential

tools:
  get_post:
    type: details
    description: Fetch one post by its id
    endpoint: /posts/{post_id}
    method: GET
    parameters:
      - name: post_id
        type: integer
        required: true
        location: path
        min_value: 1
    transform:
      engine: jq
      expression: '{id: .id, title: .title, body: .body}'

prompts:
  summarize_post:
    description: Summarize a post for a reader
    template: "Summarize post {post_id} in {language}"
    variables: [post_id, language]

resources:
  api_guide:
    description: Upstream API guide
    url: https://jsonplaceholder.typicode.com/guide

environment:
  BLOG_API_TOKEN: Bearer token for the blog API

structure:
  tools: ./tools/
  transforms: ./transforms/
"#;

/// A tool fragment using the mapping parameter form and an external
/// transform.
pub const SEARCH_FRAGMENT: &str = r#"
tools:
  search_posts:
    type: search
    description: Search posts by keyword
    endpoint: /posts
    method: GET
    parameters:
      q:
        type: string
        required: true
        location: query
        max_length: 100
      limit:
        type: integer
        required: false
        default: 10
        min_value: 1
        max_value: 100
    transform:
      engine: python
      file: transforms/normalize.py
      function: normalize_posts
"#;

/// A second tool fragment.
pub const COMMENTS_FRAGMENT: &str = r#"
tools:
  list_comments:
    type: list
    description: List comments of a post
    endpoint: /posts/{post_id}/comments
    method: GET
    parameters:
      - name: post_id
        type: integer
        required: true
        location: path
"#;

/// Transform script behind `structure.transforms`.
pub const NORMALIZE_PY: &str = "def normalize_posts(data):\n    return data\n";

/// A well-formed guardrail policy.
pub const GUARDRAILS_YAML: &str = r#"
version: "1.0"
description: Read-only safety policy
blocked_patterns:
  sql_injection:
    enabled: true
    patterns:
      - "(?i)DROP\\s+TABLE"
      - "(?i)UNION\\s+SELECT"
    message: SQL injection attempt
    severity: critical
warning_patterns:
  unbounded_read:
    enabled: true
    patterns:
      - "(?i)SELECT\\s+\\*"
    message: Unbounded read
    severity: medium
auto_modifications:
  add_limit:
    enabled: true
    conditions: [no_limit_specified]
    action: add_limit
    value: 100
environment_overrides:
  development:
    warning_patterns:
      unbounded_read:
        enabled: false
default_environment: development
compliance:
  gdpr:
    enabled: true
"#;

/// The full valid pack.
pub fn valid_pack() -> MemoryLoader {
    MemoryLoader::named("blog-api")
        .with_file("pack.yaml", PACK_YAML)
        .with_file("tools/search.yaml", SEARCH_FRAGMENT)
        .with_file("tools/comments.yaml", COMMENTS_FRAGMENT)
        .with_file("transforms/normalize.py", NORMALIZE_PY)
        .with_file("guardrails.yaml", GUARDRAILS_YAML)
}

/// The valid pack with its primary document edited.
pub fn pack_with(edit: impl FnOnce(&str) -> String) -> MemoryLoader {
    valid_pack().with_file("pack.yaml", edit(PACK_YAML))
}

/// The valid pack with a different guardrail policy.
pub fn pack_with_guardrails(policy: &str) -> MemoryLoader {
    valid_pack().with_file("guardrails.yaml", policy)
}

/// Codes of every issue, in report order.
pub fn codes(report: &Report) -> Vec<IssueCode> {
    report.issues.iter().map(|i| i.code).collect()
}

/// Issues carrying `code`.
pub fn with_code(report: &Report, code: IssueCode) -> Vec<&Issue> {
    report.issues.iter().filter(|i| i.code == code).collect()
}
