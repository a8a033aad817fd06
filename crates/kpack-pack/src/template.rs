//! # Template Scanning
//!
//! Lexical helpers shared by the structural and semantic passes:
//! placeholder and `${VAR}` extraction, identifier conventions, and the
//! shallow well-formedness checks for jq filters and text templates.
//!
//! None of these evaluate anything. A jq filter that passes
//! [`check_jq`] may still fail at run time; the check only guarantees that
//! brackets, strings and pipeline stages are balanced.

/// Distinct `{name}` placeholders in a template, in first-appearance order.
///
/// `${NAME}` environment references are not placeholders. Braces whose
/// content is not an identifier (JSON bodies, `{{` markers) are ignored.
pub fn placeholders(template: &str) -> Vec<&str> {
    let bytes = template.as_bytes();
    let mut found: Vec<&str> = Vec::new();

    for (start, _) in template.match_indices('{') {
        if start > 0 && matches!(bytes[start - 1], b'$' | b'{') {
            continue;
        }
        let rest = &template[start + 1..];
        let Some(end) = rest.find('}') else {
            continue;
        };
        let name = &rest[..end];
        if is_identifier(name) && !found.contains(&name) {
            found.push(name);
        }
    }

    found
}

/// Distinct bare identifiers interpolated with `{{ name }}`, in
/// first-appearance order. Expressions such as `{{ user.name | upper }}`
/// contribute their leading identifier.
pub fn interpolations(template: &str) -> Vec<&str> {
    let mut found: Vec<&str> = Vec::new();
    for (start, _) in template.match_indices("{{") {
        let rest = &template[start + 2..];
        let Some(end) = rest.find("}}") else {
            continue;
        };
        let head = rest[..end]
            .trim()
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
            .unwrap_or_default();
        if is_identifier(head) && !found.contains(&head) {
            found.push(head);
        }
    }
    found
}

/// Well-formed `${NAME}` references in a string, in order of appearance.
pub fn env_refs(text: &str) -> Vec<&str> {
    scan_env(text).filter_map(Result::ok).collect()
}

/// Malformed `${...}` tokens: unterminated, empty, or naming an invalid
/// variable.
pub fn malformed_env_refs(text: &str) -> Vec<String> {
    scan_env(text).filter_map(Result::err).collect()
}

fn scan_env(text: &str) -> impl Iterator<Item = Result<&str, String>> {
    text.match_indices("${").map(move |(start, _)| {
        let rest = &text[start + 2..];
        match rest.find('}') {
            None => Err(text[start..].to_string()),
            Some(end) => {
                let name = &rest[..end];
                if is_identifier(name) {
                    Ok(name)
                } else {
                    Err(text[start..start + end + 3].to_string())
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Identifier conventions
// ---------------------------------------------------------------------------

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Pack names double as directory names: a letter, then letters, digits,
/// `-` or `_`.
pub fn is_pack_name(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphabetic())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lowercase snake case: `[a-z][a-z0-9_]*` without doubled, leading or
/// trailing underscores.
pub fn is_snake_case(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !s.ends_with('_')
        && !s.contains("__")
}

/// Lowercase slug: letters, digits, `-` and `_`, starting with a letter.
pub fn is_slug(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// jq
// ---------------------------------------------------------------------------

/// Check that a jq filter is a balanced pipeline.
///
/// Verifies bracket nesting for `()`, `[]`, `{}`, terminated string
/// literals, and that no top-level pipeline stage is empty. `#` comments
/// are ignored.
pub fn check_jq(expr: &str) -> Result<(), String> {
    let expr = strip_jq_comments(expr);
    if expr.trim().is_empty() {
        return Err("jq expression is empty".to_string());
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut stage_start = 0usize;
    let mut stage = 0usize;

    for (i, c) in expr.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => stack.push((c, i)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(format!(
                            "'{c}' at offset {i} closes '{open}' opened at offset {at}"
                        ))
                    }
                    None => return Err(format!("unmatched '{c}' at offset {i}")),
                }
            }
            '|' if stack.is_empty() => {
                if expr[stage_start..i].trim().is_empty() {
                    return Err(format!("pipeline stage {stage} is empty"));
                }
                stage += 1;
                stage_start = i + 1;
            }
            _ => {}
        }
    }

    if in_string {
        return Err("unterminated string literal".to_string());
    }
    if let Some((open, at)) = stack.last() {
        return Err(format!("'{open}' opened at offset {at} is never closed"));
    }
    if stage > 0 && expr[stage_start..].trim().is_empty() {
        return Err(format!("pipeline stage {stage} is empty"));
    }
    Ok(())
}

/// Replace `#` comments outside string literals with nothing, keeping
/// line breaks.
fn strip_jq_comments(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;

    for c in expr.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        match c {
            '#' => in_comment = true,
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Text templates
// ---------------------------------------------------------------------------

/// Check the interpolation markers of a text template.
///
/// Every `{{` must close with `}}` before the next `{{`, every `{%` with
/// `%}`, and marker bodies must not be empty. At least one `{{ }}`
/// interpolation must be present. Returns the number of interpolations.
pub fn check_template(template: &str) -> Result<usize, String> {
    let mut interpolations = 0usize;
    let mut rest = template;
    let mut offset = 0usize;

    loop {
        let next_expr = rest.find("{{");
        let next_block = rest.find("{%");
        let (start, open, close) = match (next_expr, next_block) {
            (None, None) => break,
            (Some(e), Some(b)) if b < e => (b, "{%", "%}"),
            (Some(e), _) => (e, "{{", "}}"),
            (None, Some(b)) => (b, "{%", "%}"),
        };

        if let Some(stray) = rest[..start].find("}}") {
            return Err(format!("unmatched '}}}}' at offset {}", offset + stray));
        }

        let body_start = start + open.len();
        let Some(len) = rest[body_start..].find(close) else {
            return Err(format!("'{open}' at offset {} is never closed", offset + start));
        };
        let body = &rest[body_start..body_start + len];
        if body.contains(open) {
            return Err(format!(
                "'{open}' at offset {} is nested inside another marker",
                offset + start
            ));
        }
        if body.trim().is_empty() {
            return Err(format!("empty '{open}{close}' marker at offset {}", offset + start));
        }
        if open == "{{" {
            interpolations += 1;
        }

        let consumed = body_start + len + close.len();
        rest = &rest[consumed..];
        offset += consumed;
    }

    if let Some(stray) = rest.find("}}") {
        return Err(format!("unmatched '}}}}' at offset {}", offset + stray));
    }
    if interpolations == 0 {
        return Err("template has no '{{ }}' interpolation markers".to_string());
    }
    Ok(interpolations)
}
