//! # Document Parser
//!
//! Turns the raw text supplied by a [`PackLoader`] into one merged
//! [`PackDocument`].
//!
//! ## Two-Phase Build
//!
//! 1. **Collect.** Every structural pointer (`structure.tools: ./tools/`) is
//!    resolved through the loader and each fragment is parsed on its own
//!    into a [`FragmentSet`] keyed by section and fragment name. A malformed
//!    fragment contributes a `MalformedDocument` issue and nothing else.
//!
//! 2. **Fold.** Inline sections of the primary document come first, then
//!    fragments in name order. The first declaration of a name wins and
//!    every later one is a `DuplicateToolName` (or prompt/resource) issue.
//!    Because the fragment set is ordered by name, the merged document does
//!    not depend on the order in which fragments were loaded.
//!
//! YAML is converted to `serde_json::Value` so the rest of the pipeline
//! works with one value model.

use std::collections::{BTreeMap, BTreeSet};

use kpack_core::{EntityPath, Issue, IssueCode};
use serde_json::{Map, Value};

use crate::document::{type_name, NamedEntry, Origin, PackDocument};
use crate::error::PackResult;
use crate::loader::{normalize_pointer, PackLoader, GUARDRAIL_DOCUMENTS, PRIMARY_DOCUMENT};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// A section of the pack that may be split into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// `tools`
    Tools,
    /// `prompts`
    Prompts,
    /// `resources`
    Resources,
    /// `transforms`: script files referenced by tool transforms.
    Transforms,
}

impl Section {
    /// All sections.
    pub fn all() -> &'static [Section] {
        &[Self::Tools, Self::Prompts, Self::Resources, Self::Transforms]
    }

    /// The YAML key of this section.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Prompts => "prompts",
            Self::Resources => "resources",
            Self::Transforms => "transforms",
        }
    }

    /// Look a section up by its YAML key.
    pub fn parse(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.key() == key)
    }

    fn singular(&self) -> &'static str {
        match self {
            Self::Tools => "tool",
            Self::Prompts => "prompt",
            Self::Resources => "resource",
            Self::Transforms => "transform",
        }
    }

    fn duplicate_code(&self) -> IssueCode {
        match self {
            Self::Prompts => IssueCode::DuplicatePromptName,
            Self::Resources => IssueCode::DuplicateResourceName,
            Self::Tools | Self::Transforms => IssueCode::DuplicateToolName,
        }
    }

    /// Whether fragments of this section are YAML documents.
    fn is_yaml(&self) -> bool {
        !matches!(self, Self::Transforms)
    }
}

// ---------------------------------------------------------------------------
// Fragment collection
// ---------------------------------------------------------------------------

/// Parsed fragments, keyed by section and fragment name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentSet {
    documents: BTreeMap<Section, BTreeMap<String, Value>>,
    transform_files: Option<BTreeSet<String>>,
}

impl FragmentSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed YAML fragment. A second insert under the same name
    /// replaces the first; the same file reached through two pointers is
    /// still one fragment.
    pub fn insert(&mut self, section: Section, name: impl Into<String>, document: Value) {
        self.documents
            .entry(section)
            .or_default()
            .insert(name.into(), document);
    }

    /// Record that the pack declares a `structure.transforms` pointer.
    pub fn declare_transforms(&mut self) {
        self.transform_files.get_or_insert_with(BTreeSet::new);
    }

    /// Record a transform script file.
    pub fn insert_transform_file(&mut self, name: impl Into<String>) {
        self.transform_files
            .get_or_insert_with(BTreeSet::new)
            .insert(name.into());
    }

    /// Fragments of one section, in name order.
    pub fn documents(&self, section: Section) -> impl Iterator<Item = (&str, &Value)> {
        self.documents
            .get(&section)
            .into_iter()
            .flat_map(|docs| docs.iter().map(|(name, doc)| (name.as_str(), doc)))
    }

    /// Transform script files, when `structure.transforms` is declared.
    pub fn transform_files(&self) -> Option<&BTreeSet<String>> {
        self.transform_files.as_ref()
    }
}

/// Result of parsing one pack.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// The merged document; `None` when the primary document itself could
    /// not be parsed.
    pub document: Option<PackDocument>,
    /// Parse-stage issues, in discovery order.
    pub issues: Vec<Issue>,
}

/// Parse and merge one pack.
///
/// Returns `Err` only when the loader fails. Every problem with the pack
/// text is an issue in the outcome.
#[tracing::instrument(skip_all, fields(pack = ?loader.logical_name()))]
pub fn parse_pack(loader: &dyn PackLoader) -> PackResult<ParseOutcome> {
    let mut issues = Vec::new();

    let text = loader.primary()?;
    let Some(primary) = parse_primary(&text, &mut issues) else {
        tracing::debug!(issues = issues.len(), "primary document unusable");
        return Ok(ParseOutcome {
            document: None,
            issues,
        });
    };

    let fragments = collect_fragments(&primary, loader, &mut issues)?;
    let guardrails = load_guardrails(loader, &mut issues)?;
    let document = fold(loader.logical_name(), primary, &fragments, guardrails, &mut issues);

    tracing::debug!(
        tools = document.tools.len(),
        prompts = document.prompts.len(),
        resources = document.resources.len(),
        issues = issues.len(),
        "parsed pack"
    );

    Ok(ParseOutcome {
        document: Some(document),
        issues,
    })
}

/// Parse one YAML text into a JSON value.
///
/// A syntax error becomes a `MalformedDocument` issue located at `source`.
pub fn parse_yaml(source: &str, text: &str) -> Result<Value, Issue> {
    serde_yaml::from_str::<serde_yaml::Value>(text)
        .map(yaml_to_json_value)
        .map_err(|e| {
            Issue::error(
                IssueCode::MalformedDocument,
                source,
                format!("{source} is not valid YAML: {e}"),
            )
        })
}

fn parse_primary(text: &str, issues: &mut Vec<Issue>) -> Option<Map<String, Value>> {
    match parse_yaml(PRIMARY_DOCUMENT, text) {
        Err(issue) => {
            issues.push(issue);
            None
        }
        Ok(Value::Null) => {
            issues.push(
                Issue::error(
                    IssueCode::EmptyDocument,
                    PRIMARY_DOCUMENT,
                    "pack.yaml is empty",
                )
                .with_recommendation("declare at least metadata, connection and tools"),
            );
            None
        }
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            issues.push(Issue::error(
                IssueCode::InvalidType,
                PRIMARY_DOCUMENT,
                format!("pack.yaml must be a mapping, found {}", type_name(&other)),
            ));
            None
        }
    }
}

/// Resolve every structural pointer of the primary document and parse the
/// fragments behind it.
///
/// Pointer values of the wrong type are left to the structural pass.
pub fn collect_fragments(
    primary: &Map<String, Value>,
    loader: &dyn PackLoader,
    issues: &mut Vec<Issue>,
) -> PackResult<FragmentSet> {
    let mut set = FragmentSet::new();
    let Some(structure) = primary.get("structure").and_then(Value::as_object) else {
        return Ok(set);
    };

    let base = EntityPath::new("structure");
    for (key, value) in structure {
        let Some(section) = Section::parse(key) else {
            continue;
        };
        let path = base.field(key);
        let pointers: Vec<(EntityPath, &str)> = match value {
            Value::String(s) => vec![(path.clone(), s.as_str())],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_str().map(|s| (path.index(i), s)))
                .collect(),
            _ => continue,
        };

        if section == Section::Transforms {
            set.declare_transforms();
        }

        for (pointer_path, raw) in pointers {
            let Some(pointer) = normalize_pointer(raw) else {
                issues.push(
                    Issue::error(
                        IssueCode::InvalidFragment,
                        pointer_path,
                        format!("pointer {raw:?} must be a relative path inside the pack"),
                    )
                    .with_recommendation("use a path such as ./tools/ relative to pack.yaml"),
                );
                continue;
            };

            let Some(files) = loader.fragments(&pointer)? else {
                issues.push(
                    Issue::error(
                        IssueCode::MissingFragment,
                        pointer_path,
                        format!("{} fragment {raw:?} does not exist", section.singular()),
                    )
                    .with_recommendation(format!(
                        "create {raw} or remove it from structure.{}",
                        section.key()
                    )),
                );
                continue;
            };

            for file in files {
                tracing::trace!(fragment = %file.name, section = section.key(), "loaded fragment");
                if !section.is_yaml() {
                    set.insert_transform_file(file.name);
                    continue;
                }
                if !is_yaml_file(&file.name) {
                    if file.name == pointer {
                        issues.push(Issue::warning(
                            IssueCode::InvalidFragment,
                            pointer_path.clone(),
                            format!("fragment {} is not a YAML file and was skipped", file.name),
                        ));
                    }
                    continue;
                }
                parse_fragment(section, file.name, &file.text, &mut set, issues);
            }
        }
    }

    Ok(set)
}

fn parse_fragment(
    section: Section,
    name: String,
    text: &str,
    set: &mut FragmentSet,
    issues: &mut Vec<Issue>,
) {
    match parse_yaml(&name, text) {
        Err(issue) => issues.push(issue),
        Ok(Value::Null) => issues.push(Issue::warning(
            IssueCode::InvalidFragment,
            name.as_str(),
            format!("fragment {name} is empty"),
        )),
        Ok(doc @ Value::Object(_)) => set.insert(section, name, doc),
        Ok(other) => issues.push(Issue::error(
            IssueCode::InvalidFragment,
            name.as_str(),
            format!(
                "fragment {name} must be a mapping with a `{}` key, found {}",
                section.key(),
                type_name(&other)
            ),
        )),
    }
}

fn is_yaml_file(name: &str) -> bool {
    name.ends_with(".yaml") || name.ends_with(".yml")
}

fn load_guardrails(loader: &dyn PackLoader, issues: &mut Vec<Issue>) -> PackResult<Option<Value>> {
    let Some(text) = loader.guardrails()? else {
        return Ok(None);
    };
    let source = GUARDRAIL_DOCUMENTS[0];

    Ok(match parse_yaml(source, &text) {
        Err(issue) => {
            issues.push(issue);
            None
        }
        Ok(Value::Null) => {
            issues.push(Issue::warning(
                IssueCode::EmptyDocument,
                source,
                "guardrails.yaml is empty; no policy will be applied",
            ));
            None
        }
        Ok(Value::Object(mut map)) => {
            // A policy may be wrapped in a single top-level `guardrails:` key.
            let wrapped = map.len() == 1 && map.get("guardrails").is_some_and(Value::is_object);
            if wrapped {
                map.remove("guardrails")
            } else {
                Some(Value::Object(map))
            }
        }
        Ok(other) => {
            issues.push(Issue::error(
                IssueCode::InvalidType,
                source,
                format!("guardrails.yaml must be a mapping, found {}", type_name(&other)),
            ));
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

/// Fold the primary document and its fragments into one document.
pub fn fold(
    logical_name: Option<String>,
    primary: Map<String, Value>,
    fragments: &FragmentSet,
    guardrails: Option<Value>,
    issues: &mut Vec<Issue>,
) -> PackDocument {
    let tools_pointer = primary
        .get("structure")
        .and_then(|s| s.get("tools"))
        .is_some_and(|p| !p.is_null());

    let mut root = Map::new();
    let mut inline: BTreeMap<Section, Value> = BTreeMap::new();
    for (key, value) in primary {
        match Section::parse(&key).filter(Section::is_yaml) {
            Some(section) => {
                inline.insert(section, value);
            }
            None => {
                root.insert(key, value);
            }
        }
    }

    let tools = merge_section(Section::Tools, inline.remove(&Section::Tools), fragments, issues);
    let prompts = merge_section(Section::Prompts, inline.remove(&Section::Prompts), fragments, issues);
    let resources = merge_section(
        Section::Resources,
        inline.remove(&Section::Resources),
        fragments,
        issues,
    );

    PackDocument {
        logical_name,
        root,
        tools_pointer,
        tools,
        prompts,
        resources,
        transform_files: fragments.transform_files().cloned(),
        guardrails,
    }
}

fn merge_section(
    section: Section,
    inline: Option<Value>,
    fragments: &FragmentSet,
    issues: &mut Vec<Issue>,
) -> Vec<NamedEntry> {
    let mut merged = Merge {
        section,
        entries: Vec::new(),
        seen: BTreeMap::new(),
    };

    match inline {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, body) in map {
                merged.add(name, Origin::Primary, body, issues);
            }
        }
        Some(other) => issues.push(Issue::error(
            IssueCode::InvalidType,
            section.key(),
            format!(
                "`{}` must be a mapping of {} name to definition, found {}",
                section.key(),
                section.singular(),
                type_name(&other)
            ),
        )),
    }

    for (fragment, doc) in fragments.documents(section) {
        match doc.get(section.key()) {
            Some(Value::Object(map)) => {
                for (name, body) in map {
                    merged.add(
                        name.clone(),
                        Origin::Fragment(fragment.to_string()),
                        body.clone(),
                        issues,
                    );
                }
            }
            None | Some(Value::Null) => issues.push(Issue::warning(
                IssueCode::InvalidFragment,
                fragment,
                format!("fragment {fragment} declares no {}", section.key()),
            )),
            Some(other) => issues.push(Issue::error(
                IssueCode::InvalidFragment,
                fragment,
                format!(
                    "`{}` in fragment {fragment} must be a mapping, found {}",
                    section.key(),
                    type_name(other)
                ),
            )),
        }
    }

    merged.entries
}

struct Merge {
    section: Section,
    entries: Vec<NamedEntry>,
    seen: BTreeMap<String, Origin>,
}

impl Merge {
    fn add(&mut self, name: String, origin: Origin, body: Value, issues: &mut Vec<Issue>) {
        if let Some(first) = self.seen.get(&name) {
            issues.push(
                Issue::error(
                    self.section.duplicate_code(),
                    EntityPath::new(self.section.key()).field(&name),
                    format!(
                        "{} '{name}' is declared in both {first} and {origin}",
                        self.section.singular()
                    ),
                )
                .with_recommendation(format!(
                    "rename or remove one declaration; the one in {first} is used"
                )),
            );
            return;
        }
        self.seen.insert(name.clone(), origin.clone());
        self.entries
            .push(NamedEntry::new(self.section.key(), name, origin, body));
    }
}

// ---------------------------------------------------------------------------
// YAML to JSON
// ---------------------------------------------------------------------------

/// Convert a serde_yaml::Value to a serde_json::Value.
///
/// Tags are stripped. Non-string mapping keys are stringified. Non-finite
/// floats become `null`.
pub fn yaml_to_json_value(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json_value).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    other => format!("{other:?}"),
                };
                obj.insert(key, yaml_to_json_value(v));
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    const PRIMARY: &str = r#"
metadata:
  name: demo
connection:
  type: rest
  base_url: https://api.example.com
tools:
  list_posts:
    type: list
    description: List posts
    endpoint: /posts
structure:
  tools: ./tools/
"#;

    fn codes(issues: &[Issue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn malformed_primary_yields_no_document() {
        let loader = MemoryLoader::from_primary("metadata: [unclosed");
        let outcome = parse_pack(&loader).unwrap();
        assert!(outcome.document.is_none());
        assert_eq!(codes(&outcome.issues), vec![IssueCode::MalformedDocument]);
    }

    #[test]
    fn empty_primary_is_empty_document() {
        let loader = MemoryLoader::from_primary("");
        let outcome = parse_pack(&loader).unwrap();
        assert!(outcome.document.is_none());
        assert_eq!(codes(&outcome.issues), vec![IssueCode::EmptyDocument]);
    }

    #[test]
    fn scalar_primary_is_invalid_type() {
        let loader = MemoryLoader::from_primary("just a string");
        let outcome = parse_pack(&loader).unwrap();
        assert_eq!(codes(&outcome.issues), vec![IssueCode::InvalidType]);
    }

    #[test]
    fn fragments_merge_after_inline_tools() {
        let loader = MemoryLoader::from_primary(PRIMARY)
            .with_file("tools/b.yaml", "tools:\n  get_post:\n    type: details\n")
            .with_file("tools/a.yaml", "tools:\n  search_posts:\n    type: search\n");
        let outcome = parse_pack(&loader).unwrap();
        assert!(outcome.issues.is_empty(), "{:?}", outcome.issues);
        let doc = outcome.document.unwrap();
        let names: Vec<_> = doc.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_posts", "search_posts", "get_post"]);
        assert_eq!(
            doc.tools[1].origin,
            Origin::Fragment("tools/a.yaml".to_string())
        );
        assert!(doc.root.get("tools").is_none());
        assert!(doc.tools_pointer);
    }

    #[test]
    fn duplicate_between_primary_and_fragment_is_reported_once() {
        let loader = MemoryLoader::from_primary(PRIMARY)
            .with_file("tools/dup.yaml", "tools:\n  list_posts:\n    type: list\n");
        let outcome = parse_pack(&loader).unwrap();
        assert_eq!(codes(&outcome.issues), vec![IssueCode::DuplicateToolName]);
        let issue = &outcome.issues[0];
        assert_eq!(issue.path.as_str(), "tools.list_posts");
        assert!(issue.message.contains("pack.yaml"));
        assert!(issue.message.contains("tools/dup.yaml"));
        assert_eq!(outcome.document.unwrap().tools.len(), 1);
    }

    #[test]
    fn missing_fragment_keeps_section_empty_and_continues() {
        let loader = MemoryLoader::from_primary(PRIMARY);
        let outcome = parse_pack(&loader).unwrap();
        assert_eq!(codes(&outcome.issues), vec![IssueCode::MissingFragment]);
        assert_eq!(outcome.issues[0].path.as_str(), "structure.tools");
        assert_eq!(outcome.document.unwrap().tools.len(), 1);
    }

    #[test]
    fn malformed_fragment_aborts_only_that_fragment() {
        let loader = MemoryLoader::from_primary(PRIMARY)
            .with_file("tools/bad.yaml", "tools: {unclosed: [")
            .with_file("tools/good.yaml", "tools:\n  get_post:\n    type: details\n");
        let outcome = parse_pack(&loader).unwrap();
        assert_eq!(codes(&outcome.issues), vec![IssueCode::MalformedDocument]);
        assert_eq!(outcome.issues[0].path.as_str(), "tools/bad.yaml");
        let doc = outcome.document.unwrap();
        assert!(doc.tool("get_post").is_some());
    }

    #[test]
    fn escaping_pointer_is_rejected_before_loading() {
        let loader = MemoryLoader::from_primary(
            "metadata: {name: demo}\nstructure:\n  tools: ../../etc/\n",
        );
        let outcome = parse_pack(&loader).unwrap();
        assert_eq!(codes(&outcome.issues), vec![IssueCode::InvalidFragment]);
    }

    #[test]
    fn transform_pointer_records_script_files() {
        let loader = MemoryLoader::from_primary(
            "metadata: {name: demo}\nstructure:\n  transforms: ./transforms/\n",
        )
        .with_file("transforms/normalize.py", "def normalize(x):\n    return x\n");
        let doc = parse_pack(&loader).unwrap().document.unwrap();
        let files = doc.transform_files.unwrap();
        assert!(files.contains("transforms/normalize.py"));
    }

    #[test]
    fn wrapped_guardrails_are_unwrapped() {
        let loader = MemoryLoader::from_primary("metadata: {name: demo}\n").with_file(
            "guardrails.yaml",
            "guardrails:\n  blocked_patterns:\n    sql: {patterns: ['DROP']}\n",
        );
        let doc = parse_pack(&loader).unwrap().document.unwrap();
        let policy = doc.guardrails.unwrap();
        assert!(policy.get("blocked_patterns").is_some());
    }

    #[test]
    fn malformed_guardrails_do_not_block_the_pack() {
        let loader = MemoryLoader::from_primary("metadata: {name: demo}\n")
            .with_file("guardrails.yaml", "blocked_patterns: [");
        let outcome = parse_pack(&loader).unwrap();
        assert_eq!(codes(&outcome.issues), vec![IssueCode::MalformedDocument]);
        let doc = outcome.document.unwrap();
        assert!(doc.guardrails.is_none());
    }

    #[test]
    fn yaml_numbers_and_keys_convert() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\nratio: 0.5\ncount: 3\n").unwrap();
        let json = yaml_to_json_value(yaml);
        assert_eq!(json["1"], "one");
        assert_eq!(json["ratio"], 0.5);
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn fold_is_independent_of_fragment_insert_order() {
        let a = serde_json::json!({"tools": {"a_tool": {"type": "list"}}});
        let b = serde_json::json!({"tools": {"b_tool": {"type": "list"}}});
        let mut forward = FragmentSet::new();
        forward.insert(Section::Tools, "tools/a.yaml", a.clone());
        forward.insert(Section::Tools, "tools/b.yaml", b.clone());
        let mut reverse = FragmentSet::new();
        reverse.insert(Section::Tools, "tools/b.yaml", b);
        reverse.insert(Section::Tools, "tools/a.yaml", a);
        assert_eq!(forward, reverse);

        let mut issues = Vec::new();
        let left = fold(None, Map::new(), &forward, None, &mut issues);
        let right = fold(None, Map::new(), &reverse, None, &mut issues);
        assert_eq!(left, right);
        assert!(issues.is_empty());
    }
}
