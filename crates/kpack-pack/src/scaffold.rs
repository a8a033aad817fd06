//! # Pack Scaffolding
//!
//! Renders a new modular pack: `pack.yaml` with `structure` pointers, one
//! fragment each under `tools/`, `prompts/` and `resources/`, a transform
//! script, a README and an `.env.example`. Database packs also get a
//! read-only `guardrails.yaml`.
//!
//! Rendering is pure. [`PackBlueprint::render`] returns relative path to
//! file text; the caller decides where (and whether) to write it. A
//! rendered pack validates with no issues.

use std::collections::BTreeMap;

use kpack_schema::{ConnectionType, Vocabulary};
use serde_json::{json, Map, Value};

use crate::error::{PackError, PackResult};
use crate::loader::{MemoryLoader, PRIMARY_DOCUMENT};
use crate::template::is_pack_name;

/// Connection types with a scaffold blueprint.
pub const SCAFFOLD_CONNECTIONS: &[ConnectionType] = &[ConnectionType::Rest, ConnectionType::Database];

const TOOLS_FILE: &str = "tools/example-tools.yaml";
const PROMPTS_FILE: &str = "prompts/analysis-prompts.yaml";
const RESOURCES_FILE: &str = "resources/documentation.yaml";
const TRANSFORM_FILE: &str = "transforms/transform.py";

/// Inputs of a new pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackBlueprint {
    name: String,
    connection: ConnectionType,
    version: String,
    description: Option<String>,
    vendor: String,
    domain: String,
    base_url: Option<String>,
    engine: String,
}

impl PackBlueprint {
    /// A blueprint with the defaults: version 1.0.0, vendor `Community`,
    /// domain `general`, PostgreSQL for database packs.
    pub fn new(name: impl Into<String>, connection: ConnectionType) -> Self {
        Self {
            name: name.into(),
            connection,
            version: "1.0.0".to_string(),
            description: None,
            vendor: "Community".to_string(),
            domain: "general".to_string(),
            base_url: None,
            engine: "postgresql".to_string(),
        }
    }

    /// The pack name, which is also its directory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set `metadata.version`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set `metadata.description`.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set `metadata.vendor`.
    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Set `metadata.domain`.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Use a literal base URL instead of `${API_BASE_URL}`. REST only.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the database engine. Database only.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Render every file of the pack.
    pub fn render(&self) -> PackResult<BTreeMap<String, String>> {
        if !is_pack_name(&self.name) {
            return Err(PackError::InvalidPackName {
                name: self.name.clone(),
            });
        }
        if !SCAFFOLD_CONNECTIONS.contains(&self.connection) {
            return Err(PackError::UnsupportedScaffold {
                connection: self.connection.as_str().to_string(),
                supported: ConnectionType::joined(SCAFFOLD_CONNECTIONS),
            });
        }

        let env = self.environment();
        let mut files = BTreeMap::new();
        files.insert(PRIMARY_DOCUMENT.to_string(), yaml(&self.primary(&env))?);
        files.insert(TOOLS_FILE.to_string(), yaml(&json!({ "tools": self.tools() }))?);
        files.insert(PROMPTS_FILE.to_string(), yaml(&self.prompts())?);
        files.insert(RESOURCES_FILE.to_string(), yaml(&self.resources())?);
        files.insert(TRANSFORM_FILE.to_string(), self.transform_script());
        if self.connection == ConnectionType::Database {
            files.insert("guardrails.yaml".to_string(), yaml(&read_only_policy())?);
        }
        files.insert("README.md".to_string(), self.readme(&env));
        files.insert(".env.example".to_string(), self.env_example(&env));

        tracing::debug!(pack = %self.name, files = files.len(), "rendered scaffold");
        Ok(files)
    }

    /// Render into an in-memory loader named after the pack.
    pub fn to_loader(&self) -> PackResult<MemoryLoader> {
        let loader = self
            .render()?
            .into_iter()
            .fold(MemoryLoader::named(self.name.as_str()), |loader, (path, text)| {
                loader.with_file(path, text)
            });
        Ok(loader)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Environment variables the pack references, with an example value
    /// and a description.
    fn environment(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        let mut vars = Vec::new();
        match self.connection {
            ConnectionType::Database => {
                vars.push(("DB_HOST", "localhost", "Database host"));
                vars.push(("DB_NAME", "your_database", "Database name"));
                vars.push(("DB_USER", "your_username", "Database user"));
                vars.push(("DB_PASSWORD", "your_password", "Database password"));
            }
            _ => {
                if self.base_url.is_none() {
                    vars.push(("API_BASE_URL", "https://api.example.com", "Base URL of the API"));
                }
                vars.push(("API_TOKEN", "your_api_token_here", "Bearer token for the API"));
            }
        }
        vars.push(("DOCS_URL", "https://docs.example.com", "Upstream documentation"));
        vars
    }

    fn primary(&self, env: &[(&str, &str, &str)]) -> Value {
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("{} integration pack", self.name));
        let environment: Map<String, Value> = env
            .iter()
            .map(|(name, _, about)| (name.to_string(), json!(about)))
            .collect();

        json!({
            "metadata": {
                "name": self.name,
                "version": self.version,
                "description": description,
                "vendor": self.vendor,
                "domain": self.domain,
                "compatibility": "2.0.0",
                "license": "MIT",
                "tags": [self.connection.as_str(), self.domain.replace('_', "-")],
            },
            "connection": self.connection_block(),
            "environment": environment,
            "structure": {
                "tools": "./tools/",
                "prompts": "./prompts/",
                "resources": "./resources/",
                "transforms": "./transforms/",
            },
        })
    }

    fn connection_block(&self) -> Value {
        match self.connection {
            ConnectionType::Database => json!({
                "type": "database",
                "engine": self.engine,
                "host": "${DB_HOST}",
                "port": default_port(&self.engine),
                "database": "${DB_NAME}",
                "auth": {
                    "method": "basic",
                    "username": "${DB_USER}",
                    "password": "${DB_PASSWORD}",
                },
            }),
            _ => json!({
                "type": "rest",
                "base_url": self.base_url.as_deref().unwrap_or("${API_BASE_URL}"),
                "timeout": 30,
                "auth": {"method": "bearer", "token": "${API_TOKEN}"},
                "retry_policy": {"max_attempts": 3, "backoff": "exponential"},
            }),
        }
    }

    fn tools(&self) -> Value {
        let transform = json!({
            "engine": "python",
            "file": TRANSFORM_FILE,
            "function": "transform_response",
        });
        match self.connection {
            ConnectionType::Database => json!({
                "query_table": {
                    "type": "query",
                    "description": "Read rows from one table",
                    "sql": "SELECT * FROM {table} LIMIT {limit}",
                    "parameters": [
                        {"name": "table", "type": "string", "required": true, "description": "Table to read"},
                        {"name": "limit", "type": "integer", "required": false, "default": 100,
                         "min_value": 1, "max_value": 1000, "description": "Maximum rows to return"},
                    ],
                    "transform": transform,
                },
                "list_tables": {
                    "type": "query",
                    "description": "List the tables of the public schema",
                    "sql": "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
                },
            }),
            _ => json!({
                "list_items": {
                    "type": "list",
                    "description": "List items from the API",
                    "endpoint": "/items",
                    "method": "GET",
                    "parameters": [
                        {"name": "limit", "type": "integer", "required": false, "default": 20,
                         "min_value": 1, "location": "query", "description": "Maximum items to return"},
                    ],
                    "transform": transform,
                },
                "get_item": {
                    "type": "details",
                    "description": "Fetch one item by its id",
                    "endpoint": "/items/{item_id}",
                    "method": "GET",
                    "parameters": [
                        {"name": "item_id", "type": "string", "required": true, "location": "path"},
                    ],
                },
                "search_items": {
                    "type": "search",
                    "description": "Search items by query",
                    "endpoint": "/search",
                    "method": "POST",
                    "parameters": [
                        {"name": "query", "type": "string", "required": true, "location": "body",
                         "description": "Search query"},
                    ],
                },
            }),
        }
    }

    fn prompts(&self) -> Value {
        json!({
            "prompts": {
                "data_analyst": {
                    "name": "Data Analysis Assistant",
                    "description": format!("Assistant for analysing {} data", self.name),
                    "template": format!(
                        "You are an expert data analyst for the {} integration. \
                         Use its tools to answer: {{question}}",
                        self.name
                    ),
                    "variables": ["question"],
                },
            },
        })
    }

    fn resources(&self) -> Value {
        json!({
            "resources": {
                "api_documentation": {
                    "name": format!("{} documentation", self.name),
                    "type": "documentation",
                    "description": format!("Upstream documentation for {}", self.name),
                    "url": "${DOCS_URL}",
                },
            },
        })
    }

    // -----------------------------------------------------------------------
    // Plain-text files
    // -----------------------------------------------------------------------

    fn transform_script(&self) -> String {
        format!(
            "\"\"\"Transforms for the {name} pack.\"\"\"\n\n\n\
             def transform_response(data):\n    \"\"\"Shape a response before it reaches the agent.\"\"\"\n    return data\n",
            name = self.name
        )
    }

    fn readme(&self, env: &[(&str, &str, &str)]) -> String {
        let mut out = format!(
            "# {name}\n\n{description}\n\n\
             - Version: {version}\n- Domain: {domain}\n- Vendor: {vendor}\n- Connection: {connection}\n\n\
             ## Environment\n\n",
            name = self.name,
            description = self
                .description
                .clone()
                .unwrap_or_else(|| format!("{} integration pack", self.name)),
            version = self.version,
            domain = self.domain,
            vendor = self.vendor,
            connection = self.connection,
        );
        for (var, _, about) in env {
            out.push_str(&format!("- `{var}`: {about}\n"));
        }
        out.push_str("\n## Tools\n\n");
        if let Value::Object(tools) = self.tools() {
            for (name, tool) in &tools {
                let about = tool.get("description").and_then(Value::as_str).unwrap_or_default();
                out.push_str(&format!("- `{name}`: {about}\n"));
            }
        }
        out.push_str(&format!(
            "\n## Layout\n\n```\n{name}/\n  pack.yaml\n  tools/\n  prompts/\n  resources/\n  transforms/\n```\n\n\
             Validate with `kpack validate {name}`.\n",
            name = self.name
        ));
        out
    }

    fn env_example(&self, env: &[(&str, &str, &str)]) -> String {
        let mut out = format!("# Environment for the {} pack. Copy to .env and fill in.\n\n", self.name);
        for (var, example, _) in env {
            out.push_str(&format!("{var}={example}\n"));
        }
        out
    }
}

fn default_port(engine: &str) -> u16 {
    match engine {
        "mysql" | "mariadb" => 3306,
        "sqlserver" | "mssql" => 1433,
        _ => 5432,
    }
}

fn read_only_policy() -> Value {
    json!({
        "version": "1.0",
        "description": "Read-only database access",
        "blocked_patterns": {
            "destructive_statements": {
                "enabled": true,
                "patterns": [
                    "(?i)\\bDROP\\s+(TABLE|DATABASE)\\b",
                    "(?i)\\bTRUNCATE\\b",
                    "(?i)\\bDELETE\\s+FROM\\b",
                ],
                "message": "Destructive statements are not allowed",
                "severity": "critical",
            },
        },
        "warning_patterns": {
            "unbounded_read": {
                "enabled": true,
                "patterns": ["(?i)SELECT\\s+\\*"],
                "message": "Unbounded read",
                "severity": "medium",
            },
        },
        "auto_modifications": {
            "add_limit": {
                "enabled": true,
                "conditions": ["no_limit_specified"],
                "action": "add_limit",
                "value": 1000,
            },
        },
    })
}

fn yaml(value: &Value) -> PackResult<String> {
    Ok(serde_yaml::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{validate_pack, ValidationOptions};

    fn validate(blueprint: &PackBlueprint) -> crate::report::Report {
        validate_pack(&blueprint.to_loader().unwrap(), ValidationOptions::new().strict(true)).unwrap()
    }

    #[test]
    fn rest_scaffold_validates_clean() {
        let report = validate(&PackBlueprint::new("blog-api", ConnectionType::Rest));
        assert!(report.issues.is_empty(), "{:#?}", report.issues);
        assert!(report.is_valid());
        assert_eq!(report.pack.as_deref(), Some("blog-api"));
    }

    #[test]
    fn database_scaffold_validates_clean() {
        let blueprint = PackBlueprint::new("orders-db", ConnectionType::Database)
            .engine("mysql")
            .domain("sales")
            .vendor("Example Inc");
        let report = validate(&blueprint);
        assert!(report.issues.is_empty(), "{:#?}", report.issues);
    }

    #[test]
    fn literal_base_url_drops_its_variable() {
        let blueprint = PackBlueprint::new("blog-api", ConnectionType::Rest)
            .base_url("https://jsonplaceholder.typicode.com")
            .description("Blog posts");
        let files = blueprint.render().unwrap();
        assert!(!files[PRIMARY_DOCUMENT].contains("API_BASE_URL"));
        assert!(!files[".env.example"].contains("API_BASE_URL"));
        assert!(files["README.md"].contains("Blog posts"));
        assert!(validate(&blueprint).issues.is_empty());
    }

    #[test]
    fn rendered_layout_is_modular() {
        let files = PackBlueprint::new("crm", ConnectionType::Rest).render().unwrap();
        let paths: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                ".env.example",
                "README.md",
                "pack.yaml",
                "prompts/analysis-prompts.yaml",
                "resources/documentation.yaml",
                "tools/example-tools.yaml",
                "transforms/transform.py",
            ]
        );
    }

    #[test]
    fn database_scaffold_carries_a_policy() {
        let files = PackBlueprint::new("orders", ConnectionType::Database).render().unwrap();
        assert!(files["guardrails.yaml"].contains("destructive_statements"));
        assert!(files[PRIMARY_DOCUMENT].contains("5432"));
    }

    #[test]
    fn unsupported_connection_is_refused() {
        let err = PackBlueprint::new("box", ConnectionType::Ssh).render().unwrap_err();
        assert!(matches!(err, PackError::UnsupportedScaffold { .. }));
        assert!(err.to_string().contains("rest, database"));
    }

    #[test]
    fn path_like_name_is_refused() {
        let err = PackBlueprint::new("../escape", ConnectionType::Rest).render().unwrap_err();
        assert!(matches!(err, PackError::InvalidPackName { .. }));
    }
}
