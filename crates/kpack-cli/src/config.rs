//! # CLI Configuration
//!
//! Optional YAML configuration for `kpack`. Lookup order: `--config`, then
//! the `KPACK_CONFIG` environment variable, then `kpack.yaml` in the
//! current directory. Command-line flags override every value here.
//!
//! ```yaml
//! strict: true
//! format: json
//! jobs: 4
//! ignore: [UnknownField, UnusedEnvVar]
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use kpack_core::IssueCode;
use kpack_pack::ValidationOptions;
use serde::{Deserialize, Serialize};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "KPACK_CONFIG";

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kpack.yaml";

/// How reports are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned table and summary for terminals.
    #[default]
    Human,
    /// Pretty-printed JSON for automation.
    Json,
}

/// Settings read from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Fail on warnings.
    pub strict: bool,
    /// Default output format.
    pub format: Option<OutputFormat>,
    /// Worker threads for collection validation.
    pub jobs: Option<usize>,
    /// Issue codes to drop from every report.
    pub ignore: Vec<IssueCode>,
}

impl CliConfig {
    /// Locate and load the configuration. No file anywhere is the default
    /// configuration; a named file that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("cannot determine the working directory")?;
        match Self::locate(explicit, std::env::var_os(CONFIG_ENV), &cwd) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve which file to read, if any.
    pub fn locate(explicit: Option<&Path>, env: Option<OsString>, cwd: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = env.filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let local = cwd.join(DEFAULT_CONFIG_FILE);
        local.is_file().then_some(local)
    }

    /// Read one configuration file. An empty file is the default
    /// configuration.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Parse configuration text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Pipeline options with the `--strict` flag applied on top.
    pub fn validation_options(&self, strict_flag: bool) -> ValidationOptions {
        self.ignore.iter().fold(
            ValidationOptions::new().strict(strict_flag || self.strict),
            |options, code| options.suppress(*code),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field() {
        let config = CliConfig::from_yaml(
            "strict: true\nformat: json\njobs: 3\nignore: [UnknownField, UnusedEnvVar]\n",
        )
        .unwrap();
        assert!(config.strict);
        assert_eq!(config.format, Some(OutputFormat::Json));
        assert_eq!(config.jobs, Some(3));
        assert_eq!(config.ignore, vec![IssueCode::UnknownField, IssueCode::UnusedEnvVar]);
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(CliConfig::from_yaml("  \n").unwrap(), CliConfig::default());
    }

    #[test]
    fn unknown_keys_and_codes_are_rejected() {
        assert!(CliConfig::from_yaml("stritc: true\n").is_err());
        assert!(CliConfig::from_yaml("ignore: [NotACode]\n").is_err());
    }

    #[test]
    fn strict_flag_or_config_enables_strict() {
        let config = CliConfig {
            ignore: vec![IssueCode::UnknownField],
            ..CliConfig::default()
        };
        let options = config.validation_options(true);
        assert!(options.strict);
        assert!(options.suppressed.contains(&IssueCode::UnknownField));

        let config = CliConfig {
            strict: true,
            ..CliConfig::default()
        };
        assert!(config.validation_options(false).strict);
    }

    #[test]
    fn lookup_prefers_flag_then_env_then_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let flag = PathBuf::from("/etc/kpack/flag.yaml");
        let env = OsString::from("/etc/kpack/env.yaml");

        assert_eq!(
            CliConfig::locate(Some(&flag), Some(env.clone()), dir.path()),
            Some(flag)
        );
        assert_eq!(
            CliConfig::locate(None, Some(env), dir.path()),
            Some(PathBuf::from("/etc/kpack/env.yaml"))
        );
        assert_eq!(CliConfig::locate(None, None, dir.path()), None);

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "strict: true\n").unwrap();
        let local = CliConfig::locate(None, Some(OsString::new()), dir.path()).unwrap();
        assert!(CliConfig::from_path(&local).unwrap().strict);
    }

    #[test]
    fn unreadable_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::from_path(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config"));
    }
}
