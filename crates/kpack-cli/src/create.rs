//! # Create Subcommand
//!
//! Scaffolds a modular pack directory and validates what it wrote.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use kpack_pack::{PackBlueprint, PackValidator};
use kpack_schema::ConnectionType;

use crate::config::CliConfig;
use crate::output;
use crate::validate::{pack_exit_code, validate_single};

/// Arguments for the `kpack create` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Pack name, also the directory created under --output.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Directory to create the pack in.
    #[arg(long, short, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Connection type of the new pack (rest or database).
    #[arg(long, default_value = "rest", value_parser = parse_connection)]
    pub connection: ConnectionType,

    /// `metadata.domain`, a lowercase slug.
    #[arg(long)]
    pub domain: Option<String>,

    /// `metadata.vendor`.
    #[arg(long)]
    pub vendor: Option<String>,

    /// `metadata.description`.
    #[arg(long)]
    pub description: Option<String>,

    /// Literal base URL for REST packs. Defaults to ${API_BASE_URL}.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Database engine for database packs.
    #[arg(long)]
    pub engine: Option<String>,

    /// Write into an existing, non-empty directory.
    #[arg(long)]
    pub force: bool,
}

fn parse_connection(raw: &str) -> Result<ConnectionType, String> {
    raw.parse::<ConnectionType>().map_err(|e| e.to_string())
}

/// Execute the create subcommand.
pub fn run_create(args: &CreateArgs, config: &CliConfig) -> Result<u8> {
    let blueprint = blueprint(args);
    let files = blueprint.render()?;
    let dir = args.output.join(blueprint.name());

    write_files(&dir, &files, args.force)?;
    tracing::info!(pack = %blueprint.name(), dir = %dir.display(), "scaffolded pack");

    let validator = PackValidator::default().with_options(config.validation_options(false));
    let report = validate_single(&validator, &dir)?;

    println!("Created {}", dir.display());
    for path in files.keys() {
        println!("  {path}");
    }
    println!();
    print!("{}", output::human_report(&report));
    Ok(pack_exit_code(&report))
}

/// Build the blueprint the arguments describe.
pub fn blueprint(args: &CreateArgs) -> PackBlueprint {
    let mut blueprint = PackBlueprint::new(args.name.as_str(), args.connection);
    if let Some(domain) = &args.domain {
        blueprint = blueprint.domain(domain.as_str());
    }
    if let Some(vendor) = &args.vendor {
        blueprint = blueprint.vendor(vendor.as_str());
    }
    if let Some(description) = &args.description {
        blueprint = blueprint.description(description.as_str());
    }
    if let Some(base_url) = &args.base_url {
        blueprint = blueprint.base_url(base_url.as_str());
    }
    if let Some(engine) = &args.engine {
        blueprint = blueprint.engine(engine.as_str());
    }
    blueprint
}

/// Write rendered files below `dir`. Refuses a non-empty `dir` unless
/// `force` is set.
pub fn write_files(dir: &Path, files: &BTreeMap<String, String>, force: bool) -> Result<()> {
    if !force && dir.is_dir() {
        let occupied = fs::read_dir(dir)
            .with_context(|| format!("failed to read {}", dir.display()))?
            .next()
            .is_some();
        if occupied {
            anyhow::bail!(
                "{} already exists and is not empty; pass --force to write into it",
                dir.display()
            );
        }
    }

    for (rel, text) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(file = %path.display(), "wrote");
    }
    Ok(())
}
