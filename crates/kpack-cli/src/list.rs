//! # List Subcommand
//!
//! Inventories every pack below a directory without validating it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use kpack_pack::{index_packs, PackIndex};

use crate::config::{CliConfig, OutputFormat};
use crate::output;
use crate::validate::{in_pool, pack_loaders};
use crate::EXIT_VALID;

/// Arguments for the `kpack list` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Directory to search for packs.
    #[arg(value_name = "DIR", default_value = ".")]
    pub path: PathBuf,

    /// Output format.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Worker threads. Defaults to available parallelism.
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,
}

/// Execute the list subcommand. Unreadable packs are listed, not fatal.
pub fn run_list(args: &ListArgs, config: &CliConfig) -> Result<u8> {
    let index = index_directory(&args.path, args.jobs.or(config.jobs))?;
    let rendered = match args.format.or(config.format).unwrap_or_default() {
        OutputFormat::Human => output::human_index(&index),
        OutputFormat::Json => output::json(&index)?,
    };
    println!("{}", rendered.trim_end());
    Ok(EXIT_VALID)
}

/// Index every pack below `root`.
pub fn index_directory(root: &Path, jobs: Option<usize>) -> Result<PackIndex> {
    let packs = pack_loaders(root)?;
    in_pool(jobs, || index_packs(packs))
}
