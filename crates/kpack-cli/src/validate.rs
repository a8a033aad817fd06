//! # Validate Subcommand
//!
//! Validates a single pack, or with `--all` every pack below a directory.
//!
//! ## Exit Codes
//!
//! Single pack: 0 valid, 1 invalid, 2 when no report could be produced.
//! Collection: 2 if any pack errored, else 1 if any pack is invalid, else 0.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use kpack_pack::{validate_collection, CollectionReport, PackValidator, Report};

use crate::config::{CliConfig, OutputFormat};
use crate::loader::{discover_packs, DirLoader};
use crate::output;
use crate::{EXIT_INVALID, EXIT_SYSTEM, EXIT_VALID};

/// Arguments for the `kpack validate` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Pack directory or its pack.yaml. With --all, a directory to search.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Treat warnings as failures.
    #[arg(long)]
    pub strict: bool,

    /// Output format. Defaults to the config file value, else human.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Validate every pack directory found under PATH.
    #[arg(long)]
    pub all: bool,

    /// Worker threads for --all. Defaults to available parallelism.
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,
}

/// Execute the validate subcommand, printing the rendered report to stdout.
pub fn run_validate(args: &ValidateArgs, config: &CliConfig) -> Result<u8> {
    let format = args.format.or(config.format).unwrap_or_default();
    let validator = PackValidator::default().with_options(config.validation_options(args.strict));

    let (rendered, code) = if args.all {
        let jobs = args.jobs.or(config.jobs);
        let report = validate_directory(&validator, &args.path, jobs)?;
        let rendered = match format {
            OutputFormat::Human => output::human_collection(&report),
            OutputFormat::Json => output::json(&report)?,
        };
        (rendered, collection_exit_code(&report))
    } else {
        let report = validate_single(&validator, &args.path)?;
        let rendered = match format {
            OutputFormat::Human => output::human_report(&report),
            OutputFormat::Json => output::json(&report)?,
        };
        (rendered, pack_exit_code(&report))
    };

    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(code)
}

/// Validate one pack directory.
pub fn validate_single(validator: &PackValidator<'_>, path: &Path) -> Result<Report> {
    let loader = DirLoader::open(path);
    validator
        .validate(&loader)
        .with_context(|| format!("cannot validate pack at {}", loader.root().display()))
}

/// Validate every pack under `root`, optionally on a dedicated pool of
/// `jobs` threads.
pub fn validate_directory(
    validator: &PackValidator<'_>,
    root: &Path,
    jobs: Option<usize>,
) -> Result<CollectionReport> {
    let packs = pack_loaders(root)?;
    in_pool(jobs, || validate_collection(validator, packs))
}

/// Loaders for every pack below `root`, named by relative path.
pub(crate) fn pack_loaders(root: &Path) -> Result<Vec<(String, DirLoader)>> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }
    let dirs = discover_packs(root)
        .with_context(|| format!("failed to scan {} for packs", root.display()))?;
    if dirs.is_empty() {
        tracing::warn!(root = %root.display(), "no packs found");
    }

    Ok(dirs
        .iter()
        .map(|dir| (display_name(dir, root), DirLoader::open(dir)))
        .collect())
}

/// Run `work` on a pool of `jobs` threads, or on the global pool.
pub(crate) fn in_pool<T: Send>(jobs: Option<usize>, work: impl FnOnce() -> T + Send) -> Result<T> {
    match jobs {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .context("failed to start worker pool")?;
            Ok(pool.install(work))
        }
        None => Ok(work()),
    }
}

fn display_name(dir: &Path, root: &Path) -> String {
    let rel = dir.strip_prefix(root).unwrap_or(dir);
    if rel.as_os_str().is_empty() {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string())
    } else {
        rel.to_string_lossy().replace('\\', "/")
    }
}

/// Exit code for one report.
pub fn pack_exit_code(report: &Report) -> u8 {
    if report.is_valid() {
        EXIT_VALID
    } else {
        EXIT_INVALID
    }
}

/// Exit code for a collection.
pub fn collection_exit_code(report: &CollectionReport) -> u8 {
    if report.summary.errored_packs > 0 {
        EXIT_SYSTEM
    } else if report.summary.invalid_packs > 0 {
        EXIT_INVALID
    } else {
        EXIT_VALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_pack::PackOutcome;

    const PACK: &str = r#"
metadata: {name: NAME, version: 1.0.0, description: Demo, vendor: Example, domain: demo}
connection: {type: rest, base_url: "https://api.example.com"}
tools:
  list_items: {type: list, description: List items, endpoint: /items, method: GET}
"#;

    fn write_pack(root: &Path, rel: &str, name: &str) {
        let dir = root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pack.yaml"), PACK.replace("NAME", name)).unwrap();
    }

    fn outcome(name: &str, report: Option<Report>) -> PackOutcome {
        PackOutcome {
            name: name.to_string(),
            error: report.is_none().then(|| "boom".to_string()),
            report,
        }
    }

    #[test]
    fn single_pack_report() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "items", "items");
        let report = validate_single(&PackValidator::default(), &dir.path().join("items")).unwrap();
        assert!(report.is_valid(), "{:#?}", report.issues);
        assert_eq!(pack_exit_code(&report), EXIT_VALID);
    }

    #[test]
    fn missing_pack_is_a_system_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_single(&PackValidator::default(), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("required file not found"));
    }

    #[test]
    fn directory_names_packs_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "team/items", "items");
        write_pack(dir.path(), "orders", "wrong-name");

        let report = validate_directory(&PackValidator::default(), dir.path(), Some(2)).unwrap();
        let names: Vec<_> = report.packs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "team/items"]);
        assert_eq!(report.summary.valid_packs, 1);
        assert_eq!(report.summary.invalid_packs, 1);
        assert_eq!(collection_exit_code(&report), EXIT_INVALID);
    }

    #[test]
    fn collection_root_may_itself_be_a_pack() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "solo", "solo");
        let report =
            validate_directory(&PackValidator::default(), &dir.path().join("solo"), None).unwrap();
        assert_eq!(report.packs[0].name, "solo");
    }

    #[test]
    fn errored_pack_outranks_invalid_pack() {
        let invalid = {
            let mut builder = kpack_pack::ReportBuilder::new();
            builder.add(
                kpack_core::Stage::Structural,
                vec![kpack_core::Issue::error(
                    kpack_core::IssueCode::NoTools,
                    "tools",
                    "no tools",
                )],
            );
            builder.build()
        };
        let report = CollectionReport::from_outcomes(vec![
            outcome("a", Some(invalid.clone())),
            outcome("b", None),
        ]);
        assert_eq!(collection_exit_code(&report), EXIT_SYSTEM);

        let report = CollectionReport::from_outcomes(vec![outcome("a", Some(invalid))]);
        assert_eq!(collection_exit_code(&report), EXIT_INVALID);

        assert_eq!(collection_exit_code(&CollectionReport::from_outcomes(vec![])), EXIT_VALID);
    }

    #[test]
    fn file_path_is_not_a_collection_root() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "items", "items");
        let file = dir.path().join("items/pack.yaml");
        assert!(validate_directory(&PackValidator::default(), &file, None).is_err());
    }
}
