//! # kpack CLI entry point
//!
//! Parses command-line arguments, installs logging, loads the optional
//! configuration file and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use kpack_cli::config::CliConfig;
use kpack_cli::create::{run_create, CreateArgs};
use kpack_cli::list::{run_list, ListArgs};
use kpack_cli::schema::{run_schema, SchemaArgs};
use kpack_cli::validate::{run_validate, ValidateArgs};
use kpack_cli::EXIT_SYSTEM;

/// Knowledge Pack validator.
///
/// Checks pack definitions and guardrail policies before they are
/// published or deployed.
#[derive(Parser, Debug)]
#[command(name = "kpack", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file. Defaults to $KPACK_CONFIG, then ./kpack.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate one pack, or every pack under a directory with --all.
    Validate(ValidateArgs),

    /// Scaffold a new modular pack.
    Create(CreateArgs),

    /// Inventory every pack under a directory without validating.
    List(ListArgs),

    /// Show registered schema versions and their vocabularies.
    Schema(SchemaArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "kpack starting");

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_SYSTEM);
        }
    };

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args, &config),
        Commands::Create(args) => run_create(&args, &config),
        Commands::List(args) => run_list(&args, &config),
        Commands::Schema(args) => run_schema(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_SYSTEM)
        }
    }
}

/// Install the subscriber. `RUST_LOG` wins over `-v`; logs go to stderr so
/// stdout carries only the report.
fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
