//! warehouse-etl - validate and load e-commerce batches into a warehouse
//!
//! Commands:
//! - `validate` - Validate a batch file against its entity's rules
//! - `load` - Validate and upsert one batch into a DuckDB warehouse
//! - `run` - Load every entity batch in a directory in dependency order

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use warehouse_reconcile::telemetry::init_tracing;
use warehouse_reconcile::{EtlConfig, ValidationMode};

mod commands;
mod error;
mod output;

use error::CliError;
use output::OutputFormat;

/// warehouse-etl - validate and load e-commerce batches
#[derive(Parser)]
#[command(name = "warehouse-etl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate and upsert e-commerce batches into a star-schema warehouse", long_about = None)]
struct Cli {
    /// Configuration file (.yaml, .yml or .toml)
    #[arg(short, long, env = "ETL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a batch file
    Validate {
        /// Entity the batch belongs to
        #[arg(short, long)]
        entity: String,

        /// Batch file (.json array or .jsonl)
        #[arg(short, long)]
        input: PathBuf,

        /// Validation mode (reject, clean, filter); defaults to the configured mode
        #[arg(short, long)]
        mode: Option<ValidationMode>,

        /// Known keys for a referenced entity, as ENTITY=FILE (repeatable)
        #[arg(short, long = "reference")]
        references: Vec<String>,

        /// Write the validated (cleaned or filtered) batch to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate and upsert one batch into a DuckDB warehouse
    #[cfg(feature = "duckdb-backend")]
    Load {
        /// Warehouse database path
        #[arg(short, long)]
        database: String,

        /// Entity the batch belongs to
        #[arg(short, long)]
        entity: String,

        /// Batch file (.json array or .jsonl)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Load every `<entity>.json` / `<entity>.jsonl` file in a directory
    #[cfg(feature = "duckdb-backend")]
    Run {
        /// Warehouse database path
        #[arg(short, long)]
        database: String,

        /// Directory holding the batch files
        #[arg(short, long)]
        input_dir: PathBuf,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config = EtlConfig::load(cli.config.as_deref()).map_err(CliError::from)?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Validate {
            entity,
            input,
            mode,
            references,
            output,
        } => commands::validate::handle_validate(
            &config,
            &entity,
            &input,
            mode,
            &references,
            output.as_deref(),
            cli.format,
        ),

        #[cfg(feature = "duckdb-backend")]
        Commands::Load {
            database,
            entity,
            input,
        } => commands::load::handle_load(&config, &database, &entity, &input, cli.format),

        #[cfg(feature = "duckdb-backend")]
        Commands::Run {
            database,
            input_dir,
        } => commands::run::handle_run(&config, &database, &input_dir, cli.format),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<CliError>() {
                Some(cli_err) => eprintln!("✗ [{}] {}", cli_err.code(), cli_err.user_message()),
                None => eprintln!("✗ [ERROR] {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
