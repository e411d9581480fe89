//! Load command implementation

use std::path::Path;

use anyhow::Result;
use warehouse_reconcile::{DuckDbStore, EtlConfig, PipelineExecutor};

use super::read_batch;
use crate::error::CliError;
use crate::output::{self, OutputFormat};

/// Handle the load command: validate one batch and upsert it into DuckDB
pub fn handle_load(
    config: &EtlConfig,
    database: &str,
    entity: &str,
    input: &Path,
    format: OutputFormat,
) -> Result<()> {
    let batch = read_batch(input)?;
    let store = DuckDbStore::open(database).map_err(CliError::from)?;
    let executor = PipelineExecutor::new(store, config.clone()).map_err(CliError::from)?;
    let report = executor
        .run([(entity.to_string(), batch)])
        .map_err(CliError::from)?;
    output::print_report(&report, format)
}
