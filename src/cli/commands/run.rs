//! Run command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use warehouse_reconcile::{Batch, Catalog, DuckDbStore, EtlConfig, PipelineExecutor};

use super::read_batch;
use crate::error::CliError;
use crate::output::{self, OutputFormat};

const BATCH_EXTENSIONS: &[&str] = &["json", "jsonl", "ndjson"];

/// `<entity>.json` / `<entity>.jsonl` files in a directory, sorted by file name
fn discover_batches(catalog: &Catalog, dir: &Path) -> Result<Vec<(String, Batch)>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| BATCH_EXTENSIONS.contains(&e))
        })
        .collect();
    paths.sort();

    let mut batches = Vec::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if catalog.entity(stem).is_none() {
            warn!(file = %path.display(), "Skipping file with no matching entity");
            continue;
        }
        let batch = read_batch(&path)?;
        info!(entity = %stem, records = batch.len(), "Discovered batch");
        batches.push((stem.to_string(), batch));
    }
    Ok(batches)
}

/// Handle the run command: load every entity file found in a directory
pub fn handle_run(
    config: &EtlConfig,
    database: &str,
    input_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let store = DuckDbStore::open(database).map_err(CliError::from)?;
    let executor = PipelineExecutor::new(store, config.clone()).map_err(CliError::from)?;
    let batches = discover_batches(executor.catalog(), input_dir)?;
    if batches.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "no entity batch files in {}",
            input_dir.display()
        ))
        .into());
    }
    let report = executor.run(batches).map_err(CliError::from)?;
    output::print_report(&report, format)
}
