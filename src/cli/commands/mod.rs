//! CLI commands

#[cfg(feature = "duckdb-backend")]
pub mod load;
#[cfg(feature = "duckdb-backend")]
pub mod run;
pub mod validate;

use std::path::Path;

use warehouse_reconcile::Batch;

use crate::error::CliError;

/// Read a `.json` or `.jsonl` batch file
pub fn read_batch(path: &Path) -> Result<Batch, CliError> {
    Batch::read_file(path).map_err(|source| CliError::FileReadError {
        path: path.to_path_buf(),
        source,
    })
}
