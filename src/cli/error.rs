//! CLI error types

use std::path::PathBuf;

use thiserror::Error;
use warehouse_reconcile::models::BatchReadError;
#[cfg(feature = "duckdb-backend")]
use warehouse_reconcile::StorageError;
use warehouse_reconcile::{ConfigError, PipelineError, ValidationError};

/// Errors surfaced by the warehouse-etl binary
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot read batch {}: {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: BatchReadError,
    },

    /// Batch validated to `fail`
    #[error("Batch for '{entity}' rejected: {}", .rule_ids.join(", "))]
    Rejected { entity: String, rule_ids: Vec<String> },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[cfg(feature = "duckdb-backend")]
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CliError {
    /// Machine-readable error code printed alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            CliError::InvalidArgument(_) | CliError::FileReadError { .. } => "INPUT_ERROR",
            CliError::Rejected { .. } => "VALIDATION_FAILED",
            CliError::Config(e) => e.code(),
            CliError::Validation(e) => e.code(),
            CliError::Pipeline(e) => e.code(),
            #[cfg(feature = "duckdb-backend")]
            CliError::Storage(e) if e.is_retryable() => "TRANSIENT_STORAGE",
            #[cfg(feature = "duckdb-backend")]
            CliError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            CliError::Config(e) => e.user_message(),
            CliError::Validation(e) => e.user_message(),
            CliError::Pipeline(e) => e.user_message(),
            CliError::FileReadError { .. } => {
                format!("{self}\n\nHint: Batches are JSON arrays of objects or JSON Lines files.")
            }
            _ => self.to_string(),
        }
    }
}
