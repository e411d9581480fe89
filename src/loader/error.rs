//! Error types for reconciling loads

use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while loading a batch into a target table
///
/// Every variant leaves the target table as it was before the call.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// A key column is absent or null
    #[error("Schema mismatch in '{table}' at row {row}: key column '{column}' is missing or null")]
    SchemaMismatch {
        table: String,
        row: usize,
        column: String,
    },

    /// A derived column could not be computed
    #[error("Constraint violation in '{table}' at row {row}, column '{column}': {reason}")]
    ConstraintViolation {
        table: String,
        row: usize,
        column: String,
        reason: String,
    },

    /// Lock or storage deadline expired
    #[error("Timed out after {waited_ms} ms loading '{table}'")]
    Timeout { table: String, waited_ms: u64 },

    /// The target store failed
    #[error("Storage error loading '{table}': {source}")]
    Storage {
        table: String,
        #[source]
        source: StorageError,
    },

    /// The caller cancelled the load before commit
    #[error("Load of '{0}' cancelled before commit")]
    Cancelled(String),

    /// The table definition itself is defective
    #[error("Invalid table definition: {0}")]
    InvalidDefinition(String),
}

impl LoadError {
    /// Wrap a store failure; store timeouts become [`LoadError::Timeout`]
    pub(crate) fn storage(table: &str, source: StorageError, waited: Duration) -> Self {
        match source {
            StorageError::Timeout(_) => LoadError::Timeout {
                table: table.to_string(),
                waited_ms: waited.as_millis() as u64,
            },
            source => LoadError::Storage {
                table: table.to_string(),
                source,
            },
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            LoadError::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            LoadError::Timeout { .. } => "TIMEOUT",
            LoadError::Storage { source, .. } if source.is_retryable() => "TRANSIENT_STORAGE",
            LoadError::Storage { .. } => "STORAGE_ERROR",
            LoadError::Cancelled(_) => "CANCELLED",
            LoadError::InvalidDefinition(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Check if this error is recoverable (the whole load can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            LoadError::Timeout { .. } => true,
            LoadError::Storage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Table the failed load targeted, when known
    pub fn table(&self) -> Option<&str> {
        match self {
            LoadError::SchemaMismatch { table, .. }
            | LoadError::ConstraintViolation { table, .. }
            | LoadError::Timeout { table, .. }
            | LoadError::Storage { table, .. }
            | LoadError::Cancelled(table) => Some(table),
            LoadError::InvalidDefinition(_) => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoadError::SchemaMismatch { row, column, .. } => {
                format!(
                    "{self}\n\nHint: Every record needs a non-null '{column}'. Check record {row} of the input."
                )
            }
            LoadError::ConstraintViolation { column, .. } => {
                format!(
                    "{self}\n\nHint: '{column}' is derived from other columns. Fix the source values; incoming '{column}' values are ignored."
                )
            }
            LoadError::Timeout { .. } => {
                format!(
                    "{self}\n\nHint: Another load may hold the table lock. Retry, or raise load_timeout_ms."
                )
            }
            LoadError::Storage { source, .. } if source.is_retryable() => {
                format!("{self}\n\nHint: The target store is temporarily unavailable. Retry the load.")
            }
            LoadError::InvalidDefinition(_) => {
                format!("{self}\n\nHint: Check the entity's table definition in your configuration.")
            }
            _ => self.to_string(),
        }
    }
}
