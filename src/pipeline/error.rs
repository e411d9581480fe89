//! Error types for pipeline runs

use thiserror::Error;

use crate::config::ConfigError;
use crate::loader::LoadError;
use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A batch failed validation; carries the failing rule ids
    #[error("Validation failed for '{entity}': {}", .rule_ids.join(", "))]
    ValidationFailed { entity: String, rule_ids: Vec<String> },

    /// Load failed after any retries
    #[error("Load failed for '{entity}' after {attempts} attempt(s): {source}")]
    Load {
        entity: String,
        attempts: u32,
        #[source]
        source: LoadError,
    },

    /// Batch named an entity the catalog does not know
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Reading existing keys from the target store failed
    #[error("Cannot read existing keys of '{entity}': {source}")]
    Storage {
        entity: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::ValidationFailed { .. } => "VALIDATION_FAILED",
            PipelineError::Load { source, .. } => source.code(),
            PipelineError::Storage { source, .. } if source.is_retryable() => "TRANSIENT_STORAGE",
            PipelineError::Storage { .. } => "STORAGE_ERROR",
            PipelineError::UnknownEntity(_)
            | PipelineError::Validation(_)
            | PipelineError::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether rerunning the pipeline unchanged may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::Load { source, .. } => source.is_recoverable(),
            PipelineError::Storage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::ValidationFailed { entity, .. } => format!(
                "{self}\n\nHint: Run `warehouse-etl validate --entity {entity}` to see the offending rows."
            ),
            PipelineError::Load { source, .. } => source.user_message(),
            PipelineError::Validation(e) => e.user_message(),
            PipelineError::Config(e) => e.user_message(),
            PipelineError::UnknownEntity(_) => {
                format!("{self}\n\nHint: Declare the entity in the config file's entities list.")
            }
            PipelineError::Storage { .. } if self.is_recoverable() => {
                format!("{self}\n\nHint: The warehouse was busy; retry the run.")
            }
            PipelineError::Storage { .. } => self.to_string(),
        }
    }
}
