//! Error types for validation
//!
//! Data problems are never errors: they are reported as violations in a
//! [`ValidationResult`](super::ValidationResult). These variants cover
//! configuration defects only.

use thiserror::Error;

use super::input::IdentifierError;

/// Errors raised by the validator or when building rule sets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No rule set registered for the entity
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A rule set or rule is malformed
    #[error("Invalid rule '{rule}' for '{entity}': {reason}")]
    InvalidRule {
        entity: String,
        rule: String,
        reason: String,
    },

    /// Entity or column name is not a safe identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),
}

impl ValidationError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        "CONFIGURATION_ERROR"
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::UnknownEntity(entity) => {
                format!(
                    "No rule set is registered for '{entity}'.\n\n\
                    Hint: Use one of the built-in entities or declare '{entity}' under `entities` in your config."
                )
            }
            ValidationError::InvalidRule { .. } => {
                format!("{self}\n\nHint: Check the rule definition in your configuration.")
            }
            ValidationError::InvalidIdentifier(_) => {
                format!(
                    "{self}\n\nHint: Names must start with a letter or underscore and contain only letters, digits and underscores."
                )
            }
        }
    }
}
