//! Error types for configuration loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// File extension is neither YAML nor TOML
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// An environment variable or field has an unusable value
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// An entity's rules or table definition is defective
    #[error("Invalid entity '{entity}': {reason}")]
    InvalidEntity { entity: String, reason: String },

    /// Entity references form a cycle, so no load order exists
    #[error("Dependency cycle involving entity '{0}'")]
    DependencyCycle(String),
}

impl ConfigError {
    pub fn invalid_value(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_entity(entity: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidEntity {
            entity: entity.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        "CONFIGURATION_ERROR"
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Io { path, .. } => {
                format!(
                    "{self}\n\nHint: Check that {} exists and is readable.",
                    path.display()
                )
            }
            ConfigError::UnsupportedFormat(_) => {
                format!("{self}\n\nHint: Use a .yaml, .yml or .toml config file.")
            }
            ConfigError::InvalidValue { key, .. } => {
                format!("{self}\n\nHint: Fix {key} in the environment or config file.")
            }
            ConfigError::DependencyCycle(_) => {
                format!(
                    "{self}\n\nHint: Entity references must form a hierarchy; break the cycle or use a self-reference."
                )
            }
            _ => self.to_string(),
        }
    }
}
