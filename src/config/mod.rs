//! ETL configuration
//!
//! [`EtlConfig`] is read from a YAML or TOML file (chosen by extension) and
//! then overridden by `ETL_*` environment variables:
//!
//! | Variable                 | Field                | Default |
//! |--------------------------|----------------------|---------|
//! | `ETL_BATCH_SIZE`         | `batch_size`         | 1000    |
//! | `ETL_MAX_RETRIES`        | `max_retries`        | 3       |
//! | `ETL_RETRY_DELAY_MS`     | `retry_delay_ms`     | 1000    |
//! | `ETL_MAX_RETRY_DELAY_MS` | `max_retry_delay_ms` | 30000   |
//! | `ETL_LOG_LEVEL`          | `log_level`          | info    |
//! | `ETL_ENABLE_VALIDATION`  | `enable_validation`  | true    |
//! | `ETL_NULL_THRESHOLD`     | `null_threshold`     | 0.1     |
//! | `ETL_LOAD_TIMEOUT_MS`    | `load_timeout_ms`    | none    |

pub mod error;

pub use error::ConfigError;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, EntityConfig};
use crate::models::value::{FALSE_TOKENS, TRUE_TOKENS};
use crate::pipeline::RetryPolicy;
use crate::validation::stats::{DEFAULT_MIN_SAMPLES, DEFAULT_NULL_THRESHOLD};
use crate::validation::{ValidationMode, ValidatorSettings};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Pipeline settings plus any entities added to the built-in catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Keys per store lookup while reconciling; each batch still commits once
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Backoff cap; a value below `retry_delay_ms` is raised to it
    pub max_retry_delay_ms: u64,
    pub log_level: String,
    pub enable_validation: bool,
    pub validation_mode: ValidationMode,
    pub null_threshold: f64,
    pub min_samples: usize,
    pub load_timeout_ms: Option<u64>,
    pub skip_unchanged: bool,
    /// Entities added to, or replacing, the built-in catalog
    pub entities: Vec<EntityConfig>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            log_level: "info".to_string(),
            enable_validation: true,
            validation_mode: ValidationMode::Reject,
            null_threshold: DEFAULT_NULL_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
            load_timeout_ms: None,
            skip_unchanged: false,
            entities: Vec::new(),
        }
    }
}

impl EtlConfig {
    pub fn builder() -> EtlConfigBuilder {
        EtlConfigBuilder::default()
    }

    /// Parse a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// File (or defaults), then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `ETL_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from any variable source
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("ETL_BATCH_SIZE") {
            self.batch_size = parse_var("ETL_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("ETL_MAX_RETRIES") {
            self.max_retries = parse_var("ETL_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("ETL_RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_var("ETL_RETRY_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("ETL_MAX_RETRY_DELAY_MS") {
            self.max_retry_delay_ms = parse_var("ETL_MAX_RETRY_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("ETL_LOG_LEVEL") {
            self.log_level = raw.trim().to_lowercase();
        }
        if let Some(raw) = lookup("ETL_ENABLE_VALIDATION") {
            self.enable_validation = parse_flag("ETL_ENABLE_VALIDATION", &raw)?;
        }
        if let Some(raw) = lookup("ETL_NULL_THRESHOLD") {
            self.null_threshold = parse_var("ETL_NULL_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("ETL_LOAD_TIMEOUT_MS") {
            self.load_timeout_ms = Some(parse_var("ETL_LOAD_TIMEOUT_MS", &raw)?);
        }
        Ok(())
    }

    /// Check scalar settings and every catalog entity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid_value("batch_size", 0, "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.null_threshold) {
            return Err(ConfigError::invalid_value(
                "null_threshold",
                self.null_threshold,
                "must be between 0 and 1",
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::invalid_value(
                "log_level",
                &self.log_level,
                "expected trace, debug, info, warn or error",
            ));
        }
        self.catalog()?;
        Ok(())
    }

    /// Built-in catalog merged with the configured entities
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        let catalog = Catalog::ecommerce().with_entities(self.entities.iter().cloned());
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms.max(self.retry_delay_ms)),
        }
    }

    pub fn validator_settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            null_threshold: self.null_threshold,
            min_samples: self.min_samples,
        }
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid_value(key, raw, e.to_string()))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let token = raw.trim().to_lowercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Ok(true)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Ok(false)
    } else {
        Err(ConfigError::invalid_value(key, raw, "expected true or false"))
    }
}

/// Builder for [`EtlConfig`]
#[derive(Debug, Default)]
pub struct EtlConfigBuilder {
    batch_size: Option<usize>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    log_level: Option<String>,
    enable_validation: Option<bool>,
    validation_mode: Option<ValidationMode>,
    null_threshold: Option<f64>,
    min_samples: Option<usize>,
    load_timeout_ms: Option<u64>,
    skip_unchanged: bool,
    entities: Vec<EntityConfig>,
}

impl EtlConfigBuilder {
    /// Set the maximum records per load call
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the number of retries for retryable load failures
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the base and maximum backoff delays
    pub fn retry_delay(mut self, base: Duration, max: Duration) -> Self {
        self.retry_delay_ms = Some(base.as_millis() as u64);
        self.max_retry_delay_ms = Some(max.as_millis() as u64);
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = Some(level.to_lowercase());
        self
    }

    /// Enable or disable validation before loading
    pub fn validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    pub fn validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = Some(mode);
        self
    }

    pub fn null_threshold(mut self, threshold: f64) -> Self {
        self.null_threshold = Some(threshold);
        self
    }

    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = Some(min_samples);
        self
    }

    /// Set the lock and commit budget of each load
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    /// Add or replace an entity
    pub fn entity(mut self, entity: EntityConfig) -> Self {
        self.entities.push(entity);
        self
    }

    /// Build and validate the EtlConfig
    pub fn build(self) -> Result<EtlConfig, ConfigError> {
        let defaults = EtlConfig::default();
        let config = EtlConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            max_retry_delay_ms: self.max_retry_delay_ms.unwrap_or(defaults.max_retry_delay_ms),
            log_level: self.log_level.unwrap_or(defaults.log_level),
            enable_validation: self.enable_validation.unwrap_or(defaults.enable_validation),
            validation_mode: self.validation_mode.unwrap_or_default(),
            null_threshold: self.null_threshold.unwrap_or(defaults.null_threshold),
            min_samples: self.min_samples.unwrap_or(defaults.min_samples),
            load_timeout_ms: self.load_timeout_ms,
            skip_unchanged: self.skip_unchanged,
            entities: self.entities,
        };
        config.validate()?;
        Ok(config)
    }
}
