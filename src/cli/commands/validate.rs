//! Validate command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;
use warehouse_reconcile::{Batch, Catalog, EtlConfig, Key, ReferenceScope, ValidationMode};

use super::read_batch;
use crate::error::CliError;
use crate::output::{self, OutputFormat};

/// Parse a `--reference entity=file` argument
fn parse_reference(raw: &str) -> Result<(String, PathBuf), CliError> {
    match raw.split_once('=') {
        Some((entity, path)) if !entity.is_empty() && !path.is_empty() => {
            Ok((entity.to_string(), PathBuf::from(path)))
        }
        _ => Err(CliError::InvalidArgument(format!(
            "reference '{}' must look like ENTITY=FILE",
            raw
        ))),
    }
}

/// Keys of every reference batch, by entity
fn reference_scope(catalog: &Catalog, references: &[String]) -> Result<ReferenceScope, CliError> {
    let mut scope = ReferenceScope::new();
    for raw in references {
        let (entity, path) = parse_reference(raw)?;
        let config = catalog
            .entity(&entity)
            .ok_or_else(|| CliError::InvalidArgument(format!("unknown entity '{}'", entity)))?;
        let batch = read_batch(&path)?;
        let keys: Vec<Key> = batch
            .iter()
            .filter_map(|record| record.key(&config.rules.key_columns).ok())
            .collect();
        info!(entity = %entity, keys = keys.len(), "Loaded reference keys");
        scope.add_keys(&entity, keys);
    }
    Ok(scope)
}

/// Handle the validate command
pub fn handle_validate(
    config: &EtlConfig,
    entity: &str,
    input: &Path,
    mode: Option<ValidationMode>,
    references: &[String],
    output_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let catalog = config.catalog().map_err(CliError::from)?;
    let validator = catalog
        .validator(config.validator_settings())
        .map_err(CliError::from)?;
    let scope = reference_scope(&catalog, references)?;

    let batch: Batch = read_batch(input)?;
    let mode = mode.unwrap_or(config.validation_mode);
    let validated = validator
        .validate(entity, &batch, mode, &scope)
        .map_err(CliError::from)?;

    output::print_validation(&validated.result, format)?;
    if let Some(path) = output_path {
        output::write_batch(&validated.batch, path)?;
    }

    if validated.result.status.is_loadable() {
        Ok(())
    } else {
        Err(CliError::Rejected {
            entity: entity.to_string(),
            rule_ids: validated.result.error_ids(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let (entity, path) = parse_reference("customers=data/customers.json").unwrap();
        assert_eq!(entity, "customers");
        assert_eq!(path, PathBuf::from("data/customers.json"));
        assert!(parse_reference("customers").is_err());
        assert!(parse_reference("=file.json").is_err());
    }
}
