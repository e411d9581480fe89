//! Pipeline executor
//!
//! Runs named batches through validate → load in dependency order against one
//! target store. All batches of a run share one [`ReferenceScope`], seeded
//! with the keys already present in the target tables.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::error::PipelineError;
use super::plan::order_entities;
use super::retry::RetryPolicy;
use crate::catalog::Catalog;
use crate::config::EtlConfig;
use crate::loader::{CancelFlag, LoadError, LoadOptions, LoadReport, ReconcilingLoader, TableDefinition};
use crate::models::Batch;
use crate::storage::TargetStore;
use crate::validation::{ReferenceScope, Status, Validator};

/// Outcome for one entity of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: String,
    pub table: String,
    /// SHA-256 of the extracted batch
    pub fingerprint: String,
    pub extracted: usize,
    /// Validation verdict; absent when validation is disabled
    pub status: Option<Status>,
    pub loaded: usize,
    /// Rows dropped by filter-mode validation
    pub rejected: usize,
    pub warnings: usize,
    /// Report of the single commit for the entity's batch
    pub load: LoadReport,
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Entities in the order they were loaded
    pub entities: Vec<EntityReport>,
}

impl PipelineReport {
    pub fn entity(&self, name: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|e| e.entity == name)
    }

    pub fn extracted(&self) -> usize {
        self.entities.iter().map(|e| e.extracted).sum()
    }

    pub fn loaded(&self) -> usize {
        self.entities.iter().map(|e| e.loaded).sum()
    }

    pub fn rejected(&self) -> usize {
        self.entities.iter().map(|e| e.rejected).sum()
    }

    pub fn warnings(&self) -> usize {
        self.entities.iter().map(|e| e.warnings).sum()
    }

    /// Entities whose batch content differs from an earlier run
    pub fn changed_since<'a>(&'a self, previous: &PipelineReport) -> Vec<&'a str> {
        self.entities
            .iter()
            .filter(|e| {
                previous
                    .entity(&e.entity)
                    .is_none_or(|p| p.fingerprint != e.fingerprint)
            })
            .map(|e| e.entity.as_str())
            .collect()
    }
}

/// Validates and loads batches for the entities of a [`Catalog`]
pub struct PipelineExecutor<S> {
    loader: ReconcilingLoader<S>,
    catalog: Catalog,
    validator: Validator,
    config: EtlConfig,
    cancel: Option<CancelFlag>,
}

impl<S: TargetStore> PipelineExecutor<S> {
    /// Executor over the catalog described by the config
    pub fn new(store: S, config: EtlConfig) -> Result<Self, PipelineError> {
        let catalog = config.catalog()?;
        Self::with_catalog(store, config, catalog)
    }

    /// Executor over an explicit catalog
    pub fn with_catalog(store: S, config: EtlConfig, catalog: Catalog) -> Result<Self, PipelineError> {
        catalog.validate()?;
        let validator = catalog.validator(config.validator_settings())?;
        Ok(Self {
            loader: ReconcilingLoader::new(store),
            catalog,
            validator,
            config,
            cancel: None,
        })
    }

    /// Flag checked before every commit
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn store(&self) -> &S {
        self.loader.store()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Run every batch, keyed by entity name.
    ///
    /// Batches for the same entity are concatenated in the order given. The
    /// run stops at the first failing entity; entities loaded before it stay
    /// committed.
    pub fn run(
        &self,
        batches: impl IntoIterator<Item = (String, Batch)>,
    ) -> Result<PipelineReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        let mut by_entity: BTreeMap<String, Batch> = BTreeMap::new();
        for (entity, batch) in batches {
            let merged = by_entity.entry(entity).or_default();
            for record in batch.into_records() {
                merged.push(record);
            }
        }

        let order = order_entities(&self.catalog, by_entity.keys().map(String::as_str))?;
        if let Some(unknown) = order.iter().find(|name| self.catalog.entity(name).is_none()) {
            return Err(PipelineError::UnknownEntity(unknown.clone()));
        }

        let _span = info_span!("pipeline", run_id = %run_id, entities = order.len()).entered();
        info!(order = ?order, "Starting pipeline run");

        let mut scope = ReferenceScope::new();
        let mut seeded: HashSet<String> = HashSet::new();
        let mut reports = Vec::with_capacity(order.len());
        for entity in &order {
            let batch = by_entity.remove(entity).unwrap_or_default();
            let report = self.run_entity(entity, batch, &mut scope, &mut seeded)?;
            reports.push(report);
        }

        let report = PipelineReport {
            run_id,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            entities: reports,
        };
        info!(
            extracted = report.extracted(),
            loaded = report.loaded(),
            rejected = report.rejected(),
            warnings = report.warnings(),
            duration_ms = report.duration_ms,
            "Pipeline run complete"
        );
        Ok(report)
    }

    fn run_entity(
        &self,
        entity: &str,
        batch: Batch,
        scope: &mut ReferenceScope,
        seeded: &mut HashSet<String>,
    ) -> Result<EntityReport, PipelineError> {
        let _span = info_span!("entity", entity = %entity).entered();

        let definition = self.catalog.table_definition(entity)?;
        let fingerprint = batch.fingerprint();
        let extracted = batch.len();
        debug!(records = extracted, fingerprint = %fingerprint, "Extracted batch");

        let (batch, status, rejected, warnings) = if self.config.enable_validation {
            self.seed_references(entity, scope, seeded)?;
            let validated = self.validator.validate_in_scope(
                entity,
                &batch,
                self.config.validation_mode,
                scope,
            )?;
            let result = validated.result;
            if result.status == Status::Fail {
                warn!(rules = ?result.error_ids(), "Batch rejected by validation");
                return Err(PipelineError::ValidationFailed {
                    entity: entity.to_string(),
                    rule_ids: result.error_ids(),
                });
            }
            let warnings = result.warnings().count();
            (validated.batch, Some(result.status), result.rejected_rows.len(), warnings)
        } else {
            (batch, None, 0, 0)
        };

        let load = self.load_batch(entity, &definition, &batch)?;
        let loaded = load.written();
        info!(table = %definition.name(), loaded, rejected, warnings, "Entity loaded");

        Ok(EntityReport {
            entity: entity.to_string(),
            table: definition.name().to_string(),
            fingerprint,
            extracted,
            status,
            loaded,
            rejected,
            warnings,
            load,
        })
    }

    /// Add the stored keys of every entity `entity` references, once per run
    fn seed_references(
        &self,
        entity: &str,
        scope: &mut ReferenceScope,
        seeded: &mut HashSet<String>,
    ) -> Result<(), PipelineError> {
        let Some(config) = self.catalog.entity(entity) else {
            return Ok(());
        };
        for reference in &config.rules.references {
            let target = reference.entity.as_str();
            if !seeded.insert(target.to_string()) {
                continue;
            }
            let table = self.catalog.table_definition(target)?;
            let rows = self
                .store()
                .scan(table.name())
                .map_err(|source| PipelineError::Storage {
                    entity: target.to_string(),
                    source,
                })?;
            debug!(referenced = %target, keys = rows.len(), "Seeded reference keys from target");
            scope.add_keys(target, rows.into_iter().map(|(key, _)| key));
        }
        Ok(())
    }

    /// Load the whole entity batch in one atomic commit.
    ///
    /// `batch_size` only bounds the keys per store lookup; a retry reruns the
    /// complete batch.
    fn load_batch(
        &self,
        entity: &str,
        definition: &TableDefinition,
        batch: &Batch,
    ) -> Result<LoadReport, PipelineError> {
        let mut options = LoadOptions::new()
            .skip_unchanged(self.config.skip_unchanged)
            .fetch_chunk(self.config.batch_size);
        if let Some(timeout) = self.config.load_timeout() {
            options = options.timeout(timeout);
        }
        if let Some(flag) = &self.cancel {
            options = options.cancel_flag(flag.clone());
        }

        let (result, attempts) = self
            .retry_policy()
            .run(LoadError::is_recoverable, |_| self.loader.load(definition, batch, &options));
        result.map_err(|source| PipelineError::Load {
            entity: entity.to_string(),
            attempts,
            source,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn config() -> EtlConfig {
        EtlConfig::builder().batch_size(2).max_retries(0).build().unwrap()
    }

    fn customer(id: i64, email: &str) -> Record {
        Record::new()
            .with("customer_id", id)
            .with("first_name", "Ada")
            .with("last_name", "Lovelace")
            .with("email", email)
    }

    fn order(id: i64, customer_id: i64, total: f64) -> Record {
        Record::new()
            .with("order_id", id)
            .with("customer_id", customer_id)
            .with("order_date", "2024-03-01T10:00:00Z")
            .with("order_total", total)
            .with("tax_amount", 1.0)
            .with("shipping_cost", 2.0)
    }

    #[test]
    fn test_run_loads_in_dependency_order() {
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), config()).unwrap();
        let report = executor
            .run([
                ("orders".to_string(), Batch::new(vec![order(10, 1, 50.0)])),
                (
                    "customers".to_string(),
                    Batch::new(vec![
                        customer(1, "a@example.com"),
                        customer(2, "b@example.com"),
                        customer(3, "c@example.com"),
                    ]),
                ),
            ])
            .unwrap();

        let names: Vec<&str> = report.entities.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(names, vec!["customers", "orders"]);

        let customers = report.entity("customers").unwrap();
        assert_eq!(customers.load.inserted, 3);
        assert_eq!(customers.loaded, 3);
        assert_eq!(store.row_count("dim_customers").unwrap(), 3);
        assert_eq!(report.loaded(), 4);
    }

    #[test]
    fn test_validation_failure_aborts() {
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), config()).unwrap();
        let err = executor
            .run([("orders".to_string(), Batch::new(vec![order(10, 99, 50.0)]))])
            .unwrap_err();
        match err {
            PipelineError::ValidationFailed { entity, rule_ids } => {
                assert_eq!(entity, "orders");
                assert_eq!(rule_ids, vec!["referential:customer_id"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.row_count("fact_orders").unwrap(), 0);
    }

    #[test]
    fn test_references_seeded_from_target() {
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), config()).unwrap();
        executor
            .run([("customers".to_string(), Batch::new(vec![customer(1, "a@example.com")]))])
            .unwrap();

        let report = executor
            .run([("orders".to_string(), Batch::new(vec![order(10, 1, 50.0)]))])
            .unwrap();
        assert_eq!(report.entity("orders").unwrap().status, Some(Status::Pass));
    }

    #[test]
    fn test_validation_disabled_loads_as_is() {
        let store = Arc::new(MemoryStore::new());
        let config = EtlConfig::builder().validation(false).build().unwrap();
        let executor = PipelineExecutor::new(store.clone(), config).unwrap();
        let report = executor
            .run([("orders".to_string(), Batch::new(vec![order(10, 99, 50.0)]))])
            .unwrap();
        assert_eq!(report.entity("orders").unwrap().status, None);
        assert_eq!(store.row_count("fact_orders").unwrap(), 1);
    }

    #[test]
    fn test_unknown_entity() {
        let executor = PipelineExecutor::new(MemoryStore::new(), config()).unwrap();
        let err = executor
            .run([("returns".to_string(), Batch::new(vec![Record::new()]))])
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEntity(name) if name == "returns"));
    }

    #[test]
    fn test_changed_since_compares_fingerprints() {
        let executor = PipelineExecutor::new(MemoryStore::new(), config()).unwrap();
        let batch = Batch::new(vec![customer(1, "a@example.com")]);
        let first = executor.run([("customers".to_string(), batch.clone())]).unwrap();
        let second = executor.run([("customers".to_string(), batch)]).unwrap();
        assert!(second.changed_since(&first).is_empty());
        assert_ne!(first.run_id, second.run_id);

        let third = executor
            .run([("customers".to_string(), Batch::new(vec![customer(1, "z@example.com")]))])
            .unwrap();
        assert_eq!(third.changed_since(&second), vec!["customers"]);
    }
}
