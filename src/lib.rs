//! Warehouse Reconcile - validation and keyed upsert for star-schema loads
//!
//! Provides:
//! - Batch validation with structural, business, referential and statistical rules
//! - A reconciling loader that upserts batches with recomputed derived columns
//! - Target stores (in-memory, and DuckDB behind `duckdb-backend`)
//! - A pipeline executor that loads entities in dependency order with retries
//! - The built-in e-commerce entity catalog and file/env configuration

pub mod catalog;
pub mod config;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod storage;
#[cfg(feature = "cli")]
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use catalog::{Catalog, EntityConfig};
pub use config::{ConfigError, EtlConfig, EtlConfigBuilder};
pub use loader::{
    CancelFlag, DerivedColumn, DerivedRegistry, LoadError, LoadOptions, LoadReport,
    ReconcilingLoader, TableConfig, TableDefinition,
};
pub use models::{Batch, Key, Record, RowRef, Value};
pub use pipeline::{PipelineError, PipelineExecutor, PipelineReport, RetryPolicy};
#[cfg(feature = "duckdb-backend")]
pub use storage::DuckDbStore;
pub use storage::{MemoryStore, StorageError, StoredRow, TargetStore};
pub use validation::{
    ReferenceScope, RuleSet, Status, ValidationError, ValidationMode, ValidationResult, Validator,
    ValidatorSettings, Violation,
};
