//! Reconciling loader
//!
//! Upserts validated batches into keyed target tables:
//! - business-key extraction and in-batch de-duplication (last occurrence wins)
//! - derived columns recomputed on every write
//! - SCD Type 1 overwrite with `created_at` / `updated_at` audit timestamps
//! - per-table exclusive locks (held by the store) honouring a caller timeout
//! - a single atomic commit per batch

pub mod derived;
pub mod error;
pub mod reconcile;
pub mod table;

pub use derived::{DeriveError, DerivedColumn, DerivedRegistry};
pub use error::LoadError;
pub use reconcile::{CancelFlag, LoadOptions, LoadReport, ReconcilingLoader};
pub use table::{DerivedConfig, TableConfig, TableDefinition};
