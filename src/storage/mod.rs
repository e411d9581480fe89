//! Target store abstraction
//!
//! Defines the [`TargetStore`] trait the reconciling loader writes through, and
//! its implementations:
//! - [`MemoryStore`]: in-process keyed tables (tests, dry runs, embedding)
//! - `DuckDbStore`: embedded DuckDB warehouse (feature `duckdb-backend`)
//!
//! Every target table maps a business key to the current record plus the
//! `created_at` / `updated_at` audit timestamps.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Key, Record};

pub mod locks;
pub mod memory;
#[cfg(feature = "duckdb-backend")]
pub mod db;
#[cfg(feature = "duckdb-backend")]
pub mod schema;

pub use locks::{TableGuard, TableLocks};
pub use memory::MemoryStore;
#[cfg(feature = "duckdb-backend")]
pub use db::DuckDbStore;

/// Error type for target store operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// Deadline expired before the operation completed
    #[error("Storage timeout: {0}")]
    Timeout(String),
    /// Connection dropped or backend temporarily unreachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    /// Table name is not a safe identifier
    #[error("Invalid table name: {0}")]
    InvalidTable(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

impl StorageError {
    /// Whether retrying the whole call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Timeout(_) | StorageError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Current state of one target-table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Record as last written, including derived columns
    pub record: Record,
    /// When the key was first inserted
    pub created_at: DateTime<Utc>,
    /// When the row was last written
    pub updated_at: DateTime<Utc>,
}

impl StoredRow {
    /// Record with the audit timestamps added under the given column names
    pub fn to_record(&self, created_column: &str, updated_column: &str) -> Record {
        self.record
            .clone()
            .with(created_column, self.created_at)
            .with(updated_column, self.updated_at)
    }
}

/// Kind of write applied to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A single keyed write, computed before the commit
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub key: Key,
    pub row: StoredRow,
}

/// Keyed storage the reconciling loader writes through
///
/// Implementations must apply a change set atomically: after [`apply`]
/// returns, either every change is visible or none is. The store owns the
/// per-table write locks so that every loader sharing it serializes on the
/// same table.
///
/// [`apply`]: TargetStore::apply
pub trait TargetStore: Send + Sync {
    /// Write locks for this store's tables
    fn table_locks(&self) -> &TableLocks;

    /// Current rows for the given keys; absent keys are omitted
    fn fetch(&self, table: &str, keys: &[Key]) -> Result<HashMap<Key, StoredRow>, StorageError>;

    /// Apply every change atomically and return the resulting row count.
    ///
    /// Nothing is applied if `deadline` has passed.
    fn apply(
        &self,
        table: &str,
        changes: &[RowChange],
        deadline: Option<Instant>,
    ) -> Result<usize, StorageError>;

    /// Number of rows in the table (zero for a table never written)
    fn row_count(&self, table: &str) -> Result<usize, StorageError>;

    /// All rows of a table, ordered by business key
    fn scan(&self, table: &str) -> Result<Vec<(Key, StoredRow)>, StorageError>;

    /// Current row for a single key
    fn get(&self, table: &str, key: &Key) -> Result<Option<StoredRow>, StorageError> {
        let mut rows = self.fetch(table, std::slice::from_ref(key))?;
        Ok(rows.remove(key))
    }
}

impl<T: TargetStore + ?Sized> TargetStore for std::sync::Arc<T> {
    fn table_locks(&self) -> &TableLocks {
        (**self).table_locks()
    }

    fn fetch(&self, table: &str, keys: &[Key]) -> Result<HashMap<Key, StoredRow>, StorageError> {
        (**self).fetch(table, keys)
    }

    fn apply(
        &self,
        table: &str,
        changes: &[RowChange],
        deadline: Option<Instant>,
    ) -> Result<usize, StorageError> {
        (**self).apply(table, changes, deadline)
    }

    fn row_count(&self, table: &str) -> Result<usize, StorageError> {
        (**self).row_count(table)
    }

    fn scan(&self, table: &str) -> Result<Vec<(Key, StoredRow)>, StorageError> {
        (**self).scan(table)
    }
}

/// Timeout raised when a store-internal lock is not granted before the deadline
pub(crate) fn lock_expired(table: &str) -> StorageError {
    StorageError::Timeout(format!("store busy, deadline expired waiting to commit to '{}'", table))
}

/// Fail with a timeout if the deadline has passed
pub(crate) fn check_deadline(deadline: Option<Instant>, table: &str) -> Result<(), StorageError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(StorageError::Timeout(format!(
            "deadline expired before commit to '{}'",
            table
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_classification() {
        assert!(StorageError::Timeout("t".into()).is_retryable());
        assert!(StorageError::Unavailable("down".into()).is_retryable());
        assert!(!StorageError::BackendError("syntax".into()).is_retryable());
        assert!(!StorageError::InvalidTable("x;".into()).is_retryable());
    }

    #[test]
    fn test_check_deadline() {
        assert!(check_deadline(None, "t").is_ok());
        let future = Instant::now() + Duration::from_secs(60);
        assert!(check_deadline(Some(future), "t").is_ok());
        let past = Instant::now() - Duration::from_millis(1);
        assert!(matches!(
            check_deadline(Some(past), "t"),
            Err(StorageError::Timeout(_))
        ));
    }

    #[test]
    fn test_stored_row_to_record() {
        let at = Utc::now();
        let row = StoredRow {
            record: Record::new().with("id", 1),
            created_at: at,
            updated_at: at,
        };
        let record = row.to_record("created_at", "updated_at");
        assert_eq!(record.len(), 3);
        assert!(record.value("created_at").parse_timestamp().is_some());
    }
}
