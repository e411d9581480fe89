//! In-memory target store

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use parking_lot::RwLock;

use super::{RowChange, StorageError, StoredRow, TableLocks, TargetStore, check_deadline, lock_expired};
use crate::models::Key;

/// Keyed tables held in process memory
///
/// A change set is applied under a single write lock, so readers observe
/// either all of it or none of it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<Key, StoredRow>>>,
    locks: TableLocks,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of tables that have received at least one write
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl TargetStore for MemoryStore {
    fn table_locks(&self) -> &TableLocks {
        &self.locks
    }

    fn fetch(&self, table: &str, keys: &[Key]) -> Result<HashMap<Key, StoredRow>, StorageError> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(table) else {
            return Ok(HashMap::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| rows.get(key).map(|row| (key.clone(), row.clone())))
            .collect())
    }

    fn apply(
        &self,
        table: &str,
        changes: &[RowChange],
        deadline: Option<Instant>,
    ) -> Result<usize, StorageError> {
        let mut tables = match deadline {
            Some(deadline) => self
                .tables
                .try_write_until(deadline)
                .ok_or_else(|| lock_expired(table))?,
            None => self.tables.write(),
        };
        check_deadline(deadline, table)?;

        let rows = tables.entry(table.to_string()).or_default();
        for change in changes {
            rows.insert(change.key.clone(), change.row.clone());
        }
        Ok(rows.len())
    }

    fn row_count(&self, table: &str) -> Result<usize, StorageError> {
        Ok(self.tables.read().get(table).map_or(0, BTreeMap::len))
    }

    fn scan(&self, table: &str) -> Result<Vec<(Key, StoredRow)>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|(key, row)| (key.clone(), row.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
