//! DuckDB-backed target store

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::schema;
use super::{RowChange, StorageError, StoredRow, TableLocks, TargetStore, check_deadline, lock_expired};
use crate::models::{Key, Record};
use crate::validation::input::validate_table_name;

/// Warehouse tables in an embedded DuckDB database
///
/// The single connection is guarded by a mutex; each change set is applied
/// inside one transaction that is rolled back on any error.
pub struct DuckDbStore {
    conn: Mutex<duckdb::Connection>,
    path: Option<String>,
    locks: TableLocks,
}

impl DuckDbStore {
    /// Open or create a warehouse database at the given path
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = duckdb::Connection::open(path)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path, e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
            locks: TableLocks::new(),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn memory() -> Result<Self, StorageError> {
        let conn = duckdb::Connection::open_in_memory()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            locks: TableLocks::new(),
        })
    }

    /// Get the database path (if not in-memory)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn checked_table(table: &str) -> Result<&str, StorageError> {
        validate_table_name(table).map_err(|e| StorageError::InvalidTable(e.to_string()))?;
        Ok(table)
    }

    fn table_exists(conn: &duckdb::Connection, table: &str) -> Result<bool, StorageError> {
        let count: i64 = conn.query_row(schema::table_exists(), [table], |row| row.get(0))?;
        Ok(count > 0)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("bad timestamp '{}': {}", raw, e)))
}

fn decode_row(record: &str, created_at: &str, updated_at: &str) -> Result<StoredRow, StorageError> {
    Ok(StoredRow {
        record: serde_json::from_str::<Record>(record)?,
        created_at: parse_timestamp(created_at)?,
        updated_at: parse_timestamp(updated_at)?,
    })
}

impl TargetStore for DuckDbStore {
    fn table_locks(&self) -> &TableLocks {
        &self.locks
    }

    fn fetch(&self, table: &str, keys: &[Key]) -> Result<HashMap<Key, StoredRow>, StorageError> {
        let table = Self::checked_table(table)?;
        let conn = self.conn.lock();
        if !Self::table_exists(&conn, table)? {
            return Ok(HashMap::new());
        }

        let mut found = HashMap::new();
        let mut stmt = conn.prepare(&schema::select_row(table))?;
        for key in keys {
            let mut rows = stmt.query([key.encode()])?;
            if let Some(row) = rows.next()? {
                let record: String = row.get(0)?;
                let created_at: String = row.get(1)?;
                let updated_at: String = row.get(2)?;
                found.insert(key.clone(), decode_row(&record, &created_at, &updated_at)?);
            }
        }
        Ok(found)
    }

    fn apply(
        &self,
        table: &str,
        changes: &[RowChange],
        deadline: Option<Instant>,
    ) -> Result<usize, StorageError> {
        let table = Self::checked_table(table)?;
        let mut conn = match deadline {
            Some(deadline) => self
                .conn
                .try_lock_until(deadline)
                .ok_or_else(|| lock_expired(table))?,
            None => self.conn.lock(),
        };
        check_deadline(deadline, table)?;

        let tx = conn.transaction()?;
        tx.execute_batch(&schema::create_target_table(table))?;
        {
            let mut stmt = tx.prepare(&schema::upsert_row(table))?;
            for change in changes {
                stmt.execute(duckdb::params![
                    change.key.encode(),
                    serde_json::to_string(change.key.parts())?,
                    serde_json::to_string(&change.row.record)?,
                    change.row.created_at.to_rfc3339(),
                    change.row.updated_at.to_rfc3339(),
                ])?;
            }
        }

        // Dropping the transaction rolls it back
        check_deadline(deadline, table)?;
        let count: i64 = tx.query_row(&schema::count_rows(table), [], |row| row.get(0))?;
        tx.commit()?;

        tracing::debug!(table, changes = changes.len(), rows = count, "Committed change set");
        Ok(count as usize)
    }

    fn row_count(&self, table: &str) -> Result<usize, StorageError> {
        let table = Self::checked_table(table)?;
        let conn = self.conn.lock();
        if !Self::table_exists(&conn, table)? {
            return Ok(0);
        }
        let count: i64 = conn.query_row(&schema::count_rows(table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn scan(&self, table: &str) -> Result<Vec<(Key, StoredRow)>, StorageError> {
        let table = Self::checked_table(table)?;
        let conn = self.conn.lock();
        if !Self::table_exists(&conn, table)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&schema::select_all(table))?;
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let key_parts: String = row.get(0)?;
            let record: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            let updated_at: String = row.get(3)?;
            let key = Key::new(serde_json::from_str(&key_parts)?);
            result.push((key, decode_row(&record, &created_at, &updated_at)?));
        }
        Ok(result)
    }
}

impl From<duckdb::Error> for StorageError {
    fn from(err: duckdb::Error) -> Self {
        StorageError::BackendError(err.to_string())
    }
}
