//! Per-table write locks, shared by every loader writing through one store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

/// Guard held for the duration of one reconciliation
pub type TableGuard = ArcMutexGuard<RawMutex, ()>;

/// Registry of exclusive write locks, one per target table
///
/// Loads on the same table serialize; loads on different tables do not
/// contend beyond the brief registry lookup.
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, table: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(table.to_string()).or_default())
    }

    /// Acquire the lock for `table`, giving up at `deadline`
    pub fn acquire(&self, table: &str, deadline: Option<Instant>) -> Option<TableGuard> {
        let handle = self.handle(table);
        match deadline {
            Some(deadline) => handle.try_lock_arc_until(deadline),
            None => Some(handle.lock_arc()),
        }
    }
}
