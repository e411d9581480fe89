//! Keyed upsert of a batch into a target table

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use super::error::LoadError;
use super::table::TableDefinition;
use crate::models::{Batch, Key, Record};
use crate::storage::{ChangeKind, RowChange, StoredRow, TargetStore};

/// Shared cancellation flag, checked before commit
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for a single load
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Load timestamp; defaults to the time the load starts
    pub as_of: Option<DateTime<Utc>>,
    /// Budget covering lock acquisition and commit
    pub timeout: Option<Duration>,
    /// Leave rows whose incoming record equals the stored one untouched
    pub skip_unchanged: bool,
    /// Keys looked up per store fetch; the commit is still a single call
    pub fetch_chunk: Option<usize>,
    pub cancel: Option<CancelFlag>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    pub fn fetch_chunk(mut self, keys: usize) -> Self {
        self.fetch_chunk = Some(keys.max(1));
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub table: String,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records dropped because a later record in the batch had the same key
    pub duplicates_superseded: usize,
    /// Rows in the table after the commit
    pub row_count: usize,
    pub loaded_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl LoadReport {
    /// Rows written by the commit
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Upserts batches into keyed target tables
///
/// Records are staged (key check, derived columns, in-batch de-duplication)
/// without holding any lock. Reconciliation against the stored rows then runs
/// under the table's exclusive lock, taken from the store so that loaders
/// sharing a store serialize, and commits in one atomic store call.
pub struct ReconcilingLoader<S> {
    store: S,
}

impl<S: TargetStore> ReconcilingLoader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a batch into the definition's table
    pub fn load(
        &self,
        definition: &TableDefinition,
        batch: &Batch,
        options: &LoadOptions,
    ) -> Result<LoadReport, LoadError> {
        let table = definition.name();
        let _span = info_span!("load", table = %table, records = batch.len()).entered();

        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        let loaded_at = options.as_of.unwrap_or_else(Utc::now);

        definition.validate()?;
        let staged = stage(definition, batch)?;
        debug!(
            unique_keys = staged.records.len(),
            superseded = staged.superseded,
            "Staged batch"
        );

        let _guard = self
            .store
            .table_locks()
            .acquire(table, deadline)
            .ok_or_else(|| LoadError::Timeout {
                table: table.to_string(),
                waited_ms: elapsed_ms(started),
            })?;

        let keys: Vec<Key> = staged.records.iter().map(|(key, _)| key.clone()).collect();
        let mut existing = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(options.fetch_chunk.unwrap_or(keys.len()).max(1)) {
            let found = self
                .store
                .fetch(table, chunk)
                .map_err(|e| LoadError::storage(table, e, started.elapsed()))?;
            existing.extend(found);
        }

        let mut report = LoadReport {
            table: table.to_string(),
            inserted: 0,
            updated: 0,
            unchanged: 0,
            duplicates_superseded: staged.superseded,
            row_count: 0,
            loaded_at,
            duration_ms: 0,
        };

        let mut changes = Vec::with_capacity(staged.records.len());
        for (key, record) in staged.records {
            match existing.get(&key) {
                None => {
                    report.inserted += 1;
                    changes.push(RowChange {
                        kind: ChangeKind::Insert,
                        key,
                        row: StoredRow {
                            record,
                            created_at: loaded_at,
                            updated_at: loaded_at,
                        },
                    });
                }
                Some(current) if options.skip_unchanged && current.record == record => {
                    report.unchanged += 1;
                }
                Some(current) => {
                    report.updated += 1;
                    changes.push(RowChange {
                        kind: ChangeKind::Update,
                        key,
                        row: StoredRow {
                            record,
                            created_at: current.created_at,
                            updated_at: loaded_at,
                        },
                    });
                }
            }
        }

        if options.is_cancelled() {
            info!("Load cancelled before commit");
            return Err(LoadError::Cancelled(table.to_string()));
        }

        let committed = if changes.is_empty() {
            self.store.row_count(table)
        } else {
            self.store.apply(table, &changes, deadline)
        };
        report.row_count =
            committed.map_err(|e| LoadError::storage(table, e, started.elapsed()))?;
        report.duration_ms = elapsed_ms(started);

        info!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            row_count = report.row_count,
            duration_ms = report.duration_ms,
            "Load committed"
        );
        Ok(report)
    }
}

struct Staged {
    /// Prepared records in first-seen key order
    records: Vec<(Key, Record)>,
    superseded: usize,
}

fn stage(definition: &TableDefinition, batch: &Batch) -> Result<Staged, LoadError> {
    let mut records: Vec<(Key, Record)> = Vec::with_capacity(batch.len());
    let mut positions: HashMap<Key, usize> = HashMap::with_capacity(batch.len());
    let mut superseded = 0;

    for (row, record) in batch.iter().enumerate() {
        let key = definition.key_of(record, row)?;
        let prepared = definition.prepare_record(record.clone(), row)?;
        match positions.get(&key) {
            Some(&position) => {
                records[position].1 = prepared;
                superseded += 1;
            }
            None => {
                positions.insert(key.clone(), records.len());
                records.push((key, prepared));
            }
        }
    }
    Ok(Staged { records, superseded })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
