//! Pipeline executor tests

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use warehouse_reconcile::storage::{RowChange, TableLocks};
use warehouse_reconcile::{
    Batch, EtlConfig, Key, MemoryStore, PipelineError, PipelineExecutor, Record, Status,
    StorageError, StoredRow, TargetStore, Value,
};

fn fast_config() -> EtlConfig {
    EtlConfig::builder()
        .batch_size(2)
        .max_retries(3)
        .retry_delay(Duration::from_millis(1), Duration::from_millis(4))
        .build()
        .unwrap()
}

fn customers() -> Batch {
    Batch::new(vec![
        Record::new()
            .with("customer_id", 1)
            .with("first_name", "Ada")
            .with("last_name", "Lovelace")
            .with("email", "ada@example.com"),
        Record::new()
            .with("customer_id", 2)
            .with("first_name", "Alan")
            .with("last_name", "Turing")
            .with("email", "alan@example.com"),
    ])
}

fn products() -> Batch {
    Batch::new(vec![
        Record::new()
            .with("product_id", 100)
            .with("product_name", "Kettle")
            .with("price", 40.0)
            .with("cost", 16.0),
        Record::new()
            .with("product_id", 101)
            .with("product_name", "Teapot")
            .with("price", 25.0)
            .with("cost", 10.0),
    ])
}

/// More products than `fast_config`'s batch size
fn three_products() -> Batch {
    let mut batch = products();
    batch.push(
        Record::new()
            .with("product_id", 102)
            .with("product_name", "Mug")
            .with("price", 8.0)
            .with("cost", 2.0),
    );
    batch
}

fn orders() -> Batch {
    Batch::new(vec![
        Record::new()
            .with("order_id", 500)
            .with("customer_id", 1)
            .with("order_date", "2024-04-01T09:30:00Z")
            .with("order_total", 65.0)
            .with("tax_amount", 5.0)
            .with("shipping_cost", 4.0),
    ])
}

fn order_items() -> Batch {
    Batch::new(vec![
        Record::new()
            .with("order_item_id", 1)
            .with("order_id", 500)
            .with("product_id", 100)
            .with("quantity", 1)
            .with("unit_price", 40.0)
            .with("discount_applied", 0.0),
        Record::new()
            .with("order_item_id", 2)
            .with("order_id", 500)
            .with("product_id", 101)
            .with("quantity", 1)
            .with("unit_price", 25.0)
            .with("discount_applied", 5.0),
    ])
}

fn inventory() -> Batch {
    Batch::new(vec![
        Record::new()
            .with("inventory_id", 1)
            .with("product_id", 100)
            .with("quantity_on_hand", 12)
            .with("quantity_reserved", 2)
            .with("reorder_level", 5),
    ])
}

fn all_batches() -> Vec<(String, Batch)> {
    vec![
        ("inventory".to_string(), inventory()),
        ("order_items".to_string(), order_items()),
        ("orders".to_string(), orders()),
        ("products".to_string(), products()),
        ("customers".to_string(), customers()),
    ]
}

/// Store whose first commits fail with the given error
struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicU32,
    error: StorageError,
    applies: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32, error: StorageError) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(failures),
            error,
            applies: AtomicU32::new(0),
        }
    }
}

impl TargetStore for FlakyStore {
    fn table_locks(&self) -> &TableLocks {
        self.inner.table_locks()
    }

    fn fetch(&self, table: &str, keys: &[Key]) -> Result<HashMap<Key, StoredRow>, StorageError> {
        self.inner.fetch(table, keys)
    }

    fn apply(
        &self,
        table: &str,
        changes: &[RowChange],
        deadline: Option<Instant>,
    ) -> Result<usize, StorageError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(self.error.clone());
        }
        self.inner.apply(table, changes, deadline)
    }

    fn row_count(&self, table: &str) -> Result<usize, StorageError> {
        self.inner.row_count(table)
    }

    fn scan(&self, table: &str) -> Result<Vec<(Key, StoredRow)>, StorageError> {
        self.inner.scan(table)
    }
}

mod run_tests {
    use super::*;

    #[test]
    fn test_full_ecommerce_run() {
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let report = executor.run(all_batches()).unwrap();

        let order: Vec<&str> = report.entities.iter().map(|e| e.entity.as_str()).collect();
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(position("customers") < position("orders"));
        assert!(position("orders") < position("order_items"));
        assert!(position("products") < position("inventory"));

        assert_eq!(report.extracted(), 8);
        assert_eq!(report.loaded(), 8);
        assert_eq!(report.rejected(), 0);
        assert_eq!(store.row_count("fact_order_items").unwrap(), 2);

        let item = store
            .get("fact_order_items", &Key::single(2).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(item.record.value("line_total").as_f64(), Some(25.0));
        assert_eq!(item.record.value("discount_percentage").as_f64(), Some(20.0));

        let stock = store
            .get("fact_inventory", &Key::single(1).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stock.record.value("available_quantity").as_f64(), Some(10.0));

        let customer = store
            .get("dim_customers", &Key::single(1).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(customer.record.value("full_name"), &Value::from("Ada Lovelace"));

        let report_json = serde_json::to_value(&report).unwrap();
        assert_eq!(report_json["entities"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_failed_entity_stops_run() {
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let mut bad_items = order_items();
        bad_items.push(
            Record::new()
                .with("order_item_id", 3)
                .with("order_id", 999)
                .with("product_id", 100)
                .with("quantity", 1)
                .with("unit_price", 40.0)
                .with("discount_applied", 0.0),
        );
        let mut batches = all_batches();
        batches.retain(|(name, _)| name != "order_items");
        batches.push(("order_items".to_string(), bad_items));

        let err = executor.run(batches).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        match &err {
            PipelineError::ValidationFailed { entity, rule_ids } => {
                assert_eq!(entity, "order_items");
                assert_eq!(rule_ids, &vec!["referential:order_id".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.row_count("fact_orders").unwrap(), 1);
        assert_eq!(store.row_count("fact_order_items").unwrap(), 0);
    }

    #[test]
    fn test_warnings_do_not_block() {
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let report = executor
            .run([("products".to_string(), products())])
            .unwrap();
        // weight and date columns are absent, which trips the null-ratio check
        let entity = report.entity("products").unwrap();
        assert_eq!(entity.status, Some(Status::Warn));
        assert!(entity.warnings > 0);
        assert_eq!(entity.loaded, 2);
    }
}

mod retry_tests {
    use super::*;

    #[test]
    fn test_transient_failures_are_retried() {
        let store = Arc::new(FlakyStore::new(2, StorageError::Unavailable("connection reset".into())));
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let report = executor.run([("customers".to_string(), customers())]).unwrap();
        assert_eq!(report.loaded(), 2);
        assert_eq!(store.applies.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_permanent_failure_not_retried() {
        let store = Arc::new(FlakyStore::new(5, StorageError::BackendError("disk full".into())));
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let err = executor
            .run([("customers".to_string(), customers())])
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(matches!(err, PipelineError::Load { attempts: 1, .. }));
        assert_eq!(store.applies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entity_batch_commits_once() {
        let store = Arc::new(FlakyStore::new(0, StorageError::BackendError("unused".into())));
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let report = executor
            .run([("products".to_string(), three_products())])
            .unwrap();
        assert_eq!(report.entity("products").unwrap().load.inserted, 3);
        assert_eq!(store.applies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_commit_leaves_table_unchanged() {
        let store = Arc::new(FlakyStore::new(1, StorageError::BackendError("disk full".into())));
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let err = executor
            .run([("products".to_string(), three_products())])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load { attempts: 1, .. }));
        assert_eq!(store.row_count("dim_products").unwrap(), 0);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let store = Arc::new(FlakyStore::new(10, StorageError::Timeout("busy".into())));
        let executor = PipelineExecutor::new(store.clone(), fast_config()).unwrap();
        let err = executor
            .run([("customers".to_string(), customers())])
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert!(err.is_recoverable());
        assert!(matches!(err, PipelineError::Load { attempts: 4, .. }));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_file_adds_entity() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
batch_size: 10
max_retries: 0
entities:
  - rules:
      entity: returns
      key_columns: [return_id]
      columns:
        - {{ name: return_id, type: integer, required: true }}
        - {{ name: order_id, type: integer, required: true }}
        - {{ name: refund, type: number }}
      rules:
        - {{ kind: compare, id: refund_non_negative, column: refund, op: ">=", operand: {{ literal: 0.0 }} }}
      references:
        - {{ column: order_id, entity: orders }}
    table:
      table: fact_returns
      key_columns: [return_id]
"#
        )
        .unwrap();

        let config = EtlConfig::load(Some(file.path())).unwrap();
        let store = Arc::new(MemoryStore::new());
        let executor = PipelineExecutor::new(store.clone(), config).unwrap();

        let returns = Batch::new(vec![
            Record::new()
                .with("return_id", 1)
                .with("order_id", 500)
                .with("refund", 12.5),
        ]);
        let mut batches = vec![("returns".to_string(), returns)];
        batches.push(("customers".to_string(), customers()));
        batches.push(("orders".to_string(), orders()));

        let report = executor.run(batches).unwrap();
        assert_eq!(report.entities.last().unwrap().entity, "returns");
        assert_eq!(store.row_count("fact_returns").unwrap(), 1);
    }
}
