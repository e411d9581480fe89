//! Validator tests against the built-in catalog

use warehouse_reconcile::validation::{BusinessRule, ColumnType, CompareOp, Operand, Severity};
use warehouse_reconcile::{
    Batch, Catalog, EntityConfig, Key, Record, ReferenceScope, RuleSet, Status, TableConfig,
    ValidationMode, Validator, ValidatorSettings, Value,
};

fn validator() -> Validator {
    Catalog::ecommerce()
        .validator(ValidatorSettings::default())
        .unwrap()
}

fn product(id: i64, price: f64) -> Record {
    Record::new()
        .with("product_id", id)
        .with("product_name", format!("Product {}", id))
        .with("price", price)
        .with("cost", 1.0)
        .with("weight", 0.5)
        .with("created_date", "2024-01-01")
        .with("updated_date", "2024-01-02")
}

fn customer(id: i64, email: &str) -> Record {
    Record::new()
        .with("customer_id", id)
        .with("first_name", "Ada")
        .with("last_name", "Lovelace")
        .with("email", email)
        .with("phone", "+1 (555) 010-2000")
        .with("registration_date", "2023-06-01")
        .with("last_login", "2024-06-01T12:00:00Z")
}

fn order(id: i64, customer_id: i64) -> Record {
    Record::new()
        .with("order_id", id)
        .with("customer_id", customer_id)
        .with("order_date", "2024-03-01T10:00:00Z")
        .with("order_total", 40.0)
        .with("tax_amount", 3.2)
        .with("shipping_cost", 4.99)
}

mod business_rule_tests {
    use super::*;

    #[test]
    fn test_single_negative_price_fails_closed() {
        let batch = Batch::new(vec![product(1, 10.0), product(2, -5.0), product(3, 12.0)]);
        let result = validator()
            .validate("products", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;

        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.error_ids(), vec!["business:price_positive"]);
        let violation = result.violation("business:price_positive").unwrap();
        assert_eq!(violation.rows.len(), 1);
        assert_eq!(violation.rows[0].index, 1);
        assert_eq!(violation.rows[0].key, Key::single(2));
    }

    #[test]
    fn test_outlier_only_warns_and_clean_keeps_rows() {
        let mut records: Vec<Record> = (1..=19).map(|id| product(id, 10.0)).collect();
        records.push(product(20, 1000.0));
        let batch = Batch::new(records);

        let validated = validator()
            .validate("products", &batch, ValidationMode::Clean, &ReferenceScope::new())
            .unwrap();
        assert_eq!(validated.result.status, Status::Warn);
        assert!(validated.result.errors().next().is_none());
        let outlier = validated.result.violation("statistical:outlier:price").unwrap();
        assert_eq!(outlier.rows[0].index, 19);
        assert_eq!(validated.batch.len(), 20);
    }

    #[test]
    fn test_outlier_found_at_minimum_sample() {
        let prices = [10.0, 12.0, 11.0, 13.0, 12.0, 11.0, 10.0, 95.0];
        let batch: Batch = prices
            .iter()
            .enumerate()
            .map(|(i, price)| product(i as i64 + 1, *price))
            .collect();

        let result = validator()
            .validate("products", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        let outlier = result.violation("statistical:outlier:price").unwrap();
        assert_eq!(outlier.rows.len(), 1);
        assert_eq!(outlier.rows[0].index, 7);
    }

    #[test]
    fn test_result_carries_profile() {
        let batch = Batch::new(vec![
            product(1, 10.0),
            product(1, 10.0),
            product(2, 11.0).with("weight", Value::Null),
        ]);
        let result = validator()
            .validate("products", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;

        let profile = &result.profile;
        assert_eq!(profile.duplicate_rows, 1);
        assert_eq!(profile.null_percentage("price"), Some(0.0));
        assert_eq!(profile.null_percentage("weight"), Some(33.33));
        assert!(profile.column_count >= 7);
    }

    #[test]
    fn test_cost_above_price_is_warning() {
        let batch = Batch::new(vec![product(1, 10.0).with("cost", 11.0)]);
        let result = validator()
            .validate("products", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Warn);
        assert!(result.violation("business:cost_within_price").is_some());
    }

    #[test]
    fn test_future_order_date_fails() {
        let scope = ReferenceScope::new().with_keys("customers", Key::single(1));
        let batch = Batch::new(vec![order(1, 1).with("order_date", "2999-01-01T00:00:00Z")]);
        let result = validator()
            .validate("orders", &batch, ValidationMode::Reject, &scope)
            .unwrap()
            .result;
        assert_eq!(result.error_ids(), vec!["business:order_date_not_future"]);
    }

    #[test]
    fn test_duplicate_email_is_error() {
        let batch = Batch::new(vec![customer(1, "a@example.com"), customer(2, "a@example.com")]);
        let result = validator()
            .validate("customers", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.error_ids(), vec!["business:unique:email"]);
    }
}

mod mode_tests {
    use super::*;

    #[test]
    fn test_clean_mode_coerces_text() {
        let batch = Batch::new(vec![
            customer(1, "  Ada@Example.COM ").with("customer_id", "1"),
            customer(2, "b@example.com").with("phone", "N/A"),
        ]);

        let rejected = validator()
            .validate("customers", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap();
        assert!(rejected.result.violation("structural:type:customer_id").is_some());

        let cleaned = validator()
            .validate("customers", &batch, ValidationMode::Clean, &ReferenceScope::new())
            .unwrap();
        assert!(cleaned.result.status.is_loadable());
        let first = &cleaned.batch.records()[0];
        assert_eq!(first.value("customer_id").as_f64(), Some(1.0));
        assert_eq!(first.value("email").as_str(), Some("ada@example.com"));
        assert!(cleaned.batch.records()[1].value("phone").is_null());
    }

    #[test]
    fn test_filter_mode_drops_offending_rows() {
        let batch = Batch::new(vec![product(1, 10.0), product(2, -5.0), product(3, 12.0)]);
        let validated = validator()
            .validate("products", &batch, ValidationMode::Filter, &ReferenceScope::new())
            .unwrap();
        assert_eq!(validated.result.status, Status::Warn);
        assert_eq!(validated.batch.len(), 2);
        assert_eq!(validated.result.rejected_rows.len(), 1);
        assert_eq!(validated.result.rejected_rows[0].index, 1);
    }
}

mod referential_tests {
    use super::*;

    #[test]
    fn test_scope_closure_across_batches() {
        let validator = validator();
        let mut scope = ReferenceScope::new();

        let customers = Batch::new(vec![customer(1, "a@example.com"), customer(2, "b@example.com")]);
        let result = validator
            .validate_in_scope("customers", &customers, ValidationMode::Reject, &mut scope)
            .unwrap()
            .result;
        assert!(result.status.is_loadable());
        assert_eq!(scope.key_count("customers"), 2);

        let orders = Batch::new(vec![order(10, 1), order(11, 2)]);
        let result = validator
            .validate_in_scope("orders", &orders, ValidationMode::Reject, &mut scope)
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Pass);

        let orphans = Batch::new(vec![order(12, 3)]);
        let result = validator
            .validate_in_scope("orders", &orphans, ValidationMode::Reject, &mut scope)
            .unwrap()
            .result;
        assert_eq!(result.error_ids(), vec!["referential:customer_id"]);
        assert_eq!(scope.key_count("orders"), 2);
    }

    #[test]
    fn test_unknown_referenced_entity_counts_as_empty() {
        let batch = Batch::new(vec![order(10, 1)]);
        let result = validator()
            .validate("orders", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Fail);
    }

    #[test]
    fn test_self_reference_resolves_within_batch() {
        let categories = EntityConfig::new(
            RuleSet::new("categories", &["category_id"])
                .required("category_id", ColumnType::Integer)
                .optional("parent_id", ColumnType::Integer)
                .reference("parent_id", "categories")
                .null_threshold(1.0),
            TableConfig::new("dim_categories", &["category_id"]),
        );
        let validator = Catalog::ecommerce()
            .with_entities([categories])
            .validator(ValidatorSettings::default())
            .unwrap();

        let category = |id: i64, parent: Option<i64>| {
            let record = Record::new().with("category_id", id);
            match parent {
                Some(parent) => record.with("parent_id", parent),
                None => record,
            }
        };

        let ordered = Batch::new(vec![category(1, None), category(2, Some(1)), category(3, Some(2))]);
        let result = validator
            .validate("categories", &ordered, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Pass);

        let dangling = Batch::new(vec![category(1, None), category(2, Some(9))]);
        let result = validator
            .validate("categories", &dangling, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.error_ids(), vec!["referential:parent_id"]);
    }
}

mod custom_rule_tests {
    use super::*;

    #[test]
    fn test_pattern_and_column_comparison() {
        let rules = RuleSet::new("shipments", &["shipment_id"])
            .required("shipment_id", ColumnType::Text)
            .required("shipped_at", ColumnType::Timestamp)
            .required("delivered_at", ColumnType::Timestamp)
            .rule(BusinessRule::pattern("tracking_format", "shipment_id", r"^SH-\d{4}$"))
            .rule(
                BusinessRule::compare(
                    "delivered_after_shipped",
                    "delivered_at",
                    CompareOp::Ge,
                    Operand::Column("shipped_at".to_string()),
                )
                .with_severity(Severity::Warning),
            );
        let validator = Validator::new(ValidatorSettings::default())
            .with_rule_set(rules)
            .unwrap();

        let batch = Batch::new(vec![
            Record::new()
                .with("shipment_id", "SH-0001")
                .with("shipped_at", "2024-01-02T00:00:00Z")
                .with("delivered_at", "2024-01-01T00:00:00Z"),
            Record::new()
                .with("shipment_id", "bogus")
                .with("shipped_at", "2024-01-02T00:00:00Z")
                .with("delivered_at", "2024-01-03T00:00:00Z"),
        ]);
        let result = validator
            .validate("shipments", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;

        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.error_ids(), vec!["business:tracking_format"]);
        let late = result.violation("business:delivered_after_shipped").unwrap();
        assert!(!late.is_error());
        assert_eq!(late.rows[0].index, 0);
    }
}
