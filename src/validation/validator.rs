//! Batch validator

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, info_span};

use super::clean::clean_batch;
use super::error::ValidationError;
use super::result::{
    Category, DataProfile, Status, Validated, ValidationMode, ValidationResult, Violation, aggregate,
};
use super::rules::{BusinessRule, ColumnType, CompareOp, Operand, RuleSet, Severity};
use super::stats::{self, DEFAULT_MIN_SAMPLES, DEFAULT_NULL_THRESHOLD};
use crate::models::{Batch, Key, Record, RowRef, Value};

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Tunables shared by every rule set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorSettings {
    /// Null ratio above which a column is flagged, unless the rule set overrides it
    pub null_threshold: f64,
    /// Minimum numeric values before outlier detection runs
    pub min_samples: usize,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            null_threshold: DEFAULT_NULL_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Keys known per entity for referential checks
///
/// One scope spans a pipeline run: every batch that passes validation in
/// the scope adds its keys, so later batches may reference them.
#[derive(Debug, Clone, Default)]
pub struct ReferenceScope {
    keys: HashMap<String, HashSet<Key>>,
}

impl ReferenceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add known keys for an entity
    pub fn add_keys(&mut self, entity: &str, keys: impl IntoIterator<Item = Key>) {
        self.keys.entry(entity.to_string()).or_default().extend(keys);
    }

    pub fn with_keys(mut self, entity: &str, keys: impl IntoIterator<Item = Key>) -> Self {
        self.add_keys(entity, keys);
        self
    }

    pub fn contains(&self, entity: &str, key: &Key) -> bool {
        self.keys.get(entity).is_some_and(|keys| keys.contains(key))
    }

    pub fn knows(&self, entity: &str) -> bool {
        self.keys.contains_key(entity)
    }

    pub fn key_count(&self, entity: &str) -> usize {
        self.keys.get(entity).map_or(0, HashSet::len)
    }
}

/// Classifies batches against registered rule sets
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rule_sets: HashMap<String, RuleSet>,
    patterns: HashMap<String, Regex>,
    settings: ValidatorSettings,
}

impl Validator {
    pub fn new(settings: ValidatorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Validate and register a rule set, replacing any previous one for the entity
    pub fn register(&mut self, rules: RuleSet) -> Result<(), ValidationError> {
        rules.validate()?;
        for rule in &rules.rules {
            if let BusinessRule::Pattern { id, pattern, .. } = rule {
                let regex = Regex::new(pattern).map_err(|e| ValidationError::InvalidRule {
                    entity: rules.entity.clone(),
                    rule: id.clone(),
                    reason: e.to_string(),
                })?;
                self.patterns.insert(pattern.clone(), regex);
            }
        }
        debug!(entity = %rules.entity, rules = rules.rules.len(), "Registered rule set");
        self.rule_sets.insert(rules.entity.clone(), rules);
        Ok(())
    }

    pub fn with_rule_set(mut self, rules: RuleSet) -> Result<Self, ValidationError> {
        self.register(rules)?;
        Ok(self)
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    pub fn rule_set(&self, entity: &str) -> Option<&RuleSet> {
        self.rule_sets.get(entity)
    }

    /// Registered entity names, sorted
    pub fn entities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rule_sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate a batch against caller-supplied reference keys
    pub fn validate(
        &self,
        entity: &str,
        batch: &Batch,
        mode: ValidationMode,
        references: &ReferenceScope,
    ) -> Result<Validated, ValidationError> {
        let rules = self
            .rule_sets
            .get(entity)
            .ok_or_else(|| ValidationError::UnknownEntity(entity.to_string()))?;

        let _span = info_span!("validate", entity = %entity, rows = batch.len(), mode = ?mode).entered();

        let now = Utc::now();
        let validated = match mode {
            ValidationMode::Reject => Validated {
                result: self.check(rules, batch, references, now),
                batch: batch.clone(),
            },
            ValidationMode::Clean => {
                let cleaned = clean_batch(rules, batch);
                Validated {
                    result: self.check(rules, &cleaned, references, now),
                    batch: cleaned,
                }
            }
            ValidationMode::Filter => filter(self.check(rules, batch, references, now), batch),
        };

        info!(
            status = %validated.result.status,
            errors = validated.result.errors().count(),
            warnings = validated.result.warnings().count(),
            rejected = validated.result.rejected_rows.len(),
            "Validation complete"
        );
        Ok(validated)
    }

    /// Validate within a run scope; keys of a loadable batch join the scope
    pub fn validate_in_scope(
        &self,
        entity: &str,
        batch: &Batch,
        mode: ValidationMode,
        scope: &mut ReferenceScope,
    ) -> Result<Validated, ValidationError> {
        let validated = self.validate(entity, batch, mode, scope)?;
        if !validated.result.status.is_loadable() {
            return Ok(validated);
        }
        if let Some(rules) = self.rule_sets.get(entity) {
            let keys: Vec<Key> = validated
                .batch
                .iter()
                .filter_map(|record| record.key(&rules.key_columns).ok())
                .collect();
            scope.add_keys(entity, keys);
        }
        Ok(validated)
    }

    fn check(
        &self,
        rules: &RuleSet,
        batch: &Batch,
        references: &ReferenceScope,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let mut violations = Vec::new();
        let mut profile = DataProfile::default();

        if batch.is_empty() {
            violations.push(Violation {
                rule_id: "structural:empty_batch".to_string(),
                category: Category::Structural,
                severity: Severity::Error,
                rows: Vec::new(),
                message: "batch contains no records".to_string(),
            });
        } else {
            let refs = |index: usize| row_ref(rules, batch, index);
            self.check_structure(rules, batch, &refs, &mut violations);
            self.check_business(rules, batch, now, &refs, &mut violations);
            check_references(rules, batch, references, &refs, &mut violations);
            profile = self.check_statistics(rules, batch, &mut violations);
        }

        ValidationResult {
            entity: rules.entity.clone(),
            status: aggregate(&violations),
            row_count: batch.len(),
            violations,
            profile,
            rejected_rows: Vec::new(),
        }
    }

    fn check_structure(
        &self,
        rules: &RuleSet,
        batch: &Batch,
        refs: &dyn Fn(usize) -> RowRef,
        violations: &mut Vec<Violation>,
    ) {
        let required = rules
            .key_columns
            .iter()
            .chain(rules.columns.iter().filter(|c| c.required).map(|c| &c.name));
        let mut seen = HashSet::new();
        for column in required {
            if !seen.insert(column.as_str()) {
                continue;
            }
            let rows = matching_rows(batch, |record| record.value(column).is_null());
            push(
                violations,
                format!("structural:required:{}", column),
                Category::Structural,
                Severity::Error,
                &rows,
                refs,
                format!("required column '{}' is missing or null", column),
            );
        }

        for column in &rules.columns {
            let column_type = column.column_type;
            let rows = matching_rows(batch, |record| {
                let value = record.value(&column.name);
                !value.is_null() && !matches_type(value, column_type)
            });
            push(
                violations,
                format!("structural:type:{}", column.name),
                Category::Structural,
                Severity::Error,
                &rows,
                refs,
                format!("column '{}' expects {:?} values", column.name, column_type),
            );

            if matches!(column_type, ColumnType::Email | ColumnType::Phone) {
                let rows = matching_rows(batch, |record| {
                    let value = record.value(&column.name);
                    matches_type(value, column_type) && !matches_format(value, column_type)
                });
                push(
                    violations,
                    format!("structural:format:{}", column.name),
                    Category::Structural,
                    Severity::Warning,
                    &rows,
                    refs,
                    format!("column '{}' has invalid {:?} formats", column.name, column_type),
                );
            }
        }
    }

    fn check_business(
        &self,
        rules: &RuleSet,
        batch: &Batch,
        now: DateTime<Utc>,
        refs: &dyn Fn(usize) -> RowRef,
        violations: &mut Vec<Violation>,
    ) {
        for rule in &rules.rules {
            let rows = match rule {
                BusinessRule::Compare {
                    column, op, operand, ..
                } => matching_rows(batch, |record| {
                    compare(record, column, *op, operand, now) == Some(false)
                }),
                BusinessRule::Pattern {
                    column, pattern, ..
                } => match self.patterns.get(pattern) {
                    Some(regex) => matching_rows(batch, |record| match record.value(column) {
                        Value::Null => false,
                        Value::Text(text) => !regex.is_match(text),
                        other => !regex.is_match(&other.to_string()),
                    }),
                    None => Vec::new(),
                },
            };
            push(
                violations,
                format!("business:{}", rule.id()),
                Category::Business,
                rule.severity(),
                &rows,
                refs,
                format!("expected {}", rule.describe()),
            );
        }

        for column in &rules.unique_columns {
            let rows = repeated_rows(batch, |record| {
                record.value(column).key_component().map(|part| Key::new(vec![part]))
            });
            push(
                violations,
                format!("business:unique:{}", column),
                Category::Business,
                Severity::Error,
                &rows,
                refs,
                format!("column '{}' must be unique within the batch", column),
            );
        }

        if !rules.key_columns.is_empty() {
            let rows = repeated_rows(batch, |record| record.key(&rules.key_columns).ok());
            push(
                violations,
                "business:duplicate_key".to_string(),
                Category::Business,
                rules.duplicate_key_severity,
                &rows,
                refs,
                "business key repeats within the batch; the last occurrence wins".to_string(),
            );
        }
    }

    /// Null-ratio and outlier warnings; returns the batch profile
    fn check_statistics(
        &self,
        rules: &RuleSet,
        batch: &Batch,
        violations: &mut Vec<Violation>,
    ) -> DataProfile {
        let threshold = rules.null_threshold.unwrap_or(self.settings.null_threshold);
        let total = batch.len() as f64;
        let mut columns = batch.columns();
        for column in &rules.columns {
            if !columns.contains(&column.name) {
                columns.push(column.name.clone());
            }
        }
        for column in &columns {
            let nulls = batch.iter().filter(|r| r.value(column).is_null()).count();
            let ratio = nulls as f64 / total;
            if ratio > threshold {
                violations.push(Violation {
                    rule_id: format!("statistical:null_ratio:{}", column),
                    category: Category::Statistical,
                    severity: Severity::Warning,
                    rows: Vec::new(),
                    message: format!(
                        "column '{}' has {:.2}% null values (threshold {:.2}%)",
                        column,
                        ratio * 100.0,
                        threshold * 100.0
                    ),
                });
            }
        }

        for outlier in &rules.outliers {
            let values: Vec<(usize, f64)> = batch
                .iter()
                .enumerate()
                .filter_map(|(index, record)| {
                    record.value(&outlier.column).parse_number().map(|v| (index, v))
                })
                .collect();
            let rows = stats::outliers(&values, outlier.method, self.settings.min_samples);
            push(
                violations,
                format!("statistical:outlier:{}", outlier.column),
                Category::Statistical,
                Severity::Warning,
                &rows,
                &|index| row_ref(rules, batch, index),
                format!("outlier values in '{}' ({:?})", outlier.column, outlier.method),
            );
        }

        let profile = DataProfile::of(batch, &columns);
        debug!(
            columns = profile.column_count,
            duplicate_rows = profile.duplicate_rows,
            "Profiled batch"
        );
        profile
    }
}

fn check_references(
    rules: &RuleSet,
    batch: &Batch,
    references: &ReferenceScope,
    refs: &dyn Fn(usize) -> RowRef,
    violations: &mut Vec<Violation>,
) {
    for reference in &rules.references {
        let self_reference = reference.entity == rules.entity;
        let mut earlier: HashSet<Key> = HashSet::new();
        let mut rows = Vec::new();

        for (index, record) in batch.iter().enumerate() {
            if let Some(part) = record.value(&reference.column).key_component() {
                let key = Key::new(vec![part]);
                let resolved = references.contains(&reference.entity, &key)
                    || (self_reference && earlier.contains(&key));
                if !resolved {
                    rows.push(index);
                }
            }
            if self_reference {
                earlier.extend(record.key(&rules.key_columns).ok());
            }
        }

        push(
            violations,
            format!("referential:{}", reference.column),
            Category::Referential,
            reference.severity,
            &rows,
            refs,
            format!(
                "values of '{}' must reference known {} keys ({} known)",
                reference.column,
                reference.entity,
                references.key_count(&reference.entity)
            ),
        );
    }
}

/// Rows removed in filter mode; status per the filter contract
fn filter(mut result: ValidationResult, batch: &Batch) -> Validated {
    let mut rejected: Vec<usize> = Vec::new();
    let mut unattributable = false;
    for violation in result.errors() {
        if violation.is_row_attributable() {
            rejected.extend(violation.rows.iter().map(|row| row.index));
        } else {
            unattributable = true;
        }
    }
    rejected.sort_unstable();
    rejected.dedup();

    let survivors: Batch = batch
        .iter()
        .enumerate()
        .filter(|(index, _)| rejected.binary_search(index).is_err())
        .map(|(_, record)| record.clone())
        .collect();

    if result.status == Status::Fail {
        result.status = if unattributable || survivors.is_empty() {
            Status::Fail
        } else {
            Status::Warn
        };
    }
    result.rejected_rows = result
        .violations
        .iter()
        .filter(|v| v.is_error())
        .flat_map(|v| v.rows.iter().cloned())
        .fold(Vec::new(), |mut acc: Vec<RowRef>, row| {
            if !acc.iter().any(|r| r.index == row.index) {
                acc.push(row);
            }
            acc
        });
    result.rejected_rows.sort_by_key(|row| row.index);

    Validated {
        result,
        batch: survivors,
    }
}

fn row_ref(rules: &RuleSet, batch: &Batch, index: usize) -> RowRef {
    let key = batch
        .records()
        .get(index)
        .filter(|_| !rules.key_columns.is_empty())
        .and_then(|record| record.key(&rules.key_columns).ok());
    RowRef { index, key }
}

fn push(
    violations: &mut Vec<Violation>,
    rule_id: String,
    category: Category,
    severity: Severity,
    rows: &[usize],
    refs: &dyn Fn(usize) -> RowRef,
    detail: String,
) {
    if rows.is_empty() {
        return;
    }
    violations.push(Violation {
        rule_id,
        category,
        severity,
        rows: rows.iter().map(|&index| refs(index)).collect(),
        message: format!("{} row(s): {}", rows.len(), detail),
    });
}

fn matching_rows(batch: &Batch, predicate: impl Fn(&Record) -> bool) -> Vec<usize> {
    batch
        .iter()
        .enumerate()
        .filter(|(_, record)| predicate(record))
        .map(|(index, _)| index)
        .collect()
}

/// Every occurrence of a repeated key except the last one
fn repeated_rows(batch: &Batch, key: impl Fn(&Record) -> Option<Key>) -> Vec<usize> {
    let mut last: HashMap<Key, usize> = HashMap::new();
    let keys: Vec<Option<Key>> = batch.iter().map(&key).collect();
    for (index, key) in keys.iter().enumerate() {
        if let Some(key) = key {
            last.insert(key.clone(), index);
        }
    }
    keys.iter()
        .enumerate()
        .filter_map(|(index, key)| {
            let key = key.as_ref()?;
            (last.get(key) != Some(&index)).then_some(index)
        })
        .collect()
}

fn matches_type(value: &Value, column_type: ColumnType) -> bool {
    match column_type {
        ColumnType::Text => true,
        ColumnType::Number => value.parse_number().is_some(),
        ColumnType::Integer => value.parse_number().is_some_and(|f| f.fract() == 0.0),
        ColumnType::Timestamp => value.parse_timestamp().is_some(),
        ColumnType::Boolean => value.parse_bool().is_some(),
        ColumnType::Email => matches!(value, Value::Text(_)),
        ColumnType::Phone => matches!(value, Value::Text(_) | Value::Integer(_)),
    }
}

fn matches_format(value: &Value, column_type: ColumnType) -> bool {
    match (column_type, value) {
        (ColumnType::Email, Value::Text(text)) => EMAIL_REGEX.is_match(text.trim()),
        (ColumnType::Phone, value) => {
            let digits = value
                .to_string()
                .chars()
                .filter(char::is_ascii_digit)
                .count();
            (10..=15).contains(&digits)
        }
        _ => true,
    }
}

/// `Some(true)` when the comparison holds, `None` when it cannot be evaluated
fn compare(
    record: &Record,
    column: &str,
    op: CompareOp,
    operand: &Operand,
    now: DateTime<Utc>,
) -> Option<bool> {
    let left = record.value(column);
    if left.is_null() {
        return None;
    }
    match operand {
        Operand::Literal(right) => left.parse_number().map(|l| op.holds(l, *right)),
        Operand::Now => left.parse_timestamp().map(|l| op.holds(l, now)),
        Operand::Column(other) => {
            let right = record.value(other);
            if right.is_null() {
                return None;
            }
            if let (Some(l), Some(r)) = (left.parse_number(), right.parse_number()) {
                return Some(op.holds(l, r));
            }
            if let (Some(l), Some(r)) = (left.parse_timestamp(), right.parse_timestamp()) {
                return Some(op.holds(l, r));
            }
            match (left, right) {
                (Value::Text(l), Value::Text(r)) => Some(op.holds(l, r)),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::OutlierMethod;

    fn products() -> Validator {
        Validator::default()
            .with_rule_set(
                RuleSet::new("products", &["product_id"])
                    .required("product_id", ColumnType::Integer)
                    .required("price", ColumnType::Number)
                    .optional("cost", ColumnType::Number)
                    .rule(BusinessRule::compare(
                        "price_positive",
                        "price",
                        CompareOp::Gt,
                        Operand::Literal(0.0),
                    ))
                    .rule(
                        BusinessRule::compare(
                            "cost_within_price",
                            "cost",
                            CompareOp::Le,
                            Operand::Column("price".into()),
                        )
                        .with_severity(Severity::Warning),
                    ),
            )
            .unwrap()
    }

    fn product(id: i64, price: f64, cost: f64) -> Record {
        Record::new()
            .with("product_id", id)
            .with("price", price)
            .with("cost", cost)
    }

    fn run(validator: &Validator, batch: &Batch, mode: ValidationMode) -> Validated {
        validator
            .validate("products", batch, mode, &ReferenceScope::new())
            .unwrap()
    }

    #[test]
    fn test_pass() {
        let batch = Batch::new(vec![product(1, 10.0, 4.0), product(2, 20.0, 8.0)]);
        let validated = run(&products(), &batch, ValidationMode::Reject);
        assert_eq!(validated.result.status, Status::Pass);
        assert!(validated.result.violations.is_empty());
    }

    #[test]
    fn test_error_fails_and_names_row() {
        let batch = Batch::new(vec![product(1, 10.0, 4.0), product(2, -1.0, 0.0)]);
        let result = run(&products(), &batch, ValidationMode::Reject).result;
        assert_eq!(result.status, Status::Fail);
        let violation = result.violation("business:price_positive").unwrap();
        assert_eq!(violation.rows.len(), 1);
        assert_eq!(violation.rows[0].index, 1);
        assert_eq!(violation.rows[0].key, Key::single(2));
    }

    #[test]
    fn test_warning_severity_rule() {
        let batch = Batch::new(vec![product(1, 10.0, 12.0)]);
        let result = run(&products(), &batch, ValidationMode::Reject).result;
        assert_eq!(result.status, Status::Warn);
        assert_eq!(result.warnings().next().unwrap().rule_id, "business:cost_within_price");
    }

    #[test]
    fn test_empty_batch_fails() {
        let result = run(&products(), &Batch::default(), ValidationMode::Reject).result;
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.error_ids(), vec!["structural:empty_batch"]);
    }

    #[test]
    fn test_unknown_entity() {
        let err = products()
            .validate("returns", &Batch::default(), ValidationMode::Reject, &ReferenceScope::new())
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownEntity("returns".into()));
    }

    #[test]
    fn test_type_and_required_checks() {
        let batch = Batch::new(vec![
            Record::new().with("product_id", 1).with("price", "cheap"),
            Record::new().with("product_id", 2.5).with("price", 3),
            Record::new().with("price", 3),
        ]);
        let result = run(&products(), &batch, ValidationMode::Reject).result;
        let ids = result.error_ids();
        assert!(ids.contains(&"structural:type:price".to_string()));
        assert!(ids.contains(&"structural:type:product_id".to_string()));
        assert!(ids.contains(&"structural:required:product_id".to_string()));
    }

    #[test]
    fn test_duplicate_keys_warn_on_superseded_rows() {
        let batch = Batch::new(vec![product(1, 10.0, 4.0), product(1, 11.0, 4.0)]);
        let result = run(&products(), &batch, ValidationMode::Reject).result;
        assert_eq!(result.status, Status::Warn);
        let violation = result.violation("business:duplicate_key").unwrap();
        assert_eq!(violation.rows.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_filter_mode_drops_rows() {
        let batch = Batch::new(vec![
            product(1, 10.0, 4.0),
            product(2, 0.0, 0.0),
            product(3, 5.0, 1.0),
        ]);
        let validated = run(&products(), &batch, ValidationMode::Filter);
        assert_eq!(validated.result.status, Status::Warn);
        assert_eq!(validated.batch.len(), 2);
        assert_eq!(validated.result.rejected_rows.len(), 1);
        assert_eq!(validated.result.rejected_rows[0].index, 1);
    }

    #[test]
    fn test_filter_mode_fails_without_survivors() {
        let batch = Batch::new(vec![product(1, 0.0, 0.0)]);
        let validated = run(&products(), &batch, ValidationMode::Filter);
        assert_eq!(validated.result.status, Status::Fail);
        assert!(validated.batch.is_empty());
    }

    #[test]
    fn test_null_ratio_warning() {
        let mut records: Vec<Record> = (1..=5).map(|id| product(id, 10.0, 4.0)).collect();
        records[0].insert("cost", Value::Null);
        let result = run(&products(), &Batch::new(records), ValidationMode::Reject).result;
        assert_eq!(result.status, Status::Warn);
        assert!(result.violation("statistical:null_ratio:cost").is_some());
    }

    #[test]
    fn test_outlier_warning() {
        let validator = Validator::default()
            .with_rule_set(
                RuleSet::new("orders", &["order_id"])
                    .required("order_total", ColumnType::Number)
                    .outlier("order_total", OutlierMethod::iqr()),
            )
            .unwrap();
        let totals = [10.0, 12.0, 11.0, 13.0, 12.0, 11.0, 10.0, 950.0];
        let batch: Batch = totals
            .iter()
            .enumerate()
            .map(|(i, t)| Record::new().with("order_id", i as i64).with("order_total", *t))
            .collect();
        let result = validator
            .validate("orders", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Warn);
        let outlier = result.violation("statistical:outlier:order_total").unwrap();
        assert_eq!(outlier.rows[0].index, 7);
    }

    #[test]
    fn test_self_reference_within_batch() {
        let validator = Validator::default()
            .with_rule_set(
                RuleSet::new("categories", &["category_id"]).reference("parent_id", "categories"),
            )
            .unwrap();
        let batch = Batch::new(vec![
            Record::new().with("category_id", 1).with("parent_id", Value::Null),
            Record::new().with("category_id", 2).with("parent_id", 1),
            Record::new().with("category_id", 3).with("parent_id", 9),
        ]);
        let result = validator
            .validate("categories", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Fail);
        let violation = result.violation("referential:parent_id").unwrap();
        assert_eq!(violation.rows.len(), 1);
        assert_eq!(violation.rows[0].index, 2);
    }

    #[test]
    fn test_email_and_phone_formats_warn() {
        let validator = Validator::default()
            .with_rule_set(
                RuleSet::new("customers", &["customer_id"])
                    .optional("email", ColumnType::Email)
                    .optional("phone", ColumnType::Phone),
            )
            .unwrap();
        let batch = Batch::new(vec![
            Record::new()
                .with("customer_id", 1)
                .with("email", "ada@example.com")
                .with("phone", "555-010-9999"),
            Record::new()
                .with("customer_id", 2)
                .with("email", "not-an-email")
                .with("phone", "12"),
        ]);
        let result = validator
            .validate("customers", &batch, ValidationMode::Reject, &ReferenceScope::new())
            .unwrap()
            .result;
        assert_eq!(result.status, Status::Warn);
        assert!(result.violation("structural:format:email").is_some());
        assert!(result.violation("structural:format:phone").is_some());
    }
}
