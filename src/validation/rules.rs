//! Rule set definitions
//!
//! A [`RuleSet`] describes what a valid batch of one entity looks like. Rule
//! sets are plain data: they deserialize from configuration files and can be
//! built in code with the chained constructors below.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::input::{validate_column_name, validate_table_name};

/// Severity of a violation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    #[default]
    Error,
}

impl Severity {
    fn warning() -> Self {
        Severity::Warning
    }
}

/// Declared type of a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Integer,
    Timestamp,
    Boolean,
    /// Text that should look like an email address
    Email,
    /// Text or number carrying 10-15 digits
    Phone,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Number | ColumnType::Integer)
    }
}

/// A declared column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Must be present and non-null in every record
    #[serde(default)]
    pub required: bool,
}

/// Comparison operator of a business rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    pub fn holds<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Literal(f64),
    Column(String),
    /// Validation time; compares timestamps
    Now,
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Column(column) => write!(f, "{}", column),
            Operand::Now => write!(f, "now"),
        }
    }
}

/// A business rule evaluated per record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusinessRule {
    /// `column op operand`; rows where either side is null are skipped
    Compare {
        id: String,
        column: String,
        op: CompareOp,
        operand: Operand,
        #[serde(default)]
        severity: Severity,
    },
    /// Non-null text values must match the regex
    Pattern {
        id: String,
        column: String,
        pattern: String,
        #[serde(default)]
        severity: Severity,
    },
}

impl BusinessRule {
    pub fn compare(id: &str, column: &str, op: CompareOp, operand: Operand) -> Self {
        BusinessRule::Compare {
            id: id.to_string(),
            column: column.to_string(),
            op,
            operand,
            severity: Severity::Error,
        }
    }

    pub fn pattern(id: &str, column: &str, pattern: &str) -> Self {
        BusinessRule::Pattern {
            id: id.to_string(),
            column: column.to_string(),
            pattern: pattern.to_string(),
            severity: Severity::Error,
        }
    }

    pub fn with_severity(mut self, level: Severity) -> Self {
        match &mut self {
            BusinessRule::Compare { severity, .. } | BusinessRule::Pattern { severity, .. } => {
                *severity = level
            }
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            BusinessRule::Compare { id, .. } | BusinessRule::Pattern { id, .. } => id,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            BusinessRule::Compare { column, .. } | BusinessRule::Pattern { column, .. } => column,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            BusinessRule::Compare { severity, .. } | BusinessRule::Pattern { severity, .. } => {
                *severity
            }
        }
    }

    /// Human-readable form of the expectation
    pub fn describe(&self) -> String {
        match self {
            BusinessRule::Compare {
                column, op, operand, ..
            } => format!("{} {} {}", column, op.symbol(), operand),
            BusinessRule::Pattern {
                column, pattern, ..
            } => format!("{} matches /{}/", column, pattern),
        }
    }
}

/// A column whose values must resolve to keys of another entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub column: String,
    pub entity: String,
    #[serde(default)]
    pub severity: Severity,
}

/// Outlier detection method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Values more than `threshold` standard deviations from the mean
    ZScore {
        #[serde(default = "default_z_threshold")]
        threshold: f64,
    },
    /// Values outside `[Q1 - k*IQR, Q3 + k*IQR]`
    Iqr {
        #[serde(default = "default_iqr_multiplier")]
        multiplier: f64,
    },
}

pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

fn default_z_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

fn default_iqr_multiplier() -> f64 {
    DEFAULT_IQR_MULTIPLIER
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::ZScore {
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

impl OutlierMethod {
    pub fn iqr() -> Self {
        OutlierMethod::Iqr {
            multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

/// Numeric column checked for outliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRule {
    pub column: String,
    #[serde(default)]
    pub method: OutlierMethod,
}

/// Everything the validator checks for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub entity: String,
    /// Business key; duplicates within a batch are flagged
    #[serde(default)]
    pub key_columns: Vec<String>,
    #[serde(default)]
    pub columns: Vec<ColumnRule>,
    #[serde(default)]
    pub rules: Vec<BusinessRule>,
    #[serde(default)]
    pub unique_columns: Vec<String>,
    #[serde(default = "Severity::warning")]
    pub duplicate_key_severity: Severity,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub outliers: Vec<OutlierRule>,
    /// Overrides the validator's null-ratio threshold for this entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_threshold: Option<f64>,
}

impl RuleSet {
    pub fn new(entity: &str, key_columns: &[&str]) -> Self {
        Self {
            entity: entity.to_string(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            columns: Vec::new(),
            rules: Vec::new(),
            unique_columns: Vec::new(),
            duplicate_key_severity: Severity::Warning,
            references: Vec::new(),
            outliers: Vec::new(),
            null_threshold: None,
        }
    }

    /// Declare a required column
    pub fn required(self, name: &str, column_type: ColumnType) -> Self {
        self.declare(name, column_type, true)
    }

    /// Declare an optional column
    pub fn optional(self, name: &str, column_type: ColumnType) -> Self {
        self.declare(name, column_type, false)
    }

    fn declare(mut self, name: &str, column_type: ColumnType, required: bool) -> Self {
        self.columns.retain(|c| c.name != name);
        self.columns.push(ColumnRule {
            name: name.to_string(),
            column_type,
            required,
        });
        self
    }

    pub fn rule(mut self, rule: BusinessRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn unique(mut self, column: &str) -> Self {
        self.unique_columns.push(column.to_string());
        self
    }

    pub fn reference(mut self, column: &str, entity: &str) -> Self {
        self.references.push(Reference {
            column: column.to_string(),
            entity: entity.to_string(),
            severity: Severity::Error,
        });
        self
    }

    pub fn outlier(mut self, column: &str, method: OutlierMethod) -> Self {
        self.outliers.push(OutlierRule {
            column: column.to_string(),
            method,
        });
        self
    }

    pub fn duplicate_keys(mut self, severity: Severity) -> Self {
        self.duplicate_key_severity = severity;
        self
    }

    pub fn null_threshold(mut self, threshold: f64) -> Self {
        self.null_threshold = Some(threshold);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnRule> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.column_type)
    }

    /// Entities this rule set references, excluding itself
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .map(|r| r.entity.as_str())
            .filter(move |entity| *entity != self.entity)
    }

    /// Check identifiers, rule ids, regexes and thresholds
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_table_name(&self.entity)?;

        let columns = self
            .key_columns
            .iter()
            .chain(self.columns.iter().map(|c| &c.name))
            .chain(self.unique_columns.iter())
            .chain(self.references.iter().map(|r| &r.column))
            .chain(self.outliers.iter().map(|o| &o.column))
            .chain(self.rules.iter().map(|r| match r {
                BusinessRule::Compare { column, .. } | BusinessRule::Pattern { column, .. } => {
                    column
                }
            }));
        for column in columns {
            validate_column_name(column)?;
        }
        for reference in &self.references {
            validate_table_name(&reference.entity)?;
        }

        let mut ids = HashSet::new();
        for rule in &self.rules {
            if rule.id().trim().is_empty() {
                return Err(self.invalid(rule.id(), "rule id cannot be empty"));
            }
            if !ids.insert(rule.id()) {
                return Err(self.invalid(rule.id(), "duplicate rule id"));
            }
            match rule {
                BusinessRule::Pattern { pattern, .. } => {
                    Regex::new(pattern).map_err(|e| self.invalid(rule.id(), &e.to_string()))?;
                }
                BusinessRule::Compare {
                    operand: Operand::Literal(value),
                    ..
                } if !value.is_finite() => {
                    return Err(self.invalid(rule.id(), "literal operand must be finite"));
                }
                BusinessRule::Compare {
                    operand: Operand::Column(column),
                    ..
                } => validate_column_name(column)?,
                BusinessRule::Compare { .. } => {}
            }
        }

        for outlier in &self.outliers {
            let valid = match outlier.method {
                OutlierMethod::ZScore { threshold } => threshold.is_finite() && threshold > 0.0,
                OutlierMethod::Iqr { multiplier } => multiplier.is_finite() && multiplier >= 0.0,
            };
            if !valid {
                return Err(self.invalid(
                    &format!("outlier:{}", outlier.column),
                    "threshold must be a positive number",
                ));
            }
        }

        match self.null_threshold {
            Some(threshold) if !(0.0..=1.0).contains(&threshold) => {
                Err(self.invalid("null_threshold", "must be between 0 and 1"))
            }
            _ => Ok(()),
        }
    }

    fn invalid(&self, rule: &str, reason: &str) -> ValidationError {
        ValidationError::InvalidRule {
            entity: self.entity.clone(),
            rule: rule.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_op() {
        assert!(CompareOp::Gt.holds(1.0, 0.0));
        assert!(!CompareOp::Gt.holds(0.0, 0.0));
        assert!(CompareOp::Le.holds(0.0, 0.0));
        assert!(CompareOp::Ne.holds("a", "b"));
    }

    #[test]
    fn test_rule_set_from_yaml() {
        let yaml = r#"
entity: products
key_columns: [product_id]
columns:
  - { name: product_id, type: integer, required: true }
  - { name: price, type: number, required: true }
rules:
  - kind: compare
    id: price_positive
    column: price
    op: ">"
    operand: { literal: 0 }
  - kind: compare
    id: cost_within_price
    column: cost
    op: "<="
    operand: { column: price }
    severity: warning
outliers:
  - column: price
    method: { kind: iqr }
"#;
        let rules: RuleSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.duplicate_key_severity, Severity::Warning);
        assert_eq!(rules.rules[0].severity(), Severity::Error);
        assert_eq!(rules.rules[1].severity(), Severity::Warning);
        assert_eq!(rules.outliers[0].method, OutlierMethod::iqr());
        assert_eq!(rules.column_type("price"), Some(ColumnType::Number));
        rules.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        let bad_regex = RuleSet::new("customers", &["customer_id"])
            .rule(BusinessRule::pattern("email_format", "email", "("));
        assert!(matches!(
            bad_regex.validate(),
            Err(ValidationError::InvalidRule { .. })
        ));

        let duplicate_ids = RuleSet::new("orders", &["order_id"])
            .rule(BusinessRule::compare("r", "a", CompareOp::Gt, Operand::Literal(0.0)))
            .rule(BusinessRule::compare("r", "b", CompareOp::Gt, Operand::Literal(0.0)));
        assert!(duplicate_ids.validate().is_err());

        let bad_column = RuleSet::new("orders", &["order id"]);
        assert!(matches!(
            bad_column.validate(),
            Err(ValidationError::InvalidIdentifier(_))
        ));

        assert!(RuleSet::new("orders", &["order_id"]).null_threshold(1.5).validate().is_err());
    }

    #[test]
    fn test_dependencies_skip_self_reference() {
        let rules = RuleSet::new("categories", &["category_id"])
            .reference("parent_id", "categories")
            .reference("owner_id", "customers");
        assert_eq!(rules.dependencies().collect::<Vec<_>>(), vec!["customers"]);
    }

    #[test]
    fn test_describe() {
        let rule = BusinessRule::compare("price_positive", "price", CompareOp::Gt, Operand::Literal(0.0));
        assert_eq!(rule.describe(), "price > 0");
        assert_eq!(rule.column(), "price");
    }
}
