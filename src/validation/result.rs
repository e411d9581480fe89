//! Validation verdicts

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::rules::Severity;
use crate::models::{Batch, RowRef};

/// Overall verdict for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Warn,
    Fail,
}

impl Status {
    /// Whether the batch may proceed to the loader
    pub fn is_loadable(self) -> bool {
        self != Status::Fail
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pass => "pass",
            Status::Warn => "warn",
            Status::Fail => "fail",
        })
    }
}

/// Rule category a violation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Structural,
    Business,
    Referential,
    Statistical,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Structural => "structural",
            Category::Business => "business",
            Category::Referential => "referential",
            Category::Statistical => "statistical",
        })
    }
}

/// One broken rule and the rows it affects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable identifier, e.g. `business:price_positive` or `structural:required:email`
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    /// Affected rows; empty for batch-level violations
    pub rows: Vec<RowRef>,
    pub message: String,
}

impl Violation {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Whether dropping the affected rows removes the violation
    pub fn is_row_attributable(&self) -> bool {
        !self.rows.is_empty()
    }
}

/// Data-quality profile of a validated batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    pub column_count: usize,
    /// Null share per column in percent, rounded to two decimals
    pub null_percentages: BTreeMap<String, f64>,
    /// Rows identical in every column to an earlier row
    pub duplicate_rows: usize,
}

impl DataProfile {
    /// Profile `batch` over the given columns
    pub fn of(batch: &Batch, columns: &[String]) -> Self {
        let total = batch.len();
        let null_percentages = columns
            .iter()
            .map(|column| {
                let nulls = batch.iter().filter(|r| r.value(column).is_null()).count();
                let percent = if total == 0 {
                    0.0
                } else {
                    nulls as f64 * 100.0 / total as f64
                };
                (column.clone(), (percent * 100.0).round() / 100.0)
            })
            .collect();

        let mut seen = HashSet::with_capacity(total);
        let duplicate_rows = batch
            .iter()
            .filter(|record| {
                // BTreeMap-backed records serialize with sorted columns
                let canonical = serde_json::to_string(record).unwrap_or_default();
                !seen.insert(canonical)
            })
            .count();

        Self {
            column_count: columns.len(),
            null_percentages,
            duplicate_rows,
        }
    }

    pub fn null_percentage(&self, column: &str) -> Option<f64> {
        self.null_percentages.get(column).copied()
    }
}

/// Per-batch verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub entity: String,
    pub status: Status,
    /// Rows in the validated batch
    pub row_count: usize,
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub profile: DataProfile,
    /// Rows removed in filter mode, by their index in the input batch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_rows: Vec<RowRef>,
}

impl ValidationResult {
    /// Rule ids of error-severity violations, deduplicated in report order
    pub fn error_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for violation in self.violations.iter().filter(|v| v.is_error()) {
            if !ids.contains(&violation.rule_id) {
                ids.push(violation.rule_id.clone());
            }
        }
        ids
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_error())
    }

    pub fn violation(&self, rule_id: &str) -> Option<&Violation> {
        self.violations.iter().find(|v| v.rule_id == rule_id)
    }
}

/// Aggregate severities: any error fails, any warning warns
pub fn aggregate(violations: &[Violation]) -> Status {
    violations
        .iter()
        .map(|v| match v.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
        })
        .max()
        .unwrap_or(Status::Pass)
}

/// How the validator treats the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Validate as-is
    #[default]
    Reject,
    /// Normalize first, validate and return the cleaned batch
    Clean,
    /// Drop rows with row-attributable errors
    Filter,
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(ValidationMode::Reject),
            "clean" => Ok(ValidationMode::Clean),
            "filter" => Ok(ValidationMode::Filter),
            other => Err(format!(
                "unknown validation mode '{}' (expected reject, clean or filter)",
                other
            )),
        }
    }
}

/// Verdict plus the batch that should move on to the loader
#[derive(Debug, Clone)]
pub struct Validated {
    pub result: ValidationResult,
    /// Input batch, its cleaned copy, or the surviving rows in filter mode
    pub batch: Batch,
}
