//! Batch validation
//!
//! Classifies a batch as pass / warn / fail against the [`RuleSet`]
//! registered for its entity:
//! - Structural: non-empty batch, required columns, declared types and formats
//! - Business: comparisons, regex patterns, unique columns, duplicate keys
//! - Referential: reference columns resolve within a [`ReferenceScope`]
//! - Statistical: null ratios and outliers (always warnings)
//!
//! Data problems never raise; they are reported as [`Violation`]s.

pub mod clean;
pub mod error;
pub mod input;
pub mod result;
pub mod rules;
pub mod stats;
pub mod validator;

pub use error::ValidationError;
pub use result::{Category, DataProfile, Status, Validated, ValidationMode, ValidationResult, Violation};
pub use rules::{
    BusinessRule, ColumnRule, ColumnType, CompareOp, Operand, OutlierMethod, OutlierRule,
    Reference, RuleSet, Severity,
};
pub use validator::{ReferenceScope, Validator, ValidatorSettings};
