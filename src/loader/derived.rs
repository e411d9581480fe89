//! Derived column functions
//!
//! A derived column is always recomputed from its source columns at write
//! time; incoming values for it are discarded. Functions are registered by
//! name in a [`DerivedRegistry`] so that table definitions in configuration
//! files can refer to them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::models::{Record, Value};

/// Failure computing a derived value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeriveError {
    #[error("missing input column '{0}'")]
    MissingInput(String),

    #[error("input column '{column}' is not numeric: {value}")]
    NotNumeric { column: String, value: String },

    #[error("division by zero: {0} is zero")]
    DivisionByZero(String),

    #[error("{0}")]
    Invalid(String),
}

/// Signature of a derivation: a pure function of the record
pub type DeriveFn = dyn Fn(&Record) -> Result<Value, DeriveError> + Send + Sync;

/// A named derived column bound to its function
#[derive(Clone)]
pub struct DerivedColumn {
    name: String,
    function: String,
    derive: Arc<DeriveFn>,
}

impl DerivedColumn {
    /// Bind an ad-hoc function to a column
    pub fn new<F>(name: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&Record) -> Result<Value, DeriveError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            function: name.clone(),
            name,
            derive: Arc::new(derive),
        }
    }

    /// Column name the value is written to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered function name (equal to the column name for ad-hoc functions)
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn compute(&self, record: &Record) -> Result<Value, DeriveError> {
        (self.derive)(record)
    }
}

impl fmt::Debug for DerivedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedColumn")
            .field("name", &self.name)
            .field("function", &self.function)
            .finish()
    }
}

/// Registry of derivation functions by name
#[derive(Clone, Default)]
pub struct DerivedRegistry {
    functions: HashMap<String, Arc<DeriveFn>>,
}

impl DerivedRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the e-commerce derivations
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("full_name", full_name);
        registry.register("profit_margin", profit_margin);
        registry.register("net_amount", net_amount);
        registry.register("line_total", line_total);
        registry.register("discount_percentage", discount_percentage);
        registry.register("available_quantity", available_quantity);
        registry.register("stock_status", stock_status);
        registry
    }

    /// Register (or replace) a function
    pub fn register<F>(&mut self, name: impl Into<String>, derive: F)
    where
        F: Fn(&Record) -> Result<Value, DeriveError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(derive));
    }

    pub fn contains(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Bind a registered function to a column
    pub fn column(&self, column: &str, function: &str) -> Option<DerivedColumn> {
        self.functions.get(function).map(|derive| DerivedColumn {
            name: column.to_string(),
            function: function.to_string(),
            derive: Arc::clone(derive),
        })
    }
}

impl fmt::Debug for DerivedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

fn required_number(record: &Record, column: &str) -> Result<f64, DeriveError> {
    match record.value(column) {
        Value::Null => Err(DeriveError::MissingInput(column.to_string())),
        value => value.parse_number().ok_or_else(|| DeriveError::NotNumeric {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Optional numeric input; null counts as zero
fn number_or_zero(record: &Record, column: &str) -> Result<f64, DeriveError> {
    if record.value(column).is_null() {
        Ok(0.0)
    } else {
        required_number(record, column)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Integral results stay integers so quantities compare equal to their inputs
fn quantity(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::Integer(value as i64)
    } else {
        Value::Float(value)
    }
}

/// `first_name + " " + last_name`, tolerating one missing part
pub fn full_name(record: &Record) -> Result<Value, DeriveError> {
    let part = |column: &str| {
        record
            .value(column)
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match (part("first_name"), part("last_name")) {
        (Some(first), Some(last)) => Ok(Value::Text(format!("{} {}", first, last))),
        (Some(only), None) | (None, Some(only)) => Ok(Value::Text(only)),
        (None, None) => Err(DeriveError::MissingInput("first_name".to_string())),
    }
}

/// `(price - cost) / price * 100`, rounded to two decimals. Null cost yields null.
pub fn profit_margin(record: &Record) -> Result<Value, DeriveError> {
    let price = required_number(record, "price")?;
    if record.value("cost").is_null() {
        return Ok(Value::Null);
    }
    let cost = required_number(record, "cost")?;
    if price == 0.0 {
        return Err(DeriveError::DivisionByZero("price".to_string()));
    }
    Ok(Value::Float(round2((price - cost) / price * 100.0)))
}

/// `order_total - tax_amount - shipping_cost`
pub fn net_amount(record: &Record) -> Result<Value, DeriveError> {
    let total = required_number(record, "order_total")?;
    let tax = number_or_zero(record, "tax_amount")?;
    let shipping = number_or_zero(record, "shipping_cost")?;
    Ok(Value::Float(round2(total - tax - shipping)))
}

/// `quantity * unit_price`
pub fn line_total(record: &Record) -> Result<Value, DeriveError> {
    let quantity = required_number(record, "quantity")?;
    let unit_price = required_number(record, "unit_price")?;
    Ok(Value::Float(round2(quantity * unit_price)))
}

/// `discount_applied / line_total * 100`; zero when the line total is zero
pub fn discount_percentage(record: &Record) -> Result<Value, DeriveError> {
    let total = required_number(record, "quantity")? * required_number(record, "unit_price")?;
    let discount = number_or_zero(record, "discount_applied")?;
    if total == 0.0 {
        return Ok(Value::Float(0.0));
    }
    Ok(Value::Float(round2(discount / total * 100.0)))
}

/// `quantity_on_hand - quantity_reserved`
pub fn available_quantity(record: &Record) -> Result<Value, DeriveError> {
    let on_hand = required_number(record, "quantity_on_hand")?;
    let reserved = number_or_zero(record, "quantity_reserved")?;
    Ok(quantity(on_hand - reserved))
}

/// Out of Stock / Low Stock / In Stock from availability against reorder level
pub fn stock_status(record: &Record) -> Result<Value, DeriveError> {
    let available =
        required_number(record, "quantity_on_hand")? - number_or_zero(record, "quantity_reserved")?;
    let reorder_level = number_or_zero(record, "reorder_level")?;
    let status = if available <= 0.0 {
        "Out of Stock"
    } else if available <= reorder_level {
        "Low Stock"
    } else {
        "In Stock"
    };
    Ok(Value::from(status))
}
