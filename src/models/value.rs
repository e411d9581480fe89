//! Typed cell values

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Naive timestamp layouts accepted for text values, interpreted as UTC
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Tokens recognized as boolean true (case-insensitive)
pub const TRUE_TOKENS: &[&str] = &["true", "t", "yes", "y", "1"];

/// Tokens recognized as boolean false (case-insensitive)
pub const FALSE_TOKENS: &[&str] = &["false", "f", "no", "n", "0"];

/// A single typed value in a record
///
/// Deserializes from plain JSON: `null`, booleans, integers, floats, RFC 3339
/// strings (as timestamps) and any other string (as text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Value {
    /// Whether this is a true null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "text",
        }
    }

    /// Numeric view of integer and float values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric interpretation, accepting numeric text
    pub fn parse_number(&self) -> Option<f64> {
        match self {
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            other => other.as_f64(),
        }
    }

    /// Timestamp interpretation, accepting RFC 3339, naive date-time and date text
    pub fn parse_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp_text(s.trim()),
            _ => None,
        }
    }

    /// Boolean interpretation, accepting the recognized token set and integer 0/1
    pub fn parse_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            Value::Text(s) => {
                let token = s.trim().to_lowercase();
                if TRUE_TOKENS.contains(&token.as_str()) {
                    Some(true)
                } else if FALSE_TOKENS.contains(&token.as_str()) {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Canonical text form used for business key components.
    ///
    /// Integral floats render without a fractional part so that `1`, `1.0`
    /// and `"1"` identify the same entity. Null has no key form.
    pub fn key_component(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Float(f) => Some(canonical_float(*f)),
            Value::Timestamp(ts) => Some(ts.to_rfc3339()),
            Value::Text(s) => Some(s.clone()),
        }
    }
}

fn canonical_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
