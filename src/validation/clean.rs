//! Batch normalization for clean mode
//!
//! Cleaning standardizes representation only. It never drops rows and never
//! repairs business or referential problems.

use super::rules::{ColumnType, RuleSet};
use crate::models::{Batch, Record, Value};

/// Text tokens treated as null (compared case-insensitively after trimming)
pub const NULL_TOKENS: &[&str] = &["", "null", "none", "nan", "n/a", "na"];

pub fn is_null_token(text: &str) -> bool {
    let trimmed = text.trim();
    NULL_TOKENS.iter().any(|token| token.eq_ignore_ascii_case(trimmed))
}

/// Normalize every record of a batch against the rule set's declared columns
pub fn clean_batch(rules: &RuleSet, batch: &Batch) -> Batch {
    batch.iter().map(|record| clean_record(rules, record)).collect()
}

pub fn clean_record(rules: &RuleSet, record: &Record) -> Record {
    record
        .iter()
        .map(|(column, value)| {
            let value = normalize(value.clone());
            let value = match rules.column_type(column) {
                Some(column_type) => coerce(value, column_type),
                None => value,
            };
            (column.to_string(), value)
        })
        .collect()
}

/// Null tokens to null, surrounding whitespace trimmed
fn normalize(value: Value) -> Value {
    match value {
        Value::Text(text) if is_null_token(&text) => Value::Null,
        Value::Text(text) => Value::Text(text.trim().to_string()),
        Value::Float(f) if f.is_nan() => Value::Null,
        other => other,
    }
}

fn coerce(value: Value, column_type: ColumnType) -> Value {
    match (column_type, value) {
        (_, Value::Null) => Value::Null,
        (ColumnType::Number, Value::Text(text)) => match text.parse::<i64>() {
            Ok(i) => Value::Integer(i),
            Err(_) => number_or_text(text),
        },
        (ColumnType::Integer, Value::Text(text)) => match Value::Text(text.clone()).parse_number() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Integer(f as i64),
            _ => Value::Text(text),
        },
        (ColumnType::Integer, Value::Float(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Value::Integer(f as i64)
        }
        (ColumnType::Timestamp, value @ Value::Text(_)) => match value.parse_timestamp() {
            Some(at) => Value::Timestamp(at),
            None => value,
        },
        (ColumnType::Boolean, value @ (Value::Text(_) | Value::Integer(_))) => {
            match value.parse_bool() {
                Some(b) => Value::Bool(b),
                None => value,
            }
        }
        (ColumnType::Email, Value::Text(text)) => Value::Text(text.to_lowercase()),
        (ColumnType::Phone, Value::Text(text)) => Value::Text(digits(&text)),
        (ColumnType::Phone, Value::Integer(i)) => Value::Text(i.to_string()),
        (_, value) => value,
    }
}

fn number_or_text(text: String) -> Value {
    match Value::Text(text.clone()).parse_number() {
        Some(f) => Value::Float(f),
        None => Value::Text(text),
    }
}

fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}
