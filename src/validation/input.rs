//! Identifier validation for configuration input.
//!
//! Table, entity and column names from configuration files end up in SQL
//! statements issued by the DuckDB store and in rule lookups. These checks
//! reject names that could break out of a quoted identifier or collide with
//! SQL keywords before any statement is built.

use serde::Serialize;
use thiserror::Error;

/// Maximum length for table and entity names
pub const MAX_TABLE_NAME_LENGTH: usize = 128;

/// Maximum length for column names
pub const MAX_COLUMN_NAME_LENGTH: usize = 128;

/// Errors that can occur during identifier validation.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum IdentifierError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),

    /// Input is a reserved word
    #[error("{field} cannot be a reserved word: {word}")]
    ReservedWord { field: &'static str, word: String },
}

/// Validate a target table or entity name.
///
/// # Rules
///
/// - Must not be empty or exceed 128 characters
/// - Must start with an ASCII letter or underscore
/// - May contain ASCII letters, digits and underscores
/// - Cannot be a SQL reserved word
///
/// # Examples
///
/// ```
/// use warehouse_reconcile::validation::input::validate_table_name;
///
/// assert!(validate_table_name("dim_customers").is_ok());
/// assert!(validate_table_name("").is_err());
/// assert!(validate_table_name("fact\"; DROP").is_err());
/// ```
pub fn validate_table_name(name: &str) -> Result<(), IdentifierError> {
    validate_identifier(name, "table name", MAX_TABLE_NAME_LENGTH)
}

/// Validate a column name. Same rules as [`validate_table_name`].
///
/// ```
/// use warehouse_reconcile::validation::input::validate_column_name;
///
/// assert!(validate_column_name("unit_price").is_ok());
/// assert!(validate_column_name("9lives").is_err());
/// ```
pub fn validate_column_name(name: &str) -> Result<(), IdentifierError> {
    validate_identifier(name, "column name", MAX_COLUMN_NAME_LENGTH)
}

fn validate_identifier(name: &str, field: &'static str, max: usize) -> Result<(), IdentifierError> {
    let Some(first_char) = name.chars().next() else {
        return Err(IdentifierError::Empty(field));
    };

    if name.len() > max {
        return Err(IdentifierError::TooLong {
            field,
            max,
            actual: name.len(),
        });
    }

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(IdentifierError::InvalidFormat(
            field,
            "must start with a letter or underscore".to_string(),
        ));
    }

    if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(IdentifierError::InvalidCharacters {
            field,
            reason: format!("invalid character: '{}'", c),
        });
    }

    if is_sql_reserved_word(name) {
        return Err(IdentifierError::ReservedWord {
            field,
            word: name.to_string(),
        });
    }

    Ok(())
}

fn is_sql_reserved_word(word: &str) -> bool {
    const RESERVED_WORDS: &[&str] = &[
        "select", "from", "where", "insert", "update", "delete", "create", "drop", "alter",
        "table", "index", "view", "database", "schema", "grant", "revoke", "commit", "rollback",
        "begin", "end", "transaction", "primary", "foreign", "references", "constraint",
        "unique", "check", "default", "not", "null", "and", "or", "in", "between", "like", "is",
        "case", "when", "then", "else", "join", "on", "as", "order", "group", "by", "having",
        "limit", "union", "all", "distinct", "values", "set", "into", "with",
    ];
    RESERVED_WORDS.contains(&word.to_lowercase().as_str())
}
