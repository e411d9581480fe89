//! Target table definitions

use serde::{Deserialize, Serialize};

use super::derived::{DerivedColumn, DerivedRegistry};
use super::error::LoadError;
use crate::models::{Key, Record};
use crate::validation::input::{validate_column_name, validate_table_name};

/// Default audit column names
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Layout of a keyed target table the loader writes to
#[derive(Debug, Clone)]
pub struct TableDefinition {
    name: String,
    key_columns: Vec<String>,
    derived: Vec<DerivedColumn>,
    created_at_column: String,
    updated_at_column: String,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, key_columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            key_columns,
            derived: Vec::new(),
            created_at_column: CREATED_AT_COLUMN.to_string(),
            updated_at_column: UPDATED_AT_COLUMN.to_string(),
        }
    }

    /// Append a derived column; columns are computed in the order added
    pub fn with_derived(mut self, column: DerivedColumn) -> Self {
        self.derived.push(column);
        self
    }

    pub fn with_audit_columns(
        mut self,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.created_at_column = created_at.into();
        self.updated_at_column = updated_at.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn derived(&self) -> &[DerivedColumn] {
        &self.derived
    }

    pub fn created_at_column(&self) -> &str {
        &self.created_at_column
    }

    pub fn updated_at_column(&self) -> &str {
        &self.updated_at_column
    }

    /// Check identifiers and that key, derived and audit columns do not overlap
    pub fn validate(&self) -> Result<(), LoadError> {
        let invalid = |msg: String| LoadError::InvalidDefinition(format!("{}: {}", self.name, msg));

        validate_table_name(&self.name).map_err(|e| invalid(e.to_string()))?;
        if self.key_columns.is_empty() {
            return Err(invalid("at least one key column is required".to_string()));
        }

        let mut seen: Vec<&str> = Vec::new();
        let columns = self
            .key_columns
            .iter()
            .map(String::as_str)
            .chain(self.derived.iter().map(DerivedColumn::name))
            .chain([self.created_at_column.as_str(), self.updated_at_column.as_str()]);
        for column in columns {
            validate_column_name(column).map_err(|e| invalid(e.to_string()))?;
            if seen.contains(&column) {
                return Err(invalid(format!("column '{}' is declared twice", column)));
            }
            seen.push(column);
        }
        Ok(())
    }

    /// Business key of a record
    pub fn key_of(&self, record: &Record, row: usize) -> Result<Key, LoadError> {
        record
            .key(&self.key_columns)
            .map_err(|column| LoadError::SchemaMismatch {
                table: self.name.clone(),
                row,
                column,
            })
    }

    /// Drop incoming derived and audit values, then recompute derived columns
    /// in declaration order.
    pub fn prepare_record(&self, mut record: Record, row: usize) -> Result<Record, LoadError> {
        for column in &self.derived {
            record.remove(column.name());
        }
        record.remove(&self.created_at_column);
        record.remove(&self.updated_at_column);

        for column in &self.derived {
            let value = column
                .compute(&record)
                .map_err(|e| LoadError::ConstraintViolation {
                    table: self.name.clone(),
                    row,
                    column: column.name().to_string(),
                    reason: e.to_string(),
                })?;
            record.insert(column.name(), value);
        }
        Ok(record)
    }
}

/// Serializable table definition, resolved against a [`DerivedRegistry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Target table name
    pub table: String,
    pub key_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedConfig>,
    #[serde(default = "default_created_at")]
    pub created_at_column: String,
    #[serde(default = "default_updated_at")]
    pub updated_at_column: String,
}

/// A derived column bound to a registered function by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedConfig {
    pub column: String,
    pub function: String,
}

fn default_created_at() -> String {
    CREATED_AT_COLUMN.to_string()
}

fn default_updated_at() -> String {
    UPDATED_AT_COLUMN.to_string()
}

impl TableConfig {
    pub fn new(table: &str, key_columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            derived: Vec::new(),
            created_at_column: default_created_at(),
            updated_at_column: default_updated_at(),
        }
    }

    pub fn derive(mut self, column: &str, function: &str) -> Self {
        self.derived.push(DerivedConfig {
            column: column.to_string(),
            function: function.to_string(),
        });
        self
    }

    /// Bind derived functions and validate the result
    pub fn resolve(&self, registry: &DerivedRegistry) -> Result<TableDefinition, LoadError> {
        let mut definition = TableDefinition::new(&self.table, self.key_columns.clone())
            .with_audit_columns(&self.created_at_column, &self.updated_at_column);
        for derived in &self.derived {
            let column = registry
                .column(&derived.column, &derived.function)
                .ok_or_else(|| {
                    LoadError::InvalidDefinition(format!(
                        "{}: unknown derived function '{}' for column '{}'",
                        self.table, derived.function, derived.column
                    ))
                })?;
            definition = definition.with_derived(column);
        }
        definition.validate()?;
        Ok(definition)
    }
}
