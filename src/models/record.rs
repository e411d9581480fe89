//! Records, batches and business keys

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::value::Value;

/// One row of a source or target entity, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Value of a column, treating an absent column as null
    pub fn value(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extract the business key for the given key columns.
    ///
    /// Returns the first key column that is absent or null on failure.
    pub fn key(&self, key_columns: &[String]) -> Result<Key, String> {
        let mut parts = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            match self.0.get(column).and_then(Value::key_component) {
                Some(part) => parts.push(part),
                None => return Err(column.clone()),
            }
        }
        Ok(Key(parts))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Business key: canonical text of each key column, in key-column order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// Single-column key from a value
    pub fn single(value: impl Into<Value>) -> Option<Self> {
        value.into().key_component().map(|part| Self(vec![part]))
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Storage encoding, unambiguous for multi-column keys
    pub fn encode(&self) -> String {
        if self.0.len() == 1 {
            self.0[0].clone()
        } else {
            serde_json::to_string(&self.0).unwrap_or_else(|_| self.0.join("|"))
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

/// Identifies an affected row in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRef {
    /// Zero-based position in the batch
    pub index: usize,
    /// Business key, when the row has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "row {} (key {})", self.index, key),
            None => write!(f, "row {}", self.index),
        }
    }
}

/// Ordered sequence of records sharing one schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Union of column names over all records
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in &self.records {
            for column in record.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }

    /// SHA-256 over the canonical JSON form of every record
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            if let Ok(bytes) = serde_json::to_vec(record) {
                hasher.update(&bytes);
            }
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Parse a JSON array of objects
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Read a batch from a `.json` array file or a `.jsonl` / `.ndjson` file
    pub fn read_file(path: &Path) -> Result<Self, BatchReadError> {
        let is_lines = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("jsonl") | Some("ndjson")
        );
        if !is_lines {
            let content = std::fs::read_to_string(path)?;
            return Ok(Self::from_json_str(&content)?);
        }

        let file = std::fs::File::open(path)?;
        let mut records = Vec::new();
        for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| BatchReadError::Line {
                line: line_no + 1,
                error: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(Self::new(records))
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Errors reading a batch file
#[derive(Debug, thiserror::Error)]
pub enum BatchReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON parsing error at line {line}: {error}")]
    Line { line: usize, error: String },
}
