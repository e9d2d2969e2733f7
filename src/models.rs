//! Core data models.
//!
//! [`FileRecord`] is one persisted row of the `files` table. [`ResultSet`]
//! and [`FieldValue`] carry the output of ad-hoc read queries.

use std::fmt;

use serde::Serialize;

/// A persisted fingerprint row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Store-assigned surrogate key.
    pub id: i64,
    /// Caller-supplied batch/origin tag. Not unique.
    pub source: String,
    /// Path as given to the walk. Paths that are not valid UTF-8 are
    /// rejected at insert rather than stored lossily.
    pub path: String,
    /// Lowercase hex content digest.
    pub hash: String,
}

/// A single field of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Blob(v) => write!(f, "x'{}'", hex::encode(v)),
        }
    }
}

/// Column names plus row data from a read query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Field at (`row`, `col`) rendered as a display string.
    pub fn field(&self, row: usize, col: usize) -> Option<String> {
        self.rows.get(row)?.get(col).map(|v| v.to_string())
    }
}
