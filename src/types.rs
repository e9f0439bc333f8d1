//! Core data model types for conversion.
//!
//! Loaders produce [`RawTable`]s (untyped cells, candidate names). The sanitizer turns each one
//! into a [`SanitizedTable`] whose [`Schema`] is safe to hand to SQLite.

use std::fmt;

/// Logical column type of a sanitized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean, stored as INTEGER 0/1.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// SQLite column affinity used in `CREATE TABLE`.
    pub fn sqlite_type(self) -> &'static str {
        match self {
            DataType::Int64 | DataType::Bool => "INTEGER",
            DataType::Float64 => "REAL",
            DataType::Utf8 => "TEXT",
        }
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing a sanitized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name (ASCII case-insensitive, like SQLite), if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// A single cell value.
///
/// Loaders emit whatever the source format carries (CSV and HTML only ever produce
/// [`Value::Utf8`] and [`Value::Null`]); the sanitizer coerces cells to their column type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Builds a cell from raw text, mapping empty/whitespace-only text to [`Value::Null`].
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Value::Null
        } else {
            Value::Utf8(trimmed.to_owned())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(""),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Utf8(s) => f.write_str(s),
        }
    }
}

/// One dataset as produced by a loader.
///
/// Transient: consumed entirely by [`crate::processing::sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Table name candidate (sheet name, JSON key, HTML caption, file stem, ...).
    pub name: String,
    /// Column headers in source order. May contain blanks and duplicates.
    pub headers: Vec<String>,
    /// Row-major cells. Rows may be shorter than `headers`.
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Display for RawTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table_name={}, headers={:?}, rows={}",
            self.name,
            self.headers,
            self.rows.len()
        )
    }
}

/// A normalized table ready for creation in the destination database.
///
/// Column names are unique (ASCII case-insensitively) and every row has exactly
/// `schema.fields.len()` cells whose variants agree with the field types.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedTable {
    /// SQL-safe table name.
    pub name: String,
    /// Column layout.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl SanitizedTable {
    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
