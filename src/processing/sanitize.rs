//! Turning a [`RawTable`] into a [`SanitizedTable`].

use tracing::trace;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Field, RawTable, SanitizedTable, Schema, Value};

use super::columns::{clean_header, dedup_columns, DupColumnPolicy};
use super::infer::{coerce, infer_column_type};

/// Normalize a raw table so it can be created as-is in SQLite.
///
/// - the table name keeps only `[A-Za-z0-9_]` (other characters become `_`); names reserved by
///   SQLite (`sqlite_*`) get a leading `_`
/// - headers are cleaned and de-duplicated according to `policy`
/// - short rows are padded with NULL; a row wider than the header row is an error
/// - every column gets an inferred type and its cells are coerced to it
///
/// Errors are always [`IngestionError::Value`].
///
/// ```
/// use sqlite_ingest::processing::{sanitize, DupColumnPolicy};
/// use sqlite_ingest::types::{DataType, RawTable, Value};
///
/// let raw = RawTable::new(
///     "sales 2024",
///     vec!["id".into(), "amount".into()],
///     vec![vec![Value::Utf8("1".into()), Value::Utf8("9.5".into())]],
/// );
/// let table = sanitize(raw, DupColumnPolicy::Rename).unwrap();
/// assert_eq!(table.name, "sales_2024");
/// assert_eq!(table.schema.fields[0].data_type, DataType::Int64);
/// assert_eq!(table.rows[0][1], Value::Float64(9.5));
/// ```
pub fn sanitize(raw: RawTable, policy: DupColumnPolicy) -> IngestionResult<SanitizedTable> {
    let RawTable {
        name,
        headers,
        mut rows,
    } = raw;

    let table_name = sanitize_table_name(&name)?;
    if headers.is_empty() {
        return Err(IngestionError::value(format!(
            "table '{table_name}' has no columns"
        )));
    }

    let cleaned = headers
        .iter()
        .enumerate()
        .map(|(i, h)| clean_header(i, h))
        .collect();
    let columns = dedup_columns(cleaned, policy)?;
    let width = columns.len();

    for (row_idx, row) in rows.iter_mut().enumerate() {
        if row.len() > width {
            return Err(IngestionError::value(format!(
                "table '{table_name}' row {} has {} cells but only {width} columns",
                row_idx + 1,
                row.len()
            )));
        }
        row.resize(width, Value::Null);
    }

    let types: Vec<_> = (0..width)
        .map(|col| infer_column_type(rows.iter().map(|row| &row[col])))
        .collect();

    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(cell, ty)| coerce(cell, *ty))
                .collect::<IngestionResult<Vec<_>>>()
        })
        .collect::<IngestionResult<Vec<_>>>()?;

    let fields = columns
        .into_iter()
        .zip(types)
        .map(|(name, ty)| Field::new(name, ty))
        .collect();

    trace!(table = %table_name, rows = rows.len(), "sanitized table");
    Ok(SanitizedTable {
        name: table_name,
        schema: Schema::new(fields),
        rows,
    })
}

/// Sanitize a candidate table name. See [`sanitize`].
pub fn sanitize_table_name(raw: &str) -> IngestionResult<String> {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let name = replaced.trim_matches('_');
    if name.is_empty() {
        return Err(IngestionError::value(format!(
            "invalid table name '{raw}'"
        )));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        Ok(format!("_{name}"))
    } else {
        Ok(name.to_string())
    }
}
