//! JSON loading.
//!
//! Supported table layouts:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]` (one table, named after the source)
//! - An object of such arrays: `{"t1": [{"a":1}], "t2": [{"b":2}]}` (one table per key)
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Anything else that is still valid JSON is reported as a validation error, and callers can
//! fall back to [`load_complex_json_str`], which flattens nested documents.

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawTable, Value};

/// Load the tables of a JSON document.
pub fn load_json_str(input: &str, name: &str) -> IngestionResult<Vec<RawTable>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let doc = match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(v) => v,
        // Several top-level values: treat as NDJSON.
        Err(_) if trimmed.starts_with('{') && trimmed.lines().count() > 1 => {
            return load_ndjson_str(trimmed, name).map(|t| vec![t]);
        }
        Err(e) => return Err(IngestionError::data(format!("invalid json: {e}"))),
    };

    match doc {
        // An empty array holds no table, like a CSV file without a header row.
        JsonValue::Array(items) if items.is_empty() => Ok(Vec::new()),
        JsonValue::Array(items) => Ok(vec![flat_objects_table(name, &items)?]),
        JsonValue::Object(map) => {
            let mut tables = Vec::with_capacity(map.len());
            for (key, value) in &map {
                let items = value.as_array().ok_or_else(|| {
                    IngestionError::validation(format!(
                        "value of '{key}' is not an array of objects"
                    ))
                })?;
                if items.is_empty() {
                    debug!(table = %key, "skipping empty array");
                    continue;
                }
                tables.push(flat_objects_table(key, items)?);
            }
            Ok(tables)
        }
        _ => Err(IngestionError::validation(
            "json must be an array of objects, an object of such arrays, or NDJSON",
        )),
    }
}

/// Load newline-delimited JSON objects as one table.
pub fn load_ndjson_str(input: &str, name: &str) -> IngestionResult<RawTable> {
    let mut values = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<JsonValue>(line).map_err(|e| {
            IngestionError::data(format!("invalid ndjson at line {}: {}", i + 1, e))
        })?;
        values.push(v);
    }
    flat_objects_table(name, &values)
}

/// Flatten an arbitrarily nested JSON document into tables.
///
/// Every array of objects found at any depth becomes one table, named after its key path
/// (`a_b` for `{"a": {"b": [...]}}`, the source name for a top-level array). Nested objects
/// inside rows become dotted columns (`user.name`); nested arrays are stored as JSON text.
/// A top-level object without any such array becomes a single-row table.
pub fn load_complex_json_str(input: &str, name: &str) -> IngestionResult<Vec<RawTable>> {
    let doc = serde_json::from_str::<JsonValue>(input.trim())
        .map_err(|e| IngestionError::data(format!("invalid json: {e}")))?;

    let mut tables = Vec::new();
    collect_object_arrays(&doc, &mut Vec::new(), name, &mut tables);

    if tables.is_empty() {
        if let JsonValue::Object(map) = &doc {
            let mut columns = Vec::new();
            flatten_object(map, "", &mut columns);
            tables.push(table_from_flat_rows(name, vec![columns]));
        }
    }
    debug!(tables = tables.len(), source = name, "flattened complex json");
    Ok(tables)
}

fn collect_object_arrays<'a>(
    value: &'a JsonValue,
    path: &mut Vec<&'a str>,
    name: &str,
    out: &mut Vec<RawTable>,
) {
    match value {
        JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_object) => {
            let table_name = if path.is_empty() {
                name.to_string()
            } else {
                path.join("_")
            };
            let rows = items
                .iter()
                .filter_map(JsonValue::as_object)
                .map(|obj| {
                    let mut columns = Vec::new();
                    flatten_object(obj, "", &mut columns);
                    columns
                })
                .collect();
            out.push(table_from_flat_rows(&table_name, rows));
        }
        JsonValue::Object(map) => {
            for (key, child) in map {
                path.push(key.as_str());
                collect_object_arrays(child, path, name, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn flatten_object(map: &Map<String, JsonValue>, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let column = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            JsonValue::Object(child) => flatten_object(child, &column, out),
            JsonValue::Array(_) => out.push((column, Value::Utf8(value.to_string()))),
            scalar => out.push((column, scalar_value(scalar))),
        }
    }
}

fn table_from_flat_rows(name: &str, rows: Vec<Vec<(String, Value)>>) -> RawTable {
    let mut headers: Vec<String> = Vec::new();
    for row in &rows {
        for (column, _) in row {
            if !headers.contains(column) {
                headers.push(column.clone());
            }
        }
    }

    let rows = rows
        .into_iter()
        .map(|row| {
            let mut out = vec![Value::Null; headers.len()];
            for (column, value) in row {
                if let Some(idx) = headers.iter().position(|h| *h == column) {
                    out[idx] = value;
                }
            }
            out
        })
        .collect();
    RawTable::new(name, headers, rows)
}

/// Build a table from an array of objects whose values are all scalars.
///
/// Headers are the union of keys in first-seen order; missing keys become nulls.
fn flat_objects_table(name: &str, items: &[JsonValue]) -> IngestionResult<RawTable> {
    let mut rows = Vec::with_capacity(items.len());
    for (idx0, item) in items.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = item.as_object().ok_or_else(|| {
            IngestionError::validation(format!("{name}: row {row_num} is not a json object"))
        })?;

        let mut row = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if value.is_object() || value.is_array() {
                return Err(IngestionError::validation(format!(
                    "{name}: row {row_num} has nested value in '{key}'"
                )));
            }
            row.push((key.clone(), scalar_value(value)));
        }
        rows.push(row);
    }
    Ok(table_from_flat_rows(name, rows))
}

fn scalar_value(v: &JsonValue) -> Value {
    match v {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map_or(Value::Null, Value::Float64),
        },
        JsonValue::String(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}
