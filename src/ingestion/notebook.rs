//! Jupyter notebook (`.ipynb`) documents.
//!
//! Notebooks are not loaded as a whole: each code cell whose outputs carry tabular data yields
//! its own tables. Recognised outputs are `application/vnd.dataresource+json` (the table schema
//! pandas emits) and `text/html` containing `<table>` markup.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawTable, Value};

use super::html;
use super::unified::{decode_text, lookup_encoding};

const DATA_RESOURCE_MIME: &str = "application/vnd.dataresource+json";
const HTML_MIME: &str = "text/html";

/// A parsed notebook document (nbformat 4).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub nbformat: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cell {
    pub cell_type: String,
    #[serde(default)]
    pub execution_count: Option<i64>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Output {
    pub output_type: String,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
}

/// Whether a local path names a notebook document.
pub fn is_notebook_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ipynb"))
}

/// Whether the path component of a URL names a notebook document.
pub fn is_notebook_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| u.path().to_ascii_lowercase().ends_with(".ipynb"))
}

/// Read and parse a notebook file. Returns the document and its size in bytes.
pub fn load_notebook_file(path: &Path, encoding: &str) -> IngestionResult<(Notebook, u64)> {
    let bytes = fs::read(path).map_err(|e| IngestionError::Open {
        message: format!("{}: {e}", path.display()),
    })?;
    load_notebook_bytes(&bytes, encoding)
}

/// Parse an in-memory notebook document. Returns the document and its size in bytes.
pub fn load_notebook_bytes(bytes: &[u8], encoding: &str) -> IngestionResult<(Notebook, u64)> {
    let text = decode_text(bytes, lookup_encoding(encoding)?);
    let notebook = serde_json::from_str::<Notebook>(&text).map_err(|e| IngestionError::NotJson {
        message: e.to_string(),
    })?;
    Ok((notebook, bytes.len() as u64))
}

/// Extract the tables of all code cell outputs, in cell order.
///
/// Tables are named `cell<execution_count>` (`cell<index>` for unexecuted cells, 1-based);
/// when a cell yields several tables the later ones get a `_<n>` suffix.
pub fn notebook_tables(notebook: &Notebook) -> Vec<RawTable> {
    let mut tables = Vec::new();
    for (idx0, cell) in notebook.cells.iter().enumerate() {
        if cell.cell_type != "code" {
            continue;
        }
        let cell_name = format!(
            "cell{}",
            cell.execution_count.unwrap_or((idx0 + 1) as i64)
        );

        let mut cell_tables = Vec::new();
        for output in &cell.outputs {
            if !matches!(output.output_type.as_str(), "execute_result" | "display_data") {
                continue;
            }
            if let Some(resource) = output.data.get(DATA_RESOURCE_MIME) {
                cell_tables.extend(data_resource_table(&cell_name, resource));
            } else if let Some(markup) = output.data.get(HTML_MIME) {
                let markup = multiline_text(markup);
                if markup.to_ascii_lowercase().contains("<table") {
                    cell_tables.extend(html::load_html_str(&markup, &cell_name));
                }
            }
        }

        for (n, mut table) in cell_tables.into_iter().enumerate() {
            table.name = if n == 0 {
                cell_name.clone()
            } else {
                format!("{cell_name}_{n}")
            };
            tables.push(table);
        }
    }
    tables
}

/// nbformat stores multiline strings either as a string or as a list of lines.
fn multiline_text(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(lines) => lines.iter().filter_map(JsonValue::as_str).collect(),
        other => other.to_string(),
    }
}

fn data_resource_table(name: &str, resource: &JsonValue) -> Option<RawTable> {
    let headers: Vec<String> = resource
        .pointer("/schema/fields")?
        .as_array()?
        .iter()
        .filter_map(|f| f.get("name").and_then(JsonValue::as_str))
        .map(str::to_string)
        .collect();
    let rows = resource
        .get("data")?
        .as_array()?
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map_or(Value::Null, json_cell))
                .collect()
        })
        .collect();
    Some(RawTable::new(name, headers, rows))
}

fn json_cell(v: &JsonValue) -> Value {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notebook_detection() {
        assert!(is_notebook_path(Path::new("a/b/Analysis.IPYNB")));
        assert!(!is_notebook_path(Path::new("a/b/data.json")));
        assert!(is_notebook_url("https://example.com/nb/demo.ipynb?raw=1"));
        assert!(!is_notebook_url("https://example.com/demo.ipynb.html"));
    }

    #[test]
    fn malformed_notebook_is_not_json() {
        let err = load_notebook_bytes(b"{not valid json}", "utf-8").unwrap_err();
        assert!(matches!(err, IngestionError::NotJson { .. }));
    }

    #[test]
    fn html_lines_are_joined() {
        let v = serde_json::json!(["<table>", "</table>"]);
        assert_eq!(multiline_text(&v), "<table></table>");
    }
}
