//! HTML table extraction.
//!
//! Every `<table>` element of a page becomes one raw table. The first row (`<th>` or `<td>`
//! cells) is the header row. Nested tables are not supported: an inner `</table>` ends the
//! outer table.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{RawTable, Value};

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table\s*>").expect("valid regex"));
static CAPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<caption\b[^>]*>(.*?)</caption\s*>").expect("valid regex"));
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid regex"));
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:th|td)\b[^>]*>(.*?)</(?:th|td)\s*>").expect("valid regex")
});
static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bid\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Extract all tables of an HTML document.
///
/// Tables are named after their `<caption>`, else their `id` attribute, else
/// `<name>_html<N>` (1-based position on the page). Tables without rows are skipped.
pub fn load_html_str(input: &str, name: &str) -> Vec<RawTable> {
    let mut tables = Vec::new();
    for (idx0, caps) in TABLE_RE.captures_iter(input).enumerate() {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());

        let mut rows: Vec<Vec<String>> = ROW_RE
            .captures_iter(body)
            .map(|row| {
                let row_body = row.get(1).map_or("", |m| m.as_str());
                CELL_RE
                    .captures_iter(row_body)
                    .map(|cell| cell_text(cell.get(1).map_or("", |m| m.as_str())))
                    .collect()
            })
            .filter(|cells: &Vec<String>| !cells.is_empty())
            .collect();
        if rows.is_empty() {
            continue;
        }

        let headers = rows.remove(0);
        let table_name = CAPTION_RE
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| cell_text(m.as_str()))
            .filter(|s| !s.is_empty())
            .or_else(|| {
                ID_RE
                    .captures(attrs)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| format!("{name}_html{}", idx0 + 1));

        let rows = rows
            .into_iter()
            .map(|cells| cells.iter().map(|c| Value::from_text(c)).collect())
            .collect();
        tables.push(RawTable::new(table_name, headers, rows));
    }
    tables
}

/// Strip tags, decode common entities and collapse whitespace.
fn cell_text(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, " ");
    let text = decode_entities(&text);
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
