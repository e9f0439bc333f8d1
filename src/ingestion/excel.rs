#![cfg(feature = "excel")]

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};

use crate::error::IngestionResult;
use crate::types::{RawTable, Value};

use super::unified::TableStream;

/// Stream the sheets of an Excel document (`.xlsx`, `.xls`, `.ods`, etc.), one table per sheet.
///
/// Behavior:
/// - Sheets are visited in workbook order, one per poll of the stream
/// - The first non-empty row of a sheet is its header row
/// - Sheets without any non-empty row are skipped
/// - The workbook stays open until the stream is dropped
pub fn load_workbook_path(path: impl AsRef<Path>) -> IngestionResult<TableStream<'static>> {
    let workbook = open_workbook_auto(path)?;
    Ok(Box::new(SheetTables::new(workbook)))
}

/// Stream the sheets of an in-memory Excel document.
pub fn load_workbook_bytes(bytes: Vec<u8>) -> IngestionResult<TableStream<'static>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    Ok(Box::new(SheetTables::new(workbook)))
}

struct SheetTables<RS: Read + Seek> {
    workbook: Sheets<RS>,
    sheets: Vec<String>,
    next: usize,
}

impl<RS: Read + Seek> SheetTables<RS> {
    fn new(workbook: Sheets<RS>) -> Self {
        let sheets = workbook.sheet_names().to_vec();
        Self {
            workbook,
            sheets,
            next: 0,
        }
    }
}

impl<RS: Read + Seek> Iterator for SheetTables<RS> {
    type Item = IngestionResult<RawTable>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(sheet) = self.sheets.get(self.next).cloned() {
            self.next += 1;
            let range = match self.workbook.worksheet_range(&sheet) {
                Ok(range) => range,
                Err(e) => return Some(Err(e.into())),
            };
            if let Some(table) = sheet_table(&sheet, &range) {
                return Some(Ok(table));
            }
        }
        None
    }
}

fn sheet_table(sheet: &str, range: &calamine::Range<Data>) -> Option<RawTable> {
    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));
    let headers: Vec<String> = rows.next()?.iter().map(cell_to_header_string).collect();
    let rows = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    Some(RawTable::new(sheet, headers, rows))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Empty | Data::Error(_) => "".to_string(),
        other => other.to_string(),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::from_text(s),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}
