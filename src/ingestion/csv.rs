//! CSV/TSV loading.

use std::io::Read;

use crate::error::IngestionResult;
use crate::types::{RawTable, Value};

use super::unified::TableStream;

/// Stream the single table of a delimited text source.
///
/// Rules:
///
/// - The first record is the header row.
/// - A source without a header row (empty file) yields no table.
/// - Every record must have as many fields as the header (otherwise a data error is yielded).
/// - Empty/whitespace-only fields become [`Value::Null`].
///
/// Nothing is read until the stream is polled; the reader (and the file it wraps) is dropped as
/// soon as the table has been produced or an error surfaced.
pub fn load_delimited<R: Read + 'static>(
    reader: R,
    delimiter: u8,
    name: String,
) -> TableStream<'static> {
    let rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(reader);
    Box::new(DelimitedTable {
        reader: Some(rdr),
        name,
    })
}

struct DelimitedTable<R> {
    reader: Option<::csv::Reader<R>>,
    name: String,
}

impl<R: Read> Iterator for DelimitedTable<R> {
    type Item = IngestionResult<RawTable>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut rdr = self.reader.take()?;
        read_table(&mut rdr, &self.name).transpose()
    }
}

/// Read a whole delimited table from an existing CSV reader.
///
/// Returns `Ok(None)` when the input has no header row.
pub fn read_table<R: Read>(
    rdr: &mut ::csv::Reader<R>,
    name: &str,
) -> IngestionResult<Option<RawTable>> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Ok(None);
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(Value::from_text).collect());
    }

    Ok(Some(RawTable::new(name, headers, rows)))
}
