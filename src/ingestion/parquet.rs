//! Parquet loading.

use std::path::Path;

use bytes::Bytes;
use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawTable, Value};

use super::unified::TableStream;

/// Stream the single table of a Parquet file.
///
/// The file is opened (and its footer validated) immediately; rows are read when the stream is
/// polled.
pub fn load_parquet_path(path: &Path, name: &str) -> IngestionResult<TableStream<'static>> {
    let reader = SerializedFileReader::try_from(path).map_err(|e| IngestionError::Open {
        message: format!("{}: {e}", path.display()),
    })?;
    Ok(lazy_table(reader, name))
}

/// Stream the single table of an in-memory Parquet document.
pub fn load_parquet_bytes(bytes: Vec<u8>, name: &str) -> IngestionResult<TableStream<'static>> {
    let reader = SerializedFileReader::new(Bytes::from(bytes)).map_err(|e| IngestionError::Open {
        message: format!("{name}: {e}"),
    })?;
    Ok(lazy_table(reader, name))
}

fn lazy_table<R: ChunkReader + 'static>(
    reader: SerializedFileReader<R>,
    name: &str,
) -> TableStream<'static> {
    let name = name.to_string();
    Box::new(std::iter::once_with(move || read_table(reader, &name)))
}

fn read_table<R: ChunkReader + 'static>(
    reader: SerializedFileReader<R>,
    name: &str,
) -> IngestionResult<RawTable> {
    let headers: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row_res in reader.get_row_iter(None)? {
        let row = row_res?;
        rows.push(
            row.get_column_iter()
                .map(|(_, field)| convert_parquet_field(field))
                .collect(),
        );
    }

    Ok(RawTable::new(name, headers, rows))
}

fn convert_parquet_field(f: &Field) -> Value {
    match f {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Bool(*b),
        Field::Byte(v) => Value::Int64(i64::from(*v)),
        Field::Short(v) => Value::Int64(i64::from(*v)),
        Field::Int(v) => Value::Int64(i64::from(*v)),
        Field::Long(v) => Value::Int64(*v),
        Field::UByte(v) => Value::Int64(i64::from(*v)),
        Field::UShort(v) => Value::Int64(i64::from(*v)),
        Field::UInt(v) => Value::Int64(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::Utf8(v.to_string())),
        Field::Float(v) => Value::Float64(f64::from(*v)),
        Field::Double(v) => Value::Float64(*v),
        Field::Str(s) => Value::Utf8(s.clone()),
        // Dates, timestamps, decimals, bytes and nested groups keep their display form.
        other => Value::Utf8(other.to_string()),
    }
}
