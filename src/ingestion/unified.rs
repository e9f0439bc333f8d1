//! Format dispatch and the loader contract.
//!
//! Most callers should use [`resolve_file_loader`] or [`resolve_url_loader`], which pick a
//! [`TableFormat`] and return a [`TableLoader`] bound to it.
//!
//! - If a format hint is given it wins over every other signal.
//! - Otherwise files are dispatched by extension; URLs by the extension of the URL path, then by
//!   the response `Content-Type`.
//! - Notebook documents are never served by a generic loader; converters route them to
//!   [`super::notebook`] before asking for one.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use encoding_rs::Encoding;
use tracing::debug;
use url::Url;

use crate::error::{IngestionError, IngestionResult};
use crate::types::RawTable;

use super::http::Fetcher;
use super::{csv, html, json, parquet};

/// Lazy sequence of raw tables produced by a loader.
///
/// `Some(Ok(table))` is the next table, `None` the end of the source and `Some(Err(_))` a
/// source-level failure after which the stream should be dropped. Dropping the stream releases
/// any file handle the loader opened.
pub type TableStream<'a> = Box<dyn Iterator<Item = IngestionResult<RawTable>> + 'a>;

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
    /// A JSON array of objects, or an object of such arrays.
    Json,
    /// Newline-delimited JSON objects.
    JsonLines,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
    /// `<table>` elements of an HTML page.
    Html,
    /// Apache Parquet.
    Parquet,
    /// Jupyter notebook documents.
    Ipynb,
}

impl TableFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "html" | "htm" => Some(Self::Html),
            "parquet" | "pq" => Some(Self::Parquet),
            "ipynb" => Some(Self::Ipynb),
            _ => None,
        }
    }

    /// Parse a user-supplied format name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "json_lines" | "jsonl" | "ndjson" => Some(Self::JsonLines),
            "excel" | "xlsx" | "xls" => Some(Self::Excel),
            "html" | "htm" => Some(Self::Html),
            "parquet" => Some(Self::Parquet),
            "ipynb" => Some(Self::Ipynb),
            _ => None,
        }
    }

    /// Parse a format from an HTTP `Content-Type` header value. Parameters are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/csv" | "application/csv" => Some(Self::Csv),
            "text/tab-separated-values" => Some(Self::Tsv),
            "application/json" | "text/json" => Some(Self::Json),
            "application/x-ndjson" | "application/jsonl" | "application/jsonlines" => {
                Some(Self::JsonLines)
            }
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(Self::Excel),
            "application/vnd.apache.parquet" | "application/x-parquet" => Some(Self::Parquet),
            "application/x-ipynb+json" => Some(Self::Ipynb),
            _ => None,
        }
    }

    /// Canonical name, recorded as `format_name` in source info records.
    pub fn name(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::JsonLines => "json_lines",
            Self::Excel => "excel",
            Self::Html => "html",
            Self::Parquet => "parquet",
            Self::Ipynb => "ipynb",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown format '{s}'"))
    }
}

/// Yields the raw tables of one source.
pub trait TableLoader {
    /// Format this loader is bound to.
    fn format(&self) -> TableFormat;

    /// Human-readable source label for log lines.
    fn source_label(&self) -> &str;

    /// Start loading. Fails up front if the source cannot be opened at all.
    fn load(&mut self) -> IngestionResult<TableStream<'_>>;

    /// Re-read the source as deeply nested data, one table per embedded array of objects.
    ///
    /// Only meaningful after [`Self::load`] reported a validation failure.
    fn load_flattened(&mut self) -> IngestionResult<TableStream<'_>> {
        Err(IngestionError::validation(format!(
            "{} sources cannot be flattened",
            self.format()
        )))
    }
}

#[derive(Debug)]
enum Document {
    File(PathBuf),
    Memory(Vec<u8>),
}

/// The loader behind both resolve functions: a document (on disk or fetched) plus a format.
#[derive(Debug)]
pub struct SourceLoader {
    document: Document,
    format: TableFormat,
    encoding: &'static Encoding,
    table_stem: String,
    label: String,
}

impl SourceLoader {
    fn read_bytes(&self) -> IngestionResult<Cow<'_, [u8]>> {
        match &self.document {
            Document::File(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| IngestionError::Open {
                    message: format!("{}: {e}", path.display()),
                }),
            Document::Memory(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        }
    }

    fn read_text(&self) -> IngestionResult<String> {
        let bytes = self.read_bytes()?;
        Ok(decode_text(&bytes, self.encoding))
    }

    fn load_delimited(&self, delimiter: u8) -> IngestionResult<TableStream<'static>> {
        let name = self.table_stem.clone();
        match &self.document {
            // The CSV reader keeps the file open until the stream is dropped.
            Document::File(path) if self.encoding == encoding_rs::UTF_8 => {
                let file = fs::File::open(path).map_err(|e| IngestionError::Open {
                    message: format!("{}: {e}", path.display()),
                })?;
                Ok(csv::load_delimited(file, delimiter, name))
            }
            _ => {
                let text = self.read_text()?;
                Ok(csv::load_delimited(
                    Cursor::new(text.into_bytes()),
                    delimiter,
                    name,
                ))
            }
        }
    }

    #[cfg(feature = "excel")]
    fn load_excel(&self) -> IngestionResult<TableStream<'static>> {
        match &self.document {
            Document::File(path) => super::excel::load_workbook_path(path),
            Document::Memory(bytes) => super::excel::load_workbook_bytes(bytes.clone()),
        }
    }

    #[cfg(not(feature = "excel"))]
    fn load_excel(&self) -> IngestionResult<TableStream<'static>> {
        Err(excel_disabled())
    }
}

impl TableLoader for SourceLoader {
    fn format(&self) -> TableFormat {
        self.format
    }

    fn source_label(&self) -> &str {
        &self.label
    }

    fn load(&mut self) -> IngestionResult<TableStream<'_>> {
        debug!(format = %self.format, source = %self.label, "loading tables");
        match self.format {
            TableFormat::Csv => self.load_delimited(b','),
            TableFormat::Tsv => self.load_delimited(b'\t'),
            TableFormat::Json => {
                let text = self.read_text()?;
                Ok(into_stream(json::load_json_str(&text, &self.table_stem)?))
            }
            TableFormat::JsonLines => {
                let text = self.read_text()?;
                Ok(into_stream(vec![json::load_ndjson_str(
                    &text,
                    &self.table_stem,
                )?]))
            }
            TableFormat::Html => {
                let text = self.read_text()?;
                Ok(into_stream(html::load_html_str(&text, &self.table_stem)))
            }
            TableFormat::Excel => self.load_excel(),
            TableFormat::Parquet => match &self.document {
                Document::File(path) => parquet::load_parquet_path(path, &self.table_stem),
                Document::Memory(bytes) => {
                    parquet::load_parquet_bytes(bytes.clone(), &self.table_stem)
                }
            },
            TableFormat::Ipynb => Err(notebook_not_loadable(&self.label)),
        }
    }

    fn load_flattened(&mut self) -> IngestionResult<TableStream<'_>> {
        match self.format {
            TableFormat::Json => {
                let text = self.read_text()?;
                Ok(into_stream(json::load_complex_json_str(
                    &text,
                    &self.table_stem,
                )?))
            }
            other => Err(IngestionError::validation(format!(
                "{other} sources cannot be flattened"
            ))),
        }
    }
}

fn into_stream<'a>(tables: Vec<RawTable>) -> TableStream<'a> {
    Box::new(tables.into_iter().map(Ok))
}

/// Resolve a loader for a local file.
///
/// Errors:
/// - [`IngestionError::InvalidPath`] if `path` cannot be stat'ed or is not a regular file
/// - [`IngestionError::LoaderNotFound`] if neither `format` nor the extension names a loader
pub fn resolve_file_loader(
    path: &Path,
    format: Option<TableFormat>,
    encoding: &str,
) -> IngestionResult<Box<dyn TableLoader>> {
    let meta = fs::metadata(path).map_err(|e| IngestionError::InvalidPath {
        message: format!("{}: {e}", path.display()),
    })?;
    if !meta.is_file() {
        return Err(IngestionError::InvalidPath {
            message: format!("{}: not a file", path.display()),
        });
    }

    let format = match format {
        Some(f) => f,
        None => infer_format_from_path(path)?,
    };
    let label = path.display().to_string();
    ensure_loadable(format, &label)?;

    Ok(Box::new(SourceLoader {
        document: Document::File(path.to_path_buf()),
        format,
        encoding: lookup_encoding(encoding)?,
        table_stem: file_stem(path),
        label,
    }))
}

/// Resolve a loader for a URL, fetching the document through `fetcher`.
///
/// A document that turns out to be an HTML page is only served by the HTML loader: any other
/// resolved format reports [`IngestionError::LoaderNotFound`] so the caller can retry with
/// [`TableFormat::Html`]. Forcing HTML on content that is not markup is also
/// `LoaderNotFound`. Fetch failures surface as [`IngestionError::Http`] or
/// [`IngestionError::Proxy`].
pub fn resolve_url_loader(
    fetcher: &dyn Fetcher,
    url: &str,
    format: Option<TableFormat>,
    encoding: &str,
) -> IngestionResult<Box<dyn TableLoader>> {
    let parsed = Url::parse(url).map_err(|e| IngestionError::Http {
        message: format!("invalid url '{url}': {e}"),
    })?;
    let encoding = lookup_encoding(encoding)?;

    let doc = fetcher.fetch(url)?;
    let resolved = format
        .or_else(|| url_extension(&parsed).and_then(TableFormat::from_extension))
        .or_else(|| {
            doc.content_type
                .as_deref()
                .and_then(TableFormat::from_content_type)
        });
    let format = resolved.ok_or_else(|| IngestionError::LoaderNotFound {
        message: format!(
            "no loader matches '{url}' (content-type={})",
            doc.content_type.as_deref().unwrap_or("unknown")
        ),
    })?;
    ensure_loadable(format, url)?;

    match format {
        TableFormat::Html if !starts_with_markup(&doc.bytes) => {
            return Err(IngestionError::LoaderNotFound {
                message: format!("content of '{url}' is not HTML markup"),
            });
        }
        TableFormat::Html => {}
        other if looks_like_html(&doc.bytes) => {
            return Err(IngestionError::LoaderNotFound {
                message: format!("'{url}' returned an HTML page, not {other} data"),
            });
        }
        _ => {}
    }

    Ok(Box::new(SourceLoader {
        document: Document::Memory(doc.bytes),
        format,
        encoding,
        table_stem: url_stem(&parsed),
        label: logging_url_path(&parsed),
    }))
}

/// Look up a character encoding by its WHATWG label (`utf-8`, `shift_jis`, `latin1`, ...).
pub fn lookup_encoding(label: &str) -> IngestionResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IngestionError::value(format!("unknown encoding '{label}'")))
}

/// Decode `bytes`, honouring a byte-order mark over `encoding`. Malformed sequences are replaced.
pub(crate) fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn infer_format_from_path(path: &Path) -> IngestionResult<TableFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestionError::LoaderNotFound {
            message: format!(
                "cannot infer format: path has no extension ({})",
                path.display()
            ),
        })?;

    TableFormat::from_extension(ext).ok_or_else(|| IngestionError::LoaderNotFound {
        message: format!(
            "cannot infer format from extension '{ext}' for path ({})",
            path.display()
        ),
    })
}

fn ensure_loadable(format: TableFormat, label: &str) -> IngestionResult<()> {
    match format {
        TableFormat::Ipynb => Err(notebook_not_loadable(label)),
        #[cfg(not(feature = "excel"))]
        TableFormat::Excel => Err(excel_disabled()),
        _ => Ok(()),
    }
}

fn notebook_not_loadable(label: &str) -> IngestionError {
    IngestionError::LoaderNotFound {
        message: format!("'{label}' is a notebook document; no table loader applies"),
    }
}

#[cfg(not(feature = "excel"))]
fn excel_disabled() -> IngestionError {
    IngestionError::LoaderNotFound {
        message: "excel loading not enabled (enable cargo feature 'excel')".to_string(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "table".to_string())
}

fn url_extension(url: &Url) -> Option<&str> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    Some(ext)
}

fn url_stem(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let stem = last.rsplit_once('.').map_or(last, |(stem, _)| stem);
    if !stem.is_empty() {
        stem.to_string()
    } else {
        url.host_str().unwrap_or("table").to_string()
    }
}

/// `host + path` of a URL, as shown in log lines.
pub fn logging_url_path(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or_default(), url.path())
}

fn sniff_prefix(bytes: &[u8]) -> String {
    let head = &bytes[..bytes.len().min(4096)];
    String::from_utf8_lossy(head)
        .trim_start_matches('\u{feff}')
        .trim_start()
        .to_ascii_lowercase()
}

fn starts_with_markup(bytes: &[u8]) -> bool {
    sniff_prefix(bytes).starts_with('<')
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = sniff_prefix(bytes);
    head.starts_with('<')
        && (head.starts_with("<!doctype html")
            || head.contains("<html")
            || head.contains("<table"))
}
