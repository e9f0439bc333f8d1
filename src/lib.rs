//! `sqlite-ingest` converts the tables found in files, URLs and Jupyter notebooks into tables of
//! a SQLite database, and records where every created table came from.
//!
//! The pipeline for one source is:
//!
//! 1. a loader is resolved for the source ([`ingestion::resolve_file_loader`] /
//!    [`ingestion::resolve_url_loader`]); notebooks are routed to [`ingestion::notebook`]
//! 2. the loader lazily yields zero or more [`types::RawTable`]s
//! 3. each one is normalized by [`processing::sanitize()`] into a [`types::SanitizedTable`]
//! 4. [`sqlite::Destination::create_table`] creates it (never overwriting an existing table)
//! 5. a [`sqlite::SourceInfo`] record is written and the success counted
//!
//! [`convert::FileConverter`] and [`convert::UrlConverter`] drive that pipeline and decide how
//! failures are counted (see [`convert::ResultCounter`] and [`convert::ExitCode`]).
//!
//! ## What you can convert
//!
//! **File formats (auto-detected by extension, URL path or `Content-Type`):**
//!
//! - **CSV / TSV**: `.csv`, `.tsv`
//! - **JSON**: `.json` (array of objects, object of arrays, or nested documents), `.jsonl` /
//!   `.ndjson`
//! - **HTML**: every `<table>` of a page
//! - **Parquet**: `.parquet`, `.pq`
//! - **Excel/workbooks** (requires the Cargo feature `excel`): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`,
//!   `.ods`
//! - **Jupyter notebooks**: `.ipynb`, one table per tabular cell output
//!
//! Column types are inferred per column ([`types::DataType`]); empty cells and JSON `null` map to
//! [`types::Value::Null`].
//!
//! ## Quick example
//!
//! ```no_run
//! use sqlite_ingest::convert::{ConvertOptions, FileConverter, RunContext};
//! use sqlite_ingest::sqlite::Destination;
//!
//! # fn main() -> Result<(), sqlite_ingest::IngestionError> {
//! let destination = Destination::open("out.sqlite")?;
//! let mut ctx = RunContext::with_source_info_table(&destination)?;
//!
//! let options = ConvertOptions {
//!     index_list: vec!["id".to_string()],
//!     ..ConvertOptions::default()
//! };
//! FileConverter::new(options).convert(&mut ctx, "people.csv".as_ref());
//!
//! for record in ctx.source_infos() {
//!     println!("{} -> {}", record.base_name, record.dst_table);
//! }
//! std::process::exit(ctx.counter().exit_code().code());
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`convert`]: file and URL converters, run context, counters and exit codes
//! - [`ingestion`]: format dispatch and format-specific loaders
//! - [`processing`]: table sanitizing (names, duplicate columns, type inference)
//! - [`sqlite`]: destination database and provenance records
//! - [`types`]: raw and sanitized table types
//! - [`error`]: error type and its closed kind tag

pub mod convert;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod sqlite;
pub mod types;

pub use error::{ErrorKind, IngestionError, IngestionResult};
