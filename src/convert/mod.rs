//! Source-to-table conversion.
//!
//! A run converts sources one at a time through a [`FileConverter`] or a [`UrlConverter`].
//! Both drive the same pipeline for every raw table a loader yields:
//!
//! loader → [`crate::processing::sanitize()`] → [`Destination::create_table`] → source info
//! record → success count
//!
//! All state shared across sources (destination, counters, recorded provenance) lives in a
//! [`RunContext`] that the caller owns and passes to each `convert` call.
//!
//! ## Example
//!
//! ```no_run
//! use sqlite_ingest::convert::{ConvertOptions, FileConverter, RunContext};
//! use sqlite_ingest::sqlite::Destination;
//!
//! # fn main() -> Result<(), sqlite_ingest::IngestionError> {
//! let destination = Destination::open("out.sqlite")?;
//! let mut ctx = RunContext::with_source_info_table(&destination)?;
//! let converter = FileConverter::new(ConvertOptions::default());
//! converter.convert(&mut ctx, "data/sales.csv".as_ref());
//! println!("{}", ctx.counter());
//! # Ok(())
//! # }
//! ```

mod file;
mod result;
mod url;

use tracing::{debug, error};

use crate::error::{ErrorKind, IngestionError, IngestionResult};
use crate::ingestion::notebook::{notebook_tables, Notebook};
use crate::ingestion::{TableFormat, TableLoader};
use crate::processing::{sanitize, DupColumnPolicy};
use crate::sqlite::{Destination, SourceInfo, SourceInfoRecorder, SqliteSourceInfoStore};
use crate::types::RawTable;

pub use file::FileConverter;
pub use result::{ExitCode, FatalError, ResultCounter};
pub use url::UrlConverter;

/// Options shared by both converters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Format hint. When set it overrides every other way of picking a loader.
    pub format: Option<TableFormat>,
    /// Character encoding of text sources (WHATWG label).
    pub encoding: String,
    /// Columns to index in every created table that has them.
    pub index_list: Vec<String>,
    pub dup_col_policy: DupColumnPolicy,
    /// Proxy for URL sources, used for both `http` and `https`.
    pub proxy: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: None,
            encoding: "utf-8".to_string(),
            index_list: Vec::new(),
            dup_col_policy: DupColumnPolicy::default(),
            proxy: None,
        }
    }
}

/// Mutable state of one conversion run.
pub struct RunContext<'a> {
    destination: &'a Destination,
    counter: ResultCounter,
    recorder: SourceInfoRecorder<'a>,
}

impl<'a> RunContext<'a> {
    /// Context whose source info records are only kept in memory.
    pub fn new(destination: &'a Destination) -> Self {
        Self::with_recorder(destination, SourceInfoRecorder::new())
    }

    /// Context that also persists source info records in the destination database.
    pub fn with_source_info_table(destination: &'a Destination) -> IngestionResult<Self> {
        let store = SqliteSourceInfoStore::new(destination.connection())?;
        Ok(Self::with_recorder(
            destination,
            SourceInfoRecorder::with_store(store)?,
        ))
    }

    pub fn with_recorder(destination: &'a Destination, recorder: SourceInfoRecorder<'a>) -> Self {
        Self {
            destination,
            counter: ResultCounter::new(),
            recorder,
        }
    }

    pub fn destination(&self) -> &'a Destination {
        self.destination
    }

    pub fn counter(&self) -> &ResultCounter {
        &self.counter
    }

    /// Records of every table created so far, in creation order.
    pub fn source_infos(&self) -> &[SourceInfo] {
        self.recorder.records()
    }

    pub(crate) fn next_source_id(&mut self) -> i64 {
        self.recorder.next_source_id()
    }
}

/// Sanitize, create and record one raw table. Counts the success; failures are left to the
/// caller to count.
pub(crate) fn convert_table(
    ctx: &mut RunContext<'_>,
    options: &ConvertOptions,
    raw: RawTable,
    base: &SourceInfo,
    source: &str,
) -> IngestionResult<String> {
    debug!("loaded tabledata: {raw}");
    let table = sanitize(raw, options.dup_col_policy)?;
    let destination = ctx.destination;
    let recorder = &mut ctx.recorder;
    let mut created = None;
    // The record is written in the table's transaction: no table without its record.
    let name = destination.create_table_with(&table, &options.index_list, source, |name| {
        let record = base.with_table(name);
        recorder.persist(&record)?;
        created = Some(record);
        Ok(())
    })?;
    if let Some(record) = created {
        recorder.keep(record);
    }
    ctx.counter.inc_success();
    Ok(name)
}

/// Convert every table found in a notebook's cell outputs. A failing table does not stop the
/// remaining ones.
pub(crate) fn convert_notebook(
    ctx: &mut RunContext<'_>,
    options: &ConvertOptions,
    notebook: &Notebook,
    base: &SourceInfo,
    source: &str,
) -> usize {
    let base = base.clone().with_format(TableFormat::Ipynb.name());
    let mut created = 0;
    for raw in notebook_tables(notebook) {
        match convert_table(ctx, options, raw, &base, source) {
            Ok(_) => created += 1,
            Err(e) => {
                log_table_failure(&e, source);
                ctx.counter.inc_fail();
            }
        }
    }
    debug!(source, created, "converted notebook");
    created
}

/// Convert a JSON source that did not match the simple layouts by flattening it.
pub(crate) fn convert_complex_json(
    ctx: &mut RunContext<'_>,
    options: &ConvertOptions,
    loader: &mut dyn TableLoader,
    base: &SourceInfo,
    source: &str,
) -> usize {
    let stream = match loader.load_flattened() {
        Ok(stream) => stream,
        Err(e) => {
            error!("{}: invalid json data: source={source}, message={e}", e.name());
            ctx.counter.inc_fail();
            return 0;
        }
    };

    let mut created = 0;
    for item in stream {
        let raw = match item {
            Ok(raw) => raw,
            Err(e) => {
                error!("{}: invalid json data: source={source}, message={e}", e.name());
                ctx.counter.inc_fail();
                break;
            }
        };
        match convert_table(ctx, options, raw, base, source) {
            Ok(_) => created += 1,
            Err(e) => {
                log_table_failure(&e, source);
                ctx.counter.inc_fail();
            }
        }
    }
    created
}

fn log_table_failure(e: &IngestionError, source: &str) {
    if e.kind() == ErrorKind::Io {
        error!("{}: failed to convert: source={source}, message={e}", e.name());
    } else {
        debug!("{}: source={source}, message={e}", e.name());
    }
}
