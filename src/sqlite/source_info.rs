//! Provenance records for created tables.
//!
//! Every table created in the destination gets exactly one [`SourceInfo`], written through a
//! [`SourceInfoStore`] right after the table is committed.

use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::IngestionResult;

/// Name of the provenance table kept in the destination database.
pub const SOURCE_INFO_TABLE: &str = "_source_info_";

/// Where one destination table came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    /// Identifies the source; shared by all tables converted from it.
    pub source_id: i64,
    pub dir_name: String,
    pub base_name: String,
    /// Resolved format (`csv`, `json`, `ipynb`, ...), never the raw hint.
    pub format_name: String,
    pub dst_table: String,
    /// Size in bytes; unknown for URL sources other than notebooks.
    pub size: Option<u64>,
    /// Modification time in seconds since the Unix epoch; unknown for URL sources.
    pub mtime: Option<i64>,
}

impl SourceInfo {
    /// Base record of a local file.
    pub fn for_file(source_id: i64, dir_name: String, base_name: String, meta: &Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);
        Self {
            source_id,
            dir_name,
            base_name,
            size: Some(meta.len()),
            mtime,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format_name: impl Into<String>) -> Self {
        self.format_name = format_name.into();
        self
    }

    pub fn with_table(&self, dst_table: impl Into<String>) -> Self {
        Self {
            dst_table: dst_table.into(),
            ..self.clone()
        }
    }
}

/// Append-only persistence for [`SourceInfo`] records.
pub trait SourceInfoStore {
    fn insert(&mut self, record: &SourceInfo) -> IngestionResult<()>;

    /// Highest `source_id` already stored, `0` if none.
    fn last_source_id(&self) -> IngestionResult<i64> {
        Ok(0)
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySourceInfoStore {
    pub records: Vec<SourceInfo>,
}

impl SourceInfoStore for MemorySourceInfoStore {
    fn insert(&mut self, record: &SourceInfo) -> IngestionResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn last_source_id(&self) -> IngestionResult<i64> {
        Ok(self.records.iter().map(|r| r.source_id).max().unwrap_or(0))
    }
}

/// Stores records in the [`SOURCE_INFO_TABLE`] table of the destination database.
pub struct SqliteSourceInfoStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSourceInfoStore<'a> {
    /// Create the provenance table if needed.
    pub fn new(conn: &'a Connection) -> IngestionResult<Self> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {SOURCE_INFO_TABLE} (
                    source_id INTEGER NOT NULL,
                    dir_name TEXT NOT NULL,
                    base_name TEXT NOT NULL,
                    format_name TEXT NOT NULL,
                    dst_table TEXT NOT NULL,
                    size INTEGER,
                    mtime INTEGER
                )"
            ),
            [],
        )?;
        Ok(Self { conn })
    }
}

impl SourceInfoStore for SqliteSourceInfoStore<'_> {
    fn insert(&mut self, record: &SourceInfo) -> IngestionResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {SOURCE_INFO_TABLE}
                    (source_id, dir_name, base_name, format_name, dst_table, size, mtime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                record.source_id,
                record.dir_name,
                record.base_name,
                record.format_name,
                record.dst_table,
                record.size.map(|s| s as i64),
                record.mtime,
            ],
        )?;
        Ok(())
    }

    fn last_source_id(&self) -> IngestionResult<i64> {
        let max: Option<i64> = self.conn.query_row(
            &format!("SELECT MAX(source_id) FROM {SOURCE_INFO_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }
}

/// Hands out source ids and writes records through an optional store.
///
/// Records are also kept in memory so callers can report them at the end of a run.
pub struct SourceInfoRecorder<'a> {
    store: Option<Box<dyn SourceInfoStore + 'a>>,
    last_source_id: i64,
    records: Vec<SourceInfo>,
}

impl<'a> SourceInfoRecorder<'a> {
    /// A recorder that only keeps records in memory.
    pub fn new() -> Self {
        Self {
            store: None,
            last_source_id: 0,
            records: Vec::new(),
        }
    }

    /// A recorder that writes through `store`, continuing its source id sequence.
    pub fn with_store(store: impl SourceInfoStore + 'a) -> IngestionResult<Self> {
        let last_source_id = store.last_source_id()?;
        Ok(Self {
            store: Some(Box::new(store)),
            last_source_id,
            records: Vec::new(),
        })
    }

    pub fn next_source_id(&mut self) -> i64 {
        self.last_source_id += 1;
        self.last_source_id
    }

    /// Persist `record` immediately.
    pub fn record(&mut self, record: SourceInfo) -> IngestionResult<()> {
        self.persist(&record)?;
        self.keep(record);
        Ok(())
    }

    /// Write `record` to the store only. Pair with [`Self::keep`] once the table it describes
    /// is committed.
    pub(crate) fn persist(&mut self, record: &SourceInfo) -> IngestionResult<()> {
        match self.store.as_mut() {
            Some(store) => store.insert(record),
            None => Ok(()),
        }
    }

    pub(crate) fn keep(&mut self, record: SourceInfo) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SourceInfo] {
        &self.records
    }
}

impl Default for SourceInfoRecorder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
