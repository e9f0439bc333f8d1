//! Destination database: table creation and provenance records.

pub mod destination;
pub mod source_info;

pub use destination::Destination;
pub use source_info::{
    MemorySourceInfoStore, SourceInfo, SourceInfoRecorder, SourceInfoStore, SqliteSourceInfoStore,
    SOURCE_INFO_TABLE,
};
