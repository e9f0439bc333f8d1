//! Loading raw tables from sources.
//!
//! Most callers should go through [`resolve_file_loader`] / [`resolve_url_loader`] (from
//! [`unified`]), which:
//!
//! - pick a [`TableFormat`] from a hint, the extension, or the response content type
//! - return a [`TableLoader`] whose [`TableLoader::load`] yields raw tables lazily
//!
//! Format-specific readers live under [`csv`], [`json`], [`html`], [`parquet`] and (with the
//! `excel` feature) `excel`. Notebook documents are handled by [`notebook`].

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod html;
pub mod http;
pub mod json;
pub mod notebook;
pub mod parquet;
pub mod unified;

pub use http::{FetchedDocument, Fetcher, HttpFetcher};
pub use notebook::{
    is_notebook_path, is_notebook_url, load_notebook_bytes, load_notebook_file, notebook_tables,
    Notebook,
};
pub use unified::{
    lookup_encoding, resolve_file_loader, resolve_url_loader, SourceLoader, TableFormat,
    TableLoader, TableStream,
};
