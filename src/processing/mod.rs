//! Table normalization.
//!
//! Every [`crate::types::RawTable`] a loader yields passes through [`sanitize()`] before it
//! reaches the destination database:
//!
//! - [`columns`]: header cleaning and duplicate column handling ([`DupColumnPolicy`])
//! - [`infer`]: per-column type inference and cell coercion
//! - [`sanitize`](mod@sanitize): table name rules and the full pipeline

pub mod columns;
pub mod infer;
pub mod sanitize;

pub use columns::{clean_header, dedup_columns, DupColumnPolicy};
pub use infer::{coerce, infer_column_type};
pub use sanitize::{sanitize, sanitize_table_name};
