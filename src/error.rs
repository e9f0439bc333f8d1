use thiserror::Error;

/// Convenience result type for loading, sanitizing and table creation.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Closed classification of [`IngestionError`]s.
///
/// Converters match on this tag to decide between skip, recoverable failure and fatal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source cannot be opened/stat'ed as a loadable source.
    InvalidPath,
    /// No loader recognises the format hint / extension combination.
    LoaderNotFound,
    /// The source could be resolved but not opened or parsed at all.
    Open,
    /// The source parsed but does not have a supported table shape.
    Validation,
    /// Malformed data inside an otherwise supported source.
    Data,
    /// A table or column could not be normalized.
    Value,
    /// Filesystem or database I/O failure.
    Io,
    /// A notebook document is not valid JSON.
    NotJson,
    /// HTTP status error or unusable URL.
    Http,
    /// The configured proxy aborted the connection.
    Proxy,
}

/// Error type shared by loaders, the sanitizer and the table creator.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Excel loading error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV parsing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet reading error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Destination database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid path: {message}")]
    InvalidPath { message: String },

    #[error("loader not found: {message}")]
    LoaderNotFound { message: String },

    #[error("open error: {message}")]
    Open { message: String },

    /// The input parsed, but its shape is not one of the supported table layouts.
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("data error: {message}")]
    Data { message: String },

    /// A table could not be normalized or created (bad name, no columns, duplicate columns, ...).
    #[error("invalid value: {message}")]
    Value { message: String },

    #[error("not a json document: {message}")]
    NotJson { message: String },

    #[error("http error: {message}")]
    Http { message: String },

    #[error("proxy error: {message}")]
    Proxy { message: String },
}

impl IngestionError {
    /// Returns the closed [`ErrorKind`] tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestionError::Io(_) => ErrorKind::Io,
            #[cfg(feature = "excel")]
            IngestionError::Excel(_) => ErrorKind::Open,
            IngestionError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => ErrorKind::Open,
                _ => ErrorKind::Data,
            },
            IngestionError::Parquet(_) => ErrorKind::Data,
            IngestionError::Sqlite(_) => ErrorKind::Io,
            IngestionError::InvalidPath { .. } => ErrorKind::InvalidPath,
            IngestionError::LoaderNotFound { .. } => ErrorKind::LoaderNotFound,
            IngestionError::Open { .. } => ErrorKind::Open,
            IngestionError::Validation { .. } => ErrorKind::Validation,
            IngestionError::Data { .. } => ErrorKind::Data,
            IngestionError::Value { .. } => ErrorKind::Value,
            IngestionError::NotJson { .. } => ErrorKind::NotJson,
            IngestionError::Http { .. } => ErrorKind::Http,
            IngestionError::Proxy { .. } => ErrorKind::Proxy,
        }
    }

    /// Short variant name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            IngestionError::Io(_) => "IoError",
            #[cfg(feature = "excel")]
            IngestionError::Excel(_) => "ExcelError",
            IngestionError::Csv(_) => "CsvError",
            IngestionError::Parquet(_) => "ParquetError",
            IngestionError::Sqlite(_) => "SqliteError",
            IngestionError::InvalidPath { .. } => "InvalidPathError",
            IngestionError::LoaderNotFound { .. } => "LoaderNotFoundError",
            IngestionError::Open { .. } => "OpenError",
            IngestionError::Validation { .. } => "ValidationError",
            IngestionError::Data { .. } => "DataError",
            IngestionError::Value { .. } => "ValueError",
            IngestionError::NotJson { .. } => "NotJsonError",
            IngestionError::Http { .. } => "HttpError",
            IngestionError::Proxy { .. } => "ProxyError",
        }
    }

    pub(crate) fn value(message: impl Into<String>) -> Self {
        IngestionError::Value {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        IngestionError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn data(message: impl Into<String>) -> Self {
        IngestionError::Data {
            message: message.into(),
        }
    }
}
