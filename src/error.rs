//! Crate-scoped error handling for redb-tstable.
//!
//! Each layer keeps its own precise error type; this module folds them into
//! the single [`Error`] returned by the public time series API.

use std::fmt;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type exposed to users of the crate.
#[derive(Debug)]
pub enum Error {
    /// Malformed table schema
    Schema(crate::record::SchemaError),

    /// Caller data that does not fit the table schema
    Conversion(crate::record::ConversionError),

    /// Timestamps outside the representable range
    Encoding(crate::time::EncodingError),

    /// Invalid ranges and partition configuration
    Partition(crate::partition::PartitionError),

    /// Rejected appends (ordering violations)
    Append(crate::table::AppendError),

    /// Errors from the underlying table store
    Store(crate::store::StoreError),

    /// The node exists but does not carry the time series markers
    NotTimeSeries(String),
}

impl From<crate::record::SchemaError> for Error {
    fn from(err: crate::record::SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<crate::record::ConversionError> for Error {
    fn from(err: crate::record::ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<crate::time::EncodingError> for Error {
    fn from(err: crate::time::EncodingError) -> Self {
        Error::Encoding(err)
    }
}

impl From<crate::partition::PartitionError> for Error {
    fn from(err: crate::partition::PartitionError) -> Self {
        Error::Partition(err)
    }
}

impl From<crate::table::AppendError> for Error {
    fn from(err: crate::table::AppendError) -> Self {
        Error::Append(err)
    }
}

impl From<crate::store::StoreError> for Error {
    fn from(err: crate::store::StoreError) -> Self {
        Error::Store(err)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Schema(err) => Some(err),
            Error::Conversion(err) => Some(err),
            Error::Encoding(err) => Some(err),
            Error::Partition(err) => Some(err),
            Error::Append(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::NotTimeSeries(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(err) => write!(f, "Schema error: {}", err),
            Error::Conversion(err) => write!(f, "Conversion error: {}", err),
            Error::Encoding(err) => write!(f, "Timestamp encoding error: {}", err),
            Error::Partition(err) => write!(f, "Partition error: {}", err),
            Error::Append(err) => write!(f, "Append rejected: {}", err),
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::NotTimeSeries(path) => write!(f, "Not a time series table: {}", path),
        }
    }
}
