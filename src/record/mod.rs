//! Row model of a time series.
//!
//! Schemas, typed values, the canonical [`RecordBatch`] and the conversions
//! that turn caller data into it.

pub mod batch;
pub mod convert;
pub mod frame;
pub mod schema;
pub mod value;

pub use batch::{Record, RecordBatch};
pub use convert::{
    Column, ColumnBatch, ColumnData, ConversionError, IntoRecordBatch, TsRow, ValueRows,
};
pub use frame::TimeIndexedFrame;
pub use schema::{Field, FieldType, Schema, SchemaError, TIMESTAMP_FIELD};
pub use value::Value;
