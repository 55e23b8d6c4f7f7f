//! Conversion of caller data into canonical record batches.
//!
//! Appends accept any type implementing [`IntoRecordBatch`]. The accepted
//! representations are a fixed set, each with its own conversion:
//!
//! - [`RecordBatch`] and `Vec<Record>`: already canonical, checked only
//! - `&[T]` where `T: TsRow`: a sequence of caller structs
//! - [`ValueRows`]: row-major dynamic values, timestamp first
//! - [`ColumnBatch`]: column-major typed columns, matched by name
//! - [`TimeIndexedFrame`](crate::record::TimeIndexedFrame): rows keyed by a
//!   `DateTime<Utc>` index
//!
//! Dynamic inputs are coerced to the schema's field types following
//! [`Value::coerce`].

use crate::error::{Error, Result};
use crate::record::batch::{Record, RecordBatch};
use crate::record::schema::{FieldType, Schema, SchemaError, TIMESTAMP_FIELD};
use crate::record::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Errors raised when row data does not fit the table schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("row {row}: expected {expected} fields, found {found}")]
    FieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: field `{field}` expects {expected}, cannot store {found}")]
    FieldType {
        row: usize,
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    #[error("row {row}: timestamp must be an integer fitting int64, found {found}")]
    Timestamp { row: usize, found: FieldType },

    #[error("column `{0}` is required by the schema but missing")]
    MissingColumn(String),

    #[error("column `{0}` is not part of the schema")]
    UnknownColumn(String),

    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),

    #[error("column `{column}` has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Capability of being converted into a [`RecordBatch`] for a schema.
pub trait IntoRecordBatch {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch>;
}

/// A caller-defined row type that can be appended directly.
pub trait TsRow {
    /// Epoch milliseconds of the row.
    fn timestamp(&self) -> i64;

    /// Values of the fields following the timestamp, in schema order.
    fn values(&self) -> Vec<Value>;
}

impl TsRow for Record {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn values(&self) -> Vec<Value> {
        self.values.clone()
    }
}

/// Coerces `values` into the schema's value fields.
fn coerce_values(row: usize, values: Vec<Value>, schema: &Schema) -> Result<Vec<Value>> {
    let fields = schema.value_fields();
    if values.len() != fields.len() {
        return Err(ConversionError::FieldCount {
            row,
            expected: fields.len(),
            found: values.len(),
        }
        .into());
    }

    values
        .into_iter()
        .zip(fields)
        .map(|(value, field)| {
            let found = value.field_type();
            value.coerce(field.field_type).ok_or_else(|| {
                Error::from(ConversionError::FieldType {
                    row,
                    field: field.name.clone(),
                    expected: field.field_type,
                    found,
                })
            })
        })
        .collect()
}

impl IntoRecordBatch for RecordBatch {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        if self.schema() == schema {
            return Ok(self);
        }
        self.into_records().into_record_batch(schema)
    }
}

impl IntoRecordBatch for Vec<Record> {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(Arc::clone(schema), self)?)
    }
}

impl<T: TsRow> IntoRecordBatch for &[T] {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        let records = self
            .iter()
            .enumerate()
            .map(|(row, item)| {
                let values = coerce_values(row, item.values(), schema)?;
                Ok(Record::new(item.timestamp(), values))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordBatch::from_checked(Arc::clone(schema), records))
    }
}

impl<T: TsRow> IntoRecordBatch for &Vec<T> {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        self.as_slice().into_record_batch(schema)
    }
}

/// Row-major dynamic rows; the first value of each row is the timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRows(pub Vec<Vec<Value>>);

impl IntoRecordBatch for ValueRows {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        let expected = schema.fields().len();
        let records = self
            .0
            .into_iter()
            .enumerate()
            .map(|(row, values)| {
                let mut values = values.into_iter();
                let timestamp = values.next().ok_or(ConversionError::FieldCount {
                    row,
                    expected,
                    found: 0,
                })?;
                let ts = timestamp.as_i64().ok_or(ConversionError::Timestamp {
                    row,
                    found: timestamp.field_type(),
                })?;
                let values = coerce_values(row, values.collect(), schema).map_err(|err| {
                    // Report counts including the timestamp column.
                    match err {
                        Error::Conversion(ConversionError::FieldCount { row, found, .. }) => {
                            Error::from(ConversionError::FieldCount {
                                row,
                                expected,
                                found: found + 1,
                            })
                        }
                        other => other,
                    }
                })?;
                Ok(Record::new(ts, values))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordBatch::from_checked(Arc::clone(schema), records))
    }
}

/// Typed storage for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
}

macro_rules! column_dispatch {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ColumnData::Bool($values) => $body,
            ColumnData::Int8($values) => $body,
            ColumnData::Int16($values) => $body,
            ColumnData::Int32($values) => $body,
            ColumnData::Int64($values) => $body,
            ColumnData::UInt8($values) => $body,
            ColumnData::UInt16($values) => $body,
            ColumnData::UInt32($values) => $body,
            ColumnData::UInt64($values) => $body,
            ColumnData::Float32($values) => $body,
            ColumnData::Float64($values) => $body,
            ColumnData::Utf8($values) => $body,
        }
    };
}

impl ColumnData {
    pub fn len(&self) -> usize {
        column_dispatch!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            ColumnData::Bool(_) => FieldType::Bool,
            ColumnData::Int8(_) => FieldType::Int8,
            ColumnData::Int16(_) => FieldType::Int16,
            ColumnData::Int32(_) => FieldType::Int32,
            ColumnData::Int64(_) => FieldType::Int64,
            ColumnData::UInt8(_) => FieldType::UInt8,
            ColumnData::UInt16(_) => FieldType::UInt16,
            ColumnData::UInt32(_) => FieldType::UInt32,
            ColumnData::UInt64(_) => FieldType::UInt64,
            ColumnData::Float32(_) => FieldType::Float32,
            ColumnData::Float64(_) => FieldType::Float64,
            ColumnData::Utf8(_) => FieldType::Utf8,
        }
    }

    fn into_values(self) -> Vec<Value> {
        column_dispatch!(self, values => values.into_iter().map(Value::from).collect())
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Column-major input. The first column must be `timestamp: Int64`; the rest
/// are matched to schema fields by name, in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBatch {
    pub columns: Vec<Column>,
}

impl ColumnBatch {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }
}

impl IntoRecordBatch for ColumnBatch {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        let mut columns = self.columns.into_iter();
        let timestamp = columns.next().ok_or(SchemaError::Empty)?;
        if timestamp.name != TIMESTAMP_FIELD {
            return Err(SchemaError::MissingTimestamp {
                found: timestamp.name,
            }
            .into());
        }
        let timestamps = match timestamp.data {
            ColumnData::Int64(values) => values,
            other => {
                return Err(SchemaError::TimestampType {
                    found: other.field_type(),
                }
                .into())
            }
        };
        let rows = timestamps.len();

        let mut by_name: HashMap<String, ColumnData> = HashMap::new();
        for column in columns {
            if schema.value_index(&column.name).is_none() {
                return Err(ConversionError::UnknownColumn(column.name).into());
            }
            if column.data.len() != rows {
                return Err(ConversionError::ColumnLength {
                    column: column.name,
                    expected: rows,
                    found: column.data.len(),
                }
                .into());
            }
            if by_name.contains_key(&column.name) {
                return Err(ConversionError::DuplicateColumn(column.name).into());
            }
            by_name.insert(column.name, column.data);
        }

        let mut ordered = Vec::with_capacity(schema.value_fields().len());
        for field in schema.value_fields() {
            let data = by_name
                .remove(&field.name)
                .ok_or_else(|| ConversionError::MissingColumn(field.name.clone()))?;
            ordered.push(data.into_values().into_iter());
        }

        let mut records = Vec::with_capacity(rows);
        for (row, ts) in timestamps.into_iter().enumerate() {
            let values: Vec<Value> = ordered.iter_mut().filter_map(|col| col.next()).collect();
            records.push(Record::new(ts, coerce_values(row, values, schema)?));
        }

        Ok(RecordBatch::from_checked(Arc::clone(schema), records))
    }
}
