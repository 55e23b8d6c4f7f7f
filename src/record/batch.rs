//! Canonical records and record batches.

use crate::record::convert::ConversionError;
use crate::record::schema::Schema;
use crate::record::value::Value;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// One row of a time series in canonical layout.
///
/// `values` holds the fields following the timestamp, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: i64,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(timestamp: i64, values: Vec<Value>) -> Self {
        Self { timestamp, values }
    }

    /// Checks that the values match the schema's value fields exactly.
    pub(crate) fn check(&self, row: usize, schema: &Schema) -> Result<(), ConversionError> {
        let fields = schema.value_fields();
        if self.values.len() != fields.len() {
            return Err(ConversionError::FieldCount {
                row,
                expected: fields.len(),
                found: self.values.len(),
            });
        }

        for (value, field) in self.values.iter().zip(fields) {
            if value.field_type() != field.field_type {
                return Err(ConversionError::FieldType {
                    row,
                    field: field.name.clone(),
                    expected: field.field_type,
                    found: value.field_type(),
                });
            }
        }

        Ok(())
    }
}

/// An ordered sequence of records sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl RecordBatch {
    /// Creates a batch after checking every record against the schema.
    pub fn try_new(schema: Arc<Schema>, records: Vec<Record>) -> Result<Self, ConversionError> {
        for (row, record) in records.iter().enumerate() {
            record.check(row, &schema)?;
        }
        Ok(Self { schema, records })
    }

    /// Creates a batch from records already known to match the schema.
    pub(crate) fn from_checked(schema: Arc<Schema>, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamps in row order.
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.records.iter().map(|r| r.timestamp)
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.records.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Records in the given row range.
    pub fn slice(&self, rows: Range<usize>) -> &[Record] {
        &self.records[rows]
    }

    /// Values of one value field, by name.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.schema.value_index(name)?;
        Some(self.records.iter().map(|r| &r.values[index]).collect())
    }

    /// Appends records from another batch with the same schema.
    pub(crate) fn extend(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }
}
