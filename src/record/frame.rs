//! Time-indexed presentation of record batches.
//!
//! A [`TimeIndexedFrame`] promotes the timestamp of each row to a
//! `DateTime<Utc>` index and keeps only the value fields as columns. It is a
//! pure presentation transform; it can also be appended back, since it
//! converts into a [`RecordBatch`] through the same codec.

use crate::error::Result;
use crate::record::batch::RecordBatch;
use crate::record::convert::{ConversionError, IntoRecordBatch, ValueRows};
use crate::record::schema::{Field, Schema};
use crate::record::value::Value;
use crate::time::{to_epoch_ms, to_utc, EncodingError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Rows keyed by their UTC timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndexedFrame {
    index: Vec<DateTime<Utc>>,
    fields: Vec<Field>,
    rows: Vec<Vec<Value>>,
}

impl TimeIndexedFrame {
    /// Builds a frame from parallel index and row vectors.
    ///
    /// Every row must hold one value per field, and field names must be
    /// unique.
    pub fn new(
        fields: Vec<Field>,
        index: Vec<DateTime<Utc>>,
        rows: Vec<Vec<Value>>,
    ) -> std::result::Result<Self, ConversionError> {
        if index.len() != rows.len() {
            return Err(ConversionError::ColumnLength {
                column: "index".to_string(),
                expected: index.len(),
                found: rows.len(),
            });
        }
        for (position, field) in fields.iter().enumerate() {
            if fields[..position].iter().any(|f| f.name == field.name) {
                return Err(ConversionError::DuplicateColumn(field.name.clone()));
            }
        }
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != fields.len())
        {
            return Err(ConversionError::FieldCount {
                row,
                expected: fields.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            index,
            fields,
            rows,
        })
    }

    /// Presents a record batch with its timestamps as the index.
    pub fn from_batch(batch: &RecordBatch) -> std::result::Result<Self, EncodingError> {
        let index = batch
            .timestamps()
            .map(to_utc)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let rows = batch.records().iter().map(|r| r.values.clone()).collect();
        Ok(Self {
            index,
            fields: batch.schema().value_fields().to_vec(),
            rows,
        })
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    /// Column descriptions, excluding the timestamp.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let position = self.fields.iter().position(|f| f.name == name)?;
        Some(self.rows.iter().map(|row| &row[position]).collect())
    }

    /// Iterates `(timestamp, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &Vec<Value>)> + '_ {
        self.index.iter().zip(self.rows.iter())
    }
}

impl IntoRecordBatch for TimeIndexedFrame {
    fn into_record_batch(self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        let expected = schema.value_fields();
        for field in &self.fields {
            if !expected.iter().any(|f| f.name == field.name) {
                return Err(ConversionError::UnknownColumn(field.name.clone()).into());
            }
        }
        for field in expected {
            if !self.fields.iter().any(|f| f.name == field.name) {
                return Err(ConversionError::MissingColumn(field.name.clone()).into());
            }
        }

        // Reorder frame columns into schema order before coercion.
        let order: Vec<usize> = expected
            .iter()
            .filter_map(|f| self.fields.iter().position(|g| g.name == f.name))
            .collect();

        let mut rows = Vec::with_capacity(self.index.len());
        for (ts, values) in self.index.iter().zip(self.rows) {
            let mut row = Vec::with_capacity(order.len() + 1);
            row.push(Value::Int64(to_epoch_ms(ts)?));
            let mut values: Vec<Option<Value>> = values.into_iter().map(Some).collect();
            for &position in &order {
                match values.get_mut(position).and_then(Option::take) {
                    Some(value) => row.push(value),
                    None => break,
                }
            }
            rows.push(row);
        }

        ValueRows(rows).into_record_batch(schema)
    }
}
