//! Row schemas.
//!
//! A time series schema is an ordered list of typed fields whose first field
//! is always `timestamp: Int64` holding epoch milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Name of the mandatory first field.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::Utf8 => "utf8",
        };
        f.write_str(name)
    }
}

/// A named, typed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Errors raised for schemas that cannot describe a time series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema has no fields")]
    Empty,

    #[error("first field must be named `timestamp`, found `{found}`")]
    MissingTimestamp { found: String },

    #[error("`timestamp` field must be int64, found {found}")]
    TimestampType { found: FieldType },

    #[error("duplicate field `{0}`")]
    DuplicateField(String),
}

/// Ordered row schema of a time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Builds a validated time series schema from all of its fields.
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// Builds a schema from the value fields, prepending `timestamp: Int64`.
    pub fn with_timestamp(value_fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut fields = Vec::with_capacity(value_fields.len() + 1);
        fields.push(Field::new(TIMESTAMP_FIELD, FieldType::Int64));
        fields.extend(value_fields);
        Self::new(fields)
    }

    /// Checks the time series invariants.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let first = self.fields.first().ok_or(SchemaError::Empty)?;
        if first.name != TIMESTAMP_FIELD {
            return Err(SchemaError::MissingTimestamp {
                found: first.name.clone(),
            });
        }
        if first.field_type != FieldType::Int64 {
            return Err(SchemaError::TimestampType {
                found: first.field_type,
            });
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        Ok(())
    }

    /// All fields, timestamp first.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields following the timestamp.
    pub fn value_fields(&self) -> &[Field] {
        self.fields.get(1..).unwrap_or(&[])
    }

    /// Position of a value field within [`Schema::value_fields`].
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.value_fields().iter().position(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_schema() {
        let schema = Schema::with_timestamp(vec![Field::new("price", FieldType::Int32)]).unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.value_fields()[0].name, "price");
        assert_eq!(schema.value_index("price"), Some(0));
        assert_eq!(schema.value_index("timestamp"), None);
    }

    #[test]
    fn test_timestamp_must_come_first() {
        let result = Schema::new(vec![
            Field::new("price", FieldType::Int32),
            Field::new("timestamp", FieldType::Int64),
        ]);
        assert_eq!(
            result,
            Err(SchemaError::MissingTimestamp {
                found: "price".to_string()
            })
        );
    }

    #[test]
    fn test_timestamp_must_be_int64() {
        let result = Schema::new(vec![
            Field::new("timestamp", FieldType::Int32),
            Field::new("price", FieldType::Int32),
        ]);
        assert_eq!(
            result,
            Err(SchemaError::TimestampType {
                found: FieldType::Int32
            })
        );
    }

    #[test]
    fn test_empty_and_duplicate_fields() {
        assert_eq!(Schema::new(vec![]), Err(SchemaError::Empty));

        let result = Schema::with_timestamp(vec![
            Field::new("price", FieldType::Int32),
            Field::new("price", FieldType::Float64),
        ]);
        assert_eq!(result, Err(SchemaError::DuplicateField("price".to_string())));
    }
}
