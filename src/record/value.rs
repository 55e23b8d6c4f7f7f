//! Typed field values and the coercion rules between field types.

use crate::record::schema::FieldType;
use serde::{Deserialize, Serialize};

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
}

impl Value {
    /// Type this value is stored as.
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Bool(_) => FieldType::Bool,
            Value::Int8(_) => FieldType::Int8,
            Value::Int16(_) => FieldType::Int16,
            Value::Int32(_) => FieldType::Int32,
            Value::Int64(_) => FieldType::Int64,
            Value::UInt8(_) => FieldType::UInt8,
            Value::UInt16(_) => FieldType::UInt16,
            Value::UInt32(_) => FieldType::UInt32,
            Value::UInt64(_) => FieldType::UInt64,
            Value::Float32(_) => FieldType::Float32,
            Value::Float64(_) => FieldType::Float64,
            Value::Utf8(_) => FieldType::Utf8,
        }
    }

    /// Integer payload widened to `i128`, or `None` for non-integers.
    fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v.into()),
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Integer payload as `i64` if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    /// Converts the value to `target` without losing information.
    ///
    /// Integers convert to any integer type that can hold them and to either
    /// float type. `Float32` widens to `Float64`; `Float64` narrows only when
    /// the value survives the round trip. Booleans and strings never change
    /// type.
    pub fn coerce(self, target: FieldType) -> Option<Value> {
        if self.field_type() == target {
            return Some(self);
        }

        if let Some(int) = self.as_i128() {
            return match target {
                FieldType::Int8 => i8::try_from(int).ok().map(Value::Int8),
                FieldType::Int16 => i16::try_from(int).ok().map(Value::Int16),
                FieldType::Int32 => i32::try_from(int).ok().map(Value::Int32),
                FieldType::Int64 => i64::try_from(int).ok().map(Value::Int64),
                FieldType::UInt8 => u8::try_from(int).ok().map(Value::UInt8),
                FieldType::UInt16 => u16::try_from(int).ok().map(Value::UInt16),
                FieldType::UInt32 => u32::try_from(int).ok().map(Value::UInt32),
                FieldType::UInt64 => u64::try_from(int).ok().map(Value::UInt64),
                FieldType::Float32 => Some(Value::Float32(int as f32)),
                FieldType::Float64 => Some(Value::Float64(int as f64)),
                FieldType::Bool | FieldType::Utf8 => None,
            };
        }

        match (self, target) {
            (Value::Float32(v), FieldType::Float64) => Some(Value::Float64(v.into())),
            (Value::Float64(v), FieldType::Float32) => {
                let narrowed = v as f32;
                if v.is_nan() || f64::from(narrowed) == v {
                    Some(Value::Float32(narrowed))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => Utf8,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.to_string())
    }
}
