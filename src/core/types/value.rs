//! Typed values read from and written to process memory

use super::error::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding used to interpret a byte window as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int32,
    Float32,
    Float64,
    Int16,
    Byte,
    /// Resolved per window at match time
    Auto,
}

impl ValueType {
    /// Width in bytes, `None` for `Auto`
    pub const fn size(&self) -> Option<usize> {
        match self {
            ValueType::Int32 | ValueType::Float32 => Some(4),
            ValueType::Float64 => Some(8),
            ValueType::Int16 => Some(2),
            ValueType::Byte => Some(1),
            ValueType::Auto => None,
        }
    }

    /// Bytes that must be read to test a single candidate
    pub const fn window(&self) -> usize {
        match self.size() {
            Some(size) => size,
            None => 8,
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, ValueType::Float32 | ValueType::Float64)
    }

    /// Every concrete type, in the order `Auto` tries them
    pub const CONCRETE: [ValueType; 5] = [
        ValueType::Int32,
        ValueType::Float32,
        ValueType::Float64,
        ValueType::Int16,
        ValueType::Byte,
    ];
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Int32 => "int32",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
            ValueType::Int16 => "int16",
            ValueType::Byte => "byte",
            ValueType::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int32" | "i32" | "int" => Ok(ValueType::Int32),
            "float32" | "f32" | "float" => Ok(ValueType::Float32),
            "float64" | "f64" | "double" => Ok(ValueType::Float64),
            "int16" | "i16" | "short" => Ok(ValueType::Int16),
            "byte" | "u8" => Ok(ValueType::Byte),
            "auto" => Ok(ValueType::Auto),
            other => Err(MemoryError::InvalidValueType(other.to_string())),
        }
    }
}

/// A value decoded from (or destined for) process memory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MemoryValue {
    I32(i32),
    F32(f32),
    F64(f64),
    I16(i16),
    U8(u8),
}

impl MemoryValue {
    /// Size in bytes of the encoded value
    pub fn size(&self) -> usize {
        match self {
            MemoryValue::I32(_) | MemoryValue::F32(_) => 4,
            MemoryValue::F64(_) => 8,
            MemoryValue::I16(_) => 2,
            MemoryValue::U8(_) => 1,
        }
    }

    /// Little-endian encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MemoryValue::I32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::F32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::F64(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I16(v) => v.to_le_bytes().to_vec(),
            MemoryValue::U8(v) => vec![*v],
        }
    }

    /// Decodes the leading bytes of `bytes` as `value_type`.
    ///
    /// Returns `None` for `Auto` or when the slice is too short.
    pub fn from_bytes(bytes: &[u8], value_type: ValueType) -> Option<Self> {
        match value_type {
            ValueType::Int32 => bytes
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .map(|b| MemoryValue::I32(i32::from_le_bytes(b))),
            ValueType::Float32 => bytes
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .map(|b| MemoryValue::F32(f32::from_le_bytes(b))),
            ValueType::Float64 => bytes
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .map(|b| MemoryValue::F64(f64::from_le_bytes(b))),
            ValueType::Int16 => bytes
                .get(..2)
                .and_then(|b| b.try_into().ok())
                .map(|b| MemoryValue::I16(i16::from_le_bytes(b))),
            ValueType::Byte => bytes.first().map(|&b| MemoryValue::U8(b)),
            ValueType::Auto => None,
        }
    }

    /// Converts an integer search target into the encoding of `value_type`.
    ///
    /// Out-of-range targets for the narrow types are rejected.
    pub fn from_target(target: i32, value_type: ValueType) -> Result<Self, MemoryError> {
        match value_type {
            ValueType::Int32 | ValueType::Auto => Ok(MemoryValue::I32(target)),
            ValueType::Float32 => Ok(MemoryValue::F32(target as f32)),
            ValueType::Float64 => Ok(MemoryValue::F64(target as f64)),
            ValueType::Int16 => i16::try_from(target)
                .map(MemoryValue::I16)
                .map_err(|_| MemoryError::InvalidValueType(format!("{target} does not fit int16"))),
            ValueType::Byte => u8::try_from(target)
                .map(MemoryValue::U8)
                .map_err(|_| MemoryError::InvalidValueType(format!("{target} does not fit byte"))),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            MemoryValue::I32(_) => ValueType::Int32,
            MemoryValue::F32(_) => ValueType::Float32,
            MemoryValue::F64(_) => ValueType::Float64,
            MemoryValue::I16(_) => ValueType::Int16,
            MemoryValue::U8(_) => ValueType::Byte,
        }
    }

    /// Numeric value widened to `f64`, for display and tolerance checks
    pub fn as_f64(&self) -> f64 {
        match self {
            MemoryValue::I32(v) => *v as f64,
            MemoryValue::F32(v) => *v as f64,
            MemoryValue::F64(v) => *v,
            MemoryValue::I16(v) => *v as f64,
            MemoryValue::U8(v) => *v as f64,
        }
    }
}

impl fmt::Display for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryValue::I32(v) => write!(f, "{}", v),
            MemoryValue::F32(v) => write!(f, "{}", v),
            MemoryValue::F64(v) => write!(f, "{}", v),
            MemoryValue::I16(v) => write!(f, "{}", v),
            MemoryValue::U8(v) => write!(f, "{}", v),
        }
    }
}
