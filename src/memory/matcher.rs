//! Typed value matching over raw byte windows
//!
//! A window is the byte slice starting at a candidate address. Integers are
//! compared exactly on their native width; floats match within
//! [`FLOAT_EPSILON`] and only when finite. Windows are read unaligned.

use crate::core::types::{MemoryValue, ValueType};
use tracing::debug;

/// Absolute tolerance for float comparisons
pub const FLOAT_EPSILON: f64 = 1e-4;

/// Bytes sampled by [`detect_value_type`]
pub const DETECT_SAMPLE_LEN: usize = 1024;

#[inline]
fn read_i32(window: &[u8]) -> Option<i32> {
    window.get(..4)?.try_into().ok().map(i32::from_le_bytes)
}

#[inline]
fn read_f32(window: &[u8]) -> Option<f32> {
    window.get(..4)?.try_into().ok().map(f32::from_le_bytes)
}

#[inline]
fn read_f64(window: &[u8]) -> Option<f64> {
    window.get(..8)?.try_into().ok().map(f64::from_le_bytes)
}

#[inline]
fn read_i16(window: &[u8]) -> Option<i16> {
    window.get(..2)?.try_into().ok().map(i16::from_le_bytes)
}

/// Tolerance test shared with the vectorized comparator
#[inline]
pub fn f32_matches(value: f32, target: f32) -> bool {
    value.is_finite() && (value - target).abs() < FLOAT_EPSILON as f32
}

#[inline]
pub fn f64_matches(value: f64, target: f64) -> bool {
    value.is_finite() && (value - target).abs() < FLOAT_EPSILON
}

fn matches_concrete(window: &[u8], target: i32, value_type: ValueType) -> bool {
    match value_type {
        ValueType::Int32 => read_i32(window) == Some(target),
        ValueType::Float32 => read_f32(window).is_some_and(|v| f32_matches(v, target as f32)),
        ValueType::Float64 => read_f64(window).is_some_and(|v| f64_matches(v, target as f64)),
        ValueType::Int16 => match i16::try_from(target) {
            Ok(t) => read_i16(window) == Some(t),
            Err(_) => false,
        },
        ValueType::Byte => match u8::try_from(target) {
            Ok(t) => window.first() == Some(&t),
            Err(_) => false,
        },
        ValueType::Auto => false,
    }
}

/// Returns the concrete type under which `window` matches `target`.
///
/// `Auto` tries Int32, Float32, Float64, Int16 and then Byte, stopping at the
/// first hit.
pub fn matched_type(window: &[u8], target: i32, value_type: ValueType) -> Option<ValueType> {
    match value_type {
        ValueType::Auto => ValueType::CONCRETE
            .into_iter()
            .find(|&ty| matches_concrete(window, target, ty)),
        ty => matches_concrete(window, target, ty).then_some(ty),
    }
}

/// Whether the bytes at the start of `window` equal `target` under `value_type`
#[inline]
pub fn matches(window: &[u8], target: i32, value_type: ValueType) -> bool {
    matched_type(window, target, value_type).is_some()
}

/// Decodes the value at the start of `window`.
///
/// For `Auto` the type that matches `target` is used, falling back to Int32.
pub fn decode(window: &[u8], target: i32, value_type: ValueType) -> Option<MemoryValue> {
    let ty = match value_type {
        ValueType::Auto => matched_type(window, target, ValueType::Auto).unwrap_or(ValueType::Int32),
        ty => ty,
    };
    MemoryValue::from_bytes(window, ty)
}

/// Guesses how `target` is most likely encoded in `buffer`.
///
/// Heuristic only: samples at most the first [`DETECT_SAMPLE_LEN`] bytes. Small
/// targets that occur far more often as single bytes than as 32-bit integers
/// are taken as `Byte`; plausible float magnitudes that occur more often as
/// `f32` than as `i32` are taken as `Float32`. Everything else is `Int32`.
pub fn detect_value_type(buffer: &[u8], target: i32) -> ValueType {
    if buffer.len() < 8 {
        return ValueType::Int32;
    }
    let sample = &buffer[..buffer.len().min(DETECT_SAMPLE_LEN)];

    if let Ok(byte) = u8::try_from(target) {
        let as_byte = sample.iter().filter(|&&b| b == byte).count();
        let as_int = sample
            .windows(4)
            .filter(|w| read_i32(w) == Some(target))
            .count();
        if as_byte > as_int * 3 {
            debug!(target, as_byte, as_int, "Auto-detected byte encoding");
            return ValueType::Byte;
        }
    }

    let float_target = target as f32;
    if (0.1..=10_000.0).contains(&float_target) {
        let mut as_float = 0usize;
        let mut as_int = 0usize;
        for chunk in sample.chunks_exact(4) {
            if read_f32(chunk).is_some_and(|v| f32_matches(v, float_target)) {
                as_float += 1;
            }
            if read_i32(chunk) == Some(target) {
                as_int += 1;
            }
        }
        if as_float > as_int {
            debug!(target, as_float, as_int, "Auto-detected float encoding");
            return ValueType::Float32;
        }
    }

    ValueType::Int32
}
