//! 共享的编组辅助函数
//!
//! 整数一律经由 `i128` 中转；范围检查在写入宿主内存之前完成。

use crate::bindings::{PropertyIdentity, ScriptValue};
use crate::diagnostics::BindingDiagnostics;
use serde::{Deserialize, Serialize};

/// How a 64-bit unsigned value above `i64::MAX` is shown to scripts.
///
/// Either way an overflow event is recorded; the exact value stays
/// reachable through `GetDecimal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsignedOverflowPolicy {
    /// Nearest `f64` (loses the low bits).
    #[default]
    NearestFloat,
    /// `i64::MAX`.
    Saturate,
}

/// Per-call marshalling settings.
#[derive(Clone, Copy)]
pub struct MarshalContext<'a> {
    pub overflow: UnsignedOverflowPolicy,
    pub diagnostics: &'a BindingDiagnostics,
}

impl<'a> MarshalContext<'a> {
    pub fn new(overflow: UnsignedOverflowPolicy, diagnostics: &'a BindingDiagnostics) -> Self {
        Self {
            overflow,
            diagnostics,
        }
    }
}

/// Why a script value could not become a native value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionFault {
    WrongType {
        expected: &'static str,
        got: &'static str,
    },
    OutOfRange(String),
}

/// i128 可精确表示的浮点数上界 (2^127)
const I128_FLOAT_LIMIT: f64 = 1.7014118346046923e38;

pub fn integer_to_script(
    value: i128,
    identity: PropertyIdentity,
    cx: &MarshalContext<'_>,
) -> ScriptValue {
    match i64::try_from(value) {
        Ok(v) => ScriptValue::Integer(v),
        Err(_) => {
            cx.diagnostics.record_overflow(identity, value);
            match cx.overflow {
                UnsignedOverflowPolicy::NearestFloat => ScriptValue::Number(value as f64),
                UnsignedOverflowPolicy::Saturate if value > 0 => ScriptValue::Integer(i64::MAX),
                UnsignedOverflowPolicy::Saturate => ScriptValue::Integer(i64::MIN),
            }
        }
    }
}

/// Accepts a script integer, or a finite integral number.
pub fn script_to_integer(value: &ScriptValue) -> Result<i128, ConversionFault> {
    match value {
        ScriptValue::Integer(i) => Ok(i128::from(*i)),
        ScriptValue::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < I128_FLOAT_LIMIT {
                Ok(*n as i128)
            } else {
                Err(ConversionFault::OutOfRange(n.to_string()))
            }
        }
        other => Err(ConversionFault::WrongType {
            expected: "integer",
            got: other.type_name(),
        }),
    }
}

pub fn check_range(value: i128, min: i128, max: i128) -> Result<i128, ConversionFault> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConversionFault::OutOfRange(value.to_string()))
    }
}

/// Exact decimal text, as accepted by `SetDecimal`.
pub fn parse_decimal(text: &str) -> Result<i128, ConversionFault> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    digits
        .parse::<i128>()
        .map_err(|_| ConversionFault::OutOfRange(format!("{text:?}")))
}

pub fn script_to_float(value: &ScriptValue) -> Result<f64, ConversionFault> {
    match value {
        ScriptValue::Number(n) => Ok(*n),
        ScriptValue::Integer(i) => Ok(*i as f64),
        other => Err(ConversionFault::WrongType {
            expected: "number",
            got: other.type_name(),
        }),
    }
}

pub fn script_to_bool(value: &ScriptValue) -> Result<bool, ConversionFault> {
    match value {
        ScriptValue::Boolean(b) => Ok(*b),
        other => Err(ConversionFault::WrongType {
            expected: "boolean",
            got: other.type_name(),
        }),
    }
}

/// Largest value of an unsigned native integer of `width` bytes.
pub fn unsigned_max(width: usize) -> i128 {
    let bits = (width.min(8) * 8) as u32;
    (1i128 << bits) - 1
}

pub fn decode_unsigned_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

pub fn encode_unsigned_le(value: u64, width: usize) -> Vec<u8> {
    value.to_le_bytes()[..width.min(8)].to_vec()
}
