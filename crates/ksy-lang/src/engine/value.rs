// Runtime value type for the evaluation engine

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::EvalError;

/// Index of a struct instance in the evaluator's value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u32);

/// A runtime value. Integers are arbitrary precision end to end; floats are
/// f64. Struct values are handles into the evaluator's instance store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(BigInt),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<Value>),
    Struct(InstanceId),
    /// Marker for the `_io` intrinsic; the stream itself lives on the
    /// evaluation scope.
    Stream,
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Stream => "stream",
        }
    }

    pub fn as_int(&self) -> Result<&BigInt, EvalError> {
        match self {
            Value::Int(v) => Ok(v),
            other => Err(EvalError::type_mismatch(format!(
                "expected integer, got {}",
                other.kind_name()
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(EvalError::type_mismatch(format!(
                "expected boolean, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Integer narrowed to u64, for sizes and counts.
    pub fn as_u64(&self) -> Result<u64, EvalError> {
        let v = self.as_int()?;
        v.to_u64().ok_or_else(|| {
            EvalError::range(format!("integer {} does not fit an unsigned 64-bit count", v))
        })
    }

    pub fn to_float_lossy(&self) -> Result<f64, EvalError> {
        match self {
            Value::Int(v) => Ok(v.to_f64().unwrap_or(f64::INFINITY)),
            Value::Float(v) => Ok(*v),
            other => Err(EvalError::type_mismatch(format!(
                "expected number, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Bytes(v) => {
                write!(f, "[")?;
                for (i, b) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:#04x}", b)?;
                }
                write!(f, "]")
            }
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Struct(id) => write!(f, "<struct #{}>", id.0),
            Value::Stream => write!(f, "<stream>"),
        }
    }
}

/// Byte-sequence view of a value, used by cross-kind comparisons: strings
/// compare as their UTF-8 bytes, integer array literals as raw bytes.
fn as_byte_seq(value: &Value) -> Result<Option<Vec<u8>>, EvalError> {
    match value {
        Value::Bytes(b) => Ok(Some(b.clone())),
        Value::Str(s) => Ok(Some(s.as_bytes().to_vec())),
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Int(v) => {
                        let b = v.to_u8().ok_or_else(|| {
                            EvalError::range(format!("array element {} is not a byte", v))
                        })?;
                        bytes.push(b);
                    }
                    _ => return Ok(None),
                }
            }
            Ok(Some(bytes))
        }
        _ => Ok(None),
    }
}

/// Equality under `==` semantics: numeric operands promote, strings and
/// byte arrays compare as byte sequences, booleans and arrays compare
/// structurally.
pub fn values_equal(a: &Value, b: &Value) -> Result<bool, EvalError> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Float(x), Value::Float(y)) => Ok(x == y),
        (Value::Int(x), Value::Float(y)) => Ok(x.to_f64().unwrap_or(f64::INFINITY) == *y),
        (Value::Float(x), Value::Int(y)) => Ok(*x == y.to_f64().unwrap_or(f64::INFINITY)),
        (Value::Array(x), Value::Array(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (xi, yi) in x.iter().zip(y) {
                if !values_equal(xi, yi)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => {
            if let (Some(x), Some(y)) = (as_byte_seq(a)?, as_byte_seq(b)?) {
                return Ok(x == y);
            }
            Err(EvalError::type_mismatch(format!(
                "cannot compare {} with {}",
                a.kind_name(),
                b.kind_name()
            )))
        }
    }
}

/// Ordering under `<`/`<=`/`>`/`>=` semantics. Booleans and structs have no
/// order.
pub fn values_ordering(a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| EvalError::type_mismatch("NaN is not ordered")),
        (Value::Int(x), Value::Float(y)) => x
            .to_f64()
            .unwrap_or(f64::INFINITY)
            .partial_cmp(y)
            .ok_or_else(|| EvalError::type_mismatch("NaN is not ordered")),
        (Value::Float(x), Value::Int(y)) => x
            .partial_cmp(&y.to_f64().unwrap_or(f64::INFINITY))
            .ok_or_else(|| EvalError::type_mismatch("NaN is not ordered")),
        _ => {
            if let (Some(x), Some(y)) = (as_byte_seq(a)?, as_byte_seq(b)?) {
                return Ok(x.cmp(&y));
            }
            Err(EvalError::type_mismatch(format!(
                "cannot order {} and {}",
                a.kind_name(),
                b.kind_name()
            )))
        }
    }
}

/// Integer division truncating toward zero, like most programming languages
/// and unlike mathematical modulo.
pub fn int_div(a: &BigInt, b: &BigInt) -> Result<BigInt, EvalError> {
    if b.is_zero() {
        return Err(EvalError::div_by_zero());
    }
    Ok(a / b)
}

/// Modulo following the sign of the dividend.
pub fn int_mod(a: &BigInt, b: &BigInt) -> Result<BigInt, EvalError> {
    if b.is_zero() {
        return Err(EvalError::div_by_zero());
    }
    Ok(a % b)
}

/// Shift amounts are unsigned 64-bit; negative amounts are range errors.
pub fn shift_amount(v: &BigInt) -> Result<u64, EvalError> {
    if v.is_negative() {
        return Err(EvalError::range(format!("negative shift amount {}", v)));
    }
    v.to_u64()
        .ok_or_else(|| EvalError::range(format!("shift amount {} too large", v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    #[test]
    fn test_div_truncates_toward_zero() {
        let div = |a: i64, b: i64| {
            int_div(&BigInt::from(a), &BigInt::from(b))
                .unwrap()
                .to_i64()
                .unwrap()
        };
        assert_eq!(div(7, 2), 3);
        assert_eq!(div(-7, 2), -3);
        assert_eq!(div(7, -2), -3);
        assert_eq!(div(-7, -2), 3);
    }

    #[test]
    fn test_mod_follows_dividend_sign() {
        let m = |a: i64, b: i64| {
            int_mod(&BigInt::from(a), &BigInt::from(b))
                .unwrap()
                .to_i64()
                .unwrap()
        };
        assert_eq!(m(7, 3), 1);
        assert_eq!(m(-7, 3), -1);
        assert_eq!(m(7, -3), 1);
    }

    #[test]
    fn test_div_by_zero() {
        let err = int_div(&BigInt::from(1), &BigInt::from(0)).unwrap_err();
        assert_eq!(err.kind, crate::error::EvalErrorKind::DivByZero);
    }

    #[test]
    fn test_negative_shift_is_range_error() {
        let err = shift_amount(&BigInt::from(-1)).unwrap_err();
        assert_eq!(err.kind, crate::error::EvalErrorKind::Range);
        assert_eq!(shift_amount(&BigInt::from(3)).unwrap(), 3);
    }

    #[test]
    fn test_equality_across_numeric_kinds() {
        assert!(values_equal(&int(2), &Value::Float(2.0)).unwrap());
        assert!(!values_equal(&int(2), &Value::Float(2.5)).unwrap());
    }

    #[test]
    fn test_string_bytes_comparison() {
        let s = Value::Str("AB".into());
        let b = Value::Bytes(vec![0x41, 0x42]);
        assert!(values_equal(&s, &b).unwrap());
        assert_eq!(
            values_ordering(&Value::Str("a".into()), &Value::Str("b".into())).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_bytes_vs_int_array_literal() {
        let bytes = Value::Bytes(vec![0x49, 0x49]);
        let lit = Value::Array(vec![int(0x49), int(0x49)]);
        assert!(values_equal(&bytes, &lit).unwrap());
        let other = Value::Array(vec![int(0x4d), int(0x4d)]);
        assert!(!values_equal(&bytes, &other).unwrap());
    }

    #[test]
    fn test_bool_has_no_ordering() {
        assert!(values_ordering(&Value::Bool(true), &Value::Bool(false)).is_err());
        assert!(values_equal(&Value::Bool(true), &Value::Bool(true)).unwrap());
    }

    #[test]
    fn test_as_u64_range() {
        assert!(int(-1).as_u64().is_err());
        assert_eq!(int(7).as_u64().unwrap(), 7);
    }
}
