// Built-in method table: fixed (receiver kind, method name) signatures and
// their runtime implementations

use num_bigint::BigInt;
use num_traits::Num;

use crate::error::EvalError;
use crate::types::Kind;

use super::value::{values_ordering, Value};
use super::ValueType;

/// Index of the built-in methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMethod {
    /// integer.to_s() -> string, decimal representation.
    IntToString,
    /// integer.to_i() -> integer, identity; enum values evaluate to their
    /// integer constant, so this also covers `enumval.to_i`.
    IntToInt,
    /// float.to_i() -> integer, truncation.
    FloatToInt,
    /// bytes.length() -> integer.
    ByteArrayLength,
    /// bytes.to_s(encoding) -> string.
    ByteArrayToString,
    /// string.length() -> integer, in characters.
    StringLength,
    /// string.reverse() -> string, character-by-character.
    StringReverse,
    /// string.substring(i, j) -> string, i inclusive, j exclusive.
    StringSubstring,
    /// string.to_i(radix?) -> integer; radix defaults to 10.
    StringToInt,
    /// boolean.to_i() -> integer, false=0 true=1.
    BoolToInt,
    /// array.first() -> element.
    ArrayFirst,
    /// array.last() -> element.
    ArrayLast,
    /// array.size() -> integer.
    ArraySize,
    /// array.min() -> element; fails on an empty array.
    ArrayMin,
    /// array.max() -> element; fails on an empty array.
    ArrayMax,
    /// _io.eof() -> boolean.
    StreamEof,
    /// _io.size() -> integer.
    StreamSize,
    /// _io.pos() -> integer.
    StreamPos,
}

/// Receiver classes of the method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    Integer,
    Float,
    Bytes,
    Str,
    Bool,
    Array,
    Stream,
}

impl Receiver {
    pub fn of_value(value: &Value) -> Option<Receiver> {
        Some(match value {
            Value::Int(_) => Receiver::Integer,
            Value::Float(_) => Receiver::Float,
            Value::Bytes(_) => Receiver::Bytes,
            Value::Str(_) => Receiver::Str,
            Value::Bool(_) => Receiver::Bool,
            Value::Array(_) => Receiver::Array,
            Value::Stream => Receiver::Stream,
            Value::Struct(_) => return None,
        })
    }

    pub fn of_kind(kind: Kind) -> Option<Receiver> {
        Some(match kind {
            Kind::U1
            | Kind::U2
            | Kind::U2le
            | Kind::U2be
            | Kind::U4
            | Kind::U4le
            | Kind::U4be
            | Kind::U8
            | Kind::U8le
            | Kind::U8be
            | Kind::S1
            | Kind::S2
            | Kind::S2le
            | Kind::S2be
            | Kind::S4
            | Kind::S4le
            | Kind::S4be
            | Kind::S8
            | Kind::S8le
            | Kind::S8be
            | Kind::Bits
            | Kind::UntypedInt => Receiver::Integer,
            Kind::F4
            | Kind::F4le
            | Kind::F4be
            | Kind::F8
            | Kind::F8le
            | Kind::F8be
            | Kind::UntypedFloat => Receiver::Float,
            Kind::Bytes => Receiver::Bytes,
            Kind::Str => Receiver::Str,
            Kind::UntypedBool => Receiver::Bool,
            Kind::User => return None,
        })
    }
}

/// Look up a method by receiver class and name.
pub fn lookup(receiver: Receiver, name: &str) -> Option<BuiltinMethod> {
    Some(match (receiver, name) {
        (Receiver::Integer, "to_s") => BuiltinMethod::IntToString,
        (Receiver::Integer, "to_i") => BuiltinMethod::IntToInt,
        (Receiver::Float, "to_i") => BuiltinMethod::FloatToInt,
        (Receiver::Bytes, "length") => BuiltinMethod::ByteArrayLength,
        (Receiver::Bytes, "to_s") => BuiltinMethod::ByteArrayToString,
        (Receiver::Str, "length") => BuiltinMethod::StringLength,
        (Receiver::Str, "reverse") => BuiltinMethod::StringReverse,
        (Receiver::Str, "substring") => BuiltinMethod::StringSubstring,
        (Receiver::Str, "to_i") => BuiltinMethod::StringToInt,
        (Receiver::Bool, "to_i") => BuiltinMethod::BoolToInt,
        (Receiver::Array, "first") => BuiltinMethod::ArrayFirst,
        (Receiver::Array, "last") => BuiltinMethod::ArrayLast,
        (Receiver::Array, "size") => BuiltinMethod::ArraySize,
        (Receiver::Array, "min") => BuiltinMethod::ArrayMin,
        (Receiver::Array, "max") => BuiltinMethod::ArrayMax,
        (Receiver::Stream, "eof") => BuiltinMethod::StreamEof,
        (Receiver::Stream, "size") => BuiltinMethod::StreamSize,
        (Receiver::Stream, "pos") => BuiltinMethod::StreamPos,
        _ => return None,
    })
}

/// Static return type of a method. Array element methods take the element
/// type from the receiver.
pub fn return_type(method: BuiltinMethod, elem: Option<&ValueType>) -> ValueType {
    match method {
        BuiltinMethod::IntToString
        | BuiltinMethod::StringReverse
        | BuiltinMethod::StringSubstring
        | BuiltinMethod::ByteArrayToString => ValueType::string(),
        BuiltinMethod::IntToInt
        | BuiltinMethod::FloatToInt
        | BuiltinMethod::ByteArrayLength
        | BuiltinMethod::StringLength
        | BuiltinMethod::StringToInt
        | BuiltinMethod::BoolToInt
        | BuiltinMethod::ArraySize
        | BuiltinMethod::StreamSize
        | BuiltinMethod::StreamPos => ValueType::untyped_int(),
        BuiltinMethod::StreamEof => ValueType::untyped_bool(),
        BuiltinMethod::ArrayFirst
        | BuiltinMethod::ArrayLast
        | BuiltinMethod::ArrayMin
        | BuiltinMethod::ArrayMax => elem.cloned().unwrap_or_else(ValueType::untyped_int),
    }
}

/// Invoke a non-stream method. Stream methods are dispatched by the
/// evaluation scope, which owns the stream.
pub fn invoke(method: BuiltinMethod, this: &Value, args: &[Value]) -> Result<Value, EvalError> {
    match method {
        BuiltinMethod::IntToString => Ok(Value::Str(this.as_int()?.to_string())),
        BuiltinMethod::IntToInt => Ok(this.clone()),
        BuiltinMethod::FloatToInt => match this {
            Value::Float(v) => Ok(Value::Int(BigInt::from(v.trunc() as i64))),
            other => Err(EvalError::type_mismatch(format!(
                "to_i on {}",
                other.kind_name()
            ))),
        },
        BuiltinMethod::ByteArrayLength => match this {
            Value::Bytes(b) => Ok(Value::Int(BigInt::from(b.len()))),
            other => Err(EvalError::type_mismatch(format!(
                "length on {}",
                other.kind_name()
            ))),
        },
        BuiltinMethod::ByteArrayToString => {
            let bytes = match this {
                Value::Bytes(b) => b,
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "to_s on {}",
                        other.kind_name()
                    )))
                }
            };
            let encoding = match args.first() {
                Some(Value::Str(name)) => name.as_str(),
                _ => "UTF-8",
            };
            let enc = encoding_rs::Encoding::for_label(encoding.as_bytes())
                .ok_or_else(|| EvalError::type_mismatch(format!("unknown encoding {:?}", encoding)))?;
            let (text, _, _) = enc.decode(bytes);
            Ok(Value::Str(text.into_owned()))
        }
        BuiltinMethod::StringLength => match this {
            Value::Str(s) => Ok(Value::Int(BigInt::from(s.chars().count()))),
            other => Err(EvalError::type_mismatch(format!(
                "length on {}",
                other.kind_name()
            ))),
        },
        BuiltinMethod::StringReverse => match this {
            Value::Str(s) => Ok(Value::Str(s.chars().rev().collect())),
            other => Err(EvalError::type_mismatch(format!(
                "reverse on {}",
                other.kind_name()
            ))),
        },
        BuiltinMethod::StringSubstring => {
            let s = match this {
                Value::Str(s) => s,
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "substring on {}",
                        other.kind_name()
                    )))
                }
            };
            let (i, j) = match args {
                [i, j] => (i.as_u64()? as usize, j.as_u64()? as usize),
                _ => {
                    return Err(EvalError::type_mismatch(
                        "substring takes two integer arguments",
                    ))
                }
            };
            let chars: Vec<char> = s.chars().collect();
            if i > j || j > chars.len() {
                return Err(EvalError::range(format!(
                    "substring indices {}..{} out of range for length {}",
                    i,
                    j,
                    chars.len()
                )));
            }
            Ok(Value::Str(chars[i..j].iter().collect()))
        }
        BuiltinMethod::StringToInt => {
            let s = match this {
                Value::Str(s) => s.trim(),
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "to_i on {}",
                        other.kind_name()
                    )))
                }
            };
            let radix = match args.first() {
                Some(v) => v.as_u64()? as u32,
                None => 10,
            };
            BigInt::from_str_radix(s, radix)
                .map(Value::Int)
                .map_err(|_| {
                    EvalError::type_mismatch(format!("{:?} is not an integer in radix {}", s, radix))
                })
        }
        BuiltinMethod::BoolToInt => Ok(Value::Int(BigInt::from(i32::from(this.as_bool()?)))),
        BuiltinMethod::ArrayFirst | BuiltinMethod::ArrayLast => {
            let items = as_array(this)?;
            let item = match method {
                BuiltinMethod::ArrayFirst => items.first(),
                _ => items.last(),
            };
            item.cloned()
                .ok_or_else(|| EvalError::range("first/last on empty array"))
        }
        BuiltinMethod::ArraySize => Ok(Value::Int(BigInt::from(as_array(this)?.len()))),
        BuiltinMethod::ArrayMin | BuiltinMethod::ArrayMax => {
            let items = as_array(this)?;
            if items.is_empty() {
                return Err(EvalError::range("min/max on empty array"));
            }
            let mut best = &items[0];
            for item in &items[1..] {
                let swap = match method {
                    BuiltinMethod::ArrayMin => {
                        values_ordering(item, best)? == std::cmp::Ordering::Less
                    }
                    _ => values_ordering(item, best)? == std::cmp::Ordering::Greater,
                };
                if swap {
                    best = item;
                }
            }
            Ok(best.clone())
        }
        BuiltinMethod::StreamEof | BuiltinMethod::StreamSize | BuiltinMethod::StreamPos => Err(
            EvalError::type_mismatch("stream method invoked without a stream"),
        ),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, EvalError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(EvalError::type_mismatch(format!(
            "array method on {}",
            other.kind_name()
        ))),
    }
}
