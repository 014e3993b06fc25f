// Emitter framework: the target-independent services code emitters consume
//
// The framework owns name mangling, endian bookkeeping, and the choice of
// stream read operation for each concrete leaf type. A backend owns only
// the string formatting of its target language.

pub mod rust;

pub use rust::RustEmitter;

use crate::error::EvalError;
use crate::schema::Struct;
use crate::types::{EndianKind, Kind, TypeRef};

/// A single file produced by an emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub body: Vec<u8>,
}

/// A code emitter: turns a loaded schema into target-language artifacts.
pub trait Emitter {
    fn emit(&mut self, input_name: &str, schema: &Struct) -> Result<Vec<Artifact>, EvalError>;
}

/// True when a struct needs three generated read functions (unspecified,
/// little, big): its own endian is not fixed and at least one attribute's
/// type is endian-pending. A struct with `endian: switch` additionally
/// gets a dispatcher.
pub fn needs_multi_endian(s: &Struct) -> bool {
    s.has_dependent_endian()
}

/// Mangle a schema identifier into a type name: `file_header` becomes
/// `FileHeader`, `a::b` becomes `A__B`.
pub fn type_name(id: &str) -> String {
    id.split("::")
        .map(pascal_case)
        .collect::<Vec<_>>()
        .join("__")
}

fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = true;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Name of the generated case-dispatch type for a type switch on `field`.
pub fn type_switch_name(field: &str) -> String {
    format!("{}_Cases", type_name(field))
}

/// Name of a case-tag type: `<Parent>_<Field>_Cases_<Value>`.
pub fn type_switch_case_name(parent_prefix: &str, field: &str, value: &str) -> String {
    format!("{}{}_{}", parent_prefix, type_switch_name(field), value)
}

/// Structural description of the stream call that reads one concrete leaf
/// type. Backends turn this into target syntax; expression payloads are
/// handed over unprinted.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOp<'a> {
    /// Fixed-width scalar: the stream method name (`read_u4le`, ...).
    Scalar(&'static str),
    /// `read_bits_int_be`/`..._le` with a bit width.
    Bits { big_endian: bool, width: u32 },
    /// `read_bytes(size)`.
    BytesSized(&'a crate::expr::Expr),
    /// `read_bytes_full()`.
    BytesEos,
    /// `read_bytes_term(term, include, consume, eos_error)`.
    BytesTerm {
        term: u8,
        include: bool,
        consume: bool,
        eos_error: bool,
    },
    /// `read_bytes_pad_term(size, term_pad, term, include)`; decode as a
    /// string afterwards when `encoding` is set.
    BytesPadTerm {
        size: &'a crate::expr::Expr,
        term: u8,
        include: bool,
    },
    /// `read_str_eos(encoding)`.
    StrEos { encoding: &'a str },
}

/// Choose the stream operation for a folded, non-user TypeRef. Endian-
/// pending kinds are rejected; callers fold first.
pub fn read_op(tr: &TypeRef) -> Result<ReadOp<'_>, EvalError> {
    let op = match tr.kind() {
        Kind::U2 | Kind::U4 | Kind::U8 | Kind::S2 | Kind::S4 | Kind::S8 | Kind::F4 | Kind::F8 => {
            return Err(EvalError::undecided_endian(format!(
                "cannot emit a read for endian-pending kind {}",
                tr.kind().name()
            )));
        }
        Kind::U1 => ReadOp::Scalar("read_u1"),
        Kind::U2le => ReadOp::Scalar("read_u2le"),
        Kind::U2be => ReadOp::Scalar("read_u2be"),
        Kind::U4le => ReadOp::Scalar("read_u4le"),
        Kind::U4be => ReadOp::Scalar("read_u4be"),
        Kind::U8le => ReadOp::Scalar("read_u8le"),
        Kind::U8be => ReadOp::Scalar("read_u8be"),
        Kind::S1 => ReadOp::Scalar("read_s1"),
        Kind::S2le => ReadOp::Scalar("read_s2le"),
        Kind::S2be => ReadOp::Scalar("read_s2be"),
        Kind::S4le => ReadOp::Scalar("read_s4le"),
        Kind::S4be => ReadOp::Scalar("read_s4be"),
        Kind::S8le => ReadOp::Scalar("read_s8le"),
        Kind::S8be => ReadOp::Scalar("read_s8be"),
        Kind::F4le => ReadOp::Scalar("read_f4le"),
        Kind::F4be => ReadOp::Scalar("read_f4be"),
        Kind::F8le => ReadOp::Scalar("read_f8le"),
        Kind::F8be => ReadOp::Scalar("read_f8be"),
        Kind::Bits => {
            let bits = tr
                .bits
                .as_ref()
                .ok_or_else(|| EvalError::type_mismatch("bits type without width"))?;
            ReadOp::Bits {
                big_endian: !matches!(
                    bits.endian.kind,
                    crate::types::BitEndianKind::Little
                ),
                width: bits.width,
            }
        }
        Kind::Bytes => {
            let spec = tr
                .bytes
                .as_ref()
                .ok_or_else(|| EvalError::type_mismatch("bytes type without payload"))?;
            if let Some(size) = &spec.size {
                ReadOp::BytesSized(size)
            } else if spec.size_eos {
                ReadOp::BytesEos
            } else if spec.terminator >= 0 {
                ReadOp::BytesTerm {
                    term: spec.terminator as u8,
                    include: spec.include,
                    consume: spec.consume,
                    eos_error: spec.eos_error,
                }
            } else {
                return Err(EvalError::type_mismatch(
                    "bytes attribute needs size, size-eos, or terminator",
                ));
            }
        }
        Kind::Str => {
            let spec = tr
                .string
                .as_ref()
                .ok_or_else(|| EvalError::type_mismatch("string type without payload"))?;
            if spec.size_eos {
                ReadOp::StrEos {
                    encoding: &spec.encoding,
                }
            } else if let Some(size) = &spec.size {
                if spec.terminator < 0 {
                    ReadOp::BytesSized(size)
                } else {
                    ReadOp::BytesPadTerm {
                        size,
                        term: spec.terminator as u8,
                        include: spec.include,
                    }
                }
            } else if spec.terminator >= 0 {
                ReadOp::BytesTerm {
                    term: spec.terminator as u8,
                    include: spec.include,
                    consume: spec.consume,
                    eos_error: spec.eos_error,
                }
            } else {
                return Err(EvalError::type_mismatch(
                    "string attribute needs size, size-eos, or terminator",
                ));
            }
        }
        Kind::User => {
            return Err(EvalError::type_mismatch(
                "read_op called on a user type",
            ));
        }
        other => {
            return Err(EvalError::type_mismatch(format!(
                "cannot emit a read for kind {}",
                other.name()
            )));
        }
    };
    Ok(op)
}

/// The forced-endian variants a struct's read functions come in.
pub fn endian_variants(s: &Struct) -> Vec<EndianKind> {
    if s.meta.endian.kind == EndianKind::Switch || needs_multi_endian(s) {
        vec![
            EndianKind::Unspecified,
            EndianKind::Little,
            EndianKind::Big,
        ]
    } else {
        vec![EndianKind::Unspecified]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_type_ref;

    #[test]
    fn test_type_name_mangling() {
        assert_eq!(type_name("file_header"), "FileHeader");
        assert_eq!(type_name("a"), "A");
        assert_eq!(type_name("outer::inner_most"), "Outer__InnerMost");
    }

    #[test]
    fn test_type_switch_names() {
        assert_eq!(type_switch_name("body"), "Body_Cases");
        assert_eq!(
            type_switch_case_name("Header_", "body", "1"),
            "Header_Body_Cases_1"
        );
    }

    #[test]
    fn test_read_op_scalars() {
        let tref = parse_type_ref("u4le").unwrap();
        let op = read_op(&tref).unwrap();
        assert_eq!(op, ReadOp::Scalar("read_u4le"));
        // Endian-pending kinds are rejected.
        let tref2 = parse_type_ref("u4").unwrap();
        assert!(read_op(&tref2).is_err());
    }

    #[test]
    fn test_read_op_strz() {
        let tref = parse_type_ref("strz").unwrap();
        let op = read_op(&tref).unwrap();
        assert_eq!(
            op,
            ReadOp::BytesTerm {
                term: 0,
                include: false,
                consume: true,
                eos_error: true,
            }
        );
    }

    #[test]
    fn test_read_op_bits() {
        let tref = parse_type_ref("b5le").unwrap();
        let op = read_op(&tref).unwrap();
        assert_eq!(
            op,
            ReadOp::Bits {
                big_endian: false,
                width: 5
            }
        );
    }
}
