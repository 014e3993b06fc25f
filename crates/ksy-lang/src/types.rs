// Leaf type system: numeric kinds, promotion, type references, endian folding

use num_bigint::BigInt;

use crate::error::ParseError;
use crate::expr::{self, Expr, Node};

/// Lowest-level binary kind. The bare `U2`/`S4`/`F8` variants are
/// endian-pending and must be folded to a concrete `*le`/`*be` variant
/// before they reach a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    U1,
    U2,
    U2le,
    U2be,
    U4,
    U4le,
    U4be,
    U8,
    U8le,
    U8be,
    S1,
    S2,
    S2le,
    S2be,
    S4,
    S4le,
    S4be,
    S8,
    S8le,
    S8be,
    F4,
    F4le,
    F4be,
    F8,
    F8le,
    F8be,
    Bits,
    Bytes,
    Str,
    User,
    UntypedInt,
    UntypedFloat,
    UntypedBool,
}

/// Byte order of a concrete numeric kind, or which one is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Pending,
    Little,
    Big,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NumClass {
    Unsigned,
    Signed,
    Float,
    UntypedInt,
    UntypedFloat,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::U1 => "u1",
            Kind::U2 => "u2",
            Kind::U2le => "u2le",
            Kind::U2be => "u2be",
            Kind::U4 => "u4",
            Kind::U4le => "u4le",
            Kind::U4be => "u4be",
            Kind::U8 => "u8",
            Kind::U8le => "u8le",
            Kind::U8be => "u8be",
            Kind::S1 => "s1",
            Kind::S2 => "s2",
            Kind::S2le => "s2le",
            Kind::S2be => "s2be",
            Kind::S4 => "s4",
            Kind::S4le => "s4le",
            Kind::S4be => "s4be",
            Kind::S8 => "s8",
            Kind::S8le => "s8le",
            Kind::S8be => "s8be",
            Kind::F4 => "f4",
            Kind::F4le => "f4le",
            Kind::F4be => "f4be",
            Kind::F8 => "f8",
            Kind::F8le => "f8le",
            Kind::F8be => "f8be",
            Kind::Bits => "bits",
            Kind::Bytes => "bytes",
            Kind::Str => "str",
            Kind::User => "user",
            Kind::UntypedInt => "untyped_int",
            Kind::UntypedFloat => "untyped_float",
            Kind::UntypedBool => "untyped_bool",
        }
    }

    fn class(self) -> Option<NumClass> {
        match self {
            Kind::U1 | Kind::U2 | Kind::U2le | Kind::U2be | Kind::U4 | Kind::U4le | Kind::U4be
            | Kind::U8 | Kind::U8le | Kind::U8be => Some(NumClass::Unsigned),
            Kind::S1 | Kind::S2 | Kind::S2le | Kind::S2be | Kind::S4 | Kind::S4le | Kind::S4be
            | Kind::S8 | Kind::S8le | Kind::S8be => Some(NumClass::Signed),
            Kind::F4 | Kind::F4le | Kind::F4be | Kind::F8 | Kind::F8le | Kind::F8be => {
                Some(NumClass::Float)
            }
            Kind::UntypedInt => Some(NumClass::UntypedInt),
            Kind::UntypedFloat => Some(NumClass::UntypedFloat),
            _ => None,
        }
    }

    /// Width in bytes for sized numerics.
    fn width(self) -> Option<u8> {
        match self {
            Kind::U1 | Kind::S1 => Some(1),
            Kind::U2 | Kind::U2le | Kind::U2be | Kind::S2 | Kind::S2le | Kind::S2be => Some(2),
            Kind::U4 | Kind::U4le | Kind::U4be | Kind::S4 | Kind::S4le | Kind::S4be | Kind::F4
            | Kind::F4le | Kind::F4be => Some(4),
            Kind::U8 | Kind::U8le | Kind::U8be | Kind::S8 | Kind::S8le | Kind::S8be | Kind::F8
            | Kind::F8le | Kind::F8be => Some(8),
            _ => None,
        }
    }

    fn byte_order(self) -> ByteOrder {
        match self {
            Kind::U2 | Kind::U4 | Kind::U8 | Kind::S2 | Kind::S4 | Kind::S8 | Kind::F4
            | Kind::F8 => ByteOrder::Pending,
            Kind::U2le | Kind::U4le | Kind::U8le | Kind::S2le | Kind::S4le | Kind::S8le
            | Kind::F4le | Kind::F8le => ByteOrder::Little,
            Kind::U2be | Kind::U4be | Kind::U8be | Kind::S2be | Kind::S4be | Kind::S8be
            | Kind::F4be | Kind::F8be => ByteOrder::Big,
            _ => ByteOrder::None,
        }
    }

    /// True for the endian-pending multi-byte numerics.
    pub fn has_dependent_endian(self) -> bool {
        self.byte_order() == ByteOrder::Pending
    }

    fn with_shape(class: NumClass, width: u8, order: ByteOrder) -> Kind {
        match class {
            NumClass::UntypedInt => return Kind::UntypedInt,
            NumClass::UntypedFloat => return Kind::UntypedFloat,
            _ => {}
        }
        match (class, width, order) {
            (NumClass::Unsigned, 1, _) => Kind::U1,
            (NumClass::Unsigned, 2, ByteOrder::Little) => Kind::U2le,
            (NumClass::Unsigned, 2, ByteOrder::Big) => Kind::U2be,
            (NumClass::Unsigned, 2, _) => Kind::U2,
            (NumClass::Unsigned, 4, ByteOrder::Little) => Kind::U4le,
            (NumClass::Unsigned, 4, ByteOrder::Big) => Kind::U4be,
            (NumClass::Unsigned, 4, _) => Kind::U4,
            (NumClass::Unsigned, _, ByteOrder::Little) => Kind::U8le,
            (NumClass::Unsigned, _, ByteOrder::Big) => Kind::U8be,
            (NumClass::Unsigned, _, _) => Kind::U8,
            (NumClass::Signed, 1, _) => Kind::S1,
            (NumClass::Signed, 2, ByteOrder::Little) => Kind::S2le,
            (NumClass::Signed, 2, ByteOrder::Big) => Kind::S2be,
            (NumClass::Signed, 2, _) => Kind::S2,
            (NumClass::Signed, 4, ByteOrder::Little) => Kind::S4le,
            (NumClass::Signed, 4, ByteOrder::Big) => Kind::S4be,
            (NumClass::Signed, 4, _) => Kind::S4,
            (NumClass::Signed, _, ByteOrder::Little) => Kind::S8le,
            (NumClass::Signed, _, ByteOrder::Big) => Kind::S8be,
            (NumClass::Signed, _, _) => Kind::S8,
            (NumClass::Float, w, ByteOrder::Little) if w <= 4 => Kind::F4le,
            (NumClass::Float, w, ByteOrder::Big) if w <= 4 => Kind::F4be,
            (NumClass::Float, w, _) if w <= 4 => Kind::F4,
            (NumClass::Float, _, ByteOrder::Little) => Kind::F8le,
            (NumClass::Float, _, ByteOrder::Big) => Kind::F8be,
            (NumClass::Float, _, _) => Kind::F8,
            (NumClass::UntypedInt, _, _) | (NumClass::UntypedFloat, _, _) => {
                unreachable!("handled by early return above")
            }
        }
    }

    /// Promote two kinds to the common kind an arithmetic or comparison
    /// operation is performed in: the wider, more-signed, more-floating of
    /// the two. Total on numerics; non-numeric kinds promote to themselves
    /// against anything (positional preference). Operand order is
    /// canonicalized first, so the numeric table is commutative.
    pub fn promote(self, other: Kind) -> Kind {
        if self == other {
            return self;
        }
        if self.class().is_none() || other.class().is_none() {
            return self;
        }
        let (a, b) = if self <= other {
            (self, other)
        } else {
            (other, self)
        };
        let ca = a.class().unwrap();
        let cb = b.class().unwrap();

        // Untyped operands sort after every sized kind, so after the swap
        // only `b` can be untyped.
        match (ca, cb) {
            (NumClass::UntypedInt, NumClass::UntypedFloat) => return Kind::UntypedFloat,
            // A sized float absorbs untyped literals of either flavor.
            (NumClass::Float, NumClass::UntypedInt | NumClass::UntypedFloat) => return a,
            (_, NumClass::UntypedInt) => return Kind::UntypedInt,
            (_, NumClass::UntypedFloat) => return Kind::UntypedFloat,
            _ => {}
        }

        // Both are sized numerics now. An unsigned operand meeting a signed
        // or floating one first becomes signed at the same width; then the
        // pair widens to the larger width. The byte order of the result
        // follows the canonically-first operand (pending when it has none).
        let class = ca.max(cb);
        let width = a.width().unwrap().max(b.width().unwrap());
        let order = match a.byte_order() {
            ByteOrder::None => ByteOrder::Pending,
            o => o,
        };
        Kind::with_shape(class, width, order)
    }

    fn parse_basic(s: &str) -> Option<Kind> {
        Some(match s {
            "u1" => Kind::U1,
            "u2" => Kind::U2,
            "u2le" => Kind::U2le,
            "u2be" => Kind::U2be,
            "u4" => Kind::U4,
            "u4le" => Kind::U4le,
            "u4be" => Kind::U4be,
            "u8" => Kind::U8,
            "u8le" => Kind::U8le,
            "u8be" => Kind::U8be,
            "s1" => Kind::S1,
            "s2" => Kind::S2,
            "s2le" => Kind::S2le,
            "s2be" => Kind::S2be,
            "s4" => Kind::S4,
            "s4le" => Kind::S4le,
            "s4be" => Kind::S4be,
            "s8" => Kind::S8,
            "s8le" => Kind::S8le,
            "s8be" => Kind::S8be,
            "f4" => Kind::F4,
            "f4le" => Kind::F4le,
            "f4be" => Kind::F4be,
            "f8" => Kind::F8,
            "f8le" => Kind::F8le,
            "f8be" => Kind::F8be,
            "bytes" => Kind::Bytes,
            "str" | "strz" => Kind::Str,
            _ => return None,
        })
    }
}

/// Byte order directives from `meta.endian`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndianKind {
    #[default]
    Unspecified,
    Little,
    Big,
    Switch,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Endian {
    pub kind: EndianKind,
    pub switch_on: Option<Expr>,
    /// Case expression source → endianness, in declaration order.
    pub cases: Vec<(String, EndianKind)>,
}

/// Bit order directives from `meta.bit-endian`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitEndianKind {
    #[default]
    Unspecified,
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitEndian {
    pub kind: BitEndianKind,
}

/// Payload for `Kind::Bits`.
#[derive(Debug, Clone, PartialEq)]
pub struct BitsType {
    pub width: u32,
    pub endian: BitEndian,
}

/// Payload for `Kind::Bytes`.
#[derive(Debug, Clone, PartialEq)]
pub struct BytesType {
    pub size: Option<Expr>,
    pub size_eos: bool,
    /// Terminator byte, or -1 for none.
    pub terminator: i16,
    pub consume: bool,
    pub include: bool,
    pub eos_error: bool,
}

impl Default for BytesType {
    fn default() -> Self {
        Self {
            size: None,
            size_eos: false,
            terminator: -1,
            consume: true,
            include: false,
            eos_error: true,
        }
    }
}

/// Payload for `Kind::Str`.
#[derive(Debug, Clone, PartialEq)]
pub struct StringType {
    pub size: Option<Expr>,
    pub size_eos: bool,
    pub encoding: String,
    pub terminator: i16,
    pub consume: bool,
    pub include: bool,
    pub eos_error: bool,
}

impl Default for StringType {
    fn default() -> Self {
        Self {
            size: None,
            size_eos: false,
            encoding: String::new(),
            terminator: -1,
            consume: true,
            include: false,
            eos_error: true,
        }
    }
}

/// Payload for `Kind::User`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserType {
    pub name: String,
    pub args: Vec<Expr>,
    pub size: Option<Expr>,
}

/// A concrete leaf type: a kind plus its kind-specific payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeRef {
    pub kind: Option<Kind>,
    pub bits: Option<BitsType>,
    pub bytes: Option<BytesType>,
    pub string: Option<StringType>,
    pub user: Option<UserType>,
}

impl TypeRef {
    pub fn of_kind(kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind.expect("TypeRef without a kind")
    }

    /// Rewrite an endian-pending numeric kind to the concrete variant for
    /// the ambient endianness. Idempotent; a no-op for concrete and
    /// endian-agnostic kinds, and under an unspecified ambient.
    pub fn fold_endian(&self, endian: EndianKind) -> TypeRef {
        let order = match endian {
            EndianKind::Little => ByteOrder::Little,
            EndianKind::Big => ByteOrder::Big,
            _ => return self.clone(),
        };
        let mut folded = self.clone();
        if let Some(kind) = self.kind {
            if kind.byte_order() == ByteOrder::Pending {
                let class = kind.class().expect("pending kind is numeric");
                let width = kind.width().expect("pending kind is sized");
                folded.kind = Some(Kind::with_shape(class, width, order));
            }
        }
        folded
    }

    /// Resolve a pending bit order on a bits type. Idempotent.
    pub fn fold_bit_endian(&self, endian: BitEndianKind) -> TypeRef {
        let mut folded = self.clone();
        if let Some(bits) = &mut folded.bits {
            if bits.endian.kind == BitEndianKind::Unspecified {
                bits.endian.kind = endian;
            }
        }
        folded
    }

    pub fn has_dependent_endian(&self) -> bool {
        self.kind.map_or(false, Kind::has_dependent_endian)
    }
}

/// A position-dependent union: selects a TypeRef by comparing the evaluated
/// switch expression against each case key.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSwitch {
    /// Name of the owning field, kept for identity and name mangling.
    pub field_name: String,
    pub switch_on: Expr,
    /// Case key source → TypeRef, in declaration order.
    pub cases: Vec<(String, TypeRef)>,
}

impl TypeSwitch {
    pub fn fold_endian(&self, endian: EndianKind) -> TypeSwitch {
        TypeSwitch {
            field_name: self.field_name.clone(),
            switch_on: self.switch_on.clone(),
            cases: self
                .cases
                .iter()
                .map(|(k, v)| (k.clone(), v.fold_endian(endian)))
                .collect(),
        }
    }

    pub fn fold_bit_endian(&self, endian: BitEndianKind) -> TypeSwitch {
        TypeSwitch {
            field_name: self.field_name.clone(),
            switch_on: self.switch_on.clone(),
            cases: self
                .cases
                .iter()
                .map(|(k, v)| (k.clone(), v.fold_bit_endian(endian)))
                .collect(),
        }
    }

    pub fn has_dependent_endian(&self) -> bool {
        self.cases.iter().any(|(_, v)| v.has_dependent_endian())
    }
}

/// Exactly one of a TypeRef or a TypeSwitch. An attribute with no declared
/// type gets `bytes`, never an absent Type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Ref(TypeRef),
    Switch(TypeSwitch),
}

impl Type {
    pub fn fold_endian(&self, endian: EndianKind) -> Type {
        match self {
            Type::Ref(r) => Type::Ref(r.fold_endian(endian)),
            Type::Switch(s) => Type::Switch(s.fold_endian(endian)),
        }
    }

    pub fn fold_bit_endian(&self, endian: BitEndianKind) -> Type {
        match self {
            Type::Ref(r) => Type::Ref(r.fold_bit_endian(endian)),
            Type::Switch(s) => Type::Switch(s.fold_bit_endian(endian)),
        }
    }

    pub fn has_dependent_endian(&self) -> bool {
        match self {
            Type::Ref(r) => r.has_dependent_endian(),
            Type::Switch(s) => s.has_dependent_endian(),
        }
    }

    pub fn as_ref(&self) -> Option<&TypeRef> {
        match self {
            Type::Ref(r) => Some(r),
            Type::Switch(_) => None,
        }
    }

    pub fn as_switch(&self) -> Option<&TypeSwitch> {
        match self {
            Type::Switch(s) => Some(s),
            Type::Ref(_) => None,
        }
    }
}

/// Parse a type string (`u4`, `strz`, `b12le`, `header(3, _root.len)`) into
/// a TypeRef.
pub fn parse_type_ref(typestr: &str) -> Result<TypeRef, ParseError> {
    if let Some(kind) = Kind::parse_basic(typestr) {
        let mut result = TypeRef::of_kind(kind);
        match kind {
            Kind::Bytes => result.bytes = Some(BytesType::default()),
            Kind::Str => {
                let mut s = StringType::default();
                if typestr == "strz" {
                    s.terminator = 0;
                }
                result.string = Some(s);
            }
            _ => {}
        }
        return Ok(result);
    }
    if let Some(bits) = parse_bits_type(typestr) {
        return Ok(bits);
    }
    parse_user_type(typestr)
}

// `b<width>` with an optional `le`/`be` suffix, e.g. `b1`, `b12`, `b5le`.
fn parse_bits_type(typestr: &str) -> Option<TypeRef> {
    let rest = typestr.strip_prefix('b')?;
    let (digits, endian) = if let Some(d) = rest.strip_suffix("le") {
        (d, BitEndianKind::Little)
    } else if let Some(d) = rest.strip_suffix("be") {
        (d, BitEndianKind::Big)
    } else {
        (rest, BitEndianKind::Unspecified)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let width: u32 = digits.parse().ok()?;
    let mut result = TypeRef::of_kind(Kind::Bits);
    result.bits = Some(BitsType {
        width,
        endian: BitEndian { kind: endian },
    });
    Some(result)
}

// `name` or `name(arg, arg, ...)`; arguments are expressions.
fn parse_user_type(typestr: &str) -> Result<TypeRef, ParseError> {
    let mut user = UserType {
        name: typestr.to_string(),
        args: Vec::new(),
        size: None,
    };
    if let Some(open) = typestr.find('(') {
        let close = typestr
            .rfind(')')
            .ok_or_else(|| ParseError::new(format!("missing ')' in type {:?}", typestr)))?;
        user.name = typestr[..open].to_string();
        for (i, src) in typestr[open + 1..close].split(',').enumerate() {
            let arg = expr::parse_expr(src).map_err(|e| {
                ParseError::new(format!(
                    "in argument {} of {}: {}",
                    i + 1,
                    user.name,
                    e
                ))
            })?;
            user.args.push(arg);
        }
    }
    if user.name.is_empty() {
        return Err(ParseError::new(format!("invalid type {:?}", typestr)));
    }
    let mut result = TypeRef::of_kind(Kind::User);
    result.user = Some(user);
    Ok(result)
}

/// Build the size expression synthesized for a `contents` literal.
pub fn literal_size_expr(len: usize) -> Expr {
    Expr {
        root: Node::Int(BigInt::from(len)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: &[Kind] = &[
        Kind::U1,
        Kind::U2,
        Kind::U2le,
        Kind::U2be,
        Kind::U4,
        Kind::U4le,
        Kind::U4be,
        Kind::U8,
        Kind::U8le,
        Kind::U8be,
        Kind::S1,
        Kind::S2,
        Kind::S2le,
        Kind::S2be,
        Kind::S4,
        Kind::S4le,
        Kind::S4be,
        Kind::S8,
        Kind::S8le,
        Kind::S8be,
        Kind::F4,
        Kind::F4le,
        Kind::F4be,
        Kind::F8,
        Kind::F8le,
        Kind::F8be,
        Kind::Bits,
        Kind::Bytes,
        Kind::Str,
        Kind::User,
        Kind::UntypedInt,
        Kind::UntypedFloat,
        Kind::UntypedBool,
    ];

    #[test]
    fn test_promote_reflexive() {
        for &k in ALL_KINDS {
            assert_eq!(k.promote(k), k, "promote({0:?}, {0:?})", k);
        }
    }

    #[test]
    fn test_promote_widens() {
        assert_eq!(Kind::U1.promote(Kind::U4), Kind::U4);
        // The canonically-first operand's byte order survives widening.
        assert_eq!(Kind::U2le.promote(Kind::U8), Kind::U8le);
        assert_eq!(Kind::S2.promote(Kind::S8le), Kind::S8);
    }

    #[test]
    fn test_promote_unsigned_meets_signed() {
        assert_eq!(Kind::U4le.promote(Kind::S2), Kind::S4le);
        assert_eq!(Kind::U1.promote(Kind::S1), Kind::S1);
        assert_eq!(Kind::U8.promote(Kind::S4), Kind::S8);
    }

    #[test]
    fn test_promote_integer_meets_float() {
        assert_eq!(Kind::S2le.promote(Kind::F4), Kind::F4le);
        assert_eq!(Kind::U4.promote(Kind::F4be), Kind::F4);
        assert_eq!(Kind::S8.promote(Kind::F4), Kind::F8);
        assert_eq!(Kind::F4.promote(Kind::F8be), Kind::F8);
    }

    #[test]
    fn test_promote_untyped() {
        assert_eq!(Kind::UntypedInt.promote(Kind::UntypedFloat), Kind::UntypedFloat);
        assert_eq!(Kind::S4.promote(Kind::UntypedInt), Kind::UntypedInt);
        assert_eq!(Kind::UntypedInt.promote(Kind::F4), Kind::F4);
        assert_eq!(Kind::F4.promote(Kind::UntypedFloat), Kind::F4);
        assert_eq!(Kind::U2.promote(Kind::UntypedFloat), Kind::UntypedFloat);
    }

    #[test]
    fn test_promote_commutative_over_numerics() {
        for &a in ALL_KINDS {
            for &b in ALL_KINDS {
                if a.class().is_some() && b.class().is_some() {
                    assert_eq!(
                        a.promote(b),
                        b.promote(a),
                        "promote not symmetric for {:?}, {:?}",
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_fold_endian_concrete() {
        let t = TypeRef::of_kind(Kind::U2);
        assert_eq!(t.fold_endian(EndianKind::Little).kind(), Kind::U2le);
        assert_eq!(t.fold_endian(EndianKind::Big).kind(), Kind::U2be);
        assert_eq!(t.fold_endian(EndianKind::Unspecified).kind(), Kind::U2);
    }

    #[test]
    fn test_fold_endian_idempotent() {
        for &k in ALL_KINDS {
            let t = TypeRef::of_kind(k);
            for e in [EndianKind::Little, EndianKind::Big, EndianKind::Unspecified] {
                let once = t.fold_endian(e);
                let twice = once.fold_endian(e);
                assert_eq!(once, twice, "fold not idempotent for {:?} under {:?}", k, e);
            }
        }
    }

    #[test]
    fn test_fold_endian_leaves_concrete_alone() {
        let t = TypeRef::of_kind(Kind::U4be);
        assert_eq!(t.fold_endian(EndianKind::Little).kind(), Kind::U4be);
    }

    #[test]
    fn test_fold_bit_endian() {
        let t = parse_type_ref("b7").unwrap();
        let folded = t.fold_bit_endian(BitEndianKind::Big);
        assert_eq!(folded.bits.as_ref().unwrap().endian.kind, BitEndianKind::Big);
        // Explicit suffix is not overwritten.
        let t = parse_type_ref("b7le").unwrap();
        let folded = t.fold_bit_endian(BitEndianKind::Big);
        assert_eq!(folded.bits.as_ref().unwrap().endian.kind, BitEndianKind::Little);
    }

    #[test]
    fn test_parse_basic_types() {
        assert_eq!(parse_type_ref("u4le").unwrap().kind(), Kind::U4le);
        assert_eq!(parse_type_ref("f8").unwrap().kind(), Kind::F8);
        let s = parse_type_ref("strz").unwrap();
        assert_eq!(s.kind(), Kind::Str);
        assert_eq!(s.string.as_ref().unwrap().terminator, 0);
        let b = parse_type_ref("bytes").unwrap();
        assert!(b.bytes.as_ref().unwrap().consume);
        assert_eq!(b.bytes.as_ref().unwrap().terminator, -1);
    }

    #[test]
    fn test_parse_bits_types() {
        let b = parse_type_ref("b12").unwrap();
        assert_eq!(b.kind(), Kind::Bits);
        assert_eq!(b.bits.as_ref().unwrap().width, 12);
        let b = parse_type_ref("b3be").unwrap();
        assert_eq!(b.bits.as_ref().unwrap().endian.kind, BitEndianKind::Big);
    }

    #[test]
    fn test_parse_user_type_with_args() {
        let t = parse_type_ref("chunk(4, _root.count)").unwrap();
        assert_eq!(t.kind(), Kind::User);
        let user = t.user.as_ref().unwrap();
        assert_eq!(user.name, "chunk");
        assert_eq!(user.args.len(), 2);
    }

    #[test]
    fn test_parse_user_type_missing_paren() {
        assert!(parse_type_ref("chunk(4").is_err());
    }

    #[test]
    fn test_typeswitch_fold_endian() {
        let ts = TypeSwitch {
            field_name: "body".into(),
            switch_on: Expr::parse("kind").unwrap(),
            cases: vec![
                ("1".into(), TypeRef::of_kind(Kind::U4)),
                ("2".into(), TypeRef::of_kind(Kind::F4le)),
            ],
        };
        assert!(ts.has_dependent_endian());
        let folded = ts.fold_endian(EndianKind::Big);
        assert_eq!(folded.cases[0].1.kind(), Kind::U4be);
        assert_eq!(folded.cases[1].1.kind(), Kind::F4le);
        assert!(!folded.has_dependent_endian());
    }
}
