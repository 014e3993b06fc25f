// Schema AST: the normalized, expression-parsed mirror of a source schema

use crate::expr::Expr;
use crate::types::{BitEndian, Endian, EndianKind, Type, TypeRef};

use num_bigint::BigInt;

/// How an attribute repeats.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Repeat {
    #[default]
    None,
    /// Read until the end of the stream.
    Eos,
    /// Evaluate the expression once and read that many elements.
    Expr(Expr),
    /// Read elements until the predicate (with `_` bound to the just-read
    /// element) evaluates to true. At least one element is always read.
    Until(Expr),
}

impl Repeat {
    pub fn is_none(&self) -> bool {
        matches!(self, Repeat::None)
    }
}

/// One named field in a struct's `seq` or `instances`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub id: String,
    pub doc: String,
    pub doc_ref: Vec<String>,
    /// Literal byte pattern the read bytes must equal. Implies size.
    pub contents: Option<Vec<u8>>,
    pub ty: Type,
    pub repeat: Repeat,
    pub if_expr: Option<Expr>,
    /// Name of the enum this integer attribute maps into.
    pub enum_name: String,
    /// Reserved: transformation applied to raw bytes. Parsed, never applied.
    pub process: Option<Expr>,
    // Instance-only keys.
    pub pos: Option<Expr>,
    pub io: Option<Expr>,
    /// Set for computed attributes; no stream read happens.
    pub value: Option<Expr>,
}

impl Attr {
    /// Computed attributes have `value` set and read nothing.
    pub fn is_computed(&self) -> bool {
        self.value.is_some()
    }
}

/// A positional struct parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: String,
    pub doc: String,
    pub ty: TypeRef,
    pub enum_name: String,
}

/// A single enum entry. Values may be arbitrary precision.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub value: BigInt,
    pub id: String,
}

/// A named enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub id: String,
    pub values: Vec<EnumValue>,
}

impl Enum {
    pub fn value_of(&self, id: &str) -> Option<&BigInt> {
        self.values.iter().find(|v| v.id == id).map(|v| &v.value)
    }

    pub fn name_of(&self, value: &BigInt) -> Option<&str> {
        self.values
            .iter()
            .find(|v| &v.value == value)
            .map(|v| v.id.as_str())
    }
}

/// Meta block of a struct: endian directives, imports, default encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Meta {
    pub endian: Endian,
    pub bit_endian: BitEndian,
    pub imports: Vec<String>,
    pub encoding: String,
}

/// A struct definition: the unit of the schema tree. A struct exclusively
/// owns its params, seq, instances, nested structs, and enums.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    pub id: String,
    pub doc: String,
    pub meta: Meta,
    pub params: Vec<Param>,
    pub seq: Vec<Attr>,
    pub instances: Vec<Attr>,
    pub structs: Vec<Struct>,
    pub enums: Vec<Enum>,
}

impl Struct {
    /// Resolve a (possibly `::`-qualified) nested struct name relative to
    /// this struct. Returns the chain of structs from here down to the
    /// target, target last.
    pub fn resolve_struct(&self, name: &str) -> Option<Vec<&Struct>> {
        let (part, rest) = match name.split_once("::") {
            Some((p, r)) => (p, r),
            None => (name, ""),
        };
        if part.is_empty() {
            return None;
        }
        for sub in &self.structs {
            if sub.id == part {
                if rest.is_empty() {
                    return Some(vec![self, sub]);
                }
                let mut chain = vec![self];
                chain.extend(sub.resolve_struct(rest)?);
                return Some(chain);
            }
        }
        None
    }

    /// Resolve a (possibly `::`-qualified) enum name relative to this
    /// struct. Returns the struct owning the enum and the enum itself.
    pub fn resolve_enum(&self, name: &str) -> Option<(&Struct, &Enum)> {
        let (owner, leaf) = match name.rsplit_once("::") {
            Some((qual, leaf)) => {
                let chain = self.resolve_struct(qual)?;
                (*chain.last()?, leaf)
            }
            None => (self, name),
        };
        owner
            .enums
            .iter()
            .find(|e| e.id == leaf)
            .map(|e| (owner, e))
    }

    /// True if reading this struct needs an ambient endianness: its own
    /// endian is not fixed and at least one attribute's type is
    /// endian-pending.
    pub fn has_dependent_endian(&self) -> bool {
        if matches!(self.meta.endian.kind, EndianKind::Little | EndianKind::Big) {
            return false;
        }
        self.seq.iter().any(|attr| attr.ty.has_dependent_endian())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Kind;

    fn named(id: &str) -> Struct {
        Struct {
            id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_struct_nested() {
        let mut root = named("root");
        let mut mid = named("mid");
        mid.structs.push(named("leaf"));
        root.structs.push(mid);

        let chain = root.resolve_struct("mid").unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].id, "mid");

        let chain = root.resolve_struct("mid::leaf").unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].id, "leaf");

        assert!(root.resolve_struct("absent").is_none());
        assert!(root.resolve_struct("mid::absent").is_none());
    }

    #[test]
    fn test_resolve_enum_qualified() {
        let mut root = named("root");
        let mut sub = named("sub");
        sub.enums.push(Enum {
            id: "kind".into(),
            values: vec![EnumValue {
                value: BigInt::from(1),
                id: "a".into(),
            }],
        });
        root.structs.push(sub);

        let (owner, e) = root.resolve_enum("sub::kind").unwrap();
        assert_eq!(owner.id, "sub");
        assert_eq!(e.value_of("a"), Some(&BigInt::from(1)));
        assert!(root.resolve_enum("kind").is_none());
    }

    #[test]
    fn test_has_dependent_endian() {
        let mut s = named("s");
        s.seq.push(Attr {
            id: "v".into(),
            doc: String::new(),
            doc_ref: vec![],
            contents: None,
            ty: Type::Ref(TypeRef::of_kind(Kind::U2)),
            repeat: Repeat::None,
            if_expr: None,
            enum_name: String::new(),
            process: None,
            pos: None,
            io: None,
            value: None,
        });
        assert!(s.has_dependent_endian());
        s.meta.endian.kind = EndianKind::Little;
        assert!(!s.has_dependent_endian());
    }

    #[test]
    fn test_enum_lookup_bidirectional() {
        let e = Enum {
            id: "kind".into(),
            values: vec![
                EnumValue {
                    value: BigInt::from(1),
                    id: "a".into(),
                },
                EnumValue {
                    value: BigInt::from(2),
                    id: "b".into(),
                },
            ],
        };
        assert_eq!(e.name_of(&BigInt::from(2)), Some("b"));
        assert_eq!(e.value_of("b"), Some(&BigInt::from(2)));
        assert_eq!(e.value_of("z"), None);
    }
}
