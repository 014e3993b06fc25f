// Translation between the YAML spec structs and the schema AST

use std::io;

use num_bigint::BigInt;
use num_traits::Num;

use crate::error::ParseError;
use crate::expr::{parse_expr, parse_expr_opt, Expr};
use crate::schema::{Attr, Enum, EnumValue, Meta, Param, Repeat, Struct};
use crate::types::{
    self, BitEndian, BitEndianKind, Endian, EndianKind, Kind, Type, TypeRef, TypeSwitch,
};

use super::{
    AttrTypeSpec, AttributeSpec, ByteSpec, EndianSpec, EnumValuesSpec, MetaSpec, MultiString,
    OrderedMap, ParamSpec, TypeSpec,
};

/// Parse a schema document from a reader. The result has every embedded
/// expression string parsed; failures of any kind are `ParseError`.
pub fn parse_schema(reader: impl io::Read) -> Result<Struct, ParseError> {
    let spec: TypeSpec = serde_yaml::from_reader(reader)
        .map_err(|e| ParseError::with_source("malformed schema document", e))?;
    spec_to_schema(&spec)
}

/// Translate a parsed document into the schema AST.
pub fn spec_to_schema(spec: &TypeSpec) -> Result<Struct, ParseError> {
    translate_type_spec(None, spec)
}

fn translate_type_spec(id: Option<&str>, spec: &TypeSpec) -> Result<Struct, ParseError> {
    let mut result = Struct {
        id: id.unwrap_or(&spec.meta.id).to_string(),
        doc: spec.doc.clone(),
        ..Default::default()
    };
    result.meta = translate_meta(&spec.meta)?;

    for param in &spec.params {
        result.params.push(translate_param(param)?);
    }
    for attr in &spec.seq {
        result.seq.push(translate_attr(attr, false)?);
    }
    for (name, attr) in &spec.instances.0 {
        let mut attr = attr.clone();
        attr.id = name.clone();
        result.instances.push(translate_attr(&attr, true)?);
    }
    for (name, sub) in &spec.types.0 {
        result.structs.push(translate_type_spec(Some(name), sub)?);
    }
    for (name, values) in &spec.enums.0 {
        result.enums.push(translate_enum(name, values)?);
    }
    Ok(result)
}

fn translate_meta(meta: &MetaSpec) -> Result<Meta, ParseError> {
    Ok(Meta {
        endian: translate_endian(&meta.endian)?,
        bit_endian: translate_bit_endian(&meta.bit_endian)?,
        imports: meta.imports.clone(),
        encoding: meta.encoding.clone(),
    })
}

fn translate_endian(spec: &EndianSpec) -> Result<Endian, ParseError> {
    if !spec.value.is_empty() {
        let kind = match spec.value.as_str() {
            "le" => EndianKind::Little,
            "be" => EndianKind::Big,
            other => {
                return Err(ParseError::new(format!("unrecognized endian {:?}", other)));
            }
        };
        return Ok(Endian {
            kind,
            ..Default::default()
        });
    }
    if !spec.switch_on.is_empty() || !spec.cases.is_empty() {
        let switch_on = parse_expr(&spec.switch_on)
            .map_err(|e| ParseError::new(format!("in endian switch-on: {}", e)))?;
        let mut cases = Vec::with_capacity(spec.cases.len());
        for (key, value) in &spec.cases {
            // Case keys must be valid expressions.
            parse_expr(key)
                .map_err(|e| ParseError::new(format!("in endian case {:?}: {}", key, e)))?;
            let kind = match value.as_str() {
                "le" => EndianKind::Little,
                "be" => EndianKind::Big,
                other => {
                    return Err(ParseError::new(format!(
                        "endian case {:?} maps to unknown endian {:?}",
                        key, other
                    )));
                }
            };
            cases.push((key.clone(), kind));
        }
        return Ok(Endian {
            kind: EndianKind::Switch,
            switch_on: Some(switch_on),
            cases,
        });
    }
    Ok(Endian::default())
}

fn translate_bit_endian(value: &str) -> Result<BitEndian, ParseError> {
    let kind = match value {
        "" => BitEndianKind::Unspecified,
        "le" => BitEndianKind::Little,
        "be" => BitEndianKind::Big,
        other => {
            return Err(ParseError::new(format!(
                "unrecognized bit-endian {:?}",
                other
            )));
        }
    };
    Ok(BitEndian { kind })
}

fn translate_param(spec: &ParamSpec) -> Result<Param, ParseError> {
    Ok(Param {
        id: spec.id.clone(),
        doc: spec.doc.clone(),
        ty: types::parse_type_ref(&spec.r#type)?,
        enum_name: spec.r#enum.clone(),
    })
}

fn translate_enum(id: &str, values: &EnumValuesSpec) -> Result<Enum, ParseError> {
    let mut result = Enum {
        id: id.to_string(),
        values: Vec::with_capacity(values.0.len()),
    };
    for (value, name) in &values.0 {
        let value = parse_big_integer(value).ok_or_else(|| {
            ParseError::new(format!("invalid enum value {:?} in enum {}", value, id))
        })?;
        result.values.push(EnumValue {
            value,
            id: name.clone(),
        });
    }
    Ok(result)
}

fn parse_big_integer(s: &str) -> Option<BigInt> {
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let digits: String = s.chars().filter(|&c| c != '_').collect();
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        BigInt::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        BigInt::from_str_radix(bin, 2)
    } else if let Some(oct) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        BigInt::from_str_radix(oct, 8)
    } else {
        BigInt::from_str_radix(&digits, 10)
    };
    parsed.ok().map(|v| if negative { -v } else { v })
}

fn translate_attr(spec: &AttributeSpec, instance: bool) -> Result<Attr, ParseError> {
    let in_attr = |e: crate::error::ExprParseError, what: &str| {
        ParseError::new(format!("in {} of attr {:?}: {}", what, spec.id, e))
    };
    Ok(Attr {
        id: spec.id.clone(),
        doc: spec.doc.clone(),
        doc_ref: spec.doc_ref.0.clone(),
        contents: spec.contents.as_ref().map(|c| c.0.clone()),
        ty: parse_attr_type(spec, instance)?,
        repeat: translate_repeat(spec)?,
        if_expr: parse_expr_opt(&spec.r#if).map_err(|e| in_attr(e, "if"))?,
        enum_name: spec.r#enum.clone(),
        process: parse_expr_opt(&spec.process).map_err(|e| in_attr(e, "process"))?,
        pos: parse_expr_opt(&spec.pos).map_err(|e| in_attr(e, "pos"))?,
        io: parse_expr_opt(&spec.io).map_err(|e| in_attr(e, "io"))?,
        value: parse_expr_opt(&spec.value).map_err(|e| in_attr(e, "value"))?,
    })
}

fn translate_repeat(spec: &AttributeSpec) -> Result<Repeat, ParseError> {
    match spec.repeat.as_str() {
        "" => Ok(Repeat::None),
        "eos" => Ok(Repeat::Eos),
        "expr" => {
            let expr = parse_expr(&spec.repeat_expr).map_err(|e| {
                ParseError::new(format!("in repeat-expr of attr {:?}: {}", spec.id, e))
            })?;
            Ok(Repeat::Expr(expr))
        }
        "until" => {
            let expr = parse_expr(&spec.repeat_until).map_err(|e| {
                ParseError::new(format!("in repeat-until of attr {:?}: {}", spec.id, e))
            })?;
            Ok(Repeat::Until(expr))
        }
        other => Err(ParseError::new(format!(
            "invalid repeat spec {:?} on attr {:?}",
            other, spec.id
        ))),
    }
}

/// Build the attribute's `Type` from the spec entry, applying the surface
/// translations: default type `bytes`, `contents` size synthesis, `strz`
/// terminator, and the byte/string sentinel keys.
fn parse_attr_type(spec: &AttributeSpec, instance: bool) -> Result<Type, ParseError> {
    if !spec.r#type.value.is_empty() && !spec.r#type.switch_on.is_empty() {
        return Err(ParseError::new(format!(
            "attr {:?} specifies both a type and a switch",
            spec.id
        )));
    }

    if !spec.r#type.switch_on.is_empty() {
        let switch_on = parse_expr(&spec.r#type.switch_on).map_err(|e| {
            ParseError::new(format!("in switch-on of attr {:?}: {}", spec.id, e))
        })?;
        let mut cases = Vec::with_capacity(spec.r#type.cases.len());
        for (key, value) in &spec.r#type.cases {
            parse_expr(key)
                .map_err(|e| ParseError::new(format!("in case {:?}: {}", key, e)))?;
            cases.push((key.clone(), types::parse_type_ref(value)?));
        }
        return Ok(Type::Switch(TypeSwitch {
            field_name: spec.id.clone(),
            switch_on,
            cases,
        }));
    }

    // Default to bytes when no type is given.
    let type_name = if spec.r#type.value.is_empty() {
        "bytes"
    } else {
        &spec.r#type.value
    };
    let mut ty = types::parse_type_ref(type_name)?;

    if !spec.size.is_empty() && !instance {
        let size = parse_expr(&spec.size)
            .map_err(|e| ParseError::new(format!("in size of attr {:?}: {}", spec.id, e)))?;
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().size = Some(size),
            Kind::Str => ty.string.as_mut().unwrap().size = Some(size),
            Kind::User => ty.user.as_mut().unwrap().size = Some(size),
            other => {
                return Err(ParseError::new(format!(
                    "size on type {} not supported",
                    other.name()
                )));
            }
        }
    }

    if let Some(contents) = &spec.contents {
        let size = types::literal_size_expr(contents.0.len());
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().size = Some(size),
            Kind::Str => ty.string.as_mut().unwrap().size = Some(size),
            other => {
                return Err(ParseError::new(format!(
                    "contents on type {} not supported",
                    other.name()
                )));
            }
        }
    }

    if spec.size_eos {
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().size_eos = true,
            Kind::Str => ty.string.as_mut().unwrap().size_eos = true,
            other => {
                tracing::warn!(
                    attr = %spec.id,
                    "size-eos on type {} does not do anything",
                    other.name()
                );
            }
        }
    }

    if !spec.encoding.is_empty() {
        match ty.kind() {
            Kind::Str => ty.string.as_mut().unwrap().encoding = spec.encoding.clone(),
            other => {
                return Err(ParseError::new(format!(
                    "encoding on type {} not supported",
                    other.name()
                )));
            }
        }
    }

    if let Some(terminator) = spec.terminator {
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().terminator = terminator,
            Kind::Str => ty.string.as_mut().unwrap().terminator = terminator,
            other => {
                return Err(ParseError::new(format!(
                    "terminator on type {} not supported",
                    other.name()
                )));
            }
        }
    }
    if let Some(consume) = spec.consume {
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().consume = consume,
            Kind::Str => ty.string.as_mut().unwrap().consume = consume,
            other => {
                return Err(ParseError::new(format!(
                    "consume on type {} not supported",
                    other.name()
                )));
            }
        }
    }
    if let Some(include) = spec.include {
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().include = include,
            Kind::Str => ty.string.as_mut().unwrap().include = include,
            other => {
                return Err(ParseError::new(format!(
                    "include on type {} not supported",
                    other.name()
                )));
            }
        }
    }
    if let Some(eos_error) = spec.eos_error {
        match ty.kind() {
            Kind::Bytes => ty.bytes.as_mut().unwrap().eos_error = eos_error,
            Kind::Str => ty.string.as_mut().unwrap().eos_error = eos_error,
            other => {
                return Err(ParseError::new(format!(
                    "eos-error on type {} not supported",
                    other.name()
                )));
            }
        }
    }

    Ok(Type::Ref(ty))
}

// ========== Reverse translation (AST → spec) ==========

/// Translate a schema back into the document shape. Together with
/// `spec_to_schema` this gives the YAML round-trip: parse, serialize,
/// reparse yields an equal AST.
pub fn schema_to_spec(s: &Struct) -> TypeSpec {
    let mut spec = type_spec_body(s);
    spec.meta.id = s.id.clone();
    spec
}

fn type_spec_body(s: &Struct) -> TypeSpec {
    TypeSpec {
        meta: MetaSpec {
            id: String::new(),
            title: String::new(),
            license: String::new(),
            imports: s.meta.imports.clone(),
            encoding: s.meta.encoding.clone(),
            endian: endian_to_spec(&s.meta.endian),
            bit_endian: match s.meta.bit_endian.kind {
                BitEndianKind::Unspecified => String::new(),
                BitEndianKind::Little => "le".into(),
                BitEndianKind::Big => "be".into(),
            },
        },
        params: s.params.iter().map(param_to_spec).collect(),
        seq: s.seq.iter().map(|a| attr_to_spec(a, false)).collect(),
        types: OrderedMap(
            s.structs
                .iter()
                .map(|sub| (sub.id.clone(), type_spec_body(sub)))
                .collect(),
        ),
        enums: OrderedMap(
            s.enums
                .iter()
                .map(|e| {
                    (
                        e.id.clone(),
                        EnumValuesSpec(
                            e.values
                                .iter()
                                .map(|v| (v.value.to_string(), v.id.clone()))
                                .collect(),
                        ),
                    )
                })
                .collect(),
        ),
        instances: OrderedMap(
            s.instances
                .iter()
                .map(|a| {
                    let mut spec = attr_to_spec(a, true);
                    let id = std::mem::take(&mut spec.id);
                    (id, spec)
                })
                .collect(),
        ),
        doc: s.doc.clone(),
        doc_ref: MultiString(vec![]),
    }
}

fn endian_to_spec(endian: &Endian) -> EndianSpec {
    match endian.kind {
        EndianKind::Unspecified => EndianSpec::default(),
        EndianKind::Little => EndianSpec {
            value: "le".into(),
            ..Default::default()
        },
        EndianKind::Big => EndianSpec {
            value: "be".into(),
            ..Default::default()
        },
        EndianKind::Switch => EndianSpec {
            value: String::new(),
            switch_on: endian
                .switch_on
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
            cases: endian
                .cases
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        EndianKind::Big => "be",
                        _ => "le",
                    };
                    (k.clone(), v.to_string())
                })
                .collect(),
        },
    }
}

fn param_to_spec(p: &Param) -> ParamSpec {
    ParamSpec {
        id: p.id.clone(),
        r#type: type_ref_to_string(&p.ty),
        doc: p.doc.clone(),
        r#enum: p.enum_name.clone(),
    }
}

fn opt_expr_string(e: &Option<Expr>) -> String {
    e.as_ref().map(|e| e.to_string()).unwrap_or_default()
}

fn attr_to_spec(a: &Attr, instance: bool) -> AttributeSpec {
    let mut spec = AttributeSpec {
        id: a.id.clone(),
        doc: a.doc.clone(),
        doc_ref: MultiString(a.doc_ref.clone()),
        contents: a.contents.as_ref().map(|c| ByteSpec(c.clone())),
        r#if: opt_expr_string(&a.if_expr),
        process: opt_expr_string(&a.process),
        r#enum: a.enum_name.clone(),
        pos: opt_expr_string(&a.pos),
        io: opt_expr_string(&a.io),
        value: opt_expr_string(&a.value),
        ..Default::default()
    };
    match &a.repeat {
        Repeat::None => {}
        Repeat::Eos => spec.repeat = "eos".into(),
        Repeat::Expr(e) => {
            spec.repeat = "expr".into();
            spec.repeat_expr = e.to_string();
        }
        Repeat::Until(e) => {
            spec.repeat = "until".into();
            spec.repeat_until = e.to_string();
        }
    }
    match &a.ty {
        Type::Switch(ts) => {
            spec.r#type = AttrTypeSpec {
                value: String::new(),
                switch_on: ts.switch_on.to_string(),
                cases: ts
                    .cases
                    .iter()
                    .map(|(k, v)| (k.clone(), type_ref_to_string(v)))
                    .collect(),
            };
        }
        Type::Ref(ty) => {
            spec.r#type = AttrTypeSpec {
                value: type_ref_to_string(ty),
                ..Default::default()
            };
            // The size synthesized from a contents literal is not a
            // surface key.
            let emit_size = a.contents.is_none() && !instance;
            match ty.kind() {
                Kind::Bytes => {
                    let b = ty.bytes.as_ref().unwrap();
                    if emit_size {
                        spec.size = opt_expr_string(&b.size);
                    }
                    spec.size_eos = b.size_eos;
                    if b.terminator >= 0 {
                        spec.terminator = Some(b.terminator);
                    }
                    if !b.consume {
                        spec.consume = Some(false);
                    }
                    if b.include {
                        spec.include = Some(true);
                    }
                    if !b.eos_error {
                        spec.eos_error = Some(false);
                    }
                }
                Kind::Str => {
                    let s = ty.string.as_ref().unwrap();
                    if emit_size {
                        spec.size = opt_expr_string(&s.size);
                    }
                    spec.size_eos = s.size_eos;
                    spec.encoding = s.encoding.clone();
                    // strz already encodes terminator 0 in the type name.
                    if s.terminator > 0 {
                        spec.terminator = Some(s.terminator);
                    }
                    if !s.consume {
                        spec.consume = Some(false);
                    }
                    if s.include {
                        spec.include = Some(true);
                    }
                    if !s.eos_error {
                        spec.eos_error = Some(false);
                    }
                }
                Kind::User => {
                    if emit_size {
                        spec.size = opt_expr_string(&ty.user.as_ref().unwrap().size);
                    }
                }
                _ => {}
            }
        }
    }
    spec
}

/// Render a TypeRef back to its surface type string.
pub fn type_ref_to_string(ty: &TypeRef) -> String {
    match ty.kind() {
        Kind::Bits => {
            let bits = ty.bits.as_ref().unwrap();
            let suffix = match bits.endian.kind {
                BitEndianKind::Unspecified => "",
                BitEndianKind::Little => "le",
                BitEndianKind::Big => "be",
            };
            format!("b{}{}", bits.width, suffix)
        }
        Kind::Str => {
            if ty.string.as_ref().map_or(false, |s| s.terminator == 0) {
                "strz".to_string()
            } else {
                "str".to_string()
            }
        }
        Kind::User => {
            let user = ty.user.as_ref().unwrap();
            if user.args.is_empty() {
                user.name.clone()
            } else {
                let args: Vec<String> = user.args.iter().map(|a| a.to_string()).collect();
                format!("{}({})", user.name, args.join(", "))
            }
        }
        kind => kind.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Struct {
        parse_schema(src.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_trivial_magic() {
        let s = parse("meta:\n  id: m\nseq:\n  - id: magic\n    contents: [0x7f, \"ELF\"]\n");
        assert_eq!(s.id, "m");
        let attr = &s.seq[0];
        assert_eq!(attr.contents.as_deref(), Some(&[0x7f, b'E', b'L', b'F'][..]));
        // contents implies a synthesized size on the defaulted bytes type
        let bytes = attr.ty.as_ref().unwrap().bytes.as_ref().unwrap();
        assert_eq!(bytes.size.as_ref().unwrap().to_string(), "4");
    }

    #[test]
    fn test_default_type_is_bytes() {
        let s = parse("meta:\n  id: m\nseq:\n  - id: blob\n    size: 4\n");
        assert_eq!(s.seq[0].ty.as_ref().unwrap().kind(), Kind::Bytes);
    }

    #[test]
    fn test_strz_shorthand() {
        let s = parse("meta:\n  id: m\nseq:\n  - id: name\n    type: strz\n");
        let st = s.seq[0].ty.as_ref().unwrap().string.as_ref().unwrap();
        assert_eq!(st.terminator, 0);
    }

    #[test]
    fn test_endian_directives() {
        let s = parse("meta:\n  id: m\n  endian: be\n  bit-endian: le\n");
        assert_eq!(s.meta.endian.kind, EndianKind::Big);
        assert_eq!(s.meta.bit_endian.kind, BitEndianKind::Little);

        let err = parse_schema("meta:\n  id: m\n  endian: middle\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unrecognized endian"));
    }

    #[test]
    fn test_endian_switch() {
        let s = parse(
            "meta:\n  id: m\n  endian:\n    switch-on: _root.marker\n    cases:\n      '[0x49, 0x49]': le\n      '[0x4d, 0x4d]': be\n",
        );
        assert_eq!(s.meta.endian.kind, EndianKind::Switch);
        assert_eq!(s.meta.endian.cases.len(), 2);
        assert_eq!(s.meta.endian.cases[1].1, EndianKind::Big);

        let err = parse_schema(
            "meta:\n  id: m\n  endian:\n    switch-on: x\n    cases:\n      '1': middle\n"
                .as_bytes(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown endian"));
    }

    #[test]
    fn test_type_switch_declaration_order() {
        let s = parse(
            "meta:\n  id: m\nseq:\n  - id: kind\n    type: u1\n  - id: body\n    type:\n      switch-on: kind\n      cases:\n        2: beta\n        1: alpha\n",
        );
        let ts = s.seq[1].ty.as_switch().unwrap();
        assert_eq!(ts.field_name, "body");
        assert_eq!(ts.cases[0].0, "2");
        assert_eq!(ts.cases[1].0, "1");
        assert_eq!(ts.cases[0].1.user.as_ref().unwrap().name, "beta");
    }

    #[test]
    fn test_repeat_forms() {
        let s = parse(
            "meta:\n  id: m\nseq:\n  - id: n\n    type: u1\n  - id: xs\n    type: u2le\n    repeat: expr\n    repeat-expr: n\n  - id: ys\n    type: u1\n    repeat: eos\n",
        );
        assert!(matches!(s.seq[1].repeat, Repeat::Expr(_)));
        assert!(matches!(s.seq[2].repeat, Repeat::Eos));
        assert!(
            parse_schema("meta:\n  id: m\nseq:\n  - id: x\n    type: u1\n    repeat: forever\n".as_bytes())
                .is_err()
        );
    }

    #[test]
    fn test_bad_embedded_expression_is_parse_error() {
        let err = parse_schema(
            "meta:\n  id: m\nseq:\n  - id: x\n    type: u1\n    if: '1 +'\n".as_bytes(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("if"));
    }

    #[test]
    fn test_instances_and_params() {
        let s = parse(
            "meta:\n  id: m\nparams:\n  - id: len\n    type: u4\ninstances:\n  checksum:\n    value: len * 2\n",
        );
        assert_eq!(s.params[0].id, "len");
        assert_eq!(s.instances[0].id, "checksum");
        assert!(s.instances[0].is_computed());
    }

    #[test]
    fn test_enum_values_bigint() {
        let s = parse(
            "meta:\n  id: m\nenums:\n  kind:\n    1: a\n    0x10: b\n    '0x10000000000000000000': big\n",
        );
        let e = &s.enums[0];
        assert_eq!(e.values[1].value, BigInt::from(16));
        assert!(e.values[2].value > BigInt::from(u128::MAX));
    }

    #[test]
    fn test_roundtrip_through_yaml() {
        let src = "meta:\n  id: demo\n  endian: le\nseq:\n  - id: magic\n    contents: [0x41, 0x42]\n  - id: count\n    type: u2\n  - id: names\n    type: strz\n    encoding: UTF-8\n    repeat: expr\n    repeat-expr: count\n  - id: body\n    type:\n      switch-on: count\n      cases:\n        1: sub\n        2: u4\ntypes:\n  sub:\n    seq:\n      - id: inner\n        type: u1\nenums:\n  kind:\n    1: a\n    2: b\n";
        let first = parse(src);
        let spec = schema_to_spec(&first);
        let text = serde_yaml::to_string(&spec).unwrap();
        let second = parse(&text);
        assert_eq!(first, second);
    }

    #[test]
    fn test_type_ref_to_string_forms() {
        assert_eq!(type_ref_to_string(&types::parse_type_ref("u4le").unwrap()), "u4le");
        assert_eq!(type_ref_to_string(&types::parse_type_ref("b12be").unwrap()), "b12be");
        assert_eq!(type_ref_to_string(&types::parse_type_ref("strz").unwrap()), "strz");
        assert_eq!(
            type_ref_to_string(&types::parse_type_ref("chunk(1, 2)").unwrap()),
            "chunk(1, 2)"
        );
    }
}
