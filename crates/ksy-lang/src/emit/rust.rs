// Rust source emitter: one artifact per schema, structs with read impls
// against the ksy-lang stream runtime

use num_traits::ToPrimitive;
use rustc_hash::FxHashSet;

use crate::error::EvalError;
use crate::expr::{BinaryOp, Expr, Node, UnaryOp};
use crate::resolve::Resolver;
use crate::schema::{Attr, Enum, Repeat, Struct};
use crate::types::{EndianKind, Kind, Type, TypeRef, TypeSwitch};

use super::{
    endian_variants, needs_multi_endian, read_op, type_name, type_switch_name, Artifact, Emitter,
    ReadOp,
};

/// Emits Rust modules that read conforming input through
/// `ksy_lang::eval::Stream`.
pub struct RustEmitter<'r> {
    resolver: Option<&'r Resolver>,
    endian: EndianKind,
    artifacts: Vec<Artifact>,
    emitted: FxHashSet<String>,
}

impl<'r> RustEmitter<'r> {
    pub fn new(resolver: Option<&'r Resolver>) -> Self {
        Self {
            resolver,
            endian: EndianKind::Unspecified,
            artifacts: Vec::new(),
            emitted: FxHashSet::default(),
        }
    }
}

impl Emitter for RustEmitter<'_> {
    fn emit(&mut self, input_name: &str, schema: &Struct) -> Result<Vec<Artifact>, EvalError> {
        self.root(input_name, schema)?;
        Ok(std::mem::take(&mut self.artifacts))
    }
}

/// One generated compilation unit under assembly.
#[derive(Default)]
struct Unit {
    enums: String,
    structs: String,
    impls: String,
}

impl<'r> RustEmitter<'r> {
    fn root(&mut self, input_name: &str, schema: &Struct) -> Result<(), EvalError> {
        if !self.emitted.insert(schema.id.clone()) {
            return Ok(());
        }
        // Imports become their own artifacts.
        for import in &schema.meta.imports {
            let resolver = self.resolver.ok_or_else(|| {
                EvalError::name(format!("schema imports {:?} but no resolver is set", import))
            })?;
            let (canonical, imported) = resolver
                .resolve(input_name, import)
                .map_err(|e| EvalError::name(e.to_string()))?;
            self.root(&canonical, &imported)?;
        }

        let saved = self.endian;
        if schema.meta.endian.kind != EndianKind::Unspecified {
            self.endian = schema.meta.endian.kind;
        }
        let mut unit = Unit::default();
        let scope = vec![schema];
        let result = self.struc(&mut unit, schema, "", &scope);
        self.endian = saved;
        result?;

        let mut body = String::new();
        body.push_str("// Generated by binspec. Do not edit!\n\n");
        body.push_str("#![allow(non_camel_case_types, dead_code, unused_variables)]\n\n");
        body.push_str("use ksy_lang::error::EvalError;\n");
        body.push_str("use ksy_lang::eval::{Stream, Whence};\n\n");
        body.push_str(&unit.enums);
        body.push_str(&unit.structs);
        body.push_str(&unit.impls);
        self.artifacts.push(Artifact {
            filename: format!("{}.rs", schema.id.to_lowercase()),
            body: body.into_bytes(),
        });
        Ok(())
    }

    fn struc(
        &mut self,
        unit: &mut Unit,
        s: &Struct,
        prefix: &str,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let name = format!("{}{}", prefix, type_name(&s.id));

        // A nested struct's own endian directive shadows the ambient
        // endian for everything inside it.
        let saved_endian = self.endian;
        if matches!(
            s.meta.endian.kind,
            EndianKind::Little | EndianKind::Big | EndianKind::Switch
        ) {
            self.endian = s.meta.endian.kind;
        }
        let result = self.struc_body(unit, s, &name, scope);
        self.endian = saved_endian;
        result
    }

    fn struc_body(
        &mut self,
        unit: &mut Unit,
        s: &Struct,
        name: &str,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        // Nested structs and enums first, with this struct as their name
        // prefix.
        let child_prefix = format!("{}_", name);
        for sub in &s.structs {
            let mut child_scope = scope.to_vec();
            child_scope.push(sub);
            self.struc(unit, sub, &child_prefix, &child_scope)?;
        }
        for e in &s.enums {
            self.enum_decl(unit, &child_prefix, e)?;
        }

        // Struct declaration: params then seq fields.
        push_doc(&mut unit.structs, &s.doc, 0);
        unit.structs.push_str(&format!("#[derive(Debug, Default)]\npub struct {} {{\n", name));
        for param in &s.params {
            push_doc(&mut unit.structs, &param.doc, 1);
            unit.structs.push_str(&format!(
                "    pub {}: {},\n",
                param.id,
                self.decl_type_ref(&param.ty, &Repeat::None, scope)?
            ));
        }
        for attr in &s.seq {
            if attr.value.is_some() {
                continue;
            }
            push_doc(&mut unit.structs, &attr.doc, 1);
            unit.structs.push_str(&format!(
                "    pub {}: {},\n",
                attr.id,
                self.decl_type(&attr.ty, &attr.repeat, &child_prefix, scope)?
            ));
        }
        unit.structs.push_str("}\n\n");

        // Read functions.
        if s.meta.endian.kind == EndianKind::Switch || needs_multi_endian(s) {
            if s.meta.endian.kind == EndianKind::Switch {
                self.endian_switch_dispatch(unit, name, s, scope)?;
            } else {
                self.read_fn(unit, name, s, EndianKind::Unspecified, &child_prefix, scope)?;
            }
            self.read_fn(unit, name, s, EndianKind::Little, &child_prefix, scope)?;
            self.read_fn(unit, name, s, EndianKind::Big, &child_prefix, scope)?;
        } else {
            self.read_fn(unit, name, s, EndianKind::Unspecified, &child_prefix, scope)?;
            self.endian_stubs(unit, name);
        }

        for attr in &s.seq {
            if let Type::Switch(ts) = &attr.ty {
                self.type_switch_decl(unit, &child_prefix, ts, scope)?;
                let variants = if s.meta.endian.kind == EndianKind::Switch {
                    // The dispatcher only ever calls the le/be variants.
                    vec![EndianKind::Little, EndianKind::Big]
                } else {
                    endian_variants(s)
                };
                for variant in variants {
                    self.type_switch_read(unit, name, &child_prefix, attr, ts, variant, scope)?;
                }
            }
        }
        Ok(())
    }

    fn enum_decl(&mut self, unit: &mut Unit, prefix: &str, e: &Enum) -> Result<(), EvalError> {
        let name = format!("{}{}", prefix, type_name(&e.id));
        unit.enums.push_str(&format!(
            "#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n#[repr(i64)]\npub enum {} {{\n",
            name
        ));
        for value in &e.values {
            let v = value.value.to_i64().ok_or_else(|| {
                EvalError::range(format!(
                    "enum value {} of {} does not fit i64",
                    value.value, e.id
                ))
            })?;
            unit.enums
                .push_str(&format!("    {} = {},\n", type_name(&value.id), v));
        }
        unit.enums.push_str("}\n\n");
        Ok(())
    }

    fn endian_suffix(endian: EndianKind) -> &'static str {
        match endian {
            EndianKind::Little => "_le",
            EndianKind::Big => "_be",
            _ => "",
        }
    }

    fn read_fn(
        &mut self,
        unit: &mut Unit,
        name: &str,
        s: &Struct,
        forced: EndianKind,
        child_prefix: &str,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let saved = self.endian;
        if forced != EndianKind::Unspecified {
            self.endian = forced;
        }
        let suffix = Self::endian_suffix(forced);
        let mut body = String::new();
        let mut result = Ok(true);
        for attr in &s.seq {
            result = self.read_attr(&mut body, attr, forced, child_prefix, scope);
            match result {
                Ok(true) => {}
                _ => break,
            }
        }
        self.endian = saved;
        let completed = result?;

        let tail = if completed { "        Ok(())\n" } else { "" };
        unit.impls.push_str(&format!(
            "impl {} {{\n    pub fn read{}(&mut self, io: &mut Stream) -> Result<(), EvalError> {{\n{}{}    }}\n}}\n\n",
            name, suffix, body, tail
        ));
        Ok(())
    }

    fn endian_stubs(&mut self, unit: &mut Unit, name: &str) {
        unit.impls.push_str(&format!(
            "impl {} {{\n    pub fn read_le(&mut self, io: &mut Stream) -> Result<(), EvalError> {{\n        self.read(io)\n    }}\n\n    pub fn read_be(&mut self, io: &mut Stream) -> Result<(), EvalError> {{\n        self.read(io)\n    }}\n}}\n\n",
            name
        ));
    }

    fn endian_switch_dispatch(
        &mut self,
        unit: &mut Unit,
        name: &str,
        s: &Struct,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let mut body = String::new();
        let translated = s
            .meta
            .endian
            .switch_on
            .as_ref()
            .map(|e| self.expr(e, scope))
            .transpose();
        match translated {
            Ok(Some(on)) => {
                body.push_str(&format!("        let on: i64 = {};\n", on));
                for (key, endian) in &s.meta.endian.cases {
                    let value = self.case_value(key, scope)?;
                    let call = match endian {
                        EndianKind::Big => "read_be",
                        _ => "read_le",
                    };
                    body.push_str(&format!(
                        "        if on == {} {{\n            return self.{}(io);\n        }}\n",
                        value, call
                    ));
                }
                body.push_str(
                    "        Err(EvalError::undecided_endian(\"no endian case matched\"))\n",
                );
            }
            // A discriminant the generated code cannot reach (it has no
            // `_root` pointer) leaves dispatch to the caller.
            _ => {
                body.push_str(
                    "        Err(EvalError::undecided_endian(\"call read_le or read_be\"))\n",
                );
            }
        }
        unit.impls.push_str(&format!(
            "impl {} {{\n    pub fn read(&mut self, io: &mut Stream) -> Result<(), EvalError> {{\n{}    }}\n}}\n\n",
            name, body
        ));
        Ok(())
    }

    // ========== Attribute reads ==========

    /// Emit the read of one attribute. Returns false when the function body
    /// was terminated early with an undecided-endianness return, matching
    /// the unspecified variant of a multi-endian struct.
    fn read_attr(
        &mut self,
        body: &mut String,
        attr: &Attr,
        forced: EndianKind,
        child_prefix: &str,
        scope: &[&Struct],
    ) -> Result<bool, EvalError> {
        if attr.value.is_some() {
            return Ok(true);
        }
        let folded = attr.ty.fold_endian(self.endian);
        if folded.has_dependent_endian() {
            body.push_str(&format!(
                "        return Err(EvalError::undecided_endian(\"attribute {}\"));\n",
                attr.id
            ));
            return Ok(false);
        }
        let mut lines = String::new();
        match &folded {
            Type::Switch(ts) => {
                let suffix = Self::endian_suffix(forced);
                lines.push_str(&format!(
                    "self.read_{}_cases{}(io)?;\n",
                    ts.field_name, suffix
                ));
            }
            Type::Ref(tr) if tr.kind() == Kind::User => {
                self.read_user_attr(&mut lines, attr, tr, forced, scope)?;
            }
            Type::Ref(tr) => {
                self.read_scalar_attr(&mut lines, attr, tr, scope)?;
            }
        }

        let indented = indent(&lines, 2);
        if let Some(cond) = &attr.if_expr {
            let cond = self.bool_expr(cond, scope)?;
            body.push_str(&format!(
                "        if {} {{\n{}        }}\n",
                cond,
                indent(&indented, 1)
            ));
        } else {
            body.push_str(&indented);
        }
        Ok(true)
    }

    fn read_scalar_attr(
        &mut self,
        lines: &mut String,
        attr: &Attr,
        tr: &TypeRef,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let call = self.read_call(tr, scope)?;
        // read_str_eos already decodes; every other string read yields raw
        // bytes that decode afterwards.
        let needs_decode =
            tr.kind() == Kind::Str && !tr.string.as_ref().map_or(false, |s| s.size_eos);
        let assign = |value: String| -> String {
            if needs_decode {
                let encoding = tr
                    .string
                    .as_ref()
                    .map(|s| s.encoding.as_str())
                    .filter(|e| !e.is_empty())
                    .unwrap_or("UTF-8");
                format!("ksy_lang::eval::decode_str(&{}, \"{}\")?", value, encoding)
            } else {
                value
            }
        };
        match &attr.repeat {
            Repeat::None => {
                lines.push_str(&format!("let tmp = {};\n", call));
                if let Some(contents) = &attr.contents {
                    lines.push_str(&format!(
                        "if tmp.as_slice() != &{:?}[..] {{\n    return Err(EvalError::validation(&{:?}, &tmp, io.pos()));\n}}\n",
                        contents, contents
                    ));
                }
                lines.push_str(&format!("self.{} = {};\n", attr.id, assign("tmp".into())));
            }
            Repeat::Eos => {
                lines.push_str("while !io.eof() {\n");
                lines.push_str(&format!("    let tmp = {};\n", call));
                lines.push_str(&format!("    self.{}.push({});\n", attr.id, assign("tmp".into())));
                lines.push_str("}\n");
            }
            Repeat::Expr(count) => {
                let count = self.expr(count, scope)?;
                lines.push_str(&format!("for _ in 0..(({}) as u64) {{\n", count));
                lines.push_str(&format!("    let tmp = {};\n", call));
                lines.push_str(&format!("    self.{}.push({});\n", attr.id, assign("tmp".into())));
                lines.push_str("}\n");
            }
            Repeat::Until(pred) => {
                let pred = self.bool_expr_with_elem(pred, scope)?;
                lines.push_str("loop {\n");
                lines.push_str(&format!("    let tmp = {};\n", call));
                lines.push_str(&format!("    let elem = {};\n", assign("tmp".into())));
                lines.push_str(&format!("    let done = {};\n", pred));
                lines.push_str(&format!("    self.{}.push(elem);\n", attr.id));
                lines.push_str("    if done {\n        break;\n    }\n");
                lines.push_str("}\n");
            }
        }
        Ok(())
    }

    fn read_user_attr(
        &mut self,
        lines: &mut String,
        attr: &Attr,
        tr: &TypeRef,
        forced: EndianKind,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let user = tr.user.as_ref().unwrap();
        let decl = self.user_decl(&user.name, scope)?;
        let suffix = Self::endian_suffix(forced);
        let target = resolve_in_scope(scope, &user.name);
        let mut setup = String::new();
        if let Some(chain) = &target {
            let resolved = chain.last().unwrap();
            for (param, arg) in resolved.params.iter().zip(&user.args) {
                setup.push_str(&format!(
                    "    tmp.{} = ({}) as _;\n",
                    param.id,
                    self.expr(arg, scope)?
                ));
            }
        }
        let read_into = |lines: &mut String, indent_lvl: usize| -> Result<(), EvalError> {
            let pad = "    ".repeat(indent_lvl);
            if let Some(size) = &user.size {
                let size = self.expr(size, scope)?;
                lines.push_str(&format!("{}let n = ({}) as u64;\n", pad, size));
                lines.push_str(&format!(
                    "{}let mut sub = io.sub_stream(io.abs_pos(), n)?;\n",
                    pad
                ));
                lines.push_str(&format!("{}io.seek(n as i64, Whence::Current)?;\n", pad));
                lines.push_str(&format!("{}tmp.read{}(&mut sub)?;\n", pad, suffix));
            } else {
                lines.push_str(&format!("{}tmp.read{}(io)?;\n", pad, suffix));
            }
            Ok(())
        };
        match &attr.repeat {
            Repeat::None => {
                lines.push_str(&format!("let mut tmp = {}::default();\n", decl));
                lines.push_str(&setup);
                read_into(lines, 0)?;
                lines.push_str(&format!("self.{} = tmp;\n", attr.id));
            }
            Repeat::Eos => {
                lines.push_str("while !io.eof() {\n");
                lines.push_str(&format!("    let mut tmp = {}::default();\n", decl));
                lines.push_str(&setup);
                read_into(lines, 1)?;
                lines.push_str(&format!("    self.{}.push(tmp);\n", attr.id));
                lines.push_str("}\n");
            }
            Repeat::Expr(count) => {
                let count = self.expr(count, scope)?;
                lines.push_str(&format!("for _ in 0..(({}) as u64) {{\n", count));
                lines.push_str(&format!("    let mut tmp = {}::default();\n", decl));
                lines.push_str(&setup);
                read_into(lines, 1)?;
                lines.push_str(&format!("    self.{}.push(tmp);\n", attr.id));
                lines.push_str("}\n");
            }
            Repeat::Until(_) => {
                return Err(EvalError::type_mismatch(
                    "repeat-until on user types is not supported by the emitter",
                ));
            }
        }
        Ok(())
    }

    // ========== Type switches ==========

    fn type_switch_decl(
        &mut self,
        unit: &mut Unit,
        prefix: &str,
        ts: &TypeSwitch,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let name = format!("{}{}", prefix, type_switch_name(&ts.field_name));
        unit.enums.push_str(&format!("#[derive(Debug)]\npub enum {} {{\n    Unset,\n", name));
        for (key, case_ty) in &ts.cases {
            let tag = self.case_tag(key, scope)?;
            let decl = self.decl_type_ref(case_ty, &Repeat::None, scope)?;
            unit.enums.push_str(&format!("    {}({}),\n", tag, decl));
        }
        unit.enums.push_str("}\n\n");
        unit.enums.push_str(&format!(
            "impl Default for {} {{\n    fn default() -> Self {{\n        Self::Unset\n    }}\n}}\n\n",
            name
        ));
        Ok(())
    }

    fn type_switch_read(
        &mut self,
        unit: &mut Unit,
        parent: &str,
        prefix: &str,
        attr: &Attr,
        ts: &TypeSwitch,
        forced: EndianKind,
        scope: &[&Struct],
    ) -> Result<(), EvalError> {
        let saved = self.endian;
        if forced != EndianKind::Unspecified {
            self.endian = forced;
        }
        let result = (|| -> Result<String, EvalError> {
            let cases_name = format!("{}{}", prefix, type_switch_name(&ts.field_name));
            let suffix = Self::endian_suffix(forced);
            let mut body = String::new();
            body.push_str(&format!(
                "        let on: i64 = {};\n",
                self.expr(&ts.switch_on, scope)?
            ));
            for (key, case_ty) in &ts.cases {
                let value = self.case_value(key, scope)?;
                let tag = self.case_tag(key, scope)?;
                body.push_str(&format!("        if on == {} {{\n", value));
                match case_ty.kind() {
                    Kind::User => {
                        let decl = self.user_decl(&case_ty.user.as_ref().unwrap().name, scope)?;
                        body.push_str(&format!(
                            "            let mut tmp = {}::default();\n            tmp.read{}(io)?;\n",
                            decl, suffix
                        ));
                    }
                    _ => {
                        let folded = case_ty.fold_endian(self.endian);
                        if folded.has_dependent_endian() {
                            body.push_str(&format!(
                                "            return Err(EvalError::undecided_endian(\"case {}\"));\n        }}\n",
                                tag
                            ));
                            continue;
                        }
                        body.push_str(&format!(
                            "            let tmp = {};\n",
                            self.read_call(&folded, scope)?
                        ));
                    }
                }
                body.push_str(&format!(
                    "            self.{} = {}::{}(tmp);\n            return Ok(());\n        }}\n",
                    attr.id, cases_name, tag
                ));
            }
            body.push_str("        Ok(())\n");
            Ok(body)
        })();
        self.endian = saved;
        let body = result?;
        let suffix = Self::endian_suffix(forced);
        unit.impls.push_str(&format!(
            "impl {} {{\n    fn read_{}_cases{}(&mut self, io: &mut Stream) -> Result<(), EvalError> {{\n{}    }}\n}}\n\n",
            parent, ts.field_name, suffix, body
        ));
        Ok(())
    }

    /// An i64 expression for a case key: numeric literal or enum value.
    fn case_value(&self, key: &str, scope: &[&Struct]) -> Result<String, EvalError> {
        let expr = crate::expr::parse_expr(key)
            .map_err(|e| EvalError::type_mismatch(format!("bad case key {:?}: {}", key, e)))?;
        match &expr.root {
            Node::Int(v) => Ok(v.to_string()),
            Node::Scope { operand, name } => {
                let enum_name = match operand.as_ref() {
                    Node::Ident(id) => id.clone(),
                    other => {
                        return Err(EvalError::type_mismatch(format!(
                            "unsupported case key {}",
                            other
                        )))
                    }
                };
                let (owner_prefix, e) = self
                    .resolve_enum_in_scope(scope, &enum_name)
                    .ok_or_else(|| EvalError::name(format!("unresolved enum {:?}", enum_name)))?;
                Ok(format!(
                    "{}{}::{} as i64",
                    owner_prefix,
                    type_name(&e.id),
                    type_name(name)
                ))
            }
            other => Err(EvalError::type_mismatch(format!(
                "unsupported case key {}",
                other
            ))),
        }
    }

    /// A variant tag for a case key: `C1` for integers, the value name for
    /// enum keys.
    fn case_tag(&self, key: &str, _scope: &[&Struct]) -> Result<String, EvalError> {
        let expr = crate::expr::parse_expr(key)
            .map_err(|e| EvalError::type_mismatch(format!("bad case key {:?}: {}", key, e)))?;
        match &expr.root {
            Node::Int(v) => Ok(format!("C{}", v.to_string().replace('-', "N"))),
            Node::Scope { name, .. } => Ok(type_name(name)),
            other => Err(EvalError::type_mismatch(format!(
                "unsupported case key {}",
                other
            ))),
        }
    }

    // ========== Declarations and read calls ==========

    fn decl_type(
        &self,
        ty: &Type,
        repeat: &Repeat,
        prefix: &str,
        scope: &[&Struct],
    ) -> Result<String, EvalError> {
        match ty {
            Type::Ref(tr) => self.decl_type_ref(tr, repeat, scope),
            Type::Switch(ts) => {
                let base = format!("{}{}", prefix, type_switch_name(&ts.field_name));
                Ok(wrap_repeat(base, repeat))
            }
        }
    }

    fn decl_type_ref(
        &self,
        tr: &TypeRef,
        repeat: &Repeat,
        scope: &[&Struct],
    ) -> Result<String, EvalError> {
        let base = match tr.kind() {
            Kind::U1 => "u8".to_string(),
            Kind::U2 | Kind::U2le | Kind::U2be => "u16".to_string(),
            Kind::U4 | Kind::U4le | Kind::U4be => "u32".to_string(),
            Kind::U8 | Kind::U8le | Kind::U8be => "u64".to_string(),
            Kind::S1 => "i8".to_string(),
            Kind::S2 | Kind::S2le | Kind::S2be => "i16".to_string(),
            Kind::S4 | Kind::S4le | Kind::S4be => "i32".to_string(),
            Kind::S8 | Kind::S8le | Kind::S8be => "i64".to_string(),
            Kind::F4 | Kind::F4le | Kind::F4be => "f32".to_string(),
            Kind::F8 | Kind::F8le | Kind::F8be => "f64".to_string(),
            Kind::Bits => {
                if tr.bits.as_ref().map_or(0, |b| b.width) == 1 {
                    "bool".to_string()
                } else {
                    "u64".to_string()
                }
            }
            Kind::Bytes => "Vec<u8>".to_string(),
            Kind::Str => "String".to_string(),
            Kind::User => self.user_decl(&tr.user.as_ref().unwrap().name, scope)?,
            other => {
                return Err(EvalError::type_mismatch(format!(
                    "cannot declare kind {}",
                    other.name()
                )));
            }
        };
        Ok(wrap_repeat(base, repeat))
    }

    /// Mangled name of a user type resolved through the scope chain.
    /// Nested types accumulate every enclosing struct's name.
    fn user_decl(&self, name: &str, scope: &[&Struct]) -> Result<String, EvalError> {
        for i in (0..scope.len()).rev() {
            if let Some(chain) = scope[i].resolve_struct(name) {
                let mut parts: Vec<String> =
                    scope[..=i].iter().map(|s| type_name(&s.id)).collect();
                parts.extend(chain[1..].iter().map(|s| type_name(&s.id)));
                return Ok(parts.join("_"));
            }
            if scope[i].id == name {
                let parts: Vec<String> =
                    scope[..=i].iter().map(|s| type_name(&s.id)).collect();
                return Ok(parts.join("_"));
            }
        }
        // Unresolved names are assumed imported top-level types.
        Ok(type_name(name))
    }

    /// Resolve an enum through the scope chain, returning the full mangled
    /// prefix of its owner so references match the declaration names.
    fn resolve_enum_in_scope<'s>(
        &self,
        scope: &[&'s Struct],
        name: &str,
    ) -> Option<(String, &'s Enum)> {
        for i in (0..scope.len()).rev() {
            if let Some((_, e)) = scope[i].resolve_enum(name) {
                let mut prefix = scope[..=i]
                    .iter()
                    .map(|s| type_name(&s.id))
                    .collect::<Vec<_>>()
                    .join("_");
                prefix.push('_');
                if let Some((qualifier, _)) = name.rsplit_once("::") {
                    for segment in qualifier.split("::") {
                        prefix.push_str(&type_name(segment));
                        prefix.push('_');
                    }
                }
                return Some((prefix, e));
            }
        }
        None
    }

    fn read_call(&self, tr: &TypeRef, scope: &[&Struct]) -> Result<String, EvalError> {
        let call = match read_op(tr)? {
            ReadOp::Scalar(method) => format!("io.{}()?", method),
            ReadOp::Bits { big_endian, width } => {
                let method = if big_endian {
                    "read_bits_int_be"
                } else {
                    "read_bits_int_le"
                };
                if tr.bits.as_ref().map_or(0, |b| b.width) == 1 {
                    format!("io.{}({})? != 0", method, width)
                } else {
                    format!("io.{}({})?", method, width)
                }
            }
            ReadOp::BytesSized(size) => {
                format!("io.read_bytes(({}) as u64)?", self.expr(size, scope)?)
            }
            ReadOp::BytesEos => "io.read_bytes_full()?".to_string(),
            ReadOp::BytesTerm {
                term,
                include,
                consume,
                eos_error,
            } => format!(
                "io.read_bytes_term({}, {}, {}, {})?",
                term, include, consume, eos_error
            ),
            ReadOp::BytesPadTerm {
                size,
                term,
                include,
            } => format!(
                "io.read_bytes_pad_term(({}) as u64, {}, {}, {})?",
                self.expr(size, scope)?,
                term,
                term,
                include
            ),
            ReadOp::StrEos { encoding } => {
                let label = if encoding.is_empty() { "UTF-8" } else { encoding };
                return Ok(format!("io.read_str_eos(\"{}\")?", label));
            }
        };
        Ok(call)
    }

    // ========== Expression translation ==========

    fn expr(&self, expr: &Expr, scope: &[&Struct]) -> Result<String, EvalError> {
        self.expr_node(&expr.root, scope)
    }

    /// Boolean-valued expression; comparisons and logical operators already
    /// print as Rust booleans.
    fn bool_expr(&self, expr: &Expr, scope: &[&Struct]) -> Result<String, EvalError> {
        self.expr_node(&expr.root, scope)
    }

    fn bool_expr_with_elem(&self, expr: &Expr, scope: &[&Struct]) -> Result<String, EvalError> {
        self.expr_node(&expr.root, scope)
    }

    fn expr_node(&self, node: &Node, scope: &[&Struct]) -> Result<String, EvalError> {
        match node {
            Node::Ident(name) => match name.as_str() {
                "_" => Ok("(elem as i64)".to_string()),
                "_io" => Ok("io".to_string()),
                "_root" | "_parent" => Err(EvalError::type_mismatch(format!(
                    "{} is not representable in generated code",
                    name
                ))),
                _ => Ok(format!("(self.{} as i64)", name)),
            },
            Node::Int(v) => Ok(format!("({})", v)),
            Node::Float(v) => Ok(format!("({}f64)", v)),
            Node::Bool(v) => Ok(format!("({})", v)),
            Node::Str(s) => Ok(format!("({:?})", s)),
            Node::List(_) => Err(EvalError::type_mismatch(
                "array literals are not representable in generated code",
            )),
            Node::Unary {
                op: UnaryOp::LogicalNot,
                operand,
            } => Ok(format!("(!{})", self.expr_node(operand, scope)?)),
            Node::Binary { op, lhs, rhs } => {
                let symbol = match op {
                    BinaryOp::LogicalAnd => "&&",
                    BinaryOp::LogicalOr => "||",
                    other => other.symbol(),
                };
                Ok(format!(
                    "({} {} {})",
                    self.expr_node(lhs, scope)?,
                    symbol,
                    self.expr_node(rhs, scope)?
                ))
            }
            Node::Ternary {
                cond,
                then,
                otherwise,
            } => Ok(format!(
                "(if {} {{ {} }} else {{ {} }})",
                self.expr_node(cond, scope)?,
                self.expr_node(then, scope)?,
                self.expr_node(otherwise, scope)?
            )),
            Node::Scope { operand, name } => {
                let enum_name = match operand.as_ref() {
                    Node::Ident(id) => id,
                    other => {
                        return Err(EvalError::type_mismatch(format!(
                            "unsupported scope operand {}",
                            other
                        )))
                    }
                };
                let (prefix, e) = self
                    .resolve_enum_in_scope(scope, enum_name)
                    .ok_or_else(|| EvalError::name(format!("unresolved enum {:?}", enum_name)))?;
                Ok(format!(
                    "({}{}::{} as i64)",
                    prefix,
                    type_name(&e.id),
                    type_name(name)
                ))
            }
            Node::Member { operand, property } => {
                if matches!(operand.as_ref(), Node::Ident(n) if n == "_io") {
                    return match property.as_str() {
                        "pos" => Ok("(io.pos() as i64)".to_string()),
                        "size" => Ok("(io.size() as i64)".to_string()),
                        "eof" => Ok("io.eof()".to_string()),
                        other => Err(EvalError::name(format!("no stream method {:?}", other))),
                    };
                }
                match property.as_str() {
                    "length" | "size" => Ok(format!(
                        "({}.len() as i64)",
                        self.member_operand(operand, scope)?
                    )),
                    "to_i" | "to_s" => self.expr_node(operand, scope),
                    _ => Ok(format!(
                        "({}.{} as i64)",
                        self.member_operand(operand, scope)?,
                        property
                    )),
                }
            }
            Node::Subscript { operand, index } => Ok(format!(
                "({}[({}) as usize] as i64)",
                self.member_operand(operand, scope)?,
                self.expr_node(index, scope)?
            )),
        }
    }

    /// An operand in member position: a bare field without the numeric
    /// cast.
    fn member_operand(&self, node: &Node, scope: &[&Struct]) -> Result<String, EvalError> {
        match node {
            Node::Ident(name) => Ok(format!("self.{}", name)),
            Node::Member { operand, property } => Ok(format!(
                "{}.{}",
                self.member_operand(operand, scope)?,
                property
            )),
            other => self.expr_node(other, scope),
        }
    }
}

fn push_doc(out: &mut String, doc: &str, levels: usize) {
    let pad = "    ".repeat(levels);
    for line in doc.lines() {
        out.push_str(&pad);
        out.push_str("/// ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

fn wrap_repeat(base: String, repeat: &Repeat) -> String {
    if repeat.is_none() {
        base
    } else {
        format!("Vec<{}>", base)
    }
}

fn indent(text: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    let mut out = String::new();
    for line in text.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&pad);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Resolve a user type name through the scope chain, innermost struct
/// first. Returns the chain from the owning struct down to the target.
fn resolve_in_scope<'s>(scope: &[&'s Struct], name: &str) -> Option<Vec<&'s Struct>> {
    for s in scope.iter().rev() {
        if let Some(chain) = s.resolve_struct(name) {
            return Some(chain);
        }
        if s.id == name {
            return Some(vec![s]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ksy::parse_schema;

    fn gen(src: &str) -> String {
        let schema = parse_schema(src.as_bytes()).unwrap();
        let mut emitter = RustEmitter::new(None);
        let artifacts = emitter.emit("", &schema).unwrap();
        assert_eq!(artifacts.len(), 1);
        String::from_utf8(artifacts[0].body.clone()).unwrap()
    }

    #[test]
    fn test_simple_struct() {
        let out = gen(
            "meta:\n  id: header\n  endian: le\nseq:\n  - id: magic\n    contents: [0x41]\n  - id: count\n    type: u2\n",
        );
        assert!(out.contains("pub struct Header {"));
        assert!(out.contains("pub count: u16,"));
        assert!(out.contains("io.read_u2le()?"));
        assert!(out.contains("EvalError::validation"));
        // Fixed-endian structs get one read plus stubs.
        assert!(out.contains("pub fn read(&mut self"));
        assert!(out.contains("pub fn read_le(&mut self"));
    }

    #[test]
    fn test_multi_endian_struct() {
        let out = gen("meta:\n  id: header\nseq:\n  - id: count\n    type: u2\n");
        assert!(out.contains("pub fn read(&mut self"));
        assert!(out.contains("pub fn read_le(&mut self"));
        assert!(out.contains("pub fn read_be(&mut self"));
        assert!(out.contains("io.read_u2le()?"));
        assert!(out.contains("io.read_u2be()?"));
    }

    #[test]
    fn test_nested_struct_prefix() {
        let out = gen(
            "meta:\n  id: outer\nseq:\n  - id: one\n    type: part\ntypes:\n  part:\n    seq:\n      - id: x\n        type: u1\n",
        );
        assert!(out.contains("pub struct Outer_Part {"));
        assert!(out.contains("pub one: Outer_Part,"));
        assert!(out.contains("let mut tmp = Outer_Part::default();"));
    }

    #[test]
    fn test_enum_and_type_switch() {
        let out = gen(
            "meta:\n  id: m\n  endian: le\nseq:\n  - id: kind\n    type: u1\n    enum: file_kind\n  - id: body\n    type:\n      switch-on: kind\n      cases:\n        'file_kind::a': u4\n        2: f4\nenums:\n  file_kind:\n    1: a\n    2: b\n",
        );
        assert!(out.contains("pub enum M_FileKind {"));
        assert!(out.contains("A = 1,"));
        assert!(out.contains("pub enum M_Body_Cases {"));
        assert!(out.contains("A(u32),"));
        assert!(out.contains("C2(f32),"));
        assert!(out.contains("(M_FileKind::A as i64)") || out.contains("M_FileKind::A as i64"));
        assert!(out.contains("fn read_body_cases(&mut self"));
    }

    #[test]
    fn test_repeat_expr_loop() {
        let out = gen(
            "meta:\n  id: m\n  endian: le\nseq:\n  - id: n\n    type: u1\n  - id: xs\n    type: u2\n    repeat: expr\n    repeat-expr: n\n",
        );
        assert!(out.contains("pub xs: Vec<u16>,"));
        assert!(out.contains("for _ in 0..(((self.n as i64)) as u64) {"));
    }

    #[test]
    fn test_if_guard() {
        let out = gen(
            "meta:\n  id: m\n  endian: le\nseq:\n  - id: flag\n    type: u1\n  - id: extra\n    type: u2\n    if: flag == 1\n",
        );
        assert!(out.contains("if ((self.flag as i64) == (1)) {"));
    }

    #[test]
    fn test_strz_decode() {
        let out = gen("meta:\n  id: m\nseq:\n  - id: name\n    type: strz\n");
        assert!(out.contains("io.read_bytes_term(0, false, true, true)?"));
        assert!(out.contains("decode_str"));
    }
}
