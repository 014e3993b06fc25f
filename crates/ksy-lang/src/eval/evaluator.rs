// Stream-directed schema walker: consumes bytes, produces the annotation
// log

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::engine::{
    evaluate, infer, Context, EvalScope, InstanceId, TypeArena, TypeId, TypeKind, Value,
    ValueStore,
};
use crate::error::{Error, EvalError, EvalErrorKind};
use crate::expr::{parse_expr, Expr, Node};
use crate::resolve::Resolver;
use crate::schema::{Attr, Repeat, Struct};
use crate::types::{BitEndianKind, Endian, EndianKind, Kind, Type, TypeRef};

use super::annotation::{join_path, Annotation, PathItem, Range};
use super::stream::{decode_str, Stream, Whence};

/// Walks a loaded schema against a byte stream. One evaluator performs one
/// run; annotations are taken out by `evaluate`.
pub struct Evaluator<'r, 'd> {
    resolver: &'r Resolver,
    arena: TypeArena,
    global: FxHashMap<String, TypeId>,
    imports: FxHashMap<String, TypeId>,
    store: ValueStore,
    stream: Stream<'d>,
    annotations: Vec<Annotation>,
    path: Vec<PathItem>,
    endian: EndianKind,
    bit_endian: BitEndianKind,
    default_encoding: String,
    module_type: Option<TypeId>,
    module_value: Option<InstanceId>,
}

impl<'r, 'd> Evaluator<'r, 'd> {
    pub fn new(resolver: &'r Resolver, data: &'d [u8]) -> Self {
        Self {
            resolver,
            arena: TypeArena::new(),
            global: FxHashMap::default(),
            imports: FxHashMap::default(),
            store: ValueStore::new(),
            stream: Stream::new(data),
            annotations: Vec::new(),
            path: Vec::new(),
            endian: EndianKind::Unspecified,
            bit_endian: BitEndianKind::Unspecified,
            default_encoding: String::new(),
            module_type: None,
            module_value: None,
        }
    }

    /// Evaluate the root schema against the stream. `input_name` is the
    /// logical name imports are resolved relative to.
    pub fn evaluate(
        &mut self,
        input_name: &str,
        schema: &Struct,
    ) -> Result<Vec<Annotation>, Error> {
        self.register_imports(input_name, schema, true)?;
        let root_type = self.arena.build_struct(schema, None);
        self.global.insert(schema.id.clone(), root_type);
        self.module_type = Some(root_type);
        self.default_encoding = schema.meta.encoding.clone();

        let root_value = self.store.alloc(root_type, None);
        self.module_value = Some(root_value);
        self.read_struct(root_type, root_value)
            .map_err(Error::Eval)?;
        Ok(std::mem::take(&mut self.annotations))
    }

    /// Final position of the stream after a run, for callers that care how
    /// much input was consumed.
    pub fn stream_pos(&self) -> u64 {
        self.stream.pos()
    }

    fn register_imports(
        &mut self,
        from: &str,
        schema: &Struct,
        direct: bool,
    ) -> Result<(), Error> {
        for name in &schema.meta.imports {
            let (canonical, imported) = self.resolver.resolve(from, name)?;
            if !self.global.contains_key(&imported.id) {
                let type_id = self.arena.build_struct(&imported, None);
                self.global.insert(imported.id.clone(), type_id);
                if direct {
                    self.imports.insert(imported.id.clone(), type_id);
                }
                self.register_imports(&canonical, &imported, false)?;
            }
        }
        Ok(())
    }

    // ========== Expression plumbing ==========

    fn eval_expr(
        &mut self,
        expr: &Expr,
        local_t: TypeId,
        local_v: InstanceId,
        tmp: Option<Value>,
    ) -> Result<Value, EvalError> {
        let module_t = self.module_type.expect("module root registered");
        let ctx = Context::new(&self.arena, &self.global, &self.imports)
            .with_module_root(module_t)
            .with_local_root(local_t);
        let mut scope = EvalScope {
            ctx,
            store: &self.store,
            module_value: self.module_value,
            local_value: Some(local_v),
            tmp,
            stream: Some(&mut self.stream),
        };
        evaluate(&mut scope, expr)
    }

    fn static_ctx(&self, local_t: TypeId) -> Context<'_> {
        let mut ctx = Context::new(&self.arena, &self.global, &self.imports)
            .with_local_root(local_t);
        if let Some(module_t) = self.module_type {
            ctx = ctx.with_module_root(module_t);
        }
        ctx
    }

    // ========== Struct walking ==========

    fn read_struct(&mut self, type_id: TypeId, instance: InstanceId) -> Result<(), EvalError> {
        let def = match &self.arena.node(type_id).kind {
            TypeKind::Struct(s) => std::rc::Rc::clone(&s.def),
            _ => return Err(EvalError::type_mismatch("read_struct on non-struct type")),
        };
        let saved = (self.endian, self.bit_endian);
        let result = self.read_struct_body(&def, type_id, instance);
        self.endian = saved.0;
        self.bit_endian = saved.1;
        result
    }

    fn read_struct_body(
        &mut self,
        def: &Struct,
        type_id: TypeId,
        instance: InstanceId,
    ) -> Result<(), EvalError> {
        if def.meta.bit_endian.kind != BitEndianKind::Unspecified {
            self.bit_endian = def.meta.bit_endian.kind;
        }
        self.apply_endian(&def.meta.endian, type_id, instance)?;
        for attr in &def.seq {
            // An endian switch whose discriminant is an earlier attribute
            // becomes decidable mid-struct; retry while undecided.
            if self.endian == EndianKind::Unspecified
                && def.meta.endian.kind == EndianKind::Switch
            {
                self.apply_endian(&def.meta.endian, type_id, instance)?;
            }
            self.path.push(PathItem::named(&attr.id));
            let result = self
                .read_attr(attr, type_id, instance)
                .map_err(|e| e.with_path(join_path(&self.path)));
            self.path.pop();
            result?;
        }
        Ok(())
    }

    /// Fold the struct's endian directive into the ambient endian. A switch
    /// whose discriminant does not resolve yet leaves the ambient endian
    /// untouched.
    fn apply_endian(
        &mut self,
        endian: &Endian,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<(), EvalError> {
        match endian.kind {
            EndianKind::Little => self.endian = EndianKind::Little,
            EndianKind::Big => self.endian = EndianKind::Big,
            EndianKind::Unspecified => {}
            EndianKind::Switch => {
                let switch_on = endian
                    .switch_on
                    .as_ref()
                    .ok_or_else(|| EvalError::type_mismatch("endian switch without switch-on"))?;
                let switch_val = match self.eval_expr(switch_on, local_t, local_v, None) {
                    Ok(v) => v,
                    Err(e) if e.kind == EvalErrorKind::Name => return Ok(()),
                    Err(e) => return Err(e),
                };
                for (key, kind) in &endian.cases {
                    let key_expr = parse_expr(key).map_err(|e| {
                        EvalError::type_mismatch(format!("bad endian case {:?}: {}", key, e))
                    })?;
                    let key_val = self.eval_expr(&key_expr, local_t, local_v, None)?;
                    if crate::engine::value::values_equal(&switch_val, &key_val)? {
                        self.endian = *kind;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    // ========== Attribute reading ==========

    fn read_attr(
        &mut self,
        attr: &Attr,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<(), EvalError> {
        if let Some(cond) = &attr.if_expr {
            let value = self.eval_expr(cond, local_t, local_v, None)?;
            let keep = value.as_bool().map_err(|_| {
                EvalError::type_mismatch(format!(
                    "if on {:?} is {}, not boolean",
                    attr.id,
                    value.kind_name()
                ))
            })?;
            // Skip the attribute when the guard is false.
            if !keep {
                return Ok(());
            }
        }

        if attr.process.is_some() {
            tracing::warn!(attr = %attr.id, "process is reserved and not applied");
        }

        // Computed attribute: no stream read, no annotation.
        if let Some(value) = &attr.value {
            let computed = self.eval_expr(value, local_t, local_v, None)?;
            self.store.bind(local_v, &attr.id, computed);
            return Ok(());
        }

        let folded = attr
            .ty
            .fold_endian(self.endian)
            .fold_bit_endian(self.bit_endian);

        match &folded {
            Type::Switch(ts) => self.read_type_switch(attr, ts, local_t, local_v),
            Type::Ref(tr) => match &attr.repeat {
                Repeat::None => {
                    let value = self.read_one(attr, tr, None, local_t, local_v)?;
                    self.store.bind(local_v, &attr.id, value);
                    Ok(())
                }
                Repeat::Eos => {
                    let mut items = Vec::new();
                    while !self.stream.eof() {
                        let value =
                            self.read_one(attr, tr, Some(items.len() as u64), local_t, local_v)?;
                        items.push(value);
                    }
                    self.store.bind(local_v, &attr.id, Value::Array(items));
                    Ok(())
                }
                Repeat::Expr(count_expr) => {
                    let count = self.eval_expr(count_expr, local_t, local_v, None)?;
                    let count = match &count {
                        Value::Int(_) => count.as_u64()?,
                        other => {
                            return Err(EvalError::type_mismatch(format!(
                                "repeat-expr is {}, not integer",
                                other.kind_name()
                            )))
                        }
                    };
                    let mut items = Vec::with_capacity(count as usize);
                    for i in 0..count {
                        let value = self.read_one(attr, tr, Some(i), local_t, local_v)?;
                        items.push(value);
                    }
                    self.store.bind(local_v, &attr.id, Value::Array(items));
                    Ok(())
                }
                Repeat::Until(pred) => {
                    // At least one element is always read.
                    let mut items = Vec::new();
                    loop {
                        let value =
                            self.read_one(attr, tr, Some(items.len() as u64), local_t, local_v)?;
                        let done =
                            self.eval_expr(pred, local_t, local_v, Some(value.clone()))?;
                        items.push(value);
                        let done = done.as_bool().map_err(|_| {
                            EvalError::type_mismatch(format!(
                                "repeat-until on {:?} is {}, not boolean",
                                attr.id,
                                done.kind_name()
                            ))
                        })?;
                        if done {
                            break;
                        }
                    }
                    self.store.bind(local_v, &attr.id, Value::Array(items));
                    Ok(())
                }
            },
        }
    }

    fn read_type_switch(
        &mut self,
        attr: &Attr,
        ts: &crate::types::TypeSwitch,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<(), EvalError> {
        let switch_val = self.eval_expr(&ts.switch_on, local_t, local_v, None)?;
        let fallback_enum = self.switch_enum_name(ts, local_t);
        for (key, case_ty) in &ts.cases {
            let key_expr = parse_expr(key).map_err(|e| {
                EvalError::type_mismatch(format!("bad case key {:?}: {}", key, e))
            })?;
            let key_val = match self.eval_expr(&key_expr, local_t, local_v, None) {
                Ok(v) => v,
                // A bare identifier retries inside the enum named by the
                // switch-on attribute.
                Err(e) if e.kind == EvalErrorKind::Name => {
                    match (&key_expr.root, &fallback_enum) {
                        (Node::Ident(ident), Some(enum_name)) => {
                            self.enum_constant(enum_name, ident, local_t).ok_or(e)?
                        }
                        _ => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };
            if crate::engine::value::values_equal(&switch_val, &key_val)? {
                let folded = case_ty
                    .fold_endian(self.endian)
                    .fold_bit_endian(self.bit_endian);
                let value = self.read_one(attr, &folded, None, local_t, local_v)?;
                self.store.bind(local_v, &attr.id, value);
                return Ok(());
            }
        }
        // No case matched: the attribute is skipped.
        Ok(())
    }

    /// The enum name of the attribute a switch discriminant refers to, for
    /// resolving bare enum-value case keys.
    fn switch_enum_name(&self, ts: &crate::types::TypeSwitch, local_t: TypeId) -> Option<String> {
        let name = match &ts.switch_on.root {
            Node::Ident(name) => name,
            _ => return None,
        };
        let member = self.arena.member(local_t, name)?;
        match &self.arena.node(member).kind {
            TypeKind::Attr { def } | TypeKind::Instance { def } if !def.enum_name.is_empty() => {
                Some(def.enum_name.clone())
            }
            _ => None,
        }
    }

    fn enum_constant(&self, enum_name: &str, value_name: &str, local_t: TypeId) -> Option<Value> {
        let ctx = self.static_ctx(local_t);
        let (enum_type, _) = ctx.resolve_type(enum_name)?;
        let value_id = self.arena.child(enum_type, value_name)?;
        self.arena.node(value_id).constant.clone()
    }

    // ========== Single reads ==========

    fn read_one(
        &mut self,
        attr: &Attr,
        tr: &TypeRef,
        index: Option<u64>,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<Value, EvalError> {
        if let Some(item) = self.path.last_mut() {
            item.index = index;
        }
        let start = self.stream.abs_pos();
        let (value, annotated) = match tr.kind() {
            Kind::U2 | Kind::U4 | Kind::U8 | Kind::S2 | Kind::S4 | Kind::S8 | Kind::F4
            | Kind::F8 => {
                return Err(EvalError::undecided_endian(format!(
                    "attribute {:?} has kind {} and no ambient endianness",
                    attr.id,
                    tr.kind().name()
                ))
                .with_offset(start));
            }
            Kind::UntypedInt | Kind::UntypedFloat | Kind::UntypedBool => {
                return Err(EvalError::type_mismatch(format!(
                    "cannot read untyped kind {}",
                    tr.kind().name()
                )));
            }
            Kind::U1 => (Value::Int(BigInt::from(self.stream.read_u1()?)), true),
            Kind::U2le => (Value::Int(BigInt::from(self.stream.read_u2le()?)), true),
            Kind::U2be => (Value::Int(BigInt::from(self.stream.read_u2be()?)), true),
            Kind::U4le => (Value::Int(BigInt::from(self.stream.read_u4le()?)), true),
            Kind::U4be => (Value::Int(BigInt::from(self.stream.read_u4be()?)), true),
            Kind::U8le => (Value::Int(BigInt::from(self.stream.read_u8le()?)), true),
            Kind::U8be => (Value::Int(BigInt::from(self.stream.read_u8be()?)), true),
            Kind::S1 => (Value::Int(BigInt::from(self.stream.read_s1()?)), true),
            Kind::S2le => (Value::Int(BigInt::from(self.stream.read_s2le()?)), true),
            Kind::S2be => (Value::Int(BigInt::from(self.stream.read_s2be()?)), true),
            Kind::S4le => (Value::Int(BigInt::from(self.stream.read_s4le()?)), true),
            Kind::S4be => (Value::Int(BigInt::from(self.stream.read_s4be()?)), true),
            Kind::S8le => (Value::Int(BigInt::from(self.stream.read_s8le()?)), true),
            Kind::S8be => (Value::Int(BigInt::from(self.stream.read_s8be()?)), true),
            Kind::F4le => (Value::Float(f64::from(self.stream.read_f4le()?)), true),
            Kind::F4be => (Value::Float(f64::from(self.stream.read_f4be()?)), true),
            Kind::F8le => (Value::Float(self.stream.read_f8le()?), true),
            Kind::F8be => (Value::Float(self.stream.read_f8be()?), true),
            Kind::Bits => {
                let bits = tr
                    .bits
                    .as_ref()
                    .ok_or_else(|| EvalError::type_mismatch("bits type without width"))?;
                let raw = match bits.endian.kind {
                    BitEndianKind::Little => self.stream.read_bits_int_le(bits.width)?,
                    // Big bit order is the default when unspecified.
                    _ => self.stream.read_bits_int_be(bits.width)?,
                };
                let value = if bits.width == 1 {
                    Value::Bool(raw != 0)
                } else {
                    Value::Int(BigInt::from(raw))
                };
                (value, true)
            }
            Kind::Bytes => {
                let raw = self.read_bytes_payload(tr, local_t, local_v)?;
                self.check_contents(attr, &raw, start)?;
                (Value::Bytes(raw), true)
            }
            Kind::Str => {
                let (raw, encoding) = self.read_string_payload(tr, local_t, local_v)?;
                self.check_contents(attr, &raw, start)?;
                (Value::Str(decode_str(&raw, &encoding)?), true)
            }
            Kind::User => {
                let value = self.read_user(tr, local_t, local_v)?;
                (value, false)
            }
        };
        let end = self.stream.abs_pos();
        self.annotations.push(Annotation {
            range: Range { start, end },
            path: join_path(&self.path),
            value: if annotated { Some(value.clone()) } else { None },
        });
        Ok(value)
    }

    fn check_contents(
        &self,
        attr: &Attr,
        actual: &[u8],
        offset: u64,
    ) -> Result<(), EvalError> {
        if let Some(expected) = &attr.contents {
            if actual != expected.as_slice() {
                return Err(EvalError::validation(expected, actual, offset));
            }
        }
        Ok(())
    }

    fn read_bytes_payload(
        &mut self,
        tr: &TypeRef,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<Vec<u8>, EvalError> {
        let spec = tr
            .bytes
            .as_ref()
            .ok_or_else(|| EvalError::type_mismatch("bytes type without payload"))?;
        if let Some(size) = &spec.size {
            let n = self.eval_size(size, local_t, local_v)?;
            self.stream.read_bytes(n)
        } else if spec.size_eos {
            self.stream.read_bytes_full()
        } else if spec.terminator >= 0 {
            self.stream.read_bytes_term(
                spec.terminator as u8,
                spec.include,
                spec.consume,
                spec.eos_error,
            )
        } else {
            Err(EvalError::type_mismatch(
                "bytes attribute needs size, size-eos, or terminator",
            ))
        }
    }

    fn read_string_payload(
        &mut self,
        tr: &TypeRef,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<(Vec<u8>, String), EvalError> {
        let spec = tr
            .string
            .as_ref()
            .ok_or_else(|| EvalError::type_mismatch("string type without payload"))?;
        let encoding = if !spec.encoding.is_empty() {
            spec.encoding.clone()
        } else {
            self.default_encoding.clone()
        };
        let raw = if spec.size_eos {
            self.stream.read_bytes_full()?
        } else if let Some(size) = &spec.size {
            let n = self.eval_size(size, local_t, local_v)?;
            if spec.terminator < 0 {
                self.stream.read_bytes(n)?
            } else {
                self.stream.read_bytes_pad_term(
                    n,
                    spec.terminator as u8,
                    spec.terminator as u8,
                    spec.include,
                )?
            }
        } else if spec.terminator >= 0 {
            self.stream.read_bytes_term(
                spec.terminator as u8,
                spec.include,
                spec.consume,
                spec.eos_error,
            )?
        } else {
            return Err(EvalError::type_mismatch(
                "string attribute needs size, size-eos, or terminator",
            ));
        };
        Ok((raw, encoding))
    }

    fn eval_size(
        &mut self,
        size: &Expr,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<u64, EvalError> {
        let value = self.eval_expr(size, local_t, local_v, None)?;
        match &value {
            Value::Int(_) => value.as_u64(),
            other => Err(EvalError::type_mismatch(format!(
                "size is {}, not integer",
                other.kind_name()
            ))),
        }
    }

    fn read_user(
        &mut self,
        tr: &TypeRef,
        local_t: TypeId,
        local_v: InstanceId,
    ) -> Result<Value, EvalError> {
        let user = tr
            .user
            .as_ref()
            .ok_or_else(|| EvalError::type_mismatch("user type without payload"))?;
        let name_expr = parse_expr(&user.name).map_err(|e| {
            EvalError::name(format!("bad user type name {:?}: {}", user.name, e))
        })?;
        let target = {
            let ctx = self.static_ctx(local_t);
            let result = infer::result_type_of_expr(&ctx, &name_expr);
            let id = result
                .type_id
                .ok_or_else(|| EvalError::name(format!("unresolved type: {}", user.name)))?;
            if self.arena.node(id).as_struct().is_none() {
                return Err(EvalError::type_mismatch(format!(
                    "type {:?} did not resolve to a struct",
                    user.name
                )));
            }
            id
        };

        // Positional arguments bind to the target's params before its seq
        // is read.
        let mut args = Vec::with_capacity(user.args.len());
        for arg in &user.args {
            args.push(self.eval_expr(arg, local_t, local_v, None)?);
        }
        let param_names: Vec<String> = {
            let def = &self.arena.node(target).as_struct().unwrap().def;
            def.params.iter().map(|p| p.id.clone()).collect()
        };
        if args.len() > param_names.len() {
            return Err(EvalError::type_mismatch(format!(
                "type {:?} takes {} parameters, got {}",
                user.name,
                param_names.len(),
                args.len()
            )));
        }

        let child = self.store.alloc(target, Some(local_v));
        for (name, value) in param_names.iter().zip(args) {
            self.store.bind(child, name, value);
        }

        if let Some(size) = &user.size {
            let n = self.eval_size(size, local_t, local_v)?;
            let offset = self.stream.abs_pos();
            let sub = self.stream.sub_stream(offset, n)?;
            self.stream.seek(n as i64, Whence::Current)?;
            // The sub-stream substitution is undone on every exit path.
            let saved = std::mem::replace(&mut self.stream, sub);
            let result = self.read_struct(target, child);
            self.stream = saved;
            result?;
        } else {
            self.read_struct(target, child)?;
        }
        Ok(Value::Struct(child))
    }
}
