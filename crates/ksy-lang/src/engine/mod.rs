// Expression engine: nominal types, resolution context, static and dynamic
// evaluation
//
// The nominal type tree is an arena with stable indices. Parent and child
// links are indices, so user-type name references can point anywhere in the
// arena without ownership cycles. Runtime struct values live in a separate
// instance store owned by whoever drives an evaluation.

pub mod builtin;
pub mod context;
pub mod eval;
pub mod infer;
pub mod value;

pub use context::{Context, Scope};
pub use eval::{evaluate, EvalScope, StreamInfo};
pub use infer::{result_type_of, StaticResult};
pub use value::{InstanceId, Value};

use std::rc::Rc;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::schema::{Attr, Enum, Param, Repeat, Struct};
use crate::types::{Kind, Type, TypeRef};

/// Index of a node in the nominal type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// A concrete value type: what an expression or member evaluates to,
/// including its repeat shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueType {
    pub ty: Type,
    pub repeat: Repeat,
}

impl ValueType {
    pub fn scalar(kind: Kind) -> Self {
        ValueType {
            ty: Type::Ref(TypeRef::of_kind(kind)),
            repeat: Repeat::None,
        }
    }

    pub fn untyped_int() -> Self {
        Self::scalar(Kind::UntypedInt)
    }

    pub fn untyped_float() -> Self {
        Self::scalar(Kind::UntypedFloat)
    }

    pub fn untyped_bool() -> Self {
        Self::scalar(Kind::UntypedBool)
    }

    pub fn bytes() -> Self {
        let mut t = TypeRef::of_kind(Kind::Bytes);
        t.bytes = Some(Default::default());
        ValueType {
            ty: Type::Ref(t),
            repeat: Repeat::None,
        }
    }

    pub fn string() -> Self {
        let mut t = TypeRef::of_kind(Kind::Str);
        t.string = Some(Default::default());
        ValueType {
            ty: Type::Ref(t),
            repeat: Repeat::None,
        }
    }

    /// The leaf kind, when this is a plain TypeRef.
    pub fn kind(&self) -> Option<Kind> {
        match &self.ty {
            Type::Ref(r) => r.kind,
            Type::Switch(_) => None,
        }
    }
}

/// Payload of a struct type node.
#[derive(Debug)]
pub struct StructType {
    pub def: Rc<Struct>,
    pub params: Vec<TypeId>,
    pub attrs: Vec<TypeId>,
    pub instances: Vec<TypeId>,
    /// Value members by name: params, seq attributes, instances.
    pub members: FxHashMap<String, TypeId>,
}

/// What a nominal node is.
#[derive(Debug)]
pub enum TypeKind {
    Root,
    Stream,
    Integer,
    Float,
    Boolean,
    Bytes,
    Str,
    Array { elem: TypeId },
    Struct(StructType),
    Enum { def: Rc<Enum> },
    EnumValue { value: BigInt },
    Param { def: Param },
    Attr { def: Attr },
    Instance { def: Attr },
}

/// One node of the nominal tree: its kind, its parent (for outward scope
/// walks), its named type children (nested types, enums, itself), and an
/// optional compile-time constant (enum values).
#[derive(Debug)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub parent: Option<TypeId>,
    pub children: FxHashMap<String, TypeId>,
    pub constant: Option<Value>,
}

impl TypeNode {
    fn new(kind: TypeKind, parent: Option<TypeId>) -> Self {
        Self {
            kind,
            parent,
            children: FxHashMap::default(),
            constant: None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match &self.kind {
            TypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }
}

/// Arena of nominal type nodes. The first few slots are singletons for the
/// built-in value kinds and the stream intrinsic.
#[derive(Debug)]
pub struct TypeArena {
    nodes: Vec<TypeNode>,
    pub stream_type: TypeId,
    pub integer_type: TypeId,
    pub float_type: TypeId,
    pub boolean_type: TypeId,
    pub bytes_type: TypeId,
    pub string_type: TypeId,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    pub fn new() -> Self {
        let mut arena = TypeArena {
            nodes: Vec::new(),
            stream_type: TypeId(0),
            integer_type: TypeId(0),
            float_type: TypeId(0),
            boolean_type: TypeId(0),
            bytes_type: TypeId(0),
            string_type: TypeId(0),
        };
        arena.stream_type = arena.alloc(TypeNode::new(TypeKind::Stream, None));
        arena.integer_type = arena.alloc(TypeNode::new(TypeKind::Integer, None));
        arena.float_type = arena.alloc(TypeNode::new(TypeKind::Float, None));
        arena.boolean_type = arena.alloc(TypeNode::new(TypeKind::Boolean, None));
        arena.bytes_type = arena.alloc(TypeNode::new(TypeKind::Bytes, None));
        arena.string_type = arena.alloc(TypeNode::new(TypeKind::Str, None));
        arena
    }

    fn alloc(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn child(&self, id: TypeId, name: &str) -> Option<TypeId> {
        self.node(id).children.get(name).copied()
    }

    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.node(id).parent
    }

    /// Value member of a struct type (param, seq attribute, or instance).
    pub fn member(&self, id: TypeId, name: &str) -> Option<TypeId> {
        self.node(id)
            .as_struct()
            .and_then(|s| s.members.get(name).copied())
    }

    pub fn alloc_array(&mut self, elem: TypeId) -> TypeId {
        self.alloc(TypeNode::new(TypeKind::Array { elem }, None))
    }

    /// Build the nominal tree for a struct definition. Registers enums,
    /// nested structs (recursively), params, seq attributes and instances;
    /// the struct's own name is a child of itself so self-references
    /// resolve.
    pub fn build_struct(&mut self, def: &Struct, parent: Option<TypeId>) -> TypeId {
        let rc = Rc::new(def.clone());
        self.build_struct_rc(rc, parent)
    }

    fn build_struct_rc(&mut self, def: Rc<Struct>, parent: Option<TypeId>) -> TypeId {
        let id = self.alloc(TypeNode::new(
            TypeKind::Struct(StructType {
                def: Rc::clone(&def),
                params: Vec::new(),
                attrs: Vec::new(),
                instances: Vec::new(),
                members: FxHashMap::default(),
            }),
            parent,
        ));

        for enum_def in &def.enums {
            let enum_id = self.build_enum(enum_def, id);
            self.nodes[id.0 as usize]
                .children
                .insert(enum_def.id.clone(), enum_id);
        }
        for sub in &def.structs {
            let sub_id = self.build_struct(sub, Some(id));
            self.nodes[id.0 as usize]
                .children
                .insert(sub.id.clone(), sub_id);
        }
        // Types can reference themselves.
        self.nodes[id.0 as usize]
            .children
            .insert(def.id.clone(), id);

        for param in &def.params {
            let param_id = self.alloc(TypeNode::new(
                TypeKind::Param { def: param.clone() },
                Some(id),
            ));
            self.add_member(id, &param.id, param_id, |s| s.params.push(param_id));
        }
        for attr in &def.seq {
            let attr_id = self.alloc(TypeNode::new(TypeKind::Attr { def: attr.clone() }, Some(id)));
            self.add_member(id, &attr.id, attr_id, |s| s.attrs.push(attr_id));
        }
        for instance in &def.instances {
            let inst_id = self.alloc(TypeNode::new(
                TypeKind::Instance {
                    def: instance.clone(),
                },
                Some(id),
            ));
            self.add_member(id, &instance.id, inst_id, |s| s.instances.push(inst_id));
        }
        id
    }

    fn add_member(
        &mut self,
        struct_id: TypeId,
        name: &str,
        member_id: TypeId,
        record: impl FnOnce(&mut StructType),
    ) {
        if let TypeKind::Struct(s) = &mut self.nodes[struct_id.0 as usize].kind {
            s.members.insert(name.to_string(), member_id);
            record(s);
        }
    }

    fn build_enum(&mut self, def: &Enum, parent: TypeId) -> TypeId {
        let id = self.alloc(TypeNode::new(
            TypeKind::Enum {
                def: Rc::new(def.clone()),
            },
            Some(parent),
        ));
        for value in &def.values {
            let mut node = TypeNode::new(
                TypeKind::EnumValue {
                    value: value.value.clone(),
                },
                Some(id),
            );
            node.constant = Some(Value::Int(value.value.clone()));
            let value_id = self.alloc(node);
            self.nodes[id.0 as usize]
                .children
                .insert(value.id.clone(), value_id);
        }
        id
    }

    /// The concrete value type a node represents, if it can be referred to
    /// as a value.
    pub fn value_type(&self, id: TypeId) -> Option<ValueType> {
        match &self.node(id).kind {
            TypeKind::Integer => Some(ValueType::untyped_int()),
            TypeKind::Float => Some(ValueType::untyped_float()),
            TypeKind::Boolean => Some(ValueType::untyped_bool()),
            TypeKind::Bytes => Some(ValueType::bytes()),
            TypeKind::Str => Some(ValueType::string()),
            TypeKind::Array { elem } => {
                let mut vt = self.value_type(*elem)?;
                vt.repeat = Repeat::Eos;
                Some(vt)
            }
            TypeKind::EnumValue { .. } => Some(ValueType::untyped_int()),
            TypeKind::Param { def } => Some(ValueType {
                ty: Type::Ref(def.ty.clone()),
                repeat: Repeat::None,
            }),
            TypeKind::Attr { def } | TypeKind::Instance { def } => Some(ValueType {
                ty: def.ty.clone(),
                repeat: def.repeat.clone(),
            }),
            _ => None,
        }
    }
}

/// A runtime struct value: its nominal type, its parent instance, and the
/// fields bound so far, in binding order.
#[derive(Debug)]
pub struct Instance {
    pub type_id: TypeId,
    pub parent: Option<InstanceId>,
    pub fields: FxHashMap<String, Value>,
}

/// Store of struct instances created during one evaluation. Instances are
/// append-only; a `Value::Struct` handle stays valid for the whole run.
#[derive(Debug, Default)]
pub struct ValueStore {
    instances: Vec<Instance>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, type_id: TypeId, parent: Option<InstanceId>) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(Instance {
            type_id,
            parent,
            fields: FxHashMap::default(),
        });
        id
    }

    pub fn get(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0 as usize]
    }

    pub fn bind(&mut self, id: InstanceId, name: &str, value: Value) {
        self.instances[id.0 as usize]
            .fields
            .insert(name.to_string(), value);
    }

    pub fn field(&self, id: InstanceId, name: &str) -> Option<&Value> {
        self.instances[id.0 as usize].fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ksy::parse_schema;

    fn sample() -> Struct {
        parse_schema(
            "meta:\n  id: demo\nseq:\n  - id: count\n    type: u2le\n  - id: body\n    type: sub\ntypes:\n  sub:\n    seq:\n      - id: inner\n        type: u1\nenums:\n  kind:\n    1: a\n    2: b\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_struct_children() {
        let mut arena = TypeArena::new();
        let root = arena.build_struct(&sample(), None);
        // Self-reference, nested struct, and enum resolve as type children.
        assert!(arena.child(root, "demo").is_some());
        let sub = arena.child(root, "sub").unwrap();
        assert!(matches!(arena.node(sub).kind, TypeKind::Struct(_)));
        assert_eq!(arena.parent(sub), Some(root));
        let kind = arena.child(root, "kind").unwrap();
        assert!(matches!(arena.node(kind).kind, TypeKind::Enum { .. }));
    }

    #[test]
    fn test_enum_value_constants() {
        let mut arena = TypeArena::new();
        let root = arena.build_struct(&sample(), None);
        let kind = arena.child(root, "kind").unwrap();
        let b = arena.child(kind, "b").unwrap();
        assert_eq!(arena.node(b).constant, Some(Value::Int(BigInt::from(2))));
    }

    #[test]
    fn test_members_and_value_types() {
        let mut arena = TypeArena::new();
        let root = arena.build_struct(&sample(), None);
        let count = arena.member(root, "count").unwrap();
        let vt = arena.value_type(count).unwrap();
        assert_eq!(vt.kind(), Some(Kind::U2le));
        assert!(arena.member(root, "absent").is_none());
    }

    #[test]
    fn test_value_store_binding() {
        let mut arena = TypeArena::new();
        let root = arena.build_struct(&sample(), None);
        let mut store = ValueStore::new();
        let inst = store.alloc(root, None);
        store.bind(inst, "count", Value::Int(BigInt::from(3)));
        assert_eq!(store.field(inst, "count"), Some(&Value::Int(BigInt::from(3))));
        assert_eq!(store.get(inst).parent, None);
    }
}
