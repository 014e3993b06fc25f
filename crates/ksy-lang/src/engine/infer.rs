// Static expression typing: answers "what type, and what constant if any"
// without touching a stream

use num_bigint::BigInt;

use crate::expr::{BinaryOp, Expr, Node};
use crate::schema::Repeat;
use crate::types::Kind;

use super::builtin::{self, Receiver};
use super::value::Value;
use super::{Context, TypeId, TypeKind, ValueType};

/// Result of statically typing an expression: the nominal node it resolves
/// to (when it names one), the concrete value type (when it has one), and
/// the compile-time constant (literals and enum values).
#[derive(Debug, Clone, Default)]
pub struct StaticResult {
    pub type_id: Option<TypeId>,
    pub value_type: Option<ValueType>,
    pub constant: Option<Value>,
}

impl StaticResult {
    fn empty() -> Self {
        Self::default()
    }

    fn of_constant(value_type: ValueType, constant: Value) -> Self {
        Self {
            type_id: None,
            value_type: Some(value_type),
            constant: Some(constant),
        }
    }

    pub fn kind(&self) -> Option<Kind> {
        self.value_type.as_ref().and_then(ValueType::kind)
    }
}

pub fn result_type_of_expr(ctx: &Context, expr: &Expr) -> StaticResult {
    result_type_of(ctx, &expr.root)
}

pub fn result_type_of(ctx: &Context, node: &Node) -> StaticResult {
    match node {
        Node::Ident(name) => match ctx.resolve_type(name) {
            Some((id, _)) => of_type(ctx, id),
            None => StaticResult::empty(),
        },
        Node::Int(v) => {
            StaticResult::of_constant(ValueType::untyped_int(), Value::Int(v.clone()))
        }
        Node::Float(v) => {
            StaticResult::of_constant(ValueType::untyped_float(), Value::Float(*v))
        }
        Node::Bool(v) => StaticResult::of_constant(ValueType::untyped_bool(), Value::Bool(*v)),
        Node::Str(s) => StaticResult::of_constant(ValueType::string(), Value::Str(s.clone())),
        Node::List(_) => StaticResult {
            type_id: None,
            value_type: Some(ValueType::bytes()),
            constant: None,
        },
        Node::Unary { .. } => StaticResult {
            type_id: None,
            value_type: Some(ValueType::untyped_bool()),
            constant: None,
        },
        Node::Binary { op, lhs, rhs } => result_type_of_binary(ctx, *op, lhs, rhs),
        Node::Ternary { then, .. } => result_type_of(ctx, then),
        Node::Scope { operand, name } => {
            let op = result_type_of(ctx, operand);
            let Some(owner) = op.type_id else {
                return StaticResult::empty();
            };
            let Some(child) = ctx.arena.child(owner, name) else {
                return StaticResult::empty();
            };
            if let Some(constant) = &ctx.arena.node(child).constant {
                return StaticResult {
                    type_id: Some(child),
                    value_type: Some(ValueType::untyped_int()),
                    constant: Some(constant.clone()),
                };
            }
            of_type(ctx, child)
        }
        Node::Member { operand, property } => {
            let op = result_type_of(ctx, operand);
            // A member of a struct-typed operand is a value member; any
            // other receiver falls through to the built-in method table.
            if let Some(owner) = op.type_id.and_then(|id| struct_type_of(ctx, id)) {
                if let Some(member) = ctx.arena.member(owner, property) {
                    return of_type(ctx, member);
                }
            }
            if let Some(vt) = &op.value_type {
                let (receiver, elem) = if vt.repeat.is_none() {
                    (vt.kind().and_then(Receiver::of_kind), None)
                } else {
                    let mut elem = vt.clone();
                    elem.repeat = Repeat::None;
                    (Some(Receiver::Array), Some(elem))
                };
                if let Some(receiver) = receiver {
                    if let Some(method) = builtin::lookup(receiver, property) {
                        return StaticResult {
                            type_id: None,
                            value_type: Some(builtin::return_type(method, elem.as_ref())),
                            constant: None,
                        };
                    }
                }
            }
            StaticResult::empty()
        }
        Node::Subscript { operand, .. } => {
            let op = result_type_of(ctx, operand);
            match op.value_type {
                Some(mut vt) if !vt.repeat.is_none() => {
                    vt.repeat = Repeat::None;
                    StaticResult {
                        type_id: None,
                        value_type: Some(vt),
                        constant: None,
                    }
                }
                _ => StaticResult::empty(),
            }
        }
    }
}

fn result_type_of_binary(ctx: &Context, op: BinaryOp, lhs: &Node, rhs: &Node) -> StaticResult {
    match op {
        // Shifts keep the left operand's type.
        BinaryOp::Shl | BinaryOp::Shr => result_type_of(ctx, lhs),
        BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge
        | BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::LogicalAnd
        | BinaryOp::LogicalOr => StaticResult {
            type_id: None,
            value_type: Some(ValueType::untyped_bool()),
            constant: None,
        },
        _ => {
            let a = result_type_of(ctx, lhs);
            let b = result_type_of(ctx, rhs);
            let (Some(ka), Some(kb)) = (a.kind(), b.kind()) else {
                return a;
            };
            if !matches!(a.value_type.as_ref().map(|v| v.repeat.is_none()), Some(true))
                || !matches!(b.value_type.as_ref().map(|v| v.repeat.is_none()), Some(true))
            {
                return a;
            }
            StaticResult {
                type_id: None,
                value_type: Some(ValueType::scalar(ka.promote(kb))),
                constant: None,
            }
        }
    }
}

/// Resolve a nominal node to the struct type it denotes, following attrs,
/// params, and instances through their user-type names.
pub fn struct_type_of(ctx: &Context, id: TypeId) -> Option<TypeId> {
    match &ctx.arena.node(id).kind {
        TypeKind::Struct(_) => Some(id),
        TypeKind::Attr { def } | TypeKind::Instance { def } => {
            let user = def.ty.as_ref()?.user.as_ref()?;
            let (target, _) = ctx.resolve_type(&user.name)?;
            struct_type_of(ctx, target)
        }
        TypeKind::Param { def } => {
            let user = def.ty.user.as_ref()?;
            let (target, _) = ctx.resolve_type(&user.name)?;
            struct_type_of(ctx, target)
        }
        _ => None,
    }
}

fn of_type(ctx: &Context, id: TypeId) -> StaticResult {
    StaticResult {
        type_id: Some(id),
        value_type: ctx.arena.value_type(id),
        constant: ctx.arena.node(id).constant.clone(),
    }
}

/// Convenience for tests and emitters: the constant integer value of a
/// static result, if there is one.
pub fn constant_int(result: &StaticResult) -> Option<BigInt> {
    match &result.constant {
        Some(Value::Int(v)) => Some(v.clone()),
        _ => None,
    }
}
