// Dynamic expression evaluation against runtime values and a stream

use num_bigint::BigInt;

use crate::error::EvalError;
use crate::expr::{BinaryOp, Expr, Node, UnaryOp};

use super::builtin::{self, BuiltinMethod, Receiver};
use super::value::{
    int_div, int_mod, shift_amount, values_equal, values_ordering, InstanceId, Value,
};
use super::{infer, Context, ValueStore};

/// The stream queries the expression language can make through `_io`.
pub trait StreamInfo {
    fn eof(&mut self) -> Result<bool, EvalError>;
    fn pos(&self) -> u64;
    fn size(&self) -> u64;
}

/// Everything a dynamic evaluation can see: the type context, the instance
/// store, the intrinsic roots, the repeat-until temporary, and the stream.
pub struct EvalScope<'a> {
    pub ctx: Context<'a>,
    pub store: &'a ValueStore,
    pub module_value: Option<InstanceId>,
    pub local_value: Option<InstanceId>,
    pub tmp: Option<Value>,
    pub stream: Option<&'a mut dyn StreamInfo>,
}

impl<'a> EvalScope<'a> {
    fn stream_method(&mut self, method: BuiltinMethod) -> Result<Value, EvalError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| EvalError::type_mismatch("no stream in this context"))?;
        match method {
            BuiltinMethod::StreamEof => Ok(Value::Bool(stream.eof()?)),
            BuiltinMethod::StreamPos => Ok(Value::Int(BigInt::from(stream.pos()))),
            BuiltinMethod::StreamSize => Ok(Value::Int(BigInt::from(stream.size()))),
            _ => Err(EvalError::type_mismatch("not a stream method")),
        }
    }
}

/// Evaluate an expression to a concrete value.
pub fn evaluate(scope: &mut EvalScope, expr: &Expr) -> Result<Value, EvalError> {
    eval_node(scope, &expr.root)
}

fn eval_node(scope: &mut EvalScope, node: &Node) -> Result<Value, EvalError> {
    match node {
        Node::Ident(name) => resolve_value(scope, name),
        Node::Int(v) => Ok(Value::Int(v.clone())),
        Node::Float(v) => Ok(Value::Float(*v)),
        Node::Bool(v) => Ok(Value::Bool(*v)),
        Node::Str(s) => Ok(Value::Str(s.clone())),
        Node::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_node(scope, item)?);
            }
            Ok(Value::Array(values))
        }
        Node::Unary { op, operand } => {
            let value = eval_node(scope, operand)?;
            match op {
                UnaryOp::LogicalNot => match value {
                    Value::Bool(v) => Ok(Value::Bool(!v)),
                    other => Err(EvalError::type_mismatch(format!(
                        "not applied to {}",
                        other.kind_name()
                    ))),
                },
            }
        }
        Node::Binary { op, lhs, rhs } => eval_binary(scope, *op, lhs, rhs),
        Node::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let cond = eval_node(scope, cond)?;
            let cond = cond.as_bool().map_err(|_| {
                EvalError::type_mismatch(format!(
                    "ternary condition is {}, not boolean",
                    cond.kind_name()
                ))
            })?;
            // Only the selected branch is evaluated.
            if cond {
                eval_node(scope, then)
            } else {
                eval_node(scope, otherwise)
            }
        }
        Node::Scope { operand, name } => {
            let op = infer::result_type_of(&scope.ctx, operand);
            let owner = op.type_id.ok_or_else(|| {
                EvalError::name(format!("unresolved scope: {}", operand))
            })?;
            let child = scope.ctx.arena.child(owner, name).ok_or_else(|| {
                EvalError::name(format!("no {} in scope {}", name, operand))
            })?;
            match &scope.ctx.arena.node(child).constant {
                Some(constant) => Ok(constant.clone()),
                None => Err(EvalError::name(format!(
                    "{}::{} is not a value",
                    operand, name
                ))),
            }
        }
        Node::Member { operand, property } => {
            let value = eval_node(scope, operand)?;
            eval_member(scope, value, property)
        }
        Node::Subscript { operand, index } => {
            let value = eval_node(scope, operand)?;
            let index_value = eval_node(scope, index)?;
            let items = match value {
                Value::Array(items) => items,
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "subscript on {}",
                        other.kind_name()
                    )))
                }
            };
            let idx = index_value.as_u64()? as usize;
            items.get(idx).cloned().ok_or_else(|| {
                EvalError::range(format!(
                    "index {} out of range for array of {}",
                    idx,
                    items.len()
                ))
            })
        }
    }
}

fn resolve_value(scope: &mut EvalScope, name: &str) -> Result<Value, EvalError> {
    // Intrinsic scope wins over everything.
    match name {
        "_root" => {
            return scope
                .module_value
                .map(Value::Struct)
                .ok_or_else(|| EvalError::name("_root outside a module"));
        }
        "_parent" => {
            return scope
                .local_value
                .map(Value::Struct)
                .ok_or_else(|| EvalError::name("_parent outside a struct"));
        }
        "_io" => return Ok(Value::Stream),
        "_" => {
            return scope
                .tmp
                .clone()
                .ok_or_else(|| EvalError::name("_ outside repeat-until"));
        }
        _ => {}
    }
    // Local scope: fields of the struct being walked, then one level up.
    if let Some(local) = scope.local_value {
        if let Some(value) = scope.store.field(local, name) {
            return Ok(value.clone());
        }
        if let Some(parent) = scope.store.get(local).parent {
            if let Some(value) = scope.store.field(parent, name) {
                return Ok(value.clone());
            }
        }
    }
    // Module scope: fields of the module root.
    if let Some(module) = scope.module_value {
        if let Some(value) = scope.store.field(module, name) {
            return Ok(value.clone());
        }
    }
    Err(EvalError::name(format!("unresolved identifier: {}", name)))
}

fn eval_member(scope: &mut EvalScope, value: Value, property: &str) -> Result<Value, EvalError> {
    match &value {
        Value::Struct(id) => scope
            .store
            .field(*id, property)
            .cloned()
            .ok_or_else(|| EvalError::name(format!("no member {:?}", property))),
        Value::Stream => {
            let method = builtin::lookup(Receiver::Stream, property)
                .ok_or_else(|| EvalError::name(format!("no stream method {:?}", property)))?;
            scope.stream_method(method)
        }
        other => {
            let receiver = Receiver::of_value(other)
                .ok_or_else(|| EvalError::name(format!("no member {:?}", property)))?;
            let method = builtin::lookup(receiver, property).ok_or_else(|| {
                EvalError::name(format!(
                    "no method {:?} on {}",
                    property,
                    other.kind_name()
                ))
            })?;
            // Bare member access invokes the method with no arguments.
            builtin::invoke(method, other, &[])
        }
    }
}

fn eval_binary(
    scope: &mut EvalScope,
    op: BinaryOp,
    lhs: &Node,
    rhs: &Node,
) -> Result<Value, EvalError> {
    // Both operands are always evaluated, including for `and`/`or`.
    let a = eval_node(scope, lhs)?;
    let b = eval_node(scope, rhs)?;
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            numeric_binop(op, a, b)
        }
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&a, &b)?)),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&a, &b)?)),
        BinaryOp::Lt => Ok(Value::Bool(values_ordering(&a, &b)? == std::cmp::Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(values_ordering(&a, &b)? != std::cmp::Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(values_ordering(&a, &b)? == std::cmp::Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(values_ordering(&a, &b)? != std::cmp::Ordering::Less)),
        BinaryOp::Shl | BinaryOp::Shr => {
            let x = a.as_int()?;
            let amount = shift_amount(b.as_int()?)?;
            let amount = usize::try_from(amount)
                .map_err(|_| EvalError::range(format!("shift amount {} too large", amount)))?;
            match op {
                BinaryOp::Shl => Ok(Value::Int(x.clone() << amount)),
                _ => Ok(Value::Int(x.clone() >> amount)),
            }
        }
        BinaryOp::BitAnd => Ok(Value::Int(a.as_int()? & b.as_int()?)),
        BinaryOp::BitOr => Ok(Value::Int(a.as_int()? | b.as_int()?)),
        BinaryOp::BitXor => Ok(Value::Int(a.as_int()? ^ b.as_int()?)),
        BinaryOp::LogicalAnd => Ok(Value::Bool(a.as_bool()? && b.as_bool()?)),
        BinaryOp::LogicalOr => Ok(Value::Bool(a.as_bool()? || b.as_bool()?)),
    }
}

fn numeric_binop(op: BinaryOp, a: Value, b: Value) -> Result<Value, EvalError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => int_div(x, y)?,
            BinaryOp::Mod => int_mod(x, y)?,
            _ => unreachable!(),
        })),
        (Value::Str(x), Value::Str(y)) if op == BinaryOp::Add => {
            Ok(Value::Str(format!("{}{}", x, y)))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let x = a.to_float_lossy()?;
            let y = b.to_float_lossy()?;
            match op {
                BinaryOp::Add => Ok(Value::Float(x + y)),
                BinaryOp::Sub => Ok(Value::Float(x - y)),
                BinaryOp::Mul => Ok(Value::Float(x * y)),
                BinaryOp::Div => Ok(Value::Float(x / y)),
                BinaryOp::Mod => Err(EvalError::type_mismatch("modulo on floats")),
                _ => unreachable!(),
            }
        }
        _ => Err(EvalError::type_mismatch(format!(
            "{} {} {}",
            a.kind_name(),
            op.symbol(),
            b.kind_name()
        ))),
    }
}
