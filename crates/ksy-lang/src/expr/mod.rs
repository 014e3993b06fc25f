// Expression language: AST and parser

mod parser;

pub use parser::parse as parse_expr;
pub use parser::parse_opt as parse_expr_opt;

use num_bigint::BigInt;
use std::fmt;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub root: Node,
}

impl Expr {
    /// Parse an expression from source text.
    pub fn parse(src: &str) -> Result<Expr, crate::error::ExprParseError> {
        parser::parse(src)
    }
}

/// Binary operators, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LogicalAnd => "and",
            BinaryOp::LogicalOr => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    LogicalNot,
}

/// A node in the expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Ident(String),
    Str(String),
    Int(BigInt),
    Float(f64),
    Bool(bool),
    /// Array literal: `[a, b, c]`.
    List(Vec<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// `cond ? then : otherwise`
    Ternary {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    /// Scope access: `a::b`. The right side is always a plain name.
    Scope {
        operand: Box<Node>,
        name: String,
    },
    /// Member access: `a.b`.
    Member {
        operand: Box<Node>,
        property: String,
    },
    /// Subscript: `a[b]`.
    Subscript {
        operand: Box<Node>,
        index: Box<Node>,
    },
}

// The printed form is fully parenthesized so that reparsing it yields an
// identical AST (pretty-print/reparse round-trip).
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Ident(name) => write!(f, "{}", name),
            Node::Str(s) => write!(f, "{}", quote_string(s)),
            Node::Int(i) => write!(f, "{}", i),
            Node::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    // Keep the dot so the reparse stays a float literal.
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Node::Bool(true) => write!(f, "true"),
            Node::Bool(false) => write!(f, "false"),
            Node::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Node::Unary {
                op: UnaryOp::LogicalNot,
                operand,
            } => write!(f, "not ({})", operand),
            Node::Binary { op, lhs, rhs } => {
                write!(f, "({}) {} ({})", lhs, op.symbol(), rhs)
            }
            Node::Ternary {
                cond,
                then,
                otherwise,
            } => write!(f, "({}) ? ({}) : ({})", cond, then, otherwise),
            Node::Scope { operand, name } => write!(f, "{}::{}", operand, name),
            Node::Member { operand, property } => write!(f, "{}.{}", operand, property),
            Node::Subscript { operand, index } => write!(f, "{}[{}]", operand, index),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &str) {
        let first = Expr::parse(src).unwrap();
        let printed = first.to_string();
        let second = Expr::parse(&printed)
            .unwrap_or_else(|e| panic!("reparse of {:?} failed: {}", printed, e));
        assert_eq!(first, second, "print/reparse mismatch for {:?}", src);
    }

    #[test]
    fn test_print_reparse_arithmetic() {
        roundtrip("1 + 2 * 3");
        roundtrip("(1 + 2) * 3");
        roundtrip("a % b - c / d");
    }

    #[test]
    fn test_print_reparse_postfix_chains() {
        roundtrip("_root.header.entries[2].size");
        roundtrip("file_kind::archive");
        roundtrip("a.b::c");
    }

    #[test]
    fn test_print_reparse_logic_and_ternary() {
        roundtrip("a and b or not (c)");
        roundtrip("flag == 1 ? x : y + 1");
    }

    #[test]
    fn test_print_reparse_literals() {
        roundtrip("0xff_ec");
        roundtrip("3.5");
        roundtrip("2.0");
        roundtrip("\"he\\\"llo\\n\"");
        roundtrip("[0x49, 0x49]");
        roundtrip("true != false");
    }

    #[test]
    fn test_float_display_keeps_dot() {
        let e = Expr::parse("2.0").unwrap();
        assert_eq!(e.to_string(), "2.0");
        assert!(matches!(e.root, Node::Float(_)));
    }
}
