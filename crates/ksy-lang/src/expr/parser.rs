// Recursive descent parser for the expression language
//
// Operates on a char slice with two characters of lookahead. Precedence,
// lowest to highest: ternary, `or`, `and`, comparison, additive
// (+ - | ^), multiplicative (* / % << >> &), postfix (:: . []), primary.
// `&` binds tighter than `|` to match the bit-masking idiom; shifts bind
// with multiplication.

use num_bigint::BigInt;
use num_traits::Num;

use crate::error::ExprParseError;

use super::{BinaryOp, Expr, Node, UnaryOp};

/// Parse an expression. Fails on empty input and on trailing garbage.
pub fn parse(src: &str) -> Result<Expr, ExprParseError> {
    let mut p = Parser::new(src);
    p.skip_whitespace();
    if p.at_end() {
        return Err(ExprParseError::new("empty expression", 0));
    }
    let root = p.parse_ternary()?;
    p.skip_whitespace();
    if !p.at_end() {
        return Err(ExprParseError::new(
            format!("unparsed expression text: {:?}", p.rest()),
            p.pos,
        ));
    }
    Ok(Expr { root })
}

/// Parse an optional expression: empty or whitespace-only input is `None`.
pub fn parse_opt(src: &str) -> Result<Option<Expr>, ExprParseError> {
    if src.trim().is_empty() {
        return Ok(None);
    }
    parse(src).map(Some)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    // ========== Char helpers ==========

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek2(&self) -> char {
        self.chars.get(self.pos + 1).copied().unwrap_or('\0')
    }

    fn next_char(&mut self) -> char {
        let c = self.peek();
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
        c
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.chars.len());
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), ' ' | '\t') {
            self.pos += 1;
        }
    }

    fn token(&mut self, test: fn(char) -> bool) -> String {
        let start = self.pos;
        while !self.at_end() && test(self.chars[self.pos]) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn fail(&self, message: impl Into<String>) -> ExprParseError {
        ExprParseError::new(message, self.pos)
    }

    fn expect(&mut self, c: char) -> Result<(), ExprParseError> {
        if self.peek() == c {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.fail(format!("expected {:?}, got {:?}", c, self.peek())))
        }
    }

    /// Consume a keyword if it is present at the cursor followed by a word
    /// boundary.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        let kw_chars: Vec<char> = kw.chars().collect();
        if self.chars[self.pos..].starts_with(&kw_chars) {
            let after = self.chars.get(self.pos + kw_chars.len()).copied();
            if after.map_or(true, |c| !is_ident(c)) {
                self.pos += kw_chars.len();
                return true;
            }
        }
        false
    }

    // ========== Grammar levels ==========

    fn parse_ternary(&mut self) -> Result<Node, ExprParseError> {
        let cond = self.parse_or()?;
        self.skip_whitespace();
        if self.peek() == '?' {
            self.next_char();
            let then = self.parse_ternary()?;
            self.skip_whitespace();
            self.expect(':')?;
            let otherwise = self.parse_ternary()?;
            return Ok(Node::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Node, ExprParseError> {
        let mut lhs = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if self.eat_keyword("or") {
                let rhs = self.parse_and()?;
                lhs = binary(BinaryOp::LogicalOr, lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Node, ExprParseError> {
        let mut lhs = self.parse_compare()?;
        loop {
            self.skip_whitespace();
            if self.eat_keyword("and") {
                let rhs = self.parse_compare()?;
                lhs = binary(BinaryOp::LogicalAnd, lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_compare(&mut self) -> Result<Node, ExprParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            self.skip_whitespace();
            let op = match (self.peek(), self.peek2()) {
                ('=', '=') => {
                    self.advance(2);
                    BinaryOp::Eq
                }
                ('!', '=') => {
                    self.advance(2);
                    BinaryOp::Ne
                }
                ('!', other) => {
                    return Err(self.fail(format!("expected '=' after '!', got {:?}", other)));
                }
                ('<', '=') => {
                    self.advance(2);
                    BinaryOp::Le
                }
                ('<', _) => {
                    self.advance(1);
                    BinaryOp::Lt
                }
                ('>', '=') => {
                    self.advance(2);
                    BinaryOp::Ge
                }
                ('>', _) => {
                    self.advance(1);
                    BinaryOp::Gt
                }
                _ => return Ok(lhs),
            };
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Result<Node, ExprParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                '+' => BinaryOp::Add,
                '-' => BinaryOp::Sub,
                '|' => BinaryOp::BitOr,
                '^' => BinaryOp::BitXor,
                _ => return Ok(lhs),
            };
            self.next_char();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ExprParseError> {
        let mut lhs = self.parse_postfix()?;
        loop {
            self.skip_whitespace();
            let op = match (self.peek(), self.peek2()) {
                ('*', _) => {
                    self.advance(1);
                    BinaryOp::Mul
                }
                ('/', _) => {
                    self.advance(1);
                    BinaryOp::Div
                }
                ('%', _) => {
                    self.advance(1);
                    BinaryOp::Mod
                }
                ('<', '<') => {
                    self.advance(2);
                    BinaryOp::Shl
                }
                ('>', '>') => {
                    self.advance(2);
                    BinaryOp::Shr
                }
                // A single '&' is bitwise-and; leave 'a' of `and` to the
                // keyword level.
                ('&', _) => {
                    self.advance(1);
                    BinaryOp::BitAnd
                }
                _ => return Ok(lhs),
            };
            let rhs = self.parse_postfix()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_postfix(&mut self) -> Result<Node, ExprParseError> {
        let mut node = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            match (self.peek(), self.peek2()) {
                (':', ':') => {
                    self.advance(2);
                    let name = self.token(is_ident);
                    if name.is_empty() {
                        return Err(self.fail("expected name after '::'"));
                    }
                    node = Node::Scope {
                        operand: Box::new(node),
                        name,
                    };
                }
                ('.', _) => {
                    self.advance(1);
                    let property = self.token(is_ident);
                    if property.is_empty() {
                        return Err(self.fail("expected member name after '.'"));
                    }
                    node = Node::Member {
                        operand: Box::new(node),
                        property,
                    };
                }
                ('[', _) => {
                    self.advance(1);
                    let index = self.parse_ternary()?;
                    self.skip_whitespace();
                    self.expect(']')?;
                    node = Node::Subscript {
                        operand: Box::new(node),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ExprParseError> {
        self.skip_whitespace();
        let c = self.peek();
        if is_ident_start(c) {
            if self.eat_keyword("not") {
                let operand = self.parse_postfix()?;
                return Ok(Node::Unary {
                    op: UnaryOp::LogicalNot,
                    operand: Box::new(operand),
                });
            }
            if self.eat_keyword("true") {
                return Ok(Node::Bool(true));
            }
            if self.eat_keyword("false") {
                return Ok(Node::Bool(false));
            }
            let name = self.token(is_ident);
            return Ok(Node::Ident(name));
        }
        if c.is_ascii_digit() {
            return self.parse_number();
        }
        if c == '"' || c == '\'' {
            return self.parse_string();
        }
        if c == '(' {
            self.next_char();
            let inner = self.parse_ternary()?;
            self.skip_whitespace();
            self.expect(')')?;
            return Ok(inner);
        }
        if c == '[' {
            return self.parse_list();
        }
        Err(self.fail(format!("unexpected character {:?}", c)))
    }

    fn parse_list(&mut self) -> Result<Node, ExprParseError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == ']' {
                self.next_char();
                return Ok(Node::List(items));
            }
            items.push(self.parse_ternary()?);
            self.skip_whitespace();
            match self.peek() {
                ',' => {
                    self.next_char();
                }
                ']' => {}
                other => {
                    return Err(self.fail(format!("expected ',' or ']', got {:?}", other)));
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<Node, ExprParseError> {
        let start = self.pos;
        let raw = self.token(is_number_char);
        let token: String = raw.chars().filter(|&c| c != '_').collect();
        if token.contains('.') {
            return token
                .parse::<f64>()
                .map(Node::Float)
                .map_err(|_| ExprParseError::new(format!("invalid float literal {:?}", raw), start));
        }
        let parsed = if let Some(hex) = strip_radix_prefix(&token, "0x", "0X") {
            BigInt::from_str_radix(hex, 16)
        } else if let Some(bin) = strip_radix_prefix(&token, "0b", "0B") {
            BigInt::from_str_radix(bin, 2)
        } else if let Some(oct) = strip_radix_prefix(&token, "0o", "0O") {
            BigInt::from_str_radix(oct, 8)
        } else {
            BigInt::from_str_radix(&token, 10)
        };
        parsed
            .map(Node::Int)
            .map_err(|_| ExprParseError::new(format!("invalid integer literal {:?}", raw), start))
    }

    fn parse_string(&mut self) -> Result<Node, ExprParseError> {
        let quote = self.next_char();
        let mut out = String::new();
        loop {
            if self.at_end() {
                return Err(self.fail("unterminated string literal"));
            }
            let c = self.next_char();
            if c == quote {
                return Ok(Node::Str(out));
            }
            if c == '\\' {
                self.parse_escape(quote, &mut out)?;
            } else {
                out.push(c);
            }
        }
    }

    // Escape alphabet: \a \b \f \n \r \t \v \\ \" \' plus \NNN octal,
    // \xHH, \uHHHH, \UHHHHHHHH.
    fn parse_escape(&mut self, quote: char, out: &mut String) -> Result<(), ExprParseError> {
        if self.at_end() {
            return Err(self.fail("unterminated escape sequence"));
        }
        let c = self.next_char();
        match c {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            c if c == quote => out.push(quote),
            '0'..='7' => {
                let mut digits = String::from(c);
                digits.push_str(&self.take_exact(2, "octal escape")?);
                let code = u8::from_str_radix(&digits, 8)
                    .map_err(|_| self.fail(format!("invalid octal escape \\{}", digits)))?;
                out.push(code as char);
            }
            'x' => {
                let digits = self.take_exact(2, "\\x escape")?;
                let code = u8::from_str_radix(&digits, 16)
                    .map_err(|_| self.fail(format!("invalid hex escape \\x{}", digits)))?;
                out.push(code as char);
            }
            'u' => {
                let digits = self.take_exact(4, "\\u escape")?;
                let code = u32::from_str_radix(&digits, 16)
                    .map_err(|_| self.fail(format!("invalid unicode escape \\u{}", digits)))?;
                out.push(
                    char::from_u32(code)
                        .ok_or_else(|| self.fail(format!("invalid code point {:#x}", code)))?,
                );
            }
            'U' => {
                let digits = self.take_exact(8, "\\U escape")?;
                let code = u32::from_str_radix(&digits, 16)
                    .map_err(|_| self.fail(format!("invalid unicode escape \\U{}", digits)))?;
                out.push(
                    char::from_u32(code)
                        .ok_or_else(|| self.fail(format!("invalid code point {:#x}", code)))?,
                );
            }
            other => {
                return Err(self.fail(format!("unexpected escape code {:?}", other)));
            }
        }
        Ok(())
    }

    fn take_exact(&mut self, n: usize, what: &str) -> Result<String, ExprParseError> {
        if self.pos + n > self.chars.len() {
            return Err(self.fail(format!("truncated {}", what)));
        }
        let s: String = self.chars[self.pos..self.pos + n].iter().collect();
        self.advance(n);
        Ok(s)
    }
}

fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    Node::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn strip_radix_prefix<'a>(s: &'a str, lower: &str, upper: &str) -> Option<&'a str> {
    s.strip_prefix(lower).or_else(|| s.strip_prefix(upper))
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident(c: char) -> bool {
    is_ident_start(c) || c.is_numeric()
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_hexdigit() || matches!(c, '.' | 'x' | 'X' | 'o' | 'O' | '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    fn parse_ok(src: &str) -> Node {
        parse(src).unwrap_or_else(|e| panic!("parse of {:?} failed: {}", src, e)).root
    }

    fn int(v: i64) -> Node {
        Node::Int(BigInt::from(v))
    }

    #[test]
    fn test_precedence_mul_over_add() {
        assert_eq!(
            parse_ok("1 + 2 * 3"),
            binary(BinaryOp::Add, int(1), binary(BinaryOp::Mul, int(2), int(3)))
        );
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or_in_bits() {
        // & is multiplicative, | is additive
        assert_eq!(
            parse_ok("a | b & c"),
            binary(
                BinaryOp::BitOr,
                Node::Ident("a".into()),
                binary(
                    BinaryOp::BitAnd,
                    Node::Ident("b".into()),
                    Node::Ident("c".into())
                )
            )
        );
    }

    #[test]
    fn test_shift_binds_with_multiplication() {
        assert_eq!(
            parse_ok("1 << 2 + 3"),
            binary(
                BinaryOp::Add,
                binary(BinaryOp::Shl, int(1), int(2)),
                int(3)
            )
        );
    }

    #[test]
    fn test_comparison_below_additive() {
        assert_eq!(
            parse_ok("a + 1 == b"),
            binary(
                BinaryOp::Eq,
                binary(BinaryOp::Add, Node::Ident("a".into()), int(1)),
                Node::Ident("b".into())
            )
        );
    }

    #[test]
    fn test_logical_levels() {
        // or is lower than and
        assert_eq!(
            parse_ok("a or b and c"),
            binary(
                BinaryOp::LogicalOr,
                Node::Ident("a".into()),
                binary(
                    BinaryOp::LogicalAnd,
                    Node::Ident("b".into()),
                    Node::Ident("c".into())
                )
            )
        );
    }

    #[test]
    fn test_ternary_is_lowest() {
        let n = parse_ok("a == 1 ? b : c");
        match n {
            Node::Ternary { cond, .. } => {
                assert!(matches!(*cond, Node::Binary { op: BinaryOp::Eq, .. }));
            }
            other => panic!("expected ternary, got {:?}", other),
        }
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(
            parse_ok("_root.xs[0]"),
            Node::Subscript {
                operand: Box::new(Node::Member {
                    operand: Box::new(Node::Ident("_root".into())),
                    property: "xs".into(),
                }),
                index: Box::new(int(0)),
            }
        );
    }

    #[test]
    fn test_scope_vs_ternary_colon() {
        assert_eq!(
            parse_ok("kind::a"),
            Node::Scope {
                operand: Box::new(Node::Ident("kind".into())),
                name: "a".into(),
            }
        );
        // `a ? b::c : d` must not eat the ternary colon as scope
        let n = parse_ok("a ? b::c : d");
        assert!(matches!(n, Node::Ternary { .. }));
    }

    #[test]
    fn test_integer_radixes() {
        assert_eq!(parse_ok("0x1f"), int(31));
        assert_eq!(parse_ok("0b101"), int(5));
        assert_eq!(parse_ok("0o17"), int(15));
        assert_eq!(parse_ok("1_000"), int(1000));
    }

    #[test]
    fn test_big_integer_preserved() {
        let n = parse_ok("0xffffffffffffffffff");
        match n {
            Node::Int(i) => assert!(i.to_u64().is_none(), "literal should exceed u64"),
            other => panic!("expected int, got {:?}", other),
        }
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(parse_ok("1.5"), Node::Float(1.5));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse_ok(r#""a\tb\x41\101B""#),
            Node::Str("a\tbAAB".into())
        );
        assert_eq!(parse_ok(r"'it\'s'"), Node::Str("it's".into()));
    }

    #[test]
    fn test_not_applies_to_postfix() {
        assert_eq!(
            parse_ok("not a.b and c"),
            binary(
                BinaryOp::LogicalAnd,
                Node::Unary {
                    op: UnaryOp::LogicalNot,
                    operand: Box::new(Node::Member {
                        operand: Box::new(Node::Ident("a".into())),
                        property: "b".into(),
                    }),
                },
                Node::Ident("c".into())
            )
        );
    }

    #[test]
    fn test_keyword_prefix_identifiers() {
        // Identifiers that merely start with a keyword must stay identifiers.
        assert_eq!(parse_ok("order"), Node::Ident("order".into()));
        assert_eq!(parse_ok("android"), Node::Ident("android".into()));
        assert_eq!(parse_ok("notable"), Node::Ident("notable".into()));
        assert_eq!(parse_ok("true_count"), Node::Ident("true_count".into()));
    }

    #[test]
    fn test_error_offset() {
        let err = parse("1 + $").unwrap_err();
        assert_eq!(err.offset, 4);
        let err = parse("").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse("1 2").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("a[1").is_err());
    }

    #[test]
    fn test_parse_opt_empty() {
        assert_eq!(parse_opt("").unwrap(), None);
        assert_eq!(parse_opt("  ").unwrap(), None);
        assert!(parse_opt("1").unwrap().is_some());
    }

    #[test]
    fn test_list_literal() {
        assert_eq!(parse_ok("[0x4d, 0x4d]"), Node::List(vec![int(77), int(77)]));
        assert_eq!(parse_ok("[]"), Node::List(vec![]));
    }
}
