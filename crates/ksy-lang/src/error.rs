// Error types for the schema language

use std::fmt;
use std::io;

/// Schema parse error: malformed YAML, unknown directive, or a bad embedded
/// expression discovered while translating the surface syntax.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<ExprParseError> for ParseError {
    fn from(e: ExprParseError) -> Self {
        ParseError::new(e.to_string())
    }
}

/// Expression parse error, carrying the character offset where parsing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprParseError {
    pub message: String,
    /// 0-based character offset into the expression source.
    pub offset: usize,
}

impl ExprParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for ExprParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expression parse error at character {}: {}",
            self.offset + 1,
            self.message
        )
    }
}

impl std::error::Error for ExprParseError {}

/// Import resolution failure.
#[derive(Debug)]
pub struct LoadError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load error: {}", self.message)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// What went wrong during expression evaluation or schema walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Unresolved identifier, scope, or member.
    Name,
    /// Kind mismatch (non-boolean `if`, non-integer `repeat-expr`, ...).
    Type,
    /// Subscript out of bounds, bad substring indices, negative shift,
    /// sub-stream exceeding its parent.
    Range,
    DivByZero,
    /// An endian-pending numeric reached a read without an ambient endian.
    UndecidedEndian,
    /// Bytes read did not match a `contents` literal.
    Validation,
    /// Underlying I/O failure or unexpected end of stream.
    Stream,
}

impl EvalErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            EvalErrorKind::Name => "name error",
            EvalErrorKind::Type => "type error",
            EvalErrorKind::Range => "range error",
            EvalErrorKind::DivByZero => "division by zero",
            EvalErrorKind::UndecidedEndian => "undecided endianness",
            EvalErrorKind::Validation => "validation error",
            EvalErrorKind::Stream => "stream error",
        }
    }
}

/// Evaluation error. Where meaningful it carries the stream offset at which
/// the failure occurred and the schema path being walked.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
    pub offset: Option<u64>,
    pub path: Option<String>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
            path: None,
        }
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Name, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Type, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Range, message)
    }

    pub fn div_by_zero() -> Self {
        Self::new(EvalErrorKind::DivByZero, "integer division by zero")
    }

    pub fn undecided_endian(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::UndecidedEndian, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Stream, message)
    }

    pub fn validation(expected: &[u8], actual: &[u8], offset: u64) -> Self {
        Self {
            kind: EvalErrorKind::Validation,
            message: format!("expected {:02x?}, got {:02x?}", expected, actual),
            offset: Some(offset),
            path: None,
        }
    }

    /// Set the stream offset unless one is already recorded.
    pub fn with_offset(mut self, offset: u64) -> Self {
        if self.offset.is_none() {
            self.offset = Some(offset);
        }
        self
    }

    /// Set the schema path unless one is already recorded.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(path) = &self.path {
            write!(f, " (at {})", path)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset {})", offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<io::Error> for EvalError {
    fn from(e: io::Error) -> Self {
        EvalError::stream(e.to_string())
    }
}

/// Top-level error type for the `compile` / `evaluate` entry points.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    ExprParse(ExprParseError),
    Load(LoadError),
    Eval(EvalError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{}", e),
            Error::ExprParse(e) => write!(f, "{}", e),
            Error::Load(e) => write!(f, "{}", e),
            Error::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<ExprParseError> for Error {
    fn from(e: ExprParseError) -> Self {
        Error::ExprParse(e)
    }
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Error::Load(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_parse_error_offset_is_one_based_in_display() {
        let e = ExprParseError::new("unexpected token", 4);
        assert_eq!(
            e.to_string(),
            "expression parse error at character 5: unexpected token"
        );
    }

    #[test]
    fn test_eval_error_display_with_context() {
        let e = EvalError::stream("unexpected EOF")
            .with_offset(12)
            .with_path("header.len");
        let s = e.to_string();
        assert!(s.contains("stream error"));
        assert!(s.contains("header.len"));
        assert!(s.contains("offset 12"));
    }

    #[test]
    fn test_offset_not_overwritten() {
        let e = EvalError::stream("eof").with_offset(3).with_offset(9);
        assert_eq!(e.offset, Some(3));
    }

    #[test]
    fn test_validation_error_message() {
        let e = EvalError::validation(&[0x7f, 0x45], &[0x00, 0x00], 0);
        assert_eq!(e.kind, EvalErrorKind::Validation);
        assert!(e.message.contains("7f"));
    }
}
