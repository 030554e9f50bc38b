use std::error;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::frontend::syntax::Span;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    UnexpectedChar(char),
    UnterminatedString,
    UnterminatedComment,
    InvalidLiteral(String),
}

impl Display for LexErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedChar(c) => write!(f, "unexpected character '{}'", c.escape_debug()),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::UnterminatedComment => write!(f, "unterminated block comment"),
            Self::InvalidLiteral(message) => write!(f, "invalid literal: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub span: Span,
    pub kind: LexErrorKind,
}

impl LexError {
    pub fn new(span: Span, kind: LexErrorKind) -> Self {
        Self { span, kind }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LexError: {} at {}", self.kind, self.span)
    }
}

impl error::Error for LexError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxError {
    pub span: Span,
    pub expected: String,
    pub found: String,
}

impl SyntaxError {
    pub fn new(span: Span, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SyntaxError: expected {}, found {} at {}",
            self.expected, self.found, self.span
        )
    }
}

impl error::Error for SyntaxError {}
