use std::error;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::frontend::syntax::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SemanticErrorKind {
    Redeclaration,
    TypeMismatch,
    ArityMismatch,
    UndeclaredIdentifier,
    MissingReturn,
    InvalidEntryPoint,
}

impl Display for SemanticErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Redeclaration => "Redeclaration",
            Self::TypeMismatch => "TypeMismatch",
            Self::ArityMismatch => "ArityMismatch",
            Self::UndeclaredIdentifier => "UndeclaredIdentifier",
            Self::MissingReturn => "MissingReturn",
            Self::InvalidEntryPoint => "InvalidEntryPoint",
        };

        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticError {
    pub span: Span,
    pub kind: SemanticErrorKind,
    pub message: String,
}

impl SemanticError {
    pub fn new(span: Span, kind: SemanticErrorKind, message: String) -> Self {
        Self {
            span,
            kind,
            message,
        }
    }
}

impl Display for SemanticError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} at {}", self.kind, self.message, self.span)
    }
}

impl error::Error for SemanticError {}
