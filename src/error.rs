use crate::frontend::syntax::{LexError, Span, SyntaxError};
use crate::frontend::SemanticError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Semantic(Vec<SemanticError>),
    #[error("BackendError: {0}")]
    Backend(String),
    #[error("SerializeError: {0}")]
    Serialize(#[from] ron::Error),
}

impl Error {
    /// Position of the (first) offending construct, if the error has one.
    pub fn span(&self) -> Span {
        match self {
            Error::Lex(e) => e.span.clone(),
            Error::Syntax(e) => e.span.clone(),
            Error::Semantic(errors) => errors
                .first()
                .map(|e| e.span.clone())
                .unwrap_or_default(),
            Error::Io(_) | Error::Backend(_) | Error::Serialize(_) => Span::default(),
        }
    }
}

impl From<Vec<SemanticError>> for Error {
    fn from(errors: Vec<SemanticError>) -> Self {
        Self::Semantic(errors)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(format!("{:#}", err))
    }
}
