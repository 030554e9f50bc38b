mod analyzer;
mod error;
pub mod scope;
pub mod syntax;
pub mod typed_ast;
pub mod types;

pub use analyzer::{returns, Analyzer};
pub use error::{SemanticError, SemanticErrorKind};
pub use types::Type;
