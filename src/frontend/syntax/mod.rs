mod ast;
mod error;
mod lexer;
mod parser;
mod scanner;

pub use ast::*;
pub use error::{LexError, LexErrorKind, SyntaxError};
pub use lexer::{tokenize, Token, TokenCategory, TokenKind};
pub use parser::{parse, Parser};
pub use scanner::Scanner;
