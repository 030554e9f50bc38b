use std::fmt::{Display, Formatter};

use logos::{FilterResult, Lexer, Logos, Skip};
use tracing::debug;

use crate::frontend::syntax::{LexError, LexErrorKind, Span};

macro_rules! map_err {
    ($lex:expr, $result:expr) => {
        match $result {
            Ok(value) => Ok(value),
            Err(err) => {
                $lex.extras.error = Some(LexErrorKind::InvalidLiteral(err.to_string()));
                Err(())
            }
        }
    };
}

pub struct LexerExtras {
    pub line: usize,
    pub line_start: usize,
    pub error: Option<LexErrorKind>,
}

impl LexerExtras {
    pub fn apply(&mut self, offset: usize, text: &str) {
        for (idx, c) in text.char_indices() {
            if c == '\n' {
                self.line += 1;
                self.line_start = offset + idx + 1;
            }
        }
    }

    fn span(&self, range: std::ops::Range<usize>) -> Span {
        Span {
            line: self.line,
            column: range.start - self.line_start + 1,
            begin: range.start,
            end: range.end,
        }
    }
}

impl Default for LexerExtras {
    fn default() -> Self {
        Self {
            line: 1,
            line_start: 0,
            error: None,
        }
    }
}

fn skip(lex: &mut Lexer<TokenKind>) -> Skip {
    let offset = lex.span().start;
    lex.extras.apply(offset, lex.slice());
    Skip
}

/// Skips everything up to the closing `*/`.
fn block_comment(lex: &mut Lexer<TokenKind>) -> FilterResult<()> {
    let offset = lex.span().start;

    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            lex.extras.apply(offset, lex.slice());

            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            lex.extras.error = Some(LexErrorKind::UnterminatedComment);

            FilterResult::Error
        }
    }
}

fn parse_ident(lex: &mut Lexer<TokenKind>) -> String {
    lex.slice().to_string()
}

fn parse_int(lex: &mut Lexer<TokenKind>) -> Result<i64, ()> {
    map_err!(lex, lex.slice().parse::<i64>())
}

fn parse_real(lex: &mut Lexer<TokenKind>) -> Result<f64, ()> {
    map_err!(lex, lex.slice().parse::<f64>())
}

fn parse_string(lex: &mut Lexer<TokenKind>) -> Result<String, ()> {
    let slice = lex.slice();
    map_err!(lex, unescape(&slice[1..slice.len() - 1]))
}

fn unescape(text: &str) -> Result<String, String> {
    let mut s = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            s.push(c);
            continue;
        }

        match chars.next() {
            Some('"') => s.push('"'),
            Some('\\') => s.push('\\'),
            Some('n') => s.push('\n'),
            Some('t') => s.push('\t'),
            Some(other) => return Err(format!("unknown escape sequence '\\{}'", other)),
            None => return Err("dangling escape at end of string".to_string()),
        }
    }

    Ok(s)
}

/// The coarse token classes of the language, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Keyword,
    Identifier,
    IntLiteral,
    RealLiteral,
    StringLiteral,
    BoolLiteral,
    Operator,
    Punctuation,
    InputMarker,
    OutputMarker,
    OutputNewlineMarker,
    Separator,
}

impl Display for TokenCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Keyword => "keyword",
            Self::Identifier => "identifier",
            Self::IntLiteral => "integer literal",
            Self::RealLiteral => "real literal",
            Self::StringLiteral => "string literal",
            Self::BoolLiteral => "boolean literal",
            Self::Operator => "operator",
            Self::Punctuation => "punctuation",
            Self::InputMarker => "input marker",
            Self::OutputMarker => "output marker",
            Self::OutputNewlineMarker => "output-newline marker",
            Self::Separator => "separator",
        };

        write!(f, "{}", name)
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(extras = LexerExtras)]
pub enum TokenKind {
    #[token("func")]
    Func,

    #[token("var")]
    Var,

    #[token("if")]
    If,

    #[token("elif")]
    Elif,

    #[token("else")]
    Else,

    #[token("while")]
    While,

    #[token("for")]
    For,

    #[token("return")]
    Return,

    #[token("int")]
    IntType,

    #[token("real")]
    RealType,

    #[token("bool")]
    BoolType,

    #[token("string")]
    StringType,

    #[token("void")]
    VoidType,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token(">>")]
    Input,

    #[token("<<")]
    Output,

    #[token("<<!")]
    OutputLine,

    #[token("#")]
    Hash,

    #[token("->")]
    Arrow,

    #[token("+")]
    Add,

    #[token("-")]
    Sub,

    #[token("*")]
    Mul,

    #[token("/")]
    Div,

    #[token("==")]
    EqEq,

    #[token("!=")]
    #[token("<>")]
    NotEq,

    #[token("<")]
    Lt,

    #[token("<=")]
    LtEq,

    #[token(">")]
    Gt,

    #[token(">=")]
    GtEq,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("!")]
    Not,

    #[token("=")]
    Assign,

    #[token(":")]
    Colon,

    #[token(";")]
    End,

    #[token(",")]
    Comma,

    #[token("(")]
    ParentLeft,

    #[token(")")]
    ParentRight,

    #[token("{")]
    BracketLeft,

    #[token("}")]
    BracketRight,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", parse_ident)]
    Ident(String),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_real)]
    Real(f64),

    #[regex(r"[0-9]+", parse_int)]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    String(String),

    #[error]
    #[regex(r"[ \r\n\t\f]+", skip)]
    #[regex(r"//[^\n]*", skip)]
    #[token("/*", block_comment)]
    Error,
}

impl TokenKind {
    pub fn category(&self) -> TokenCategory {
        match self {
            Self::Func
            | Self::Var
            | Self::If
            | Self::Elif
            | Self::Else
            | Self::While
            | Self::For
            | Self::Return
            | Self::IntType
            | Self::RealType
            | Self::BoolType
            | Self::StringType
            | Self::VoidType => TokenCategory::Keyword,
            Self::True | Self::False => TokenCategory::BoolLiteral,
            Self::Input => TokenCategory::InputMarker,
            Self::Output => TokenCategory::OutputMarker,
            Self::OutputLine => TokenCategory::OutputNewlineMarker,
            Self::Hash => TokenCategory::Separator,
            Self::Arrow
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::EqEq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::And
            | Self::Or
            | Self::Not
            | Self::Assign => TokenCategory::Operator,
            Self::Colon
            | Self::End
            | Self::Comma
            | Self::ParentLeft
            | Self::ParentRight
            | Self::BracketLeft
            | Self::BracketRight
            | Self::Error => TokenCategory::Punctuation,
            Self::Ident(_) => TokenCategory::Identifier,
            Self::Real(_) => TokenCategory::RealLiteral,
            Self::Int(_) => TokenCategory::IntLiteral,
            Self::String(_) => TokenCategory::StringLiteral,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind.category(), self.lexeme)
    }
}

/// Splits `source` into tokens, stopping at the first character that
/// doesn't start any token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = vec![];

    while let Some(kind) = lexer.next() {
        let span = lexer.extras.span(lexer.span());

        if kind == TokenKind::Error {
            let kind = lexer.extras.error.take().unwrap_or_else(|| {
                let text = lexer.slice();

                if text.starts_with('"') {
                    LexErrorKind::UnterminatedString
                } else {
                    LexErrorKind::UnexpectedChar(text.chars().next().unwrap_or('\0'))
                }
            });

            return Err(LexError::new(span, kind));
        }

        tokens.push(Token {
            kind,
            lexeme: lexer.slice().to_string(),
            span,
        });
    }

    debug!(tokens = tokens.len(), "tokenized source");

    Ok(tokens)
}
