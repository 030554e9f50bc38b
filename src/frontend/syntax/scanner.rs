use crate::frontend::syntax::lexer::{Token, TokenKind};
use crate::frontend::syntax::Span;

pub struct Scanner {
    tokens: Vec<Token>,
    pos: usize,
    eof: Span,
}

impl Scanner {
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof = tokens
            .last()
            .map(|token| {
                let mut span = token.span.clone();
                span.column += span.end - span.begin;
                span.begin = span.end;
                span
            })
            .unwrap_or_else(|| Span::new(1, 1, 0, 0));

        Self {
            tokens,
            pos: 0,
            eof,
        }
    }

    #[inline]
    pub fn peek(&self) -> Option<&TokenKind> {
        self.peek_nth(0)
    }

    #[inline]
    pub fn peek_nth(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|token| &token.kind)
    }

    pub fn advance(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;

        Some(token.kind.clone())
    }

    /// Span of the next token, or the end of input.
    #[inline]
    pub fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|token| token.span.clone())
            .unwrap_or_else(|| self.eof.clone())
    }

    /// Span of the most recently consumed token.
    #[inline]
    pub fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|token| token.span.clone())
            .unwrap_or_default()
    }

    /// Human readable description of the next token for diagnostics.
    pub fn describe(&self) -> String {
        self.tokens
            .get(self.pos)
            .map(|token| token.to_string())
            .unwrap_or_else(|| "end of input".to_string())
    }
}
