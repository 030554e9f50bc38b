use crate::frontend::scope::{Scope, ScopeId, Symbol, SymbolId};
use crate::frontend::syntax::{BinaryOp, LiteralKind, Span, UnaryOp};
use crate::frontend::Type;

/// The analyzed program: the same tree as the syntax, with every expression
/// typed and every name resolved to a symbol in `symbols`.
#[derive(Debug)]
pub struct Program {
    pub scopes: Vec<Scope>,
    pub symbols: Vec<Symbol>,
    pub globals: Vec<Global>,
    pub funcs: Vec<FnDef>,
}

impl Program {
    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn func(&self, name: &str) -> Option<&FnDef> {
        self.funcs.iter().find(|func| func.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Global {
    pub span: Span,
    pub symbol: SymbolId,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FnDef {
    pub span: Span,
    pub name: String,
    pub symbol: SymbolId,
    pub params: Vec<SymbolId>,
    pub return_type: Type,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub scope: ScopeId,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(span: Span, kind: StmtKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub span: Span,
    pub symbol: SymbolId,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct CondBlock {
    pub cond: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct For {
    pub init: Option<Assign>,
    pub cond: Option<Expr>,
    pub update: Option<Assign>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Declared variables start at the zero value of their type unless an
    /// initializer is present (inferred declarations only have one symbol).
    Var {
        symbols: Vec<SymbolId>,
        init: Option<Expr>,
    },
    Assign(Assign),
    Call(Call),
    Input {
        prompt: String,
        targets: Vec<SymbolId>,
    },
    Output {
        label: String,
        values: Vec<Expr>,
        newline: bool,
    },
    Return(Option<Expr>),
    If {
        branches: Vec<CondBlock>,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For(For),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub callee: SymbolId,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub ty: Type,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, ty: Type, kind: ExprKind) -> Self {
        Self { ty, span, kind }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Var(SymbolId),
    Literal(LiteralKind),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Call(Call),
    /// Widening of an `int` operand into `real`.
    Promote(Box<Expr>),
}
