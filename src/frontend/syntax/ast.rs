use std::fmt::{Debug, Display, Formatter};

use serde::Serialize;

use crate::frontend::types::Type;

pub trait InferType {
    fn infer_type(&self) -> Type;
}

#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, begin: usize, end: usize) -> Self {
        Self {
            line,
            column,
            begin,
            end,
        }
    }

    pub fn ends(mut self, other: &Span) -> Self {
        self.end = other.end;
        self
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} [{}..{}]",
            self.line, self.column, self.begin, self.end
        )
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Span ({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ident {
    pub span: Span,
    pub name: String,
}

impl Ident {
    pub fn new(span: Span, name: impl Into<String>) -> Self {
        Self {
            span,
            name: name.into(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Program {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decl {
    pub span: Span,
    pub kind: DeclKind,
}

impl Decl {
    pub fn new(span: Span, kind: DeclKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeclKind {
    Var(VarDecl),
    Fn(FnDecl),
}

/// `var int: a, b;` or `var a = <expr>;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VarDecl {
    Typed { ty: Type, names: Vec<Ident> },
    Inferred { name: Ident, value: Expr },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub span: Span,
    pub ty: Type,
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnDecl {
    pub name: Ident,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(span: Span, kind: StmtKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assign {
    pub span: Span,
    pub target: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondBlock {
    pub cond: Expr,
    pub body: Block,
}

/// `if` followed by any number of `elif` clauses; `branches[0]` is the `if` itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct If {
    pub branches: Vec<CondBlock>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct While {
    pub cond: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct For {
    pub init: Option<Assign>,
    pub cond: Option<Expr>,
    pub update: Option<Assign>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Input {
    pub prompt: String,
    pub targets: Vec<Ident>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub label: String,
    pub values: Vec<Expr>,
    pub newline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StmtKind {
    Var(VarDecl),
    Assign(Assign),
    Call(Call),
    Input(Input),
    Output(Output),
    Return(Option<Expr>),
    If(If),
    While(While),
    For(For),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Add,
    Sub,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Mul => "*",
                Self::Div => "/",
                Self::Add => "+",
                Self::Sub => "-",
                Self::Eq => "==",
                Self::NotEq => "!=",
                Self::Lt => "<",
                Self::LtEq => "<=",
                Self::Gt => ">",
                Self::GtEq => ">=",
                Self::And => "&&",
                Self::Or => "||",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neg => write!(f, "-"),
            Self::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Call {
    pub name: Ident,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Ident(String),
    Literal(LiteralKind),
    Binary(Box<Binary>),
    Unary(UnaryOp, Box<Expr>),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralKind {
    Int(i64),
    Bool(bool),
    Real(f64),
    String(String),
}

impl InferType for LiteralKind {
    fn infer_type(&self) -> Type {
        match self {
            LiteralKind::Int(_) => Type::Int,
            LiteralKind::Bool(_) => Type::Bool,
            LiteralKind::Real(_) => Type::Real,
            LiteralKind::String(_) => Type::String,
        }
    }
}
