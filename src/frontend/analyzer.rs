use tracing::{debug, trace};

use crate::frontend::scope::{FnSig, ScopeKind, ScopeList, SymbolId, SymbolKind, GLOBAL_SCOPE};
use crate::frontend::syntax::{self, BinaryOp, Ident, InferType, Span, UnaryOp};
use crate::frontend::typed_ast::*;
use crate::frontend::{SemanticError, SemanticErrorKind, Type};

/// Why checking a declaration stopped.
enum Failure {
    Error(SemanticError),
    /// It used a name whose own declaration already failed and was reported.
    Poisoned,
}

impl From<SemanticError> for Failure {
    fn from(err: SemanticError) -> Self {
        Self::Error(err)
    }
}

type Result<T> = std::result::Result<T, Failure>;

macro_rules! error {
    ($span:expr, $kind:ident, $($arg:tt)*) => {
        Err(Failure::Error(SemanticError::new(
            $span,
            SemanticErrorKind::$kind,
            format!($($arg)*),
        )))
    };
}

/// Wraps an `int` expression in an explicit widening to `real`.
fn promote(expr: Expr) -> Expr {
    if expr.ty != Type::Int {
        return expr;
    }

    Expr::new(expr.span.clone(), Type::Real, ExprKind::Promote(expr.into()))
}

fn widen(expr: Expr, ty: Type) -> Expr {
    if ty == Type::Real {
        promote(expr)
    } else {
        expr
    }
}

/// Whether every path through `stmts` ends in a `return`. Loop bodies never
/// count since a loop may run zero times.
pub fn returns(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            branches,
            else_block: Some(else_block),
        } => {
            branches.iter().all(|branch| returns(&branch.body.stmts))
                && returns(&else_block.stmts)
        }
        StmtKind::Block(block) => returns(&block.stmts),
        _ => false,
    })
}

pub struct Analyzer {
    scopes: ScopeList,
    errors: Vec<SemanticError>,
    poisoned: Vec<SymbolId>,
    return_type: Type,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            scopes: ScopeList::new(),
            errors: vec![],
            poisoned: vec![],
            return_type: Type::Void,
        }
    }

    fn coerce(&self, expr: Expr, target: Type, context: &str) -> Result<Expr> {
        if expr.ty == target {
            return Ok(expr);
        }

        if expr.ty.promotes_to(target) {
            return Ok(promote(expr));
        }

        error!(
            expr.span.clone(),
            TypeMismatch,
            "{}: expected {}, found {}",
            context,
            target,
            expr.ty
        )
    }

    fn resolve(&self, ident: &Ident) -> Result<SymbolId> {
        match self.scopes.lookup(&ident.name) {
            Some(id) if self.poisoned.contains(&id) => Err(Failure::Poisoned),
            Some(id) => Ok(id),
            None => error!(
                ident.span.clone(),
                UndeclaredIdentifier,
                "'{}' is not declared",
                ident.name
            ),
        }
    }

    /// Binds `name` without a usable type after its declaration failed, so
    /// later uses don't report it again as undeclared.
    fn poison(&mut self, name: &Ident) {
        if let Ok(id) =
            self.scopes
                .declare(name.span.clone(), &name.name, Type::Void, SymbolKind::Variable)
        {
            self.poisoned.push(id);
        }
    }

    fn report(&mut self, failure: Failure) {
        if let Failure::Error(err) = failure {
            self.errors.push(err);
        }
    }

    /// Resolves a name that must denote a variable or parameter.
    fn variable(&self, ident: &Ident) -> Result<SymbolId> {
        let id = self.resolve(ident)?;

        if self.scopes.symbol(id).signature().is_some() {
            return error!(
                ident.span.clone(),
                TypeMismatch,
                "'{}' is a function, not a variable",
                ident.name
            );
        }

        Ok(id)
    }

    fn analyze_call(&mut self, call: syntax::Call) -> Result<(Call, Type)> {
        let callee = self.resolve(&call.name)?;
        let symbol = self.scopes.symbol(callee);

        let FnSig {
            params,
            return_type,
        } = match symbol.signature() {
            Some(sig) => sig.clone(),
            None => {
                return error!(
                    call.name.span,
                    TypeMismatch,
                    "'{}' is a variable of type {}, not a function",
                    call.name.name,
                    symbol.ty
                )
            }
        };

        if call.args.len() != params.len() {
            return error!(
                call.name.span,
                ArityMismatch,
                "'{}' expects {} argument(s), found {}",
                call.name.name,
                params.len(),
                call.args.len()
            );
        }

        let mut args = Vec::with_capacity(params.len());

        for (idx, (arg, ty)) in call.args.into_iter().zip(params).enumerate() {
            let arg = self.analyze_expr(arg)?;
            let context = format!("argument {} of '{}'", idx + 1, call.name.name);

            args.push(self.coerce(arg, ty, &context)?);
        }

        Ok((Call { callee, args }, return_type))
    }

    fn analyze_binary(&mut self, span: Span, binary: syntax::Binary) -> Result<Expr> {
        let op = binary.op;
        let lhs = self.analyze_expr(binary.left)?;
        let rhs = self.analyze_expr(binary.right)?;

        let mismatch = |lhs: Type, rhs: Type| -> Result<Expr> {
            error!(
                span.clone(),
                TypeMismatch,
                "operator '{}' can't be applied to {} and {}",
                op,
                lhs,
                rhs
            )
        };

        let (ty, lhs, rhs) = if op.is_arithmetic() {
            match lhs.ty.unify_numeric(rhs.ty) {
                Some(ty) => (ty, widen(lhs, ty), widen(rhs, ty)),
                None if op == BinaryOp::Add
                    && lhs.ty == Type::String
                    && rhs.ty == Type::String =>
                {
                    (Type::String, lhs, rhs)
                }
                None => return mismatch(lhs.ty, rhs.ty),
            }
        } else if op.is_logical() {
            if lhs.ty != Type::Bool || rhs.ty != Type::Bool {
                return mismatch(lhs.ty, rhs.ty);
            }

            (Type::Bool, lhs, rhs)
        } else {
            match lhs.ty.unify_numeric(rhs.ty) {
                Some(ty) => (Type::Bool, widen(lhs, ty), widen(rhs, ty)),
                None if lhs.ty == rhs.ty && matches!(lhs.ty, Type::Bool | Type::String) => {
                    (Type::Bool, lhs, rhs)
                }
                None => return mismatch(lhs.ty, rhs.ty),
            }
        };

        Ok(Expr::new(
            span,
            ty,
            ExprKind::Binary(op, lhs.into(), rhs.into()),
        ))
    }

    fn analyze_expr(&mut self, expr: syntax::Expr) -> Result<Expr> {
        Ok(match expr.kind {
            syntax::ExprKind::Ident(name) => {
                let id = self.variable(&Ident::new(expr.span.clone(), name))?;
                let ty = self.scopes.symbol(id).ty;

                Expr::new(expr.span, ty, ExprKind::Var(id))
            }
            syntax::ExprKind::Literal(literal) => {
                Expr::new(expr.span, literal.infer_type(), ExprKind::Literal(literal))
            }
            syntax::ExprKind::Binary(binary) => self.analyze_binary(expr.span, *binary)?,
            syntax::ExprKind::Unary(op, operand) => {
                let operand = self.analyze_expr(*operand)?;
                let valid = match op {
                    UnaryOp::Neg => operand.ty.is_numeric(),
                    UnaryOp::Not => operand.ty == Type::Bool,
                };

                if !valid {
                    return error!(
                        expr.span,
                        TypeMismatch,
                        "operator '{}' can't be applied to {}",
                        op,
                        operand.ty
                    );
                }

                Expr::new(
                    expr.span,
                    operand.ty,
                    ExprKind::Unary(op, operand.into()),
                )
            }
            syntax::ExprKind::Call(call) => {
                let (call, ty) = self.analyze_call(call)?;
                Expr::new(expr.span, ty, ExprKind::Call(call))
            }
        })
    }

    fn analyze_cond(&mut self, expr: syntax::Expr, what: &str) -> Result<Expr> {
        let expr = self.analyze_expr(expr)?;

        if expr.ty != Type::Bool {
            return error!(
                expr.span,
                TypeMismatch,
                "{} condition must be bool, found {}",
                what,
                expr.ty
            );
        }

        Ok(expr)
    }

    fn analyze_assign(&mut self, assign: syntax::Assign) -> Result<Assign> {
        let symbol = self.variable(&assign.target)?;
        let ty = self.scopes.symbol(symbol).ty;
        let value = self.analyze_expr(assign.value)?;
        let context = format!("assignment to '{}'", assign.target.name);

        Ok(Assign {
            span: assign.span,
            symbol,
            value: self.coerce(value, ty, &context)?,
        })
    }

    fn analyze_var(&mut self, decl: syntax::VarDecl) -> Result<(Vec<SymbolId>, Option<Expr>)> {
        match decl {
            syntax::VarDecl::Typed { ty, names } => {
                let mut symbols = vec![];
                let mut failure = None;

                // Later names are still bound when an earlier one clashes.
                for name in names {
                    match self
                        .scopes
                        .declare(name.span, &name.name, ty, SymbolKind::Variable)
                    {
                        Ok(id) => symbols.push(id),
                        Err(err) => {
                            failure.get_or_insert(err);
                        }
                    }
                }

                match failure {
                    Some(err) => Err(err.into()),
                    None => Ok((symbols, None)),
                }
            }
            syntax::VarDecl::Inferred { name, value } => {
                let value = match self.analyze_expr(value) {
                    Ok(value) if value.ty.is_scalar() => value,
                    Ok(value) => {
                        self.poison(&name);

                        return error!(
                            value.span,
                            TypeMismatch,
                            "can't infer the type of '{}' from a void expression",
                            name.name
                        );
                    }
                    Err(failure) => {
                        self.poison(&name);
                        return Err(failure);
                    }
                };

                let symbol =
                    self.scopes
                        .declare(name.span, &name.name, value.ty, SymbolKind::Variable)?;

                Ok((vec![symbol], Some(value)))
            }
        }
    }

    fn analyze_block(&mut self, block: syntax::Block) -> Result<Block> {
        let scope = self.scopes.enter(ScopeKind::Block);
        let stmts = self.analyze_stmts(block.stmts)?;
        self.scopes.exit();

        Ok(Block { scope, stmts })
    }

    fn analyze_stmts(&mut self, stmts: Vec<syntax::Stmt>) -> Result<Vec<Stmt>> {
        stmts
            .into_iter()
            .map(|stmt| self.analyze_stmt(stmt))
            .collect()
    }

    fn analyze_stmt(&mut self, stmt: syntax::Stmt) -> Result<Stmt> {
        let kind = match stmt.kind {
            syntax::StmtKind::Var(decl) => {
                let (symbols, init) = self.analyze_var(decl)?;
                StmtKind::Var { symbols, init }
            }
            syntax::StmtKind::Assign(assign) => StmtKind::Assign(self.analyze_assign(assign)?),
            syntax::StmtKind::Call(call) => StmtKind::Call(self.analyze_call(call)?.0),
            syntax::StmtKind::Input(input) => {
                let mut targets = vec![];

                for target in input.targets {
                    let id = self.variable(&target)?;
                    let ty = self.scopes.symbol(id).ty;

                    if !ty.is_scalar() {
                        return error!(
                            target.span,
                            TypeMismatch,
                            "can't read a value of type {} into '{}'",
                            ty,
                            target.name
                        );
                    }

                    targets.push(id);
                }

                StmtKind::Input {
                    prompt: input.prompt,
                    targets,
                }
            }
            syntax::StmtKind::Output(output) => {
                let mut values = vec![];

                for value in output.values {
                    let value = self.analyze_expr(value)?;

                    if !value.ty.is_scalar() {
                        return error!(value.span, TypeMismatch, "can't print a void expression");
                    }

                    values.push(value);
                }

                StmtKind::Output {
                    label: output.label,
                    values,
                    newline: output.newline,
                }
            }
            syntax::StmtKind::Return(value) => {
                let value = match (value, self.return_type) {
                    (None, Type::Void) => None,
                    (None, ty) => {
                        return error!(
                            stmt.span,
                            TypeMismatch,
                            "function returning {} must return a value",
                            ty
                        );
                    }
                    (Some(value), Type::Void) => {
                        return error!(
                            value.span,
                            TypeMismatch,
                            "void function can't return a value"
                        );
                    }
                    (Some(value), ty) => {
                        let value = self.analyze_expr(value)?;
                        Some(self.coerce(value, ty, "return value")?)
                    }
                };

                StmtKind::Return(value)
            }
            syntax::StmtKind::If(if_stmt) => {
                let mut branches = vec![];

                for branch in if_stmt.branches {
                    branches.push(CondBlock {
                        cond: self.analyze_cond(branch.cond, "if")?,
                        body: self.analyze_block(branch.body)?,
                    });
                }

                let else_block = match if_stmt.else_block {
                    Some(block) => Some(self.analyze_block(block)?),
                    None => None,
                };

                StmtKind::If {
                    branches,
                    else_block,
                }
            }
            syntax::StmtKind::While(while_stmt) => StmtKind::While {
                cond: self.analyze_cond(while_stmt.cond, "while")?,
                body: self.analyze_block(while_stmt.body)?,
            },
            syntax::StmtKind::For(for_stmt) => {
                let init = match for_stmt.init {
                    Some(assign) => Some(self.analyze_assign(assign)?),
                    None => None,
                };
                let cond = match for_stmt.cond {
                    Some(cond) => Some(self.analyze_cond(cond, "for")?),
                    None => None,
                };
                let update = match for_stmt.update {
                    Some(assign) => Some(self.analyze_assign(assign)?),
                    None => None,
                };

                StmtKind::For(For {
                    init,
                    cond,
                    update,
                    body: self.analyze_block(for_stmt.body)?,
                })
            }
            syntax::StmtKind::Block(block) => StmtKind::Block(self.analyze_block(block)?),
        };

        Ok(Stmt::new(stmt.span, kind))
    }

    fn declare_fn(&mut self, func: &syntax::FnDecl) -> Result<SymbolId> {
        let sig = FnSig {
            params: func.params.iter().map(|param| param.ty).collect(),
            return_type: func.return_type,
        };

        Ok(self.scopes.declare(
            func.name.span.clone(),
            &func.name.name,
            func.return_type,
            SymbolKind::Function(sig),
        )?)
    }

    fn analyze_global(&mut self, span: Span, decl: syntax::VarDecl) -> Result<Vec<Global>> {
        let (symbols, init) = self.analyze_var(decl)?;

        Ok(match init {
            Some(init) => vec![Global {
                span,
                symbol: symbols[0],
                init: Some(init),
            }],
            None => symbols
                .into_iter()
                .map(|symbol| Global {
                    span: span.clone(),
                    symbol,
                    init: None,
                })
                .collect(),
        })
    }

    fn analyze_fn(&mut self, span: Span, symbol: SymbolId, func: syntax::FnDecl) -> Result<FnDef> {
        trace!(name = %func.name.name, "analyzing function");

        self.return_type = func.return_type;

        let scope = self.scopes.enter(ScopeKind::Fn);
        let mut params = vec![];

        for param in func.params {
            params.push(self.scopes.declare(
                param.name.span,
                &param.name.name,
                param.ty,
                SymbolKind::Parameter,
            )?);
        }

        let stmts = self.analyze_stmts(func.body.stmts)?;

        self.scopes.exit();

        if func.return_type != Type::Void && !returns(&stmts) {
            return error!(
                func.name.span,
                MissingReturn,
                "function '{}' doesn't return a value on every path",
                func.name.name
            );
        }

        Ok(FnDef {
            span,
            name: func.name.name,
            symbol,
            params,
            return_type: func.return_type,
            body: Block { scope, stmts },
        })
    }

    /// Checks the whole program. Errors in one declaration don't prevent the
    /// others from being checked; within a function only the first error is kept.
    pub fn analyze(
        mut self,
        program: syntax::Program,
    ) -> std::result::Result<Program, Vec<SemanticError>> {
        let mut vars = vec![];
        let mut pending = vec![];

        for decl in program.decls {
            match decl.kind {
                syntax::DeclKind::Fn(func) => match self.declare_fn(&func) {
                    Ok(symbol) => pending.push((decl.span, symbol, func)),
                    Err(failure) => self.report(failure),
                },
                syntax::DeclKind::Var(var) => vars.push((decl.span, var)),
            }
        }

        let mut globals = vec![];

        for (span, var) in vars {
            match self.analyze_global(span, var) {
                Ok(defs) => globals.extend(defs),
                Err(failure) => self.report(failure),
            }
        }

        let mut funcs = vec![];

        for (span, symbol, func) in pending {
            match self.analyze_fn(span, symbol, func) {
                Ok(func) => funcs.push(func),
                Err(failure) => {
                    self.scopes.restore(GLOBAL_SCOPE);
                    self.report(failure);
                }
            }
        }

        if !self.errors.is_empty() {
            self.errors.sort_by_key(|err| err.span.begin);
            debug!(errors = self.errors.len(), "semantic analysis failed");

            return Err(self.errors);
        }

        let (scopes, symbols) = self.scopes.consume();

        debug!(
            globals = globals.len(),
            funcs = funcs.len(),
            symbols = symbols.len(),
            "semantic analysis finished"
        );

        Ok(Program {
            scopes,
            symbols,
            globals,
            funcs,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::frontend::syntax::{parse, tokenize};

    fn analyze(source: &str) -> std::result::Result<Program, Vec<SemanticError>> {
        let program = parse(tokenize(source).unwrap()).unwrap();
        Analyzer::new().analyze(program)
    }

    fn kinds(source: &str) -> Vec<SemanticErrorKind> {
        match analyze(source) {
            Ok(_) => vec![],
            Err(errors) => errors.into_iter().map(|err| err.kind).collect(),
        }
    }

    fn main_body(body: &str) -> String {
        format!("func void -> main() {{ {} }}", body)
    }

    #[test_case("var int: x; var int: x;"; "global twice")]
    #[test_case("var int: x; var real: x;"; "global twice with other type")]
    #[test_case("var int: x; func void -> main() { var int: x; }"; "local shadows global")]
    #[test_case("func int -> f(int: n) { var int: n; return n; }"; "local shadows param")]
    #[test_case("func int -> f(int: n) { if (true) { var real: n; } return n; }"; "nested shadows param")]
    #[test_case("func void -> f(int: a, bool: a) { }"; "duplicate param")]
    #[test_case("func void -> f() { } func void -> f() { }"; "function twice")]
    #[test_case("func void -> f() { } var int: f;"; "global named like function")]
    #[test_case("func void -> main() { var int: i; { var bool: i; } }"; "bare block shadows local")]
    #[test_case("func void -> main() { var x = 1; var x = 2; }"; "inferred twice")]
    fn test_redeclaration(source: &str) {
        assert_eq!(kinds(source), vec![SemanticErrorKind::Redeclaration]);
    }

    #[test]
    fn test_sibling_blocks_reuse_names() {
        let source = main_body("if (true) { var int: i; } else { var int: i; } { var real: i; }");
        assert_eq!(kinds(&source), vec![]);
    }

    #[test_case("var bool: b; b = 1 + 2;"; "int assigned to bool")]
    #[test_case("var int: i; i = 2.5;"; "real assigned to int")]
    #[test_case("var int: i; i = 1 + 2.5;"; "mixed result assigned to int")]
    #[test_case("var int: i; i = true && 1;"; "logical on int")]
    #[test_case("var bool: b; b = 1 == true;"; "compare int with bool")]
    #[test_case("var string: s; s = \"a\" + 1;"; "string plus int")]
    #[test_case("var string: s; s = \"a\" - \"b\";"; "string minus string")]
    #[test_case("var bool: b; b = -true;"; "negate bool")]
    #[test_case("var int: i; i = !i;"; "not on int")]
    #[test_case("if (1) { }"; "int condition")]
    #[test_case("while (\"x\") { }"; "string condition")]
    #[test_case("<<! \"x\" # (f());"; "print void")]
    #[test_case("var x = f();"; "infer from void")]
    #[test_case("var int: i; i = f();"; "assign void")]
    #[test_case("main = 1;"; "assign to function")]
    #[test_case("var int: i; i();"; "call a variable")]
    #[test_case("return 1;"; "value from void function")]
    fn test_type_mismatch(body: &str) {
        let source = format!("func void -> f() {{ }} {}", main_body(body));
        assert_eq!(kinds(&source), vec![SemanticErrorKind::TypeMismatch]);
    }

    #[test]
    fn test_return_types() {
        assert_eq!(
            kinds("func int -> f() { return; }"),
            vec![SemanticErrorKind::TypeMismatch]
        );
        assert_eq!(
            kinds("func int -> f() { return 1.5; }"),
            vec![SemanticErrorKind::TypeMismatch]
        );
        assert_eq!(kinds("func real -> f() { return 1; }"), vec![]);
    }

    #[test]
    fn test_calls() {
        let decls = "func real -> f(int: a, real: b) { return a + b; }";

        assert_eq!(
            kinds(&format!("{} {}", decls, main_body("var real: r; r = f(1);"))),
            vec![SemanticErrorKind::ArityMismatch]
        );
        assert_eq!(
            kinds(&format!("{} {}", decls, main_body("var real: r; r = f(1.5, 2);"))),
            vec![SemanticErrorKind::TypeMismatch]
        );
        assert_eq!(
            kinds(&format!("{} {}", decls, main_body("var real: r; r = f(1, 2);"))),
            vec![]
        );
        assert_eq!(
            kinds(&main_body("g();")),
            vec![SemanticErrorKind::UndeclaredIdentifier]
        );
    }

    #[test]
    fn test_forward_calls_and_recursion() {
        let source = "func void -> main() { <<! \"\" # (fact(5)); }
            func int -> fact(int: n) { if (n <= 1) { return 1; } return n * fact(n - 1); }";

        assert_eq!(kinds(source), vec![]);
    }

    #[test_case("x = 1;"; "assign")]
    #[test_case(">> \"x\" # (x);"; "input")]
    #[test_case("<< \"x\" # (x);"; "output")]
    #[test_case("var y = x;"; "inferred")]
    #[test_case("for (x = 0; true; ) { }"; "for init")]
    fn test_undeclared(body: &str) {
        assert_eq!(
            kinds(&main_body(body)),
            vec![SemanticErrorKind::UndeclaredIdentifier]
        );
    }

    #[test]
    fn test_use_before_declaration_in_block() {
        assert_eq!(
            kinds(&main_body("x = 1; var int: x;")),
            vec![SemanticErrorKind::UndeclaredIdentifier]
        );
        assert_eq!(
            kinds(&main_body("{ var int: x; } x = 1;")),
            vec![SemanticErrorKind::UndeclaredIdentifier]
        );
    }

    #[test_case("func int -> g(int: a) { if (a > 0) { return 1; } }", false; "if without else")]
    #[test_case("func int -> g(int: a) { if (a > 0) { return 1; } else { return 2; } }", true; "if else")]
    #[test_case("func int -> g(int: a) { if (a > 0) { return 1; } elif (a < 0) { a = 1; } else { return 2; } }", false; "elif without return")]
    #[test_case("func int -> g(int: a) { if (a > 0) { return 1; } elif (a < 0) { return 3; } else { return 2; } }", true; "all branches")]
    #[test_case("func int -> g(int: a) { while (true) { return 1; } }", false; "return inside while")]
    #[test_case("func int -> g(int: a) { while (true) { return 1; } return 0; }", true; "return after while")]
    #[test_case("func int -> g(int: a) { for (;;) { return 1; } }", false; "return inside for")]
    #[test_case("func int -> g(int: a) { { return a; } }", true; "return inside bare block")]
    #[test_case("func int -> g(int: a) { if (a > 0) { return 1; } else { return 2; } a = 3; }", true; "if else before other statements")]
    #[test_case("func int -> g(int: a) { { if (a > 0) { return 1; } else { return 2; } } }", true; "if else inside bare block")]
    #[test_case("func int -> g(int: a) { if (a > 0) { { return 1; } } else { return 2; } }", true; "branch returning from bare block")]
    #[test_case("func int -> g(int: a) { }", false; "empty body")]
    #[test_case("func void -> g(int: a) { }", true; "void needs no return")]
    fn test_return_coverage(source: &str, accepted: bool) {
        let expected = if accepted {
            vec![]
        } else {
            vec![SemanticErrorKind::MissingReturn]
        };

        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_missing_return_names_function() {
        let errors = analyze("func int -> g(int: a){ if(a>0){return 1;} }").unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, SemanticErrorKind::MissingReturn);
        assert!(errors[0].message.contains("'g'"));
    }

    #[test]
    fn test_errors_collected_across_functions() {
        let source = "
            func int -> a() { }
            func void -> b() { x = 1; y = 2; }
            func void -> c() { var bool: z; z = 1; }
            var int: a;
        ";
        let errors = analyze(source).unwrap_err();

        assert_eq!(
            errors.into_iter().map(|err| err.kind).collect::<Vec<_>>(),
            vec![
                SemanticErrorKind::MissingReturn,
                SemanticErrorKind::UndeclaredIdentifier,
                SemanticErrorKind::TypeMismatch,
                SemanticErrorKind::Redeclaration,
            ]
        );
    }

    #[test_case("var total = 1 + true;", SemanticErrorKind::TypeMismatch; "bad initializer")]
    #[test_case("var total = nothing();", SemanticErrorKind::TypeMismatch; "void initializer")]
    #[test_case("var total = missing;", SemanticErrorKind::UndeclaredIdentifier; "undeclared initializer")]
    fn test_failed_global_is_reported_once(global: &str, kind: SemanticErrorKind) {
        let source = format!(
            "func void -> nothing() {{ }} {} \
             func void -> a() {{ total = 1; }} \
             func void -> b() {{ <<! \"\" # (total); }}",
            global
        );

        assert_eq!(kinds(&source), vec![kind]);
    }

    #[test]
    fn test_failed_global_poisons_dependents() {
        let source = "var a = 1 + true; var b = a * 2; func int -> f() { return b; }";

        assert_eq!(kinds(source), vec![SemanticErrorKind::TypeMismatch]);
    }

    #[test]
    fn test_typed_global_binds_every_name() {
        let source = "
            var int: x;
            var int: y, x, z;
            func void -> main() { y = 1; z = 2; }
        ";

        assert_eq!(kinds(source), vec![SemanticErrorKind::Redeclaration]);
    }

    #[test]
    fn test_promotion_is_explicit() {
        let program = analyze(&main_body("var real: r; r = 3 + 4.5;")).unwrap();
        let main = program.func("main").unwrap();

        let StmtKind::Assign(assign) = &main.body.stmts[1].kind else {
            panic!("expected assignment");
        };
        assert_eq!(assign.value.ty, Type::Real);

        let ExprKind::Binary(BinaryOp::Add, lhs, rhs) = &assign.value.kind else {
            panic!("expected addition");
        };
        assert!(matches!(lhs.kind, ExprKind::Promote(_)));
        assert_eq!(lhs.ty, Type::Real);
        assert!(matches!(rhs.kind, ExprKind::Literal(_)));
    }

    #[test]
    fn test_assignment_promotes() {
        let program = analyze(&main_body("var real: r; r = 1;")).unwrap();
        let main = program.func("main").unwrap();

        let StmtKind::Assign(assign) = &main.body.stmts[1].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(assign.value.kind, ExprKind::Promote(_)));
    }

    #[test_case("var bool: b; b = 1 < 2.5;"; "mixed numeric comparison")]
    #[test_case("var bool: b; b = \"a\" < \"b\";"; "string comparison")]
    #[test_case("var bool: b; b = true != false;"; "bool comparison")]
    #[test_case("var string: s; s = \"a\" + \"b\";"; "concatenation")]
    #[test_case("var real: r; r = -1 * 2.0 / 3;"; "mixed arithmetic")]
    #[test_case("var x = 1; var y = x + 0.5; var real: z; z = y;"; "inferred types")]
    fn test_accepted(body: &str) {
        assert_eq!(kinds(&main_body(body)), vec![]);
    }

    #[test]
    fn test_resolved_bindings() {
        let program = analyze("var int: g; func void -> main() { var int: l; l = g; }").unwrap();
        let main = program.func("main").unwrap();

        let StmtKind::Assign(assign) = &main.body.stmts[1].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Var(source) = assign.value.kind else {
            panic!("expected variable");
        };

        assert!(program.symbol(source).is_global());
        assert_eq!(program.symbol(source).name, "g");
        assert_eq!(program.symbol(assign.symbol).name, "l");
        assert!(!program.symbol(assign.symbol).is_global());
        assert_eq!(program.globals.len(), 1);
    }
}
