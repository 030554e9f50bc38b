use tracing::debug;

use crate::frontend::syntax::lexer::Token;
use crate::frontend::syntax::{
    Assign, Binary, BinaryOp, Block, Call, CondBlock, Decl, DeclKind, Expr, ExprKind, FnDecl, For,
    Ident, If, Input, LiteralKind, Output, Param, Program, Scanner, Span, Stmt, StmtKind,
    SyntaxError, TokenKind, UnaryOp, VarDecl, While,
};
use crate::frontend::Type;

type Result<T> = std::result::Result<T, SyntaxError>;

macro_rules! expect {
    ($parser:expr, $token:pat, $expected:expr) => {{
        if !matches!($parser.scanner.peek(), Some($token)) {
            return Err($parser.unexpected($expected));
        }

        $parser.scanner.advance();
    }};
}

macro_rules! accept {
    ($scanner:expr, $token:pat) => {{
        matches!($scanner.peek(), Some($token))
    }};
}

macro_rules! make_bin {
    ($expr:expr, $right:expr, $op:ident) => {{
        let right = $right;

        $expr = Expr::new(
            $expr.span.clone().ends(&right.span),
            ExprKind::Binary(
                Binary {
                    op: BinaryOp::$op,
                    left: $expr,
                    right,
                }
                .into(),
            ),
        )
    }};
}

/// Recursive descent parser. Aborts on the first structural violation.
pub struct Parser {
    scanner: Scanner,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            scanner: Scanner::new(tokens),
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        SyntaxError::new(self.scanner.span(), expected, self.scanner.describe())
    }

    fn ident(&mut self) -> Result<Ident> {
        let span = self.scanner.span();

        match self.scanner.peek() {
            Some(TokenKind::Ident(name)) => {
                let ident = Ident::new(span, name.clone());
                self.scanner.advance();
                Ok(ident)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn string_literal(&mut self) -> Result<String> {
        match self.scanner.peek() {
            Some(TokenKind::String(s)) => {
                let s = s.clone();
                self.scanner.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>> {
        expect!(self, TokenKind::ParentLeft, "'('");

        let mut args = vec![];

        if !accept!(self.scanner, TokenKind::ParentRight) {
            loop {
                args.push(self.expr()?);

                if !accept!(self.scanner, TokenKind::Comma) {
                    break;
                }

                self.scanner.advance();
            }
        }

        expect!(self, TokenKind::ParentRight, "')'");

        Ok(args)
    }

    fn call(&mut self) -> Result<Call> {
        let name = self.ident()?;
        let args = self.call_args()?;

        Ok(Call { name, args })
    }

    fn term(&mut self) -> Result<Expr> {
        let span = self.scanner.span();

        let kind = match self.scanner.peek() {
            Some(TokenKind::Ident(_))
                if matches!(self.scanner.peek_nth(1), Some(TokenKind::ParentLeft)) =>
            {
                let call = self.call()?;

                return Ok(Expr::new(
                    span.ends(&self.scanner.prev_span()),
                    ExprKind::Call(call),
                ));
            }
            Some(TokenKind::Ident(_)) => {
                let ident = self.ident()?;
                return Ok(Expr::new(ident.span, ExprKind::Ident(ident.name)));
            }
            Some(TokenKind::ParentLeft) => {
                self.scanner.advance();
                let mut expr = self.expr()?;
                expect!(self, TokenKind::ParentRight, "')'");
                expr.span = span.ends(&self.scanner.prev_span());

                return Ok(expr);
            }
            Some(TokenKind::String(s)) => LiteralKind::String(s.clone()),
            Some(TokenKind::True) => LiteralKind::Bool(true),
            Some(TokenKind::False) => LiteralKind::Bool(false),
            Some(TokenKind::Int(i)) => LiteralKind::Int(*i),
            Some(TokenKind::Real(f)) => LiteralKind::Real(*f),
            _ => return Err(self.unexpected("expression")),
        };

        self.scanner.advance();

        Ok(Expr::new(span, ExprKind::Literal(kind)))
    }

    fn unary(&mut self) -> Result<Expr> {
        let span = self.scanner.span();
        let op = match self.scanner.peek() {
            Some(TokenKind::Not) => UnaryOp::Not,
            Some(TokenKind::Sub) => UnaryOp::Neg,
            _ => return self.term(),
        };

        self.scanner.advance();
        let operand = self.unary()?;

        Ok(Expr::new(
            span.ends(&operand.span),
            ExprKind::Unary(op, operand.into()),
        ))
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        loop {
            match self.scanner.peek() {
                Some(TokenKind::Mul) => {
                    self.scanner.advance();
                    make_bin!(expr, self.unary()?, Mul);
                }
                Some(TokenKind::Div) => {
                    self.scanner.advance();
                    make_bin!(expr, self.unary()?, Div);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut expr = self.multiplicative()?;

        loop {
            match self.scanner.peek() {
                Some(TokenKind::Add) => {
                    self.scanner.advance();
                    make_bin!(expr, self.multiplicative()?, Add);
                }
                Some(TokenKind::Sub) => {
                    self.scanner.advance();
                    make_bin!(expr, self.multiplicative()?, Sub);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn relational(&mut self) -> Result<Expr> {
        let mut expr = self.additive()?;

        loop {
            match self.scanner.peek() {
                Some(TokenKind::Lt) => {
                    self.scanner.advance();
                    make_bin!(expr, self.additive()?, Lt);
                }
                Some(TokenKind::LtEq) => {
                    self.scanner.advance();
                    make_bin!(expr, self.additive()?, LtEq);
                }
                Some(TokenKind::Gt) => {
                    self.scanner.advance();
                    make_bin!(expr, self.additive()?, Gt);
                }
                Some(TokenKind::GtEq) => {
                    self.scanner.advance();
                    make_bin!(expr, self.additive()?, GtEq);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.relational()?;

        loop {
            match self.scanner.peek() {
                Some(TokenKind::EqEq) => {
                    self.scanner.advance();
                    make_bin!(expr, self.relational()?, Eq);
                }
                Some(TokenKind::NotEq) => {
                    self.scanner.advance();
                    make_bin!(expr, self.relational()?, NotEq);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while accept!(self.scanner, TokenKind::And) {
            self.scanner.advance();
            make_bin!(expr, self.equality()?, And);
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr = self.logical_and()?;

        while accept!(self.scanner, TokenKind::Or) {
            self.scanner.advance();
            make_bin!(expr, self.logical_and()?, Or);
        }

        Ok(expr)
    }

    #[inline]
    fn expr(&mut self) -> Result<Expr> {
        self.logical_or()
    }

    fn ty(&mut self) -> Result<Type> {
        let ty = match self.scanner.peek() {
            Some(TokenKind::IntType) => Type::Int,
            Some(TokenKind::RealType) => Type::Real,
            Some(TokenKind::BoolType) => Type::Bool,
            Some(TokenKind::StringType) => Type::String,
            _ => return Err(self.unexpected("type (int, real, bool or string)")),
        };

        self.scanner.advance();

        Ok(ty)
    }

    fn return_type(&mut self) -> Result<Type> {
        if accept!(self.scanner, TokenKind::VoidType) {
            self.scanner.advance();
            return Ok(Type::Void);
        }

        self.ty()
            .map_err(|_| self.unexpected("return type (int, real, bool, string or void)"))
    }

    /// `var <type>: a, b;` or `var a = <expr>;`
    fn var_decl(&mut self) -> Result<VarDecl> {
        expect!(self, TokenKind::Var, "'var'");

        let decl = if accept!(self.scanner, TokenKind::Ident(_)) {
            let name = self.ident()?;
            expect!(self, TokenKind::Assign, "'='");
            let value = self.expr()?;

            VarDecl::Inferred { name, value }
        } else {
            let ty = self.ty()?;
            expect!(self, TokenKind::Colon, "':'");

            let mut names = vec![self.ident()?];

            while accept!(self.scanner, TokenKind::Comma) {
                self.scanner.advance();
                names.push(self.ident()?);
            }

            VarDecl::Typed { ty, names }
        };

        expect!(self, TokenKind::End, "';'");

        Ok(decl)
    }

    fn assign(&mut self) -> Result<Assign> {
        let target = self.ident()?;
        expect!(self, TokenKind::Assign, "'='");
        let value = self.expr()?;

        Ok(Assign {
            span: target.span.clone().ends(&value.span),
            target,
            value,
        })
    }

    /// `>> "prompt" # (a, b);`
    fn input(&mut self) -> Result<Input> {
        expect!(self, TokenKind::Input, "'>>'");
        let prompt = self.string_literal()?;
        expect!(self, TokenKind::Hash, "'#'");
        expect!(self, TokenKind::ParentLeft, "'('");

        let mut targets = vec![self.ident()?];

        while accept!(self.scanner, TokenKind::Comma) {
            self.scanner.advance();
            targets.push(self.ident()?);
        }

        expect!(self, TokenKind::ParentRight, "')'");
        expect!(self, TokenKind::End, "';'");

        Ok(Input { prompt, targets })
    }

    /// `<< "label" # (a, b);` or `<<! "label" # (a, b);`
    fn output(&mut self) -> Result<Output> {
        let newline = match self.scanner.peek() {
            Some(TokenKind::Output) => false,
            Some(TokenKind::OutputLine) => true,
            _ => return Err(self.unexpected("'<<' or '<<!'")),
        };

        self.scanner.advance();

        let label = self.string_literal()?;
        expect!(self, TokenKind::Hash, "'#'");
        let values = self.call_args()?;
        expect!(self, TokenKind::End, "';'");

        Ok(Output {
            label,
            values,
            newline,
        })
    }

    fn cond(&mut self) -> Result<Expr> {
        expect!(self, TokenKind::ParentLeft, "'('");
        let cond = self.expr()?;
        expect!(self, TokenKind::ParentRight, "')'");

        Ok(cond)
    }

    fn if_stmt(&mut self) -> Result<If> {
        expect!(self, TokenKind::If, "'if'");

        let cond = self.cond()?;
        let body = self.block()?;
        let mut branches = vec![CondBlock { cond, body }];

        while accept!(self.scanner, TokenKind::Elif) {
            self.scanner.advance();

            let cond = self.cond()?;
            let body = self.block()?;

            branches.push(CondBlock { cond, body });
        }

        let else_block = if accept!(self.scanner, TokenKind::Else) {
            self.scanner.advance();
            Some(self.block()?)
        } else {
            None
        };

        Ok(If {
            branches,
            else_block,
        })
    }

    fn while_stmt(&mut self) -> Result<While> {
        expect!(self, TokenKind::While, "'while'");

        let cond = self.cond()?;
        let body = self.block()?;

        Ok(While { cond, body })
    }

    /// `for ([assign]; [cond]; [assign]) { ... }`
    fn for_stmt(&mut self) -> Result<For> {
        expect!(self, TokenKind::For, "'for'");
        expect!(self, TokenKind::ParentLeft, "'('");

        let init = if accept!(self.scanner, TokenKind::End) {
            None
        } else {
            Some(self.assign()?)
        };

        expect!(self, TokenKind::End, "';'");

        let cond = if accept!(self.scanner, TokenKind::End) {
            None
        } else {
            Some(self.expr()?)
        };

        expect!(self, TokenKind::End, "';'");

        let update = if accept!(self.scanner, TokenKind::ParentRight) {
            None
        } else {
            Some(self.assign()?)
        };

        expect!(self, TokenKind::ParentRight, "')'");

        let body = self.block()?;

        Ok(For {
            init,
            cond,
            update,
            body,
        })
    }

    fn return_stmt(&mut self) -> Result<Option<Expr>> {
        expect!(self, TokenKind::Return, "'return'");

        let value = if accept!(self.scanner, TokenKind::End) {
            None
        } else {
            Some(self.expr()?)
        };

        expect!(self, TokenKind::End, "';'");

        Ok(value)
    }

    fn stmt(&mut self) -> Result<Stmt> {
        let span = self.scanner.span();

        let kind = match self.scanner.peek() {
            Some(TokenKind::Var) => StmtKind::Var(self.var_decl()?),
            Some(TokenKind::Input) => StmtKind::Input(self.input()?),
            Some(TokenKind::Output | TokenKind::OutputLine) => StmtKind::Output(self.output()?),
            Some(TokenKind::Return) => StmtKind::Return(self.return_stmt()?),
            Some(TokenKind::If) => StmtKind::If(self.if_stmt()?),
            Some(TokenKind::While) => StmtKind::While(self.while_stmt()?),
            Some(TokenKind::For) => StmtKind::For(self.for_stmt()?),
            Some(TokenKind::BracketLeft) => StmtKind::Block(self.block()?),
            Some(TokenKind::Ident(_)) => match self.scanner.peek_nth(1) {
                Some(TokenKind::ParentLeft) => {
                    let call = self.call()?;
                    expect!(self, TokenKind::End, "';'");
                    StmtKind::Call(call)
                }
                Some(TokenKind::Assign) => {
                    let assign = self.assign()?;
                    expect!(self, TokenKind::End, "';'");
                    StmtKind::Assign(assign)
                }
                _ => {
                    self.scanner.advance();
                    return Err(self.unexpected("'=' or '('"));
                }
            },
            _ => return Err(self.unexpected("statement")),
        };

        Ok(Stmt::new(span.ends(&self.scanner.prev_span()), kind))
    }

    fn block(&mut self) -> Result<Block> {
        let span = self.scanner.span();
        expect!(self, TokenKind::BracketLeft, "'{'");

        let mut stmts = vec![];

        while !accept!(self.scanner, TokenKind::BracketRight) {
            if self.scanner.peek().is_none() {
                return Err(self.unexpected("'}'"));
            }

            stmts.push(self.stmt()?);
        }

        self.scanner.advance();

        Ok(Block {
            span: span.ends(&self.scanner.prev_span()),
            stmts,
        })
    }

    fn param(&mut self) -> Result<Param> {
        let span = self.scanner.span();
        let ty = self.ty()?;
        expect!(self, TokenKind::Colon, "':'");
        let name = self.ident()?;

        Ok(Param {
            span: span.ends(&name.span),
            ty,
            name,
        })
    }

    /// `func <type> -> <name>(<type>: <name>, ...) { ... }`
    fn func(&mut self) -> Result<FnDecl> {
        expect!(self, TokenKind::Func, "'func'");
        let return_type = self.return_type()?;
        expect!(self, TokenKind::Arrow, "'->'");
        let name = self.ident()?;
        expect!(self, TokenKind::ParentLeft, "'('");

        let mut params = vec![];

        if !accept!(self.scanner, TokenKind::ParentRight) {
            loop {
                params.push(self.param()?);

                if !accept!(self.scanner, TokenKind::Comma) {
                    break;
                }

                self.scanner.advance();
            }
        }

        expect!(self, TokenKind::ParentRight, "')'");

        let body = self.block()?;

        Ok(FnDecl {
            name,
            return_type,
            params,
            body,
        })
    }

    pub fn parse(mut self) -> Result<Program> {
        let mut decls = vec![];

        while let Some(token) = self.scanner.peek() {
            let begin = self.scanner.span();

            let kind = match token {
                TokenKind::Func => DeclKind::Fn(self.func()?),
                TokenKind::Var => DeclKind::Var(self.var_decl()?),
                _ => return Err(self.unexpected("'func' or 'var'")),
            };

            decls.push(Decl::new(begin.ends(&self.scanner.prev_span()), kind));
        }

        debug!(decls = decls.len(), "parsed program");

        Ok(Program { decls })
    }
}

/// Parses a complete token stream into a [`Program`].
pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::frontend::syntax::tokenize;

    fn parse(input: &str) -> Result<Program> {
        Parser::new(tokenize(input).unwrap()).parse()
    }

    fn parse_err(input: &str) -> SyntaxError {
        parse(input).unwrap_err()
    }

    fn body(input: &str) -> Vec<Stmt> {
        let program = parse(&format!("func void -> main() {{ {} }}", input)).unwrap();

        match program.decls.into_iter().next().map(|decl| decl.kind) {
            Some(DeclKind::Fn(func)) => func.body.stmts,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(parse(""), Ok(Program::default()));
    }

    #[test]
    fn test_no_global_expr() {
        let err = parse_err("10;");

        assert_eq!(err.expected, "'func' or 'var'");
        assert_eq!(err.found, "integer literal '10'");
        assert_eq!(err.span, Span::new(1, 1, 0, 2));
    }

    #[test]
    fn test_func_signature() {
        let program = parse("func int -> add(int: a, real: b) { return a; }").unwrap();

        match &program.decls[0].kind {
            DeclKind::Fn(func) => {
                assert_eq!(func.name.name, "add");
                assert_eq!(func.return_type, Type::Int);
                assert_eq!(
                    func.params
                        .iter()
                        .map(|p| (p.ty, p.name.name.as_str()))
                        .collect::<Vec<_>>(),
                    vec![(Type::Int, "a"), (Type::Real, "b")]
                );
                assert_eq!(func.body.stmts.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_var_decls() {
        let program = parse("var int: a, b; var c = 2.5;").unwrap();

        assert!(matches!(
            &program.decls[0].kind,
            DeclKind::Var(VarDecl::Typed { ty: Type::Int, names }) if names.len() == 2
        ));
        assert!(matches!(
            &program.decls[1].kind,
            DeclKind::Var(VarDecl::Inferred { name, value })
                if name.name == "c" && value.kind == ExprKind::Literal(LiteralKind::Real(2.5))
        ));
    }

    #[test]
    fn test_precedence() {
        let stmts = body("x = 1 + 2 * 3 < 4 && !b || c;");

        let StmtKind::Assign(assign) = &stmts[0].kind else {
            panic!("expected assignment");
        };

        let ExprKind::Binary(or) = &assign.value.kind else {
            panic!("expected binary");
        };
        assert_eq!(or.op, BinaryOp::Or);

        let ExprKind::Binary(and) = &or.left.kind else {
            panic!("expected binary");
        };
        assert_eq!(and.op, BinaryOp::And);
        assert!(matches!(and.right.kind, ExprKind::Unary(UnaryOp::Not, _)));

        let ExprKind::Binary(lt) = &and.left.kind else {
            panic!("expected binary");
        };
        assert_eq!(lt.op, BinaryOp::Lt);

        let ExprKind::Binary(add) = &lt.left.kind else {
            panic!("expected binary");
        };
        assert_eq!(add.op, BinaryOp::Add);
        assert!(matches!(&add.right.kind, ExprKind::Binary(mul) if mul.op == BinaryOp::Mul));
    }

    #[test_case("x = f(1, 2);", true; "call")]
    #[test_case("x = f;", false; "bare identifier")]
    #[test_case("x = f + (1);", false; "identifier before group")]
    fn test_call_or_ident(input: &str, is_call: bool) {
        let stmts = body(input);

        let StmtKind::Assign(assign) = &stmts[0].kind else {
            panic!("expected assignment");
        };

        match &assign.value.kind {
            ExprKind::Call(call) => {
                assert!(is_call);
                assert_eq!(call.name.name, "f");
                assert_eq!(call.args.len(), 2);
            }
            ExprKind::Ident(name) => {
                assert!(!is_call);
                assert_eq!(name, "f");
            }
            ExprKind::Binary(binary) => {
                assert!(!is_call);
                assert!(matches!(&binary.left.kind, ExprKind::Ident(name) if name == "f"));
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else() {
        let stmts = body("if (a) { x = 1; } elif (b) { x = 2; } elif (c) { } else { x = 3; }");

        match &stmts[0].kind {
            StmtKind::If(if_stmt) => {
                assert_eq!(if_stmt.branches.len(), 3);
                assert!(if_stmt.else_block.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_for_optional_clauses() {
        let stmts = body("for (;;) { } for (i = 0; i < 3; i = i + 1) { }");

        assert!(matches!(
            &stmts[0].kind,
            StmtKind::For(For { init: None, cond: None, update: None, .. })
        ));
        assert!(matches!(
            &stmts[1].kind,
            StmtKind::For(For { init: Some(_), cond: Some(_), update: Some(_), .. })
        ));
    }

    #[test]
    fn test_io_statements() {
        let stmts = body(r#">> "n: " # (a, b); << "x" # (a + 1, "s"); <<! "done" # ();"#);

        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Input(Input { prompt, targets }) if prompt == "n: " && targets.len() == 2
        ));
        assert!(matches!(
            &stmts[1].kind,
            StmtKind::Output(Output { values, newline: false, .. }) if values.len() == 2
        ));
        assert!(matches!(
            &stmts[2].kind,
            StmtKind::Output(Output { values, newline: true, .. }) if values.is_empty()
        ));
    }

    #[test_case(r#">> "x" (n);"#, "'#'"; "input without hash")]
    #[test_case(r#">> "x" # n;"#, "'('"; "input without parentheses")]
    #[test_case(r#">> "x" # ();"#, "identifier"; "input without targets")]
    #[test_case(r#">> # (n);"#, "string literal"; "input without prompt")]
    #[test_case(r#"<< "x" (n);"#, "'#'"; "output without hash")]
    #[test_case(r#"<<! "x" # n;"#, "'('"; "output without parentheses")]
    #[test_case(r#"<<! "x";"#, "'#'"; "output without list")]
    #[test_case("x = 1", "';'"; "missing terminator")]
    #[test_case("if (a) x = 1;", "'{'"; "if without braces")]
    #[test_case("while (a) x = 1;", "'{'"; "while without braces")]
    #[test_case("if (a) { } else x = 1;", "'{'"; "else without braces")]
    #[test_case("var x;", "'='"; "var without type")]
    #[test_case("var int x;", "':'"; "var without colon")]
    #[test_case("x;", "'=' or '('"; "bare identifier")]
    fn test_syntax_error(source: &str, expected: &str) {
        let err = parse_err(&format!("func void -> main() {{ {} }}", source));
        assert_eq!(err.expected, expected);
    }

    #[test]
    fn test_func_shape() {
        assert_eq!(
            parse_err("func f() { }").expected,
            "return type (int, real, bool, string or void)"
        );
        assert_eq!(parse_err("func int f() { }").expected, "'->'");
        assert_eq!(parse_err("func int -> f(n) { }").expected, "type (int, real, bool or string)");
        assert_eq!(parse_err("func int -> f(int n) { }").expected, "':'");
        assert_eq!(parse_err("func void -> f() {").found, "end of input");
    }

    #[test]
    fn test_spans() {
        let stmts = body("return;");
        assert_eq!(stmts[0].span, Span::new(1, 23, 22, 29));
    }
}
