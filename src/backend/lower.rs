use crate::frontend::syntax::{LiteralKind, Span};
use crate::frontend::typed_ast::{Expr, ExprKind, For, Stmt, StmtKind};
use crate::frontend::Type;

/// Rewrites `for (init; cond; update) body` into
///
/// ```text
/// init;
/// while (cond) { body; update; }
/// ```
///
/// An absent condition becomes the literal `true`. The body keeps its scope,
/// the update runs after the last body statement of every iteration.
pub fn desugar_for(span: Span, for_stmt: For) -> Vec<Stmt> {
    let mut stmts = vec![];

    if let Some(init) = for_stmt.init {
        stmts.push(Stmt::new(init.span.clone(), StmtKind::Assign(init)));
    }

    let cond = for_stmt.cond.unwrap_or_else(|| {
        Expr::new(
            span.clone(),
            Type::Bool,
            ExprKind::Literal(LiteralKind::Bool(true)),
        )
    });

    let mut body = for_stmt.body;

    if let Some(update) = for_stmt.update {
        body.stmts
            .push(Stmt::new(update.span.clone(), StmtKind::Assign(update)));
    }

    stmts.push(Stmt::new(span, StmtKind::While { cond, body }));
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::syntax::{parse, tokenize};
    use crate::frontend::typed_ast::Program;
    use crate::frontend::Analyzer;

    fn first_for(source: &str) -> (Program, Span, For) {
        let program = Analyzer::new()
            .analyze(parse(tokenize(source).unwrap()).unwrap())
            .unwrap();
        let main = program.func("main").unwrap();
        let (span, for_stmt) = main
            .body
            .stmts
            .iter()
            .find_map(|stmt| match &stmt.kind {
                StmtKind::For(for_stmt) => Some((stmt.span.clone(), for_stmt.clone())),
                _ => None,
            })
            .unwrap();

        (program, span, for_stmt)
    }

    #[test]
    fn test_full_clauses() {
        let (program, span, for_stmt) = first_for(
            "func void -> main() { var int: i, s; for (i = 0; i < 3; i = i + 1) { s = s + i; } }",
        );
        let stmts = desugar_for(span, for_stmt);

        assert_eq!(stmts.len(), 2);

        let StmtKind::Assign(init) = &stmts[0].kind else {
            panic!("expected init assignment");
        };
        assert_eq!(program.symbol(init.symbol).name, "i");

        let StmtKind::While { cond, body } = &stmts[1].kind else {
            panic!("expected while loop");
        };
        assert_eq!(cond.ty, Type::Bool);
        assert_eq!(body.stmts.len(), 2);

        let StmtKind::Assign(first) = &body.stmts[0].kind else {
            panic!("expected body statement first");
        };
        assert_eq!(program.symbol(first.symbol).name, "s");

        let StmtKind::Assign(update) = &body.stmts[1].kind else {
            panic!("expected update last");
        };
        assert_eq!(program.symbol(update.symbol).name, "i");
    }

    #[test]
    fn test_empty_clauses() {
        let (_, span, for_stmt) =
            first_for("func void -> main() { for (;;) { <<! \"x\" # (); } }");
        let stmts = desugar_for(span, for_stmt);

        assert_eq!(stmts.len(), 1);

        let StmtKind::While { cond, body } = &stmts[0].kind else {
            panic!("expected while loop");
        };
        assert!(matches!(
            cond.kind,
            ExprKind::Literal(LiteralKind::Bool(true))
        ));
        assert_eq!(body.stmts.len(), 1);
    }

    #[test]
    fn test_body_scope_is_kept() {
        let (_, span, for_stmt) = first_for(
            "func void -> main() { var int: i; for (; i < 2; i = i + 1) { var int: t; } }",
        );
        let scope = for_stmt.body.scope;
        let stmts = desugar_for(span, for_stmt);

        let StmtKind::While { body, .. } = &stmts[0].kind else {
            panic!("expected while loop");
        };
        assert_eq!(body.scope, scope);
    }
}
