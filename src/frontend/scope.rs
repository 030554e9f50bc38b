use serde::Serialize;

use crate::frontend::syntax::Span;
use crate::frontend::{SemanticError, SemanticErrorKind, Type};

pub type ScopeId = usize;
pub type SymbolId = usize;

pub const GLOBAL_SCOPE: ScopeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Global,
    Fn,
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnSig {
    pub params: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function(FnSig),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    /// For functions this is the return type.
    pub ty: Type,
    pub kind: SymbolKind,
    pub scope: ScopeId,
    pub span: Span,
}

impl Symbol {
    pub fn is_global(&self) -> bool {
        self.scope == GLOBAL_SCOPE
    }

    pub fn signature(&self) -> Option<&FnSig> {
        match &self.kind {
            SymbolKind::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    locals: Vec<(String, SymbolId)>,
}

impl Scope {
    pub fn local(&self, name: &str) -> Option<SymbolId> {
        self.locals
            .iter()
            .find(|(local, _)| local == name)
            .map(|(_, id)| *id)
    }
}

/// Arena of scopes linked through parent handles, plus the symbols they bind.
pub struct ScopeList {
    current: ScopeId,
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl ScopeList {
    pub fn new() -> Self {
        Self {
            current: GLOBAL_SCOPE,
            scopes: vec![Scope {
                id: GLOBAL_SCOPE,
                kind: ScopeKind::Global,
                parent: None,
                locals: vec![],
            }],
            symbols: vec![],
        }
    }

    pub fn consume(self) -> (Vec<Scope>, Vec<Symbol>) {
        (self.scopes, self.symbols)
    }

    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn enter(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.scopes.len();

        self.scopes.push(Scope {
            id,
            kind,
            parent: Some(self.current),
            locals: vec![],
        });

        self.current = id;

        id
    }

    pub fn exit(&mut self) -> ScopeId {
        assert_ne!(self.current, GLOBAL_SCOPE);

        let id = self.current;
        self.current = self.scopes[id].parent.unwrap_or(GLOBAL_SCOPE);

        id
    }

    /// Drops back to `scope` after an aborted walk left nested scopes open.
    pub fn restore(&mut self, scope: ScopeId) {
        self.current = scope;
    }

    /// Resolves `name` from the current scope outwards.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope = Some(self.current);

        while let Some(id) = scope {
            if let Some(symbol) = self.scopes[id].local(name) {
                return Some(symbol);
            }

            scope = self.scopes[id].parent;
        }

        None
    }

    /// Binds `name` in the current scope. A name visible from here, whether
    /// bound in this scope or any enclosing one, can't be bound again.
    pub fn declare(
        &mut self,
        span: Span,
        name: &str,
        ty: Type,
        kind: SymbolKind,
    ) -> Result<SymbolId, SemanticError> {
        if let Some(existing) = self.lookup(name) {
            let existing = &self.symbols[existing];
            let place = if existing.scope == self.current {
                "in this scope"
            } else {
                "in an enclosing scope"
            };

            return Err(SemanticError::new(
                span,
                SemanticErrorKind::Redeclaration,
                format!(
                    "'{}' is already declared {} (at {}:{})",
                    name, place, existing.span.line, existing.span.column
                ),
            ));
        }

        let id = self.symbols.len();

        self.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            kind,
            scope: self.current,
            span,
        });
        self.scopes[self.current].locals.push((name.to_string(), id));

        Ok(id)
    }
}

impl Default for ScopeList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(scopes: &mut ScopeList, name: &str) -> Result<SymbolId, SemanticError> {
        scopes.declare(Span::default(), name, Type::Int, SymbolKind::Variable)
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut scopes = ScopeList::new();
        let global = declare(&mut scopes, "g").unwrap();

        scopes.enter(ScopeKind::Fn);
        let local = declare(&mut scopes, "x").unwrap();
        scopes.enter(ScopeKind::Block);

        assert_eq!(scopes.lookup("g"), Some(global));
        assert_eq!(scopes.lookup("x"), Some(local));
        assert_eq!(scopes.lookup("y"), None);
    }

    #[test]
    fn test_no_shadowing() {
        let mut scopes = ScopeList::new();
        declare(&mut scopes, "g").unwrap();

        scopes.enter(ScopeKind::Fn);
        declare(&mut scopes, "x").unwrap();
        scopes.enter(ScopeKind::Block);

        let err = declare(&mut scopes, "g").unwrap_err();
        assert_eq!(err.kind, SemanticErrorKind::Redeclaration);
        assert!(err.message.contains("enclosing"));

        let err = declare(&mut scopes, "x").unwrap_err();
        assert_eq!(err.kind, SemanticErrorKind::Redeclaration);
    }

    #[test]
    fn test_sibling_scopes_may_reuse_names() {
        let mut scopes = ScopeList::new();
        scopes.enter(ScopeKind::Fn);

        scopes.enter(ScopeKind::Block);
        declare(&mut scopes, "i").unwrap();
        scopes.exit();

        scopes.enter(ScopeKind::Block);
        assert!(declare(&mut scopes, "i").is_ok());
        scopes.exit();

        let (scopes, symbols) = scopes.consume();
        assert_eq!(scopes.len(), 4);
        assert_eq!(symbols.len(), 2);
        assert_eq!(scopes[3].parent, Some(1));
    }
}
