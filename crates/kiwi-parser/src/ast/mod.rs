//! The Kiwi AST: arena-owned nodes addressed by typed ids.
//!
//! Each [`Module`] owns an [`Ast`] arena holding every node parsed for it.
//! Child links are ids into the same arena; the optional parent link points
//! back up purely for diagnostics. Nodes live until the arena is dropped.
//!
//! Resolver passes write into nodes in place: sema fills `store_id`/
//! `load_id` on names and native handlers on operators, the VM compiler
//! fills `jump_id` on calls. Structural equality ignores all of these.

pub mod expr;
pub mod pat;
pub mod stmt;

pub use expr::{ExprContext, ExprKind};
pub use pat::PatKind;
pub use stmt::StmtKind;

use kiwi_common::node::{ExprId, NodeFamily, NodeId, PatId, StmtId};
use kiwi_common::span::Span;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Diagnostic back-link; never ownership.
    pub parent: Option<NodeId>,
}

/// A statement node. The optional trailing comment is the `# ...` found on
/// the same source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub comment: Option<String>,
}

/// A match pattern node.
#[derive(Debug, Clone, PartialEq)]
pub struct Pat {
    pub kind: PatKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}

impl Expr {
    pub fn family(&self) -> NodeFamily {
        NodeFamily::Expression
    }
}

impl Stmt {
    pub fn family(&self) -> NodeFamily {
        NodeFamily::Statement
    }
}

impl Pat {
    pub fn family(&self) -> NodeFamily {
        NodeFamily::Pattern
    }
}

/// The per-module arena. All node storage lives here; ids are indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    pats: Vec<Pat>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr {
            kind,
            span,
            parent: None,
        });
        id
    }

    pub fn add_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(Stmt {
            kind,
            span,
            parent: None,
            comment: None,
        });
        id
    }

    pub fn add_pat(&mut self, kind: PatKind, span: Span) -> PatId {
        let id = PatId(self.pats.len() as u32);
        self.pats.push(Pat {
            kind,
            span,
            parent: None,
        });
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.index()]
    }

    pub fn pat(&self, id: PatId) -> &Pat {
        &self.pats[id.index()]
    }

    pub fn pat_mut(&mut self, id: PatId) -> &mut Pat {
        &mut self.pats[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    /// Record `parent` as the diagnostic parent of `child`.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        match child {
            NodeId::Expr(id) => self.exprs[id.index()].parent = Some(parent),
            NodeId::Stmt(id) => self.stmts[id.index()].parent = Some(parent),
            NodeId::Pat(id) => self.pats[id.index()].parent = Some(parent),
        }
    }

    /// Walk parent links from an expression up to its enclosing statement.
    pub fn parent_stmt(&self, expr: ExprId) -> Option<StmtId> {
        let mut current = self.expr(expr).parent;
        let mut hops = 0;
        while let Some(node) = current {
            match node {
                NodeId::Stmt(id) => return Some(id),
                NodeId::Expr(id) => current = self.expr(id).parent,
                NodeId::Pat(id) => current = self.pat(id).parent,
            }
            // Parent links may be cyclic in damaged trees; give up rather
            // than spin.
            hops += 1;
            if hops > self.exprs.len() + self.stmts.len() + 1 {
                return None;
            }
        }
        None
    }
}

/// Which toplevel form a module holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// A source file: a sequence of statements.
    Module,
    /// A REPL entry: statements evaluated for their value.
    Interactive,
    /// A single expression.
    Expression,
    /// A function signature used as a type.
    FunctionType,
}

/// A parsed module: the arena plus the toplevel statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub kind: ModuleKind,
    pub ast: Ast,
    pub body: Vec<StmtId>,
    pub docstring: Option<Docstring>,
    pub file_name: String,
}

impl Module {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            kind: ModuleKind::Module,
            ast: Ast::new(),
            body: Vec::new(),
            docstring: None,
            file_name: file_name.into(),
        }
    }

    pub fn family(&self) -> NodeFamily {
        NodeFamily::Module
    }
}

// ── Supporting records (not standalone nodes) ──────────────────────────

/// One formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub arg: String,
    pub annotation: Option<ExprId>,
}

/// The full argument specification of a function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    pub posonlyargs: Vec<Arg>,
    pub args: Vec<Arg>,
    pub vararg: Option<Arg>,
    pub kwonlyargs: Vec<Arg>,
    pub kw_defaults: Vec<Option<ExprId>>,
    pub kwarg: Option<Arg>,
    pub defaults: Vec<ExprId>,
}

impl Arguments {
    pub fn is_empty(&self) -> bool {
        self.posonlyargs.is_empty()
            && self.args.is_empty()
            && self.vararg.is_none()
            && self.kwonlyargs.is_empty()
            && self.kwarg.is_none()
    }

    /// Positional parameters in declaration order (posonly then regular).
    pub fn positional(&self) -> impl Iterator<Item = &Arg> {
        self.posonlyargs.iter().chain(self.args.iter())
    }

    /// Default for the positional parameter at `index`, if declared.
    /// Defaults align with the tail of the positional list.
    pub fn positional_default(&self, index: usize) -> Option<ExprId> {
        let total = self.posonlyargs.len() + self.args.len();
        let without_default = total - self.defaults.len().min(total);
        if index >= without_default {
            self.defaults.get(index - without_default).copied()
        } else {
            None
        }
    }
}

/// An import alias: `name` or `name as asname`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

/// A keyword argument at a call site.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: ExprId,
}

/// One `with` item: the context expression and its optional binding.
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context_expr: ExprId,
    pub optional_vars: Option<ExprId>,
}

/// One `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub ty: Option<ExprId>,
    pub name: Option<String>,
    pub body: Vec<StmtId>,
    pub comment: Option<String>,
}

/// One `case` arm of a `match`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: PatId,
    pub guard: Option<ExprId>,
    pub body: Vec<StmtId>,
    pub comment: Option<String>,
}

/// An `@expr` decorator line.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub expr: ExprId,
    pub comment: Option<String>,
}

/// A docstring attached to a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Docstring {
    pub text: String,
    pub comment: Option<String>,
}

/// One `for target in iter [if cond]*` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: ExprId,
    pub iter: ExprId,
    pub ifs: Vec<ExprId>,
    pub is_async: bool,
}

/// An attribute recorded on a class during sema: annotated/assigned names,
/// methods, nested classes, and `self.x = ...` finds from `__init__`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAttr {
    pub name: String,
    pub stmt: StmtId,
    pub ty: Option<ExprId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiwi_common::value::Value;

    #[test]
    fn arena_hands_out_sequential_ids() {
        let mut ast = Ast::new();
        let a = ast.add_expr(
            ExprKind::Constant {
                value: Value::I32(1),
            },
            Span::point(0),
        );
        let b = ast.add_expr(
            ExprKind::Constant {
                value: Value::I32(2),
            },
            Span::point(0),
        );
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(ast.expr_count(), 2);
    }

    #[test]
    fn parent_stmt_walks_up() {
        let mut ast = Ast::new();
        let value = ast.add_expr(
            ExprKind::Constant {
                value: Value::I32(1),
            },
            Span::point(0),
        );
        let stmt = ast.add_stmt(StmtKind::Expr { value }, Span::point(0));
        ast.set_parent(NodeId::Expr(value), NodeId::Stmt(stmt));
        assert_eq!(ast.parent_stmt(value), Some(stmt));
    }

    #[test]
    fn families_match_kinds() {
        let mut ast = Ast::new();
        let e = ast.add_expr(
            ExprKind::Name {
                id: "x".into(),
                ctx: ExprContext::Load,
                store_id: None,
                load_id: None,
            },
            Span::point(0),
        );
        let s = ast.add_stmt(StmtKind::Pass, Span::point(0));
        assert_eq!(ast.expr(e).family(), NodeFamily::Expression);
        assert_eq!(ast.stmt(s).family(), NodeFamily::Statement);
    }
}
