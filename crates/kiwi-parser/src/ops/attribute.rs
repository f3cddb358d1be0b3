//! Attribute lookup on class definitions.
//!
//! `getattr` scans the class's recorded attribute list first (filled by
//! sema), then falls back to walking the class body for a matching
//! function, nested class, assignment, or annotated assignment.

use kiwi_common::node::StmtId;

use crate::ast::{Ast, ExprKind, StmtKind};

/// Find the body statement defining `name` on the class `cls`.
///
/// Returns `None` when `cls` is not a `ClassDef` or has no such member.
pub fn getattr(ast: &Ast, cls: StmtId, name: &str) -> Option<StmtId> {
    let StmtKind::ClassDef {
        attributes, body, ..
    } = &ast.stmt(cls).kind
    else {
        return None;
    };

    if let Some(attr) = attributes.iter().find(|attr| attr.name == name) {
        return Some(attr.stmt);
    }

    body.iter().copied().find(|&stmt| defines(ast, stmt, name))
}

/// Whether the class has a member called `name`.
pub fn hasattr(ast: &Ast, cls: StmtId, name: &str) -> bool {
    getattr(ast, cls, name).is_some()
}

/// Whether one body statement defines `name`.
fn defines(ast: &Ast, stmt: StmtId, name: &str) -> bool {
    match &ast.stmt(stmt).kind {
        StmtKind::FunctionDef { name: n, .. } | StmtKind::ClassDef { name: n, .. } => n == name,
        StmtKind::Assign { targets, .. } => targets
            .iter()
            .any(|&target| is_name(ast, target, name)),
        StmtKind::AnnAssign { target, .. } => is_name(ast, *target, name),
        _ => false,
    }
}

fn is_name(ast: &Ast, expr: kiwi_common::node::ExprId, name: &str) -> bool {
    matches!(&ast.expr(expr).kind, ExprKind::Name { id, .. } if id == name)
}
