//! Context rewriting.
//!
//! Assignment and deletion targets are parsed in load context first (the
//! parser does not know a tuple is a target until it sees `=`); this pass
//! rewrites `ctx` on every node kind that carries one, recursing through
//! containers.

use kiwi_common::node::ExprId;

use crate::ast::{Ast, ExprContext, ExprKind};

/// Set the context of `expr` (and its target-shaped children) to `ctx`.
pub fn set_context(ast: &mut Ast, expr: ExprId, ctx: ExprContext) {
    let children: Vec<ExprId> = match &mut ast.expr_mut(expr).kind {
        ExprKind::Name { ctx: slot, .. }
        | ExprKind::Attribute { ctx: slot, .. }
        | ExprKind::Subscript { ctx: slot, .. } => {
            *slot = ctx;
            Vec::new()
        }
        ExprKind::Starred { ctx: slot, value } => {
            *slot = ctx;
            vec![*value]
        }
        ExprKind::ListExpr { ctx: slot, elts } | ExprKind::TupleExpr { ctx: slot, elts } => {
            *slot = ctx;
            elts.clone()
        }
        _ => Vec::new(),
    };

    for child in children {
        set_context(ast, child, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiwi_common::span::Span;

    #[test]
    fn tuple_targets_rewrite_recursively() {
        let mut ast = Ast::new();
        let a = ast.add_expr(ExprKind::name_load("a"), Span::point(0));
        let b = ast.add_expr(ExprKind::name_load("b"), Span::point(0));
        let star = ast.add_expr(
            ExprKind::Starred {
                value: b,
                ctx: ExprContext::Load,
            },
            Span::point(0),
        );
        let tuple = ast.add_expr(
            ExprKind::TupleExpr {
                elts: vec![a, star],
                ctx: ExprContext::Load,
            },
            Span::point(0),
        );

        set_context(&mut ast, tuple, ExprContext::Store);

        assert!(matches!(
            ast.expr(tuple).kind,
            ExprKind::TupleExpr {
                ctx: ExprContext::Store,
                ..
            }
        ));
        assert!(matches!(
            ast.expr(a).kind,
            ExprKind::Name {
                ctx: ExprContext::Store,
                ..
            }
        ));
        assert!(matches!(
            ast.expr(b).kind,
            ExprKind::Name {
                ctx: ExprContext::Store,
                ..
            }
        ));
    }

    #[test]
    fn non_target_kinds_are_untouched() {
        let mut ast = Ast::new();
        let c = ast.add_expr(
            ExprKind::constant(kiwi_common::value::Value::I32(1)),
            Span::point(0),
        );
        set_context(&mut ast, c, ExprContext::Del);
        assert!(matches!(ast.expr(c).kind, ExprKind::Constant { .. }));
    }
}
