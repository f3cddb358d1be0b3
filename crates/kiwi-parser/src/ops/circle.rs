//! Cycle detection over the AST.
//!
//! Child links should form a tree; a node reachable twice means a damaged
//! arena (typically from an editing pass gone wrong). This is a debug check
//! run around sema and evaluation: it tolerates the cycle and reports it
//! rather than hanging. `Name` nodes are exempt because sema deliberately
//! shares type references.

use kiwi_common::node::NodeId;

use crate::ast::{ExprKind, Module};
use crate::visitor::for_each_child;

/// Whether any non-`Name` node is reachable through two different paths.
pub fn has_circle(module: &Module) -> bool {
    let mut seen: Vec<NodeId> = Vec::new();
    let mut found = false;
    for &stmt in &module.body {
        visit(module, NodeId::Stmt(stmt), &mut seen, &mut found, 0);
        if found {
            break;
        }
    }
    found
}

fn visit(module: &Module, node: NodeId, seen: &mut Vec<NodeId>, found: &mut bool, depth: usize) {
    if *found || depth > crate::visitor::MAX_VISITOR_RECURSION_DEPTH {
        *found = true;
        return;
    }

    // Type references created by sema alias freely; skip them.
    if let NodeId::Expr(id) = node {
        if matches!(module.ast.expr(id).kind, ExprKind::Name { .. }) {
            return;
        }
    }

    if seen.contains(&node) {
        *found = true;
        return;
    }
    seen.push(node);

    for_each_child(&module.ast, node, &mut |child| {
        visit(module, child, seen, found, depth + 1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ast, ExprKind, Module, StmtKind};
    use kiwi_common::span::Span;
    use kiwi_common::value::Value;

    #[test]
    fn tree_has_no_circle() {
        let mut module = Module::new("<test>");
        let one = module
            .ast
            .add_expr(ExprKind::constant(Value::I32(1)), Span::point(0));
        let stmt = module
            .ast
            .add_stmt(StmtKind::Expr { value: one }, Span::point(0));
        module.body.push(stmt);
        assert!(!has_circle(&module));
    }

    #[test]
    fn shared_node_is_a_circle() {
        let mut module = Module::new("<test>");
        let shared = module
            .ast
            .add_expr(ExprKind::constant(Value::I32(1)), Span::point(0));
        // The same constant appears as both operands.
        let add = module.ast.add_expr(
            ExprKind::BinOp {
                left: shared,
                op: kiwi_common::op::BinaryOperator::Add,
                right: shared,
                native_op: None,
            },
            Span::point(0),
        );
        let stmt = module
            .ast
            .add_stmt(StmtKind::Expr { value: add }, Span::point(0));
        module.body.push(stmt);
        assert!(has_circle(&module));
    }

    #[test]
    fn shared_name_nodes_are_tolerated() {
        let mut module = Module::new("<test>");
        let name = module
            .ast
            .add_expr(ExprKind::name_load("x"), Span::point(0));
        let add = module.ast.add_expr(
            ExprKind::BinOp {
                left: name,
                op: kiwi_common::op::BinaryOperator::Add,
                right: name,
                native_op: None,
            },
            Span::point(0),
        );
        let stmt = module
            .ast
            .add_stmt(StmtKind::Expr { value: add }, Span::point(0));
        module.body.push(stmt);
        assert!(!has_circle(&module));
    }
}
