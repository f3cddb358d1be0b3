//! Uniform dispatch over the AST families.
//!
//! Rust's exhaustive `match` is the dispatch mechanism: every pass matches
//! on the kind enums, and adding a kind breaks every pass at compile time.
//! This module provides the shared pieces: the [`AstVisitor`] trait that
//! names a pass's per-family return types, a recursion-depth ceiling, and
//! [`for_each_child`], the one place that knows how to enumerate the direct
//! children of any node.

use kiwi_common::node::{ExprId, NodeId, PatId, StmtId};

use crate::ast::{Ast, ExprKind, Module, PatKind, StmtKind};

/// Ceiling for recursive passes; trees deeper than this indicate a cycle or
/// runaway input, and passes bail out instead of overflowing the stack.
pub const MAX_VISITOR_RECURSION_DEPTH: usize = 256;

/// A pass over a module, with one return type per node family.
///
/// Implementations dispatch with an exhaustive `match` on the node's kind;
/// a missing kind is a compile error, never a runtime fallthrough.
pub trait AstVisitor {
    type ModRet;
    type StmtRet;
    type ExprRet;
    type PatRet;

    fn visit_module(&mut self, module: &Module) -> Self::ModRet;
    fn visit_stmt(&mut self, module: &Module, id: StmtId, depth: usize) -> Self::StmtRet;
    fn visit_expr(&mut self, module: &Module, id: ExprId, depth: usize) -> Self::ExprRet;
    fn visit_pat(&mut self, module: &Module, id: PatId, depth: usize) -> Self::PatRet;
}

/// Call `f` once for each direct child of `node`, in source order.
///
/// Supporting records (arguments, handlers, comprehensions, cases) are
/// flattened into their node children here so traversal-only passes (cycle
/// detection, context rewriting, searches) need no knowledge of them.
pub fn for_each_child(ast: &Ast, node: NodeId, f: &mut dyn FnMut(NodeId)) {
    match node {
        NodeId::Expr(id) => for_each_expr_child(ast, id, f),
        NodeId::Stmt(id) => for_each_stmt_child(ast, id, f),
        NodeId::Pat(id) => for_each_pat_child(ast, id, f),
    }
}

fn expr(f: &mut dyn FnMut(NodeId), id: ExprId) {
    f(NodeId::Expr(id));
}

fn exprs(f: &mut dyn FnMut(NodeId), ids: &[ExprId]) {
    for &id in ids {
        f(NodeId::Expr(id));
    }
}

fn opt_expr(f: &mut dyn FnMut(NodeId), id: Option<ExprId>) {
    if let Some(id) = id {
        f(NodeId::Expr(id));
    }
}

fn stmts(f: &mut dyn FnMut(NodeId), ids: &[StmtId]) {
    for &id in ids {
        f(NodeId::Stmt(id));
    }
}

fn pats(f: &mut dyn FnMut(NodeId), ids: &[PatId]) {
    for &id in ids {
        f(NodeId::Pat(id));
    }
}

fn arguments(f: &mut dyn FnMut(NodeId), args: &crate::ast::Arguments) {
    for arg in args.positional() {
        opt_expr(f, arg.annotation);
    }
    if let Some(vararg) = &args.vararg {
        opt_expr(f, vararg.annotation);
    }
    for arg in &args.kwonlyargs {
        opt_expr(f, arg.annotation);
    }
    for default in &args.kw_defaults {
        opt_expr(f, *default);
    }
    if let Some(kwarg) = &args.kwarg {
        opt_expr(f, kwarg.annotation);
    }
    exprs(f, &args.defaults);
}

fn for_each_expr_child(ast: &Ast, id: ExprId, f: &mut dyn FnMut(NodeId)) {
    match &ast.expr(id).kind {
        ExprKind::Name { .. }
        | ExprKind::Constant { .. }
        | ExprKind::BuiltinType { .. }
        | ExprKind::ClassType { .. }
        | ExprKind::Placeholder
        | ExprKind::Exported { .. } => {}

        ExprKind::BinOp { left, right, .. } => {
            expr(f, *left);
            expr(f, *right);
        }
        ExprKind::BoolOp { values, .. } => exprs(f, values),
        ExprKind::UnaryOp { operand, .. } => expr(f, *operand),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            expr(f, *left);
            exprs(f, comparators);
        }
        ExprKind::Call {
            func,
            args,
            varargs,
            keywords,
            ..
        } => {
            expr(f, *func);
            exprs(f, args);
            exprs(f, varargs);
            for kw in keywords {
                expr(f, kw.value);
            }
        }
        ExprKind::Attribute { value, .. } => expr(f, *value),
        ExprKind::Subscript { value, slice, .. } => {
            expr(f, *value);
            expr(f, *slice);
        }
        ExprKind::Starred { value, .. } => expr(f, *value),
        ExprKind::IfExp { test, body, orelse } => {
            expr(f, *test);
            expr(f, *body);
            expr(f, *orelse);
        }
        ExprKind::Lambda { args, body } => {
            arguments(f, args);
            expr(f, *body);
        }
        ExprKind::NamedExpr { target, value } => {
            expr(f, *target);
            expr(f, *value);
        }
        ExprKind::Await { value } => expr(f, *value),
        ExprKind::Yield { value } => opt_expr(f, *value),
        ExprKind::YieldFrom { value } => expr(f, *value),
        ExprKind::ListExpr { elts, .. }
        | ExprKind::TupleExpr { elts, .. }
        | ExprKind::SetExpr { elts } => exprs(f, elts),
        ExprKind::DictExpr { keys, values } => {
            exprs(f, keys);
            exprs(f, values);
        }
        ExprKind::ListComp { elt, generators }
        | ExprKind::SetComp { elt, generators }
        | ExprKind::GeneratorExp { elt, generators } => {
            expr(f, *elt);
            for gen in generators {
                expr(f, gen.target);
                expr(f, gen.iter);
                exprs(f, &gen.ifs);
            }
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            expr(f, *key);
            expr(f, *value);
            for gen in generators {
                expr(f, gen.target);
                expr(f, gen.iter);
                exprs(f, &gen.ifs);
            }
        }
        ExprKind::Slice { lower, upper, step } => {
            opt_expr(f, *lower);
            opt_expr(f, *upper);
            opt_expr(f, *step);
        }
        ExprKind::JoinedStr { values } => exprs(f, values),
        ExprKind::FormattedValue {
            value, format_spec, ..
        } => {
            expr(f, *value);
            opt_expr(f, *format_spec);
        }
        ExprKind::Arrow { args, returns, defaults, .. } => {
            exprs(f, args);
            opt_expr(f, *returns);
            for default in defaults {
                opt_expr(f, *default);
            }
        }
        ExprKind::DictType { key, value } => {
            expr(f, *key);
            expr(f, *value);
        }
        ExprKind::ArrayType { item } | ExprKind::SetType { item } => expr(f, *item),
        ExprKind::TupleType { types } => exprs(f, types),
    }
}

fn for_each_stmt_child(ast: &Ast, id: StmtId, f: &mut dyn FnMut(NodeId)) {
    match &ast.stmt(id).kind {
        StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Comment { .. }
        | StmtKind::InvalidStatement { .. }
        | StmtKind::Global { .. }
        | StmtKind::Nonlocal { .. }
        | StmtKind::Import { .. }
        | StmtKind::ImportFrom { .. } => {}

        StmtKind::FunctionDef {
            args,
            body,
            decorators,
            returns,
            ..
        } => {
            arguments(f, args);
            opt_expr(f, *returns);
            for deco in decorators {
                expr(f, deco.expr);
            }
            stmts(f, body);
        }
        StmtKind::ClassDef {
            bases,
            keywords,
            body,
            decorators,
            ..
        } => {
            exprs(f, bases);
            for kw in keywords {
                expr(f, kw.value);
            }
            for deco in decorators {
                expr(f, deco.expr);
            }
            stmts(f, body);
        }
        StmtKind::Return { value } => opt_expr(f, *value),
        StmtKind::Assign { targets, value } => {
            exprs(f, targets);
            expr(f, *value);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            expr(f, *target);
            expr(f, *annotation);
            opt_expr(f, *value);
        }
        StmtKind::AugAssign { target, value, .. } => {
            expr(f, *target);
            expr(f, *value);
        }
        StmtKind::Delete { targets } => exprs(f, targets),
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            expr(f, *target);
            expr(f, *iter);
            stmts(f, body);
            stmts(f, orelse);
        }
        StmtKind::While { test, body, orelse } => {
            expr(f, *test);
            stmts(f, body);
            stmts(f, orelse);
        }
        StmtKind::If {
            test,
            body,
            tests,
            bodies,
            orelse,
            ..
        } => {
            expr(f, *test);
            stmts(f, body);
            exprs(f, tests);
            for arm in bodies {
                stmts(f, arm);
            }
            stmts(f, orelse);
        }
        StmtKind::With { items, body, .. } => {
            for item in items {
                expr(f, item.context_expr);
                opt_expr(f, item.optional_vars);
            }
            stmts(f, body);
        }
        StmtKind::Raise { exc, cause } => {
            opt_expr(f, *exc);
            opt_expr(f, *cause);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            stmts(f, body);
            for handler in handlers {
                opt_expr(f, handler.ty);
                stmts(f, &handler.body);
            }
            stmts(f, orelse);
            stmts(f, finalbody);
        }
        StmtKind::Assert { test, msg } => {
            expr(f, *test);
            opt_expr(f, *msg);
        }
        StmtKind::Expr { value } => expr(f, *value),
        StmtKind::Match { subject, cases } => {
            expr(f, *subject);
            for case in cases {
                f(NodeId::Pat(case.pattern));
                opt_expr(f, case.guard);
                stmts(f, &case.body);
            }
        }
        StmtKind::Inline { body } => stmts(f, body),
    }
}

fn for_each_pat_child(ast: &Ast, id: PatId, f: &mut dyn FnMut(NodeId)) {
    match &ast.pat(id).kind {
        PatKind::MatchSingleton { .. } | PatKind::MatchStar { .. } => {}
        PatKind::MatchValue { value } => expr(f, *value),
        PatKind::MatchSequence { patterns } | PatKind::MatchOr { patterns } => pats(f, patterns),
        PatKind::MatchMapping { keys, patterns, .. } => {
            exprs(f, keys);
            pats(f, patterns);
        }
        PatKind::MatchClass {
            cls,
            patterns,
            kwd_patterns,
            ..
        } => {
            expr(f, *cls);
            pats(f, patterns);
            pats(f, kwd_patterns);
        }
        PatKind::MatchAs { pattern, .. } => {
            if let Some(p) = pattern {
                f(NodeId::Pat(*p));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiwi_common::span::Span;
    use kiwi_common::value::Value;

    #[test]
    fn children_enumerated_in_source_order() {
        let mut ast = Ast::new();
        let one = ast.add_expr(ExprKind::constant(Value::I32(1)), Span::point(0));
        let two = ast.add_expr(ExprKind::constant(Value::I32(2)), Span::point(0));
        let add = ast.add_expr(
            ExprKind::BinOp {
                left: one,
                op: kiwi_common::op::BinaryOperator::Add,
                right: two,
                native_op: None,
            },
            Span::point(0),
        );

        let mut seen = Vec::new();
        for_each_child(&ast, NodeId::Expr(add), &mut |child| seen.push(child));
        assert_eq!(seen, vec![NodeId::Expr(one), NodeId::Expr(two)]);
    }
}
