//! Structural equality over AST nodes.
//!
//! Recursive and kind-keyed: two nodes are equal when their kinds match and
//! their payloads and children compare equal. Source spans, parent links,
//! trailing comments, and resolver fields (`store_id`, `load_id`,
//! `native_op`, `attrid`, `resolved`, `jump_id`, cached types) are ignored;
//! only shape and payload matter.

use kiwi_common::node::{ExprId, PatId, StmtId};

use crate::ast::{Arg, Arguments, Ast, ExprKind, Module, PatKind, StmtKind};

/// Structural equality of two modules: same toplevel shape, element-wise.
pub fn module_equal(a: &Module, b: &Module) -> bool {
    a.kind == b.kind && stmt_seq_equal(&a.ast, &a.body, &b.ast, &b.body)
}

fn opt_equal<T: Copy>(
    a: &Ast,
    x: Option<T>,
    b: &Ast,
    y: Option<T>,
    eq: impl Fn(&Ast, T, &Ast, T) -> bool,
) -> bool {
    match (x, y) {
        (None, None) => true,
        (Some(x), Some(y)) => eq(a, x, b, y),
        _ => false,
    }
}

fn expr_seq_equal(a: &Ast, xs: &[ExprId], b: &Ast, ys: &[ExprId]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(&x, &y)| expr_equal(a, x, b, y))
}

fn stmt_seq_equal(a: &Ast, xs: &[StmtId], b: &Ast, ys: &[StmtId]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(&x, &y)| stmt_equal(a, x, b, y))
}

fn pat_seq_equal(a: &Ast, xs: &[PatId], b: &Ast, ys: &[PatId]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(&x, &y)| pat_equal(a, x, b, y))
}

fn arg_equal(a: &Ast, x: &Arg, b: &Ast, y: &Arg) -> bool {
    x.arg == y.arg && opt_equal(a, x.annotation, b, y.annotation, expr_equal)
}

fn arguments_equal(a: &Ast, x: &Arguments, b: &Ast, y: &Arguments) -> bool {
    x.posonlyargs.len() == y.posonlyargs.len()
        && x.args.len() == y.args.len()
        && x.kwonlyargs.len() == y.kwonlyargs.len()
        && x.posonlyargs
            .iter()
            .zip(&y.posonlyargs)
            .all(|(p, q)| arg_equal(a, p, b, q))
        && x.args.iter().zip(&y.args).all(|(p, q)| arg_equal(a, p, b, q))
        && x.kwonlyargs
            .iter()
            .zip(&y.kwonlyargs)
            .all(|(p, q)| arg_equal(a, p, b, q))
        && match (&x.vararg, &y.vararg) {
            (None, None) => true,
            (Some(p), Some(q)) => arg_equal(a, p, b, q),
            _ => false,
        }
        && match (&x.kwarg, &y.kwarg) {
            (None, None) => true,
            (Some(p), Some(q)) => arg_equal(a, p, b, q),
            _ => false,
        }
        && x.kw_defaults.len() == y.kw_defaults.len()
        && x.kw_defaults
            .iter()
            .zip(&y.kw_defaults)
            .all(|(&p, &q)| opt_equal(a, p, b, q, expr_equal))
        && expr_seq_equal(a, &x.defaults, b, &y.defaults)
}

/// Structural equality of two expressions.
pub fn expr_equal(a: &Ast, x: ExprId, b: &Ast, y: ExprId) -> bool {
    use ExprKind::*;

    match (&a.expr(x).kind, &b.expr(y).kind) {
        (Name { id: i, ctx: c, .. }, Name { id: j, ctx: d, .. }) => i == j && c == d,
        (Constant { value: v }, Constant { value: w }) => v == w,
        (
            BinOp {
                left: l1,
                op: o1,
                right: r1,
                ..
            },
            BinOp {
                left: l2,
                op: o2,
                right: r2,
                ..
            },
        ) => o1 == o2 && expr_equal(a, *l1, b, *l2) && expr_equal(a, *r1, b, *r2),
        (
            BoolOp {
                op: o1,
                values: v1,
                opcount: c1,
                ..
            },
            BoolOp {
                op: o2,
                values: v2,
                opcount: c2,
                ..
            },
        ) => o1 == o2 && c1 == c2 && expr_seq_equal(a, v1, b, v2),
        (
            UnaryOp {
                op: o1, operand: e1, ..
            },
            UnaryOp {
                op: o2, operand: e2, ..
            },
        ) => o1 == o2 && expr_equal(a, *e1, b, *e2),
        (
            Compare {
                left: l1,
                ops: o1,
                comparators: c1,
                ..
            },
            Compare {
                left: l2,
                ops: o2,
                comparators: c2,
                ..
            },
        ) => o1 == o2 && expr_equal(a, *l1, b, *l2) && expr_seq_equal(a, c1, b, c2),
        (
            Call {
                func: f1,
                args: a1,
                varargs: v1,
                keywords: k1,
                ..
            },
            Call {
                func: f2,
                args: a2,
                varargs: v2,
                keywords: k2,
                ..
            },
        ) => {
            expr_equal(a, *f1, b, *f2)
                && expr_seq_equal(a, a1, b, a2)
                && expr_seq_equal(a, v1, b, v2)
                && k1.len() == k2.len()
                && k1
                    .iter()
                    .zip(k2)
                    .all(|(p, q)| p.arg == q.arg && expr_equal(a, p.value, b, q.value))
        }
        (
            Attribute {
                value: v1,
                attr: n1,
                ctx: c1,
                ..
            },
            Attribute {
                value: v2,
                attr: n2,
                ctx: c2,
                ..
            },
        ) => n1 == n2 && c1 == c2 && expr_equal(a, *v1, b, *v2),
        (
            Subscript {
                value: v1,
                slice: s1,
                ctx: c1,
            },
            Subscript {
                value: v2,
                slice: s2,
                ctx: c2,
            },
        ) => c1 == c2 && expr_equal(a, *v1, b, *v2) && expr_equal(a, *s1, b, *s2),
        (Starred { value: v1, ctx: c1 }, Starred { value: v2, ctx: c2 }) => {
            c1 == c2 && expr_equal(a, *v1, b, *v2)
        }
        (
            IfExp {
                test: t1,
                body: b1,
                orelse: e1,
            },
            IfExp {
                test: t2,
                body: b2,
                orelse: e2,
            },
        ) => expr_equal(a, *t1, b, *t2) && expr_equal(a, *b1, b, *b2) && expr_equal(a, *e1, b, *e2),
        (Lambda { args: a1, body: b1 }, Lambda { args: a2, body: b2 }) => {
            arguments_equal(a, a1, b, a2) && expr_equal(a, *b1, b, *b2)
        }
        (
            NamedExpr {
                target: t1,
                value: v1,
            },
            NamedExpr {
                target: t2,
                value: v2,
            },
        ) => expr_equal(a, *t1, b, *t2) && expr_equal(a, *v1, b, *v2),
        (Await { value: v1 }, Await { value: v2 }) => expr_equal(a, *v1, b, *v2),
        (Yield { value: v1 }, Yield { value: v2 }) => opt_equal(a, *v1, b, *v2, expr_equal),
        (YieldFrom { value: v1 }, YieldFrom { value: v2 }) => expr_equal(a, *v1, b, *v2),
        (ListExpr { elts: e1, ctx: c1 }, ListExpr { elts: e2, ctx: c2 })
        | (TupleExpr { elts: e1, ctx: c1 }, TupleExpr { elts: e2, ctx: c2 }) => {
            c1 == c2 && expr_seq_equal(a, e1, b, e2)
        }
        (SetExpr { elts: e1 }, SetExpr { elts: e2 }) => expr_seq_equal(a, e1, b, e2),
        (
            DictExpr {
                keys: k1,
                values: v1,
            },
            DictExpr {
                keys: k2,
                values: v2,
            },
        ) => expr_seq_equal(a, k1, b, k2) && expr_seq_equal(a, v1, b, v2),
        (
            ListComp {
                elt: e1,
                generators: g1,
            },
            ListComp {
                elt: e2,
                generators: g2,
            },
        )
        | (
            SetComp {
                elt: e1,
                generators: g1,
            },
            SetComp {
                elt: e2,
                generators: g2,
            },
        )
        | (
            GeneratorExp {
                elt: e1,
                generators: g1,
            },
            GeneratorExp {
                elt: e2,
                generators: g2,
            },
        ) => expr_equal(a, *e1, b, *e2) && generators_equal(a, g1, b, g2),
        (
            DictComp {
                key: k1,
                value: v1,
                generators: g1,
            },
            DictComp {
                key: k2,
                value: v2,
                generators: g2,
            },
        ) => {
            expr_equal(a, *k1, b, *k2)
                && expr_equal(a, *v1, b, *v2)
                && generators_equal(a, g1, b, g2)
        }
        (
            Slice {
                lower: l1,
                upper: u1,
                step: s1,
            },
            Slice {
                lower: l2,
                upper: u2,
                step: s2,
            },
        ) => {
            opt_equal(a, *l1, b, *l2, expr_equal)
                && opt_equal(a, *u1, b, *u2, expr_equal)
                && opt_equal(a, *s1, b, *s2, expr_equal)
        }
        (JoinedStr { values: v1 }, JoinedStr { values: v2 }) => expr_seq_equal(a, v1, b, v2),
        (
            FormattedValue {
                value: v1,
                conversion: c1,
                format_spec: s1,
            },
            FormattedValue {
                value: v2,
                conversion: c2,
                format_spec: s2,
            },
        ) => c1 == c2 && expr_equal(a, *v1, b, *v2) && opt_equal(a, *s1, b, *s2, expr_equal),
        (
            Arrow {
                args: a1,
                returns: r1,
                names: n1,
                ..
            },
            Arrow {
                args: a2,
                returns: r2,
                names: n2,
                ..
            },
        ) => n1 == n2 && expr_seq_equal(a, a1, b, a2) && opt_equal(a, *r1, b, *r2, expr_equal),
        (
            DictType { key: k1, value: v1 },
            DictType { key: k2, value: v2 },
        ) => expr_equal(a, *k1, b, *k2) && expr_equal(a, *v1, b, *v2),
        (ArrayType { item: i1 }, ArrayType { item: i2 })
        | (SetType { item: i1 }, SetType { item: i2 }) => expr_equal(a, *i1, b, *i2),
        (TupleType { types: t1 }, TupleType { types: t2 }) => expr_seq_equal(a, t1, b, t2),
        (BuiltinType { name: n1 }, BuiltinType { name: n2 }) => n1 == n2,
        (ClassType { def: d1 }, ClassType { def: d2 }) => {
            // Classes compare by identity of their definition when both
            // sides live in one arena, by name otherwise.
            if std::ptr::eq(a, b) {
                d1 == d2
            } else {
                match (&a.stmt(*d1).kind, &b.stmt(*d2).kind) {
                    (StmtKind::ClassDef { name: n1, .. }, StmtKind::ClassDef { name: n2, .. }) => {
                        n1 == n2
                    }
                    _ => false,
                }
            }
        }
        (Placeholder, Placeholder) => true,
        (Exported { .. }, Exported { .. }) => true,
        _ => false,
    }
}

fn generators_equal(
    a: &Ast,
    g1: &[crate::ast::Comprehension],
    b: &Ast,
    g2: &[crate::ast::Comprehension],
) -> bool {
    g1.len() == g2.len()
        && g1.iter().zip(g2).all(|(x, y)| {
            x.is_async == y.is_async
                && expr_equal(a, x.target, b, y.target)
                && expr_equal(a, x.iter, b, y.iter)
                && expr_seq_equal(a, &x.ifs, b, &y.ifs)
        })
}

/// Structural equality of two statements.
pub fn stmt_equal(a: &Ast, x: StmtId, b: &Ast, y: StmtId) -> bool {
    use StmtKind::*;

    match (&a.stmt(x).kind, &b.stmt(y).kind) {
        (
            FunctionDef {
                name: n1,
                args: a1,
                body: b1,
                decorators: d1,
                returns: r1,
                generator: g1,
                is_async: as1,
                ..
            },
            FunctionDef {
                name: n2,
                args: a2,
                body: b2,
                decorators: d2,
                returns: r2,
                generator: g2,
                is_async: as2,
                ..
            },
        ) => {
            n1 == n2
                && g1 == g2
                && as1 == as2
                && arguments_equal(a, a1, b, a2)
                && opt_equal(a, *r1, b, *r2, expr_equal)
                && d1.len() == d2.len()
                && d1
                    .iter()
                    .zip(d2)
                    .all(|(p, q)| expr_equal(a, p.expr, b, q.expr))
                && stmt_seq_equal(a, b1, b, b2)
        }
        (
            ClassDef {
                name: n1,
                bases: ba1,
                keywords: k1,
                body: b1,
                decorators: d1,
                ..
            },
            ClassDef {
                name: n2,
                bases: ba2,
                keywords: k2,
                body: b2,
                decorators: d2,
                ..
            },
        ) => {
            n1 == n2
                && expr_seq_equal(a, ba1, b, ba2)
                && k1.len() == k2.len()
                && k1
                    .iter()
                    .zip(k2)
                    .all(|(p, q)| p.arg == q.arg && expr_equal(a, p.value, b, q.value))
                && d1.len() == d2.len()
                && d1
                    .iter()
                    .zip(d2)
                    .all(|(p, q)| expr_equal(a, p.expr, b, q.expr))
                && stmt_seq_equal(a, b1, b, b2)
        }
        (Return { value: v1 }, Return { value: v2 }) => opt_equal(a, *v1, b, *v2, expr_equal),
        (
            Assign {
                targets: t1,
                value: v1,
            },
            Assign {
                targets: t2,
                value: v2,
            },
        ) => expr_seq_equal(a, t1, b, t2) && expr_equal(a, *v1, b, *v2),
        (
            AnnAssign {
                target: t1,
                annotation: an1,
                value: v1,
            },
            AnnAssign {
                target: t2,
                annotation: an2,
                value: v2,
            },
        ) => {
            expr_equal(a, *t1, b, *t2)
                && expr_equal(a, *an1, b, *an2)
                && opt_equal(a, *v1, b, *v2, expr_equal)
        }
        (
            AugAssign {
                target: t1,
                op: o1,
                value: v1,
            },
            AugAssign {
                target: t2,
                op: o2,
                value: v2,
            },
        ) => o1 == o2 && expr_equal(a, *t1, b, *t2) && expr_equal(a, *v1, b, *v2),
        (Delete { targets: t1 }, Delete { targets: t2 }) => expr_seq_equal(a, t1, b, t2),
        (
            For {
                target: t1,
                iter: i1,
                body: b1,
                orelse: e1,
                is_async: as1,
                ..
            },
            For {
                target: t2,
                iter: i2,
                body: b2,
                orelse: e2,
                is_async: as2,
                ..
            },
        ) => {
            as1 == as2
                && expr_equal(a, *t1, b, *t2)
                && expr_equal(a, *i1, b, *i2)
                && stmt_seq_equal(a, b1, b, b2)
                && stmt_seq_equal(a, e1, b, e2)
        }
        (
            While {
                test: t1,
                body: b1,
                orelse: e1,
            },
            While {
                test: t2,
                body: b2,
                orelse: e2,
            },
        ) => {
            expr_equal(a, *t1, b, *t2)
                && stmt_seq_equal(a, b1, b, b2)
                && stmt_seq_equal(a, e1, b, e2)
        }
        (
            If {
                test: t1,
                body: b1,
                tests: ts1,
                bodies: bs1,
                orelse: e1,
                ..
            },
            If {
                test: t2,
                body: b2,
                tests: ts2,
                bodies: bs2,
                orelse: e2,
                ..
            },
        ) => {
            expr_equal(a, *t1, b, *t2)
                && stmt_seq_equal(a, b1, b, b2)
                && expr_seq_equal(a, ts1, b, ts2)
                && bs1.len() == bs2.len()
                && bs1
                    .iter()
                    .zip(bs2)
                    .all(|(p, q)| stmt_seq_equal(a, p, b, q))
                && stmt_seq_equal(a, e1, b, e2)
        }
        (
            With {
                items: i1,
                body: b1,
                is_async: as1,
            },
            With {
                items: i2,
                body: b2,
                is_async: as2,
            },
        ) => {
            as1 == as2
                && i1.len() == i2.len()
                && i1.iter().zip(i2).all(|(p, q)| {
                    expr_equal(a, p.context_expr, b, q.context_expr)
                        && opt_equal(a, p.optional_vars, b, q.optional_vars, expr_equal)
                })
                && stmt_seq_equal(a, b1, b, b2)
        }
        (
            Raise {
                exc: x1,
                cause: c1,
            },
            Raise {
                exc: x2,
                cause: c2,
            },
        ) => opt_equal(a, *x1, b, *x2, expr_equal) && opt_equal(a, *c1, b, *c2, expr_equal),
        (
            Try {
                body: b1,
                handlers: h1,
                orelse: e1,
                finalbody: f1,
            },
            Try {
                body: b2,
                handlers: h2,
                orelse: e2,
                finalbody: f2,
            },
        ) => {
            stmt_seq_equal(a, b1, b, b2)
                && h1.len() == h2.len()
                && h1.iter().zip(h2).all(|(p, q)| {
                    p.name == q.name
                        && opt_equal(a, p.ty, b, q.ty, expr_equal)
                        && stmt_seq_equal(a, &p.body, b, &q.body)
                })
                && stmt_seq_equal(a, e1, b, e2)
                && stmt_seq_equal(a, f1, b, f2)
        }
        (Assert { test: t1, msg: m1 }, Assert { test: t2, msg: m2 }) => {
            expr_equal(a, *t1, b, *t2) && opt_equal(a, *m1, b, *m2, expr_equal)
        }
        (Import { names: n1 }, Import { names: n2 }) => n1 == n2,
        (
            ImportFrom {
                module: m1,
                names: n1,
                level: l1,
            },
            ImportFrom {
                module: m2,
                names: n2,
                level: l2,
            },
        ) => m1 == m2 && n1 == n2 && l1 == l2,
        (Global { names: n1 }, Global { names: n2 }) => n1 == n2,
        (Nonlocal { names: n1 }, Nonlocal { names: n2 }) => n1 == n2,
        (Expr { value: v1 }, Expr { value: v2 }) => expr_equal(a, *v1, b, *v2),
        (Pass, Pass) | (Break, Break) | (Continue, Continue) => true,
        (
            Match {
                subject: s1,
                cases: c1,
            },
            Match {
                subject: s2,
                cases: c2,
            },
        ) => {
            expr_equal(a, *s1, b, *s2)
                && c1.len() == c2.len()
                && c1.iter().zip(c2).all(|(p, q)| {
                    pat_equal(a, p.pattern, b, q.pattern)
                        && opt_equal(a, p.guard, b, q.guard, expr_equal)
                        && stmt_seq_equal(a, &p.body, b, &q.body)
                })
        }
        (Inline { body: b1 }, Inline { body: b2 }) => stmt_seq_equal(a, b1, b, b2),
        (Comment { text: t1 }, Comment { text: t2 }) => t1 == t2,
        (InvalidStatement { .. }, InvalidStatement { .. }) => true,
        _ => false,
    }
}

/// Structural equality of two patterns.
pub fn pat_equal(a: &Ast, x: PatId, b: &Ast, y: PatId) -> bool {
    use PatKind::*;

    match (&a.pat(x).kind, &b.pat(y).kind) {
        (MatchValue { value: v1 }, MatchValue { value: v2 }) => expr_equal(a, *v1, b, *v2),
        (MatchSingleton { value: v1 }, MatchSingleton { value: v2 }) => v1 == v2,
        (MatchSequence { patterns: p1 }, MatchSequence { patterns: p2 })
        | (MatchOr { patterns: p1 }, MatchOr { patterns: p2 }) => pat_seq_equal(a, p1, b, p2),
        (
            MatchMapping {
                keys: k1,
                patterns: p1,
                rest: r1,
            },
            MatchMapping {
                keys: k2,
                patterns: p2,
                rest: r2,
            },
        ) => r1 == r2 && expr_seq_equal(a, k1, b, k2) && pat_seq_equal(a, p1, b, p2),
        (
            MatchClass {
                cls: c1,
                patterns: p1,
                kwd_attrs: ka1,
                kwd_patterns: kp1,
            },
            MatchClass {
                cls: c2,
                patterns: p2,
                kwd_attrs: ka2,
                kwd_patterns: kp2,
            },
        ) => {
            ka1 == ka2
                && expr_equal(a, *c1, b, *c2)
                && pat_seq_equal(a, p1, b, p2)
                && pat_seq_equal(a, kp1, b, kp2)
        }
        (MatchStar { name: n1 }, MatchStar { name: n2 }) => n1 == n2,
        (
            MatchAs {
                pattern: p1,
                name: n1,
            },
            MatchAs {
                pattern: p2,
                name: n2,
            },
        ) => n1 == n2 && opt_equal(a, *p1, b, *p2, pat_equal),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprContext;
    use kiwi_common::span::Span;
    use kiwi_common::value::Value;

    fn constant(ast: &mut Ast, v: Value) -> ExprId {
        ast.add_expr(ExprKind::constant(v), Span::point(0))
    }

    #[test]
    fn equal_is_reflexive() {
        let mut ast = Ast::new();
        let one = constant(&mut ast, Value::I32(1));
        assert!(expr_equal(&ast, one, &ast, one));
    }

    #[test]
    fn different_kinds_are_unequal() {
        let mut ast = Ast::new();
        let cont = ast.add_stmt(StmtKind::Continue, Span::point(0));
        let pass = ast.add_stmt(StmtKind::Pass, Span::point(0));
        assert!(!stmt_equal(&ast, cont, &ast, pass));
    }

    #[test]
    fn different_scalar_value_is_unequal() {
        let mut ast = Ast::new();
        let one = constant(&mut ast, Value::I32(1));
        let two = constant(&mut ast, Value::I32(2));
        assert!(!expr_equal(&ast, one, &ast, two));
    }

    #[test]
    fn different_scalar_type_is_unequal() {
        let mut ast = Ast::new();
        let int = constant(&mut ast, Value::I32(1));
        let float = constant(&mut ast, Value::F64(1.2));
        assert!(!expr_equal(&ast, int, &ast, float));
    }

    #[test]
    fn different_identifier_is_unequal() {
        let mut ast = Ast::new();
        let a = ast.add_expr(ExprKind::name_load("a"), Span::point(0));
        let b = ast.add_expr(ExprKind::name_load("b"), Span::point(0));
        assert!(!expr_equal(&ast, a, &ast, b));
    }

    #[test]
    fn different_sequence_length_is_unequal() {
        let mut ast = Ast::new();
        let one = constant(&mut ast, Value::I32(1));
        let two = constant(&mut ast, Value::I32(2));
        let short = ast.add_expr(
            ExprKind::ListExpr {
                elts: vec![one],
                ctx: ExprContext::Load,
            },
            Span::point(0),
        );
        let long = ast.add_expr(
            ExprKind::ListExpr {
                elts: vec![one, two],
                ctx: ExprContext::Load,
            },
            Span::point(0),
        );
        assert!(!expr_equal(&ast, short, &ast, long));
    }

    #[test]
    fn spans_and_resolver_fields_are_ignored() {
        let mut ast = Ast::new();
        let a = ast.add_expr(
            ExprKind::Name {
                id: "x".into(),
                ctx: ExprContext::Load,
                store_id: Some(3),
                load_id: Some(7),
            },
            Span::new(0, 1),
        );
        let b = ast.add_expr(
            ExprKind::Name {
                id: "x".into(),
                ctx: ExprContext::Load,
                store_id: None,
                load_id: None,
            },
            Span::new(40, 41),
        );
        assert!(expr_equal(&ast, a, &ast, b));
    }
}
