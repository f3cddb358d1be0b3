//! Pretty printing: AST back to source text.
//!
//! Statements emit their indentation, body, trailing comment, and newline;
//! binary operators parenthesize children whose precedence is strictly
//! lower than their own; comprehensions re-emit their `for ... in ...
//! [if ...]` suffixes in source order. Sema also uses the expression
//! printer to render type expressions in signatures and error messages.

use kiwi_common::node::{ExprId, StmtId};
use kiwi_common::op;
use kiwi_common::value::Value;

use crate::ast::{Arguments, Ast, ExprKind, Module, PatKind, StmtKind};

/// Precedence granted to atoms so they never get parenthesized.
const ATOM_PRECEDENCE: i32 = 100;

/// Print a whole module.
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    if let Some(doc) = &module.docstring {
        out.push_str(&format!("\"\"\"{}\"\"\"\n", doc.text));
    }
    print_body(&module.ast, &module.body, 0, &mut out);
    out
}

/// Render one expression to a string (also used for type expressions).
pub fn expr_to_string(ast: &Ast, id: ExprId) -> String {
    let mut out = String::new();
    write_expr(ast, id, -1, &mut out);
    out
}

/// Render one statement (and its nested blocks) at the given indent level.
pub fn stmt_to_string(ast: &Ast, id: StmtId, indent: usize) -> String {
    let mut out = String::new();
    print_stmt(ast, id, indent, &mut out);
    out
}

fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}

fn print_body(ast: &Ast, body: &[StmtId], level: usize, out: &mut String) {
    if body.is_empty() {
        out.push_str(&indent_str(level));
        out.push_str("pass\n");
        return;
    }
    for &stmt in body {
        print_stmt(ast, stmt, level, out);
    }
}

fn print_docstring(doc: &Option<crate::ast::Docstring>, level: usize, out: &mut String) {
    if let Some(doc) = doc {
        out.push_str(&indent_str(level));
        out.push_str(&format!("\"\"\"{}\"\"\"\n", doc.text));
    }
}

fn print_stmt(ast: &Ast, id: StmtId, level: usize, out: &mut String) {
    let stmt = ast.stmt(id);
    let pad = indent_str(level);

    // Inline statements and comments manage their own line endings.
    match &stmt.kind {
        StmtKind::FunctionDef {
            name,
            args,
            body,
            decorators,
            returns,
            docstring,
            is_async,
            ..
        } => {
            for deco in decorators {
                out.push_str(&pad);
                out.push('@');
                write_expr(ast, deco.expr, -1, out);
                out.push('\n');
            }
            out.push_str(&pad);
            if *is_async {
                out.push_str("async ");
            }
            out.push_str("def ");
            out.push_str(name);
            out.push('(');
            write_arguments(ast, args, out);
            out.push(')');
            if let Some(ret) = returns {
                out.push_str(" -> ");
                write_expr(ast, *ret, -1, out);
            }
            out.push(':');
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_docstring(docstring, level + 1, out);
            print_body(ast, body, level + 1, out);
        }

        StmtKind::ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
            docstring,
            ..
        } => {
            for deco in decorators {
                out.push_str(&pad);
                out.push('@');
                write_expr(ast, deco.expr, -1, out);
                out.push('\n');
            }
            out.push_str(&pad);
            out.push_str("class ");
            out.push_str(name);
            if !bases.is_empty() || !keywords.is_empty() {
                out.push('(');
                let mut first = true;
                for &base in bases {
                    if !first {
                        out.push_str(", ");
                    }
                    write_expr(ast, base, -1, out);
                    first = false;
                }
                for kw in keywords {
                    if !first {
                        out.push_str(", ");
                    }
                    out.push_str(&kw.arg);
                    out.push('=');
                    write_expr(ast, kw.value, -1, out);
                    first = false;
                }
                out.push(')');
            }
            out.push(':');
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_docstring(docstring, level + 1, out);
            print_body(ast, body, level + 1, out);
        }

        StmtKind::Return { value } => {
            out.push_str(&pad);
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                write_expr(ast, *value, -1, out);
            }
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Assign { targets, value } => {
            out.push_str(&pad);
            for &target in targets {
                write_expr(ast, target, -1, out);
                out.push_str(" = ");
            }
            write_expr(ast, *value, -1, out);
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            out.push_str(&pad);
            write_expr(ast, *target, -1, out);
            out.push_str(": ");
            write_expr(ast, *annotation, -1, out);
            if let Some(value) = value {
                out.push_str(" = ");
                write_expr(ast, *value, -1, out);
            }
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::AugAssign { target, op, value } => {
            out.push_str(&pad);
            write_expr(ast, *target, -1, out);
            out.push_str(&format!(" {op}= "));
            write_expr(ast, *value, -1, out);
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Delete { targets } => {
            out.push_str(&pad);
            out.push_str("del ");
            write_comma_separated(ast, targets, out);
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            is_async,
            ..
        } => {
            out.push_str(&pad);
            if *is_async {
                out.push_str("async ");
            }
            out.push_str("for ");
            write_expr(ast, *target, -1, out);
            out.push_str(" in ");
            write_expr(ast, *iter, -1, out);
            out.push(':');
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_body(ast, body, level + 1, out);
            if !orelse.is_empty() {
                out.push_str(&pad);
                out.push_str("else:\n");
                print_body(ast, orelse, level + 1, out);
            }
        }

        StmtKind::While { test, body, orelse } => {
            out.push_str(&pad);
            out.push_str("while ");
            write_expr(ast, *test, -1, out);
            out.push(':');
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_body(ast, body, level + 1, out);
            if !orelse.is_empty() {
                out.push_str(&pad);
                out.push_str("else:\n");
                print_body(ast, orelse, level + 1, out);
            }
        }

        StmtKind::If {
            test,
            body,
            tests,
            bodies,
            orelse,
            ..
        } => {
            out.push_str(&pad);
            out.push_str("if ");
            write_expr(ast, *test, -1, out);
            out.push(':');
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_body(ast, body, level + 1, out);
            for (arm_test, arm_body) in tests.iter().zip(bodies) {
                out.push_str(&pad);
                out.push_str("elif ");
                write_expr(ast, *arm_test, -1, out);
                out.push_str(":\n");
                print_body(ast, arm_body, level + 1, out);
            }
            if !orelse.is_empty() {
                out.push_str(&pad);
                out.push_str("else:\n");
                print_body(ast, orelse, level + 1, out);
            }
        }

        StmtKind::With {
            items,
            body,
            is_async,
        } => {
            out.push_str(&pad);
            if *is_async {
                out.push_str("async ");
            }
            out.push_str("with ");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(ast, item.context_expr, -1, out);
                if let Some(vars) = item.optional_vars {
                    out.push_str(" as ");
                    write_expr(ast, vars, -1, out);
                }
            }
            out.push(':');
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_body(ast, body, level + 1, out);
        }

        StmtKind::Raise { exc, cause } => {
            out.push_str(&pad);
            out.push_str("raise");
            if let Some(exc) = exc {
                out.push(' ');
                write_expr(ast, *exc, -1, out);
            }
            if let Some(cause) = cause {
                out.push_str(" from ");
                write_expr(ast, *cause, -1, out);
            }
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            out.push_str(&pad);
            out.push_str("try:");
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
            print_body(ast, body, level + 1, out);
            for handler in handlers {
                out.push_str(&pad);
                out.push_str("except");
                if let Some(ty) = handler.ty {
                    out.push(' ');
                    write_expr(ast, ty, -1, out);
                }
                if let Some(name) = &handler.name {
                    out.push_str(" as ");
                    out.push_str(name);
                }
                out.push_str(":\n");
                print_body(ast, &handler.body, level + 1, out);
            }
            if !orelse.is_empty() {
                out.push_str(&pad);
                out.push_str("else:\n");
                print_body(ast, orelse, level + 1, out);
            }
            if !finalbody.is_empty() {
                out.push_str(&pad);
                out.push_str("finally:\n");
                print_body(ast, finalbody, level + 1, out);
            }
        }

        StmtKind::Assert { test, msg } => {
            out.push_str(&pad);
            out.push_str("assert ");
            write_expr(ast, *test, -1, out);
            if let Some(msg) = msg {
                out.push_str(", ");
                write_expr(ast, *msg, -1, out);
            }
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Import { names } => {
            out.push_str(&pad);
            out.push_str("import ");
            write_aliases(names, out);
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::ImportFrom { module, names, .. } => {
            out.push_str(&pad);
            out.push_str("from ");
            out.push_str(module.as_deref().unwrap_or(""));
            out.push_str(" import ");
            write_aliases(names, out);
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Global { names } => {
            out.push_str(&pad);
            out.push_str("global ");
            out.push_str(&names.join(", "));
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Nonlocal { names } => {
            out.push_str(&pad);
            out.push_str("nonlocal ");
            out.push_str(&names.join(", "));
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Expr { value } => {
            out.push_str(&pad);
            write_expr(ast, *value, -1, out);
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Pass => {
            out.push_str(&pad);
            out.push_str("pass");
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }
        StmtKind::Break => {
            out.push_str(&pad);
            out.push_str("break");
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }
        StmtKind::Continue => {
            out.push_str(&pad);
            out.push_str("continue");
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Match { subject, cases } => {
            out.push_str(&pad);
            out.push_str("match ");
            write_expr(ast, *subject, -1, out);
            out.push_str(":\n");
            for case in cases {
                out.push_str(&indent_str(level + 1));
                out.push_str("case ");
                write_pat(ast, case.pattern, out);
                if let Some(guard) = case.guard {
                    out.push_str(" if ");
                    write_expr(ast, guard, -1, out);
                }
                out.push_str(":\n");
                print_body(ast, &case.body, level + 2, out);
            }
        }

        StmtKind::Inline { body } => {
            out.push_str(&pad);
            for (i, &inner) in body.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                // Inline members are simple statements; print them bare and
                // strip the line structure they would emit on their own.
                let piece = stmt_to_string(ast, inner, 0);
                out.push_str(piece.trim_end_matches('\n'));
            }
            write_trailing_comment(&stmt.comment, out);
            out.push('\n');
        }

        StmtKind::Comment { text } => {
            out.push_str(&pad);
            out.push_str("# ");
            out.push_str(text);
            out.push('\n');
        }

        StmtKind::InvalidStatement { tokens } => {
            out.push_str(&pad);
            let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
            out.push_str(&words.join(" "));
            out.push('\n');
        }
    }
}

fn write_trailing_comment(comment: &Option<String>, out: &mut String) {
    if let Some(text) = comment {
        out.push_str("  # ");
        out.push_str(text);
    }
}

fn write_aliases(names: &[crate::ast::Alias], out: &mut String) {
    for (i, alias) in names.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&alias.name);
        if let Some(asname) = &alias.asname {
            out.push_str(" as ");
            out.push_str(asname);
        }
    }
}

fn write_comma_separated(ast: &Ast, exprs: &[ExprId], out: &mut String) {
    for (i, &expr) in exprs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(ast, expr, -1, out);
    }
}

fn write_arguments(ast: &Ast, args: &Arguments, out: &mut String) {
    let mut first = true;
    let mut write_sep = |out: &mut String, first: &mut bool| {
        if !*first {
            out.push_str(", ");
        }
        *first = false;
    };

    let positional_total = args.posonlyargs.len() + args.args.len();
    for (i, arg) in args.positional().enumerate() {
        write_sep(out, &mut first);
        out.push_str(&arg.arg);
        if let Some(ann) = arg.annotation {
            out.push_str(": ");
            write_expr(ast, ann, -1, out);
        }
        if let Some(default) = args.positional_default(i) {
            out.push_str(" = ");
            write_expr(ast, default, -1, out);
        }
        if i + 1 == args.posonlyargs.len() && args.posonlyargs.len() < positional_total {
            write_sep(out, &mut first);
            out.push('/');
        }
    }
    if let Some(vararg) = &args.vararg {
        write_sep(out, &mut first);
        out.push('*');
        out.push_str(&vararg.arg);
    } else if !args.kwonlyargs.is_empty() {
        write_sep(out, &mut first);
        out.push('*');
    }
    for (arg, default) in args.kwonlyargs.iter().zip(&args.kw_defaults) {
        write_sep(out, &mut first);
        out.push_str(&arg.arg);
        if let Some(ann) = arg.annotation {
            out.push_str(": ");
            write_expr(ast, ann, -1, out);
        }
        if let Some(default) = default {
            out.push_str(" = ");
            write_expr(ast, *default, -1, out);
        }
    }
    if let Some(kwarg) = &args.kwarg {
        write_sep(out, &mut first);
        out.push_str("**");
        out.push_str(&kwarg.arg);
    }
}

/// Precedence used for parenthesization decisions.
fn expr_precedence(ast: &Ast, id: ExprId) -> i32 {
    match &ast.expr(id).kind {
        ExprKind::BinOp { op, .. } => {
            op::lookup(&op.to_string()).map(|c| c.precedence).unwrap_or(40)
        }
        ExprKind::BoolOp { .. } | ExprKind::Compare { .. } => 40,
        ExprKind::UnaryOp { op, .. } => {
            op::lookup(&op.to_string()).map(|c| c.precedence).unwrap_or(40)
        }
        ExprKind::IfExp { .. } | ExprKind::Lambda { .. } | ExprKind::NamedExpr { .. } => 5,
        _ => ATOM_PRECEDENCE,
    }
}

/// Render a literal value as source text.
fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Str(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Value::F32(v) => write_float(*v as f64, out),
        Value::F64(v) => write_float(*v, out),
        other => out.push_str(&other.to_string()),
    }
}

fn write_float(v: f64, out: &mut String) {
    if v.is_finite() && v.fract() == 0.0 {
        out.push_str(&format!("{v:.1}"));
    } else {
        out.push_str(&format!("{v}"));
    }
}

fn write_expr(ast: &Ast, id: ExprId, parent_prec: i32, out: &mut String) {
    let prec = expr_precedence(ast, id);
    let parens = prec < parent_prec;
    if parens {
        out.push('(');
    }

    match &ast.expr(id).kind {
        ExprKind::Name { id: name, .. } => out.push_str(name),
        ExprKind::Constant { value } => write_value(value, out),

        ExprKind::BinOp {
            left, op, right, ..
        } => {
            write_expr(ast, *left, prec, out);
            out.push_str(&format!(" {op} "));
            write_expr(ast, *right, prec, out);
        }

        ExprKind::BoolOp { op, values, .. } => {
            for (i, &value) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(&format!(" {op} "));
                }
                write_expr(ast, value, prec, out);
            }
        }

        ExprKind::UnaryOp { op, operand, .. } => {
            out.push_str(&op.to_string());
            if matches!(op, kiwi_common::op::UnaryOperator::Not) {
                out.push(' ');
            }
            write_expr(ast, *operand, prec, out);
        }

        ExprKind::Compare {
            left,
            ops,
            comparators,
            ..
        } => {
            write_expr(ast, *left, prec, out);
            for (op, &comparator) in ops.iter().zip(comparators) {
                out.push_str(&format!(" {op} "));
                write_expr(ast, comparator, prec, out);
            }
        }

        ExprKind::Call {
            func,
            args,
            varargs,
            keywords,
            ..
        } => {
            write_expr(ast, *func, ATOM_PRECEDENCE, out);
            out.push('(');
            let mut first = true;
            for &arg in args {
                if !first {
                    out.push_str(", ");
                }
                write_expr(ast, arg, -1, out);
                first = false;
            }
            for &arg in varargs {
                if !first {
                    out.push_str(", ");
                }
                out.push('*');
                write_expr(ast, arg, -1, out);
                first = false;
            }
            for kw in keywords {
                if !first {
                    out.push_str(", ");
                }
                out.push_str(&kw.arg);
                out.push('=');
                write_expr(ast, kw.value, -1, out);
                first = false;
            }
            out.push(')');
        }

        ExprKind::Attribute { value, attr, .. } => {
            write_expr(ast, *value, 60, out);
            out.push('.');
            out.push_str(attr);
        }

        ExprKind::Subscript { value, slice, .. } => {
            write_expr(ast, *value, ATOM_PRECEDENCE, out);
            out.push('[');
            write_expr(ast, *slice, -1, out);
            out.push(']');
        }

        ExprKind::Starred { value, .. } => {
            out.push('*');
            write_expr(ast, *value, ATOM_PRECEDENCE, out);
        }

        ExprKind::IfExp { test, body, orelse } => {
            write_expr(ast, *body, prec + 1, out);
            out.push_str(" if ");
            write_expr(ast, *test, prec + 1, out);
            out.push_str(" else ");
            write_expr(ast, *orelse, prec, out);
        }

        ExprKind::Lambda { args, body } => {
            out.push_str("lambda");
            if !args.is_empty() {
                out.push(' ');
                write_arguments(ast, args, out);
            }
            out.push_str(": ");
            write_expr(ast, *body, -1, out);
        }

        ExprKind::NamedExpr { target, value } => {
            out.push('(');
            write_expr(ast, *target, -1, out);
            out.push_str(" := ");
            write_expr(ast, *value, -1, out);
            out.push(')');
        }

        ExprKind::Await { value } => {
            out.push_str("await ");
            write_expr(ast, *value, ATOM_PRECEDENCE, out);
        }

        ExprKind::Yield { value } => {
            out.push_str("yield");
            if let Some(value) = value {
                out.push(' ');
                write_expr(ast, *value, -1, out);
            }
        }

        ExprKind::YieldFrom { value } => {
            out.push_str("yield from ");
            write_expr(ast, *value, -1, out);
        }

        ExprKind::ListExpr { elts, .. } => {
            out.push('[');
            write_comma_separated(ast, elts, out);
            out.push(']');
        }

        ExprKind::TupleExpr { elts, .. } => {
            out.push('(');
            write_comma_separated(ast, elts, out);
            if elts.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }

        ExprKind::SetExpr { elts } => {
            out.push('{');
            write_comma_separated(ast, elts, out);
            out.push('}');
        }

        ExprKind::DictExpr { keys, values } => {
            out.push('{');
            for (i, (&key, &value)) in keys.iter().zip(values).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(ast, key, -1, out);
                out.push_str(": ");
                write_expr(ast, value, -1, out);
            }
            out.push('}');
        }

        ExprKind::ListComp { elt, generators } => {
            out.push('[');
            write_expr(ast, *elt, -1, out);
            write_generators(ast, generators, out);
            out.push(']');
        }

        ExprKind::SetComp { elt, generators } => {
            out.push('{');
            write_expr(ast, *elt, -1, out);
            write_generators(ast, generators, out);
            out.push('}');
        }

        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            out.push('{');
            write_expr(ast, *key, -1, out);
            out.push_str(": ");
            write_expr(ast, *value, -1, out);
            write_generators(ast, generators, out);
            out.push('}');
        }

        ExprKind::GeneratorExp { elt, generators } => {
            out.push('(');
            write_expr(ast, *elt, -1, out);
            write_generators(ast, generators, out);
            out.push(')');
        }

        ExprKind::Slice { lower, upper, step } => {
            if let Some(lower) = lower {
                write_expr(ast, *lower, -1, out);
            }
            out.push(':');
            if let Some(upper) = upper {
                write_expr(ast, *upper, -1, out);
            }
            if let Some(step) = step {
                out.push(':');
                write_expr(ast, *step, -1, out);
            }
        }

        ExprKind::JoinedStr { values } => {
            out.push_str("f\"");
            for &value in values {
                match &ast.expr(value).kind {
                    ExprKind::Constant {
                        value: Value::Str(text),
                    } => out.push_str(text),
                    _ => write_expr(ast, value, -1, out),
                }
            }
            out.push('"');
        }

        ExprKind::FormattedValue {
            value,
            conversion,
            format_spec,
        } => {
            out.push('{');
            write_expr(ast, *value, -1, out);
            if let Some(conversion) = conversion {
                out.push('!');
                out.push(*conversion);
            }
            if let Some(spec) = format_spec {
                out.push(':');
                match &ast.expr(*spec).kind {
                    ExprKind::Constant {
                        value: Value::Str(text),
                    } => out.push_str(text),
                    _ => write_expr(ast, *spec, -1, out),
                }
            }
            out.push('}');
        }

        ExprKind::Arrow { args, returns, .. } => {
            out.push('(');
            write_comma_separated(ast, args, out);
            out.push_str(") -> ");
            match returns {
                Some(ret) => write_expr(ast, *ret, -1, out),
                None => out.push_str("None"),
            }
        }

        ExprKind::DictType { key, value } => {
            out.push_str("Dict[");
            write_expr(ast, *key, -1, out);
            out.push_str(", ");
            write_expr(ast, *value, -1, out);
            out.push(']');
        }

        ExprKind::ArrayType { item } => {
            out.push_str("List[");
            write_expr(ast, *item, -1, out);
            out.push(']');
        }

        ExprKind::SetType { item } => {
            out.push_str("Set[");
            write_expr(ast, *item, -1, out);
            out.push(']');
        }

        ExprKind::TupleType { types } => {
            out.push_str("Tuple[");
            write_comma_separated(ast, types, out);
            out.push(']');
        }

        ExprKind::BuiltinType { name } => out.push_str(name),

        ExprKind::ClassType { def } => match &ast.stmt(*def).kind {
            StmtKind::ClassDef { name, .. } => out.push_str(name),
            _ => out.push_str("<class>"),
        },

        ExprKind::Placeholder => out.push_str("..."),

        ExprKind::Exported { .. } => out.push_str("<exported>"),
    }

    if parens {
        out.push(')');
    }
}

fn write_generators(ast: &Ast, generators: &[crate::ast::Comprehension], out: &mut String) {
    for gen in generators {
        if gen.is_async {
            out.push_str(" async");
        }
        out.push_str(" for ");
        write_expr(ast, gen.target, -1, out);
        out.push_str(" in ");
        write_expr(ast, gen.iter, -1, out);
        for &cond in &gen.ifs {
            out.push_str(" if ");
            write_expr(ast, cond, -1, out);
        }
    }
}

fn write_pat(ast: &Ast, id: kiwi_common::node::PatId, out: &mut String) {
    match &ast.pat(id).kind {
        PatKind::MatchValue { value } => write_expr(ast, *value, -1, out),
        PatKind::MatchSingleton { value } => out.push_str(&value.to_string()),
        PatKind::MatchSequence { patterns } => {
            out.push('[');
            for (i, &pat) in patterns.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_pat(ast, pat, out);
            }
            out.push(']');
        }
        PatKind::MatchMapping {
            keys,
            patterns,
            rest,
        } => {
            out.push('{');
            let mut first = true;
            for (&key, &pat) in keys.iter().zip(patterns) {
                if !first {
                    out.push_str(", ");
                }
                write_expr(ast, key, -1, out);
                out.push_str(": ");
                write_pat(ast, pat, out);
                first = false;
            }
            if let Some(rest) = rest {
                if !first {
                    out.push_str(", ");
                }
                out.push_str("**");
                out.push_str(rest);
            }
            out.push('}');
        }
        PatKind::MatchClass {
            cls,
            patterns,
            kwd_attrs,
            kwd_patterns,
        } => {
            write_expr(ast, *cls, -1, out);
            out.push('(');
            let mut first = true;
            for &pat in patterns {
                if !first {
                    out.push_str(", ");
                }
                write_pat(ast, pat, out);
                first = false;
            }
            for (attr, &pat) in kwd_attrs.iter().zip(kwd_patterns) {
                if !first {
                    out.push_str(", ");
                }
                out.push_str(attr);
                out.push('=');
                write_pat(ast, pat, out);
                first = false;
            }
            out.push(')');
        }
        PatKind::MatchStar { name } => {
            out.push('*');
            out.push_str(name.as_deref().unwrap_or("_"));
        }
        PatKind::MatchAs { pattern, name } => match (pattern, name) {
            (Some(pattern), Some(name)) => {
                write_pat(ast, *pattern, out);
                out.push_str(" as ");
                out.push_str(name);
            }
            (None, Some(name)) => out.push_str(name),
            _ => out.push('_'),
        },
        PatKind::MatchOr { patterns } => {
            for (i, &pat) in patterns.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                write_pat(ast, pat, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprContext;
    use kiwi_common::op::BinaryOperator;
    use kiwi_common::span::Span;

    fn constant(ast: &mut Ast, v: Value) -> ExprId {
        ast.add_expr(ExprKind::constant(v), Span::point(0))
    }

    #[test]
    fn lower_precedence_children_get_parens() {
        let mut ast = Ast::new();
        let one = constant(&mut ast, Value::I32(1));
        let two = constant(&mut ast, Value::I32(2));
        let three = constant(&mut ast, Value::I32(3));
        // (1 + 2) * 3
        let add = ast.add_expr(
            ExprKind::BinOp {
                left: one,
                op: BinaryOperator::Add,
                right: two,
                native_op: None,
            },
            Span::point(0),
        );
        let mul = ast.add_expr(
            ExprKind::BinOp {
                left: add,
                op: BinaryOperator::Mult,
                right: three,
                native_op: None,
            },
            Span::point(0),
        );
        assert_eq!(expr_to_string(&ast, mul), "(1 + 2) * 3");
    }

    #[test]
    fn equal_precedence_children_stay_bare() {
        let mut ast = Ast::new();
        let one = constant(&mut ast, Value::I32(1));
        let two = constant(&mut ast, Value::I32(2));
        let three = constant(&mut ast, Value::I32(3));
        let add = ast.add_expr(
            ExprKind::BinOp {
                left: one,
                op: BinaryOperator::Add,
                right: two,
                native_op: None,
            },
            Span::point(0),
        );
        let add2 = ast.add_expr(
            ExprKind::BinOp {
                left: add,
                op: BinaryOperator::Sub,
                right: three,
                native_op: None,
            },
            Span::point(0),
        );
        assert_eq!(expr_to_string(&ast, add2), "1 + 2 - 3");
    }

    #[test]
    fn floats_keep_their_point() {
        let mut ast = Ast::new();
        let whole = constant(&mut ast, Value::F64(2.0));
        let frac = constant(&mut ast, Value::F64(1.25));
        assert_eq!(expr_to_string(&ast, whole), "2.0");
        assert_eq!(expr_to_string(&ast, frac), "1.25");
    }

    #[test]
    fn strings_are_quoted() {
        let mut ast = Ast::new();
        let s = constant(&mut ast, Value::Str("hi".into()));
        assert_eq!(expr_to_string(&ast, s), "\"hi\"");
    }

    #[test]
    fn arrow_type_renders_signature() {
        let mut ast = Ast::new();
        let a = ast.add_expr(
            ExprKind::BuiltinType { name: "i32".into() },
            Span::point(0),
        );
        let b = ast.add_expr(
            ExprKind::BuiltinType { name: "f64".into() },
            Span::point(0),
        );
        let ret = ast.add_expr(
            ExprKind::BuiltinType { name: "bool".into() },
            Span::point(0),
        );
        let arrow = ast.add_expr(
            ExprKind::Arrow {
                args: vec![a, b],
                returns: Some(ret),
                names: vec!["x".into(), "y".into()],
                defaults: vec![None, None],
            },
            Span::point(0),
        );
        assert_eq!(expr_to_string(&ast, arrow), "(i32, f64) -> bool");
    }

    #[test]
    fn comprehension_suffixes_in_order() {
        let mut ast = Ast::new();
        let elt = ast.add_expr(ExprKind::name_load("x"), Span::point(0));
        let target = ast.add_expr(
            ExprKind::Name {
                id: "x".into(),
                ctx: ExprContext::Store,
                store_id: None,
                load_id: None,
            },
            Span::point(0),
        );
        let iter = ast.add_expr(ExprKind::name_load("xs"), Span::point(0));
        let cond = ast.add_expr(ExprKind::name_load("ok"), Span::point(0));
        let comp = ast.add_expr(
            ExprKind::ListComp {
                elt,
                generators: vec![crate::ast::Comprehension {
                    target,
                    iter,
                    ifs: vec![cond],
                    is_async: false,
                }],
            },
            Span::point(0),
        );
        assert_eq!(expr_to_string(&ast, comp), "[x for x in xs if ok]");
    }
}
