//! Parser integration tests: statement shapes, precedence, chaining,
//! print round-trips, and error recovery.

use pretty_assertions::assert_eq;

use kiwi_common::op::{BinaryOperator, BoolOperator, CmpOperator};
use kiwi_common::value::Value;
use kiwi_parser::ast::{ExprKind, StmtKind};
use kiwi_parser::ops::{self, getattr, hasattr, module_equal, print_module};
use kiwi_parser::parse;

fn parse_ok(source: &str) -> kiwi_parser::ParseResult {
    let result = parse(source);
    assert!(
        result.errors.is_empty(),
        "unexpected parse errors for {source:?}: {:?}",
        result.errors
    );
    result
}

#[test]
fn function_def_shape() {
    let result = parse_ok("def f(a: b, c: d) -> e:\n    return 1\n");
    let module = &result.module;
    assert_eq!(module.body.len(), 1);

    let StmtKind::FunctionDef {
        name,
        args,
        body,
        returns,
        ..
    } = &module.ast.stmt(module.body[0]).kind
    else {
        panic!("expected a FunctionDef");
    };
    assert_eq!(name, "f");
    let params: Vec<_> = args.positional().map(|a| a.arg.clone()).collect();
    assert_eq!(params, vec!["a", "c"]);
    assert!(args.positional().all(|a| a.annotation.is_some()));
    assert!(returns.is_some());

    assert_eq!(body.len(), 1);
    let StmtKind::Return { value: Some(value) } = &module.ast.stmt(body[0]).kind else {
        panic!("expected return with value");
    };
    assert!(matches!(
        &module.ast.expr(*value).kind,
        ExprKind::Constant {
            value: Value::I32(1)
        }
    ));
}

#[test]
fn chained_comparison_is_one_compare_node() {
    let result = parse_ok("1 < 2 < 3\n");
    let module = &result.module;
    let StmtKind::Expr { value } = &module.ast.stmt(module.body[0]).kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Compare {
        ops, comparators, ..
    } = &module.ast.expr(*value).kind
    else {
        panic!("expected a Compare, got {:?}", module.ast.expr(*value).kind.name());
    };
    assert_eq!(ops, &vec![CmpOperator::Lt, CmpOperator::Lt]);
    assert_eq!(comparators.len(), 2);
}

#[test]
fn same_boolop_runs_merge() {
    let result = parse_ok("a and b and c\n");
    let module = &result.module;
    let StmtKind::Expr { value } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    let ExprKind::BoolOp {
        op,
        values,
        opcount,
        ..
    } = &module.ast.expr(*value).kind
    else {
        panic!("expected a BoolOp");
    };
    assert_eq!(*op, BoolOperator::And);
    assert_eq!(values.len(), 3);
    assert_eq!(*opcount, 2);
}

#[test]
fn mixed_boolops_nest() {
    let result = parse_ok("a or b and c\n");
    let module = &result.module;
    let StmtKind::Expr { value } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    // Same precedence, left associative: (a or b) and c.
    let ExprKind::BoolOp { op, values, .. } = &module.ast.expr(*value).kind else {
        panic!("expected a BoolOp");
    };
    assert_eq!(*op, BoolOperator::And);
    assert!(matches!(
        module.ast.expr(values[0]).kind,
        ExprKind::BoolOp {
            op: BoolOperator::Or,
            ..
        }
    ));
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let result = parse_ok("a + b * c\n");
    let module = &result.module;
    let StmtKind::Expr { value } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    let ExprKind::BinOp {
        op: BinaryOperator::Add,
        right,
        ..
    } = &module.ast.expr(*value).kind
    else {
        panic!("expected + at the top");
    };
    assert!(matches!(
        module.ast.expr(*right).kind,
        ExprKind::BinOp {
            op: BinaryOperator::Mult,
            ..
        }
    ));
}

#[test]
fn power_is_right_associative() {
    let result = parse_ok("a ** b ** c\n");
    let module = &result.module;
    let StmtKind::Expr { value } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    let ExprKind::BinOp {
        op: BinaryOperator::Pow,
        left,
        right,
        ..
    } = &module.ast.expr(*value).kind
    else {
        panic!("expected ** at the top");
    };
    assert!(matches!(
        module.ast.expr(*left).kind,
        ExprKind::Name { .. }
    ));
    assert!(matches!(
        module.ast.expr(*right).kind,
        ExprKind::BinOp {
            op: BinaryOperator::Pow,
            ..
        }
    ));
}

#[test]
fn class_attribute_lookup() {
    let src = "class AttributeTest:\n    a: float = 1.1\n    b = 2.0\n    def __init__(self): pass\n    def f(self, a, b): pass\n    class Nested:\n        c = 3\n";
    let result = parse_ok(src);
    let module = &result.module;
    let cls = module.body[0];

    for member in ["a", "b", "__init__", "f", "Nested"] {
        assert!(
            hasattr(&module.ast, cls, member),
            "expected member {member}"
        );
    }
    assert!(!hasattr(&module.ast, cls, "does_not_exist"));

    // getattr returns the exact body statement.
    let init = getattr(&module.ast, cls, "__init__").unwrap();
    assert!(matches!(
        &module.ast.stmt(init).kind,
        StmtKind::FunctionDef { name, .. } if name == "__init__"
    ));
}

#[test]
fn parse_print_round_trip() {
    let sources = [
        "def f(a: b, c: d) -> e:\n    return 1\n",
        "x = 1\ny = x + 2 * 3\n",
        "if a < b:\n    pass\nelif b < c:\n    x = 1\nelse:\n    y = 2\n",
        "while x < 3:\n    x = x + 1\n",
        "for i in items:\n    total = total + i\n",
        "try:\n    risky()\nexcept Error as e:\n    pass\nfinally:\n    close()\n",
        "class Point:\n    x: f64 = 1.5\n    def norm(self):\n        return self.x\n",
        "xs = [a for a in b if a]\n",
        "d = {1: \"one\", 2: \"two\"}\n",
        "a = 1; b = 2\n",
        "result = f(1, x, key=3)\n",
        "with open(p) as f:\n    data = f.read()\n",
    ];

    for src in sources {
        let first = parse_ok(src);
        let printed = print_module(&first.module);
        let second = parse(&printed);
        assert!(
            second.errors.is_empty(),
            "printed form failed to parse for {src:?}:\n{printed}\nerrors: {:?}",
            second.errors
        );
        assert!(
            module_equal(&first.module, &second.module),
            "round trip changed structure for {src:?}:\n-- printed --\n{printed}"
        );
    }
}

#[test]
fn print_module_snapshot() {
    let result = parse_ok("x = 1\nif x < 2:\n    y = x\n");
    insta::assert_snapshot!(print_module(&result.module), @r"
    x = 1
    if x < 2:
        y = x
    ");
}

#[test]
fn error_recovery_continues_parsing() {
    let src = "x = 1\ndef ) broken\ny = 2\n";
    let result = parse(src);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.module.body.len(), 3);

    assert!(matches!(
        result.module.ast.stmt(result.module.body[0]).kind,
        StmtKind::Assign { .. }
    ));
    assert!(matches!(
        result.module.ast.stmt(result.module.body[1]).kind,
        StmtKind::InvalidStatement { .. }
    ));
    assert!(matches!(
        result.module.ast.stmt(result.module.body[2]).kind,
        StmtKind::Assign { .. }
    ));

    // The error keeps the consumed tokens of the bad line.
    assert!(!result.errors[0].tokens.is_empty());
}

#[test]
fn comments_attach_to_statements() {
    let src = "# leading note\nx = 1  # trailing note\n";
    let result = parse_ok(src);
    let module = &result.module;
    assert_eq!(module.body.len(), 2);

    assert!(matches!(
        &module.ast.stmt(module.body[0]).kind,
        StmtKind::Comment { text } if text == "leading note"
    ));
    let assign = module.ast.stmt(module.body[1]);
    assert_eq!(assign.comment.as_deref(), Some("trailing note"));
}

#[test]
fn semicolon_chains_become_inline() {
    let result = parse_ok("a = 1; b = 2; c = 3\n");
    let module = &result.module;
    let StmtKind::Inline { body } = &module.ast.stmt(module.body[0]).kind else {
        panic!("expected Inline");
    };
    assert_eq!(body.len(), 3);
}

#[test]
fn decorators_attach_to_function() {
    let src = "@trace\n@memo\ndef f():\n    pass\n";
    let result = parse_ok(src);
    let module = &result.module;
    let StmtKind::FunctionDef { decorators, .. } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    assert_eq!(decorators.len(), 2);
}

#[test]
fn match_statement_patterns() {
    let src = "match command:\n    case 1:\n        pass\n    case [a, *rest]:\n        pass\n    case {\"k\": v}:\n        pass\n    case Point(x, y=0):\n        pass\n    case None | False:\n        pass\n    case _:\n        pass\n";
    let result = parse_ok(src);
    let module = &result.module;
    let StmtKind::Match { cases, .. } = &module.ast.stmt(module.body[0]).kind else {
        panic!("expected Match");
    };
    assert_eq!(cases.len(), 6);
}

#[test]
fn fstring_parses_to_joinedstr() {
    let result = parse_ok("msg = f\"count={n!r:>4} done\"\n");
    let module = &result.module;
    let StmtKind::Assign { value, .. } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    let ExprKind::JoinedStr { values } = &module.ast.expr(*value).kind else {
        panic!("expected JoinedStr");
    };
    assert_eq!(values.len(), 3);
    let ExprKind::FormattedValue {
        conversion,
        format_spec,
        ..
    } = &module.ast.expr(values[1]).kind
    else {
        panic!("expected FormattedValue in the middle");
    };
    assert_eq!(*conversion, Some('r'));
    assert!(format_spec.is_some());
}

#[test]
fn docstrings_are_recorded() {
    let src = "\"\"\"module doc\"\"\"\ndef f():\n    \"\"\"fn doc\"\"\"\n    return None\n";
    let result = parse_ok(src);
    let module = &result.module;
    assert_eq!(module.docstring.as_ref().unwrap().text, "module doc");

    let StmtKind::FunctionDef { docstring, .. } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    assert_eq!(docstring.as_ref().unwrap().text, "fn doc");
}

#[test]
fn tuple_assignment_targets_get_store_context() {
    let result = parse_ok("a, b = 1, 2\n");
    let module = &result.module;
    let StmtKind::Assign { targets, .. } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    let ExprKind::TupleExpr { elts, ctx } = &module.ast.expr(targets[0]).kind else {
        panic!("expected tuple target");
    };
    assert_eq!(*ctx, kiwi_parser::ast::ExprContext::Store);
    for &elt in elts {
        assert!(matches!(
            module.ast.expr(elt).kind,
            ExprKind::Name {
                ctx: kiwi_parser::ast::ExprContext::Store,
                ..
            }
        ));
    }
}

#[test]
fn no_cycles_in_parsed_modules() {
    let src = "def f(x):\n    return x + 1\n\nclass C:\n    y = 2\n";
    let result = parse_ok(src);
    assert!(!ops::has_circle(&result.module));
}

#[test]
fn equality_is_reflexive_for_parsed_modules() {
    let src = "def f(a):\n    return a * 2\n";
    let a = parse_ok(src);
    let b = parse_ok(src);
    assert!(module_equal(&a.module, &b.module));
}
