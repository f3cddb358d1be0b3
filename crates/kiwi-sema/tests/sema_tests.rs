//! Semantic analysis integration tests: name resolution, operator
//! resolution, class attribute recording, call checking, and idempotence.

use kiwi_parser::ast::{ExprKind, StmtKind};
use kiwi_parser::ops::{expr_to_string, hasattr, module_equal};
use kiwi_parser::parse;
use kiwi_sema::errors::SemaError;
use kiwi_sema::SemanticAnalyser;

fn analyzed(source: &str) -> (kiwi_parser::ast::Module, SemanticAnalyser) {
    let result = parse(source);
    assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    (module, sema)
}

#[test]
fn assignment_binds_with_deduced_type() {
    let (_module, sema) = analyzed("a = 1\n");
    let entry = sema.bindings.find("a").expect("a is bound");
    assert_eq!(entry.type_id, kiwi_common::value::type_ids::I32);
    assert!(sema.errors.is_empty());
}

#[test]
fn unknown_name_is_a_name_error() {
    let (_module, sema) = analyzed("b = missing\n");
    assert_eq!(sema.errors.len(), 1);
    assert!(matches!(
        &sema.errors[0],
        SemaError::NameError { name, .. } if name == "missing"
    ));
}

#[test]
fn name_resolution_records_store_and_load_ids() {
    let (module, sema) = analyzed("a = 1\nc = a\n");
    assert!(sema.errors.is_empty());

    // Find the load of `a` on the second line.
    let StmtKind::Assign { value, .. } = &module.ast.stmt(module.body[1]).kind else {
        panic!();
    };
    let ExprKind::Name {
        store_id, load_id, ..
    } = &module.ast.expr(*value).kind
    else {
        panic!("expected name load");
    };
    let store_id = store_id.expect("store_id resolved");
    let load_id = load_id.expect("load_id resolved");
    assert!(load_id >= store_id, "de Bruijn offset must be non-negative");

    let entry = sema.bindings.find("a").unwrap();
    assert_eq!(entry.store_id, store_id);
}

#[test]
fn unsupported_operand_reports_once() {
    let (_module, sema) = analyzed("a = 1\na + \"x\"\n");
    assert_eq!(sema.errors.len(), 1, "errors: {:?}", sema.errors);
    let SemaError::UnsupportedOperand { op, lhs_t, rhs_t, .. } = &sema.errors[0] else {
        panic!("expected UnsupportedOperand, got {:?}", sema.errors[0]);
    };
    assert_eq!(op, "+");
    assert_eq!(lhs_t, "i32");
    assert_eq!(rhs_t.as_deref(), Some("str"));
}

#[test]
fn native_operator_is_stored_on_the_node() {
    let (module, sema) = analyzed("a = 1\nb = a + 2\n");
    assert!(sema.errors.is_empty());

    let StmtKind::Assign { value, .. } = &module.ast.stmt(module.body[1]).kind else {
        panic!();
    };
    let ExprKind::BinOp { native_op, .. } = &module.ast.expr(*value).kind else {
        panic!();
    };
    assert!(native_op.is_some(), "native + for i32 should resolve");
}

#[test]
fn compare_chain_resolves_all_links() {
    let (module, sema) = analyzed("x = 1 < 2 < 3\n");
    assert!(sema.errors.is_empty());

    let StmtKind::Assign { value, .. } = &module.ast.stmt(module.body[0]).kind else {
        panic!();
    };
    let ExprKind::Compare { native_ops, .. } = &module.ast.expr(*value).kind else {
        panic!();
    };
    assert_eq!(native_ops.len(), 2);
    assert!(native_ops.iter().all(|op| op.is_some()));
}

#[test]
fn function_def_gets_an_arrow() {
    let (module, sema) = analyzed("def f(a: i32, c: f64) -> bool:\n    return True\n");
    assert!(sema.errors.is_empty(), "{:?}", sema.errors);

    let entry = sema.bindings.find("f").expect("f bound");
    let arrow = entry.ty.expect("f has a type");
    assert_eq!(expr_to_string(&module.ast, arrow), "(i32, f64) -> bool");
}

#[test]
fn symbolic_annotations_survive_in_the_arrow() {
    let (module, sema) = analyzed("def f(a: b, c: d) -> e:\n    return 1\n");
    let entry = sema.bindings.find("f").expect("f bound");
    let arrow = entry.ty.expect("f has a type");
    assert_eq!(expr_to_string(&module.ast, arrow), "(b, d) -> e");
}

#[test]
fn return_type_mismatch_is_reported() {
    let (_module, sema) = analyzed("def f() -> bool:\n    return 1\n");
    assert!(
        sema.errors
            .iter()
            .any(|e| matches!(e, SemaError::TypeError { .. })),
        "expected a TypeError, got {:?}",
        sema.errors
    );
}

#[test]
fn class_records_attributes_and_ctor_fields() {
    let src = "class Point:\n    label = \"pt\"\n    def __init__(self, x: f64):\n        self.x = x\n        self.y = 1.5\n    def norm(self) -> f64:\n        return self.x\n";
    let (module, sema) = analyzed(src);
    assert!(sema.errors.is_empty(), "{:?}", sema.errors);

    let cls = module.body[0];
    for member in ["label", "__init__", "norm", "x", "y"] {
        assert!(hasattr(&module.ast, cls, member), "missing {member}");
    }

    let StmtKind::ClassDef {
        attributes,
        cls_namespace,
        ..
    } = &module.ast.stmt(cls).kind
    else {
        panic!();
    };
    assert_eq!(cls_namespace, "Point");
    // y's type was deduced from its initializer.
    let y = attributes.iter().find(|a| a.name == "y").unwrap();
    let y_t = y.ty.expect("y has a deduced type");
    assert_eq!(expr_to_string(&module.ast, y_t), "f64");
}

#[test]
fn attribute_error_on_missing_member() {
    let src = "class Empty:\n    pass\n\ne = Empty()\ne.ghost\n";
    let (_module, sema) = analyzed(src);
    assert!(
        sema.errors
            .iter()
            .any(|e| matches!(e, SemaError::AttributeError { attr, .. } if attr == "ghost")),
        "expected AttributeError, got {:?}",
        sema.errors
    );
}

#[test]
fn constructor_call_types_as_the_class() {
    let src = "class Point:\n    def __init__(self, x: f64):\n        self.x = x\n\np = Point(1.5)\n";
    let (_module, sema) = analyzed(src);
    assert!(sema.errors.is_empty(), "{:?}", sema.errors);
    let entry = sema.bindings.find("p").expect("p bound");
    assert!(entry.type_id >= kiwi_common::value::type_ids::FIRST_USER_TYPE);
}

#[test]
fn call_arguments_are_reordered_to_positional() {
    let src = "def f(a: i32, b: i32) -> i32:\n    return a\n\nf(b=2, a=1)\n";
    let (module, sema) = analyzed(src);
    assert!(sema.errors.is_empty(), "{:?}", sema.errors);

    let StmtKind::Expr { value } = &module.ast.stmt(module.body[1]).kind else {
        panic!();
    };
    let ExprKind::Call { args, keywords, .. } = &module.ast.expr(*value).kind else {
        panic!();
    };
    assert_eq!(args.len(), 2, "both arguments became positional");
    assert!(keywords.is_empty());

    // a=1 must now be first.
    assert!(matches!(
        &module.ast.expr(args[0]).kind,
        ExprKind::Constant {
            value: kiwi_common::value::Value::I32(1)
        }
    ));
}

#[test]
fn missing_required_argument_is_a_type_error() {
    let src = "def f(a: i32, b: i32) -> i32:\n    return a\n\nf(1)\n";
    let (_module, sema) = analyzed(src);
    assert!(
        sema.errors
            .iter()
            .any(|e| e.to_string().contains("missing 1 required positional argument")),
        "got {:?}",
        sema.errors
    );
}

#[test]
fn argument_type_mismatch_is_reported() {
    let src = "def f(a: i32) -> i32:\n    return a\n\nf(\"nope\")\n";
    let (_module, sema) = analyzed(src);
    assert!(
        sema.errors
            .iter()
            .any(|e| matches!(e, SemaError::TypeError { .. })),
        "got {:?}",
        sema.errors
    );
}

#[test]
fn sema_is_idempotent() {
    let src = "def f(a: i32) -> i32:\n    return a\n\nx = f(1)\n";
    let result = parse(src);
    let mut module = result.module;

    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    let first_errors = sema.errors.len();
    let first_len = sema.bindings.len();
    let snapshot = module.clone();

    sema.exec(&mut module);
    assert_eq!(sema.errors.len(), first_errors, "no new errors on re-run");
    assert_eq!(sema.bindings.len(), first_len, "no duplicate bindings");
    assert!(
        module_equal(&snapshot, &module),
        "re-running sema must not change the AST"
    );
}

#[test]
fn scopes_do_not_leak() {
    let src = "def f():\n    local = 1\n    return local\n";
    let (_module, sema) = analyzed(src);
    assert!(sema.bindings.find("local").is_none());
    assert!(sema.bindings.find("f").is_some());
}

#[test]
fn builtins_are_prepopulated() {
    let (_module, sema) = analyzed("x = 1\n");
    for name in ["Type", "None", "i32", "u64", "f64", "str", "bool", "Module", "True", "False"] {
        assert!(sema.bindings.find(name).is_some(), "missing builtin {name}");
    }
}

#[test]
fn bindings_dump_lists_entries() {
    let (module, sema) = analyzed("a = 1\n");
    let dump = sema
        .bindings
        .dump(|ty| expr_to_string(&module.ast, ty));
    assert!(dump.contains("a"));
    assert!(dump.contains("i32"));
}
