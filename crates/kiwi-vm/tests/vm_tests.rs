//! VM tests: lowering shape, jump targets, call resolution, and tape
//! execution semantics.

use kiwi_common::value::Value;
use kiwi_parser::ast::ExprKind;
use kiwi_parser::parse;
use kiwi_sema::SemanticAnalyser;
use kiwi_vm::{compile, Inst, VmExec};

fn compiled(source: &str) -> (kiwi_parser::ast::Module, SemanticAnalyser, kiwi_vm::Program) {
    let result = parse(source);
    assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    assert!(sema.errors.is_empty(), "sema errors: {:?}", sema.errors);
    let program = compile(&mut module);
    (module, sema, program)
}

fn run_main(source: &str) -> Value {
    let (module, sema, program) = compiled(source);
    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0)
        .unwrap_or_else(|exc| panic!("entry failed: {exc}"));
    vm.call_label(&module, &program, "main", Vec::new())
        .unwrap_or_else(|exc| panic!("unhandled exception: {exc}"))
}

#[test]
fn while_loop_compiles_to_one_condjump_one_backward_jump() {
    let src = "def main():\n    x = 0\n    while x < 3:\n        x = x + 1\n    return x\n";
    let (_module, _sema, program) = compiled(src);

    let condjumps = program
        .instructions
        .iter()
        .filter(|inst| matches!(inst, Inst::CondJump { .. }))
        .count();
    assert_eq!(condjumps, 1, "tape: {}", program.dump());

    let backward_jumps = program
        .instructions
        .iter()
        .enumerate()
        .filter(|(i, inst)| matches!(inst, Inst::Jump { dest } if dest < i))
        .count();
    assert_eq!(backward_jumps, 1, "tape: {}", program.dump());
}

#[test]
fn while_loop_executes_to_three() {
    let src = "def main():\n    x = 0\n    while x < 3:\n        x = x + 1\n    return x\n";
    assert_eq!(run_main(src), Value::I32(3));
}

#[test]
fn module_entry_precedes_function_bodies() {
    let src = "x = 1\ndef main():\n    return x\n";
    let (_module, _sema, program) = compiled(src);

    // The entry point runs the toplevel assign, then a synthetic return;
    // the main label comes after.
    let main_index = program.find_label("main").expect("main is labeled");
    assert!(main_index >= 2, "tape: {}", program.dump());
    assert!(matches!(program.instructions[0], Inst::Stmt(_)));
}

#[test]
fn calls_resolve_to_labels_by_name() {
    let src = "def helper():\n    return 1\ndef main():\n    return helper()\n";
    let (module, _sema, program) = compiled(src);

    let helper_index = program.find_label("helper").expect("helper labeled");
    let mut found = false;
    for i in 0..module.ast.expr_count() {
        let id = kiwi_common::node::ExprId(i as u32);
        if let ExprKind::Call { jump_id: Some(jump), .. } = &module.ast.expr(id).kind {
            assert_eq!(*jump, helper_index);
            found = true;
        }
    }
    assert!(found, "the call to helper must carry its label index");
}

#[test]
fn if_else_takes_one_branch() {
    let src = "def main():\n    x = 5\n    if x < 3:\n        return 10\n    else:\n        return 20\n";
    assert_eq!(run_main(src), Value::I32(20));
}

#[test]
fn elif_chain_executes() {
    let src = "def pick(x: i32) -> i32:\n    if x == 0:\n        return 100\n    elif x == 1:\n        return 200\n    else:\n        return 300\ndef main():\n    return pick(1)\n";
    assert_eq!(run_main(src), Value::I32(200));
}

#[test]
fn break_and_continue_jumps_are_backpatched() {
    let src = "def main():\n    x = 0\n    total = 0\n    while x < 10:\n        x = x + 1\n        if x == 3:\n            continue\n        if x > 5:\n            break\n        total = total + x\n    return total\n";
    // 1 + 2 + 4 + 5 (3 skipped, stop after 6).
    assert_eq!(run_main(src), Value::I32(12));
}

#[test]
fn try_except_trampolines_to_the_handler() {
    let src = "class E:\n    def __init__(self, m: str):\n        self.m = m\ndef main():\n    try:\n        raise E(\"boom\")\n    except E as e:\n        return 42\n    return 0\n";
    let (module, sema, program) = compiled(src);
    assert!(!program.try_blocks.is_empty(), "try region registered");

    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0).unwrap();
    let out = vm
        .call_label(&module, &program, "main", Vec::new())
        .expect("the handler catches E");
    assert_eq!(out, Value::I32(42));
    assert!(vm.evaluator.exceptions.is_empty());
}

#[test]
fn unhandled_exception_unwinds_to_the_caller() {
    let src = "class E:\n    def __init__(self, m: str):\n        self.m = m\ndef main():\n    raise E(\"boom\")\n";
    let (module, sema, program) = compiled(src);
    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0).unwrap();
    let err = vm
        .call_label(&module, &program, "main", Vec::new())
        .expect_err("exception must unwind");
    assert!(matches!(err, Value::Object(_)));
}

#[test]
fn assert_lowers_to_condjump_and_raise() {
    let src = "def main():\n    assert 1 < 2\n    return 5\n";
    let (_module, _sema, program) = compiled(src);
    let condjumps = program
        .instructions
        .iter()
        .filter(|inst| matches!(inst, Inst::CondJump { .. }))
        .count();
    assert_eq!(condjumps, 1);
    assert_eq!(run_main(src), Value::I32(5));
}

#[test]
fn failed_assert_raises() {
    let src = "def main():\n    assert 2 < 1\n    return 5\n";
    let (module, sema, program) = compiled(src);
    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0).unwrap();
    let err = vm
        .call_label(&module, &program, "main", Vec::new())
        .expect_err("assert must raise");
    assert!(err.to_string().contains("AssertionError"));
}

#[test]
fn match_lowers_to_compare_stanzas() {
    let src = "def pick(x: i32) -> i32:\n    match x:\n        case 0:\n            return 100\n        case 1:\n            return 200\n        case _:\n            return 300\ndef main():\n    return pick(1)\n";
    let (_module, _sema, program) = compiled(src);
    let condjumps = program
        .instructions
        .iter()
        .filter(|inst| matches!(inst, Inst::CondJump { .. }))
        .count();
    assert_eq!(condjumps, 2, "one stanza per value case: {}", program.dump());
    assert_eq!(run_main(src), Value::I32(200));
}

#[test]
fn native_functions_emit_native_instructions() {
    use kiwi_common::span::Span;
    use kiwi_parser::ast::{Arguments, StmtKind};

    // Build a module with a native def in the body.
    let result = parse("");
    let mut module = result.module;
    fn double(args: &[Value]) -> Value {
        match args.first() {
            Some(Value::I32(n)) => Value::I32(n * 2),
            _ => Value::None,
        }
    }
    let native = module.ast.add_stmt(
        StmtKind::FunctionDef {
            name: "double".to_string(),
            args: Arguments::default(),
            body: Vec::new(),
            decorators: Vec::new(),
            returns: None,
            ty: None,
            docstring: None,
            native: Some(double),
            generator: false,
            is_async: false,
        },
        Span::point(0),
    );
    module.body.push(native);

    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    let program = compile(&mut module);

    assert!(program
        .instructions
        .iter()
        .any(|inst| matches!(inst, Inst::Native(_))));

    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0).unwrap();
    let out = vm
        .call_label(&module, &program, "double", vec![Value::I32(21)])
        .unwrap();
    assert_eq!(out, Value::I32(42));
}

#[test]
fn for_loops_run_via_the_evaluator_path() {
    let src = "def main():\n    total = 0\n    for i in range(4):\n        total = total + i\n    return total\n";
    assert_eq!(run_main(src), Value::I32(6));
}

#[test]
fn finally_runs_after_handler() {
    let src = "class E:\n    def __init__(self, m: str):\n        self.m = m\ndef main():\n    order = 0\n    try:\n        raise E(\"x\")\n    except E as e:\n        order = order * 10 + 1\n    finally:\n        order = order * 10 + 2\n    return order\n";
    assert_eq!(run_main(src), Value::I32(12));
}

#[test]
fn unmatched_inner_finally_runs_during_unwind() {
    // The inner handler does not match B, so the exception propagates to
    // the outer try; the inner finally must still run on the way out.
    let src = "class A:\n    def __init__(self, m: str):\n        self.m = m\nclass B:\n    def __init__(self, m: str):\n        self.m = m\ndef main():\n    log = 0\n    try:\n        try:\n            raise B(\"boom\")\n        except A as a:\n            log = log * 10 + 1\n        finally:\n            log = log * 10 + 2\n    except B as b:\n        log = log * 10 + 3\n    return log\n";
    assert_eq!(run_main(src), Value::I32(23));
}

#[test]
fn unmatched_finally_runs_before_full_unwind() {
    // No handler matches anywhere; the finally side effect must still be
    // observable on the object the caller holds.
    let src = "class E:\n    def __init__(self, m: str):\n        self.m = m\nclass Log:\n    def __init__(self):\n        self.closed = False\ndef main():\n    log = Log()\n    try:\n        raise E(\"boom\")\n    finally:\n        log.closed = True\n";
    let (module, sema, program) = compiled(src);
    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0).unwrap();
    let err = vm
        .call_label(&module, &program, "main", Vec::new())
        .expect_err("the exception must keep unwinding past the finally");
    assert!(matches!(err, Value::Object(_)));
}
