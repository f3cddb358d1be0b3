//! End-to-end pipeline tests: source text through lexer, parser, sema,
//! and both execution engines, checking that the engines agree.

use kiwi_common::value::Value;
use kiwi_eval::TreeEvaluator;
use kiwi_parser::ops::{module_equal, print_module};
use kiwi_sema::SemanticAnalyser;
use kiwi_vm::VmExec;

/// Full pipeline, both engines; asserts clean diagnostics and agreement.
fn run_both(source: &str) -> Value {
    let result = kiwi_parser::parse(source);
    assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);

    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    assert!(sema.errors.is_empty(), "sema errors: {:?}", sema.errors);

    let mut evaluator = TreeEvaluator::new(&module, &sema);
    let tree_value = evaluator
        .eval_module()
        .unwrap_or_else(|exc| panic!("tree engine failed: {exc}"));

    let program = kiwi_vm::compile(&mut module);
    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0)
        .unwrap_or_else(|exc| panic!("vm entry failed: {exc}"));
    let vm_value = vm
        .call_label(&module, &program, "main", Vec::new())
        .unwrap_or_else(|exc| panic!("vm main failed: {exc}"));

    assert_eq!(
        tree_value, vm_value,
        "tree evaluator and VM disagree for:\n{source}"
    );
    tree_value
}

#[test]
fn counting_loop() {
    let src = "def main():\n    x = 0\n    while x < 3:\n        x = x + 1\n    return x\n";
    assert_eq!(run_both(src), Value::I32(3));
}

#[test]
fn fibonacci() {
    let src = "def fib(n: i32) -> i32:\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\ndef main():\n    return fib(10)\n";
    assert_eq!(run_both(src), Value::I32(55));
}

#[test]
fn classes_and_methods() {
    let src = "class Account:\n    def __init__(self, balance: i32):\n        self.balance = balance\n    def deposit(self, amount: i32) -> i32:\n        self.balance = self.balance + amount\n        return self.balance\ndef main():\n    a = Account(100)\n    a.deposit(50)\n    return a.deposit(25)\n";
    assert_eq!(run_both(src), Value::I32(175));
}

#[test]
fn exceptions_handled_cleanly() {
    let src = "class Oops:\n    def __init__(self, why: str):\n        self.why = why\ndef risky(flag: bool) -> i32:\n    if flag:\n        raise Oops(\"asked to\")\n    return 1\ndef main():\n    total = 0\n    try:\n        total = total + risky(False)\n        total = total + risky(True)\n    except Oops as e:\n        total = total + 10\n    return total\n";
    assert_eq!(run_both(src), Value::I32(11));
}

#[test]
fn strings_and_fstrings() {
    let src = "def main():\n    who = \"kiwi\"\n    return f\"hello {who}\"\n";
    assert_eq!(run_both(src), Value::Str("hello kiwi".to_string()));
}

#[test]
fn builtins_available() {
    let src = "def main():\n    xs = range(1, 5)\n    return len(xs)\n";
    assert_eq!(run_both(src), Value::I32(4));
}

#[test]
fn pretty_print_round_trip_end_to_end() {
    let src = "def main():\n    total = 0\n    for i in range(4):\n        if (i % 2) == 0:\n            total = total + i\n    return total\n";
    let first = kiwi_parser::parse(src);
    assert!(first.errors.is_empty());
    let printed = print_module(&first.module);
    let second = kiwi_parser::parse(&printed);
    assert!(second.errors.is_empty(), "reprint failed:\n{printed}");
    assert!(module_equal(&first.module, &second.module));

    assert_eq!(run_both(src), Value::I32(2));
}

#[test]
fn diagnostics_do_not_stop_analysis() {
    let src = "a = missing_one\nb = missing_two\n";
    let result = kiwi_parser::parse(src);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    // Both name errors surface in one pass.
    assert_eq!(sema.errors.len(), 2, "{:?}", sema.errors);
}

#[test]
fn parse_error_recovery_keeps_later_diagnostics() {
    let src = "def f(:\n    pass\nx = undefined_name\n";
    let result = kiwi_parser::parse(src);
    assert!(!result.errors.is_empty());

    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    assert!(
        sema.errors
            .iter()
            .any(|e| e.to_string().contains("undefined_name")),
        "sema still analyzes recovered statements: {:?}",
        sema.errors
    );
}
