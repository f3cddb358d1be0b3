//! Tree evaluator integration tests: execution of analyzed programs,
//! call semantics, control flow, exceptions, and generators.

use kiwi_common::value::Value;
use kiwi_eval::TreeEvaluator;
use kiwi_parser::parse;
use kiwi_sema::SemanticAnalyser;

fn run(source: &str) -> (Value, usize) {
    let result = parse(source);
    assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    assert!(sema.errors.is_empty(), "sema errors: {:?}", sema.errors);

    let mut evaluator = TreeEvaluator::new(&module, &sema);
    let value = evaluator
        .eval_module()
        .unwrap_or_else(|exc| panic!("unhandled exception: {exc}"));
    let leftover = evaluator.exceptions.len();
    (value, leftover)
}

#[test]
fn while_loop_counts_to_three() {
    let src = "def main():\n    x = 0\n    while x < 3:\n        x = x + 1\n    return x\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(3));
}

#[test]
fn arithmetic_follows_resolved_operators() {
    let (value, _) = run("def main():\n    return 2 + 3 * 4\n");
    assert_eq!(value, Value::I32(14));
}

#[test]
fn chained_comparison_evaluates_true() {
    let (value, _) = run("def main():\n    return 1 < 2 < 3\n");
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn chained_comparison_short_circuits() {
    // The failing first link must keep boom() from running.
    let src = "def boom() -> i32:\n    raise Error(\"must not run\")\ndef main():\n    x = 5\n    return x < 2 < boom()\n";
    let result = parse(src);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);

    let mut evaluator = TreeEvaluator::new(&module, &sema);
    let value = evaluator.eval_module().expect("no exception raised");
    assert_eq!(value, Value::Bool(false));
    assert!(evaluator.exceptions.is_empty());
}

#[test]
fn booleans_short_circuit() {
    let src = "def main():\n    t = True\n    return t or boom()\n";
    let result = parse(src);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    // `boom` is undefined; short-circuiting means it is never looked up.
    let mut evaluator = TreeEvaluator::new(&module, &sema);
    assert_eq!(evaluator.eval_module().unwrap(), Value::Bool(true));
}

#[test]
fn function_calls_bind_positionally() {
    let src = "def add(a: i32, b: i32) -> i32:\n    return a + b\ndef main():\n    return add(b=10, a=4)\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(14));
}

#[test]
fn recursion_works() {
    let src = "def fact(n: i32) -> i32:\n    if n < 2:\n        return 1\n    return n * fact(n - 1)\ndef main():\n    return fact(5)\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(120));
}

#[test]
fn for_loop_over_range() {
    let src = "def main():\n    total = 0\n    for i in range(5):\n        total = total + i\n    return total\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(10));
}

#[test]
fn break_skips_else_continue_does_not() {
    let src = "def main():\n    hits = 0\n    for i in range(3):\n        if i == 1:\n            continue\n        hits = hits + 1\n    for i in range(3):\n        if i == 1:\n            break\n        hits = hits + 10\n    else:\n        hits = hits + 100\n    return hits\n";
    let (value, _) = run(src);
    // continue: 2 hits; break: one +10 pass, else skipped.
    assert_eq!(value, Value::I32(12));
}

#[test]
fn class_construction_and_methods() {
    let src = "class Counter:\n    def __init__(self, start: i32):\n        self.count = start\n    def bump(self) -> i32:\n        self.count = self.count + 1\n        return self.count\ndef main():\n    c = Counter(10)\n    c.bump()\n    return c.bump()\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(12));
}

#[test]
fn magic_method_fallback_for_operators() {
    let src = "class Vec:\n    def __init__(self, x: i32):\n        self.x = x\n    def __add__(self, other: Vec) -> i32:\n        return self.x + other.x\ndef main():\n    return Vec(2) + Vec(3)\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(5));
}

#[test]
fn try_except_leaves_no_exception_behind() {
    let src = "class E:\n    def __init__(self, m: str):\n        self.m = m\ndef main():\n    try:\n        raise E(\"m\")\n    except E as e:\n        pass\n    return 1\n";
    let result = parse(src);
    assert!(result.errors.is_empty());
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    assert!(sema.errors.is_empty(), "{:?}", sema.errors);

    let mut evaluator = TreeEvaluator::new(&module, &sema);
    let value = evaluator.eval_module().expect("the handler catches E");
    assert_eq!(value, Value::I32(1));
    assert!(
        evaluator.exceptions.is_empty(),
        "exception stack must be empty after a handled raise"
    );
}

#[test]
fn finally_runs_on_return() {
    let src = "class Log:\n    def __init__(self):\n        self.closed = False\ndef main():\n    log = Log()\n    try:\n        return inner(log)\n    finally:\n        log.closed = True\ndef inner(log: Log) -> i32:\n    return 7\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(7));
}

#[test]
fn unhandled_exception_surfaces() {
    let src = "class E:\n    def __init__(self, m: str):\n        self.m = m\ndef main():\n    raise E(\"boom\")\n";
    let result = parse(src);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);

    let mut evaluator = TreeEvaluator::new(&module, &sema);
    let err = evaluator.eval_module().expect_err("exception must surface");
    assert!(matches!(err, Value::Object(_)));
}

#[test]
fn generators_yield_in_order() {
    let src = "def gen():\n    yield 1\n    yield 2\n    yield 3\ndef main():\n    total = 0\n    for v in gen():\n        total = total + v\n    return total\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(6));
}

#[test]
fn yield_from_flattens() {
    let src = "def inner():\n    yield 1\n    yield 2\ndef outer():\n    yield from inner()\n    yield 3\ndef main():\n    total = 0\n    for v in outer():\n        total = total + v\n    return total\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(6));
}

#[test]
fn lambda_values_are_callable() {
    let src = "def main():\n    double = lambda x: x + x\n    return double(21)\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(42));
}

#[test]
fn comprehensions_build_containers() {
    let src = "def main():\n    xs = [i * 2 for i in range(4) if i > 0]\n    return len(xs)\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(3));
}

#[test]
fn fstrings_interpolate() {
    let src = "def main():\n    n = 4\n    return f\"n={n}!\"\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::Str("n=4!".to_string()));
}

#[test]
fn match_statement_dispatches() {
    let src = "def describe(x: i32) -> i32:\n    match x:\n        case 0:\n            return 100\n        case 1 | 2:\n            return 200\n        case other:\n            return other\ndef main():\n    return describe(0) + describe(2) + describe(9)\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(309));
}

#[test]
fn tuple_unpacking_assignment() {
    let src = "def main():\n    a, b = 1, 2\n    a, b = b, a\n    return a * 10 + b\n";
    let (value, _) = run(src);
    assert_eq!(value, Value::I32(21));
}

#[test]
fn stack_trace_depth_follows_calls() {
    let src = "def main():\n    return 1\n";
    let result = parse(src);
    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);
    let mut evaluator = TreeEvaluator::new(&module, &sema);
    evaluator.eval_module().unwrap();
    // Traces nest per call and unwind back to the root frame.
    assert_eq!(evaluator.traces.len(), 1);
}
