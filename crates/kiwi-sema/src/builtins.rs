//! Builtin registration: the prepopulated binding table and the native
//! operator registries.
//!
//! Operators resolve through signature strings `"{op}-{lhs}-{rhs}"` keyed
//! into four registries (binary, boolean, unary, comparison). Sema looks a
//! signature up once and stores the function pointer on the operator node;
//! execution then calls straight through it.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use kiwi_common::node::NodeId;
use kiwi_common::span::Span;
use kiwi_common::value::{type_ids, NativeFn, Value};
use kiwi_parser::ast::{Arguments, Module, StmtKind};

use crate::bindings::Bindings;

/// The builtin type names, in binding-table order, paired with their
/// registry type ids.
pub const BUILTIN_TYPES: &[(&str, usize)] = &[
    ("Type", type_ids::TYPE),
    ("None", type_ids::NONE),
    ("i8", type_ids::I8),
    ("i16", type_ids::I16),
    ("i32", type_ids::I32),
    ("i64", type_ids::I64),
    ("f32", type_ids::F32),
    ("f64", type_ids::F64),
    ("u8", type_ids::U8),
    ("u16", type_ids::U16),
    ("u32", type_ids::U32),
    ("u64", type_ids::U64),
    ("str", type_ids::STR),
    ("bool", type_ids::BOOL),
    ("Module", type_ids::MODULE),
];

// ── Registry construction ──────────────────────────────────────────────

macro_rules! int_ops {
    ($bin:expr, $cmp:expr, $un:expr, $name:literal, $variant:ident) => {
        $bin.insert(
            concat!("+-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x.wrapping_add(*y)),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("--", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x.wrapping_sub(*y)),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("*-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x.wrapping_mul(*y)),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("/-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) if *y != 0 => Value::$variant(x / y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("//-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) if *y != 0 => {
                    Value::$variant(x.div_euclid(*y))
                }
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("%-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) if *y != 0 => {
                    Value::$variant(x.rem_euclid(*y))
                }
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("**-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => {
                    Value::$variant(x.wrapping_pow(u32::try_from(*y).unwrap_or(0)))
                }
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("&-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x & y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("|-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x | y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("^-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x ^ y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("<<-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => {
                    Value::$variant(x.wrapping_shl(*y as u32))
                }
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!(">>-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => {
                    Value::$variant(x.wrapping_shr(*y as u32))
                }
                _ => Value::None,
            }) as NativeFn,
        );
        $un.insert(
            concat!("--", $name).to_string(),
            (|a: &[Value]| match &a[0] {
                Value::$variant(x) => Value::$variant(x.wrapping_neg()),
                _ => Value::None,
            }) as NativeFn,
        );
        $un.insert(
            concat!("+-", $name).to_string(),
            (|a: &[Value]| a[0].clone()) as NativeFn,
        );
        $un.insert(
            concat!("~-", $name).to_string(),
            (|a: &[Value]| match &a[0] {
                Value::$variant(x) => Value::$variant(!x),
                _ => Value::None,
            }) as NativeFn,
        );
        scalar_cmps!($cmp, $name, $variant);
    };
}

macro_rules! float_ops {
    ($bin:expr, $cmp:expr, $un:expr, $name:literal, $variant:ident) => {
        $bin.insert(
            concat!("+-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x + y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("--", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x - y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("*-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x * y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("/-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x / y),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("//-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant((x / y).floor()),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("%-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x.rem_euclid(*y)),
                _ => Value::None,
            }) as NativeFn,
        );
        $bin.insert(
            concat!("**-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::$variant(x.powf(*y)),
                _ => Value::None,
            }) as NativeFn,
        );
        $un.insert(
            concat!("--", $name).to_string(),
            (|a: &[Value]| match &a[0] {
                Value::$variant(x) => Value::$variant(-x),
                _ => Value::None,
            }) as NativeFn,
        );
        $un.insert(
            concat!("+-", $name).to_string(),
            (|a: &[Value]| a[0].clone()) as NativeFn,
        );
        scalar_cmps!($cmp, $name, $variant);
    };
}

macro_rules! scalar_cmps {
    ($cmp:expr, $name:literal, $variant:ident) => {
        $cmp.insert(
            concat!("==-", $name, "-", $name).to_string(),
            (|a: &[Value]| Value::Bool(a[0] == a[1])) as NativeFn,
        );
        $cmp.insert(
            concat!("!=-", $name, "-", $name).to_string(),
            (|a: &[Value]| Value::Bool(a[0] != a[1])) as NativeFn,
        );
        $cmp.insert(
            concat!("<-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::Bool(x < y),
                _ => Value::Bool(false),
            }) as NativeFn,
        );
        $cmp.insert(
            concat!("<=-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::Bool(x <= y),
                _ => Value::Bool(false),
            }) as NativeFn,
        );
        $cmp.insert(
            concat!(">-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::Bool(x > y),
                _ => Value::Bool(false),
            }) as NativeFn,
        );
        $cmp.insert(
            concat!(">=-", $name, "-", $name).to_string(),
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::$variant(x), Value::$variant(y)) => Value::Bool(x >= y),
                _ => Value::Bool(false),
            }) as NativeFn,
        );
        $cmp.insert(
            concat!("is-", $name, "-None").to_string(),
            (|a: &[Value]| Value::Bool(matches!(a[0], Value::None))) as NativeFn,
        );
        $cmp.insert(
            concat!("is not-", $name, "-None").to_string(),
            (|a: &[Value]| Value::Bool(!matches!(a[0], Value::None))) as NativeFn,
        );
    };
}

/// The four signature-keyed registries, built once.
struct Registries {
    binary: FxHashMap<String, NativeFn>,
    boolean: FxHashMap<String, NativeFn>,
    unary: FxHashMap<String, NativeFn>,
    cmp: FxHashMap<String, NativeFn>,
}

fn registries() -> &'static Registries {
    static REGISTRIES: OnceLock<Registries> = OnceLock::new();
    REGISTRIES.get_or_init(build_registries)
}

fn build_registries() -> Registries {
    let mut bin: FxHashMap<String, NativeFn> = FxHashMap::default();
    let mut cmp: FxHashMap<String, NativeFn> = FxHashMap::default();
    let mut un: FxHashMap<String, NativeFn> = FxHashMap::default();
    let mut boolean: FxHashMap<String, NativeFn> = FxHashMap::default();

    int_ops!(bin, cmp, un, "i8", I8);
    int_ops!(bin, cmp, un, "i16", I16);
    int_ops!(bin, cmp, un, "i32", I32);
    int_ops!(bin, cmp, un, "i64", I64);
    int_ops!(bin, cmp, un, "u8", U8);
    int_ops!(bin, cmp, un, "u16", U16);
    int_ops!(bin, cmp, un, "u32", U32);
    int_ops!(bin, cmp, un, "u64", U64);
    float_ops!(bin, cmp, un, "f32", F32);
    float_ops!(bin, cmp, un, "f64", F64);

    // String concatenation and repetition.
    bin.insert(
        "+-str-str".to_string(),
        (|a: &[Value]| match (&a[0], &a[1]) {
            (Value::Str(x), Value::Str(y)) => Value::Str(format!("{x}{y}")),
            _ => Value::None,
        }) as NativeFn,
    );
    bin.insert(
        "*-str-i32".to_string(),
        (|a: &[Value]| match (&a[0], &a[1]) {
            (Value::Str(x), Value::I32(n)) => Value::Str(x.repeat((*n).max(0) as usize)),
            _ => Value::None,
        }) as NativeFn,
    );

    // String ordering and equality, plus identity checks.
    for (sig, f) in [
        ("==-str-str", (|a: &[Value]| Value::Bool(a[0] == a[1])) as NativeFn),
        ("!=-str-str", (|a: &[Value]| Value::Bool(a[0] != a[1])) as NativeFn),
        (
            "<-str-str",
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::Str(x), Value::Str(y)) => Value::Bool(x < y),
                _ => Value::Bool(false),
            }) as NativeFn,
        ),
        (
            ">-str-str",
            (|a: &[Value]| match (&a[0], &a[1]) {
                (Value::Str(x), Value::Str(y)) => Value::Bool(x > y),
                _ => Value::Bool(false),
            }) as NativeFn,
        ),
        ("==-bool-bool", (|a: &[Value]| Value::Bool(a[0] == a[1])) as NativeFn),
        ("!=-bool-bool", (|a: &[Value]| Value::Bool(a[0] != a[1])) as NativeFn),
        ("is-None-None", (|_: &[Value]| Value::Bool(true)) as NativeFn),
        ("is not-None-None", (|_: &[Value]| Value::Bool(false)) as NativeFn),
        ("==-None-None", (|_: &[Value]| Value::Bool(true)) as NativeFn),
        (
            "is-str-None",
            (|a: &[Value]| Value::Bool(matches!(a[0], Value::None))) as NativeFn,
        ),
        (
            "is not-str-None",
            (|a: &[Value]| Value::Bool(!matches!(a[0], Value::None))) as NativeFn,
        ),
    ] {
        cmp.insert(sig.to_string(), f);
    }

    un.insert(
        "not-bool".to_string(),
        (|a: &[Value]| Value::Bool(!a[0].is_truthy())) as NativeFn,
    );

    boolean.insert(
        "and-bool-bool".to_string(),
        (|a: &[Value]| Value::Bool(a[0].is_truthy() && a[1].is_truthy())) as NativeFn,
    );
    boolean.insert(
        "or-bool-bool".to_string(),
        (|a: &[Value]| Value::Bool(a[0].is_truthy() || a[1].is_truthy())) as NativeFn,
    );

    Registries {
        binary: bin,
        boolean,
        unary: un,
        cmp,
    }
}

// ── Native functions ───────────────────────────────────────────────────

/// `print(...)`: write the arguments to stdout, space separated.
pub fn native_print(args: &[Value]) -> Value {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join(" "));
    Value::None
}

/// `len(x)` for strings and containers.
pub fn native_len(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Str(s)) => Value::I32(s.chars().count() as i32),
        Some(Value::Bytes(b)) => Value::I32(b.len() as i32),
        Some(Value::List(items)) => Value::I32(items.borrow().len() as i32),
        Some(Value::Tuple(items)) => Value::I32(items.len() as i32),
        Some(Value::Set(items)) => Value::I32(items.borrow().len() as i32),
        Some(Value::Dict(items)) => Value::I32(items.borrow().len() as i32),
        _ => Value::None,
    }
}

/// `str(x)`: the display form of any value.
pub fn native_str(args: &[Value]) -> Value {
    match args.first() {
        Some(v) => Value::Str(v.to_string()),
        None => Value::Str(String::new()),
    }
}

/// `range(stop)` / `range(start, stop)` / `range(start, stop, step)`.
pub fn native_range(args: &[Value]) -> Value {
    fn as_i32(v: Option<&Value>) -> Option<i32> {
        match v {
            Some(Value::I32(n)) => Some(*n),
            Some(Value::I64(n)) => i32::try_from(*n).ok(),
            _ => None,
        }
    }
    let (start, stop, step) = match args.len() {
        1 => (0, as_i32(args.first()).unwrap_or(0), 1),
        2 => (
            as_i32(args.first()).unwrap_or(0),
            as_i32(args.get(1)).unwrap_or(0),
            1,
        ),
        _ => (
            as_i32(args.first()).unwrap_or(0),
            as_i32(args.get(1)).unwrap_or(0),
            as_i32(args.get(2)).unwrap_or(1),
        ),
    };
    if step == 0 {
        return Value::list(Vec::new());
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::I32(i));
        i += step;
    }
    Value::list(items)
}

/// Install the native functions into the module's arena and the binding
/// table. Each native is a `FunctionDef` with a function pointer and no
/// Kiwi body; sema skips argument reordering for them and the VM emits a
/// direct native instruction.
pub fn install_native_functions(module: &mut Module, bindings: &mut Bindings) {
    let natives: [(&str, NativeFn); 4] = [
        ("print", native_print),
        ("len", native_len),
        ("str", native_str),
        ("range", native_range),
    ];
    for (name, f) in natives {
        let stmt = module.ast.add_stmt(
            StmtKind::FunctionDef {
                name: name.to_string(),
                args: Arguments::default(),
                body: Vec::new(),
                decorators: Vec::new(),
                returns: None,
                ty: None,
                docstring: None,
                native: Some(f),
                generator: false,
                is_async: false,
            },
            Span::point(0),
        );
        bindings.add(name, Some(NodeId::Stmt(stmt)), None, type_ids::MODULE);
    }
}

// ── Registry access ────────────────────────────────────────────────────

pub fn get_native_binary_operation(signature: &str) -> Option<NativeFn> {
    registries().binary.get(signature).copied()
}

pub fn get_native_cmp_operation(signature: &str) -> Option<NativeFn> {
    registries().cmp.get(signature).copied()
}

pub fn get_native_unary_operation(signature: &str) -> Option<NativeFn> {
    registries().unary.get(signature).copied()
}

pub fn get_native_bool_operation(signature: &str) -> Option<NativeFn> {
    registries().boolean.get(signature).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_resolves() {
        let add = get_native_binary_operation("+-i32-i32").unwrap();
        assert_eq!(add(&[Value::I32(2), Value::I32(3)]), Value::I32(5));

        let div = get_native_binary_operation("/-i32-i32").unwrap();
        assert_eq!(div(&[Value::I32(7), Value::I32(2)]), Value::I32(3));
    }

    #[test]
    fn missing_signature_is_none() {
        assert!(get_native_binary_operation("+-i32-str").is_none());
        assert!(get_native_bool_operation("and-i32-str").is_none());
    }

    #[test]
    fn comparisons_return_bool() {
        let lt = get_native_cmp_operation("<-i32-i32").unwrap();
        assert_eq!(lt(&[Value::I32(1), Value::I32(2)]), Value::Bool(true));

        let eq = get_native_cmp_operation("==-str-str").unwrap();
        assert_eq!(
            eq(&[Value::Str("a".into()), Value::Str("a".into())]),
            Value::Bool(true)
        );
    }

    #[test]
    fn unary_not_and_neg() {
        let not = get_native_unary_operation("not-bool").unwrap();
        assert_eq!(not(&[Value::Bool(true)]), Value::Bool(false));

        let neg = get_native_unary_operation("--i32").unwrap();
        assert_eq!(neg(&[Value::I32(5)]), Value::I32(-5));
    }

    #[test]
    fn float_division_stays_float() {
        let div = get_native_binary_operation("/-f64-f64").unwrap();
        assert_eq!(div(&[Value::F64(7.0), Value::F64(2.0)]), Value::F64(3.5));
    }
}
