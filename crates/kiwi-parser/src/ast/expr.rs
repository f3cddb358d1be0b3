//! Expression node kinds.
//!
//! Covers values (`Constant`, collection literals, comprehensions, strings),
//! operators (`BinOp`, `BoolOp`, `UnaryOp`, `Compare`), calls and access
//! (`Call`, `Attribute`, `Subscript`), binding forms (`Lambda`,
//! `NamedExpr`), and the type-expression sublanguage used by sema
//! (`Arrow`, `BuiltinType`, collection types, `ClassType`).

use kiwi_common::node::{ExprId, StmtId};
use kiwi_common::op::{BinaryOperator, BoolOperator, CmpOperator, UnaryOperator};
use kiwi_common::value::{NativeFn, Value};

use super::{Arguments, Comprehension, Keyword};

/// Whether an expression is being read, written, or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
    Del,
}

/// Every kind of expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// An identifier reference. Sema records the binding index at the
    /// definition site (`store_id`) and at this use site (`load_id`); the
    /// difference is the de Bruijn offset execution uses.
    Name {
        id: String,
        ctx: ExprContext,
        store_id: Option<usize>,
        load_id: Option<usize>,
    },

    /// A literal value.
    Constant { value: Value },

    /// `left <op> right`. Sema stores the resolved native handler.
    BinOp {
        left: ExprId,
        op: BinaryOperator,
        right: ExprId,
        native_op: Option<NativeFn>,
    },

    /// `a and b and c`: one node per operator run, values flattened.
    /// Invariant: `values.len() == opcount + 1`.
    BoolOp {
        op: BoolOperator,
        values: Vec<ExprId>,
        opcount: usize,
        native_op: Option<NativeFn>,
    },

    /// `<op> operand`.
    UnaryOp {
        op: UnaryOperator,
        operand: ExprId,
        native_op: Option<NativeFn>,
    },

    /// A chained comparison `a < b <= c`.
    /// Invariant: `ops.len() == comparators.len()`, and `native_ops` is
    /// filled to the same length by sema.
    Compare {
        left: ExprId,
        ops: Vec<CmpOperator>,
        comparators: Vec<ExprId>,
        native_ops: Vec<Option<NativeFn>>,
    },

    /// A call. After sema, `args` is in positional order; after VM
    /// assembly, `jump_id` holds the callee's label index when the callee
    /// is a named function.
    Call {
        func: ExprId,
        args: Vec<ExprId>,
        varargs: Vec<ExprId>,
        keywords: Vec<Keyword>,
        jump_id: Option<usize>,
    },

    /// `value.attr`. Sema records the attribute index on the class
    /// (`attrid`) and the resolved member statement.
    Attribute {
        value: ExprId,
        attr: String,
        attrid: Option<usize>,
        resolved: Option<StmtId>,
        ctx: ExprContext,
    },

    /// `value[slice]`.
    Subscript {
        value: ExprId,
        slice: ExprId,
        ctx: ExprContext,
    },

    /// `*value` in call arguments or assignment targets.
    Starred { value: ExprId, ctx: ExprContext },

    /// `body if test else orelse`.
    IfExp {
        test: ExprId,
        body: ExprId,
        orelse: ExprId,
    },

    /// `lambda args: body`.
    Lambda { args: Arguments, body: ExprId },

    /// `target := value`.
    NamedExpr { target: ExprId, value: ExprId },

    /// `await value`.
    Await { value: ExprId },

    /// `yield [value]`.
    Yield { value: Option<ExprId> },

    /// `yield from value`.
    YieldFrom { value: ExprId },

    /// `[a, b, c]`.
    ListExpr { elts: Vec<ExprId>, ctx: ExprContext },

    /// `(a, b, c)`.
    TupleExpr { elts: Vec<ExprId>, ctx: ExprContext },

    /// `{a, b, c}`.
    SetExpr { elts: Vec<ExprId> },

    /// `{k: v, ...}`. Keys and values are parallel vectors.
    DictExpr {
        keys: Vec<ExprId>,
        values: Vec<ExprId>,
    },

    /// `[elt for t in it if cond]`.
    ListComp {
        elt: ExprId,
        generators: Vec<Comprehension>,
    },

    /// `{elt for t in it}`.
    SetComp {
        elt: ExprId,
        generators: Vec<Comprehension>,
    },

    /// `{k: v for t in it}`.
    DictComp {
        key: ExprId,
        value: ExprId,
        generators: Vec<Comprehension>,
    },

    /// `(elt for t in it)`.
    GeneratorExp {
        elt: ExprId,
        generators: Vec<Comprehension>,
    },

    /// `lower:upper[:step]` inside a subscript.
    Slice {
        lower: Option<ExprId>,
        upper: Option<ExprId>,
        step: Option<ExprId>,
    },

    /// An f-string: literal text constants interleaved with
    /// `FormattedValue`s.
    JoinedStr { values: Vec<ExprId> },

    /// One `{expr[!conv][:spec]}` interpolation.
    FormattedValue {
        value: ExprId,
        conversion: Option<char>,
        format_spec: Option<ExprId>,
    },

    // ── Type expressions ───────────────────────────────────────────────
    /// A function type `(T1, ..., Tn) -> R` with optional per-argument
    /// names and defaults.
    Arrow {
        args: Vec<ExprId>,
        returns: Option<ExprId>,
        names: Vec<String>,
        defaults: Vec<Option<ExprId>>,
    },

    /// `Dict[K, V]` as a type.
    DictType { key: ExprId, value: ExprId },

    /// `List[T]` as a type.
    ArrayType { item: ExprId },

    /// `Set[T]` as a type.
    SetType { item: ExprId },

    /// `Tuple[T1, ..., Tn]` as a type.
    TupleType { types: Vec<ExprId> },

    /// One of the builtin type names (`i32`, `str`, `bool`, ...).
    BuiltinType { name: String },

    /// A user class used as a type; points at its `ClassDef`.
    ClassType { def: StmtId },

    /// A hole left by error recovery or editing.
    Placeholder,

    /// A binding re-exported from an interactive session.
    Exported { node: Option<StmtId> },
}

impl ExprKind {
    /// Stable name of the kind, for logs and dispatch errors.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Name { .. } => "Name",
            ExprKind::Constant { .. } => "Constant",
            ExprKind::BinOp { .. } => "BinOp",
            ExprKind::BoolOp { .. } => "BoolOp",
            ExprKind::UnaryOp { .. } => "UnaryOp",
            ExprKind::Compare { .. } => "Compare",
            ExprKind::Call { .. } => "Call",
            ExprKind::Attribute { .. } => "Attribute",
            ExprKind::Subscript { .. } => "Subscript",
            ExprKind::Starred { .. } => "Starred",
            ExprKind::IfExp { .. } => "IfExp",
            ExprKind::Lambda { .. } => "Lambda",
            ExprKind::NamedExpr { .. } => "NamedExpr",
            ExprKind::Await { .. } => "Await",
            ExprKind::Yield { .. } => "Yield",
            ExprKind::YieldFrom { .. } => "YieldFrom",
            ExprKind::ListExpr { .. } => "ListExpr",
            ExprKind::TupleExpr { .. } => "TupleExpr",
            ExprKind::SetExpr { .. } => "SetExpr",
            ExprKind::DictExpr { .. } => "DictExpr",
            ExprKind::ListComp { .. } => "ListComp",
            ExprKind::SetComp { .. } => "SetComp",
            ExprKind::DictComp { .. } => "DictComp",
            ExprKind::GeneratorExp { .. } => "GeneratorExp",
            ExprKind::Slice { .. } => "Slice",
            ExprKind::JoinedStr { .. } => "JoinedStr",
            ExprKind::FormattedValue { .. } => "FormattedValue",
            ExprKind::Arrow { .. } => "Arrow",
            ExprKind::DictType { .. } => "DictType",
            ExprKind::ArrayType { .. } => "ArrayType",
            ExprKind::SetType { .. } => "SetType",
            ExprKind::TupleType { .. } => "TupleType",
            ExprKind::BuiltinType { .. } => "BuiltinType",
            ExprKind::ClassType { .. } => "ClassType",
            ExprKind::Placeholder => "Placeholder",
            ExprKind::Exported { .. } => "Exported",
        }
    }

    /// Build a plain load-context name.
    pub fn name_load(id: impl Into<String>) -> Self {
        ExprKind::Name {
            id: id.into(),
            ctx: ExprContext::Load,
            store_id: None,
            load_id: None,
        }
    }

    pub fn constant(value: Value) -> Self {
        ExprKind::Constant { value }
    }
}
