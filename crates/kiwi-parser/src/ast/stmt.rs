//! Statement node kinds.

use kiwi_common::node::{ExprId, StmtId};
use kiwi_common::op::BinaryOperator;
use kiwi_common::token::Token;
use kiwi_common::value::NativeFn;

use super::{
    Alias, Arguments, ClassAttr, Decorator, Docstring, ExceptHandler, Keyword, MatchCase, WithItem,
};

/// Every kind of statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `def name(args) -> returns:` (or `async def` with `is_async`).
    /// After sema, `ty` is the function's `Arrow`. A `native` function has
    /// no Kiwi body to run; calls go straight to the pointer.
    FunctionDef {
        name: String,
        args: Arguments,
        body: Vec<StmtId>,
        decorators: Vec<Decorator>,
        returns: Option<ExprId>,
        ty: Option<ExprId>,
        docstring: Option<Docstring>,
        native: Option<NativeFn>,
        generator: bool,
        is_async: bool,
    },

    /// `class name(bases, **keywords):`. Sema fills `attributes` (body
    /// members plus `self.x` assignments found in `__init__`), the dotted
    /// `cls_namespace`, and the constructor arrow `ctor_t`.
    ClassDef {
        name: String,
        bases: Vec<ExprId>,
        keywords: Vec<Keyword>,
        body: Vec<StmtId>,
        decorators: Vec<Decorator>,
        attributes: Vec<ClassAttr>,
        cls_namespace: String,
        ctor_t: Option<ExprId>,
        docstring: Option<Docstring>,
    },

    /// `return [value]`.
    Return { value: Option<ExprId> },

    /// `a = b = value`.
    Assign { targets: Vec<ExprId>, value: ExprId },

    /// `target: annotation [= value]`.
    AnnAssign {
        target: ExprId,
        annotation: ExprId,
        value: Option<ExprId>,
    },

    /// `target <op>= value`.
    AugAssign {
        target: ExprId,
        op: BinaryOperator,
        value: ExprId,
    },

    /// `del targets`.
    Delete { targets: Vec<ExprId> },

    /// `for target in iter:` with an optional `else`. `async for` sets
    /// `is_async`.
    For {
        target: ExprId,
        iter: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
        is_async: bool,
        else_comment: Option<String>,
    },

    /// `while test:` with an optional `else`.
    While {
        test: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },

    /// `if test:` with `elif` arms in the parallel `tests`/`bodies`
    /// vectors and a final `else` in `orelse`.
    If {
        test: ExprId,
        body: Vec<StmtId>,
        tests: Vec<ExprId>,
        bodies: Vec<Vec<StmtId>>,
        orelse: Vec<StmtId>,
        tests_comment: Vec<Option<String>>,
        else_comment: Option<String>,
    },

    /// `with items:`. `async with` sets `is_async`.
    With {
        items: Vec<WithItem>,
        body: Vec<StmtId>,
        is_async: bool,
    },

    /// `raise [exc [from cause]]`.
    Raise {
        exc: Option<ExprId>,
        cause: Option<ExprId>,
    },

    /// `try:` with handlers, `else`, and `finally`.
    Try {
        body: Vec<StmtId>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<StmtId>,
        finalbody: Vec<StmtId>,
    },

    /// `assert test [, msg]`.
    Assert { test: ExprId, msg: Option<ExprId> },

    /// `import names`.
    Import { names: Vec<Alias> },

    /// `from module import names`.
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: Option<usize>,
    },

    /// `global names`.
    Global { names: Vec<String> },

    /// `nonlocal names`.
    Nonlocal { names: Vec<String> },

    /// A bare expression statement.
    Expr { value: ExprId },

    Pass,
    Break,
    Continue,

    /// `match subject:` with its case arms.
    Match {
        subject: ExprId,
        cases: Vec<MatchCase>,
    },

    /// Semicolon-chained statements on one line.
    Inline { body: Vec<StmtId> },

    /// A standalone comment line, kept for round-tripping.
    Comment { text: String },

    /// A statement the parser could not make sense of. Carries the tokens
    /// consumed up to the next newline so diagnostics can echo the line.
    InvalidStatement { tokens: Vec<Token> },
}

impl StmtKind {
    /// Stable name of the kind, for logs and dispatch errors.
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::FunctionDef { .. } => "FunctionDef",
            StmtKind::ClassDef { .. } => "ClassDef",
            StmtKind::Return { .. } => "Return",
            StmtKind::Assign { .. } => "Assign",
            StmtKind::AnnAssign { .. } => "AnnAssign",
            StmtKind::AugAssign { .. } => "AugAssign",
            StmtKind::Delete { .. } => "Delete",
            StmtKind::For { .. } => "For",
            StmtKind::While { .. } => "While",
            StmtKind::If { .. } => "If",
            StmtKind::With { .. } => "With",
            StmtKind::Raise { .. } => "Raise",
            StmtKind::Try { .. } => "Try",
            StmtKind::Assert { .. } => "Assert",
            StmtKind::Import { .. } => "Import",
            StmtKind::ImportFrom { .. } => "ImportFrom",
            StmtKind::Global { .. } => "Global",
            StmtKind::Nonlocal { .. } => "Nonlocal",
            StmtKind::Expr { .. } => "Expr",
            StmtKind::Pass => "Pass",
            StmtKind::Break => "Break",
            StmtKind::Continue => "Continue",
            StmtKind::Match { .. } => "Match",
            StmtKind::Inline { .. } => "Inline",
            StmtKind::Comment { .. } => "Comment",
            StmtKind::InvalidStatement { .. } => "InvalidStatement",
        }
    }
}
