//! Kiwi semantic analysis.
//!
//! A single pass over the parsed module that resolves names to binding
//! indices, deduces and checks types structurally, resolves operators to
//! native handlers (with magic-method fallback), and records class
//! attributes. Diagnostics accumulate in an error list; the analyzer never
//! stops at the first problem.
//!
//! Types are type-expression nodes (`Arrow`, `BuiltinType`, `ClassType`,
//! collection types) allocated in the module's own arena, so the rest of
//! the pipeline can print and compare them with the ordinary AST
//! operations.

pub mod bindings;
pub mod builtins;
pub mod diagnostics;
pub mod errors;

use rustc_hash::FxHashMap;

use kiwi_common::node::{ExprId, NodeId, StmtId};
use kiwi_common::op::{BinaryOperator, BoolOperator, CmpOperator};
use kiwi_common::span::Span;
use kiwi_common::value::{type_ids, Value};

use kiwi_parser::ast::{
    Arguments, ClassAttr, ExprContext, ExprKind, Module, PatKind, StmtKind,
};
use kiwi_parser::ops::{attribute::getattr, equality::expr_equal, print::expr_to_string};

use bindings::Bindings;
use builtins::{
    get_native_binary_operation, get_native_bool_operation, get_native_cmp_operation,
    get_native_unary_operation, BUILTIN_TYPES,
};
use errors::SemaError;

/// A type is an expression node in the module arena.
pub type TypeExpr = ExprId;

/// User classes get registry ids above the builtin slots; the id on a
/// `Value::Object` indexes back into this table.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    defs: Vec<StmtId>,
}

impl ClassRegistry {
    pub fn register(&mut self, def: StmtId) -> usize {
        if let Some(existing) = self.type_id_of(def) {
            return existing;
        }
        self.defs.push(def);
        type_ids::FIRST_USER_TYPE + self.defs.len() - 1
    }

    pub fn type_id_of(&self, def: StmtId) -> Option<usize> {
        self.defs
            .iter()
            .position(|&d| d == def)
            .map(|i| type_ids::FIRST_USER_TYPE + i)
    }

    pub fn class_of(&self, type_id: usize) -> Option<StmtId> {
        type_id
            .checked_sub(type_ids::FIRST_USER_TYPE)
            .and_then(|i| self.defs.get(i).copied())
    }
}

/// The semantic analyzer.
pub struct SemanticAnalyser {
    pub bindings: Bindings,
    pub errors: Vec<SemaError>,
    pub classes: ClassRegistry,
    namespaces: Vec<String>,
    /// Interned builtin type nodes, one per name per module.
    type_cache: FxHashMap<String, ExprId>,
    /// Interned `ClassType` nodes.
    class_type_cache: FxHashMap<StmtId, ExprId>,
    /// Return annotation of each enclosing function, for `return` checks.
    fn_returns: Vec<Option<TypeExpr>>,
}

impl Default for SemanticAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyser {
    pub fn new() -> Self {
        Self {
            bindings: Bindings::new(),
            errors: Vec::new(),
            classes: ClassRegistry::default(),
            namespaces: Vec::new(),
            type_cache: FxHashMap::default(),
            class_type_cache: FxHashMap::default(),
            fn_returns: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Analyze a whole module. Safe to call again on the same module: the
    /// second pass reuses cached types and adds no duplicate bindings.
    pub fn exec(&mut self, module: &mut Module) {
        if self.bindings.is_empty() {
            self.prepopulate(module);
        }
        for stmt in module.body.clone() {
            self.exec_stmt(module, stmt);
        }
    }

    /// Seed the binding table: builtin types with their native ids, the
    /// constants `None`/`True`/`False`, and the native functions.
    fn prepopulate(&mut self, module: &mut Module) {
        let type_t = self.builtin_type(module, "Type");
        for &(name, type_id) in BUILTIN_TYPES {
            self.bindings.add(name, None, Some(type_t), type_id);
        }

        let none_t = self.builtin_type(module, "None");
        let bool_t = self.builtin_type(module, "bool");
        self.bindings.add("None", None, Some(none_t), type_ids::NONE);
        self.bindings.add("True", None, Some(bool_t), type_ids::BOOL);
        self.bindings.add("False", None, Some(bool_t), type_ids::BOOL);

        builtins::install_native_functions(module, &mut self.bindings);
    }

    // ── Type helpers ───────────────────────────────────────────────────

    /// The interned `BuiltinType` node for `name`.
    pub fn builtin_type(&mut self, module: &mut Module, name: &str) -> TypeExpr {
        if let Some(&cached) = self.type_cache.get(name) {
            return cached;
        }
        let id = module.ast.add_expr(
            ExprKind::BuiltinType {
                name: name.to_string(),
            },
            Span::point(0),
        );
        self.type_cache.insert(name.to_string(), id);
        id
    }

    /// The interned `ClassType` node for a class definition.
    pub fn class_type(&mut self, module: &mut Module, def: StmtId) -> TypeExpr {
        if let Some(&cached) = self.class_type_cache.get(&def) {
            return cached;
        }
        let id = module.ast.add_expr(ExprKind::ClassType { def }, Span::point(0));
        self.class_type_cache.insert(def, id);
        id
    }

    /// Canonicalize a type expression: a `Name` that refers to a builtin
    /// type or a class becomes the corresponding type node; anything else
    /// stays as written (unresolved annotations remain symbolic).
    fn resolve_type(&mut self, module: &mut Module, ty: TypeExpr) -> TypeExpr {
        let name = match &module.ast.expr(ty).kind {
            ExprKind::Name { id, .. } => id.clone(),
            _ => return ty,
        };
        if BUILTIN_TYPES.iter().any(|(n, _)| *n == name) {
            return self.builtin_type(module, &name);
        }
        if let Some(entry) = self.bindings.find(&name) {
            if let Some(NodeId::Stmt(def)) = entry.value {
                if matches!(module.ast.stmt(def).kind, StmtKind::ClassDef { .. }) {
                    return self.class_type(module, def);
                }
            }
        }
        ty
    }

    /// Whether a type expression resolves to something concrete enough to
    /// check against. Unresolved annotation names stay symbolic and are
    /// not checked.
    fn is_known_type(&mut self, module: &mut Module, ty: TypeExpr) -> bool {
        let resolved = self.resolve_type(module, ty);
        match &module.ast.expr(resolved).kind {
            ExprKind::BuiltinType { .. } | ExprKind::ClassType { .. } => true,
            ExprKind::Arrow { .. }
            | ExprKind::ArrayType { .. }
            | ExprKind::SetType { .. }
            | ExprKind::DictType { .. }
            | ExprKind::TupleType { .. } => true,
            _ => false,
        }
    }

    /// Render a type for signatures and messages.
    pub fn type_name(&mut self, module: &mut Module, ty: Option<TypeExpr>) -> String {
        match ty {
            Some(ty) => {
                let resolved = self.resolve_type(module, ty);
                expr_to_string(&module.ast, resolved)
            }
            None => "?".to_string(),
        }
    }

    /// Structural type comparison; emits a `TypeError` on mismatch.
    /// Checks only run when both sides are known.
    fn typecheck(
        &mut self,
        module: &mut Module,
        lhs_t: Option<TypeExpr>,
        rhs_t: Option<TypeExpr>,
        span: Span,
    ) {
        let (Some(lhs), Some(rhs)) = (lhs_t, rhs_t) else {
            return;
        };
        if !self.is_known_type(module, lhs) || !self.is_known_type(module, rhs) {
            return;
        }
        let lhs_r = self.resolve_type(module, lhs);
        let rhs_r = self.resolve_type(module, rhs);
        if !expr_equal(&module.ast, lhs_r, &module.ast, rhs_r) {
            let lhs_name = expr_to_string(&module.ast, lhs_r);
            let rhs_name = expr_to_string(&module.ast, rhs_r);
            self.errors.push(SemaError::TypeError {
                message: format!("expected {lhs_name}, got {rhs_name}"),
                lhs_t: Some(lhs_name),
                rhs_t: Some(rhs_name),
                span,
            });
        }
    }

    /// The class definition behind a type expression, if any.
    fn class_of_type(&mut self, module: &mut Module, ty: Option<TypeExpr>) -> Option<StmtId> {
        let ty = ty?;
        let resolved = self.resolve_type(module, ty);
        match &module.ast.expr(resolved).kind {
            ExprKind::ClassType { def } => Some(*def),
            _ => None,
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn exec_stmt(&mut self, module: &mut Module, id: StmtId) -> Option<TypeExpr> {
        let span = module.ast.stmt(id).span;
        let kind = module.ast.stmt(id).kind.clone();
        match kind {
            StmtKind::FunctionDef { .. } => self.function_def(module, id),
            StmtKind::ClassDef { .. } => self.class_def(module, id),

            StmtKind::Return { value } => {
                let value_t = match value {
                    Some(value) => self.exec_expr(module, value),
                    None => Some(self.builtin_type(module, "None")),
                };
                if let Some(Some(expected)) = self.fn_returns.last().copied() {
                    self.typecheck(module, Some(expected), value_t, span);
                }
                value_t
            }

            StmtKind::Assign { targets, value } => {
                let value_t = self.exec_expr(module, value);
                for target in targets {
                    self.bind_target(module, target, Some(value), value_t, span);
                }
                None
            }

            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let ann_t = self.resolve_type(module, annotation);
                if let Some(value) = value {
                    let value_t = self.exec_expr(module, value);
                    self.typecheck(module, Some(ann_t), value_t, span);
                }
                self.bind_target(module, target, value, Some(ann_t), span);
                None
            }

            StmtKind::AugAssign { target, op, value } => {
                let target_t = self.target_type(module, target);
                let value_t = self.exec_expr(module, value);
                let lhs = self.type_name(module, target_t);
                let rhs = self.type_name(module, value_t);
                let signature = format!("{op}-{lhs}-{rhs}");
                log::debug!("augassign signature: {signature}");
                if get_native_binary_operation(&signature).is_none()
                    && target_t.is_some()
                    && value_t.is_some()
                    && self.magic_binop_type(module, op, target_t, value_t).is_none()
                {
                    self.errors.push(SemaError::UnsupportedOperand {
                        op: op.to_string(),
                        lhs_t: lhs,
                        rhs_t: Some(rhs),
                        span,
                    });
                }
                None
            }

            StmtKind::Delete { targets } => {
                for target in targets {
                    self.exec_expr(module, target);
                }
                None
            }

            StmtKind::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                let iter_t = self.exec_expr(module, iter);
                let item_t = self.item_type(module, iter_t);
                let saved = self.bindings.len();
                self.bindings.nested = true;
                self.bind_target(module, target, None, item_t, span);
                for stmt in body {
                    self.exec_stmt(module, stmt);
                }
                self.bindings.nested = false;
                self.bindings.entries.truncate(saved);
                for stmt in orelse {
                    self.exec_stmt(module, stmt);
                }
                None
            }

            StmtKind::While { test, body, orelse } => {
                let bool_t = self.builtin_type(module, "bool");
                let test_t = self.exec_expr(module, test);
                self.typecheck(module, Some(bool_t), test_t, span);
                self.scoped_body(module, &body);
                self.scoped_body(module, &orelse);
                None
            }

            StmtKind::If {
                test,
                body,
                tests,
                bodies,
                orelse,
                ..
            } => {
                let bool_t = self.builtin_type(module, "bool");
                let test_t = self.exec_expr(module, test);
                self.typecheck(module, Some(bool_t), test_t, span);
                let first = self.scoped_body(module, &body);
                for (arm_test, arm_body) in tests.iter().zip(&bodies) {
                    let arm_t = self.exec_expr(module, *arm_test);
                    self.typecheck(module, Some(bool_t), arm_t, span);
                    self.scoped_body(module, arm_body);
                }
                self.scoped_body(module, &orelse);
                // Branch join: the first branch's type stands for the whole
                // statement.
                first
            }

            StmtKind::With { items, body, .. } => {
                for item in &items {
                    let ctx_t = self.exec_expr(module, item.context_expr);
                    if let Some(vars) = item.optional_vars {
                        self.bind_target(module, vars, None, ctx_t, span);
                    }
                }
                self.scoped_body(module, &body);
                None
            }

            StmtKind::Raise { exc, cause } => {
                if let Some(exc) = exc {
                    self.exec_expr(module, exc);
                }
                if let Some(cause) = cause {
                    self.exec_expr(module, cause);
                }
                None
            }

            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.scoped_body(module, &body);
                for handler in &handlers {
                    let handler_t = handler.ty.map(|ty| self.resolve_type(module, ty));
                    let saved = self.bindings.len();
                    self.bindings.nested = true;
                    if let Some(name) = &handler.name {
                        let type_id = handler_t
                            .and_then(|t| self.class_of_type(module, Some(t)))
                            .and_then(|def| self.classes.type_id_of(def))
                            .unwrap_or(type_ids::MODULE);
                        self.bindings.add(name.clone(), None, handler_t, type_id);
                    }
                    for stmt in &handler.body {
                        self.exec_stmt(module, *stmt);
                    }
                    self.bindings.nested = false;
                    self.bindings.entries.truncate(saved);
                }
                self.scoped_body(module, &orelse);
                self.scoped_body(module, &finalbody);
                None
            }

            StmtKind::Assert { test, msg } => {
                let bool_t = self.builtin_type(module, "bool");
                let test_t = self.exec_expr(module, test);
                self.typecheck(module, Some(bool_t), test_t, span);
                if let Some(msg) = msg {
                    self.exec_expr(module, msg);
                }
                None
            }

            StmtKind::Import { names } => {
                // Module search is an external collaborator; record the
                // binding so later references resolve.
                let module_t = self.builtin_type(module, "Module");
                for alias in &names {
                    let bound = alias.asname.clone().unwrap_or_else(|| {
                        alias.name.split('.').next().unwrap_or(&alias.name).to_string()
                    });
                    self.bindings
                        .add(bound, None, Some(module_t), type_ids::MODULE);
                }
                None
            }

            StmtKind::ImportFrom { names, .. } => {
                let module_t = self.builtin_type(module, "Module");
                for alias in &names {
                    let bound = alias.asname.clone().unwrap_or_else(|| alias.name.clone());
                    if bound != "*" {
                        self.bindings
                            .add(bound, None, Some(module_t), type_ids::MODULE);
                    }
                }
                None
            }

            StmtKind::Global { .. } | StmtKind::Nonlocal { .. } => None,

            StmtKind::Expr { value } => self.exec_expr(module, value),

            StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Comment { .. }
            | StmtKind::InvalidStatement { .. } => None,

            StmtKind::Match { subject, cases } => {
                let subject_t = self.exec_expr(module, subject);
                for case in &cases {
                    let saved = self.bindings.len();
                    self.bindings.nested = true;
                    self.bind_pattern_names(module, case.pattern, subject_t);
                    if let Some(guard) = case.guard {
                        let bool_t = self.builtin_type(module, "bool");
                        let guard_t = self.exec_expr(module, guard);
                        self.typecheck(module, Some(bool_t), guard_t, span);
                    }
                    for stmt in &case.body {
                        self.exec_stmt(module, *stmt);
                    }
                    self.bindings.nested = false;
                    self.bindings.entries.truncate(saved);
                }
                None
            }

            StmtKind::Inline { body } => {
                let mut last = None;
                for stmt in body {
                    last = self.exec_stmt(module, stmt);
                }
                last
            }
        }
    }

    fn scoped_body(&mut self, module: &mut Module, body: &[StmtId]) -> Option<TypeExpr> {
        let saved = self.bindings.len();
        self.bindings.nested = true;
        let mut last = None;
        for &stmt in body {
            last = self.exec_stmt(module, stmt);
        }
        self.bindings.nested = false;
        self.bindings.entries.truncate(saved);
        last
    }

    /// Type id associated with a resolved type, for the binding entry.
    fn type_id_of(&mut self, module: &mut Module, ty: Option<TypeExpr>) -> usize {
        let Some(ty) = ty else {
            return type_ids::NONE;
        };
        let resolved = self.resolve_type(module, ty);
        match &module.ast.expr(resolved).kind {
            ExprKind::BuiltinType { name } => BUILTIN_TYPES
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id)
                .unwrap_or(type_ids::NONE),
            ExprKind::ClassType { def } => {
                let def = *def;
                self.classes.type_id_of(def).unwrap_or(type_ids::TYPE)
            }
            _ => type_ids::NONE,
        }
    }

    /// Bind an assignment/loop target. Handles plain names, attribute and
    /// subscript stores, and tuple unpacking.
    fn bind_target(
        &mut self,
        module: &mut Module,
        target: ExprId,
        value: Option<ExprId>,
        value_t: Option<TypeExpr>,
        span: Span,
    ) {
        let kind = module.ast.expr(target).kind.clone();
        match kind {
            ExprKind::Name { id, store_id, .. } => {
                let type_id = self.type_id_of(module, value_t);
                // A name that already resolved keeps its entry; re-running
                // the analyzer must not grow the table.
                if let Some(index) = store_id {
                    if let Some(entry) = self.bindings.entries.get_mut(index) {
                        if entry.name == id {
                            entry.ty = value_t;
                            entry.type_id = type_id;
                            return;
                        }
                    }
                }
                let index = self.bindings.add(
                    id,
                    value.map(NodeId::Expr),
                    value_t,
                    type_id,
                );
                if let ExprKind::Name { store_id, .. } = &mut module.ast.expr_mut(target).kind {
                    *store_id = Some(index);
                }
            }
            ExprKind::Attribute { .. } => {
                let attr_t = self.attribute_type(module, target);
                self.typecheck(module, attr_t, value_t, span);
            }
            ExprKind::Subscript { value: base, slice, .. } => {
                self.exec_expr(module, base);
                self.exec_expr(module, slice);
            }
            ExprKind::TupleExpr { elts, .. } | ExprKind::ListExpr { elts, .. } => {
                let resolved_kind = value_t.map(|t| {
                    let resolved = self.resolve_type(module, t);
                    module.ast.expr(resolved).kind.clone()
                });
                let elem_types: Vec<Option<TypeExpr>> = match resolved_kind {
                    Some(ExprKind::TupleType { types }) => {
                        if types.len() != elts.len() {
                            self.errors.push(SemaError::type_error(
                                format!(
                                    "cannot unpack {} values into {} targets",
                                    types.len(),
                                    elts.len()
                                ),
                                span,
                            ));
                        }
                        (0..elts.len()).map(|i| types.get(i).copied()).collect()
                    }
                    Some(ExprKind::ArrayType { item }) => vec![Some(item); elts.len()],
                    _ => vec![None; elts.len()],
                };
                for (elt, elem_t) in elts.into_iter().zip(elem_types) {
                    self.bind_target(module, elt, None, elem_t, span);
                }
            }
            ExprKind::Starred { value: inner, .. } => {
                self.bind_target(module, inner, None, None, span);
            }
            _ => {
                self.errors.push(SemaError::type_error(
                    format!(
                        "cannot assign to {}",
                        module.ast.expr(target).kind.name()
                    ),
                    span,
                ));
            }
        }
    }

    /// The declared type of a store target (for augmented assignment).
    fn target_type(&mut self, module: &mut Module, target: ExprId) -> Option<TypeExpr> {
        match &module.ast.expr(target).kind {
            ExprKind::Name { id, .. } => {
                let id = id.clone();
                match self.bindings.find(&id) {
                    Some(entry) => entry.ty,
                    None => {
                        self.errors.push(SemaError::NameError {
                            name: id,
                            span: module.ast.expr(target).span,
                        });
                        None
                    }
                }
            }
            ExprKind::Attribute { .. } => self.attribute_type(module, target),
            _ => None,
        }
    }

    /// Bind every capture name a pattern introduces.
    fn bind_pattern_names(
        &mut self,
        module: &mut Module,
        pattern: kiwi_common::node::PatId,
        subject_t: Option<TypeExpr>,
    ) {
        let kind = module.ast.pat(pattern).kind.clone();
        match kind {
            PatKind::MatchAs { pattern: inner, name } => {
                if let Some(name) = name {
                    let type_id = self.type_id_of(module, subject_t);
                    self.bindings.add(name, None, subject_t, type_id);
                }
                if let Some(inner) = inner {
                    self.bind_pattern_names(module, inner, subject_t);
                }
            }
            PatKind::MatchStar { name } => {
                if let Some(name) = name {
                    self.bindings.add(name, None, None, type_ids::NONE);
                }
            }
            PatKind::MatchSequence { patterns } | PatKind::MatchOr { patterns } => {
                for pat in patterns {
                    self.bind_pattern_names(module, pat, None);
                }
            }
            PatKind::MatchMapping { patterns, rest, .. } => {
                for pat in patterns {
                    self.bind_pattern_names(module, pat, None);
                }
                if let Some(rest) = rest {
                    self.bindings.add(rest, None, None, type_ids::NONE);
                }
            }
            PatKind::MatchClass {
                patterns,
                kwd_patterns,
                ..
            } => {
                for pat in patterns.into_iter().chain(kwd_patterns) {
                    self.bind_pattern_names(module, pat, None);
                }
            }
            PatKind::MatchValue { .. } | PatKind::MatchSingleton { .. } => {}
        }
    }

    /// Item type of an iterable, when deducible.
    fn item_type(&mut self, module: &mut Module, iter_t: Option<TypeExpr>) -> Option<TypeExpr> {
        let iter_t = iter_t?;
        let resolved = self.resolve_type(module, iter_t);
        match &module.ast.expr(resolved).kind {
            ExprKind::ArrayType { item } | ExprKind::SetType { item } => Some(*item),
            ExprKind::DictType { key, .. } => Some(*key),
            _ => None,
        }
    }

    // ── Functions and classes ──────────────────────────────────────────

    fn function_def(&mut self, module: &mut Module, id: StmtId) -> Option<TypeExpr> {
        let (name, args, body, returns, cached, decorators) = match &module.ast.stmt(id).kind {
            StmtKind::FunctionDef {
                name,
                args,
                body,
                returns,
                ty,
                decorators,
                ..
            } => (
                name.clone(),
                args.clone(),
                body.clone(),
                *returns,
                *ty,
                decorators.clone(),
            ),
            _ => return None,
        };

        // Idempotence: an already-typed function keeps its arrow and its
        // binding.
        if let Some(arrow) = cached {
            if self.bindings.find(&name).is_none() {
                self.bindings
                    .add(name, Some(NodeId::Stmt(id)), Some(arrow), type_ids::MODULE);
            }
            return Some(arrow);
        }

        let arrow = self.build_arrow(module, &args, returns);

        // Bind before the body so recursion resolves.
        self.bindings
            .add(name, Some(NodeId::Stmt(id)), Some(arrow), type_ids::MODULE);

        let saved = self.bindings.len();
        self.bindings.nested = true;
        for arg in args.positional() {
            let ann = arg.annotation.map(|a| self.resolve_type(module, a));
            let type_id = self.type_id_of(module, ann);
            self.bindings.add(arg.arg.clone(), None, ann, type_id);
        }
        if let Some(vararg) = &args.vararg {
            self.bindings.add(vararg.arg.clone(), None, None, type_ids::NONE);
        }
        for arg in &args.kwonlyargs {
            let ann = arg.annotation.map(|a| self.resolve_type(module, a));
            let type_id = self.type_id_of(module, ann);
            self.bindings.add(arg.arg.clone(), None, ann, type_id);
        }
        if let Some(kwarg) = &args.kwarg {
            self.bindings.add(kwarg.arg.clone(), None, None, type_ids::NONE);
        }

        let declared_return = returns.map(|r| self.resolve_type(module, r));
        self.fn_returns.push(declared_return);
        for stmt in body {
            self.exec_stmt(module, stmt);
        }
        self.fn_returns.pop();
        self.bindings.nested = false;
        self.bindings.entries.truncate(saved);

        for deco in &decorators {
            self.exec_expr(module, deco.expr);
        }

        if let StmtKind::FunctionDef { ty, .. } = &mut module.ast.stmt_mut(id).kind {
            *ty = Some(arrow);
        }
        Some(arrow)
    }

    /// Build the `Arrow` for a function signature.
    fn build_arrow(
        &mut self,
        module: &mut Module,
        args: &Arguments,
        returns: Option<ExprId>,
    ) -> TypeExpr {
        let mut arg_types = Vec::new();
        let mut names = Vec::new();
        let mut defaults = Vec::new();
        for (i, arg) in args.positional().enumerate() {
            let ty = match arg.annotation {
                Some(ann) => self.resolve_type(module, ann),
                None => module.ast.add_expr(ExprKind::Placeholder, Span::point(0)),
            };
            arg_types.push(ty);
            names.push(arg.arg.clone());
            defaults.push(args.positional_default(i));
        }
        let returns_t = match returns {
            Some(r) => Some(self.resolve_type(module, r)),
            None => Some(self.builtin_type(module, "None")),
        };
        module.ast.add_expr(
            ExprKind::Arrow {
                args: arg_types,
                returns: returns_t,
                names,
                defaults,
            },
            Span::point(0),
        )
    }

    fn class_def(&mut self, module: &mut Module, id: StmtId) -> Option<TypeExpr> {
        let name = match &module.ast.stmt(id).kind {
            StmtKind::ClassDef { name, .. } => name.clone(),
            _ => return None,
        };

        let type_t = self.builtin_type(module, "Type");
        let type_id = self.classes.register(id);
        if self.bindings.find(&name).map(|e| e.value) != Some(Some(NodeId::Stmt(id))) {
            self.bindings
                .add(name.clone(), Some(NodeId::Stmt(id)), Some(type_t), type_id);
        }

        self.namespaces.push(name);
        let cls_namespace = self.namespaces.join(".");
        if let StmtKind::ClassDef {
            cls_namespace: slot,
            attributes,
            ..
        } = &mut module.ast.stmt_mut(id).kind
        {
            *slot = cls_namespace;
            attributes.clear();
        }

        let (bases, keywords, body, decorators) = match &module.ast.stmt(id).kind {
            StmtKind::ClassDef {
                bases,
                keywords,
                body,
                decorators,
                ..
            } => (
                bases.clone(),
                keywords.clone(),
                body.clone(),
                decorators.clone(),
            ),
            _ => unreachable!("checked above"),
        };

        for base in bases {
            self.exec_expr(module, base);
        }
        for kw in &keywords {
            self.exec_expr(module, kw.value);
        }

        let ctor = self.record_attributes(module, id, &body);
        if let Some(ctor) = ctor {
            self.record_ctor_attributes(module, id, ctor);
        }

        // Methods are analyzed in a class scope; the receiver parameter is
        // retyped to the class afterwards.
        let class_t = self.class_type(module, id);
        let saved = self.bindings.len();
        self.bindings.nested = true;
        for &stmt in &body {
            match module.ast.stmt(stmt).kind.clone() {
                StmtKind::FunctionDef { native, .. } => {
                    let arrow = self.function_def(module, stmt);
                    if native.is_none() {
                        if let Some(arrow) = arrow {
                            if let ExprKind::Arrow { args, .. } =
                                &mut module.ast.expr_mut(arrow).kind
                            {
                                if !args.is_empty() {
                                    args[0] = class_t;
                                }
                            }
                        }
                    }
                }
                StmtKind::ClassDef { .. } => {
                    self.exec_stmt(module, stmt);
                }
                _ => {}
            }
        }
        self.bindings.nested = false;
        self.bindings.entries.truncate(saved);

        // Methods now carry arrows; refresh the recorded attribute types.
        let attrs: Vec<(usize, Option<ExprId>)> = match &module.ast.stmt(id).kind {
            StmtKind::ClassDef { attributes, .. } => attributes
                .iter()
                .enumerate()
                .filter_map(|(i, attr)| match &module.ast.stmt(attr.stmt).kind {
                    StmtKind::FunctionDef { ty, .. } => Some((i, *ty)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        if let StmtKind::ClassDef { attributes, .. } = &mut module.ast.stmt_mut(id).kind {
            for (i, ty) in attrs {
                attributes[i].ty = ty;
            }
        }

        for deco in &decorators {
            self.exec_expr(module, deco.expr);
        }

        self.namespaces.pop();
        Some(type_t)
    }

    /// First pass over a class body: record assignments, annotated
    /// assignments, methods, and nested classes as attributes. Returns the
    /// `__init__` method if present.
    fn record_attributes(
        &mut self,
        module: &mut Module,
        cls: StmtId,
        body: &[StmtId],
    ) -> Option<StmtId> {
        let mut ctor = None;
        let mut recorded: Vec<ClassAttr> = Vec::new();

        for &stmt in body {
            match module.ast.stmt(stmt).kind.clone() {
                StmtKind::FunctionDef { name, ty, .. } => {
                    if name == "__init__" {
                        ctor = Some(stmt);
                    }
                    recorded.push(ClassAttr {
                        name,
                        stmt,
                        ty,
                    });
                }
                StmtKind::ClassDef { name, .. } => {
                    recorded.push(ClassAttr {
                        name,
                        stmt,
                        ty: None,
                    });
                }
                StmtKind::Assign { targets, value } => {
                    let Some(&target) = targets.first() else {
                        continue;
                    };
                    let ExprKind::Name { id: name, .. } = module.ast.expr(target).kind.clone()
                    else {
                        continue;
                    };
                    let value_t = self.exec_expr(module, value);
                    recorded.push(ClassAttr {
                        name,
                        stmt,
                        ty: value_t,
                    });
                }
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value,
                } => {
                    let ExprKind::Name { id: name, .. } = module.ast.expr(target).kind.clone()
                    else {
                        continue;
                    };
                    let ann_t = self.resolve_type(module, annotation);
                    if let Some(value) = value {
                        let value_t = self.exec_expr(module, value);
                        let span = module.ast.stmt(stmt).span;
                        self.typecheck(module, Some(ann_t), value_t, span);
                    }
                    recorded.push(ClassAttr {
                        name,
                        stmt,
                        ty: Some(ann_t),
                    });
                }
                _ => {}
            }
        }

        if let StmtKind::ClassDef { attributes, .. } = &mut module.ast.stmt_mut(cls).kind {
            *attributes = recorded;
        }
        ctor
    }

    /// Second pass: `self.x = ...` statements in `__init__` add instance
    /// attributes.
    fn record_ctor_attributes(&mut self, module: &mut Module, cls: StmtId, ctor: StmtId) {
        let (self_name, body) = match &module.ast.stmt(ctor).kind {
            StmtKind::FunctionDef { args, body, .. } => {
                let Some(first) = args.positional().next() else {
                    log::warn!("__init__ without a receiver parameter");
                    return;
                };
                (first.arg.clone(), body.clone())
            }
            _ => return,
        };

        let mut found: Vec<ClassAttr> = Vec::new();
        for &stmt in &body {
            let (target, value, annotation) = match module.ast.stmt(stmt).kind.clone() {
                StmtKind::Assign { targets, value } => {
                    (targets.first().copied(), Some(value), None)
                }
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value,
                } => (Some(target), value, Some(annotation)),
                _ => continue,
            };
            let Some(target) = target else { continue };
            let ExprKind::Attribute { value: base, attr, .. } =
                module.ast.expr(target).kind.clone()
            else {
                continue;
            };
            let ExprKind::Name { id, .. } = &module.ast.expr(base).kind else {
                continue;
            };
            if *id != self_name {
                continue;
            }
            let ty = match annotation {
                Some(ann) => Some(self.resolve_type(module, ann)),
                None => value.and_then(|v| self.deduce_constant_type(module, v)),
            };
            found.push(ClassAttr {
                name: attr,
                stmt,
                ty,
            });
        }

        if let StmtKind::ClassDef { attributes, .. } = &mut module.ast.stmt_mut(cls).kind {
            for attr in found {
                if !attributes.iter().any(|a| a.name == attr.name) {
                    attributes.push(attr);
                }
            }
        }
    }

    /// Deduce a type for simple initializer expressions without running
    /// full analysis in the wrong scope.
    fn deduce_constant_type(&mut self, module: &mut Module, expr: ExprId) -> Option<TypeExpr> {
        match &module.ast.expr(expr).kind {
            ExprKind::Constant { value } => {
                let name = match value {
                    Value::None => "None",
                    other => other.type_name(),
                };
                Some(self.builtin_type(module, name))
            }
            _ => None,
        }
    }

    /// The constructor arrow for a class, built from `__new__`/`__init__`
    /// and cached on the node.
    fn build_constructor_type(&mut self, module: &mut Module, cls: StmtId) -> TypeExpr {
        if let StmtKind::ClassDef { ctor_t: Some(t), .. } = &module.ast.stmt(cls).kind {
            return *t;
        }

        let class_t = self.class_type(module, cls);
        let init = getattr(&module.ast, cls, "__init__");
        let newfn = getattr(&module.ast, cls, "__new__");

        let mut arg_types = Vec::new();
        let mut names = Vec::new();
        let mut defaults = Vec::new();
        let mut push_signature = |sema: &mut Self, module: &mut Module, def: StmtId| {
            let StmtKind::FunctionDef { args, .. } = module.ast.stmt(def).kind.clone() else {
                return;
            };
            // The receiver slot is implicit at the call site.
            for (i, arg) in args.positional().enumerate().skip(1) {
                let ty = match arg.annotation {
                    Some(ann) => sema.resolve_type(module, ann),
                    None => module.ast.add_expr(ExprKind::Placeholder, Span::point(0)),
                };
                if i - 1 < arg_types.len() {
                    // Already declared by __new__: the two must agree.
                    let existing = arg_types[i - 1];
                    let span = module.ast.stmt(def).span;
                    sema.typecheck(module, Some(existing), Some(ty), span);
                } else {
                    arg_types.push(ty);
                    names.push(arg.arg.clone());
                    defaults.push(args.positional_default(i));
                }
            }
        };

        if let Some(newfn) = newfn {
            push_signature(self, module, newfn);
        }
        if let Some(init) = init {
            push_signature(self, module, init);
        }

        let arrow = module.ast.add_expr(
            ExprKind::Arrow {
                args: arg_types,
                returns: Some(class_t),
                names,
                defaults,
            },
            Span::point(0),
        );
        if let StmtKind::ClassDef { ctor_t, .. } = &mut module.ast.stmt_mut(cls).kind {
            *ctor_t = Some(arrow);
        }
        arrow
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub fn exec_expr(&mut self, module: &mut Module, id: ExprId) -> Option<TypeExpr> {
        let span = module.ast.expr(id).span;
        let kind = module.ast.expr(id).kind.clone();
        match kind {
            ExprKind::Name { id: name, ctx, .. } => match ctx {
                ExprContext::Load => {
                    let Some(entry) = self.bindings.find(&name) else {
                        self.errors.push(SemaError::NameError { name, span });
                        return None;
                    };
                    let store_id = entry.store_id;
                    let ty = entry.ty;
                    let load_id = self.bindings.len();
                    if let ExprKind::Name {
                        store_id: store_slot,
                        load_id: load_slot,
                        ..
                    } = &mut module.ast.expr_mut(id).kind
                    {
                        *store_slot = Some(store_id);
                        *load_slot = Some(load_id);
                    }
                    ty
                }
                ExprContext::Store | ExprContext::Del => None,
            },

            ExprKind::Constant { value } => {
                let name = match &value {
                    Value::None => "None",
                    other => other.type_name(),
                };
                Some(self.builtin_type(module, name))
            }

            ExprKind::BinOp { left, op, right, .. } => self.binop(module, id, left, op, right, span),

            ExprKind::BoolOp { op, values, .. } => self.boolop(module, op, &values, span),

            ExprKind::UnaryOp { op, operand, .. } => {
                let operand_t = self.exec_expr(module, operand);
                let t_name = self.type_name(module, operand_t);
                let signature = format!("{op}-{t_name}");
                log::debug!("unary signature: {signature}");
                match get_native_unary_operation(&signature) {
                    Some(handler) => {
                        if let ExprKind::UnaryOp { native_op, .. } =
                            &mut module.ast.expr_mut(id).kind
                        {
                            *native_op = Some(handler);
                        }
                    }
                    None => {
                        if operand_t.is_some() {
                            self.errors.push(SemaError::UnsupportedOperand {
                                op: op.to_string(),
                                lhs_t: t_name,
                                rhs_t: None,
                                span,
                            });
                        }
                    }
                }
                operand_t
            }

            ExprKind::Compare {
                left,
                ops,
                comparators,
                ..
            } => self.compare(module, id, left, &ops, &comparators, span),

            ExprKind::Call { .. } => self.call(module, id, span),

            ExprKind::Attribute { .. } => self.attribute_type(module, id),

            ExprKind::Subscript { value, slice, .. } => {
                let value_t = self.exec_expr(module, value);
                self.exec_expr(module, slice);
                let value_t = value_t?;
                let resolved = self.resolve_type(module, value_t);
                match &module.ast.expr(resolved).kind {
                    ExprKind::ArrayType { item } => Some(*item),
                    ExprKind::DictType { value, .. } => Some(*value),
                    ExprKind::TupleType { .. } | ExprKind::BuiltinType { .. } => None,
                    _ => None,
                }
            }

            ExprKind::Starred { value, .. } => self.exec_expr(module, value),

            ExprKind::IfExp { test, body, orelse } => {
                let bool_t = self.builtin_type(module, "bool");
                let test_t = self.exec_expr(module, test);
                self.typecheck(module, Some(bool_t), test_t, span);
                let body_t = self.exec_expr(module, body);
                let orelse_t = self.exec_expr(module, orelse);
                self.typecheck(module, body_t, orelse_t, span);
                body_t
            }

            ExprKind::Lambda { args, body } => {
                let saved = self.bindings.len();
                self.bindings.nested = true;
                for arg in args.positional() {
                    self.bindings.add(arg.arg.clone(), None, None, type_ids::NONE);
                }
                let body_t = self.exec_expr(module, body);
                self.bindings.nested = false;
                self.bindings.entries.truncate(saved);

                let arg_types: Vec<ExprId> = args
                    .positional()
                    .map(|_| module.ast.add_expr(ExprKind::Placeholder, Span::point(0)))
                    .collect();
                let names = args.positional().map(|a| a.arg.clone()).collect();
                let defaults = vec![None; arg_types.len()];
                Some(module.ast.add_expr(
                    ExprKind::Arrow {
                        args: arg_types,
                        returns: body_t,
                        names,
                        defaults,
                    },
                    Span::point(0),
                ))
            }

            ExprKind::NamedExpr { target, value } => {
                let value_t = self.exec_expr(module, value);
                self.bind_target(module, target, Some(value), value_t, span);
                value_t
            }

            ExprKind::Await { value } => self.exec_expr(module, value),
            ExprKind::Yield { value } => {
                match value {
                    Some(value) => self.exec_expr(module, value),
                    None => Some(self.builtin_type(module, "None")),
                }
            }
            ExprKind::YieldFrom { value } => self.exec_expr(module, value),

            ExprKind::ListExpr { elts, .. } => {
                let item = self.element_type(module, &elts);
                Some(module.ast.add_expr(ExprKind::ArrayType { item }, Span::point(0)))
            }
            ExprKind::SetExpr { elts } => {
                let item = self.element_type(module, &elts);
                Some(module.ast.add_expr(ExprKind::SetType { item }, Span::point(0)))
            }
            ExprKind::TupleExpr { elts, .. } => {
                let mut types = Vec::new();
                for elt in &elts {
                    let t = self.exec_expr(module, *elt);
                    types.push(t.unwrap_or_else(|| {
                        module.ast.add_expr(ExprKind::Placeholder, Span::point(0))
                    }));
                }
                Some(module.ast.add_expr(ExprKind::TupleType { types }, Span::point(0)))
            }
            ExprKind::DictExpr { keys, values } => {
                let key = self.element_type(module, &keys);
                let value = self.element_type(module, &values);
                Some(module.ast.add_expr(ExprKind::DictType { key, value }, Span::point(0)))
            }

            ExprKind::ListComp { elt, generators }
            | ExprKind::SetComp { elt, generators }
            | ExprKind::GeneratorExp { elt, generators } => {
                let saved = self.bindings.len();
                self.bindings.nested = true;
                for gen in &generators {
                    let iter_t = self.exec_expr(module, gen.iter);
                    let item_t = self.item_type(module, iter_t);
                    self.bind_target(module, gen.target, None, item_t, span);
                    for &cond in &gen.ifs {
                        self.exec_expr(module, cond);
                    }
                }
                let elt_t = self.exec_expr(module, elt);
                self.bindings.nested = false;
                self.bindings.entries.truncate(saved);

                let item = elt_t.unwrap_or_else(|| {
                    module.ast.add_expr(ExprKind::Placeholder, Span::point(0))
                });
                let kind = match &module.ast.expr(id).kind {
                    ExprKind::SetComp { .. } => ExprKind::SetType { item },
                    _ => ExprKind::ArrayType { item },
                };
                Some(module.ast.add_expr(kind, Span::point(0)))
            }

            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                let saved = self.bindings.len();
                self.bindings.nested = true;
                for gen in &generators {
                    let iter_t = self.exec_expr(module, gen.iter);
                    let item_t = self.item_type(module, iter_t);
                    self.bind_target(module, gen.target, None, item_t, span);
                    for &cond in &gen.ifs {
                        self.exec_expr(module, cond);
                    }
                }
                let key_t = self.exec_expr(module, key);
                let value_t = self.exec_expr(module, value);
                self.bindings.nested = false;
                self.bindings.entries.truncate(saved);

                let key = key_t.unwrap_or_else(|| {
                    module.ast.add_expr(ExprKind::Placeholder, Span::point(0))
                });
                let value = value_t.unwrap_or_else(|| {
                    module.ast.add_expr(ExprKind::Placeholder, Span::point(0))
                });
                Some(module.ast.add_expr(ExprKind::DictType { key, value }, Span::point(0)))
            }

            ExprKind::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.exec_expr(module, part);
                }
                None
            }

            ExprKind::JoinedStr { values } => {
                for value in values {
                    self.exec_expr(module, value);
                }
                Some(self.builtin_type(module, "str"))
            }
            ExprKind::FormattedValue { value, format_spec, .. } => {
                self.exec_expr(module, value);
                if let Some(spec) = format_spec {
                    self.exec_expr(module, spec);
                }
                Some(self.builtin_type(module, "str"))
            }

            // Type expressions evaluate to the type of types.
            ExprKind::Arrow { .. }
            | ExprKind::DictType { .. }
            | ExprKind::ArrayType { .. }
            | ExprKind::SetType { .. }
            | ExprKind::TupleType { .. }
            | ExprKind::BuiltinType { .. }
            | ExprKind::ClassType { .. } => Some(self.builtin_type(module, "Type")),

            ExprKind::Placeholder => None,
            ExprKind::Exported { .. } => None,
        }
    }

    fn element_type(&mut self, module: &mut Module, elts: &[ExprId]) -> ExprId {
        let mut first = None;
        for &elt in elts {
            let t = self.exec_expr(module, elt);
            if first.is_none() {
                first = t;
            }
        }
        first.unwrap_or_else(|| module.ast.add_expr(ExprKind::Placeholder, Span::point(0)))
    }

    // ── Operator resolution ────────────────────────────────────────────

    fn binop(
        &mut self,
        module: &mut Module,
        id: ExprId,
        left: ExprId,
        op: BinaryOperator,
        right: ExprId,
        span: Span,
    ) -> Option<TypeExpr> {
        let lhs_t = self.exec_expr(module, left);
        let rhs_t = self.exec_expr(module, right);

        let lhs_name = self.type_name(module, lhs_t);
        let rhs_name = self.type_name(module, rhs_t);
        let signature = format!("{op}-{lhs_name}-{rhs_name}");
        log::debug!("binop signature: {signature}");

        if let Some(handler) = get_native_binary_operation(&signature) {
            if let ExprKind::BinOp { native_op, .. } = &mut module.ast.expr_mut(id).kind {
                *native_op = Some(handler);
            }
            return lhs_t;
        }

        // Magic-method fallback: lhs `__op__`, then rhs `__rop__`.
        if let Some(ret) = self.magic_binop_type(module, op, lhs_t, rhs_t) {
            return Some(ret);
        }

        if lhs_t.is_some() && rhs_t.is_some() {
            self.errors.push(SemaError::UnsupportedOperand {
                op: op.to_string(),
                lhs_t: lhs_name,
                rhs_t: Some(rhs_name),
                span,
            });
        }
        lhs_t
    }

    /// Resolve a binary operator through class magic methods. Returns the
    /// method's return type on success.
    fn magic_binop_type(
        &mut self,
        module: &mut Module,
        op: BinaryOperator,
        lhs_t: Option<TypeExpr>,
        rhs_t: Option<TypeExpr>,
    ) -> Option<TypeExpr> {
        let lookup = |sema: &mut Self, module: &mut Module, ty: Option<TypeExpr>, magic: &str| {
            let cls = sema.class_of_type(module, ty)?;
            let method = getattr(&module.ast, cls, magic)?;
            match &module.ast.stmt(method).kind {
                StmtKind::FunctionDef { ty: Some(arrow), .. } => {
                    match &module.ast.expr(*arrow).kind {
                        ExprKind::Arrow { returns, .. } => *returns,
                        _ => None,
                    }
                }
                StmtKind::FunctionDef { .. } => ty,
                _ => None,
            }
        };

        lookup(self, module, lhs_t, op.magic_name(false))
            .or_else(|| lookup(self, module, rhs_t, op.magic_name(true)))
    }

    fn boolop(
        &mut self,
        module: &mut Module,
        op: BoolOperator,
        values: &[ExprId],
        span: Span,
    ) -> Option<TypeExpr> {
        let bool_t = self.builtin_type(module, "bool");
        let mut lhs_t = self.exec_expr(module, values[0]);

        for &value in &values[1..] {
            let rhs_t = self.exec_expr(module, value);
            let lhs_name = self.type_name(module, lhs_t);
            let rhs_name = self.type_name(module, rhs_t);
            let signature = format!("{op}-{lhs_name}-{rhs_name}");
            log::debug!("boolop signature: {signature}");

            if get_native_bool_operation(&signature).is_none() {
                let magic = self
                    .magic_bool_type(module, op, lhs_t, false)
                    .or_else(|| self.magic_bool_type(module, op, rhs_t, true));
                if magic.is_none() && lhs_t.is_some() && rhs_t.is_some() {
                    self.errors.push(SemaError::UnsupportedOperand {
                        op: op.to_string(),
                        lhs_t: lhs_name,
                        rhs_t: Some(rhs_name),
                        span,
                    });
                }
            }
            lhs_t = rhs_t;
        }

        Some(bool_t)
    }

    fn magic_bool_type(
        &mut self,
        module: &mut Module,
        op: BoolOperator,
        ty: Option<TypeExpr>,
        reflected: bool,
    ) -> Option<TypeExpr> {
        let cls = self.class_of_type(module, ty)?;
        let method = getattr(&module.ast, cls, op.magic_name(reflected))?;
        match &module.ast.stmt(method).kind {
            StmtKind::FunctionDef { ty: Some(arrow), .. } => {
                match &module.ast.expr(*arrow).kind {
                    ExprKind::Arrow { returns, .. } => *returns,
                    _ => None,
                }
            }
            _ => ty,
        }
    }

    fn compare(
        &mut self,
        module: &mut Module,
        id: ExprId,
        left: ExprId,
        ops: &[CmpOperator],
        comparators: &[ExprId],
        span: Span,
    ) -> Option<TypeExpr> {
        let mut prev_t = self.exec_expr(module, left);
        let mut native_ops = Vec::with_capacity(ops.len());

        for (op, &comparator) in ops.iter().zip(comparators) {
            let cmp_t = self.exec_expr(module, comparator);
            let prev_name = self.type_name(module, prev_t);
            let cmp_name = self.type_name(module, cmp_t);
            let signature = format!("{op}-{prev_name}-{cmp_name}");
            log::debug!("compare signature: {signature}");

            let handler = get_native_cmp_operation(&signature);
            if handler.is_none() {
                let magic = self.magic_cmp_type(module, *op, prev_t);
                if magic.is_none() && prev_t.is_some() && cmp_t.is_some() {
                    self.errors.push(SemaError::UnsupportedOperand {
                        op: op.to_string(),
                        lhs_t: prev_name,
                        rhs_t: Some(cmp_name),
                        span,
                    });
                }
            }
            native_ops.push(handler);
            prev_t = cmp_t;
        }

        if let ExprKind::Compare {
            native_ops: slot, ..
        } = &mut module.ast.expr_mut(id).kind
        {
            *slot = native_ops;
        }
        Some(self.builtin_type(module, "bool"))
    }

    fn magic_cmp_type(
        &mut self,
        module: &mut Module,
        op: CmpOperator,
        ty: Option<TypeExpr>,
    ) -> Option<TypeExpr> {
        let magic = match op {
            CmpOperator::Eq => "__eq__",
            CmpOperator::NotEq => "__ne__",
            CmpOperator::Lt => "__lt__",
            CmpOperator::LtE => "__le__",
            CmpOperator::Gt => "__gt__",
            CmpOperator::GtE => "__ge__",
            CmpOperator::In | CmpOperator::NotIn => "__contains__",
            CmpOperator::Is | CmpOperator::IsNot => return None,
        };
        let cls = self.class_of_type(module, ty)?;
        getattr(&module.ast, cls, magic)?;
        Some(self.builtin_type(module, "bool"))
    }

    // ── Calls ──────────────────────────────────────────────────────────

    fn call(&mut self, module: &mut Module, id: ExprId, span: Span) -> Option<TypeExpr> {
        let (func, args, keywords) = match &module.ast.expr(id).kind {
            ExprKind::Call {
                func,
                args,
                keywords,
                ..
            } => (*func, args.clone(), keywords.clone()),
            _ => return None,
        };

        let func_t = self.exec_expr(module, func);

        // Argument reordering needs the callee's definition.
        let mut callee_def = None;
        let mut callee_class = None;
        if let ExprKind::Name { id: name, .. } = &module.ast.expr(func).kind {
            if let Some(entry) = self.bindings.find(name) {
                match entry.value {
                    Some(NodeId::Stmt(def)) => match &module.ast.stmt(def).kind {
                        StmtKind::FunctionDef { .. } => callee_def = Some(def),
                        StmtKind::ClassDef { .. } => callee_class = Some(def),
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
        if let ExprKind::Attribute { resolved: Some(def), .. } = &module.ast.expr(func).kind {
            if matches!(module.ast.stmt(*def).kind, StmtKind::FunctionDef { .. }) {
                callee_def = Some(*def);
            }
        }

        let mut is_call_valid = true;
        if let Some(def) = callee_def {
            is_call_valid = self.reorder_arguments(module, id, def, span);
        }

        // The callee's arrow.
        let is_method = matches!(module.ast.expr(func).kind, ExprKind::Attribute { .. });
        let arrow = if let Some(cls) = callee_class {
            Some(self.build_constructor_type(module, cls))
        } else if let Some(def) = callee_def {
            match &module.ast.stmt(def).kind {
                StmtKind::FunctionDef { ty, .. } => *ty,
                _ => None,
            }
        } else if let Some(t) = func_t {
            let resolved = self.resolve_type(module, t);
            match &module.ast.expr(resolved).kind {
                ExprKind::Arrow { .. } => Some(resolved),
                _ => None,
            }
        } else {
            None
        };

        if arrow.is_none() && func_t.is_some() && callee_class.is_none() {
            let func_name = expr_to_string(&module.ast, func);
            let t_name = self.type_name(module, func_t);
            self.errors.push(SemaError::type_error(
                format!("'{func_name}' of type {t_name} is not callable"),
                span,
            ));
            return None;
        }

        // Effective argument types (reordering may have rewritten args).
        let args = match &module.ast.expr(id).kind {
            ExprKind::Call { args, .. } => args.clone(),
            _ => args,
        };
        let mut got = Vec::new();
        for &arg in &args {
            got.push(self.exec_expr(module, arg));
        }
        for kw in &keywords {
            self.exec_expr(module, kw.value);
        }

        let arrow = arrow?;
        let (arrow_args, arrow_returns) = match &module.ast.expr(arrow).kind {
            ExprKind::Arrow { args, returns, .. } => (args.clone(), *returns),
            _ => return None,
        };

        // A method call through an attribute has its receiver bound
        // already; the declared first parameter is the receiver.
        let offset = if is_method && callee_class.is_none() && !arrow_args.is_empty() {
            1
        } else {
            0
        };

        if is_call_valid {
            for (i, &got_t) in got.iter().enumerate() {
                let expected = arrow_args.get(i + offset).copied();
                self.typecheck(module, expected, got_t, span);
            }
        }

        arrow_returns
    }

    /// Rewrite call arguments into positional order against the callee's
    /// parameter list. Native callees accept positional arguments only.
    fn reorder_arguments(
        &mut self,
        module: &mut Module,
        call: ExprId,
        def: StmtId,
        span: Span,
    ) -> bool {
        let (def_args, native, def_name) = match &module.ast.stmt(def).kind {
            StmtKind::FunctionDef { args, native, name, .. } => {
                (args.clone(), native.is_some(), name.clone())
            }
            _ => return false,
        };
        let (call_args, call_keywords) = match &module.ast.expr(call).kind {
            ExprKind::Call { args, keywords, .. } => (args.clone(), keywords.clone()),
            _ => return false,
        };

        if native {
            if !call_keywords.is_empty() {
                self.errors.push(SemaError::type_error(
                    format!("native function '{def_name}' only supports positional arguments"),
                    span,
                ));
                return false;
            }
            return true;
        }

        let mut finals: Vec<ExprId> = Vec::new();
        let mut used_keywords = vec![false; call_keywords.len()];
        let mut ok = true;

        let positional: Vec<_> = def_args.positional().cloned().collect();
        let posonly_count = def_args.posonlyargs.len();
        for (i, param) in positional.iter().enumerate() {
            let mut value = call_args.get(i).copied();

            if value.is_none() && i >= posonly_count {
                for (k, kw) in call_keywords.iter().enumerate() {
                    if kw.arg == param.arg {
                        value = Some(kw.value);
                        used_keywords[k] = true;
                        break;
                    }
                }
            }
            if value.is_none() {
                value = def_args.positional_default(i);
            }

            match value {
                Some(value) => finals.push(value),
                None => {
                    ok = false;
                    self.errors.push(SemaError::type_error(
                        format!(
                            "{def_name}() missing 1 required positional argument: '{}'",
                            param.arg
                        ),
                        span,
                    ));
                }
            }
        }

        // Extra positional arguments spill into the variadic slot.
        let mut varargs = Vec::new();
        if call_args.len() > positional.len() {
            if def_args.vararg.is_some() {
                varargs.extend_from_slice(&call_args[positional.len()..]);
            } else {
                ok = false;
                self.errors.push(SemaError::type_error(
                    format!(
                        "{def_name}() takes {} positional arguments but {} were given",
                        positional.len(),
                        call_args.len()
                    ),
                    span,
                ));
            }
        }

        // Keyword-only parameters.
        for (param, default) in def_args.kwonlyargs.iter().zip(&def_args.kw_defaults) {
            let mut value = None;
            for (k, kw) in call_keywords.iter().enumerate() {
                if kw.arg == param.arg {
                    value = Some(kw.value);
                    used_keywords[k] = true;
                    break;
                }
            }
            match value.or(*default) {
                Some(value) => finals.push(value),
                None => {
                    ok = false;
                    self.errors.push(SemaError::type_error(
                        format!(
                            "{def_name}() missing 1 required keyword-only argument: '{}'",
                            param.arg
                        ),
                        span,
                    ));
                }
            }
        }

        // Leftover keywords either feed **kwargs or are an error.
        let mut leftovers = Vec::new();
        for (k, kw) in call_keywords.iter().enumerate() {
            if used_keywords[k] {
                continue;
            }
            if def_args.kwarg.is_some() {
                leftovers.push(kw.clone());
            } else {
                ok = false;
                self.errors.push(SemaError::type_error(
                    format!(
                        "{def_name}() got an unexpected keyword argument '{}'",
                        kw.arg
                    ),
                    span,
                ));
            }
        }

        if let ExprKind::Call {
            args,
            varargs: vslot,
            keywords,
            ..
        } = &mut module.ast.expr_mut(call).kind
        {
            *args = finals;
            *vslot = varargs;
            *keywords = leftovers;
        }
        ok
    }

    // ── Attributes ─────────────────────────────────────────────────────

    /// Type of `value.attr`, recording the resolution on the node.
    fn attribute_type(&mut self, module: &mut Module, id: ExprId) -> Option<TypeExpr> {
        let (value, attr) = match &module.ast.expr(id).kind {
            ExprKind::Attribute { value, attr, .. } => (*value, attr.clone()),
            _ => return None,
        };
        let span = module.ast.expr(id).span;
        let value_t = self.exec_expr(module, value);

        let Some(cls) = self.class_of_type(module, value_t) else {
            // Unknown receiver type: nothing to check.
            return None;
        };

        match getattr(&module.ast, cls, &attr) {
            Some(member) => {
                let attrid = match &module.ast.stmt(cls).kind {
                    StmtKind::ClassDef { attributes, .. } => {
                        attributes.iter().position(|a| a.name == attr)
                    }
                    _ => None,
                };
                if let ExprKind::Attribute {
                    attrid: attr_slot,
                    resolved,
                    ..
                } = &mut module.ast.expr_mut(id).kind
                {
                    *attr_slot = attrid;
                    *resolved = Some(member);
                }
                match &module.ast.stmt(cls).kind {
                    StmtKind::ClassDef { attributes, .. } => attrid
                        .and_then(|i| attributes.get(i))
                        .and_then(|a| a.ty),
                    _ => None,
                }
            }
            None => {
                let class_name = match &module.ast.stmt(cls).kind {
                    StmtKind::ClassDef { name, .. } => name.clone(),
                    _ => "?".to_string(),
                };
                self.errors.push(SemaError::AttributeError {
                    class: class_name,
                    attr,
                    span,
                });
                None
            }
        }
    }
}
