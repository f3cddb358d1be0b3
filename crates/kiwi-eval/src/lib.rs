//! Tree-walking evaluator for Kiwi.
//!
//! A simple, slow, and inspectable interpreter over an analyzed module.
//! Statements run side-effectfully against a flat variable vector
//! (append on define, truncate on scope exit); a stack of [`StackTrace`]s
//! records the statement, expression, and call arguments currently
//! executing. Control flow travels through evaluator registers
//! (`return_value`, `loop_break`, `loop_continue`, `yielding`) and a
//! first-class exception stack rather than host-language exceptions.

use kiwi_common::node::{ExprId, NodeId, PatId, StmtId};
use kiwi_common::op::{BinaryOperator, BoolOperator, CmpOperator, UnaryOperator};
use kiwi_common::value::{GeneratorFrame, Object, Value};

use kiwi_parser::ast::{Arguments, ExprKind, Module, PatKind, StmtKind};
use kiwi_parser::ops::attribute::getattr;
use kiwi_parser::visitor::MAX_VISITOR_RECURSION_DEPTH;

use kiwi_sema::builtins::{
    get_native_binary_operation, get_native_cmp_operation, get_native_unary_operation,
};
use kiwi_sema::{ClassRegistry, SemanticAnalyser};

use std::cell::RefCell;
use std::rc::Rc;

/// One frame of evaluation context for diagnostics: the statement points
/// to the line, the expression to a location in it.
#[derive(Debug, Clone, Default)]
pub struct StackTrace {
    pub stmt: Option<StmtId>,
    pub expr: Option<ExprId>,
    pub args: Vec<Value>,
}

/// The tree evaluator. Borrows the analyzed module and the class registry
/// built by sema; owns all runtime state.
pub struct TreeEvaluator<'m> {
    module: &'m Module,
    classes: ClassRegistry,

    /// Flat local storage: append on define, truncate on scope exit.
    pub variables: Vec<(String, Value)>,
    /// Start of the innermost scope, for shadowing decisions.
    scope_base: Vec<usize>,

    // Control-flow registers.
    return_value: Option<Value>,
    loop_break: bool,
    loop_continue: bool,
    yielding: bool,
    yield_queue: Vec<Value>,

    /// Raised and not-yet-handled exception values.
    pub exceptions: Vec<Value>,
    handling_exceptions: usize,

    pub traces: Vec<StackTrace>,
}

impl<'m> TreeEvaluator<'m> {
    /// Build an evaluator over an analyzed module, seeding globals from
    /// the sema binding table.
    pub fn new(module: &'m Module, sema: &SemanticAnalyser) -> Self {
        let mut evaluator = Self {
            module,
            classes: sema.classes.clone(),
            variables: Vec::with_capacity(128),
            scope_base: vec![0],
            return_value: None,
            loop_break: false,
            loop_continue: false,
            yielding: false,
            yield_queue: Vec::new(),
            exceptions: Vec::new(),
            handling_exceptions: 0,
            traces: vec![StackTrace::default()],
        };

        for entry in &sema.bindings.entries {
            let value = match entry.value {
                Some(NodeId::Stmt(def)) => match &module.ast.stmt(def).kind {
                    StmtKind::FunctionDef { .. } => Some(Value::Function(def)),
                    StmtKind::ClassDef { .. } => sema
                        .classes
                        .type_id_of(def)
                        .map(Value::Class),
                    _ => None,
                },
                _ => match entry.name.as_str() {
                    "True" => Some(Value::Bool(true)),
                    "False" => Some(Value::Bool(false)),
                    "None" => Some(Value::None),
                    _ => None,
                },
            };
            if let Some(value) = value {
                evaluator.variables.push((entry.name.clone(), value));
            }
        }
        evaluator.scope_base = vec![evaluator.variables.len()];
        evaluator
    }

    /// Run the module body, then `main()` if one is defined. Returns the
    /// final value, or the unhandled exception as `Err`.
    pub fn eval_module(&mut self) -> Result<Value, Value> {
        let mut last = Value::None;
        for &stmt in &self.module.body {
            last = self.exec_stmt(stmt, 0);
            if let Some(exc) = self.unhandled_exception() {
                return Err(exc);
            }
            if self.return_value.is_some() {
                break;
            }
        }

        if let Some(Value::Function(main)) = self.fetch_name("main") {
            last = self.call_function(main, Vec::new(), 0);
            if let Some(exc) = self.unhandled_exception() {
                return Err(exc);
            }
        }
        Ok(self.return_value.take().unwrap_or(last))
    }

    /// Call a toplevel function by name.
    pub fn call_by_name(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Value> {
        match self.fetch_name(name) {
            Some(Value::Function(def)) => {
                let out = self.call_function(def, args, 0);
                match self.unhandled_exception() {
                    Some(exc) => Err(exc),
                    None => Ok(out),
                }
            }
            _ => Err(Value::Str(format!("NameError: name '{name}' is not defined"))),
        }
    }

    fn unhandled_exception(&mut self) -> Option<Value> {
        if self.exceptions.len() > self.handling_exceptions {
            self.exceptions.pop()
        } else {
            None
        }
    }

    /// Whether a raised exception is waiting for a handler.
    pub fn has_exceptions(&self) -> bool {
        self.exceptions.len() > self.handling_exceptions
    }

    /// Take the return register, if a `return` just ran.
    pub fn take_return(&mut self) -> Option<Value> {
        self.return_value.take()
    }

    /// Open/close an evaluation scope; the VM uses these around tape
    /// calls so locals unwind exactly like tree-walked calls.
    pub fn open_scope(&mut self) -> usize {
        self.push_scope()
    }

    pub fn close_scope(&mut self, saved: usize) {
        self.pop_scope(saved)
    }

    /// Define a local in the current scope (VM argument binding).
    pub fn define(&mut self, name: &str, value: Value) {
        self.variables.push((name.to_string(), value));
    }

    /// Whether the current body should stop executing.
    fn interrupted(&self) -> bool {
        self.return_value.is_some()
            || self.loop_break
            || self.loop_continue
            || self.yielding
            || self.has_exceptions()
    }

    fn raise(&mut self, exception: Value) -> Value {
        log::debug!("raising {exception}");
        self.exceptions.push(exception);
        Value::None
    }

    fn raise_error(&mut self, kind: &str, message: impl std::fmt::Display) -> Value {
        self.raise(Value::Str(format!("{kind}: {message}")))
    }

    // ── Variables ──────────────────────────────────────────────────────

    fn fetch_name(&self, name: &str) -> Option<Value> {
        self.variables
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Assign in the current scope: update a matching slot at or above
    /// the scope base, else append.
    fn store_name(&mut self, name: &str, value: Value) {
        let base = *self.scope_base.last().expect("scope base never empty");
        if let Some(slot) = self.variables[base..]
            .iter_mut()
            .rev()
            .find(|(n, _)| n == name)
        {
            slot.1 = value;
        } else {
            self.variables.push((name.to_string(), value));
        }
    }

    fn push_scope(&mut self) -> usize {
        let saved = self.variables.len();
        self.scope_base.push(saved);
        saved
    }

    fn pop_scope(&mut self, saved: usize) {
        self.variables.truncate(saved);
        self.scope_base.pop();
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn exec_stmt(&mut self, id: StmtId, depth: usize) -> Value {
        if self.check_depth(depth) {
            return Value::None;
        }
        if let Some(trace) = self.traces.last_mut() {
            trace.stmt = Some(id);
        }

        let ast = &self.module.ast;
        match &ast.stmt(id).kind {
            StmtKind::Expr { value } => self.exec_expr(*value, depth + 1),

            StmtKind::Assign { targets, value } => {
                let value = self.exec_expr(*value, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                for &target in targets {
                    self.assign_target(target, value.clone(), depth + 1);
                }
                Value::None
            }

            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.exec_expr(*value, depth + 1);
                    if !self.has_exceptions() {
                        self.assign_target(*target, value, depth + 1);
                    }
                }
                Value::None
            }

            StmtKind::AugAssign { target, op, value } => {
                let current = self.exec_expr_as_load(*target, depth + 1);
                let rhs = self.exec_expr(*value, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                let combined = self.apply_binary(*op, current, rhs, None);
                if !self.has_exceptions() {
                    self.assign_target(*target, combined, depth + 1);
                }
                Value::None
            }

            StmtKind::Return { value } => {
                let out = match value {
                    Some(value) => self.exec_expr(*value, depth + 1),
                    None => Value::None,
                };
                if !self.has_exceptions() {
                    self.return_value = Some(out);
                }
                Value::None
            }

            StmtKind::Delete { targets } => {
                for &target in targets {
                    if let ExprKind::Name { id: name, .. } = &ast.expr(target).kind {
                        if let Some(pos) =
                            self.variables.iter().rposition(|(n, _)| n == name)
                        {
                            self.variables.remove(pos);
                        }
                    }
                }
                Value::None
            }

            StmtKind::If {
                test,
                body,
                tests,
                bodies,
                orelse,
                ..
            } => {
                let cond = self.exec_expr(*test, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                if cond.is_truthy() {
                    return self.exec_body(body, depth + 1);
                }
                for (arm_test, arm_body) in tests.iter().zip(bodies) {
                    let cond = self.exec_expr(*arm_test, depth + 1);
                    if self.has_exceptions() {
                        return Value::None;
                    }
                    if cond.is_truthy() {
                        return self.exec_body(arm_body, depth + 1);
                    }
                }
                self.exec_body(orelse, depth + 1)
            }

            StmtKind::While { test, body, orelse } => {
                let mut broke = false;
                loop {
                    let cond = self.exec_expr(*test, depth + 1);
                    if self.has_exceptions() || !cond.is_truthy() {
                        break;
                    }
                    self.exec_body(body, depth + 1);
                    if self.loop_continue {
                        self.loop_continue = false;
                        continue;
                    }
                    if self.loop_break {
                        self.loop_break = false;
                        broke = true;
                        break;
                    }
                    if self.return_value.is_some() || self.has_exceptions() || self.yielding {
                        break;
                    }
                }
                if !broke && !self.interrupted() {
                    self.exec_body(orelse, depth + 1);
                }
                Value::None
            }

            StmtKind::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                let iterable = self.exec_expr(*iter, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                let items = self.iterate(iterable);
                let mut broke = false;
                for item in items {
                    self.assign_target(*target, item, depth + 1);
                    self.exec_body(body, depth + 1);
                    if self.loop_continue {
                        self.loop_continue = false;
                        continue;
                    }
                    if self.loop_break {
                        self.loop_break = false;
                        broke = true;
                        break;
                    }
                    if self.return_value.is_some() || self.has_exceptions() || self.yielding {
                        break;
                    }
                }
                if !broke && !self.interrupted() {
                    self.exec_body(orelse, depth + 1);
                }
                Value::None
            }

            StmtKind::Break => {
                self.loop_break = true;
                Value::None
            }
            StmtKind::Continue => {
                self.loop_continue = true;
                Value::None
            }
            StmtKind::Pass | StmtKind::Comment { .. } => Value::None,

            StmtKind::FunctionDef { name, .. } => {
                let value = Value::Function(id);
                self.store_name(&name.clone(), value);
                Value::None
            }

            StmtKind::ClassDef { name, .. } => {
                if let Some(type_id) = self.classes.type_id_of(id) {
                    self.store_name(&name.clone(), Value::Class(type_id));
                }
                Value::None
            }

            StmtKind::Raise { exc, cause } => {
                match exc {
                    Some(exc) => {
                        let exception = self.exec_expr(*exc, depth + 1);
                        if let Some(cause) = cause {
                            self.exec_expr(*cause, depth + 1);
                        }
                        if !self.has_exceptions() {
                            self.raise(exception);
                        }
                    }
                    // Bare `raise` outside a handler.
                    None => {
                        if !self.has_exceptions() {
                            self.raise_error("RuntimeError", "no active exception to re-raise");
                        }
                    }
                }
                Value::None
            }

            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.exec_try(body, handlers, orelse, finalbody, depth + 1);
                Value::None
            }

            StmtKind::Assert { test, msg } => {
                let cond = self.exec_expr(*test, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                if !cond.is_truthy() {
                    let message = match msg {
                        Some(msg) => self.exec_expr(*msg, depth + 1).to_string(),
                        None => "assertion failed".to_string(),
                    };
                    self.raise_error("AssertionError", message);
                }
                Value::None
            }

            StmtKind::With { items, body, .. } => {
                let mut entered = Vec::new();
                for item in items {
                    let ctx = self.exec_expr(item.context_expr, depth + 1);
                    if self.has_exceptions() {
                        break;
                    }
                    let value = self.call_dunder(&ctx, "__enter__", depth + 1).unwrap_or(ctx.clone());
                    if let Some(vars) = item.optional_vars {
                        self.assign_target(vars, value, depth + 1);
                    }
                    entered.push(ctx);
                }

                if !self.has_exceptions() {
                    self.exec_body(body, depth + 1);
                }

                // Exit callbacks run on every unwind path.
                for ctx in entered.iter().rev() {
                    let pending = self.suspend_signals();
                    self.call_dunder(ctx, "__exit__", depth + 1);
                    self.restore_signals(pending);
                }
                Value::None
            }

            StmtKind::Match { subject, cases } => {
                let subject = self.exec_expr(*subject, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                for case in cases {
                    let mut captures = Vec::new();
                    if self.match_pattern(case.pattern, &subject, &mut captures) {
                        if let Some(guard) = case.guard {
                            let saved = self.variables.len();
                            for (name, value) in &captures {
                                self.variables.push((name.clone(), value.clone()));
                            }
                            let passes = self.exec_expr(guard, depth + 1).is_truthy();
                            self.variables.truncate(saved);
                            if !passes {
                                continue;
                            }
                        }
                        let saved = self.variables.len();
                        for (name, value) in captures {
                            self.variables.push((name, value));
                        }
                        self.exec_body(&case.body, depth + 1);
                        self.variables.truncate(saved);
                        break;
                    }
                }
                Value::None
            }

            StmtKind::Inline { body } => self.exec_body(body, depth + 1),

            StmtKind::Global { .. } | StmtKind::Nonlocal { .. } => Value::None,

            StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => Value::None,

            StmtKind::InvalidStatement { .. } => {
                self.raise_error("SyntaxError", "cannot execute an invalid statement")
            }
        }
    }

    /// Run a body until it finishes or control flow interrupts it.
    fn exec_body(&mut self, body: &[StmtId], depth: usize) -> Value {
        let mut last = Value::None;
        for &stmt in body {
            last = self.exec_stmt(stmt, depth);
            if self.interrupted() {
                break;
            }
        }
        last
    }

    fn check_depth(&mut self, depth: usize) -> bool {
        if depth > MAX_VISITOR_RECURSION_DEPTH {
            self.raise_error("RecursionError", "maximum recursion depth exceeded");
            true
        } else {
            false
        }
    }

    /// Park and restore control-flow registers around cleanup code (`with`
    /// exits, `finally` bodies) so the cleanup itself runs unconditionally.
    fn suspend_signals(&mut self) -> (Option<Value>, bool, bool, Vec<Value>) {
        let pending_exceptions = self.exceptions.split_off(self.handling_exceptions);
        (
            self.return_value.take(),
            std::mem::take(&mut self.loop_break),
            std::mem::take(&mut self.loop_continue),
            pending_exceptions,
        )
    }

    fn restore_signals(&mut self, saved: (Option<Value>, bool, bool, Vec<Value>)) {
        let (ret, brk, cont, excs) = saved;
        if self.return_value.is_none() {
            self.return_value = ret;
        }
        self.loop_break |= brk;
        self.loop_continue |= cont;
        self.exceptions.extend(excs);
    }

    // ── try / except ───────────────────────────────────────────────────

    fn exec_try(
        &mut self,
        body: &[StmtId],
        handlers: &[kiwi_parser::ast::ExceptHandler],
        orelse: &[StmtId],
        finalbody: &[StmtId],
        depth: usize,
    ) {
        let watermark = self.exceptions.len();
        self.exec_body(body, depth);

        let raised = self.exceptions.len() > watermark;
        if raised {
            let exception = self.exceptions.pop().expect("raised above watermark");
            let mut handled = false;

            let saved_handling = self.handling_exceptions;
            self.handling_exceptions = self.exceptions.len();

            for handler in handlers {
                if !self.handler_matches(handler.ty, &exception, depth) {
                    continue;
                }
                let saved = self.variables.len();
                if let Some(name) = &handler.name {
                    self.variables.push((name.clone(), exception.clone()));
                }
                self.exec_body(&handler.body, depth);
                self.variables.truncate(saved);
                handled = true;
                break;
            }

            self.handling_exceptions = saved_handling;
            if !handled {
                // No matching handler: the exception keeps unwinding.
                self.exceptions.push(exception);
            }
        } else if !self.interrupted() {
            self.exec_body(orelse, depth);
        }

        // `finally` runs on every path out, including return and re-raise.
        if !finalbody.is_empty() {
            let pending = self.suspend_signals();
            self.exec_body(finalbody, depth);
            self.restore_signals(pending);
        }
    }

    /// Whether a handler's exception type matches the raised value. Also
    /// used by the VM's exception trampoline.
    pub fn handler_matches(&mut self, ty: Option<ExprId>, exception: &Value, depth: usize) -> bool {
        let Some(ty) = ty else {
            return true; // bare `except:`
        };
        let class = self.exec_expr_as_load(ty, depth);
        match (class, exception) {
            (Value::Class(type_id), Value::Object(obj)) => obj.borrow().type_id == type_id,
            // Builtin errors are strings "Kind: message"; a Name handler
            // matches on the kind prefix.
            (_, Value::Str(text)) => match &self.module.ast.expr(ty).kind {
                ExprKind::Name { id, .. } => text.starts_with(id.as_str()),
                _ => false,
            },
            _ => false,
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    /// Evaluate an expression in load position even if its recorded
    /// context is store (used for augmented assignment and handler types).
    fn exec_expr_as_load(&mut self, id: ExprId, depth: usize) -> Value {
        match &self.module.ast.expr(id).kind {
            ExprKind::Name { id: name, .. } => {
                let name = name.clone();
                match self.fetch_name(&name) {
                    Some(value) => value,
                    None => self.raise_error(
                        "NameError",
                        format!("name '{name}' is not defined"),
                    ),
                }
            }
            _ => self.exec_expr(id, depth),
        }
    }

    pub fn exec_expr(&mut self, id: ExprId, depth: usize) -> Value {
        if self.check_depth(depth) {
            return Value::None;
        }
        if let Some(trace) = self.traces.last_mut() {
            trace.expr = Some(id);
        }

        let ast = &self.module.ast;
        match &ast.expr(id).kind {
            ExprKind::Constant { value } => value.clone(),

            ExprKind::Name { id: name, .. } => {
                let name = name.clone();
                match self.fetch_name(&name) {
                    Some(value) => value,
                    None => {
                        self.raise_error("NameError", format!("name '{name}' is not defined"))
                    }
                }
            }

            ExprKind::BinOp {
                left,
                op,
                right,
                native_op,
            } => {
                let (op, native_op) = (*op, *native_op);
                let lhs = self.exec_expr(*left, depth + 1);
                let rhs = self.exec_expr(*right, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                self.apply_binary(op, lhs, rhs, native_op)
            }

            ExprKind::BoolOp { op, values, .. } => {
                // Boolean operators short-circuit left to right.
                let op = *op;
                let values = values.clone();
                let mut result = Value::Bool(matches!(op, BoolOperator::And));
                for value in values {
                    let v = self.exec_expr(value, depth + 1);
                    if self.has_exceptions() {
                        return Value::None;
                    }
                    let truthy = v.is_truthy();
                    result = Value::Bool(truthy);
                    match op {
                        BoolOperator::And if !truthy => return Value::Bool(false),
                        BoolOperator::Or if truthy => return Value::Bool(true),
                        _ => {}
                    }
                }
                result
            }

            ExprKind::UnaryOp {
                op,
                operand,
                native_op,
            } => {
                let (op, native_op) = (*op, *native_op);
                let value = self.exec_expr(*operand, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                if let Some(f) = native_op {
                    return f(&[value]);
                }
                let signature = format!("{op}-{}", value.type_name());
                match get_native_unary_operation(&signature) {
                    Some(f) => f(&[value]),
                    None if matches!(op, UnaryOperator::Not) => Value::Bool(!value.is_truthy()),
                    None => self.raise_error(
                        "TypeError",
                        format!("bad operand type for unary {op}: '{}'", value.type_name()),
                    ),
                }
            }

            ExprKind::Compare {
                left,
                ops,
                comparators,
                native_ops,
            } => {
                let ops = ops.clone();
                let comparators = comparators.clone();
                let native_ops = native_ops.clone();
                let mut prev = self.exec_expr(*left, depth + 1);

                for (i, (op, comparator)) in ops.iter().zip(&comparators).enumerate() {
                    // Short-circuit: once a link is false, later
                    // comparators are not evaluated.
                    let next = self.exec_expr(*comparator, depth + 1);
                    if self.has_exceptions() {
                        return Value::None;
                    }
                    let resolved = native_ops.get(i).copied().flatten();
                    let outcome = self.apply_compare(*op, &prev, &next, resolved);
                    if self.has_exceptions() {
                        return Value::None;
                    }
                    if !outcome {
                        return Value::Bool(false);
                    }
                    prev = next;
                }
                Value::Bool(true)
            }

            ExprKind::Call { .. } => self.exec_call(id, depth),

            ExprKind::Attribute { value, attr, .. } => {
                let attr = attr.clone();
                let receiver = self.exec_expr(*value, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                self.get_attribute(&receiver, &attr)
            }

            ExprKind::Subscript { value, slice, .. } => {
                let container = self.exec_expr(*value, depth + 1);
                let index = self.exec_expr(*slice, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                self.subscript(container, index)
            }

            ExprKind::Starred { value, .. } => self.exec_expr(*value, depth + 1),

            ExprKind::IfExp { test, body, orelse } => {
                let cond = self.exec_expr(*test, depth + 1);
                if self.has_exceptions() {
                    return Value::None;
                }
                if cond.is_truthy() {
                    self.exec_expr(*body, depth + 1)
                } else {
                    self.exec_expr(*orelse, depth + 1)
                }
            }

            ExprKind::Lambda { .. } => Value::Lambda(id),

            ExprKind::NamedExpr { target, value } => {
                let value = self.exec_expr(*value, depth + 1);
                if !self.has_exceptions() {
                    self.assign_target(*target, value.clone(), depth + 1);
                }
                value
            }

            ExprKind::Await { value } => self.exec_expr(*value, depth + 1),

            ExprKind::Yield { value } => {
                let out = match value {
                    Some(value) => self.exec_expr(*value, depth + 1),
                    None => Value::None,
                };
                self.yielding = true;
                self.yield_queue.push(out.clone());
                out
            }

            ExprKind::YieldFrom { value } => {
                let iterable = self.exec_expr(*value, depth + 1);
                let items = self.iterate(iterable);
                self.yielding = true;
                self.yield_queue.extend(items);
                Value::None
            }

            ExprKind::ListExpr { elts, .. } => {
                let elts = elts.clone();
                let mut items = Vec::new();
                for elt in elts {
                    items.push(self.exec_expr(elt, depth + 1));
                }
                Value::list(items)
            }
            ExprKind::TupleExpr { elts, .. } => {
                let elts = elts.clone();
                let mut items = Vec::new();
                for elt in elts {
                    items.push(self.exec_expr(elt, depth + 1));
                }
                Value::tuple(items)
            }
            ExprKind::SetExpr { elts } => {
                let elts = elts.clone();
                let mut items: Vec<Value> = Vec::new();
                for elt in elts {
                    let v = self.exec_expr(elt, depth + 1);
                    if !items.contains(&v) {
                        items.push(v);
                    }
                }
                Value::set(items)
            }
            ExprKind::DictExpr { keys, values } => {
                let keys = keys.clone();
                let values = values.clone();
                let mut items = Vec::new();
                for (key, value) in keys.into_iter().zip(values) {
                    let k = self.exec_expr(key, depth + 1);
                    let v = self.exec_expr(value, depth + 1);
                    items.push((k, v));
                }
                Value::dict(items)
            }

            ExprKind::ListComp { elt, generators } => {
                let elt = *elt;
                let generators = generators.clone();
                let mut items = Vec::new();
                self.run_comprehension(&generators, 0, depth + 1, &mut |ev, d| {
                    let v = ev.exec_expr(elt, d);
                    items.push(v);
                });
                Value::list(items)
            }
            ExprKind::SetComp { elt, generators } => {
                let elt = *elt;
                let generators = generators.clone();
                let mut items: Vec<Value> = Vec::new();
                self.run_comprehension(&generators, 0, depth + 1, &mut |ev, d| {
                    let v = ev.exec_expr(elt, d);
                    if !items.contains(&v) {
                        items.push(v);
                    }
                });
                Value::set(items)
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                let (key, value) = (*key, *value);
                let generators = generators.clone();
                let mut items = Vec::new();
                self.run_comprehension(&generators, 0, depth + 1, &mut |ev, d| {
                    let k = ev.exec_expr(key, d);
                    let v = ev.exec_expr(value, d);
                    items.push((k, v));
                });
                Value::dict(items)
            }
            ExprKind::GeneratorExp { elt, generators } => {
                // Evaluated eagerly into a list; laziness is a generator
                // function concern.
                let elt = *elt;
                let generators = generators.clone();
                let mut items = Vec::new();
                self.run_comprehension(&generators, 0, depth + 1, &mut |ev, d| {
                    let v = ev.exec_expr(elt, d);
                    items.push(v);
                });
                Value::list(items)
            }

            ExprKind::Slice { lower, upper, step } => {
                let lower = lower.map(|e| self.exec_expr(e, depth + 1));
                let upper = upper.map(|e| self.exec_expr(e, depth + 1));
                let step = step.map(|e| self.exec_expr(e, depth + 1));
                Value::tuple(vec![
                    lower.unwrap_or(Value::None),
                    upper.unwrap_or(Value::None),
                    step.unwrap_or(Value::None),
                ])
            }

            ExprKind::JoinedStr { values } => {
                let values = values.clone();
                let mut out = String::new();
                for value in values {
                    let v = self.exec_expr(value, depth + 1);
                    if self.has_exceptions() {
                        return Value::None;
                    }
                    out.push_str(&v.to_string());
                }
                Value::Str(out)
            }

            ExprKind::FormattedValue {
                value,
                format_spec,
                ..
            } => {
                let spec = format_spec
                    .map(|s| self.exec_expr(s, depth + 1).to_string())
                    .unwrap_or_default();
                let v = self.exec_expr(*value, depth + 1);
                Value::Str(format_value(&v, &spec))
            }

            // Type expressions have no runtime payload.
            ExprKind::Arrow { .. }
            | ExprKind::DictType { .. }
            | ExprKind::ArrayType { .. }
            | ExprKind::SetType { .. }
            | ExprKind::TupleType { .. }
            | ExprKind::BuiltinType { .. }
            | ExprKind::ClassType { .. }
            | ExprKind::Placeholder
            | ExprKind::Exported { .. } => Value::None,
        }
    }

    // ── Operators ──────────────────────────────────────────────────────

    fn apply_binary(
        &mut self,
        op: BinaryOperator,
        lhs: Value,
        rhs: Value,
        resolved: Option<kiwi_common::value::NativeFn>,
    ) -> Value {
        if let Some(f) = resolved {
            return f(&[lhs, rhs]);
        }

        // Dynamic path: resolve by the runtime value tags, then magic
        // methods on objects.
        let signature = format!("{op}-{}-{}", lhs.type_name(), rhs.type_name());
        if let Some(f) = get_native_binary_operation(&signature) {
            return f(&[lhs, rhs]);
        }

        if let Value::Object(_) = &lhs {
            if let Some(out) = self.call_magic(&lhs, op.magic_name(false), vec![rhs.clone()]) {
                return out;
            }
        }
        if let Value::Object(_) = &rhs {
            if let Some(out) = self.call_magic(&rhs, op.magic_name(true), vec![lhs.clone()]) {
                return out;
            }
        }

        self.raise_error(
            "TypeError",
            format!(
                "unsupported operand type(s) for {op}: '{}' and '{}'",
                lhs.type_name(),
                rhs.type_name()
            ),
        )
    }

    fn apply_compare(
        &mut self,
        op: CmpOperator,
        lhs: &Value,
        rhs: &Value,
        resolved: Option<kiwi_common::value::NativeFn>,
    ) -> bool {
        if let Some(f) = resolved {
            return f(&[lhs.clone(), rhs.clone()]).is_truthy();
        }
        let signature = format!("{op}-{}-{}", lhs.type_name(), rhs.type_name());
        if let Some(f) = get_native_cmp_operation(&signature) {
            return f(&[lhs.clone(), rhs.clone()]).is_truthy();
        }
        match op {
            CmpOperator::Eq => lhs == rhs,
            CmpOperator::NotEq => lhs != rhs,
            CmpOperator::Is => match (lhs, rhs) {
                (Value::None, Value::None) => true,
                (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
                _ => lhs == rhs,
            },
            CmpOperator::IsNot => !self.apply_compare(CmpOperator::Is, lhs, rhs, None),
            CmpOperator::In => self.contains(rhs, lhs),
            CmpOperator::NotIn => !self.contains(rhs, lhs),
            _ => {
                self.raise_error(
                    "TypeError",
                    format!(
                        "'{op}' not supported between instances of '{}' and '{}'",
                        lhs.type_name(),
                        rhs.type_name()
                    ),
                );
                false
            }
        }
    }

    fn contains(&self, container: &Value, item: &Value) -> bool {
        match container {
            Value::List(items) | Value::Set(items) => items.borrow().contains(item),
            Value::Tuple(items) => items.contains(item),
            Value::Dict(items) => items.borrow().iter().any(|(k, _)| k == item),
            Value::Str(s) => match item {
                Value::Str(needle) => s.contains(needle.as_str()),
                _ => false,
            },
            _ => false,
        }
    }

    // ── Calls ──────────────────────────────────────────────────────────

    fn exec_call(&mut self, id: ExprId, depth: usize) -> Value {
        let (func, args, varargs, keywords) = match &self.module.ast.expr(id).kind {
            ExprKind::Call {
                func,
                args,
                varargs,
                keywords,
                ..
            } => (*func, args.clone(), varargs.clone(), keywords.clone()),
            _ => return Value::None,
        };

        // Method call through an attribute: the receiver becomes the first
        // argument.
        if let ExprKind::Attribute { value, attr, .. } = &self.module.ast.expr(func).kind {
            let attr = attr.clone();
            let receiver = self.exec_expr(*value, depth + 1);
            if self.has_exceptions() {
                return Value::None;
            }
            if let Value::Object(obj) = &receiver {
                let type_id = obj.borrow().type_id;
                if let Some(cls) = self.classes.class_of(type_id) {
                    if let Some(method) = getattr(&self.module.ast, cls, &attr) {
                        let mut call_args = vec![receiver.clone()];
                        for &arg in &args {
                            call_args.push(self.exec_expr(arg, depth + 1));
                        }
                        if self.has_exceptions() {
                            return Value::None;
                        }
                        return self.call_function(method, call_args, depth + 1);
                    }
                }
                return self.raise_error(
                    "AttributeError",
                    format!("object has no method '{attr}'"),
                );
            }
            // Non-object receiver: fall through to calling the attribute
            // value if it is callable.
            let callee = self.get_attribute(&receiver, &attr);
            return self.call_value(callee, &args, &varargs, &keywords, depth);
        }

        // Lambda callee: bind parameters and evaluate the body inline.
        if let ExprKind::Lambda {
            args: lambda_args,
            body,
        } = &self.module.ast.expr(func).kind
        {
            let lambda_args = lambda_args.clone();
            let body = *body;
            let mut call_args = Vec::new();
            for &arg in &args {
                call_args.push(self.exec_expr(arg, depth + 1));
            }
            return self.call_lambda(&lambda_args, body, call_args, depth + 1);
        }

        let callee = self.exec_expr(func, depth + 1);
        if self.has_exceptions() {
            return Value::None;
        }
        self.call_value(callee, &args, &varargs, &keywords, depth)
    }

    fn call_value(
        &mut self,
        callee: Value,
        args: &[ExprId],
        varargs: &[ExprId],
        keywords: &[kiwi_parser::ast::Keyword],
        depth: usize,
    ) -> Value {
        let mut call_args = Vec::new();
        for &arg in args {
            call_args.push(self.exec_expr(arg, depth + 1));
        }
        for &arg in varargs {
            let spread = self.exec_expr(arg, depth + 1);
            call_args.extend(self.iterate(spread));
        }
        // Sema reorders keywords into positional; leftovers only reach a
        // **kwargs which natives and this evaluator pass positionally.
        for kw in keywords {
            call_args.push(self.exec_expr(kw.value, depth + 1));
        }
        if self.has_exceptions() {
            return Value::None;
        }

        match callee {
            Value::Function(def) => self.call_function(def, call_args, depth + 1),
            Value::Lambda(expr) => match self.module.ast.expr(expr).kind.clone() {
                ExprKind::Lambda { args, body } => {
                    self.call_lambda(&args, body, call_args, depth + 1)
                }
                _ => self.raise_error("TypeError", "value is not a lambda"),
            },
            Value::Native(f) => f(&call_args),
            Value::Class(type_id) => self.call_constructor(type_id, call_args, depth + 1),
            Value::Generator(frame) => {
                // Calling a generator value drives it one step.
                match self.generator_next(&frame, depth + 1) {
                    Some(v) => v,
                    None => self.raise_error("StopIteration", "generator exhausted"),
                }
            }
            other => self.raise_error(
                "TypeError",
                format!("'{}' object is not callable", other.type_name()),
            ),
        }
    }

    /// Call a user or native `FunctionDef`.
    pub fn call_function(&mut self, def: StmtId, args: Vec<Value>, depth: usize) -> Value {
        let (params, body, native, generator) = match &self.module.ast.stmt(def).kind {
            StmtKind::FunctionDef {
                args,
                body,
                native,
                generator,
                ..
            } => (args.clone(), body.clone(), *native, *generator),
            _ => {
                return self.raise_error("TypeError", "value is not a function");
            }
        };

        if let Some(f) = native {
            return f(&args);
        }

        if generator {
            let locals: Vec<(String, Value)> = params
                .positional()
                .map(|p| p.arg.clone())
                .zip(args)
                .collect();
            return Value::Generator(Rc::new(RefCell::new(GeneratorFrame {
                function: def,
                locals,
                resume: 0,
                pending: Vec::new(),
                done: false,
            })));
        }

        self.traces.push(StackTrace {
            stmt: None,
            expr: None,
            args: args.clone(),
        });
        let saved = self.push_scope();

        for (param, value) in params.positional().zip(args) {
            self.variables.push((param.arg.clone(), value));
        }

        // One statement at a time, checking the return register after
        // each.
        for &stmt in &body {
            self.exec_stmt(stmt, depth + 1);
            if self.return_value.is_some() || self.has_exceptions() {
                break;
            }
        }

        self.pop_scope(saved);
        self.traces.pop();
        self.return_value.take().unwrap_or(Value::None)
    }

    fn call_lambda(
        &mut self,
        params: &Arguments,
        body: ExprId,
        args: Vec<Value>,
        depth: usize,
    ) -> Value {
        let saved = self.push_scope();
        for (param, value) in params.positional().zip(args) {
            self.variables.push((param.arg.clone(), value));
        }
        let out = self.exec_expr(body, depth);
        self.pop_scope(saved);
        out
    }

    /// Constructor pipeline: allocate, run `__new__` when defined, then
    /// `__init__`.
    fn call_constructor(&mut self, type_id: usize, args: Vec<Value>, depth: usize) -> Value {
        let Some(cls) = self.classes.class_of(type_id) else {
            return self.raise_error("TypeError", "unknown class in constructor call");
        };

        let instance = Value::object(Object::new(type_id));

        if let Some(newfn) = getattr(&self.module.ast, cls, "__new__") {
            let mut new_args = vec![Value::Class(type_id)];
            new_args.extend(args.iter().cloned());
            self.call_function(newfn, new_args, depth);
            if self.has_exceptions() {
                return Value::None;
            }
        }

        if let Some(init) = getattr(&self.module.ast, cls, "__init__") {
            let mut init_args = vec![instance.clone()];
            init_args.extend(args);
            self.call_function(init, init_args, depth);
            if self.has_exceptions() {
                return Value::None;
            }
        } else if !args.is_empty() {
            // Exception-style construction: keep the arguments as fields.
            if let Value::Object(obj) = &instance {
                obj.borrow_mut().set("args", Value::tuple(args));
            }
        }

        instance
    }

    /// Call a magic method on an object, if its class defines it.
    fn call_magic(&mut self, receiver: &Value, magic: &str, mut args: Vec<Value>) -> Option<Value> {
        let Value::Object(obj) = receiver else {
            return None;
        };
        let type_id = obj.borrow().type_id;
        let cls = self.classes.class_of(type_id)?;
        let method = getattr(&self.module.ast, cls, magic)?;
        let mut call_args = vec![receiver.clone()];
        call_args.append(&mut args);
        Some(self.call_function(method, call_args, 0))
    }

    fn call_dunder(&mut self, receiver: &Value, name: &str, _depth: usize) -> Option<Value> {
        self.call_magic(receiver, name, Vec::new())
    }

    // ── Generators ─────────────────────────────────────────────────────

    /// Drive a generator one step: re-enter the saved frame, run until the
    /// next yield, save the frame back.
    pub fn generator_next(
        &mut self,
        frame: &Rc<RefCell<GeneratorFrame>>,
        depth: usize,
    ) -> Option<Value> {
        // Values already produced (a `yield from` run) drain first.
        {
            let mut f = frame.borrow_mut();
            if !f.pending.is_empty() {
                return Some(f.pending.remove(0));
            }
            if f.done {
                return None;
            }
        }

        let (function, locals, resume) = {
            let f = frame.borrow();
            (f.function, f.locals.clone(), f.resume)
        };
        let body = match &self.module.ast.stmt(function).kind {
            StmtKind::FunctionDef { body, .. } => body.clone(),
            _ => return None,
        };

        let saved = self.push_scope();
        for (name, value) in locals {
            self.variables.push((name, value));
        }

        let mut next_resume = resume;
        let base = *self.scope_base.last().expect("scope pushed above");
        while next_resume < body.len() {
            self.exec_stmt(body[next_resume], depth);
            next_resume += 1;
            if self.yielding {
                self.yielding = false;
                break;
            }
            if self.return_value.is_some() || self.has_exceptions() {
                break;
            }
        }

        // Save the local frame for the next resumption.
        let locals: Vec<(String, Value)> = self.variables[base..].to_vec();
        self.pop_scope(saved);

        let produced = std::mem::take(&mut self.yield_queue);
        let mut f = frame.borrow_mut();
        f.locals = locals;
        f.resume = next_resume;
        f.pending.extend(produced);

        if f.pending.is_empty() {
            f.done = true;
            self.return_value.take();
            None
        } else {
            Some(f.pending.remove(0))
        }
    }

    // ── Assignment targets ─────────────────────────────────────────────

    fn assign_target(&mut self, target: ExprId, value: Value, depth: usize) {
        let kind = self.module.ast.expr(target).kind.clone();
        match kind {
            ExprKind::Name { id: name, .. } => self.store_name(&name, value),
            ExprKind::Attribute {
                value: base, attr, ..
            } => {
                let receiver = self.exec_expr(base, depth);
                if let Value::Object(obj) = receiver {
                    obj.borrow_mut().set(&attr, value);
                } else if !self.has_exceptions() {
                    self.raise_error(
                        "AttributeError",
                        format!("cannot set attribute '{attr}' on this value"),
                    );
                }
            }
            ExprKind::Subscript {
                value: base, slice, ..
            } => {
                let container = self.exec_expr(base, depth);
                let index = self.exec_expr(slice, depth);
                self.store_subscript(container, index, value);
            }
            ExprKind::TupleExpr { elts, .. } | ExprKind::ListExpr { elts, .. } => {
                let items = self.iterate(value);
                if items.len() != elts.len() {
                    self.raise_error(
                        "ValueError",
                        format!(
                            "cannot unpack {} values into {} targets",
                            items.len(),
                            elts.len()
                        ),
                    );
                    return;
                }
                for (elt, item) in elts.into_iter().zip(items) {
                    self.assign_target(elt, item, depth);
                }
            }
            ExprKind::Starred { value: inner, .. } => {
                self.assign_target(inner, value, depth);
            }
            _ => {
                self.raise_error("TypeError", "invalid assignment target");
            }
        }
    }

    // ── Containers ─────────────────────────────────────────────────────

    /// Materialize the items of an iterable value.
    pub fn iterate(&mut self, value: Value) -> Vec<Value> {
        match value {
            Value::List(items) | Value::Set(items) => items.borrow().clone(),
            Value::Tuple(items) => items.as_ref().clone(),
            Value::Dict(items) => items.borrow().iter().map(|(k, _)| k.clone()).collect(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            Value::Generator(frame) => {
                let mut items = Vec::new();
                while let Some(item) = self.generator_next(&frame, 0) {
                    items.push(item);
                    if self.has_exceptions() {
                        break;
                    }
                }
                items
            }
            other => {
                self.raise_error(
                    "TypeError",
                    format!("'{}' object is not iterable", other.type_name()),
                );
                Vec::new()
            }
        }
    }

    fn subscript(&mut self, container: Value, index: Value) -> Value {
        match (&container, &index) {
            (Value::List(items), Value::I32(i)) => {
                let items = items.borrow();
                match normalize_index(*i, items.len()) {
                    Some(i) => items[i].clone(),
                    None => self.raise_error("IndexError", "list index out of range"),
                }
            }
            (Value::Tuple(items), Value::I32(i)) => match normalize_index(*i, items.len()) {
                Some(i) => items[i].clone(),
                None => self.raise_error("IndexError", "tuple index out of range"),
            },
            (Value::Str(s), Value::I32(i)) => {
                let chars: Vec<char> = s.chars().collect();
                match normalize_index(*i, chars.len()) {
                    Some(i) => Value::Str(chars[i].to_string()),
                    None => self.raise_error("IndexError", "string index out of range"),
                }
            }
            (Value::Dict(items), key) => {
                let items = items.borrow();
                match items.iter().find(|(k, _)| k == key) {
                    Some((_, v)) => v.clone(),
                    None => self.raise_error("KeyError", format!("{key}")),
                }
            }
            _ => self.raise_error(
                "TypeError",
                format!("'{}' object is not subscriptable", container.type_name()),
            ),
        }
    }

    fn store_subscript(&mut self, container: Value, index: Value, value: Value) {
        match (&container, &index) {
            (Value::List(items), Value::I32(i)) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                match normalize_index(*i, len) {
                    Some(i) => items[i] = value,
                    None => {
                        drop(items);
                        self.raise_error("IndexError", "list assignment index out of range");
                    }
                }
            }
            (Value::Dict(items), key) => {
                let mut items = items.borrow_mut();
                if let Some(slot) = items.iter_mut().find(|(k, _)| k == key) {
                    slot.1 = value;
                } else {
                    items.push((key.clone(), value));
                }
            }
            _ => {
                self.raise_error(
                    "TypeError",
                    format!(
                        "'{}' object does not support item assignment",
                        container.type_name()
                    ),
                );
            }
        }
    }

    fn get_attribute(&mut self, receiver: &Value, attr: &str) -> Value {
        match receiver {
            Value::Object(obj) => {
                if let Some(value) = obj.borrow().get(attr) {
                    return value.clone();
                }
                let type_id = obj.borrow().type_id;
                if let Some(cls) = self.classes.class_of(type_id) {
                    if let Some(member) = getattr(&self.module.ast, cls, attr) {
                        if matches!(
                            self.module.ast.stmt(member).kind,
                            StmtKind::FunctionDef { .. }
                        ) {
                            return Value::Function(member);
                        }
                    }
                }
                self.raise_error(
                    "AttributeError",
                    format!("object has no attribute '{attr}'"),
                )
            }
            _ => self.raise_error(
                "AttributeError",
                format!(
                    "'{}' object has no attribute '{attr}'",
                    receiver.type_name()
                ),
            ),
        }
    }

    // ── Comprehensions ─────────────────────────────────────────────────

    fn run_comprehension(
        &mut self,
        generators: &[kiwi_parser::ast::Comprehension],
        index: usize,
        depth: usize,
        emit: &mut dyn FnMut(&mut Self, usize),
    ) {
        let Some(gen) = generators.get(index) else {
            emit(self, depth);
            return;
        };
        let iterable = self.exec_expr(gen.iter, depth);
        if self.has_exceptions() {
            return;
        }
        let items = self.iterate(iterable);
        let saved = self.variables.len();
        for item in items {
            self.assign_target(gen.target, item, depth);
            let mut keep = true;
            for &cond in &gen.ifs {
                if !self.exec_expr(cond, depth).is_truthy() {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.run_comprehension(generators, index + 1, depth, emit);
            }
            if self.has_exceptions() {
                break;
            }
        }
        self.variables.truncate(saved);
    }

    // ── Patterns ───────────────────────────────────────────────────────

    /// Try to match a value against a pattern, collecting captures.
    pub fn match_pattern(
        &mut self,
        pattern: PatId,
        subject: &Value,
        captures: &mut Vec<(String, Value)>,
    ) -> bool {
        let kind = self.module.ast.pat(pattern).kind.clone();
        match kind {
            PatKind::MatchValue { value } => {
                let expected = self.exec_expr(value, 0);
                &expected == subject
            }
            PatKind::MatchSingleton { value } => &value == subject,
            PatKind::MatchSequence { patterns } => {
                let items = match subject {
                    Value::List(items) => items.borrow().clone(),
                    Value::Tuple(items) => items.as_ref().clone(),
                    _ => return false,
                };
                let star_at = patterns.iter().position(|&p| {
                    matches!(self.module.ast.pat(p).kind, PatKind::MatchStar { .. })
                });
                match star_at {
                    None => {
                        if items.len() != patterns.len() {
                            return false;
                        }
                        patterns
                            .iter()
                            .zip(&items)
                            .all(|(&p, item)| self.match_pattern(p, item, captures))
                    }
                    Some(star) => {
                        let tail = patterns.len() - star - 1;
                        if items.len() < patterns.len() - 1 {
                            return false;
                        }
                        for (i, &p) in patterns[..star].iter().enumerate() {
                            if !self.match_pattern(p, &items[i], captures) {
                                return false;
                            }
                        }
                        let rest: Vec<Value> =
                            items[star..items.len() - tail].to_vec();
                        if let PatKind::MatchStar { name: Some(name) } =
                            &self.module.ast.pat(patterns[star]).kind
                        {
                            captures.push((name.clone(), Value::list(rest)));
                        }
                        for (i, &p) in patterns[star + 1..].iter().enumerate() {
                            let item = &items[items.len() - tail + i];
                            if !self.match_pattern(p, item, captures) {
                                return false;
                            }
                        }
                        true
                    }
                }
            }
            PatKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => {
                let Value::Dict(items) = subject else {
                    return false;
                };
                let entries = items.borrow().clone();
                let mut matched_keys = Vec::new();
                for (key, &pat) in keys.iter().zip(&patterns) {
                    let key_value = self.exec_expr(*key, 0);
                    let Some((_, value)) = entries.iter().find(|(k, _)| *k == key_value) else {
                        return false;
                    };
                    if !self.match_pattern(pat, value, captures) {
                        return false;
                    }
                    matched_keys.push(key_value);
                }
                if let Some(rest) = rest {
                    let remaining: Vec<(Value, Value)> = entries
                        .iter()
                        .filter(|(k, _)| !matched_keys.contains(k))
                        .cloned()
                        .collect();
                    captures.push((rest, Value::dict(remaining)));
                }
                true
            }
            PatKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                let Value::Object(obj) = subject else {
                    return false;
                };
                let class_value = self.exec_expr_as_load(cls, 0);
                let Value::Class(type_id) = class_value else {
                    return false;
                };
                if obj.borrow().type_id != type_id {
                    return false;
                }
                // Positional sub-patterns match fields in declaration
                // order.
                let fields: Vec<Value> =
                    obj.borrow().attrs.iter().map(|(_, v)| v.clone()).collect();
                if patterns.len() > fields.len() {
                    return false;
                }
                for (&pat, field) in patterns.iter().zip(&fields) {
                    if !self.match_pattern(pat, field, captures) {
                        return false;
                    }
                }
                for (attr, &pat) in kwd_attrs.iter().zip(&kwd_patterns) {
                    let Some(value) = obj.borrow().get(attr).cloned() else {
                        return false;
                    };
                    if !self.match_pattern(pat, &value, captures) {
                        return false;
                    }
                }
                true
            }
            PatKind::MatchStar { name } => {
                if let Some(name) = name {
                    captures.push((name, subject.clone()));
                }
                true
            }
            PatKind::MatchAs { pattern, name } => {
                if let Some(inner) = pattern {
                    if !self.match_pattern(inner, subject, captures) {
                        return false;
                    }
                }
                if let Some(name) = name {
                    captures.push((name, subject.clone()));
                }
                true
            }
            PatKind::MatchOr { patterns } => {
                for pat in patterns {
                    let mut attempt = Vec::new();
                    if self.match_pattern(pat, subject, &mut attempt) {
                        captures.extend(attempt);
                        return true;
                    }
                }
                false
            }
        }
    }
}

/// Clamp a (possibly negative) index into a container of length `len`.
fn normalize_index(i: i32, len: usize) -> Option<usize> {
    let idx = if i < 0 { i + len as i32 } else { i };
    if idx >= 0 && (idx as usize) < len {
        Some(idx as usize)
    } else {
        None
    }
}

/// Minimal `[[fill]align][width]` format handling for f-strings.
fn format_value(value: &Value, spec: &str) -> String {
    let text = value.to_string();
    if spec.is_empty() {
        return text;
    }

    let mut chars = spec.chars().peekable();
    let mut fill = ' ';
    let mut align = None;
    if let Some(&c) = chars.peek() {
        if matches!(c, '<' | '>' | '^') {
            align = Some(c);
            chars.next();
        } else {
            let mut clone = chars.clone();
            clone.next();
            if let Some(&a) = clone.peek() {
                if matches!(a, '<' | '>' | '^') {
                    fill = c;
                    align = Some(a);
                    chars.next();
                    chars.next();
                }
            }
        }
    }
    let width: usize = chars
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0);

    if text.len() >= width {
        return text;
    }
    let pad = width - text.len();
    match align.unwrap_or('<') {
        '>' => format!("{}{}", fill.to_string().repeat(pad), text),
        '^' => {
            let left = pad / 2;
            let right = pad - left;
            format!(
                "{}{}{}",
                fill.to_string().repeat(left),
                text,
                fill.to_string().repeat(right)
            )
        }
        _ => format!("{}{}", text, fill.to_string().repeat(pad)),
    }
}
