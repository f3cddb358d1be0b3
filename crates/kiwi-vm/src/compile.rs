//! Lowering: statements to a flat instruction tape.
//!
//! Module toplevel code precedes function bodies and ends in a synthetic
//! return; every function body becomes a labeled run of instructions.
//! `if`/`while` lower to conditional jumps with backpatched targets;
//! `break`/`continue` jumps collect in a loop-context stack until the loop
//! end is known; `try` registers its handler table; calls are resolved to
//! label indices once the whole module is assembled.

use kiwi_common::node::{ExprId, NodeId, StmtId};
use kiwi_common::op::CmpOperator;
use kiwi_common::span::Span;
use kiwi_common::value::{NativeFn, Value};

use kiwi_parser::ast::{ExprContext, ExprKind, Module, PatKind, StmtKind};
use kiwi_parser::visitor::for_each_child;

/// One tape instruction.
#[derive(Debug, Clone)]
pub enum Inst {
    /// Execute a statement through the evaluator.
    Stmt(StmtId),
    /// Unconditional jump.
    Jump { dest: usize },
    /// Evaluate `cond`; go to `then_jmp` when truthy, `else_jmp` otherwise.
    CondJump {
        cond: ExprId,
        then_jmp: usize,
        else_jmp: usize,
    },
    /// Invoke a native function with the current argument window.
    Native(NativeFn),
}

/// A named entry point into the tape.
#[derive(Debug, Clone)]
pub struct Label {
    pub stmt: StmtId,
    pub name: String,
    pub index: usize,
    pub depth: usize,
}

/// One `except` entry of a registered `try` region.
#[derive(Debug, Clone)]
pub struct HandlerEntry {
    pub ty: Option<ExprId>,
    pub name: Option<String>,
    pub index: usize,
}

/// A `try` region in the tape. `raise` anywhere inside the body range
/// trampolines into the first matching handler.
#[derive(Debug, Clone)]
pub struct TryBlock {
    pub body_start: usize,
    pub body_end: usize,
    pub handlers: Vec<HandlerEntry>,
    pub finally_index: Option<usize>,
    pub end: usize,
}

/// The assembled program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub instructions: Vec<Inst>,
    pub labels: Vec<Label>,
    pub try_blocks: Vec<TryBlock>,
}

impl Program {
    pub fn find_label(&self, name: &str) -> Option<usize> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.index)
    }

    pub fn label_stmt(&self, name: &str) -> Option<StmtId> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.stmt)
    }

    /// Innermost try region whose body covers `ic`.
    pub fn try_block_at(&self, ic: usize) -> Option<&TryBlock> {
        self.try_blocks
            .iter()
            .filter(|block| block.body_start <= ic && ic < block.body_end)
            .max_by_key(|block| block.body_start)
    }

    /// Render the tape for inspection.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, inst) in self.instructions.iter().enumerate() {
            if let Some(label) = self.labels.iter().find(|l| l.index == i) {
                out.push_str(&format!("{}:\n", label.name));
            }
            let line = match inst {
                Inst::Stmt(stmt) => format!("stmt #{}", stmt.0),
                Inst::Jump { dest } => format!("jump -> {dest}"),
                Inst::CondJump {
                    then_jmp, else_jmp, ..
                } => format!("condjump then -> {then_jmp} else -> {else_jmp}"),
                Inst::Native(_) => "native".to_string(),
            };
            out.push_str(&format!("  {i:4}  {line}\n"));
        }
        out
    }
}

/// Pending break/continue jumps of the loop being lowered.
#[derive(Debug, Default)]
struct LoopContext {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// Lower a module to a [`Program`].
///
/// Needs mutable access to the module: synthetic nodes (returns, pattern
/// comparisons) are allocated in the arena, and resolved calls get their
/// `jump_id` written back.
pub fn compile(module: &mut Module) -> Program {
    let mut compiler = VmCompiler {
        module,
        program: Vec::new(),
        labels: Vec::new(),
        try_blocks: Vec::new(),
        loop_ctx: Vec::new(),
        calls_to_be_resolved: Vec::new(),
    };
    compiler.lower_module();

    let VmCompiler {
        module,
        program,
        labels,
        try_blocks,
        calls_to_be_resolved,
        ..
    } = compiler;

    let out = Program {
        instructions: program,
        labels,
        try_blocks,
    };

    // Late call resolution: every pending call whose callee names a label
    // gets its jump id. Unresolved calls stay evaluator-dispatched.
    for call in calls_to_be_resolved {
        let target = match &module.ast.expr(call).kind {
            ExprKind::Call { func, .. } => match &module.ast.expr(*func).kind {
                ExprKind::Name { id, .. } => out.find_label(id),
                _ => None,
            },
            _ => None,
        };
        if let Some(index) = target {
            if let ExprKind::Call { jump_id, .. } = &mut module.ast.expr_mut(call).kind {
                *jump_id = Some(index);
            }
        }
    }

    out
}

struct VmCompiler<'m> {
    module: &'m mut Module,
    program: Vec<Inst>,
    labels: Vec<Label>,
    try_blocks: Vec<TryBlock>,
    loop_ctx: Vec<LoopContext>,
    calls_to_be_resolved: Vec<ExprId>,
}

impl<'m> VmCompiler<'m> {
    fn ic(&self) -> usize {
        self.program.len()
    }

    fn emit(&mut self, inst: Inst) -> usize {
        let index = self.program.len();
        self.program.push(inst);
        index
    }

    fn emit_stmt(&mut self, stmt: StmtId) {
        self.register_calls(NodeId::Stmt(stmt));
        self.emit(Inst::Stmt(stmt));
    }

    /// Remember every call inside a subtree for late resolution.
    fn register_calls(&mut self, node: NodeId) {
        if let NodeId::Expr(id) = node {
            if matches!(self.module.ast.expr(id).kind, ExprKind::Call { .. }) {
                self.calls_to_be_resolved.push(id);
            }
        }
        let mut children = Vec::new();
        for_each_child(&self.module.ast, node, &mut |child| children.push(child));
        for child in children {
            self.register_calls(child);
        }
    }

    fn synthetic_return(&mut self) -> StmtId {
        self.module
            .ast
            .add_stmt(StmtKind::Return { value: None }, Span::point(0))
    }

    // ── Module ─────────────────────────────────────────────────────────

    /// Toplevel non-definition statements run first and end in a
    /// synthetic return; definitions follow as labeled bodies.
    fn lower_module(&mut self) {
        let body = self.module.body.clone();
        let (defs, entry): (Vec<StmtId>, Vec<StmtId>) = body.into_iter().partition(|&stmt| {
            matches!(
                self.module.ast.stmt(stmt).kind,
                StmtKind::FunctionDef { .. } | StmtKind::ClassDef { .. }
            )
        });

        for stmt in entry {
            self.lower_stmt(stmt, 0);
        }
        let stop = self.synthetic_return();
        self.emit(Inst::Stmt(stop));

        for stmt in defs {
            match self.module.ast.stmt(stmt).kind.clone() {
                StmtKind::FunctionDef { name, .. } => {
                    self.lower_function(stmt, &name, 0);
                }
                StmtKind::ClassDef { name, body, .. } => {
                    // Only method bodies end up in the final program.
                    for member in body {
                        if let StmtKind::FunctionDef { name: method, .. } =
                            self.module.ast.stmt(member).kind.clone()
                        {
                            let label = format!("{name}.{method}");
                            self.lower_function(member, &label, 1);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn lower_function(&mut self, stmt: StmtId, label: &str, depth: usize) {
        let (body, native) = match &self.module.ast.stmt(stmt).kind {
            StmtKind::FunctionDef { body, native, .. } => (body.clone(), *native),
            _ => return,
        };

        self.labels.push(Label {
            stmt,
            name: label.to_string(),
            index: self.ic(),
            depth,
        });

        if let Some(f) = native {
            self.emit(Inst::Native(f));
            return;
        }

        for stmt in body {
            self.lower_stmt(stmt, depth + 1);
        }
        // Fall-through return for bodies that end without one.
        let ret = self.synthetic_return();
        self.emit(Inst::Stmt(ret));
    }

    fn lower_body(&mut self, body: &[StmtId], depth: usize) {
        for &stmt in body {
            self.lower_stmt(stmt, depth);
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn lower_stmt(&mut self, stmt: StmtId, depth: usize) {
        match self.module.ast.stmt(stmt).kind.clone() {
            // Flattened control flow.
            StmtKind::If {
                test,
                body,
                tests,
                bodies,
                orelse,
                ..
            } => self.lower_if(test, &body, &tests, &bodies, &orelse, depth),

            StmtKind::While { test, body, orelse } => {
                self.lower_while(test, &body, &orelse, depth)
            }

            StmtKind::Break => {
                let jump = self.emit(Inst::Jump { dest: usize::MAX });
                if let Some(ctx) = self.loop_ctx.last_mut() {
                    ctx.break_jumps.push(jump);
                } else {
                    log::warn!("break outside a lowered loop");
                }
            }

            StmtKind::Continue => {
                let jump = self.emit(Inst::Jump { dest: usize::MAX });
                if let Some(ctx) = self.loop_ctx.last_mut() {
                    ctx.continue_jumps.push(jump);
                } else {
                    log::warn!("continue outside a lowered loop");
                }
            }

            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => self.lower_try(&body, &handlers, &orelse, &finalbody, depth),

            StmtKind::Assert { test, msg } => self.lower_assert(test, msg),

            StmtKind::Match { subject, cases } => {
                self.lower_match(stmt, subject, &cases, depth)
            }

            StmtKind::Inline { body } => self.lower_body(&body, depth),

            // Nested definitions bind at runtime like any other statement.
            StmtKind::FunctionDef { .. } | StmtKind::ClassDef { .. } => self.emit_stmt(stmt),

            // Comments vanish; pass lowers to nothing.
            StmtKind::Pass | StmtKind::Comment { .. } => {}

            StmtKind::InvalidStatement { .. } => {
                log::error!("invalid statement reached the VM compiler");
            }

            // Everything else is a leaf instruction; the `for` statement
            // iterates through the evaluator, which keeps per-loop
            // iterator state off the tape.
            _ => self.emit_stmt(stmt),
        }
    }

    fn lower_if(
        &mut self,
        test: ExprId,
        body: &[StmtId],
        tests: &[ExprId],
        bodies: &[Vec<StmtId>],
        orelse: &[StmtId],
        depth: usize,
    ) {
        self.register_calls(NodeId::Expr(test));
        let cond = self.emit(Inst::CondJump {
            cond: test,
            then_jmp: 0,
            else_jmp: 0,
        });
        let then_jmp = self.ic();
        self.lower_body(body, depth);

        let has_more = !tests.is_empty() || !orelse.is_empty();
        let skip_else = has_more.then(|| self.emit(Inst::Jump { dest: usize::MAX }));

        let else_jmp = self.ic();
        self.patch_cond(cond, then_jmp, else_jmp);

        if let (Some(&arm_test), Some(arm_body)) = (tests.first(), bodies.first()) {
            // Remaining elif arms lower as a nested if in the else slot.
            self.lower_if(arm_test, arm_body, &tests[1..], &bodies[1..], orelse, depth);
        } else {
            self.lower_body(orelse, depth);
        }

        let end = self.ic();
        if let Some(skip) = skip_else {
            self.patch_jump(skip, end);
        }
    }

    fn lower_while(&mut self, test: ExprId, body: &[StmtId], orelse: &[StmtId], depth: usize) {
        self.loop_ctx.push(LoopContext::default());

        let start = self.ic();
        self.register_calls(NodeId::Expr(test));
        let cond = self.emit(Inst::CondJump {
            cond: test,
            then_jmp: 0,
            else_jmp: 0,
        });
        let then_jmp = self.ic();
        self.lower_body(body, depth);
        self.emit(Inst::Jump { dest: start });

        let else_jmp = self.ic();
        self.patch_cond(cond, then_jmp, else_jmp);
        self.lower_body(orelse, depth);

        let end = self.ic();
        let ctx = self.loop_ctx.pop().expect("pushed above");
        for jump in ctx.break_jumps {
            // Break skips the orelse.
            self.patch_jump(jump, end);
        }
        for jump in ctx.continue_jumps {
            // Continue re-tests at the top of the loop.
            self.patch_jump(jump, start);
        }
    }

    fn lower_try(
        &mut self,
        body: &[StmtId],
        handlers: &[kiwi_parser::ast::ExceptHandler],
        orelse: &[StmtId],
        finalbody: &[StmtId],
        depth: usize,
    ) {
        let body_start = self.ic();
        self.lower_body(body, depth);
        let body_end = self.ic();

        // Normal completion skips the handler blocks into orelse.
        let skip_handlers = self.emit(Inst::Jump { dest: usize::MAX });

        let mut entries = Vec::new();
        let mut handler_exits = Vec::new();
        for handler in handlers {
            let index = self.ic();
            self.lower_body(&handler.body, depth);
            handler_exits.push(self.emit(Inst::Jump { dest: usize::MAX }));
            entries.push(HandlerEntry {
                ty: handler.ty,
                name: handler.name.clone(),
                index,
            });
        }

        let orelse_start = self.ic();
        self.patch_jump(skip_handlers, orelse_start);
        self.lower_body(orelse, depth);

        let finally_index = (!finalbody.is_empty()).then(|| self.ic());
        self.lower_body(finalbody, depth);
        let end = self.ic();

        // Handlers exit through the finally block when there is one.
        let handler_exit_target = finally_index.unwrap_or(end);
        for exit in handler_exits {
            self.patch_jump(exit, handler_exit_target);
        }

        self.try_blocks.push(TryBlock {
            body_start,
            body_end,
            handlers: entries,
            finally_index,
            end,
        });
    }

    /// `assert test, msg` guards a synthesized raise with a conditional
    /// jump.
    fn lower_assert(&mut self, test: ExprId, msg: Option<ExprId>) {
        self.register_calls(NodeId::Expr(test));
        let cond = self.emit(Inst::CondJump {
            cond: test,
            then_jmp: 0,
            else_jmp: 0,
        });

        let raise_idx = self.ic();
        let message = self.module.ast.add_expr(
            ExprKind::constant(Value::Str("AssertionError: assertion failed".to_string())),
            Span::point(0),
        );
        let exc = msg.unwrap_or(message);
        let raise = self
            .module
            .ast
            .add_stmt(StmtKind::Raise { exc: Some(exc), cause: None }, Span::point(0));
        self.emit(Inst::Stmt(raise));

        self.patch_cond(cond, raise_idx + 1, raise_idx);
    }

    /// `match` lowers to one compare-and-jump stanza per case, joining
    /// after the matched body. Simple patterns (values, singletons,
    /// wildcards, captures) compare on the tape; richer patterns fall back
    /// to the evaluator's matcher for the whole statement.
    fn lower_match(
        &mut self,
        stmt: StmtId,
        subject: ExprId,
        cases: &[kiwi_parser::ast::MatchCase],
        depth: usize,
    ) {
        let all_simple = cases.iter().all(|case| {
            matches!(
                self.module.ast.pat(case.pattern).kind,
                PatKind::MatchValue { .. }
                    | PatKind::MatchSingleton { .. }
                    | PatKind::MatchAs { pattern: None, .. }
            ) && case.guard.is_none()
        });
        if !all_simple {
            self.emit_stmt(stmt);
            return;
        }

        self.register_calls(NodeId::Expr(subject));
        let mut exits = Vec::new();
        for case in cases {
            match self.module.ast.pat(case.pattern).kind.clone() {
                PatKind::MatchValue { value } => {
                    let cond = self.module.ast.add_expr(
                        ExprKind::Compare {
                            left: subject,
                            ops: vec![CmpOperator::Eq],
                            comparators: vec![value],
                            native_ops: Vec::new(),
                        },
                        Span::point(0),
                    );
                    let jump = self.emit(Inst::CondJump {
                        cond,
                        then_jmp: 0,
                        else_jmp: 0,
                    });
                    let then_jmp = self.ic();
                    self.lower_body(&case.body, depth);
                    exits.push(self.emit(Inst::Jump { dest: usize::MAX }));
                    let next = self.ic();
                    self.patch_cond(jump, then_jmp, next);
                }
                PatKind::MatchSingleton { value } => {
                    let expected = self
                        .module
                        .ast
                        .add_expr(ExprKind::constant(value), Span::point(0));
                    let cond = self.module.ast.add_expr(
                        ExprKind::Compare {
                            left: subject,
                            ops: vec![CmpOperator::Is],
                            comparators: vec![expected],
                            native_ops: Vec::new(),
                        },
                        Span::point(0),
                    );
                    let jump = self.emit(Inst::CondJump {
                        cond,
                        then_jmp: 0,
                        else_jmp: 0,
                    });
                    let then_jmp = self.ic();
                    self.lower_body(&case.body, depth);
                    exits.push(self.emit(Inst::Jump { dest: usize::MAX }));
                    let next = self.ic();
                    self.patch_cond(jump, then_jmp, next);
                }
                PatKind::MatchAs { pattern: None, name } => {
                    if let Some(name) = name {
                        // Capture: bind the subject, then run the body.
                        let target = self.module.ast.add_expr(
                            ExprKind::Name {
                                id: name,
                                ctx: ExprContext::Store,
                                store_id: None,
                                load_id: None,
                            },
                            Span::point(0),
                        );
                        let bind = self.module.ast.add_stmt(
                            StmtKind::Assign {
                                targets: vec![target],
                                value: subject,
                            },
                            Span::point(0),
                        );
                        self.emit(Inst::Stmt(bind));
                    }
                    self.lower_body(&case.body, depth);
                    exits.push(self.emit(Inst::Jump { dest: usize::MAX }));
                    // A wildcard matches everything; later cases are
                    // unreachable but still lowered for inspection.
                }
                _ => unreachable!("guarded by all_simple"),
            }
        }

        let end = self.ic();
        for exit in exits {
            self.patch_jump(exit, end);
        }
    }

    // ── Patching ───────────────────────────────────────────────────────

    fn patch_jump(&mut self, index: usize, dest: usize) {
        if let Inst::Jump { dest: slot } = &mut self.program[index] {
            *slot = dest;
        }
    }

    fn patch_cond(&mut self, index: usize, then_jmp: usize, else_jmp: usize) {
        if let Inst::CondJump {
            then_jmp: then_slot,
            else_jmp: else_slot,
            ..
        } = &mut self.program[index]
        {
            *then_slot = then_jmp;
            *else_slot = else_jmp;
        }
    }
}
