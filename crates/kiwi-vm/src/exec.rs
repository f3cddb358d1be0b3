//! The tape executor.
//!
//! Fetch the instruction at `ic`, dispatch, repeat: the default step
//! increments `ic` by one, `Jump` overwrites it, `CondJump` evaluates its
//! condition through the tree evaluator and picks a side, `Return` pops a
//! frame and restores `ic` from the return-address register, and a raised
//! exception trampolines into the innermost matching handler table entry.
//! Unhandled exceptions unwind frames until the program ends.

use kiwi_common::node::StmtId;
use kiwi_common::value::Value;

use kiwi_eval::TreeEvaluator;
use kiwi_parser::ast::{Module, StmtKind};
use kiwi_sema::SemanticAnalyser;

use crate::compile::{Inst, Program};

/// Named registers of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    ReturnAddress,
    ReturnValue,
}

const REGISTER_COUNT: usize = 2;

/// One in-flight tape call.
#[derive(Debug)]
struct Frame {
    /// Instruction to resume at after the callee returns; `usize::MAX`
    /// marks the synthetic frame a host-initiated call runs under.
    return_ic: usize,
    /// Evaluator scope watermark to unwind to. The module entry frame has
    /// none: toplevel assignments are globals and outlive the entry run.
    scope: Option<usize>,
}

/// The VM executor. Wraps a tree evaluator for leaf statements and
/// expressions; owns the instruction counter, registers, and frame stack.
pub struct VmExec<'m> {
    pub evaluator: TreeEvaluator<'m>,
    ic: usize,
    registers: Vec<Value>,
    frames: Vec<Frame>,
}

impl<'m> VmExec<'m> {
    pub fn new(module: &'m Module, sema: &SemanticAnalyser) -> Self {
        Self {
            evaluator: TreeEvaluator::new(module, sema),
            ic: 0,
            registers: vec![Value::None; REGISTER_COUNT],
            frames: Vec::new(),
        }
    }

    pub fn register(&self, register: Register) -> &Value {
        &self.registers[register as usize]
    }

    fn set_register(&mut self, register: Register, value: Value) {
        self.registers[register as usize] = value;
    }

    /// Run the program from `entry` until the entry frame returns or the
    /// tape ends. Returns the final value or the unhandled exception.
    pub fn execute(
        &mut self,
        module: &'m Module,
        program: &Program,
        entry: usize,
    ) -> Result<Value, Value> {
        self.ic = entry;
        self.frames.push(Frame {
            return_ic: usize::MAX,
            scope: None,
        });
        self.run_frames(module, program)
    }

    /// Call a labeled function on the tape and run it to completion.
    pub fn call_label(
        &mut self,
        module: &'m Module,
        program: &Program,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Value> {
        let Some(entry) = program.find_label(name) else {
            return Err(Value::Str(format!(
                "NameError: no label named '{name}' in the program"
            )));
        };

        // Bind parameters in a fresh scope.
        let scope = self.evaluator.open_scope();
        if let Some(def) = program.label_stmt(name) {
            self.bind_parameters(module, def, &args);
        }
        // Native entries read their arguments from the value register.
        self.set_register(Register::ReturnValue, Value::tuple(args));

        self.ic = entry;
        self.frames.push(Frame {
            return_ic: usize::MAX,
            scope: Some(scope),
        });
        self.run_frames(module, program)
    }

    /// Run until the frame pushed by the caller pops.
    fn run_frames(&mut self, module: &'m Module, program: &Program) -> Result<Value, Value> {
        let floor = self.frames.len() - 1;
        loop {
            if self.ic >= program.instructions.len() || self.frames.len() <= floor {
                break;
            }

            match &program.instructions[self.ic] {
                Inst::Jump { dest } => self.ic = *dest,

                Inst::CondJump {
                    cond,
                    then_jmp,
                    else_jmp,
                } => {
                    let outcome = self.evaluator.exec_expr(*cond, 0);
                    if self.evaluator.has_exceptions() {
                        self.dispatch_exception(program)?;
                        continue;
                    }
                    self.ic = if outcome.is_truthy() {
                        *then_jmp
                    } else {
                        *else_jmp
                    };
                }

                Inst::Native(f) => {
                    let args = match self.register(Register::ReturnValue) {
                        Value::Tuple(items) => items.as_ref().clone(),
                        _ => Vec::new(),
                    };
                    let out = f(&args);
                    self.set_register(Register::ReturnValue, out);
                    if self.pop_frame() || self.frames.len() <= floor {
                        break;
                    }
                }

                Inst::Stmt(stmt) => {
                    let stmt = *stmt;
                    if self.is_return(module, stmt) {
                        let value = self.eval_return_value(module, stmt);
                        if self.evaluator.has_exceptions() {
                            self.dispatch_exception(program)?;
                            continue;
                        }
                        self.set_register(Register::ReturnValue, value);
                        if self.pop_frame() || self.frames.len() <= floor {
                            break;
                        }
                        continue;
                    }

                    self.evaluator.exec_stmt(stmt, 0);
                    if self.evaluator.has_exceptions() {
                        self.dispatch_exception(program)?;
                        continue;
                    }
                    if let Some(value) = self.evaluator.take_return() {
                        self.set_register(Register::ReturnValue, value);
                        if self.pop_frame() || self.frames.len() <= floor {
                            break;
                        }
                        continue;
                    }
                    self.ic += 1;
                }
            }
        }

        Ok(self.register(Register::ReturnValue).clone())
    }

    fn bind_parameters(&mut self, module: &Module, def: StmtId, args: &[Value]) {
        if let StmtKind::FunctionDef { args: params, .. } = &module.ast.stmt(def).kind {
            for (param, value) in params.positional().zip(args.iter().cloned()) {
                self.evaluator.define(&param.arg, value);
            }
        }
    }

    fn is_return(&self, module: &Module, stmt: StmtId) -> bool {
        matches!(module.ast.stmt(stmt).kind, StmtKind::Return { .. })
    }

    fn eval_return_value(&mut self, module: &Module, stmt: StmtId) -> Value {
        match &module.ast.stmt(stmt).kind {
            StmtKind::Return { value: Some(value) } => self.evaluator.exec_expr(*value, 0),
            _ => Value::None,
        }
    }

    /// Pop the current frame; restore `ic` from the saved return address.
    /// Returns true when the popped frame was host-initiated (stop).
    fn pop_frame(&mut self) -> bool {
        let Some(frame) = self.frames.pop() else {
            return true;
        };
        if let Some(scope) = frame.scope {
            self.evaluator.close_scope(scope);
        }
        if frame.return_ic == usize::MAX {
            return true;
        }
        self.ic = frame.return_ic;
        self.set_register(Register::ReturnAddress, Value::I64(frame.return_ic as i64));
        false
    }

    /// The exception trampoline: find the innermost `try` region covering
    /// `ic`, pick the first matching handler, bind the capture, and jump.
    /// A region whose handlers do not match still runs its `finally`
    /// instructions on the way out; with no matching region anywhere the
    /// exception unwinds out of the program.
    fn dispatch_exception(&mut self, program: &Program) -> Result<(), Value> {
        let mut exception = match self.evaluator.exceptions.pop() {
            Some(exc) => exc,
            None => return Ok(()),
        };

        let mut search_ic = self.ic;
        loop {
            let block = program
                .try_block_at(search_ic)
                .map(|b| (b.handlers.clone(), b.finally_index, b.end));
            let Some((handlers, finally_index, end)) = block else {
                // No handler anywhere on the tape: unwind every frame.
                while !self.frames.is_empty() {
                    self.pop_frame();
                }
                return Err(exception);
            };

            for handler in &handlers {
                if self
                    .evaluator
                    .handler_matches(handler.ty, &exception, 0)
                {
                    if let Some(name) = &handler.name {
                        self.evaluator.define(name, exception.clone());
                    }
                    log::debug!("exception trampoline -> {}", handler.index);
                    self.ic = handler.index;
                    return Ok(());
                }
            }

            // The region could not handle it; its finally block still runs
            // before the search moves outward. A fresh exception raised in
            // the cleanup replaces the one propagating.
            if let Some(finally) = finally_index {
                log::debug!("unwinding through finally at {finally}");
                self.run_finally_range(program, finally, end);
                if self.evaluator.has_exceptions() {
                    if let Some(replacement) = self.evaluator.exceptions.pop() {
                        exception = replacement;
                    }
                }
            }
            // Probe from this region's last instruction: an enclosing try
            // whose body ends exactly where this region does still covers
            // it, while this region's own body range no longer matches.
            search_ic = end.saturating_sub(1);
        }
    }

    /// Step through the lowered `finally` instructions of an unwinding
    /// `try` region, `[start, end)`. Control flow stays inside the range;
    /// a jump out of it ends the cleanup. A `return` executed here during
    /// unwind is dropped so it cannot pop a frame mid-dispatch.
    fn run_finally_range(&mut self, program: &Program, start: usize, end: usize) {
        let mut cursor = start;
        while cursor < end {
            match &program.instructions[cursor] {
                Inst::Jump { dest } => {
                    if *dest < start || *dest >= end {
                        break;
                    }
                    cursor = *dest;
                }
                Inst::CondJump {
                    cond,
                    then_jmp,
                    else_jmp,
                } => {
                    let outcome = self.evaluator.exec_expr(*cond, 0);
                    if self.evaluator.has_exceptions() {
                        break;
                    }
                    let dest = if outcome.is_truthy() {
                        *then_jmp
                    } else {
                        *else_jmp
                    };
                    if dest < start || dest >= end {
                        break;
                    }
                    cursor = dest;
                }
                Inst::Native(_) => {
                    cursor += 1;
                }
                Inst::Stmt(stmt) => {
                    self.evaluator.exec_stmt(*stmt, 0);
                    if self.evaluator.has_exceptions() {
                        break;
                    }
                    cursor += 1;
                }
            }
        }
        let _ = self.evaluator.take_return();
    }
}
