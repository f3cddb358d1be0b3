//! The Kiwi VM: a flat instruction tape with an integer instruction
//! counter.
//!
//! Control flow is flattened into unconditional and conditional jumps;
//! calls are jumps with a return-address register; `raise` trampolines
//! into a per-`try` handler table. Leaf statements and the expressions
//! inside them still evaluate through the tree evaluator, which keeps the
//! tape small, inspectable, and exactly as observable as the tree-walked
//! semantics.

pub mod compile;
pub mod exec;

pub use compile::{compile, Inst, Label, Program, TryBlock};
pub use exec::VmExec;
