//! Shared vocabulary of the Kiwi compiler.
//!
//! Every stage of the pipeline (lexer, parser, sema, evaluator, VM) speaks
//! in terms of the types defined here: byte-offset [`span::Span`]s, value
//! typed [`token::Token`]s, the operator table in [`op`], arena node ids in
//! [`node`], and the runtime [`value::Value`].

pub mod node;
pub mod op;
pub mod span;
pub mod token;
pub mod value;

/// The indentation unit, in spaces. One block level is exactly this many
/// leading spaces; tabs are not normalized.
pub const KIWI_INDENT: usize = 4;
