//! Kiwi parser: token stream to AST.
//!
//! Recursive descent over statements, precedence climbing over
//! expressions, with per-statement error recovery. The produced
//! [`ast::Module`] owns its node arena; diagnostics reference it by id.
//!
//! # Modules
//!
//! - [`ast`]: the arena and the node kind enums
//! - [`visitor`]: uniform family dispatch and child enumeration
//! - [`ops`]: equality, printing, attribute lookup, cycle check, contexts
//! - [`parser`]: the parser itself
//! - [`error`]: [`error::ParseError`]

pub mod ast;
pub mod error;
pub mod ops;
pub mod parser;
pub mod visitor;

use kiwi_lexer::buffer::{Buffer, StringBuffer};
use kiwi_lexer::Lexer;

use ast::Module;
use error::ParseError;

/// Outcome of parsing: the module (always produced; failed statements are
/// `InvalidStatement` nodes) plus collected errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Module,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parse in-memory source text.
pub fn parse(source: &str) -> ParseResult {
    parse_buffer(StringBuffer::new(source))
}

/// Parse from any character source.
pub fn parse_buffer<B: Buffer>(buffer: B) -> ParseResult {
    let lexer = Lexer::new(buffer);
    parser::Parser::new(lexer).parse_module()
}
