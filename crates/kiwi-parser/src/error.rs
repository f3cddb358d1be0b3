//! Parse errors.
//!
//! A [`ParseError`] records what the parser expected, what it actually
//! received, and the tokens consumed from the offending line (collected by
//! error recovery so diagnostics can echo the source). Errors are values:
//! the parser keeps going after each one.

use std::fmt;

use kiwi_common::span::Span;
use kiwi_common::token::{Token, TokenKind};

/// A syntax error with recovery context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Error class, e.g. `"SyntaxError"`.
    pub kind: &'static str,
    pub message: String,
    /// Token kinds that would have been acceptable here.
    pub expected: Vec<TokenKind>,
    /// The token actually seen.
    pub received: Option<Token>,
    pub span: Span,
    /// Tokens consumed from the failed line, up to the next newline.
    /// Filled during recovery.
    pub tokens: Vec<Token>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: "SyntaxError",
            message: message.into(),
            expected: Vec::new(),
            received: None,
            span,
            tokens: Vec::new(),
        }
    }

    /// A "expected X, got Y" error.
    pub fn expected(expected: Vec<TokenKind>, received: &Token) -> Self {
        let names: Vec<String> = expected.iter().map(|k| format!("{k:?}")).collect();
        let message = format!(
            "expected {}, got {:?}",
            names.join(" or "),
            received.kind
        );
        Self {
            kind: "SyntaxError",
            message,
            expected,
            received: Some(received.clone()),
            span: received.span,
            tokens: Vec::new(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ParseError {}
