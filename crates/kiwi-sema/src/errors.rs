//! Semantic errors.
//!
//! Collected into a list during analysis; sema never bails out, so one
//! pass reports as much as it can. Messages follow the interpreter
//! tradition (`NameError: name 'x' is not defined`) so REPL output and
//! tests read naturally; the CLI renders the same values through ariadne.

use std::fmt;

use kiwi_common::span::Span;

/// Any error the semantic analyzer can emit. All variants are non-fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum SemaError {
    /// Reference to an undefined identifier.
    NameError { name: String, span: Span },

    /// Structural type mismatch. The sides are pre-rendered type
    /// expressions; the optional values are the offending source
    /// expressions.
    TypeError {
        message: String,
        lhs_t: Option<String>,
        rhs_t: Option<String>,
        span: Span,
    },

    /// A class has no such member.
    AttributeError {
        class: String,
        attr: String,
        span: Span,
    },

    /// No native handler and no magic method for an operator on these
    /// operand types.
    UnsupportedOperand {
        op: String,
        lhs_t: String,
        rhs_t: Option<String>,
        span: Span,
    },

    /// `import x` where no module source is available.
    ModuleNotFoundError { module: String, span: Span },

    /// `from m import x` where `m` has no `x`.
    ImportError {
        module: String,
        name: String,
        span: Span,
    },

    /// A definition that consumes itself while still being defined.
    RecursiveDefinition { name: String, span: Span },
}

impl SemaError {
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        SemaError::TypeError {
            message: message.into(),
            lhs_t: None,
            rhs_t: None,
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SemaError::NameError { span, .. }
            | SemaError::TypeError { span, .. }
            | SemaError::AttributeError { span, .. }
            | SemaError::UnsupportedOperand { span, .. }
            | SemaError::ModuleNotFoundError { span, .. }
            | SemaError::ImportError { span, .. }
            | SemaError::RecursiveDefinition { span, .. } => *span,
        }
    }

    /// Stable diagnostic code for rendering.
    pub fn code(&self) -> &'static str {
        match self {
            SemaError::NameError { .. } => "E0001",
            SemaError::TypeError { .. } => "E0002",
            SemaError::AttributeError { .. } => "E0003",
            SemaError::UnsupportedOperand { .. } => "E0004",
            SemaError::ModuleNotFoundError { .. } => "E0005",
            SemaError::ImportError { .. } => "E0006",
            SemaError::RecursiveDefinition { .. } => "E0007",
        }
    }
}

impl fmt::Display for SemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemaError::NameError { name, .. } => {
                write!(f, "NameError: name '{name}' is not defined")
            }
            SemaError::TypeError { message, .. } => write!(f, "TypeError: {message}"),
            SemaError::AttributeError { class, attr, .. } => {
                write!(f, "AttributeError: '{class}' object has no attribute '{attr}'")
            }
            SemaError::UnsupportedOperand {
                op, lhs_t, rhs_t, ..
            } => match rhs_t {
                Some(rhs_t) => write!(
                    f,
                    "TypeError: unsupported operand type(s) for {op}: '{lhs_t}' and '{rhs_t}'"
                ),
                None => write!(
                    f,
                    "TypeError: bad operand type for unary {op}: '{lhs_t}'"
                ),
            },
            SemaError::ModuleNotFoundError { module, .. } => {
                write!(f, "ModuleNotFoundError: No module named '{module}'")
            }
            SemaError::ImportError { module, name, .. } => {
                write!(f, "ImportError: cannot import name '{name}' from '{module}'")
            }
            SemaError::RecursiveDefinition { name, .. } => {
                write!(f, "RecursiveDefinition: '{name}' is defined in terms of itself")
            }
        }
    }
}

impl std::error::Error for SemaError {}
