//! Structural operations over the AST: equality, pretty printing,
//! attribute lookup, cycle detection, and context rewriting.

pub mod attribute;
pub mod circle;
pub mod context;
pub mod equality;
pub mod print;

pub use attribute::{getattr, hasattr};
pub use circle::has_circle;
pub use context::set_context;
pub use equality::{expr_equal, module_equal, pat_equal, stmt_equal};
pub use print::{expr_to_string, print_module, stmt_to_string};
