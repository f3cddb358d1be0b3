//! Match pattern node kinds.

use kiwi_common::node::{ExprId, PatId};
use kiwi_common::value::Value;

/// Every kind of `match` pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatKind {
    /// A literal pattern compared by equality, e.g. `case 401:`.
    MatchValue { value: ExprId },

    /// `case None:` / `case True:` / `case False:`, compared by identity.
    MatchSingleton { value: Value },

    /// `case [a, b, *rest]:`.
    MatchSequence { patterns: Vec<PatId> },

    /// `case {"k": p, **rest}:`. Keys and patterns are parallel vectors.
    MatchMapping {
        keys: Vec<ExprId>,
        patterns: Vec<PatId>,
        rest: Option<String>,
    },

    /// `case Point(x, y=p):`.
    MatchClass {
        cls: ExprId,
        patterns: Vec<PatId>,
        kwd_attrs: Vec<String>,
        kwd_patterns: Vec<PatId>,
    },

    /// `*name` (or bare `*_`) inside a sequence pattern.
    MatchStar { name: Option<String> },

    /// `case p as name:`; a bare `name` or `_` is a capture with no inner
    /// pattern.
    MatchAs {
        pattern: Option<PatId>,
        name: Option<String>,
    },

    /// `case a | b | c:`.
    MatchOr { patterns: Vec<PatId> },
}

impl PatKind {
    /// Stable name of the kind, for logs and dispatch errors.
    pub fn name(&self) -> &'static str {
        match self {
            PatKind::MatchValue { .. } => "MatchValue",
            PatKind::MatchSingleton { .. } => "MatchSingleton",
            PatKind::MatchSequence { .. } => "MatchSequence",
            PatKind::MatchMapping { .. } => "MatchMapping",
            PatKind::MatchClass { .. } => "MatchClass",
            PatKind::MatchStar { .. } => "MatchStar",
            PatKind::MatchAs { .. } => "MatchAs",
            PatKind::MatchOr { .. } => "MatchOr",
        }
    }
}
