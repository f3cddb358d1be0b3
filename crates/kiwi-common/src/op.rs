use std::fmt;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::token::TokenKind;

/// Binary operator kinds carried by `BinOp` and `AugAssign` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

/// Unary operator kinds carried by `UnaryOp` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOperator {
    UAdd,
    USub,
    Not,
    Invert,
}

/// Boolean operator kinds carried by `BoolOp` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BoolOperator {
    And,
    Or,
}

/// Comparison operator kinds carried by `Compare` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mult => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitAnd => "&",
        })
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::UAdd => "+",
            UnaryOperator::USub => "-",
            UnaryOperator::Not => "not",
            UnaryOperator::Invert => "~",
        })
    }
}

impl fmt::Display for BoolOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoolOperator::And => "and",
            BoolOperator::Or => "or",
        })
    }
}

impl fmt::Display for CmpOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOperator::Eq => "==",
            CmpOperator::NotEq => "!=",
            CmpOperator::Lt => "<",
            CmpOperator::LtE => "<=",
            CmpOperator::Gt => ">",
            CmpOperator::GtE => ">=",
            CmpOperator::Is => "is",
            CmpOperator::IsNot => "is not",
            CmpOperator::In => "in",
            CmpOperator::NotIn => "not in",
        })
    }
}

impl BinaryOperator {
    /// Magic method used as the fallback when no native handler matches.
    /// `reflected` selects the right-hand form (`__radd__` vs `__add__`).
    pub fn magic_name(self, reflected: bool) -> &'static str {
        match (self, reflected) {
            (BinaryOperator::Add, false) => "__add__",
            (BinaryOperator::Add, true) => "__radd__",
            (BinaryOperator::Sub, false) => "__sub__",
            (BinaryOperator::Sub, true) => "__rsub__",
            (BinaryOperator::Mult, false) => "__mul__",
            (BinaryOperator::Mult, true) => "__rmul__",
            (BinaryOperator::Div, false) => "__truediv__",
            (BinaryOperator::Div, true) => "__rtruediv__",
            (BinaryOperator::FloorDiv, false) => "__floordiv__",
            (BinaryOperator::FloorDiv, true) => "__rfloordiv__",
            (BinaryOperator::Mod, false) => "__mod__",
            (BinaryOperator::Mod, true) => "__rmod__",
            (BinaryOperator::Pow, false) => "__pow__",
            (BinaryOperator::Pow, true) => "__rpow__",
            (BinaryOperator::LShift, false) => "__lshift__",
            (BinaryOperator::LShift, true) => "__rlshift__",
            (BinaryOperator::RShift, false) => "__rshift__",
            (BinaryOperator::RShift, true) => "__rrshift__",
            (BinaryOperator::BitOr, false) => "__or__",
            (BinaryOperator::BitOr, true) => "__ror__",
            (BinaryOperator::BitXor, false) => "__xor__",
            (BinaryOperator::BitXor, true) => "__rxor__",
            (BinaryOperator::BitAnd, false) => "__and__",
            (BinaryOperator::BitAnd, true) => "__rand__",
        }
    }
}

impl BoolOperator {
    pub fn magic_name(self, reflected: bool) -> &'static str {
        match (self, reflected) {
            (BoolOperator::And, false) => "__and__",
            (BoolOperator::And, true) => "__rand__",
            (BoolOperator::Or, false) => "__or__",
            (BoolOperator::Or, true) => "__ror__",
        }
    }
}

/// One row of the operator table.
///
/// The same table drives both the lexer (which `TokenKind` to emit for a
/// glyph) and the parser (precedence climbing and which AST node to build).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpConfig {
    pub precedence: i32,
    pub left_associative: bool,
    pub token: TokenKind,
    pub binary: Option<BinaryOperator>,
    pub unary: Option<UnaryOperator>,
    pub boolean: Option<BoolOperator>,
    pub cmp: Option<CmpOperator>,
}

impl OpConfig {
    const fn new(precedence: i32, left_associative: bool, token: TokenKind) -> Self {
        Self {
            precedence,
            left_associative,
            token,
            binary: None,
            unary: None,
            boolean: None,
            cmp: None,
        }
    }

    const fn binary(mut self, op: BinaryOperator) -> Self {
        self.binary = Some(op);
        self
    }

    const fn unary(mut self, op: UnaryOperator) -> Self {
        self.unary = Some(op);
        self
    }

    const fn boolean(mut self, op: BoolOperator) -> Self {
        self.boolean = Some(op);
        self
    }

    const fn cmp(mut self, op: CmpOperator) -> Self {
        self.cmp = Some(op);
        self
    }

    /// Whether this entry can appear in infix position.
    pub fn is_binary_family(&self) -> bool {
        self.binary.is_some() || self.boolean.is_some() || self.cmp.is_some()
    }
}

/// The operator table, fixed at compile time.
///
/// Arithmetic sits at 20-40 with `**` right-associative at 40, comparisons,
/// bitwise, and boolean operators at 40, augmented assignment and `=` at 50,
/// `->`/`:=`/`:` at 10, and `.` binds tightest at 60.
pub fn operator_table() -> &'static FxHashMap<&'static str, OpConfig> {
    use BinaryOperator as B;
    use BoolOperator as L;
    use CmpOperator as C;
    use TokenKind as T;
    use UnaryOperator as U;

    static TABLE: OnceLock<FxHashMap<&'static str, OpConfig>> = OnceLock::new();
    TABLE.get_or_init(|| {
        FxHashMap::from_iter([
            // Arithmetic
            ("+", OpConfig::new(20, true, T::Operator).binary(B::Add).unary(U::UAdd)),
            ("-", OpConfig::new(20, true, T::Operator).binary(B::Sub).unary(U::USub)),
            ("*", OpConfig::new(30, true, T::Operator).binary(B::Mult)),
            ("/", OpConfig::new(30, true, T::Operator).binary(B::Div)),
            ("//", OpConfig::new(30, true, T::Operator).binary(B::FloorDiv)),
            ("%", OpConfig::new(30, true, T::Operator).binary(B::Mod)),
            ("**", OpConfig::new(40, false, T::Operator).binary(B::Pow)),
            // Augmented assignment
            ("+=", OpConfig::new(50, true, T::AugAssign).binary(B::Add)),
            ("-=", OpConfig::new(50, true, T::AugAssign).binary(B::Sub)),
            ("*=", OpConfig::new(50, true, T::AugAssign).binary(B::Mult)),
            ("/=", OpConfig::new(50, true, T::AugAssign).binary(B::Div)),
            ("//=", OpConfig::new(50, true, T::AugAssign).binary(B::FloorDiv)),
            ("%=", OpConfig::new(50, true, T::AugAssign).binary(B::Mod)),
            ("**=", OpConfig::new(50, true, T::AugAssign).binary(B::Pow)),
            // Assignment
            ("=", OpConfig::new(50, true, T::Assign)),
            // Bitwise
            ("~", OpConfig::new(40, false, T::Operator).unary(U::Invert)),
            ("<<", OpConfig::new(40, false, T::Operator).binary(B::LShift)),
            (">>", OpConfig::new(40, false, T::Operator).binary(B::RShift)),
            ("^", OpConfig::new(40, false, T::Operator).binary(B::BitXor)),
            ("&", OpConfig::new(40, true, T::Operator).binary(B::BitAnd)),
            ("|", OpConfig::new(40, true, T::Operator).binary(B::BitOr)),
            // Boolean
            ("and", OpConfig::new(40, true, T::Operator).boolean(L::And)),
            ("or", OpConfig::new(40, true, T::Operator).boolean(L::Or)),
            ("!", OpConfig::new(40, true, T::Operator).unary(U::Not)),
            ("not", OpConfig::new(40, true, T::Operator).unary(U::Not)),
            // Comparison
            ("==", OpConfig::new(40, true, T::Operator).cmp(C::Eq)),
            ("!=", OpConfig::new(40, true, T::Operator).cmp(C::NotEq)),
            ("<", OpConfig::new(40, true, T::Operator).cmp(C::Lt)),
            ("<=", OpConfig::new(40, true, T::Operator).cmp(C::LtE)),
            (">", OpConfig::new(40, true, T::Operator).cmp(C::Gt)),
            (">=", OpConfig::new(40, true, T::Operator).cmp(C::GtE)),
            // Membership
            ("in", OpConfig::new(40, false, T::In).cmp(C::In)),
            ("not in", OpConfig::new(40, false, T::In).cmp(C::NotIn)),
            // Identity
            ("is", OpConfig::new(40, false, T::Operator).cmp(C::Is)),
            ("is not", OpConfig::new(40, false, T::Operator).cmp(C::IsNot)),
            // Not operators, but parsed through the same table
            ("->", OpConfig::new(10, false, T::Arrow)),
            (":=", OpConfig::new(10, false, T::Walrus)),
            (":", OpConfig::new(10, false, T::Colon)),
            // Attribute access
            (".", OpConfig::new(60, true, T::Dot)),
        ])
    })
}

/// Look up an operator's table entry by its spelling.
pub fn lookup(op: &str) -> Option<&'static OpConfig> {
    operator_table().get(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_is_right_associative() {
        let conf = lookup("**").unwrap();
        assert_eq!(conf.precedence, 40);
        assert!(!conf.left_associative);
    }

    #[test]
    fn dot_binds_tightest() {
        let dot = lookup(".").unwrap().precedence;
        for (glyph, conf) in operator_table() {
            if *glyph != "." {
                assert!(conf.precedence < dot, "{glyph} must bind looser than `.`");
            }
        }
    }

    #[test]
    fn lexer_and_parser_share_one_table() {
        // The membership operators carry their dedicated token kind and a
        // comparison kind; the two views never disagree.
        let inn = lookup("in").unwrap();
        assert_eq!(inn.token, TokenKind::In);
        assert_eq!(inn.cmp, Some(CmpOperator::In));
        assert_eq!(lookup("not in").unwrap().cmp, Some(CmpOperator::NotIn));
    }

    #[test]
    fn word_operators_resolve() {
        assert_eq!(lookup("and").unwrap().boolean, Some(BoolOperator::And));
        assert_eq!(lookup("is not").unwrap().cmp, Some(CmpOperator::IsNot));
        assert_eq!(lookup("not").unwrap().unary, Some(UnaryOperator::Not));
    }
}
