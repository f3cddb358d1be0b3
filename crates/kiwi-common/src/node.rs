use serde::Serialize;

/// Index of an expression node in a module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExprId(pub u32);

/// Index of a statement node in a module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StmtId(pub u32);

/// Index of a pattern node in a module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PatId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl StmtId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl PatId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A reference to any node, used for diagnostic parent links.
///
/// Parent links are never ownership: children are owned by the arena and the
/// back-pointer only serves error reporting (finding the enclosing statement
/// of an offending expression).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Expr(ExprId),
    Stmt(StmtId),
    Pat(PatId),
}

/// Which family a node kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeFamily {
    Module,
    Statement,
    Expression,
    Pattern,
    Vm,
}
