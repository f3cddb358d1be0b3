//! The symbol table: an ordered, append-only sequence of binding entries.
//!
//! Lookup scans in reverse so the most recent definition wins. An entry's
//! `store_id` is its index at insertion; the difference between the current
//! length and a `store_id` is the de Bruijn offset execution uses to
//! address locals without a name search. Scopes save the length on entry
//! and truncate on exit.

use kiwi_common::node::{ExprId, NodeId};

/// One name in scope.
#[derive(Debug, Clone)]
pub struct BindingEntry {
    pub name: String,
    /// The defining AST node (a `FunctionDef`, `ClassDef`, or the assigned
    /// value), when one exists.
    pub value: Option<NodeId>,
    /// The type expression node for this binding.
    pub ty: Option<ExprId>,
    /// Registry type id (builtin slot or user class id).
    pub type_id: usize,
    /// Index of this entry at the moment it was added.
    pub store_id: usize,
}

/// The scoped symbol table.
#[derive(Debug, Default)]
pub struct Bindings {
    pub entries: Vec<BindingEntry>,
    /// Whether new entries are locals of a nested scope (offset-addressed)
    /// rather than globals (index-addressed).
    pub nested: bool,
    global_count: usize,
}

impl Bindings {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(128),
            nested: false,
            global_count: 0,
        }
    }

    /// Append a binding; returns the index it was inserted at.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: Option<NodeId>,
        ty: Option<ExprId>,
        type_id: usize,
    ) -> usize {
        let store_id = self.entries.len();
        self.entries.push(BindingEntry {
            name: name.into(),
            value,
            ty,
            type_id,
            store_id,
        });
        if !self.nested {
            self.global_count += 1;
        }
        store_id
    }

    /// Most recent entry for `name`, newest definition first.
    pub fn find(&self, name: &str) -> Option<&BindingEntry> {
        self.entries.iter().rev().find(|entry| entry.name == name)
    }

    pub fn get_value(&self, index: usize) -> Option<NodeId> {
        self.entries.get(index).and_then(|entry| entry.value)
    }

    pub fn get_type(&self, index: usize) -> Option<ExprId> {
        self.entries.get(index).and_then(|entry| entry.ty)
    }

    /// Update the recorded type of the newest binding named `name`.
    pub fn set_type(&mut self, name: &str, ty: ExprId) {
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.name == name) {
            entry.ty = Some(ty);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// De Bruijn offset of an entry from the current end of the table.
    pub fn offset(&self, store_id: usize) -> usize {
        self.entries.len() - store_id
    }

    /// Run `f` in a nested lexical scope: entries added inside are dropped
    /// on the way out.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.entries.len();
        let was_nested = self.nested;
        self.nested = true;
        let result = f(self);
        self.nested = was_nested;
        self.entries.truncate(saved);
        result
    }

    /// Formatted table of the current bindings, for `--dump-bindings` and
    /// tests.
    pub fn dump(&self, render_type: impl Fn(ExprId) -> String) -> String {
        let mut out = String::new();
        let sep = format!("{}-+-{}-+-{}", "-".repeat(28), "-".repeat(20), "-".repeat(12));
        out.push_str(&sep);
        out.push('\n');
        out.push_str(&format!("{:>28} | {:>20} | {}\n", "name", "type", "id"));
        out.push_str(&sep);
        out.push('\n');
        for (i, entry) in self.entries.iter().enumerate() {
            let ty = entry
                .ty
                .map(&render_type)
                .unwrap_or_else(|| "?".to_string());
            out.push_str(&format!("{:>28} | {:>20} | {}\n", entry.name, ty, i));
        }
        out.push_str(&sep);
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_lookup_prefers_newest() {
        let mut bindings = Bindings::new();
        bindings.add("x", None, None, 0);
        let second = bindings.add("x", None, None, 4);
        let entry = bindings.find("x").unwrap();
        assert_eq!(entry.store_id, second);
        assert_eq!(entry.type_id, 4);
    }

    #[test]
    fn scope_truncates_on_exit() {
        let mut bindings = Bindings::new();
        bindings.add("outer", None, None, 0);
        bindings.scoped(|b| {
            b.add("inner", None, None, 0);
            assert!(b.find("inner").is_some());
            assert!(b.find("outer").is_some());
        });
        assert!(bindings.find("inner").is_none());
        assert!(bindings.find("outer").is_some());
    }

    #[test]
    fn de_bruijn_offset_counts_from_the_end() {
        let mut bindings = Bindings::new();
        let a = bindings.add("a", None, None, 0);
        bindings.add("b", None, None, 0);
        bindings.add("c", None, None, 0);
        assert_eq!(bindings.offset(a), 3);
    }

    #[test]
    fn nested_flag_restored_by_scope() {
        let mut bindings = Bindings::new();
        assert!(!bindings.nested);
        bindings.scoped(|b| assert!(b.nested));
        assert!(!bindings.nested);
    }
}
