//! Precomputed trie over the operator glyphs.
//!
//! Built once from the operator table; the lexer walks it greedily so the
//! longest glyph with a precedence entry wins (`**=` over `**` over `*`).
//! Word operators (`and`, `is not`, ...) never enter the trie; they are
//! recategorized after identifier lexing.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use kiwi_common::op::operator_table;

/// One trie node. A node carries the full glyph when the path from the root
/// spells an operator in the table.
#[derive(Debug, Default)]
pub struct TrieNode {
    children: FxHashMap<char, TrieNode>,
    glyph: Option<&'static str>,
}

impl TrieNode {
    pub fn child(&self, c: char) -> Option<&TrieNode> {
        self.children.get(&c)
    }

    pub fn glyph(&self) -> Option<&'static str> {
        self.glyph
    }

    fn insert(&mut self, glyph: &'static str) {
        let mut node = self;
        for c in glyph.chars() {
            node = node.children.entry(c).or_default();
        }
        node.glyph = Some(glyph);
    }
}

/// The shared operator trie, rooted at a synthetic empty node.
pub fn op_trie() -> &'static TrieNode {
    static TRIE: OnceLock<TrieNode> = OnceLock::new();
    TRIE.get_or_init(|| {
        let mut root = TrieNode::default();
        for glyph in operator_table().keys() {
            // Word operators lex as identifiers first.
            if glyph.chars().next().is_some_and(|c| c.is_alphabetic()) {
                continue;
            }
            root.insert(glyph);
        }
        root
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_to_longest_glyph() {
        let trie = op_trie();
        let star = trie.child('*').unwrap();
        assert_eq!(star.glyph(), Some("*"));
        let pow = star.child('*').unwrap();
        assert_eq!(pow.glyph(), Some("**"));
        let pow_assign = pow.child('=').unwrap();
        assert_eq!(pow_assign.glyph(), Some("**="));
    }

    #[test]
    fn word_operators_are_excluded() {
        assert!(op_trie().child('a').is_none(), "`and` must not be in the trie");
        assert!(op_trie().child('i').is_none(), "`is` must not be in the trie");
    }

    #[test]
    fn every_prefix_of_a_glyph_is_reachable() {
        let trie = op_trie();
        for glyph in operator_table().keys() {
            if glyph.chars().next().is_some_and(|c| c.is_alphabetic()) {
                continue;
            }
            let mut node = trie;
            for c in glyph.chars() {
                node = node.child(c).unwrap_or_else(|| panic!("missing path for {glyph}"));
            }
            assert_eq!(node.glyph(), Some(*glyph));
        }
    }
}
