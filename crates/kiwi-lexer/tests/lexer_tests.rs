//! Integration tests for the Kiwi lexer: layout, round-tripping, and the
//! debug token form.

use kiwi_common::token::TokenKind;
use kiwi_lexer::buffer::{Buffer, FileBuffer, InteractiveBuffer, StringBuffer};
use kiwi_lexer::unlex::{debug_tokens, unlex};
use kiwi_lexer::Lexer;

#[test]
fn lex_round_trip_program() {
    let src = "def main():\n    x = 0\n    while x < 3:\n        x = x + 1\n    return x\n";
    let tokens = Lexer::tokenize(src);
    assert_eq!(unlex(&tokens), src);
}

#[test]
fn lex_round_trip_class() {
    let src = "class Point:\n    x: f64 = 1.5\n    def norm(self):\n        return self.x\n";
    let tokens = Lexer::tokenize(src);
    assert_eq!(unlex(&tokens), src);
}

#[test]
fn lex_round_trip_operators() {
    let src = "a = b ** c // d % e\nif a is not b and c not in d:\n    pass\n";
    let tokens = Lexer::tokenize(src);
    assert_eq!(unlex(&tokens), src);
}

#[test]
fn debug_form_snapshot() {
    let src = "x = 1";
    let out = debug_tokens(&Lexer::tokenize(src), src);
    insta::assert_snapshot!(out, @r"
    Ident              [l:1 c:1] x
    Assign             [l:1 c:3] =
    Int                [l:1 c:5] 1
    Eof                [l:1 c:6]
    ");
}

#[test]
fn dedent_runs_emit_one_token_per_level() {
    let src = "if a:\n    if b:\n        c\nd\n";
    let tokens = Lexer::tokenize(src);
    let dedents = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Dedent)
        .count();
    assert_eq!(dedents, 2);
}

#[test]
fn string_and_file_buffers_agree() {
    let src = "a = \"hi\"\n";
    let dir = std::env::temp_dir().join("kiwi-lexer-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("input.kw");
    std::fs::write(&path, src).unwrap();

    let from_string: Vec<_> = Lexer::tokenize(src);
    let from_file: Vec<_> = Lexer::new(FileBuffer::open(&path).unwrap()).collect();
    assert_eq!(from_string, from_file);
}

#[test]
fn interactive_buffer_lexes_across_lines() {
    let input = b"a = 1\nb = 2\n" as &[u8];
    let buf = InteractiveBuffer::new(input);
    let tokens: Vec<_> = Lexer::new(buf).collect();
    let idents = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Ident)
        .count();
    assert_eq!(idents, 2);
    assert!(tokens.last().unwrap().is_eof());
}

#[test]
fn buffer_end_is_checked_not_assumed() {
    let mut buf = StringBuffer::new("");
    assert_eq!(buf.peek(), None);
    assert_eq!(buf.advance(), None);
    let tokens = Lexer::tokenize("");
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_eof());
}
