//! Token stream debug printing and source reconstruction.
//!
//! `debug_tokens` renders one `<kind> [l:line c:col] <lexeme>` row per
//! token. `unlex` concatenates the stream back into source text,
//! re-synthesizing newlines and indentation from the layout tokens; the
//! result equals the input modulo normalized whitespace.

use kiwi_common::span::LineIndex;
use kiwi_common::token::{Token, TokenKind};
use kiwi_common::KIWI_INDENT;

/// Render the debug form of a token stream.
pub fn debug_tokens(tokens: &[Token], source: &str) -> String {
    let index = LineIndex::new(source);
    let mut out = String::new();
    for tok in tokens {
        let (line, col) = index.line_col(tok.span.start);
        let row = format!(
            "{:<18} [l:{} c:{}] {}",
            format!("{:?}", tok.kind),
            line,
            col,
            tok.text
        );
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

/// Reconstruct source text from a token stream.
pub fn unlex(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut level: usize = 0;
    let mut at_line_start = true;
    let mut prev: Option<TokenKind> = None;

    for tok in tokens {
        match tok.kind {
            TokenKind::Newline => {
                out.push('\n');
                at_line_start = true;
                prev = None;
                continue;
            }
            TokenKind::Indent => {
                level += 1;
                continue;
            }
            TokenKind::Dedent => {
                level = level.saturating_sub(1);
                continue;
            }
            TokenKind::Eof => break,
            _ => {}
        }

        if at_line_start {
            out.push_str(&" ".repeat(level * KIWI_INDENT));
            at_line_start = false;
        } else if needs_space(prev, tok.kind) {
            out.push(' ');
        }

        out.push_str(&render(tok));
        prev = Some(tok.kind);
    }
    out
}

/// Whether a space goes between the previous token and this one.
fn needs_space(prev: Option<TokenKind>, kind: TokenKind) -> bool {
    use TokenKind::*;

    let Some(prev) = prev else {
        return false;
    };

    // Nothing inside f-strings gets synthetic spacing.
    if matches!(
        kind,
        FStringText | FStringExprStart | FStringExprEnd | FStringConversion | FStringFormatSpec
            | FStringEnd
    ) || matches!(
        prev,
        FStringStart | FStringText | FStringExprStart | FStringConversion | FStringFormatSpec
    ) {
        return false;
    }

    // No space after opening delimiters, attribute dots, or decorator `@`.
    if matches!(prev, LParen | LBracket | LBrace | Dot | At) {
        return false;
    }

    // No space before closing delimiters and tight punctuation.
    if matches!(kind, RParen | RBracket | RBrace | Comma | Colon | Semicolon | Dot) {
        return false;
    }

    // Calls and subscripts attach to the expression before them.
    if matches!(kind, LParen | LBracket)
        && matches!(prev, Ident | RParen | RBracket | Str | RawStr | Bytes | FStringEnd)
    {
        return false;
    }

    true
}

/// The source spelling of one token.
fn render(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Str => format!("\"{}\"", tok.text),
        TokenKind::Docstring => format!("\"\"\"{}\"\"\"", tok.text),
        TokenKind::RawStr => format!("r\"{}\"", tok.text),
        TokenKind::Bytes => format!("b\"{}\"", tok.text),
        TokenKind::FStringConversion => format!("!{}", tok.text),
        TokenKind::FStringFormatSpec => format!(":{}", tok.text),
        TokenKind::Comment => format!("# {}", tok.text),
        _ => tok.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lexer;

    #[test]
    fn unlex_round_trips_a_function() {
        let src = "def f(a, b):\n    x = a + b\n    return x\n";
        assert_eq!(unlex(&Lexer::tokenize(src)), src);
    }

    #[test]
    fn unlex_round_trips_nested_blocks() {
        let src = "while x < 3:\n    if y:\n        x = x + 1\n";
        assert_eq!(unlex(&Lexer::tokenize(src)), src);
    }

    #[test]
    fn unlex_restores_fstrings() {
        let src = "x = f\"a{b}c\"\n";
        assert_eq!(unlex(&Lexer::tokenize(src)), src);
    }

    #[test]
    fn debug_form_lists_kind_position_lexeme() {
        let tokens = Lexer::tokenize("x = 1");
        let out = debug_tokens(&tokens, "x = 1");
        let mut lines = out.lines();
        assert!(lines.next().unwrap().contains("[l:1 c:1] x"));
        assert!(lines.next().unwrap().contains("[l:1 c:3] ="));
        assert!(lines.next().unwrap().contains("[l:1 c:5] 1"));
    }
}
