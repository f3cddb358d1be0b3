//! Kiwi lexer: indentation-sensitive tokenizer with f-string modes.
//!
//! The lexer is a lazy, cooperative producer: each [`Lexer::next_token`]
//! call reads just enough characters from the [`buffer::Buffer`] to form one
//! token. Layout is encoded as `Indent`/`Dedent`/`Newline` tokens driven by
//! a current/open indentation pair; f-string interiors switch the lexer into
//! a character-by-character mode tracked on a state stack, so `{...}` spans
//! tokenize as ordinary expressions between marker tokens.

pub mod buffer;
pub mod trie;
pub mod unlex;

use std::collections::VecDeque;

use kiwi_common::op;
use kiwi_common::span::Span;
use kiwi_common::token::{keyword_from_str, Token, TokenKind};
use kiwi_common::KIWI_INDENT;

use buffer::{Buffer, StringBuffer};
use trie::op_trie;

/// What the lexer is currently inside of.
///
/// An empty stack is the default mode. String interpolation nests: an
/// f-string interior can contain an expression which contains another
/// f-string, and so on.
#[derive(Debug, Clone, PartialEq)]
enum Mode {
    /// Between the quotes of an f-string, producing text chunks.
    FString { triple: bool },
    /// Inside a `{...}` interpolation, tokenizing normally while tracking
    /// nested braces.
    FStringExpr { brace_depth: u32 },
}

/// The Kiwi lexer.
///
/// Generic over its character source so files, strings, and interactive
/// input lex identically. Exposes a one-token peek buffer and implements
/// `Iterator<Item = Token>` (ending after the `Eof` token).
pub struct Lexer<B: Buffer> {
    buffer: B,
    /// One-token lookahead for `peek_token`.
    peeked: Option<Token>,
    /// Tokens queued before the next read (extra dedents, two-word operator
    /// splits, f-string markers).
    pending: VecDeque<Token>,
    /// Current line's indentation, in spaces.
    cindent: usize,
    /// Open indentation already reported via `Indent` tokens.
    oindent: usize,
    /// Whether the next normal-mode token starts a logical line.
    at_line_start: bool,
    emitted_eof: bool,
    modes: Vec<Mode>,
}

impl Lexer<StringBuffer> {
    /// Convenience constructor over in-memory source.
    pub fn from_source(source: &str) -> Self {
        Lexer::new(StringBuffer::new(source))
    }

    /// Tokenize a whole source string, including the final `Eof`.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::from_source(source).collect()
    }
}

impl<B: Buffer> Lexer<B> {
    pub fn new(buffer: B) -> Self {
        Self {
            buffer,
            peeked: None,
            pending: VecDeque::new(),
            cindent: 0,
            oindent: 0,
            at_line_start: true,
            emitted_eof: false,
            modes: Vec::new(),
        }
    }

    /// Name of the underlying source, for diagnostics.
    pub fn file_name(&self) -> &str {
        self.buffer.file_name()
    }

    /// The text read so far (whole source for file/string buffers).
    pub fn source(&self) -> &str {
        self.buffer.text()
    }

    /// Whether the lexer is currently in character mode (f-string interior).
    pub fn in_fstring(&self) -> bool {
        !self.modes.is_empty()
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.produce()
    }

    /// Look at the next token without consuming it. At most one token is
    /// buffered.
    pub fn peek_token(&mut self) -> &Token {
        if self.peeked.is_none() {
            let tok = self.produce();
            self.peeked = Some(tok);
        }
        self.peeked.as_ref().expect("just filled")
    }

    // ── Dispatch ───────────────────────────────────────────────────────

    fn produce(&mut self) -> Token {
        if let Some(tok) = self.pending.pop_front() {
            return tok;
        }
        match self.modes.last().cloned() {
            Some(Mode::FString { triple }) => self.lex_fstring_content(triple),
            Some(Mode::FStringExpr { .. }) | None => self.lex_normal(),
        }
    }

    fn lex_normal(&mut self) -> Token {
        // Layout runs only at line starts in default mode; interpolation
        // interiors never produce indent tokens.
        if self.at_line_start && self.modes.is_empty() {
            if let Some(tok) = self.lex_layout() {
                return tok;
            }
        }

        self.skip_spaces();
        let start = self.buffer.pos();

        let Some(c) = self.buffer.peek() else {
            return Token::eof(start);
        };

        match c {
            '\n' => {
                self.buffer.advance();
                self.at_line_start = true;
                Token::new(TokenKind::Newline, "\n", Span::new(start, self.buffer.pos()))
            }
            '\r' => {
                self.buffer.advance();
                if self.buffer.peek() == Some('\n') {
                    self.buffer.advance();
                }
                self.at_line_start = true;
                Token::new(TokenKind::Newline, "\n", Span::new(start, self.buffer.pos()))
            }

            '#' => self.lex_comment(start),

            // ── Punctuation ────────────────────────────────────────────
            '(' => self.single(TokenKind::LParen, "(", start),
            ')' => self.single(TokenKind::RParen, ")", start),
            '[' => self.single(TokenKind::LBracket, "[", start),
            ']' => self.single(TokenKind::RBracket, "]", start),
            ',' => self.single(TokenKind::Comma, ",", start),
            ';' => self.single(TokenKind::Semicolon, ";", start),
            '@' => self.single(TokenKind::At, "@", start),
            '{' => self.lex_open_brace(start),
            '}' => self.lex_close_brace(start),

            // ── Interpolation extras ───────────────────────────────────
            '!' if self.in_interpolation()
                && matches!(self.buffer.peek_next(), Some('s' | 'r' | 'a')) =>
            {
                self.lex_conversion(start)
            }
            ':' if self.at_interpolation_top() => self.lex_format_spec(start),

            // ── Literals ───────────────────────────────────────────────
            '"' => self.lex_string(start, None),
            'f' | 'r' | 'b' if self.buffer.peek_next() == Some('"') => {
                self.buffer.advance();
                self.lex_string(start, Some(c))
            }
            '0'..='9' => self.lex_number(start),

            c if is_ident_start(c) => self.lex_ident(start),

            // ── Operators ──────────────────────────────────────────────
            _ => self.lex_operator(start),
        }
    }

    // ── Layout ─────────────────────────────────────────────────────────

    /// Measure leading spaces at a line start and queue `Indent`/`Dedent`
    /// tokens for the level change. Blank and comment-only lines do not
    /// participate in layout.
    fn lex_layout(&mut self) -> Option<Token> {
        let mut spaces = 0usize;
        while self.buffer.peek() == Some(' ') {
            self.buffer.advance();
            spaces += 1;
        }

        match self.buffer.peek() {
            // Blank line or comment-only line: indentation is not compared.
            Some('\n') | Some('\r') | Some('#') | None => return None,
            _ => {}
        }

        self.at_line_start = false;
        self.cindent = (spaces / KIWI_INDENT) * KIWI_INDENT;

        let here = self.buffer.pos();
        while self.cindent > self.oindent {
            self.oindent += KIWI_INDENT;
            self.pending
                .push_back(Token::new(TokenKind::Indent, "", Span::point(here)));
        }
        while self.cindent < self.oindent {
            self.oindent -= KIWI_INDENT;
            self.pending
                .push_back(Token::new(TokenKind::Dedent, "", Span::point(here)));
        }

        self.pending.pop_front()
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn skip_spaces(&mut self) {
        while matches!(self.buffer.peek(), Some(' ') | Some('\t')) {
            self.buffer.advance();
        }
    }

    fn single(&mut self, kind: TokenKind, text: &str, start: u32) -> Token {
        self.buffer.advance();
        self.track_braces(kind);
        Token::new(kind, text, Span::new(start, self.buffer.pos()))
    }

    fn in_interpolation(&self) -> bool {
        matches!(self.modes.last(), Some(Mode::FStringExpr { .. }))
    }

    fn at_interpolation_top(&self) -> bool {
        matches!(self.modes.last(), Some(Mode::FStringExpr { brace_depth: 0 }))
    }

    fn track_braces(&mut self, kind: TokenKind) {
        if let Some(Mode::FStringExpr { brace_depth }) = self.modes.last_mut() {
            match kind {
                TokenKind::LBrace => *brace_depth += 1,
                TokenKind::RBrace => *brace_depth = brace_depth.saturating_sub(1),
                _ => {}
            }
        }
    }

    fn lex_open_brace(&mut self, start: u32) -> Token {
        self.single(TokenKind::LBrace, "{", start)
    }

    fn lex_close_brace(&mut self, start: u32) -> Token {
        if self.at_interpolation_top() {
            self.buffer.advance();
            self.modes.pop();
            return Token::new(
                TokenKind::FStringExprEnd,
                "}",
                Span::new(start, self.buffer.pos()),
            );
        }
        self.single(TokenKind::RBrace, "}", start)
    }

    /// `!r`-style conversion inside an interpolation. Only fires when the
    /// letter directly follows the bang; `a != b` still lexes as `!=`
    /// because `=` is not a conversion letter.
    fn lex_conversion(&mut self, start: u32) -> Token {
        self.buffer.advance(); // !
        let letter = self.buffer.advance().expect("peeked conversion letter");
        Token::new(
            TokenKind::FStringConversion,
            letter.to_string(),
            Span::new(start, self.buffer.pos()),
        )
    }

    /// `:spec` inside an interpolation: everything up to the closing brace
    /// is the format specification.
    fn lex_format_spec(&mut self, start: u32) -> Token {
        self.buffer.advance(); // :
        let mut text = String::new();
        while let Some(c) = self.buffer.peek() {
            if c == '}' || c == '\n' {
                break;
            }
            text.push(c);
            self.buffer.advance();
        }
        Token::new(
            TokenKind::FStringFormatSpec,
            text,
            Span::new(start, self.buffer.pos()),
        )
    }

    // ── Comments ───────────────────────────────────────────────────────

    fn lex_comment(&mut self, start: u32) -> Token {
        self.buffer.advance(); // #
        let mut text = String::new();
        while let Some(c) = self.buffer.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            text.push(c);
            self.buffer.advance();
        }
        Token::new(
            TokenKind::Comment,
            text.strip_prefix(' ').unwrap_or(&text).to_string(),
            Span::new(start, self.buffer.pos()),
        )
    }

    // ── Numbers ────────────────────────────────────────────────────────

    /// Integer or float. A `.` followed by a digit makes a float; an
    /// exponent is recognized with the longest-match rule (`e`/`E`,
    /// optional sign, at least one digit).
    fn lex_number(&mut self, start: u32) -> Token {
        let mut text = String::new();
        let mut kind = TokenKind::Int;

        while let Some(c) = self.buffer.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.buffer.advance();
        }

        if self.buffer.peek() == Some('.')
            && self.buffer.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            kind = TokenKind::Float;
            text.push('.');
            self.buffer.advance();
            while let Some(c) = self.buffer.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                text.push(c);
                self.buffer.advance();
            }
        }

        if matches!(self.buffer.peek(), Some('e' | 'E')) {
            let next = self.buffer.peek_next();
            let signed = matches!(next, Some('+' | '-'));
            if next.is_some_and(|c| c.is_ascii_digit()) || signed {
                kind = TokenKind::Float;
                text.push(self.buffer.advance().expect("exponent marker"));
                if signed {
                    text.push(self.buffer.advance().expect("exponent sign"));
                }
                while let Some(c) = self.buffer.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    text.push(c);
                    self.buffer.advance();
                }
            }
        }

        Token::new(kind, text, Span::new(start, self.buffer.pos()))
    }

    // ── Identifiers, keywords, word operators ──────────────────────────

    fn lex_ident(&mut self, start: u32) -> Token {
        let mut text = String::new();
        while let Some(c) = self.buffer.peek() {
            if !is_ident_continue(c) {
                break;
            }
            text.push(c);
            self.buffer.advance();
        }
        let span = Span::new(start, self.buffer.pos());

        // Operator words. `is` and `not` may combine with the following
        // word; the one-token buffer makes the merge possible without
        // giving up the lazy interface.
        if let Some(conf) = op::lookup(text.as_str()) {
            if text == "is" || text == "not" {
                let next = self.produce();
                let merged = format!("{} {}", text, next.text);
                if op::lookup(merged.as_str()).is_some() {
                    let conf = op::lookup(merged.as_str()).expect("merged operator in table");
                    return Token::new(conf.token, merged, span.merge(next.span));
                }
                self.pending.push_front(next);
            }
            return Token::new(conf.token, text, span);
        }

        if let Some(kind) = keyword_from_str(&text) {
            return Token::new(kind, text, span);
        }

        Token::new(TokenKind::Ident, text, span)
    }

    // ── Strings ────────────────────────────────────────────────────────

    /// Lex a string literal after an optional prefix letter. `f` switches
    /// into f-string mode instead of producing a complete token.
    fn lex_string(&mut self, start: u32, prefix: Option<char>) -> Token {
        self.buffer.advance(); // opening "
        let triple = self.buffer.peek() == Some('"') && self.buffer.peek_next() == Some('"');
        if triple {
            self.buffer.advance();
            self.buffer.advance();
        }

        if prefix == Some('f') {
            self.modes.push(Mode::FString { triple });
            let text = if triple { "f\"\"\"" } else { "f\"" };
            return Token::new(
                TokenKind::FStringStart,
                text,
                Span::new(start, self.buffer.pos()),
            );
        }

        let raw = prefix == Some('r');
        let mut text = String::new();
        loop {
            match self.buffer.peek() {
                None => {
                    return Token::new(
                        TokenKind::Incorrect,
                        text,
                        Span::new(start, self.buffer.pos()),
                    );
                }
                Some('\\') if !raw => {
                    text.push(self.buffer.advance().expect("backslash"));
                    if let Some(escaped) = self.buffer.advance() {
                        text.push(escaped);
                    }
                }
                Some('"') if !triple => {
                    self.buffer.advance();
                    break;
                }
                Some('"') if triple => {
                    if self.buffer.peek_next() == Some('"') {
                        self.buffer.advance();
                        self.buffer.advance();
                        if self.buffer.peek() == Some('"') {
                            self.buffer.advance();
                            break;
                        }
                        text.push('"');
                        text.push('"');
                    } else {
                        text.push('"');
                        self.buffer.advance();
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.buffer.advance();
                }
            }
        }

        let kind = match prefix {
            Some('r') => TokenKind::RawStr,
            Some('b') => TokenKind::Bytes,
            _ if triple => TokenKind::Docstring,
            _ => TokenKind::Str,
        };
        Token::new(kind, text, Span::new(start, self.buffer.pos()))
    }

    /// Character mode between f-string quotes: literal text until an
    /// interpolation opens or the string closes. `{{` and `}}` stay in the
    /// text as written.
    fn lex_fstring_content(&mut self, triple: bool) -> Token {
        let start = self.buffer.pos();
        let mut text = String::new();

        loop {
            match self.buffer.peek() {
                None => {
                    self.modes.pop();
                    return Token::new(
                        TokenKind::Incorrect,
                        text,
                        Span::new(start, self.buffer.pos()),
                    );
                }
                Some('{') if self.buffer.peek_next() == Some('{') => {
                    text.push_str("{{");
                    self.buffer.advance();
                    self.buffer.advance();
                }
                Some('}') if self.buffer.peek_next() == Some('}') => {
                    text.push_str("}}");
                    self.buffer.advance();
                    self.buffer.advance();
                }
                Some('{') => {
                    let text_end = self.buffer.pos();
                    self.buffer.advance();
                    self.modes.push(Mode::FStringExpr { brace_depth: 0 });
                    let marker = Token::new(
                        TokenKind::FStringExprStart,
                        "{",
                        Span::new(text_end, self.buffer.pos()),
                    );
                    if text.is_empty() {
                        return marker;
                    }
                    self.pending.push_back(marker);
                    return Token::new(TokenKind::FStringText, text, Span::new(start, text_end));
                }
                Some('"') => {
                    if triple {
                        if self.buffer.peek_next() == Some('"') {
                            let text_end = self.buffer.pos();
                            self.buffer.advance();
                            self.buffer.advance();
                            if self.buffer.peek() == Some('"') {
                                self.buffer.advance();
                                self.modes.pop();
                                let marker = Token::new(
                                    TokenKind::FStringEnd,
                                    "\"\"\"",
                                    Span::new(text_end, self.buffer.pos()),
                                );
                                if text.is_empty() {
                                    return marker;
                                }
                                self.pending.push_back(marker);
                                return Token::new(
                                    TokenKind::FStringText,
                                    text,
                                    Span::new(start, text_end),
                                );
                            }
                            text.push('"');
                            text.push('"');
                        } else {
                            text.push('"');
                            self.buffer.advance();
                        }
                    } else {
                        let text_end = self.buffer.pos();
                        self.buffer.advance();
                        self.modes.pop();
                        let marker = Token::new(
                            TokenKind::FStringEnd,
                            "\"",
                            Span::new(text_end, self.buffer.pos()),
                        );
                        if text.is_empty() {
                            return marker;
                        }
                        self.pending.push_back(marker);
                        return Token::new(TokenKind::FStringText, text, Span::new(start, text_end));
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.buffer.advance();
                }
            }
        }
    }

    // ── Operators ──────────────────────────────────────────────────────

    /// Longest-match over the operator trie; the longest prefix with a
    /// precedence entry wins.
    fn lex_operator(&mut self, start: u32) -> Token {
        let Some(c) = self.buffer.peek() else {
            return Token::eof(start);
        };

        let trie = op_trie();
        let Some(mut node) = trie.child(c) else {
            self.buffer.advance();
            return Token::new(
                TokenKind::Incorrect,
                c.to_string(),
                Span::new(start, self.buffer.pos()),
            );
        };

        self.buffer.advance();
        while let Some(next) = self.buffer.peek() {
            match node.child(next) {
                Some(deeper) => {
                    node = deeper;
                    self.buffer.advance();
                }
                None => break,
            }
        }

        let span = Span::new(start, self.buffer.pos());
        match node.glyph() {
            Some(glyph) => {
                let conf = op::lookup(glyph).expect("trie leaves come from the table");
                Token::new(conf.token, glyph, span)
            }
            None => Token::new(TokenKind::Incorrect, "", span),
        }
    }
}

impl<B: Buffer> Iterator for Lexer<B> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let tok = self.next_token();
        if tok.is_eof() {
            self.emitted_eof = true;
        }
        Some(tok)
    }
}

/// Whether a character can start an identifier.
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Whether a character can continue an identifier.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_assignment() {
        assert_eq!(
            kinds("x = 42"),
            vec![
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_indent_dedent_pairs() {
        let src = "if x:\n    pass\ny = 1\n";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::If,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Pass,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn blank_lines_do_not_dedent() {
        let src = "if x:\n    a\n\n    b\n";
        let got = kinds(src);
        assert_eq!(
            got.iter().filter(|k| **k == TokenKind::Dedent).count(),
            0,
            "blank line must not close the block: {got:?}"
        );
    }

    #[test]
    fn two_word_operators_merge() {
        let toks = Lexer::tokenize("a is not b");
        assert_eq!(toks[1].kind, TokenKind::Operator);
        assert_eq!(toks[1].text, "is not");

        let toks = Lexer::tokenize("a not in b");
        assert_eq!(toks[1].kind, TokenKind::In);
        assert_eq!(toks[1].text, "not in");
    }

    #[test]
    fn bare_not_still_lexes() {
        let toks = Lexer::tokenize("not x");
        assert_eq!(toks[0].kind, TokenKind::Operator);
        assert_eq!(toks[0].text, "not");
        assert_eq!(toks[1].kind, TokenKind::Ident);
    }

    #[test]
    fn float_exponent_longest_match() {
        let toks = Lexer::tokenize("1.5e-3 2e10 7");
        assert_eq!(toks[0].kind, TokenKind::Float);
        assert_eq!(toks[0].text, "1.5e-3");
        assert_eq!(toks[1].kind, TokenKind::Float);
        assert_eq!(toks[1].text, "2e10");
        assert_eq!(toks[2].kind, TokenKind::Int);
    }

    #[test]
    fn docstring_is_distinct_from_string() {
        let toks = Lexer::tokenize("\"\"\"doc\"\"\" \"str\"");
        assert_eq!(toks[0].kind, TokenKind::Docstring);
        assert_eq!(toks[0].text, "doc");
        assert_eq!(toks[1].kind, TokenKind::Str);
        assert_eq!(toks[1].text, "str");
    }

    #[test]
    fn fstring_tokens() {
        let toks = Lexer::tokenize("f\"a{x}b\"");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::FStringStart,
                TokenKind::FStringText,
                TokenKind::FStringExprStart,
                TokenKind::Ident,
                TokenKind::FStringExprEnd,
                TokenKind::FStringText,
                TokenKind::FStringEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn fstring_nested_braces_and_spec() {
        let toks = Lexer::tokenize("f\"{d['k']:>8}\"");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::FStringFormatSpec));
        let spec = toks
            .iter()
            .find(|t| t.kind == TokenKind::FStringFormatSpec)
            .unwrap();
        assert_eq!(spec.text, ">8");
    }

    #[test]
    fn operator_longest_match() {
        let toks = Lexer::tokenize("a **= b ** c * d");
        assert_eq!(toks[1].kind, TokenKind::AugAssign);
        assert_eq!(toks[1].text, "**=");
        assert_eq!(toks[3].kind, TokenKind::Operator);
        assert_eq!(toks[3].text, "**");
        assert_eq!(toks[5].text, "*");
    }

    #[test]
    fn arrow_walrus_and_dot() {
        let toks = Lexer::tokenize("(n := f.x) -> y");
        let texts: Vec<_> = toks.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&":="));
        assert!(texts.contains(&"."));
        assert!(texts.contains(&"->"));
    }

    #[test]
    fn comment_token_preserved() {
        let toks = Lexer::tokenize("x = 1  # trailing\n");
        let comment = toks.iter().find(|t| t.kind == TokenKind::Comment).unwrap();
        assert_eq!(comment.text, "trailing");
    }

    #[test]
    fn peek_one_buffer() {
        let mut lexer = Lexer::from_source("a b");
        assert_eq!(lexer.peek_token().text, "a");
        assert_eq!(lexer.peek_token().text, "a");
        assert_eq!(lexer.next_token().text, "a");
        assert_eq!(lexer.next_token().text, "b");
    }

    #[test]
    fn unterminated_string_is_incorrect() {
        let toks = Lexer::tokenize("\"oops");
        assert_eq!(toks[0].kind, TokenKind::Incorrect);
    }
}
