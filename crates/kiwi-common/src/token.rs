use serde::Serialize;

use crate::span::Span;

/// A token produced by the Kiwi lexer.
///
/// Tokens are value typed: they own their lexeme and never alias buffer
/// storage, so they stay valid after the buffer that produced them is gone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    /// Create a new token from a kind, lexeme, and byte offsets.
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// The end-of-file sentinel at the given offset.
    pub fn eof(at: u32) -> Self {
        Self::new(TokenKind::Eof, "", Span::point(at))
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Every kind of token in the Kiwi language.
///
/// This is the complete vocabulary of the lexer: layout tokens, literals by
/// subtype, keywords, operator families, punctuation, and the special
/// `Eof`/`Incorrect` sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // ── Layout ─────────────────────────────────────────────────────────
    /// One indentation level opened (a run of `KIWI_INDENT` spaces).
    Indent,
    /// One indentation level closed.
    Dedent,
    /// End of a logical line.
    Newline,

    // ── Literals ───────────────────────────────────────────────────────
    /// Integer literal, e.g. `42`.
    Int,
    /// Floating-point literal, e.g. `3.14`, `1e-3`.
    Float,
    /// Regular `"..."` string literal.
    Str,
    /// Byte string literal, `b"..."`.
    Bytes,
    /// Raw string literal, `r"..."`.
    RawStr,
    /// Triple-quoted `"""..."""` docstring.
    Docstring,

    // ── F-strings ──────────────────────────────────────────────────────
    /// Opening `f"` of a formatted string.
    FStringStart,
    /// Literal text between interpolations.
    FStringText,
    /// `{` opening a nested expression.
    FStringExprStart,
    /// `}` closing a nested expression.
    FStringExprEnd,
    /// `!r`-style conversion letter inside an interpolation.
    FStringConversion,
    /// `:...` format specification inside an interpolation.
    FStringFormatSpec,
    /// Closing `"` of a formatted string.
    FStringEnd,

    // ── Keywords ───────────────────────────────────────────────────────
    As,
    Assert,
    Async,
    Await,
    Break,
    Case,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    False,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    Lambda,
    Match,
    NoneKw,
    Nonlocal,
    Pass,
    Raise,
    Return,
    True,
    Try,
    While,
    With,
    Yield,

    // ── Operator families (per the operator table) ─────────────────────
    /// A binary/unary/boolean/comparison operator glyph or word.
    Operator,
    /// `+=`-family augmented assignment.
    AugAssign,
    /// Plain `=`.
    Assign,
    /// `->`.
    Arrow,
    /// `:=`.
    Walrus,
    /// `.`.
    Dot,
    /// `in` / `not in` (membership; also the `for ... in` separator).
    In,

    // ── Punctuation ────────────────────────────────────────────────────
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    /// `@` introducing a decorator.
    At,

    // ── Identifiers and trivia ─────────────────────────────────────────
    /// Regular identifier, e.g. `foo`, `my_var`.
    Ident,
    /// `# ...` to end of line. Preserved so error printing and the pretty
    /// printer can round-trip formatting.
    Comment,
    /// End of input.
    Eof,
    /// Input known to be wrong; lexing continues past it.
    Incorrect,
}

/// Look up a keyword from its spelling.
///
/// The lexer calls this after scanning an identifier-shaped lexeme. Operator
/// words (`and`, `or`, `not`, `in`, `is`) are not keywords; they go through
/// the operator table instead.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "as" => Some(TokenKind::As),
        "assert" => Some(TokenKind::Assert),
        "async" => Some(TokenKind::Async),
        "await" => Some(TokenKind::Await),
        "break" => Some(TokenKind::Break),
        "case" => Some(TokenKind::Case),
        "class" => Some(TokenKind::Class),
        "continue" => Some(TokenKind::Continue),
        "def" => Some(TokenKind::Def),
        "del" => Some(TokenKind::Del),
        "elif" => Some(TokenKind::Elif),
        "else" => Some(TokenKind::Else),
        "except" => Some(TokenKind::Except),
        "False" => Some(TokenKind::False),
        "finally" => Some(TokenKind::Finally),
        "for" => Some(TokenKind::For),
        "from" => Some(TokenKind::From),
        "global" => Some(TokenKind::Global),
        "if" => Some(TokenKind::If),
        "import" => Some(TokenKind::Import),
        "lambda" => Some(TokenKind::Lambda),
        "match" => Some(TokenKind::Match),
        "None" => Some(TokenKind::NoneKw),
        "nonlocal" => Some(TokenKind::Nonlocal),
        "pass" => Some(TokenKind::Pass),
        "raise" => Some(TokenKind::Raise),
        "return" => Some(TokenKind::Return),
        "True" => Some(TokenKind::True),
        "try" => Some(TokenKind::Try),
        "while" => Some(TokenKind::While),
        "with" => Some(TokenKind::With),
        "yield" => Some(TokenKind::Yield),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_is_case_sensitive() {
        assert_eq!(keyword_from_str("def"), Some(TokenKind::Def));
        assert_eq!(keyword_from_str("Def"), None);
        assert_eq!(keyword_from_str("True"), Some(TokenKind::True));
        assert_eq!(keyword_from_str("true"), None);
    }

    #[test]
    fn operator_words_are_not_keywords() {
        for word in ["and", "or", "not", "in", "is"] {
            assert_eq!(keyword_from_str(word), None, "{word} belongs to the operator table");
        }
    }

    #[test]
    fn token_owns_its_lexeme() {
        let tok = {
            let source = String::from("spam = 1");
            Token::new(TokenKind::Ident, &source[0..4], Span::new(0, 4))
        };
        assert_eq!(tok.text, "spam");
    }
}
