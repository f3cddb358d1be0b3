//! Parser core: token bookkeeping, statement dispatch, error recovery.
//!
//! The parser pulls tokens lazily from the lexer (one-token lookahead via
//! the lexer's peek buffer). Newlines and layout tokens are significant at
//! statement level but skipped transparently while any `()`/`[]`/`{}` is
//! open. Each statement parse is fallible; on failure the parser records
//! the error, swallows tokens to the end of the line, plants an
//! `InvalidStatement`, and continues with the next line.

pub(crate) mod expressions;
pub(crate) mod patterns;
pub(crate) mod statements;

use kiwi_common::node::{ExprId, NodeId, StmtId};
use kiwi_common::span::Span;
use kiwi_common::token::{Token, TokenKind};

use kiwi_lexer::buffer::Buffer;
use kiwi_lexer::Lexer;

use crate::ast::{Docstring, Module, ModuleKind, StmtKind};
use crate::error::ParseError;
use crate::ParseResult;

pub(crate) type PResult<T> = Result<T, ParseError>;

/// Recursive-descent parser over a lazy token stream.
pub struct Parser<B: Buffer> {
    lexer: Lexer<B>,
    /// The current token.
    pub(crate) tok: Token,
    pub(crate) module: Module,
    pub(crate) errors: Vec<ParseError>,
    /// Open `(`/`[`/`{` count; newlines and layout are invisible inside.
    paren_depth: u32,
    /// `async` statement nesting, for `await`/`async for` validation.
    pub(crate) async_mode: Vec<bool>,
}

impl<B: Buffer> Parser<B> {
    pub fn new(mut lexer: Lexer<B>) -> Self {
        let file_name = lexer.file_name().to_string();
        let tok = lexer.next_token();
        let mut parser = Self {
            lexer,
            tok,
            module: Module::new(file_name),
            errors: Vec::new(),
            paren_depth: 0,
            async_mode: Vec::new(),
        };
        parser.skip_insignificant();
        parser
    }

    // ── Token plumbing ─────────────────────────────────────────────────

    /// Consume the current token and fetch the next significant one.
    pub(crate) fn advance(&mut self) -> Token {
        self.track_delimiters(self.tok.kind);
        let tok = std::mem::replace(&mut self.tok, self.lexer.next_token());
        self.skip_insignificant();
        tok
    }

    /// Skip layout (and comments) while inside delimiters.
    fn skip_insignificant(&mut self) {
        while self.paren_depth > 0
            && matches!(
                self.tok.kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Comment
            )
        {
            self.tok = self.lexer.next_token();
        }
    }

    fn track_delimiters(&mut self, kind: TokenKind) {
        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.paren_depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.tok.kind == kind
    }

    /// Kind of the token after the current one.
    pub(crate) fn peek_kind(&mut self) -> TokenKind {
        self.lexer.peek_token().kind
    }

    /// Consume the current token if it matches.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind or fail.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::expected(vec![kind], &self.tok))
        }
    }

    /// Consume end-of-statement: a newline, or end of block/input.
    pub(crate) fn expect_statement_end(&mut self) -> PResult<()> {
        // A trailing comment belongs to the statement just parsed; the
        // caller picks it up from `take_inline_comment` before this runs.
        match self.tok.kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::Dedent | TokenKind::Semicolon => Ok(()),
            _ => Err(ParseError::expected(
                vec![TokenKind::Newline, TokenKind::Eof],
                &self.tok,
            )),
        }
    }

    /// Take the comment sitting at the end of the current line, if any.
    pub(crate) fn take_inline_comment(&mut self) -> Option<String> {
        if self.at(TokenKind::Comment) {
            Some(self.advance().text)
        } else {
            None
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.advance();
        }
    }

    // ── Node construction ──────────────────────────────────────────────

    pub(crate) fn add_expr(&mut self, kind: crate::ast::ExprKind, span: Span) -> ExprId {
        self.module.ast.add_expr(kind, span)
    }

    pub(crate) fn add_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = self.module.ast.add_stmt(kind, span);
        let mut children = Vec::new();
        crate::visitor::for_each_child(&self.module.ast, NodeId::Stmt(id), &mut |child| {
            children.push(child);
        });
        for child in children {
            self.module.ast.set_parent(child, NodeId::Stmt(id));
        }
        id
    }

    /// Merge a span from `start` to the end of the previous token.
    pub(crate) fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.tok.span.start.max(start))
    }

    // ── Entry point ────────────────────────────────────────────────────

    /// Parse a whole module.
    pub fn parse_module(mut self) -> ParseResult {
        self.skip_newlines();

        // Module docstring.
        if self.at(TokenKind::Docstring) {
            let text = self.advance().text;
            let comment = self.take_inline_comment();
            self.module.docstring = Some(Docstring { text, comment });
            let _ = self.expect_statement_end();
            self.skip_newlines();
        }

        while !self.at(TokenKind::Eof) {
            let stmt = self.parse_statement_with_recovery();
            self.module.body.push(stmt);
            self.skip_newlines();
        }

        self.module.kind = ModuleKind::Module;
        ParseResult {
            module: self.module,
            errors: self.errors,
        }
    }

    /// Parse one statement; on error, record it, eat the rest of the line,
    /// and plant an `InvalidStatement` in its place.
    pub(crate) fn parse_statement_with_recovery(&mut self) -> StmtId {
        let start = self.tok.span.start;
        match self.parse_statement() {
            Ok(stmt) => stmt,
            Err(mut error) => {
                let mut consumed = Vec::new();
                while !matches!(
                    self.tok.kind,
                    TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
                ) {
                    consumed.push(self.advance());
                }
                if matches!(self.tok.kind, TokenKind::Newline | TokenKind::Dedent) {
                    self.advance();
                }
                error.tokens = consumed.clone();
                log::debug!("recovered from parse error: {error}");
                self.errors.push(error);
                self.add_stmt(
                    StmtKind::InvalidStatement { tokens: consumed },
                    self.span_from(start),
                )
            }
        }
    }
}
