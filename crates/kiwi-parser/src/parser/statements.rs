//! Statement parsing: dispatch on the leading token, block structure over
//! `Indent`/`Dedent`, decorators, and the assignment family.

use kiwi_common::node::StmtId;
use kiwi_common::op;
use kiwi_common::token::TokenKind;

use kiwi_lexer::buffer::Buffer;

use crate::ast::{
    Alias, Arg, Arguments, Decorator, Docstring, ExceptHandler, ExprContext, ExprKind, Keyword,
    StmtKind, WithItem,
};
use crate::error::ParseError;
use crate::ops::context::set_context;
use crate::visitor::for_each_child;

use super::{PResult, Parser};

impl<B: Buffer> Parser<B> {
    /// Parse one statement (compound or a simple-statement line).
    pub(crate) fn parse_statement(&mut self) -> PResult<StmtId> {
        // Standalone comment lines become part of the surrounding body.
        if self.at(TokenKind::Comment) {
            let start = self.tok.span.start;
            let text = self.advance().text;
            self.expect_statement_end()?;
            return Ok(self.add_stmt(StmtKind::Comment { text }, self.span_from(start)));
        }

        match self.tok.kind {
            TokenKind::At => self.parse_decorated(),
            TokenKind::Def => self.parse_function_def(Vec::new(), false),
            TokenKind::Class => self.parse_class_def(Vec::new()),
            TokenKind::Async => self.parse_async(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(false),
            TokenKind::Try => self.parse_try(),
            TokenKind::With => self.parse_with(false),
            TokenKind::Match => self.parse_match(),
            _ => self.parse_simple_line(),
        }
    }

    // ── Blocks ─────────────────────────────────────────────────────────

    /// Parse `: <suite>`: either an indented block or simple statements on
    /// the same line. Returns the body and the colon line's trailing
    /// comment.
    pub(crate) fn parse_block(&mut self) -> PResult<(Vec<StmtId>, Option<String>)> {
        let (body, comment, _doc) = self.parse_suite(false)?;
        Ok((body, comment))
    }

    /// Like [`parse_block`] but peels a leading docstring off the body
    /// (used by `def` and `class`).
    pub(crate) fn parse_block_with_docstring(
        &mut self,
    ) -> PResult<(Vec<StmtId>, Option<String>, Option<Docstring>)> {
        self.parse_suite(true)
    }

    fn parse_suite(
        &mut self,
        want_docstring: bool,
    ) -> PResult<(Vec<StmtId>, Option<String>, Option<Docstring>)> {
        self.expect(TokenKind::Colon)?;
        let comment = self.take_inline_comment();

        // One-line suite: `def f(): pass`.
        if !self.at(TokenKind::Newline) {
            let mut body = vec![self.parse_inline_member()?];
            while self.eat(TokenKind::Semicolon) {
                if matches!(self.tok.kind, TokenKind::Newline | TokenKind::Eof) {
                    break;
                }
                body.push(self.parse_inline_member()?);
            }
            self.expect_statement_end()?;
            return Ok((body, comment, None));
        }

        self.advance(); // newline
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        self.skip_newlines();

        let mut docstring = None;
        if want_docstring && self.at(TokenKind::Docstring) {
            let text = self.advance().text;
            let doc_comment = self.take_inline_comment();
            self.expect_statement_end()?;
            self.skip_newlines();
            docstring = Some(Docstring {
                text,
                comment: doc_comment,
            });
        }

        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::Dedent) {
                self.advance();
                break;
            }
            if self.at(TokenKind::Eof) {
                break;
            }
            let stmt = self.parse_statement_with_recovery();
            body.push(stmt);
        }

        Ok((body, comment, docstring))
    }

    // ── Simple statement lines ─────────────────────────────────────────

    /// A line of one or more simple statements chained with `;`.
    fn parse_simple_line(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        let first = self.parse_simple_statement()?;

        if self.at(TokenKind::Semicolon) {
            let mut body = vec![first];
            while self.eat(TokenKind::Semicolon) {
                if matches!(self.tok.kind, TokenKind::Newline | TokenKind::Eof | TokenKind::Comment)
                {
                    break;
                }
                body.push(self.parse_simple_statement()?);
            }
            let comment = self.take_inline_comment();
            self.expect_statement_end()?;
            let id = self.add_stmt(StmtKind::Inline { body }, self.span_from(start));
            self.module.ast.stmt_mut(id).comment = comment;
            return Ok(id);
        }

        let comment = self.take_inline_comment();
        self.expect_statement_end()?;
        self.module.ast.stmt_mut(first).comment = comment;
        Ok(first)
    }

    /// One member of a one-line suite (`def f(): pass`).
    fn parse_inline_member(&mut self) -> PResult<StmtId> {
        self.parse_simple_statement()
    }

    /// A single simple (non-compound) statement, line ending not consumed.
    fn parse_simple_statement(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        match self.tok.kind {
            TokenKind::Return => {
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expr_list()?)
                };
                Ok(self.add_stmt(StmtKind::Return { value }, self.span_from(start)))
            }
            TokenKind::Pass => {
                self.advance();
                Ok(self.add_stmt(StmtKind::Pass, self.span_from(start)))
            }
            TokenKind::Break => {
                self.advance();
                Ok(self.add_stmt(StmtKind::Break, self.span_from(start)))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(self.add_stmt(StmtKind::Continue, self.span_from(start)))
            }
            TokenKind::Raise => {
                self.advance();
                let (exc, cause) = if self.at_statement_end() {
                    (None, None)
                } else {
                    let exc = self.parse_expr()?;
                    let cause = if self.eat(TokenKind::From) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    (Some(exc), cause)
                };
                Ok(self.add_stmt(StmtKind::Raise { exc, cause }, self.span_from(start)))
            }
            TokenKind::Global => {
                self.advance();
                let names = self.parse_name_list()?;
                Ok(self.add_stmt(StmtKind::Global { names }, self.span_from(start)))
            }
            TokenKind::Nonlocal => {
                self.advance();
                let names = self.parse_name_list()?;
                Ok(self.add_stmt(StmtKind::Nonlocal { names }, self.span_from(start)))
            }
            TokenKind::Del => {
                self.advance();
                let mut targets = vec![self.parse_target()?];
                while self.eat(TokenKind::Comma) {
                    targets.push(self.parse_target()?);
                }
                for &target in &targets {
                    set_context(&mut self.module.ast, target, ExprContext::Del);
                }
                Ok(self.add_stmt(StmtKind::Delete { targets }, self.span_from(start)))
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_expr()?;
                let msg = if self.eat(TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(self.add_stmt(StmtKind::Assert { test, msg }, self.span_from(start)))
            }
            TokenKind::Import => {
                self.advance();
                let mut names = vec![self.parse_alias()?];
                while self.eat(TokenKind::Comma) {
                    names.push(self.parse_alias()?);
                }
                Ok(self.add_stmt(StmtKind::Import { names }, self.span_from(start)))
            }
            TokenKind::From => self.parse_import_from(),
            _ => self.parse_expr_statement(),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.tok.kind,
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Dedent
                | TokenKind::Semicolon
                | TokenKind::Comment
        )
    }

    fn parse_name_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.expect(TokenKind::Ident)?.text];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect(TokenKind::Ident)?.text);
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect(TokenKind::Ident)?.text;
        while self.at(TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect(TokenKind::Ident)?.text);
        }
        Ok(name)
    }

    fn parse_alias(&mut self) -> PResult<Alias> {
        let name = self.parse_dotted_name()?;
        let asname = if self.eat(TokenKind::As) {
            Some(self.expect(TokenKind::Ident)?.text)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_import_from(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // from

        let mut level = 0usize;
        while self.at(TokenKind::Dot) {
            self.advance();
            level += 1;
        }
        let module = if self.at(TokenKind::Ident) {
            Some(self.parse_dotted_name()?)
        } else {
            None
        };

        self.expect(TokenKind::Import)?;

        let mut names = Vec::new();
        if self.at(TokenKind::Operator) && self.tok.text == "*" {
            self.advance();
            names.push(Alias {
                name: "*".to_string(),
                asname: None,
            });
        } else {
            let parens = self.eat(TokenKind::LParen);
            names.push(self.parse_alias()?);
            while self.eat(TokenKind::Comma) {
                if parens && self.at(TokenKind::RParen) {
                    break;
                }
                names.push(self.parse_alias()?);
            }
            if parens {
                self.expect(TokenKind::RParen)?;
            }
        }

        Ok(self.add_stmt(
            StmtKind::ImportFrom {
                module,
                names,
                level: (level > 0).then_some(level),
            },
            self.span_from(start),
        ))
    }

    /// Expression line: bare expression, assignment, augmented assignment,
    /// or annotated assignment.
    fn parse_expr_statement(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        let first = self.parse_expr_list()?;

        match self.tok.kind {
            TokenKind::Assign => {
                let mut targets = vec![first];
                self.advance();
                let mut value = self.parse_expr_list()?;
                while self.at(TokenKind::Assign) {
                    self.advance();
                    targets.push(value);
                    value = self.parse_expr_list()?;
                }
                for &target in &targets {
                    set_context(&mut self.module.ast, target, ExprContext::Store);
                }
                Ok(self.add_stmt(StmtKind::Assign { targets, value }, self.span_from(start)))
            }
            TokenKind::AugAssign => {
                let glyph = self.tok.text.clone();
                let conf = op::lookup(glyph.as_str())
                    .ok_or_else(|| ParseError::new(format!("unknown operator {glyph}"), self.tok.span))?;
                let binop = conf.binary.ok_or_else(|| {
                    ParseError::new(format!("{glyph} is not an augmented assignment"), self.tok.span)
                })?;
                self.advance();
                let value = self.parse_expr_list()?;
                set_context(&mut self.module.ast, first, ExprContext::Store);
                Ok(self.add_stmt(
                    StmtKind::AugAssign {
                        target: first,
                        op: binop,
                        value,
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::Colon => {
                self.advance();
                let annotation = self.parse_expr()?;
                let value = if self.eat(TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                set_context(&mut self.module.ast, first, ExprContext::Store);
                Ok(self.add_stmt(
                    StmtKind::AnnAssign {
                        target: first,
                        annotation,
                        value,
                    },
                    self.span_from(start),
                ))
            }
            _ => Ok(self.add_stmt(StmtKind::Expr { value: first }, self.span_from(start))),
        }
    }

    // ── Compound statements ────────────────────────────────────────────

    fn parse_decorated(&mut self) -> PResult<StmtId> {
        let mut decorators = Vec::new();
        while self.at(TokenKind::At) {
            self.advance();
            let expr = self.parse_expr()?;
            let comment = self.take_inline_comment();
            self.expect_statement_end()?;
            self.skip_newlines();
            decorators.push(Decorator { expr, comment });
        }

        let kind = self.tok.kind;
        match kind {
            TokenKind::Def => self.parse_function_def(decorators, false),
            TokenKind::Class => self.parse_class_def(decorators),
            TokenKind::Async if self.peek_kind() == TokenKind::Def => {
                self.advance();
                self.parse_function_def(decorators, true)
            }
            _ => Err(ParseError::expected(
                vec![TokenKind::Def, TokenKind::Class],
                &self.tok,
            )),
        }
    }

    fn parse_async(&mut self) -> PResult<StmtId> {
        self.advance(); // async
        match self.tok.kind {
            TokenKind::Def => self.parse_function_def(Vec::new(), true),
            TokenKind::For => self.parse_for(true),
            TokenKind::With => self.parse_with(true),
            _ => Err(ParseError::expected(
                vec![TokenKind::Def, TokenKind::For, TokenKind::With],
                &self.tok,
            )),
        }
    }

    pub(crate) fn parse_function_def(
        &mut self,
        decorators: Vec<Decorator>,
        is_async: bool,
    ) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // def
        let name = self.expect(TokenKind::Ident)?.text;

        self.expect(TokenKind::LParen)?;
        let args = self.parse_parameters()?;
        self.expect(TokenKind::RParen)?;

        let returns = if self.at(TokenKind::Arrow) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.async_mode.push(is_async);
        let result = self.parse_block_with_docstring();
        self.async_mode.pop();
        let (body, comment, docstring) = result?;

        let generator = contains_yield(&self.module.ast, &body);
        let id = self.add_stmt(
            StmtKind::FunctionDef {
                name,
                args,
                body,
                decorators,
                returns,
                ty: None,
                docstring,
                native: None,
                generator,
                is_async,
            },
            self.span_from(start),
        );
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    /// Parameter list between the parentheses of a `def`.
    fn parse_parameters(&mut self) -> PResult<Arguments> {
        let mut args = Arguments::default();
        let mut seen_star = false;

        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::Operator) && self.tok.text == "*" {
                self.advance();
                if self.at(TokenKind::Ident) {
                    let arg = self.parse_parameter()?;
                    args.vararg = Some(arg);
                }
                seen_star = true;
            } else if self.at(TokenKind::Operator) && self.tok.text == "**" {
                self.advance();
                args.kwarg = Some(self.parse_parameter()?);
            } else if self.at(TokenKind::Operator) && self.tok.text == "/" {
                self.advance();
                // Everything so far was positional-only.
                args.posonlyargs.append(&mut args.args);
            } else {
                let arg = self.parse_parameter()?;
                let default = if self.eat(TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                if seen_star {
                    args.kwonlyargs.push(arg);
                    args.kw_defaults.push(default);
                } else {
                    args.args.push(arg);
                    if let Some(default) = default {
                        args.defaults.push(default);
                    } else if !args.defaults.is_empty() {
                        return Err(ParseError::new(
                            "parameter without a default follows one with a default",
                            self.tok.span,
                        ));
                    }
                }
            }

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    fn parse_parameter(&mut self) -> PResult<Arg> {
        let name = self.expect(TokenKind::Ident)?.text;
        let annotation = if self.eat(TokenKind::Colon) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Arg {
            arg: name,
            annotation,
        })
    }

    pub(crate) fn parse_class_def(&mut self, decorators: Vec<Decorator>) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // class
        let name = self.expect(TokenKind::Ident)?.text;

        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.at(TokenKind::RParen) {
                if self.at(TokenKind::Ident) && self.peek_kind() == TokenKind::Assign {
                    let arg = self.advance().text;
                    self.advance(); // =
                    let value = self.parse_expr()?;
                    keywords.push(Keyword { arg, value });
                } else {
                    bases.push(self.parse_expr()?);
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        let (body, comment, docstring) = self.parse_block_with_docstring()?;
        let id = self.add_stmt(
            StmtKind::ClassDef {
                name,
                bases,
                keywords,
                body,
                decorators,
                attributes: Vec::new(),
                cls_namespace: String::new(),
                ctor_t: None,
                docstring,
            },
            self.span_from(start),
        );
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    fn parse_if(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // if
        let test = self.parse_expr()?;
        let (body, comment) = self.parse_block()?;

        let mut tests = Vec::new();
        let mut bodies = Vec::new();
        let mut tests_comment = Vec::new();
        let mut orelse = Vec::new();
        let mut else_comment = None;

        loop {
            self.skip_newlines();
            if self.at(TokenKind::Elif) {
                self.advance();
                let arm_test = self.parse_expr()?;
                let (arm_body, arm_comment) = self.parse_block()?;
                tests.push(arm_test);
                bodies.push(arm_body);
                tests_comment.push(arm_comment);
            } else if self.at(TokenKind::Else) {
                self.advance();
                let (else_body, comment) = self.parse_block()?;
                orelse = else_body;
                else_comment = comment;
                break;
            } else {
                break;
            }
        }

        let id = self.add_stmt(
            StmtKind::If {
                test,
                body,
                tests,
                bodies,
                orelse,
                tests_comment,
                else_comment,
            },
            self.span_from(start),
        );
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    fn parse_while(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // while
        let test = self.parse_expr()?;
        let (body, comment) = self.parse_block()?;

        let mut orelse = Vec::new();
        self.skip_newlines();
        if self.at(TokenKind::Else) {
            self.advance();
            let (else_body, _comment) = self.parse_block()?;
            orelse = else_body;
        }

        let id = self.add_stmt(StmtKind::While { test, body, orelse }, self.span_from(start));
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    fn parse_for(&mut self, is_async: bool) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // for
        let target = self.parse_target_list()?;
        set_context(&mut self.module.ast, target, ExprContext::Store);
        self.expect(TokenKind::In)?;
        let iter = self.parse_expr_list()?;
        let (body, comment) = self.parse_block()?;

        let mut orelse = Vec::new();
        let mut else_comment = None;
        self.skip_newlines();
        if self.at(TokenKind::Else) {
            self.advance();
            let (else_body, comment) = self.parse_block()?;
            orelse = else_body;
            else_comment = comment;
        }

        let id = self.add_stmt(
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
                is_async,
                else_comment,
            },
            self.span_from(start),
        );
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    fn parse_try(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // try
        let (body, comment) = self.parse_block()?;

        let mut handlers = Vec::new();
        loop {
            self.skip_newlines();
            if !self.at(TokenKind::Except) {
                break;
            }
            self.advance();
            let ty = if self.at(TokenKind::Colon) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            let name = if self.eat(TokenKind::As) {
                Some(self.expect(TokenKind::Ident)?.text)
            } else {
                None
            };
            let (handler_body, handler_comment) = self.parse_block()?;
            handlers.push(ExceptHandler {
                ty,
                name,
                body: handler_body,
                comment: handler_comment,
            });
        }

        let mut orelse = Vec::new();
        self.skip_newlines();
        if self.at(TokenKind::Else) {
            self.advance();
            orelse = self.parse_block()?.0;
        }

        let mut finalbody = Vec::new();
        self.skip_newlines();
        if self.at(TokenKind::Finally) {
            self.advance();
            finalbody = self.parse_block()?.0;
        }

        if handlers.is_empty() && finalbody.is_empty() {
            return Err(ParseError::new(
                "try statement needs at least one except or finally clause",
                self.span_from(start),
            ));
        }

        let id = self.add_stmt(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            self.span_from(start),
        );
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    fn parse_with(&mut self, is_async: bool) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // with

        let mut items = Vec::new();
        loop {
            let context_expr = self.parse_expr()?;
            let optional_vars = if self.eat(TokenKind::As) {
                let target = self.parse_target()?;
                set_context(&mut self.module.ast, target, ExprContext::Store);
                Some(target)
            } else {
                None
            };
            items.push(WithItem {
                context_expr,
                optional_vars,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        let (body, comment) = self.parse_block()?;
        let id = self.add_stmt(
            StmtKind::With {
                items,
                body,
                is_async,
            },
            self.span_from(start),
        );
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }

    fn parse_match(&mut self) -> PResult<StmtId> {
        let start = self.tok.span.start;
        self.advance(); // match
        let subject = self.parse_expr_list()?;

        self.expect(TokenKind::Colon)?;
        let comment = self.take_inline_comment();
        self.expect(TokenKind::Newline)?;
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;

        let mut cases = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::Dedent) {
                self.advance();
                break;
            }
            if self.at(TokenKind::Eof) {
                break;
            }
            self.expect(TokenKind::Case)?;
            let pattern = self.parse_pattern()?;
            let guard = if self.at(TokenKind::If) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            let (body, case_comment) = self.parse_block()?;
            cases.push(crate::ast::MatchCase {
                pattern,
                guard,
                body,
                comment: case_comment,
            });
        }

        let id = self.add_stmt(StmtKind::Match { subject, cases }, self.span_from(start));
        self.module.ast.stmt_mut(id).comment = comment;
        Ok(id)
    }
}

/// Whether a function body contains a `yield` of its own (nested functions
/// and lambdas do not count).
fn contains_yield(ast: &crate::ast::Ast, body: &[StmtId]) -> bool {
    use kiwi_common::node::NodeId;

    fn walk(ast: &crate::ast::Ast, node: NodeId, found: &mut bool) {
        if *found {
            return;
        }
        match node {
            NodeId::Stmt(id) => {
                if matches!(ast.stmt(id).kind, StmtKind::FunctionDef { .. }) {
                    return;
                }
            }
            NodeId::Expr(id) => match ast.expr(id).kind {
                ExprKind::Yield { .. } | ExprKind::YieldFrom { .. } => {
                    *found = true;
                    return;
                }
                ExprKind::Lambda { .. } => return,
                _ => {}
            },
            NodeId::Pat(_) => {}
        }
        for_each_child(ast, node, &mut |child| walk(ast, child, found));
    }

    let mut found = false;
    for &stmt in body {
        walk(ast, NodeId::Stmt(stmt), &mut found);
        if found {
            break;
        }
    }
    found
}
