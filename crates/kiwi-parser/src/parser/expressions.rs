//! Expression parsing: precedence climbing over the operator table.
//!
//! The loop keeps an already-parsed left-hand side and consumes binary
//! operators whose precedence clears the caller's minimum; a right-hand
//! side climbs into any tighter (or equal, right-associative) operator
//! before combining. Comparison chains extend one `Compare` node; runs of
//! the same boolean operator merge into one `BoolOp` with `opcount`
//! bumped.

use kiwi_common::node::ExprId;
use kiwi_common::op::{self, OpConfig};
use kiwi_common::span::Span;
use kiwi_common::token::TokenKind;
use kiwi_common::value::Value;

use kiwi_lexer::buffer::Buffer;

use crate::ast::{Arg, Arguments, Comprehension, ExprContext, ExprKind, Keyword};
use crate::error::ParseError;

use super::{PResult, Parser};

impl<B: Buffer> Parser<B> {
    /// Parse a full expression: operators, conditional expression, walrus.
    pub(crate) fn parse_expr(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        let primary = self.parse_primary()?;
        let mut expr = self.parse_operators(primary, 0)?;

        // Conditional expression: `body if test else orelse`.
        if self.at(TokenKind::If) {
            self.advance();
            let test_primary = self.parse_primary()?;
            let test = self.parse_operators(test_primary, 0)?;
            self.expect(TokenKind::Else)?;
            let orelse = self.parse_expr()?;
            expr = self.add_expr(
                ExprKind::IfExp {
                    test,
                    body: expr,
                    orelse,
                },
                self.span_from(start),
            );
        }

        // Walrus: `target := value`.
        if self.at(TokenKind::Walrus) {
            self.advance();
            let value = self.parse_expr()?;
            expr = self.add_expr(
                ExprKind::NamedExpr {
                    target: expr,
                    value,
                },
                self.span_from(start),
            );
        }

        Ok(expr)
    }

    /// An expression without the conditional suffix, for contexts where a
    /// following `if` belongs to the construct (comprehensions).
    pub(crate) fn parse_expr_nocond(&mut self) -> PResult<ExprId> {
        let primary = self.parse_primary()?;
        self.parse_operators(primary, 0)
    }

    /// Expression list: `a, b, c` folds into a tuple.
    pub(crate) fn parse_expr_list(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        let first = self.parse_expr()?;
        if !self.at(TokenKind::Comma) {
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat(TokenKind::Comma) {
            if !self.at_expression_start() {
                break;
            }
            elts.push(self.parse_expr()?);
        }
        Ok(self.add_expr(
            ExprKind::TupleExpr {
                elts,
                ctx: ExprContext::Load,
            },
            self.span_from(start),
        ))
    }

    /// Operator table entry for the current token, if it can sit between
    /// two operands.
    fn infix_conf(&self) -> Option<&'static OpConfig> {
        match self.tok.kind {
            TokenKind::Operator | TokenKind::In => op::lookup(self.tok.text.as_str()),
            _ => None,
        }
    }

    /// Precedence climbing. `lhs` is already parsed; consume every infix
    /// operator at or above `min_prec`.
    pub(crate) fn parse_operators(&mut self, mut lhs: ExprId, min_prec: i32) -> PResult<ExprId> {
        // The chain node this loop built, if any: comparison operators
        // extend it, same-operator booleans merge into it. A parenthesized
        // `Compare` arriving as `lhs` starts a fresh node instead.
        let mut built: Option<ExprId> = None;

        loop {
            let Some(conf) = self.infix_conf() else { break };
            if !conf.is_binary_family() || conf.precedence < min_prec {
                break;
            }
            let conf = *conf;
            let op_prec = conf.precedence;
            self.advance(); // the operator

            let mut rhs = self.parse_primary()?;

            // While the next operator binds tighter (or as tight and
            // right-associative), let the right-hand side absorb it.
            loop {
                let Some(next) = self.infix_conf() else { break };
                if !next.is_binary_family() {
                    break;
                }
                let climbs = next.precedence > op_prec
                    || (!next.left_associative && next.precedence == op_prec);
                if !climbs {
                    break;
                }
                let next_min = if next.precedence > op_prec {
                    op_prec + 1
                } else {
                    op_prec
                };
                rhs = self.parse_operators(rhs, next_min)?;
            }

            let span = self.merged_span(lhs, rhs);

            if let Some(binop) = conf.binary {
                lhs = self.add_expr(
                    ExprKind::BinOp {
                        left: lhs,
                        op: binop,
                        right: rhs,
                        native_op: None,
                    },
                    span,
                );
                built = Some(lhs);
            } else if let Some(cmp) = conf.cmp {
                let extend = built == Some(lhs)
                    && matches!(self.module.ast.expr(lhs).kind, ExprKind::Compare { .. });
                if extend {
                    if let ExprKind::Compare {
                        ops, comparators, ..
                    } = &mut self.module.ast.expr_mut(lhs).kind
                    {
                        ops.push(cmp);
                        comparators.push(rhs);
                    }
                    self.module.ast.expr_mut(lhs).span = span;
                } else {
                    lhs = self.add_expr(
                        ExprKind::Compare {
                            left: lhs,
                            ops: vec![cmp],
                            comparators: vec![rhs],
                            native_ops: Vec::new(),
                        },
                        span,
                    );
                    built = Some(lhs);
                }
            } else if let Some(boolop) = conf.boolean {
                let merge = built == Some(lhs)
                    && matches!(
                        &self.module.ast.expr(lhs).kind,
                        ExprKind::BoolOp { op, .. } if *op == boolop
                    );
                if merge {
                    if let ExprKind::BoolOp {
                        values, opcount, ..
                    } = &mut self.module.ast.expr_mut(lhs).kind
                    {
                        values.push(rhs);
                        *opcount += 1;
                    }
                    self.module.ast.expr_mut(lhs).span = span;
                } else {
                    lhs = self.add_expr(
                        ExprKind::BoolOp {
                            op: boolop,
                            values: vec![lhs, rhs],
                            opcount: 1,
                            native_op: None,
                        },
                        span,
                    );
                    built = Some(lhs);
                }
            }
        }

        Ok(lhs)
    }

    fn merged_span(&self, lhs: ExprId, rhs: ExprId) -> Span {
        self.module
            .ast
            .expr(lhs)
            .span
            .merge(self.module.ast.expr(rhs).span)
    }

    /// Whether the current token can start an expression.
    pub(crate) fn at_expression_start(&self) -> bool {
        match self.tok.kind {
            TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::RawStr
            | TokenKind::Bytes
            | TokenKind::Docstring
            | TokenKind::FStringStart
            | TokenKind::True
            | TokenKind::False
            | TokenKind::NoneKw
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Lambda
            | TokenKind::Await
            | TokenKind::Yield => true,
            TokenKind::Operator => {
                op::lookup(self.tok.text.as_str()).is_some_and(|c| c.unary.is_some())
                    || self.tok.text == "*"
            }
            _ => false,
        }
    }

    // ── Primary expressions ────────────────────────────────────────────

    /// An atom with its postfix chain (`.attr`, call, subscript).
    pub(crate) fn parse_primary(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        let mut expr = self.parse_atom()?;

        loop {
            match self.tok.kind {
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.expect(TokenKind::Ident)?.text;
                    expr = self.add_expr(
                        ExprKind::Attribute {
                            value: expr,
                            attr,
                            attrid: None,
                            resolved: None,
                            ctx: ExprContext::Load,
                        },
                        self.span_from(start),
                    );
                }
                TokenKind::LParen => {
                    expr = self.parse_call(expr, start)?;
                }
                TokenKind::LBracket => {
                    self.advance();
                    let slice = self.parse_subscript_index()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = self.add_expr(
                        ExprKind::Subscript {
                            value: expr,
                            slice,
                            ctx: ExprContext::Load,
                        },
                        self.span_from(start),
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_atom(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        match self.tok.kind {
            TokenKind::Int => {
                let text = self.advance().text;
                let value = parse_int(&text).ok_or_else(|| {
                    ParseError::new(format!("integer literal {text} is out of range"), self.tok.span)
                })?;
                Ok(self.add_expr(ExprKind::constant(value), self.span_from(start)))
            }
            TokenKind::Float => {
                let text = self.advance().text;
                let value: f64 = text.parse().map_err(|_| {
                    ParseError::new(format!("bad float literal {text}"), self.tok.span)
                })?;
                Ok(self.add_expr(ExprKind::constant(Value::F64(value)), self.span_from(start)))
            }
            TokenKind::Str => {
                let text = self.advance().text;
                Ok(self.add_expr(
                    ExprKind::constant(Value::Str(unescape(&text))),
                    self.span_from(start),
                ))
            }
            TokenKind::RawStr | TokenKind::Docstring => {
                let text = self.advance().text;
                Ok(self.add_expr(ExprKind::constant(Value::Str(text)), self.span_from(start)))
            }
            TokenKind::Bytes => {
                let text = self.advance().text;
                Ok(self.add_expr(
                    ExprKind::constant(Value::Bytes(unescape(&text).into_bytes())),
                    self.span_from(start),
                ))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.add_expr(ExprKind::constant(Value::Bool(true)), self.span_from(start)))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.add_expr(ExprKind::constant(Value::Bool(false)), self.span_from(start)))
            }
            TokenKind::NoneKw => {
                self.advance();
                Ok(self.add_expr(ExprKind::constant(Value::None), self.span_from(start)))
            }
            TokenKind::FStringStart => self.parse_fstring(),
            TokenKind::Ident => {
                let id = self.advance().text;
                Ok(self.add_expr(ExprKind::name_load(id), self.span_from(start)))
            }
            TokenKind::LParen => self.parse_paren_form(),
            TokenKind::LBracket => self.parse_list_form(),
            TokenKind::LBrace => self.parse_brace_form(),
            TokenKind::Lambda => self.parse_lambda(),
            TokenKind::Await => {
                self.advance();
                let value = self.parse_primary()?;
                Ok(self.add_expr(ExprKind::Await { value }, self.span_from(start)))
            }
            TokenKind::Yield => self.parse_yield(),
            TokenKind::Operator => {
                let text = self.tok.text.clone();
                if text == "*" {
                    self.advance();
                    let value = self.parse_primary()?;
                    return Ok(self.add_expr(
                        ExprKind::Starred {
                            value,
                            ctx: ExprContext::Load,
                        },
                        self.span_from(start),
                    ));
                }
                let conf = op::lookup(text.as_str());
                if let Some(unary) = conf.and_then(|c| c.unary) {
                    self.advance();
                    let operand = self.parse_primary()?;
                    return Ok(self.add_expr(
                        ExprKind::UnaryOp {
                            op: unary,
                            operand,
                            native_op: None,
                        },
                        self.span_from(start),
                    ));
                }
                Err(ParseError::new(
                    format!("unexpected operator {text} in expression"),
                    self.tok.span,
                ))
            }
            _ => Err(ParseError::new(
                format!("expected an expression, got {:?}", self.tok.kind),
                self.tok.span,
            )),
        }
    }

    // ── Grouping, collections, comprehensions ──────────────────────────

    /// `(...)`: grouping, tuple, or generator expression.
    fn parse_paren_form(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        self.advance(); // (

        if self.at(TokenKind::RParen) {
            self.advance();
            return Ok(self.add_expr(
                ExprKind::TupleExpr {
                    elts: Vec::new(),
                    ctx: ExprContext::Load,
                },
                self.span_from(start),
            ));
        }

        let first = self.parse_expr()?;

        if self.at(TokenKind::For) || (self.at(TokenKind::Async) && self.peek_kind() == TokenKind::For)
        {
            let generators = self.parse_comprehension_generators()?;
            self.expect(TokenKind::RParen)?;
            return Ok(self.add_expr(
                ExprKind::GeneratorExp {
                    elt: first,
                    generators,
                },
                self.span_from(start),
            ));
        }

        if self.at(TokenKind::Comma) {
            let mut elts = vec![first];
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RParen) {
                    break;
                }
                elts.push(self.parse_expr()?);
            }
            self.expect(TokenKind::RParen)?;
            return Ok(self.add_expr(
                ExprKind::TupleExpr {
                    elts,
                    ctx: ExprContext::Load,
                },
                self.span_from(start),
            ));
        }

        self.expect(TokenKind::RParen)?;
        Ok(first)
    }

    /// `[...]`: list literal or list comprehension.
    fn parse_list_form(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        self.advance(); // [

        if self.at(TokenKind::RBracket) {
            self.advance();
            return Ok(self.add_expr(
                ExprKind::ListExpr {
                    elts: Vec::new(),
                    ctx: ExprContext::Load,
                },
                self.span_from(start),
            ));
        }

        let first = self.parse_expr()?;

        if self.at(TokenKind::For) || (self.at(TokenKind::Async) && self.peek_kind() == TokenKind::For)
        {
            let generators = self.parse_comprehension_generators()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(self.add_expr(
                ExprKind::ListComp {
                    elt: first,
                    generators,
                },
                self.span_from(start),
            ));
        }

        let mut elts = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.at(TokenKind::RBracket) {
                break;
            }
            elts.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(self.add_expr(
            ExprKind::ListExpr {
                elts,
                ctx: ExprContext::Load,
            },
            self.span_from(start),
        ))
    }

    /// `{...}`: dict or set, literal or comprehension. Dispatch happens
    /// after the first element: `:` means dict, `for` means comprehension.
    fn parse_brace_form(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        self.advance(); // {

        if self.at(TokenKind::RBrace) {
            self.advance();
            return Ok(self.add_expr(
                ExprKind::DictExpr {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                self.span_from(start),
            ));
        }

        let first = self.parse_expr()?;

        if self.at(TokenKind::Colon) {
            self.advance();
            let first_value = self.parse_expr()?;

            if self.at(TokenKind::For)
                || (self.at(TokenKind::Async) && self.peek_kind() == TokenKind::For)
            {
                let generators = self.parse_comprehension_generators()?;
                self.expect(TokenKind::RBrace)?;
                return Ok(self.add_expr(
                    ExprKind::DictComp {
                        key: first,
                        value: first_value,
                        generators,
                    },
                    self.span_from(start),
                ));
            }

            let mut keys = vec![first];
            let mut values = vec![first_value];
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RBrace) {
                    break;
                }
                keys.push(self.parse_expr()?);
                self.expect(TokenKind::Colon)?;
                values.push(self.parse_expr()?);
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(self.add_expr(
                ExprKind::DictExpr { keys, values },
                self.span_from(start),
            ));
        }

        if self.at(TokenKind::For) || (self.at(TokenKind::Async) && self.peek_kind() == TokenKind::For)
        {
            let generators = self.parse_comprehension_generators()?;
            self.expect(TokenKind::RBrace)?;
            return Ok(self.add_expr(
                ExprKind::SetComp {
                    elt: first,
                    generators,
                },
                self.span_from(start),
            ));
        }

        let mut elts = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.at(TokenKind::RBrace) {
                break;
            }
            elts.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.add_expr(ExprKind::SetExpr { elts }, self.span_from(start)))
    }

    /// `for target in iter [if cond]*`, repeated.
    fn parse_comprehension_generators(&mut self) -> PResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        loop {
            let is_async = if self.at(TokenKind::Async) {
                self.advance();
                true
            } else {
                false
            };
            if !self.at(TokenKind::For) {
                if is_async {
                    return Err(ParseError::expected(vec![TokenKind::For], &self.tok));
                }
                break;
            }
            self.advance(); // for

            let target = self.parse_target_list()?;
            crate::ops::context::set_context(&mut self.module.ast, target, ExprContext::Store);
            self.expect(TokenKind::In)?;
            let iter = self.parse_expr_nocond()?;

            let mut ifs = Vec::new();
            while self.at(TokenKind::If) {
                self.advance();
                ifs.push(self.parse_expr_nocond()?);
            }

            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });

            if !(self.at(TokenKind::For)
                || (self.at(TokenKind::Async) && self.peek_kind() == TokenKind::For))
            {
                break;
            }
        }
        Ok(generators)
    }

    // ── Calls ──────────────────────────────────────────────────────────

    fn parse_call(&mut self, func: ExprId, start: u32) -> PResult<ExprId> {
        self.advance(); // (

        let mut args = Vec::new();
        let mut varargs = Vec::new();
        let mut keywords = Vec::new();

        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::Operator) && self.tok.text == "*" {
                self.advance();
                varargs.push(self.parse_expr()?);
            } else if self.at(TokenKind::Ident) && self.peek_kind() == TokenKind::Assign {
                let arg = self.advance().text;
                self.advance(); // =
                let value = self.parse_expr()?;
                keywords.push(Keyword { arg, value });
            } else {
                let arg = self.parse_expr()?;
                // A bare generator argument: f(x for x in xs).
                if args.is_empty()
                    && keywords.is_empty()
                    && varargs.is_empty()
                    && self.at(TokenKind::For)
                {
                    let generators = self.parse_comprehension_generators()?;
                    let gen = self.add_expr(
                        ExprKind::GeneratorExp {
                            elt: arg,
                            generators,
                        },
                        self.span_from(start),
                    );
                    args.push(gen);
                    break;
                }
                args.push(arg);
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(self.add_expr(
            ExprKind::Call {
                func,
                args,
                varargs,
                keywords,
                jump_id: None,
            },
            self.span_from(start),
        ))
    }

    // ── Subscripts ─────────────────────────────────────────────────────

    /// The index expression of a subscript: a slice, a single expression,
    /// or a comma tuple.
    fn parse_subscript_index(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;

        let lower = if self.at(TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        if self.at(TokenKind::Colon) {
            self.advance();
            let upper = if self.at(TokenKind::RBracket) || self.at(TokenKind::Colon) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            let step = if self.eat(TokenKind::Colon) {
                if self.at(TokenKind::RBracket) {
                    None
                } else {
                    Some(self.parse_expr()?)
                }
            } else {
                None
            };
            return Ok(self.add_expr(
                ExprKind::Slice { lower, upper, step },
                self.span_from(start),
            ));
        }

        let first = lower.expect("non-slice subscript has an expression");
        if self.at(TokenKind::Comma) {
            let mut elts = vec![first];
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RBracket) {
                    break;
                }
                elts.push(self.parse_expr()?);
            }
            return Ok(self.add_expr(
                ExprKind::TupleExpr {
                    elts,
                    ctx: ExprContext::Load,
                },
                self.span_from(start),
            ));
        }

        Ok(first)
    }

    // ── Lambda / yield / f-strings ─────────────────────────────────────

    fn parse_lambda(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        self.advance(); // lambda

        let mut args = Arguments::default();
        while self.at(TokenKind::Ident) {
            let name = self.advance().text;
            args.args.push(Arg {
                arg: name,
                annotation: None,
            });
            if self.eat(TokenKind::Assign) {
                let default = self.parse_expr()?;
                args.defaults.push(default);
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::Colon)?;
        let body = self.parse_expr()?;
        Ok(self.add_expr(ExprKind::Lambda { args, body }, self.span_from(start)))
    }

    fn parse_yield(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        self.advance(); // yield

        if self.at(TokenKind::From) {
            self.advance();
            let value = self.parse_expr()?;
            return Ok(self.add_expr(ExprKind::YieldFrom { value }, self.span_from(start)));
        }

        let value = if self.at_expression_start() {
            Some(self.parse_expr_list()?)
        } else {
            None
        };
        Ok(self.add_expr(ExprKind::Yield { value }, self.span_from(start)))
    }

    fn parse_fstring(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        self.advance(); // f"

        let mut values = Vec::new();
        loop {
            match self.tok.kind {
                TokenKind::FStringText => {
                    let text = self.advance().text;
                    let text = text.replace("{{", "{").replace("}}", "}");
                    let id = self.add_expr(
                        ExprKind::constant(Value::Str(unescape(&text))),
                        self.span_from(start),
                    );
                    values.push(id);
                }
                TokenKind::FStringExprStart => {
                    self.advance();
                    let value = self.parse_expr()?;
                    let conversion = if self.at(TokenKind::FStringConversion) {
                        self.advance().text.chars().next()
                    } else {
                        None
                    };
                    let format_spec = if self.at(TokenKind::FStringFormatSpec) {
                        let spec = self.advance().text;
                        Some(self.add_expr(
                            ExprKind::constant(Value::Str(spec)),
                            self.span_from(start),
                        ))
                    } else {
                        None
                    };
                    self.expect(TokenKind::FStringExprEnd)?;
                    let id = self.add_expr(
                        ExprKind::FormattedValue {
                            value,
                            conversion,
                            format_spec,
                        },
                        self.span_from(start),
                    );
                    values.push(id);
                }
                TokenKind::FStringEnd => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(ParseError::new(
                        "unterminated f-string",
                        self.span_from(start),
                    ));
                }
            }
        }

        Ok(self.add_expr(ExprKind::JoinedStr { values }, self.span_from(start)))
    }

    // ── Targets ────────────────────────────────────────────────────────

    /// A single assignment/loop target: name, attribute, subscript,
    /// starred, or a parenthesized/bracketed target list.
    pub(crate) fn parse_target(&mut self) -> PResult<ExprId> {
        if self.at(TokenKind::Operator) && self.tok.text == "*" {
            let start = self.tok.span.start;
            self.advance();
            let value = self.parse_target()?;
            return Ok(self.add_expr(
                ExprKind::Starred {
                    value,
                    ctx: ExprContext::Load,
                },
                self.span_from(start),
            ));
        }
        self.parse_primary()
    }

    /// `a, b, *rest` target list folding into a tuple.
    pub(crate) fn parse_target_list(&mut self) -> PResult<ExprId> {
        let start = self.tok.span.start;
        let first = self.parse_target()?;
        if !self.at(TokenKind::Comma) {
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat(TokenKind::Comma) {
            if !self.at_expression_start() {
                break;
            }
            elts.push(self.parse_target()?);
        }
        Ok(self.add_expr(
            ExprKind::TupleExpr {
                elts,
                ctx: ExprContext::Load,
            },
            self.span_from(start),
        ))
    }
}

/// Parse an integer literal, preferring `i32`, widening to `i64`.
fn parse_int(text: &str) -> Option<Value> {
    if let Ok(v) = text.parse::<i32>() {
        return Some(Value::I32(v));
    }
    text.parse::<i64>().ok().map(Value::I64)
}

/// Process the common escape sequences; unknown escapes stay as written.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
