//! `match` pattern parsing.
//!
//! Value patterns (constants), class patterns, sequence patterns `[...]`,
//! mapping patterns `{k: p, **rest}`, captures (`as`), stars (`*name`),
//! and or-patterns (`a | b`).

use kiwi_common::node::PatId;
use kiwi_common::token::TokenKind;
use kiwi_common::value::Value;

use kiwi_lexer::buffer::Buffer;

use crate::ast::{ExprKind, PatKind};
use crate::error::ParseError;

use super::{PResult, Parser};

impl<B: Buffer> Parser<B> {
    /// Parse a full case pattern (or-pattern with optional trailing `as`).
    pub(crate) fn parse_pattern(&mut self) -> PResult<PatId> {
        let start = self.tok.span.start;
        let first = self.parse_pattern_atom()?;

        // Or-pattern: `a | b | c`.
        let mut pattern = if self.at(TokenKind::Operator) && self.tok.text == "|" {
            let mut patterns = vec![first];
            while self.at(TokenKind::Operator) && self.tok.text == "|" {
                self.advance();
                patterns.push(self.parse_pattern_atom()?);
            }
            self.module
                .ast
                .add_pat(PatKind::MatchOr { patterns }, self.span_from(start))
        } else {
            first
        };

        // Capture: `pattern as name`.
        if self.eat(TokenKind::As) {
            let name = self.expect(TokenKind::Ident)?.text;
            pattern = self.module.ast.add_pat(
                PatKind::MatchAs {
                    pattern: Some(pattern),
                    name: Some(name),
                },
                self.span_from(start),
            );
        }

        Ok(pattern)
    }

    fn parse_pattern_atom(&mut self) -> PResult<PatId> {
        let start = self.tok.span.start;
        match self.tok.kind {
            // Singletons compare by identity.
            TokenKind::NoneKw => {
                self.advance();
                Ok(self
                    .module
                    .ast
                    .add_pat(PatKind::MatchSingleton { value: Value::None }, self.span_from(start)))
            }
            TokenKind::True | TokenKind::False => {
                let truth = self.at(TokenKind::True);
                self.advance();
                Ok(self.module.ast.add_pat(
                    PatKind::MatchSingleton {
                        value: Value::Bool(truth),
                    },
                    self.span_from(start),
                ))
            }

            // Literals compare by equality. A leading minus is part of the
            // literal pattern.
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::RawStr
            | TokenKind::Bytes => {
                let value = self.parse_primary()?;
                Ok(self
                    .module
                    .ast
                    .add_pat(PatKind::MatchValue { value }, self.span_from(start)))
            }
            TokenKind::Operator if self.tok.text == "-" => {
                let value = self.parse_primary()?;
                Ok(self
                    .module
                    .ast
                    .add_pat(PatKind::MatchValue { value }, self.span_from(start)))
            }

            // `*rest` inside sequences.
            TokenKind::Operator if self.tok.text == "*" => {
                self.advance();
                let name = self.expect(TokenKind::Ident)?.text;
                let name = (name != "_").then_some(name);
                Ok(self
                    .module
                    .ast
                    .add_pat(PatKind::MatchStar { name }, self.span_from(start)))
            }

            // Sequence pattern.
            TokenKind::LBracket => {
                self.advance();
                let mut patterns = Vec::new();
                while !self.at(TokenKind::RBracket) {
                    patterns.push(self.parse_pattern()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(self
                    .module
                    .ast
                    .add_pat(PatKind::MatchSequence { patterns }, self.span_from(start)))
            }

            // Mapping pattern.
            TokenKind::LBrace => {
                self.advance();
                let mut keys = Vec::new();
                let mut patterns = Vec::new();
                let mut rest = None;
                while !self.at(TokenKind::RBrace) {
                    if self.at(TokenKind::Operator) && self.tok.text == "**" {
                        self.advance();
                        rest = Some(self.expect(TokenKind::Ident)?.text);
                    } else {
                        keys.push(self.parse_expr()?);
                        self.expect(TokenKind::Colon)?;
                        patterns.push(self.parse_pattern()?);
                    }
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(self.module.ast.add_pat(
                    PatKind::MatchMapping {
                        keys,
                        patterns,
                        rest,
                    },
                    self.span_from(start),
                ))
            }

            // Name: wildcard, capture, or class pattern.
            TokenKind::Ident => {
                let name = self.advance().text;
                if self.at(TokenKind::LParen) {
                    let cls = self
                        .add_expr(ExprKind::name_load(name), self.span_from(start));
                    return self.parse_class_pattern(cls, start);
                }
                if name == "_" {
                    return Ok(self.module.ast.add_pat(
                        PatKind::MatchAs {
                            pattern: None,
                            name: None,
                        },
                        self.span_from(start),
                    ));
                }
                Ok(self.module.ast.add_pat(
                    PatKind::MatchAs {
                        pattern: None,
                        name: Some(name),
                    },
                    self.span_from(start),
                ))
            }

            // Parenthesized pattern.
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_pattern()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }

            _ => Err(ParseError::new(
                format!("expected a pattern, got {:?}", self.tok.kind),
                self.tok.span,
            )),
        }
    }

    /// `Name(p1, p2, attr=p3)`.
    fn parse_class_pattern(&mut self, cls: kiwi_common::node::ExprId, start: u32) -> PResult<PatId> {
        self.expect(TokenKind::LParen)?;

        let mut patterns = Vec::new();
        let mut kwd_attrs = Vec::new();
        let mut kwd_patterns = Vec::new();

        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::Ident) && self.peek_kind() == TokenKind::Assign {
                let attr = self.advance().text;
                self.advance(); // =
                kwd_attrs.push(attr);
                kwd_patterns.push(self.parse_pattern()?);
            } else {
                patterns.push(self.parse_pattern()?);
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(self.module.ast.add_pat(
            PatKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            },
            self.span_from(start),
        ))
    }
}
