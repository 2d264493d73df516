// SPDX-License-Identifier: AGPL-3.0-or-later

//! Expression parsing using Pratt parsing for operators.

use caper_ast::span::Span;
use caper_ast::{
    BinaryOp, Expr, ExprId, ExprKind, LogicalOp, Program, TemplatePart, UnaryOp, UpdateOp,
};
use caper_lexer::cook::{self, CookError};
use caper_lexer::TokenKind;
use smol_str::SmolStr;

use crate::{ParseError, ParseErrorKind, ParseResult, Parser};

/// Operator precedence levels, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    None = 0,
    /// `=`
    Assignment = 1,
    /// `?:`
    Conditional = 2,
    /// `||`, `??`
    Or = 3,
    /// `&&`
    And = 4,
    /// `|`
    BitOr = 5,
    /// `^`
    BitXor = 6,
    /// `&`
    BitAnd = 7,
    /// `==`, `!=`, `===`, `!==`
    Equality = 8,
    /// `<`, `<=`, `>`, `>=`, `in`, `instanceof`
    Comparison = 9,
    /// `<<`, `>>`, `>>>`
    Shift = 10,
    /// `+`, `-`
    Term = 11,
    /// `*`, `/`, `%`, `**`
    Factor = 12,
    /// Prefix `! ~ + - typeof void delete`
    Unary = 13,
    /// `++`, `--`
    Update = 14,
    /// `()`, `.`, `[]`
    Call = 15,
}

impl<'t> Parser<'t> {
    /// Parse an expression.
    pub(crate) fn parse_expr(&mut self, p: &mut Program) -> ParseResult<ExprId> {
        self.parse_expr_prec(p, Precedence::None)
    }

    /// Parse an expression with a minimum binding power.
    ///
    /// Left-associativity falls out of the `<=` break: an operator of the
    /// same level as `min_prec` ends the loop, so equal-precedence chains
    /// group to the left. Assignment and ternary re-enter at `None` for
    /// right-associativity.
    fn parse_expr_prec(&mut self, p: &mut Program, min_prec: Precedence) -> ParseResult<ExprId> {
        let mut lhs = self.parse_prefix(p)?;

        loop {
            let prec = self.current_precedence();
            if prec <= min_prec {
                break;
            }
            lhs = self.parse_infix(p, lhs, prec)?;
        }

        Ok(lhs)
    }

    /// Parse a prefix expression (unary operator or primary).
    fn parse_prefix(&mut self, p: &mut Program) -> ParseResult<ExprId> {
        let token = self.peek().clone();

        let op = match token.kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_expr_prec(p, Precedence::Unary)?;
            let span = token.span.merge(p.exprs[operand].span);
            return Ok(p.exprs.alloc(Expr {
                span,
                kind: ExprKind::Unary { op, operand },
            }));
        }

        // Prefix increment/decrement binds to an identifier.
        if matches!(token.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if matches!(token.kind, TokenKind::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            let operand = self.parse_expr_prec(p, Precedence::Unary)?;
            let name = self.ident_target(p, operand)?;
            let span = token.span.merge(p.exprs[operand].span);
            return Ok(p.exprs.alloc(Expr {
                span,
                kind: ExprKind::Update {
                    op,
                    prefix: true,
                    name,
                },
            }));
        }

        self.parse_primary(p)
    }

    /// Parse a primary expression.
    fn parse_primary(&mut self, p: &mut Program) -> ParseResult<ExprId> {
        let token = self.advance();
        let span = token.span;

        let kind = match token.kind {
            TokenKind::Number(raw) | TokenKind::BigInt(raw) => {
                let value = cook::parse_number(&raw)
                    .map_err(|_| ParseError::new(span, ParseErrorKind::InvalidNumber))?;
                ExprKind::Number(value)
            }
            TokenKind::Str(raw) => {
                let text = cook::unescape(&raw).map_err(|e| self.cook_error(e, span))?;
                ExprKind::Str(SmolStr::new(text))
            }
            TokenKind::Bool(b) => ExprKind::Bool(b),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Ident(name) => ExprKind::Ident(name),

            TokenKind::TemplateLiteralStart => return self.parse_template(p, span),

            TokenKind::LParen => {
                let inner = self.parse_expr(p)?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }

            TokenKind::LBracket => {
                let mut elems = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    elems.push(self.parse_expr(p)?);
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RBracket)?;
                ExprKind::Array(elems)
            }

            TokenKind::LBrace => {
                let mut props = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.parse_object_key()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr(p)?;
                    props.push((key, value));
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RBrace)?;
                ExprKind::Object(props)
            }

            // Function expression, possibly anonymous.
            TokenKind::Function => {
                let name = if let TokenKind::Ident(n) = &self.peek().kind {
                    let n = n.clone();
                    self.advance();
                    n
                } else {
                    SmolStr::default()
                };
                self.expect(TokenKind::LParen)?;
                let params = self.parse_params()?;
                self.expect(TokenKind::RParen)?;
                if !self.check(&TokenKind::LBrace) {
                    let t = self.peek().clone();
                    return Err(ParseError::unexpected(t.span, t.kind, "function body"));
                }
                let body = self.parse_block(p)?;
                ExprKind::Function { name, params, body }
            }

            kind => return Err(ParseError::unexpected(span, kind, "expression")),
        };

        let span = span.merge(self.prev_span);
        let id = p.exprs.alloc(Expr { span, kind });
        Ok(id)
    }

    /// Parse an object-literal key: an identifier or a string literal.
    fn parse_object_key(&mut self) -> ParseResult<SmolStr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Str(raw) => {
                self.advance();
                let text = cook::unescape(&raw).map_err(|e| self.cook_error(e, token.span))?;
                Ok(SmolStr::new(text))
            }
            kind => Err(ParseError::unexpected(token.span, kind, "property key")),
        }
    }

    /// Parse the token sequence of a template literal whose start token was
    /// just consumed.
    fn parse_template(&mut self, p: &mut Program, start: Span) -> ParseResult<ExprId> {
        let mut parts = Vec::new();

        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::TemplateLiteralString(raw) => {
                    self.advance();
                    let text = cook::unescape(&raw).map_err(|e| self.cook_error(e, token.span))?;
                    parts.push(TemplatePart::Str(SmolStr::new(text)));
                }
                TokenKind::TemplateLiteralExprStart => {
                    self.advance();
                    let expr = self.parse_expr(p)?;
                    self.expect(TokenKind::TemplateLiteralExprEnd)?;
                    parts.push(TemplatePart::Expr(expr));
                }
                TokenKind::TemplateLiteralEnd => {
                    self.advance();
                    break;
                }
                kind => return Err(ParseError::unexpected(token.span, kind, "template literal")),
            }
        }

        let span = start.merge(self.prev_span);
        Ok(p.exprs.alloc(Expr {
            span,
            kind: ExprKind::Template(parts),
        }))
    }

    /// Parse an infix or postfix operation on `lhs`.
    fn parse_infix(&mut self, p: &mut Program, lhs: ExprId, prec: Precedence) -> ParseResult<ExprId> {
        let token = self.advance();

        // Assignment: the target must be a plain identifier.
        if matches!(token.kind, TokenKind::Eq) {
            let name = self.ident_target(p, lhs)?;
            let value = self.parse_expr_prec(p, Precedence::None)?;
            let span = p.exprs[lhs].span.merge(p.exprs[value].span);
            return Ok(p.exprs.alloc(Expr {
                span,
                kind: ExprKind::Assign { name, value },
            }));
        }

        // Ternary conditional.
        if matches!(token.kind, TokenKind::Question) {
            let then_expr = self.parse_expr_prec(p, Precedence::None)?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_expr_prec(p, Precedence::None)?;
            let span = p.exprs[lhs].span.merge(p.exprs[else_expr].span);
            return Ok(p.exprs.alloc(Expr {
                span,
                kind: ExprKind::Ternary {
                    cond: lhs,
                    then_expr,
                    else_expr,
                },
            }));
        }

        // Postfix increment/decrement.
        if matches!(token.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if matches!(token.kind, TokenKind::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            let name = self.ident_target(p, lhs)?;
            let span = p.exprs[lhs].span.merge(token.span);
            return Ok(p.exprs.alloc(Expr {
                span,
                kind: ExprKind::Update {
                    op,
                    prefix: false,
                    name,
                },
            }));
        }

        // Call, member, index.
        match token.kind {
            TokenKind::LParen => {
                let mut args = Vec::new();
                while !self.check(&TokenKind::RParen) {
                    args.push(self.parse_expr(p)?);
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                let end = self.expect(TokenKind::RParen)?;
                let span = p.exprs[lhs].span.merge(end);
                return Ok(p.exprs.alloc(Expr {
                    span,
                    kind: ExprKind::Call { callee: lhs, args },
                }));
            }
            TokenKind::Dot => {
                let prop = self.expect_ident()?;
                let span = p.exprs[lhs].span.merge(self.prev_span);
                return Ok(p.exprs.alloc(Expr {
                    span,
                    kind: ExprKind::Member { object: lhs, prop },
                }));
            }
            TokenKind::LBracket => {
                let index = self.parse_expr(p)?;
                let end = self.expect(TokenKind::RBracket)?;
                let span = p.exprs[lhs].span.merge(end);
                return Ok(p.exprs.alloc(Expr {
                    span,
                    kind: ExprKind::Index { object: lhs, index },
                }));
            }
            _ => {}
        }

        // Short-circuiting operators.
        let logical = match token.kind {
            TokenKind::AmpAmp => Some(LogicalOp::And),
            TokenKind::PipePipe => Some(LogicalOp::Or),
            TokenKind::QuestionQuestion => Some(LogicalOp::Nullish),
            _ => None,
        };
        if let Some(op) = logical {
            let rhs = self.parse_expr_prec(p, prec)?;
            let span = p.exprs[lhs].span.merge(p.exprs[rhs].span);
            return Ok(p.exprs.alloc(Expr {
                span,
                kind: ExprKind::Logical { op, lhs, rhs },
            }));
        }

        // Plain binary operators, left-associative.
        let op = match token.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::StarStar => BinaryOp::Pow,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::BangEq => BinaryOp::Ne,
            TokenKind::EqEqEq => BinaryOp::StrictEq,
            TokenKind::BangEqEq => BinaryOp::StrictNe,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::In => BinaryOp::In,
            TokenKind::Instanceof => BinaryOp::Instanceof,
            TokenKind::Amp => BinaryOp::BitAnd,
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::LtLt => BinaryOp::Shl,
            TokenKind::GtGt => BinaryOp::Shr,
            TokenKind::GtGtGt => BinaryOp::UShr,
            kind => return Err(ParseError::unexpected(token.span, kind, "operator")),
        };

        let rhs = self.parse_expr_prec(p, prec)?;
        let span = p.exprs[lhs].span.merge(p.exprs[rhs].span);
        Ok(p.exprs.alloc(Expr {
            span,
            kind: ExprKind::Binary { op, lhs, rhs },
        }))
    }

    /// Require that an expression is a plain identifier and return its name.
    fn ident_target(&self, p: &Program, expr: ExprId) -> ParseResult<SmolStr> {
        match &p.exprs[expr].kind {
            ExprKind::Ident(name) => Ok(name.clone()),
            _ => Err(ParseError::new(
                p.exprs[expr].span,
                ParseErrorKind::InvalidAssignmentTarget,
            )),
        }
    }

    fn cook_error(&self, e: CookError, span: Span) -> ParseError {
        let kind = match e {
            CookError::InvalidNumber => ParseErrorKind::InvalidNumber,
            CookError::InvalidEscapeSequence => ParseErrorKind::InvalidEscapeSequence,
        };
        ParseError::new(span, kind)
    }

    /// Get the binding power of the upcoming token.
    fn current_precedence(&self) -> Precedence {
        match &self.peek().kind {
            TokenKind::Eq => Precedence::Assignment,
            TokenKind::Question => Precedence::Conditional,
            TokenKind::PipePipe | TokenKind::QuestionQuestion => Precedence::Or,
            TokenKind::AmpAmp => Precedence::And,
            TokenKind::Pipe => Precedence::BitOr,
            TokenKind::Caret => Precedence::BitXor,
            TokenKind::Amp => Precedence::BitAnd,
            TokenKind::EqEq | TokenKind::BangEq | TokenKind::EqEqEq | TokenKind::BangEqEq => {
                Precedence::Equality
            }
            TokenKind::Lt
            | TokenKind::Le
            | TokenKind::Gt
            | TokenKind::Ge
            | TokenKind::In
            | TokenKind::Instanceof => Precedence::Comparison,
            TokenKind::LtLt | TokenKind::GtGt | TokenKind::GtGtGt => Precedence::Shift,
            TokenKind::Plus | TokenKind::Minus => Precedence::Term,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent | TokenKind::StarStar => {
                Precedence::Factor
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => Precedence::Update,
            TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket => Precedence::Call,
            _ => Precedence::None,
        }
    }
}
