// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parser for the Caper scripting language.
//!
//! A hand-written recursive descent parser over the token vector produced by
//! `caper-lexer`. Statements are parsed by leading-token dispatch; expressions
//! by the Pratt parser in [`expr`]. All nodes land in the [`Program`] arenas
//! with full source spans.
//!
//! The parser stops at the first error; a run produces one diagnostic.

mod error;
mod expr;

use caper_ast::span::Span;
use caper_ast::{DeclKind, Ident, Program, Stmt, StmtId, StmtKind};
use caper_lexer::{Token, TokenKind};
use smol_str::SmolStr;

pub use error::{ParseError, ParseErrorKind, ParseResult};

/// Parser over a lexed token vector.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    prev_span: Span,
}

impl<'t> Parser<'t> {
    /// Create a new parser for the given tokens (must end with `Eof`).
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            prev_span: Span::dummy(),
        }
    }

    /// Parse a complete program.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut program = Program::new();

        while !self.is_eof() {
            let stmt = self.parse_stmt(&mut program)?;
            program.body.push(stmt);
        }

        Ok(program)
    }

    /// Parse a single statement.
    fn parse_stmt(&mut self, p: &mut Program) -> ParseResult<StmtId> {
        let token = self.peek().clone();
        let start = token.span;

        match token.kind {
            TokenKind::Let => self.parse_var_decl(p, DeclKind::Let),
            TokenKind::Const => self.parse_var_decl(p, DeclKind::Const),
            TokenKind::Var => self.parse_var_decl(p, DeclKind::Var),
            TokenKind::Function => self.parse_func_decl(p),
            TokenKind::If => self.parse_if(p),
            TokenKind::While => self.parse_while(p),
            TokenKind::For => self.parse_for(p),
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr(p)?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(self.alloc_stmt(p, start, StmtKind::Return(value)))
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(self.alloc_stmt(p, start, StmtKind::Break))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(self.alloc_stmt(p, start, StmtKind::Continue))
            }
            TokenKind::LBrace => self.parse_block(p),
            _ => {
                let expr = self.parse_expr(p)?;
                self.expect(TokenKind::Semi)?;
                Ok(self.alloc_stmt(p, start, StmtKind::Expr(expr)))
            }
        }
    }

    /// Parse `let|const|var name [= init] ;`.
    fn parse_var_decl(&mut self, p: &mut Program, kind: DeclKind) -> ParseResult<StmtId> {
        let start = self.advance().span;
        let name = self.expect_ident()?;

        let init = if self.check(&TokenKind::Eq) {
            self.advance();
            Some(self.parse_expr(p)?)
        } else {
            None
        };

        if kind == DeclKind::Const && init.is_none() {
            return Err(ParseError::new(
                start.merge(self.prev_span),
                ParseErrorKind::ConstantWithoutInitializer { name },
            ));
        }

        self.expect(TokenKind::Semi)?;
        Ok(self.alloc_stmt(p, start, StmtKind::VarDecl { kind, name, init }))
    }

    /// Parse `function name(params) { body }`.
    fn parse_func_decl(&mut self, p: &mut Program) -> ParseResult<StmtId> {
        let start = self.advance().span;
        let name = self.expect_ident()?;

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        if !self.check(&TokenKind::LBrace) {
            let t = self.peek().clone();
            return Err(ParseError::unexpected(t.span, t.kind, "function body"));
        }
        let body = self.parse_block(p)?;

        Ok(self.alloc_stmt(p, start, StmtKind::FuncDecl { name, params, body }))
    }

    /// Parse a comma-separated parameter list (the caller owns the parens).
    fn parse_params(&mut self) -> ParseResult<Vec<Ident>> {
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        Ok(params)
    }

    fn parse_if(&mut self, p: &mut Program) -> ParseResult<StmtId> {
        let start = self.advance().span;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr(p)?;
        self.expect(TokenKind::RParen)?;

        let then_branch = self.parse_stmt(p)?;
        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            Some(self.parse_stmt(p)?)
        } else {
            None
        };

        Ok(self.alloc_stmt(
            p,
            start,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
        ))
    }

    fn parse_while(&mut self, p: &mut Program) -> ParseResult<StmtId> {
        let start = self.advance().span;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr(p)?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmt(p)?;
        Ok(self.alloc_stmt(p, start, StmtKind::While { cond, body }))
    }

    /// Parse `for (init?; cond?; step?) stmt`.
    ///
    /// The init clause may be a variable declaration or an expression
    /// statement; both consume their own semicolon.
    fn parse_for(&mut self, p: &mut Program) -> ParseResult<StmtId> {
        let start = self.advance().span;
        self.expect(TokenKind::LParen)?;

        let init = match self.peek().kind {
            TokenKind::Semi => {
                self.advance();
                None
            }
            TokenKind::Let => Some(self.parse_var_decl(p, DeclKind::Let)?),
            TokenKind::Const => Some(self.parse_var_decl(p, DeclKind::Const)?),
            TokenKind::Var => Some(self.parse_var_decl(p, DeclKind::Var)?),
            _ => {
                let span = self.peek().span;
                let expr = self.parse_expr(p)?;
                self.expect(TokenKind::Semi)?;
                Some(self.alloc_stmt(p, span, StmtKind::Expr(expr)))
            }
        };

        let cond = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr(p)?)
        };
        self.expect(TokenKind::Semi)?;

        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr(p)?)
        };
        self.expect(TokenKind::RParen)?;

        let body = self.parse_stmt(p)?;
        Ok(self.alloc_stmt(
            p,
            start,
            StmtKind::For {
                init,
                cond,
                step,
                body,
            },
        ))
    }

    /// Parse `{ stmt* }`.
    fn parse_block(&mut self, p: &mut Program) -> ParseResult<StmtId> {
        let start = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            stmts.push(self.parse_stmt(p)?);
        }

        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc_stmt(p, start, StmtKind::Block(stmts)))
    }

    fn alloc_stmt(&mut self, p: &mut Program, start: Span, kind: StmtKind) -> StmtId {
        let span = start.merge(self.prev_span);
        p.stmts.alloc(Stmt { span, kind })
    }

    // === Helper methods ===

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.prev_span = token.span;
        token
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Span> {
        if self.check(&kind) {
            Ok(self.advance().span)
        } else {
            let found = self.peek().clone();
            if matches!(found.kind, TokenKind::Eof) {
                return Err(ParseError::new(found.span, ParseErrorKind::UnexpectedEof));
            }
            Err(ParseError::new(
                found.span,
                ParseErrorKind::ExpectedToken {
                    expected: kind,
                    found: found.kind,
                },
            ))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<SmolStr> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            let found = self.peek().clone();
            Err(ParseError::new(
                found.span,
                ParseErrorKind::ExpectedIdentifier { found: found.kind },
            ))
        }
    }
}

/// Parse a token vector into a program.
pub fn parse(tokens: &[Token]) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}
