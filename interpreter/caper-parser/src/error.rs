// SPDX-License-Identifier: AGPL-3.0-or-later

//! Syntax errors.
//!
//! Mirrors the lexer's error shape: one struct pinning a [`ParseErrorKind`]
//! to the span it was detected at. Literal-decoding failures from
//! `caper_lexer::cook` are re-raised here so they carry the literal's span.

use caper_ast::span::Span;
use caper_lexer::TokenKind;
use smol_str::SmolStr;
use thiserror::Error;

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A syntax error at a known location.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

/// What the parser objected to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected:?}, found {found:?}")]
    ExpectedToken {
        expected: TokenKind,
        found: TokenKind,
    },

    #[error("unexpected {found:?} while parsing {wanted}")]
    UnexpectedToken {
        found: TokenKind,
        wanted: &'static str,
    },

    #[error("expected an identifier, found {found:?}")]
    ExpectedIdentifier { found: TokenKind },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("const declaration of '{name}' has no initializer")]
    ConstantWithoutInitializer { name: SmolStr },

    #[error("only a plain identifier can be assigned to")]
    InvalidAssignmentTarget,

    #[error("invalid numeric literal")]
    InvalidNumber,

    #[error("invalid escape sequence")]
    InvalidEscapeSequence,
}

impl ParseError {
    pub fn new(span: Span, kind: ParseErrorKind) -> Self {
        Self { kind, span }
    }

    /// The parser hit `found` where the grammar for `wanted` has no rule.
    pub fn unexpected(span: Span, found: TokenKind, wanted: &'static str) -> Self {
        Self::new(span, ParseErrorKind::UnexpectedToken { found, wanted })
    }

    /// Render as `line:column: message` against the source buffer.
    pub fn format_with_source(&self, source: &str) -> String {
        format!("{}: {}", self.span.location(source), self.kind)
    }
}
