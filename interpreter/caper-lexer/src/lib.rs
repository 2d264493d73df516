// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lexer for the Caper scripting language.
//!
//! Tokenization runs in two phases. A `logos`-generated scanner produces the
//! flat token stream: keywords, identifiers, numeric literals in four bases,
//! quoted strings, operators, and punctuation, with comments and whitespace
//! skipped. Template literals cannot be tokenized by a DFA — interpolations
//! contain arbitrary nested expressions — so the scanner captures each
//! template as one raw token and [`tokenize`] re-emits it as a
//! start/chunk/interpolation/end sequence, lexing every `${…}` body with a
//! recursive scanner invocation whose spans are biased back into the
//! original buffer.
//!
//! Numeric and string tokens carry their raw lexeme; decoding to values
//! happens in [`cook`] when the parser asks for it.

pub mod cook;

use caper_ast::span::Span;
use logos::Logos;
use smol_str::SmolStr;

/// A token with its span in the source.
#[derive(Debug, Clone)]
pub struct Token {
    /// The kind of this token.
    pub kind: TokenKind,
    /// The source span of this token.
    pub span: Span,
}

impl Token {
    /// Create a new token with the given kind and span.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// What went wrong while lexing.
#[derive(Debug, Clone, PartialEq, Eq, Default, thiserror::Error)]
pub enum LexErrorKind {
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unterminated string literal")]
    UnterminatedStringLiteral,
    #[error("unterminated template literal")]
    UnterminatedTemplateLiteral,
    #[error("missing digits in exponent")]
    InvalidExponent,
    /// No rule matched the leading byte.
    #[default]
    #[error("unrecognized token")]
    NotFound,
}

/// A lexer error with the span it occurred at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    /// Render as `line:column: message` by rescanning the source buffer.
    pub fn format_with_source(&self, source: &str) -> String {
        format!("{}: {}", self.span.location(source), self)
    }
}

/// Token kinds produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
#[logos(error = LexErrorKind)]
pub enum TokenKind {
    // === Keywords ===
    #[token("function")]
    Function,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("typeof")]
    Typeof,
    #[token("void")]
    Void,
    #[token("delete")]
    Delete,
    #[token("instanceof")]
    Instanceof,
    #[token("in")]
    In,
    #[token("of")]
    Of,
    #[token("class")]
    Class,
    #[token("extends")]
    Extends,
    #[token("super")]
    Super,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("throw")]
    Throw,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,

    // === Literals ===
    /// `true` / `false`.
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),

    #[token("null")]
    Null,

    /// Numeric literal in any base; carries the raw lexeme for [`cook`].
    #[regex(r"0[xX][0-9a-fA-F][0-9a-fA-F_]*", raw_lexeme)]
    #[regex(r"0[bB][01][01_]*", raw_lexeme)]
    #[regex(r"0[oO][0-7][0-7_]*", raw_lexeme)]
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?", raw_lexeme)]
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?[eE][+-]?", bad_exponent)]
    Number(SmolStr),

    /// Numeric literal with a trailing `n`; raw lexeme includes the suffix.
    #[regex(r"0[xX][0-9a-fA-F][0-9a-fA-F_]*n", raw_lexeme)]
    #[regex(r"0[bB][01][01_]*n", raw_lexeme)]
    #[regex(r"0[oO][0-7][0-7_]*n", raw_lexeme)]
    #[regex(r"[0-9][0-9_]*n", raw_lexeme)]
    BigInt(SmolStr),

    /// Quoted string; carries the raw body (quotes stripped, escapes intact).
    #[regex(r#""([^"\\\n\r]|\\[^\n\r])*""#, string_body)]
    #[regex(r#"'([^'\\\n\r]|\\[^\n\r])*'"#, string_body)]
    #[regex(r#""([^"\\\n\r]|\\[^\n\r])*"#, unterminated_string)]
    #[regex(r#"'([^'\\\n\r]|\\[^\n\r])*"#, unterminated_string)]
    Str(SmolStr),

    /// A whole backtick literal, captured raw by [`template_literal`] and
    /// expanded by [`tokenize`]. Never survives into the parser's stream.
    #[token("`", template_literal)]
    TemplateRaw,

    /// Opening backtick of a template literal.
    TemplateLiteralStart,
    /// A raw text chunk between interpolations (escapes intact).
    TemplateLiteralString(SmolStr),
    /// `${` opening an interpolation.
    TemplateLiteralExprStart,
    /// `}` closing an interpolation.
    TemplateLiteralExprEnd,
    /// Closing backtick of a template literal.
    TemplateLiteralEnd,

    // === Identifiers ===
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", raw_lexeme)]
    Ident(SmolStr),

    /// `#` immediately before an identifier start.
    #[token("#", private_marker)]
    Private,

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("**")]
    StarStar,
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("**=")]
    StarStarEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    BangEqEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("<<")]
    LtLt,
    #[token(">>")]
    GtGt,
    #[token(">>>")]
    GtGtGt,
    #[token("<<=")]
    LtLtEq,
    #[token(">>=")]
    GtGtEq,
    #[token(">>>=")]
    GtGtGtEq,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("??")]
    QuestionQuestion,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("&&=")]
    AmpAmpEq,
    #[token("||=")]
    PipePipeEq,
    #[token("??=")]
    QuestionQuestionEq,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("?.")]
    QuestionDot,
    #[token("?")]
    Question,
    #[token("=>")]
    Arrow,

    // === Punctuation ===
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    DotDotDot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // === Special ===
    /// End of input.
    Eof,
}

/// Keep the matched slice as the token payload.
fn raw_lexeme(lex: &mut logos::Lexer<TokenKind>) -> SmolStr {
    SmolStr::new(lex.slice())
}

fn bad_exponent(_lex: &mut logos::Lexer<TokenKind>) -> Result<SmolStr, LexErrorKind> {
    Err(LexErrorKind::InvalidExponent)
}

/// Strip the surrounding quotes; the body keeps its escapes raw.
fn string_body(lex: &mut logos::Lexer<TokenKind>) -> SmolStr {
    let s = lex.slice();
    SmolStr::new(&s[1..s.len() - 1])
}

fn unterminated_string(_lex: &mut logos::Lexer<TokenKind>) -> Result<SmolStr, LexErrorKind> {
    Err(LexErrorKind::UnterminatedStringLiteral)
}

/// `#` is only valid immediately before an identifier start.
fn private_marker(lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexErrorKind> {
    match lex.remainder().bytes().next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => Ok(()),
        _ => Err(LexErrorKind::UnexpectedCharacter),
    }
}

/// Consume a whole template literal after its opening backtick.
fn template_literal(lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexErrorKind> {
    let close = scan_template_body(lex.remainder().as_bytes(), 0)?;
    lex.bump(close + 1);
    Ok(())
}

/// Scan forward to the backtick that closes a template body starting at `i`.
///
/// Tracks `${ … }` brace depth so braces inside an interpolation do not end
/// the scan early; a backtick inside an interpolation opens a nested
/// template, which is skipped recursively. A backslash skips the next byte.
fn scan_template_body(bytes: &[u8], mut i: usize) -> Result<usize, LexErrorKind> {
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                if depth == 0 {
                    return Ok(i);
                }
                i = scan_template_body(bytes, i + 1)? + 1;
            }
            b'$' if depth == 0 && bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
            }
            b'{' if depth > 0 => {
                depth += 1;
                i += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    Err(LexErrorKind::UnterminatedTemplateLiteral)
}

/// Find the `}` that closes an interpolation whose body starts at `i`.
fn find_interp_end(bytes: &[u8], mut i: usize) -> Result<usize, LexErrorKind> {
    let mut depth = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => i = scan_template_body(bytes, i + 1)? + 1,
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    Err(LexErrorKind::UnterminatedTemplateLiteral)
}

/// Tokenize a source buffer into a vector of tokens terminated by [`TokenKind::Eof`].
///
/// A `#!` line at offset zero is skipped. Template literals arrive already
/// expanded into their start/chunk/interpolation/end sequence; every span is
/// an absolute byte range into `source`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let start = if source.starts_with("#!") {
        source.find('\n').map(|i| i + 1).unwrap_or(source.len())
    } else {
        0
    };

    let mut tokens = Vec::new();
    lex_into(&source[start..], start as u32, &mut tokens)?;
    tokens.push(Token::new(TokenKind::Eof, Span::empty(source.len() as u32)));
    Ok(tokens)
}

/// Run the scanner over `src`, biasing every span by `bias`, expanding
/// template literals as they are met.
fn lex_into(src: &str, bias: u32, out: &mut Vec<Token>) -> Result<(), LexError> {
    let mut lexer = TokenKind::lexer(src);
    while let Some(result) = lexer.next() {
        let raw = lexer.span();
        let span = Span::new(raw.start as u32 + bias, raw.end as u32 + bias);
        match result {
            Ok(TokenKind::TemplateRaw) => {
                let inner = &src[raw.start + 1..raw.end - 1];
                out.push(Token::new(
                    TokenKind::TemplateLiteralStart,
                    Span::new(span.start, span.start + 1),
                ));
                emit_template(inner, span.start + 1, out)?;
                out.push(Token::new(
                    TokenKind::TemplateLiteralEnd,
                    Span::new(span.end - 1, span.end),
                ));
            }
            Ok(kind) => out.push(Token::new(kind, span)),
            Err(kind) => return Err(LexError { kind, span }),
        }
    }
    Ok(())
}

/// Expand the body of a template literal located at absolute offset `at`.
///
/// Text chunks become [`TokenKind::TemplateLiteralString`]; each `${…}` body
/// is lexed by a recursive [`lex_into`] call between ExprStart/ExprEnd
/// markers, so nested templates fall out of the recursion.
fn emit_template(inner: &str, at: u32, out: &mut Vec<Token>) -> Result<(), LexError> {
    let bytes = inner.as_bytes();
    let mut chunk_start = 0usize;
    let mut i = 0usize;

    let err_at = |kind: LexErrorKind, from: usize, to: usize| LexError {
        kind,
        span: Span::new(at + from as u32, at + to.min(bytes.len()) as u32),
    };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                if i > chunk_start {
                    out.push(Token::new(
                        TokenKind::TemplateLiteralString(SmolStr::new(&inner[chunk_start..i])),
                        Span::new(at + chunk_start as u32, at + i as u32),
                    ));
                }
                let body_start = i + 2;
                let close = find_interp_end(bytes, body_start)
                    .map_err(|kind| err_at(kind, i, bytes.len()))?;
                out.push(Token::new(
                    TokenKind::TemplateLiteralExprStart,
                    Span::new(at + i as u32, at + body_start as u32),
                ));
                lex_into(&inner[body_start..close], at + body_start as u32, out)?;
                out.push(Token::new(
                    TokenKind::TemplateLiteralExprEnd,
                    Span::new(at + close as u32, at + close as u32 + 1),
                ));
                chunk_start = close + 1;
                i = chunk_start;
            }
            _ => i += 1,
        }
    }

    if chunk_start < bytes.len() {
        out.push(Token::new(
            TokenKind::TemplateLiteralString(SmolStr::new(&inner[chunk_start..])),
            Span::new(at + chunk_start as u32, at + bytes.len() as u32),
        ));
    }
    Ok(())
}
