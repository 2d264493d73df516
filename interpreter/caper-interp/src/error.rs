// SPDX-License-Identifier: AGPL-3.0-or-later

//! Runtime errors for the interpreter.

use crate::value::Value;
use caper_ast::span::Span;
use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A runtime error.
///
/// `Return`, `Break`, and `Continue` are not user errors: they are the
/// unwinding carriers for non-local control flow, caught at call and loop
/// boundaries. One of them escaping to the top level is a program error and
/// is reported with the message below.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String, span: Option<Span> },

    #[error("assignment to constant variable: {name}")]
    ConstReassignment { name: String, span: Option<Span> },

    #[error("cannot call non-function value of type {ty}")]
    NotCallable { ty: String, span: Option<Span> },

    #[error("not an object: {ty}")]
    NotAnObject { ty: String, span: Option<Span> },

    #[error("not an array: {ty}")]
    NotAnArray { ty: String, span: Option<Span> },

    #[error("index out of bounds: {index} >= {len}")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        span: Option<Span>,
    },

    #[error("too many arguments: {name} takes {expected}, got {got}")]
    TooManyArguments {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("not a string: {ty}")]
    NotAString { ty: String, span: Option<Span> },

    #[error("type error: {message}")]
    TypeError { message: String, span: Option<Span> },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("not implemented: {message}")]
    NotImplemented { message: String },

    #[error("maximum call depth exceeded")]
    StackOverflow,

    #[error("return outside function")]
    Return(Value),

    #[error("break outside loop")]
    Break,

    #[error("continue outside loop")]
    Continue,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
            span: None,
        }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            span: None,
        }
    }

    /// Get the span of this error if one was attached.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UndefinedVariable { span, .. }
            | Self::ConstReassignment { span, .. }
            | Self::NotCallable { span, .. }
            | Self::NotAnObject { span, .. }
            | Self::NotAnArray { span, .. }
            | Self::IndexOutOfBounds { span, .. }
            | Self::NotAString { span, .. }
            | Self::TypeError { span, .. } => *span,
            _ => None,
        }
    }

    /// Attach a span if the error does not already carry one.
    pub fn with_span(mut self, new: Span) -> Self {
        match &mut self {
            Self::UndefinedVariable { span, .. }
            | Self::ConstReassignment { span, .. }
            | Self::NotCallable { span, .. }
            | Self::NotAnObject { span, .. }
            | Self::NotAnArray { span, .. }
            | Self::IndexOutOfBounds { span, .. }
            | Self::NotAString { span, .. }
            | Self::TypeError { span, .. } => {
                if span.is_none() {
                    *span = Some(new);
                }
            }
            _ => {}
        }
        self
    }

    /// Format this error with line:column information from source.
    pub fn format_with_source(&self, source: &str) -> String {
        if let Some(span) = self.span() {
            format!("{}: {}", span.location(source), self)
        } else {
            self.to_string()
        }
    }
}
