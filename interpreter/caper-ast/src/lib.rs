// SPDX-License-Identifier: AGPL-3.0-or-later

//! Abstract syntax tree definitions for the Caper scripting language.
//!
//! All statement and expression nodes are owned by per-program arenas and
//! referenced by index, so the tree is cheap to build, cheap to drop, and
//! structurally acyclic. Source locations are preserved on every node for
//! error reporting.

pub mod span;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;
use span::Span;

/// Identifier atom.
pub type Ident = SmolStr;

/// Index into the expression arena.
pub type ExprId = Idx<Expr>;

/// Index into the statement arena.
pub type StmtId = Idx<Stmt>;

/// A complete parsed program: top-level statements plus the arenas that own
/// every node reachable from them.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Top-level statements in source order.
    pub body: Vec<StmtId>,
    /// Statement arena.
    pub stmts: Arena<Stmt>,
    /// Expression arena.
    pub exprs: Arena<Expr>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A statement with its source span.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

/// Binding kind of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

impl DeclKind {
    /// The surface keyword for this declaration kind.
    pub fn keyword(self) -> &'static str {
        match self {
            DeclKind::Var => "var",
            DeclKind::Let => "let",
            DeclKind::Const => "const",
        }
    }
}

/// Statement forms.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Expression statement: `expr;`
    Expr(ExprId),
    /// Brace-delimited statement list.
    Block(Vec<StmtId>),
    /// `let x = init;` / `const x = init;` / `var x;`
    VarDecl {
        kind: DeclKind,
        name: Ident,
        init: Option<ExprId>,
    },
    /// `function name(params) { body }` — body is always a `Block`.
    FuncDecl {
        name: Ident,
        params: Vec<Ident>,
        body: StmtId,
    },
    /// `if (cond) stmt [else stmt]`
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    /// `while (cond) stmt`
    While { cond: ExprId, body: StmtId },
    /// `for (init?; cond?; step?) stmt` — init is a declaration or
    /// expression statement; an absent condition loops forever.
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    },
    /// `return expr?;`
    Return(Option<ExprId>),
    /// `break;`
    Break,
    /// `continue;`
    Continue,
}

/// An expression with its source span.
#[derive(Debug, Clone)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `typeof x`
    Typeof,
    /// `void x`
    Void,
    /// `delete x.y`
    Delete,
}

/// `++` / `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
}

/// Non-short-circuiting binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Instanceof,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

/// Short-circuiting operators; the right operand is only evaluated when the
/// left does not decide the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Nullish,
}

/// One piece of a template literal.
#[derive(Debug, Clone)]
pub enum TemplatePart {
    /// A decoded text chunk.
    Str(SmolStr),
    /// An `${interpolation}`.
    Expr(ExprId),
}

/// Expression forms.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    Str(SmolStr),
    Bool(bool),
    Null,
    Ident(Ident),
    Template(Vec<TemplatePart>),
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        name: Ident,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Logical {
        op: LogicalOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// `name = value` — the only assignment target is an identifier.
    Assign {
        name: Ident,
        value: ExprId,
    },
    Ternary {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    /// `object.prop`
    Member {
        object: ExprId,
        prop: Ident,
    },
    /// `object[index]`
    Index {
        object: ExprId,
        index: ExprId,
    },
    Array(Vec<ExprId>),
    /// Keys preserve source order.
    Object(Vec<(Ident, ExprId)>),
    /// `function name?(params) { body }` in expression position; `name` is
    /// empty for anonymous functions.
    Function {
        name: Ident,
        params: Vec<Ident>,
        body: StmtId,
    },
}
