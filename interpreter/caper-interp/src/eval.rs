// SPDX-License-Identifier: AGPL-3.0-or-later

//! Statement and expression evaluation.

use crate::builtins;
use crate::env::{self, SetFailure};
use crate::error::{RuntimeError, RuntimeResult};
use crate::gc::{Handle, Heap, HeapObj, PropMap};
use crate::value::{
    strict_eq, to_display_string, to_int32, to_uint32, format_number, Function, Value,
};
use caper_ast::{
    BinaryOp, ExprId, ExprKind, LogicalOp, Program, StmtId, StmtKind, TemplatePart, UnaryOp,
    UpdateOp,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use smol_str::SmolStr;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum call depth to prevent host stack overflow.
const MAX_CALL_DEPTH: usize = 1000;

/// The Caper interpreter: one heap, one environment chain, two output sinks.
pub struct Interp {
    pub(crate) heap: Heap,
    /// The global frame. Natives are registered here before execution.
    globals: Handle,
    /// Active frames of the current call chain, innermost last. Together
    /// with `globals` these are the environment roots for collection.
    envs: Vec<Handle>,
    /// In-flight values held across nested evaluation, rooted for the
    /// collector. Multi-step sites push here around inner `eval_expr` calls.
    scratch: Vec<Value>,
    depth: usize,
    pub(crate) rng: SmallRng,
    pub(crate) out: Box<dyn Write>,
    pub(crate) err: Box<dyn Write>,
}

impl Interp {
    /// Create an interpreter writing to the given sinks, with the standard
    /// globals (`console`, `Math`, `JSON`, `undefined`, …) registered.
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        let mut heap = Heap::new();
        let globals = env::alloc(&mut heap, None);

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x00c0_ffee);

        let mut interp = Self {
            heap,
            globals,
            envs: Vec::new(),
            scratch: Vec::new(),
            depth: 0,
            rng: SmallRng::seed_from_u64(seed),
            out,
            err,
        };
        builtins::register(&mut interp);
        interp
    }

    /// Read access to the heap, for hosts inspecting results.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Execute a program. Returns the last top-level statement's value.
    pub fn run(&mut self, p: &Program) -> RuntimeResult<Value> {
        let mut last = Value::Undefined;
        for &stmt in &p.body {
            last = self.eval_stmt(p, stmt)?;
        }
        self.out.flush()?;
        Ok(last)
    }

    fn current_env(&self) -> Handle {
        self.envs.last().copied().unwrap_or(self.globals)
    }

    /// Collect if the allocation debt crossed the threshold. Roots are the
    /// whole active frame stack plus the scratch stack; parent frames and
    /// closures are reached transitively.
    fn maybe_collect(&mut self) {
        if self.heap.needs_collect() {
            let mut roots = Vec::with_capacity(self.envs.len() + 1);
            roots.push(self.globals);
            roots.extend_from_slice(&self.envs);
            self.heap.collect(&roots, &self.scratch);
        }
    }

    pub(crate) fn alloc(&mut self, obj: HeapObj) -> Handle {
        self.maybe_collect();
        self.heap.alloc(obj)
    }

    pub(crate) fn alloc_string(&mut self, s: String) -> Handle {
        self.alloc(HeapObj::Str(s))
    }

    fn alloc_env(&mut self, parent: Handle) -> Handle {
        self.maybe_collect();
        env::alloc(&mut self.heap, Some(parent))
    }

    pub(crate) fn define_global(&mut self, name: &'static str, value: Value, konst: bool) {
        env::define(&mut self.heap, self.globals, SmolStr::new(name), value, konst);
    }

    // === Statements ===

    fn eval_stmt(&mut self, p: &Program, id: StmtId) -> RuntimeResult<Value> {
        let stmt = &p.stmts[id];
        match &stmt.kind {
            StmtKind::Expr(e) => self.eval_expr(p, *e),

            StmtKind::Block(stmts) => {
                let block_env = self.alloc_env(self.current_env());
                self.envs.push(block_env);
                let result = self.eval_stmt_list(p, stmts);
                self.envs.pop();
                result
            }

            StmtKind::VarDecl { kind, name, init } => {
                let value = match init {
                    Some(e) => self.eval_expr(p, *e)?,
                    None => Value::Undefined,
                };
                let konst = *kind == caper_ast::DeclKind::Const;
                let env = self.current_env();
                env::define(&mut self.heap, env, name.clone(), value, konst);
                Ok(Value::Undefined)
            }

            StmtKind::FuncDecl { name, params, body } => {
                let func = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: *body,
                    closure: self.current_env(),
                }));
                let env = self.current_env();
                env::define(&mut self.heap, env, name.clone(), func, false);
                Ok(Value::Undefined)
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.eval_expr(p, *cond)?;
                if c.is_truthy(&self.heap) {
                    self.eval_stmt(p, *then_branch)
                } else if let Some(else_id) = else_branch {
                    self.eval_stmt(p, *else_id)
                } else {
                    Ok(Value::Undefined)
                }
            }

            StmtKind::While { cond, body } => {
                loop {
                    let c = self.eval_expr(p, *cond)?;
                    if !c.is_truthy(&self.heap) {
                        break;
                    }
                    match self.eval_stmt(p, *body) {
                        Ok(_) => {}
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(Value::Undefined)
            }

            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                // The init declaration scopes to the loop, not the enclosing
                // block.
                let loop_env = self.alloc_env(self.current_env());
                self.envs.push(loop_env);
                let result = self.eval_for(p, *init, *cond, *step, *body);
                self.envs.pop();
                result
            }

            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(p, *e)?,
                    None => Value::Undefined,
                };
                Err(RuntimeError::Return(v))
            }

            StmtKind::Break => Err(RuntimeError::Break),
            StmtKind::Continue => Err(RuntimeError::Continue),
        }
    }

    fn eval_stmt_list(&mut self, p: &Program, stmts: &[StmtId]) -> RuntimeResult<Value> {
        let mut last = Value::Undefined;
        for &s in stmts {
            last = self.eval_stmt(p, s)?;
        }
        Ok(last)
    }

    fn eval_for(
        &mut self,
        p: &Program,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    ) -> RuntimeResult<Value> {
        if let Some(init) = init {
            self.eval_stmt(p, init)?;
        }
        loop {
            if let Some(cond) = cond {
                let c = self.eval_expr(p, cond)?;
                if !c.is_truthy(&self.heap) {
                    break;
                }
            }
            match self.eval_stmt(p, body) {
                Ok(_) => {}
                Err(RuntimeError::Break) => break,
                Err(RuntimeError::Continue) => {}
                Err(e) => return Err(e),
            }
            if let Some(step) = step {
                self.eval_expr(p, step)?;
            }
        }
        Ok(Value::Undefined)
    }

    // === Expressions ===

    fn eval_expr(&mut self, p: &Program, id: ExprId) -> RuntimeResult<Value> {
        let expr = &p.exprs[id];
        let span = expr.span;

        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Str(s) => {
                let h = self.alloc_string(s.to_string());
                Ok(Value::Str(h))
            }

            ExprKind::Ident(name) => env::get(&self.heap, self.current_env(), name)
                .ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: name.to_string(),
                    span: Some(span),
                }),

            ExprKind::Template(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Str(s) => text.push_str(s),
                        TemplatePart::Expr(e) => {
                            let v = self.eval_expr(p, *e)?;
                            text.push_str(&to_display_string(&self.heap, &v));
                        }
                    }
                }
                Ok(Value::Str(self.alloc_string(text)))
            }

            ExprKind::Unary { op, operand } => self.eval_unary(p, *op, *operand, span),

            ExprKind::Update { op, prefix, name } => {
                let old = env::get(&self.heap, self.current_env(), name).ok_or_else(|| {
                    RuntimeError::UndefinedVariable {
                        name: name.to_string(),
                        span: Some(span),
                    }
                })?;
                let n = old.as_number().ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "cannot increment {} value",
                        old.type_name()
                    ))
                    .with_span(span)
                })?;
                let delta = if *op == UpdateOp::Inc { 1.0 } else { -1.0 };
                let new = n + delta;
                self.assign(name, Value::Number(new), span)?;
                Ok(Value::Number(if *prefix { new } else { n }))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval_expr(p, *lhs)?;
                self.scratch.push(l.clone());
                let r = self.eval_expr(p, *rhs);
                self.scratch.pop();
                let r = r?;
                self.binary_op(*op, &l, &r).map_err(|e| e.with_span(span))
            }

            ExprKind::Logical { op, lhs, rhs } => {
                let l = self.eval_expr(p, *lhs)?;
                match op {
                    LogicalOp::And => {
                        if l.is_truthy(&self.heap) {
                            self.eval_expr(p, *rhs)
                        } else {
                            Ok(l)
                        }
                    }
                    LogicalOp::Or => {
                        if l.is_truthy(&self.heap) {
                            Ok(l)
                        } else {
                            self.eval_expr(p, *rhs)
                        }
                    }
                    LogicalOp::Nullish => match l {
                        Value::Null | Value::Undefined => self.eval_expr(p, *rhs),
                        _ => Ok(l),
                    },
                }
            }

            ExprKind::Assign { name, value } => {
                let v = self.eval_expr(p, *value)?;
                self.assign(name, v.clone(), span)?;
                Ok(v)
            }

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let c = self.eval_expr(p, *cond)?;
                if c.is_truthy(&self.heap) {
                    self.eval_expr(p, *then_expr)
                } else {
                    self.eval_expr(p, *else_expr)
                }
            }

            ExprKind::Call { callee, args } => {
                let callee_span = p.exprs[*callee].span;
                let callee_v = self.eval_expr(p, *callee)?;

                let base = self.scratch.len();
                self.scratch.push(callee_v.clone());
                let mut arg_values = Vec::with_capacity(args.len());
                for &a in args {
                    match self.eval_expr(p, a) {
                        Ok(v) => {
                            self.scratch.push(v.clone());
                            arg_values.push(v);
                        }
                        Err(e) => {
                            self.scratch.truncate(base);
                            return Err(e);
                        }
                    }
                }

                let result = self.call_value(p, &callee_v, &arg_values, callee_span);
                self.scratch.truncate(base);
                result
            }

            ExprKind::Member { object, prop } => {
                let obj = self.eval_expr(p, *object)?;
                self.member_get(&obj, prop).map_err(|e| e.with_span(span))
            }

            ExprKind::Index { object, index } => {
                let obj = self.eval_expr(p, *object)?;
                self.scratch.push(obj.clone());
                let idx = self.eval_expr(p, *index);
                self.scratch.pop();
                let idx = idx?;

                match &idx {
                    // A string index behaves as member access.
                    Value::Str(h) => {
                        let key = self.heap.str_(*h).to_string();
                        self.member_get(&obj, &key).map_err(|e| e.with_span(span))
                    }
                    Value::Number(n) => match &obj {
                        Value::Array(h) => {
                            let i = n.floor();
                            let elems = self.heap.array(*h);
                            if i.is_nan() || i < 0.0 || i as usize >= elems.len() {
                                Ok(Value::Undefined)
                            } else {
                                Ok(elems[i as usize].clone())
                            }
                        }
                        _ => Ok(Value::Undefined),
                    },
                    _ => Ok(Value::Undefined),
                }
            }

            ExprKind::Array(elems) => {
                let h = self.alloc(HeapObj::Array(vec![Value::Undefined; elems.len()]));
                self.scratch.push(Value::Array(h));
                for (i, &e) in elems.iter().enumerate() {
                    match self.eval_expr(p, e) {
                        Ok(v) => self.heap.array_mut(h)[i] = v,
                        Err(err) => {
                            self.scratch.pop();
                            return Err(err);
                        }
                    }
                }
                self.scratch.pop();
                Ok(Value::Array(h))
            }

            ExprKind::Object(props) => {
                let h = self.alloc(HeapObj::Object(PropMap::default()));
                self.scratch.push(Value::Object(h));
                for (key, e) in props {
                    match self.eval_expr(p, *e) {
                        Ok(v) => self.heap.object_mut(h).insert(key.clone(), v),
                        Err(err) => {
                            self.scratch.pop();
                            return Err(err);
                        }
                    }
                }
                self.scratch.pop();
                Ok(Value::Object(h))
            }

            ExprKind::Function { name, params, body } => {
                Ok(Value::Function(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: *body,
                    closure: self.current_env(),
                })))
            }
        }
    }

    fn assign(
        &mut self,
        name: &SmolStr,
        value: Value,
        span: caper_ast::span::Span,
    ) -> RuntimeResult<()> {
        let env = self.current_env();
        match env::set(&mut self.heap, env, name, value) {
            Ok(()) => Ok(()),
            Err(SetFailure::Unbound) => Err(RuntimeError::UndefinedVariable {
                name: name.to_string(),
                span: Some(span),
            }),
            Err(SetFailure::Const) => Err(RuntimeError::ConstReassignment {
                name: name.to_string(),
                span: Some(span),
            }),
        }
    }

    fn eval_unary(
        &mut self,
        p: &Program,
        op: UnaryOp,
        operand: ExprId,
        span: caper_ast::span::Span,
    ) -> RuntimeResult<Value> {
        if op == UnaryOp::Delete {
            return self.eval_delete(p, operand, span);
        }

        let v = self.eval_expr(p, operand)?;
        match op {
            UnaryOp::Neg => Ok(match v {
                Value::Number(n) => Value::Number(-n),
                _ => Value::Undefined,
            }),
            UnaryOp::Plus => Ok(match v {
                Value::Number(n) => Value::Number(n),
                _ => Value::Undefined,
            }),
            UnaryOp::Not => Ok(Value::Bool(!v.is_truthy(&self.heap))),
            UnaryOp::BitNot => Ok(match v {
                Value::Number(n) => Value::Number(!to_int32(n) as f64),
                _ => Value::Undefined,
            }),
            UnaryOp::Typeof => {
                let h = self.alloc_string(v.typeof_name().to_string());
                Ok(Value::Str(h))
            }
            UnaryOp::Void => Ok(Value::Undefined),
            UnaryOp::Delete => unreachable!("delete handled above"),
        }
    }

    /// `delete obj.prop` / `delete obj[index]` removes the property and
    /// yields `true`; deleting anything without a property slot is a no-op
    /// that still yields `true`.
    fn eval_delete(
        &mut self,
        p: &Program,
        target: ExprId,
        span: caper_ast::span::Span,
    ) -> RuntimeResult<Value> {
        match &p.exprs[target].kind {
            ExprKind::Member { object, prop } => {
                let obj = self.eval_expr(p, *object)?;
                match obj {
                    Value::Object(h) => {
                        self.heap.object_mut(h).remove(prop);
                        Ok(Value::Bool(true))
                    }
                    other => Err(RuntimeError::NotAnObject {
                        ty: other.type_name().to_string(),
                        span: Some(span),
                    }),
                }
            }
            ExprKind::Index { object, index } => {
                let obj = self.eval_expr(p, *object)?;
                self.scratch.push(obj.clone());
                let idx = self.eval_expr(p, *index);
                self.scratch.pop();
                let idx = idx?;

                match (&obj, &idx) {
                    (Value::Object(h), Value::Str(k)) => {
                        let key = self.heap.str_(*k).to_string();
                        self.heap.object_mut(*h).remove(&key);
                        Ok(Value::Bool(true))
                    }
                    (Value::Object(h), Value::Number(n)) => {
                        let key = format_number(*n);
                        self.heap.object_mut(*h).remove(&key);
                        Ok(Value::Bool(true))
                    }
                    (Value::Array(h), Value::Number(n)) => {
                        let len = self.heap.array(*h).len();
                        let i = n.floor();
                        if i.is_nan() || i < 0.0 || i as usize >= len {
                            return Err(RuntimeError::IndexOutOfBounds {
                                index: if i >= 0.0 { i as usize } else { usize::MAX },
                                len,
                                span: Some(span),
                            });
                        }
                        self.heap.array_mut(*h)[i as usize] = Value::Undefined;
                        Ok(Value::Bool(true))
                    }
                    (other, Value::Number(_)) => Err(RuntimeError::NotAnArray {
                        ty: other.type_name().to_string(),
                        span: Some(span),
                    }),
                    _ => Ok(Value::Bool(true)),
                }
            }
            _ => {
                self.eval_expr(p, target)?;
                Ok(Value::Bool(true))
            }
        }
    }

    /// Non-short-circuiting binary dispatch.
    ///
    /// Numbers follow IEEE-754 double semantics; `+` on two strings
    /// concatenates; equality is strict for every type. Remaining mixed-type
    /// combinations yield `Undefined`.
    fn binary_op(&mut self, op: BinaryOp, l: &Value, r: &Value) -> RuntimeResult<Value> {
        use BinaryOp::*;

        // Equality never falls through to Undefined.
        match op {
            Eq | StrictEq => return Ok(Value::Bool(strict_eq(&self.heap, l, r))),
            Ne | StrictNe => return Ok(Value::Bool(!strict_eq(&self.heap, l, r))),
            In => return self.in_operator(l, r),
            Instanceof => return Ok(Value::Bool(false)),
            _ => {}
        }

        if let (Value::Number(a), Value::Number(b)) = (l, r) {
            let (a, b) = (*a, *b);
            return Ok(match op {
                Add => Value::Number(a + b),
                Sub => Value::Number(a - b),
                Mul => Value::Number(a * b),
                Div => Value::Number(a / b),
                Rem => Value::Number(a % b),
                Pow => Value::Number(a.powf(b)),
                Lt => Value::Bool(a < b),
                Le => Value::Bool(a <= b),
                Gt => Value::Bool(a > b),
                Ge => Value::Bool(a >= b),
                BitAnd => Value::Number((to_int32(a) & to_int32(b)) as f64),
                BitOr => Value::Number((to_int32(a) | to_int32(b)) as f64),
                BitXor => Value::Number((to_int32(a) ^ to_int32(b)) as f64),
                Shl => Value::Number((to_int32(a) << (to_uint32(b) & 31)) as f64),
                Shr => Value::Number((to_int32(a) >> (to_uint32(b) & 31)) as f64),
                UShr => Value::Number((to_uint32(a) >> (to_uint32(b) & 31)) as f64),
                Eq | Ne | StrictEq | StrictNe | In | Instanceof => {
                    unreachable!("handled above")
                }
            });
        }

        if op == Add {
            if let (Value::Str(a), Value::Str(b)) = (l, r) {
                let joined = format!("{}{}", self.heap.str_(*a), self.heap.str_(*b));
                let h = self.alloc_string(joined);
                return Ok(Value::Str(h));
            }
        }

        Ok(Value::Undefined)
    }

    /// `key in container`: property presence on objects, index presence on
    /// arrays.
    fn in_operator(&self, l: &Value, r: &Value) -> RuntimeResult<Value> {
        match r {
            Value::Object(h) => {
                let key = match l {
                    Value::Str(k) => self.heap.str_(*k).to_string(),
                    Value::Number(n) => format_number(*n),
                    other => {
                        return Err(RuntimeError::NotAString {
                            ty: other.type_name().to_string(),
                            span: None,
                        })
                    }
                };
                Ok(Value::Bool(self.heap.object(*h).contains_key(&key)))
            }
            Value::Array(h) => match l {
                Value::Number(n) => {
                    let i = n.floor();
                    let len = self.heap.array(*h).len();
                    Ok(Value::Bool(!i.is_nan() && i >= 0.0 && (i as usize) < len))
                }
                Value::Str(k) => Ok(Value::Bool(self.heap.str_(*k) == "length")),
                other => Err(RuntimeError::NotAString {
                    ty: other.type_name().to_string(),
                    span: None,
                }),
            },
            other => Err(RuntimeError::type_error(format!(
                "cannot use 'in' on {}",
                other.type_name()
            ))),
        }
    }

    fn member_get(&self, obj: &Value, prop: &str) -> RuntimeResult<Value> {
        match obj {
            Value::Object(h) => Ok(self
                .heap
                .object(*h)
                .get(prop)
                .cloned()
                .unwrap_or(Value::Undefined)),
            Value::Array(h) if prop == "length" => {
                Ok(Value::Number(self.heap.array(*h).len() as f64))
            }
            Value::Str(h) if prop == "length" => {
                Ok(Value::Number(self.heap.str_(*h).chars().count() as f64))
            }
            other => Err(RuntimeError::NotAnObject {
                ty: other.type_name().to_string(),
                span: None,
            }),
        }
    }

    // === Calls ===

    pub(crate) fn call_value(
        &mut self,
        p: &Program,
        callee: &Value,
        args: &[Value],
        span: caper_ast::span::Span,
    ) -> RuntimeResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow);
        }
        self.depth += 1;
        let result = self.call_value_inner(p, callee, args, span);
        self.depth -= 1;
        result
    }

    fn call_value_inner(
        &mut self,
        p: &Program,
        callee: &Value,
        args: &[Value],
        span: caper_ast::span::Span,
    ) -> RuntimeResult<Value> {
        match callee {
            Value::Function(f) => {
                if args.len() > f.params.len() {
                    return Err(RuntimeError::TooManyArguments {
                        name: f.name.to_string(),
                        expected: f.params.len(),
                        got: args.len(),
                    });
                }

                // The call frame is a child of the captured closure, not of
                // the caller: lexical scoping.
                let call_env = self.alloc_env(f.closure);
                for (i, param) in f.params.iter().enumerate() {
                    let v = args.get(i).cloned().unwrap_or(Value::Undefined);
                    env::define(&mut self.heap, call_env, param.clone(), v, false);
                }

                self.envs.push(call_env);
                let result = self.eval_stmt(p, f.body);
                self.envs.pop();

                match result {
                    Ok(v) => Ok(v),
                    Err(RuntimeError::Return(v)) => Ok(v),
                    Err(e) => Err(e),
                }
            }
            Value::Native(f) => (f.func)(self, args),
            other => Err(RuntimeError::NotCallable {
                ty: other.type_name().to_string(),
                span: Some(span),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    // The test interpreter writes into shared buffers.
    #[derive(Clone, Default)]
    struct Sink(std::rc::Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn eval_source(source: &str) -> RuntimeResult<(Value, String)> {
        let tokens = caper_lexer::tokenize(source).expect("lex failure");
        let program = caper_parser::parse(&tokens).expect("parse failure");
        let sink = Sink::default();
        let mut interp = Interp::new(Box::new(sink.clone()), Box::new(Sink::default()));
        let value = interp.run(&program)?;
        let out = String::from_utf8(sink.0.borrow().clone()).expect("non-utf8 output");
        Ok((value, out))
    }

    fn eval_value(source: &str) -> Value {
        eval_source(source).expect("runtime failure").0
    }

    #[test]
    fn test_arithmetic() {
        assert!(matches!(eval_value("1 + 2 * 3;"), Value::Number(n) if n == 7.0));
        assert!(matches!(eval_value("2 ** 3;"), Value::Number(n) if n == 8.0));
        assert!(matches!(eval_value("7 % 4;"), Value::Number(n) if n == 3.0));
        assert!(matches!(eval_value("1 / 0;"), Value::Number(n) if n.is_infinite()));
    }

    #[test]
    fn test_mixed_operands_yield_undefined() {
        assert!(matches!(eval_value("1 + \"a\";"), Value::Undefined));
        assert!(matches!(eval_value("true < 2;"), Value::Undefined));
    }

    #[test]
    fn test_string_concat() {
        let (v, _) = eval_source("\"foo\" + \"bar\";").expect("runtime failure");
        assert!(matches!(v, Value::Str(_)));
    }

    #[test]
    fn test_variables_and_assignment() {
        assert!(matches!(eval_value("let a = 1; a = a + 2; a;"), Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_const_reassignment_fails() {
        let err = eval_source("const k = 1; k = 2;").unwrap_err();
        assert!(matches!(err, RuntimeError::ConstReassignment { .. }));
    }

    #[test]
    fn test_undefined_variable() {
        let err = eval_source("missing;").unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_block_scope_does_not_leak() {
        let err = eval_source("{ let inner = 1; } inner;").unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_functions_and_closures() {
        assert!(matches!(
            eval_value("function f(x) { return x * x; } f(5);"),
            Value::Number(n) if n == 25.0
        ));

        // The closure captures its defining frame by reference.
        let v = eval_value(
            "function mk() { let c = 0; return function bump() { c = c + 1; return c; }; } \
             let f = mk(); f(); f(); f();",
        );
        assert!(matches!(v, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_lexical_scoping_not_dynamic() {
        // The free variable resolves against the defining scope.
        let v = eval_value(
            "let x = 1; function f() { return x; } \
             function g() { let x = 99; return f(); } g();",
        );
        assert!(matches!(v, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn test_missing_args_are_undefined_and_surplus_rejected() {
        assert!(matches!(
            eval_value("function f(a, b) { return b; } f(1);"),
            Value::Undefined
        ));

        let err = eval_source("function f(a) { return a; } f(1, 2);").unwrap_err();
        assert!(matches!(err, RuntimeError::TooManyArguments { .. }));
    }

    #[test]
    fn test_not_callable() {
        let err = eval_source("let x = 1; x();").unwrap_err();
        assert!(matches!(err, RuntimeError::NotCallable { .. }));
    }

    #[test]
    fn test_recursion_and_depth_guard() {
        assert!(matches!(
            eval_value("function fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } fib(10);"),
            Value::Number(n) if n == 55.0
        ));

        let err = eval_source("function f() { return f(); } f();").unwrap_err();
        assert!(matches!(err, RuntimeError::StackOverflow));
    }

    #[test]
    fn test_loops_break_continue() {
        let v = eval_value(
            "let sum = 0; \
             for (let i = 0; i < 10; i = i + 1) { \
                 if (i == 5) continue; \
                 if (i == 8) break; \
                 sum = sum + i; \
             } sum;",
        );
        // 0+1+2+3+4+6+7 = 23
        assert!(matches!(v, Value::Number(n) if n == 23.0));

        let v = eval_value("let i = 0; while (true) { i = i + 1; if (i == 4) break; } i;");
        assert!(matches!(v, Value::Number(n) if n == 4.0));
    }

    #[test]
    fn test_objects_and_arrays() {
        assert!(matches!(
            eval_value("let o = {x: 10, y: 20}; o.x + o.y;"),
            Value::Number(n) if n == 30.0
        ));
        assert!(matches!(
            eval_value("let a = [1, 2, 3]; a[0] + a[2];"),
            Value::Number(n) if n == 4.0
        ));
        assert!(matches!(
            eval_value("let a = [1, 2, 3]; a.length;"),
            Value::Number(n) if n == 3.0
        ));
        assert!(matches!(eval_value("let a = [1]; a[99];"), Value::Undefined));
        assert!(matches!(eval_value("let a = [1]; a[1.7];"), Value::Undefined));
        assert!(matches!(
            eval_value("let o = {k: 5}; o[\"k\"];"),
            Value::Number(n) if n == 5.0
        ));
        assert!(matches!(eval_value("let o = {}; o.missing;"), Value::Undefined));
    }

    #[test]
    fn test_member_on_non_object() {
        let err = eval_source("let x = 1; x.y;").unwrap_err();
        assert!(matches!(err, RuntimeError::NotAnObject { .. }));
    }

    #[test]
    fn test_ternary_and_logical() {
        assert!(matches!(eval_value("true ? 1 : 2;"), Value::Number(n) if n == 1.0));
        // Short-circuit operators yield the deciding operand.
        assert!(matches!(eval_value("0 || 7;"), Value::Number(n) if n == 7.0));
        assert!(matches!(eval_value("0 && 7;"), Value::Number(n) if n == 0.0));
        assert!(matches!(eval_value("null ?? 3;"), Value::Number(n) if n == 3.0));
        assert!(matches!(eval_value("0 ?? 3;"), Value::Number(n) if n == 0.0));
    }

    #[test]
    fn test_equality_is_strict() {
        assert!(matches!(eval_value("1 == 1;"), Value::Bool(true)));
        assert!(matches!(eval_value("1 == \"1\";"), Value::Bool(false)));
        assert!(matches!(eval_value("\"a\" === \"a\";"), Value::Bool(true)));
        assert!(matches!(eval_value("null == undefined;"), Value::Bool(false)));
        assert!(matches!(eval_value("[] == [];"), Value::Bool(false)));
        assert!(matches!(eval_value("let a = [1]; a == a;"), Value::Bool(true)));
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert!(matches!(eval_value("5 & 3;"), Value::Number(n) if n == 1.0));
        assert!(matches!(eval_value("5 | 3;"), Value::Number(n) if n == 7.0));
        assert!(matches!(eval_value("5 ^ 3;"), Value::Number(n) if n == 6.0));
        assert!(matches!(eval_value("1 << 4;"), Value::Number(n) if n == 16.0));
        assert!(matches!(eval_value("-8 >> 1;"), Value::Number(n) if n == -4.0));
        assert!(matches!(eval_value("-1 >>> 0;"), Value::Number(n) if n == 4_294_967_295.0));
        assert!(matches!(eval_value("~5;"), Value::Number(n) if n == -6.0));
    }

    #[test]
    fn test_typeof_void_delete() {
        let (_, out) = eval_source("console.log(typeof 1, typeof \"s\", typeof null, typeof undefined);")
            .expect("runtime failure");
        assert_eq!(out, "number string object undefined\n");

        assert!(matches!(eval_value("void 42;"), Value::Undefined));
        assert!(matches!(
            eval_value("let o = {a: 1}; delete o.a; o.a;"),
            Value::Undefined
        ));
    }

    #[test]
    fn test_in_operator() {
        assert!(matches!(eval_value("\"x\" in {x: 1};"), Value::Bool(true)));
        assert!(matches!(eval_value("\"y\" in {x: 1};"), Value::Bool(false)));
        assert!(matches!(eval_value("1 in [10, 20];"), Value::Bool(true)));
        assert!(matches!(eval_value("5 in [10, 20];"), Value::Bool(false)));
    }

    #[test]
    fn test_update_expressions() {
        assert!(matches!(eval_value("let i = 1; i++; i;"), Value::Number(n) if n == 2.0));
        assert!(matches!(eval_value("let i = 1; i++;"), Value::Number(n) if n == 1.0));
        assert!(matches!(eval_value("let i = 1; ++i;"), Value::Number(n) if n == 2.0));
        assert!(matches!(eval_value("let i = 1; --i;"), Value::Number(n) if n == 0.0));
    }

    #[test]
    fn test_template_interpolation() {
        let (_, out) =
            eval_source("let x = 6; console.log(`value: ${x * 7}!`);").expect("runtime failure");
        assert_eq!(out, "value: 42!\n");
    }

    #[test]
    fn test_nan_semantics() {
        assert!(matches!(eval_value("NaN == NaN;"), Value::Bool(false)));
        assert!(matches!(eval_value("NaN != NaN;"), Value::Bool(true)));
        assert!(matches!(eval_value("0 / 0;"), Value::Number(n) if n.is_nan()));
        assert!(matches!(eval_value("NaN < 1;"), Value::Bool(false)));
        assert!(matches!(eval_value("NaN ? 1 : 2;"), Value::Number(n) if n == 2.0));
    }

    #[test]
    fn test_float_remainder() {
        assert!(matches!(eval_value("5.5 % 2;"), Value::Number(n) if n == 1.5));
        assert!(matches!(eval_value("-7 % 3;"), Value::Number(n) if n == -1.0));
    }

    #[test]
    fn test_shadowing() {
        let v = eval_value("let x = 1; { let x = 2; x; }");
        assert!(matches!(v, Value::Number(n) if n == 2.0));

        // The outer binding is untouched by the shadow.
        let v = eval_value("let x = 1; { let x = 2; x = 3; } x;");
        assert!(matches!(v, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn test_assignment_through_blocks_hits_outer() {
        let v = eval_value("let x = 1; { x = 5; } x;");
        assert!(matches!(v, Value::Number(n) if n == 5.0));
    }

    #[test]
    fn test_counters_are_independent() {
        let v = eval_value(
            "function mk() { let n = 0; return function () { n = n + 1; return n; }; } \
             let a = mk(); let b = mk(); a(); a(); a(); b();",
        );
        assert!(matches!(v, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn test_function_expression_value() {
        let v = eval_value("let f = function (x) { return x + 1; }; f(41);");
        assert!(matches!(v, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        let v = eval_value(
            "function f() { { { if (true) { return 7; } } } return 0; } f();",
        );
        assert!(matches!(v, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn test_break_outside_loop_is_reported() {
        let err = eval_source("break;").unwrap_err();
        assert!(matches!(err, RuntimeError::Break));

        let err = eval_source("return 1;").unwrap_err();
        assert!(matches!(err, RuntimeError::Return(_)));
    }

    #[test]
    fn test_while_continue_reevaluates_condition() {
        let v = eval_value(
            "let i = 0; let hits = 0; \
             while (i < 5) { i = i + 1; if (i == 2) continue; hits = hits + 1; } \
             hits;",
        );
        assert!(matches!(v, Value::Number(n) if n == 4.0));
    }

    #[test]
    fn test_string_length_and_index_key() {
        assert!(matches!(eval_value("\"hello\".length;"), Value::Number(n) if n == 5.0));
        assert!(matches!(
            eval_value("let a = [1, 2]; a[\"length\"];"),
            Value::Number(n) if n == 2.0
        ));
    }

    #[test]
    fn test_object_iteration_keeps_source_order() {
        let (_, out) = eval_source("let o = {b: 1, a: 2}; console.log(JSON.stringify(o));")
            .expect("runtime failure");
        assert_eq!(out, "{\"b\":1,\"a\":2}\n");
    }

    #[test]
    fn test_member_assignment_is_rejected_at_parse() {
        let tokens = caper_lexer::tokenize("let o = {b: 1}; o.b = 3;").expect("lex failure");
        let err = caper_parser::parse(&tokens).unwrap_err();
        assert!(matches!(
            err.kind,
            caper_parser::ParseErrorKind::InvalidAssignmentTarget
        ));
    }

    #[test]
    fn test_delete_variants() {
        assert!(matches!(
            eval_value("let o = {a: 1}; delete o[\"a\"]; \"a\" in o;"),
            Value::Bool(false)
        ));
        assert!(matches!(
            eval_value("let a = [1, 2]; delete a[0]; a[0];"),
            Value::Undefined
        ));

        let err = eval_source("let a = [1]; delete a[5];").unwrap_err();
        assert!(matches!(err, RuntimeError::IndexOutOfBounds { .. }));

        let err = eval_source("let x = 1; delete x[0];").unwrap_err();
        assert!(matches!(err, RuntimeError::NotAnArray { .. }));
    }

    #[test]
    fn test_in_operator_key_errors() {
        let err = eval_source("true in {a: 1};").unwrap_err();
        assert!(matches!(err, RuntimeError::NotAString { .. }));

        let err = eval_source("\"k\" in 5;").unwrap_err();
        assert!(matches!(err, RuntimeError::TypeError { .. }));
    }

    #[test]
    fn test_unary_on_wrong_types() {
        assert!(matches!(eval_value("-\"a\";"), Value::Undefined));
        assert!(matches!(eval_value("+true;"), Value::Undefined));
        assert!(matches!(eval_value("!\"\";"), Value::Bool(true)));
        assert!(matches!(eval_value("!\"x\";"), Value::Bool(false)));
    }

    #[test]
    fn test_instanceof_is_always_false() {
        assert!(matches!(eval_value("({}) instanceof Math;"), Value::Bool(false)));
    }

    #[test]
    fn test_bigint_literal_evaluates_as_number() {
        assert!(matches!(eval_value("10n + 5;"), Value::Number(n) if n == 15.0));
    }

    #[test]
    fn test_error_carries_source_location() {
        let source = "let a = 1;\nmissing;";
        let err = eval_source(source).unwrap_err();
        assert_eq!(
            err.format_with_source(source),
            "2:1: undefined variable: missing"
        );
    }

    #[test]
    fn test_gc_under_allocation_pressure() {
        // Builds and drops enough garbage to force several collections while
        // a closure keeps its environment alive across them.
        let source = "function mk() { let n = 0; return function c() { n = n + 1; return n; }; } \
             let c = mk(); \
             for (let i = 0; i < 20000; i = i + 1) { \
                 let junk = [i, i + 1, \"padding padding padding padding\", {k: i}]; \
                 junk; \
                 c(); \
             } \
             c();";
        let tokens = caper_lexer::tokenize(source).expect("lex failure");
        let program = caper_parser::parse(&tokens).expect("parse failure");
        let mut interp = Interp::new(Box::new(Sink::default()), Box::new(Sink::default()));
        let v = interp.run(&program).expect("runtime failure");
        assert!(matches!(v, Value::Number(n) if n == 20001.0));
        assert!(interp.heap.stats().collections > 0, "no collection ran");
    }
}
