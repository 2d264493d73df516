// SPDX-License-Identifier: AGPL-3.0-or-later

//! Host natives registered into the global environment before execution:
//! the `console`, `Math`, and `JSON` objects plus the `undefined`, `NaN`,
//! and `Infinity` bindings.

use crate::error::{RuntimeError, RuntimeResult};
use crate::eval::Interp;
use crate::gc::{Handle, Heap, HeapObj, PropMap};
use crate::value::{format_number, to_display_string, NativeFn, Value};
use rand::Rng;
use smol_str::SmolStr;
use std::io::Write;

/// Register all host globals.
pub(crate) fn register(interp: &mut Interp) {
    interp.define_global("undefined", Value::Undefined, true);
    interp.define_global("NaN", Value::Number(f64::NAN), true);
    interp.define_global("Infinity", Value::Number(f64::INFINITY), true);

    let console = interp.alloc(HeapObj::Object(PropMap::default()));
    interp.define_global("console", Value::Object(console), false);
    put_native(interp, console, "log", console_log);
    put_native(interp, console, "error", console_error);

    let math = interp.alloc(HeapObj::Object(PropMap::default()));
    interp.define_global("Math", Value::Object(math), false);
    put_native(interp, math, "random", math_random);
    put_native(interp, math, "floor", math_floor);
    put_native(interp, math, "ceil", math_ceil);
    put_native(interp, math, "abs", math_abs);
    put_native(interp, math, "sqrt", math_sqrt);
    put_native(interp, math, "min", math_min);
    put_native(interp, math, "max", math_max);
    put_native(interp, math, "pow", math_pow);
    put_value(interp, math, "PI", Value::Number(std::f64::consts::PI));
    put_value(interp, math, "E", Value::Number(std::f64::consts::E));

    let json = interp.alloc(HeapObj::Object(PropMap::default()));
    interp.define_global("JSON", Value::Object(json), false);
    put_native(interp, json, "stringify", json_stringify);
}

fn put_native(
    interp: &mut Interp,
    obj: Handle,
    name: &'static str,
    func: fn(&mut Interp, &[Value]) -> RuntimeResult<Value>,
) {
    interp
        .heap
        .object_mut(obj)
        .insert(SmolStr::new(name), Value::Native(NativeFn { name, func }));
}

fn put_value(interp: &mut Interp, obj: Handle, name: &'static str, value: Value) {
    interp.heap.object_mut(obj).insert(SmolStr::new(name), value);
}

// === console ===

fn join_display(heap: &Heap, args: &[Value]) -> String {
    args.iter()
        .map(|v| to_display_string(heap, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log(interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    let line = join_display(&interp.heap, args);
    writeln!(interp.out, "{}", line)?;
    Ok(Value::Undefined)
}

fn console_error(interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    let line = join_display(&interp.heap, args);
    writeln!(interp.err, "{}", line)?;
    Ok(Value::Undefined)
}

// === Math ===

fn number_arg(args: &[Value], i: usize, name: &str) -> RuntimeResult<f64> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(RuntimeError::type_error(format!(
            "{} expects a number, got {}",
            name,
            other.type_name()
        ))),
        None => Err(RuntimeError::InvalidArgument {
            message: format!("{} expects an argument", name),
        }),
    }
}

fn math_random(interp: &mut Interp, _args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Number(interp.rng.gen::<f64>()))
}

fn math_floor(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "Math.floor")?.floor()))
}

fn math_ceil(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "Math.ceil")?.ceil()))
}

fn math_abs(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "Math.abs")?.abs()))
}

fn math_sqrt(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "Math.sqrt")?.sqrt()))
}

fn math_min(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    let mut best = f64::INFINITY;
    for i in 0..args.len() {
        let n = number_arg(args, i, "Math.min")?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.min(n);
    }
    Ok(Value::Number(best))
}

fn math_max(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    let mut best = f64::NEG_INFINITY;
    for i in 0..args.len() {
        let n = number_arg(args, i, "Math.max")?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.max(n);
    }
    Ok(Value::Number(best))
}

fn math_pow(_interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    let base = number_arg(args, 0, "Math.pow")?;
    let exp = number_arg(args, 1, "Math.pow")?;
    Ok(Value::Number(base.powf(exp)))
}

// === JSON ===

fn json_stringify(interp: &mut Interp, args: &[Value]) -> RuntimeResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);

    match args.get(1) {
        None | Some(Value::Null) | Some(Value::Undefined) => {}
        Some(_) => {
            return Err(RuntimeError::NotImplemented {
                message: "JSON.stringify replacer".to_string(),
            })
        }
    }

    // Numeric space clamps to [0, 10] spaces; a string is used verbatim.
    let indent: Option<String> = match args.get(2) {
        Some(Value::Number(n)) => {
            let count = if *n <= 0.0 {
                0
            } else {
                (n.floor() as usize).min(10)
            };
            (count > 0).then(|| " ".repeat(count))
        }
        Some(Value::Str(h)) => {
            let s = interp.heap.str_(*h);
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    };

    let mut out = String::new();
    let mut seen = Vec::new();
    stringify(&interp.heap, &value, indent.as_deref(), 0, &mut out, &mut seen)?;
    let h = interp.alloc_string(out);
    Ok(Value::Str(h))
}

fn stringify(
    heap: &Heap,
    v: &Value,
    indent: Option<&str>,
    level: usize,
    out: &mut String,
    seen: &mut Vec<Handle>,
) -> RuntimeResult<()> {
    match v {
        Value::Number(n) => {
            if n.is_finite() {
                out.push_str(&format_number(*n));
            } else {
                out.push_str("null");
            }
        }
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
        Value::Undefined => out.push_str("undefined"),
        Value::Str(h) => {
            out.push('"');
            out.push_str(&json_escape(heap.str_(*h)));
            out.push('"');
        }
        Value::Function(_) => out.push_str("[Function]"),
        Value::Native(_) => out.push_str("[Native Function]"),

        Value::Array(h) => {
            if seen.contains(h) {
                return Err(RuntimeError::type_error(
                    "converting circular structure to JSON",
                ));
            }
            let elems = heap.array(*h);
            if elems.is_empty() {
                out.push_str("[]");
                return Ok(());
            }
            seen.push(*h);
            match indent {
                None => {
                    out.push('[');
                    for (i, e) in elems.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        stringify(heap, e, indent, level + 1, out, seen)?;
                    }
                    out.push(']');
                }
                Some(ind) => {
                    out.push_str("[\n");
                    for (i, e) in elems.iter().enumerate() {
                        if i > 0 {
                            out.push_str(",\n");
                        }
                        push_indent(out, ind, level + 1);
                        stringify(heap, e, indent, level + 1, out, seen)?;
                    }
                    out.push('\n');
                    push_indent(out, ind, level);
                    out.push(']');
                }
            }
            seen.pop();
        }

        Value::Object(h) => {
            if seen.contains(h) {
                return Err(RuntimeError::type_error(
                    "converting circular structure to JSON",
                ));
            }
            let map = heap.object(*h);
            if map.is_empty() {
                out.push_str("{}");
                return Ok(());
            }
            seen.push(*h);
            match indent {
                None => {
                    out.push('{');
                    for (i, (key, val)) in map.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        out.push('"');
                        out.push_str(&json_escape(key));
                        out.push_str("\":");
                        stringify(heap, val, indent, level + 1, out, seen)?;
                    }
                    out.push('}');
                }
                Some(ind) => {
                    out.push_str("{\n");
                    for (i, (key, val)) in map.iter().enumerate() {
                        if i > 0 {
                            out.push_str(",\n");
                        }
                        push_indent(out, ind, level + 1);
                        out.push('"');
                        out.push_str(&json_escape(key));
                        out.push_str("\": ");
                        stringify(heap, val, indent, level + 1, out, seen)?;
                    }
                    out.push('\n');
                    push_indent(out, ind, level);
                    out.push('}');
                }
            }
            seen.pop();
        }
    }
    Ok(())
}

fn push_indent(out: &mut String, indent: &str, level: usize) {
    for _ in 0..level {
        out.push_str(indent);
    }
}

/// Escape a string for JSON output, keys included.
fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}
