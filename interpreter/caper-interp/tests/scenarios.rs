// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end scenarios: source text in, stdout bytes out.

use caper_interp::{RuntimeError, Value};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

#[derive(Clone, Default)]
struct Sink(Rc<RefCell<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Sink {
    fn take(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("non-utf8 output")
    }
}

fn run(source: &str) -> Result<(String, String, Value), RuntimeError> {
    let tokens = caper_lexer::tokenize(source).expect("lex failure");
    let program = caper_parser::parse(&tokens).expect("parse failure");
    let out = Sink::default();
    let err = Sink::default();
    let value = caper_interp::run(&program, Box::new(out.clone()), Box::new(err.clone()))?;
    Ok((out.take(), err.take(), value))
}

fn stdout_of(source: &str) -> String {
    let (out, _, _) = run(source).expect("runtime failure");
    out
}

#[test]
fn scenario_arithmetic() {
    assert_eq!(stdout_of("console.log(1 + 2 * 3);"), "7\n");
}

#[test]
fn scenario_function() {
    assert_eq!(
        stdout_of("function f(x){ return x*x; } console.log(f(5));"),
        "25\n"
    );
}

#[test]
fn scenario_array() {
    assert_eq!(
        stdout_of("const a = [1,2,3]; console.log(a[0], a[2]);"),
        "1 3\n"
    );
}

#[test]
fn scenario_object() {
    assert_eq!(
        stdout_of("let o = {x: 10, y: 20}; console.log(o.x + o.y);"),
        "30\n"
    );
}

#[test]
fn scenario_closure_counter() {
    assert_eq!(
        stdout_of(
            "function mk(){ let c = 0; return function(){ c = c + 1; return c; }; } \
             let f = mk(); console.log(f(), f(), f());"
        ),
        "1 2 3\n"
    );
}

#[test]
fn scenario_json_stringify() {
    assert_eq!(
        stdout_of("console.log(JSON.stringify({a:1,b:[2,3]}));"),
        "{\"a\":1,\"b\":[2,3]}\n"
    );
}

#[test]
fn scenario_json_stringify_indent() {
    assert_eq!(
        stdout_of("console.log(JSON.stringify({a:1,b:[2,3]}, null, 2));"),
        "{\n  \"a\": 1,\n  \"b\": [\n    2,\n    3\n  ]\n}\n"
    );

    // Negative space means no indent; numeric space clamps at 10.
    assert_eq!(
        stdout_of("console.log(JSON.stringify([1], null, -3));"),
        "[1]\n"
    );
}

#[test]
fn scenario_json_stringify_escapes_strings_and_keys() {
    assert_eq!(
        stdout_of(r#"console.log(JSON.stringify({"a\"b": "x\ny"}));"#),
        "{\"a\\\"b\":\"x\\ny\"}\n"
    );
}

#[test]
fn scenario_json_replacer_not_implemented() {
    let err = run("JSON.stringify({}, {}, 2);").unwrap_err();
    assert!(matches!(err, RuntimeError::NotImplemented { .. }));
}

#[test]
fn scenario_template_literals() {
    assert_eq!(
        stdout_of("let name = \"world\"; console.log(`hello ${name}${\"!\"}`);"),
        "hello world!\n"
    );
    assert_eq!(
        stdout_of("console.log(`sum: ${1 + 2}, nested: ${`<${3 * 4}>`}`);"),
        "sum: 3, nested: <12>\n"
    );
}

#[test]
fn scenario_console_error_goes_to_err_sink() {
    let (out, err, _) = run("console.error(\"oops\"); console.log(\"fine\");")
        .expect("runtime failure");
    assert_eq!(out, "fine\n");
    assert_eq!(err, "oops\n");
}

#[test]
fn scenario_default_stringification() {
    assert_eq!(
        stdout_of("console.log([1, \"two\", true, null, undefined]);"),
        "[1, two, true, null, undefined]\n"
    );
    assert_eq!(stdout_of("console.log({});"), "[object Object]\n");
    assert_eq!(
        stdout_of("function named(){} console.log(named);"),
        "[Function: named]\n"
    );
}

#[test]
fn scenario_numeric_literals() {
    assert_eq!(
        stdout_of("console.log(0xFF, 0b1010, 0o17, 0644, 1_000, 42n);"),
        "255 10 15 420 1000 42\n"
    );
}

#[test]
fn scenario_string_escapes() {
    assert_eq!(
        stdout_of(r#"console.log("tab\there", "\x41", "B");"#),
        "tab\there A B\n"
    );
}

#[test]
fn scenario_math_builtins() {
    assert_eq!(
        stdout_of("console.log(Math.floor(1.9), Math.ceil(1.1), Math.abs(-3), Math.max(1, 7, 4));"),
        "1 2 3 7\n"
    );

    // Math.random is seeded but always within [0, 1).
    let (out, _, _) =
        run("let r = Math.random(); console.log(0 <= r && r < 1);").expect("runtime failure");
    assert_eq!(out, "true\n");
}

#[test]
fn scenario_const_enforced_at_runtime() {
    let err = run("const k = 1; k = 2;").unwrap_err();
    assert!(matches!(err, RuntimeError::ConstReassignment { .. }));
}

#[test]
fn scenario_shebang_script() {
    assert_eq!(stdout_of("#!/usr/bin/env caper\nconsole.log(1);"), "1\n");
}

#[test]
fn scenario_closures_share_environment() {
    // Two closures over the same frame observe each other's writes.
    assert_eq!(
        stdout_of(
            "function mk() { \
                 let n = 0; \
                 return { \
                     inc: function inc() { n = n + 1; return n; }, \
                     get: function get() { return n; } \
                 }; \
             } \
             let c = mk(); c.inc(); c.inc(); console.log(c.get());"
        ),
        "2\n"
    );
}

#[test]
fn scenario_last_value_is_returned_to_host() {
    let (_, _, v) = run("let x = 20; x * 2 + 2;").expect("runtime failure");
    assert!(matches!(v, Value::Number(n) if n == 42.0));
}

#[test]
fn scenario_fibonacci() {
    assert_eq!(
        stdout_of(
            "function fib(n) { \
                 if (n < 2) return n; \
                 return fib(n - 1) + fib(n - 2); \
             } \
             for (let i = 0; i < 8; i = i + 1) { console.log(fib(i)); }"
        ),
        "0\n1\n1\n2\n3\n5\n8\n13\n"
    );
}

#[test]
fn scenario_string_building() {
    assert_eq!(
        stdout_of(
            "let s = \"\"; \
             for (let i = 0; i < 4; i = i + 1) { s = s + `[${i}]`; } \
             console.log(s, s.length);"
        ),
        "[0][1][2][3] 12\n"
    );
}

#[test]
fn scenario_json_string_space() {
    assert_eq!(
        stdout_of("console.log(JSON.stringify({a: [1]}, null, \"\\t\"));"),
        "{\n\t\"a\": [\n\t\t1\n\t]\n}\n"
    );
}

#[test]
fn scenario_json_of_scalars() {
    assert_eq!(
        stdout_of(
            "console.log(JSON.stringify(1.5), JSON.stringify(\"s\"), \
                         JSON.stringify(true), JSON.stringify(null), \
                         JSON.stringify(undefined));"
        ),
        "1.5 \"s\" true null undefined\n"
    );
    // Non-finite numbers serialize as null.
    assert_eq!(stdout_of("console.log(JSON.stringify(1 / 0));"), "null\n");
}

#[test]
fn scenario_json_functions() {
    assert_eq!(
        stdout_of("console.log(JSON.stringify({f: function (){}, g: Math.floor}));"),
        "{\"f\":[Function],\"g\":[Native Function]}\n"
    );
}

#[test]
fn scenario_math_constants() {
    assert_eq!(
        stdout_of("console.log(Math.floor(Math.PI), Math.floor(Math.E));"),
        "3 2\n"
    );
    assert_eq!(stdout_of("console.log(Math.pow(2, 10));"), "1024\n");
    assert_eq!(stdout_of("console.log(Math.sqrt(144));"), "12\n");
}

#[test]
fn scenario_ternary_chain_selects_branch() {
    assert_eq!(
        stdout_of(
            "function grade(n) { return n > 89 ? \"A\" : n > 79 ? \"B\" : \"C\"; } \
             console.log(grade(95), grade(85), grade(10));"
        ),
        "A B C\n"
    );
}

#[test]
fn scenario_higher_order_functions() {
    assert_eq!(
        stdout_of(
            "function twice(f, x) { return f(f(x)); } \
             function inc(n) { return n + 1; } \
             console.log(twice(inc, 5)); \
             console.log(twice(function (n) { return n * 3; }, 2));"
        ),
        "7\n18\n"
    );
}

#[test]
fn scenario_garbage_heavy_program_stays_correct() {
    assert_eq!(
        stdout_of(
            "let keep = []; \
             function pad(n) { return `item-${n}-${\"x\"}`; } \
             let total = 0; \
             for (let i = 0; i < 5000; i = i + 1) { \
                 let tmp = { id: i, label: pad(i), data: [i, i * 2, i * 3] }; \
                 total = total + tmp.data[1]; \
             } \
             console.log(total);"
        ),
        // sum of 2*i for i in 0..5000
        "24995000\n"
    );
}
