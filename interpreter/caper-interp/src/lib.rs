// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tree-walking interpreter for the Caper scripting language.
//!
//! The evaluator walks the parsed [`Program`] directly against a chain of
//! environment frames, with every identity-bearing value — strings, objects,
//! arrays, and the environments themselves — owned by a mark-and-sweep
//! [`gc::Heap`]. Closures capture their defining frame by reference, which
//! makes the object graph cyclic; the tracing collector is what makes that
//! sound.
//!
//! Host output goes through two writers supplied at construction, so
//! embedders and tests can capture it.

mod builtins;
mod env;
pub mod error;
pub mod eval;
pub mod gc;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
pub use eval::Interp;
pub use gc::{Handle, Heap};
pub use value::Value;

use caper_ast::Program;
use std::io::Write;

/// Execute a parsed program with the given output sinks, returning the last
/// top-level statement's value.
pub fn run(
    program: &Program,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
) -> RuntimeResult<Value> {
    let mut interp = Interp::new(out, err);
    interp.run(program)
}
