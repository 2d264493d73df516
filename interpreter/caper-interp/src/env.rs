// SPDX-License-Identifier: AGPL-3.0-or-later

//! Environment chain operations.
//!
//! Frames are heap objects ([`crate::gc::EnvFrame`]) because closures keep
//! them alive past the function activation that created them; these helpers
//! implement name resolution over the parent chain.

use crate::gc::{Binding, EnvFrame, Handle, Heap, HeapObj};
use crate::value::Value;
use smol_str::SmolStr;

/// Why an assignment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetFailure {
    /// The name is not bound anywhere on the chain.
    Unbound,
    /// The defining binding is a `const`.
    Const,
}

/// Allocate a fresh frame. The caller must treat `parent` as rooted across
/// this call.
pub fn alloc(heap: &mut Heap, parent: Option<Handle>) -> Handle {
    heap.alloc(HeapObj::Env(EnvFrame {
        slots: Default::default(),
        parent,
    }))
}

/// Bind `name` in exactly this frame, shadowing any outer binding.
pub fn define(heap: &mut Heap, env: Handle, name: SmolStr, value: Value, konst: bool) {
    heap.env_mut(env).slots.insert(name, Binding { value, konst });
}

/// Resolve `name` against the chain starting at `env`.
pub fn get(heap: &Heap, env: Handle, name: &str) -> Option<Value> {
    let mut current = Some(env);
    while let Some(h) = current {
        let frame = heap.env(h);
        if let Some(binding) = frame.slots.get(name) {
            return Some(binding.value.clone());
        }
        current = frame.parent;
    }
    None
}

/// Assign to an existing binding, writing into the frame that defines it.
pub fn set(heap: &mut Heap, env: Handle, name: &str, value: Value) -> Result<(), SetFailure> {
    // Locate the defining frame first; the chain is only borrowed immutably.
    let mut current = Some(env);
    let defining = loop {
        let h = match current {
            Some(h) => h,
            None => return Err(SetFailure::Unbound),
        };
        let frame = heap.env(h);
        if let Some(binding) = frame.slots.get(name) {
            if binding.konst {
                return Err(SetFailure::Const);
            }
            break h;
        }
        current = frame.parent;
    };

    heap.env_mut(defining)
        .slots
        .insert(SmolStr::new(name), Binding { value, konst: false });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let mut heap = Heap::new();
        let env = alloc(&mut heap, None);
        define(&mut heap, env, SmolStr::new("x"), Value::Number(1.0), false);
        assert!(matches!(get(&heap, env, "x"), Some(Value::Number(n)) if n == 1.0));
        assert!(get(&heap, env, "y").is_none());
    }

    #[test]
    fn test_get_walks_parents() {
        let mut heap = Heap::new();
        let outer = alloc(&mut heap, None);
        let inner = alloc(&mut heap, Some(outer));
        define(&mut heap, outer, SmolStr::new("x"), Value::Number(1.0), false);
        assert!(matches!(get(&heap, inner, "x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn test_set_writes_defining_frame() {
        let mut heap = Heap::new();
        let outer = alloc(&mut heap, None);
        let inner = alloc(&mut heap, Some(outer));
        define(&mut heap, outer, SmolStr::new("x"), Value::Number(1.0), false);

        set(&mut heap, inner, "x", Value::Number(2.0)).expect("assignment failed");
        // The write landed in the outer frame, not the inner one.
        assert!(heap.env(inner).slots.get("x").is_none());
        assert!(matches!(get(&heap, outer, "x"), Some(Value::Number(n)) if n == 2.0));
    }

    #[test]
    fn test_set_unbound() {
        let mut heap = Heap::new();
        let env = alloc(&mut heap, None);
        assert_eq!(
            set(&mut heap, env, "missing", Value::Null),
            Err(SetFailure::Unbound)
        );
    }

    #[test]
    fn test_set_const_refused() {
        let mut heap = Heap::new();
        let env = alloc(&mut heap, None);
        define(&mut heap, env, SmolStr::new("k"), Value::Number(1.0), true);
        assert_eq!(
            set(&mut heap, env, "k", Value::Number(2.0)),
            Err(SetFailure::Const)
        );
        // Shadowing in a child frame is still allowed.
        let child = alloc(&mut heap, Some(env));
        define(&mut heap, child, SmolStr::new("k"), Value::Number(3.0), false);
        assert!(matches!(get(&heap, child, "k"), Some(Value::Number(n)) if n == 3.0));
    }
}
