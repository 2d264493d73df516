// SPDX-License-Identifier: AGPL-3.0-or-later

//! The garbage-collected heap.
//!
//! Every runtime object with identity — strings, objects, arrays, and
//! environment frames — lives in one [`Heap`] and is addressed by a [`Handle`].
//! Collection is non-moving, stop-the-world mark-and-sweep: the evaluator is
//! the only mutator, and it hands over its roots explicitly at every
//! collection point. Marking checks the slot's mark bit before descending, so
//! the cycles created by closures capturing their defining environment
//! terminate.
//!
//! Allocation adds a size approximation to `bytes_allocated`; once it passes
//! the threshold the next allocation first runs a collection, and the
//! threshold is reset to twice the surviving byte count.

use crate::value::Value;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Index of a live heap slot. Copyable and cheap; only meaningful against
/// the heap that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single variable binding in an environment frame.
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    /// Set for `const` declarations; assignment through [`crate::env::set`]
    /// refuses to overwrite it.
    pub konst: bool,
}

/// One frame of the lexical scope chain.
#[derive(Debug, Default)]
pub struct EnvFrame {
    pub slots: FxHashMap<SmolStr, Binding>,
    pub parent: Option<Handle>,
}

/// A string-keyed property map that preserves insertion order for iteration.
///
/// Scripts keep objects small; linear scans beat hashing at these sizes and
/// the entry vector is the iteration order guarantee.
#[derive(Debug, Default)]
pub struct PropMap {
    entries: Vec<(SmolStr, Value)>,
}

impl PropMap {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or overwrite; a new key goes to the end of iteration order.
    pub fn insert(&mut self, key: SmolStr, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let at = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(at).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// Payload of a heap slot.
#[derive(Debug)]
pub enum HeapObj {
    /// Immutable string contents.
    Str(String),
    /// Ordered property map.
    Object(PropMap),
    /// Dense, fixed-capacity element storage.
    Array(Vec<Value>),
    /// Environment frame of the scope chain.
    Env(EnvFrame),
}

struct Slot {
    marked: bool,
    size: usize,
    obj: Option<HeapObj>,
}

/// Collection statistics, refreshed by [`Heap::collect`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapStats {
    pub collections: usize,
    pub live_objects: usize,
}

const INITIAL_THRESHOLD: usize = 1 << 20;

/// The garbage-collected object heap.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    bytes_allocated: usize,
    threshold: usize,
    stats: HeapStats,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            bytes_allocated: 0,
            threshold: INITIAL_THRESHOLD,
            stats: HeapStats::default(),
        }
    }

    /// Approximate live byte count.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// True once allocation debt has passed the collection threshold.
    pub fn needs_collect(&self) -> bool {
        self.bytes_allocated > self.threshold
    }

    /// Allocate a new heap object. The caller is responsible for running
    /// [`Heap::collect`] first when [`Heap::needs_collect`] says so — the
    /// fresh object is not reachable from any root yet.
    pub fn alloc(&mut self, obj: HeapObj) -> Handle {
        let size = approx_size(&obj);
        self.bytes_allocated += size;

        let slot = Slot {
            marked: false,
            size,
            obj: Some(obj),
        };
        if let Some(i) = self.free.pop() {
            self.slots[i as usize] = slot;
            Handle(i)
        } else {
            self.slots.push(slot);
            Handle((self.slots.len() - 1) as u32)
        }
    }

    pub fn alloc_str(&mut self, s: impl Into<String>) -> Handle {
        self.alloc(HeapObj::Str(s.into()))
    }

    // === Typed accessors ===
    //
    // A handle always names the kind it was allocated as; the evaluator
    // never stores a handle under the wrong value tag.

    pub fn str_(&self, h: Handle) -> &str {
        match &self.slots[h.index()].obj {
            Some(HeapObj::Str(s)) => s,
            other => panic!("heap: expected string slot, found {:?}", other),
        }
    }

    pub fn object(&self, h: Handle) -> &PropMap {
        match &self.slots[h.index()].obj {
            Some(HeapObj::Object(m)) => m,
            other => panic!("heap: expected object slot, found {:?}", other),
        }
    }

    pub fn object_mut(&mut self, h: Handle) -> &mut PropMap {
        match &mut self.slots[h.index()].obj {
            Some(HeapObj::Object(m)) => m,
            other => panic!("heap: expected object slot, found {:?}", other),
        }
    }

    pub fn array(&self, h: Handle) -> &[Value] {
        match &self.slots[h.index()].obj {
            Some(HeapObj::Array(v)) => v,
            other => panic!("heap: expected array slot, found {:?}", other),
        }
    }

    pub fn array_mut(&mut self, h: Handle) -> &mut Vec<Value> {
        match &mut self.slots[h.index()].obj {
            Some(HeapObj::Array(v)) => v,
            other => panic!("heap: expected array slot, found {:?}", other),
        }
    }

    pub fn env(&self, h: Handle) -> &EnvFrame {
        match &self.slots[h.index()].obj {
            Some(HeapObj::Env(e)) => e,
            other => panic!("heap: expected env slot, found {:?}", other),
        }
    }

    pub fn env_mut(&mut self, h: Handle) -> &mut EnvFrame {
        match &mut self.slots[h.index()].obj {
            Some(HeapObj::Env(e)) => e,
            other => panic!("heap: expected env slot, found {:?}", other),
        }
    }

    /// Run a full mark-and-sweep cycle.
    ///
    /// `env_roots` is the evaluator's live frame stack (parents are reached
    /// through frame marking); `value_roots` are its in-flight temporaries.
    pub fn collect(&mut self, env_roots: &[Handle], value_roots: &[Value]) {
        // 1. Clear marks.
        for slot in &mut self.slots {
            slot.marked = false;
        }

        // 2. Mark from the root set.
        let mut work: Vec<Handle> = env_roots.to_vec();
        for v in value_roots {
            push_value(v, &mut work);
        }
        while let Some(h) = work.pop() {
            let slot = &mut self.slots[h.index()];
            if slot.marked || slot.obj.is_none() {
                continue;
            }
            slot.marked = true;
            if let Some(obj) = &self.slots[h.index()].obj {
                push_children(obj, &mut work);
            }
        }

        // 3. Sweep everything unmarked.
        let mut live = 0usize;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.obj.is_none() {
                continue;
            }
            if slot.marked {
                live += 1;
            } else {
                self.bytes_allocated -= slot.size;
                slot.obj = None;
                slot.size = 0;
                self.free.push(i as u32);
            }
        }

        // 4. Back off the threshold.
        self.threshold = self.bytes_allocated * 2;
        self.stats.collections += 1;
        self.stats.live_objects = live;
    }
}

/// Push the handle a value carries, if any. A function keeps its captured
/// environment alive through here.
fn push_value(v: &Value, work: &mut Vec<Handle>) {
    match v {
        Value::Str(h) | Value::Object(h) | Value::Array(h) => work.push(*h),
        Value::Function(f) => work.push(f.closure),
        _ => {}
    }
}

/// Push everything directly reachable from a heap object.
fn push_children(obj: &HeapObj, work: &mut Vec<Handle>) {
    match obj {
        HeapObj::Str(_) => {}
        HeapObj::Object(map) => {
            for (_, v) in map.iter() {
                push_value(v, work);
            }
        }
        HeapObj::Array(elems) => {
            for v in elems {
                push_value(v, work);
            }
        }
        HeapObj::Env(frame) => {
            if let Some(parent) = frame.parent {
                work.push(parent);
            }
            for binding in frame.slots.values() {
                push_value(&binding.value, work);
            }
        }
    }
}

/// Size approximation used for the collection trigger. Close enough to real
/// footprint to keep heap growth bounded; exactness is not required.
fn approx_size(obj: &HeapObj) -> usize {
    match obj {
        HeapObj::Str(s) => std::mem::size_of::<String>() + s.len(),
        HeapObj::Object(map) => {
            std::mem::size_of::<PropMap>() + map.len() * (std::mem::size_of::<Value>() + 24)
        }
        HeapObj::Array(elems) => {
            std::mem::size_of::<Vec<Value>>() + elems.capacity() * std::mem::size_of::<Value>()
        }
        HeapObj::Env(frame) => {
            std::mem::size_of::<EnvFrame>()
                + frame.slots.len() * (std::mem::size_of::<Binding>() + 24)
        }
    }
}
