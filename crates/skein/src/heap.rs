//! The mutable heap (§3 "Data Model", §9.3 "Reclamation").
//!
//! Every mutable or multi-field object — pairs, vectors, closures — lives in
//! a single append-only arena, addressed by [`HeapId`]. The arena never
//! reclaims a slot (§9.3): Skein programs are short-lived interpreter runs,
//! cons cells can form cycles (`set-cdr!` onto itself is legal Scheme), and a
//! no-reclamation arena sidesteps both problems without needing a tracing
//! collector. [`Heap::stats`] exists so a REPL can still report how much
//! memory a session has used (§10.2.1), the diagnostic a real GC would
//! otherwise need to justify itself against.

use std::cell::RefCell;

use crate::code::CodeIdx;
use crate::env::Env;
use crate::value::Value;
use crate::vm::Stack;

/// Handle into the heap arena. Two `HeapId`s are equal iff they name the
/// same slot, which is exactly what `eq?` needs for pairs, vectors, and
/// closures (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A closure's heap-resident data: its code, the environment it closed
/// over, and — only for continuations — the call stack it reifies (§9.1).
#[derive(Debug, Clone)]
pub struct ClosureData {
    pub params: crate::code::Params,
    pub body: CodeIdx,
    pub env: Env,
    /// `Some` exactly when this closure is a continuation built by
    /// `call/cc`: applying it restores `s` to this snapshot instead of
    /// pushing a new frame (§9.1).
    pub captured_stack: Option<Stack>,
}

#[derive(Debug)]
enum HeapData {
    Pair(RefCell<(Value, Value)>),
    Vector(RefCell<Vec<Value>>),
    Closure(ClosureData),
}

/// Counts of live heap objects by kind, for the REPL's `,heap` command
/// (§10.2.1). "Live" here just means "allocated" — nothing is ever freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub pairs: usize,
    pub vectors: usize,
    pub closures: usize,
}

impl HeapStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.pairs + self.vectors + self.closures
    }
}

/// Append-only object arena.
#[derive(Debug, Default)]
pub struct Heap {
    arena: Vec<HeapData>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self { arena: Vec::new() }
    }

    pub fn alloc_pair(&mut self, car: Value, cdr: Value) -> HeapId {
        self.push(HeapData::Pair(RefCell::new((car, cdr))))
    }

    pub fn alloc_vector(&mut self, items: Vec<Value>) -> HeapId {
        self.push(HeapData::Vector(RefCell::new(items)))
    }

    pub fn alloc_closure(&mut self, data: ClosureData) -> HeapId {
        self.push(HeapData::Closure(data))
    }

    fn push(&mut self, data: HeapData) -> HeapId {
        let idx = u32::try_from(self.arena.len()).expect("heap arena overflow");
        self.arena.push(data);
        HeapId(idx)
    }

    fn pair(&self, id: HeapId) -> &RefCell<(Value, Value)> {
        match &self.arena[id.index()] {
            HeapData::Pair(cell) => cell,
            other => panic!("heap slot {id:?} is not a pair ({other:?})"),
        }
    }

    #[must_use]
    pub fn car(&self, id: HeapId) -> Value {
        self.pair(id).borrow().0.clone()
    }

    #[must_use]
    pub fn cdr(&self, id: HeapId) -> Value {
        self.pair(id).borrow().1.clone()
    }

    pub fn set_car(&self, id: HeapId, val: Value) {
        self.pair(id).borrow_mut().0 = val;
    }

    pub fn set_cdr(&self, id: HeapId, val: Value) {
        self.pair(id).borrow_mut().1 = val;
    }

    fn vector(&self, id: HeapId) -> &RefCell<Vec<Value>> {
        match &self.arena[id.index()] {
            HeapData::Vector(cell) => cell,
            other => panic!("heap slot {id:?} is not a vector ({other:?})"),
        }
    }

    #[must_use]
    pub fn vector_len(&self, id: HeapId) -> usize {
        self.vector(id).borrow().len()
    }

    #[must_use]
    pub fn vector_get(&self, id: HeapId, index: usize) -> Value {
        self.vector(id).borrow()[index].clone()
    }

    pub fn vector_set(&self, id: HeapId, index: usize, val: Value) {
        self.vector(id).borrow_mut()[index] = val;
    }

    #[must_use]
    pub fn vector_to_vec(&self, id: HeapId) -> Vec<Value> {
        self.vector(id).borrow().clone()
    }

    #[must_use]
    pub fn closure(&self, id: HeapId) -> &ClosureData {
        match &self.arena[id.index()] {
            HeapData::Closure(data) => data,
            other => panic!("heap slot {id:?} is not a closure ({other:?})"),
        }
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats::default();
        for data in &self.arena {
            match data {
                HeapData::Pair(_) => stats.pairs += 1,
                HeapData::Vector(_) => stats.vectors += 1,
                HeapData::Closure(_) => stats.closures += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_accessors_round_trip() {
        let mut heap = Heap::new();
        let id = heap.alloc_pair(Value::Int(1), Value::Int(2));
        assert_eq!(heap.car(id), Value::Int(1));
        assert_eq!(heap.cdr(id), Value::Int(2));
        heap.set_car(id, Value::Int(9));
        assert_eq!(heap.car(id), Value::Int(9));
    }

    #[test]
    fn self_referential_pair_does_not_need_reclamation() {
        let mut heap = Heap::new();
        let id = heap.alloc_pair(Value::Null, Value::Null);
        heap.set_cdr(id, Value::Pair(id));
        assert_eq!(heap.cdr(id), Value::Pair(id));
    }

    #[test]
    fn stats_count_every_allocation() {
        let mut heap = Heap::new();
        heap.alloc_pair(Value::Int(1), Value::Null);
        heap.alloc_vector(vec![Value::Int(1)]);
        let stats = heap.stats();
        assert_eq!(stats.pairs, 1);
        assert_eq!(stats.vectors, 1);
        assert_eq!(stats.total(), 2);
    }
}
