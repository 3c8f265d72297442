//! The runtime value representation (§3 "Data Model").
//!
//! `Value` is deliberately small and `Copy`-ish: every variant is either an
//! inline scalar or a [`HeapId`] handle into the [`Heap`](crate::heap::Heap).
//! Mutable, multi-field, or variable-size data (pairs, vectors, closures)
//! always lives on the heap; `Value` itself never borrows anything and can be
//! cloned, stored in a rib, or stashed inside a captured continuation for
//! free.
//!
//! Two `Value`s are `eq?` (§3, §6) exactly when they derive-`PartialEq`
//! equal: symbols compare by [`SymbolId`], pairs/vectors/closures compare by
//! [`HeapId`], so two separately-allocated pairs are never `eq?` even if
//! their contents happen to match. `equal?`-style structural comparison
//! needs the heap to walk through pairs and vectors and is implemented in
//! `primitives`, not here.

use std::fmt;
use std::rc::Rc;

use crate::heap::{Heap, HeapId};
use crate::intern::SymbolId;
use crate::primitives::Prim;

/// A Skein runtime value — the `a` register's type, a rib element, a
/// variable's contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(Rc<str>),
    Symbol(SymbolId),
    /// The empty list, `()`.
    Null,
    Pair(HeapId),
    Vector(HeapId),
    Primitive(Prim),
    /// A closure, or a reified continuation built by `call/cc` (§9.1): both
    /// are represented the same way, distinguished only by whether the heap
    /// slot's `captured_stack` is populated.
    Closure(HeapId),
    /// The value an unassigned `define`-declared global holds before its
    /// initializer has run (§10.3). Referencing one is a `VmError`, not a
    /// crash, so it needs a value to carry until that check happens.
    Unassigned,
}

impl Value {
    /// Everything except `#f` is truthy (§3 "Booleans", R7RS semantics).
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Null => "null",
            Value::Pair(_) => "pair",
            Value::Vector(_) => "vector",
            Value::Primitive(_) => "primitive",
            Value::Closure(_) => "procedure",
            Value::Unassigned => "unassigned",
        }
    }

    /// Collects a proper list into a `Vec`, heap-dereferencing each pair.
    ///
    /// Returns `None` if the list is improper (ends in something other than
    /// `Null`) — callers that need to distinguish "improper" from "empty"
    /// inspect the list shape themselves before calling this.
    #[must_use]
    pub fn list_to_vec(&self, heap: &Heap) -> Option<Vec<Value>> {
        let mut out = Vec::new();
        let mut cur = self.clone();
        loop {
            match cur {
                Value::Null => return Some(out),
                Value::Pair(id) => {
                    out.push(heap.car(id));
                    cur = heap.cdr(id);
                }
                _ => return None,
            }
        }
    }

    /// Builds a proper list from `items`, right to left.
    #[must_use]
    pub fn vec_to_list(heap: &mut Heap, items: Vec<Value>) -> Value {
        let mut cur = Value::Null;
        for item in items.into_iter().rev() {
            cur = Value::Pair(heap.alloc_pair(item, cur));
        }
        cur
    }

    /// Formats `self` the way the reader would need to read it back (`write`
    /// semantics, §6): strings and chars are quoted/escaped.
    pub fn fmt_write(&self, f: &mut fmt::Formatter<'_>, heap: &Heap) -> fmt::Result {
        self.fmt_with(f, heap, true)
    }

    /// Formats `self` for human consumption (`display` semantics, §6):
    /// strings and chars print their raw contents.
    pub fn fmt_display(&self, f: &mut fmt::Formatter<'_>, heap: &Heap) -> fmt::Result {
        self.fmt_with(f, heap, false)
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, heap: &Heap, quoted: bool) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Char(c) if quoted => write!(f, "#\\{c}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Str(s) if quoted => write!(f, "{s:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Symbol(sym) => write!(f, "{}", crate::intern::resolve(*sym)),
            Value::Null => write!(f, "()"),
            Value::Pair(id) => fmt_pair(f, heap, *id, quoted),
            Value::Vector(id) => {
                write!(f, "#(")?;
                let len = heap.vector_len(*id);
                for i in 0..len {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    heap.vector_get(*id, i).fmt_with(f, heap, quoted)?;
                }
                write!(f, ")")
            }
            Value::Primitive(prim) => write!(f, "#<primitive:{}>", prim.name()),
            Value::Closure(id) => {
                if heap.closure(*id).captured_stack.is_some() {
                    write!(f, "#<continuation>")
                } else {
                    write!(f, "#<procedure>")
                }
            }
            Value::Unassigned => write!(f, "#<unassigned>"),
        }
    }
}

fn fmt_pair(f: &mut fmt::Formatter<'_>, heap: &Heap, id: HeapId, quoted: bool) -> fmt::Result {
    write!(f, "(")?;
    heap.car(id).fmt_with(f, heap, quoted)?;
    let mut cur = heap.cdr(id);
    loop {
        match cur {
            Value::Null => break,
            Value::Pair(next) => {
                write!(f, " ")?;
                heap.car(next).fmt_with(f, heap, quoted)?;
                cur = heap.cdr(next);
            }
            other => {
                write!(f, " . ")?;
                other.fmt_with(f, heap, quoted)?;
                break;
            }
        }
    }
    write!(f, ")")
}

/// `Display` without heap access can only render self-describing values
/// faithfully; pairs/vectors/closures print a placeholder. This impl exists
/// so `Value` can appear in error messages (`VmError::NotApplicable`,
/// `VmError::TypeError`) where a heap usually isn't at hand. Printing a real
/// value for a REPL result always goes through [`Value::fmt_display`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Char(c) => write!(f, "#\\{c}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Symbol(sym) => write!(f, "{}", crate::intern::resolve(*sym)),
            Value::Null => write!(f, "()"),
            Value::Pair(_) => write!(f, "#<pair>"),
            Value::Vector(_) => write!(f, "#<vector>"),
            Value::Primitive(prim) => write!(f, "#<primitive:{}>", prim.name()),
            Value::Closure(_) => write!(f, "#<procedure>"),
            Value::Unassigned => write!(f, "#<unassigned>"),
        }
    }
}
