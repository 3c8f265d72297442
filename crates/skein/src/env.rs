//! Runtime environments (§4.2 "Environment representation").
//!
//! The spec leaves open whether variables resolve by compile-time
//! rib/element coordinates or by runtime symbol lookup (§9.1 in the design
//! notes records the decision): this implementation resolves by symbol at
//! every `refer`/`assign`, walking a chain of frames linked by `Rc`. Each
//! binding lives in its own `Rc<RefCell<Value>>` cell, shared by every
//! closure that captured the frame it belongs to, so `set!` is visible
//! through all of them — the property compile-time addressing would have
//! to work much harder to preserve once closures escape their creating
//! scope.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{VmError, VmResult};
use crate::intern::SymbolId;
use crate::value::Value;

pub type BindingCell = Rc<RefCell<Value>>;

#[derive(Debug)]
struct Frame {
    bindings: RefCell<Vec<(SymbolId, BindingCell)>>,
    parent: Option<Env>,
}

/// A reference to an environment frame. Cheap to clone: cloning an `Env`
/// just bumps the `Rc`, never copies bindings.
#[derive(Debug, Clone)]
pub struct Env(Rc<Frame>);

impl Env {
    /// A fresh frame with no bindings and no parent — the frame the global
    /// environment starts as, and also the frame a continuation's `Nuate`
    /// body runs in, since `%skein-continuation-arg%` is always found in
    /// the frame `extend` builds right below it.
    #[must_use]
    pub fn root() -> Self {
        Self(Rc::new(Frame { bindings: RefCell::new(Vec::new()), parent: None }))
    }

    /// Builds a new child frame binding `bindings` over `self`.
    #[must_use]
    pub fn extend(&self, bindings: Vec<(SymbolId, Value)>) -> Self {
        let bindings = bindings.into_iter().map(|(sym, val)| (sym, Rc::new(RefCell::new(val)))).collect();
        Self(Rc::new(Frame { bindings: RefCell::new(bindings), parent: Some(self.clone()) }))
    }

    fn find_cell(&self, sym: SymbolId) -> Option<BindingCell> {
        let mut cur = Some(self);
        while let Some(env) = cur {
            if let Some((_, cell)) = env.0.bindings.borrow().iter().find(|(s, _)| *s == sym) {
                return Some(cell.clone());
            }
            cur = env.0.parent.as_ref();
        }
        None
    }

    /// `refer` (§4.3): looks `sym` up, walking outward through parent frames.
    pub fn lookup(&self, sym: SymbolId) -> VmResult<Value> {
        self.find_cell(sym).map(|cell| cell.borrow().clone()).ok_or(VmError::UnboundVariable(sym))
    }

    /// `assign` (§4.3, `set!`): mutates an existing binding in place.
    pub fn assign(&self, sym: SymbolId, val: Value) -> VmResult<()> {
        let cell = self.find_cell(sym).ok_or(VmError::UnboundVariable(sym))?;
        *cell.borrow_mut() = val;
        Ok(())
    }

    /// Adds a new binding to this frame if one isn't already present,
    /// leaving it `Unassigned`. Used only for top-level `define` (§4.1 rule
    /// 7), which pre-declares the name before compiling the initializer so
    /// forward references among top-level definitions are legal.
    pub fn declare(&self, sym: SymbolId) {
        let mut bindings = self.0.bindings.borrow_mut();
        if !bindings.iter().any(|(s, _)| *s == sym) {
            bindings.push((sym, Rc::new(RefCell::new(Value::Unassigned))));
        }
    }

    /// Binds `sym` to `val` in this frame unconditionally, overwriting any
    /// existing binding. Used to install primitives into the global frame
    /// at VM startup and to give a top-level `define`'s initializer
    /// somewhere to land.
    pub fn define(&self, sym: SymbolId, val: Value) {
        let mut bindings = self.0.bindings.borrow_mut();
        if let Some((_, cell)) = bindings.iter().find(|(s, _)| *s == sym) {
            *cell.borrow_mut() = val;
        } else {
            bindings.push((sym, Rc::new(RefCell::new(val))));
        }
    }

    #[must_use]
    pub fn is_bound(&self, sym: SymbolId) -> bool {
        self.find_cell(sym).is_some()
    }
}
