//! Process-wide symbol interning.
//!
//! Symbols are compared by identity (§3 of the design: "identity = pointer/handle
//! equality across the process"). Interning a symbol's text once and handing out a
//! small [`SymbolId`] afterwards makes `eq?` on symbols a integer comparison instead
//! of a string comparison, and guarantees the invariant holds across every VM and
//! every compiled program in the process, not just within one.
//!
//! The table is insert-only: once a symbol is interned it is never removed, so its
//! id is stable for the process lifetime. This lets every other part of the system
//! treat `SymbolId` as `Copy` and never worry about it dangling.

use std::sync::{Mutex, OnceLock};

use ahash::AHashMap;

/// Interned symbol handle. Two symbols are `eq?` iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Insert-only symbol table, guarded by a single mutex.
///
/// This is the only lock in the system (§5): interning happens mostly while
/// reading source text, reads never remove an entry, and no interning call
/// ever re-enters the table while holding the lock.
#[derive(Default)]
struct Interner {
    names: Vec<Box<str>>,
    ids: AHashMap<Box<str>, SymbolId>,
}

impl Interner {
    fn intern(&mut self, text: &str) -> SymbolId {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }
        let id = SymbolId(u32::try_from(self.names.len()).expect("symbol table overflow"));
        let boxed: Box<str> = text.into();
        self.names.push(boxed.clone());
        self.ids.insert(boxed, id);
        id
    }

    fn resolve(&self, id: SymbolId) -> &str {
        &self.names[id.index()]
    }
}

fn table() -> &'static Mutex<Interner> {
    static TABLE: OnceLock<Mutex<Interner>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(Interner::default()))
}

/// Interns `text`, returning the same [`SymbolId`] for equal text on every call,
/// from any thread, for the lifetime of the process.
#[must_use]
pub fn intern(text: &str) -> SymbolId {
    table().lock().expect("symbol table poisoned").intern(text)
}

/// Looks up the text a [`SymbolId`] was interned from.
///
/// `id` must have come from [`intern`]; ids are never invalidated, so this never
/// panics for an id actually produced by this process.
#[must_use]
pub fn resolve(id: SymbolId) -> Box<str> {
    table().lock().expect("symbol table poisoned").resolve(id).into()
}
