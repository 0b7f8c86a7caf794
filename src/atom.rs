/// Interned property-key strings ("atoms").
///
/// The table owns its strings for the lifetime of the context, which models
/// image residency: atoms are never collected and never move, so property
/// tables can hold bare `u32` handles across any number of collections.
/// String *values* live on the managed heap and relocate like any other
/// object; only keys are interned here.
///
/// Two atoms compare equal iff their strings are byte-equal.
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(pub u32);

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

/// Atoms interned at fixed indices during table construction, in the order
/// of `WELL_KNOWN`. Keep both lists in sync.
pub mod well_known {
    use super::Atom;

    pub const LENGTH: Atom = Atom(0);
    pub const PROTOTYPE: Atom = Atom(1);
    pub const CONSTRUCTOR: Atom = Atom(2);
    pub const NAME: Atom = Atom(3);
    pub const MESSAGE: Atom = Atom(4);
    pub const GLOBAL_THIS: Atom = Atom(5);
    pub const VALUE: Atom = Atom(6);
    pub const GET: Atom = Atom(7);
    pub const SET: Atom = Atom(8);
    pub const WRITABLE: Atom = Atom(9);
    pub const ENUMERABLE: Atom = Atom(10);
    pub const CONFIGURABLE: Atom = Atom(11);
    pub const GLOBALS: Atom = Atom(12);
    pub const GLOBAL_LEXICALS: Atom = Atom(13);
    pub const THIS: Atom = Atom(14);
    pub const ARGUMENTS: Atom = Atom(15);
    pub const EVALUATE: Atom = Atom(16);
    pub const LAST_INDEX: Atom = Atom(17);
    pub const INDEX: Atom = Atom(18);
    pub const SOURCE: Atom = Atom(19);
    pub const FLAGS: Atom = Atom(20);
    pub const TO_STRING: Atom = Atom(21);
    pub const NEXT: Atom = Atom(22);
    pub const DONE: Atom = Atom(23);
}

const WELL_KNOWN: &[&str] = &[
    "length",
    "prototype",
    "constructor",
    "name",
    "message",
    "globalThis",
    "value",
    "get",
    "set",
    "writable",
    "enumerable",
    "configurable",
    "globals",
    "globalLexicals",
    "this",
    "arguments",
    "evaluate",
    "lastIndex",
    "index",
    "source",
    "flags",
    "toString",
    "next",
    "done",
];

pub struct AtomTable {
    names: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl AtomTable {
    pub fn new() -> Self {
        let mut table = AtomTable {
            names: Vec::with_capacity(WELL_KNOWN.len()),
            lookup: HashMap::with_capacity(WELL_KNOWN.len()),
        };
        for s in WELL_KNOWN {
            table.intern(s);
        }
        debug_assert_eq!(table.intern("length"), well_known::LENGTH);
        debug_assert_eq!(table.intern("done"), well_known::DONE);
        table
    }

    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&idx) = self.lookup.get(s) {
            return Atom(idx);
        }
        let idx = self.names.len() as u32;
        self.names.push(s.to_string());
        self.lookup.insert(s.to_string(), idx);
        Atom(idx)
    }

    pub fn name(&self, atom: Atom) -> &str {
        &self.names[atom.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        AtomTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut t = AtomTable::new();
        let a = t.intern("hello");
        let b = t.intern("world");
        let c = t.intern("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(t.name(a), "hello");
    }

    #[test]
    fn well_known_indices_are_stable() {
        let mut t = AtomTable::new();
        assert_eq!(t.intern("prototype"), well_known::PROTOTYPE);
        assert_eq!(t.intern("globalLexicals"), well_known::GLOBAL_LEXICALS);
        assert_eq!(t.name(well_known::LAST_INDEX), "lastIndex");
    }
}
