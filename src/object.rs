/// Object model — classes, property tables, the immutability lattice
///
/// Every object carries a class tag, a prototype link, a flags byte, an
/// insertion-ordered property table, and class-specific extra slots. The
/// flags form a monotonic lattice:
///
///   fresh → !extensible → sealed → frozen → hardened
///
/// Each level implies the weaker ones. Bits latch; the only retraction is
/// the hardening rollback, which clears HARDENED on a graph whose promotion
/// failed as a unit. Enforcement is hybrid: the bit gives the fast check,
/// and seal/freeze also rewrite descriptors so reflection reports the
/// promoted attributes without extra logic.
///
/// Property tables are a `Vec` of (atom, property) pairs: lookups are
/// linear, insertion order is the enumeration order, and the table never
/// reallocates behind the collector's back (growth is charged lazily).
use crate::atom::{well_known, Atom, AtomTable};
use crate::context::{CallArgs, Context};
use crate::errors::JsError;
use crate::heap::{Heap, Ref, Tracer, PROP_ENTRY};
use crate::value::Value;
use crate::ast::Stmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Classes and flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsClass {
    Ordinary,
    Array,
    Function,
    Error,
    Arguments,
    Compartment,
    /// Engine-internal environment record; never script-visible.
    Scope,
}

pub mod flags {
    pub const EXTENSIBLE: u8 = 1 << 0;
    pub const SEALED: u8 = 1 << 1;
    pub const FROZEN: u8 = 1 << 2;
    pub const HARDENED: u8 = 1 << 3;
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum PropKind {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Ref>, set: Option<Ref> },
}

#[derive(Debug, Clone)]
pub struct Property {
    pub kind: PropKind,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property {
            kind: PropKind::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    /// The usual {writable, enumerable, configurable} triple for assignment-
    /// created and literal properties.
    pub fn field(value: Value) -> Self {
        Property::data(value, true, true, true)
    }

    pub fn accessor(get: Option<Ref>, set: Option<Ref>, enumerable: bool, configurable: bool) -> Self {
        Property {
            kind: PropKind::Accessor { get, set },
            enumerable,
            configurable,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, PropKind::Data { .. })
    }
}

// ---------------------------------------------------------------------------
// Class-specific slots
// ---------------------------------------------------------------------------

pub type NativeFn = fn(&mut Context, CallArgs) -> Result<Value, JsError>;

#[derive(Debug, Clone)]
pub struct ScriptFn {
    pub params: Vec<Atom>,
    pub body: Rc<Vec<Stmt>>,
    /// Captured scope chain; environment records live on the managed heap
    /// so the collector relocates closures like everything else.
    pub scope: Option<Ref>,
    pub compartment: usize,
    pub is_arrow: bool,
}

#[derive(Debug)]
pub enum FnKind {
    Native { name: &'static str, func: NativeFn },
    Script(ScriptFn),
}

#[derive(Debug)]
pub enum Extra {
    None,
    /// Array and Arguments storage. Dense, no holes.
    Elements(Vec<Value>),
    Function(FnKind),
    /// Index of the engine-side compartment this handle exposes.
    CompartmentRef(usize),
    Regex {
        source: String,
        flag_str: String,
        global: bool,
        sticky: bool,
        program: regex::Regex,
    },
}

impl Extra {
    pub fn footprint(&self) -> usize {
        match self {
            Extra::None | Extra::CompartmentRef(_) => 0,
            Extra::Elements(els) => els.len() * 8,
            Extra::Function(FnKind::Native { .. }) => 16,
            Extra::Function(FnKind::Script(f)) => 64 + f.params.len() * 8,
            Extra::Regex { source, .. } => 64 + source.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsObject
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct JsObject {
    pub class: JsClass,
    pub proto: Option<Ref>,
    pub flags: u8,
    pub props: Vec<(Atom, Property)>,
    pub extra: Extra,
}

impl JsObject {
    pub fn new(class: JsClass, proto: Option<Ref>) -> Self {
        JsObject {
            class,
            proto,
            flags: flags::EXTENSIBLE,
            props: Vec::new(),
            extra: Extra::None,
        }
    }

    pub fn extra_footprint(&self) -> usize {
        self.extra.footprint()
    }

    pub fn is_extensible(&self) -> bool {
        self.flags & flags::EXTENSIBLE != 0
    }

    pub fn has_flag(&self, bit: u8) -> bool {
        self.flags & bit != 0
    }

    pub fn set_flag(&mut self, bit: u8) {
        self.flags |= bit;
    }

    pub fn clear_extensible(&mut self) {
        self.flags &= !flags::EXTENSIBLE;
    }

    /// Rollback hook for a failed graph hardening; the only downward move
    /// in the lattice.
    pub fn clear_hardened(&mut self) {
        self.flags &= !flags::HARDENED;
    }

    pub fn elements(&self) -> Option<&Vec<Value>> {
        match &self.extra {
            Extra::Elements(els) => Some(els),
            _ => None,
        }
    }

    pub fn elements_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.extra {
            Extra::Elements(els) => Some(els),
            _ => None,
        }
    }

    pub fn function(&self) -> Option<&FnKind> {
        match &self.extra {
            Extra::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.extra, Extra::Function(_))
    }

    /// Enumerate every pointer-bearing field for the collector. Any new
    /// field that can hold a heap reference must be added here.
    pub fn trace(&mut self, t: &mut dyn Tracer) {
        if let Some(p) = self.proto.as_mut() {
            t.reference(p);
        }
        for (_, prop) in self.props.iter_mut() {
            match &mut prop.kind {
                PropKind::Data { value, .. } => t.value(value),
                PropKind::Accessor { get, set } => {
                    if let Some(g) = get.as_mut() {
                        t.reference(g);
                    }
                    if let Some(s) = set.as_mut() {
                        t.reference(s);
                    }
                }
            }
        }
        match &mut self.extra {
            Extra::Elements(els) => {
                for v in els.iter_mut() {
                    t.value(v);
                }
            }
            Extra::Function(FnKind::Script(f)) => {
                if let Some(s) = f.scope.as_mut() {
                    t.reference(s);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Raw property operations (no getter/setter invocation; see context.rs for
// the full get/set paths)
// ---------------------------------------------------------------------------

/// Canonical array index encoded by an atom: all digits, no leading zero.
pub fn atom_as_index(atoms: &AtomTable, key: Atom) -> Option<usize> {
    let name = atoms.name(key);
    if name == "0" {
        return Some(0);
    }
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) || name.starts_with('0') {
        return None;
    }
    name.parse::<usize>().ok()
}

impl Heap {
    pub fn get_own(&self, o: Ref, key: Atom) -> Option<&Property> {
        self.object(o)
            .props
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| p)
    }

    /// Walk the prototype chain; returns the holder and a copy of the
    /// property.
    pub fn lookup(&self, o: Ref, key: Atom) -> Option<(Ref, Property)> {
        let mut cur = Some(o);
        while let Some(r) = cur {
            if let Some(p) = self.get_own(r, key) {
                return Some((r, p.clone()));
            }
            cur = self.object(r).proto;
        }
        None
    }

    pub fn has_property(&self, o: Ref, key: Atom) -> bool {
        self.lookup(o, key).is_some()
    }

    /// Own atoms in insertion order. Array/Arguments element indices are
    /// materialized at the context layer, which can intern index atoms.
    pub fn own_keys(&self, o: Ref) -> Vec<Atom> {
        self.object(o).props.iter().map(|(k, _)| *k).collect()
    }

    fn own_property_count(&self, o: Ref) -> usize {
        let obj = self.object(o);
        obj.props.len() + obj.elements().map_or(0, |e| e.len())
    }

    /// Virtual descriptor for an Array/Arguments element or `length`.
    /// Elements carry no stored attributes; the lattice flags are the
    /// source of truth for writability and configurability.
    pub fn indexed_own_property(&self, atoms: &AtomTable, o: Ref, key: Atom) -> Option<Property> {
        let obj = self.object(o);
        if !matches!(obj.class, JsClass::Array | JsClass::Arguments) {
            return None;
        }
        let frozen = obj.has_flag(flags::FROZEN);
        let sealed = obj.has_flag(flags::SEALED) || frozen;
        let els = obj.elements()?;
        if key == well_known::LENGTH {
            return Some(Property::data(
                Value::number(els.len() as f64),
                !frozen,
                false,
                false,
            ));
        }
        let idx = atom_as_index(atoms, key)?;
        let v = *els.get(idx)?;
        Some(Property::data(v, !frozen, true, !sealed))
    }

    /// [[DefineOwnProperty]] with the standard descriptor-compatibility
    /// rules. Also the sole promotion path used by seal/freeze. Element
    /// keys and `length` on Array/Arguments objects route to the element
    /// storage, never to the named table.
    pub fn define_property(
        &mut self,
        atoms: &AtomTable,
        o: Ref,
        key: Atom,
        desc: Property,
    ) -> Result<(), JsError> {
        if matches!(self.object(o).class, JsClass::Array | JsClass::Arguments) {
            if key == well_known::LENGTH {
                return self.define_array_length(o, desc);
            }
            if let Some(idx) = atom_as_index(atoms, key) {
                return self.define_element_property(o, idx, desc);
            }
        }
        let existing = self.get_own(o, key).cloned();
        let obj = self.object(o);
        let current = match existing {
            None => {
                if !obj.is_extensible() {
                    return Err(JsError::Type(format!(
                        "cannot define property '{}': object is not extensible",
                        atoms.name(key)
                    )));
                }
                self.charge(PROP_ENTRY);
                self.object_mut(o).props.push((key, desc));
                return Ok(());
            }
            Some(p) => p,
        };

        if !current.configurable {
            let reject = || {
                Err(JsError::Type(format!(
                    "cannot redefine property '{}'",
                    atoms.name(key)
                )))
            };
            if desc.configurable || desc.enumerable != current.enumerable {
                return reject();
            }
            match (&current.kind, &desc.kind) {
                (PropKind::Data { value: ov, writable: ow }, PropKind::Data { value: nv, writable: nw }) => {
                    // writable may flip true → false; the value may change
                    // only while the property is still writable
                    if !*ow {
                        if *nw || !ov.same_value(*nv, self) {
                            return reject();
                        }
                    }
                }
                (PropKind::Accessor { get: og, set: os }, PropKind::Accessor { get: ng, set: ns }) => {
                    if og != ng || os != ns {
                        return reject();
                    }
                }
                // data ↔ accessor conversion requires configurable: true
                _ => return reject(),
            }
        }

        let slot = self
            .object_mut(o)
            .props
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| p)
            .unwrap_or_else(|| unreachable!("property vanished during define"));
        *slot = desc;
        Ok(())
    }

    /// Define over element storage. Elements carry exactly
    /// {writable: !frozen, enumerable: true, configurable: !sealed};
    /// per-element attribute changes are not representable and fail like
    /// any other incompatible redefinition.
    fn define_element_property(
        &mut self,
        o: Ref,
        idx: usize,
        desc: Property,
    ) -> Result<(), JsError> {
        let obj = self.object(o);
        let frozen = obj.has_flag(flags::FROZEN);
        let sealed = obj.has_flag(flags::SEALED) || frozen;
        let extensible = obj.is_extensible();
        let len = obj.elements().map_or(0, |e| e.len());

        let PropKind::Data { value, writable } = desc.kind else {
            return Err(JsError::Type(
                "array elements cannot be accessor properties".into(),
            ));
        };
        if !desc.enumerable || desc.configurable != !sealed || writable != !frozen {
            return Err(JsError::Type(format!(
                "cannot change attributes of element {}",
                idx
            )));
        }
        if idx < len {
            let current = self
                .object(o)
                .elements()
                .map_or(Value::undefined(), |e| e[idx]);
            if frozen {
                if current.same_value(value, self) {
                    return Ok(());
                }
                return Err(JsError::Type(format!(
                    "cannot redefine element {} of a frozen array",
                    idx
                )));
            }
            if let Some(els) = self.object_mut(o).elements_mut() {
                els[idx] = value;
            }
            Ok(())
        } else if idx == len {
            if !extensible {
                return Err(JsError::Type(
                    "cannot define elements: array is not extensible".into(),
                ));
            }
            self.charge(8);
            if let Some(els) = self.object_mut(o).elements_mut() {
                els.push(value);
            }
            Ok(())
        } else {
            // no holes in this dialect
            Err(JsError::Type(format!(
                "cannot create hole: index {} is past length {}",
                idx, len
            )))
        }
    }

    fn define_array_length(&mut self, o: Ref, desc: Property) -> Result<(), JsError> {
        let obj = self.object(o);
        let frozen = obj.has_flag(flags::FROZEN);
        let len = obj.elements().map_or(0, |e| e.len());
        let PropKind::Data { value, writable } = desc.kind else {
            return Err(JsError::Type(
                "length cannot be an accessor property".into(),
            ));
        };
        if desc.enumerable || desc.configurable || writable != !frozen {
            return Err(JsError::Type(
                "cannot change attributes of array length".into(),
            ));
        }
        if !value.is_number() {
            return Err(JsError::Range("invalid array length".into()));
        }
        let n = value.as_number();
        if n < 0.0 || n.trunc() != n || !n.is_finite() {
            return Err(JsError::Range("invalid array length".into()));
        }
        let new_len = n as usize;
        if new_len == len {
            return Ok(());
        }
        if frozen {
            return Err(JsError::Type(
                "cannot redefine length of a frozen array".into(),
            ));
        }
        if new_len < len {
            if let Some(els) = self.object_mut(o).elements_mut() {
                els.truncate(new_len);
            }
            Ok(())
        } else {
            Err(JsError::Type(
                "cannot grow length: holes are not supported".into(),
            ))
        }
    }

    pub fn delete_property(&mut self, atoms: &AtomTable, o: Ref, key: Atom) -> Result<bool, JsError> {
        let Some(p) = self.get_own(o, key) else {
            return Ok(true);
        };
        if !p.configurable {
            return Err(JsError::Type(format!(
                "cannot delete property '{}'",
                atoms.name(key)
            )));
        }
        self.object_mut(o).props.retain(|(k, _)| *k != key);
        Ok(true)
    }

    pub fn get_prototype(&self, o: Ref) -> Option<Ref> {
        self.object(o).proto
    }

    pub fn set_prototype(&mut self, o: Ref, proto: Option<Ref>) -> Result<(), JsError> {
        if self.object(o).proto == proto {
            return Ok(());
        }
        if !self.object(o).is_extensible() {
            return Err(JsError::Type(
                "cannot set prototype of a non-extensible object".into(),
            ));
        }
        let mut cur = proto;
        while let Some(p) = cur {
            if p == o {
                return Err(JsError::Type("cyclic prototype chain".into()));
            }
            cur = self.object(p).proto;
        }
        self.object_mut(o).proto = proto;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Immutability lattice
    // -----------------------------------------------------------------------

    pub fn prevent_extensions(&mut self, o: Ref) {
        let empty = self.own_property_count(o) == 0;
        let obj = self.object_mut(o);
        obj.clear_extensible();
        if empty {
            obj.set_flag(flags::SEALED);
        }
    }

    /// Promote every own property to configurable: false, then latch
    /// SEALED. Runs through `define_property`, whose rules permit each
    /// individual transition, so a well-formed table cannot fail.
    pub fn seal(&mut self, atoms: &AtomTable, o: Ref) -> Result<(), JsError> {
        self.object_mut(o).clear_extensible();
        for key in self.own_keys(o) {
            let mut p = self
                .get_own(o, key)
                .cloned()
                .unwrap_or_else(|| unreachable!("own key without property"));
            p.configurable = false;
            self.define_property(atoms, o, key, p)?;
        }
        self.object_mut(o).set_flag(flags::SEALED);
        Ok(())
    }

    /// Seal, then demote every data property to writable: false and latch
    /// FROZEN. Array elements carry no descriptors; the FROZEN bit is what
    /// rejects element writes.
    pub fn freeze(&mut self, atoms: &AtomTable, o: Ref) -> Result<(), JsError> {
        self.seal(atoms, o)?;
        for key in self.own_keys(o) {
            let mut p = self
                .get_own(o, key)
                .cloned()
                .unwrap_or_else(|| unreachable!("own key without property"));
            if let PropKind::Data { writable, .. } = &mut p.kind {
                *writable = false;
            }
            self.define_property(atoms, o, key, p)?;
        }
        self.object_mut(o).set_flag(flags::FROZEN);
        Ok(())
    }

    pub fn is_sealed(&self, o: Ref) -> bool {
        let obj = self.object(o);
        if obj.has_flag(flags::SEALED) {
            return true;
        }
        if obj.is_extensible() {
            return false;
        }
        // untagged elements count as configurable
        if obj.elements().map_or(false, |e| !e.is_empty()) {
            return false;
        }
        obj.props.iter().all(|(_, p)| !p.configurable)
    }

    pub fn is_frozen(&self, o: Ref) -> bool {
        let obj = self.object(o);
        if obj.has_flag(flags::FROZEN) {
            return true;
        }
        if !self.is_sealed(o) {
            return false;
        }
        // element writability is carried by the FROZEN bit alone, and it
        // is not set here
        if obj.elements().map_or(false, |e| !e.is_empty()) {
            return false;
        }
        obj.props.iter().all(|(_, p)| match p.kind {
            PropKind::Data { writable, .. } => !writable,
            PropKind::Accessor { .. } => true,
        })
    }

    pub fn is_hardened(&self, o: Ref) -> bool {
        self.object(o).has_flag(flags::HARDENED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{Heap, Slot};

    fn heap_with_object() -> (Heap, AtomTable, Ref) {
        let mut heap = Heap::new(64 * 1024, false, false);
        let o = heap.push_slot(Slot::Object(JsObject::new(JsClass::Ordinary, None)));
        (heap, AtomTable::new(), o)
    }

    #[test]
    fn define_then_read_own() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let k = atoms.intern("a");
        heap.define_property(&atoms, o, k, Property::field(Value::from_i32(1)))
            .unwrap();
        let p = heap.get_own(o, k).unwrap();
        assert!(matches!(p.kind, PropKind::Data { value, .. } if value.as_i32() == 1));
    }

    #[test]
    fn own_keys_preserve_insertion_order() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let b = atoms.intern("b");
        let a = atoms.intern("a");
        heap.define_property(&atoms, o, b, Property::field(Value::from_i32(1)))
            .unwrap();
        heap.define_property(&atoms, o, a, Property::field(Value::from_i32(2)))
            .unwrap();
        assert_eq!(heap.own_keys(o), vec![b, a]);
    }

    #[test]
    fn define_on_non_extensible_fails_for_new_keys_only() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let a = atoms.intern("a");
        heap.define_property(&atoms, o, a, Property::field(Value::from_i32(1)))
            .unwrap();
        heap.prevent_extensions(o);
        let b = atoms.intern("b");
        assert!(matches!(
            heap.define_property(&atoms, o, b, Property::field(Value::from_i32(2))),
            Err(JsError::Type(_))
        ));
        // existing keys still reconfigurable
        heap.define_property(&atoms, o, a, Property::field(Value::from_i32(3)))
            .unwrap();
    }

    #[test]
    fn non_configurable_rules() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let k = atoms.intern("k");
        heap.define_property(&atoms, o, k, Property::data(Value::from_i32(1), true, true, false))
            .unwrap();

        // value update while writable: permitted
        heap.define_property(&atoms, o, k, Property::data(Value::from_i32(2), true, true, false))
            .unwrap();
        // writable true → false: permitted
        heap.define_property(&atoms, o, k, Property::data(Value::from_i32(2), false, true, false))
            .unwrap();
        // writable false → true: rejected
        assert!(heap
            .define_property(&atoms, o, k, Property::data(Value::from_i32(2), true, true, false))
            .is_err());
        // value change on a non-writable property: rejected
        assert!(heap
            .define_property(&atoms, o, k, Property::data(Value::from_i32(9), false, true, false))
            .is_err());
        // data → accessor conversion: rejected
        assert!(heap
            .define_property(&atoms, o, k, Property::accessor(None, None, true, false))
            .is_err());
        // flipping configurable back on: rejected
        assert!(heap
            .define_property(&atoms, o, k, Property::data(Value::from_i32(2), false, true, true))
            .is_err());
    }

    #[test]
    fn delete_respects_configurable() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let a = atoms.intern("a");
        let b = atoms.intern("b");
        heap.define_property(&atoms, o, a, Property::field(Value::from_i32(1)))
            .unwrap();
        heap.define_property(&atoms, o, b, Property::data(Value::from_i32(2), true, true, false))
            .unwrap();
        assert!(heap.delete_property(&atoms, o, a).unwrap());
        assert!(heap.delete_property(&atoms, o, b).is_err());
        assert!(heap.get_own(o, a).is_none());
    }

    #[test]
    fn lattice_monotonicity() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let k = atoms.intern("k");
        heap.define_property(&atoms, o, k, Property::field(Value::from_i32(1)))
            .unwrap();

        assert!(heap.object(o).is_extensible());
        assert!(!heap.is_sealed(o));

        heap.prevent_extensions(o);
        assert!(!heap.object(o).is_extensible());
        assert!(!heap.is_sealed(o), "configurable property blocks sealed");

        heap.seal(&atoms, o).unwrap();
        assert!(heap.is_sealed(o));
        assert!(!heap.is_frozen(o), "writable data property blocks frozen");

        heap.freeze(&atoms, o).unwrap();
        assert!(heap.is_sealed(o));
        assert!(heap.is_frozen(o));
    }

    #[test]
    fn prevent_extensions_on_empty_object_records_sealed() {
        let (mut heap, _atoms, o) = heap_with_object();
        heap.prevent_extensions(o);
        assert!(heap.is_sealed(o));
        assert!(heap.is_frozen(o), "no data properties: vacuously frozen");
    }

    #[test]
    fn freeze_rewrites_descriptors() {
        let (mut heap, mut atoms, o) = heap_with_object();
        let k = atoms.intern("k");
        heap.define_property(&atoms, o, k, Property::field(Value::from_i32(1)))
            .unwrap();
        heap.freeze(&atoms, o).unwrap();
        let p = heap.get_own(o, k).unwrap();
        assert!(!p.configurable);
        assert!(matches!(p.kind, PropKind::Data { writable: false, .. }));
    }

    #[test]
    fn sealed_array_with_elements_is_not_frozen() {
        let mut heap = Heap::new(64 * 1024, false, false);
        let atoms = AtomTable::new();
        let mut arr = JsObject::new(JsClass::Array, None);
        arr.extra = Extra::Elements(vec![Value::from_i32(1), Value::from_i32(2)]);
        let a = heap.push_slot(Slot::Object(arr));

        heap.seal(&atoms, a).unwrap();
        assert!(heap.is_sealed(a));
        assert!(!heap.is_frozen(a), "sealed elements stay writable");

        heap.freeze(&atoms, a).unwrap();
        assert!(heap.is_frozen(a));
    }

    #[test]
    fn define_routes_array_indices_to_elements() {
        let mut heap = Heap::new(64 * 1024, false, false);
        let mut atoms = AtomTable::new();
        let mut arr = JsObject::new(JsClass::Array, None);
        arr.extra = Extra::Elements(vec![Value::from_i32(1)]);
        let a = heap.push_slot(Slot::Object(arr));

        let zero = atoms.intern("0");
        heap.define_property(&atoms, a, zero, Property::field(Value::from_i32(99)))
            .unwrap();
        assert_eq!(heap.object(a).elements().unwrap()[0].as_i32(), 99);
        assert!(heap.get_own(a, zero).is_none(), "no shadow named property");

        // appending at the boundary is fine, holes are not
        let one = atoms.intern("1");
        heap.define_property(&atoms, a, one, Property::field(Value::from_i32(2)))
            .unwrap();
        assert_eq!(heap.object(a).elements().unwrap().len(), 2);
        let five = atoms.intern("5");
        assert!(heap
            .define_property(&atoms, a, five, Property::field(Value::from_i32(9)))
            .is_err());
        // elements are data-only
        assert!(heap
            .define_property(&atoms, a, zero, Property::accessor(None, None, true, true))
            .is_err());
    }

    #[test]
    fn frozen_array_element_redefinition_rules() {
        let mut heap = Heap::new(64 * 1024, false, false);
        let mut atoms = AtomTable::new();
        let mut arr = JsObject::new(JsClass::Array, None);
        arr.extra = Extra::Elements(vec![Value::from_i32(7)]);
        let a = heap.push_slot(Slot::Object(arr));
        heap.freeze(&atoms, a).unwrap();

        let zero = atoms.intern("0");
        // same-value redefinition is a no-op, a change is rejected
        heap.define_property(
            &atoms,
            a,
            zero,
            Property::data(Value::from_i32(7), false, true, false),
        )
        .unwrap();
        assert!(heap
            .define_property(
                &atoms,
                a,
                zero,
                Property::data(Value::from_i32(8), false, true, false),
            )
            .is_err());
    }

    #[test]
    fn virtual_element_descriptors_track_the_lattice() {
        let mut heap = Heap::new(64 * 1024, false, false);
        let mut atoms = AtomTable::new();
        let mut arr = JsObject::new(JsClass::Array, None);
        arr.extra = Extra::Elements(vec![Value::from_i32(3)]);
        let a = heap.push_slot(Slot::Object(arr));
        let zero = atoms.intern("0");

        let p = heap.indexed_own_property(&atoms, a, zero).unwrap();
        assert!(matches!(p.kind, PropKind::Data { writable: true, .. }));
        assert!(p.enumerable && p.configurable);

        heap.freeze(&atoms, a).unwrap();
        let p = heap.indexed_own_property(&atoms, a, zero).unwrap();
        assert!(matches!(p.kind, PropKind::Data { writable: false, .. }));
        assert!(!p.configurable);
        // out-of-bounds indices have no property
        let five = atoms.intern("5");
        assert!(heap.indexed_own_property(&atoms, a, five).is_none());
    }

    #[test]
    fn prototype_cycle_rejected() {
        let mut heap = Heap::new(64 * 1024, false, false);
        let a = heap.push_slot(Slot::Object(JsObject::new(JsClass::Ordinary, None)));
        let b = heap.push_slot(Slot::Object(JsObject::new(JsClass::Ordinary, Some(a))));
        assert!(heap.set_prototype(a, Some(b)).is_err());
        assert!(heap.set_prototype(a, None).is_ok());
    }
}
