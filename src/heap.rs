/// Managed heap — fixed budget, relocating compacting collector
///
/// ARCHITECTURE:
///   Slot arena            — live objects stored contiguously, addressed by
///                           `Ref` index; allocation appends (bump style)
///   Byte budget           — every slot charges an approximate footprint
///                           against the host-supplied region size
///   Copying collection    — traces from the registered root set in
///                           pre-order, copies live slots into a fresh arena
///                           in first-visit order, leaves forwarding entries
///                           in the old arena, and rewrites every
///                           pointer-bearing value in place
///
/// ROOT DISCIPLINE: a `Ref` held in a Rust local across any potentially
/// allocating operation dangles after a collection. Such references must be
/// parked on the LIFO root stack and re-read afterwards (`root_push` /
/// `root_get` / `root_pop` — the pop returns the relocated value). The
/// collector itself cannot fail; a missed root is undefined behavior, and
/// the `stress` flag (collect on every allocation) exists to surface it.
///
/// Only slot allocation is a collection point. Property-table growth is
/// charged lazily against the budget and settles at the next collection,
/// which recomputes the live footprint.
use crate::object::JsObject;
use crate::value::Value;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ref(pub u32);

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// A heap-resident immutable string with its code-point length cached.
#[derive(Debug, Clone)]
pub struct JsString {
    pub text: String,
    pub char_len: u32,
}

impl JsString {
    pub fn new(text: String) -> Self {
        let char_len = text.chars().count() as u32;
        JsString { text, char_len }
    }
}

#[derive(Debug)]
pub enum Slot {
    Object(JsObject),
    Str(JsString),
    /// Present only in the old arena during a collection.
    Forwarded(u32),
    /// Placeholder while a slot is temporarily moved out for scanning.
    Free,
}

// Footprint constants: coarse per-entity costs charged against the byte
// budget. They approximate the C layout the image format would use.
const OBJECT_BASE: usize = 48;
pub const PROP_ENTRY: usize = 32;
const STRING_BASE: usize = 24;

impl Slot {
    pub fn footprint(&self) -> usize {
        match self {
            Slot::Object(o) => OBJECT_BASE + o.props.len() * PROP_ENTRY + o.extra_footprint(),
            Slot::Str(s) => STRING_BASE + s.text.len(),
            Slot::Forwarded(_) | Slot::Free => 0,
        }
    }
}

/// Edge visitor used by the collector. Object fields come in two shapes:
/// whole tagged values and bare references (prototype links, accessor
/// slots, captured scopes).
pub trait Tracer {
    fn value(&mut self, v: &mut Value);
    fn reference(&mut self, r: &mut Ref);
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct GcStats {
    pub collections: u64,
    pub objects_copied: u64,
    pub bytes_reclaimed: u64,
    pub last_pause_us: u64,
}

pub struct Heap {
    slots: Vec<Slot>,
    bytes_used: usize,
    capacity: usize,
    roots: Vec<Value>,
    /// Collect on every allocation; shakes out missing roots.
    pub stress: bool,
    /// Print collection diagnostics to stderr.
    pub debug: bool,
    pub stats: GcStats,
}

impl Heap {
    pub fn new(capacity: usize, stress: bool, debug: bool) -> Self {
        Heap {
            slots: Vec::new(),
            bytes_used: 0,
            capacity,
            roots: Vec::new(),
            stress,
            debug,
            stats: GcStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn fits(&self, bytes: usize) -> bool {
        self.bytes_used + bytes <= self.capacity
    }

    /// Charge budget for growth inside an existing slot (property insert,
    /// element append). Not a collection point.
    pub fn charge(&mut self, bytes: usize) {
        self.bytes_used += bytes;
    }

    /// Append a slot. The caller has already ensured the budget fits (or is
    /// the bootstrap path, which allocates the intrinsic graph before the
    /// first collection point).
    pub fn push_slot(&mut self, slot: Slot) -> Ref {
        self.bytes_used += slot.footprint();
        let idx = self.slots.len() as u32;
        self.slots.push(slot);
        Ref(idx)
    }

    #[inline]
    pub fn slot(&self, r: Ref) -> &Slot {
        &self.slots[r.0 as usize]
    }

    #[inline]
    pub fn slot_mut(&mut self, r: Ref) -> &mut Slot {
        &mut self.slots[r.0 as usize]
    }

    #[inline]
    pub fn object(&self, r: Ref) -> &JsObject {
        match self.slot(r) {
            Slot::Object(o) => o,
            other => unreachable!("{:?} is not an object: {:?}", r, other),
        }
    }

    #[inline]
    pub fn object_mut(&mut self, r: Ref) -> &mut JsObject {
        match self.slot_mut(r) {
            Slot::Object(o) => o,
            other => unreachable!("{:?} is not an object: {:?}", r, other),
        }
    }

    #[inline]
    pub fn string(&self, r: Ref) -> &JsString {
        match self.slot(r) {
            Slot::Str(s) => s,
            other => unreachable!("{:?} is not a string: {:?}", r, other),
        }
    }

    // -----------------------------------------------------------------------
    // Temporary root stack (LIFO)
    // -----------------------------------------------------------------------

    pub fn root_push(&mut self, v: Value) -> usize {
        self.roots.push(v);
        self.roots.len() - 1
    }

    #[inline]
    pub fn root_get(&self, idx: usize) -> Value {
        self.roots[idx]
    }

    #[inline]
    pub fn root_set(&mut self, idx: usize, v: Value) {
        self.roots[idx] = v;
    }

    /// Pop the top root, returning its possibly relocated value.
    pub fn root_pop(&mut self) -> Value {
        self.roots.pop().unwrap_or_else(|| unreachable!("root stack underflow"))
    }

    pub fn root_len(&self) -> usize {
        self.roots.len()
    }

    pub fn root_truncate(&mut self, len: usize) {
        self.roots.truncate(len);
    }

    pub(crate) fn take_slots(&mut self) -> Vec<Slot> {
        std::mem::take(&mut self.slots)
    }

    pub(crate) fn roots_mut(&mut self) -> &mut Vec<Value> {
        &mut self.roots
    }

    pub(crate) fn install(&mut self, slots: Vec<Slot>, live_bytes: usize) {
        self.slots = slots;
        self.bytes_used = live_bytes;
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// One collection cycle. The context forwards every external root through
/// `value`/`reference`, then `drain` scans copied slots until no gray slots
/// remain. Copy order is the order of first visit, so the compacted arena
/// is deterministic given the same root set and heap state.
pub struct Collector {
    old: Vec<Slot>,
    copied: Vec<Slot>,
    scan: Vec<u32>,
    live_bytes: usize,
}

impl Collector {
    pub fn new(old: Vec<Slot>) -> Self {
        Collector {
            old,
            copied: Vec::new(),
            scan: Vec::new(),
            live_bytes: 0,
        }
    }

    pub fn forward_ref(&mut self, r: Ref) -> Ref {
        let idx = r.0 as usize;
        if let Slot::Forwarded(n) = self.old[idx] {
            return Ref(n);
        }
        let new_idx = self.copied.len() as u32;
        let slot = std::mem::replace(&mut self.old[idx], Slot::Forwarded(new_idx));
        debug_assert!(!matches!(slot, Slot::Free), "collector visited a free slot");
        self.live_bytes += slot.footprint();
        self.copied.push(slot);
        self.scan.push(new_idx);
        Ref(new_idx)
    }

    pub fn forward(&mut self, v: Value) -> Value {
        if v.is_ref() {
            Value::from_ref(self.forward_ref(v.as_ref()))
        } else {
            v
        }
    }

    /// Scan gray slots, rewriting their edges and copying anything newly
    /// reached, until the arena is fully black.
    pub fn drain(&mut self) {
        while let Some(idx) = self.scan.pop() {
            let mut slot = std::mem::replace(&mut self.copied[idx as usize], Slot::Free);
            if let Slot::Object(ref mut o) = slot {
                o.trace(self);
            }
            self.copied[idx as usize] = slot;
        }
    }

    pub fn finish(self) -> (Vec<Slot>, usize, u64) {
        let copied = self.copied.len() as u64;
        (self.copied, self.live_bytes, copied)
    }
}

impl Tracer for Collector {
    fn value(&mut self, v: &mut Value) {
        *v = self.forward(*v);
    }

    fn reference(&mut self, r: &mut Ref) {
        *r = self.forward_ref(*r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Extra, JsClass, JsObject};

    fn plain_object() -> Slot {
        Slot::Object(JsObject::new(JsClass::Ordinary, None))
    }

    #[test]
    fn alloc_charges_budget() {
        let mut heap = Heap::new(1024, false, false);
        let before = heap.bytes_used();
        heap.push_slot(plain_object());
        assert!(heap.bytes_used() > before);
    }

    #[test]
    fn string_footprint_scales_with_contents() {
        let small = Slot::Str(JsString::new("ab".into()));
        let big = Slot::Str(JsString::new("a".repeat(100)));
        assert!(big.footprint() > small.footprint());
    }

    #[test]
    fn char_len_counts_code_points() {
        let s = JsString::new("héllo".into());
        assert_eq!(s.char_len, 5);
        assert_eq!(s.text.len(), 6);
    }

    #[test]
    fn collector_drops_unreachable_slots() {
        let mut heap = Heap::new(4096, false, false);
        let live = heap.push_slot(plain_object());
        heap.push_slot(plain_object()); // garbage
        heap.push_slot(Slot::Str(JsString::new("garbage".into())));

        let mut root = Value::from_ref(live);
        let mut gc = Collector::new(heap.take_slots());
        gc.value(&mut root);
        gc.drain();
        let (slots, bytes, copied) = gc.finish();
        heap.install(slots, bytes);

        assert_eq!(copied, 1);
        assert_eq!(root.as_ref().0, 0);
        assert!(matches!(heap.slot(root.as_ref()), Slot::Object(_)));
    }

    #[test]
    fn collector_rewrites_interior_edges() {
        let mut heap = Heap::new(4096, false, false);
        heap.push_slot(plain_object()); // garbage at index 0 shifts survivors
        let child = heap.push_slot(plain_object());
        let mut parent_obj = JsObject::new(JsClass::Array, None);
        parent_obj.extra = Extra::Elements(vec![Value::from_ref(child)]);
        let parent = heap.push_slot(Slot::Object(parent_obj));

        let mut root = Value::from_ref(parent);
        let mut gc = Collector::new(heap.take_slots());
        gc.value(&mut root);
        gc.drain();
        let (slots, bytes, copied) = gc.finish();
        heap.install(slots, bytes);

        assert_eq!(copied, 2);
        // parent copied first (pre-order), child relocated behind it
        assert_eq!(root.as_ref().0, 0);
        let parent = heap.object(root.as_ref());
        match &parent.extra {
            Extra::Elements(els) => assert_eq!(els[0].as_ref().0, 1),
            other => panic!("unexpected extra: {:?}", other),
        }
    }

    #[test]
    fn collection_is_idempotent_on_shared_targets() {
        let mut heap = Heap::new(4096, false, false);
        let shared = heap.push_slot(plain_object());
        let mut a = JsObject::new(JsClass::Ordinary, Some(shared));
        a.extra = Extra::None;
        let ar = heap.push_slot(Slot::Object(a));
        let b = JsObject::new(JsClass::Ordinary, Some(shared));
        let br = heap.push_slot(Slot::Object(b));

        let mut r1 = Value::from_ref(ar);
        let mut r2 = Value::from_ref(br);
        let mut gc = Collector::new(heap.take_slots());
        gc.value(&mut r1);
        gc.value(&mut r2);
        gc.drain();
        let (slots, bytes, copied) = gc.finish();
        heap.install(slots, bytes);

        assert_eq!(copied, 3);
        let pa = heap.object(r1.as_ref()).proto.unwrap();
        let pb = heap.object(r2.as_ref()).proto.unwrap();
        assert_eq!(pa, pb, "shared prototype must stay shared");
    }

    #[test]
    fn root_stack_is_lifo() {
        let mut heap = Heap::new(4096, false, false);
        let a = heap.root_push(Value::from_i32(1));
        let b = heap.root_push(Value::from_i32(2));
        assert_eq!(heap.root_get(a).as_i32(), 1);
        assert_eq!(heap.root_get(b).as_i32(), 2);
        assert_eq!(heap.root_pop().as_i32(), 2);
        assert_eq!(heap.root_pop().as_i32(), 1);
    }
}
