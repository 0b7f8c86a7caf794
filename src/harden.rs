/// Hardening — transitive, rollback-safe promotion to the top of the
/// immutability lattice, and the one-shot realm lockdown built on it.
///
/// The traversal never allocates, so heap references stay stable for the
/// whole walk and the work queue can hold bare `Ref`s. Enqueue order is
/// prototype first, then own properties in insertion order with values
/// before getters and getters before setters; array elements are own
/// properties and precede the named table. The already-hardened
/// short-circuit makes circular graphs O(N).
use crate::context::Context;
use crate::errors::JsError;
use crate::heap::{Heap, Ref, Slot};
use crate::object::{flags, PropKind};
use crate::value::Value;
use std::collections::VecDeque;

/// Promote everything reachable from `root` to hardened. Primitives and
/// strings pass through; already-hardened graphs return immediately. On
/// failure every tentatively-set HARDENED flag is cleared and the original
/// error is re-raised, so no partial hardening is observable.
pub fn harden(ctx: &mut Context, root: Value) -> Result<Value, JsError> {
    if !root.is_object(&ctx.heap) {
        return Ok(root);
    }
    let start = root.as_ref();
    if ctx.heap.is_hardened(start) {
        return Ok(root);
    }

    let mut queue: VecDeque<Ref> = VecDeque::new();
    let mut processed: Vec<Ref> = Vec::new();
    queue.push_back(start);

    let mut failure: Option<JsError> = None;
    while let Some(o) = queue.pop_front() {
        if ctx.heap.is_hardened(o) {
            continue;
        }
        if let Err(e) = ctx.heap.freeze(&ctx.atoms, o) {
            failure = Some(e);
            break;
        }
        enqueue_children(&ctx.heap, o, &mut queue);
        ctx.heap.object_mut(o).set_flag(flags::HARDENED);
        processed.push(o);
    }

    if let Some(e) = failure {
        for p in processed {
            ctx.heap.object_mut(p).clear_hardened();
        }
        return Err(e);
    }
    Ok(root)
}

fn enqueue_children(heap: &Heap, o: Ref, queue: &mut VecDeque<Ref>) {
    let obj = heap.object(o);
    if let Some(p) = obj.proto {
        enqueue(heap, p, queue);
    }
    if let Some(els) = obj.elements() {
        for v in els {
            enqueue_value(heap, *v, queue);
        }
    }
    for (_, prop) in obj.props.iter() {
        match &prop.kind {
            PropKind::Data { value, .. } => enqueue_value(heap, *value, queue),
            PropKind::Accessor { get, set } => {
                if let Some(g) = get {
                    enqueue(heap, *g, queue);
                }
                if let Some(s) = set {
                    enqueue(heap, *s, queue);
                }
            }
        }
    }
}

fn enqueue_value(heap: &Heap, v: Value, queue: &mut VecDeque<Ref>) {
    if v.is_ref() {
        enqueue(heap, v.as_ref(), queue);
    }
}

fn enqueue(heap: &Heap, r: Ref, queue: &mut VecDeque<Ref>) {
    match heap.slot(r) {
        Slot::Object(o) if !o.has_flag(flags::HARDENED) => queue.push_back(r),
        _ => {}
    }
}

/// One-shot realm lockdown: latch the flag, then harden every intrinsic
/// root. The flag latches BEFORE hardening begins, so a failed pass cannot
/// be retried; a half-locked realm is never re-exposed.
pub fn lockdown(ctx: &mut Context) -> Result<Value, JsError> {
    if ctx.realm.locked_down {
        return Err(JsError::Type(
            "lockdown was already called for this realm".into(),
        ));
    }
    ctx.realm.locked_down = true;
    for root in ctx.realm.intrinsic_roots() {
        harden(ctx, Value::from_ref(root))?;
    }
    Ok(Value::undefined())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;
    use crate::heap::JsString;
    use crate::object::{Extra, JsClass, JsObject, Property};

    fn heap() -> (Heap, AtomTable) {
        (Heap::new(64 * 1024, false, false), AtomTable::new())
    }

    // these exercise the traversal shape directly; end-to-end hardening
    // runs through Context in tests/harden.rs
    #[test]
    fn enqueue_order_is_proto_then_elements_then_props() {
        let (mut heap, mut atoms) = heap();
        let proto = heap.push_slot(Slot::Object(JsObject::new(JsClass::Ordinary, None)));
        let element = heap.push_slot(Slot::Object(JsObject::new(JsClass::Ordinary, None)));
        let named = heap.push_slot(Slot::Object(JsObject::new(JsClass::Ordinary, None)));

        let mut host = JsObject::new(JsClass::Array, Some(proto));
        host.extra = Extra::Elements(vec![Value::from_ref(element)]);
        let k = atoms.intern("k");
        host.props
            .push((k, Property::field(Value::from_ref(named))));
        let host = heap.push_slot(Slot::Object(host));

        let mut q = VecDeque::new();
        enqueue_children(&heap, host, &mut q);
        assert_eq!(q, VecDeque::from(vec![proto, element, named]));
    }

    #[test]
    fn strings_and_primitives_are_not_enqueued() {
        let (mut heap, mut atoms) = heap();
        let s = heap.push_slot(Slot::Str(JsString::new("text".into())));
        let mut host = JsObject::new(JsClass::Ordinary, None);
        let k = atoms.intern("k");
        host.props.push((k, Property::field(Value::from_ref(s))));
        let j = atoms.intern("j");
        host.props.push((j, Property::field(Value::from_i32(1))));
        let host = heap.push_slot(Slot::Object(host));

        let mut q = VecDeque::new();
        enqueue_children(&heap, host, &mut q);
        assert!(q.is_empty());
    }
}
