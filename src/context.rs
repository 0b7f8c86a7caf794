/// Context — the host-facing engine instance.
///
/// Owns the managed heap, the atom table, the realm, and every compartment.
/// All of the operations that can trigger a collection live here, because
/// the collection root set spans all four: realm intrinsics, compartment
/// globals and lexical records, and the heap's temporary root stack.
///
/// CALL PROTOCOL: `call_value` parks the callee, the receiver, and every
/// argument on the root stack for the duration of the call and hands
/// natives a `CallArgs` window into that region. Reading arguments through
/// `CallArgs` always yields post-relocation values, so a native may
/// allocate freely between reads.
use crate::atom::{well_known, Atom, AtomTable};
use crate::compartment::Compartment;
use crate::errors::JsError;
use crate::heap::{Heap, JsString, Ref, Slot};
use crate::object::{flags, Extra, FnKind, JsClass, JsObject, PropKind, Property};
use crate::realm::Realm;
use crate::value::{number_to_string, Value};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const MAX_CALL_DEPTH: u32 = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Size of the managed region in bytes; all engine dynamic state is
    /// charged against it.
    pub heap_size: usize,
    /// Collect on every allocation to surface missing roots.
    pub gc_stress: bool,
    /// Collection diagnostics on stderr.
    pub gc_debug: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            heap_size: 128 * 1024,
            gc_stress: false,
            gc_debug: false,
        }
    }
}

/// Rooted argument window for native calls. `base` points at the receiver;
/// arguments follow it on the root stack.
#[derive(Clone, Copy)]
pub struct CallArgs {
    base: usize,
    argc: usize,
}

impl CallArgs {
    pub fn this(&self, ctx: &Context) -> Value {
        ctx.heap.root_get(self.base)
    }

    pub fn arg(&self, ctx: &Context, i: usize) -> Value {
        if i < self.argc {
            ctx.heap.root_get(self.base + 1 + i)
        } else {
            Value::undefined()
        }
    }

    pub fn argc(&self) -> usize {
        self.argc
    }
}

pub struct Context {
    pub heap: Heap,
    pub atoms: AtomTable,
    pub realm: Realm,
    pub compartments: Vec<Compartment>,
    root_compartment: usize,
    pub(crate) current_compartment: usize,
    call_depth: u32,
    finalizers: Vec<Box<dyn FnMut()>>,
}

impl Context {
    pub fn new(config: ContextConfig) -> Result<Self, JsError> {
        let mut heap = Heap::new(config.heap_size, false, config.gc_debug);
        let mut atoms = AtomTable::new();
        // The intrinsic graph is allocated before the first collection
        // point; stress collection starts once the realm is in place.
        let realm = crate::intrinsics::create_realm(&mut heap, &mut atoms);
        if heap.bytes_used() > heap.capacity() {
            return Err(JsError::OutOfMemory);
        }
        heap.stress = config.gc_stress;
        let mut ctx = Context {
            heap,
            atoms,
            realm,
            compartments: Vec::new(),
            root_compartment: 0,
            current_compartment: 0,
            call_depth: 0,
            finalizers: Vec::new(),
        };
        let root = ctx.new_compartment(Value::undefined(), None)?;
        ctx.root_compartment = root;
        ctx.current_compartment = root;
        Ok(ctx)
    }

    /// Evaluate source in the context's root compartment.
    pub fn evaluate(&mut self, source: &str) -> Result<Value, JsError> {
        self.eval_in_compartment(self.root_compartment, source)
    }

    pub fn root_compartment(&self) -> usize {
        self.root_compartment
    }

    /// Host teardown hook; runs at drop.
    pub fn add_finalizer(&mut self, f: Box<dyn FnMut()>) {
        self.finalizers.push(f);
    }

    // -----------------------------------------------------------------------
    // Allocation and collection
    // -----------------------------------------------------------------------

    /// Reserve space for a slot, collecting once on exhaustion. The
    /// in-hand slot is traced as an extra root, so its fields may hold
    /// heap references; allocation is the last step that exposes it.
    pub fn alloc_slot(&mut self, mut slot: Slot) -> Result<Value, JsError> {
        let fp = slot.footprint();
        if self.heap.stress || !self.heap.fits(fp) {
            self.collect_with_extra(&mut slot);
            if !self.heap.fits(fp) {
                return Err(JsError::OutOfMemory);
            }
        }
        Ok(Value::from_ref(self.heap.push_slot(slot)))
    }

    pub fn alloc_object(&mut self, class: JsClass) -> Result<Value, JsError> {
        let proto = self.realm.class_proto(class);
        self.alloc_slot(Slot::Object(JsObject::new(class, Some(proto))))
    }

    pub fn alloc_object_with_proto(
        &mut self,
        class: JsClass,
        proto: Option<Ref>,
    ) -> Result<Value, JsError> {
        self.alloc_slot(Slot::Object(JsObject::new(class, proto)))
    }

    pub fn alloc_string(&mut self, s: impl Into<String>) -> Result<Value, JsError> {
        self.alloc_slot(Slot::Str(JsString::new(s.into())))
    }

    pub fn alloc_array(&mut self, elements: Vec<Value>) -> Result<Value, JsError> {
        let proto = self.realm.array_proto;
        let mut obj = JsObject::new(JsClass::Array, Some(proto));
        obj.extra = Extra::Elements(elements);
        self.alloc_slot(Slot::Object(obj))
    }

    /// A fresh error object of the named intrinsic class.
    pub fn alloc_error(&mut self, class_name: &str, message: &str) -> Result<Value, JsError> {
        let proto = self.realm.error_class_proto(class_name);
        let mut obj = JsObject::new(JsClass::Error, Some(proto));
        obj.props.push((
            well_known::MESSAGE,
            Property::data(Value::undefined(), true, false, true),
        ));
        let ev = self.alloc_slot(Slot::Object(obj))?;
        let ei = self.heap.root_push(ev);
        let msg = self.alloc_string(message)?;
        let ev = self.heap.root_get(ei);
        if let Some((_, p)) = self
            .heap
            .object_mut(ev.as_ref())
            .props
            .iter_mut()
            .find(|(k, _)| *k == well_known::MESSAGE)
        {
            if let PropKind::Data { value, .. } = &mut p.kind {
                *value = msg;
            }
        }
        Ok(self.heap.root_pop())
    }

    /// Materialize an engine error as a throwable script value.
    pub fn error_value(&mut self, e: &JsError) -> Result<Value, JsError> {
        match e {
            JsError::Thrown(v) => Ok(*v),
            other => self.alloc_error(other.class_name(), &other.message()),
        }
    }

    pub fn collect(&mut self) {
        self.collect_with_extra(&mut Slot::Free);
    }

    fn collect_with_extra(&mut self, extra: &mut Slot) {
        let t0 = Instant::now();
        let before = self.heap.bytes_used();
        let mut gc = crate::heap::Collector::new(self.heap.take_slots());

        // Root order is fixed: realm intrinsics, compartments in creation
        // order, then the temporary root stack bottom-up. Copy order (and
        // therefore the compacted arena) is deterministic.
        for r in self.realm.fields_mut() {
            *r = gc.forward_ref(*r);
        }
        for comp in self.compartments.iter_mut() {
            comp.global = gc.forward_ref(comp.global);
            comp.lexicals = gc.forward_ref(comp.lexicals);
        }
        for v in self.heap.roots_mut().iter_mut() {
            *v = gc.forward(*v);
        }
        if let Slot::Object(o) = extra {
            o.trace(&mut gc);
        }
        gc.drain();

        let (slots, live, copied) = gc.finish();
        self.heap.install(slots, live);
        let pause = t0.elapsed().as_micros() as u64;
        self.heap.stats.collections += 1;
        self.heap.stats.objects_copied += copied;
        self.heap.stats.bytes_reclaimed += before.saturating_sub(live) as u64;
        self.heap.stats.last_pause_us = pause;
        if self.heap.debug {
            eprintln!(
                "[gc] collection #{} — {} slots live, {} KB -> {} KB, {} µs",
                self.heap.stats.collections,
                copied,
                before / 1024,
                live / 1024,
                pause
            );
        }
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    pub fn to_boolean(&self, v: Value) -> bool {
        if v.is_undefined() || v.is_null() {
            false
        } else if v.is_bool() {
            v.as_bool()
        } else if v.is_number() {
            let n = v.as_number();
            n != 0.0 && !n.is_nan()
        } else if v.is_char() {
            true
        } else if v.is_ref() {
            match self.heap.slot(v.as_ref()) {
                Slot::Str(s) => !s.text.is_empty(),
                _ => true,
            }
        } else {
            true
        }
    }

    pub fn to_number(&self, v: Value) -> f64 {
        if v.is_number() {
            return v.as_number();
        }
        if v.is_bool() {
            return if v.as_bool() { 1.0 } else { 0.0 };
        }
        if v.is_null() {
            return 0.0;
        }
        if v.is_undefined() {
            return f64::NAN;
        }
        if let Some(text) = v.string_chars(&self.heap) {
            let t = text.trim();
            if t.is_empty() {
                return 0.0;
            }
            if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
                return u64::from_str_radix(hex, 16)
                    .map(|n| n as f64)
                    .unwrap_or(f64::NAN);
            }
            return t.parse::<f64>().unwrap_or(f64::NAN);
        }
        f64::NAN
    }

    /// Non-allocating ToString used for diagnostics, property keys, and
    /// string concatenation.
    pub fn to_display(&self, v: Value) -> String {
        if v.is_undefined() {
            return "undefined".into();
        }
        if v.is_null() {
            return "null".into();
        }
        if v.is_bool() {
            return v.as_bool().to_string();
        }
        if v.is_number() {
            return number_to_string(v.as_number());
        }
        if v.is_char() {
            return v.as_char().to_string();
        }
        match self.heap.slot(v.as_ref()) {
            Slot::Str(s) => s.text.clone(),
            Slot::Object(o) => match &o.extra {
                Extra::Elements(els) => els
                    .iter()
                    .map(|e| {
                        if e.is_nullish() {
                            String::new()
                        } else {
                            self.to_display(*e)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                Extra::Function(FnKind::Native { name, .. }) => {
                    format!("function {}() {{ [native code] }}", name)
                }
                Extra::Function(FnKind::Script(_)) => "function () { [source hidden] }".into(),
                Extra::Regex { source, flag_str, .. } => format!("/{}/{}", source, flag_str),
                _ => {
                    if o.class == JsClass::Error {
                        let name = self
                            .raw_lookup_display(v.as_ref(), well_known::NAME)
                            .unwrap_or_else(|| "Error".into());
                        match self.raw_lookup_display(v.as_ref(), well_known::MESSAGE) {
                            Some(m) if !m.is_empty() => format!("{}: {}", name, m),
                            _ => name,
                        }
                    } else {
                        "[object Object]".into()
                    }
                }
            },
            _ => "undefined".into(),
        }
    }

    fn raw_lookup_display(&self, o: Ref, key: Atom) -> Option<String> {
        let (_, p) = self.heap.lookup(o, key)?;
        match p.kind {
            PropKind::Data { value, .. } if !value.is_undefined() => Some(self.to_display(value)),
            _ => None,
        }
    }

    pub fn to_js_string(&mut self, v: Value) -> Result<Value, JsError> {
        if v.is_ref() {
            if let Slot::Str(_) = self.heap.slot(v.as_ref()) {
                return Ok(v);
            }
        }
        let text = self.to_display(v);
        self.alloc_string(text)
    }

    pub fn to_atom_key(&mut self, v: Value) -> Atom {
        let text = self.to_display(v);
        self.atoms.intern(&text)
    }

    pub fn typeof_str(&self, v: Value) -> &'static str {
        if v.is_undefined() {
            "undefined"
        } else if v.is_null() {
            "object"
        } else if v.is_bool() {
            "boolean"
        } else if v.is_number() {
            "number"
        } else if v.is_char() {
            "string"
        } else {
            match self.heap.slot(v.as_ref()) {
                Slot::Str(_) => "string",
                Slot::Object(o) => {
                    if o.is_callable() {
                        "function"
                    } else {
                        "object"
                    }
                }
                _ => "object",
            }
        }
    }

    // -----------------------------------------------------------------------
    // Property access (full paths: getters/setters, array exotics,
    // primitive receivers)
    // -----------------------------------------------------------------------

    /// Canonical array index encoded by an atom, if any.
    fn key_as_index(&self, key: Atom) -> Option<usize> {
        crate::object::atom_as_index(&self.atoms, key)
    }

    fn is_indexed(&self, o: Ref) -> bool {
        matches!(
            self.heap.object(o).class,
            JsClass::Array | JsClass::Arguments
        )
    }

    pub fn get_prop(&mut self, target: Value, key: Atom) -> Result<Value, JsError> {
        if target.is_nullish() {
            return Err(JsError::Type(format!(
                "cannot read property '{}' of {}",
                self.atoms.name(key),
                self.to_display(target)
            )));
        }

        // primitive receivers resolve against the shared prototypes
        if !target.is_ref() || matches!(self.heap.slot(target.as_ref()), Slot::Str(_)) {
            return self.get_primitive_prop(target, key);
        }

        let o = target.as_ref();
        if self.is_indexed(o) {
            if key == well_known::LENGTH {
                let len = self.heap.object(o).elements().map_or(0, |e| e.len());
                return Ok(Value::number(len as f64));
            }
            if let Some(idx) = self.key_as_index(key) {
                let els = self.heap.object(o).elements();
                return Ok(els
                    .and_then(|e| e.get(idx).copied())
                    .unwrap_or(Value::undefined()));
            }
        }

        match self.heap.lookup(o, key) {
            Some((_, p)) => match p.kind {
                PropKind::Data { value, .. } => Ok(value),
                PropKind::Accessor { get: Some(g), .. } => {
                    self.call_value(Value::from_ref(g), target, &[])
                }
                PropKind::Accessor { get: None, .. } => Ok(Value::undefined()),
            },
            None => Ok(Value::undefined()),
        }
    }

    fn get_primitive_prop(&mut self, target: Value, key: Atom) -> Result<Value, JsError> {
        let proto = if target.is_string(&self.heap) {
            if key == well_known::LENGTH {
                let len = if target.is_char() {
                    1
                } else {
                    self.heap.string(target.as_ref()).char_len
                };
                return Ok(Value::number(len as f64));
            }
            self.realm.string_proto
        } else if target.is_number() {
            self.realm.number_proto
        } else if target.is_bool() {
            self.realm.boolean_proto
        } else {
            return Ok(Value::undefined());
        };

        match self.heap.lookup(proto, key) {
            Some((_, p)) => match p.kind {
                PropKind::Data { value, .. } => Ok(value),
                PropKind::Accessor { get: Some(g), .. } => {
                    self.call_value(Value::from_ref(g), target, &[])
                }
                PropKind::Accessor { get: None, .. } => Ok(Value::undefined()),
            },
            None => Ok(Value::undefined()),
        }
    }

    /// Computed member access. Integer indices hit array elements and
    /// string code points directly; everything else goes through an atom.
    pub fn get_element(&mut self, target: Value, index: Value) -> Result<Value, JsError> {
        if index.is_int() && index.as_i32() >= 0 {
            let idx = index.as_i32() as usize;
            if target.is_ref() {
                match self.heap.slot(target.as_ref()) {
                    Slot::Str(s) => {
                        return Ok(s
                            .text
                            .chars()
                            .nth(idx)
                            .map(Value::from_char)
                            .unwrap_or(Value::undefined()));
                    }
                    Slot::Object(o)
                        if matches!(o.class, JsClass::Array | JsClass::Arguments) =>
                    {
                        return Ok(o
                            .elements()
                            .and_then(|e| e.get(idx).copied())
                            .unwrap_or(Value::undefined()));
                    }
                    _ => {}
                }
            }
        }
        let key = self.to_atom_key(index);
        self.get_prop(target, key)
    }

    /// Assignment. Implements the full ordinary [[Set]] path plus the
    /// array exotics: frozen and read-only rejections, shadowing of
    /// writable prototype data properties, extension checks, hole bans.
    pub fn set_prop(&mut self, target: Value, key: Atom, value: Value) -> Result<(), JsError> {
        if !target.is_object(&self.heap) {
            return Err(JsError::Type(format!(
                "cannot set property '{}' on a non-object",
                self.atoms.name(key)
            )));
        }
        let o = target.as_ref();

        if self.is_indexed(o) {
            if key == well_known::LENGTH {
                return self.set_array_length(o, value);
            }
            if let Some(idx) = self.key_as_index(key) {
                return self.set_element(o, idx, value);
            }
        }

        match self.heap.lookup(o, key) {
            Some((holder, p)) => match p.kind {
                PropKind::Accessor { set: Some(s), .. } => {
                    self.call_value(Value::from_ref(s), target, &[value])?;
                    Ok(())
                }
                PropKind::Accessor { set: None, .. } => Err(JsError::Type(format!(
                    "cannot set property '{}': getter-only accessor",
                    self.atoms.name(key)
                ))),
                PropKind::Data { writable, .. } => {
                    if holder == o {
                        if self.heap.object(o).has_flag(flags::FROZEN) || !writable {
                            return Err(JsError::Type(format!(
                                "cannot assign to read-only property '{}'",
                                self.atoms.name(key)
                            )));
                        }
                        let slot = self
                            .heap
                            .object_mut(o)
                            .props
                            .iter_mut()
                            .find(|(k, _)| *k == key)
                            .map(|(_, p)| p)
                            .unwrap_or_else(|| unreachable!("holder lost own property"));
                        slot.kind = PropKind::Data {
                            value,
                            writable: true,
                        };
                        Ok(())
                    } else if !writable {
                        Err(JsError::Type(format!(
                            "cannot assign to read-only property '{}'",
                            self.atoms.name(key)
                        )))
                    } else {
                        self.create_own_field(o, key, value)
                    }
                }
            },
            None => self.create_own_field(o, key, value),
        }
    }

    fn create_own_field(&mut self, o: Ref, key: Atom, value: Value) -> Result<(), JsError> {
        if !self.heap.object(o).is_extensible() {
            return Err(JsError::Type(format!(
                "cannot add property '{}': object is not extensible",
                self.atoms.name(key)
            )));
        }
        self.heap.charge(crate::heap::PROP_ENTRY);
        self.heap
            .object_mut(o)
            .props
            .push((key, Property::field(value)));
        Ok(())
    }

    pub fn set_element(&mut self, o: Ref, idx: usize, value: Value) -> Result<(), JsError> {
        let obj = self.heap.object(o);
        if obj.has_flag(flags::FROZEN) {
            return Err(JsError::Type(format!(
                "cannot assign to element {} of a frozen array",
                idx
            )));
        }
        let len = obj.elements().map_or(0, |e| e.len());
        if idx < len {
            if let Some(els) = self.heap.object_mut(o).elements_mut() {
                els[idx] = value;
            }
            Ok(())
        } else if idx == len {
            if !self.heap.object(o).is_extensible() {
                return Err(JsError::Type(
                    "cannot add elements: array is not extensible".into(),
                ));
            }
            self.heap.charge(8);
            if let Some(els) = self.heap.object_mut(o).elements_mut() {
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

    fn set_array_length(&mut self, o: Ref, value: Value) -> Result<(), JsError> {
        let n = self.to_number(value);
        if n < 0.0 || n.trunc() != n || !n.is_finite() {
            return Err(JsError::Range("invalid array length".into()));
        }
        if self.heap.object(o).has_flag(flags::FROZEN) {
            return Err(JsError::Type(
                "cannot set length of a frozen array".into(),
            ));
        }
        let new_len = n as usize;
        let len = self.heap.object(o).elements().map_or(0, |e| e.len());
        if new_len <= len {
            if let Some(els) = self.heap.object_mut(o).elements_mut() {
                els.truncate(new_len);
            }
            Ok(())
        } else {
            Err(JsError::Type(
                "cannot grow length: holes are not supported".into(),
            ))
        }
    }

    pub fn set_element_value(
        &mut self,
        target: Value,
        index: Value,
        value: Value,
    ) -> Result<(), JsError> {
        if target.is_object(&self.heap) && index.is_int() && index.as_i32() >= 0 {
            let o = target.as_ref();
            if self.is_indexed(o) {
                return self.set_element(o, index.as_i32() as usize, value);
            }
        }
        let key = self.to_atom_key(index);
        self.set_prop(target, key, value)
    }

    /// The `in` operator / §4.2 `has`: prototype-walking presence check.
    pub fn has_prop(&mut self, target: Value, key: Atom) -> Result<bool, JsError> {
        if !target.is_object(&self.heap) {
            return Err(JsError::Type(
                "'in' operator applied to a non-object".into(),
            ));
        }
        let o = target.as_ref();
        if self.is_indexed(o) {
            if key == well_known::LENGTH {
                return Ok(true);
            }
            if let Some(idx) = self.key_as_index(key) {
                let len = self.heap.object(o).elements().map_or(0, |e| e.len());
                return Ok(idx < len);
            }
        }
        Ok(self.heap.has_property(o, key))
    }

    pub fn delete_prop(&mut self, target: Value, key: Atom) -> Result<bool, JsError> {
        if !target.is_object(&self.heap) {
            return Ok(true);
        }
        let o = target.as_ref();
        if self.is_indexed(o) && self.key_as_index(key).is_some() {
            return Err(JsError::Type(
                "cannot delete array elements: holes are not supported".into(),
            ));
        }
        self.heap.delete_property(&self.atoms, o, key)
    }

    /// Own enumerable keys in insertion order; array element indices come
    /// first, as interned index atoms.
    pub fn own_enumerable_keys(&mut self, o: Ref) -> Vec<Atom> {
        let mut keys = Vec::new();
        let len = self.heap.object(o).elements().map_or(0, |e| e.len());
        for i in 0..len {
            keys.push(self.atoms.intern(&i.to_string()));
        }
        for (k, p) in self.heap.object(o).props.iter() {
            if p.enumerable {
                keys.push(*k);
            }
        }
        keys
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    pub fn is_callable(&self, v: Value) -> bool {
        v.is_ref()
            && matches!(self.heap.slot(v.as_ref()), Slot::Object(o) if o.is_callable())
    }

    pub fn call_value(
        &mut self,
        func: Value,
        this: Value,
        args: &[Value],
    ) -> Result<Value, JsError> {
        if !self.is_callable(func) {
            return Err(JsError::Type(format!(
                "{} is not a function",
                self.to_display(func)
            )));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(JsError::Range("maximum call stack size exceeded".into()));
        }

        let frame_base = self.heap.root_len();
        let fi = self.heap.root_push(func);
        let base = self.heap.root_push(this);
        for a in args {
            self.heap.root_push(*a);
        }
        let call_args = CallArgs {
            base,
            argc: args.len(),
        };

        self.call_depth += 1;
        let result = self.dispatch_call(fi, call_args);
        self.call_depth -= 1;
        self.heap.root_truncate(frame_base);
        result
    }

    fn dispatch_call(&mut self, fi: usize, args: CallArgs) -> Result<Value, JsError> {
        enum Callee {
            Native(crate::object::NativeFn),
            Script(crate::object::ScriptFn),
        }
        let func = self.heap.root_get(fi);
        let callee = match self.heap.object(func.as_ref()).function() {
            Some(FnKind::Native { func, .. }) => Callee::Native(*func),
            Some(FnKind::Script(sf)) => Callee::Script(sf.clone()),
            None => unreachable!("dispatch on a non-function"),
        };
        match callee {
            Callee::Native(native) => native(self, args),
            Callee::Script(script) => self.call_script_function(script, args),
        }
    }

    /// `new F(...)` — allocates the receiver from F.prototype, runs the
    /// call, and keeps the receiver unless the body returned an object.
    pub fn construct(&mut self, func: Value, args: &[Value]) -> Result<Value, JsError> {
        if !self.is_callable(func) {
            return Err(JsError::Type(format!(
                "{} is not a constructor",
                self.to_display(func)
            )));
        }
        // native constructors build their own instances
        if matches!(
            self.heap.object(func.as_ref()).function(),
            Some(FnKind::Native { .. })
        ) {
            return self.call_value(func, Value::undefined(), args);
        }

        let base = self.heap.root_len();
        self.heap.root_push(func);
        for a in args {
            self.heap.root_push(*a);
        }

        let proto_val = self.get_prop(func, well_known::PROTOTYPE)?;
        let proto = if proto_val.is_object(&self.heap) {
            Some(proto_val.as_ref())
        } else {
            Some(self.realm.object_proto)
        };
        let this = self.alloc_object_with_proto(JsClass::Ordinary, proto)?;
        let ti = self.heap.root_push(this);

        let func = self.heap.root_get(base);
        let args: Vec<Value> = (0..args.len())
            .map(|i| self.heap.root_get(base + 1 + i))
            .collect();
        let result = self.call_value(func, this, &args);
        let this = self.heap.root_get(ti);
        self.heap.root_truncate(base);

        let r = result?;
        Ok(if r.is_object(&self.heap) { r } else { this })
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for f in self.finalizers.iter_mut() {
            f();
        }
    }
}
