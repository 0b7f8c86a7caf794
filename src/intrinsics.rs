/// Intrinsics — the shared constructor/prototype graph and every native
/// function bound into compartment globals.
///
/// `create_realm` runs during context bootstrap, before the first
/// collection point, so it allocates straight into the heap without
/// rooting ceremony. Everything after bootstrap (the natives themselves)
/// follows the standard rooting discipline: arguments are read through the
/// rooted `CallArgs` window and anything held across an allocation is
/// parked on the root stack.
///
/// Modules:
///   Object    — descriptor machinery, lattice operations
///   Array     — dense, hole-free element surface + iterator protocol
///   Function  — prototype sink; the Function constructor is disabled
///   String / Number / Boolean — primitive prototypes, ASCII-only casing
///   Math      — f64 intrinsics (untamed random)
///   JSON      — serde_json bridge
///   Error     — Error + TypeError / RangeError / ReferenceError / SyntaxError
///   RegExp    — regex-crate subset, flags g/i/m/s/u/y
///   Date      — Date.now only
///   Compartment / harden / lockdown — the isolation surface
use crate::atom::{well_known, Atom, AtomTable};
use crate::context::{CallArgs, Context};
use crate::errors::JsError;
use crate::heap::{Heap, JsString, Ref, Slot};
use crate::object::{flags, Extra, FnKind, JsClass, JsObject, NativeFn, PropKind, Property};
use crate::realm::Realm;
use crate::value::{number_to_string, Value};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Bootstrap builder
// ---------------------------------------------------------------------------

struct Builder<'a> {
    heap: &'a mut Heap,
    atoms: &'a mut AtomTable,
}

impl<'a> Builder<'a> {
    fn object(&mut self, class: JsClass, proto: Option<Ref>) -> Ref {
        self.heap.push_slot(Slot::Object(JsObject::new(class, proto)))
    }

    fn array_proto_obj(&mut self, proto: Ref) -> Ref {
        let mut o = JsObject::new(JsClass::Array, Some(proto));
        o.extra = Extra::Elements(Vec::new());
        self.heap.push_slot(Slot::Object(o))
    }

    fn native(&mut self, name: &'static str, func: NativeFn, fproto: Ref) -> Ref {
        let mut o = JsObject::new(JsClass::Function, Some(fproto));
        o.extra = Extra::Function(FnKind::Native { name, func });
        self.heap.push_slot(Slot::Object(o))
    }

    fn str_val(&mut self, s: &str) -> Value {
        Value::from_ref(self.heap.push_slot(Slot::Str(JsString::new(s.into()))))
    }

    /// Builtin property convention: writable, non-enumerable, configurable.
    fn def(&mut self, obj: Ref, name: &str, v: Value) {
        let key = self.atoms.intern(name);
        self.heap
            .object_mut(obj)
            .props
            .push((key, Property::data(v, true, false, true)));
    }

    fn def_ro(&mut self, obj: Ref, name: &str, v: Value) {
        let key = self.atoms.intern(name);
        self.heap
            .object_mut(obj)
            .props
            .push((key, Property::data(v, false, false, false)));
    }

    fn def_fn(&mut self, obj: Ref, name: &'static str, func: NativeFn, fproto: Ref) {
        let f = self.native(name, func, fproto);
        self.def(obj, name, Value::from_ref(f));
    }

    fn def_accessor(&mut self, obj: Ref, name: &str, get: Ref) {
        let key = self.atoms.intern(name);
        self.heap
            .object_mut(obj)
            .props
            .push((key, Property::accessor(Some(get), None, false, true)));
    }

    /// Constructor wiring: `prototype` on the function, `constructor` on
    /// the prototype.
    fn ctor(&mut self, name: &'static str, func: NativeFn, fproto: Ref, proto: Ref) -> Ref {
        let c = self.native(name, func, fproto);
        self.def_ro(c, "prototype", Value::from_ref(proto));
        self.def(proto, "constructor", Value::from_ref(c));
        c
    }
}

pub fn create_realm(heap: &mut Heap, atoms: &mut AtomTable) -> Realm {
    let mut b = Builder { heap, atoms };

    // prototype skeleton
    let object_proto = b.object(JsClass::Ordinary, None);
    let function_proto = b.native("", js_function_proto_sink, object_proto);
    let array_proto = b.array_proto_obj(object_proto);
    let string_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let number_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let boolean_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let error_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let type_error_proto = b.object(JsClass::Ordinary, Some(error_proto));
    let range_error_proto = b.object(JsClass::Ordinary, Some(error_proto));
    let reference_error_proto = b.object(JsClass::Ordinary, Some(error_proto));
    let syntax_error_proto = b.object(JsClass::Ordinary, Some(error_proto));
    let regexp_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let compartment_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let array_iter_proto = b.object(JsClass::Ordinary, Some(object_proto));
    let throw_type_error = b.native("ThrowTypeError", js_throw_type_error, function_proto);

    // ======================= MODULE: Object ==============================
    let object_ctor = b.ctor("Object", js_object_ctor, function_proto, object_proto);
    b.def_fn(object_ctor, "keys", js_object_keys, function_proto);
    b.def_fn(object_ctor, "create", js_object_create, function_proto);
    b.def_fn(object_ctor, "defineProperty", js_object_define_property, function_proto);
    b.def_fn(
        object_ctor,
        "getOwnPropertyDescriptor",
        js_object_get_own_property_descriptor,
        function_proto,
    );
    b.def_fn(object_ctor, "getPrototypeOf", js_object_get_prototype_of, function_proto);
    b.def_fn(object_ctor, "setPrototypeOf", js_object_set_prototype_of, function_proto);
    b.def_fn(
        object_ctor,
        "preventExtensions",
        js_object_prevent_extensions,
        function_proto,
    );
    b.def_fn(object_ctor, "seal", js_object_seal, function_proto);
    b.def_fn(object_ctor, "freeze", js_object_freeze, function_proto);
    b.def_fn(object_ctor, "isExtensible", js_object_is_extensible, function_proto);
    b.def_fn(object_ctor, "isSealed", js_object_is_sealed, function_proto);
    b.def_fn(object_ctor, "isFrozen", js_object_is_frozen, function_proto);
    b.def_fn(object_proto, "hasOwnProperty", js_object_has_own_property, function_proto);
    b.def_fn(object_proto, "toString", js_object_to_string, function_proto);

    // ======================= MODULE: Function ============================
    let function_ctor = b.ctor("Function", js_function_ctor, function_proto, function_proto);

    // ======================= MODULE: Array ===============================
    let array_ctor = b.ctor("Array", js_array_ctor, function_proto, array_proto);
    b.def_fn(array_ctor, "isArray", js_array_is_array, function_proto);
    b.def_fn(array_proto, "push", js_array_push, function_proto);
    b.def_fn(array_proto, "pop", js_array_pop, function_proto);
    b.def_fn(array_proto, "indexOf", js_array_index_of, function_proto);
    b.def_fn(array_proto, "join", js_array_join, function_proto);
    b.def_fn(array_proto, "slice", js_array_slice, function_proto);
    b.def_fn(array_proto, "values", js_array_values, function_proto);
    b.def_fn(array_iter_proto, "next", js_array_iter_next, function_proto);

    // ======================= MODULE: String ==============================
    let string_ctor = b.ctor("String", js_string_ctor, function_proto, string_proto);
    b.def_fn(string_proto, "charAt", js_string_char_at, function_proto);
    b.def_fn(string_proto, "charCodeAt", js_string_char_code_at, function_proto);
    b.def_fn(string_proto, "indexOf", js_string_index_of, function_proto);
    b.def_fn(string_proto, "slice", js_string_slice, function_proto);
    b.def_fn(string_proto, "toUpperCase", js_string_to_upper, function_proto);
    b.def_fn(string_proto, "toLowerCase", js_string_to_lower, function_proto);
    b.def_fn(string_proto, "split", js_string_split, function_proto);
    b.def_fn(string_proto, "trim", js_string_trim, function_proto);
    b.def_fn(string_proto, "toString", js_string_self, function_proto);

    // ======================= MODULE: Number ==============================
    let number_ctor = b.ctor("Number", js_number_ctor, function_proto, number_proto);
    b.def_fn(number_ctor, "isInteger", js_number_is_integer, function_proto);
    b.def_fn(number_ctor, "isNaN", js_number_is_nan, function_proto);
    b.def_ro(number_ctor, "MAX_SAFE_INTEGER", Value::from_f64(9007199254740991.0));
    b.def_ro(number_ctor, "MIN_SAFE_INTEGER", Value::from_f64(-9007199254740991.0));
    b.def_fn(number_proto, "toString", js_number_to_string, function_proto);

    // ======================= MODULE: Boolean =============================
    let boolean_ctor = b.ctor("Boolean", js_boolean_ctor, function_proto, boolean_proto);

    // ======================= MODULE: Math ================================
    let math_obj = b.object(JsClass::Ordinary, Some(object_proto));
    b.def_ro(math_obj, "PI", Value::from_f64(std::f64::consts::PI));
    b.def_ro(math_obj, "E", Value::from_f64(std::f64::consts::E));
    b.def_fn(math_obj, "abs", js_math_abs, function_proto);
    b.def_fn(math_obj, "floor", js_math_floor, function_proto);
    b.def_fn(math_obj, "ceil", js_math_ceil, function_proto);
    b.def_fn(math_obj, "round", js_math_round, function_proto);
    b.def_fn(math_obj, "trunc", js_math_trunc, function_proto);
    b.def_fn(math_obj, "sign", js_math_sign, function_proto);
    b.def_fn(math_obj, "sqrt", js_math_sqrt, function_proto);
    b.def_fn(math_obj, "pow", js_math_pow, function_proto);
    b.def_fn(math_obj, "min", js_math_min, function_proto);
    b.def_fn(math_obj, "max", js_math_max, function_proto);
    b.def_fn(math_obj, "log", js_math_log, function_proto);
    b.def_fn(math_obj, "exp", js_math_exp, function_proto);
    b.def_fn(math_obj, "random", js_math_random, function_proto);

    // ======================= MODULE: JSON ================================
    let json_obj = b.object(JsClass::Ordinary, Some(object_proto));
    b.def_fn(json_obj, "parse", js_json_parse, function_proto);
    b.def_fn(json_obj, "stringify", js_json_stringify, function_proto);

    // ======================= MODULE: Error ===============================
    let error_ctor = b.ctor("Error", js_error_ctor, function_proto, error_proto);
    let type_error_ctor = b.ctor("TypeError", js_type_error_ctor, function_proto, type_error_proto);
    let range_error_ctor =
        b.ctor("RangeError", js_range_error_ctor, function_proto, range_error_proto);
    let reference_error_ctor = b.ctor(
        "ReferenceError",
        js_reference_error_ctor,
        function_proto,
        reference_error_proto,
    );
    let syntax_error_ctor = b.ctor(
        "SyntaxError",
        js_syntax_error_ctor,
        function_proto,
        syntax_error_proto,
    );
    for (proto, name) in [
        (error_proto, "Error"),
        (type_error_proto, "TypeError"),
        (range_error_proto, "RangeError"),
        (reference_error_proto, "ReferenceError"),
        (syntax_error_proto, "SyntaxError"),
    ] {
        let n = b.str_val(name);
        b.def(proto, "name", n);
        let m = b.str_val("");
        b.def(proto, "message", m);
    }
    b.def_fn(error_proto, "toString", js_error_to_string, function_proto);

    // ======================= MODULE: RegExp ==============================
    let regexp_ctor = b.ctor("RegExp", js_regexp_ctor, function_proto, regexp_proto);
    b.def_fn(regexp_proto, "test", js_regexp_test, function_proto);
    b.def_fn(regexp_proto, "exec", js_regexp_exec, function_proto);

    // ======================= MODULE: Date ================================
    let date_obj = b.object(JsClass::Ordinary, Some(object_proto));
    b.def_fn(date_obj, "now", js_date_now, function_proto);

    // ======================= MODULE: Compartment =========================
    let compartment_ctor = b.ctor(
        "Compartment",
        js_compartment_ctor,
        function_proto,
        compartment_proto,
    );
    let global_this_getter = b.native("globalThis", js_compartment_global_this, function_proto);
    b.def_accessor(compartment_proto, "globalThis", global_this_getter);
    b.def_fn(compartment_proto, "evaluate", js_compartment_evaluate, function_proto);

    // free functions
    let parse_int_fn = b.native("parseInt", js_parse_int, function_proto);
    let parse_float_fn = b.native("parseFloat", js_parse_float, function_proto);
    let is_nan_fn = b.native("isNaN", js_is_nan, function_proto);
    let is_finite_fn = b.native("isFinite", js_is_finite, function_proto);
    let harden_fn = b.native("harden", js_harden, function_proto);
    let lockdown_fn = b.native("lockdown", js_lockdown, function_proto);

    Realm {
        object_proto,
        function_proto,
        array_proto,
        string_proto,
        number_proto,
        boolean_proto,
        error_proto,
        type_error_proto,
        range_error_proto,
        reference_error_proto,
        syntax_error_proto,
        regexp_proto,
        compartment_proto,
        array_iter_proto,
        throw_type_error,
        function_ctor,
        object_ctor,
        array_ctor,
        string_ctor,
        number_ctor,
        boolean_ctor,
        error_ctor,
        type_error_ctor,
        range_error_ctor,
        reference_error_ctor,
        syntax_error_ctor,
        regexp_ctor,
        compartment_ctor,
        math_obj,
        json_obj,
        date_obj,
        parse_int_fn,
        parse_float_fn,
        is_nan_fn,
        is_finite_fn,
        harden_fn,
        lockdown_fn,
        locked_down: false,
    }
}

/// Install the standard bindings on a fresh compartment global. Only
/// defines properties pointing at realm-resident intrinsics; allocates
/// nothing, so the caller's root indices stay valid.
pub fn setup_global(ctx: &mut Context, gi: usize) -> Result<(), JsError> {
    let g = ctx.heap.root_get(gi).as_ref();
    let r = [
        ("Object", ctx.realm.object_ctor),
        ("Function", ctx.realm.function_ctor),
        ("Array", ctx.realm.array_ctor),
        ("String", ctx.realm.string_ctor),
        ("Number", ctx.realm.number_ctor),
        ("Boolean", ctx.realm.boolean_ctor),
        ("Error", ctx.realm.error_ctor),
        ("TypeError", ctx.realm.type_error_ctor),
        ("RangeError", ctx.realm.range_error_ctor),
        ("ReferenceError", ctx.realm.reference_error_ctor),
        ("SyntaxError", ctx.realm.syntax_error_ctor),
        ("RegExp", ctx.realm.regexp_ctor),
        ("Math", ctx.realm.math_obj),
        ("JSON", ctx.realm.json_obj),
        ("Date", ctx.realm.date_obj),
        ("parseInt", ctx.realm.parse_int_fn),
        ("parseFloat", ctx.realm.parse_float_fn),
        ("isNaN", ctx.realm.is_nan_fn),
        ("isFinite", ctx.realm.is_finite_fn),
        ("harden", ctx.realm.harden_fn),
        ("lockdown", ctx.realm.lockdown_fn),
        ("Compartment", ctx.realm.compartment_ctor),
    ];
    for (name, target) in r {
        let key = ctx.atoms.intern(name);
        ctx.heap.define_property(
            &ctx.atoms,
            g,
            key,
            Property::data(Value::from_ref(target), true, false, true),
        )?;
    }
    ctx.heap.define_property(
        &ctx.atoms,
        g,
        well_known::GLOBAL_THIS,
        Property::data(Value::from_ref(g), true, false, true),
    )?;
    for (name, v) in [
        ("undefined", Value::undefined()),
        ("NaN", Value::from_f64(f64::NAN)),
        ("Infinity", Value::from_f64(f64::INFINITY)),
    ] {
        let key = ctx.atoms.intern(name);
        ctx.heap
            .define_property(&ctx.atoms, g, key, Property::data(v, false, false, false))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn require_object(ctx: &Context, v: Value, who: &str) -> Result<Ref, JsError> {
    if v.is_object(&ctx.heap) {
        Ok(v.as_ref())
    } else {
        Err(JsError::Type(format!("{} called on a non-object", who)))
    }
}

fn strings_to_array(ctx: &mut Context, texts: Vec<String>) -> Result<Value, JsError> {
    let base = ctx.heap.root_len();
    for t in texts {
        let s = ctx.alloc_string(t)?;
        ctx.heap.root_push(s);
    }
    let n = ctx.heap.root_len() - base;
    let elements: Vec<Value> = (0..n).map(|i| ctx.heap.root_get(base + i)).collect();
    let arr = ctx.alloc_array(elements);
    ctx.heap.root_truncate(base);
    arr
}

// ======================= MODULE: Object ==================================

fn js_object_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    if v.is_object(&ctx.heap) {
        return Ok(v);
    }
    if v.is_nullish() {
        return ctx.alloc_object(JsClass::Ordinary);
    }
    // value boxing is out of the dialect
    Err(JsError::Type("primitive values cannot be boxed".into()))
}

fn js_object_keys(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let o = require_object(ctx, args.arg(ctx, 0), "Object.keys")?;
    let keys = ctx.own_enumerable_keys(o);
    let texts = keys
        .iter()
        .map(|k| ctx.atoms.name(*k).to_string())
        .collect();
    strings_to_array(ctx, texts)
}

fn js_object_create(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let p = args.arg(ctx, 0);
    let proto = if p.is_null() {
        None
    } else if p.is_object(&ctx.heap) {
        Some(p.as_ref())
    } else {
        return Err(JsError::Type(
            "Object.create expects an object or null prototype".into(),
        ));
    };
    ctx.alloc_object_with_proto(JsClass::Ordinary, proto)
}

/// Build the final property from a descriptor object, merging with the
/// current property when one exists.
fn parse_descriptor(
    ctx: &mut Context,
    di: usize,
    current: Option<Property>,
) -> Result<Property, JsError> {
    let present = |ctx: &Context, key: Atom| -> bool {
        let d = ctx.heap.root_get(di);
        ctx.heap.lookup(d.as_ref(), key).is_some()
    };
    let has_value = present(ctx, well_known::VALUE);
    let has_writable = present(ctx, well_known::WRITABLE);
    let has_get = present(ctx, well_known::GET);
    let has_set = present(ctx, well_known::SET);
    let has_enumerable = present(ctx, well_known::ENUMERABLE);
    let has_configurable = present(ctx, well_known::CONFIGURABLE);

    if (has_get || has_set) && (has_value || has_writable) {
        return Err(JsError::Type(
            "property descriptor cannot be both a data and an accessor form".into(),
        ));
    }

    let read_bool = |ctx: &mut Context, key: Atom| -> Result<bool, JsError> {
        let d = ctx.heap.root_get(di);
        let v = ctx.get_prop(d, key)?;
        Ok(ctx.to_boolean(v))
    };

    let enumerable = if has_enumerable {
        read_bool(ctx, well_known::ENUMERABLE)?
    } else {
        current.as_ref().map_or(false, |p| p.enumerable)
    };
    let configurable = if has_configurable {
        read_bool(ctx, well_known::CONFIGURABLE)?
    } else {
        current.as_ref().map_or(false, |p| p.configurable)
    };

    if has_get || has_set {
        let fetch_accessor = |ctx: &mut Context, key: Atom| -> Result<Option<Ref>, JsError> {
            let d = ctx.heap.root_get(di);
            let v = ctx.get_prop(d, key)?;
            if v.is_undefined() {
                Ok(None)
            } else if ctx.is_callable(v) {
                Ok(Some(v.as_ref()))
            } else {
                Err(JsError::Type("getter/setter must be callable".into()))
            }
        };
        let cur_acc = |pick_get: bool| match current.as_ref().map(|p| &p.kind) {
            Some(PropKind::Accessor { get, set }) => {
                if pick_get {
                    *get
                } else {
                    *set
                }
            }
            _ => None,
        };
        // getters fetched before setters; both re-read through the rooted
        // descriptor, so an allocating getter cannot strand them
        let get = if has_get {
            fetch_accessor(ctx, well_known::GET)?
        } else {
            cur_acc(true)
        };
        let set = if has_set {
            fetch_accessor(ctx, well_known::SET)?
        } else {
            cur_acc(false)
        };
        return Ok(Property::accessor(get, set, enumerable, configurable));
    }

    let writable = if has_writable {
        read_bool(ctx, well_known::WRITABLE)?
    } else {
        match current.as_ref().map(|p| &p.kind) {
            Some(PropKind::Data { writable, .. }) => *writable,
            _ => false,
        }
    };
    let value = if has_value {
        let d = ctx.heap.root_get(di);
        ctx.get_prop(d, well_known::VALUE)?
    } else {
        match current.as_ref().map(|p| &p.kind) {
            Some(PropKind::Data { value, .. }) => *value,
            _ => Value::undefined(),
        }
    };
    Ok(Property::data(value, writable, enumerable, configurable))
}

fn js_object_define_property(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let target = args.arg(ctx, 0);
    require_object(ctx, target, "Object.defineProperty")?;
    let kv = args.arg(ctx, 1);
    let key = ctx.to_atom_key(kv);
    let desc = args.arg(ctx, 2);
    if !desc.is_object(&ctx.heap) {
        return Err(JsError::Type("property descriptor must be an object".into()));
    }
    let di = ctx.heap.root_push(desc);
    let target = args.arg(ctx, 0);
    // element keys on indexed objects merge against the virtual element
    // descriptor, not the named table
    let current = ctx
        .heap
        .indexed_own_property(&ctx.atoms, target.as_ref(), key)
        .or_else(|| ctx.heap.get_own(target.as_ref(), key).cloned());
    let prop = parse_descriptor(ctx, di, current);
    ctx.heap.root_pop();
    let prop = prop?;
    let target = args.arg(ctx, 0);
    ctx.heap
        .define_property(&ctx.atoms, target.as_ref(), key, prop)?;
    Ok(args.arg(ctx, 0))
}

fn js_object_get_own_property_descriptor(
    ctx: &mut Context,
    args: CallArgs,
) -> Result<Value, JsError> {
    let target = args.arg(ctx, 0);
    let o = require_object(ctx, target, "Object.getOwnPropertyDescriptor")?;
    let kv = args.arg(ctx, 1);
    let key = ctx.to_atom_key(kv);

    // array elements and length carry virtual descriptors
    if let Some(p) = ctx.heap.indexed_own_property(&ctx.atoms, o, key) {
        return build_descriptor(ctx, p);
    }

    match ctx.heap.get_own(o, key).cloned() {
        Some(p) => build_descriptor(ctx, p),
        None => Ok(Value::undefined()),
    }
}

fn build_descriptor(ctx: &mut Context, prop: Property) -> Result<Value, JsError> {
    // root everything the descriptor will carry before allocating it
    let base = ctx.heap.root_len();
    let (v0, v1) = match &prop.kind {
        PropKind::Data { value, .. } => (*value, Value::undefined()),
        PropKind::Accessor { get, set } => (
            get.map_or(Value::undefined(), Value::from_ref),
            set.map_or(Value::undefined(), Value::from_ref),
        ),
    };
    let i0 = ctx.heap.root_push(v0);
    let i1 = ctx.heap.root_push(v1);
    let d = ctx.alloc_object(JsClass::Ordinary)?;
    let dr = d.as_ref();

    match &prop.kind {
        PropKind::Data { writable, .. } => {
            let v = ctx.heap.root_get(i0);
            ctx.heap
                .define_property(&ctx.atoms, dr, well_known::VALUE, Property::field(v))?;
            ctx.heap.define_property(
                &ctx.atoms,
                dr,
                well_known::WRITABLE,
                Property::field(Value::bool_val(*writable)),
            )?;
        }
        PropKind::Accessor { .. } => {
            let g = ctx.heap.root_get(i0);
            let s = ctx.heap.root_get(i1);
            ctx.heap
                .define_property(&ctx.atoms, dr, well_known::GET, Property::field(g))?;
            ctx.heap
                .define_property(&ctx.atoms, dr, well_known::SET, Property::field(s))?;
        }
    }
    ctx.heap.define_property(
        &ctx.atoms,
        dr,
        well_known::ENUMERABLE,
        Property::field(Value::bool_val(prop.enumerable)),
    )?;
    ctx.heap.define_property(
        &ctx.atoms,
        dr,
        well_known::CONFIGURABLE,
        Property::field(Value::bool_val(prop.configurable)),
    )?;
    ctx.heap.root_truncate(base);
    Ok(d)
}

fn js_object_get_prototype_of(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let o = require_object(ctx, args.arg(ctx, 0), "Object.getPrototypeOf")?;
    Ok(ctx
        .heap
        .get_prototype(o)
        .map_or(Value::null(), Value::from_ref))
}

fn js_object_set_prototype_of(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let o = require_object(ctx, args.arg(ctx, 0), "Object.setPrototypeOf")?;
    let p = args.arg(ctx, 1);
    let proto = if p.is_null() {
        None
    } else if p.is_object(&ctx.heap) {
        Some(p.as_ref())
    } else {
        return Err(JsError::Type("prototype must be an object or null".into()));
    };
    ctx.heap.set_prototype(o, proto)?;
    Ok(args.arg(ctx, 0))
}

fn js_object_prevent_extensions(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    if v.is_object(&ctx.heap) {
        ctx.heap.prevent_extensions(v.as_ref());
    }
    Ok(v)
}

fn js_object_seal(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    if v.is_object(&ctx.heap) {
        ctx.heap.seal(&ctx.atoms, v.as_ref())?;
    }
    Ok(v)
}

fn js_object_freeze(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    if v.is_object(&ctx.heap) {
        ctx.heap.freeze(&ctx.atoms, v.as_ref())?;
    }
    Ok(v)
}

fn js_object_is_extensible(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(
        v.is_object(&ctx.heap) && ctx.heap.object(v.as_ref()).is_extensible(),
    ))
}

fn js_object_is_sealed(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(
        !v.is_object(&ctx.heap) || ctx.heap.is_sealed(v.as_ref()),
    ))
}

fn js_object_is_frozen(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(
        !v.is_object(&ctx.heap) || ctx.heap.is_frozen(v.as_ref()),
    ))
}

fn js_object_has_own_property(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    if !this.is_object(&ctx.heap) {
        return Ok(Value::bool_val(false));
    }
    let kv = args.arg(ctx, 0);
    let key = ctx.to_atom_key(kv);
    let o = this.as_ref();
    let obj = ctx.heap.object(o);
    if matches!(obj.class, JsClass::Array | JsClass::Arguments) {
        let len = obj.elements().map_or(0, |e| e.len());
        if key == well_known::LENGTH {
            return Ok(Value::bool_val(true));
        }
        if let Ok(idx) = ctx.atoms.name(key).parse::<usize>() {
            return Ok(Value::bool_val(idx < len));
        }
    }
    Ok(Value::bool_val(ctx.heap.get_own(o, key).is_some()))
}

fn js_object_to_string(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let tag = if this.is_object(&ctx.heap) {
        match ctx.heap.object(this.as_ref()).class {
            JsClass::Array => "[object Array]",
            JsClass::Function => "[object Function]",
            JsClass::Error => "[object Error]",
            JsClass::Arguments => "[object Arguments]",
            _ => "[object Object]",
        }
    } else if this.is_null() {
        "[object Null]"
    } else if this.is_undefined() {
        "[object Undefined]"
    } else {
        "[object Object]"
    };
    ctx.alloc_string(tag)
}

// ======================= MODULE: Function ================================

fn js_function_proto_sink(_ctx: &mut Context, _args: CallArgs) -> Result<Value, JsError> {
    Ok(Value::undefined())
}

fn js_function_ctor(_ctx: &mut Context, _args: CallArgs) -> Result<Value, JsError> {
    Err(JsError::Type(
        "the Function constructor is disabled in this environment".into(),
    ))
}

fn js_throw_type_error(_ctx: &mut Context, _args: CallArgs) -> Result<Value, JsError> {
    Err(JsError::Type("restricted property access".into()))
}

// ======================= MODULE: Array ===================================

fn js_array_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    if args.argc() == 1 {
        let n = args.arg(ctx, 0);
        if n.is_number() {
            let len = n.as_number();
            if len < 0.0 || len.trunc() != len || len > 4294967295.0 {
                return Err(JsError::Range("invalid array length".into()));
            }
            // dense: pre-filled with undefined rather than holes
            return ctx.alloc_array(vec![Value::undefined(); len as usize]);
        }
    }
    let elements: Vec<Value> = (0..args.argc()).map(|i| args.arg(ctx, i)).collect();
    ctx.alloc_array(elements)
}

fn js_array_is_array(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(
        v.is_object(&ctx.heap) && ctx.heap.object(v.as_ref()).class == JsClass::Array,
    ))
}

fn js_array_push(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let o = require_object(ctx, this, "Array.prototype.push")?;
    for i in 0..args.argc() {
        let v = args.arg(ctx, i);
        let len = ctx.heap.object(o).elements().map_or(0, |e| e.len());
        ctx.set_element(o, len, v)?;
    }
    let len = ctx.heap.object(o).elements().map_or(0, |e| e.len());
    Ok(Value::number(len as f64))
}

fn js_array_pop(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let o = require_object(ctx, this, "Array.prototype.pop")?;
    let obj = ctx.heap.object(o);
    if obj.has_flag(flags::FROZEN) || obj.has_flag(flags::SEALED) || !obj.is_extensible() {
        return Err(JsError::Type("cannot remove elements from this array".into()));
    }
    Ok(ctx
        .heap
        .object_mut(o)
        .elements_mut()
        .and_then(|e| e.pop())
        .unwrap_or(Value::undefined()))
}

fn js_array_index_of(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let o = require_object(ctx, this, "Array.prototype.indexOf")?;
    let needle = args.arg(ctx, 0);
    let len = ctx.heap.object(o).elements().map_or(0, |e| e.len());
    for i in 0..len {
        let v = ctx.heap.object(o).elements().map_or(Value::undefined(), |e| e[i]);
        if v.strict_eq(needle, &ctx.heap) {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::from_i32(-1))
}

fn js_array_join(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let o = require_object(ctx, this, "Array.prototype.join")?;
    let sep = {
        let s = args.arg(ctx, 0);
        if s.is_undefined() {
            ",".to_string()
        } else {
            ctx.to_display(s)
        }
    };
    let len = ctx.heap.object(o).elements().map_or(0, |e| e.len());
    let mut parts = Vec::with_capacity(len);
    for i in 0..len {
        let v = ctx.heap.object(o).elements().map_or(Value::undefined(), |e| e[i]);
        parts.push(if v.is_nullish() {
            String::new()
        } else {
            ctx.to_display(v)
        });
    }
    ctx.alloc_string(parts.join(&sep))
}

fn js_array_slice(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let o = require_object(ctx, this, "Array.prototype.slice")?;
    let len = ctx.heap.object(o).elements().map_or(0, |e| e.len()) as i64;
    let clamp = |v: f64| -> i64 {
        let i = v as i64;
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len)
        }
    };
    let a0 = args.arg(ctx, 0);
    let start = if a0.is_undefined() { 0 } else { clamp(ctx.to_number(a0)) };
    let a1 = args.arg(ctx, 1);
    let end = if a1.is_undefined() {
        len
    } else {
        clamp(ctx.to_number(a1))
    };
    let this = args.this(ctx);
    let elements: Vec<Value> = ctx
        .heap
        .object(this.as_ref())
        .elements()
        .map(|e| {
            e.iter()
                .skip(start as usize)
                .take((end - start).max(0) as usize)
                .copied()
                .collect()
        })
        .unwrap_or_default();
    ctx.alloc_array(elements)
}

fn js_array_values(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    require_object(ctx, this, "Array.prototype.values")?;
    let proto = ctx.realm.array_iter_proto;
    let it = ctx.alloc_object_with_proto(JsClass::Ordinary, Some(proto))?;
    let target_key = ctx.atoms.intern("__iterTarget");
    let index_key = ctx.atoms.intern("__iterIndex");
    let this = args.this(ctx);
    ctx.heap.define_property(
        &ctx.atoms,
        it.as_ref(),
        target_key,
        Property::data(this, false, false, false),
    )?;
    ctx.heap.define_property(
        &ctx.atoms,
        it.as_ref(),
        index_key,
        Property::data(Value::from_i32(0), true, false, false),
    )?;
    Ok(it)
}

fn js_array_iter_next(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let o = require_object(ctx, this, "%ArrayIterator%.next")?;
    let target_key = ctx.atoms.intern("__iterTarget");
    let index_key = ctx.atoms.intern("__iterIndex");
    let target = match ctx.heap.get_own(o, target_key) {
        Some(Property {
            kind: PropKind::Data { value, .. },
            ..
        }) => *value,
        _ => return Err(JsError::Type("next called on a non-iterator".into())),
    };
    let idx = match ctx.heap.get_own(o, index_key) {
        Some(Property {
            kind: PropKind::Data { value, .. },
            ..
        }) => value.as_i32() as usize,
        _ => 0,
    };
    let len = ctx
        .heap
        .object(target.as_ref())
        .elements()
        .map_or(0, |e| e.len());
    let (value, done) = if idx < len {
        let v = ctx
            .heap
            .object(target.as_ref())
            .elements()
            .map_or(Value::undefined(), |e| e[idx]);
        (v, false)
    } else {
        (Value::undefined(), true)
    };
    if !done {
        if let Some((_, p)) = ctx
            .heap
            .object_mut(o)
            .props
            .iter_mut()
            .find(|(k, _)| *k == index_key)
        {
            p.kind = PropKind::Data {
                value: Value::from_i32(idx as i32 + 1),
                writable: true,
            };
        }
    }
    let vi = ctx.heap.root_push(value);
    let result = ctx.alloc_object(JsClass::Ordinary)?;
    let value = ctx.heap.root_get(vi);
    ctx.heap.define_property(
        &ctx.atoms,
        result.as_ref(),
        well_known::VALUE,
        Property::field(value),
    )?;
    ctx.heap.define_property(
        &ctx.atoms,
        result.as_ref(),
        well_known::DONE,
        Property::field(Value::bool_val(done)),
    )?;
    ctx.heap.root_truncate(vi);
    Ok(result)
}

// ======================= MODULE: String ==================================

fn this_string(ctx: &Context, args: &CallArgs, who: &str) -> Result<String, JsError> {
    args.this(ctx)
        .string_chars(&ctx.heap)
        .ok_or_else(|| JsError::Type(format!("{} called on a non-string", who)))
}

fn js_string_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    ctx.to_js_string(v)
}

fn js_string_self(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.toString")?;
    ctx.alloc_string(s)
}

fn js_string_char_at(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.charAt")?;
    let i = ctx.to_number(args.arg(ctx, 0)) as i64;
    let out = if i >= 0 {
        s.chars().nth(i as usize).map(|c| c.to_string()).unwrap_or_default()
    } else {
        String::new()
    };
    ctx.alloc_string(out)
}

fn js_string_char_code_at(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.charCodeAt")?;
    let i = ctx.to_number(args.arg(ctx, 0)) as i64;
    Ok(if i >= 0 {
        s.chars()
            .nth(i as usize)
            .map(|c| Value::number(c as u32 as f64))
            .unwrap_or(Value::from_f64(f64::NAN))
    } else {
        Value::from_f64(f64::NAN)
    })
}

fn js_string_index_of(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.indexOf")?;
    let needle = ctx.to_display(args.arg(ctx, 0));
    let found = s.find(&needle).map(|byte_idx| s[..byte_idx].chars().count());
    Ok(found.map_or(Value::from_i32(-1), |i| Value::number(i as f64)))
}

fn js_string_slice(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.slice")?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let clamp = |v: f64| -> i64 {
        let i = v as i64;
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len)
        }
    };
    let a0 = args.arg(ctx, 0);
    let start = if a0.is_undefined() { 0 } else { clamp(ctx.to_number(a0)) };
    let a1 = args.arg(ctx, 1);
    let end = if a1.is_undefined() {
        len
    } else {
        clamp(ctx.to_number(a1))
    };
    let out: String = chars
        .iter()
        .skip(start as usize)
        .take((end - start).max(0) as usize)
        .collect();
    ctx.alloc_string(out)
}

fn js_string_to_upper(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    // ASCII-only case conversion in this dialect
    let s = this_string(ctx, &args, "String.prototype.toUpperCase")?;
    ctx.alloc_string(s.to_ascii_uppercase())
}

fn js_string_to_lower(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.toLowerCase")?;
    ctx.alloc_string(s.to_ascii_lowercase())
}

fn js_string_split(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.split")?;
    let sep = args.arg(ctx, 0);
    if sep.is_undefined() {
        return strings_to_array(ctx, vec![s]);
    }
    let sep = ctx.to_display(sep);
    let parts: Vec<String> = if sep.is_empty() {
        s.chars().map(|c| c.to_string()).collect()
    } else {
        s.split(&sep).map(|p| p.to_string()).collect()
    };
    strings_to_array(ctx, parts)
}

fn js_string_trim(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let s = this_string(ctx, &args, "String.prototype.trim")?;
    ctx.alloc_string(s.trim().to_string())
}

// ======================= MODULE: Number ==================================

fn js_number_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::number(ctx.to_number(v)))
}

fn js_number_is_integer(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(
        v.is_number() && v.as_number().is_finite() && v.as_number().trunc() == v.as_number(),
    ))
}

fn js_number_is_nan(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(v.is_number() && v.as_number().is_nan()))
}

fn js_number_to_string(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    if !this.is_number() {
        return Err(JsError::Type(
            "Number.prototype.toString called on a non-number".into(),
        ));
    }
    let radix_v = args.arg(ctx, 0);
    let radix = if radix_v.is_undefined() {
        10
    } else {
        ctx.to_number(radix_v) as i64
    };
    if !(2..=36).contains(&radix) {
        return Err(JsError::Range("toString() radix must be between 2 and 36".into()));
    }
    let n = this.as_number();
    let text = if radix == 10 {
        number_to_string(n)
    } else {
        format_radix(n, radix as u32)
    };
    ctx.alloc_string(text)
}

/// Integer formatting for non-decimal radixes; fractional digits are
/// truncated.
fn format_radix(n: f64, radix: u32) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    let neg = n < 0.0;
    let mut i = n.abs().trunc() as u64;
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    if i == 0 {
        out.push(b'0');
    }
    while i > 0 {
        out.push(digits[(i % radix as u64) as usize]);
        i /= radix as u64;
    }
    if neg {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ======================= MODULE: Boolean =================================

fn js_boolean_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    Ok(Value::bool_val(ctx.to_boolean(v)))
}

// ======================= MODULE: Math ====================================

macro_rules! math_unary {
    ($name:ident, $method:ident) => {
        fn $name(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
            let n = ctx.to_number(args.arg(ctx, 0));
            Ok(Value::number(n.$method()))
        }
    };
}

math_unary!(js_math_abs, abs);
math_unary!(js_math_floor, floor);
math_unary!(js_math_ceil, ceil);
math_unary!(js_math_round, round);
math_unary!(js_math_trunc, trunc);
math_unary!(js_math_sqrt, sqrt);
math_unary!(js_math_log, ln);
math_unary!(js_math_exp, exp);

fn js_math_sign(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let n = ctx.to_number(args.arg(ctx, 0));
    Ok(if n.is_nan() {
        Value::from_f64(f64::NAN)
    } else if n > 0.0 {
        Value::from_i32(1)
    } else if n < 0.0 {
        Value::from_i32(-1)
    } else {
        Value::number(n)
    })
}

fn js_math_pow(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let base = ctx.to_number(args.arg(ctx, 0));
    let exp = ctx.to_number(args.arg(ctx, 1));
    Ok(Value::number(base.powf(exp)))
}

fn js_math_min(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let mut out = f64::INFINITY;
    for i in 0..args.argc() {
        let n = ctx.to_number(args.arg(ctx, i));
        if n.is_nan() {
            return Ok(Value::from_f64(f64::NAN));
        }
        out = out.min(n);
    }
    Ok(Value::number(out))
}

fn js_math_max(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let mut out = f64::NEG_INFINITY;
    for i in 0..args.argc() {
        let n = ctx.to_number(args.arg(ctx, i));
        if n.is_nan() {
            return Ok(Value::from_f64(f64::NAN));
        }
        out = out.max(n);
    }
    Ok(Value::number(out))
}

// xorshift state seeded from the wall clock; Math.random is deliberately
// NOT tamed by lockdown
static RNG_STATE: Lazy<AtomicU64> = Lazy::new(|| {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    AtomicU64::new(seed | 1)
});

fn js_math_random(_ctx: &mut Context, _args: CallArgs) -> Result<Value, JsError> {
    let mut x = RNG_STATE.load(Ordering::Relaxed);
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    RNG_STATE.store(x, Ordering::Relaxed);
    Ok(Value::from_f64((x >> 11) as f64 / (1u64 << 53) as f64))
}

// ======================= MODULE: JSON ====================================

fn js_json_stringify(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    let vi = ctx.heap.root_push(v);
    let j = json_from_value(ctx, vi, 0);
    ctx.heap.root_pop();
    match j? {
        Some(j) => {
            let text = serde_json::to_string(&j)
                .map_err(|e| JsError::Type(format!("JSON.stringify failed: {}", e)))?;
            ctx.alloc_string(text)
        }
        None => Ok(Value::undefined()),
    }
}

/// Convert a rooted value (by root index) into a serde_json tree. Depth
/// bounds double as cycle protection.
fn json_from_value(
    ctx: &mut Context,
    vi: usize,
    depth: u32,
) -> Result<Option<serde_json::Value>, JsError> {
    if depth > 64 {
        return Err(JsError::Type(
            "JSON.stringify input is cyclic or too deeply nested".into(),
        ));
    }
    let v = ctx.heap.root_get(vi);
    if v.is_undefined() {
        return Ok(None);
    }
    if v.is_null() {
        return Ok(Some(serde_json::Value::Null));
    }
    if v.is_bool() {
        return Ok(Some(serde_json::Value::Bool(v.as_bool())));
    }
    if v.is_number() {
        let n = v.as_number();
        if !n.is_finite() {
            return Ok(Some(serde_json::Value::Null));
        }
        return Ok(Some(
            serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        ));
    }
    if let Some(text) = v.string_chars(&ctx.heap) {
        return Ok(Some(serde_json::Value::String(text)));
    }
    if !v.is_object(&ctx.heap) {
        return Ok(None);
    }
    let o = v.as_ref();
    let obj = ctx.heap.object(o);
    if obj.is_callable() {
        return Ok(None);
    }
    if matches!(obj.class, JsClass::Array | JsClass::Arguments) {
        let len = obj.elements().map_or(0, |e| e.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let v = ctx.heap.root_get(vi);
            let item = ctx
                .heap
                .object(v.as_ref())
                .elements()
                .map_or(Value::undefined(), |e| e[i]);
            let ii = ctx.heap.root_push(item);
            let j = json_from_value(ctx, ii, depth + 1);
            ctx.heap.root_pop();
            out.push(j?.unwrap_or(serde_json::Value::Null));
        }
        return Ok(Some(serde_json::Value::Array(out)));
    }
    let keys = ctx.own_enumerable_keys(o);
    let mut map = serde_json::Map::new();
    for key in keys {
        let v = ctx.heap.root_get(vi);
        let item = ctx.get_prop(v, key)?;
        let ii = ctx.heap.root_push(item);
        let j = json_from_value(ctx, ii, depth + 1);
        ctx.heap.root_pop();
        if let Some(j) = j? {
            map.insert(ctx.atoms.name(key).to_string(), j);
        }
    }
    Ok(Some(serde_json::Value::Object(map)))
}

fn js_json_parse(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let text = ctx.to_display(args.arg(ctx, 0));
    let parsed: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| JsError::Syntax(format!("JSON.parse: {}", e)))?;
    value_from_json(ctx, &parsed)
}

fn value_from_json(ctx: &mut Context, j: &serde_json::Value) -> Result<Value, JsError> {
    match j {
        serde_json::Value::Null => Ok(Value::null()),
        serde_json::Value::Bool(b) => Ok(Value::bool_val(*b)),
        serde_json::Value::Number(n) => Ok(Value::number(n.as_f64().unwrap_or(f64::NAN))),
        serde_json::Value::String(s) => ctx.alloc_string(s.clone()),
        serde_json::Value::Array(items) => {
            let base = ctx.heap.root_len();
            for item in items {
                let v = value_from_json(ctx, item)?;
                ctx.heap.root_push(v);
            }
            let elements: Vec<Value> = (0..items.len())
                .map(|i| ctx.heap.root_get(base + i))
                .collect();
            let arr = ctx.alloc_array(elements);
            ctx.heap.root_truncate(base);
            arr
        }
        serde_json::Value::Object(map) => {
            let ov = ctx.alloc_object(JsClass::Ordinary)?;
            let oi = ctx.heap.root_push(ov);
            for (k, jv) in map {
                let v = value_from_json(ctx, jv)?;
                let key = ctx.atoms.intern(k);
                let ov = ctx.heap.root_get(oi);
                ctx.heap
                    .define_property(&ctx.atoms, ov.as_ref(), key, Property::field(v))?;
            }
            Ok(ctx.heap.root_pop())
        }
    }
}

// ======================= MODULE: Error ===================================

fn make_error(ctx: &mut Context, args: CallArgs, class_name: &str) -> Result<Value, JsError> {
    let m = args.arg(ctx, 0);
    let message = if m.is_undefined() {
        String::new()
    } else {
        ctx.to_display(m)
    };
    ctx.alloc_error(class_name, &message)
}

fn js_error_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    make_error(ctx, args, "Error")
}

fn js_type_error_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    make_error(ctx, args, "TypeError")
}

fn js_range_error_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    make_error(ctx, args, "RangeError")
}

fn js_reference_error_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    make_error(ctx, args, "ReferenceError")
}

fn js_syntax_error_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    make_error(ctx, args, "SyntaxError")
}

fn js_error_to_string(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let text = ctx.to_display(this);
    ctx.alloc_string(text)
}

// ======================= MODULE: RegExp ==================================

fn js_regexp_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let p = args.arg(ctx, 0);
    let source = if p.is_undefined() {
        String::new()
    } else {
        ctx.to_display(p)
    };
    let f = args.arg(ctx, 1);
    let flag_str = if f.is_undefined() {
        String::new()
    } else {
        ctx.to_display(f)
    };

    let mut seen = [false; 6];
    let order = "gimsuy";
    for c in flag_str.chars() {
        match order.find(c) {
            Some(i) if !seen[i] => seen[i] = true,
            _ => {
                return Err(JsError::Syntax(format!(
                    "invalid regular expression flags '{}'",
                    flag_str
                )))
            }
        }
    }
    let (global, ignore_case, multi_line, dot_all, sticky) =
        (seen[0], seen[1], seen[2], seen[3], seen[5]);

    let program = regex::RegexBuilder::new(&source)
        .case_insensitive(ignore_case)
        .multi_line(multi_line)
        .dot_matches_new_line(dot_all)
        .build()
        .map_err(|e| JsError::Syntax(format!("invalid regular expression: {}", e)))?;

    let proto = ctx.realm.regexp_proto;
    let mut obj = JsObject::new(JsClass::Ordinary, Some(proto));
    obj.extra = Extra::Regex {
        source: source.clone(),
        flag_str: flag_str.clone(),
        global,
        sticky,
        program,
    };
    obj.props.push((
        well_known::LAST_INDEX,
        Property::data(Value::from_i32(0), true, false, false),
    ));
    let rv = ctx.alloc_slot(Slot::Object(obj))?;

    let ri = ctx.heap.root_push(rv);
    let sv = ctx.alloc_string(source)?;
    let rv = ctx.heap.root_get(ri);
    ctx.heap.define_property(
        &ctx.atoms,
        rv.as_ref(),
        well_known::SOURCE,
        Property::data(sv, false, false, false),
    )?;
    let fv = ctx.alloc_string(flag_str)?;
    let rv = ctx.heap.root_get(ri);
    ctx.heap.define_property(
        &ctx.atoms,
        rv.as_ref(),
        well_known::FLAGS,
        Property::data(fv, false, false, false),
    )?;
    Ok(ctx.heap.root_pop())
}

struct RegexState {
    program: regex::Regex,
    tracks_position: bool,
    sticky: bool,
}

fn regex_state(ctx: &Context, this: Value) -> Result<RegexState, JsError> {
    if !this.is_object(&ctx.heap) {
        return Err(JsError::Type("receiver is not a RegExp".into()));
    }
    match &ctx.heap.object(this.as_ref()).extra {
        Extra::Regex {
            program,
            global,
            sticky,
            ..
        } => Ok(RegexState {
            program: program.clone(),
            tracks_position: *global || *sticky,
            sticky: *sticky,
        }),
        _ => Err(JsError::Type("receiver is not a RegExp".into())),
    }
}

fn regex_last_index(ctx: &Context, this: Value) -> usize {
    match ctx.heap.get_own(this.as_ref(), well_known::LAST_INDEX) {
        Some(Property {
            kind: PropKind::Data { value, .. },
            ..
        }) => {
            let n = value.as_number();
            if n.is_finite() && n >= 0.0 {
                n as usize
            } else {
                0
            }
        }
        _ => 0,
    }
}

fn set_regex_last_index(ctx: &mut Context, this: Value, idx: usize) {
    if let Some((_, p)) = ctx
        .heap
        .object_mut(this.as_ref())
        .props
        .iter_mut()
        .find(|(k, _)| *k == well_known::LAST_INDEX)
    {
        p.kind = PropKind::Data {
            value: Value::number(idx as f64),
            writable: true,
        };
    }
}

fn regex_find(
    ctx: &mut Context,
    args: &CallArgs,
) -> Result<Option<(String, usize, usize)>, JsError> {
    let this = args.this(ctx);
    let state = regex_state(ctx, this)?;
    let text = ctx.to_display(args.arg(ctx, 0));
    let start = if state.tracks_position {
        regex_last_index(ctx, this)
    } else {
        0
    };
    if start > text.len() {
        if state.tracks_position {
            set_regex_last_index(ctx, this, 0);
        }
        return Ok(None);
    }
    let found = state
        .program
        .find_at(&text, start)
        .filter(|m| !state.sticky || m.start() == start);
    match found {
        Some(m) => {
            if state.tracks_position {
                set_regex_last_index(ctx, this, m.end());
            }
            Ok(Some((text.clone(), m.start(), m.end())))
        }
        None => {
            if state.tracks_position {
                set_regex_last_index(ctx, this, 0);
            }
            Ok(None)
        }
    }
}

fn js_regexp_test(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    Ok(Value::bool_val(regex_find(ctx, &args)?.is_some()))
}

fn js_regexp_exec(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let this = args.this(ctx);
    let state = regex_state(ctx, this)?;
    match regex_find(ctx, &args)? {
        None => Ok(Value::null()),
        Some((text, start, _end)) => {
            let caps = state.program.captures_at(&text, start);
            let mut groups: Vec<Option<String>> = Vec::new();
            if let Some(caps) = caps {
                for g in caps.iter() {
                    groups.push(g.map(|m| m.as_str().to_string()));
                }
            } else {
                groups.push(Some(text[start..].to_string()));
            }
            let base = ctx.heap.root_len();
            for g in &groups {
                let v = match g {
                    Some(s) => ctx.alloc_string(s.clone())?,
                    None => Value::undefined(),
                };
                ctx.heap.root_push(v);
            }
            let elements: Vec<Value> = (0..groups.len())
                .map(|i| ctx.heap.root_get(base + i))
                .collect();
            let arr = ctx.alloc_array(elements)?;
            ctx.heap.root_truncate(base);
            let index_chars = text[..start].chars().count();
            ctx.heap.define_property(
                &ctx.atoms,
                arr.as_ref(),
                well_known::INDEX,
                Property::field(Value::number(index_chars as f64)),
            )?;
            Ok(arr)
        }
    }
}

// ======================= MODULE: Date ====================================

fn js_date_now(_ctx: &mut Context, _args: CallArgs) -> Result<Value, JsError> {
    Ok(Value::from_f64(chrono::Utc::now().timestamp_millis() as f64))
}

// ======================= MODULE: global free functions ===================

fn js_parse_int(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let text = ctx.to_display(args.arg(ctx, 0));
    let radix_v = args.arg(ctx, 1);
    let mut radix = if radix_v.is_undefined() {
        0i64
    } else {
        ctx.to_number(radix_v) as i64
    };
    let mut s = text.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::from_f64(f64::NAN));
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(36) {
            Some(d) if (d as i64) < radix => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            _ => break,
        }
    }
    Ok(if any {
        Value::number(sign * value)
    } else {
        Value::from_f64(f64::NAN)
    })
}

fn js_parse_float(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let text = ctx.to_display(args.arg(ctx, 0));
    let s = text.trim_start();
    // longest leading prefix that parses as a float
    let mut end = 0;
    let bytes = s.as_bytes();
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() {
            end = i + 1;
        } else if c == b'.' && !seen_dot && !seen_exp {
            seen_dot = true;
        } else if (c == b'e' || c == b'E') && !seen_exp && end > 0 {
            seen_exp = true;
            if i + 1 < bytes.len() && (bytes[i + 1] == b'+' || bytes[i + 1] == b'-') {
                i += 1;
            }
        } else {
            break;
        }
        i += 1;
    }
    if end == 0 {
        return Ok(Value::from_f64(f64::NAN));
    }
    Ok(Value::from_f64(s[..end].parse::<f64>().unwrap_or(f64::NAN)))
}

fn js_is_nan(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let n = ctx.to_number(args.arg(ctx, 0));
    Ok(Value::bool_val(n.is_nan()))
}

fn js_is_finite(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let n = ctx.to_number(args.arg(ctx, 0));
    Ok(Value::bool_val(n.is_finite()))
}

// ======================= MODULE: Compartment / hardening =================

fn js_harden(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let v = args.arg(ctx, 0);
    crate::harden::harden(ctx, v)
}

fn js_lockdown(ctx: &mut Context, _args: CallArgs) -> Result<Value, JsError> {
    crate::harden::lockdown(ctx)
}

fn js_compartment_ctor(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let options = args.arg(ctx, 0);
    if !options.is_undefined() && !options.is_object(&ctx.heap) {
        return Err(JsError::Type("Compartment options must be an object".into()));
    }
    let parent = ctx.current_compartment;
    let id = ctx.new_compartment(options, Some(parent))?;
    let proto = ctx.realm.compartment_proto;
    let mut obj = JsObject::new(JsClass::Compartment, Some(proto));
    obj.extra = Extra::CompartmentRef(id);
    ctx.alloc_slot(Slot::Object(obj))
}

fn compartment_id(ctx: &Context, this: Value) -> Result<usize, JsError> {
    if this.is_object(&ctx.heap) {
        if let Extra::CompartmentRef(id) = ctx.heap.object(this.as_ref()).extra {
            return Ok(id);
        }
    }
    Err(JsError::Type("receiver is not a Compartment".into()))
}

fn js_compartment_global_this(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let id = compartment_id(ctx, args.this(ctx))?;
    Ok(Value::from_ref(ctx.compartments[id].global))
}

fn js_compartment_evaluate(ctx: &mut Context, args: CallArgs) -> Result<Value, JsError> {
    let id = compartment_id(ctx, args.this(ctx))?;
    let src = args.arg(ctx, 0);
    if !src.is_string(&ctx.heap) {
        return Err(JsError::Type("evaluate expects a source string".into()));
    }
    let source = ctx.to_display(src);
    ctx.eval_in_compartment(id, &source)
}

