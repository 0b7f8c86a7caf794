/// Integration tests for the hardening engine: transitive freezing,
/// lattice monotonicity, idempotence, and primitive pass-through.
use mjs::{harden, Context, ContextConfig, JsError};

fn ctx() -> Context {
    Context::new(ContextConfig::default()).expect("context should build")
}

fn eval_bool(ctx: &mut Context, src: &str) -> bool {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_bool(), "expected a boolean, got {:?}", v);
    v.as_bool()
}

fn eval_num(ctx: &mut Context, src: &str) -> f64 {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_number(), "expected a number, got {:?}", v);
    v.as_number()
}

#[test]
fn harden_freezes_nested_graph() {
    let mut c = ctx();
    c.evaluate("var o = {a: 1, nested: {b: 2}}; harden(o);").unwrap();
    assert!(matches!(c.evaluate("o.a = 9"), Err(JsError::Type(_))));
    assert!(matches!(c.evaluate("o.nested.b = 9"), Err(JsError::Type(_))));
    assert!(eval_bool(
        &mut c,
        "Object.isFrozen(o) && Object.isFrozen(o.nested)"
    ));
}

#[test]
fn circular_graphs_terminate() {
    let mut c = ctx();
    c.evaluate("var a = {}; var b = {a: a}; a.b = b; harden(a);")
        .unwrap();
    assert!(eval_bool(&mut c, "Object.isFrozen(a) && Object.isFrozen(b)"));
}

#[test]
fn hardened_array_rejects_push() {
    let mut c = ctx();
    c.evaluate("var o = [1, 2, 3]; harden(o);").unwrap();
    assert!(matches!(c.evaluate("o.push(4)"), Err(JsError::Type(_))));
    assert!(matches!(c.evaluate("o[0] = 9"), Err(JsError::Type(_))));
    assert!(matches!(c.evaluate("o[3] = 4"), Err(JsError::Type(_))));
    assert_eq!(eval_num(&mut c, "o.length"), 3.0);
}

#[test]
fn harden_is_idempotent_and_returns_its_argument() {
    let mut c = ctx();
    c.evaluate("var o = {x: 1};").unwrap();
    assert!(eval_bool(&mut c, "harden(o) === o"));
    assert!(eval_bool(&mut c, "harden(harden(o)) === o"));
    assert!(eval_bool(&mut c, "Object.isFrozen(harden(o))"));
}

#[test]
fn harden_passes_primitives_through() {
    let mut c = ctx();
    assert_eq!(eval_num(&mut c, "harden(42)"), 42.0);
    assert!(eval_bool(&mut c, "harden(null) === null"));
    assert!(eval_bool(&mut c, "harden('s') === 's'"));
    assert!(eval_bool(&mut c, "harden(undefined) === undefined"));
}

#[test]
fn primitive_property_values_survive_hardening() {
    let mut c = ctx();
    c.evaluate("var o = {s: 'str', n: 42, b: true}; harden(o);")
        .unwrap();
    assert!(eval_bool(
        &mut c,
        "o.s === 'str' && o.n === 42 && o.b === true"
    ));
}

#[test]
fn lattice_is_monotonic() {
    let mut c = ctx();
    c.evaluate("var o = {p: 1};").unwrap();
    assert!(eval_bool(&mut c, "Object.isExtensible(o)"));

    c.evaluate("Object.preventExtensions(o)").unwrap();
    assert!(eval_bool(&mut c, "!Object.isExtensible(o)"));

    c.evaluate("Object.seal(o)").unwrap();
    assert!(eval_bool(&mut c, "Object.isSealed(o) && !Object.isExtensible(o)"));

    c.evaluate("Object.freeze(o)").unwrap();
    assert!(eval_bool(
        &mut c,
        "Object.isFrozen(o) && Object.isSealed(o) && !Object.isExtensible(o)"
    ));

    c.evaluate("harden(o)").unwrap();
    assert!(eval_bool(
        &mut c,
        "Object.isFrozen(o) && Object.isSealed(o) && !Object.isExtensible(o)"
    ));
}

#[test]
fn sealed_objects_accept_writes_but_not_structure_changes() {
    let mut c = ctx();
    c.evaluate("var o = {p: 1}; Object.seal(o);").unwrap();
    assert_eq!(eval_num(&mut c, "o.p = 5; o.p"), 5.0);
    assert!(matches!(c.evaluate("o.q = 1"), Err(JsError::Type(_))));
    assert!(matches!(c.evaluate("delete o.p"), Err(JsError::Type(_))));
}

#[test]
fn frozen_objects_reject_everything() {
    let mut c = ctx();
    c.evaluate("var o = {p: 1}; Object.freeze(o);").unwrap();
    assert!(matches!(c.evaluate("o.p = 5"), Err(JsError::Type(_))));
    assert!(matches!(c.evaluate("o.q = 1"), Err(JsError::Type(_))));
    assert!(matches!(c.evaluate("delete o.p"), Err(JsError::Type(_))));
    assert!(matches!(
        c.evaluate("Object.defineProperty(o, 'p', {value: 9})"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn sealed_array_is_not_frozen_until_frozen() {
    let mut c = ctx();
    c.evaluate("var a = [1, 2, 3]; Object.seal(a);").unwrap();
    assert!(eval_bool(&mut c, "Object.isSealed(a)"));
    assert!(eval_bool(&mut c, "!Object.isFrozen(a)"));
    // sealed elements still take writes
    assert_eq!(eval_num(&mut c, "a[0] = 9; a[0]"), 9.0);
    assert!(matches!(c.evaluate("a.push(4)"), Err(JsError::Type(_))));

    c.evaluate("Object.freeze(a)").unwrap();
    assert!(eval_bool(&mut c, "Object.isFrozen(a)"));
    assert!(matches!(c.evaluate("a[0] = 5"), Err(JsError::Type(_))));
}

#[test]
fn frozen_redefinition_distinguishes_the_zeroes() {
    let mut c = ctx();
    c.evaluate("var o = {z: 0}; Object.freeze(o);").unwrap();
    // same-value redefinition is a no-op
    c.evaluate("Object.defineProperty(o, 'z', {value: 0})")
        .unwrap();
    assert!(matches!(
        c.evaluate("Object.defineProperty(o, 'z', {value: -0})"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn harden_traverses_accessors() {
    let mut c = ctx();
    c.evaluate(
        r#"
        var o = {};
        var getter = function() { return 1; };
        var setter = function(v) { };
        Object.defineProperty(o, 'x', {
            get: getter, set: setter, enumerable: true, configurable: true
        });
        harden(o);
    "#,
    )
    .unwrap();
    assert!(eval_bool(&mut c, "Object.isFrozen(getter)"));
    assert!(eval_bool(&mut c, "Object.isFrozen(setter)"));
    // the accessor still works after hardening
    assert_eq!(eval_num(&mut c, "o.x"), 1.0);
}

#[test]
fn harden_traverses_prototypes() {
    let mut c = ctx();
    c.evaluate(
        r#"
        var proto = {shared: 1};
        var o = Object.create(proto);
        o.own = 2;
        harden(o);
    "#,
    )
    .unwrap();
    assert!(eval_bool(&mut c, "Object.isFrozen(proto)"));
}

#[test]
fn host_api_harden_matches_script_harden() {
    let mut c = ctx();
    let v = c.evaluate("var o = {a: {b: 1}}; o").unwrap();
    harden(&mut c, v).unwrap();
    assert!(eval_bool(&mut c, "Object.isFrozen(o) && Object.isFrozen(o.a)"));
}

#[test]
fn set_on_frozen_prototype_chain_blocks_shadowing() {
    // a non-writable data property on the prototype blocks assignment
    // through the chain
    let mut c = ctx();
    c.evaluate(
        r#"
        var proto = {p: 1};
        Object.freeze(proto);
        var o = Object.create(proto);
    "#,
    )
    .unwrap();
    assert!(matches!(c.evaluate("o.p = 2"), Err(JsError::Type(_))));
    // unrelated keys still land on the child
    assert_eq!(eval_num(&mut c, "o.q = 3; o.q"), 3.0);
}
