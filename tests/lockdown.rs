/// Integration tests for the one-shot realm lockdown.
use mjs::{Context, ContextConfig, JsError};

fn ctx() -> Context {
    Context::new(ContextConfig::default()).expect("context should build")
}

fn eval_num(ctx: &mut Context, src: &str) -> f64 {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_number(), "expected a number, got {:?}", v);
    v.as_number()
}

fn eval_bool(ctx: &mut Context, src: &str) -> bool {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_bool(), "expected a boolean, got {:?}", v);
    v.as_bool()
}

#[test]
fn lockdown_is_one_shot() {
    let mut c = ctx();
    let v = c.evaluate("lockdown()").unwrap();
    assert!(v.is_undefined());
    assert!(matches!(c.evaluate("lockdown()"), Err(JsError::Type(_))));
}

#[test]
fn lockdown_freezes_intrinsics() {
    let mut c = ctx();
    c.evaluate("lockdown()").unwrap();
    for probe in [
        "Object.isFrozen(Object.prototype)",
        "Object.isFrozen(Object)",
        "Object.isFrozen(Array.prototype)",
        "Object.isFrozen(Array)",
        "Object.isFrozen(Error.prototype)",
        "Object.isFrozen(TypeError.prototype)",
        "Object.isFrozen(Math)",
        "Object.isFrozen(JSON)",
        "Object.isFrozen(Date)",
        "Object.isFrozen(Compartment)",
        "Object.isFrozen(harden)",
        "Object.isFrozen(parseInt)",
        // transitively reachable intrinsics freeze too
        "Object.isFrozen(Object.freeze)",
        "Object.isFrozen(Array.prototype.push)",
    ] {
        assert!(eval_bool(&mut c, probe), "not frozen: {}", probe);
    }
}

#[test]
fn post_lockdown_intrinsic_mutation_fails() {
    let mut c = ctx();
    c.evaluate("lockdown()").unwrap();
    assert!(matches!(
        c.evaluate("Object.prototype.malicious = function() {}"),
        Err(JsError::Type(_))
    ));
    assert!(matches!(
        c.evaluate("Array.prototype.push = null"),
        Err(JsError::Type(_))
    ));
    assert!(matches!(
        c.evaluate("delete Object.prototype.hasOwnProperty"),
        Err(JsError::Type(_))
    ));
    assert!(matches!(
        c.evaluate("Math.floor = function() { return 0; }"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn user_objects_stay_mutable_after_lockdown() {
    let mut c = ctx();
    c.evaluate("lockdown()").unwrap();
    assert_eq!(eval_num(&mut c, "var t = {foo: 1}; t.foo = 2; t.foo"), 2.0);
    assert_eq!(eval_num(&mut c, "t.bar = 3; t.bar"), 3.0);
    assert_eq!(eval_num(&mut c, "var a = [1]; a.push(2); a.length"), 2.0);
    assert!(eval_bool(&mut c, "Object.isExtensible({})"));
}

#[test]
fn lockdown_from_a_child_compartment_latches_the_realm() {
    let mut c = ctx();
    c.evaluate("new Compartment().evaluate('lockdown()')").unwrap();
    assert!(matches!(c.evaluate("lockdown()"), Err(JsError::Type(_))));
    assert!(eval_bool(&mut c, "Object.isFrozen(Array.prototype)"));
}

#[test]
fn compartments_created_after_lockdown_see_frozen_intrinsics() {
    let mut c = ctx();
    c.evaluate("lockdown()").unwrap();
    c.evaluate("var c = new Compartment({globals: {x: 1}});")
        .unwrap();
    assert!(eval_bool(
        &mut c,
        "c.evaluate('Object.isFrozen(Array.prototype)')"
    ));
    assert!(matches!(
        c.evaluate("c.evaluate('Object.prototype.sneak = 1')"),
        Err(JsError::Type(_))
    ));
    // the new compartment still works normally
    assert_eq!(eval_num(&mut c, "c.evaluate('x + 1')"), 2.0);
}

#[test]
fn date_now_survives_lockdown_untamed() {
    let mut c = ctx();
    c.evaluate("lockdown()").unwrap();
    assert!(eval_num(&mut c, "Date.now()") > 1.0e12);
    let r1 = eval_num(&mut c, "Math.random()");
    let r2 = eval_num(&mut c, "Math.random()");
    assert!((0.0..1.0).contains(&r1));
    assert_ne!(r1, r2, "random stays live after lockdown");
}

#[test]
fn host_api_lockdown() {
    let mut c = ctx();
    mjs::lockdown(&mut c).unwrap();
    assert!(matches!(mjs::lockdown(&mut c), Err(JsError::Type(_))));
    assert!(eval_bool(&mut c, "Object.isFrozen(Object.prototype)"));
}
