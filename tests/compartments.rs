/// Integration tests for compartment isolation, intrinsic sharing, and the
/// `globals` / `globalLexicals` options.
use mjs::{Context, ContextConfig, JsError};

fn ctx() -> Context {
    Context::new(ContextConfig::default()).expect("context should build")
}

fn eval_num(ctx: &mut Context, src: &str) -> f64 {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_number(), "expected a number, got {:?}", v);
    v.as_number()
}

fn eval_str(ctx: &mut Context, src: &str) -> String {
    let v = ctx.evaluate(src).expect("script should succeed");
    ctx.to_display(v)
}

fn eval_bool(ctx: &mut Context, src: &str) -> bool {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_bool(), "expected a boolean, got {:?}", v);
    v.as_bool()
}

#[test]
fn globals_option_installs_global_properties() {
    let mut c = ctx();
    c.evaluate("var c = new Compartment({globals: {x: 42}});")
        .unwrap();
    assert_eq!(eval_num(&mut c, "c.evaluate('x + 1')"), 43.0);
    assert_eq!(eval_num(&mut c, "c.globalThis.x"), 42.0);
    assert_eq!(eval_num(&mut c, "c.evaluate('globalThis.x')"), 42.0);
}

#[test]
fn global_lexicals_stay_off_global_this() {
    let mut c = ctx();
    c.evaluate("var c = new Compartment({globalLexicals: {y: 7}});")
        .unwrap();
    assert_eq!(eval_str(&mut c, "c.evaluate('typeof globalThis.y')"), "undefined");
    assert_eq!(eval_num(&mut c, "c.evaluate('y')"), 7.0);
}

#[test]
fn non_writable_lexicals_are_immutable_bindings() {
    let mut c = ctx();
    c.evaluate(
        r#"
        var lex = {};
        Object.defineProperty(lex, 'k', {value: 5, writable: false, enumerable: true, configurable: true});
        var c = new Compartment({globalLexicals: lex});
    "#,
    )
    .unwrap();
    assert_eq!(eval_num(&mut c, "c.evaluate('k')"), 5.0);
    assert!(matches!(
        c.evaluate("c.evaluate('k = 6')"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn unknown_option_keys_are_ignored() {
    let mut c = ctx();
    c.evaluate("var c = new Compartment({bogus: 1, globals: {x: 2}});")
        .unwrap();
    assert_eq!(eval_num(&mut c, "c.evaluate('x')"), 2.0);
}

#[test]
fn variables_do_not_leak_between_compartments() {
    let mut c = ctx();
    c.evaluate(
        r#"
        var a = new Compartment();
        var b = new Compartment();
        a.evaluate('var secret = 1;');
    "#,
    )
    .unwrap();
    assert_eq!(eval_str(&mut c, "b.evaluate('typeof secret')"), "undefined");
    assert_eq!(eval_str(&mut c, "typeof secret"), "undefined");
}

#[test]
fn global_mutation_is_per_compartment() {
    let mut c = ctx();
    c.evaluate(
        r#"
        var a = new Compartment({globals: {x: 1}});
        var b = new Compartment({globals: {x: 1}});
        a.evaluate('globalThis.x = 99;');
    "#,
    )
    .unwrap();
    assert_eq!(eval_num(&mut c, "a.globalThis.x"), 99.0);
    assert_eq!(eval_num(&mut c, "b.globalThis.x"), 1.0);
}

#[test]
fn globals_are_distinct_objects() {
    let mut c = ctx();
    c.evaluate("var a = new Compartment(); var b = new Compartment();")
        .unwrap();
    assert!(eval_bool(&mut c, "a.globalThis !== b.globalThis"));
    assert!(eval_bool(&mut c, "a.globalThis === a.globalThis"));
}

#[test]
fn intrinsics_are_shared_by_reference() {
    let mut c = ctx();
    c.evaluate("var c = new Compartment();").unwrap();
    assert!(eval_bool(
        &mut c,
        "c.evaluate('Array.prototype') === Array.prototype"
    ));
    assert!(eval_bool(
        &mut c,
        "c.evaluate('Object.prototype') === Object.prototype"
    ));
    assert!(eval_bool(&mut c, "c.evaluate('harden') === harden"));
}

#[test]
fn prototype_mutation_is_visible_across_compartments_before_lockdown() {
    let mut c = ctx();
    c.evaluate(
        r#"
        var a = new Compartment();
        var b = new Compartment();
        a.evaluate('Array.prototype.tainted = 5;');
    "#,
    )
    .unwrap();
    assert_eq!(eval_num(&mut c, "b.evaluate('[].tainted')"), 5.0);
    assert_eq!(eval_num(&mut c, "[].tainted"), 5.0);
}

#[test]
fn compartments_nest() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        r#"
        var outer = new Compartment({globals: {x: 1}});
        outer.evaluate('var inner = new Compartment({globals: {x: 2}}); inner.evaluate("x")')
    "#,
    );
    assert_eq!(n, 2.0);
    // the child got its own empty global, not the parent's bindings
    assert_eq!(
        eval_str(
            &mut c,
            r#"
            var p = new Compartment({globals: {secret: 1}});
            p.evaluate('var child = new Compartment(); child.evaluate("typeof secret")')
        "#
        ),
        "undefined"
    );
}

#[test]
fn lexicals_persist_across_evaluate_calls() {
    let mut c = ctx();
    c.evaluate("var c = new Compartment(); c.evaluate('let z = 5;');")
        .unwrap();
    assert_eq!(eval_num(&mut c, "c.evaluate('z')"), 5.0);
}

#[test]
fn top_level_this_depends_on_lexicals() {
    let mut c = ctx();
    // no lexical bindings: top-level `this` is null
    assert!(eval_bool(
        &mut c,
        "new Compartment().evaluate('this === null')"
    ));
    // with lexicals: top-level `this` is the compartment's global
    assert!(eval_bool(
        &mut c,
        "new Compartment({globalLexicals: {q: 1}}).evaluate('this === globalThis')"
    ));
}

#[test]
fn evaluate_requires_a_string() {
    let mut c = ctx();
    assert!(matches!(
        c.evaluate("new Compartment().evaluate(42)"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn parse_errors_raise_syntax_error() {
    let mut c = ctx();
    assert!(matches!(
        c.evaluate("new Compartment().evaluate('var = ;')"),
        Err(JsError::Syntax(_))
    ));
}

#[test]
fn runtime_errors_propagate_out_of_evaluate() {
    let mut c = ctx();
    assert!(matches!(
        c.evaluate("new Compartment().evaluate('missing()')"),
        Err(JsError::Reference(_))
    ));
    // and they are catchable in the calling compartment
    let s = eval_str(
        &mut c,
        r#"
        var kind;
        try { new Compartment().evaluate('missing()'); }
        catch (e) { kind = e.name; }
        kind
    "#,
    );
    assert_eq!(s, "ReferenceError");
}
