/// Collector integration: stress relocation on every allocation, garbage
/// reclamation under a tight budget, and OutOfMemory reporting.
use mjs::{Context, ContextConfig, JsError};

fn stress_ctx() -> Context {
    Context::new(ContextConfig {
        heap_size: 256 * 1024,
        gc_stress: true,
        gc_debug: false,
    })
    .expect("context should build")
}

fn eval_num(ctx: &mut Context, src: &str) -> f64 {
    let v = ctx.evaluate(src).expect("script should succeed");
    assert!(v.is_number(), "expected a number, got {:?}", v);
    v.as_number()
}

#[test]
fn stress_mode_relocates_every_allocation() {
    let mut c = stress_ctx();
    let n = eval_num(
        &mut c,
        r#"
        var total = 0;
        for (var i = 0; i < 50; i++) {
            var o = {idx: i, pair: [i, i + 1], label: 'item' + i};
            total += o.pair[0] + o.pair[1];
        }
        total
    "#,
    );
    assert_eq!(n, 2500.0);
    assert!(c.heap.stats.collections > 0, "stress mode must collect");
}

#[test]
fn closures_survive_relocation() {
    let mut c = stress_ctx();
    let n = eval_num(
        &mut c,
        r#"
        function counter() {
            var n = 0;
            return function() { n += 1; return n; };
        }
        var tick = counter();
        tick(); tick(); tick()
    "#,
    );
    assert_eq!(n, 3.0);
}

#[test]
fn compartments_and_harden_survive_relocation() {
    let mut c = stress_ctx();
    let n = eval_num(
        &mut c,
        r#"
        var comp = new Compartment({globals: {x: 40}});
        var o = harden({a: {b: 2}});
        comp.evaluate('x') + o.a.b
    "#,
    );
    assert_eq!(n, 42.0);
}

#[test]
fn garbage_is_reclaimed_under_a_tight_budget() {
    // far more transient allocation than the budget holds; only the
    // collector keeps this alive
    let mut c = Context::new(ContextConfig {
        heap_size: 96 * 1024,
        gc_stress: false,
        gc_debug: false,
    })
    .expect("context should build");
    let n = eval_num(
        &mut c,
        r#"
        var keep = 0;
        for (var i = 0; i < 2000; i++) {
            var tmp = {payload: 'string payload number ' + i};
            keep += tmp.payload.length > 0 ? 1 : 0;
        }
        keep
    "#,
    );
    assert_eq!(n, 2000.0);
    assert!(c.heap.stats.collections > 0, "budget must force collections");
    assert!(c.heap.stats.bytes_reclaimed > 0);
}

// doubling a live string guarantees the failing allocation is large, so
// the heap keeps headroom for the small allocations later tests need
const EXHAUST: &str = r#"
    var s = 'seed string for exponential growth';
    var keep = [];
    while (true) { s = s + s; keep.push(s); }
"#;

#[test]
fn out_of_memory_after_one_failed_collection() {
    let mut c = Context::new(ContextConfig {
        heap_size: 48 * 1024,
        gc_stress: false,
        gc_debug: false,
    })
    .expect("context should build");
    assert!(matches!(c.evaluate(EXHAUST), Err(JsError::OutOfMemory)));
}

#[test]
fn evaluate_keeps_working_after_oom() {
    let mut c = Context::new(ContextConfig {
        heap_size: 48 * 1024,
        gc_stress: false,
        gc_debug: false,
    })
    .expect("context should build");
    assert!(matches!(c.evaluate(EXHAUST), Err(JsError::OutOfMemory)));
    // the retained graph is garbage once the globals are cleared
    c.evaluate("keep = 0; s = 0;").unwrap();
    assert_eq!(eval_num(&mut c, "1 + 1"), 2.0);
}
