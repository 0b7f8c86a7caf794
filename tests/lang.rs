/// Integration tests for the script subset: arithmetic, closures, control
/// flow, errors, and the intrinsic surface.
use mjs::{Context, ContextConfig, JsError};

// ─── Helpers ──────────────────────────────────────────────────────────────────

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

// ─── Arithmetic and values ───────────────────────────────────────────────────

#[test]
fn arithmetic() {
    let mut c = ctx();
    assert_eq!(eval_num(&mut c, "1 + 2 * 3"), 7.0);
    assert_eq!(eval_num(&mut c, "(1 + 2) * 3"), 9.0);
    assert_eq!(eval_num(&mut c, "10 % 4"), 2.0);
    assert_eq!(eval_num(&mut c, "2 * 3.5"), 7.0);
    assert!(eval_num(&mut c, "1 / 0").is_infinite());
    assert!(eval_num(&mut c, "0 / 0").is_nan());
}

#[test]
fn string_concat_and_compare() {
    let mut c = ctx();
    assert_eq!(eval_str(&mut c, "'foo' + 'bar'"), "foobar");
    assert_eq!(eval_str(&mut c, "'n=' + 42"), "n=42");
    assert!(eval_bool(&mut c, "'abc' === 'ab' + 'c'"));
    assert!(eval_bool(&mut c, "'a' < 'b'"));
}

#[test]
fn equality_rules() {
    let mut c = ctx();
    assert!(eval_bool(&mut c, "NaN !== NaN"));
    assert!(eval_bool(&mut c, "1 === 1.0"));
    assert!(eval_bool(&mut c, "null == undefined"));
    assert!(eval_bool(&mut c, "null !== undefined"));
    assert!(eval_bool(&mut c, "'2' == 2"));
    assert!(eval_bool(&mut c, "'2' !== 2"));
}

#[test]
fn typeof_operator() {
    let mut c = ctx();
    assert_eq!(eval_str(&mut c, "typeof 1"), "number");
    assert_eq!(eval_str(&mut c, "typeof 'x'"), "string");
    assert_eq!(eval_str(&mut c, "typeof true"), "boolean");
    assert_eq!(eval_str(&mut c, "typeof undefined"), "undefined");
    assert_eq!(eval_str(&mut c, "typeof null"), "object");
    assert_eq!(eval_str(&mut c, "typeof {}"), "object");
    assert_eq!(eval_str(&mut c, "typeof function() {}"), "function");
    assert_eq!(eval_str(&mut c, "typeof neverDeclared"), "undefined");
}

// ─── Bindings and scope ──────────────────────────────────────────────────────

#[test]
fn var_persists_across_evaluates() {
    let mut c = ctx();
    c.evaluate("var x = 10;").unwrap();
    assert_eq!(eval_num(&mut c, "x + 5"), 15.0);
    assert_eq!(eval_num(&mut c, "globalThis.x"), 10.0);
}

#[test]
fn let_persists_but_stays_off_global() {
    let mut c = ctx();
    c.evaluate("let y = 3;").unwrap();
    assert_eq!(eval_num(&mut c, "y"), 3.0);
    assert_eq!(eval_str(&mut c, "typeof globalThis.y"), "undefined");
}

#[test]
fn const_assignment_fails() {
    let mut c = ctx();
    c.evaluate("const k = 1;").unwrap();
    assert!(matches!(c.evaluate("k = 2"), Err(JsError::Type(_))));
}

#[test]
fn unresolved_identifier_is_reference_error() {
    let mut c = ctx();
    assert!(matches!(c.evaluate("nope + 1"), Err(JsError::Reference(_))));
    assert!(matches!(c.evaluate("nope = 1"), Err(JsError::Reference(_))));
}

// ─── Functions and closures ──────────────────────────────────────────────────

#[test]
fn closure_captures_outer_variable() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        r#"
        function makeAdder(x) {
            return function(y) { return x + y; };
        }
        var add5 = makeAdder(5);
        add5(10)
    "#,
    );
    assert_eq!(n, 15.0);
}

#[test]
fn multiple_closures_are_independent() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        r#"
        function makeAdder(x) { return function(y) { return x + y; }; }
        var a = makeAdder(5);
        var b = makeAdder(10);
        a(3) + b(7)
    "#,
    );
    assert_eq!(n, 25.0);
}

#[test]
fn arrow_functions_capture_this_lexically() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        r#"
        var o = {
            n: 41,
            get: function() {
                var f = () => this.n + 1;
                return f();
            }
        };
        o.get()
    "#,
    );
    assert_eq!(n, 42.0);
}

#[test]
fn recursion_and_stack_overflow() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        r#"
        function fib(n) { if (n <= 1) { return n; } return fib(n - 1) + fib(n - 2); }
        fib(12)
    "#,
    );
    assert_eq!(n, 144.0);
    assert!(matches!(
        c.evaluate("function inf() { return inf(); } inf()"),
        Err(JsError::Range(_))
    ));
}

#[test]
fn arguments_object() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        "function count() { return arguments.length; } count(1, 2, 3)",
    );
    assert_eq!(n, 3.0);
}

// ─── Control flow ────────────────────────────────────────────────────────────

#[test]
fn loops() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        r#"
        var sum = 0;
        for (var i = 1; i <= 10; i++) { sum += i; }
        var j = 0;
        while (j < 3) { j++; }
        sum + j
    "#,
    );
    assert_eq!(n, 58.0);
}

#[test]
fn for_in_iterates_own_keys_only() {
    let mut c = ctx();
    let s = eval_str(
        &mut c,
        r#"
        var proto = {inherited: 1};
        var o = Object.create(proto);
        o.a = 1;
        o.b = 2;
        var seen = '';
        for (var k in o) { seen += k; }
        seen
    "#,
    );
    assert_eq!(s, "ab");
}

#[test]
fn for_of_arrays_only() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        "var total = 0; for (var v of [1, 2, 3]) { total += v; } total",
    );
    assert_eq!(n, 6.0);
    assert!(matches!(
        c.evaluate("for (var v of {a: 1}) { }"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn try_catch_finally() {
    let mut c = ctx();
    let s = eval_str(
        &mut c,
        r#"
        var log = '';
        try {
            throw new TypeError('boom');
        } catch (e) {
            log += e.message;
        } finally {
            log += '|done';
        }
        log
    "#,
    );
    assert_eq!(s, "boom|done");
}

#[test]
fn thrown_values_round_trip() {
    let mut c = ctx();
    let n = eval_num(
        &mut c,
        "var got; try { throw {code: 7}; } catch (e) { got = e.code; } got",
    );
    assert_eq!(n, 7.0);
}

#[test]
fn engine_errors_are_catchable() {
    let mut c = ctx();
    let s = eval_str(
        &mut c,
        "var kind; try { missing(); } catch (e) { kind = e.name; } kind",
    );
    assert_eq!(s, "ReferenceError");
}

// ─── Arrays ──────────────────────────────────────────────────────────────────

#[test]
fn array_basics() {
    let mut c = ctx();
    assert_eq!(eval_num(&mut c, "[1, 2, 3].length"), 3.0);
    assert_eq!(eval_num(&mut c, "var a = [1, 2]; a.push(3); a[2]"), 3.0);
    assert_eq!(eval_str(&mut c, "[1, 2, 3].join('-')"), "1-2-3");
    assert_eq!(eval_num(&mut c, "[5, 6, 7].indexOf(6)"), 1.0);
    assert!(eval_bool(&mut c, "Array.isArray([])"));
    assert!(eval_bool(&mut c, "!Array.isArray({})"));
}

#[test]
fn define_property_reaches_array_elements() {
    let mut c = ctx();
    c.evaluate("var a = [1, 2, 3];").unwrap();
    let n = eval_num(
        &mut c,
        "Object.defineProperty(a, '0', {value: 99, writable: true, enumerable: true, configurable: true}); a[0]",
    );
    assert_eq!(n, 99.0);
    // absent attributes merge from the element's virtual descriptor
    assert_eq!(
        eval_num(&mut c, "Object.defineProperty(a, 1, {value: 42}); a[1]"),
        42.0
    );
    assert_eq!(
        eval_num(&mut c, "Object.getOwnPropertyDescriptor(a, '0').value"),
        99.0
    );
    assert!(eval_bool(
        &mut c,
        "Object.getOwnPropertyDescriptor(a, '1').writable"
    ));
    assert_eq!(
        eval_num(&mut c, "Object.getOwnPropertyDescriptor(a, 'length').value"),
        3.0
    );
    // past-length definitions would create holes
    assert!(matches!(
        c.evaluate(
            "Object.defineProperty(a, '9', {value: 1, writable: true, enumerable: true, configurable: true})"
        ),
        Err(JsError::Type(_))
    ));
    // elements are data-only
    assert!(matches!(
        c.evaluate("Object.defineProperty(a, '0', {get: function() { return 1; }})"),
        Err(JsError::Type(_))
    ));
}

#[test]
fn assigning_past_length_is_type_error() {
    let mut c = ctx();
    assert!(matches!(
        c.evaluate("var a = [1]; a[5] = 2"),
        Err(JsError::Type(_))
    ));
    // appending at the boundary is fine
    assert_eq!(eval_num(&mut c, "var b = [1]; b[1] = 2; b.length"), 2.0);
}

// ─── Intrinsic odds and ends ─────────────────────────────────────────────────

#[test]
fn math_and_number() {
    let mut c = ctx();
    assert_eq!(eval_num(&mut c, "Math.max(1, 9, 4)"), 9.0);
    assert_eq!(eval_num(&mut c, "Math.floor(2.9)"), 2.0);
    assert!(eval_bool(&mut c, "Number.isInteger(4)"));
    assert_eq!(eval_str(&mut c, "(255).toString(16)"), "ff");
    assert!(matches!(
        c.evaluate("(1).toString(40)"),
        Err(JsError::Range(_))
    ));
}

#[test]
fn parse_functions() {
    let mut c = ctx();
    assert_eq!(eval_num(&mut c, "parseInt('42')"), 42.0);
    assert_eq!(eval_num(&mut c, "parseInt('ff', 16)"), 255.0);
    assert_eq!(eval_num(&mut c, "parseFloat('3.5rest')"), 3.5);
    assert!(eval_bool(&mut c, "isNaN(parseInt('zzz'))"));
    assert!(eval_bool(&mut c, "isFinite(1) && !isFinite(1 / 0)"));
}

#[test]
fn json_round_trip() {
    let mut c = ctx();
    let s = eval_str(&mut c, "JSON.stringify({a: 1, b: [true, null, 'x']})");
    assert_eq!(s, r#"{"a":1,"b":[true,null,"x"]}"#);
    assert_eq!(
        eval_num(&mut c, r#"JSON.parse('{"n": [10, 20]}').n[1]"#),
        20.0
    );
    assert!(matches!(
        c.evaluate("JSON.parse('{oops')"),
        Err(JsError::Syntax(_))
    ));
}

#[test]
fn string_methods_ascii_case() {
    let mut c = ctx();
    assert_eq!(eval_str(&mut c, "'hello'.toUpperCase()"), "HELLO");
    assert_eq!(eval_str(&mut c, "'HeLLo'.toLowerCase()"), "hello");
    assert_eq!(eval_num(&mut c, "'hello'.length"), 5.0);
    assert_eq!(eval_num(&mut c, "'a,b,c'.split(',').length"), 3.0);
    assert_eq!(eval_str(&mut c, "'hello'.slice(1, 3)"), "el");
}

#[test]
fn regexp_subset() {
    let mut c = ctx();
    assert!(eval_bool(&mut c, "new RegExp('ab+c').test('xabbc')"));
    assert!(eval_bool(&mut c, "!new RegExp('^ab$').test('abc')"));
    assert!(eval_bool(&mut c, "new RegExp('AB', 'i').test('xaby')"));
    assert_eq!(
        eval_num(&mut c, "new RegExp('(b)(c)').exec('abcd').length"),
        3.0
    );
    assert!(matches!(
        c.evaluate("new RegExp('(', '')"),
        Err(JsError::Syntax(_))
    ));
    assert!(matches!(
        c.evaluate("new RegExp('a', 'q')"),
        Err(JsError::Syntax(_))
    ));
}

#[test]
fn date_now_is_a_number() {
    let mut c = ctx();
    let n = eval_num(&mut c, "Date.now()");
    assert!(n > 1.0e12, "epoch millis expected, got {}", n);
}

#[test]
fn syntax_errors_surface() {
    let mut c = ctx();
    assert!(matches!(c.evaluate("var = 1"), Err(JsError::Syntax(_))));
    assert!(matches!(c.evaluate("(1 +"), Err(JsError::Syntax(_))));
}

#[test]
fn completion_value_rules() {
    let mut c = ctx();
    // declaration-only script completes with undefined
    let v = c.evaluate("var q = 5;").unwrap();
    assert!(v.is_undefined());
    // last expression statement wins
    assert_eq!(eval_num(&mut c, "1; 2; 3"), 3.0);
}
