// tests/js_equivalence_tests.rs
//
// Runs compiled expressions in a JavaScript engine and checks they produce
// what the evaluator produces for the same values.

use boa_engine::{Context, Source};
use exprlang::{Compiler, ExpressionLanguage, FunctionRegistry, Map, NameSpec, Value, Values};

const HELPERS: &str = r#"
function range(from, to) {
    const out = [];
    if (from <= to) {
        for (let i = from; i <= to; i++) out.push(i);
    } else {
        for (let i = from; i >= to; i--) out.push(i);
    }
    return out;
}
function includes(needle, haystack) {
    return haystack.some((item) => item === needle);
}
function toRegExp(literal) {
    const end = literal.lastIndexOf("/");
    return new RegExp(literal.slice(1, end), literal.slice(end + 1));
}
"#;

fn object(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<Map>())
}

fn context() -> Values {
    let user = object(vec![
        ("name", Value::from("Ada")),
        ("tags", Value::Array(vec![Value::from("x"), Value::from("y")])),
        ("address", Value::Null),
    ]);
    vec![
        ("a", Value::Integer(7)),
        ("b", Value::Integer(2)),
        ("f", Value::Float(1.5)),
        ("s", Value::from("Hello World")),
        ("n", Value::Null),
        ("pattern", Value::from("/^h/i")),
        ("items", Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])),
        ("user", user),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
        }
    }
}

/// Declares the values as constants, then evaluates `source`.
/// `undefined` and `null` both come back as `Value::Null`.
fn run_js(source: &str, values: &Values) -> Result<Value, String> {
    let registry = FunctionRegistry::new();
    let mut script = String::from(HELPERS);
    for (name, value) in values {
        let mut compiler = Compiler::new(&registry);
        compiler.repr(value, false);
        script.push_str(&format!("const {} = {};\n", name, compiler.source()));
    }
    script.push_str(&format!("JSON.stringify(({}) ?? null)", source));

    let mut engine = Context::default();
    let result = engine
        .eval(Source::from_bytes(script.as_bytes()))
        .map_err(|e| e.to_string())?;
    let text = result
        .to_string(&mut engine)
        .map_err(|e| e.to_string())?
        .to_std_string_escaped();
    serde_json::from_str(&text)
        .map(json_to_value)
        .map_err(|e| format!("{}: {}", e, text))
}

fn assert_equivalent(test_cases: Vec<&str>) {
    let values = context();
    let names: Vec<NameSpec> = values.keys().map(|k| NameSpec::from(k.as_str())).collect();
    let mut language = ExpressionLanguage::new();

    for input in test_cases {
        let evaluated = language.evaluate(input, &values).unwrap();
        let compiled = language.compile(input, &names).unwrap();
        let executed = run_js(&compiled, &values)
            .unwrap_or_else(|e| panic!("Failed for input: {}\n{}\n{}", input, compiled, e));
        assert!(
            executed.strict_equals(&evaluated),
            "Failed for input: {}\ncompiled: {}\nevaluated: {:?}\nexecuted: {:?}",
            input,
            compiled,
            evaluated,
            executed
        );
    }
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_arithmetic() {
    assert_equivalent(vec![
        "a + b * 3",
        "a / b",
        "a % b",
        "-a % 3",
        "b ** 10",
        "a - f",
        "(a + b) * -1",
        "f * 2",
    ]);
}

#[test]
fn test_logic_and_bitwise() {
    assert_equivalent(vec![
        "a > 5 and b > 5",
        "a > 5 or b > 5",
        "n or 'fallback'",
        "a && s",
        "not (a > b)",
        "!n",
        "a xor b",
        "0 xor b",
        "a | 8",
        "a & 3",
        "a ^ 1",
    ]);
}

#[test]
fn test_comparison() {
    assert_equivalent(vec![
        "a == '7'",
        "a === 7.0",
        "a !== '7'",
        "a != b",
        "'abc' < 'abd'",
        "a >= 7",
        "f <= 1",
    ]);
}

#[test]
fn test_strings() {
    assert_equivalent(vec![
        "s ~ '!' ~ a",
        "f ~ ''",
        "s contains 'world'",
        "s starts with 'HELLO'",
        "s ends with 'x'",
        "items ~ ''",
    ]);
}

#[test]
fn test_ranges_and_membership() {
    assert_equivalent(vec![
        "1..4",
        "4..1",
        "2 in items",
        "'2' in items",
        "5 not in items",
        "b in 1..3",
    ]);
}

#[test]
fn test_regexes() {
    assert_equivalent(vec![
        "s matches '/^hello/i'",
        "s matches '/^hello/'",
        "s matches pattern",
        "n matches '/nu/'",
        "n matches pattern",
        "'a/b' matches '/a.b/'",
        "'x' matches '/a/+alert(1)+/'",
    ]);
}

// ============================================================================
// Conditionals and Access
// ============================================================================

#[test]
fn test_conditionals() {
    assert_equivalent(vec![
        "a > b ? 'big' : 'small'",
        "n ?: 'empty'",
        "a ? b",
        "n ? b",
    ]);
}

#[test]
fn test_null_handling() {
    assert_equivalent(vec![
        "user.address.city ?? 'none'",
        "n ?? 5",
        "user.name ?? 'anon'",
        "user?.name",
        "n?.name",
        "user.address?.city",
        "n?.name.first",
    ]);
}

#[test]
fn test_access_and_literals() {
    assert_equivalent(vec![
        "user.tags[1]",
        "user['name']",
        "items[0] + items[2]",
        "[a, 'x', null]",
        "{k: a, 'b c': [1]}",
        "{}",
        "max(a, b, 10)",
        "min(a, f)",
    ]);
}
