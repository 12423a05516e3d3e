// tests/compiler_tests.rs

use exprlang::{
    BinaryOp, Compiler, ExpressionLanguage, Flags, FunctionRegistry, MapResolver, NameSpec, Node, Value,
};
use std::sync::Arc;

fn compile(expression: &str, names: &[&str]) -> String {
    let names: Vec<NameSpec> = names.iter().map(|n| NameSpec::from(*n)).collect();
    ExpressionLanguage::new().compile(expression, &names).unwrap()
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_infix_operators() {
    let test_cases = vec![
        ("1 + 2 * 3", "(1 + (2 * 3))"),
        ("(3 - 3) * 2", "((3 - 3) * 2)"),
        ("a and b", "(a && b)"),
        ("a && b", "(a && b)"),
        ("a or b", "(a || b)"),
        ("a == b", "(a == b)"),
        ("a !== b", "(a !== b)"),
        ("a % 2 >= 1", "((a % 2) >= 1)"),
        ("a | b & 1", "(a | (b & 1))"),
        ("3.5 + 1e3", "(3.5 + 1000)"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["a", "b"]), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_helper_operators() {
    let test_cases = vec![
        ("a xor b", "(!(a) !== !(b))"),
        ("a ~ b", "(\"\" + a + b)"),
        ("2 ** 3", "Math.pow(2, 3)"),
        ("2 ** 3 ** 2", "Math.pow(2, Math.pow(3, 2))"),
        ("1..3", "range(1, 3)"),
        ("a in [1, 2]", "includes(a, [1, 2])"),
        ("a not in b", "!includes(a, b)"),
        (
            "a matches '/^x/i'",
            "((subject, re) => subject != null && re.test(subject))(a, new RegExp(\"^x\", \"i\"))",
        ),
        (
            "a matches b",
            "((subject, re) => subject != null && re.test(subject))(a, toRegExp(b))",
        ),
        (
            "a matches 'abc'",
            "((subject, re) => subject != null && re.test(subject))(a, toRegExp(\"abc\"))",
        ),
        (
            "a contains 'x'",
            "String(a).toLowerCase().includes(String(\"x\").toLowerCase())",
        ),
        (
            "a starts with b",
            "String(a).toLowerCase().startsWith(String(b).toLowerCase())",
        ),
        (
            "a ends with 'z'",
            "String(a).toLowerCase().endsWith(String(\"z\").toLowerCase())",
        ),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["a", "b"]), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_unary_and_conditional() {
    let test_cases = vec![
        ("not a", "(!a)"),
        ("!a", "(!a)"),
        ("-a", "(-a)"),
        ("+a", "(+a)"),
        ("a ? b : 1", "((a) ? (b) : (1))"),
        ("a ?: b", "((a) ? (a) : (b))"),
        ("a ? b", "((a) ? (b) : (null))"),
        ("a ?? b", "((a) ?? (b))"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["a", "b"]), expected, "Failed for input: {}", input);
    }
}

// ============================================================================
// Access Chains
// ============================================================================

#[test]
fn test_access_chains() {
    let test_cases = vec![
        ("foo.bar", "foo.bar"),
        ("foo.bar(1, 'x')", "foo.bar(1, \"x\")"),
        ("foo[0]", "foo[0]"),
        ("foo?.bar", "foo?.bar"),
        ("foo?.[0]", "foo?.[0]"),
        (
            "foo?.bar['baz']['qux'].quux()",
            "foo?.bar[\"baz\"][\"qux\"].quux()",
        ),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["foo"]), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_coalesce_makes_chain_optional() {
    let test_cases = vec![
        ("foo.bar ?? 'x'", "((foo?.bar) ?? (\"x\"))"),
        ("foo.bar.baz ?? 'x'", "((foo?.bar?.baz) ?? (\"x\"))"),
        ("foo['a'].b ?? 1", "((foo?.[\"a\"]?.b) ?? (1))"),
        // only the left side is softened
        ("foo ?? foo.bar", "((foo) ?? (foo.bar))"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["foo"]), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_unknown_name_before_coalesce() {
    assert_eq!(compile("foo ?? 'x'", &[]), "((foo ?? null) ?? (\"x\"))");
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literals() {
    let test_cases = vec![
        ("[1, 'a', true, null]", "[1, \"a\", true, null]"),
        ("{a: 1, 'b c': [2]}", "{\"a\": 1, \"b c\": [2]}"),
        ("{(a): 1}", "{[a]: 1}"),
        ("{}", "{}"),
        ("'a\"b'", "\"a\\\"b\""),
        ("'a\\\\b'", "\"a\\\\b\""),
        ("1.5", "1.5"),
        ("false", "false"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["a"]), expected, "Failed for input: {}", input);
    }
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_builtin_functions() {
    let test_cases = vec![
        ("max(a, 1)", "Math.max(a, 1)"),
        ("min(1, 2, 3)", "Math.min(1, 2, 3)"),
        ("constant('App.LIMIT')", "App.LIMIT"),
        ("constant(a)", "constant(a)"),
        ("enum('App\\\\Status::ACTIVE')", "App.Status.ACTIVE"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &["a"]), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_string_literals_stay_data() {
    let test_cases = vec![
        (
            "'x' matches '/a/.constructor.constructor(\"return process\")()//'",
            "((subject, re) => subject != null && re.test(subject))(\"x\", new RegExp(\"a/.constructor.constructor(\\\"return process\\\")()/\", \"\"))",
        ),
        (
            "'x' matches '/a\\\\/\"/g'",
            "((subject, re) => subject != null && re.test(subject))(\"x\", new RegExp(\"a\\\\/\\\"\", \"g\"))",
        ),
        (
            "constant(\"require('child_process').execSync('id')\")",
            "constant(\"require('child_process').execSync('id')\")",
        ),
        ("enum('x;alert(1)')", "enum(\"x;alert(1)\")"),
        ("constant('new.target')", "constant(\"new.target\")"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input, &[]), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_registered_function() {
    let mut language = ExpressionLanguage::new();
    language
        .register(
            "upper",
            |args| format!("{}.toUpperCase()", args[0]),
            |_, args| Ok(Value::String(args[0].to_js_string().to_uppercase())),
        )
        .unwrap();
    assert_eq!(
        language.compile("upper(a ~ 'b')", &["a".into()]).unwrap(),
        "(\"\" + a + \"b\").toUpperCase()"
    );
}

#[test]
fn test_unknown_function_compiles_as_call() {
    let mut language = ExpressionLanguage::new();
    let parsed = language
        .parse("foo(1, bar)", &[], Flags::IGNORE_UNKNOWN_FUNCTIONS | Flags::IGNORE_UNKNOWN_VARIABLES)
        .unwrap();
    assert_eq!(language.compile(&parsed, &[]).unwrap(), "foo(1, bar)");
}

#[test]
fn test_host_resolver_does_not_change_compiled_form() {
    let mut resolver = MapResolver::default();
    resolver.insert("LIMIT", Value::Integer(3));
    let mut language = ExpressionLanguage::new()
        .with_host_resolver(Arc::new(resolver))
        .unwrap();
    assert_eq!(language.compile("constant('LIMIT')", &[]).unwrap(), "LIMIT");
}

// ============================================================================
// Aliases
// ============================================================================

#[test]
fn test_alias_compiles_to_key() {
    let mut language = ExpressionLanguage::new();
    let names = vec![NameSpec::from("a"), NameSpec::alias("B", "b")];
    assert_eq!(language.compile("a + b", &names).unwrap(), "(a + B)");
}

// ============================================================================
// Compiler API
// ============================================================================

#[test]
fn test_compiler_builder() {
    let registry = FunctionRegistry::new();
    let mut compiler = Compiler::new(&registry);
    let node = Node::binary(BinaryOp::Add, Node::name("a"), Node::constant(1i64));

    compiler.raw("return ").compile(&node).raw(";");
    assert_eq!(compiler.source(), "return (a + 1);");

    let inner = compiler.subcompile(&Node::constant("x"));
    assert_eq!(inner, "\"x\"");
    assert_eq!(compiler.source(), "return (a + 1);");

    compiler.reset().repr(&Value::Array(vec![Value::Float(2.0), Value::Null]), false);
    assert_eq!(compiler.source(), "[2, null]");

    compiler.reset().repr(&Value::from("window"), true);
    assert_eq!(compiler.into_source(), "window");
}
