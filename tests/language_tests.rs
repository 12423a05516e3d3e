// tests/language_tests.rs

use exprlang::cache::validate_key;
use exprlang::language::cache_key;
use exprlang::{
    ArrayAdapter, CacheAdapter, CacheError, CacheItem, ExpressionError, ExpressionFunction, ExpressionLanguage,
    Flags, FunctionProvider, LruAdapter, MapResolver, NameSpec, ParsedExpression, Value, Values, evaluate,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn values(entries: Vec<(&str, Value)>) -> Values {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Counts saves made by the facade.
struct CountingCache {
    inner: ArrayAdapter,
    saves: Arc<AtomicUsize>,
}

impl CacheAdapter for CountingCache {
    fn get_item(&mut self, key: &str) -> Result<CacheItem, CacheError> {
        self.inner.get_item(key)
    }

    fn save(&mut self, item: CacheItem) -> Result<bool, CacheError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(item)
    }

    fn has_item(&mut self, key: &str) -> Result<bool, CacheError> {
        self.inner.has_item(key)
    }

    fn delete_item(&mut self, key: &str) -> Result<bool, CacheError> {
        self.inner.delete_item(key)
    }

    fn clear(&mut self) -> bool {
        self.inner.clear()
    }
}

fn counting_language() -> (ExpressionLanguage, Arc<AtomicUsize>) {
    let saves = Arc::new(AtomicUsize::new(0));
    let cache = CountingCache {
        inner: ArrayAdapter::new(),
        saves: Arc::clone(&saves),
    };
    (ExpressionLanguage::with_cache(Box::new(cache)), saves)
}

// ============================================================================
// Parse Cache
// ============================================================================

#[test]
fn test_permuted_names_share_a_cache_entry() {
    let mut language = ExpressionLanguage::new();
    let first = language
        .parse("a + b", &["a".into(), NameSpec::alias("B", "b")], Flags::empty())
        .unwrap();
    let second = language
        .parse("a + b", &[NameSpec::alias("B", "b"), "a".into()], Flags::empty())
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_reparse_is_a_no_op() {
    let (mut language, saves) = counting_language();
    let parsed = language.parse("1 + 1", &[], Flags::empty()).unwrap();
    let again = language.parse(&parsed, &[], Flags::empty()).unwrap();
    assert!(Arc::ptr_eq(&parsed, &again));
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn test_evaluate_reuses_parse_for_any_value_order() {
    let (mut language, saves) = counting_language();
    let ab = values(vec![("a", Value::Integer(1)), ("b", Value::Integer(2))]);
    let ba = values(vec![("b", Value::Integer(20)), ("a", Value::Integer(10))]);

    assert_eq!(language.evaluate("a + b", &ab).unwrap(), Value::Integer(3));
    assert_eq!(language.evaluate("a + b", &ba).unwrap(), Value::Integer(30));
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    language.compile("a + b", &["b".into(), "a".into()]).unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn test_flags_keep_separate_cache_entries() {
    let mut language = ExpressionLanguage::new();
    assert!(language.parse("x", &[], Flags::IGNORE_UNKNOWN_VARIABLES).is_ok());
    assert!(matches!(
        language.parse("x", &[], Flags::empty()),
        Err(ExpressionError::Syntax(_))
    ));
}

#[test]
fn test_cache_keys_are_valid_pool_keys() {
    let test_cases = vec![
        ("a(b)/c:d", vec![NameSpec::alias("K", "a")]),
        ("{x: '@'} ~ '\\\\'", vec![]),
        ("été", vec!["x".into()]),
    ];

    for (input, names) in test_cases {
        let key = cache_key(input, &names, Flags::empty());
        assert!(validate_key(&key).is_ok(), "Failed for input: {}", input);
    }
}

#[test]
fn test_bounded_cache_evicts() {
    let mut language = ExpressionLanguage::with_cache(Box::new(LruAdapter::new(1)));
    let first = language.parse("1", &[], Flags::empty()).unwrap();
    language.parse("2", &[], Flags::empty()).unwrap();
    let again = language.parse("1", &[], Flags::empty()).unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
    assert_eq!(first, again);
}

/// Never stores anything.
struct RefusingCache;

impl CacheAdapter for RefusingCache {
    fn get_item(&mut self, key: &str) -> Result<CacheItem, CacheError> {
        Ok(CacheItem::new(key))
    }

    fn save(&mut self, _item: CacheItem) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn has_item(&mut self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn delete_item(&mut self, _key: &str) -> Result<bool, CacheError> {
        Ok(true)
    }

    fn clear(&mut self) -> bool {
        true
    }
}

#[test]
fn test_refused_save_still_returns_the_parse() {
    let mut language = ExpressionLanguage::with_cache(Box::new(RefusingCache));
    assert_eq!(
        language.evaluate("1 + 2", &Values::new()).unwrap(),
        Value::Integer(3)
    );
}

// ============================================================================
// Lint
// ============================================================================

#[test]
fn test_lint_flags() {
    let mut language = ExpressionLanguage::new();
    let no_names: &[NameSpec] = &[];

    assert!(language.lint("foo()", Some(no_names), Flags::IGNORE_UNKNOWN_FUNCTIONS).is_ok());

    let err = language.lint("foo()", Some(no_names), Flags::empty()).unwrap_err();
    assert!(err.to_string().contains("The function \"foo\" does not exist"));

    assert!(language.lint("a.b", None, Flags::empty()).is_ok());
    assert!(language.lint("a.b", Some(no_names), Flags::empty()).is_err());
    assert!(language.lint("a.b", Some(no_names), Flags::IGNORE_UNKNOWN_VARIABLES).is_ok());
    assert!(language.lint("1 +", None, Flags::empty()).is_err());

    let parsed = language.parse("1", &[], Flags::empty()).unwrap();
    assert!(language.lint(&parsed, Some(no_names), Flags::empty()).is_ok());
}

#[test]
fn test_suggestion_in_error() {
    let mut language = ExpressionLanguage::new();
    let err = language
        .parse("foo > bar", &["foo".into(), "baz".into()], Flags::empty())
        .unwrap_err();
    assert!(matches!(err, ExpressionError::Syntax(_)));
    assert_eq!(
        err.to_string(),
        "SyntaxError: Variable \"bar\" is not valid around position 7 for expression `foo > bar`. Did you mean \"baz\"?"
    );
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_registration_freezes_after_first_use() {
    let test_cases = vec!["evaluate", "compile", "parse", "lint"];

    for first_use in test_cases {
        let mut language = ExpressionLanguage::new();
        match first_use {
            "evaluate" => {
                language.evaluate("1+1", &Values::new()).unwrap();
            }
            "compile" => {
                language.compile("1+1", &[]).unwrap();
            }
            "parse" => {
                language.parse("1+1", &[], Flags::empty()).unwrap();
            }
            _ => {
                language.lint("1+1", None, Flags::empty()).unwrap();
            }
        }

        let err = language
            .register("f", |_| "f()".to_string(), |_, _| Ok(Value::Null))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "LogicException: Registering functions after calling evaluate(), compile(), or parse() is not supported.",
            "Failed for input: {}",
            first_use
        );
    }
}

#[test]
fn test_failed_parse_still_freezes() {
    let mut language = ExpressionLanguage::new();
    assert!(language.evaluate("1 +", &Values::new()).is_err());
    assert!(language.add_function(ExpressionFunction::new("f", |_| String::new(), |_, _| Ok(Value::Null))).is_err());
}

struct MathProvider;

impl FunctionProvider for MathProvider {
    fn functions(&self) -> Vec<ExpressionFunction> {
        vec![
            ExpressionFunction::new(
                "double",
                |args| format!("({} * 2)", args[0]),
                |_, args| Ok(Value::Float(args[0].to_number() * 2.0)),
            ),
            ExpressionFunction::new(
                "abs",
                |args| format!("Math.abs({})", args[0]),
                |_, args| Ok(Value::Float(args[0].to_number().abs())),
            ),
        ]
    }
}

#[test]
fn test_providers() {
    let mut language = ExpressionLanguage::new();
    language.register_provider(&MathProvider).unwrap();
    assert_eq!(
        language.evaluate("double(abs(-2))", &Values::new()).unwrap(),
        Value::Float(4.0)
    );
    assert_eq!(
        language.compile("double(abs(-2))", &[]).unwrap(),
        "(Math.abs((-2)) * 2)"
    );

    let mut language = ExpressionLanguage::with_providers(
        Box::new(ArrayAdapter::new()),
        vec![Box::new(MathProvider) as Box<dyn FunctionProvider>],
    );
    assert!(language.functions().contains("double"));
    assert!(language.functions().contains("max"));
    assert_eq!(language.evaluate("abs(-1.5)", &Values::new()).unwrap(), Value::Float(1.5));
}

#[test]
fn test_host_functions() {
    let mut resolver = MapResolver::default();
    resolver.insert(
        "strtoupper",
        Value::function(|args| Ok(Value::String(args[0].to_js_string().to_uppercase()))),
    );
    let mut strings = exprlang::Map::new();
    strings.insert(
        "reverse".into(),
        Value::function(|args| Ok(Value::String(args[0].to_js_string().chars().rev().collect()))),
    );
    resolver.insert("Strings", Value::Object(strings));

    let mut language = ExpressionLanguage::new();
    language
        .add_function(ExpressionFunction::from_host(&resolver, "strtoupper", None).unwrap())
        .unwrap();
    language
        .add_function(ExpressionFunction::from_host(&resolver, "Strings.reverse", Some("reverse")).unwrap())
        .unwrap();

    let err = ExpressionFunction::from_host(&resolver, "Strings.reverse", None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "LogicException: An expression function name must be defined when host function \"Strings.reverse\" is namespaced."
    );
    let err = ExpressionFunction::from_host(&resolver, "missing", None).unwrap_err();
    assert_eq!(err.to_string(), "LogicException: Host function \"missing\" does not exist.");

    assert_eq!(
        language.evaluate("reverse(strtoupper('abc'))", &Values::new()).unwrap(),
        Value::from("CBA")
    );
    assert_eq!(
        language.compile("reverse(strtoupper('abc'))", &[]).unwrap(),
        "Strings.reverse(strtoupper(\"abc\"))"
    );
}

#[test]
fn test_host_resolver_for_constant_and_enum() {
    let mut status = exprlang::Map::new();
    status.insert("ACTIVE".into(), Value::from("active"));
    let mut resolver = MapResolver::default();
    resolver.insert("LIMIT", Value::Integer(5));
    resolver.insert("Status", Value::Object(status));

    let mut language = ExpressionLanguage::new()
        .with_host_resolver(Arc::new(resolver))
        .unwrap();
    let context = values(vec![("n", Value::Integer(3))]);
    assert_eq!(
        language.evaluate("n < constant('LIMIT')", &context).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        language.evaluate("enum('Status::ACTIVE')", &context).unwrap(),
        Value::from("active")
    );
}

#[test]
fn test_closure_resolver() {
    let language = ExpressionLanguage::new().with_host_resolver(Arc::new(|path: &str| {
        (path == "HALF").then(|| Value::Float(0.5))
    }));
    let mut language = language.unwrap();
    assert_eq!(
        language.evaluate("constant('HALF')", &Values::new()).unwrap(),
        Value::Float(0.5)
    );
}

#[test]
fn test_host_resolver_after_use_is_rejected() {
    let mut language = ExpressionLanguage::new();
    language.evaluate("1", &Values::new()).unwrap();
    assert!(language.with_host_resolver(Arc::new(MapResolver::default())).is_err());
}

// ============================================================================
// Null Safety
// ============================================================================

#[test]
fn test_null_safe_chain() {
    let mut language = ExpressionLanguage::new();
    let context = values(vec![("foo", Value::Null)]);
    let expression = "foo?.bar['baz']['qux'].quux()";

    assert_eq!(language.evaluate(expression, &context).unwrap(), Value::Null);
    assert_eq!(
        language.compile(expression, &["foo".into()]).unwrap(),
        "foo?.bar[\"baz\"][\"qux\"].quux()"
    );
}

// ============================================================================
// Parsed Expressions
// ============================================================================

#[test]
fn test_parsed_expression_is_reusable() {
    let mut language = ExpressionLanguage::new();
    let parsed = language
        .parse("price * qty", &["price".into(), "qty".into()], Flags::empty())
        .unwrap();
    assert_eq!(parsed.to_string(), "price * qty");
    assert_eq!(parsed.nodes().dump(), "(price * qty)");

    let context = values(vec![("price", Value::Float(2.5)), ("qty", Value::Integer(4))]);
    assert_eq!(language.evaluate(&parsed, &context).unwrap(), Value::Float(10.0));
    assert_eq!(language.compile(&parsed, &[]).unwrap(), "(price * qty)");

    let owned = ParsedExpression::new("1", exprlang::Node::constant(1i64));
    assert_eq!(language.evaluate(owned, &Values::new()).unwrap(), Value::Integer(1));
}

#[test]
fn test_parsed_expression_across_threads() {
    let mut language = ExpressionLanguage::new();
    let parsed = language
        .parse("user?.age >= 18 ?? false", &["user".into()], Flags::empty())
        .unwrap();
    let functions = language.functions();
    let results = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for age in [10i64, 20, 30] {
            let parsed = Arc::clone(&parsed);
            let results = &results;
            scope.spawn(move || {
                let mut user = exprlang::Map::new();
                user.insert("age".into(), Value::Integer(age));
                let context = values(vec![("user", Value::Object(user))]);
                let value = evaluate(parsed.nodes(), functions, &context).unwrap();
                results.lock().unwrap().push((age, value));
            });
        }
    });

    let mut results = results.into_inner().unwrap();
    results.sort_by_key(|(age, _)| *age);
    assert_eq!(
        results,
        vec![
            (10, Value::Boolean(false)),
            (20, Value::Boolean(true)),
            (30, Value::Boolean(true)),
        ]
    );
}
