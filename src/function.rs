//! Functions callable from expressions.
//!
//! Every function has two halves: a compiler that turns already-compiled
//! argument source into JavaScript source, and an evaluator that computes the
//! result from argument values. The registry is frozen the first time it is
//! used to parse, compile or evaluate, after which registration fails.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::LogicException;
use crate::evaluator::EvalError;
use crate::value::{Map, Value, Values};

type CompileFn = dyn Fn(&[String]) -> String + Send + Sync;
type EvaluateFn = dyn Fn(&Values, &[Value]) -> Result<Value, EvalError> + Send + Sync;

/// Looks up host bindings by dotted path, e.g. `Status.ACTIVE`.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Option<Value>;
}

impl<F> HostResolver for F
where
    F: Fn(&str) -> Option<Value> + Send + Sync,
{
    fn resolve(&self, path: &str) -> Option<Value> {
        self(path)
    }
}

/// Resolver over a tree of values: `a.b.c` walks nested objects.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    root: Map,
}

impl MapResolver {
    pub fn new(root: Map) -> Self {
        MapResolver { root }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.root.insert(name.into(), value.into());
    }
}

impl HostResolver for MapResolver {
    fn resolve(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

/// A function usable in expressions.
///
/// ```
/// use exprlang::{ExpressionFunction, Value};
///
/// let upper = ExpressionFunction::new(
///     "upper",
///     |args| format!("{}.toUpperCase()", args[0]),
///     |_values, args| Ok(Value::String(args[0].to_js_string().to_uppercase())),
/// );
/// assert_eq!(upper.compile(&["name".to_string()]), "name.toUpperCase()");
/// ```
#[derive(Clone)]
pub struct ExpressionFunction {
    name: String,
    compiler: Arc<CompileFn>,
    evaluator: Arc<EvaluateFn>,
}

impl ExpressionFunction {
    pub fn new<C, E>(name: impl Into<String>, compiler: C, evaluator: E) -> Self
    where
        C: Fn(&[String]) -> String + Send + Sync + 'static,
        E: Fn(&Values, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        ExpressionFunction {
            name: name.into(),
            compiler: Arc::new(compiler),
            evaluator: Arc::new(evaluator),
        }
    }

    /// Adapts a host function found at `path`.
    ///
    /// The compiled form calls `path(args...)`. A dotted path needs an
    /// explicit `name`; otherwise the path itself is the name.
    pub fn from_host(
        resolver: &dyn HostResolver,
        path: &str,
        name: Option<&str>,
    ) -> Result<Self, LogicException> {
        let path = path.trim_start_matches('/');
        let callable = match resolver.resolve(path) {
            Some(Value::Function(callable)) => callable,
            _ => {
                return Err(LogicException::new(format!(
                    "Host function \"{}\" does not exist.",
                    path
                )));
            }
        };

        if name.is_none() && path.contains('.') {
            return Err(LogicException::new(format!(
                "An expression function name must be defined when host function \"{}\" is namespaced.",
                path
            )));
        }

        let target = path.to_string();
        Ok(ExpressionFunction::new(
            name.unwrap_or(path),
            move |args| format!("{}({})", target, args.join(", ")),
            move |_, args| callable.call(args),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compile(&self, args: &[String]) -> String {
        (self.compiler)(args)
    }

    pub fn evaluate(&self, values: &Values, args: &[Value]) -> Result<Value, EvalError> {
        (self.evaluator)(values, args)
    }
}

impl fmt::Debug for ExpressionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A source of functions registered together.
pub trait FunctionProvider {
    fn functions(&self) -> Vec<ExpressionFunction>;
}

impl FunctionProvider for Vec<ExpressionFunction> {
    fn functions(&self) -> Vec<ExpressionFunction> {
        self.clone()
    }
}

/// Named functions, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, ExpressionFunction>,
    frozen: bool,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `min`, `max`, `constant` and `enum`.
    pub fn with_builtins(resolver: Option<Arc<dyn HostResolver>>) -> Self {
        let mut registry = Self::new();
        for function in builtins(resolver) {
            registry.functions.insert(function.name.clone(), function);
        }
        registry
    }

    pub fn register(&mut self, function: ExpressionFunction) -> Result<(), LogicException> {
        if self.frozen {
            return Err(Self::frozen_error());
        }
        self.insert(function);
        Ok(())
    }

    pub(crate) fn frozen_error() -> LogicException {
        LogicException::new("Registering functions after calling evaluate(), compile(), or parse() is not supported.")
    }

    /// Registration that ignores the freeze, for construction-time setup.
    pub(crate) fn insert(&mut self, function: ExpressionFunction) {
        debug!(name = function.name(), "registering expression function");
        self.functions.insert(function.name.clone(), function);
    }

    /// Swaps the `constant`/`enum` built-ins for ones using `resolver`.
    pub(crate) fn set_host_resolver(&mut self, resolver: Arc<dyn HostResolver>) {
        for function in builtins(Some(resolver)) {
            if matches!(function.name(), "constant" | "enum") {
                self.insert(function);
            }
        }
    }

    /// Locks the registry against further registration.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn get(&self, name: &str) -> Option<&ExpressionFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn builtins(resolver: Option<Arc<dyn HostResolver>>) -> Vec<ExpressionFunction> {
    let enum_resolver = resolver.clone();
    vec![
        ExpressionFunction::new(
            "min",
            |args| format!("Math.min({})", args.join(", ")),
            |_, args| Ok(extremum(args, |candidate, best| candidate < best, f64::INFINITY)),
        ),
        ExpressionFunction::new(
            "max",
            |args| format!("Math.max({})", args.join(", ")),
            |_, args| Ok(extremum(args, |candidate, best| candidate > best, f64::NEG_INFINITY)),
        ),
        ExpressionFunction::new(
            "constant",
            |args| compile_path("constant", args, |path| path.to_string()),
            move |values, args| Ok(resolve_path(resolver.as_deref(), values, args, |p| p.to_string())),
        ),
        ExpressionFunction::new(
            "enum",
            |args| compile_path("enum", args, normalize_enum_path),
            move |values, args| {
                Ok(resolve_path(enum_resolver.as_deref(), values, args, normalize_enum_path))
            },
        ),
    ]
}

/// `Math.min`/`Math.max`: any `NaN` wins, otherwise the chosen argument is
/// returned as-is.
fn extremum(args: &[Value], better: fn(f64, f64) -> bool, empty: f64) -> Value {
    let mut best: Option<(&Value, f64)> = None;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return Value::Float(f64::NAN);
        }
        if best.is_none_or(|(_, b)| better(n, b)) {
            best = Some((arg, n));
        }
    }
    match best {
        Some((value, _)) if value.is_number() => value.clone(),
        Some((_, n)) => Value::Float(n),
        None => Value::Float(empty),
    }
}

/// A literal dotted identifier path compiles to the bare binding; anything
/// else defers to a runtime helper of the same name.
fn compile_path(helper: &str, args: &[String], normalize: fn(&str) -> String) -> String {
    match args
        .first()
        .and_then(|arg| string_literal(arg))
        .map(|path| normalize(&path))
    {
        Some(path) if is_binding_path(&path) => path,
        _ => format!("{}({})", helper, args.join(", ")),
    }
}

/// Words that cannot start a JavaScript member expression as a plain binding.
const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "with", "yield",
];

/// `a.b.c` where every segment is an identifier (`[A-Za-z_$][A-Za-z0-9_$]*`)
/// and the first is not a reserved word.
fn is_binding_path(path: &str) -> bool {
    let mut segments = path.split('.');
    let first_ok = segments
        .next()
        .is_some_and(|first| is_identifier(first) && !RESERVED_WORDS.contains(&first));
    first_ok && segments.all(is_identifier)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn resolve_path(
    resolver: Option<&dyn HostResolver>,
    values: &Values,
    args: &[Value],
    normalize: fn(&str) -> String,
) -> Value {
    let Some(Value::String(raw)) = args.first() else {
        return Value::Null;
    };
    let path = normalize(raw);
    resolver
        .and_then(|r| r.resolve(&path))
        .or_else(|| values.get(raw.as_str()).cloned())
        .unwrap_or(Value::Null)
}

/// `App\Status::ACTIVE` and `App.Status.ACTIVE` name the same binding.
fn normalize_enum_path(path: &str) -> String {
    path.replace("::", ".")
        .replace('\\', ".")
        .trim_start_matches('.')
        .to_string()
}

/// Decodes a compiled double-quoted string literal.
fn string_literal(source: &str) -> Option<String> {
    let inner = source.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next()?),
            '"' => return None,
            _ => out.push(ch),
        }
    }
    Some(out)
}
