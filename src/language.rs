//! The [`ExpressionLanguage`] facade: parse once, cache, then compile or
//! evaluate.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ast::Node;
use crate::cache::{ArrayAdapter, CacheAdapter};
use crate::compiler::Compiler;
use crate::error::{ExpressionError, LogicException};
use crate::evaluator::{EvalError, Evaluator};
use crate::expression::{Expression, ParsedExpression};
use crate::function::{ExpressionFunction, FunctionProvider, FunctionRegistry, HostResolver};
use crate::lexer::tokenize;
use crate::parser::{Flags, NameSpec, Parser};
use crate::value::{Value, Values};

/// Entry point for compiling and evaluating expressions.
///
/// Parsed trees are cached under a key built from the expression and the
/// allowed names, so the same expression with the same names in any order
/// is parsed once.
///
/// ```
/// use exprlang::{ExpressionLanguage, Value, Values};
///
/// let mut language = ExpressionLanguage::new();
/// let mut values = Values::new();
/// values.insert("a".into(), Value::Integer(2));
/// assert_eq!(language.evaluate("a * 3 + 1", &values).unwrap(), Value::Integer(7));
/// assert_eq!(language.compile("a * 3 + 1", &["a".into()]).unwrap(), "((a * 3) + 1)");
/// ```
pub struct ExpressionLanguage {
    cache: Box<dyn CacheAdapter>,
    functions: FunctionRegistry,
}

impl Default for ExpressionLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionLanguage {
    /// In-memory unbounded cache and the built-in functions.
    pub fn new() -> Self {
        Self::with_cache(Box::new(ArrayAdapter::new()))
    }

    pub fn with_cache(cache: Box<dyn CacheAdapter>) -> Self {
        ExpressionLanguage {
            cache,
            functions: FunctionRegistry::with_builtins(None),
        }
    }

    pub fn with_providers<I>(cache: Box<dyn CacheAdapter>, providers: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn FunctionProvider>>,
    {
        let mut language = Self::with_cache(cache);
        for provider in providers {
            for function in provider.functions() {
                language.functions.insert(function);
            }
        }
        language
    }

    /// Resolves `constant()`/`enum()` arguments through `resolver`.
    pub fn with_host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Result<Self, LogicException> {
        if self.functions.is_frozen() {
            return Err(FunctionRegistry::frozen_error());
        }
        self.functions.set_host_resolver(resolver);
        Ok(self)
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Compiles to JavaScript source. `names` are the variables the
    /// expression may reference.
    pub fn compile(&mut self, expression: impl Into<Expression>, names: &[NameSpec]) -> Result<String, ExpressionError> {
        let parsed = self.parse(expression, names, Flags::empty())?;
        let mut compiler = Compiler::new(&self.functions);
        compiler.compile(parsed.nodes());
        Ok(compiler.into_source())
    }

    /// Evaluates against `values`, whose keys are the allowed names.
    pub fn evaluate(&mut self, expression: impl Into<Expression>, values: &Values) -> Result<Value, ExpressionError> {
        let names: Vec<NameSpec> = values.keys().map(|key| NameSpec::from(key.as_str())).collect();
        let parsed = self.parse(expression, &names, Flags::empty())?;
        Ok(self.evaluate_node(parsed.nodes(), values)?)
    }

    fn evaluate_node(&self, node: &Node, values: &Values) -> Result<Value, EvalError> {
        Evaluator::new(&self.functions, values).evaluate(node)
    }

    /// Parses `expression`, going through the cache. A parsed expression is
    /// returned as is.
    pub fn parse(
        &mut self,
        expression: impl Into<Expression>,
        names: &[NameSpec],
        flags: Flags,
    ) -> Result<Arc<ParsedExpression>, ExpressionError> {
        let source = match expression.into() {
            Expression::Parsed(parsed) => return Ok(parsed),
            Expression::Source(source) => source,
        };
        self.functions.freeze();

        let key = cache_key(&source, names, flags);
        let item = self.cache.get_item(&key)?;
        if let Some(parsed) = item.get() {
            debug!(expression = %source, "expression cache hit");
            return Ok(Arc::clone(parsed));
        }
        debug!(expression = %source, "expression cache miss");

        let stream = tokenize(&source)?;
        let nodes = Parser::new(&self.functions).parse(stream, names, flags)?;
        let parsed = Arc::new(ParsedExpression::new(source, nodes));

        match self.cache.save(item.set(Arc::clone(&parsed))) {
            Ok(true) => {}
            Ok(false) => warn!(key = %key, "cache refused parsed expression"),
            Err(err) => warn!(key = %key, error = %err, "failed to cache parsed expression"),
        }
        Ok(parsed)
    }

    /// Checks syntax without caching. `None` for `names` allows any variable.
    pub fn lint(
        &mut self,
        expression: impl Into<Expression>,
        names: Option<&[NameSpec]>,
        flags: Flags,
    ) -> Result<(), ExpressionError> {
        let source = match expression.into() {
            Expression::Parsed(_) => return Ok(()),
            Expression::Source(source) => source,
        };
        self.functions.freeze();

        let stream = tokenize(&source)?;
        Parser::new(&self.functions).lint(stream, names, flags)?;
        Ok(())
    }

    /// Registers a function from its two halves.
    ///
    /// Fails once the language has parsed, compiled or evaluated anything.
    pub fn register<C, E>(&mut self, name: impl Into<String>, compiler: C, evaluator: E) -> Result<(), LogicException>
    where
        C: Fn(&[String]) -> String + Send + Sync + 'static,
        E: Fn(&Values, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.add_function(ExpressionFunction::new(name, compiler, evaluator))
    }

    pub fn add_function(&mut self, function: ExpressionFunction) -> Result<(), LogicException> {
        self.functions.register(function)
    }

    pub fn register_provider(&mut self, provider: &dyn FunctionProvider) -> Result<(), LogicException> {
        for function in provider.functions() {
            self.add_function(function)?;
        }
        Ok(())
    }
}

/// The cache key for `expression` parsed with `names`.
///
/// Names are ordered by the variable they introduce, so permutations share a
/// key. Non-default flags are appended, keeping lenient parses apart from
/// strict ones.
pub fn cache_key(expression: &str, names: &[NameSpec], flags: Flags) -> String {
    let mut sorted: Vec<&NameSpec> = names.iter().collect();
    sorted.sort_by(|a, b| {
        a.sort_key()
            .cmp(b.sort_key())
            .then_with(|| a.to_string().cmp(&b.to_string()))
    });
    let items: Vec<String> = sorted.iter().map(|name| name.to_string()).collect();

    let mut raw = format!("{}//{}", expression, items.join("|"));
    if !flags.is_empty() {
        let _ = write!(raw, "//{}", flags.bits());
    }
    encode_component(&raw)
}

/// Percent-encodes everything but ASCII letters, digits and `-_.~`.
fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => encoded.push(byte as char),
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}
