use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::evaluator::EvalError;

/// Ordered key/value map used for object values and evaluation contexts.
pub type Map = IndexMap<String, Value>;

/// The variable context an expression is evaluated against.
pub type Values = IndexMap<String, Value>;

type HostFn = dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync;

/// A host function reachable from an expression, either as an object method
/// (`foo.bar()`) or through [`ExpressionFunction::from_host`](crate::ExpressionFunction::from_host).
///
/// Two callables are equal only when they wrap the same allocation.
#[derive(Clone)]
pub struct Callable(Arc<HostFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Callable(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.0)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<function>")
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A runtime value flowing through evaluation.
///
/// Integers and floats are both "numbers": they compare equal numerically and
/// render the same way when the float has no fractional part, so that the
/// evaluator and the generated JavaScript agree on observable results.
///
/// # Examples
///
/// ```
/// use exprlang::Value;
///
/// assert!(Value::Integer(1).strict_equals(&Value::Float(1.0)));
/// assert_eq!(Value::Float(1.0).to_js_string(), "1");
/// assert!(!Value::String(String::new()).is_truthy());
/// assert!(Value::Array(vec![]).is_truthy());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,

    Boolean(bool),

    /// Integer number (kept apart from floats until an operation needs one)
    Integer(i64),

    Float(f64),

    String(String),

    Array(Vec<Value>),

    /// Object with string keys, in insertion order
    Object(Map),

    /// Host function, callable as a method
    Function(Callable),
}

impl Value {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Value::Function(Callable::new(f))
    }

    /// Truthiness used by logic operators and the ternary.
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Integer(n) => *n != 0,
            Float(n) => *n != 0.0 && !n.is_nan(),
            String(s) => !s.is_empty(),
            Array(_) | Object(_) | Function(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Get as float, numbers only
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer when the value is integral
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Numeric conversion used by relational and bitwise operators.
    ///
    /// `null` is 0, booleans are 0/1, strings are parsed after trimming
    /// (the empty string is 0, see [`parse_number`]). Anything else is `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Integer(n) => *n as f64,
            Value::Float(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// 32-bit integer conversion applied by `|`, `^` and `&`.
    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
        wrapped as u32 as i32
    }

    /// String form used by `~`, the string predicates and `matches`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
        }
    }

    /// Name reported in runtime errors, following JavaScript's `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// `===`: same kind and same value. Integers and floats share the number kind.
    pub fn strict_equals(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Integer(_) | Float(_), Integer(_) | Float(_)) => {
                self.to_number() == other.to_number()
            }
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (Object(a), Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.strict_equals(w)))
            }
            (Function(a), Function(b)) => a == b,
            _ => false,
        }
    }

    /// `==`: numbers, numeric strings and booleans compare numerically.
    pub fn loose_equals(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Null, _) | (_, Null) => false,
            (String(a), String(b)) => a == b,
            (Integer(_) | Float(_) | Boolean(_) | String(_), Integer(_) | Float(_) | Boolean(_) | String(_)) => {
                self.to_number() == other.to_number()
            }
            (Array(a), Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_equals(y))
            }
            (Object(a), Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_equals(w)))
            }
            _ => self.strict_equals(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

/// String to number as JavaScript's `Number()` does it: decimal literals,
/// `Infinity` with an optional sign, and `0x`/`0o`/`0b` integers. Everything
/// else is `NaN`.
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => return 0.0,
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return f64::NAN;
            }
            return digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
        }
    }

    // Rust also accepts `inf`, `nan` and `infinity`
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Renders a number the way JavaScript's `Number.prototype.toString` does:
/// whole numbers lose their `.0`, magnitudes from 1e21 up or below 1e-6 use
/// exponent notation (`1e+21`, `1.5e-7`), and the non-finite values are
/// spelled `NaN`, `Infinity` and `-Infinity`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        // -0 prints as 0
        return format!("{}", n as i128);
    }

    let scientific = format!("{:e}", n);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    match exponent.parse::<i32>() {
        Ok(exp) if exp >= 21 => format!("{}e+{}", mantissa, exp),
        Ok(exp) if exp <= -7 => format!("{}e{}", mantissa, exp),
        _ => n.to_string(),
    }
}
