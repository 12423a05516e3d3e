use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::ast::{ArrayKind, BinaryOp, GetAttrKind, Node, UnaryOp};
use crate::function::FunctionRegistry;
use crate::value::{Map, Value, Values};

/// Most elements a `..` range may produce.
pub const MAX_RANGE_LENGTH: usize = 1_000_000;

/// Errors that can occur while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operand of the wrong type for an operator
    #[error("{0}")]
    TypeError(String),

    #[error("Unable to get property \"{property}\" on a non-object: {type_name}")]
    PropertyOnNonObject {
        property: String,
        type_name: &'static str,
    },

    #[error("Unable to call method \"{method}\" on a non-object: {type_name}")]
    MethodOnNonObject {
        method: String,
        type_name: &'static str,
    },

    #[error("Method \"{0}\" is undefined on object.")]
    UndefinedMethod(String),

    #[error("Method \"{0}\" is not a function on object.")]
    NotCallable(String),

    #[error("Unable to get an item on a non-array: {0}")]
    ItemOnNonArray(&'static str),

    /// Call to an unregistered function that the parser was told to accept
    #[error("The function \"{0}\" does not exist")]
    UndefinedFunction(String),

    #[error("Range of {length} elements exceeds the limit of {max}")]
    RangeTooLarge { length: u128, max: usize },

    #[error("Invalid regular expression \"{pattern}\": {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Failure reported by a host function
    #[error("{0}")]
    Host(String),
}

impl EvalError {
    pub fn host(message: impl Into<String>) -> Self {
        EvalError::Host(message.into())
    }
}

/// Whether a null or non-object inside an access chain is tolerated.
///
/// The left side of `??` is evaluated `Soft`: its access chain yields `null`
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NullSafeScope {
    Strict,
    Soft,
}

/// Outcome of one step of an access chain.
enum Access {
    Value(Value),
    /// A `?.` met `null`; the rest of the chain is skipped.
    ShortCircuited,
}

/// Evaluates `node` against `values`.
///
/// ```
/// use exprlang::{FunctionRegistry, Node, BinaryOp, Value, Values, evaluate};
///
/// let node = Node::binary(BinaryOp::Multiply, Node::name("n"), Node::constant(2i64));
/// let mut values = Values::new();
/// values.insert("n".into(), Value::Integer(21));
/// let registry = FunctionRegistry::new();
/// assert_eq!(evaluate(&node, &registry, &values).unwrap(), Value::Integer(42));
/// ```
pub fn evaluate(node: &Node, functions: &FunctionRegistry, values: &Values) -> Result<Value, EvalError> {
    Evaluator::new(functions, values).evaluate(node)
}

/// Tree-walking evaluator.
///
/// Holds only shared references, so one tree may be evaluated concurrently
/// against different contexts.
pub struct Evaluator<'a> {
    functions: &'a FunctionRegistry,
    values: &'a Values,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: &'a FunctionRegistry, values: &'a Values) -> Self {
        Evaluator { functions, values }
    }

    pub fn evaluate(&self, node: &Node) -> Result<Value, EvalError> {
        self.eval(node, NullSafeScope::Strict)
    }

    fn eval(&self, node: &Node, scope: NullSafeScope) -> Result<Value, EvalError> {
        match node {
            Node::Constant { value, .. } => Ok(value.clone()),

            // a name missing from the context reads as null
            Node::Name { name } => Ok(self.values.get(name).cloned().unwrap_or(Value::Null)),

            Node::NullCoalescedName { .. } => Ok(Value::Null),

            Node::Unary { operator, node } => {
                let value = self.eval(node, NullSafeScope::Strict)?;
                apply_unary(*operator, &value)
            }

            Node::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, NullSafeScope::Strict)?;
                // `and`/`or` yield the deciding operand
                if operator.short_circuits() {
                    let decided = match operator {
                        BinaryOp::And => !left.is_truthy(),
                        _ => left.is_truthy(),
                    };
                    return if decided {
                        Ok(left)
                    } else {
                        self.eval(right, NullSafeScope::Strict)
                    };
                }
                let right = self.eval(right, NullSafeScope::Strict)?;
                apply_binary(*operator, &left, &right)
            }

            Node::Conditional {
                expr1,
                expr2,
                expr3,
            } => {
                if self.eval(expr1, NullSafeScope::Strict)?.is_truthy() {
                    self.eval(expr2, NullSafeScope::Strict)
                } else {
                    self.eval(expr3, NullSafeScope::Strict)
                }
            }

            Node::NullCoalesce { expr1, expr2 } => {
                let value = self.eval(expr1, NullSafeScope::Soft)?;
                if value.is_null() {
                    self.eval(expr2, NullSafeScope::Strict)
                } else {
                    Ok(value)
                }
            }

            Node::GetAttr { .. } => match self.eval_access(node, scope)? {
                Access::Value(value) => Ok(value),
                Access::ShortCircuited => Ok(Value::Null),
            },

            Node::Array(array) => match array.kind() {
                ArrayKind::Array => array
                    .entries()
                    .iter()
                    .map(|(_, value)| self.eval(value, NullSafeScope::Strict))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                ArrayKind::Object => {
                    let mut map = Map::new();
                    for (key, value) in array.entries() {
                        let key = self.eval(key, NullSafeScope::Strict)?.to_js_string();
                        let value = self.eval(value, NullSafeScope::Strict)?;
                        // repeated keys: the last value wins
                        map.insert(key, value);
                    }
                    Ok(Value::Object(map))
                }
            },

            Node::Function { name, arguments } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| EvalError::UndefinedFunction(name.clone()))?;
                let args = self.eval_arguments(&arguments.nodes)?;
                function.evaluate(self.values, &args)
            }
        }
    }

    fn eval_arguments(&self, nodes: &[Node]) -> Result<Vec<Value>, EvalError> {
        nodes
            .iter()
            .map(|node| self.eval(node, NullSafeScope::Strict))
            .collect()
    }

    /// Walks an access chain. A short circuit anywhere below propagates up
    /// through every later step.
    fn eval_access(&self, node: &Node, scope: NullSafeScope) -> Result<Access, EvalError> {
        let Node::GetAttr {
            node: object,
            attribute,
            arguments,
            kind,
            null_safe,
        } = node
        else {
            return self.eval(node, scope).map(Access::Value);
        };

        let object = match self.eval_access(object, scope)? {
            Access::Value(value) => value,
            Access::ShortCircuited => return Ok(Access::ShortCircuited),
        };

        if *null_safe && object.is_null() {
            return Ok(Access::ShortCircuited);
        }

        let soft = scope == NullSafeScope::Soft;

        let value = match kind {
            GetAttrKind::Property => {
                let property = member_name(attribute);
                match &object {
                    Value::Object(map) => map.get(&property).cloned().unwrap_or(Value::Null),
                    Value::Array(items) if property == "length" => Value::Integer(items.len() as i64),
                    Value::Array(_) => Value::Null,
                    _ if soft => Value::Null,
                    other => {
                        return Err(EvalError::PropertyOnNonObject {
                            property,
                            type_name: other.type_name(),
                        });
                    }
                }
            }
            GetAttrKind::Method => {
                let method = member_name(attribute);
                match &object {
                    Value::Object(map) => match map.get(&method) {
                        Some(Value::Function(callable)) => {
                            let args = self.eval_arguments(&arguments.nodes)?;
                            callable.call(&args)?
                        }
                        Some(_) => return Err(EvalError::NotCallable(method)),
                        None => return Err(EvalError::UndefinedMethod(method)),
                    },
                    _ if soft => Value::Null,
                    other => {
                        return Err(EvalError::MethodOnNonObject {
                            method,
                            type_name: other.type_name(),
                        });
                    }
                }
            }
            GetAttrKind::Array => {
                let key = self.eval(attribute, NullSafeScope::Strict)?;
                match &object {
                    Value::Array(items) => array_index(&key)
                        .and_then(|i| items.get(i))
                        .cloned()
                        .unwrap_or(Value::Null),
                    Value::Object(map) => map.get(&key.to_js_string()).cloned().unwrap_or(Value::Null),
                    _ if soft => Value::Null,
                    other => return Err(EvalError::ItemOnNonArray(other.type_name())),
                }
            }
        };

        Ok(Access::Value(value))
    }
}

fn member_name(attribute: &Node) -> String {
    match attribute {
        Node::Constant { value, .. } => value.to_js_string(),
        other => other.dump(),
    }
}

/// Array index from a number or a numeric string, as JavaScript accepts both.
fn array_index(key: &Value) -> Option<usize> {
    let n = match key {
        Value::String(s) => s.parse::<i64>().ok()?,
        other => other.as_int()?,
    };
    usize::try_from(n).ok()
}

fn apply_unary(operator: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match operator {
        UnaryOp::Not | UnaryOp::Bang => Ok(Value::Boolean(!value.is_truthy())),
        UnaryOp::Negate => match value {
            Value::Integer(n) => Ok(n
                .checked_neg()
                .map_or(Value::Float(-(*n as f64)), Value::Integer)),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(EvalError::TypeError(format!(
                "Unsupported operand type for unary -: {}",
                other.type_name()
            ))),
        },
        UnaryOp::Plus => match value {
            Value::Integer(_) | Value::Float(_) => Ok(value.clone()),
            other => Err(EvalError::TypeError(format!(
                "Unsupported operand type for unary +: {}",
                other.type_name()
            ))),
        },
    }
}

/// Applies an operator whose operands are both evaluated.
pub(crate) fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    match op {
        Or => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
        And => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        Xor => Ok(Value::Boolean(left.is_truthy() != right.is_truthy())),

        BitOr => Ok(Value::Integer((left.to_int32() | right.to_int32()) as i64)),
        BitXor => Ok(Value::Integer((left.to_int32() ^ right.to_int32()) as i64)),
        BitAnd => Ok(Value::Integer((left.to_int32() & right.to_int32()) as i64)),

        Equal => Ok(Value::Boolean(left.loose_equals(right))),
        NotEqual => Ok(Value::Boolean(!left.loose_equals(right))),
        Identical => Ok(Value::Boolean(left.strict_equals(right))),
        NotIdentical => Ok(Value::Boolean(!left.strict_equals(right))),

        Less => Ok(Value::Boolean(compare(left, right) == Some(Ordering::Less))),
        Greater => Ok(Value::Boolean(compare(left, right) == Some(Ordering::Greater))),
        LessEqual => Ok(Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        GreaterEqual => Ok(Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),

        In => contains_element(left, right, "in").map(Value::Boolean),
        NotIn => contains_element(left, right, "not in").map(|found| Value::Boolean(!found)),

        Matches => {
            if left.is_null() {
                return Ok(Value::Boolean(false));
            }
            let Value::String(pattern) = right else {
                return Err(EvalError::TypeError(format!(
                    "Unsupported right operand for matches: {}",
                    right.type_name()
                )));
            };
            let regex = compile_regex(pattern)?;
            Ok(Value::Boolean(regex.is_match(&left.to_js_string())))
        }

        Contains | StartsWith | EndsWith => {
            let haystack = left.to_js_string().to_lowercase();
            let needle = right.to_js_string().to_lowercase();
            Ok(Value::Boolean(match op {
                Contains => haystack.contains(&needle),
                StartsWith => haystack.starts_with(&needle),
                _ => haystack.ends_with(&needle),
            }))
        }

        Range => {
            let (Some(from), Some(to)) = (left.as_int(), right.as_int()) else {
                return Err(EvalError::TypeError(format!(
                    "Range bounds must be integers, got {} and {}",
                    left.type_name(),
                    right.type_name()
                )));
            };
            let length = (i128::from(to) - i128::from(from)).unsigned_abs() + 1;
            if length > MAX_RANGE_LENGTH as u128 {
                return Err(EvalError::RangeTooLarge {
                    length,
                    max: MAX_RANGE_LENGTH,
                });
            }
            let items: Vec<Value> = if from <= to {
                (from..=to).map(Value::Integer).collect()
            } else {
                (to..=from).rev().map(Value::Integer).collect()
            };
            Ok(Value::Array(items))
        }

        Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
                "{}{}",
                left.to_js_string(),
                right.to_js_string()
            ))),
            _ => arithmetic("+", left, right, i64::checked_add, |a, b| a + b),
        },
        Subtract => arithmetic("-", left, right, i64::checked_sub, |a, b| a - b),
        Multiply => arithmetic("*", left, right, i64::checked_mul, |a, b| a * b),
        Divide => arithmetic(
            "/",
            left,
            right,
            |a, b| {
                if b != 0 && a.checked_rem(b) == Some(0) {
                    a.checked_div(b)
                } else {
                    None
                }
            },
            |a, b| a / b,
        ),
        Modulo => arithmetic("%", left, right, i64::checked_rem, |a, b| a % b),
        Power => arithmetic(
            "**",
            left,
            right,
            |a, b| u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)),
            f64::powf,
        ),

        Concat => Ok(Value::String(format!(
            "{}{}",
            left.to_js_string(),
            right.to_js_string()
        ))),
    }
}

/// Integer arithmetic when both sides are integers and the result fits;
/// float arithmetic otherwise.
fn arithmetic(
    symbol: &str,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(int_op(*a, *b)
            .map(Value::Integer)
            .unwrap_or_else(|| Value::Float(float_op(*a as f64, *b as f64)))),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            Ok(Value::Float(float_op(left.to_number(), right.to_number())))
        }
        _ => Err(EvalError::TypeError(format!(
            "Unsupported operand types for {}: {} and {}",
            symbol,
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Two strings compare by code point; anything else numerically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn contains_element(needle: &Value, haystack: &Value, operator: &str) -> Result<bool, EvalError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| item.strict_equals(needle))),
        other => Err(EvalError::TypeError(format!(
            "Unsupported right operand for {}: {}",
            operator,
            other.type_name()
        ))),
    }
}

/// Builds a regex from a `/pattern/flags` literal.
///
/// `i`, `m`, `s` and `x` map to regex flags; `u`, `g` and `y` are accepted
/// and have no effect on a single match test.
pub fn compile_regex(literal: &str) -> Result<Regex, EvalError> {
    let invalid = |reason: &str| EvalError::InvalidRegex {
        pattern: literal.to_string(),
        reason: reason.to_string(),
    };

    let body = literal
        .strip_prefix('/')
        .ok_or_else(|| invalid("expected a /pattern/flags literal"))?;
    let end = body
        .rfind('/')
        .ok_or_else(|| invalid("missing closing delimiter"))?;
    let (pattern, flags) = (&body[..end], &body[end + 1..]);

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'u' | 'g' | 'y' => &mut builder,
            other => return Err(invalid(&format!("unknown flag '{}'", other))),
        };
    }
    builder.build().map_err(|e| invalid(&e.to_string()))
}
