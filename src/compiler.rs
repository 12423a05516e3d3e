use tracing::trace;

use crate::ast::{ArrayKind, BinaryOp, GetAttrKind, Node};
use crate::function::FunctionRegistry;
use crate::value::{Value, format_number};

/// Generates JavaScript source from a node tree.
///
/// Operators without a direct JavaScript equivalent compile to calls of
/// helpers the host is expected to provide:
///
/// ```text
/// a ** b          Math.pow(a, b)
/// a .. b          range(a, b)
/// a in b          includes(a, b)
/// a not in b      !includes(a, b)
/// a matches b     toRegExp(b).test(a), skipped when a is null
/// ```
///
/// # Examples
///
/// ```
/// use exprlang::{Compiler, FunctionRegistry, Node, BinaryOp};
///
/// let registry = FunctionRegistry::new();
/// let mut compiler = Compiler::new(&registry);
/// let node = Node::binary(BinaryOp::And, Node::name("a"), Node::name("b"));
/// assert_eq!(compiler.compile(&node).source(), "(a && b)");
/// ```
pub struct Compiler<'a> {
    functions: &'a FunctionRegistry,
    source: String,
}

impl<'a> Compiler<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Compiler {
            functions,
            source: String::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        trace!(len = self.source.len(), "compiled expression");
        self.source
    }

    pub fn reset(&mut self) -> &mut Self {
        self.source.clear();
        self
    }

    pub fn compile(&mut self, node: &Node) -> &mut Self {
        self.compile_node(node, false);
        self
    }

    /// Compiles `node` on its own, leaving the current source untouched.
    pub fn subcompile(&mut self, node: &Node) -> String {
        let outer = std::mem::take(&mut self.source);
        self.compile_node(node, false);
        std::mem::replace(&mut self.source, outer)
    }

    pub fn raw(&mut self, text: &str) -> &mut Self {
        self.source.push_str(text);
        self
    }

    /// Appends a double-quoted string literal.
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.source.push('"');
        for ch in value.chars() {
            match ch {
                '"' => self.source.push_str("\\\""),
                '\\' => self.source.push_str("\\\\"),
                '\0' => self.source.push_str("\\0"),
                '\t' => self.source.push_str("\\t"),
                '\n' => self.source.push_str("\\n"),
                '\r' => self.source.push_str("\\r"),
                _ => self.source.push(ch),
            }
        }
        self.source.push('"');
        self
    }

    /// Appends a literal for `value`. Identifiers are written verbatim.
    pub fn repr(&mut self, value: &Value, is_identifier: bool) -> &mut Self {
        if is_identifier {
            return self.raw(&value.to_js_string());
        }
        match value {
            Value::Null | Value::Function(_) => self.raw("null"),
            Value::Boolean(b) => self.raw(if *b { "true" } else { "false" }),
            Value::Integer(n) => self.raw(&n.to_string()),
            Value::Float(n) => self.raw(&format_number(*n)),
            Value::String(s) => self.string(s),
            Value::Array(items) => {
                self.raw("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.raw(", ");
                    }
                    self.repr(item, false);
                }
                self.raw("]")
            }
            Value::Object(map) => {
                self.raw("{");
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        self.raw(", ");
                    }
                    self.string(key).raw(": ").repr(item, false);
                }
                self.raw("}")
            }
        }
    }

    /// `null_safe_chain` is set while compiling the left side of `??`, whose
    /// access chain is emitted with `?.`.
    fn compile_node(&mut self, node: &Node, null_safe_chain: bool) {
        match node {
            Node::Constant {
                value,
                is_identifier,
            } => {
                self.repr(value, *is_identifier);
            }

            Node::Name { name } => {
                self.raw(name);
            }

            Node::NullCoalescedName { name } => {
                self.raw(name).raw(" ?? null");
            }

            Node::Unary { operator, node } => {
                self.raw("(").raw(operator.js());
                self.compile_node(node, false);
                self.raw(")");
            }

            Node::Binary {
                operator,
                left,
                right,
            } => self.compile_binary(*operator, left, right),

            Node::Conditional {
                expr1,
                expr2,
                expr3,
            } => {
                self.raw("((").compile(expr1).raw(") ? (").compile(expr2).raw(") : (");
                self.compile(expr3).raw("))");
            }

            Node::NullCoalesce { expr1, expr2 } => {
                self.raw("((");
                self.compile_node(expr1, true);
                self.raw(") ?? (").compile(expr2).raw("))");
            }

            Node::GetAttr {
                node: object,
                attribute,
                arguments,
                kind,
                null_safe,
            } => {
                let chain = null_safe_chain && matches!(object.as_ref(), Node::GetAttr { .. } | Node::Name { .. });
                self.compile_node(object, null_safe_chain);
                let optional = *null_safe || chain;
                match kind {
                    GetAttrKind::Property | GetAttrKind::Method => {
                        self.raw(if optional { "?." } else { "." });
                        self.compile(attribute);
                        if *kind == GetAttrKind::Method {
                            self.raw("(");
                            self.compile_list(&arguments.nodes);
                            self.raw(")");
                        }
                    }
                    GetAttrKind::Array => {
                        self.raw(if optional { "?.[" } else { "[" });
                        self.compile(attribute).raw("]");
                    }
                }
            }

            Node::Array(array) => match array.kind() {
                ArrayKind::Array => {
                    self.raw("[");
                    for (i, (_, value)) in array.entries().iter().enumerate() {
                        if i > 0 {
                            self.raw(", ");
                        }
                        self.compile(value);
                    }
                    self.raw("]");
                }
                ArrayKind::Object => {
                    self.raw("{");
                    for (i, (key, value)) in array.entries().iter().enumerate() {
                        if i > 0 {
                            self.raw(", ");
                        }
                        match key {
                            Node::Constant { .. } => {
                                self.compile(key);
                            }
                            // computed key
                            _ => {
                                self.raw("[").compile(key).raw("]");
                            }
                        }
                        self.raw(": ").compile(value);
                    }
                    self.raw("}");
                }
            },

            Node::Function { name, arguments } => {
                let args: Vec<String> = arguments.nodes.iter().map(|arg| self.subcompile(arg)).collect();
                let compiled = match self.functions.get(name) {
                    Some(function) => function.compile(&args),
                    None => format!("{}({})", name, args.join(", ")),
                };
                self.raw(&compiled);
            }
        }
    }

    fn compile_list(&mut self, nodes: &[Node]) {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.raw(", ");
            }
            self.compile(node);
        }
    }

    fn compile_binary(&mut self, operator: BinaryOp, left: &Node, right: &Node) {
        use BinaryOp::*;

        if let Some(js) = operator.js_infix() {
            self.raw("(").compile(left).raw(" ").raw(js).raw(" ").compile(right).raw(")");
            return;
        }

        match operator {
            Xor => {
                self.raw("(!(").compile(left).raw(") !== !(").compile(right).raw("))");
            }
            Concat => {
                self.raw("(\"\" + ").compile(left).raw(" + ").compile(right).raw(")");
            }
            Power | Range | In | NotIn => {
                let helper = match operator {
                    Power => "Math.pow",
                    Range => "range",
                    In => "includes",
                    _ => "!includes",
                };
                self.raw(helper).raw("(").compile(left).raw(", ").compile(right).raw(")");
            }
            Matches => {
                // the subject is bound once; a null subject never matches
                self.raw("((subject, re) => subject != null && re.test(subject))(");
                self.compile(left).raw(", ");
                match right {
                    Node::Constant {
                        value: Value::String(pattern),
                        ..
                    } => match split_regex_literal(pattern) {
                        Some((body, flags)) => {
                            self.raw("new RegExp(").string(body).raw(", ").string(flags).raw(")");
                        }
                        None => {
                            self.raw("toRegExp(").string(pattern).raw(")");
                        }
                    },
                    _ => {
                        self.raw("toRegExp(").compile(right).raw(")");
                    }
                }
                self.raw(")");
            }
            Contains | StartsWith | EndsWith => {
                let method = match operator {
                    Contains => "includes",
                    StartsWith => "startsWith",
                    _ => "endsWith",
                };
                self.raw("String(").compile(left).raw(").toLowerCase().").raw(method);
                self.raw("(String(").compile(right).raw(").toLowerCase())");
            }
            _ => {}
        }
    }
}

/// Splits a `/body/flags` literal whose flags JavaScript accepts.
fn split_regex_literal(pattern: &str) -> Option<(&str, &str)> {
    let body = pattern.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let flags = &body[end + 1..];
    (end > 0 && flags.chars().all(|c| "imsugy".contains(c))).then_some((&body[..end], flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_escaping() {
        let registry = FunctionRegistry::new();
        let mut compiler = Compiler::new(&registry);
        compiler.string("a\"b\\c\nd");
        assert_eq!(compiler.source(), r#""a\"b\\c\nd""#);
    }

    #[test]
    fn test_subcompile_keeps_outer_source() {
        let registry = FunctionRegistry::new();
        let mut compiler = Compiler::new(&registry);
        compiler.raw("outer ");
        let inner = compiler.subcompile(&Node::constant(1i64));
        assert_eq!(inner, "1");
        assert_eq!(compiler.source(), "outer ");
        assert_eq!(compiler.reset().source(), "");
    }

    #[test]
    fn test_repr_nested() {
        let registry = FunctionRegistry::new();
        let mut compiler = Compiler::new(&registry);
        let mut map = crate::value::Map::new();
        map.insert("a".into(), Value::Array(vec![Value::Integer(1), Value::Null]));
        compiler.repr(&Value::Object(map), false);
        assert_eq!(compiler.source(), r#"{"a": [1, null]}"#);
    }

    #[test]
    fn test_regex_literal_split() {
        let test_cases = vec![
            ("/^a+$/i", Some(("^a+$", "i"))),
            ("/a/b/", Some(("a/b", ""))),
            ("abc", None),
            ("//", None),
            ("/a/x", None),
        ];

        for (input, expected) in test_cases {
            assert_eq!(split_regex_literal(input), expected, "Failed for input: {}", input);
        }
    }
}
