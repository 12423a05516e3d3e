use std::fmt;

use crate::ast::{BinaryOp, UnaryOp};
use crate::value::{Value, format_number};

/// How a [`Node::GetAttr`] reaches into its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetAttrKind {
    /// `foo.bar`
    Property,
    /// `foo.bar(args)`
    Method,
    /// `foo[expr]`
    Array,
}

/// Whether an [`ArrayNode`] is a list literal or a hash literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Array,
    Object,
}

/// Literal `[...]` or `{...}`.
///
/// Every element is stored as a key/value pair. Positional elements get an
/// implicit integer key; supplying any explicit key turns the literal into
/// an object.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    entries: Vec<(Node, Node)>,
    kind: ArrayKind,
    next_index: i64,
}

impl Default for ArrayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayNode {
    pub fn new() -> Self {
        ArrayNode {
            entries: Vec::new(),
            kind: ArrayKind::Array,
            next_index: 0,
        }
    }

    /// An empty hash literal, `{}`.
    pub fn object() -> Self {
        ArrayNode {
            kind: ArrayKind::Object,
            ..Self::new()
        }
    }

    pub fn add_element(&mut self, value: Node, key: Option<Node>) {
        let key = match key {
            Some(key) => {
                self.kind = ArrayKind::Object;
                key
            }
            None => {
                let key = Node::constant(self.next_index);
                self.next_index += 1;
                key
            }
        };
        self.entries.push((key, value));
    }

    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    pub fn entries(&self) -> &[(Node, Node)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Positional argument list of a method or function call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentsNode {
    pub nodes: Vec<Node>,
}

impl ArgumentsNode {
    pub fn new(nodes: Vec<Node>) -> Self {
        ArgumentsNode { nodes }
    }

    pub fn add_element(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One element of a parsed expression tree.
///
/// Trees are built once by the [`Parser`](crate::Parser) and never mutated
/// afterwards, so a cached tree can be evaluated and compiled any number of
/// times, from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal value. `is_identifier` marks a property or method name that
    /// compiles verbatim instead of as a quoted string.
    Constant { value: Value, is_identifier: bool },

    /// Variable read from the evaluation context
    Name { name: String },

    /// Unknown variable tolerated because it is the left side of `??`
    NullCoalescedName { name: String },

    Unary { operator: UnaryOp, node: Box<Node> },

    Binary {
        operator: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// `expr1 ? expr2 : expr3`, including the `?:` and `? x` shorthands
    Conditional {
        expr1: Box<Node>,
        expr2: Box<Node>,
        expr3: Box<Node>,
    },

    /// `expr1 ?? expr2`
    NullCoalesce { expr1: Box<Node>, expr2: Box<Node> },

    /// Property, method or index access on `node`. `null_safe` is set for the
    /// `?.` spellings.
    GetAttr {
        node: Box<Node>,
        attribute: Box<Node>,
        arguments: ArgumentsNode,
        kind: GetAttrKind,
        null_safe: bool,
    },

    Array(ArrayNode),

    /// Call to a registered function
    Function { name: String, arguments: ArgumentsNode },
}

impl Node {
    pub fn constant(value: impl Into<Value>) -> Self {
        Node::Constant {
            value: value.into(),
            is_identifier: false,
        }
    }

    pub fn null() -> Self {
        Node::Constant {
            value: Value::Null,
            is_identifier: false,
        }
    }

    /// Property or method name used as the attribute of a [`Node::GetAttr`].
    pub fn identifier(name: impl Into<String>) -> Self {
        Node::Constant {
            value: Value::String(name.into()),
            is_identifier: true,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Node::Name { name: name.into() }
    }

    pub fn unary(operator: UnaryOp, node: Node) -> Self {
        Node::Unary {
            operator,
            node: Box::new(node),
        }
    }

    pub fn binary(operator: BinaryOp, left: Node, right: Node) -> Self {
        Node::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn conditional(expr1: Node, expr2: Node, expr3: Node) -> Self {
        Node::Conditional {
            expr1: Box::new(expr1),
            expr2: Box::new(expr2),
            expr3: Box::new(expr3),
        }
    }

    pub fn null_coalesce(expr1: Node, expr2: Node) -> Self {
        Node::NullCoalesce {
            expr1: Box::new(expr1),
            expr2: Box::new(expr2),
        }
    }

    pub fn get_attr(node: Node, attribute: Node, arguments: ArgumentsNode, kind: GetAttrKind) -> Self {
        Node::GetAttr {
            node: Box::new(node),
            attribute: Box::new(attribute),
            arguments,
            kind,
            null_safe: false,
        }
    }

    pub fn null_safe_get_attr(
        node: Node,
        attribute: Node,
        arguments: ArgumentsNode,
        kind: GetAttrKind,
    ) -> Self {
        Node::GetAttr {
            node: Box::new(node),
            attribute: Box::new(attribute),
            arguments,
            kind,
            null_safe: true,
        }
    }

    pub fn function(name: impl Into<String>, arguments: ArgumentsNode) -> Self {
        Node::Function {
            name: name.into(),
            arguments,
        }
    }

    /// Variant tag, as shown in the debug tree.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Node::Constant { .. } => "ConstantNode",
            Node::Name { .. } => "NameNode",
            Node::NullCoalescedName { .. } => "NullCoalescedNameNode",
            Node::Unary { .. } => "UnaryNode",
            Node::Binary { .. } => "BinaryNode",
            Node::Conditional { .. } => "ConditionalNode",
            Node::NullCoalesce { .. } => "NullCoalesceNode",
            Node::GetAttr { .. } => "GetAttrNode",
            Node::Array(_) => "ArrayNode",
            Node::Function { .. } => "FunctionNode",
        }
    }

    /// Reconstructs expression source for this tree.
    ///
    /// Binary and unary nodes are fully parenthesised, so the output parses
    /// back to an equivalent tree.
    ///
    /// ```
    /// use exprlang::{BinaryOp, Node};
    ///
    /// let node = Node::binary(BinaryOp::Add, Node::constant(1i64), Node::name("a"));
    /// assert_eq!(node.dump(), "(1 + a)");
    /// ```
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out);
        out
    }

    fn dump_into(&self, out: &mut String) {
        match self {
            Node::Constant {
                value,
                is_identifier,
            } => {
                if *is_identifier {
                    out.push_str(&value.to_js_string());
                } else {
                    dump_value(value, out);
                }
            }
            Node::Name { name } => out.push_str(name),
            Node::NullCoalescedName { name } => {
                out.push_str(name);
                out.push_str(" ?? null");
            }
            Node::Unary { operator, node } => {
                out.push('(');
                out.push_str(operator.as_str());
                out.push(' ');
                node.dump_into(out);
                out.push(')');
            }
            Node::Binary {
                operator,
                left,
                right,
            } => {
                out.push('(');
                left.dump_into(out);
                out.push(' ');
                out.push_str(operator.as_str());
                out.push(' ');
                right.dump_into(out);
                out.push(')');
            }
            Node::Conditional {
                expr1,
                expr2,
                expr3,
            } => {
                out.push('(');
                expr1.dump_into(out);
                out.push_str(" ? ");
                expr2.dump_into(out);
                out.push_str(" : ");
                expr3.dump_into(out);
                out.push(')');
            }
            Node::NullCoalesce { expr1, expr2 } => {
                out.push('(');
                expr1.dump_into(out);
                out.push_str(") ?? (");
                expr2.dump_into(out);
                out.push(')');
            }
            Node::GetAttr {
                node,
                attribute,
                arguments,
                kind,
                null_safe,
            } => {
                node.dump_into(out);
                match kind {
                    GetAttrKind::Property | GetAttrKind::Method => {
                        out.push_str(if *null_safe { "?." } else { "." });
                        attribute.dump_into(out);
                        if *kind == GetAttrKind::Method {
                            out.push('(');
                            dump_list(&arguments.nodes, out);
                            out.push(')');
                        }
                    }
                    GetAttrKind::Array => {
                        out.push_str(if *null_safe { "?.[" } else { "[" });
                        attribute.dump_into(out);
                        out.push(']');
                    }
                }
            }
            Node::Array(array) => match array.kind() {
                ArrayKind::Array => {
                    out.push('[');
                    for (i, (_, value)) in array.entries().iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        value.dump_into(out);
                    }
                    out.push(']');
                }
                ArrayKind::Object => {
                    out.push('{');
                    for (i, (key, value)) in array.entries().iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        match key {
                            Node::Constant { .. } => key.dump_into(out),
                            _ => {
                                out.push('(');
                                key.dump_into(out);
                                out.push(')');
                            }
                        }
                        out.push_str(": ");
                        value.dump_into(out);
                    }
                    out.push('}');
                }
            },
            Node::Function { name, arguments } => {
                out.push_str(name);
                out.push('(');
                dump_list(&arguments.nodes, out);
                out.push(')');
            }
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        let attributes = match self {
            Node::Constant {
                value,
                is_identifier,
            } => {
                let mut attrs = format!("value: '{}'", value.to_js_string());
                if *is_identifier {
                    attrs.push_str(", is_identifier: 'true'");
                }
                attrs
            }
            Node::Name { name } | Node::NullCoalescedName { name } => format!("name: '{}'", name),
            Node::Unary { operator, .. } => format!("operator: '{}'", operator.as_str()),
            Node::Binary { operator, .. } => format!("operator: '{}'", operator.as_str()),
            Node::GetAttr {
                kind, null_safe, ..
            } => format!("type: '{:?}', null_safe: '{}'", kind, null_safe),
            Node::Array(array) => format!("type: '{:?}'", array.kind()),
            Node::Function { name, .. } => format!("name: '{}'", name),
            Node::Conditional { .. } | Node::NullCoalesce { .. } => String::new(),
        };

        let children: Vec<&Node> = match self {
            Node::Constant { .. } | Node::Name { .. } | Node::NullCoalescedName { .. } => vec![],
            Node::Unary { node, .. } => vec![node],
            Node::Binary { left, right, .. } => vec![left, right],
            Node::Conditional {
                expr1,
                expr2,
                expr3,
            } => vec![expr1, expr2, expr3],
            Node::NullCoalesce { expr1, expr2 } => vec![expr1, expr2],
            Node::GetAttr {
                node,
                attribute,
                arguments,
                ..
            } => {
                let mut children: Vec<&Node> = vec![node, attribute];
                children.extend(arguments.nodes.iter());
                children
            }
            Node::Array(array) => array
                .entries()
                .iter()
                .flat_map(|(k, v)| [k, v])
                .collect(),
            Node::Function { arguments, .. } => arguments.nodes.iter().collect(),
        };

        write!(f, "{}{}({}", indent, self.variant_name(), attributes)?;
        if children.is_empty() {
            return f.write_str(")");
        }
        for child in children {
            f.write_str("\n")?;
            child.write_tree(f, depth + 1)?;
        }
        write!(f, "\n{})", indent)
    }
}

/// Indented debug tree, one node per line.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

fn dump_list(nodes: &[Node], out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        node.dump_into(out);
    }
}

fn dump_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(n) => out.push_str(&n.to_string()),
        Value::Float(n) => out.push_str(&format_number(*n)),
        Value::String(s) => dump_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                dump_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                dump_string(k, out);
                out.push_str(": ");
                dump_value(v, out);
            }
            out.push('}');
        }
        Value::Function(_) => out.push_str("null"),
    }
}

fn dump_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
}
