use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;

use crate::ast::{ArgumentsNode, ArrayNode, Associativity, BinaryOp, GetAttrKind, Node, TokenKind, UnaryOp};
use crate::error::SyntaxError;
use crate::function::FunctionRegistry;
use crate::token_stream::TokenStream;
use crate::value::Value;

/// Deepest sub-expression nesting accepted before giving up.
const MAX_NESTING: usize = 128;

bitflags! {
    /// Checks the parser may skip.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        /// Accept any variable name, resolving it at evaluation time.
        const IGNORE_UNKNOWN_VARIABLES = 1;
        /// Accept calls to functions that are not registered.
        const IGNORE_UNKNOWN_FUNCTIONS = 2;
    }
}

/// A variable an expression may reference.
///
/// `Alias { key, name }` lets the expression write `name` while the value is
/// read from (and compiled as) `key`. Writing `key` directly is allowed too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameSpec {
    Plain(String),
    Alias { key: String, name: String },
}

impl NameSpec {
    pub fn alias(key: impl Into<String>, name: impl Into<String>) -> Self {
        NameSpec::Alias {
            key: key.into(),
            name: name.into(),
        }
    }

    /// Reads a name from JSON-like input: a string, or a single-entry
    /// object `{key: name}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(NameSpec::Plain(name.clone())),
            Value::Object(map) if map.len() == 1 => {
                map.iter().next().and_then(|(key, name)| match name {
                    Value::String(name) => Some(NameSpec::alias(key.as_str(), name.as_str())),
                    _ => None,
                })
            }
            _ => None,
        }
    }

    /// The part names are sorted by when building cache keys.
    pub fn sort_key(&self) -> &str {
        match self {
            NameSpec::Plain(name) => name,
            NameSpec::Alias { name, .. } => name,
        }
    }
}

impl From<&str> for NameSpec {
    fn from(name: &str) -> Self {
        NameSpec::Plain(name.to_string())
    }
}

impl From<String> for NameSpec {
    fn from(name: String) -> Self {
        NameSpec::Plain(name)
    }
}

impl fmt::Display for NameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameSpec::Plain(name) => f.write_str(name),
            NameSpec::Alias { key, name } => write!(f, "{}:{}", key, name),
        }
    }
}

/// Builds node trees from token streams.
///
/// Variable names are checked against the declared [`NameSpec`]s and
/// function calls against the registry, unless [`Flags`] say otherwise.
pub struct Parser<'a> {
    functions: &'a FunctionRegistry,
}

impl<'a> Parser<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Parser { functions }
    }

    pub fn parse(
        &self,
        stream: TokenStream,
        names: &[NameSpec],
        flags: Flags,
    ) -> Result<Node, SyntaxError> {
        ParseState::new(stream, self.functions, Some(names), flags).run()
    }

    /// Validates an expression without keeping the tree. Without names,
    /// variables are not checked.
    pub fn lint(
        &self,
        stream: TokenStream,
        names: Option<&[NameSpec]>,
        flags: Flags,
    ) -> Result<(), SyntaxError> {
        ParseState::new(stream, self.functions, names, flags)
            .run()
            .map(|_| ())
    }
}

/// State for a single parse.
struct ParseState<'a> {
    stream: TokenStream,
    functions: &'a FunctionRegistry,
    /// Every accepted spelling, in declaration order
    names: Vec<String>,
    /// Alias spelling -> context key
    aliases: HashMap<String, String>,
    flags: Flags,
    depth: usize,
}

impl<'a> ParseState<'a> {
    fn new(
        stream: TokenStream,
        functions: &'a FunctionRegistry,
        declared: Option<&[NameSpec]>,
        mut flags: Flags,
    ) -> Self {
        let mut names = Vec::new();
        let mut aliases = HashMap::new();
        match declared {
            Some(declared) => {
                for spec in declared {
                    match spec {
                        NameSpec::Plain(name) => names.push(name.clone()),
                        NameSpec::Alias { key, name } => {
                            names.push(key.clone());
                            names.push(name.clone());
                            aliases.insert(name.clone(), key.clone());
                        }
                    }
                }
            }
            None => flags |= Flags::IGNORE_UNKNOWN_VARIABLES,
        }

        ParseState {
            stream,
            functions,
            names,
            aliases,
            flags,
            depth: 0,
        }
    }

    fn run(mut self) -> Result<Node, SyntaxError> {
        let node = self.parse_expression(0)?;

        if !self.stream.is_eof() {
            let token = self.stream.current();
            return Err(self.error(
                format!(
                    "Unexpected token \"{}\" of value \"{}\"",
                    token.kind,
                    token.value.to_js_string()
                ),
                token.cursor,
            ));
        }

        Ok(node)
    }

    fn error(&self, message: String, cursor: usize) -> SyntaxError {
        SyntaxError::new(message, cursor, self.stream.expression())
    }

    fn check(&self, kind: TokenKind, value: &str) -> bool {
        self.stream.current().test(kind, Some(value))
    }

    fn expect_punctuation(&mut self, value: &str, message: &str) -> Result<(), SyntaxError> {
        self.stream
            .expect(TokenKind::Punctuation, Some(value), Some(message))
    }

    /// Precedence climbing over binary operators, then `??` and `?:`.
    fn parse_expression(&mut self, precedence: u16) -> Result<Node, SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let cursor = self.stream.current().cursor;
            return Err(self.error("Expression is nested too deeply".to_string(), cursor));
        }

        let mut expr = self.get_primary()?;

        loop {
            let token = self.stream.current();
            if token.kind != TokenKind::Operator {
                break;
            }
            let Some(op) = token.text().and_then(BinaryOp::from_symbol) else {
                break;
            };
            if op.precedence() < precedence {
                break;
            }

            self.stream.next()?;
            let next_precedence = match op.associativity() {
                Associativity::Left => op.precedence() + 1,
                Associativity::Right => op.precedence(),
            };
            let right = self.parse_expression(next_precedence)?;
            expr = Node::binary(op, expr, right);
        }

        if precedence == 0 {
            expr = self.parse_conditional_expression(expr)?;
        }

        self.depth -= 1;
        Ok(expr)
    }

    fn get_primary(&mut self) -> Result<Node, SyntaxError> {
        let token = self.stream.current();

        if token.kind == TokenKind::Operator {
            if let Some(op) = token.text().and_then(UnaryOp::from_symbol) {
                self.stream.next()?;
                let operand = self.parse_expression(op.precedence())?;
                return self.parse_postfix_expression(Node::unary(op, operand));
            }
        }

        if self.check(TokenKind::Punctuation, "(") {
            self.stream.next()?;
            let expr = self.parse_expression(0)?;
            self.expect_punctuation(")", "An opened parenthesis is not properly closed")?;
            return self.parse_postfix_expression(expr);
        }

        self.parse_primary_expression()
    }

    fn parse_conditional_expression(&mut self, mut expr: Node) -> Result<Node, SyntaxError> {
        while self.check(TokenKind::Punctuation, "??") {
            self.stream.next()?;
            let fallback = self.parse_expression(0)?;
            expr = Node::null_coalesce(expr, fallback);
        }

        while self.check(TokenKind::Punctuation, "?") {
            self.stream.next()?;
            let (then, otherwise) = if self.check(TokenKind::Punctuation, ":") {
                // Elvis: `a ?: b`
                self.stream.next()?;
                (expr.clone(), self.parse_expression(0)?)
            } else {
                let then = self.parse_expression(0)?;
                let otherwise = if self.check(TokenKind::Punctuation, ":") {
                    self.stream.next()?;
                    self.parse_expression(0)?
                } else {
                    Node::null()
                };
                (then, otherwise)
            };
            expr = Node::conditional(expr, then, otherwise);
        }

        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> Result<Node, SyntaxError> {
        let token = self.stream.current().clone();

        let node = match token.kind {
            TokenKind::Name => {
                self.stream.next()?;
                let name = token.text().unwrap_or_default().to_string();
                match name.as_str() {
                    "true" | "TRUE" => return Ok(Node::constant(true)),
                    "false" | "FALSE" => return Ok(Node::constant(false)),
                    "null" | "NULL" => return Ok(Node::null()),
                    _ => {}
                }

                if self.check(TokenKind::Punctuation, "(") {
                    if !self.functions.contains(&name)
                        && !self.flags.contains(Flags::IGNORE_UNKNOWN_FUNCTIONS)
                    {
                        return Err(self
                            .error(format!("The function \"{}\" does not exist", name), token.cursor)
                            .with_proposals(name.as_str(), self.functions.names()));
                    }
                    Node::function(name, self.parse_arguments()?)
                } else {
                    self.resolve_name(name, token.cursor)?
                }
            }
            TokenKind::Number | TokenKind::String => {
                self.stream.next()?;
                return Ok(Node::constant(token.value));
            }
            _ if token.test(TokenKind::Punctuation, Some("[")) => self.parse_array_expression()?,
            _ if token.test(TokenKind::Punctuation, Some("{")) => self.parse_hash_expression()?,
            _ => {
                return Err(self.error(
                    format!(
                        "Unexpected token \"{}\" of value \"{}\"",
                        token.kind,
                        token.value.to_js_string()
                    ),
                    token.cursor,
                ));
            }
        };

        self.parse_postfix_expression(node)
    }

    fn resolve_name(&self, name: String, cursor: usize) -> Result<Node, SyntaxError> {
        if self.flags.contains(Flags::IGNORE_UNKNOWN_VARIABLES) {
            return Ok(Node::name(self.aliases.get(&name).cloned().unwrap_or(name)));
        }

        if !self.names.contains(&name) {
            // `unknown ?? default` is tolerated
            if self.check(TokenKind::Punctuation, "??") {
                return Ok(Node::NullCoalescedName { name });
            }
            return Err(self
                .error(format!("Variable \"{}\" is not valid", name), cursor)
                .with_proposals(name.as_str(), self.names.clone()));
        }

        Ok(Node::name(self.aliases.get(&name).cloned().unwrap_or(name)))
    }

    fn parse_array_expression(&mut self) -> Result<Node, SyntaxError> {
        self.expect_punctuation("[", "An array element was expected")?;

        let mut node = ArrayNode::new();
        let mut first = true;
        while !self.check(TokenKind::Punctuation, "]") {
            if !first {
                self.expect_punctuation(",", "An array element must be followed by a comma")?;
                // trailing comma
                if self.check(TokenKind::Punctuation, "]") {
                    break;
                }
            }
            first = false;
            let value = self.parse_expression(0)?;
            node.add_element(value, None);
        }

        self.expect_punctuation("]", "An opened array is not properly closed")?;
        Ok(Node::Array(node))
    }

    fn parse_hash_expression(&mut self) -> Result<Node, SyntaxError> {
        self.expect_punctuation("{", "A hash element was expected")?;

        let mut node = ArrayNode::object();
        let mut first = true;
        while !self.check(TokenKind::Punctuation, "}") {
            if !first {
                self.expect_punctuation(",", "A hash value must be followed by a comma")?;
                // trailing comma
                if self.check(TokenKind::Punctuation, "}") {
                    break;
                }
            }
            first = false;

            // a key is a string, a number, a bare name, or a parenthesised expression
            let current = self.stream.current().clone();
            let key = match current.kind {
                TokenKind::String | TokenKind::Name | TokenKind::Number => {
                    self.stream.next()?;
                    Node::constant(current.value)
                }
                _ if current.test(TokenKind::Punctuation, Some("(")) => self.parse_expression(0)?,
                _ => {
                    return Err(self.error(
                        format!(
                            "A hash key must be a quoted string, a number, a name, or an expression enclosed in parentheses (unexpected token \"{}\" of value \"{}\"",
                            current.kind,
                            current.value.to_js_string()
                        ),
                        current.cursor,
                    ));
                }
            };

            self.expect_punctuation(":", "A hash key must be followed by a colon (:)")?;
            let value = self.parse_expression(0)?;
            node.add_element(value, Some(key));
        }

        self.expect_punctuation("}", "An opened hash is not properly closed")?;
        Ok(Node::Array(node))
    }

    /// `.name`, `.name(args)`, `[expr]` and their `?.` forms, repeated.
    fn parse_postfix_expression(&mut self, mut node: Node) -> Result<Node, SyntaxError> {
        loop {
            let token = self.stream.current();
            if token.kind != TokenKind::Punctuation {
                break;
            }

            match token.text() {
                Some(dot @ ("." | "?.")) => {
                    let null_safe = dot == "?.";
                    self.stream.next()?;

                    if null_safe && self.check(TokenKind::Punctuation, "[") {
                        node = self.parse_index(node, true)?;
                        continue;
                    }

                    let token = self.stream.current().clone();
                    self.stream.next()?;

                    let name = match (token.kind, token.text()) {
                        (TokenKind::Name, Some(name)) => name.to_string(),
                        // `foo.not`, `foo.matches`: word operators are valid member names
                        (TokenKind::Operator, Some(op)) if is_identifier(op) => op.to_string(),
                        _ => return Err(self.error("Expected name".to_string(), token.cursor)),
                    };

                    let (arguments, kind) = if self.check(TokenKind::Punctuation, "(") {
                        (self.parse_arguments()?, GetAttrKind::Method)
                    } else {
                        (ArgumentsNode::default(), GetAttrKind::Property)
                    };

                    node = Node::GetAttr {
                        node: Box::new(node),
                        attribute: Box::new(Node::identifier(name)),
                        arguments,
                        kind,
                        null_safe,
                    };
                }
                Some("[") => {
                    self.stream.next()?;
                    node = self.finish_index(node, false)?;
                }
                _ => break,
            }
        }

        Ok(node)
    }

    fn parse_index(&mut self, node: Node, null_safe: bool) -> Result<Node, SyntaxError> {
        self.stream.next()?;
        self.finish_index(node, null_safe)
    }

    fn finish_index(&mut self, node: Node, null_safe: bool) -> Result<Node, SyntaxError> {
        let attribute = self.parse_expression(0)?;
        self.stream.expect(TokenKind::Punctuation, Some("]"), None)?;
        Ok(Node::GetAttr {
            node: Box::new(node),
            attribute: Box::new(attribute),
            arguments: ArgumentsNode::default(),
            kind: GetAttrKind::Array,
            null_safe,
        })
    }

    fn parse_arguments(&mut self) -> Result<ArgumentsNode, SyntaxError> {
        self.expect_punctuation("(", "A list of arguments must begin with an opening parenthesis")?;

        let mut arguments = ArgumentsNode::default();
        while !self.check(TokenKind::Punctuation, ")") {
            if !arguments.is_empty() {
                self.expect_punctuation(",", "Arguments must be separated by a comma")?;
            }
            arguments.add_element(self.parse_expression(0)?);
        }

        self.expect_punctuation(")", "A list of arguments must be closed by a parenthesis")?;
        Ok(arguments)
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c >= '\x7f')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c >= '\x7f')
}
