use std::fmt;
use std::sync::Arc;

use crate::ast::Node;

/// An expression and its parsed tree.
///
/// Immutable once built, so the facade hands out shared `Arc`s that can be
/// evaluated and compiled any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    expression: String,
    nodes: Node,
}

impl ParsedExpression {
    pub fn new(expression: impl Into<String>, nodes: Node) -> Self {
        ParsedExpression {
            expression: expression.into(),
            nodes,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn nodes(&self) -> &Node {
        &self.nodes
    }
}

/// Displays the source text.
impl fmt::Display for ParsedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Input accepted by the [`ExpressionLanguage`](crate::ExpressionLanguage)
/// methods: source text, or an expression parsed earlier.
#[derive(Debug, Clone)]
pub enum Expression {
    Source(String),
    Parsed(Arc<ParsedExpression>),
}

impl Expression {
    pub fn source(&self) -> &str {
        match self {
            Expression::Source(source) => source,
            Expression::Parsed(parsed) => parsed.expression(),
        }
    }
}

impl From<&str> for Expression {
    fn from(source: &str) -> Self {
        Expression::Source(source.to_string())
    }
}

impl From<String> for Expression {
    fn from(source: String) -> Self {
        Expression::Source(source)
    }
}

impl From<&String> for Expression {
    fn from(source: &String) -> Self {
        Expression::Source(source.clone())
    }
}

impl From<Arc<ParsedExpression>> for Expression {
    fn from(parsed: Arc<ParsedExpression>) -> Self {
        Expression::Parsed(parsed)
    }
}

impl From<&Arc<ParsedExpression>> for Expression {
    fn from(parsed: &Arc<ParsedExpression>) -> Self {
        Expression::Parsed(Arc::clone(parsed))
    }
}

impl From<ParsedExpression> for Expression {
    fn from(parsed: ParsedExpression) -> Self {
        Expression::Parsed(Arc::new(parsed))
    }
}
