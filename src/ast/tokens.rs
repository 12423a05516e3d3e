use std::fmt;

use crate::value::Value;

/// Lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Terminal token, always last in a stream
    Eof,

    /// Identifier: variable, function, property or method name
    ///
    /// # Examples
    /// ```text
    /// user
    /// item_count
    /// _internal
    /// ```
    Name,

    /// Integer or floating-point literal, digit separators removed
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// .5
    /// 1_000
    /// 1.99E+3
    /// ```
    Number,

    /// Single or double quoted string, quote and backslash escapes resolved
    String,

    /// Symbolic or word operator
    ///
    /// # Examples
    /// ```text
    /// +  **  ===  ..  ~
    /// and  not in  starts with  matches
    /// ```
    Operator,

    /// Brackets and `. , ? : ?. ??`
    Punctuation,
}

impl TokenKind {
    /// Name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of expression",
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token with its 1-based position in the source.
///
/// Number tokens carry an [`Value::Integer`] or [`Value::Float`], the EOF
/// token carries [`Value::Null`], everything else a [`Value::String`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Value,
    pub cursor: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<Value>, cursor: usize) -> Self {
        Token {
            kind,
            value: value.into(),
            cursor,
        }
    }

    pub fn eof(cursor: usize) -> Self {
        Token {
            kind: TokenKind::Eof,
            value: Value::Null,
            cursor,
        }
    }

    /// The string payload of a name, operator, punctuation or string token.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the token is of `kind` and, when given, carries `value`.
    pub fn test(&self, kind: TokenKind, value: Option<&str>) -> bool {
        self.kind == kind && value.is_none_or(|v| self.text() == Some(v))
    }

    /// Structural equality: kind, cursor, and numerically-equal values.
    pub fn is_equal_to(&self, other: &Token) -> bool {
        self.kind == other.kind
            && self.cursor == other.cursor
            && self.value.loose_equals(&other.value)
    }

    /// Human-readable differences against `other`, empty when equal.
    pub fn diff(&self, other: &Token) -> Vec<String> {
        let mut diff = Vec::new();
        if self.is_equal_to(other) {
            return diff;
        }
        if !self.value.strict_equals(&other.value) {
            diff.push(format!(
                "Value: {} != {}",
                other.value.to_js_string(),
                self.value.to_js_string()
            ));
        }
        if self.cursor != other.cursor {
            diff.push(format!("Cursor: {} != {}", other.cursor, self.cursor));
        }
        if self.kind != other.kind {
            diff.push(format!("Type: {} != {}", other.kind, self.kind));
        }
        diff
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.cursor, self.kind, self.value.to_js_string())
    }
}
