use std::fmt;

use crate::ast::{Token, TokenKind};
use crate::error::SyntaxError;

/// Cursor over the tokens of one expression.
///
/// The sequence always ends with exactly one [`TokenKind::Eof`] token and
/// the position never moves past it.
#[derive(Debug, Clone)]
pub struct TokenStream {
    expression: String,
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    /// Builds a stream, appending the EOF token, positioned one past the end
    /// of `expression`, if `tokens` lacks one.
    pub fn new(expression: impl Into<String>, mut tokens: Vec<Token>) -> Self {
        let expression = expression.into();
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::eof(expression.chars().count() + 1));
        }
        TokenStream {
            expression,
            tokens,
            position: 0,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    /// The token before the cursor, `None` at the start.
    pub fn last(&self) -> Option<&Token> {
        self.position.checked_sub(1).map(|i| &self.tokens[i])
    }

    pub fn next(&mut self) -> Result<(), SyntaxError> {
        if self.position + 1 >= self.tokens.len() {
            return Err(SyntaxError::new(
                "Unexpected end of expression",
                self.current().cursor,
                self.expression.as_str(),
            ));
        }
        self.position += 1;
        Ok(())
    }

    /// Asserts the current token and moves past it.
    pub fn expect(
        &mut self,
        kind: TokenKind,
        value: Option<&str>,
        message: Option<&str>,
    ) -> Result<(), SyntaxError> {
        let token = self.current();
        if !token.test(kind, value) {
            let mut text = String::new();
            if let Some(message) = message {
                text.push_str(message);
                text.push_str(". ");
            }
            text.push_str(&format!(
                "Unexpected token \"{}\" of value \"{}\" (\"{}\" expected",
                token.kind,
                token.value.to_js_string(),
                kind
            ));
            if let Some(value) = value {
                text.push_str(&format!(" with value \"{}\"", value));
            }
            text.push(')');
            return Err(SyntaxError::new(text, token.cursor, self.expression.as_str()));
        }
        self.next()
    }

    pub fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    /// Same length and pairwise [`Token::is_equal_to`].
    pub fn is_equal_to(&self, other: &TokenStream) -> bool {
        self.tokens.len() == other.tokens.len()
            && self
                .tokens
                .iter()
                .zip(&other.tokens)
                .all(|(a, b)| a.is_equal_to(b))
    }

    /// Per-index token differences against `other`.
    pub fn diff(&self, other: &TokenStream) -> Vec<(usize, Vec<String>)> {
        if self.is_equal_to(other) {
            return Vec::new();
        }
        let mut diff = Vec::new();
        for (index, token) in self.tokens.iter().enumerate() {
            match other.tokens.get(index) {
                Some(theirs) => {
                    let token_diff = token.diff(theirs);
                    if !token_diff.is_empty() {
                        diff.push((index, token_diff));
                    }
                }
                None => diff.push((index, vec![format!("Missing: {}", token)])),
            }
        }
        for (index, token) in other.tokens.iter().enumerate().skip(self.tokens.len()) {
            diff.push((index, vec![format!("Extra: {}", token)]));
        }
        diff
    }
}

/// One token per line.
impl fmt::Display for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}
