use tracing::trace;

use crate::ast::{Token, TokenKind};
use crate::error::SyntaxError;
use crate::token_stream::TokenStream;
use crate::value::Value;

/// Operators, longest first so that the first match is the longest one.
const OPERATORS: &[&str] = &[
    "starts with",
    "ends with",
    "contains",
    "matches",
    "not in",
    "===",
    "!==",
    "and",
    "not",
    "xor",
    "&&",
    "||",
    "or",
    "**",
    "==",
    "!=",
    "<=",
    ">=",
    "..",
    "in",
    "+",
    "-",
    "*",
    "/",
    "%",
    "&",
    "|",
    "^",
    "<",
    ">",
    "!",
    "~",
];

/// Splits an expression into tokens.
///
/// ```
/// use exprlang::{TokenKind, tokenize};
///
/// let stream = tokenize("a + 1").unwrap();
/// assert_eq!(stream.tokens().len(), 4);
/// assert_eq!(stream.tokens()[1].kind, TokenKind::Operator);
/// ```
pub fn tokenize(expression: &str) -> Result<TokenStream, SyntaxError> {
    Lexer::new(expression).tokenize()
}

pub struct Lexer {
    expression: String,
    input: Vec<char>,
    position: usize,
    tokens: Vec<Token>,
    /// Open brackets with their 1-based cursor
    brackets: Vec<(char, usize)>,
}

impl Lexer {
    pub fn new(expression: &str) -> Self {
        let input: Vec<char> = expression
            .chars()
            .map(|ch| match ch {
                '\r' | '\n' | '\t' | '\x0B' | '\x0C' => ' ',
                other => other,
            })
            .collect();
        Lexer {
            expression: input.iter().collect(),
            input,
            position: 0,
            tokens: Vec::new(),
            brackets: Vec::new(),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        let mut offset = 0;
        for ch in text.chars() {
            if self.peek_char(offset) != Some(ch) {
                return false;
            }
            offset += 1;
        }
        true
    }

    fn cursor(&self) -> usize {
        self.position + 1
    }

    fn error(&self, message: String, cursor: usize) -> SyntaxError {
        SyntaxError::new(message, cursor, self.expression.as_str())
    }

    fn push(&mut self, kind: TokenKind, value: impl Into<Value>, cursor: usize) {
        self.tokens.push(Token::new(kind, value, cursor));
    }

    pub fn tokenize(mut self) -> Result<TokenStream, SyntaxError> {
        while let Some(ch) = self.current_char() {
            if ch == ' ' {
                self.position += 1;
                continue;
            }

            if self.starts_with("/*") {
                self.skip_comment();
                continue;
            }

            if self.read_number() {
                continue;
            }

            match ch {
                '(' | '[' | '{' => {
                    self.brackets.push((ch, self.cursor()));
                    self.push(TokenKind::Punctuation, ch.to_string(), self.cursor());
                    self.position += 1;
                }
                ')' | ']' | '}' => {
                    let Some((open, open_cursor)) = self.brackets.pop() else {
                        return Err(self.error(format!("Unexpected \"{}\"", ch), self.cursor()));
                    };
                    if closing_for(open) != ch {
                        return Err(self.error(format!("Unclosed \"{}\"", open), open_cursor));
                    }
                    self.push(TokenKind::Punctuation, ch.to_string(), self.cursor());
                    self.position += 1;
                }
                '"' | '\'' => self.read_string(ch)?,
                '\\' if self.peek_char(1) == Some('\\') => {
                    self.push(TokenKind::Punctuation, "\\", self.cursor());
                    self.position += 2;
                }
                _ => self.read_symbol(ch)?,
            }
        }

        self.tokens.push(Token::eof(self.cursor()));

        if let Some((open, open_cursor)) = self.brackets.pop() {
            return Err(self.error(format!("Unclosed \"{}\"", open), open_cursor));
        }

        trace!(tokens = self.tokens.len(), "tokenized expression");
        Ok(TokenStream::new(self.expression, self.tokens))
    }

    /// Unterminated comments run to the end of the input.
    fn skip_comment(&mut self) {
        self.position += 2;
        while self.current_char().is_some() {
            if self.starts_with("*/") {
                self.position += 2;
                return;
            }
            self.position += 1;
        }
    }

    /// Digits with single `_` separators between them.
    fn digits_len(&self, from: usize) -> usize {
        let mut len = 0;
        while let Some(ch) = self.input.get(from + len) {
            if ch.is_ascii_digit() {
                len += 1;
            } else if *ch == '_'
                && len > 0
                && self.input.get(from + len + 1).is_some_and(|c| c.is_ascii_digit())
            {
                len += 1;
            } else {
                break;
            }
        }
        len
    }

    /// Integer, decimal (`1.5`, `.5`) or exponent form (`1e3`, `1.99E+3`).
    fn read_number(&mut self) -> bool {
        let start = self.position;
        let mut end = start;
        let mut is_float = false;

        let int_len = self.digits_len(end);
        end += int_len;

        if self.input.get(end) == Some(&'.') {
            let frac_len = self.digits_len(end + 1);
            if frac_len > 0 {
                end += 1 + frac_len;
                is_float = true;
            }
        }

        if end == start {
            return false;
        }

        if matches!(self.input.get(end), Some('e' | 'E')) {
            let mut exp_start = end + 1;
            if matches!(self.input.get(exp_start), Some('+' | '-')) {
                exp_start += 1;
            }
            let exp_len = self.digits_len(exp_start);
            if exp_len > 0 {
                end = exp_start + exp_len;
                is_float = true;
            }
        }

        let text: String = self.input[start..end].iter().filter(|c| **c != '_').collect();
        let value = if is_float {
            Value::Float(text.parse::<f64>().unwrap_or(f64::NAN))
        } else {
            match text.parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => Value::Float(text.parse::<f64>().unwrap_or(f64::INFINITY)),
            }
        };

        self.push(TokenKind::Number, value, start + 1);
        self.position = end;
        true
    }

    /// Only the enclosing quote and the backslash itself can be escaped.
    fn read_string(&mut self, quote: char) -> Result<(), SyntaxError> {
        let start = self.position;
        let mut result = String::new();
        let mut offset = 1;

        while let Some(ch) = self.peek_char(offset) {
            if ch == quote {
                self.push(TokenKind::String, result, start + 1);
                self.position += offset + 1;
                return Ok(());
            }
            if ch == '\\' {
                match self.peek_char(offset + 1) {
                    Some(next) if next == quote || next == '\\' => {
                        result.push(next);
                        offset += 2;
                        continue;
                    }
                    Some(next) => {
                        result.push('\\');
                        result.push(next);
                        offset += 2;
                        continue;
                    }
                    None => break,
                }
            }
            result.push(ch);
            offset += 1;
        }

        Err(self.error(format!("Unexpected character \"{}\"", quote), start + 1))
    }

    fn read_symbol(&mut self, ch: char) -> Result<(), SyntaxError> {
        // A property or method name may collide with a word operator (`foo.not(`)
        let after_dot = self
            .tokens
            .last()
            .is_some_and(|t| t.test(TokenKind::Punctuation, Some(".")) || t.test(TokenKind::Punctuation, Some("?.")));

        if after_dot && self.read_name() {
            return Ok(());
        }

        if let Some(operator) = self.match_operator() {
            self.push(TokenKind::Operator, operator, self.cursor());
            self.position += operator.chars().count();
            return Ok(());
        }

        if ch == '?' && self.peek_char(1) == Some('.') && !self.peek_char(2).is_some_and(|c| c.is_ascii_digit()) {
            self.push(TokenKind::Punctuation, "?.", self.cursor());
            self.position += 2;
            return Ok(());
        }

        if ch == '?' && self.peek_char(1) == Some('?') {
            self.push(TokenKind::Punctuation, "??", self.cursor());
            self.position += 2;
            return Ok(());
        }

        if ".,?:".contains(ch) {
            self.push(TokenKind::Punctuation, ch.to_string(), self.cursor());
            self.position += 1;
            return Ok(());
        }

        if self.read_name() {
            return Ok(());
        }

        Err(self.error(format!("Unexpected character \"{}\"", ch), self.cursor()))
    }

    fn match_operator(&self) -> Option<&'static str> {
        OPERATORS.iter().copied().find(|op| {
            if !self.starts_with(op) {
                return false;
            }
            if op.starts_with(|c: char| c.is_ascii_alphabetic()) {
                // Word operators must stand alone: `in ` but not `index`
                let next = self.peek_char(op.chars().count());
                return matches!(next, Some(' ') | Some('('));
            }
            true
        })
    }

    fn read_name(&mut self) -> bool {
        let start = self.position;
        let mut end = start;
        while let Some(ch) = self.input.get(end) {
            let valid = if end == start {
                is_name_start(*ch)
            } else {
                is_name_start(*ch) || ch.is_ascii_digit()
            };
            if !valid {
                break;
            }
            end += 1;
        }
        if end == start {
            return false;
        }
        let name: String = self.input[start..end].iter().collect();
        self.push(TokenKind::Name, name, start + 1);
        self.position = end;
        true
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch >= '\x7f'
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<(TokenKind, Value)> {
        tokenize(expression)
            .unwrap()
            .tokens()
            .iter()
            .map(|t| (t.kind, t.value.clone()))
            .collect()
    }

    #[test]
    fn test_word_operator_needs_boundary() {
        assert_eq!(
            kinds("index"),
            vec![(TokenKind::Name, "index".into()), (TokenKind::Eof, Value::Null)]
        );
        assert_eq!(
            kinds("not(a)")[0],
            (TokenKind::Operator, "not".into())
        );
    }

    #[test]
    fn test_null_safe_punctuation() {
        let tokens = kinds("a?.b ?? c");
        assert_eq!(tokens[1], (TokenKind::Punctuation, "?.".into()));
        assert_eq!(tokens[3], (TokenKind::Punctuation, "??".into()));

        // `?.5` is a ternary over a decimal
        let tokens = kinds("a?.5:1");
        assert_eq!(tokens[1], (TokenKind::Punctuation, "?".into()));
        assert_eq!(tokens[2], (TokenKind::Number, Value::Float(0.5)));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#"'it\'s'"#)[0], (TokenKind::String, "it's".into()));
        assert_eq!(kinds(r#""a\\b""#)[0], (TokenKind::String, "a\\b".into()));
        assert_eq!(kinds(r#""a\nb""#)[0], (TokenKind::String, "a\\nb".into()));
    }

    #[test]
    fn test_number_forms() {
        let test_cases = vec![
            ("42", Value::Integer(42)),
            ("1_000", Value::Integer(1000)),
            (".5", Value::Float(0.5)),
            ("1e3", Value::Float(1000.0)),
            ("1.99E+3", Value::Float(1990.0)),
            ("99999999999999999999", Value::Float(1e20)),
        ];

        for (input, expected) in test_cases {
            assert_eq!(kinds(input)[0], (TokenKind::Number, expected), "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.message, "Unexpected character \"'\"");
        assert_eq!(err.cursor, 1);
    }
}
