//! Error types shared by the lexer, the parser and the facade.

use std::fmt;

use thiserror::Error;

use crate::cache::CacheError;
use crate::evaluator::EvalError;

/// Largest edit distance for which a "Did you mean" hint is offered.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Malformed expression, raised by the lexer and the parser.
///
/// The cursor is 1-based. When the error comes from name or function
/// resolution, `subject` holds the offending name and `proposals` the valid
/// candidates; the closest one is suggested when it is near enough.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub cursor: usize,
    pub expression: String,
    pub subject: Option<String>,
    pub proposals: Vec<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, cursor: usize, expression: impl Into<String>) -> Self {
        SyntaxError {
            message: message.into(),
            cursor,
            expression: expression.into(),
            subject: None,
            proposals: Vec::new(),
        }
    }

    /// Attach the name that failed to resolve and the names it could have been.
    pub fn with_proposals(mut self, subject: impl Into<String>, proposals: Vec<String>) -> Self {
        self.subject = Some(subject.into());
        self.proposals = proposals;
        self
    }

    /// The closest proposal, if any is within the suggestion threshold.
    pub fn suggestion(&self) -> Option<&str> {
        let subject = self.subject.as_deref()?;
        let mut best: Option<(&str, usize)> = None;
        for proposal in &self.proposals {
            let distance = strsim::levenshtein(subject, proposal);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((proposal, distance));
            }
        }
        best.filter(|(_, d)| *d < MAX_SUGGESTION_DISTANCE)
            .map(|(p, _)| p)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} around position {}", self.message, self.cursor)?;
        if !self.expression.is_empty() {
            write!(f, " for expression `{}`", self.expression)?;
        }
        f.write_str(".")?;
        if let Some(guess) = self.suggestion() {
            write!(f, " Did you mean \"{}\"?", guess)?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}

/// Programming-usage error, e.g. registering a function after the registry
/// has been used.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("LogicException: {message}")]
pub struct LogicException {
    pub message: String,
}

impl LogicException {
    pub fn new(message: impl Into<String>) -> Self {
        LogicException {
            message: message.into(),
        }
    }
}

/// Any failure surfaced by [`ExpressionLanguage`](crate::ExpressionLanguage).
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Logic(#[from] LogicException),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
