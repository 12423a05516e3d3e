//! Command-line support: run expressions against JSON values.

mod check;
mod convert;

pub use check::{execute, CheckOptions, CheckOutput, Command};
pub use convert::{json_to_value, value_to_json};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Expression(#[from] crate::ExpressionError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Values must be given as a JSON object
    #[error("Values must be a JSON object, got {0}")]
    ValuesNotObject(&'static str),

    #[error("Invalid name \"{0}\": expected NAME or KEY:NAME")]
    InvalidName(String),
}

impl From<crate::SyntaxError> for CliError {
    fn from(e: crate::SyntaxError) -> Self {
        CliError::Expression(e.into())
    }
}
