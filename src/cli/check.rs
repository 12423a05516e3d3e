//! Execute expressions from the command line

use super::{json_to_value, value_to_json, CliError};
use crate::{tokenize, ExpressionLanguage, Flags, NameSpec, Value, Values};

/// What to do with the expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Evaluate,
    Compile,
    Lint,
    Tokens,
    Parse,
}

/// Options shared by all commands
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub expression: String,
    /// Allowed names, each `NAME` or `KEY:NAME`
    pub names: Vec<String>,
    /// JSON object of variable values
    pub values: Option<String>,
    pub flags: Flags,
    /// Lint without checking variable names
    pub any_name: bool,
}

/// Result of a command
#[derive(Debug)]
pub enum CheckOutput {
    Value(serde_json::Value),
    Source(String),
    Valid,
}

/// Run `command` on the options' expression.
pub fn execute(command: Command, options: &CheckOptions) -> Result<CheckOutput, CliError> {
    let mut language = ExpressionLanguage::new();
    let names = options
        .names
        .iter()
        .map(|name| parse_name(name))
        .collect::<Result<Vec<_>, _>>()?;

    match command {
        Command::Evaluate => {
            let values = parse_values(options.values.as_deref())?;
            let result = language.evaluate(options.expression.as_str(), &values)?;
            Ok(CheckOutput::Value(value_to_json(result)))
        }
        Command::Compile => Ok(CheckOutput::Source(
            language.compile(options.expression.as_str(), &names)?,
        )),
        Command::Lint => {
            let names = if options.any_name { None } else { Some(names.as_slice()) };
            language.lint(options.expression.as_str(), names, options.flags)?;
            Ok(CheckOutput::Valid)
        }
        Command::Tokens => Ok(CheckOutput::Source(tokenize(&options.expression)?.to_string())),
        Command::Parse => {
            let parsed = language.parse(options.expression.as_str(), &names, options.flags)?;
            Ok(CheckOutput::Source(parsed.nodes().to_string()))
        }
    }
}

fn parse_name(raw: &str) -> Result<NameSpec, CliError> {
    match raw.split_once(':') {
        None if !raw.is_empty() => Ok(NameSpec::from(raw)),
        Some((key, name)) if !key.is_empty() && !name.is_empty() => Ok(NameSpec::alias(key, name)),
        _ => Err(CliError::InvalidName(raw.to_string())),
    }
}

fn parse_values(raw: Option<&str>) -> Result<Values, CliError> {
    let Some(raw) = raw else {
        return Ok(Values::new());
    };
    match json_to_value(serde_json::from_str(raw)?) {
        Value::Object(map) => Ok(map),
        other => Err(CliError::ValuesNotObject(other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(expression: &str) -> CheckOptions {
        CheckOptions {
            expression: expression.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_evaluate_with_values() {
        let mut opts = options("user.age >= 18 and user.name starts with 'A'");
        opts.values = Some(r#"{"user": {"age": 21, "name": "alice"}}"#.to_string());
        match execute(Command::Evaluate, &opts).unwrap() {
            CheckOutput::Value(v) => assert_eq!(v, json!(true)),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_compile_with_alias() {
        let mut opts = options("b + 1");
        opts.names = vec!["B:b".to_string()];
        match execute(Command::Compile, &opts).unwrap() {
            CheckOutput::Source(s) => assert_eq!(s, "(B + 1)"),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_values_must_be_object() {
        let mut opts = options("1");
        opts.values = Some("[1]".to_string());
        assert!(matches!(
            execute(Command::Evaluate, &opts),
            Err(CliError::ValuesNotObject("array"))
        ));
    }

    #[test]
    fn test_invalid_names() {
        for input in ["", ":a", "a:"] {
            assert!(parse_name(input).is_err(), "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_lint_any_name() {
        let mut opts = options("foo.bar");
        opts.any_name = true;
        assert!(matches!(execute(Command::Lint, &opts), Ok(CheckOutput::Valid)));
        opts.any_name = false;
        assert!(execute(Command::Lint, &opts).is_err());
    }
}
