use clap::{Args, Parser as ClapParser, Subcommand};
use exprlang::cli::{self, CheckOptions, CheckOutput, CliError, Command};
use exprlang::Flags;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "exprlang")]
#[command(about = "Evaluate, compile and lint expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ExpressionArgs {
    /// The expression
    expression: String,

    /// Allowed variable, as NAME or KEY:NAME (repeatable)
    #[arg(short, long = "name")]
    names: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression against JSON values
    Eval {
        /// The expression
        expression: String,

        /// JSON object of values (reads from stdin if not provided)
        #[arg(short, long)]
        values: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile an expression to JavaScript
    Compile(ExpressionArgs),

    /// Check an expression's syntax
    Lint {
        #[command(flatten)]
        args: ExpressionArgs,

        /// Accept any variable name
        #[arg(long)]
        ignore_unknown_variables: bool,

        /// Accept calls to unregistered functions
        #[arg(long)]
        ignore_unknown_functions: bool,
    },

    /// Print the token stream
    Tokens {
        /// The expression
        expression: String,
    },

    /// Print the node tree
    Parse(ExpressionArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exprlang=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    let mut pretty = false;
    let (command, options) = match command {
        Commands::Eval {
            expression,
            values,
            pretty: p,
        } => {
            pretty = p;
            let options = CheckOptions {
                expression,
                values: read_values(values)?,
                ..Default::default()
            };
            (Command::Evaluate, options)
        }
        Commands::Compile(args) => (Command::Compile, expression_options(args)),
        Commands::Lint {
            args,
            ignore_unknown_variables,
            ignore_unknown_functions,
        } => {
            let mut options = expression_options(args);
            options.flags.set(Flags::IGNORE_UNKNOWN_VARIABLES, ignore_unknown_variables);
            options.flags.set(Flags::IGNORE_UNKNOWN_FUNCTIONS, ignore_unknown_functions);
            (Command::Lint, options)
        }
        Commands::Tokens { expression } => (
            Command::Tokens,
            CheckOptions {
                expression,
                ..Default::default()
            },
        ),
        Commands::Parse(args) => (Command::Parse, expression_options(args)),
    };

    match cli::execute(command, &options)? {
        CheckOutput::Valid => println!("Syntax is valid"),
        CheckOutput::Source(source) => println!("{}", source),
        CheckOutput::Value(value) => {
            let json = if pretty {
                serde_json::to_string_pretty(&value)?
            } else {
                serde_json::to_string(&value)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

fn expression_options(args: ExpressionArgs) -> CheckOptions {
    CheckOptions {
        expression: args.expression,
        names: args.names,
        ..Default::default()
    }
}

fn read_values(values: Option<String>) -> Result<Option<String>, CliError> {
    match values {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer).filter(|b| !b.trim().is_empty()))
        }
        None => Ok(None),
    }
}
