pub mod ast;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod function;
pub mod language;
pub mod lexer;
pub mod parser;
pub mod token_stream;
pub mod value;

pub use ast::{ArgumentsNode, ArrayKind, ArrayNode, BinaryOp, GetAttrKind, Node, Token, TokenKind, UnaryOp};
pub use cache::{ArrayAdapter, CacheAdapter, CacheError, CacheItem, LruAdapter};
pub use compiler::Compiler;
pub use error::{ExpressionError, LogicException, SyntaxError};
pub use evaluator::{evaluate, EvalError, Evaluator};
pub use expression::{Expression, ParsedExpression};
pub use function::{ExpressionFunction, FunctionProvider, FunctionRegistry, HostResolver, MapResolver};
pub use language::ExpressionLanguage;
pub use lexer::{tokenize, Lexer};
pub use parser::{Flags, NameSpec, Parser};
pub use token_stream::TokenStream;
pub use value::{Callable, Map, Value, Values};
