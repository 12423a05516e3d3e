//! # Expression Abstract Syntax Tree
//!
//! This module defines the tokens, operators and node tree of the expression
//! language.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Unary and binary operators with their precedence table
//! - **[nodes]** - The node tree built by the parser
//!
//! ## Quick Start
//!
//! ```text
//! user.age >= 18 and user.country in ['FR', 'DE']
//! ```
//!
//! parses to a `Binary(and)` node whose left side is a `Binary(>=)` over a
//! property access, and whose right side is a membership test against an
//! array literal.
//!
//! ## Core Concepts
//!
//! ### Access chains
//!
//! Any primary expression may be followed by `.name`, `.name(args)`,
//! `[expr]` and their null-safe spellings `?.name`, `?.name(args)`,
//! `?.[expr]`. Each step becomes a [`Node::GetAttr`] wrapping the previous one.
//!
//! ### Precedence
//!
//! ```text
//! or ||        10
//! xor          12
//! and &&       15
//! |  ^  &      16 17 18
//! comparisons  20   (== === != !== < > <= >= in, not in, matches,
//!                    contains, starts with, ends with)
//! ..           25
//! +  -         30
//! ~            40
//! *  /  %      60
//! **           200  (right associative)
//! ```
//!
//! Unary `not`/`!` bind at 50, unary `+`/`-` at 500.
//!
//! ### Null handling
//!
//! ```text
//! user?.address.city      // null when user is null
//! user.address.city ?? 'unknown'
//! ```
pub mod nodes;
pub mod operators;
pub mod tokens;

pub use nodes::{ArgumentsNode, ArrayKind, ArrayNode, GetAttrKind, Node};
pub use operators::{Associativity, BinaryOp, UnaryOp};
pub use tokens::{Token, TokenKind};
