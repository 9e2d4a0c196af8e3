//! SQL lexer.
//!
//! A hand-written lexer that turns SQL text into a stream of tokens.
//! Unquoted and quoted identifiers are both folded to lowercase so that
//! `EMP`, `emp` and `"Emp"` name the same relation.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Keyword, Token, TokenKind};
pub use tokenizer::Lexer;
