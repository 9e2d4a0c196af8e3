//! SQL Parser
//!
//! A hand-written recursive descent parser with Pratt expression parsing.
//! Nesting depth and list widths are bounded by [`Limits`](crate::Limits).

mod error;
mod parser;
mod pratt;

pub use error::ParseError;
pub use parser::Parser;
