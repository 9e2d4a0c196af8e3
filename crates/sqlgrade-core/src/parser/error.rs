//! Parser error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StructuralLimitExceeded;
use crate::lexer::{Span, TokenKind};

/// Why a SQL text could not be turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParseError {
    /// The input contained nothing but whitespace and comments.
    #[error("empty SQL input")]
    Empty,

    #[error("malformed SQL: {0}")]
    Malformed(String),

    /// The statement is valid SQL but not a kind we grade.
    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error(transparent)]
    StructuralLimitExceeded(#[from] StructuralLimitExceeded),
}

impl ParseError {
    /// Creates a malformed-input error located at `span`.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::Malformed(format!("{} at position {span}", message.into()))
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(expected: &str, found: &TokenKind, span: Span) -> Self {
        match found {
            TokenKind::Eof => Self::unexpected_eof(expected, span),
            TokenKind::Error(message) => Self::new(message.clone(), span),
            other => Self::new(format!("expected {expected}, found {other}"), span),
        }
    }

    /// Creates an "unexpected end of input" error.
    #[must_use]
    pub fn unexpected_eof(expected: &str, span: Span) -> Self {
        Self::new(format!("unexpected end of input, expected {expected}"), span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimitDimension;

    #[test]
    fn unexpected_mentions_expected_and_found() {
        let err = ParseError::unexpected("FROM", &TokenKind::Comma, Span::new(7, 8));
        assert_eq!(
            err,
            ParseError::Malformed(String::from("expected FROM, found , at position 7..8"))
        );
    }

    #[test]
    fn unexpected_eof_is_reported_as_such() {
        let err = ParseError::unexpected(")", &TokenKind::Eof, Span::new(12, 12));
        assert!(matches!(err, ParseError::Malformed(msg) if msg.contains("end of input")));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ParseError::Empty).unwrap();
        assert_eq!(json["kind"], "empty");

        let limit = ParseError::from(StructuralLimitExceeded {
            dimension: LimitDimension::Depth,
            limit: 64,
        });
        let json = serde_json::to_value(&limit).unwrap();
        assert_eq!(json["kind"], "structural_limit_exceeded");
        assert_eq!(json["detail"]["limit"], 64);
    }
}
