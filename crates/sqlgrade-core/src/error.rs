//! Error types shared across the grading pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::ParseError;

/// Which structural bound was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitDimension {
    /// Nesting depth (parser recursion, tree alignment recursion).
    Depth,
    /// Number of items in a single list or child sequence.
    Width,
}

impl fmt::Display for LimitDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depth => f.write_str("depth"),
            Self::Width => f.write_str("width"),
        }
    }
}

/// A query exceeded one of the configured [`Limits`](crate::Limits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("Structural limit exceeded: {dimension} is bounded by {limit}")]
pub struct StructuralLimitExceeded {
    pub dimension: LimitDimension,
    pub limit: usize,
}

/// Errors that can occur while grading a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GradeError {
    /// The submission could not be parsed.
    #[error("Could not parse submission: {0}")]
    Parse(ParseError),

    /// None of the supplied reference queries could be parsed.
    #[error("None of the {supplied} reference queries could be parsed")]
    EmptyReferenceSet {
        /// How many reference queries were supplied.
        supplied: usize,
    },

    /// The rubric has a negative or non-finite weight.
    #[error("Invalid rubric: {0}")]
    InvalidRubric(String),

    #[error(transparent)]
    StructuralLimitExceeded(#[from] StructuralLimitExceeded),
}

impl From<ParseError> for GradeError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::StructuralLimitExceeded(limit) => Self::StructuralLimitExceeded(limit),
            other => Self::Parse(other),
        }
    }
}

/// Result type for grading operations.
pub type Result<T> = std::result::Result<T, GradeError>;
