//! # sqlgrade-core
//!
//! Grades SQL submissions against reference queries by logical structure
//! rather than literal text.
//!
//! This crate provides:
//! - A hand-written recursive descent parser with Pratt expression parsing
//!   for SELECT queries and a small CREATE/ALTER TABLE subset
//! - Column qualification against an optional schema
//! - A canonicalizer that rewrites equivalent predicates into one form
//! - Feature-set matching with partial credit and a rubric-weighted tree
//!   aligner for finer-grained grades
//!
//! ## Grading
//!
//! ```rust
//! use sqlgrade_core::{evaluate, RubricWeights};
//!
//! let report = evaluate(
//!     "SELECT Eno FROM EMP",
//!     &["SELECT Eno FROM EMP WHERE incentive > 5000"],
//!     None,
//!     Some(&RubricWeights::default_rubric()),
//! )
//! .unwrap();
//!
//! // Projections and tables are right, the filter is missing.
//! assert_eq!(report.percentage, 50.0);
//! assert_eq!(report.missing_features, ["FILTER:emp.incentive > 5000"]);
//! ```
//!
//! ## Canonical features
//!
//! ```rust
//! use sqlgrade_core::{canonicalize, extract_features, parse};
//!
//! let a = extract_features(&canonicalize(parse("SELECT a FROM t WHERE 5 < b", None).unwrap()));
//! let b = extract_features(&canonicalize(parse("select A from T where B > 5", None).unwrap()));
//! assert_eq!(a, b);
//! ```

pub mod ast;
pub mod canonical;
pub mod config;
pub mod error;
pub mod features;
pub mod grader;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod qualify;
pub mod report;
pub mod schema;
pub mod scoring;
pub mod tree;

pub use canonical::canonicalize;
pub use config::{ConfigError, GraderConfig, Limits};
pub use error::{GradeError, LimitDimension, StructuralLimitExceeded};
pub use features::{extract_features, FeatureSet};
pub use grader::{evaluate, Grader, PreparedQuery, ReferenceCache};
pub use parser::{ParseError, Parser};
pub use pipeline::{parse, parse_with_diagnostics, Parsed};
pub use qualify::QualificationWarning;
pub use report::{ExecutionOutcome, GradingMethod, GradingReport, HybridReport, ReportWarning, Verdict};
pub use schema::SchemaDescriptor;
pub use scoring::{score_by_features, score_by_rubric, RubricCategory, RubricWeights, TreeAligner};
pub use tree::{AstNode, InterchangeNode, NodeType};
