//! Scoring of a submission against reference queries.
//!
//! Two scorers share the canonical trees produced upstream:
//!
//! - the set matcher ([`best_match`]) compares flat feature sets and picks
//!   the reference the submission is closest to;
//! - the [`TreeAligner`] walks clause subtrees pairwise and awards per-node
//!   partial credit, weighted per clause by [`RubricWeights`].

mod aligner;
mod matcher;
mod rubric;

pub use aligner::{Alignment, TreeAligner};
pub(crate) use matcher::best_indexed;
pub use matcher::{best_match, match_features, score_by_features, score_by_features_with, FeatureMatch};
pub use rubric::{
    score_by_rubric, CategoryScore, RubricCategory, RubricError, RubricScore, RubricWeights,
};
