//! Instructor rubrics: clause categories weighted by points.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StructuralLimitExceeded;
use crate::tree::{AstNode, NodeType};

use super::aligner::{Alignment, TreeAligner};

/// A clause category a rubric can weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricCategory {
    Projections,
    Tables,
    Filters,
    Grouping,
    Having,
    Sorting,
    Limit,
}

impl RubricCategory {
    pub const ALL: [Self; 7] = [
        Self::Projections,
        Self::Tables,
        Self::Filters,
        Self::Grouping,
        Self::Having,
        Self::Sorting,
        Self::Limit,
    ];

    /// Looks up a category by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Projections => "projections",
            Self::Tables => "tables",
            Self::Filters => "filters",
            Self::Grouping => "grouping",
            Self::Having => "having",
            Self::Sorting => "sorting",
            Self::Limit => "limit",
        }
    }

    /// The clause node this category is graded on.
    #[must_use]
    pub const fn clause(&self) -> NodeType {
        match self {
            Self::Projections => NodeType::Select,
            Self::Tables => NodeType::From,
            Self::Filters => NodeType::Where,
            Self::Grouping => NodeType::GroupBy,
            Self::Having => NodeType::Having,
            Self::Sorting => NodeType::OrderBy,
            Self::Limit => NodeType::Limit,
        }
    }
}

impl fmt::Display for RubricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid rubric contents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RubricError {
    #[error("Rubric weight for '{category}' must be a non-negative number, got {weight}")]
    InvalidWeight { category: String, weight: f64 },
}

/// Category name to weight.
///
/// Names are kept as given so that unknown categories survive a round trip
/// through JSON; they are skipped at scoring time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RubricWeights(BTreeMap<String, f64>);

impl RubricWeights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `{projections: 20, tables: 30, filters: 50}`.
    #[must_use]
    pub fn default_rubric() -> Self {
        Self::new()
            .with(RubricCategory::Projections.as_str(), 20.0)
            .with(RubricCategory::Tables.as_str(), 30.0)
            .with(RubricCategory::Filters.as_str(), 50.0)
    }

    #[must_use]
    pub fn with(mut self, category: impl Into<String>, weight: f64) -> Self {
        self.0.insert(category.into(), weight);
        self
    }

    /// Parses a JSON object of weights. Call [`validate`](Self::validate) before use.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rejects negative and non-finite weights.
    pub fn validate(&self) -> Result<(), RubricError> {
        for (category, weight) in self.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RubricError::InvalidWeight {
                    category: category.to_string(),
                    weight,
                });
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for RubricWeights {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, weight)| (name.into(), weight)).collect())
    }
}

/// Score of one rubric category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: RubricCategory,
    pub weight: f64,
    /// Whether the reference has the clause; absent clauses are not graded.
    pub graded: bool,
    /// Node-level alignment of the clause subtrees.
    pub alignment: Alignment,
    /// `weight * alignment.ratio()`.
    pub points: f64,
}

/// Weighted rubric result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    pub obtained: f64,
    /// Sum of the weights of graded categories.
    pub total: f64,
    pub categories: Vec<CategoryScore>,
}

impl TreeAligner {
    /// Scores `student` against `reference` under `weights`.
    pub fn score_rubric(
        &self,
        student: &AstNode,
        reference: &AstNode,
        weights: &RubricWeights,
    ) -> Result<RubricScore, StructuralLimitExceeded> {
        let mut score = RubricScore::default();

        for (name, weight) in weights.iter() {
            let Some(category) = RubricCategory::from_name(name) else {
                debug!(category = %name, "Ignoring unknown rubric category");
                continue;
            };

            let clause = category.clause();
            let Some(reference_clause) = reference.find_first(clause) else {
                score.categories.push(CategoryScore {
                    category,
                    weight,
                    graded: false,
                    alignment: Alignment::default(),
                    points: 0.0,
                });
                continue;
            };

            let alignment = self.align(student.find_first(clause), reference_clause)?;
            let points = weight * alignment.ratio();
            debug!(
                category = %category,
                obtained = alignment.obtained,
                total = alignment.total,
                points,
                "Scored rubric category"
            );

            score.obtained += points;
            score.total += weight;
            score.categories.push(CategoryScore {
                category,
                weight,
                graded: true,
                alignment,
                points,
            });
        }

        Ok(score)
    }
}

/// Scores `student` against `reference` under `weights` with default limits.
pub fn score_by_rubric(
    student: &AstNode,
    reference: &AstNode,
    weights: &RubricWeights,
) -> Result<RubricScore, StructuralLimitExceeded> {
    TreeAligner::default().score_rubric(student, reference, weights)
}
