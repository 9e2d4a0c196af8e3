//! Feature-set matching.

use tracing::debug;

use crate::config::DEFAULT_EXTRA_PENALTY;
use crate::error::{GradeError, Result};
use crate::features::FeatureSet;
use crate::report::GradingReport;

/// How one submission compares to one reference.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatch {
    /// Position of the reference in the caller's list.
    pub reference_index: usize,
    pub matched: Vec<String>,
    /// In the reference but not in the submission.
    pub missing: Vec<String>,
    /// In the submission but not in the reference.
    pub extra: Vec<String>,
    /// `max(0, matched - penalty * extra)`.
    pub obtained: f64,
    /// Size of the reference feature set.
    pub total: usize,
    /// `obtained / total`, or 0 for an empty reference.
    pub ratio: f64,
}

/// Compares `student` with one reference.
#[must_use]
pub fn match_features(
    student: &FeatureSet,
    reference: &FeatureSet,
    reference_index: usize,
    extra_penalty: f64,
) -> FeatureMatch {
    let matched = student.intersection(reference);
    let missing = reference.difference(student);
    let extra = student.difference(reference);

    #[allow(clippy::cast_precision_loss)]
    let obtained = extra_penalty.mul_add(-(extra.len() as f64), matched.len() as f64).max(0.0);
    let total = reference.len();
    #[allow(clippy::cast_precision_loss)]
    let ratio = if total == 0 { 0.0 } else { obtained / total as f64 };

    FeatureMatch {
        reference_index,
        matched,
        missing,
        extra,
        obtained,
        total,
        ratio,
    }
}

/// The best-matching reference: highest ratio, earliest index on ties.
///
/// Returns `None` only for an empty reference list.
#[must_use]
pub fn best_match(
    student: &FeatureSet,
    references: &[FeatureSet],
    extra_penalty: f64,
) -> Option<FeatureMatch> {
    best_indexed(student, references.iter().enumerate(), extra_penalty)
}

/// [`best_match`] over references that carry their own index, for callers
/// that have dropped some of the supplied references.
#[must_use]
pub fn best_indexed<'a>(
    student: &FeatureSet,
    references: impl IntoIterator<Item = (usize, &'a FeatureSet)>,
    extra_penalty: f64,
) -> Option<FeatureMatch> {
    let mut best: Option<FeatureMatch> = None;
    for (index, reference) in references {
        let candidate = match_features(student, reference, index, extra_penalty);
        debug!(
            reference = index,
            ratio = candidate.ratio,
            matched = candidate.matched.len(),
            missing = candidate.missing.len(),
            extra = candidate.extra.len(),
            "Scored reference"
        );
        match &best {
            Some(current) if candidate.ratio <= current.ratio => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Scores a submission's features against every reference with the default
/// extra-feature penalty.
pub fn score_by_features(student: &FeatureSet, references: &[FeatureSet]) -> Result<GradingReport> {
    score_by_features_with(student, references, DEFAULT_EXTRA_PENALTY)
}

/// Like [`score_by_features`], with an explicit penalty per extra feature.
pub fn score_by_features_with(
    student: &FeatureSet,
    references: &[FeatureSet],
    extra_penalty: f64,
) -> Result<GradingReport> {
    best_match(student, references, extra_penalty)
        .map(GradingReport::from_feature_match)
        .ok_or(GradeError::EmptyReferenceSet { supplied: 0 })
}
