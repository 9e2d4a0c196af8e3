//! Grading reports.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_PASSING_SCORE;
use crate::error::GradeError;
use crate::parser::ParseError;
use crate::qualify::QualificationWarning;
use crate::scoring::{CategoryScore, FeatureMatch, RubricScore};

/// Which scorer produced the final percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMethod {
    Features,
    Rubric,
}

/// Overall verdict band of a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 90 and above.
    Equivalent,
    /// 70 and above.
    MinorDifferences,
    /// 50 and above.
    RightFoundation,
    NeedsRevision,
}

impl Verdict {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Equivalent
        } else if percentage >= 70.0 {
            Self::MinorDifferences
        } else if percentage >= 50.0 {
            Self::RightFoundation
        } else {
            Self::NeedsRevision
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Equivalent => {
                "Excellent! Your query is logically equivalent to the reference."
            }
            Self::MinorDifferences => {
                "Good work! Your query is mostly correct with minor logical differences."
            }
            Self::RightFoundation => {
                "Your query has the right structure but some clauses need work."
            }
            Self::NeedsRevision => "Your query needs revision to match what the question asks.",
        }
    }
}

/// Non-fatal problems met while grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ReportWarning {
    /// A column of the submission could not be qualified.
    Qualification(QualificationWarning),
    /// A reference query failed to parse and was left out.
    SkippedReference { index: usize, error: ParseError },
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualification(warning) => fmt::Display::fmt(warning, f),
            Self::SkippedReference { index, error } => {
                write!(f, "Reference {index} was skipped: {error}")
            }
        }
    }
}

/// The outcome of grading one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingReport {
    pub method: GradingMethod,
    /// Index of the best-matching reference among those supplied.
    pub matched_reference_index: Option<usize>,
    pub obtained: f64,
    pub total_possible: f64,
    /// Final grade in `0..=100`, rounded to two decimals.
    pub percentage: f64,
    /// Feature-match percentage, equal to `percentage` unless a rubric was applied.
    pub feature_percentage: f64,
    pub passing_score: f64,
    pub passed: bool,
    pub missing_features: Vec<String>,
    pub extra_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryScore>,
    pub feedback_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ReportWarning>,
    pub error: Option<GradeError>,
}

impl GradingReport {
    /// A feature-match report, judged against the default passing score.
    #[must_use]
    pub fn from_feature_match(feature_match: FeatureMatch) -> Self {
        let FeatureMatch {
            reference_index,
            missing,
            extra,
            obtained,
            total,
            ratio,
            ..
        } = feature_match;
        let percentage = round2(ratio * 100.0);

        #[allow(clippy::cast_precision_loss)]
        let mut report = Self {
            method: GradingMethod::Features,
            matched_reference_index: Some(reference_index),
            obtained: round2(obtained),
            total_possible: total as f64,
            percentage,
            feature_percentage: percentage,
            passing_score: DEFAULT_PASSING_SCORE,
            passed: false,
            missing_features: missing,
            extra_features: extra,
            categories: vec![],
            feedback_messages: vec![],
            warnings: vec![],
            error: None,
        };
        report.refresh();
        report
    }

    /// A zero-score report for a submission that could not be graded.
    #[must_use]
    pub fn ungradable(error: GradeError) -> Self {
        let mut report = Self {
            method: GradingMethod::Features,
            matched_reference_index: None,
            obtained: 0.0,
            total_possible: 0.0,
            percentage: 0.0,
            feature_percentage: 0.0,
            passing_score: DEFAULT_PASSING_SCORE,
            passed: false,
            missing_features: vec![],
            extra_features: vec![],
            categories: vec![],
            feedback_messages: vec![],
            warnings: vec![],
            error: Some(error),
        };
        report.refresh();
        report
    }

    /// Replaces the grade with a rubric score.
    ///
    /// A rubric with nothing to grade (every weighted clause absent from the
    /// reference) leaves the feature-match grade in place.
    #[must_use]
    pub fn with_rubric(mut self, score: RubricScore) -> Self {
        self.categories = score.categories;
        if score.total > 0.0 {
            self.method = GradingMethod::Rubric;
            self.obtained = round2(score.obtained);
            self.total_possible = round2(score.total);
            self.percentage = round2((score.obtained / score.total * 100.0).clamp(0.0, 100.0));
        } else {
            debug!("Rubric grades no clause of the reference, keeping feature score");
        }
        self.refresh();
        self
    }

    #[must_use]
    pub fn with_passing_score(mut self, passing_score: f64) -> Self {
        self.passing_score = passing_score;
        self.refresh();
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<ReportWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        Verdict::from_percentage(self.percentage)
    }

    #[must_use]
    pub const fn is_gradable(&self) -> bool {
        self.error.is_none()
    }

    /// Recomputes `passed` and the feedback messages.
    fn refresh(&mut self) {
        self.passed = self.is_gradable() && self.percentage >= self.passing_score;

        let mut messages = vec![];
        if let Some(error) = &self.error {
            messages.push(format!("Your query could not be graded: {error}"));
            self.feedback_messages = messages;
            return;
        }

        messages.push(self.verdict().message().to_string());
        for category in &self.categories {
            if category.graded && category.points < category.weight {
                messages.push(format!(
                    "{}: {:.2} of {:.2} points",
                    category.category, category.points, category.weight
                ));
            }
        }
        messages.extend(self.missing_features.iter().map(|f| format!("Missing: {f}")));
        messages.extend(self.extra_features.iter().map(|f| format!("Unexpected: {f}")));
        self.feedback_messages = messages;
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Result of running the submission against a sandbox database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Whether the result set equals that of some reference.
    pub execution_match: bool,
    pub execution_error: Option<String>,
}

/// A structural grade combined with an execution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridReport {
    #[serde(flatten)]
    pub grading: GradingReport,
    #[serde(flatten)]
    pub execution: ExecutionOutcome,
}

impl HybridReport {
    #[must_use]
    pub const fn new(grading: GradingReport, execution: ExecutionOutcome) -> Self {
        Self { grading, execution }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Alignment, RubricCategory};

    fn feature_match(ratio: f64) -> FeatureMatch {
        FeatureMatch {
            reference_index: 1,
            matched: vec![String::from("TABLE:t")],
            missing: vec![String::from("SELECT:t.a")],
            extra: vec![],
            obtained: ratio * 2.0,
            total: 2,
            ratio,
        }
    }

    #[test]
    fn verdict_bands() {
        assert_eq!(Verdict::from_percentage(100.0), Verdict::Equivalent);
        assert_eq!(Verdict::from_percentage(90.0), Verdict::Equivalent);
        assert_eq!(Verdict::from_percentage(89.99), Verdict::MinorDifferences);
        assert_eq!(Verdict::from_percentage(70.0), Verdict::MinorDifferences);
        assert_eq!(Verdict::from_percentage(50.0), Verdict::RightFoundation);
        assert_eq!(Verdict::from_percentage(49.99), Verdict::NeedsRevision);
    }

    #[test]
    fn feature_report() {
        let report = GradingReport::from_feature_match(feature_match(0.5));
        assert_eq!(report.method, GradingMethod::Features);
        assert_eq!(report.matched_reference_index, Some(1));
        assert!((report.percentage - 50.0).abs() < f64::EPSILON);
        assert!(!report.passed);
        assert_eq!(
            report.feedback_messages,
            [Verdict::RightFoundation.message(), "Missing: SELECT:t.a"]
        );
    }

    #[test]
    fn passing_score_is_applied() {
        let report = GradingReport::from_feature_match(feature_match(0.5)).with_passing_score(50.0);
        assert!(report.passed);
    }

    #[test]
    fn rubric_replaces_percentage() {
        let score = RubricScore {
            obtained: 50.0,
            total: 80.0,
            categories: vec![CategoryScore {
                category: RubricCategory::Filters,
                weight: 50.0,
                graded: true,
                alignment: Alignment { obtained: 0, total: 2 },
                points: 0.0,
            }],
        };
        let report = GradingReport::from_feature_match(feature_match(1.0)).with_rubric(score);
        assert_eq!(report.method, GradingMethod::Rubric);
        assert!((report.percentage - 62.5).abs() < f64::EPSILON);
        assert!((report.feature_percentage - 100.0).abs() < f64::EPSILON);
        assert!(report
            .feedback_messages
            .contains(&String::from("filters: 0.00 of 50.00 points")));
    }

    #[test]
    fn empty_rubric_keeps_feature_grade() {
        let report = GradingReport::from_feature_match(feature_match(1.0))
            .with_rubric(RubricScore::default());
        assert_eq!(report.method, GradingMethod::Features);
        assert!((report.percentage - 100.0).abs() < f64::EPSILON);
        assert!(report.passed);
    }

    #[test]
    fn ungradable_report() {
        let report = GradingReport::ungradable(GradeError::Parse(ParseError::Empty));
        assert!(!report.is_gradable());
        assert!(!report.passed);
        assert!(report.percentage.abs() < f64::EPSILON);
        assert_eq!(
            report.feedback_messages,
            ["Your query could not be graded: Could not parse submission: empty SQL input"]
        );
    }

    #[test]
    fn hybrid_report_is_flat() {
        let hybrid = HybridReport::new(
            GradingReport::from_feature_match(feature_match(1.0)),
            ExecutionOutcome {
                execution_match: true,
                execution_error: None,
            },
        );
        let json = serde_json::to_value(&hybrid).unwrap();
        assert_eq!(json["execution_match"], true);
        assert_eq!(json["percentage"], 100.0);
        assert!(json.get("grading").is_none());
    }

    #[test]
    fn warnings_serialize_with_their_source() {
        let warning = ReportWarning::Qualification(QualificationWarning::Unresolved {
            column: String::from("x"),
        });
        assert_eq!(
            serde_json::to_string(&warning).unwrap(),
            r#"{"source":"qualification","kind":"unresolved","column":"x"}"#
        );
    }
}
