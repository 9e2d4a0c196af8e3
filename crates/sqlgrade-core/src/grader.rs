//! End-to-end evaluation of a submission.
//!
//! A [`Grader`] ties the pipeline together: references and submission are
//! parsed, qualified, canonicalized and reduced to features; the set matcher
//! picks the closest reference; a rubric, when given, is then aligned
//! against that reference for the final grade.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::canonical::canonicalize;
use crate::config::GraderConfig;
use crate::error::{GradeError, Result};
use crate::features::{extract_features, FeatureSet};
use crate::parser::ParseError;
use crate::pipeline::{parse_with_diagnostics, Parsed};
use crate::qualify::QualificationWarning;
use crate::report::{GradingReport, ReportWarning};
use crate::schema::SchemaDescriptor;
use crate::scoring::{best_indexed, RubricWeights, TreeAligner};
use crate::tree::AstNode;

/// A query ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    tree: AstNode,
    features: FeatureSet,
    warnings: Vec<QualificationWarning>,
}

impl PreparedQuery {
    /// The canonical grading tree.
    #[must_use]
    pub const fn tree(&self) -> &AstNode {
        &self.tree
    }

    #[must_use]
    pub const fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Columns that could not be qualified.
    #[must_use]
    pub fn warnings(&self) -> &[QualificationWarning] {
        &self.warnings
    }
}

type CacheSlot = Arc<OnceLock<std::result::Result<Arc<PreparedQuery>, ParseError>>>;

/// Prepared reference queries keyed by their SQL text.
///
/// Each key is prepared at most once, even when several threads ask for it
/// at the same time. Entries are never modified once set.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    entries: Mutex<HashMap<String, CacheSlot>>,
}

impl ReferenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached preparation of `sql`, running `prepare` if there is none.
    pub fn get_or_prepare(
        &self,
        sql: &str,
        prepare: impl FnOnce() -> std::result::Result<PreparedQuery, ParseError>,
    ) -> std::result::Result<Arc<PreparedQuery>, ParseError> {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(sql.to_string()).or_default())
        };
        slot.get_or_init(|| prepare().map(Arc::new)).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grades submissions under one configuration and schema.
#[derive(Debug, Clone, Default)]
pub struct Grader {
    config: GraderConfig,
    schema: Option<SchemaDescriptor>,
    cache: Option<Arc<ReferenceCache>>,
}

impl Grader {
    #[must_use]
    pub fn new(config: GraderConfig) -> Self {
        Self {
            config,
            schema: None,
            cache: None,
        }
    }

    /// Qualifies columns against `schema`.
    ///
    /// Any reference cache is replaced, since its entries were qualified
    /// without this schema.
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        if self.cache.is_some() {
            self.cache = Some(Arc::default());
        }
        self
    }

    /// Caches prepared references across evaluations.
    ///
    /// Clones of the grader share the cache.
    #[must_use]
    pub fn with_reference_cache(mut self) -> Self {
        self.cache = Some(Arc::default());
        self
    }

    #[must_use]
    pub const fn config(&self) -> &GraderConfig {
        &self.config
    }

    #[must_use]
    pub const fn schema(&self) -> Option<&SchemaDescriptor> {
        self.schema.as_ref()
    }

    #[must_use]
    pub fn reference_cache(&self) -> Option<&ReferenceCache> {
        self.cache.as_deref()
    }

    /// Parses, qualifies and canonicalizes `sql`, and extracts its features.
    pub fn prepare(&self, sql: &str) -> std::result::Result<PreparedQuery, ParseError> {
        let Parsed { tree, warnings } =
            parse_with_diagnostics(sql, self.schema.as_ref(), &self.config.limits)?;
        let tree = canonicalize(tree);
        let features = extract_features(&tree);
        Ok(PreparedQuery {
            tree,
            features,
            warnings,
        })
    }

    fn prepare_reference(&self, sql: &str) -> std::result::Result<Arc<PreparedQuery>, ParseError> {
        match &self.cache {
            Some(cache) => cache.get_or_prepare(sql, || self.prepare(sql)),
            None => self.prepare(sql).map(Arc::new),
        }
    }

    /// Grades `student_sql` against `reference_sqls`.
    ///
    /// `weights` falls back to the configured default rubric; with neither,
    /// the grade is the feature-match percentage. A submission that fails to
    /// parse yields a zero-score report carrying the error. References that
    /// fail to parse are skipped with a warning; if none remain the result
    /// is [`GradeError::EmptyReferenceSet`].
    pub fn evaluate<S: AsRef<str>>(
        &self,
        student_sql: &str,
        reference_sqls: &[S],
        weights: Option<&RubricWeights>,
    ) -> Result<GradingReport> {
        let weights = weights.or(self.config.default_rubric.as_ref());
        if let Some(weights) = weights {
            weights
                .validate()
                .map_err(|e| GradeError::InvalidRubric(e.to_string()))?;
        }

        let mut warnings = vec![];
        let mut references = vec![];
        for (index, sql) in reference_sqls.iter().enumerate() {
            match self.prepare_reference(sql.as_ref()) {
                Ok(prepared) => references.push((index, prepared)),
                Err(error) => {
                    warn!(reference = index, %error, "Skipping reference that failed to parse");
                    warnings.push(ReportWarning::SkippedReference { index, error });
                }
            }
        }
        if references.is_empty() {
            return Err(GradeError::EmptyReferenceSet {
                supplied: reference_sqls.len(),
            });
        }

        let student = match self.prepare(student_sql) {
            Ok(student) => student,
            Err(error) => {
                debug!(%error, "Submission failed to parse");
                return Ok(GradingReport::ungradable(error.into())
                    .with_passing_score(self.config.passing_score)
                    .with_warnings(warnings));
            }
        };
        warnings.extend(
            student
                .warnings
                .iter()
                .cloned()
                .map(ReportWarning::Qualification),
        );

        let best = best_indexed(
            &student.features,
            references.iter().map(|(index, r)| (*index, &r.features)),
            self.config.extra_penalty,
        )
        .ok_or(GradeError::EmptyReferenceSet {
            supplied: reference_sqls.len(),
        })?;
        debug!(
            reference = best.reference_index,
            ratio = best.ratio,
            "Selected best-matching reference"
        );

        let reference = references
            .iter()
            .find(|(index, _)| *index == best.reference_index)
            .map(|(_, r)| Arc::clone(r));
        let mut report = GradingReport::from_feature_match(best);

        if let (Some(weights), Some(reference)) = (weights, reference) {
            let score = TreeAligner::new(self.config.limits).score_rubric(
                &student.tree,
                &reference.tree,
                weights,
            )?;
            report = report.with_rubric(score);
        }

        Ok(report
            .with_passing_score(self.config.passing_score)
            .with_warnings(warnings))
    }
}

/// Grades `student_sql` against `reference_sqls` with the default configuration.
pub fn evaluate<S: AsRef<str>>(
    student_sql: &str,
    reference_sqls: &[S],
    schema: Option<&SchemaDescriptor>,
    weights: Option<&RubricWeights>,
) -> Result<GradingReport> {
    let mut grader = Grader::default();
    if let Some(schema) = schema {
        grader = grader.with_schema(schema.clone());
    }
    grader.evaluate(student_sql, reference_sqls, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::GradingMethod;

    #[test]
    fn grader_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Grader>();
        assert_send_sync::<ReferenceCache>();
    }

    #[test]
    fn feature_grade_without_rubric() {
        let report = evaluate(
            "SELECT eno FROM emp WHERE 5000 < incentive",
            &["SELECT eno FROM emp WHERE incentive > 5000"],
            None,
            None,
        )
        .unwrap();
        assert_eq!(report.method, GradingMethod::Features);
        assert!((report.percentage - 100.0).abs() < f64::EPSILON);
        assert!(report.passed);
    }

    #[test]
    fn skipped_references_keep_their_index() {
        let report = evaluate(
            "SELECT a FROM t",
            &["SELECT FROM", "SELECT b FROM t", "SELECT a FROM t"],
            None,
            None,
        )
        .unwrap();
        assert_eq!(report.matched_reference_index, Some(2));
        assert!(matches!(
            report.warnings.as_slice(),
            [ReportWarning::SkippedReference { index: 0, .. }]
        ));
    }

    #[test]
    fn no_parsable_reference_is_an_error() {
        let err = evaluate("SELECT a FROM t", &["nonsense", ""], None, None).unwrap_err();
        assert_eq!(err, GradeError::EmptyReferenceSet { supplied: 2 });
        let none: [&str; 0] = [];
        assert_eq!(
            evaluate("SELECT a FROM t", &none, None, None).unwrap_err(),
            GradeError::EmptyReferenceSet { supplied: 0 }
        );
    }

    #[test]
    fn default_rubric_from_config() {
        let config = GraderConfig {
            default_rubric: Some(RubricWeights::default_rubric()),
            ..GraderConfig::default()
        };
        let report = Grader::new(config)
            .evaluate(
                "SELECT Eno FROM EMP",
                &["SELECT Eno FROM EMP WHERE incentive > 5000"],
                None,
            )
            .unwrap();
        assert_eq!(report.method, GradingMethod::Rubric);
        assert!((report.percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_rubric_is_rejected() {
        let weights = RubricWeights::new().with("filters", -1.0);
        assert!(matches!(
            evaluate("SELECT a FROM t", &["SELECT a FROM t"], None, Some(&weights)),
            Err(GradeError::InvalidRubric(_))
        ));
    }

    #[test]
    fn cache_prepares_each_reference_once() {
        let grader = Grader::default().with_reference_cache();
        let references = ["SELECT a FROM t", "SELECT b FROM t"];
        for student in ["SELECT a FROM t", "SELECT b FROM t", "SELECT c FROM t"] {
            grader.evaluate(student, &references, None).unwrap();
        }
        assert_eq!(grader.reference_cache().map(ReferenceCache::len), Some(2));
    }

    #[test]
    fn cached_failures_are_reported_again() {
        let grader = Grader::default().with_reference_cache();
        for _ in 0..2 {
            let report = grader
                .evaluate("SELECT a FROM t", &["SELECT FROM", "SELECT a FROM t"], None)
                .unwrap();
            assert_eq!(report.warnings.len(), 1);
        }
    }
}
