//! Tests for feature matching, tree alignment and rubric scoring.

mod common;
use common::*;

use sqlgrade_core::config::Limits;
use sqlgrade_core::scoring::{best_match, score_by_features_with};
use sqlgrade_core::{
    score_by_features, score_by_rubric, FeatureSet, GradeError, GradingMethod, NodeType,
    RubricCategory, RubricWeights, TreeAligner,
};

fn feature_set(sql: &str) -> FeatureSet {
    features(sql).into_iter().collect()
}

// --- Feature matching ---

#[test]
fn identical_queries_score_full_marks() {
    let reference = feature_set("SELECT Eno FROM EMP WHERE incentive > 5000");
    let student = feature_set("select eno from emp where 5000 < incentive");
    let report = score_by_features(&student, &[reference]).unwrap();
    assert_eq!(report.percentage, 100.0);
    assert!(report.passed);
    assert!(report.missing_features.is_empty());
    assert!(report.extra_features.is_empty());
    assert_eq!(report.method, GradingMethod::Features);
}

#[test]
fn adding_a_reference_feature_never_lowers_the_score() {
    let reference = feature_set("SELECT a, b FROM t WHERE c > 1 AND d < 2 ORDER BY a");
    let steps = [
        "SELECT a FROM t",
        "SELECT a, b FROM t",
        "SELECT a, b FROM t WHERE c > 1",
        "SELECT a, b FROM t WHERE c > 1 AND d < 2",
        "SELECT a, b FROM t WHERE c > 1 AND d < 2 ORDER BY a",
    ];
    let mut previous = -1.0;
    for sql in steps {
        let ratio = best_match(&feature_set(sql), &[reference.clone()], 0.5)
            .unwrap()
            .ratio;
        assert!(ratio >= previous, "{sql}: {ratio} < {previous}");
        previous = ratio;
    }
    assert!((previous - 1.0).abs() < f64::EPSILON);
}

#[test]
fn extra_features_are_penalized() {
    let reference = feature_set("SELECT a FROM t WHERE b > 1");
    let exact = best_match(&reference, &[reference.clone()], 0.5).unwrap();
    let padded = best_match(
        &feature_set("SELECT a, c FROM t WHERE b > 1 ORDER BY a"),
        &[reference.clone()],
        0.5,
    )
    .unwrap();
    assert_eq!(padded.extra, ["ORDER:t.a", "SELECT:t.c"]);
    // 3 matched, 2 extras at half a point each.
    assert!((padded.obtained - 2.0).abs() < f64::EPSILON);
    assert!(padded.ratio < exact.ratio);

    // Without a penalty extras cost nothing.
    let free = score_by_features_with(
        &feature_set("SELECT a, c FROM t WHERE b > 1"),
        &[reference],
        0.0,
    )
    .unwrap();
    assert_eq!(free.percentage, 100.0);
}

#[test]
fn best_of_several_references() {
    let references = [
        feature_set("SELECT a FROM t WHERE b = 1"),
        feature_set("SELECT a FROM t WHERE b = 1 OR b = 2"),
        feature_set("SELECT a FROM t WHERE b IN (1, 2)"),
    ];
    let report =
        score_by_features(&feature_set("SELECT a FROM t WHERE b = 2 OR b = 1"), &references)
            .unwrap();
    assert_eq!(report.matched_reference_index, Some(1));
    assert_eq!(report.percentage, 100.0);
}

#[test]
fn no_references_is_an_error() {
    assert_eq!(
        score_by_features(&feature_set("SELECT a FROM t"), &[]).unwrap_err(),
        GradeError::EmptyReferenceSet { supplied: 0 }
    );
}

// --- Tree alignment ---

#[test]
fn projection_order_does_not_matter_to_the_aligner() {
    let reference = canonical("SELECT a, b, c FROM t");
    let student = canonical("SELECT c, a, b FROM t");
    let aligner = TreeAligner::default();
    let alignment = aligner
        .align(
            student.find_first(NodeType::Select),
            reference.find_first(NodeType::Select).unwrap(),
        )
        .unwrap();
    assert_eq!(alignment.obtained, alignment.total);
    assert_eq!(alignment.total, 4);
}

#[test]
fn duplicated_projections_are_credited_once() {
    let reference = canonical("SELECT a, a FROM t");
    let student = canonical("SELECT a FROM t");
    let alignment = TreeAligner::default()
        .align(
            student.find_first(NodeType::Select),
            reference.find_first(NodeType::Select).unwrap(),
        )
        .unwrap();
    assert_eq!((alignment.obtained, alignment.total), (2, 3));
}

#[test]
fn aligner_respects_limits() {
    let reference = canonical("SELECT a, b, c FROM t");
    let aligner = TreeAligner::new(Limits {
        max_depth: 64,
        max_width: 2,
    });
    assert!(aligner
        .align(None, reference.find_first(NodeType::Select).unwrap())
        .is_err());
}

// --- Rubric ---

#[test]
fn missing_filter_scores_half() {
    let reference = canonical("SELECT Eno FROM EMP WHERE incentive > 5000");
    let student = canonical("SELECT Eno FROM EMP");
    let score = score_by_rubric(&student, &reference, &RubricWeights::default_rubric()).unwrap();
    assert!((score.obtained - 50.0).abs() < 1e-9);
    assert!((score.total - 100.0).abs() < 1e-9);

    let filters = score
        .categories
        .iter()
        .find(|c| c.category == RubricCategory::Filters)
        .unwrap();
    assert!(filters.graded);
    assert_eq!(filters.points, 0.0);
}

#[test]
fn partial_filter_credit() {
    let reference = canonical("SELECT a FROM t WHERE b > 1 AND c < 2 AND d = 3");
    let student = canonical("SELECT a FROM t WHERE b > 1 AND c < 5");
    let weights = RubricWeights::new().with("filters", 60.0);
    let score = score_by_rubric(&student, &reference, &weights).unwrap();
    // WHERE node, b > 1, one AND of two, out of 6 nodes.
    assert!((score.obtained - 30.0).abs() < 1e-9);
    assert!((score.total - 60.0).abs() < 1e-9);
}

#[test]
fn categories_absent_from_the_reference_are_not_graded() {
    let reference = canonical("SELECT a FROM t");
    let student = canonical("SELECT a FROM t ORDER BY a LIMIT 3");
    let weights = RubricWeights::new()
        .with("projections", 10.0)
        .with("sorting", 5.0)
        .with("limit", 5.0);
    let score = score_by_rubric(&student, &reference, &weights).unwrap();
    assert!((score.obtained - 10.0).abs() < 1e-9);
    assert!((score.total - 10.0).abs() < 1e-9);
    assert_eq!(score.categories.iter().filter(|c| !c.graded).count(), 2);
}

#[test]
fn grouping_and_having_categories() {
    let reference = canonical("SELECT dno, COUNT(*) FROM emp GROUP BY dno HAVING COUNT(*) > 2");
    let student = canonical("SELECT dno, COUNT(*) FROM emp GROUP BY dno HAVING COUNT(*) > 3");
    let weights = RubricWeights::new()
        .with("grouping", 10.0)
        .with("having", 10.0);
    let score = score_by_rubric(&student, &reference, &weights).unwrap();
    // Grouping is exact; HAVING earns only its clause node.
    assert!((score.obtained - 15.0).abs() < 1e-9);
}
