//! Greedy recursive alignment of grading trees.

use serde::{Deserialize, Serialize};

use crate::config::Limits;
use crate::error::StructuralLimitExceeded;
use crate::tree::AstNode;

/// Points earned by a submission subtree against a reference subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Matching scorable nodes.
    pub obtained: usize,
    /// Scorable nodes in the reference subtree.
    pub total: usize,
}

impl Alignment {
    /// `obtained / total`, or 0 for a subtree with nothing to score.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.obtained as f64 / self.total as f64;
        ratio
    }
}

/// Aligns submission subtrees to reference subtrees one level at a time.
///
/// At each level every reference child takes the unconsumed submission child
/// of the same kind that earns the most points, so a submission child is
/// never credited twice. The choice is greedy per level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeAligner {
    limits: Limits,
}

impl TreeAligner {
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Aligns `student` (if any) against `reference`.
    pub fn align(
        &self,
        student: Option<&AstNode>,
        reference: &AstNode,
    ) -> Result<Alignment, StructuralLimitExceeded> {
        self.align_at(student, reference, 0)
    }

    fn align_at(
        &self,
        student: Option<&AstNode>,
        reference: &AstNode,
        depth: usize,
    ) -> Result<Alignment, StructuralLimitExceeded> {
        self.limits.check_depth(depth)?;
        self.limits.check_width(reference.children().len())?;

        let mut alignment = Alignment::default();
        if reference.node_type().is_scorable() {
            alignment.total += 1;
            if student.is_some_and(|s| nodes_match(s, reference)) {
                alignment.obtained += 1;
            }
        }

        let candidates = student.map_or(&[][..], AstNode::children);
        self.limits.check_width(candidates.len())?;
        let mut consumed = vec![false; candidates.len()];

        for child in reference.children() {
            let mut best: Option<(usize, Alignment)> = None;
            for (index, candidate) in candidates.iter().enumerate() {
                if consumed[index] || candidate.node_type() != child.node_type() {
                    continue;
                }
                let scored = self.align_at(Some(candidate), child, depth + 1)?;
                if scored.obtained == 0 {
                    continue;
                }
                match best {
                    Some((_, current)) if scored.obtained <= current.obtained => {}
                    _ => best = Some((index, scored)),
                }
            }

            let scored = match best {
                Some((index, scored)) => {
                    consumed[index] = true;
                    scored
                }
                None => self.align_at(None, child, depth + 1)?,
            };
            alignment.obtained += scored.obtained;
            alignment.total += scored.total;
        }

        Ok(alignment)
    }
}

fn nodes_match(student: &AstNode, reference: &AstNode) -> bool {
    student.node_type() == reference.node_type()
        && student.value().trim().to_lowercase() == reference.value().trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::error::LimitDimension;
    use crate::tree::{ExprItem, NodeAttrs};

    fn column(name: &str) -> AstNode {
        AstNode::leaf(NodeAttrs::Column(ExprItem::new(Expr::column(name))))
    }

    fn select(columns: &[&str]) -> AstNode {
        AstNode::new(
            NodeAttrs::Select { distinct: false },
            columns.iter().map(|c| column(c)).collect(),
        )
    }

    #[test]
    fn identical_trees_score_full() {
        let tree = select(&["a", "b"]);
        let alignment = TreeAligner::default().align(Some(&tree), &tree).unwrap();
        assert_eq!(alignment, Alignment { obtained: 3, total: 3 });
        assert!((alignment.ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_student_scores_zero() {
        let alignment = TreeAligner::default()
            .align(None, &select(&["a", "b"]))
            .unwrap();
        assert_eq!(alignment, Alignment { obtained: 0, total: 3 });
    }

    #[test]
    fn child_order_does_not_matter() {
        let alignment = TreeAligner::default()
            .align(Some(&select(&["b", "a"])), &select(&["a", "b"]))
            .unwrap();
        assert_eq!(alignment, Alignment { obtained: 3, total: 3 });
    }

    #[test]
    fn student_children_are_consumed_once() {
        let alignment = TreeAligner::default()
            .align(Some(&select(&["a"])), &select(&["a", "a"]))
            .unwrap();
        assert_eq!(alignment, Alignment { obtained: 2, total: 3 });
    }

    #[test]
    fn values_compare_case_insensitively() {
        let alignment = TreeAligner::default()
            .align(Some(&select(&["A"])), &select(&["a"]))
            .unwrap();
        assert_eq!(alignment.obtained, 2);
    }

    #[test]
    fn depth_is_bounded() {
        let aligner = TreeAligner::new(Limits {
            max_depth: 0,
            max_width: 8,
        });
        let tree = select(&["a"]);
        let err = aligner.align(Some(&tree), &tree).unwrap_err();
        assert_eq!(err.dimension, LimitDimension::Depth);
    }

    #[test]
    fn width_is_bounded() {
        let aligner = TreeAligner::new(Limits {
            max_depth: 8,
            max_width: 1,
        });
        let tree = select(&["a", "b"]);
        let err = aligner.align(Some(&tree), &tree).unwrap_err();
        assert_eq!(err.dimension, LimitDimension::Width);
    }
}
