//! Feature extraction.
//!
//! A feature is a clause-tagged canonical fragment such as `FILTER:emp.sal > 10`.
//! Comparing two queries' feature sets is the coarse half of grading.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::Statement;
use crate::canonical::{canonicalize, predicate_text};
use crate::tree::{lower, AstNode, ConstraintDef, LogicalOp, NodeAttrs, NodeType};

/// The clause a feature was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureTag {
    Table,
    Select,
    Filter,
    /// A condition of a LEFT, RIGHT or FULL join.
    OuterJoinFilter,
    Having,
    Group,
    Order,
    Limit,
    ColDef,
    Constraint,
    TableConstraint,
}

impl FeatureTag {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Select => "SELECT",
            Self::Filter => "FILTER",
            Self::OuterJoinFilter => "OUTER_JOIN_FILTER",
            Self::Having => "HAVING",
            Self::Group => "GROUP",
            Self::Order => "ORDER",
            Self::Limit => "LIMIT",
            Self::ColDef => "COL_DEF",
            Self::Constraint => "CONSTRAINT",
            Self::TableConstraint => "TABLE_CONSTRAINT",
        }
    }
}

impl fmt::Display for FeatureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of `TAG:fragment` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: FeatureTag, fragment: &str) {
        self.0.insert(format!("{tag}:{fragment}"));
    }

    #[must_use]
    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates features in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Features present in both sets, sorted.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Vec<String> {
        self.0.intersection(&other.0).cloned().collect()
    }

    /// Features of `self` missing from `other`, sorted.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Extracts the feature set of a canonical tree.
#[must_use]
pub fn extract_features(tree: &AstNode) -> FeatureSet {
    let mut features = FeatureSet::new();
    collect(tree, &mut features);
    features
}

fn collect(node: &AstNode, features: &mut FeatureSet) {
    match node.attrs() {
        NodeAttrs::Query { .. } | NodeAttrs::Union { .. } | NodeAttrs::From => {
            for child in node.children() {
                collect(child, features);
            }
        }
        NodeAttrs::Select { .. } => items(node, FeatureTag::Select, features),
        NodeAttrs::GroupBy => items(node, FeatureTag::Group, features),
        NodeAttrs::OrderBy => items(node, FeatureTag::Order, features),
        NodeAttrs::Where => predicates(node.children().iter(), FeatureTag::Filter, features),
        NodeAttrs::Having => predicates(node.children().iter(), FeatureTag::Having, features),
        NodeAttrs::Join { join_type } => {
            let tag = if join_type.is_outer() {
                FeatureTag::OuterJoinFilter
            } else {
                FeatureTag::Filter
            };
            let (sources, conditions): (Vec<&AstNode>, Vec<&AstNode>) =
                node.children().iter().partition(|child| {
                    !matches!(
                        child.node_type(),
                        NodeType::Condition | NodeType::Operator
                    )
                });
            for source in sources {
                collect(source, features);
            }
            predicates(conditions, tag, features);
        }
        NodeAttrs::Limit { offset } => {
            if let Some(limit) = node.children().first() {
                match offset {
                    Some(offset) => {
                        features.insert(FeatureTag::Limit, &format!("{} OFFSET {offset}", limit.value()));
                    }
                    None => features.insert(FeatureTag::Limit, limit.value()),
                }
            }
        }
        NodeAttrs::Table { name, .. } => features.insert(FeatureTag::Table, name),
        NodeAttrs::CreateTable { name, .. } | NodeAttrs::AlterTable { name } => {
            features.insert(FeatureTag::Table, name);
            for child in node.children() {
                collect(child, features);
            }
        }
        NodeAttrs::ColumnDef { name, data_type } => {
            features.insert(FeatureTag::ColDef, &format!("{name} TYPE:{data_type}"));
            for child in node.children() {
                features.insert(FeatureTag::Constraint, &format!("{name}->{}", child.value()));
            }
        }
        NodeAttrs::Constraint(ConstraintDef::Table(_)) => {
            features.insert(FeatureTag::TableConstraint, node.value());
        }
        // Reached only through their parents above.
        NodeAttrs::Constraint(ConstraintDef::Column(_))
        | NodeAttrs::Column(_)
        | NodeAttrs::Function(_)
        | NodeAttrs::Literal(_)
        | NodeAttrs::Condition { .. }
        | NodeAttrs::Operator { .. } => {}
    }
}

fn items(node: &AstNode, tag: FeatureTag, features: &mut FeatureSet) {
    for child in node.children() {
        features.insert(tag, child.value());
        nested_queries(child, features);
    }
}

/// Collects from subqueries inside a condition or list item.
fn nested_queries(node: &AstNode, features: &mut FeatureSet) {
    let expr = match node.attrs() {
        NodeAttrs::Condition { expr } => expr,
        NodeAttrs::Column(item) | NodeAttrs::Function(item) | NodeAttrs::Literal(item) => {
            &item.expr
        }
        _ => return,
    };
    for query in expr.subqueries() {
        let tree = canonicalize(lower(Statement::Query(query.clone())));
        collect(&tree, features);
    }
}

/// One feature per AND-ed condition, or a single feature for the whole list
/// when it contains a top-level OR.
fn predicates<'a>(
    nodes: impl IntoIterator<Item = &'a AstNode>,
    tag: FeatureTag,
    features: &mut FeatureSet,
) {
    let nodes: Vec<&AstNode> = nodes.into_iter().collect();
    for node in &nodes {
        nested_queries(node, features);
    }
    let has_or = nodes
        .iter()
        .any(|n| matches!(n.attrs(), NodeAttrs::Operator { op: LogicalOp::Or }));
    if has_or {
        features.insert(tag, &predicate_text(nodes));
        return;
    }
    for node in nodes {
        if node.node_type() == NodeType::Condition {
            features.insert(tag, node.value());
        }
    }
}
