//! Canonicalization of grading trees.
//!
//! A single bottom-up pass rewrites a tree into a normal form in which
//! equivalent formulations share their text:
//!
//! - operands of `=`, `<>`, `OR`, `+` and `*` are ordered by their rendering
//! - `x IN (v)` becomes `x = v`, and `x NOT IN (v)` becomes `x <> v`
//! - `x BETWEEN a AND b` becomes `x >= a AND x <= b`
//! - `5000 < x` becomes `x > 5000`
//! - `COUNT(1)` becomes `COUNT(*)`
//! - redundant parentheses are dropped
//!
//! In WHERE, HAVING and join predicate lists, parenthesized conjunctions are
//! spliced into separate conditions and the OR-separated groups are sorted.
//! The pass is idempotent.

use std::mem;

use crate::ast::{
    BinaryOp, ColumnConstraint, ColumnConstraintKind, Expr, FunctionCall, JoinClause, Literal,
    Query, SelectStatement, TableConstraint, TableConstraintKind, TableRef,
};
use crate::tree::{AstNode, ConstraintDef, LogicalOp, NodeAttrs, NodeType};

/// Rewrites a tree into canonical form.
#[must_use]
pub fn canonicalize(node: AstNode) -> AstNode {
    let (attrs, children) = node.into_parts();
    let holds_predicates = attrs.node_type().holds_predicates();

    let children: Vec<AstNode> = children.into_iter().map(canonicalize).collect();
    let children = if holds_predicates {
        canonical_predicates(children)
    } else {
        children
    };

    AstNode::new(rewrite_attrs(attrs), children)
}

/// Text of a run of predicate nodes, e.g. `a = 1 AND b = 2`.
pub(crate) fn predicate_text<'a>(nodes: impl IntoIterator<Item = &'a AstNode>) -> String {
    nodes
        .into_iter()
        .map(AstNode::value)
        .collect::<Vec<_>>()
        .join(" ")
}

fn rewrite_attrs(attrs: NodeAttrs) -> NodeAttrs {
    match attrs {
        NodeAttrs::Column(mut item) | NodeAttrs::Function(mut item) => {
            rewrite_in_place(&mut item.expr);
            NodeAttrs::for_item(item)
        }
        NodeAttrs::Literal(mut item) => {
            rewrite_in_place(&mut item.expr);
            NodeAttrs::Literal(item)
        }
        NodeAttrs::Condition { expr } => NodeAttrs::Condition {
            expr: rewrite_expr(expr),
        },
        NodeAttrs::Limit { offset } => NodeAttrs::Limit {
            offset: offset.map(rewrite_expr),
        },
        NodeAttrs::Constraint(ConstraintDef::Column(ColumnConstraint { name, kind })) => {
            let kind = match kind {
                ColumnConstraintKind::Default(expr) => {
                    ColumnConstraintKind::Default(rewrite_expr(expr))
                }
                ColumnConstraintKind::Check(expr) => ColumnConstraintKind::Check(rewrite_expr(expr)),
                other => other,
            };
            NodeAttrs::Constraint(ConstraintDef::Column(ColumnConstraint { name, kind }))
        }
        NodeAttrs::Constraint(ConstraintDef::Table(TableConstraint {
            name,
            kind: TableConstraintKind::Check(expr),
        })) => NodeAttrs::Constraint(ConstraintDef::Table(TableConstraint {
            name,
            kind: TableConstraintKind::Check(rewrite_expr(expr)),
        })),
        other => other,
    }
}

/// Canonical order for the children of a WHERE, HAVING or JOIN node.
///
/// Non-predicate children (the joined table) keep their place in front.
fn canonical_predicates(children: Vec<AstNode>) -> Vec<AstNode> {
    let (mut out, predicates): (Vec<AstNode>, Vec<AstNode>) =
        children.into_iter().partition(|child| {
            !matches!(
                child.node_type(),
                NodeType::Condition | NodeType::Operator
            )
        });

    let mut flat = vec![];
    for node in predicates {
        let (attrs, children) = node.into_parts();
        match attrs {
            NodeAttrs::Condition {
                expr: Expr::Paren(inner),
            } if is_conjunction(&inner) => splice_conjunction(*inner, &mut flat),
            attrs => flat.push(AstNode::new(attrs, children)),
        }
    }

    let mut groups: Vec<Vec<AstNode>> = vec![vec![]];
    for node in flat {
        if matches!(node.attrs(), NodeAttrs::Operator { op: LogicalOp::Or }) {
            groups.push(vec![]);
        } else if let Some(group) = groups.last_mut() {
            group.push(node);
        }
    }
    groups.retain(|group| !group.is_empty());
    let mut groups: Vec<Vec<AstNode>> = groups.into_iter().map(sorted_conjunction).collect();
    groups.sort_by_cached_key(|group| predicate_text(group));

    for (i, group) in groups.into_iter().enumerate() {
        if i > 0 {
            out.push(AstNode::leaf(NodeAttrs::Operator { op: LogicalOp::Or }));
        }
        out.extend(group);
    }
    out
}

/// Orders the conditions of one AND group by their rendering.
fn sorted_conjunction(group: Vec<AstNode>) -> Vec<AstNode> {
    let mut conditions: Vec<AstNode> = group
        .into_iter()
        .filter(|node| node.node_type() == NodeType::Condition)
        .collect();
    conditions.sort_by_cached_key(|node| node.value().to_owned());

    let mut out = Vec::with_capacity(conditions.len() * 2);
    for (i, condition) in conditions.into_iter().enumerate() {
        if i > 0 {
            out.push(AstNode::leaf(NodeAttrs::Operator { op: LogicalOp::And }));
        }
        out.push(condition);
    }
    out
}

const fn is_conjunction(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::And,
            ..
        }
    )
}

fn splice_conjunction(expr: Expr, out: &mut Vec<AstNode>) {
    match expr {
        Expr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            splice_conjunction(*left, out);
            out.push(AstNode::leaf(NodeAttrs::Operator { op: LogicalOp::And }));
            splice_conjunction(*right, out);
        }
        Expr::Paren(inner) if is_conjunction(&inner) => splice_conjunction(*inner, out),
        other => out.push(AstNode::leaf(NodeAttrs::Condition { expr: other })),
    }
}

// --- Expressions ---

/// Rewrites an expression, children first.
#[must_use]
pub fn rewrite_expr(expr: Expr) -> Expr {
    normalize(rewrite_children(expr))
}

fn rewrite_in_place(expr: &mut Expr) {
    let owned = mem::replace(expr, Expr::Literal(Literal::Null));
    *expr = rewrite_expr(owned);
}

fn boxed(expr: Expr) -> Box<Expr> {
    Box::new(rewrite_expr(expr))
}

fn rewrite_children(expr: Expr) -> Expr {
    match expr {
        Expr::Binary { left, op, right } => Expr::Binary {
            left: boxed(*left),
            op,
            right: boxed(*right),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: boxed(*operand),
        },
        Expr::Function(call) => Expr::Function(FunctionCall {
            args: call.args.into_iter().map(rewrite_expr).collect(),
            ..call
        }),
        Expr::Subquery(query) => Expr::Subquery(Box::new(rewrite_query(*query))),
        Expr::Exists(query) => Expr::Exists(Box::new(rewrite_query(*query))),
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: boxed(*expr),
            negated,
        },
        Expr::In {
            expr,
            list,
            negated,
        } => Expr::In {
            expr: boxed(*expr),
            list: list.into_iter().map(rewrite_expr).collect(),
            negated,
        },
        Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Expr::InSubquery {
            expr: boxed(*expr),
            subquery: Box::new(rewrite_query(*subquery)),
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: boxed(*expr),
            low: boxed(*low),
            high: boxed(*high),
            negated,
        },
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => Expr::Case {
            operand: operand.map(|o| boxed(*o)),
            when_clauses: when_clauses
                .into_iter()
                .map(|(when, then)| (rewrite_expr(when), rewrite_expr(then)))
                .collect(),
            else_clause: else_clause.map(|e| boxed(*e)),
        },
        Expr::Cast { expr, data_type } => Expr::Cast {
            expr: boxed(*expr),
            data_type,
        },
        Expr::Paren(inner) => Expr::Paren(boxed(*inner)),
        leaf @ (Expr::Literal(_) | Expr::Column { .. } | Expr::Wildcard { .. }) => leaf,
    }
}

/// Applies the rewrite rules at the root of `expr`.
fn normalize(expr: Expr) -> Expr {
    match expr {
        // The renderer adds back whatever parentheses precedence needs.
        // Grouped connectives stay explicit so they read as one unit.
        Expr::Paren(inner) => {
            if matches!(
                inner.as_ref(),
                Expr::Binary {
                    op: BinaryOp::And | BinaryOp::Or,
                    ..
                }
            ) {
                Expr::Paren(inner)
            } else {
                *inner
            }
        }
        Expr::In {
            expr,
            mut list,
            negated,
        } if list.len() == 1 => {
            let value = list.swap_remove(0);
            let op = if negated {
                BinaryOp::NotEq
            } else {
                BinaryOp::Eq
            };
            normalize_binary(*expr, op, value)
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let lower = normalize_binary((*expr).clone(), BinaryOp::GtEq, *low);
            let upper = normalize_binary(*expr, BinaryOp::LtEq, *high);
            let range = lower.and(upper).paren();
            if negated {
                range.not()
            } else {
                range
            }
        }
        Expr::Binary { left, op, right } => normalize_binary(*left, op, *right),
        Expr::Function(call) if is_count_one(&call) => Expr::Function(FunctionCall {
            args: vec![Expr::Wildcard { table: None }],
            ..call
        }),
        other => other,
    }
}

/// Flips literal-left comparisons, then orders commutative operands.
fn normalize_binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let (left, op, right) = match op.flipped() {
        Some(flipped) if left.is_constant() && !right.is_constant() => (right, flipped, left),
        _ => (left, op, right),
    };

    if op.is_commutative() && left.to_string() > right.to_string() {
        right.binary(op, left)
    } else {
        left.binary(op, right)
    }
}

fn is_count_one(call: &FunctionCall) -> bool {
    call.name == "count"
        && !call.distinct
        && matches!(call.args.as_slice(), [Expr::Literal(Literal::Integer(1))])
}

// --- Subqueries ---

fn rewrite_query(query: Query) -> Query {
    match query {
        Query::Select(select) => Query::Select(Box::new(rewrite_select(*select))),
        Query::Compound { op, left, right } => Query::Compound {
            op,
            left: Box::new(rewrite_query(*left)),
            right: Box::new(rewrite_query(*right)),
        },
    }
}

fn rewrite_select(mut select: SelectStatement) -> SelectStatement {
    for column in &mut select.columns {
        rewrite_in_place(&mut column.expr);
    }
    select.from = select.from.into_iter().map(rewrite_table_ref).collect();
    let exprs = select
        .where_clause
        .iter_mut()
        .chain(select.group_by.iter_mut())
        .chain(select.having.iter_mut())
        .chain(select.order_by.iter_mut().map(|o| &mut o.expr))
        .chain(select.limit.iter_mut())
        .chain(select.offset.iter_mut());
    for expr in exprs {
        rewrite_in_place(expr);
    }
    select
}

fn rewrite_table_ref(table_ref: TableRef) -> TableRef {
    match table_ref {
        TableRef::Table { .. } => table_ref,
        TableRef::Subquery { query, alias } => TableRef::Subquery {
            query: Box::new(rewrite_query(*query)),
            alias,
        },
        TableRef::Join { left, join } => {
            let JoinClause {
                join_type,
                table,
                on,
                using,
            } = *join;
            TableRef::Join {
                left: Box::new(rewrite_table_ref(*left)),
                join: Box::new(JoinClause {
                    join_type,
                    table: rewrite_table_ref(table),
                    on: on.map(rewrite_expr),
                    using,
                }),
            }
        }
    }
}
