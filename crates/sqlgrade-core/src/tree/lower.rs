//! Lowering of parsed statements into grading trees.
//!
//! A SELECT becomes a `Query` root with one child per clause present, in
//! source clause order. WHERE, HAVING and join conditions are split on their
//! top-level AND/OR into `Condition` leaves interleaved with `Operator`
//! nodes; anything parenthesized stays inside a single condition.

use crate::ast::{
    AlterTableAction, AlterTableStatement, ColumnDef, CreateTableStatement, Expr, JoinClause,
    OrderBy, Query, SelectStatement, Statement, TableRef,
};

use super::node::{AstNode, ConstraintDef, ExprItem, LogicalOp, NodeAttrs};

/// Lowers a (qualified) statement into a grading tree.
#[must_use]
pub fn lower(statement: Statement) -> AstNode {
    match statement {
        Statement::Query(query) => lower_query(query, None),
        Statement::CreateTable(create) => lower_create_table(create),
        Statement::AlterTable(alter) => lower_alter_table(alter),
    }
}

/// Lowers a query; `alias` names a derived table.
fn lower_query(query: Query, alias: Option<String>) -> AstNode {
    let children = match query {
        Query::Select(select) => lower_select(*select),
        Query::Compound { op, left, right } => vec![AstNode::new(
            NodeAttrs::Union { op },
            vec![lower_query(*left, None), lower_query(*right, None)],
        )],
    };
    AstNode::new(NodeAttrs::Query { alias }, children)
}

fn lower_select(select: SelectStatement) -> Vec<AstNode> {
    let SelectStatement {
        distinct,
        columns,
        from,
        where_clause,
        group_by,
        having,
        order_by,
        limit,
        offset,
    } = select;

    let mut clauses = vec![];

    let projections = columns
        .into_iter()
        .map(|column| {
            item_node(ExprItem {
                alias: column.alias,
                ..ExprItem::new(column.expr)
            })
        })
        .collect();
    clauses.push(AstNode::new(NodeAttrs::Select { distinct }, projections));

    if !from.is_empty() {
        let mut items = vec![];
        for table_ref in from {
            lower_table_ref(table_ref, &mut items);
        }
        clauses.push(AstNode::new(NodeAttrs::From, items));
    }

    if let Some(where_clause) = where_clause {
        clauses.push(AstNode::new(
            NodeAttrs::Where,
            predicate_children(where_clause),
        ));
    }

    if !group_by.is_empty() {
        let keys = group_by
            .into_iter()
            .map(|expr| item_node(ExprItem::new(expr)))
            .collect();
        clauses.push(AstNode::new(NodeAttrs::GroupBy, keys));
    }

    if let Some(having) = having {
        clauses.push(AstNode::new(NodeAttrs::Having, predicate_children(having)));
    }

    if !order_by.is_empty() {
        let keys = order_by
            .into_iter()
            .map(|OrderBy { expr, direction, nulls }| {
                item_node(ExprItem {
                    direction: Some(direction),
                    nulls,
                    ..ExprItem::new(expr)
                })
            })
            .collect();
        clauses.push(AstNode::new(NodeAttrs::OrderBy, keys));
    }

    if limit.is_some() || offset.is_some() {
        let children = limit
            .map(|expr| AstNode::leaf(NodeAttrs::Literal(ExprItem::new(expr))))
            .into_iter()
            .collect();
        clauses.push(AstNode::new(NodeAttrs::Limit { offset }, children));
    }

    clauses
}

fn item_node(item: ExprItem) -> AstNode {
    AstNode::leaf(NodeAttrs::for_item(item))
}

/// Appends the nodes for one FROM item: a table or derived table, followed
/// by one `Join` node per join.
fn lower_table_ref(table_ref: TableRef, out: &mut Vec<AstNode>) {
    match table_ref {
        TableRef::Table { name, alias, .. } => {
            out.push(AstNode::leaf(NodeAttrs::Table { name, alias }));
        }
        TableRef::Subquery { query, alias } => out.push(lower_query(*query, alias)),
        TableRef::Join { left, join } => {
            let left_name = reference_name(&left);
            lower_table_ref(*left, out);

            let JoinClause {
                join_type,
                table,
                on,
                using,
            } = *join;
            let right_name = reference_name(&table);

            let mut children = vec![];
            lower_table_ref(table, &mut children);
            let condition = on.or_else(|| using_condition(left_name, right_name, using));
            if let Some(condition) = condition {
                children.extend(predicate_children(condition));
            }
            out.push(AstNode::new(NodeAttrs::Join { join_type }, children));
        }
    }
}

/// The name columns of this FROM item are qualified with. For a join, the
/// rightmost relation.
fn reference_name(table_ref: &TableRef) -> Option<String> {
    match table_ref {
        TableRef::Table { name, alias, .. } => Some(alias.clone().unwrap_or_else(|| name.clone())),
        TableRef::Subquery { alias, .. } => alias.clone(),
        TableRef::Join { join, .. } => reference_name(&join.table),
    }
}

/// Rewrites `USING (a, b)` as `l.a = r.a AND l.b = r.b`.
fn using_condition(
    left: Option<String>,
    right: Option<String>,
    using: Vec<String>,
) -> Option<Expr> {
    using
        .into_iter()
        .map(|column| {
            Expr::Column {
                table: left.clone(),
                name: column.clone(),
            }
            .eq(Expr::Column {
                table: right.clone(),
                name: column,
            })
        })
        .reduce(Expr::and)
}

/// Splits a predicate on its top-level AND/OR.
fn predicate_children(expr: Expr) -> Vec<AstNode> {
    let mut out = vec![];
    flatten_predicate(expr.unparen(), &mut out);
    out
}

fn flatten_predicate(expr: Expr, out: &mut Vec<AstNode>) {
    // Walk the left spine iteratively; chains are left-associative.
    let mut tails = Vec::new();
    let mut head = expr;
    loop {
        match head {
            Expr::Binary { left, op, right } => match LogicalOp::from_binary(op) {
                Some(op) => {
                    tails.push((op, *right));
                    head = *left;
                }
                None => {
                    head = Expr::Binary { left, op, right };
                    break;
                }
            },
            other => {
                head = other;
                break;
            }
        }
    }

    out.push(AstNode::leaf(NodeAttrs::Condition { expr: head }));
    for (op, right) in tails.into_iter().rev() {
        out.push(AstNode::leaf(NodeAttrs::Operator { op }));
        flatten_predicate(right, out);
    }
}

fn lower_create_table(create: CreateTableStatement) -> AstNode {
    let CreateTableStatement {
        name,
        if_not_exists,
        columns,
        constraints,
    } = create;

    let mut children: Vec<AstNode> = columns.into_iter().map(lower_column_def).collect();
    children.extend(
        constraints
            .into_iter()
            .map(|c| AstNode::leaf(NodeAttrs::Constraint(ConstraintDef::Table(c)))),
    );
    AstNode::new(
        NodeAttrs::CreateTable {
            name,
            if_not_exists,
        },
        children,
    )
}

fn lower_alter_table(alter: AlterTableStatement) -> AstNode {
    let child = match alter.action {
        AlterTableAction::AddColumn(column) => lower_column_def(column),
        AlterTableAction::AddConstraint(constraint) => {
            AstNode::leaf(NodeAttrs::Constraint(ConstraintDef::Table(constraint)))
        }
    };
    AstNode::new(NodeAttrs::AlterTable { name: alter.name }, vec![child])
}

fn lower_column_def(column: ColumnDef) -> AstNode {
    let constraints = column
        .constraints
        .into_iter()
        .map(|c| AstNode::leaf(NodeAttrs::Constraint(ConstraintDef::Column(c))))
        .collect();
    AstNode::new(
        NodeAttrs::ColumnDef {
            name: column.name,
            data_type: column.data_type,
        },
        constraints,
    )
}
