//! Grading tree nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{
    BinaryOp, ColumnConstraint, DataType, Expr, JoinType, NullOrdering, OrderDirection,
    SetOperator, TableConstraint,
};

/// The kind of a grading tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Query,
    Select,
    From,
    Where,
    Join,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Union,
    Table,
    Column,
    Condition,
    Function,
    Operator,
    Literal,
    CreateTable,
    AlterTable,
    ColumnDef,
    Constraint,
}

impl NodeType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::Join => "JOIN",
            Self::GroupBy => "GROUP_BY",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER_BY",
            Self::Limit => "LIMIT",
            Self::Union => "UNION",
            Self::Table => "TABLE",
            Self::Column => "COLUMN",
            Self::Condition => "CONDITION",
            Self::Function => "FUNCTION",
            Self::Operator => "OPERATOR",
            Self::Literal => "LITERAL",
            Self::CreateTable => "CREATE_TABLE",
            Self::AlterTable => "ALTER_TABLE",
            Self::ColumnDef => "COLUMN_DEF",
            Self::Constraint => "CONSTRAINT",
        }
    }

    /// Whether the tree aligner awards a point for this kind of node.
    ///
    /// Structural roots (`Query` and the DDL nodes) are not scored so that
    /// their clauses can be located and compared on their own.
    #[must_use]
    pub const fn is_scorable(&self) -> bool {
        !matches!(
            self,
            Self::Query | Self::CreateTable | Self::AlterTable | Self::ColumnDef | Self::Constraint
        )
    }

    /// Whether children are `Condition`s interleaved with `Operator`s.
    #[must_use]
    pub const fn holds_predicates(&self) -> bool {
        matches!(self, Self::Where | Self::Having | Self::Join)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connective between two conditions in a predicate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }

    #[must_use]
    pub const fn from_binary(op: BinaryOp) -> Option<Self> {
        match op {
            BinaryOp::And => Some(Self::And),
            BinaryOp::Or => Some(Self::Or),
            _ => None,
        }
    }
}

/// An expression in a list: a projection, a grouping key, a sort key or a
/// LIMIT value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprItem {
    pub expr: Expr,
    /// Projection alias.
    pub alias: Option<String>,
    /// Sort direction, for ORDER BY items.
    pub direction: Option<OrderDirection>,
    pub nulls: Option<NullOrdering>,
}

impl ExprItem {
    #[must_use]
    pub const fn new(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            direction: None,
            nulls: None,
        }
    }
}

impl fmt::Display for ExprItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        if self.direction == Some(OrderDirection::Desc) {
            f.write_str(" DESC")?;
        }
        if let Some(nulls) = &self.nulls {
            write!(f, " {}", nulls.as_str())?;
        }
        Ok(())
    }
}

/// A constraint, either attached to a column or declared at table level.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintDef {
    Column(ColumnConstraint),
    Table(TableConstraint),
}

impl fmt::Display for ConstraintDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(constraint) => write!(f, "{constraint}"),
            Self::Table(constraint) => write!(f, "{constraint}"),
        }
    }
}

/// Kind-specific attributes of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAttrs {
    /// Root of a SELECT statement or of a derived table.
    Query { alias: Option<String> },
    Select { distinct: bool },
    From,
    Where,
    Join { join_type: JoinType },
    GroupBy,
    Having,
    OrderBy,
    Limit { offset: Option<Expr> },
    Union { op: SetOperator },
    Table { name: String, alias: Option<String> },
    Column(ExprItem),
    Function(ExprItem),
    Literal(ExprItem),
    Condition { expr: Expr },
    Operator { op: LogicalOp },
    CreateTable { name: String, if_not_exists: bool },
    AlterTable { name: String },
    ColumnDef { name: String, data_type: DataType },
    Constraint(ConstraintDef),
}

impl NodeAttrs {
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::Query { .. } => NodeType::Query,
            Self::Select { .. } => NodeType::Select,
            Self::From => NodeType::From,
            Self::Where => NodeType::Where,
            Self::Join { .. } => NodeType::Join,
            Self::GroupBy => NodeType::GroupBy,
            Self::Having => NodeType::Having,
            Self::OrderBy => NodeType::OrderBy,
            Self::Limit { .. } => NodeType::Limit,
            Self::Union { .. } => NodeType::Union,
            Self::Table { .. } => NodeType::Table,
            Self::Column(_) => NodeType::Column,
            Self::Function(_) => NodeType::Function,
            Self::Literal(_) => NodeType::Literal,
            Self::Condition { .. } => NodeType::Condition,
            Self::Operator { .. } => NodeType::Operator,
            Self::CreateTable { .. } => NodeType::CreateTable,
            Self::AlterTable { .. } => NodeType::AlterTable,
            Self::ColumnDef { .. } => NodeType::ColumnDef,
            Self::Constraint(_) => NodeType::Constraint,
        }
    }

    /// Classifies a list expression as a `Function`, `Literal` or `Column`.
    #[must_use]
    pub fn for_item(item: ExprItem) -> Self {
        match &item.expr {
            Expr::Function(_) | Expr::Cast { .. } => Self::Function(item),
            expr if expr.is_constant() => Self::Literal(item),
            _ => Self::Column(item),
        }
    }

    /// Canonical text of the node.
    fn render(&self) -> String {
        match self {
            Self::Query { .. } => String::from("QUERY"),
            Self::Select { distinct: false } => String::from("SELECT"),
            Self::Select { distinct: true } => String::from("SELECT DISTINCT"),
            Self::From => String::from("FROM"),
            Self::Where => String::from("WHERE"),
            Self::Join { join_type } => String::from(join_type.as_str()),
            Self::GroupBy => String::from("GROUP BY"),
            Self::Having => String::from("HAVING"),
            Self::OrderBy => String::from("ORDER BY"),
            Self::Limit { offset: None } => String::from("LIMIT"),
            Self::Limit {
                offset: Some(offset),
            } => format!("LIMIT OFFSET {offset}"),
            Self::Union { op } => String::from(op.as_str()),
            Self::Table { name, alias: None } => name.clone(),
            Self::Table {
                name,
                alias: Some(alias),
            } => format!("{name} AS {alias}"),
            Self::Column(item) | Self::Function(item) | Self::Literal(item) => item.to_string(),
            Self::Condition { expr } => expr.to_string(),
            Self::Operator { op } => String::from(op.as_str()),
            Self::CreateTable {
                name,
                if_not_exists: false,
            } => format!("CREATE TABLE {name}"),
            Self::CreateTable {
                name,
                if_not_exists: true,
            } => format!("CREATE TABLE IF NOT EXISTS {name}"),
            Self::AlterTable { name } => format!("ALTER TABLE {name}"),
            Self::ColumnDef { name, data_type } => format!("{name} {data_type}"),
            Self::Constraint(constraint) => constraint.to_string(),
        }
    }
}

/// A node of the grading tree.
///
/// Each node owns its children; `value` is always the rendering of `attrs`.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    attrs: NodeAttrs,
    value: String,
    children: Vec<AstNode>,
}

impl AstNode {
    #[must_use]
    pub fn new(attrs: NodeAttrs, children: Vec<Self>) -> Self {
        let value = attrs.render();
        Self {
            attrs,
            value,
            children,
        }
    }

    #[must_use]
    pub fn leaf(attrs: NodeAttrs) -> Self {
        Self::new(attrs, vec![])
    }

    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.attrs.node_type()
    }

    #[must_use]
    pub const fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    #[must_use]
    pub fn into_parts(self) -> (NodeAttrs, Vec<Self>) {
        (self.attrs, self.children)
    }

    /// Iterates over this node and its descendants in pre-order.
    #[must_use]
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// First node of `node_type` in pre-order.
    #[must_use]
    pub fn find_first(&self, node_type: NodeType) -> Option<&Self> {
        self.iter().find(|node| node.node_type() == node_type)
    }

    /// Number of nodes in the subtree.
    #[must_use]
    pub fn size(&self) -> usize {
        self.iter().count()
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.node_type(), self.value)
    }
}

/// Pre-order iterator over an [`AstNode`] tree.
pub struct Preorder<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> AstNode {
        AstNode::leaf(NodeAttrs::for_item(ExprItem::new(Expr::qualified_column(
            "emp", name,
        ))))
    }

    #[test]
    fn value_follows_attrs() {
        let node = AstNode::leaf(NodeAttrs::Table {
            name: String::from("emp"),
            alias: Some(String::from("e")),
        });
        assert_eq!(node.value(), "emp AS e");
        assert_eq!(node.node_type(), NodeType::Table);
    }

    #[test]
    fn items_are_classified() {
        let count = Expr::Function(crate::ast::FunctionCall {
            name: String::from("count"),
            args: vec![Expr::Wildcard { table: None }],
            distinct: false,
        });
        assert_eq!(
            NodeAttrs::for_item(ExprItem::new(count)).node_type(),
            NodeType::Function
        );
        assert_eq!(
            NodeAttrs::for_item(ExprItem::new(Expr::integer(5))).node_type(),
            NodeType::Literal
        );
        assert_eq!(column("eno").node_type(), NodeType::Column);
    }

    #[test]
    fn order_items_render_desc_only() {
        let mut item = ExprItem::new(Expr::column("sal"));
        item.direction = Some(OrderDirection::Asc);
        assert_eq!(item.to_string(), "sal");
        item.direction = Some(OrderDirection::Desc);
        assert_eq!(item.to_string(), "sal DESC");
    }

    #[test]
    fn preorder_and_find_first() {
        let tree = AstNode::new(
            NodeAttrs::Query { alias: None },
            vec![AstNode::new(
                NodeAttrs::Select { distinct: false },
                vec![column("eno"), column("sal")],
            )],
        );
        let values: Vec<&str> = tree.iter().map(AstNode::value).collect();
        assert_eq!(values, ["QUERY", "SELECT", "emp.eno", "emp.sal"]);
        assert_eq!(
            tree.find_first(NodeType::Column).map(AstNode::value),
            Some("emp.eno")
        );
        assert!(tree.find_first(NodeType::Where).is_none());
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn node_type_names() {
        assert_eq!(
            serde_json::to_string(&NodeType::GroupBy).unwrap(),
            r#""GROUP_BY""#
        );
        assert!(NodeType::Union.is_scorable());
        assert!(!NodeType::Query.is_scorable());
    }
}
