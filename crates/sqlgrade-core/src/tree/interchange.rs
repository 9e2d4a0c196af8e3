//! JSON interchange format for grading trees.
//!
//! ```json
//! { "node_type": "CONDITION", "value": "emp.sal > 10",
//!   "metadata": { "condition": "emp.sal > 10" }, "children": [] }
//! ```
//!
//! Converting back into an [`AstNode`] re-parses the expression and
//! constraint text stored in `metadata`; `value` is recomputed and ignored
//! on input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ast::{JoinType, NullOrdering, OrderDirection, SetOperator};
use crate::parser::{ParseError, Parser};

use super::node::{AstNode, ConstraintDef, ExprItem, LogicalOp, NodeAttrs, NodeType};

/// Errors raised when an interchange record does not describe a valid node.
#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("{node_type} node is missing metadata field '{field}'")]
    MissingField {
        node_type: NodeType,
        field: &'static str,
    },

    #[error("{node_type} node has an invalid '{field}': {reason}")]
    InvalidField {
        node_type: NodeType,
        field: &'static str,
        reason: String,
    },

    #[error("{node_type} node text does not parse: {source}")]
    Parse {
        node_type: NodeType,
        #[source]
        source: ParseError,
    },

    #[error("Invalid interchange JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable form of an [`AstNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeNode {
    pub node_type: NodeType,
    pub value: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<InterchangeNode>,
}

impl InterchangeNode {
    /// Parses an interchange record from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InterchangeError::Json`] if the text is not an interchange
    /// record.
    pub fn from_json_str(json: &str) -> Result<Self, InterchangeError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<&AstNode> for InterchangeNode {
    fn from(node: &AstNode) -> Self {
        let mut metadata = Map::new();
        let mut put = |key: &str, value: Value| {
            metadata.insert(key.to_string(), value);
        };

        match node.attrs() {
            NodeAttrs::Query { alias } => {
                if let Some(alias) = alias {
                    put("alias", Value::from(alias.as_str()));
                }
            }
            NodeAttrs::Select { distinct } => put("distinct", Value::from(*distinct)),
            NodeAttrs::From | NodeAttrs::Where | NodeAttrs::GroupBy | NodeAttrs::Having => {}
            NodeAttrs::OrderBy => {}
            NodeAttrs::Join { join_type } => put("join_type", Value::from(join_type.as_str())),
            NodeAttrs::Limit { offset } => {
                if let Some(offset) = offset {
                    put("offset", Value::from(offset.to_string()));
                }
            }
            NodeAttrs::Union { op } => put("operator", Value::from(op.as_str())),
            NodeAttrs::Table { name, alias } => {
                put("table_name", Value::from(name.as_str()));
                if let Some(alias) = alias {
                    put("alias", Value::from(alias.as_str()));
                }
            }
            NodeAttrs::Column(item) | NodeAttrs::Function(item) | NodeAttrs::Literal(item) => {
                put("expression", Value::from(item.expr.to_string()));
                if let Some(alias) = &item.alias {
                    put("alias", Value::from(alias.as_str()));
                }
                if let Some(direction) = &item.direction {
                    put("direction", Value::from(direction.as_str()));
                }
                if let Some(nulls) = &item.nulls {
                    put("nulls", Value::from(nulls.as_str()));
                }
            }
            NodeAttrs::Condition { expr } => put("condition", Value::from(expr.to_string())),
            NodeAttrs::Operator { op } => put("operator", Value::from(op.as_str())),
            NodeAttrs::CreateTable {
                name,
                if_not_exists,
            } => {
                put("table_name", Value::from(name.as_str()));
                put("if_not_exists", Value::from(*if_not_exists));
            }
            NodeAttrs::AlterTable { name } => put("table_name", Value::from(name.as_str())),
            NodeAttrs::ColumnDef { name, data_type } => {
                put("column_name", Value::from(name.as_str()));
                put("data_type", Value::from(data_type.to_string()));
            }
            NodeAttrs::Constraint(constraint) => {
                let scope = match constraint {
                    ConstraintDef::Column(_) => "column",
                    ConstraintDef::Table(_) => "table",
                };
                put("scope", Value::from(scope));
                put("definition", Value::from(constraint.to_string()));
            }
        }

        Self {
            node_type: node.node_type(),
            value: Some(node.value().to_string()),
            metadata,
            children: node.children().iter().map(Self::from).collect(),
        }
    }
}

impl TryFrom<InterchangeNode> for AstNode {
    type Error = InterchangeError;

    fn try_from(node: InterchangeNode) -> Result<Self, Self::Error> {
        let reader = Metadata {
            node_type: node.node_type,
            map: &node.metadata,
        };
        let attrs = reader.attrs()?;
        let children = node
            .children
            .into_iter()
            .map(Self::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(attrs, children))
    }
}

/// Typed access to the metadata of one interchange node.
struct Metadata<'a> {
    node_type: NodeType,
    map: &'a Map<String, Value>,
}

impl Metadata<'_> {
    fn attrs(&self) -> Result<NodeAttrs, InterchangeError> {
        let attrs = match self.node_type {
            NodeType::Query => NodeAttrs::Query {
                alias: self.optional_str("alias")?,
            },
            NodeType::Select => NodeAttrs::Select {
                distinct: self.optional_bool("distinct")?.unwrap_or(false),
            },
            NodeType::From => NodeAttrs::From,
            NodeType::Where => NodeAttrs::Where,
            NodeType::GroupBy => NodeAttrs::GroupBy,
            NodeType::Having => NodeAttrs::Having,
            NodeType::OrderBy => NodeAttrs::OrderBy,
            NodeType::Join => {
                let name = self.required_str("join_type")?;
                let join_type = JoinType::from_name(&name)
                    .ok_or_else(|| self.invalid("join_type", format!("unknown join '{name}'")))?;
                NodeAttrs::Join { join_type }
            }
            NodeType::Limit => {
                let offset = match self.optional_str("offset")? {
                    Some(text) => Some(self.parse(&text, |p| p.parse_standalone_expression())?),
                    None => None,
                };
                NodeAttrs::Limit { offset }
            }
            NodeType::Union => {
                let name = self.required_str("operator")?;
                let op = SetOperator::from_name(&name)
                    .ok_or_else(|| self.invalid("operator", format!("unknown operator '{name}'")))?;
                NodeAttrs::Union { op }
            }
            NodeType::Table => NodeAttrs::Table {
                name: self.required_str("table_name")?.to_lowercase(),
                alias: self.optional_str("alias")?.map(|a| a.to_lowercase()),
            },
            NodeType::Column => NodeAttrs::Column(self.item()?),
            NodeType::Function => NodeAttrs::Function(self.item()?),
            NodeType::Literal => NodeAttrs::Literal(self.item()?),
            NodeType::Condition => {
                let text = self.required_str("condition")?;
                NodeAttrs::Condition {
                    expr: self.parse(&text, |p| p.parse_standalone_expression())?,
                }
            }
            NodeType::Operator => {
                let name = self.required_str("operator")?;
                let op = LogicalOp::from_name(&name)
                    .ok_or_else(|| self.invalid("operator", format!("unknown operator '{name}'")))?;
                NodeAttrs::Operator { op }
            }
            NodeType::CreateTable => NodeAttrs::CreateTable {
                name: self.required_str("table_name")?.to_lowercase(),
                if_not_exists: self.optional_bool("if_not_exists")?.unwrap_or(false),
            },
            NodeType::AlterTable => NodeAttrs::AlterTable {
                name: self.required_str("table_name")?.to_lowercase(),
            },
            NodeType::ColumnDef => {
                let text = self.required_str("data_type")?;
                NodeAttrs::ColumnDef {
                    name: self.required_str("column_name")?.to_lowercase(),
                    data_type: self.parse(&text, |p| p.parse_standalone_data_type())?,
                }
            }
            NodeType::Constraint => {
                let text = self.required_str("definition")?;
                let constraint = match self.required_str("scope")?.as_str() {
                    "column" => ConstraintDef::Column(
                        self.parse(&text, |p| p.parse_standalone_column_constraint())?,
                    ),
                    "table" => ConstraintDef::Table(
                        self.parse(&text, |p| p.parse_standalone_table_constraint())?,
                    ),
                    other => {
                        return Err(self.invalid("scope", format!("unknown scope '{other}'")));
                    }
                };
                NodeAttrs::Constraint(constraint)
            }
        };
        Ok(attrs)
    }

    fn item(&self) -> Result<ExprItem, InterchangeError> {
        let text = self.required_str("expression")?;
        let direction = match self.optional_str("direction")?.as_deref() {
            None => None,
            Some(d) if d.eq_ignore_ascii_case("ASC") => Some(OrderDirection::Asc),
            Some(d) if d.eq_ignore_ascii_case("DESC") => Some(OrderDirection::Desc),
            Some(other) => {
                return Err(self.invalid("direction", format!("unknown direction '{other}'")));
            }
        };
        let nulls = match self.optional_str("nulls")?.as_deref() {
            None => None,
            Some(n) if n.eq_ignore_ascii_case("NULLS FIRST") => Some(NullOrdering::First),
            Some(n) if n.eq_ignore_ascii_case("NULLS LAST") => Some(NullOrdering::Last),
            Some(other) => {
                return Err(self.invalid("nulls", format!("unknown null ordering '{other}'")));
            }
        };
        Ok(ExprItem {
            expr: self.parse(&text, |p| p.parse_standalone_expression())?,
            alias: self.optional_str("alias")?.map(|a| a.to_lowercase()),
            direction,
            nulls,
        })
    }

    fn parse<T>(
        &self,
        text: &str,
        f: impl FnOnce(&mut Parser<'_>) -> Result<T, ParseError>,
    ) -> Result<T, InterchangeError> {
        f(&mut Parser::new(text)).map_err(|source| InterchangeError::Parse {
            node_type: self.node_type,
            source,
        })
    }

    fn required_str(&self, field: &'static str) -> Result<String, InterchangeError> {
        self.optional_str(field)?
            .ok_or(InterchangeError::MissingField {
                node_type: self.node_type,
                field,
            })
    }

    fn optional_str(&self, field: &'static str) -> Result<Option<String>, InterchangeError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(field, format!("expected a string, got {other}"))),
        }
    }

    fn optional_bool(&self, field: &'static str) -> Result<Option<bool>, InterchangeError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(field, format!("expected a boolean, got {other}"))),
        }
    }

    fn invalid(&self, field: &'static str, reason: String) -> InterchangeError {
        InterchangeError::InvalidField {
            node_type: self.node_type,
            field,
            reason,
        }
    }
}
