//! Abstract Syntax Tree (AST) types for SQL statements.
//!
//! Every node implements `Display`, producing the canonical text used for
//! node values and feature strings: keywords and function names uppercase,
//! identifiers lowercase, `<>` for inequality.

mod expression;
mod statement;
mod types;

pub use expression::{BinaryOp, Expr, FunctionCall, Literal, UnaryOp};
pub use statement::{
    AlterTableAction, AlterTableStatement, CreateTableStatement, JoinClause, JoinType,
    NullOrdering, OrderBy, OrderDirection, Query, SelectColumn, SelectStatement, SetOperator,
    Statement, TableRef,
};
pub use types::{
    ColumnConstraint, ColumnConstraintKind, ColumnDef, DataType, ForeignKeyTarget,
    TableConstraint, TableConstraintKind,
};
