//! Grading trees.
//!
//! The grading tree is a coarser view of a statement than the [`ast`](crate::ast):
//! one node per clause, one node per list item, and predicates flattened into
//! conditions and connectives. Every node carries its canonical text as
//! `value`, which is what the scorers compare.

mod interchange;
mod lower;
mod node;

pub use interchange::{InterchangeError, InterchangeNode};
pub use lower::lower;
pub use node::{AstNode, ConstraintDef, ExprItem, LogicalOp, NodeAttrs, NodeType, Preorder};
