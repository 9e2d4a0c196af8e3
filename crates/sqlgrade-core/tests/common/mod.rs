#![allow(dead_code)]

use sqlgrade_core::ast::{Query, Statement};
use sqlgrade_core::{
    canonicalize, extract_features, parse, AstNode, ParseError, Parser, SchemaDescriptor,
};

pub fn parse_statement(sql: &str) -> Statement {
    Parser::new(sql)
        .parse_statement()
        .unwrap_or_else(|e| panic!("Failed to parse: {sql}\nError: {e:?}"))
}

pub fn parse_err(sql: &str) -> ParseError {
    Parser::new(sql)
        .parse_statement()
        .expect_err(&format!("Expected parse error for: {sql}"))
}

pub fn parse_query(sql: &str) -> Query {
    match parse_statement(sql) {
        Statement::Query(q) => q,
        other => panic!("Expected a query, got {other:?}"),
    }
}

/// Qualified, lowered tree without a schema.
pub fn tree(sql: &str) -> AstNode {
    parse(sql, None).unwrap_or_else(|e| panic!("Failed to parse: {sql}\nError: {e:?}"))
}

/// Canonical tree without a schema.
pub fn canonical(sql: &str) -> AstNode {
    canonicalize(tree(sql))
}

/// Sorted features of the canonical tree, without a schema.
pub fn features(sql: &str) -> Vec<String> {
    extract_features(&canonical(sql))
        .iter()
        .map(String::from)
        .collect()
}

/// Values of the children of the first node of the given kind.
pub fn clause_values(tree: &AstNode, node_type: sqlgrade_core::NodeType) -> Vec<String> {
    tree.find_first(node_type)
        .unwrap_or_else(|| panic!("No {node_type} node in {tree}"))
        .children()
        .iter()
        .map(|c| c.value().to_string())
        .collect()
}

pub fn emp_schema() -> SchemaDescriptor {
    SchemaDescriptor::new()
        .with_table(
            "EMP",
            [
                ("Eno", "varchar"),
                ("ename", "varchar"),
                ("dno", "int"),
                ("sal", "int"),
                ("incentive", "int"),
            ],
        )
        .with_table("dept", [("dno", "int"), ("dname", "varchar"), ("loc", "varchar")])
}

/// Verifies that rendering a query yields a fixed point:
/// the rendering re-parses to a query with the same rendering.
pub fn round_trip(sql: &str) {
    let rendered1 = parse_query(sql).to_string();
    let rendered2 = parse_query(&rendered1).to_string();
    assert_eq!(
        rendered1, rendered2,
        "Round-trip failed.\n  Input:    {sql}\n  First:    {rendered1}\n  Second:   {rendered2}"
    );
}
