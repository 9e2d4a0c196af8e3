//! Tests for the JSON interchange format.

mod common;
use common::*;

use sqlgrade_core::tree::InterchangeError;
use sqlgrade_core::{canonicalize, extract_features, parse, AstNode, InterchangeNode, NodeType};

fn through_json(tree: &AstNode) -> AstNode {
    let json = serde_json::to_string(&InterchangeNode::from(tree)).unwrap();
    AstNode::try_from(InterchangeNode::from_json_str(&json).unwrap()).unwrap()
}

#[test]
fn canonical_trees_survive_json() {
    for sql in [
        "SELECT Eno FROM EMP WHERE incentive > 5000",
        "SELECT e.ename, d.dname FROM emp e RIGHT JOIN dept d USING (dno) WHERE d.loc LIKE 'O%' OR e.sal IS NULL",
        "SELECT dno, SUM(sal) AS total FROM emp GROUP BY dno HAVING SUM(sal) BETWEEN 1 AND 10 ORDER BY total DESC LIMIT 2, 5",
        "SELECT x.n FROM (SELECT COUNT(1) AS n FROM emp) AS x INTERSECT SELECT 3",
        "SELECT CASE WHEN sal > 10 THEN 'high' ELSE 'low' END, CAST(sal AS DECIMAL(8, 2)) FROM emp",
        "ALTER TABLE emp ADD CONSTRAINT fk FOREIGN KEY (dno) REFERENCES dept (dno)",
    ] {
        let tree = canonical(sql);
        assert_eq!(through_json(&tree), tree, "{sql}");
    }
}

#[test]
fn restored_trees_grade_the_same() {
    let tree = canonicalize(
        parse(
            "SELECT ename FROM emp, dept WHERE emp.dno = dept.dno AND dname = 'Sales'",
            Some(&emp_schema()),
        )
        .unwrap(),
    );
    assert_eq!(
        extract_features(&through_json(&tree)),
        extract_features(&tree)
    );
}

#[test]
fn clause_records() {
    let tree = canonical("SELECT a AS b FROM t ORDER BY a DESC LIMIT 1 OFFSET 2");
    let json = serde_json::to_value(InterchangeNode::from(&tree)).unwrap();

    let select = &json["children"][0];
    assert_eq!(select["node_type"], "SELECT");
    assert_eq!(select["metadata"]["distinct"], false);
    assert_eq!(select["children"][0]["value"], "t.a AS b");
    assert_eq!(select["children"][0]["metadata"]["alias"], "b");

    let order = &json["children"][2];
    assert_eq!(order["node_type"], "ORDER_BY");
    assert_eq!(order["children"][0]["metadata"]["direction"], "DESC");

    let limit = &json["children"][3];
    assert_eq!(limit["metadata"]["offset"], "2");
    assert_eq!(limit["children"][0]["value"], "1");
}

#[test]
fn unknown_node_types_are_rejected() {
    let json = r#"{"node_type": "WINDOW", "value": null}"#;
    assert!(matches!(
        InterchangeNode::from_json_str(json),
        Err(InterchangeError::Json(_))
    ));
}

#[test]
fn bad_join_type_is_rejected() {
    let json = r#"{"node_type": "JOIN", "value": null, "metadata": {"join_type": "SIDEWAYS JOIN"}}"#;
    let node = InterchangeNode::from_json_str(json).unwrap();
    assert!(matches!(
        AstNode::try_from(node),
        Err(InterchangeError::InvalidField {
            node_type: NodeType::Join,
            field: "join_type",
            ..
        })
    ));
}
