//! Tests for the SQL parser: accepted syntax, rendering and errors.

mod common;
use common::*;

use sqlgrade_core::ast::{
    AlterTableAction, ColumnConstraintKind, DataType, Expr, JoinType, Query, Statement,
    TableConstraintKind, TableRef,
};
use sqlgrade_core::{LimitDimension, Limits, ParseError, Parser};

fn select_of(query: Query) -> sqlgrade_core::ast::SelectStatement {
    match query {
        Query::Select(select) => *select,
        other => panic!("Expected a plain SELECT, got {other:?}"),
    }
}

// --- Accepted syntax ---

#[test]
fn full_select_renders_canonically() {
    let query = parse_query(
        "select e.eno as id, count(*) from emp e where e.sal >= 10 \
         group by e.eno having count(*) > 1 order by id desc limit 5 offset 2",
    );
    assert_eq!(
        query.to_string(),
        "SELECT e.eno AS id, COUNT(*) FROM emp AS e WHERE e.sal >= 10 \
         GROUP BY e.eno HAVING COUNT(*) > 1 ORDER BY id DESC LIMIT 5 OFFSET 2"
    );
}

#[test]
fn mysql_limit_form() {
    let select = select_of(parse_query("SELECT a FROM t LIMIT 2, 5"));
    assert_eq!(select.limit, Some(Expr::integer(5)));
    assert_eq!(select.offset, Some(Expr::integer(2)));
}

#[test]
fn distinct_and_all() {
    assert!(select_of(parse_query("SELECT DISTINCT a FROM t")).distinct);
    assert!(!select_of(parse_query("SELECT ALL a FROM t")).distinct);
}

#[test]
fn join_variants() {
    let cases = [
        ("SELECT * FROM a JOIN b ON a.x = b.x", JoinType::Inner),
        ("SELECT * FROM a INNER JOIN b ON a.x = b.x", JoinType::Inner),
        ("SELECT * FROM a LEFT OUTER JOIN b ON a.x = b.x", JoinType::Left),
        ("SELECT * FROM a RIGHT JOIN b USING (x)", JoinType::Right),
        ("SELECT * FROM a FULL OUTER JOIN b ON a.x = b.x", JoinType::Full),
        ("SELECT * FROM a CROSS JOIN b", JoinType::Cross),
    ];
    for (sql, expected) in cases {
        let select = select_of(parse_query(sql));
        match &select.from[..] {
            [TableRef::Join { join, .. }] => assert_eq!(join.join_type, expected, "{sql}"),
            other => panic!("Expected one join for {sql}, got {other:?}"),
        }
    }
}

#[test]
fn comma_list_and_derived_table() {
    let select = select_of(parse_query(
        "SELECT x.a, u.b FROM (SELECT a FROM t) x, u WHERE x.a = u.a",
    ));
    assert_eq!(select.from.len(), 2);
    assert!(matches!(
        &select.from[0],
        TableRef::Subquery { alias: Some(alias), .. } if alias == "x"
    ));
}

#[test]
fn quoted_identifiers_are_unquoted_and_lowercased() {
    let query = parse_query(r#"SELECT "Eno" FROM "EMP""#);
    assert_eq!(query.to_string(), "SELECT eno FROM emp");
}

#[test]
fn expression_forms_round_trip() {
    round_trip(
        "SELECT a FROM t WHERE a NOT LIKE 'x%' AND b IS NOT NULL \
         AND c NOT IN (1, 2) AND d NOT BETWEEN 1 AND 5",
    );
    round_trip("SELECT CASE WHEN a > 1 THEN 'hi' ELSE 'lo' END, CAST(b AS INTEGER) FROM t");
    round_trip("SELECT a FROM t WHERE EXISTS (SELECT 1 FROM u WHERE u.id = t.id)");
    round_trip("SELECT a FROM t WHERE b IN (SELECT b FROM u) OR c = (SELECT MAX(c) FROM u)");
    round_trip("SELECT COUNT(DISTINCT a), t.* FROM t");
    round_trip("SELECT -a * (b + c) / 2 FROM t");
    round_trip("SELECT a FROM t UNION ALL SELECT a FROM u EXCEPT SELECT a FROM v");
}

#[test]
fn negated_forms_render_as_written() {
    let select = select_of(parse_query(
        "SELECT a FROM t WHERE a NOT LIKE 'x%' AND d NOT BETWEEN 1 AND 5",
    ));
    assert_eq!(
        select.where_clause.map(|w| w.to_string()).as_deref(),
        Some("a NOT LIKE 'x%' AND d NOT BETWEEN 1 AND 5")
    );
}

#[test]
fn not_equal_spellings() {
    let a = parse_query("SELECT a FROM t WHERE a != 1").to_string();
    let b = parse_query("SELECT a FROM t WHERE a <> 1").to_string();
    assert_eq!(a, b);
}

#[test]
fn create_table_with_constraints() {
    let Statement::CreateTable(create) = parse_statement(
        "CREATE TABLE IF NOT EXISTS emp (\
            eno VARCHAR(10) CONSTRAINT emp_pk PRIMARY KEY, \
            sal DECIMAL(8, 2) DEFAULT 0 CHECK (sal >= 0), \
            dno INT NOT NULL REFERENCES dept (dno), \
            UNIQUE (eno, dno), \
            FOREIGN KEY (dno) REFERENCES dept (dno) ON DELETE CASCADE)",
    ) else {
        panic!("Expected CREATE TABLE");
    };
    assert_eq!(create.name, "emp");
    assert!(create.if_not_exists);
    assert_eq!(create.columns.len(), 3);
    assert_eq!(create.columns[0].data_type, DataType::Varchar(Some(10)));
    assert_eq!(create.columns[0].constraints[0].name.as_deref(), Some("emp_pk"));
    assert_eq!(
        create.columns[0].constraints[0].kind,
        ColumnConstraintKind::PrimaryKey
    );
    assert_eq!(
        create.columns[1].data_type,
        DataType::Decimal {
            precision: Some(8),
            scale: Some(2)
        }
    );
    assert_eq!(create.columns[1].constraints.len(), 2);
    assert_eq!(create.constraints.len(), 2);
    assert!(matches!(
        create.constraints[1].kind,
        TableConstraintKind::ForeignKey { .. }
    ));
}

#[test]
fn alter_table_add_constraint() {
    let Statement::AlterTable(alter) =
        parse_statement("ALTER TABLE emp ADD CONSTRAINT emp_u UNIQUE (ename)")
    else {
        panic!("Expected ALTER TABLE");
    };
    assert_eq!(alter.name, "emp");
    match alter.action {
        AlterTableAction::AddConstraint(constraint) => {
            assert_eq!(constraint.name.as_deref(), Some("emp_u"));
        }
        other => panic!("Expected ADD CONSTRAINT, got {other:?}"),
    }
}

// --- Errors ---

#[test]
fn error_empty_input() {
    assert_eq!(parse_err(""), ParseError::Empty);
    assert_eq!(parse_err("  -- just a comment\n"), ParseError::Empty);
}

#[test]
fn error_unsupported_statements() {
    for (sql, kind) in [
        ("INSERT INTO t VALUES (1)", "INSERT"),
        ("DELETE FROM t", "DELETE"),
        ("WITH x AS (SELECT 1) SELECT * FROM x", "WITH"),
        ("TRUNCATE t", "TRUNCATE"),
        ("CREATE INDEX i ON t (a)", "CREATE INDEX"),
    ] {
        assert_eq!(
            parse_err(sql),
            ParseError::UnsupportedStatement(kind.to_string()),
            "{sql}"
        );
    }
}

#[test]
fn error_malformed() {
    for sql in [
        "SELECT",
        "SELECT * FROM",
        "SELECT (1 + 2",
        "SELECT a FROM t WHERE",
        "SELECT a FROM t;;",
        "SELECT a FROM t garbage here",
        "SELECT a b c FROM t",
    ] {
        assert!(
            matches!(parse_err(sql), ParseError::Malformed(_)),
            "Expected malformed error for: {sql}"
        );
    }
}

#[test]
fn error_depth_limit() {
    let sql = format!("SELECT {}1{} FROM t", "(".repeat(40), ")".repeat(40));
    let err = Parser::with_limits(
        &sql,
        Limits {
            max_depth: 16,
            max_width: 1024,
        },
    )
    .parse_statement()
    .unwrap_err();
    match err {
        ParseError::StructuralLimitExceeded(limit) => {
            assert_eq!(limit.dimension, LimitDimension::Depth);
        }
        other => panic!("Expected a depth error, got {other:?}"),
    }
    // The same text is fine under the default limits.
    assert!(Parser::new(&sql).parse_statement().is_ok());
}

#[test]
fn error_width_limit() {
    let list: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    let sql = format!("SELECT a FROM t WHERE a IN ({})", list.join(", "));
    let err = Parser::with_limits(
        &sql,
        Limits {
            max_depth: 64,
            max_width: 10,
        },
    )
    .parse_statement()
    .unwrap_err();
    assert!(matches!(
        err,
        ParseError::StructuralLimitExceeded(limit) if limit.dimension == LimitDimension::Width
    ));
}
