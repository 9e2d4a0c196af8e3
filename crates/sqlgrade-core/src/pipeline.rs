//! Text to grading tree: parse, qualify, lower.

use tracing::{debug, warn};

use crate::config::Limits;
use crate::parser::{ParseError, Parser};
use crate::qualify::{qualify, QualificationWarning};
use crate::schema::SchemaDescriptor;
use crate::tree::{lower, AstNode};

/// A parsed statement with the warnings raised while qualifying it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// Qualified, not yet canonical.
    pub tree: AstNode,
    pub warnings: Vec<QualificationWarning>,
}

/// Parses `sql` into a qualified grading tree under default limits.
///
/// Qualification warnings are logged and otherwise dropped; use
/// [`parse_with_diagnostics`] to receive them.
pub fn parse(sql: &str, schema: Option<&SchemaDescriptor>) -> Result<AstNode, ParseError> {
    let Parsed { tree, warnings } = parse_with_diagnostics(sql, schema, &Limits::default())?;
    for warning in &warnings {
        warn!(%warning, "Qualification warning");
    }
    Ok(tree)
}

/// Parses `sql` into a qualified grading tree, returning warnings alongside.
pub fn parse_with_diagnostics(
    sql: &str,
    schema: Option<&SchemaDescriptor>,
    limits: &Limits,
) -> Result<Parsed, ParseError> {
    let mut statement = Parser::with_limits(sql, *limits).parse_statement()?;
    let warnings = qualify(&mut statement, schema);
    let tree = lower(statement);
    debug!(nodes = tree.size(), warnings = warnings.len(), "Parsed statement");
    Ok(Parsed { tree, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_qualifies_against_schema() {
        let schema = SchemaDescriptor::new()
            .with_table("emp", [("eno", "varchar"), ("dno", "int")])
            .with_table("dept", [("dno", "int"), ("dname", "varchar")]);
        let parsed = parse_with_diagnostics(
            "SELECT eno, dname FROM emp, dept WHERE emp.dno = dept.dno",
            Some(&schema),
            &Limits::default(),
        )
        .unwrap();
        assert!(parsed.warnings.is_empty());
        let select = &parsed.tree.children()[0];
        assert_eq!(select.children()[0].value(), "emp.eno");
        assert_eq!(select.children()[1].value(), "dept.dname");
    }

    #[test]
    fn warnings_are_reported() {
        let schema = SchemaDescriptor::new().with_table("emp", [("eno", "varchar")]);
        let parsed =
            parse_with_diagnostics("SELECT salary FROM emp", Some(&schema), &Limits::default())
                .unwrap();
        assert_eq!(
            parsed.warnings,
            [QualificationWarning::UnknownColumn {
                column: String::from("salary")
            }]
        );
    }

    #[test]
    fn errors_pass_through() {
        assert_eq!(parse("   ", None).unwrap_err(), ParseError::Empty);
        assert!(matches!(
            parse("DELETE FROM emp", None).unwrap_err(),
            ParseError::UnsupportedStatement(_)
        ));
    }
}
