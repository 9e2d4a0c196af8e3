//! Column qualification.
//!
//! Two passes run over a parsed query before it is lowered into a tree:
//!
//! 1. **Alias unification.** A real table that appears exactly once in the
//!    whole statement loses its alias, and every `alias.column` reference is
//!    rewritten to `table.column`. Self-joined tables keep their aliases
//!    since the alias is what tells the two occurrences apart.
//! 2. **Qualification.** Each unqualified column is resolved against the
//!    FROM sources of its SELECT, then against enclosing SELECTs for
//!    correlated subqueries, and rewritten to `source.column` when exactly
//!    one source owns it.
//!
//! Resolution problems never fail the parse; they are reported as
//! [`QualificationWarning`]s and the reference is left as written.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Expr, OrderBy, Query, SelectStatement, Statement, TableRef};
use crate::schema::SchemaDescriptor;

/// A column reference that could not be qualified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualificationWarning {
    /// No table in scope declares the column.
    #[error("Column '{column}' does not exist in any table in scope")]
    UnknownColumn { column: String },

    /// More than one table in scope declares the column.
    #[error("Column '{column}' is ambiguous between {}", candidates.join(", "))]
    AmbiguousColumn {
        column: String,
        candidates: Vec<String>,
    },

    /// Not enough schema information to decide which table owns the column.
    #[error("Column '{column}' could not be attributed to a table")]
    Unresolved { column: String },
}

/// Unifies aliases and qualifies column references in place.
///
/// DDL statements are left untouched.
pub fn qualify(
    statement: &mut Statement,
    schema: Option<&SchemaDescriptor>,
) -> Vec<QualificationWarning> {
    let Statement::Query(query) = statement else {
        return vec![];
    };

    unify_aliases(query);

    let mut qualifier = Qualifier {
        schema,
        scopes: vec![],
        warnings: vec![],
    };
    qualifier.query(query);
    qualifier.warnings
}

// --- Alias unification ---

/// A mutable view of one name-bearing spot in a query.
enum Item<'a> {
    Table {
        name: &'a str,
        alias: &'a mut Option<String>,
    },
    /// The `t` in `t.column` or `t.*`.
    Qualifier(&'a mut String),
}

fn unify_aliases(query: &mut Query) {
    let mut table_counts: HashMap<String, usize> = HashMap::new();
    let mut alias_counts: HashMap<String, usize> = HashMap::new();
    let mut aliased: Vec<(String, String)> = vec![];

    walk_query(query, &mut |item| {
        if let Item::Table { name, alias } = item {
            *table_counts.entry(name.to_string()).or_default() += 1;
            if let Some(alias) = alias.as_ref() {
                *alias_counts.entry(alias.clone()).or_default() += 1;
                aliased.push((alias.clone(), name.to_string()));
            }
        }
    });

    let renames: BTreeMap<String, String> = aliased
        .into_iter()
        .filter(|(alias, name)| {
            table_counts.get(name) == Some(&1)
                && alias_counts.get(alias) == Some(&1)
                && (alias == name || !table_counts.contains_key(alias))
        })
        .collect();

    if renames.is_empty() {
        return;
    }
    debug!(renames = ?renames, "Unifying table aliases");

    walk_query(query, &mut |item| match item {
        Item::Table { name, alias } => {
            if alias
                .as_ref()
                .is_some_and(|a| renames.get(a).is_some_and(|n| n == name))
            {
                *alias = None;
            }
        }
        Item::Qualifier(qualifier) => {
            if let Some(name) = renames.get(qualifier.as_str()) {
                qualifier.clone_from(name);
            }
        }
    });
}

fn walk_query(query: &mut Query, visit: &mut dyn FnMut(Item<'_>)) {
    match query {
        Query::Select(select) => walk_select(select, visit),
        Query::Compound { left, right, .. } => {
            walk_query(left, visit);
            walk_query(right, visit);
        }
    }
}

fn walk_select(select: &mut SelectStatement, visit: &mut dyn FnMut(Item<'_>)) {
    for column in &mut select.columns {
        walk_expr(&mut column.expr, visit);
    }
    for item in &mut select.from {
        walk_table_ref(item, visit);
    }
    let exprs = select
        .where_clause
        .iter_mut()
        .chain(select.group_by.iter_mut())
        .chain(select.having.iter_mut())
        .chain(select.order_by.iter_mut().map(|o| &mut o.expr))
        .chain(select.limit.iter_mut())
        .chain(select.offset.iter_mut());
    for expr in exprs {
        walk_expr(expr, visit);
    }
}

fn walk_table_ref(table_ref: &mut TableRef, visit: &mut dyn FnMut(Item<'_>)) {
    match table_ref {
        TableRef::Table { name, alias, .. } => visit(Item::Table { name, alias }),
        TableRef::Subquery { query, .. } => walk_query(query, visit),
        TableRef::Join { left, join } => {
            walk_table_ref(left, visit);
            walk_table_ref(&mut join.table, visit);
            if let Some(on) = &mut join.on {
                walk_expr(on, visit);
            }
        }
    }
}

fn walk_expr(expr: &mut Expr, visit: &mut dyn FnMut(Item<'_>)) {
    match expr {
        Expr::Column {
            table: Some(table), ..
        }
        | Expr::Wildcard { table: Some(table) } => visit(Item::Qualifier(table)),
        Expr::Literal(_) | Expr::Column { table: None, .. } | Expr::Wildcard { table: None } => {}
        Expr::Binary { left, right, .. } => {
            walk_expr(left, visit);
            walk_expr(right, visit);
        }
        Expr::Unary { operand: inner, .. }
        | Expr::IsNull { expr: inner, .. }
        | Expr::Cast { expr: inner, .. }
        | Expr::Paren(inner) => walk_expr(inner, visit),
        Expr::Function(call) => {
            for arg in &mut call.args {
                walk_expr(arg, visit);
            }
        }
        Expr::Subquery(query) | Expr::Exists(query) => walk_query(query, visit),
        Expr::In { expr, list, .. } => {
            walk_expr(expr, visit);
            for item in list {
                walk_expr(item, visit);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            walk_expr(expr, visit);
            walk_query(subquery, visit);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(expr, visit);
            walk_expr(low, visit);
            walk_expr(high, visit);
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(operand) = operand {
                walk_expr(operand, visit);
            }
            for (when, then) in when_clauses {
                walk_expr(when, visit);
                walk_expr(then, visit);
            }
            if let Some(else_clause) = else_clause {
                walk_expr(else_clause, visit);
            }
        }
    }
}

// --- Scoped qualification ---

/// A relation visible in a FROM clause.
struct Source {
    /// The name columns are qualified with: the alias if any, else the table.
    reference: String,
    /// Real table name, for schema lookups.
    table: Option<String>,
    /// Output columns of a derived table, when they can be listed.
    columns: Option<Vec<String>>,
}

impl Source {
    /// `Some(true)`/`Some(false)` when known, `None` when we cannot tell.
    fn has_column(&self, column: &str, schema: Option<&SchemaDescriptor>) -> Option<bool> {
        if let Some(columns) = &self.columns {
            return Some(columns.iter().any(|c| c == column));
        }
        let table = self.table.as_deref()?;
        schema?
            .table(table)
            .map(|columns| columns.contains_key(column))
    }
}

struct Scope {
    sources: Vec<Source>,
    /// Projection aliases of the SELECT, visible to GROUP BY, HAVING and ORDER BY.
    output_aliases: Vec<String>,
}

enum Resolution {
    Qualified(String),
    Failed(QualificationWarning),
}

struct Qualifier<'s> {
    schema: Option<&'s SchemaDescriptor>,
    scopes: Vec<Scope>,
    warnings: Vec<QualificationWarning>,
}

impl Qualifier<'_> {
    fn query(&mut self, query: &mut Query) {
        match query {
            Query::Select(select) => self.select(select),
            Query::Compound { left, right, .. } => {
                self.query(left);
                self.query(right);
            }
        }
    }

    fn select(&mut self, select: &mut SelectStatement) {
        // Derived tables cannot see their sibling FROM items.
        for item in &mut select.from {
            self.derived_tables(item);
        }

        let mut sources = vec![];
        for item in &select.from {
            collect_sources(item, &mut sources);
        }
        let output_aliases = select
            .columns
            .iter()
            .filter_map(|c| c.alias.clone())
            .collect();
        self.scopes.push(Scope {
            sources,
            output_aliases,
        });

        for column in &mut select.columns {
            self.expr(&mut column.expr, false);
        }
        for item in &mut select.from {
            self.join_conditions(item);
        }
        if let Some(where_clause) = &mut select.where_clause {
            self.expr(where_clause, false);
        }
        for expr in &mut select.group_by {
            self.expr(expr, true);
        }
        if let Some(having) = &mut select.having {
            self.expr(having, true);
        }
        for OrderBy { expr, .. } in &mut select.order_by {
            self.expr(expr, true);
        }

        self.scopes.pop();
    }

    fn derived_tables(&mut self, table_ref: &mut TableRef) {
        match table_ref {
            TableRef::Table { .. } => {}
            TableRef::Subquery { query, .. } => self.query(query),
            TableRef::Join { left, join } => {
                self.derived_tables(left);
                self.derived_tables(&mut join.table);
            }
        }
    }

    fn join_conditions(&mut self, table_ref: &mut TableRef) {
        if let TableRef::Join { left, join } = table_ref {
            self.join_conditions(left);
            self.join_conditions(&mut join.table);
            if let Some(on) = &mut join.on {
                self.expr(on, false);
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr, aliases_visible: bool) {
        match expr {
            Expr::Column { table, name } => {
                if table.is_some() || (aliases_visible && self.is_output_alias(name)) {
                    return;
                }
                match self.resolve(name) {
                    Resolution::Qualified(reference) => *table = Some(reference),
                    Resolution::Failed(warning) => {
                        if !self.warnings.contains(&warning) {
                            debug!(%warning, "Leaving column unqualified");
                            self.warnings.push(warning);
                        }
                    }
                }
            }
            Expr::Literal(_) | Expr::Wildcard { .. } => {}
            Expr::Binary { left, right, .. } => {
                self.expr(left, aliases_visible);
                self.expr(right, aliases_visible);
            }
            Expr::Unary { operand: inner, .. }
            | Expr::IsNull { expr: inner, .. }
            | Expr::Cast { expr: inner, .. }
            | Expr::Paren(inner) => self.expr(inner, aliases_visible),
            Expr::Function(call) => {
                for arg in &mut call.args {
                    self.expr(arg, aliases_visible);
                }
            }
            Expr::Subquery(query) | Expr::Exists(query) => self.query(query),
            Expr::In { expr, list, .. } => {
                self.expr(expr, aliases_visible);
                for item in list {
                    self.expr(item, aliases_visible);
                }
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.expr(expr, aliases_visible);
                self.query(subquery);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.expr(expr, aliases_visible);
                self.expr(low, aliases_visible);
                self.expr(high, aliases_visible);
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    self.expr(operand, aliases_visible);
                }
                for (when, then) in when_clauses {
                    self.expr(when, aliases_visible);
                    self.expr(then, aliases_visible);
                }
                if let Some(else_clause) = else_clause {
                    self.expr(else_clause, aliases_visible);
                }
            }
        }
    }

    fn is_output_alias(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.output_aliases.iter().any(|a| a == name))
    }

    /// Resolves `column` from the innermost scope outwards.
    fn resolve(&self, column: &str) -> Resolution {
        for scope in self.scopes.iter().rev() {
            let mut owners = vec![];
            let mut unknown = 0;
            for source in &scope.sources {
                match source.has_column(column, self.schema) {
                    Some(true) => owners.push(source.reference.clone()),
                    Some(false) => {}
                    None => unknown += 1,
                }
            }

            match owners.len() {
                1 => return Resolution::Qualified(owners.remove(0)),
                0 => {}
                _ => {
                    return Resolution::Failed(QualificationWarning::AmbiguousColumn {
                        column: column.to_string(),
                        candidates: owners,
                    });
                }
            }

            if unknown > 0 {
                // A lone source we know nothing about owns every column.
                if scope.sources.len() == 1 {
                    return Resolution::Qualified(scope.sources[0].reference.clone());
                }
                return Resolution::Failed(QualificationWarning::Unresolved {
                    column: column.to_string(),
                });
            }
        }

        let warning = if self.schema.is_some() {
            QualificationWarning::UnknownColumn {
                column: column.to_string(),
            }
        } else {
            QualificationWarning::Unresolved {
                column: column.to_string(),
            }
        };
        Resolution::Failed(warning)
    }
}

fn collect_sources(table_ref: &TableRef, sources: &mut Vec<Source>) {
    match table_ref {
        TableRef::Table { name, alias, .. } => sources.push(Source {
            reference: alias.clone().unwrap_or_else(|| name.clone()),
            table: Some(name.clone()),
            columns: None,
        }),
        // An unaliased derived table cannot be referenced by name.
        TableRef::Subquery { query, alias } => {
            if let Some(alias) = alias {
                sources.push(Source {
                    reference: alias.clone(),
                    table: None,
                    columns: output_columns(query),
                });
            }
        }
        TableRef::Join { left, join } => {
            collect_sources(left, sources);
            collect_sources(&join.table, sources);
        }
    }
}

/// Names of the columns a query produces, or `None` if it projects `*`.
fn output_columns(query: &Query) -> Option<Vec<String>> {
    match query {
        Query::Select(select) => select
            .columns
            .iter()
            .map(|column| match (&column.alias, &column.expr) {
                (Some(alias), _) => Some(alias.clone()),
                (None, Expr::Column { name, .. }) => Some(name.clone()),
                (None, Expr::Wildcard { .. }) => None,
                (None, expr) => Some(expr.to_string()),
            })
            .collect(),
        Query::Compound { left, .. } => output_columns(left),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn qualified(sql: &str, schema: Option<&SchemaDescriptor>) -> (String, Vec<QualificationWarning>) {
        let mut statement = Parser::new(sql).parse_statement().unwrap();
        let warnings = qualify(&mut statement, schema);
        let Statement::Query(query) = statement else {
            panic!("Expected query");
        };
        (query.to_string(), warnings)
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new()
            .with_table("emp", [("eno", "varchar"), ("dno", "int"), ("sal", "int")])
            .with_table("dept", [("dno", "int"), ("dname", "varchar")])
    }

    #[test]
    fn single_source_without_schema() {
        let (sql, warnings) = qualified("SELECT Eno FROM EMP WHERE incentive > 5000", None);
        assert_eq!(sql, "SELECT emp.eno FROM emp WHERE emp.incentive > 5000");
        assert!(warnings.is_empty());
    }

    #[test]
    fn alias_is_replaced_by_table_name() {
        let (sql, _) = qualified("SELECT e.eno FROM emp AS e WHERE e.sal > 10", None);
        assert_eq!(sql, "SELECT emp.eno FROM emp WHERE emp.sal > 10");
    }

    #[test]
    fn self_join_keeps_aliases() {
        let (sql, _) = qualified(
            "SELECT a.eno FROM emp a JOIN emp b ON a.dno = b.dno",
            Some(&schema()),
        );
        assert_eq!(
            sql,
            "SELECT a.eno FROM emp AS a INNER JOIN emp AS b ON a.dno = b.dno"
        );
    }

    #[test]
    fn schema_resolves_columns_across_joins() {
        let (sql, warnings) = qualified(
            "SELECT eno, dname FROM emp e JOIN dept d ON e.dno = d.dno",
            Some(&schema()),
        );
        assert_eq!(
            sql,
            "SELECT emp.eno, dept.dname FROM emp INNER JOIN dept ON emp.dno = dept.dno"
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn ambiguous_and_unknown_columns_warn() {
        let (sql, warnings) = qualified("SELECT dno, bonus FROM emp, dept", Some(&schema()));
        assert_eq!(sql, "SELECT dno, bonus FROM emp, dept");
        assert_eq!(
            warnings,
            vec![
                QualificationWarning::AmbiguousColumn {
                    column: String::from("dno"),
                    candidates: vec![String::from("emp"), String::from("dept")],
                },
                QualificationWarning::UnknownColumn {
                    column: String::from("bonus"),
                },
            ]
        );
    }

    #[test]
    fn correlated_subquery_falls_back_to_outer_scope() {
        let (sql, _) = qualified(
            "SELECT eno FROM emp WHERE EXISTS (SELECT 1 FROM dept WHERE dname = 'x' AND dno = sal)",
            Some(&schema()),
        );
        assert_eq!(
            sql,
            "SELECT emp.eno FROM emp WHERE EXISTS (SELECT 1 FROM dept WHERE dept.dname = 'x' AND dept.dno = emp.sal)"
        );
    }

    #[test]
    fn order_by_prefers_projection_alias() {
        let (sql, _) = qualified("SELECT sal * 2 AS pay FROM emp ORDER BY pay DESC", None);
        assert_eq!(sql, "SELECT emp.sal * 2 AS pay FROM emp ORDER BY pay DESC");
    }

    #[test]
    fn derived_table_columns() {
        let (sql, warnings) = qualified(
            "SELECT total FROM (SELECT dno, SUM(sal) AS total FROM emp GROUP BY dno) AS t, dept WHERE t.dno = dept.dno",
            Some(&schema()),
        );
        assert_eq!(
            sql,
            "SELECT t.total FROM (SELECT emp.dno, SUM(emp.sal) AS total FROM emp GROUP BY emp.dno) AS t, dept WHERE t.dno = dept.dno"
        );
        assert!(warnings.is_empty());
    }
}
