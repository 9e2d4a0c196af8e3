//! Expression AST types and their canonical SQL rendering.

use std::fmt;

use super::{DataType, Query};

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Boolean(true) => f.write_str("TRUE"),
            Self::Boolean(false) => f.write_str("FALSE"),
            Self::Null => f.write_str("NULL"),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    And,
    Or,

    Concat,
    Like,
    NotLike,
}

impl BinaryOp {
    /// Returns the canonical SQL spelling of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Concat => "||",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }

    /// Returns the precedence of the operator (higher = binds tighter).
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::Like
            | Self::NotLike => 4,
            Self::Add | Self::Sub | Self::Concat => 5,
            Self::Mul | Self::Div | Self::Mod => 6,
        }
    }

    /// Operators whose operands may be swapped without changing the result.
    #[must_use]
    pub const fn is_commutative(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Or | Self::Add | Self::Mul
        )
    }

    /// For ordering comparisons, the operator obtained by swapping operands.
    #[must_use]
    pub const fn flipped(&self) -> Option<Self> {
        match self {
            Self::Lt => Some(Self::Gt),
            Self::LtEq => Some(Self::GtEq),
            Self::Gt => Some(Self::Lt),
            Self::GtEq => Some(Self::LtEq),
            _ => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Logical NOT
    Not,
}

impl UnaryOp {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "NOT",
        }
    }
}

/// A function call expression. The name is stored lowercase.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    /// Whether DISTINCT was specified.
    pub distinct: bool,
}

/// An SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),

    /// A column reference, optionally qualified with a table name or alias.
    Column {
        table: Option<String>,
        name: String,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Function(FunctionCall),

    /// A scalar subquery.
    Subquery(Box<Query>),

    /// `EXISTS (subquery)`. `NOT EXISTS` is a `Unary` NOT around this.
    Exists(Box<Query>),

    /// `IS [NOT] NULL`
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    /// `[NOT] IN (list)`
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// `[NOT] IN (subquery)`
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },

    /// `[NOT] BETWEEN low AND high`
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },

    Paren(Box<Expr>),

    /// `*` or `t.*`
    Wildcard {
        table: Option<String>,
    },
}

/// Precedence of atoms (literals, columns, calls, parenthesized forms).
const ATOM: u8 = 8;

impl Expr {
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            table: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    #[must_use]
    pub const fn integer(value: i64) -> Self {
        Self::Literal(Literal::Integer(value))
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    #[must_use]
    pub fn binary(self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(self, right: Self) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    #[must_use]
    pub fn and(self, right: Self) -> Self {
        self.binary(BinaryOp::And, right)
    }

    #[must_use]
    pub fn paren(self) -> Self {
        Self::Paren(Box::new(self))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    /// Returns true for a literal, or a negated numeric literal such as `-5`.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Unary {
                op: UnaryOp::Neg,
                operand,
            } => matches!(operand.as_ref(), Self::Literal(lit) if lit.is_numeric()),
            _ => false,
        }
    }

    /// Removes any number of enclosing parentheses.
    #[must_use]
    pub fn unparen(self) -> Self {
        let mut expr = self;
        while let Self::Paren(inner) = expr {
            expr = *inner;
        }
        expr
    }

    /// Queries nested directly in this expression, left to right.
    ///
    /// The queries themselves are not searched.
    #[must_use]
    pub fn subqueries(&self) -> Vec<&Query> {
        let mut out = vec![];
        self.collect_subqueries(&mut out);
        out
    }

    fn collect_subqueries<'a>(&'a self, out: &mut Vec<&'a Query>) {
        match self {
            Self::Literal(_) | Self::Column { .. } | Self::Wildcard { .. } => {}
            Self::Subquery(query) | Self::Exists(query) => out.push(query),
            Self::Binary { left, right, .. } => {
                left.collect_subqueries(out);
                right.collect_subqueries(out);
            }
            Self::Unary { operand: inner, .. }
            | Self::IsNull { expr: inner, .. }
            | Self::Cast { expr: inner, .. }
            | Self::Paren(inner) => inner.collect_subqueries(out),
            Self::Function(call) => {
                for arg in &call.args {
                    arg.collect_subqueries(out);
                }
            }
            Self::In { expr, list, .. } => {
                expr.collect_subqueries(out);
                for item in list {
                    item.collect_subqueries(out);
                }
            }
            Self::InSubquery { expr, subquery, .. } => {
                expr.collect_subqueries(out);
                out.push(subquery);
            }
            Self::Between {
                expr, low, high, ..
            } => {
                expr.collect_subqueries(out);
                low.collect_subqueries(out);
                high.collect_subqueries(out);
            }
            Self::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    operand.collect_subqueries(out);
                }
                for (when, then) in when_clauses {
                    when.collect_subqueries(out);
                    then.collect_subqueries(out);
                }
                if let Some(else_clause) = else_clause {
                    else_clause.collect_subqueries(out);
                }
            }
        }
    }

    /// Binding strength used to decide where the renderer needs parentheses.
    const fn render_precedence(&self) -> u8 {
        match self {
            Self::Binary { op, .. } => op.precedence(),
            Self::Unary {
                op: UnaryOp::Not, ..
            } => 3,
            Self::IsNull { .. }
            | Self::In { .. }
            | Self::InSubquery { .. }
            | Self::Between { .. } => 4,
            Self::Unary {
                op: UnaryOp::Neg, ..
            } => 7,
            _ => ATOM,
        }
    }
}

/// Writes `expr`, parenthesized when it binds looser than `min`.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if expr.render_precedence() < min {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name.to_uppercase())?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.args)?;
        f.write_str(")")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Column { table, name } => match table {
                Some(table) => write!(f, "{table}.{name}"),
                None => f.write_str(name),
            },
            Self::Binary { left, op, right } => {
                let p = op.precedence();
                write_operand(f, left, p)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, right, p + 1)
            }
            Self::Unary { op, operand } => match op {
                UnaryOp::Neg => {
                    f.write_str("-")?;
                    write_operand(f, operand, ATOM)
                }
                UnaryOp::Not => {
                    f.write_str("NOT ")?;
                    write_operand(f, operand, 4)
                }
            },
            Self::Function(call) => write!(f, "{call}"),
            Self::Subquery(query) => write!(f, "({query})"),
            Self::Exists(query) => write!(f, "EXISTS ({query})"),
            Self::IsNull { expr, negated } => {
                write_operand(f, expr, 5)?;
                f.write_str(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            Self::In {
                expr,
                list,
                negated,
            } => {
                write_operand(f, expr, 5)?;
                f.write_str(if *negated { " NOT IN (" } else { " IN (" })?;
                write_list(f, list)?;
                f.write_str(")")
            }
            Self::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                write_operand(f, expr, 5)?;
                f.write_str(if *negated { " NOT IN (" } else { " IN (" })?;
                write!(f, "{subquery})")
            }
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => {
                write_operand(f, expr, 5)?;
                f.write_str(if *negated {
                    " NOT BETWEEN "
                } else {
                    " BETWEEN "
                })?;
                write_operand(f, low, 5)?;
                f.write_str(" AND ")?;
                write_operand(f, high, 5)
            }
            Self::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for (condition, result) in when_clauses {
                    write!(f, " WHEN {condition} THEN {result}")?;
                }
                if let Some(else_clause) = else_clause {
                    write!(f, " ELSE {else_clause}")?;
                }
                f.write_str(" END")
            }
            Self::Cast { expr, data_type } => write!(f, "CAST({expr} AS {data_type})"),
            Self::Paren(inner) => write!(f, "({inner})"),
            Self::Wildcard { table } => match table {
                Some(table) => write!(f, "{table}.*"),
                None => f.write_str("*"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_op_precedence() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(BinaryOp::Eq.precedence() > BinaryOp::And.precedence());
    }

    #[test]
    fn renders_literals() {
        assert_eq!(Expr::string("it's").to_string(), "'it''s'");
        assert_eq!(Expr::Literal(Literal::Float(5000.0)).to_string(), "5000");
        assert_eq!(Expr::Literal(Literal::Float(0.25)).to_string(), "0.25");
        assert_eq!(Expr::Literal(Literal::Null).to_string(), "NULL");
    }

    #[test]
    fn renders_parentheses_only_where_needed() {
        let sum = Expr::column("a").binary(BinaryOp::Add, Expr::column("b"));
        let product = sum.clone().binary(BinaryOp::Mul, Expr::column("c"));
        assert_eq!(product.to_string(), "(a + b) * c");

        let right_nested = Expr::column("c").binary(
            BinaryOp::Add,
            Expr::column("a").binary(BinaryOp::Sub, Expr::column("b")),
        );
        assert_eq!(right_nested.to_string(), "c + (a - b)");

        let left_nested = sum.binary(BinaryOp::Sub, Expr::column("d"));
        assert_eq!(left_nested.to_string(), "a + b - d");
    }

    #[test]
    fn renders_not_over_conjunction() {
        let conj = Expr::column("x")
            .binary(BinaryOp::GtEq, Expr::integer(1))
            .and(Expr::column("x").binary(BinaryOp::LtEq, Expr::integer(5)));
        assert_eq!(conj.not().to_string(), "NOT (x >= 1 AND x <= 5)");
    }

    #[test]
    fn renders_function_names_uppercase() {
        let call = Expr::Function(FunctionCall {
            name: String::from("count"),
            args: vec![Expr::Wildcard { table: None }],
            distinct: false,
        });
        assert_eq!(call.to_string(), "COUNT(*)");
    }

    #[test]
    fn negative_literal_is_constant() {
        let neg = Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(Expr::integer(5)),
        };
        assert!(neg.is_constant());
        assert_eq!(neg.to_string(), "-5");
        assert!(!Expr::column("a").is_constant());
    }

    #[test]
    fn unparen_strips_all_layers() {
        let expr = Expr::column("a").paren().paren();
        assert_eq!(expr.unparen(), Expr::column("a"));
    }
}
