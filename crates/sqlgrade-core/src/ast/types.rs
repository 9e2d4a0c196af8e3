//! Data types, column definitions and constraints used by `CREATE TABLE` and
//! `ALTER TABLE`.

use std::fmt;

use super::Expr;

/// SQL data types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Smallint,
    Integer,
    Bigint,
    Real,
    Double,
    Float,
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },
    Char(Option<u32>),
    Varchar(Option<u32>),
    Text,
    Blob,
    Date,
    Time,
    Timestamp,
    Datetime,
    Boolean,
    /// Any other type name, stored uppercase with its arguments.
    Custom(String),
}

impl DataType {
    /// Resolves a (lowercase) type name and its optional `(a[, b])` arguments.
    ///
    /// Synonyms collapse to one variant so that `INT`, `INTEGER` and `INT4`
    /// compare equal, as do `NUMERIC` and `DECIMAL`.
    #[must_use]
    pub fn from_name(name: &str, args: &[u32]) -> Self {
        let first = args.first().copied();
        let narrow = |n: u32| u16::try_from(n).ok();
        match name {
            "smallint" | "int2" => Self::Smallint,
            "int" | "integer" | "int4" | "mediumint" => Self::Integer,
            "bigint" | "int8" => Self::Bigint,
            "real" | "float4" => Self::Real,
            "double" | "float8" => Self::Double,
            "float" => Self::Float,
            "decimal" | "numeric" | "number" => Self::Decimal {
                precision: first.and_then(narrow),
                scale: args.get(1).copied().and_then(narrow),
            },
            "char" | "character" | "nchar" => Self::Char(first),
            "varchar" | "nvarchar" | "varchar2" => Self::Varchar(first),
            "text" | "clob" => Self::Text,
            "blob" | "bytea" => Self::Blob,
            "date" => Self::Date,
            "time" => Self::Time,
            "timestamp" => Self::Timestamp,
            "datetime" => Self::Datetime,
            "boolean" | "bool" => Self::Boolean,
            other => {
                let mut custom = other.to_uppercase();
                if !args.is_empty() {
                    let rendered: Vec<String> = args.iter().map(u32::to_string).collect();
                    custom.push_str(&format!("({})", rendered.join(", ")));
                }
                Self::Custom(custom)
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smallint => f.write_str("SMALLINT"),
            Self::Integer => f.write_str("INT"),
            Self::Bigint => f.write_str("BIGINT"),
            Self::Real => f.write_str("REAL"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Float => f.write_str("FLOAT"),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({p}, {s})"),
                (Some(p), None) => write!(f, "DECIMAL({p})"),
                _ => f.write_str("DECIMAL"),
            },
            Self::Char(len) => match len {
                Some(n) => write!(f, "CHAR({n})"),
                None => f.write_str("CHAR"),
            },
            Self::Varchar(len) => match len {
                Some(n) => write!(f, "VARCHAR({n})"),
                None => f.write_str("VARCHAR"),
            },
            Self::Text => f.write_str("TEXT"),
            Self::Blob => f.write_str("BLOB"),
            Self::Date => f.write_str("DATE"),
            Self::Time => f.write_str("TIME"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Datetime => f.write_str("DATETIME"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// A `REFERENCES table [(columns)]` target.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyTarget {
    pub table: String,
    pub columns: Vec<String>,
}

impl fmt::Display for ForeignKeyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REFERENCES {}", self.table)?;
        if !self.columns.is_empty() {
            write!(f, " ({})", self.columns.join(", "))?;
        }
        Ok(())
    }
}

/// Constraints attached to a single column definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraintKind {
    NotNull,
    Null,
    PrimaryKey,
    Unique,
    Default(Expr),
    Check(Expr),
    References(ForeignKeyTarget),
    Autoincrement,
}

/// A column constraint, optionally named with `CONSTRAINT name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    pub name: Option<String>,
    pub kind: ColumnConstraintKind,
}

impl ColumnConstraint {
    #[must_use]
    pub const fn new(kind: ColumnConstraintKind) -> Self {
        Self { name: None, kind }
    }
}

impl fmt::Display for ColumnConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "CONSTRAINT {name} ")?;
        }
        match &self.kind {
            ColumnConstraintKind::NotNull => f.write_str("NOT NULL"),
            ColumnConstraintKind::Null => f.write_str("NULL"),
            ColumnConstraintKind::PrimaryKey => f.write_str("PRIMARY KEY"),
            ColumnConstraintKind::Unique => f.write_str("UNIQUE"),
            ColumnConstraintKind::Default(expr) => write!(f, "DEFAULT {expr}"),
            ColumnConstraintKind::Check(expr) => write!(f, "CHECK ({expr})"),
            ColumnConstraintKind::References(target) => write!(f, "{target}"),
            ColumnConstraintKind::Autoincrement => f.write_str("AUTOINCREMENT"),
        }
    }
}

/// Table-level constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        target: ForeignKeyTarget,
    },
    Check(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<String>,
    pub kind: TableConstraintKind,
}

impl fmt::Display for TableConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "CONSTRAINT {name} ")?;
        }
        match &self.kind {
            TableConstraintKind::PrimaryKey(columns) => {
                write!(f, "PRIMARY KEY ({})", columns.join(", "))
            }
            TableConstraintKind::Unique(columns) => write!(f, "UNIQUE ({})", columns.join(", ")),
            TableConstraintKind::ForeignKey { columns, target } => {
                write!(f, "FOREIGN KEY ({}) {target}", columns.join(", "))
            }
            TableConstraintKind::Check(expr) => write!(f, "CHECK ({expr})"),
        }
    }
}

/// A column definition for CREATE TABLE / ALTER TABLE ADD COLUMN.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    /// Constraints in source order.
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDef {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn constraint(mut self, kind: ColumnConstraintKind) -> Self {
        self.constraints.push(ColumnConstraint::new(kind));
        self
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        for constraint in &self.constraints {
            write!(f, " {constraint}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_synonyms_collapse() {
        assert_eq!(DataType::from_name("integer", &[]), DataType::Integer);
        assert_eq!(DataType::from_name("int4", &[]), DataType::Integer);
        assert_eq!(
            DataType::from_name("numeric", &[10, 2]),
            DataType::from_name("decimal", &[10, 2])
        );
    }

    #[test]
    fn data_type_display() {
        assert_eq!(DataType::Integer.to_string(), "INT");
        assert_eq!(DataType::Varchar(Some(255)).to_string(), "VARCHAR(255)");
        assert_eq!(
            DataType::from_name("decimal", &[10, 2]).to_string(),
            "DECIMAL(10, 2)"
        );
        assert_eq!(DataType::from_name("money", &[]).to_string(), "MONEY");
    }

    #[test]
    fn column_def_display_lists_constraints_in_order() {
        let col = ColumnDef::new("eno", DataType::Varchar(Some(10)))
            .constraint(ColumnConstraintKind::NotNull)
            .constraint(ColumnConstraintKind::PrimaryKey);
        assert_eq!(col.to_string(), "eno VARCHAR(10) NOT NULL PRIMARY KEY");
    }

    #[test]
    fn table_constraint_display() {
        let fk = TableConstraint {
            name: Some(String::from("fk_dept")),
            kind: TableConstraintKind::ForeignKey {
                columns: vec![String::from("dno")],
                target: ForeignKeyTarget {
                    table: String::from("dept"),
                    columns: vec![String::from("dno")],
                },
            },
        };
        assert_eq!(
            fk.to_string(),
            "CONSTRAINT fk_dept FOREIGN KEY (dno) REFERENCES dept (dno)"
        );
    }
}
