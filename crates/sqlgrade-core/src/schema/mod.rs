//! Caller-supplied schema used to qualify column references.
//!
//! A [`SchemaDescriptor`] maps table names to their columns and declared
//! types. It deserializes from the same shape it serializes to:
//!
//! ```json
//! { "emp": { "eno": "varchar", "dno": "int" }, "dept": { "dno": "int" } }
//! ```
//!
//! Table and column names are lowercased on construction, matching the
//! lexer's identifier normalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column name to declared type.
pub type ColumnTypes = BTreeMap<String, String>;

/// Read-only mapping of table name to column types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, ColumnTypes>", into = "BTreeMap<String, ColumnTypes>")]
pub struct SchemaDescriptor {
    tables: BTreeMap<String, ColumnTypes>,
}

impl SchemaDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with `(column, type)` pairs.
    #[must_use]
    pub fn with_table<I, C, T>(mut self, name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (C, T)>,
        C: AsRef<str>,
        T: Into<String>,
    {
        let entry = self.tables.entry(name.to_lowercase()).or_default();
        for (column, data_type) in columns {
            entry.insert(column.as_ref().to_lowercase(), data_type.into());
        }
        self
    }

    /// Parses a schema from JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the JSON does not have the
    /// `{table: {column: type}}` shape.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the columns of `table`, if known.
    #[must_use]
    pub fn table(&self, table: &str) -> Option<&ColumnTypes> {
        self.tables.get(&table.to_lowercase())
    }

    /// Returns true if `table` is described by this schema.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.table(table).is_some()
    }

    #[must_use]
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.column_type(table, column).is_some()
    }

    /// Declared type of `table.column`.
    #[must_use]
    pub fn column_type(&self, table: &str, column: &str) -> Option<&str> {
        self.table(table)?
            .get(&column.to_lowercase())
            .map(String::as_str)
    }

    /// Iterates table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl From<BTreeMap<String, ColumnTypes>> for SchemaDescriptor {
    fn from(raw: BTreeMap<String, ColumnTypes>) -> Self {
        let mut tables: BTreeMap<String, ColumnTypes> = BTreeMap::new();
        for (table, columns) in raw {
            let entry = tables.entry(table.to_lowercase()).or_default();
            for (column, data_type) in columns {
                entry.insert(column.to_lowercase(), data_type);
            }
        }
        Self { tables }
    }
}

impl From<SchemaDescriptor> for BTreeMap<String, ColumnTypes> {
    fn from(schema: SchemaDescriptor) -> Self {
        schema.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emp_dept() -> SchemaDescriptor {
        SchemaDescriptor::new()
            .with_table("EMP", [("Eno", "varchar"), ("DNO", "int")])
            .with_table("dept", [("dno", "int"), ("dname", "varchar")])
    }

    #[test]
    fn names_are_lowercased() {
        let schema = emp_dept();
        assert!(schema.has_table("emp"));
        assert!(schema.has_column("Emp", "ENO"));
        assert_eq!(schema.column_type("emp", "dno"), Some("int"));
        assert!(!schema.has_column("emp", "dname"));
        assert!(!schema.has_column("salgrade", "grade"));
    }

    #[test]
    fn json_shape() {
        let schema =
            SchemaDescriptor::from_json_str(r#"{"EMP": {"Eno": "varchar"}, "dept": {}}"#).unwrap();
        assert!(schema.has_column("emp", "eno"));
        assert_eq!(schema.table_names().collect::<Vec<_>>(), ["dept", "emp"]);
        assert_eq!(
            serde_json::to_string(&schema).unwrap(),
            r#"{"dept":{},"emp":{"eno":"varchar"}}"#
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(SchemaDescriptor::from_json_str(r#"{"emp": ["eno"]}"#).is_err());
    }
}
