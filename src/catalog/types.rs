//! Table and column descriptors
//!
//! Descriptors are built once at startup and never mutated afterwards, so
//! concurrent requests read them without locking.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{DapiError, DapiResult};

/// One column of a table, as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    /// 1-based position within the table
    pub ordinal: usize,
    pub nullable: bool,
    /// Declared type, lowercased, without length arguments (`varchar(20)` -> `varchar`)
    pub data_type: String,
    pub primary_key: bool,
    /// Extra attributes, e.g. `auto_increment`
    pub extra: String,
    pub default: Option<String>,
    pub comment: String,
}

impl Column {
    /// Column with the given name and type, nullable, not part of a key
    pub fn new(name: impl Into<String>, ordinal: usize, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ordinal,
            nullable: true,
            data_type: data_type.into(),
            primary_key: false,
            extra: String::new(),
            default: None,
            comment: String::new(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

}

/// A table and its columns in ordinal order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Declared `WITHOUT ROWID`; rows are identified by `key_columns` only
    pub without_rowid: bool,
    /// Declared key columns in key order, composite keys included
    pub key_columns: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, mut columns: Vec<Column>) -> Self {
        columns.sort_by_key(|c| c.ordinal);
        let key_columns = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            name: name.into(),
            columns,
            without_rowid: false,
            key_columns,
        }
    }

    /// Mark the table `WITHOUT ROWID`, identified by the given key columns
    pub fn without_rowid(mut self, key_columns: Vec<String>) -> Self {
        self.without_rowid = true;
        self.key_columns = key_columns;
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Resolve a caller-supplied column name to the catalog's column
    pub fn require_column(&self, name: &str) -> DapiResult<&Column> {
        self.column(name)
            .ok_or_else(|| DapiError::unknown_column(&self.name, name))
    }

    /// The single primary-key column.
    ///
    /// Returns `None` when the table has no key or declares more than one
    /// key column; composite keys are not addressable.
    pub fn primary_key(&self) -> Option<&Column> {
        let mut keys = self.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// All tables known to the store, keyed by name
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Look up a table, failing with `UnknownTable`
    pub fn table(&self, name: &str) -> DapiResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DapiError::UnknownTable(name.to_string()))
    }

    /// Tables in name order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_table() -> Table {
        Table::new(
            "user",
            vec![
                Column::new("id", 2, "integer").primary(),
                Column::new("name", 1, "varchar"),
                Column::new("email", 3, "varchar"),
            ],
        )
    }

    #[test]
    fn test_columns_sorted_by_ordinal() {
        let table = user_table();
        let names: Vec<_> = table.column_names().collect();
        assert_eq!(names, vec!["name", "id", "email"]);
    }

    #[test]
    fn test_primary_key_discovery() {
        let table = user_table();
        assert_eq!(table.primary_key().unwrap().name, "id");

        let keyless = Table::new("log", vec![Column::new("line", 1, "text")]);
        assert!(keyless.primary_key().is_none());
    }

    #[test]
    fn test_composite_key_is_not_addressable() {
        let table = Table::new(
            "membership",
            vec![
                Column::new("user_id", 1, "integer").primary(),
                Column::new("group_id", 2, "integer").primary(),
            ],
        );
        assert!(table.primary_key().is_none());
    }

    #[test]
    fn test_key_columns() {
        let table = user_table();
        assert!(!table.without_rowid);
        assert_eq!(table.key_columns, vec!["id"]);

        let tag = Table::new(
            "tag",
            vec![Column::new("a", 1, "text"), Column::new("b", 2, "text")],
        )
        .without_rowid(vec!["b".to_string(), "a".to_string()]);
        assert!(tag.without_rowid);
        assert_eq!(tag.key_columns, vec!["b", "a"]);
        assert!(tag.primary_key().is_none());
    }

    #[test]
    fn test_require_column() {
        let table = user_table();
        assert!(table.require_column("email").is_ok());
        assert_eq!(
            table.require_column("bogus"),
            Err(DapiError::unknown_column("user", "bogus"))
        );
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::from_tables(vec![user_table()]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.table("user").is_ok());
        assert_eq!(
            catalog.table("ghost"),
            Err(DapiError::UnknownTable("ghost".to_string()))
        );
    }
}
