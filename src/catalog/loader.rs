//! Catalog introspection for SQLite
//!
//! Reads `pragma_table_list` for the table list and `pragma_table_info` for
//! each table's columns. Internal `sqlite_*` tables are skipped.

use rusqlite::Connection;

use super::types::{Catalog, Column, Table};
use crate::error::{DapiError, DapiResult};
use crate::observability::{log_event_with_fields, Event};

const LIST_TABLES: &str = "SELECT name, wr FROM pragma_table_list \
     WHERE schema = 'main' AND type = 'table' AND name NOT LIKE 'sqlite_%' \
     ORDER BY name";

const LIST_COLUMNS: &str = "SELECT cid, name, type, \"notnull\", dflt_value, pk \
     FROM pragma_table_info(?1) \
     ORDER BY cid";

/// Loads table descriptors from a live connection
pub struct CatalogLoader;

impl CatalogLoader {
    pub fn load(conn: &Connection) -> DapiResult<Catalog> {
        let names = Self::table_names(conn)?;

        let mut tables = Vec::with_capacity(names.len());
        for (name, without_rowid) in names {
            tables.push(Self::load_table(conn, &name, without_rowid)?);
        }

        let catalog = Catalog::from_tables(tables);
        log_event_with_fields(
            Event::CatalogLoaded,
            &[("tables", &catalog.len().to_string())],
        );
        Ok(catalog)
    }

    fn table_names(conn: &Connection) -> DapiResult<Vec<(String, bool)>> {
        let mut stmt = conn.prepare(LIST_TABLES).map_err(catalog_error)?;
        let names = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)))
            .map_err(catalog_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(catalog_error)?;
        Ok(names)
    }

    fn load_table(conn: &Connection, name: &str, without_rowid: bool) -> DapiResult<Table> {
        let mut stmt = conn.prepare(LIST_COLUMNS).map_err(catalog_error)?;
        let rows = stmt
            .query_map([name], |row| {
                Ok(RawColumn {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default: row.get(4)?,
                    pk: row.get(5)?,
                })
            })
            .map_err(catalog_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(catalog_error)?;

        let key_columns = rows.iter().filter(|r| r.pk > 0).count();
        if key_columns > 1 {
            log_event_with_fields(
                Event::CompositeKeyIgnored,
                &[("columns", &key_columns.to_string()), ("table", name)],
            );
        }

        let mut keys: Vec<(i64, String)> = rows
            .iter()
            .filter(|r| r.pk > 0)
            .map(|r| (r.pk, r.name.clone()))
            .collect();
        keys.sort();

        let columns = rows
            .into_iter()
            .map(|raw| raw.into_column(key_columns == 1, without_rowid))
            .collect();

        let table = Table::new(name, columns);
        if without_rowid {
            Ok(table.without_rowid(keys.into_iter().map(|(_, k)| k).collect()))
        } else {
            Ok(table)
        }
    }
}

struct RawColumn {
    cid: i64,
    name: String,
    declared_type: String,
    not_null: bool,
    default: Option<String>,
    pk: i64,
}

impl RawColumn {
    fn into_column(self, single_key: bool, without_rowid: bool) -> Column {
        let data_type = normalize_type(&self.declared_type);
        let primary_key = single_key && self.pk > 0;

        // INTEGER PRIMARY KEY aliases the rowid and is assigned by the store
        let extra = if primary_key && !without_rowid && data_type == "integer" {
            "auto_increment".to_string()
        } else {
            String::new()
        };

        Column {
            name: self.name,
            ordinal: (self.cid + 1) as usize,
            nullable: !self.not_null,
            data_type,
            primary_key,
            extra,
            default: self.default,
            comment: String::new(),
        }
    }
}

/// `VARCHAR(255)` -> `varchar`
fn normalize_type(declared: &str) -> String {
    let base = match declared.find('(') {
        Some(pos) => &declared[..pos],
        None => declared,
    };
    base.trim().to_ascii_lowercase()
}

fn catalog_error(err: rusqlite::Error) -> DapiError {
    DapiError::Catalog(err.to_string())
}
