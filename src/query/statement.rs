//! # Statement Composition
//!
//! Turns a table descriptor plus ordered assignment lists into SQL text with
//! positional `?` placeholders and a matching argument list.
//!
//! Values are never interpolated into the text. Identifiers are always the
//! catalog's own names, double-quoted, never the caller's spelling.

use rusqlite::types::Value as SqlValue;

use super::value::Assignments;
use crate::catalog::Table;
use crate::error::{DapiError, DapiResult};
use crate::observability::{log_event_with_fields, Event};

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// A statement against one catalog table
#[derive(Debug, Clone)]
pub enum Statement<'a> {
    Insert {
        table: &'a Table,
        values: Assignments,
    },
    Update {
        table: &'a Table,
        values: Assignments,
        predicate: Assignments,
    },
    Delete {
        table: &'a Table,
        predicate: Assignments,
        limit: i64,
    },
    Select {
        table: &'a Table,
        predicate: Assignments,
        limit: Option<i64>,
        offset: Option<i64>,
        order: Vec<OrderBy>,
    },
}

/// SQL text plus its arguments; argument `i` binds placeholder `i`
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedStatement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl ComposedStatement {
    /// Number of `?` placeholders outside quoted identifiers
    pub fn placeholder_count(&self) -> usize {
        let mut in_ident = false;
        let mut count = 0;
        for c in self.sql.chars() {
            match c {
                '"' => in_ident = !in_ident,
                '?' if !in_ident => count += 1,
                _ => {}
            }
        }
        count
    }
}

impl<'a> Statement<'a> {
    pub fn insert(table: &'a Table, values: Assignments) -> Self {
        Statement::Insert { table, values }
    }

    pub fn update(table: &'a Table, values: Assignments, predicate: Assignments) -> Self {
        Statement::Update {
            table,
            values,
            predicate,
        }
    }

    pub fn delete(table: &'a Table, predicate: Assignments, limit: i64) -> Self {
        Statement::Delete {
            table,
            predicate,
            limit,
        }
    }

    pub fn select(
        table: &'a Table,
        predicate: Assignments,
        limit: Option<i64>,
        offset: Option<i64>,
        order: Vec<OrderBy>,
    ) -> Self {
        Statement::Select {
            table,
            predicate,
            limit,
            offset,
            order,
        }
    }

    pub fn table(&self) -> &'a Table {
        match self {
            Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::Select { table, .. } => table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Insert { .. } => "insert",
            Statement::Update { .. } => "update",
            Statement::Delete { .. } => "delete",
            Statement::Select { .. } => "select",
        }
    }

    /// Build the SQL text and argument list.
    ///
    /// Fails with `MissingPredicate` for an update without a predicate,
    /// `MissingLimit` for a delete with `limit <= 0`, and `UnknownColumn`
    /// when an insert/update/delete names a column the table lacks.
    pub fn compose(&self) -> DapiResult<ComposedStatement> {
        match self {
            Statement::Insert { table, values } => compose_insert(table, values),
            Statement::Update {
                table,
                values,
                predicate,
            } => compose_update(table, values, predicate),
            Statement::Delete {
                table,
                predicate,
                limit,
            } => compose_delete(table, predicate, *limit),
            Statement::Select {
                table,
                predicate,
                limit,
                offset,
                order,
            } => compose_select(table, predicate, *limit, *offset, order),
        }
    }
}

fn compose_insert(table: &Table, values: &Assignments) -> DapiResult<ComposedStatement> {
    let mut sql = format!("INSERT INTO {}", quote_ident(&table.name));

    if values.is_empty() {
        sql.push_str(" DEFAULT VALUES");
        return Ok(ComposedStatement {
            sql,
            args: Vec::new(),
        });
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut args = Vec::with_capacity(values.len());
    for (name, value) in values {
        let column = table.require_column(name)?;
        columns.push(quote_ident(&column.name));
        args.push(value.clone());
    }

    sql.push_str(&format!(
        " ({}) VALUES ({})",
        columns.join(", "),
        vec!["?"; args.len()].join(", ")
    ));

    Ok(ComposedStatement { sql, args })
}

fn compose_update(
    table: &Table,
    values: &Assignments,
    predicate: &Assignments,
) -> DapiResult<ComposedStatement> {
    if predicate.is_empty() {
        return Err(DapiError::MissingPredicate);
    }

    // Nothing to change: assign the predicate columns to their matched
    // values so the statement stays valid and still reports matched rows.
    let assignments = if values.is_empty() { predicate } else { values };

    let mut args = Vec::with_capacity(assignments.len() + predicate.len());
    let set = equalities(table, assignments, ", ", &mut args)?;
    let filter = equalities(table, predicate, " AND ", &mut args)?;

    Ok(ComposedStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(&table.name),
            set,
            filter
        ),
        args,
    })
}

fn compose_delete(
    table: &Table,
    predicate: &Assignments,
    limit: i64,
) -> DapiResult<ComposedStatement> {
    if limit <= 0 {
        return Err(DapiError::MissingLimit);
    }

    let name = quote_ident(&table.name);
    let mut args = Vec::with_capacity(predicate.len());
    let filter = if predicate.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", equalities(table, predicate, " AND ", &mut args)?)
    };

    // DELETE ... LIMIT is a compile-time option in SQLite; bound the row
    // identities instead
    let (target, selected) = row_identity(table);
    Ok(ComposedStatement {
        sql: format!(
            "DELETE FROM {name} WHERE {target} IN (SELECT {selected} FROM {name}{filter} LIMIT {limit})"
        ),
        args,
    })
}

/// Left-hand side and select list that identify one row.
///
/// `rowid` for ordinary tables; the declared key for `WITHOUT ROWID` tables,
/// as a row value when the key is composite.
fn row_identity(table: &Table) -> (String, String) {
    if !table.without_rowid || table.key_columns.is_empty() {
        return ("rowid".to_string(), "rowid".to_string());
    }

    let columns: Vec<String> = table.key_columns.iter().map(|c| quote_ident(c)).collect();
    let selected = columns.join(", ");
    if columns.len() == 1 {
        (selected.clone(), selected)
    } else {
        (format!("({})", selected), selected)
    }
}

fn compose_select(
    table: &Table,
    predicate: &Assignments,
    limit: Option<i64>,
    offset: Option<i64>,
    order: &[OrderBy],
) -> DapiResult<ComposedStatement> {
    let mut sql = format!("SELECT * FROM {}", quote_ident(&table.name));
    let mut args = Vec::with_capacity(predicate.len());

    let known: Assignments = predicate
        .iter()
        .filter(|(name, _)| keep_column(table, name, "filter"))
        .cloned()
        .collect();
    if !known.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&equalities(table, &known, " AND ", &mut args)?);
    }

    let terms: Vec<String> = order
        .iter()
        .filter(|o| keep_column(table, &o.column, "order"))
        .filter_map(|o| {
            let column = table.column(&o.column)?;
            let direction = if o.ascending { "ASC" } else { "DESC" };
            Some(format!("{} {}", quote_ident(&column.name), direction))
        })
        .collect();
    if !terms.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    // An offset means nothing without a bound
    if let Some(limit) = limit.filter(|l| *l > 0) {
        sql.push_str(&format!(" LIMIT {}", limit));
        if let Some(offset) = offset.filter(|o| *o > 0) {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }

    Ok(ComposedStatement { sql, args })
}

/// `"a" = ?<sep>"b" = ?`, pushing one argument per term
fn equalities(
    table: &Table,
    pairs: &Assignments,
    separator: &str,
    args: &mut Vec<SqlValue>,
) -> DapiResult<String> {
    let mut terms = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        let column = table.require_column(name)?;
        terms.push(format!("{} = ?", quote_ident(&column.name)));
        args.push(value.clone());
    }
    Ok(terms.join(separator))
}

fn keep_column(table: &Table, name: &str, clause: &str) -> bool {
    if table.has_column(name) {
        return true;
    }
    log_event_with_fields(
        Event::ColumnDropped,
        &[("clause", clause), ("column", name), ("table", &table.name)],
    );
    false
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
