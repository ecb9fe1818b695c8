//! # Execution Contexts
//!
//! An [`ExecutionContext`] applies composed statements. Handlers only ever
//! see `&dyn ExecutionContext`, so the same handler runs ad hoc against the
//! pool or inside a batch transaction.
//!
//! - [`PoolContext`]: every call checks out its own connection
//! - [`TransactionContext`]: every call runs on one reserved transaction

mod pool;
mod transaction;

pub use pool::{ConnectionPool, DatabaseTarget, PoolOptions, PooledConnection, MAX_TIMEOUT_MS};
pub use transaction::{TransactionContext, TransactionState};

use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};

use crate::error::DapiResult;
use crate::query::{sql_to_json, Statement};

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

/// Result of a statement that modifies rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: usize,
    /// Rowid of the most recent successful insert on the connection
    pub last_insert_id: i64,
}

pub trait ExecutionContext: Send + Sync {
    /// Apply a statement that modifies rows
    fn exec(&self, statement: &Statement<'_>) -> DapiResult<ExecOutcome>;

    /// Apply a statement that returns rows
    fn query(&self, statement: &Statement<'_>) -> DapiResult<Vec<Row>>;
}

/// Context backed directly by the pool
#[derive(Clone)]
pub struct PoolContext {
    pool: ConnectionPool,
}

impl PoolContext {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

impl ExecutionContext for PoolContext {
    fn exec(&self, statement: &Statement<'_>) -> DapiResult<ExecOutcome> {
        let conn = self.pool.checkout()?;
        exec_on(&conn, statement)
    }

    fn query(&self, statement: &Statement<'_>) -> DapiResult<Vec<Row>> {
        let conn = self.pool.checkout()?;
        query_on(&conn, statement)
    }
}

pub(crate) fn exec_on(conn: &Connection, statement: &Statement<'_>) -> DapiResult<ExecOutcome> {
    let composed = statement.compose()?;
    let rows_affected = conn.execute(&composed.sql, params_from_iter(composed.args.iter()))?;
    Ok(ExecOutcome {
        rows_affected,
        last_insert_id: conn.last_insert_rowid(),
    })
}

pub(crate) fn query_on(conn: &Connection, statement: &Statement<'_>) -> DapiResult<Vec<Row>> {
    let composed = statement.compose()?;
    let mut stmt = conn.prepare(&composed.sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(composed.args.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            object.insert(name.clone(), sql_to_json(row.get_ref(i)?));
        }
        out.push(object);
    }
    Ok(out)
}
