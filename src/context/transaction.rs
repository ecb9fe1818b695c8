//! Transaction-bound execution context
//!
//! Reserves one pooled connection and opens `BEGIN IMMEDIATE` on it. Every
//! exec/query runs on that connection until `commit` or `rollback`; after
//! either, calls fail with `ClosedContext`. A context dropped while still
//! open is rolled back.

use std::sync::Mutex;

use uuid::Uuid;

use super::pool::{ConnectionPool, PooledConnection};
use super::{exec_on, query_on, ExecOutcome, ExecutionContext, Row};
use crate::error::{DapiError, DapiResult};
use crate::query::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

struct Inner {
    conn: Option<PooledConnection>,
    state: TransactionState,
}

pub struct TransactionContext {
    id: Uuid,
    inner: Mutex<Inner>,
}

impl TransactionContext {
    /// Reserve a connection and start a write transaction on it
    pub fn begin(pool: &ConnectionPool) -> DapiResult<Self> {
        let conn = pool.checkout()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            id: Uuid::new_v4(),
            inner: Mutex::new(Inner {
                conn: Some(conn),
                state: TransactionState::Open,
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(TransactionState::RolledBack)
    }

    /// Commit; on failure the transaction is rolled back and `CommitFailed` returned
    pub fn commit(&self) -> DapiResult<()> {
        let mut inner = self.lock()?;
        let conn = inner.take_open()?;

        match conn.execute_batch("COMMIT") {
            Ok(()) => {
                inner.state = TransactionState::Committed;
                Ok(())
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                inner.state = TransactionState::RolledBack;
                Err(DapiError::CommitFailed(err.to_string()))
            }
        }
    }

    /// Roll back; the context is closed even if the store reports an error
    pub fn rollback(&self) -> DapiResult<()> {
        let mut inner = self.lock()?;
        let conn = inner.take_open()?;
        inner.state = TransactionState::RolledBack;
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn lock(&self) -> DapiResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| DapiError::Internal("transaction lock poisoned".to_string()))
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&PooledConnection) -> DapiResult<T>,
    ) -> DapiResult<T> {
        let inner = self.lock()?;
        match (&inner.state, &inner.conn) {
            (TransactionState::Open, Some(conn)) => f(conn),
            _ => Err(DapiError::ClosedContext),
        }
    }
}

impl Inner {
    fn take_open(&mut self) -> DapiResult<PooledConnection> {
        if self.state != TransactionState::Open {
            return Err(DapiError::ClosedContext);
        }
        self.conn.take().ok_or(DapiError::ClosedContext)
    }
}

impl ExecutionContext for TransactionContext {
    fn exec(&self, statement: &Statement<'_>) -> DapiResult<ExecOutcome> {
        self.with_connection(|conn| exec_on(conn, statement))
    }

    fn query(&self, statement: &Statement<'_>) -> DapiResult<Vec<Row>> {
        self.with_connection(|conn| query_on(conn, statement))
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if inner.state == TransactionState::Open {
                if let Some(conn) = inner.conn.take() {
                    let _ = conn.execute_batch("ROLLBACK");
                }
                inner.state = TransactionState::RolledBack;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Table};
    use crate::context::{DatabaseTarget, PoolContext, PoolOptions};
    use crate::query::assignments_from_object;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConnectionPool, Table) {
        let tmp = TempDir::new().unwrap();
        let pool = ConnectionPool::open(
            DatabaseTarget::File(tmp.path().join("tx.db")),
            PoolOptions::default(),
        )
        .unwrap();
        pool.checkout()
            .unwrap()
            .execute_batch("CREATE TABLE user (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let table = Table::new(
            "user",
            vec![
                Column::new("id", 1, "integer").primary(),
                Column::new("name", 2, "text"),
            ],
        );
        (tmp, pool, table)
    }

    fn insert_jack(ctx: &dyn ExecutionContext, table: &Table) {
        let values = assignments_from_object(json!({"name": "jack"}).as_object().unwrap());
        ctx.exec(&Statement::insert(table, values)).unwrap();
    }

    fn count(pool: &ConnectionPool, table: &Table) -> usize {
        PoolContext::new(pool.clone())
            .query(&Statement::select(table, Vec::new(), None, None, Vec::new()))
            .unwrap()
            .len()
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let (_tmp, pool, table) = setup();
        let tx = TransactionContext::begin(&pool).unwrap();

        insert_jack(&tx, &table);
        // Read-your-writes inside the transaction
        let inside = tx
            .query(&Statement::select(&table, Vec::new(), None, None, Vec::new()))
            .unwrap();
        assert_eq!(inside.len(), 1);

        tx.commit().unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(count(&pool, &table), 1);
    }

    #[test]
    fn test_rollback_discards_writes() {
        let (_tmp, pool, table) = setup();
        let tx = TransactionContext::begin(&pool).unwrap();

        insert_jack(&tx, &table);
        tx.rollback().unwrap();

        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(count(&pool, &table), 0);
    }

    #[test]
    fn test_closed_context_rejects_calls() {
        let (_tmp, pool, table) = setup();
        let tx = TransactionContext::begin(&pool).unwrap();
        tx.commit().unwrap();

        let select = Statement::select(&table, Vec::new(), None, None, Vec::new());
        assert_eq!(tx.query(&select), Err(DapiError::ClosedContext));
        assert_eq!(tx.commit(), Err(DapiError::ClosedContext));
        assert_eq!(tx.rollback(), Err(DapiError::ClosedContext));
    }

    #[test]
    fn test_drop_rolls_back() {
        let (_tmp, pool, table) = setup();
        {
            let tx = TransactionContext::begin(&pool).unwrap();
            insert_jack(&tx, &table);
        }
        assert_eq!(count(&pool, &table), 0);
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let (_tmp, pool, _) = setup();
        pool.checkout()
            .unwrap()
            .execute_batch(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     id INTEGER PRIMARY KEY,
                     pid INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .unwrap();
        let child = Table::new(
            "child",
            vec![
                Column::new("id", 1, "integer").primary(),
                Column::new("pid", 2, "integer"),
            ],
        );

        let tx = TransactionContext::begin(&pool).unwrap();
        let values = assignments_from_object(json!({"pid": 99}).as_object().unwrap());
        tx.exec(&Statement::insert(&child, values)).unwrap();

        assert!(matches!(tx.commit(), Err(DapiError::CommitFailed(_))));
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(count(&pool, &child), 0);
        // the connection went back to the pool outside a transaction
        assert!(pool.checkout().unwrap().is_autocommit());
    }
}
