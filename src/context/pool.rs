//! Bounded pool of SQLite connections
//!
//! Connections are opened lazily up to `max_size`. A checkout blocks while
//! the pool is exhausted and fails with `PoolExhausted` after
//! `checkout_timeout`. A connection handed back while still inside a
//! transaction is closed instead of reused.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::{DapiError, DapiResult};

/// Longest timeout SQLite's busy handler accepts, in milliseconds
pub const MAX_TIMEOUT_MS: u64 = i32::MAX as u64;

/// Where connections point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A database file on disk
    File(PathBuf),
    /// A named shared-cache in-memory database, alive while any connection is open
    Memory(String),
}

impl DatabaseTarget {
    /// `:memory:` maps to a fresh uniquely named in-memory database
    pub fn parse(database: &str) -> Self {
        if database == ":memory:" {
            DatabaseTarget::Memory(format!("dapi-{}", Uuid::new_v4()))
        } else {
            DatabaseTarget::File(PathBuf::from(database))
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            DatabaseTarget::File(path) => Connection::open(path),
            DatabaseTarget::Memory(name) => {
                Connection::open(format!("file:{}?mode=memory&cache=shared", name))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_size: usize,
    pub busy_timeout: Duration,
    pub checkout_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 4,
            busy_timeout: Duration::from_millis(5000),
            checkout_timeout: Duration::from_millis(5000),
        }
    }
}

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

struct PoolInner {
    target: DatabaseTarget,
    options: PoolOptions,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Shared handle to the pool; clones refer to the same connections
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create the pool and open one connection to verify the target
    pub fn open(target: DatabaseTarget, options: PoolOptions) -> DapiResult<Self> {
        let pool = Self {
            inner: Arc::new(PoolInner {
                target,
                options,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    open: 0,
                }),
                available: Condvar::new(),
            }),
        };
        drop(pool.checkout()?);
        Ok(pool)
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.inner.target
    }

    pub fn max_size(&self) -> usize {
        self.inner.options.max_size
    }

    /// Connections currently open, idle or checked out
    pub fn open_connections(&self) -> usize {
        self.inner.state.lock().map(|s| s.open).unwrap_or(0)
    }

    /// Take a connection, opening a new one if the pool has room
    pub fn checkout(&self) -> DapiResult<PooledConnection> {
        let timeout = self.inner.options.checkout_timeout;
        // None: the timeout is too far out to represent, wait without bound
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock_state()?;

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(self.wrap(conn));
            }

            if state.open < self.inner.options.max_size {
                state.open += 1;
                drop(state);
                return match self.connect() {
                    Ok(conn) => Ok(self.wrap(conn)),
                    Err(err) => {
                        self.forget_one();
                        Err(err)
                    }
                };
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DapiError::PoolExhausted(timeout.as_millis() as u64));
                    }
                    deadline - now
                }
                None => timeout,
            };
            state = self
                .inner
                .available
                .wait_timeout(state, wait)
                .map_err(|_| DapiError::Internal("connection pool lock poisoned".to_string()))?
                .0;
        }
    }

    fn connect(&self) -> DapiResult<Connection> {
        let conn = self.inner.target.open()?;
        conn.busy_timeout(
            self.inner
                .options
                .busy_timeout
                .min(Duration::from_millis(MAX_TIMEOUT_MS)),
        )?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if let DatabaseTarget::File(_) = self.inner.target {
            // Readers keep working while a batch holds the write lock
            let _mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }
        Ok(conn)
    }

    fn wrap(&self, conn: Connection) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            pool: self.clone(),
        }
    }

    fn lock_state(&self) -> DapiResult<std::sync::MutexGuard<'_, PoolState>> {
        self.inner
            .state
            .lock()
            .map_err(|_| DapiError::Internal("connection pool lock poisoned".to_string()))
    }

    fn give_back(&self, conn: Connection) {
        if let Ok(mut state) = self.inner.state.lock() {
            if conn.is_autocommit() {
                state.idle.push(conn);
            } else {
                state.open = state.open.saturating_sub(1);
            }
        }
        self.inner.available.notify_one();
    }

    fn forget_one(&self) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.open = state.open.saturating_sub(1);
        }
        self.inner.available.notify_one();
    }
}

/// A checked-out connection; returns to the pool on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: ConnectionPool,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_pool(tmp: &TempDir, max_size: usize) -> ConnectionPool {
        let options = PoolOptions {
            max_size,
            checkout_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        ConnectionPool::open(DatabaseTarget::File(tmp.path().join("pool.db")), options).unwrap()
    }

    #[test]
    fn test_connections_are_reused() {
        let tmp = TempDir::new().unwrap();
        let pool = file_pool(&tmp, 2);

        for _ in 0..10 {
            let conn = pool.checkout().unwrap();
            conn.execute_batch("SELECT 1").unwrap();
        }
        assert_eq!(pool.open_connections(), 1);
    }

    #[test]
    fn test_exhausted_pool_times_out() {
        let tmp = TempDir::new().unwrap();
        let pool = file_pool(&tmp, 1);

        let held = pool.checkout().unwrap();
        assert_eq!(pool.checkout().err(), Some(DapiError::PoolExhausted(50)));

        drop(held);
        assert!(pool.checkout().is_ok());
    }

    #[test]
    fn test_oversized_timeouts_are_tolerated() {
        let tmp = TempDir::new().unwrap();
        let options = PoolOptions {
            max_size: 1,
            busy_timeout: Duration::from_secs(u64::MAX),
            checkout_timeout: Duration::MAX,
        };
        let pool =
            ConnectionPool::open(DatabaseTarget::File(tmp.path().join("pool.db")), options).unwrap();

        for _ in 0..2 {
            let conn = pool.checkout().unwrap();
            conn.execute_batch("SELECT 1").unwrap();
        }
        assert_eq!(pool.open_connections(), 1);
    }

    #[test]
    fn test_connection_in_transaction_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let pool = file_pool(&tmp, 2);

        {
            let conn = pool.checkout().unwrap();
            conn.execute_batch("BEGIN").unwrap();
        }
        assert_eq!(pool.open_connections(), 0);
    }

    #[test]
    fn test_memory_target_is_shared_between_connections() {
        let pool =
            ConnectionPool::open(DatabaseTarget::parse(":memory:"), PoolOptions::default()).unwrap();

        let first = pool.checkout().unwrap();
        first
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();

        let second = pool.checkout().unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
