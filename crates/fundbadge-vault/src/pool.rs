//! Reusable `DuckDB` connections for the vault file.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::Connection;

struct PoolShared {
    path: PathBuf,
    capacity: usize,
    idle: Mutex<Vec<Connection>>,
}

/// Small LIFO pool of open connections to one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// `capacity` bounds the idle set; checkouts beyond it open fresh
    /// connections that are closed on return.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                path: path.into(),
                capacity: capacity.max(1),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Checks out an idle connection or opens a new one.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened.
    pub fn checkout(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => {
                let connection = Connection::open(&self.shared.path)?;
                connection.execute_batch("PRAGMA disable_progress_bar;")?;
                connection
            }
        };

        Ok(PooledConnection {
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.shared.path.as_path()
    }
}

/// Connection handle that goes back to the idle set on drop.
pub struct PooledConnection {
    shared: Arc<PoolShared>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("connection is only taken in drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("connection is only taken in drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.shared.capacity {
            idle.push(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn returned_connections_are_reused_up_to_capacity() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::new(temp.path().join("pool.duckdb"), 1);

        let first = pool.checkout().expect("first");
        let second = pool.checkout().expect("second");
        drop(first);
        drop(second);

        let idle = pool.shared.idle.lock().expect("idle lock").len();
        assert_eq!(idle, 1);
    }

    #[test]
    fn checked_out_connection_runs_queries() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::new(temp.path().join("pool.duckdb"), 2);
        let connection = pool.checkout().expect("checkout");

        let value: i64 = connection
            .query_row("SELECT 40 + 2", [], |row| row.get(0))
            .expect("query");
        assert_eq!(value, 42);
    }
}
