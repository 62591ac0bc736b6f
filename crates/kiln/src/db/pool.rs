//! A simple blocking pool of database connections.

use kiln_core::{
    driver::{Connection, Driver},
    Error, Result,
};

use parking_lot::Mutex;
use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

/// Default cap when neither the driver nor the builder sets one.
const DEFAULT_MAX_SIZE: usize = 10;

/// Hands out connections opened by a [`Driver`], reusing returned ones.
///
/// The pool never waits: asking for a connection while `max_size` are
/// checked out is an error.
pub struct Pool {
    inner: Arc<Inner>,
}

struct Inner {
    driver: Arc<dyn Driver>,
    max_size: usize,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    idle: Vec<Box<dyn Connection>>,
    outstanding: usize,
    closed: bool,
}

impl Pool {
    pub fn new(driver: Arc<dyn Driver>, max_size: Option<usize>) -> Pool {
        let max_size = match (driver.max_connections(), max_size) {
            (Some(driver_max), Some(max)) => driver_max.min(max),
            (Some(max), None) | (None, Some(max)) => max,
            (None, None) => DEFAULT_MAX_SIZE,
        };

        Pool {
            inner: Arc::new(Inner {
                driver,
                max_size,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Retrieves a connection from the pool, opening one when none is idle.
    pub fn get(&self) -> Result<PoolConnection> {
        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Error::connection_pool("pool is closed"));
            }
            if state.outstanding >= self.inner.max_size {
                return Err(Error::connection_pool(format!(
                    "all {} connections are in use",
                    self.inner.max_size
                )));
            }
            state.outstanding += 1;
            state.idle.pop()
        };

        let connection = match idle {
            Some(connection) => connection,
            None => match self.inner.driver.connect() {
                Ok(connection) => {
                    tracing::debug!(driver = ?self.inner.driver, "opened connection");
                    connection
                }
                Err(err) => {
                    self.inner.state.lock().outstanding -= 1;
                    return Err(err);
                }
            },
        };

        Ok(PoolConnection {
            connection: Some(connection),
            pool: self.inner.clone(),
        })
    }

    /// Connections currently checked out.
    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().outstanding
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Closes idle connections and refuses further checkouts. Connections
    /// that were never returned are reported.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.idle.clear();

        if state.outstanding > 0 {
            tracing::error!(
                outstanding = state.outstanding,
                "connections not returned to the pool at shutdown"
            );
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Pool")
            .field("max_size", &self.inner.max_size)
            .field("idle", &state.idle.len())
            .field("outstanding", &state.outstanding)
            .finish()
    }
}

/// A connection retrieved from a pool.
///
/// When dropped, the connection is returned to the pool for reuse.
pub struct PoolConnection {
    connection: Option<Box<dyn Connection>>,
    pool: Arc<Inner>,
}

impl Deref for PoolConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_deref().expect("connection present until drop")
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_deref_mut()
            .expect("connection present until drop")
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut state = self.pool.state.lock();
        state.outstanding -= 1;
        if !state.closed {
            state.idle.push(connection);
        }
    }
}

impl fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConnection")
            .field("connection", &self.connection)
            .finish()
    }
}
