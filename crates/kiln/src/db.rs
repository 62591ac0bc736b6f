mod builder;
pub use builder::Builder;

mod connect;
pub use connect::Connect;

mod pool;
pub use pool::{Pool, PoolConnection};

use crate::{
    cache::{CacheRegion, UpdateTimestamps},
    engine::exec,
    function::FunctionRegistry,
    Session,
};

use kiln_core::{driver::Driver, types::TypeConfiguration, Result, Schema};

use std::{sync::Arc, time::Duration};

/// Settings fixed when the session factory is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Keys loaded per batch-fetch query when the entity does not set its
    /// own batch size
    pub default_batch_fetch_size: usize,

    /// Inserts sent per JDBC batch
    pub jdbc_batch_size: usize,

    /// Omit null columns from inserts of every entity
    pub dynamic_insert: bool,

    /// Applied to statements of queries that do not set a timeout
    pub default_timeout: Option<Duration>,

    /// Join-fetch depth at which eager associations switch to select
    /// fetching
    pub max_fetch_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            default_batch_fetch_size: 16,
            jdbc_batch_size: 25,
            dynamic_insert: false,
            default_timeout: None,
            max_fetch_depth: 3,
        }
    }
}

/// Shared state between all sessions of a `Db`.
pub(crate) struct Shared {
    pub(crate) schema: Arc<Schema>,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) config: Config,
    pub(crate) pool: Pool,
    pub(crate) query_cache: Option<Arc<dyn CacheRegion>>,
    pub(crate) timestamps: UpdateTimestamps,
    pub(crate) functions: FunctionRegistry,
    pub(crate) types: TypeConfiguration,
}

/// The session factory.
///
/// Holds the immutable mapping model, the connection pool and the query
/// results cache. Cloning is cheap; clones share everything.
#[derive(Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

impl Db {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Opens a session holding one pooled connection until it is closed or
    /// dropped.
    pub fn open_session(&self) -> Result<Session> {
        let connection = self.shared.pool.get()?;
        Ok(Session::new(self.shared.clone(), connection))
    }

    /// Runs a script of `;`-separated statements, such as DDL, on a pooled
    /// connection.
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        let mut connection = self.shared.pool.get()?;
        tracing::debug!(sql, "execute script");
        connection
            .execute_script(sql)
            .map_err(|err| exec::convert_sql_error(err, sql))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.shared.schema
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn capability(&self) -> &kiln_core::driver::Capability {
        self.shared.driver.capability()
    }

    /// Drops every cached query result.
    pub fn evict_query_cache(&self) {
        if let Some(region) = &self.shared.query_cache {
            region.clear();
        }
    }

    /// Closes the pool. Connections still held by sessions are reported and
    /// dropped when those sessions end.
    pub fn close(&self) {
        self.shared.pool.shutdown();
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("driver", &self.shared.driver)
            .field("config", &self.shared.config)
            .field("pool", &self.shared.pool)
            .finish()
    }
}
