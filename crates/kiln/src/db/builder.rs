use super::{Config, Connect, Db, Pool, Shared};
use crate::{cache::CacheRegion, function::FunctionRegistry};

use kiln_core::{driver::Driver, types::TypeConfiguration, Error, Result, Schema};

use std::{sync::Arc, time::Duration};

#[derive(Default)]
pub struct Builder {
    schema: Option<Arc<Schema>>,
    config: Config,
    pool_size: Option<usize>,
    query_cache: Option<Arc<dyn CacheRegion>>,
    functions: Option<FunctionRegistry>,
    types: Option<TypeConfiguration>,
}

impl Builder {
    /// The mapping model sessions of the database work with.
    pub fn schema(&mut self, schema: impl Into<Arc<Schema>>) -> &mut Self {
        self.schema = Some(schema.into());
        self
    }

    /// Keys per batch-fetch query, for entities that do not set their own.
    pub fn default_batch_fetch_size(&mut self, size: usize) -> &mut Self {
        self.config.default_batch_fetch_size = size.max(1);
        self
    }

    pub fn jdbc_batch_size(&mut self, size: usize) -> &mut Self {
        self.config.jdbc_batch_size = size.max(1);
        self
    }

    pub fn dynamic_insert(&mut self, enabled: bool) -> &mut Self {
        self.config.dynamic_insert = enabled;
        self
    }

    pub fn default_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    pub fn max_fetch_depth(&mut self, depth: usize) -> &mut Self {
        self.config.max_fetch_depth = depth;
        self
    }

    /// Caps the connection pool. Drivers with their own cap keep the lower
    /// of the two.
    pub fn pool_size(&mut self, size: usize) -> &mut Self {
        self.pool_size = Some(size.max(1));
        self
    }

    /// Enables caching of queries marked cacheable.
    pub fn query_cache(&mut self, region: impl CacheRegion) -> &mut Self {
        self.query_cache = Some(Arc::new(region));
        self
    }

    pub fn functions(&mut self, functions: FunctionRegistry) -> &mut Self {
        self.functions = Some(functions);
        self
    }

    pub fn types(&mut self, types: TypeConfiguration) -> &mut Self {
        self.types = Some(types);
        self
    }

    pub fn connect(&mut self, url: &str) -> Result<Db> {
        self.build(Connect::new(url)?)
    }

    pub fn build(&mut self, driver: impl Driver) -> Result<Db> {
        let Some(schema) = self.schema.take() else {
            return Err(Error::mapping("no schema was registered with the builder"));
        };

        let driver: Arc<dyn Driver> = Arc::new(driver);
        let pool = Pool::new(driver.clone(), self.pool_size);

        tracing::debug!(
            ?driver,
            models = schema.app.models.len(),
            pool = pool.max_size(),
            "session factory built"
        );

        Ok(Db {
            shared: Arc::new(Shared {
                schema,
                driver,
                config: self.config.clone(),
                pool,
                query_cache: self.query_cache.take(),
                timestamps: Default::default(),
                functions: self.functions.take().unwrap_or_default(),
                types: self.types.take().unwrap_or_default(),
            }),
        })
    }
}
