pub mod cache;
pub use cache::{CacheRegion, InMemoryRegion};

pub mod db;
pub use db::Db;

pub mod driver {
    pub use kiln_core::driver::*;

    #[cfg(feature = "sqlite")]
    pub use kiln_driver_sqlite::Sqlite;
}

mod engine;

pub mod entity;
pub use entity::{Attr, Composite, EntityRef, Object, PersistentCollection};

pub mod function;
pub use function::FunctionRegistry;

pub mod query;
pub use query::{ParamKey, Query, RowTransformer, ScrollableResults};

pub mod session;
pub use session::{MultiLoadOptions, Session};

pub use kiln_core::{
    bail, err,
    schema::{self, Schema},
    stmt::{Type, Value},
    types::TypeConfiguration,
    Error, Result,
};
