mod logging_driver;
pub use logging_driver::{LoggingDriver, Statement};

pub mod models;

mod sql_log;
pub use sql_log::SqlLog;

use kiln::{db, driver::Sqlite, Db, Schema};

use std::sync::Once;

pub use std_util::*;

/// A database built from a schema and its DDL, with every statement the
/// engine sends recorded.
pub struct DbTest {
    pub db: Db,
    log: SqlLog,
}

impl DbTest {
    /// In-memory SQLite database with `ddl` applied.
    pub fn new(schema: Schema, ddl: &str) -> DbTest {
        DbTest::with_builder(schema, ddl, |_| {})
    }

    /// Like [`DbTest::new`], letting the test configure the session
    /// factory.
    pub fn with_builder(
        schema: Schema,
        ddl: &str,
        configure: impl FnOnce(&mut db::Builder),
    ) -> DbTest {
        init_tracing();

        let driver = LoggingDriver::new(Sqlite::in_memory());
        let log = SqlLog::new(driver.statements_handle());

        let mut builder = Db::builder();
        builder.schema(schema);
        configure(&mut builder);
        let db = builder.build(driver).unwrap();

        db.execute_script(ddl).unwrap();

        DbTest { db, log }
    }

    pub fn log(&mut self) -> &mut SqlLog {
        &mut self.log
    }
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG`, once per test
/// binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
