mod value;
use value::Value;

use kiln_core::{
    driver::{Capability, Driver},
    stmt::{self, ValueRecord},
    Error, Result, SqlError, SqlErrorKind,
};
use rusqlite::{ffi, Connection as RusqliteConnection};
use url::Url;

use std::{
    ops::ControlFlow,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Virtual machine instructions between timeout checks.
const PROGRESS_OPS: i32 = 1000;

#[derive(Debug)]
pub enum Sqlite {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a new SQLite driver from a connection URL, e.g.
    /// `sqlite::memory:` or `sqlite:///tmp/app.db`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(anyhow::Error::from)?;

        if url.scheme() != "sqlite" {
            return Err(Error::from_args(format_args!(
                "connection URL does not have a `sqlite` scheme; url={url_str}"
            )));
        }

        if url.path() == ":memory:" {
            Ok(Self::InMemory)
        } else {
            Ok(Self::File(PathBuf::from(url.path())))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }
}

impl Driver for Sqlite {
    fn capability(&self) -> &Capability {
        &Capability::SQLITE
    }

    fn connect(&self) -> Result<Box<dyn kiln_core::Connection>> {
        let connection = match self {
            Sqlite::File(path) => Connection::open(path)?,
            Sqlite::InMemory => Connection::in_memory()?,
        };
        Ok(Box::new(connection))
    }

    fn max_connections(&self) -> Option<usize> {
        matches!(self, Self::InMemory).then_some(1)
    }
}

#[derive(Debug)]
pub struct Connection {
    connection: RusqliteConnection,
}

impl Connection {
    pub fn in_memory() -> Result<Self> {
        let connection = RusqliteConnection::open_in_memory().map_err(connect_error)?;
        Ok(Self { connection })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = RusqliteConnection::open(path).map_err(connect_error)?;
        Ok(Self { connection })
    }

    /// Interrupts the next statement once `timeout` elapses.
    fn arm_timeout(&self, timeout: Option<Duration>) {
        let Some(timeout) = timeout else { return };
        let deadline = Instant::now() + timeout;
        self.connection
            .progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
    }

    fn disarm_timeout(&self, timeout: Option<Duration>) {
        if timeout.is_some() {
            self.connection.progress_handler(0, None::<fn() -> bool>);
        }
    }

    fn run_query(
        &mut self,
        sql: &str,
        params: &[stmt::Value],
        each: &mut dyn FnMut(ValueRecord) -> ControlFlow<()>,
    ) -> rusqlite::Result<()> {
        let mut stmt = self.connection.prepare_cached(sql)?;
        let width = stmt.column_count();

        // Rows are stepped one at a time; nothing past the current row is read
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(Value)))?;
        while let Some(row) = rows.next()? {
            let mut items = Vec::with_capacity(width);
            for index in 0..width {
                items.push(Value::from_sql(row.get(index)?));
            }
            if each(ValueRecord::from_vec(items)).is_break() {
                break;
            }
        }

        Ok(())
    }

    fn run_execute(&mut self, sql: &str, params: &[stmt::Value]) -> rusqlite::Result<u64> {
        let mut stmt = self.connection.prepare_cached(sql)?;
        let count = stmt.execute(rusqlite::params_from_iter(params.iter().map(Value)))?;
        Ok(count as u64)
    }
}

impl kiln_core::Connection for Connection {
    fn query_each(
        &mut self,
        sql: &str,
        params: &[stmt::Value],
        timeout: Option<Duration>,
        each: &mut dyn FnMut(ValueRecord) -> ControlFlow<()>,
    ) -> std::result::Result<(), SqlError> {
        self.arm_timeout(timeout);
        let result = self.run_query(sql, params, each);
        self.disarm_timeout(timeout);
        result.map_err(sql_error)
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[stmt::Value],
        timeout: Option<Duration>,
    ) -> std::result::Result<u64, SqlError> {
        self.arm_timeout(timeout);
        let result = self.run_execute(sql, params);
        self.disarm_timeout(timeout);
        result.map_err(sql_error)
    }

    fn execute_batch(
        &mut self,
        sql: &str,
        batch: &[Vec<stmt::Value>],
    ) -> std::result::Result<Vec<u64>, SqlError> {
        let mut stmt = self.connection.prepare_cached(sql).map_err(sql_error)?;
        batch
            .iter()
            .map(|params| {
                stmt.execute(rusqlite::params_from_iter(params.iter().map(Value)))
                    .map(|count| count as u64)
                    .map_err(sql_error)
            })
            .collect()
    }

    fn execute_script(&mut self, sql: &str) -> std::result::Result<(), SqlError> {
        self.connection.execute_batch(sql).map_err(sql_error)
    }

    fn last_insert_id(&mut self) -> std::result::Result<i64, SqlError> {
        Ok(self.connection.last_insert_rowid())
    }

    fn begin(&mut self) -> std::result::Result<(), SqlError> {
        self.connection.execute_batch("BEGIN").map_err(sql_error)
    }

    fn commit(&mut self) -> std::result::Result<(), SqlError> {
        self.connection.execute_batch("COMMIT").map_err(sql_error)
    }

    fn rollback(&mut self) -> std::result::Result<(), SqlError> {
        self.connection.execute_batch("ROLLBACK").map_err(sql_error)
    }
}

fn connect_error(err: rusqlite::Error) -> Error {
    Error::connection_pool(format!("failed to open SQLite database: {err}"))
}

/// Classifies a rusqlite failure.
fn sql_error(err: rusqlite::Error) -> SqlError {
    let message = err.to_string();

    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            let kind = match failure.code {
                ffi::ErrorCode::ConstraintViolation => SqlErrorKind::ConstraintViolation,
                ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked => {
                    SqlErrorKind::LockAcquisition
                }
                ffi::ErrorCode::OperationInterrupted => SqlErrorKind::QueryTimeout,
                ffi::ErrorCode::TooBig | ffi::ErrorCode::TypeMismatch => SqlErrorKind::Data,
                _ if message.contains("syntax error") => SqlErrorKind::Syntax,
                _ => SqlErrorKind::Generic,
            };
            SqlError::new(kind, message).with_code(failure.extended_code)
        }
        rusqlite::Error::ToSqlConversionFailure(_)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::InvalidColumnType(..) => SqlError::new(SqlErrorKind::Data, message),
        _ if message.contains("syntax error") => SqlError::new(SqlErrorKind::Syntax, message),
        _ => {
            tracing::trace!(%message, "unclassified SQLite error");
            SqlError::new(SqlErrorKind::Generic, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::Connection as _;
    use pretty_assertions::assert_eq;

    fn connection() -> Connection {
        let mut connection = Connection::in_memory().unwrap();
        connection
            .execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")
            .unwrap();
        connection
    }

    #[test]
    fn url_forms() {
        assert!(matches!(Sqlite::new("sqlite::memory:").unwrap(), Sqlite::InMemory));
        assert!(matches!(
            Sqlite::new("sqlite:///tmp/kiln.db").unwrap(),
            Sqlite::File(path) if path == Path::new("/tmp/kiln.db")
        ));
        assert!(Sqlite::new("postgresql://localhost/db").is_err());
        assert_eq!(Sqlite::in_memory().max_connections(), Some(1));
    }

    #[test]
    fn numbered_parameters() {
        let mut connection = connection();
        let count = connection
            .execute(
                "INSERT INTO t (id, name) VALUES (?1, ?2)",
                &[stmt::Value::I64(1), stmt::Value::from("one")],
                None,
            )
            .unwrap();
        assert_eq!(count, 1);

        let rows = connection
            .query("SELECT name, id FROM t WHERE id = ?1", &[stmt::Value::I64(1)], None)
            .unwrap();
        assert_eq!(
            rows,
            [ValueRecord::from_vec(vec![stmt::Value::from("one"), stmt::Value::I64(1)])]
        );
    }

    #[test]
    fn rows_are_read_until_the_caller_stops() {
        let mut connection = connection();
        connection
            .execute_script("INSERT INTO t (id, name) VALUES (1, 'a'), (2, 'b'), (3, 'c')")
            .unwrap();

        let mut seen = vec![];
        connection
            .query_each("SELECT id FROM t ORDER BY id", &[], None, &mut |row| {
                seen.push(row[0].clone());
                if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(seen, [stmt::Value::I64(1), stmt::Value::I64(2)]);

        // The statement is reset and can run again
        let rows = connection.query("SELECT id FROM t", &[], None).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn constraint_violations_are_classified() {
        let mut connection = connection();
        let insert = "INSERT INTO t (id, name) VALUES (?1, ?2)";
        let batch = vec![
            vec![stmt::Value::I64(1), stmt::Value::from("a")],
            vec![stmt::Value::I64(2), stmt::Value::from("a")],
        ];
        let err = connection.execute_batch(insert, &batch).unwrap_err();
        assert_eq!(err.kind(), SqlErrorKind::ConstraintViolation);
    }

    #[test]
    fn syntax_errors_are_classified() {
        let mut connection = connection();
        let err = connection.query("SELEC id FROM t", &[], None).unwrap_err();
        assert_eq!(err.kind(), SqlErrorKind::Syntax);
    }

    #[test]
    fn timeouts_interrupt_the_statement() {
        let mut connection = connection();
        let sql = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
                   SELECT count(*) FROM c";
        let err = connection
            .query(sql, &[], Some(Duration::from_millis(20)))
            .unwrap_err();
        assert_eq!(err.kind(), SqlErrorKind::QueryTimeout);

        // The handler is removed afterwards
        let rows = connection.query("SELECT 1", &[], None).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
