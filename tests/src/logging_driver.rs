use kiln::driver::{Capability, Connection, Driver};
use kiln::{Result, Value};
use kiln_core::{stmt::ValueRecord, SqlError};

use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex},
    time::Duration,
};

/// A driver wrapper recording every statement its connections execute.
#[derive(Debug)]
pub struct LoggingDriver {
    inner: Box<dyn Driver>,

    /// Shared by every connection handed out
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl LoggingDriver {
    pub fn new(driver: impl Driver) -> Self {
        Self {
            inner: Box::new(driver),
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn statements_handle(&self) -> Arc<Mutex<Vec<Statement>>> {
        self.statements.clone()
    }
}

impl Driver for LoggingDriver {
    fn capability(&self) -> &Capability {
        self.inner.capability()
    }

    fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(LoggingConnection {
            inner: self.inner.connect()?,
            statements: self.statements_handle(),
        }))
    }

    fn max_connections(&self) -> Option<usize> {
        self.inner.max_connections()
    }
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,

    /// Rows the caller consumed; zero for mutations
    pub rows: usize,
}

#[derive(Debug)]
pub struct LoggingConnection {
    inner: Box<dyn Connection>,
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl LoggingConnection {
    fn record(&self, sql: &str, params: &[Value]) {
        self.statements
            .lock()
            .expect("Failed to acquire statement log lock")
            .push(Statement {
                sql: sql.to_string(),
                params: params.to_vec(),
                rows: 0,
            });
    }
}

/// Counts a row against the most recent statement.
fn row_read(statements: &Mutex<Vec<Statement>>) {
    if let Some(statement) = statements
        .lock()
        .expect("Failed to acquire statement log lock")
        .last_mut()
    {
        statement.rows += 1;
    }
}

impl Connection for LoggingConnection {
    fn query_each(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
        each: &mut dyn FnMut(ValueRecord) -> ControlFlow<()>,
    ) -> std::result::Result<(), SqlError> {
        self.record(sql, params);
        let statements = &self.statements;
        self.inner.query_each(sql, params, timeout, &mut |row| {
            row_read(statements);
            each(row)
        })
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> std::result::Result<u64, SqlError> {
        self.record(sql, params);
        self.inner.execute(sql, params, timeout)
    }

    fn execute_batch(
        &mut self,
        sql: &str,
        batch: &[Vec<Value>],
    ) -> std::result::Result<Vec<u64>, SqlError> {
        for params in batch {
            self.record(sql, params);
        }
        self.inner.execute_batch(sql, batch)
    }

    // Schema scripts are not recorded
    fn execute_script(&mut self, sql: &str) -> std::result::Result<(), SqlError> {
        self.inner.execute_script(sql)
    }

    fn last_insert_id(&mut self) -> std::result::Result<i64, SqlError> {
        self.inner.last_insert_id()
    }

    fn begin(&mut self) -> std::result::Result<(), SqlError> {
        self.inner.begin()
    }

    fn commit(&mut self) -> std::result::Result<(), SqlError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> std::result::Result<(), SqlError> {
        self.inner.rollback()
    }
}
