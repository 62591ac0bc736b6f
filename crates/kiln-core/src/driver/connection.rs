use crate::{
    stmt::{Value, ValueRecord},
    SqlError,
};

use std::{fmt::Debug, ops::ControlFlow, time::Duration};

/// Rows returned by a query, one record per row in column order.
///
/// Values are in the driver's storage class; the caller converts them with
/// each column's [`JdbcMapping`](crate::types::JdbcMapping).
pub type Rows = Vec<ValueRecord>;

/// A blocking, JDBC-like database connection.
///
/// Parameters are bound positionally in slice order. Failures are reported
/// as [`SqlError`]s carrying the vendor message; the engine attaches the SQL
/// text and normalizes them.
pub trait Connection: Debug + Send {
    /// Executes a query and hands each row to `each` as it is read from the
    /// database. Reading stops early when `each` breaks. `timeout`, when
    /// set, is applied to the statement before it executes and covers the
    /// whole read.
    fn query_each(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
        each: &mut dyn FnMut(ValueRecord) -> ControlFlow<()>,
    ) -> Result<(), SqlError>;

    /// Executes a query and returns all of its rows.
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<Rows, SqlError> {
        let mut rows = vec![];
        self.query_each(sql, params, timeout, &mut |row| {
            rows.push(row);
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }

    /// Executes a mutation and returns the affected row count.
    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<u64, SqlError>;

    /// Executes one statement once per parameter set, returning each affected
    /// row count.
    fn execute_batch(&mut self, sql: &str, batch: &[Vec<Value>]) -> Result<Vec<u64>, SqlError> {
        batch
            .iter()
            .map(|params| self.execute(sql, params, None))
            .collect()
    }

    /// Runs a script of `;`-separated statements without parameters.
    fn execute_script(&mut self, sql: &str) -> Result<(), SqlError>;

    /// Id generated by the most recent identity insert.
    fn last_insert_id(&mut self) -> Result<i64, SqlError>;

    fn begin(&mut self) -> Result<(), SqlError>;

    fn commit(&mut self) -> Result<(), SqlError>;

    fn rollback(&mut self) -> Result<(), SqlError>;
}
