//! Binding and execution of rendered statements.
//!
//! Every statement runs through the functions here, so driver failures are
//! normalized in one place and every executed SQL string is logged.

use super::lower::{Component, JdbcParameter, ParamSource};

use kiln_core::{
    driver::{Connection, Rows},
    stmt::{Value, ValueRecord},
    Error, Result, SqlError,
};
use kiln_sql::ParameterBinder;

use std::{ops::ControlFlow, time::Duration};

/// Runtime values for the JDBC parameters of one execution.
#[derive(Debug, Default)]
pub(crate) struct Bindings<'a> {
    /// Query parameter values indexed by `ParamId`; lists for list
    /// parameters.
    pub(crate) params: &'a [Option<Value>],

    /// Loader and mutation arguments
    pub(crate) args: &'a [Value],

    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
}

impl<'a> Bindings<'a> {
    pub(crate) fn args(args: &'a [Value]) -> Bindings<'a> {
        Bindings {
            args,
            ..Bindings::default()
        }
    }

    fn value(&self, source: &ParamSource) -> Result<Value> {
        match source {
            ParamSource::Query {
                param,
                element,
                component,
            } => {
                let Some(value) = self.params.get(param.0).and_then(Option::as_ref) else {
                    return Err(Error::parameter_binding(format!(
                        "no value bound for parameter #{}",
                        param.0 + 1
                    )));
                };

                let value = match (element, value) {
                    (None, value) => value,
                    (Some(i), Value::List(items)) => items.get(*i).ok_or_else(|| {
                        Error::parameter_binding(format!("list parameter has no element {i}"))
                    })?,
                    (Some(_), value) => {
                        return Err(Error::parameter_binding(format!(
                            "expected a list of values, got `{value}`"
                        )))
                    }
                };

                match component {
                    None => Ok(value.clone()),
                    Some(Component { index, width }) => {
                        let mut leaves = vec![];
                        value.flatten_into(&mut leaves);
                        if leaves.len() != *width {
                            return Err(Error::parameter_binding(format!(
                                "`{value}` has {} columns; the value it is compared with has {width}",
                                leaves.len()
                            )));
                        }
                        Ok(leaves.swap_remove(*index))
                    }
                }
            }
            ParamSource::Arg(i) => Ok(self.args[*i].clone()),
            ParamSource::Limit => Ok(Value::I64(self.limit.unwrap_or(i64::MAX))),
            ParamSource::Offset => Ok(Value::I64(self.offset.unwrap_or(0))),
        }
    }
}

/// Values for each placeholder of a rendered statement, converted by each
/// parameter's binder.
///
/// Fails fast when the arguments do not match the parameters the statement
/// declares.
pub(crate) fn bind(
    binders: &[ParameterBinder],
    parameters: &[JdbcParameter],
    bindings: &Bindings<'_>,
) -> Result<Vec<Value>> {
    let expected_args = parameters
        .iter()
        .filter_map(|parameter| match parameter.source {
            ParamSource::Arg(i) => Some(i + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    if expected_args != bindings.args.len() {
        return Err(Error::parameter_count_mismatch(
            expected_args,
            bindings.args.len(),
        ));
    }

    let mut values = Vec::with_capacity(binders.len());
    for binder in binders {
        values.push(match binder {
            ParameterBinder::Literal(value) => value.clone(),
            ParameterBinder::Parameter(id) => {
                let parameter = &parameters[id.0];
                let value = bindings.value(&parameter.source)?;
                parameter.mapping.bind(&value)?
            }
        });
    }

    Ok(values)
}

/// Attaches the SQL text to a driver error.
pub(crate) fn convert_sql_error(err: SqlError, sql: &str) -> Error {
    Error::sql(err.with_sql(sql))
}

pub(crate) fn query(
    connection: &mut dyn Connection,
    sql: &str,
    params: &[Value],
    timeout: Option<Duration>,
) -> Result<Rows> {
    tracing::debug!(sql, params = ?params, "query");
    let rows = connection
        .query(sql, params, timeout)
        .map_err(|err| convert_sql_error(err, sql))?;
    tracing::trace!(rows = rows.len(), "query returned");
    Ok(rows)
}

/// Runs a select, handing rows to `each` as the driver reads them. An error
/// from `each` stops the read and is returned as is.
pub(crate) fn query_each(
    connection: &mut dyn Connection,
    sql: &str,
    params: &[Value],
    timeout: Option<Duration>,
    each: &mut dyn FnMut(ValueRecord) -> Result<ControlFlow<()>>,
) -> Result<()> {
    tracing::debug!(sql, params = ?params, "query");
    let mut failed = None;
    let mut count = 0usize;
    connection
        .query_each(sql, params, timeout, &mut |row| {
            count += 1;
            each(row).unwrap_or_else(|err| {
                failed = Some(err);
                ControlFlow::Break(())
            })
        })
        .map_err(|err| convert_sql_error(err, sql))?;

    if let Some(err) = failed {
        return Err(err);
    }
    tracing::trace!(rows = count, "query read");
    Ok(())
}

pub(crate) fn execute(
    connection: &mut dyn Connection,
    sql: &str,
    params: &[Value],
    timeout: Option<Duration>,
) -> Result<u64> {
    tracing::debug!(sql, params = ?params, "execute");
    connection
        .execute(sql, params, timeout)
        .map_err(|err| convert_sql_error(err, sql))
}

pub(crate) fn execute_batch(
    connection: &mut dyn Connection,
    sql: &str,
    batch: &[Vec<Value>],
) -> Result<Vec<u64>> {
    tracing::debug!(sql, size = batch.len(), "execute batch");
    connection
        .execute_batch(sql, batch)
        .map_err(|err| convert_sql_error(err, sql))
}

/// A single-row mutation must affect exactly `expected` rows; anything else
/// means the row changed or vanished since it was read.
pub(crate) fn check_row_count(
    entity: &str,
    id: &Value,
    expected: u64,
    actual: u64,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }

    Err(Error::stale_state(
        entity,
        Some(id.to_string()),
        expected,
        actual,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sqm::ParamId;

    use kiln_core::{
        stmt::{JdbcParameterId, Type},
        types::{JdbcMapping, JdbcType},
        SqlErrorKind,
    };
    use std_util::assert_err;

    fn query_param(param: usize, element: Option<usize>, component: Option<Component>) -> JdbcParameter {
        JdbcParameter {
            source: ParamSource::Query {
                param: ParamId(param),
                element,
                component,
            },
            mapping: JdbcMapping::new(Type::I64, JdbcType::BigInt),
        }
    }

    #[test]
    fn binds_in_placeholder_order() {
        let parameters = vec![
            query_param(0, None, Some(Component { index: 1, width: 2 })),
            query_param(0, None, Some(Component { index: 0, width: 2 })),
        ];
        let binders = vec![
            ParameterBinder::Parameter(JdbcParameterId(1)),
            ParameterBinder::Literal(Value::from("x")),
            ParameterBinder::Parameter(JdbcParameterId(0)),
        ];
        let params = [Some(Value::record_from_vec(vec![Value::I32(1), Value::I32(2)]))];
        let bindings = Bindings {
            params: &params,
            ..Bindings::default()
        };

        let values = bind(&binders, &parameters, &bindings).unwrap();
        assert_eq!(values, [Value::I64(1), Value::from("x"), Value::I64(2)]);
    }

    #[test]
    fn list_elements() {
        let parameters = vec![query_param(0, Some(1), None)];
        let binders = vec![ParameterBinder::Parameter(JdbcParameterId(0))];
        let params = [Some(Value::List(vec![Value::I64(5), Value::I64(6)]))];
        let bindings = Bindings {
            params: &params,
            ..Bindings::default()
        };
        assert_eq!(bind(&binders, &parameters, &bindings).unwrap(), [Value::I64(6)]);
    }

    #[test]
    fn component_values_must_span_every_column() {
        let parameters = vec![
            query_param(0, None, Some(Component { index: 0, width: 2 })),
            query_param(0, None, Some(Component { index: 1, width: 2 })),
        ];
        let binders = vec![
            ParameterBinder::Parameter(JdbcParameterId(0)),
            ParameterBinder::Parameter(JdbcParameterId(1)),
        ];

        for value in [
            Value::record_from_vec(vec![Value::I64(1), Value::I64(2), Value::I64(3)]),
            Value::record_from_vec(vec![Value::I64(1)]),
        ] {
            let params = [Some(value)];
            let bindings = Bindings {
                params: &params,
                ..Bindings::default()
            };
            assert_err!(bind(&binders, &parameters, &bindings), is_parameter_binding);
        }
    }

    #[test]
    fn unbound_parameters_fail() {
        let parameters = vec![query_param(0, None, None)];
        let binders = vec![ParameterBinder::Parameter(JdbcParameterId(0))];
        let err = assert_err!(bind(&binders, &parameters, &Bindings::default()));
        assert!(err.is_parameter_binding());
    }

    #[test]
    fn argument_count_must_match() {
        let parameters = vec![JdbcParameter {
            source: ParamSource::Arg(1),
            mapping: JdbcMapping::new(Type::I64, JdbcType::BigInt),
        }];
        let binders = vec![ParameterBinder::Parameter(JdbcParameterId(0))];
        let args = [Value::I64(1)];
        let err = assert_err!(bind(&binders, &parameters, &Bindings::args(&args)));
        assert!(err.is_parameter_binding());
    }

    #[test]
    fn sql_errors_carry_the_statement() {
        let err = convert_sql_error(
            SqlError::new(SqlErrorKind::ConstraintViolation, "UNIQUE constraint failed"),
            "INSERT INTO person (id) VALUES (?1)",
        );
        assert!(err.is_constraint_violation());
        assert_eq!(
            err.sql_error().unwrap().sql(),
            Some("INSERT INTO person (id) VALUES (?1)")
        );
    }

    #[test]
    fn row_count_mismatch_is_stale_state() {
        check_row_count("Person", &Value::I64(1), 1, 1).unwrap();
        let err = assert_err!(check_row_count("Person", &Value::I64(1), 1, 0));
        assert!(err.is_stale_state());
    }
}
