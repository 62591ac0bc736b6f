//! Statements writing one entity row at a time.

use super::{conjunction, JdbcParameter, Lower, ParamSource, Shape};
use crate::engine::Cx;

use kiln_core::{
    schema::{
        app::ModelId,
        db::{ColumnId, TableId},
    },
    stmt, Schema,
};
use kiln_sql::ParameterBinder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MutationKind {
    Insert,
    Update,
    Delete,
}

/// A rendered insert, update or delete of a single row.
///
/// Arguments are bound positionally:
///
/// * insert: one per column
/// * update: one per column, the new version, the identifier columns, the
///   old version
/// * delete: the identifier columns, the old version
///
/// Version arguments are only present for versioned entities.
#[derive(Debug)]
pub(crate) struct JdbcMutation {
    pub(crate) kind: MutationKind,
    pub(crate) model: ModelId,
    pub(crate) table: TableId,
    pub(crate) sql: String,
    pub(crate) binders: Vec<ParameterBinder>,
    pub(crate) parameters: Vec<JdbcParameter>,

    /// Inserted or assigned columns, the version column excluded
    pub(crate) columns: Vec<ColumnId>,

    pub(crate) versioned: bool,
}

impl JdbcMutation {
    pub(crate) fn insert(cx: Cx<'_>, model: ModelId, columns: Vec<ColumnId>) -> JdbcMutation {
        let schema = cx.schema;
        let table = schema.table_id_for(model);
        let mut lower = Lower::new(cx, None, Shape::default());

        let mut args = Args::default();
        let values = columns.iter().map(|column| args.next(&mut lower, *column)).collect();

        let stmt = stmt::Insert {
            table,
            columns: columns.clone(),
            values,
        };
        lower.mutation(MutationKind::Insert, model, columns, stmt.into())
    }

    pub(crate) fn update(cx: Cx<'_>, model: ModelId, columns: Vec<ColumnId>) -> JdbcMutation {
        let schema = cx.schema;
        let table = schema.table_id_for(model);
        let version = version_column(schema, model);
        let mut lower = Lower::new(cx, None, Shape::default());

        let mut args = Args::default();
        let mut assignments: Vec<_> = columns
            .iter()
            .map(|column| stmt::Assignment {
                column: *column,
                value: args.next(&mut lower, *column),
            })
            .collect();

        if let Some(version) = version {
            assignments.push(stmt::Assignment {
                column: version,
                value: args.next(&mut lower, version),
            });
        }

        let filter = args.row_filter(&mut lower, model, version);
        let stmt = stmt::Update {
            table,
            assignments,
            filter: Some(filter),
        };
        lower.mutation(MutationKind::Update, model, columns, stmt.into())
    }

    pub(crate) fn delete(cx: Cx<'_>, model: ModelId) -> JdbcMutation {
        let schema = cx.schema;
        let table = schema.table_id_for(model);
        let version = version_column(schema, model);
        let mut lower = Lower::new(cx, None, Shape::default());

        let filter = Args::default().row_filter(&mut lower, model, version);
        let stmt = stmt::Delete {
            table,
            filter: Some(filter),
        };
        lower.mutation(MutationKind::Delete, model, vec![], stmt.into())
    }

    /// Argument count of one execution
    pub(crate) fn arity(&self) -> usize {
        self.parameters.len()
    }
}

fn version_column(schema: &Schema, model: ModelId) -> Option<ColumnId> {
    let version = schema.model(model).as_entity()?.version?;
    schema.field_columns(version).first().copied()
}

/// Hands out positional arguments.
#[derive(Default)]
struct Args {
    next: usize,
}

impl Args {
    fn next(&mut self, lower: &mut Lower<'_>, column: ColumnId) -> stmt::Expr {
        let mapping = lower.cx.schema.column(column).jdbc_mapping();
        let param = lower.push_param(ParamSource::Arg(self.next), mapping);
        self.next += 1;
        param
    }

    /// Matches the row by identifier and, for versioned entities, by the
    /// version the session last saw.
    fn row_filter(&mut self, lower: &mut Lower<'_>, model: ModelId, version: Option<ColumnId>) -> stmt::Expr {
        let mut conditions = vec![];
        for column in lower.cx.schema.id_columns(model).into_iter().chain(version) {
            let param = self.next(lower, column);
            conditions.push(stmt::Expr::eq(stmt::Expr::bare_column(column), param));
        }
        conjunction(conditions)
    }
}

impl Lower<'_> {
    fn mutation(
        self,
        kind: MutationKind,
        model: ModelId,
        columns: Vec<ColumnId>,
        stmt: stmt::Statement,
    ) -> JdbcMutation {
        let (sql, binders) = self.render(&stmt);
        let versioned = version_column(self.cx.schema, model).is_some();

        JdbcMutation {
            kind,
            model,
            table: self.cx.schema.table_id_for(model),
            sql,
            binders,
            parameters: self.parameters,
            columns,
            versioned,
        }
    }
}
