use super::{visit, Delete, Insert, JdbcParameterId, Select, TableRef, Update};
use crate::schema::db::TableId;

use indexmap::IndexSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    pub fn is_select(&self) -> bool {
        matches!(self, Self::Select(_))
    }

    pub fn as_select(&self) -> Option<&Select> {
        match self {
            Self::Select(select) => Some(select),
            _ => None,
        }
    }

    /// The table written by a DML statement.
    pub fn mutated_table(&self) -> Option<TableId> {
        match self {
            Self::Select(_) => None,
            Self::Insert(stmt) => Some(stmt.table),
            Self::Update(stmt) => Some(stmt.table),
            Self::Delete(stmt) => Some(stmt.table),
        }
    }

    /// Every table the statement reads or writes, subqueries included, in
    /// first-seen order.
    pub fn tables(&self) -> IndexSet<TableId> {
        let mut tables = IndexSet::new();

        if let Some(table) = self.mutated_table() {
            tables.insert(table);
        }

        visit::for_each_table_ref(self, |table_ref: &TableRef| {
            tables.insert(table_ref.table);
        });

        tables
    }

    /// Every JDBC parameter referenced by the statement, in visit order.
    pub fn params(&self) -> Vec<JdbcParameterId> {
        let mut params = vec![];
        visit::for_each_param(self, |id| params.push(id));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::db::ColumnId;
    use crate::stmt::{Expr, ExprInSubquery, TableRef};

    #[test]
    fn tables_include_subqueries() {
        let mut inner = Select::new(TableRef::new(TableId(1), "c1_0"));
        inner.projection.push(Expr::column(
            "c1_0",
            ColumnId {
                table: TableId(1),
                index: 0,
            },
        ));

        let stmt = Statement::Delete(Delete {
            table: TableId(0),
            filter: Some(Expr::InSubquery(ExprInSubquery {
                expr: Box::new(Expr::param(JdbcParameterId(0))),
                query: Box::new(inner),
                negate: false,
            })),
        });

        assert_eq!(stmt.tables().into_iter().collect::<Vec<_>>(), [TableId(0), TableId(1)]);
        assert_eq!(stmt.params(), [JdbcParameterId(0)]);
    }
}
