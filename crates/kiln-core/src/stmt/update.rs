use super::{Expr, Statement};
use crate::schema::db::{ColumnId, TableId};

/// `UPDATE table SET assignments [WHERE filter]`
///
/// Columns in `filter` are qualified with the table name.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: TableId,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: ColumnId,
    pub value: Expr,
}

impl From<Update> for Statement {
    fn from(value: Update) -> Self {
        Self::Update(value)
    }
}
