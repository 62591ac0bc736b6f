use super::{Expr, Statement};
use crate::schema::db::{ColumnId, TableId};

/// `INSERT INTO table (columns) VALUES (values)`
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableId,
    pub columns: Vec<ColumnId>,
    pub values: Vec<Expr>,
}

impl From<Insert> for Statement {
    fn from(value: Insert) -> Self {
        Self::Insert(value)
    }
}
