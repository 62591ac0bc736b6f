use super::{Expr, Statement};
use crate::schema::db::TableId;

/// `DELETE FROM table [WHERE filter]`
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: TableId,
    pub filter: Option<Expr>,
}

impl From<Delete> for Statement {
    fn from(value: Delete) -> Self {
        Self::Delete(value)
    }
}
