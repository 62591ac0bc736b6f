use super::Expr;
use crate::schema::db::TableId;

/// A table reference with its per-query alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: TableId,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    /// Identify a table
    pub table: TableRef,

    /// Joins to apply
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// The table to join
    pub table: TableRef,

    pub kind: JoinKind,

    /// The join condition
    pub on: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl TableRef {
    pub fn new(table: TableId, alias: impl Into<String>) -> TableRef {
        TableRef {
            table,
            alias: alias.into(),
        }
    }
}

impl TableWithJoins {
    pub fn new(table: TableRef) -> TableWithJoins {
        TableWithJoins {
            table,
            joins: vec![],
        }
    }

    /// Finds the table reference (root or joined) carrying `alias`.
    pub fn find(&self, alias: &str) -> Option<&TableRef> {
        std::iter::once(&self.table)
            .chain(self.joins.iter().map(|join| &join.table))
            .find(|table_ref| table_ref.alias == alias)
    }
}

impl From<TableRef> for TableWithJoins {
    fn from(value: TableRef) -> Self {
        TableWithJoins::new(value)
    }
}
