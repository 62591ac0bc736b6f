use super::TableId;
use crate::{stmt, types::JdbcMapping, types::JdbcType};

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Uniquely identifies the column in the schema.
    pub id: ColumnId,

    /// The name of the column in the database.
    pub name: String,

    /// The value type read from and written to the column.
    pub ty: stmt::Type,

    /// How values are bound and extracted.
    pub jdbc_type: JdbcType,

    /// Whether or not the column is nullable
    pub nullable: bool,

    /// True if the column is part of the table's primary key
    pub primary_key: bool,

    /// True if the database generates the value on insert
    pub auto_increment: bool,
}

#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct ColumnId {
    pub table: TableId,
    pub index: usize,
}

impl Column {
    pub fn jdbc_mapping(&self) -> JdbcMapping {
        JdbcMapping::new(self.ty.clone(), self.jdbc_type)
    }
}

impl From<&Column> for ColumnId {
    fn from(value: &Column) -> Self {
        value.id
    }
}

impl fmt::Debug for ColumnId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "ColumnId({}/{})", self.table.0, self.index)
    }
}
