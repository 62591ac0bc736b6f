use crate::schema::db::{ColumnId, TableId};

/// How one attribute is stored.
#[derive(Debug, Clone)]
pub enum Field {
    /// A basic attribute in one column of the owner's table.
    Column(ColumnId),

    /// An embeddable; one entry per attribute of the embeddable.
    Embedded(Vec<Field>),

    /// Foreign key columns in the owner's table, aligned with the target's
    /// identifier columns.
    ToOne(Vec<ColumnId>),

    /// Rows of `table` whose `key_columns` reference the owner's identifier.
    Collection {
        table: TableId,
        key_columns: Vec<ColumnId>,
    },
}

impl Field {
    /// Columns in the owner's table, flattened in attribute order.
    pub fn columns(&self) -> Vec<ColumnId> {
        let mut columns = vec![];
        self.columns_into(&mut columns);
        columns
    }

    fn columns_into(&self, dst: &mut Vec<ColumnId>) {
        match self {
            Field::Column(column) => dst.push(*column),
            Field::Embedded(fields) => {
                for field in fields {
                    field.columns_into(dst);
                }
            }
            Field::ToOne(columns) => dst.extend(columns),
            Field::Collection { .. } => {}
        }
    }

    pub fn as_embedded(&self) -> Option<&[Field]> {
        match self {
            Field::Embedded(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<ColumnId> {
        match self {
            Field::Column(column) => Some(*column),
            _ => None,
        }
    }
}
