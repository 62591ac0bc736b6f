#[macro_use]
mod fmt;
use fmt::ToSql;

mod delim;
use delim::{Comma, Delimited};

mod flavor;

mod ident;
use ident::Ident;

mod params;
pub use params::{ParameterBinder, Params, Placeholder};

// Fragment serializers
mod expr;
mod func;
mod statement;

use kiln_core::{
    driver::{Capability, Dialect},
    schema::db,
    stmt::Statement,
};

/// Serialize a statement to a SQL string
#[derive(Debug)]
pub struct Serializer<'a> {
    /// Schema against which the statement is to be serialized
    schema: &'a db::Schema,

    /// The database capability handles the differences between SQL dialects
    /// and supported features.
    capability: &'a Capability,
}

struct Formatter<'a, T> {
    /// Handle to the serializer
    serializer: &'a Serializer<'a>,

    /// Where to write the serialized SQL
    dst: &'a mut String,

    /// Where to store parameters
    params: &'a mut T,
}

impl<'a> Serializer<'a> {
    pub fn new(schema: &'a db::Schema, capability: &'a Capability) -> Serializer<'a> {
        Serializer { schema, capability }
    }

    /// Renders `stmt`, recording each placeholder's binding in `params` in
    /// the order the placeholders appear.
    pub fn serialize(&self, stmt: &Statement, params: &mut impl Params) -> String {
        let mut ret = String::new();

        let mut fmt = Formatter {
            serializer: self,
            dst: &mut ret,
            params,
        };

        stmt.to_sql(&mut fmt);

        ret
    }

    fn dialect(&self) -> Dialect {
        self.capability.dialect
    }

    fn is_mysql(&self) -> bool {
        self.dialect() == Dialect::Mysql
    }

    fn table_name(&self, id: impl Into<db::TableId>) -> Ident<&'a str> {
        let table = self.schema.table(id.into());
        Ident(&table.name)
    }

    fn column_name(&self, id: impl Into<db::ColumnId>) -> Ident<&'a str> {
        let column = self.schema.column(id.into());
        Ident(&column.name)
    }
}
