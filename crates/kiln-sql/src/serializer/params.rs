use super::{Formatter, ToSql};

use kiln_core::{driver::Dialect, stmt};

/// What a rendered placeholder is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBinder {
    /// A JDBC parameter of the translated statement
    Parameter(stmt::JdbcParameterId),

    /// A literal inlined in the syntax tree
    Literal(stmt::Value),
}

pub trait Params {
    fn push(&mut self, param: ParameterBinder) -> Placeholder;
}

/// One-based placeholder position.
pub struct Placeholder(pub usize);

impl Params for Vec<ParameterBinder> {
    fn push(&mut self, param: ParameterBinder) -> Placeholder {
        self.push(param);
        Placeholder(self.len())
    }
}

impl ToSql for Placeholder {
    fn to_sql<P: super::Params>(self, f: &mut Formatter<'_, P>) {
        use std::fmt::Write;

        let _ = match f.serializer.dialect() {
            Dialect::Mysql => write!(&mut f.dst, "?"),
            Dialect::Postgresql => write!(&mut f.dst, "${}", self.0),
            Dialect::Sqlite => write!(&mut f.dst, "?{}", self.0),
        };
    }
}
