use super::{Expr, Statement, TableRef, TableWithJoins};

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub distinct: bool,

    /// The projection part of a SQL query.
    pub projection: Vec<Expr>,

    /// The `FROM` part of a SQL query, one entry per comma-separated root.
    pub from: Vec<TableWithJoins>,

    /// Query filter
    pub filter: Option<Expr>,

    pub group_by: Vec<Expr>,

    pub having: Option<Expr>,

    pub order_by: Vec<OrderByExpr>,

    pub limit: Option<Limit>,

    /// Render `FOR UPDATE` where the dialect supports it.
    pub for_update: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub direction: Option<Direction>,
    pub nulls: Option<NullPrecedence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPrecedence {
    First,
    Last,
}

/// `LIMIT` / `OFFSET`. At least one of the two is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl Select {
    pub fn new(from: impl Into<TableWithJoins>) -> Self {
        Self {
            distinct: false,
            projection: vec![],
            from: vec![from.into()],
            filter: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            for_update: false,
        }
    }

    /// ANDs `filter` with any existing filter.
    pub fn add_filter(&mut self, filter: impl Into<Expr>) {
        let filter = filter.into();
        self.filter = match self.filter.take() {
            Some(existing) => Expr::and_from_vec(vec![existing, filter]),
            None => Some(filter),
        };
    }

    /// Iterates all table references in the `FROM` clause, joins included.
    pub fn table_refs(&self) -> impl Iterator<Item = &TableRef> {
        self.from.iter().flat_map(|from| {
            std::iter::once(&from.table).chain(from.joins.iter().map(|join| &join.table))
        })
    }
}

impl From<Select> for Statement {
    fn from(value: Select) -> Self {
        Self::Select(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::db::TableId;
    use crate::stmt::{Join, JoinKind};

    #[test]
    fn add_filter_conjoins() {
        let mut select = Select::new(TableRef::new(TableId(0), "p1_0"));
        select.add_filter(Expr::Value(true.into()));
        select.add_filter(Expr::Value(false.into()));
        assert!(matches!(select.filter, Some(Expr::And(ref and)) if and.operands.len() == 2));
    }

    #[test]
    fn table_refs_include_joins() {
        let mut from = TableWithJoins::new(TableRef::new(TableId(0), "p1_0"));
        from.joins.push(Join {
            table: TableRef::new(TableId(1), "c1_0"),
            kind: JoinKind::Left,
            on: Expr::Value(true.into()),
        });
        let select = Select::new(from);
        let aliases: Vec<_> = select.table_refs().map(|t| t.alias.as_str()).collect();
        assert_eq!(aliases, ["p1_0", "c1_0"]);
    }
}
