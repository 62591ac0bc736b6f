use super::{Comma, Formatter, Ident, Params, ToSql};

use kiln_core::{driver::Dialect, stmt};

impl ToSql for &stmt::Statement {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            stmt::Statement::Select(stmt) => stmt.to_sql(f),
            stmt::Statement::Insert(stmt) => stmt.to_sql(f),
            stmt::Statement::Update(stmt) => stmt.to_sql(f),
            stmt::Statement::Delete(stmt) => stmt.to_sql(f),
        }
    }
}

impl ToSql for &stmt::Select {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        fmt!(f, "SELECT " distinct Comma(&self.projection) " FROM " Comma(&self.from));

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }

        if !self.group_by.is_empty() {
            fmt!(f, " GROUP BY " Comma(&self.group_by));
        }

        if let Some(having) = &self.having {
            fmt!(f, " HAVING " having);
        }

        if !self.order_by.is_empty() {
            fmt!(f, " ORDER BY " Comma(&self.order_by));
        }

        if let Some(limit) = &self.limit {
            fmt!(f, limit);
        }

        if self.for_update && f.serializer.capability.select_for_update {
            fmt!(f, " FOR UPDATE");
        }
    }
}

impl ToSql for &stmt::TableWithJoins {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, &self.table);

        for join in &self.joins {
            fmt!(f, join);
        }
    }
}

impl ToSql for &stmt::Join {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let kind = match self.kind {
            stmt::JoinKind::Inner => " JOIN ",
            stmt::JoinKind::Left => " LEFT JOIN ",
        };

        let table = &self.table;
        let on = &self.on;
        fmt!(f, kind table " ON " on);
    }
}

impl ToSql for &stmt::TableRef {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let table_name = f.serializer.table_name(self.table);
        fmt!(f, table_name " " Ident(self.alias.as_str()));
    }
}

impl ToSql for &stmt::OrderByExpr {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let expr = &self.expr;

        // Emulate null precedence with a leading sort key
        if let Some(nulls) = self.nulls {
            if !f.serializer.capability.null_precedence {
                let key = match nulls {
                    stmt::NullPrecedence::First => "0 ELSE 1",
                    stmt::NullPrecedence::Last => "1 ELSE 0",
                };
                fmt!(f, "CASE WHEN " expr " IS NULL THEN " key " END, ");
            }
        }

        fmt!(f, expr);

        match self.direction {
            Some(stmt::Direction::Asc) => fmt!(f, " ASC"),
            Some(stmt::Direction::Desc) => fmt!(f, " DESC"),
            None => {}
        }

        if f.serializer.capability.null_precedence {
            match self.nulls {
                Some(stmt::NullPrecedence::First) => fmt!(f, " NULLS FIRST"),
                Some(stmt::NullPrecedence::Last) => fmt!(f, " NULLS LAST"),
                None => {}
            }
        }
    }
}

impl ToSql for &stmt::Limit {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match (&self.limit, &self.offset) {
            (Some(limit), Some(offset)) => fmt!(f, " LIMIT " limit " OFFSET " offset),
            (Some(limit), None) => fmt!(f, " LIMIT " limit),
            (None, Some(offset)) => {
                // Offset without a limit still needs a LIMIT clause
                let unbounded = match f.serializer.dialect() {
                    Dialect::Sqlite => Some("-1"),
                    Dialect::Mysql => Some("18446744073709551615"),
                    Dialect::Postgresql => None,
                };
                match unbounded {
                    Some(unbounded) => fmt!(f, " LIMIT " unbounded " OFFSET " offset),
                    None => fmt!(f, " OFFSET " offset),
                }
            }
            (None, None) => {}
        }
    }
}

impl ToSql for &stmt::Insert {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let table_name = f.serializer.table_name(self.table);

        if self.columns.is_empty() {
            match f.serializer.dialect() {
                Dialect::Mysql => fmt!(f, "INSERT INTO " table_name " () VALUES ()"),
                Dialect::Sqlite | Dialect::Postgresql => {
                    fmt!(f, "INSERT INTO " table_name " DEFAULT VALUES")
                }
            }
            return;
        }

        let serializer = f.serializer;
        let columns = Comma(
            self.columns
                .iter()
                .map(|column_id| serializer.column_name(*column_id)),
        );

        fmt!(f, "INSERT INTO " table_name " (" columns ") VALUES (" Comma(&self.values) ")");
    }
}

impl ToSql for &stmt::Update {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let table_name = f.serializer.table_name(self.table);
        fmt!(f, "UPDATE " table_name " SET " Comma(&self.assignments));

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }
    }
}

impl ToSql for &stmt::Assignment {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let column_name = f.serializer.column_name(self.column);
        let value = &self.value;
        fmt!(f, column_name " = " value);
    }
}

impl ToSql for &stmt::Delete {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let table_name = f.serializer.table_name(self.table);
        fmt!(f, "DELETE FROM " table_name);

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }
    }
}
