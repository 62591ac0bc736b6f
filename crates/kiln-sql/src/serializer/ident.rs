use super::{Formatter, Params, ToSql};

/// Identifier, quoted only when it would not parse bare.
pub(super) struct Ident<S>(pub(super) S);

const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "constraint",
    "create", "default", "delete", "desc", "distinct", "drop", "else", "end", "exists", "from",
    "group", "having", "in", "index", "insert", "into", "is", "join", "key", "left", "like",
    "limit", "not", "null", "offset", "on", "or", "order", "primary", "references", "select",
    "set", "table", "then", "to", "union", "unique", "update", "user", "using", "values",
    "when", "where",
];

impl<S: AsRef<str>> Ident<S> {
    fn needs_quotes(&self) -> bool {
        let name = self.0.as_ref();
        let mut chars = name.chars();

        let valid = match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => chars
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
            _ => false,
        };

        !valid || RESERVED.contains(&name)
    }
}

impl<S: AsRef<str>> ToSql for Ident<S> {
    fn to_sql<T: Params>(self, f: &mut Formatter<'_, T>) {
        if !self.needs_quotes() {
            f.dst.push_str(self.0.as_ref());
            return;
        }

        let quote = f.serializer.dialect().quote_char();
        f.dst.push(quote);
        for c in self.0.as_ref().chars() {
            if c == quote {
                f.dst.push(quote);
            }
            f.dst.push(c);
        }
        f.dst.push(quote);
    }
}
