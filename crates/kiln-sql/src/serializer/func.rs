use super::{Comma, Delimited, Formatter, Params, ToSql};

use kiln_core::{driver::Dialect, stmt};

/// Renders a function call using the dialect's spelling.
pub(super) fn serialize<P: Params>(func: &stmt::ExprFunc, f: &mut Formatter<'_, P>) {
    let dialect = f.serializer.dialect();
    let args = &func.args;

    match (func.name.as_str(), dialect) {
        ("concat", Dialect::Sqlite | Dialect::Postgresql) => {
            fmt!(f, "(" Delimited(args, " || ") ")");
        }
        ("concat", Dialect::Mysql) => {
            fmt!(f, "CONCAT(" Comma(args) ")");
        }
        ("length", Dialect::Sqlite) => {
            fmt!(f, "LENGTH(" Comma(args) ")");
        }
        ("length", Dialect::Postgresql | Dialect::Mysql) => {
            fmt!(f, "CHAR_LENGTH(" Comma(args) ")");
        }
        ("mod", Dialect::Sqlite) => {
            fmt!(f, "(" Delimited(args, " % ") ")");
        }
        ("current_date", _) => fmt!(f, "CURRENT_DATE"),
        ("current_timestamp", _) => fmt!(f, "CURRENT_TIMESTAMP"),
        (name, _) => {
            let distinct = if func.distinct { "DISTINCT " } else { "" };
            f.dst.push_str(&name.to_ascii_uppercase());
            fmt!(f, "(" distinct Comma(args) ")");
        }
    }
}
