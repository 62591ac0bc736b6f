use super::{Comma, Delimited, Formatter, Ident, ParameterBinder, Params, ToSql};

use kiln_core::stmt;

impl ToSql for &stmt::Expr {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        use stmt::Expr::*;

        match self {
            And(expr) => {
                fmt!(f, Delimited(&expr.operands, " AND "));
            }
            Any(expr) => {
                fmt!(f, expr.expr " = ANY(" expr.array ")");
            }
            Arithmetic(expr) => {
                if expr.op == stmt::ArithmeticOp::Concat && f.serializer.is_mysql() {
                    fmt!(f, "CONCAT(" expr.lhs ", " expr.rhs ")");
                } else {
                    fmt!(f, Operand(&expr.lhs) " " expr.op " " Operand(&expr.rhs));
                }
            }
            Between(expr) => {
                let not = if expr.negate { " NOT" } else { "" };
                fmt!(f, expr.expr not " BETWEEN " expr.low " AND " expr.high);
            }
            BinaryOp(expr) => {
                fmt!(f, Operand(&expr.lhs) " " expr.op " " Operand(&expr.rhs));
            }
            Column(expr) => {
                let name = f.serializer.column_name(expr.column);
                match &expr.table {
                    Some(alias) => fmt!(f, Ident(alias.as_str()) "." name),
                    None => fmt!(f, name),
                }
            }
            CountStar => fmt!(f, "COUNT(*)"),
            Exists(expr) => {
                let not = if expr.negate { "NOT " } else { "" };
                let query = &*expr.query;
                fmt!(f, not "EXISTS (" query ")");
            }
            Func(expr) => super::func::serialize(expr, f),
            InList(expr) => {
                // `IN ()` is not valid SQL
                if expr.list.is_empty() {
                    fmt!(f, if expr.negate { "1 = 1" } else { "1 = 0" });
                    return;
                }

                let not = if expr.negate { " NOT" } else { "" };
                fmt!(f, expr.expr not " IN (" Comma(&expr.list) ")");
            }
            InSubquery(expr) => {
                let not = if expr.negate { " NOT" } else { "" };
                let query = &*expr.query;
                fmt!(f, expr.expr not " IN (" query ")");
            }
            IsNull(expr) => {
                if expr.negate {
                    fmt!(f, expr.expr " IS NOT NULL");
                } else {
                    fmt!(f, expr.expr " IS NULL");
                }
            }
            Like(expr) => {
                let not = if expr.negate { " NOT" } else { "" };
                let escape = expr.escape.as_deref().map(|escape| (" ESCAPE ", escape));
                fmt!(f, expr.expr not " LIKE " expr.pattern escape);
            }
            Negate(expr) => {
                fmt!(f, "-" Operand(expr));
            }
            Not(expr) => {
                let expr = &**expr;
                fmt!(f, "NOT (" expr ")");
            }
            Or(expr) => {
                fmt!(f, "(" Delimited(expr.operands.iter().map(Grouped), " OR ") ")");
            }
            Param(id) => {
                let placeholder = f.params.push(ParameterBinder::Parameter(*id));
                fmt!(f, placeholder);
            }
            Record(expr) => {
                fmt!(f, "(" Comma(&expr.fields) ")");
            }
            Subquery(select) => {
                let select = &**select;
                fmt!(f, "(" select ")");
            }
            Value(stmt::Value::Null) => fmt!(f, "NULL"),
            Value(value) => {
                let placeholder = f.params.push(ParameterBinder::Literal(value.clone()));
                fmt!(f, placeholder);
            }
        }
    }
}

impl ToSql for &Box<stmt::Expr> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        (&**self).to_sql(f);
    }
}

impl ToSql for &stmt::BinaryOp {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        f.dst.push_str(match self {
            stmt::BinaryOp::Eq => "=",
            stmt::BinaryOp::Gt => ">",
            stmt::BinaryOp::Ge => ">=",
            stmt::BinaryOp::Lt => "<",
            stmt::BinaryOp::Le => "<=",
            stmt::BinaryOp::Ne => "<>",
        })
    }
}

impl ToSql for &stmt::ArithmeticOp {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        f.dst.push_str(match self {
            stmt::ArithmeticOp::Add => "+",
            stmt::ArithmeticOp::Sub => "-",
            stmt::ArithmeticOp::Mul => "*",
            stmt::ArithmeticOp::Div => "/",
            stmt::ArithmeticOp::Mod => "%",
            stmt::ArithmeticOp::Concat => "||",
        })
    }
}

/// Operand of an infix operator; compound operands are parenthesized.
struct Operand<'a>(&'a stmt::Expr);

impl ToSql for Operand<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self.0 {
            stmt::Expr::Arithmetic(_) | stmt::Expr::And(_) | stmt::Expr::BinaryOp(_) => {
                fmt!(f, "(" self.0 ")")
            }
            expr => expr.to_sql(f),
        }
    }
}

/// Disjunct; conjunctions are parenthesized.
struct Grouped<'a>(&'a stmt::Expr);

impl ToSql for Grouped<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self.0 {
            stmt::Expr::And(_) => fmt!(f, "(" self.0 ")"),
            expr => expr.to_sql(f),
        }
    }
}
