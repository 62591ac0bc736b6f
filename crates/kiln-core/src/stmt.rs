//! Values, value types and the dialect-neutral SQL syntax tree.

mod delete;
pub use delete::Delete;

mod expr;
pub use expr::{
    ArithmeticOp, BinaryOp, Expr, ExprAnd, ExprAny, ExprArithmetic, ExprBetween, ExprBinaryOp,
    ExprColumn, ExprExists, ExprFunc, ExprInList, ExprInSubquery, ExprIsNull, ExprLike, ExprOr,
    ExprRecord,
};

mod infer;

mod insert;
pub use insert::Insert;

mod jdbc_parameter;
pub use jdbc_parameter::JdbcParameterId;

mod select;
pub use select::{Direction, Limit, NullPrecedence, OrderByExpr, Select};

mod statement;
pub use statement::Statement;

mod table;
pub use table::{Join, JoinKind, TableRef, TableWithJoins};

mod ty;
pub use ty::Type;

mod update;
pub use update::{Assignment, Update};

mod value;
pub use value::Value;

mod value_record;
pub use value_record::ValueRecord;

pub mod visit;
pub use visit::Visit;
