use super::{JdbcParameterId, Select, Value};
use crate::schema::db::ColumnId;

/// A dialect-neutral SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// AND a set of predicates
    And(ExprAnd),

    /// `expr = ANY(array)`
    Any(ExprAny),

    /// Arithmetic or string concatenation
    Arithmetic(ExprArithmetic),

    /// `expr [NOT] BETWEEN low AND high`
    Between(ExprBetween),

    /// Comparison between two expressions
    BinaryOp(ExprBinaryOp),

    /// References a column of an aliased table reference
    Column(ExprColumn),

    /// `COUNT(*)`
    CountStar,

    /// `[NOT] EXISTS (subquery)`
    Exists(ExprExists),

    /// Function call
    Func(ExprFunc),

    /// In list
    InList(ExprInList),

    /// The expression is contained by the given subquery
    InSubquery(ExprInSubquery),

    /// Whether an expression is (or is not) null. This is different from a
    /// binary expression because of how databases treat null comparisons.
    IsNull(ExprIsNull),

    /// `expr [NOT] LIKE pattern [ESCAPE escape]`
    Like(ExprLike),

    /// Arithmetic negation
    Negate(Box<Expr>),

    /// Logical negation
    Not(Box<Expr>),

    /// OR a set of predicates
    Or(ExprOr),

    /// A JDBC parameter placeholder
    Param(JdbcParameterId),

    /// Row value constructor `(a, b, ...)`
    Record(ExprRecord),

    /// Scalar subquery
    Subquery(Box<Select>),

    /// Inline value; rendered as a bound parameter
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprAnd {
    pub operands: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprOr {
    pub operands: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprAny {
    pub expr: Box<Expr>,
    pub array: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprArithmetic {
    pub lhs: Box<Expr>,
    pub op: ArithmeticOp,
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprBetween {
    pub expr: Box<Expr>,
    pub low: Box<Expr>,
    pub high: Box<Expr>,
    pub negate: bool,
}

/// A binary operation between two expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprBinaryOp {
    /// The left-hand side expression.
    pub lhs: Box<Expr>,

    /// The operator to apply.
    pub op: BinaryOp,

    /// The right-hand side expression.
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A column of an aliased table reference.
///
/// `table` is the alias of the table reference the column belongs to. `None`
/// renders the bare column name, as used by INSERT column lists and UPDATE
/// assignment targets.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprColumn {
    pub table: Option<String>,
    pub column: ColumnId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprExists {
    pub query: Box<Select>,
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprFunc {
    /// Canonical, lower-case function name. The serializer maps it to the
    /// dialect spelling.
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprInList {
    pub expr: Box<Expr>,
    pub list: Vec<Expr>,
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprInSubquery {
    pub expr: Box<Expr>,
    pub query: Box<Select>,
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprIsNull {
    pub expr: Box<Expr>,
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprLike {
    pub expr: Box<Expr>,
    pub pattern: Box<Expr>,
    pub escape: Option<Box<Expr>>,
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprRecord {
    pub fields: Vec<Expr>,
}

impl Expr {
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    pub fn column(table: impl Into<String>, column: ColumnId) -> Self {
        Self::Column(ExprColumn {
            table: Some(table.into()),
            column,
        })
    }

    pub fn bare_column(column: ColumnId) -> Self {
        Self::Column(ExprColumn {
            table: None,
            column,
        })
    }

    pub fn param(id: JdbcParameterId) -> Self {
        Self::Param(id)
    }

    pub fn binary_op(lhs: impl Into<Self>, op: BinaryOp, rhs: impl Into<Self>) -> Self {
        ExprBinaryOp {
            op,
            lhs: Box::new(lhs.into()),
            rhs: Box::new(rhs.into()),
        }
        .into()
    }

    pub fn eq(lhs: impl Into<Self>, rhs: impl Into<Self>) -> Self {
        Expr::binary_op(lhs, BinaryOp::Eq, rhs)
    }

    /// Returns true if the expression is a binary expression with the equality operator
    pub fn is_eq(&self) -> bool {
        matches!(
            self,
            Self::BinaryOp(ExprBinaryOp {
                op: BinaryOp::Eq,
                ..
            })
        )
    }

    /// Combines predicates with AND, flattening nested conjunctions.
    ///
    /// An empty input yields `None`: no restriction at all.
    pub fn and_from_vec(operands: Vec<Expr>) -> Option<Self> {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::And(and) => flat.extend(and.operands),
                operand => flat.push(operand),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::And(ExprAnd { operands: flat })),
        }
    }

    /// Combines predicates with OR, flattening nested disjunctions.
    pub fn or_from_vec(operands: Vec<Expr>) -> Option<Self> {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::Or(or) => flat.extend(or.operands),
                operand => flat.push(operand),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::Or(ExprOr { operands: flat })),
        }
    }

    pub fn is_null(expr: impl Into<Self>) -> Self {
        Self::IsNull(ExprIsNull {
            expr: Box::new(expr.into()),
            negate: false,
        })
    }

    pub fn in_list(expr: impl Into<Self>, list: Vec<Expr>) -> Self {
        Self::InList(ExprInList {
            expr: Box::new(expr.into()),
            list,
            negate: false,
        })
    }

    pub fn any(expr: impl Into<Self>, array: impl Into<Self>) -> Self {
        Self::Any(ExprAny {
            expr: Box::new(expr.into()),
            array: Box::new(array.into()),
        })
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Func(ExprFunc {
            name: name.into(),
            args,
            distinct: false,
        })
    }

    pub fn record(fields: Vec<Expr>) -> Self {
        Self::Record(ExprRecord { fields })
    }

    pub fn not(expr: impl Into<Self>) -> Self {
        Self::Not(Box::new(expr.into()))
    }

    pub fn as_column(&self) -> Option<&ExprColumn> {
        match self {
            Self::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Returns `true` if the expression is a predicate, i.e. evaluates to a boolean.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Self::And(_)
                | Self::Or(_)
                | Self::Not(_)
                | Self::BinaryOp(_)
                | Self::Between(_)
                | Self::Exists(_)
                | Self::InList(_)
                | Self::InSubquery(_)
                | Self::IsNull(_)
                | Self::Like(_)
                | Self::Any(_)
        )
    }
}

impl From<ExprBinaryOp> for Expr {
    fn from(value: ExprBinaryOp) -> Self {
        Self::BinaryOp(value)
    }
}

impl From<ExprColumn> for Expr {
    fn from(value: ExprColumn) -> Self {
        Self::Column(value)
    }
}

impl From<JdbcParameterId> for Expr {
    fn from(value: JdbcParameterId) -> Self {
        Self::Param(value)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Select> for Expr {
    fn from(value: Select) -> Self {
        Self::Subquery(Box::new(value))
    }
}
