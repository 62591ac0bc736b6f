//! Syntax tree produced by the parser, before any name resolution.

pub(crate) use kiln_core::stmt::ArithmeticOp;
use kiln_core::stmt::{BinaryOp, Direction, NullPrecedence, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Select(Select),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub(crate) distinct: bool,

    /// Empty when the query has no SELECT clause
    pub(crate) selections: Vec<Selection>,

    pub(crate) from: Vec<FromElement>,
    pub(crate) filter: Option<Expr>,
    pub(crate) group_by: Vec<Expr>,
    pub(crate) having: Option<Expr>,
    pub(crate) order_by: Vec<SortSpec>,
    pub(crate) limit: Option<Expr>,
    pub(crate) offset: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Selection {
    pub(crate) expr: Expr,
    pub(crate) alias: Option<String>,
}

/// One comma-separated FROM entry and the joins hanging off it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FromElement {
    pub(crate) root: Root,
    pub(crate) joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Root {
    pub(crate) source: RootSource,
    pub(crate) alias: Option<String>,
    pub(crate) position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RootSource {
    /// `FROM Person`
    Entity(String),

    /// `FROM p.children`, correlating a subquery with its outer query
    Path(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) fetch: bool,
    pub(crate) path: Vec<String>,
    pub(crate) alias: Option<String>,
    pub(crate) on: Option<Expr>,
    pub(crate) position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SortSpec {
    pub(crate) expr: Expr,
    pub(crate) direction: Option<Direction>,
    pub(crate) nulls: Option<NullPrecedence>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Update {
    pub(crate) entity: String,
    pub(crate) alias: Option<String>,
    pub(crate) assignments: Vec<Assignment>,
    pub(crate) filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assignment {
    pub(crate) path: Vec<String>,
    pub(crate) value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Delete {
    pub(crate) entity: String,
    pub(crate) alias: Option<String>,
    pub(crate) filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Path(Path),
    Literal(Value),
    NamedParam(String),
    PositionalParam(u32),
    Arithmetic(Box<Expr>, ArithmeticOp, Box<Expr>),
    Negate(Box<Expr>),
    Func(Func),
    CountStar,
    Subquery(Box<Select>),

    Compare(Box<Expr>, BinaryOp, Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negate: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negate: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        query: Box<Select>,
        negate: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negate: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negate: bool,
    },
    Exists {
        query: Box<Select>,
        negate: bool,
    },
}

/// A dotted identifier path and where it starts in the query text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Path {
    pub(crate) segments: Vec<String>,
    pub(crate) position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Func {
    pub(crate) name: String,
    pub(crate) args: Vec<Expr>,
    pub(crate) distinct: bool,
    pub(crate) position: usize,
}

