//! The semantic query tree: a parsed query bound to the mapping model.
//!
//! Every path is resolved to a from element and a chain of attributes, and
//! every parameter carries the type inferred from the contexts it appears
//! in. The tree is built once per query text and reused by every
//! execution of that text within a session.

mod resolve;
pub(crate) use resolve::resolve;

use kiln_core::{
    schema::{
        app::{FieldId, ModelId},
        db::ColumnId,
        mapping,
    },
    stmt::{ArithmeticOp, BinaryOp, Direction, JoinKind, NullPrecedence, Type, Value},
    types::JdbcMapping,
    Schema,
};

use std::fmt;

#[derive(Debug)]
pub(crate) struct SqmStatement {
    /// The query text, carried into errors
    pub(crate) query: String,

    pub(crate) kind: SqmKind,

    /// Arena of every from element in the statement, subqueries included.
    /// Indexed by [`FromId`].
    pub(crate) froms: Vec<SqmFrom>,

    /// Indexed by [`ParamId`]
    pub(crate) params: Vec<SqmParam>,
}

#[derive(Debug)]
pub(crate) enum SqmKind {
    Select(SqmSelect),
    Update(SqmUpdate),
    Delete(SqmDelete),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqmSelect {
    pub(crate) distinct: bool,
    pub(crate) selections: Vec<SqmSelection>,
    pub(crate) roots: Vec<FromId>,
    pub(crate) filter: Option<SqmExpr>,
    pub(crate) group_by: Vec<SqmExpr>,
    pub(crate) having: Option<SqmExpr>,
    pub(crate) order_by: Vec<SqmSortSpec>,
    pub(crate) limit: Option<SqmExpr>,
    pub(crate) offset: Option<SqmExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqmSelection {
    pub(crate) expr: SqmExpr,
    pub(crate) alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqmSortSpec {
    pub(crate) expr: SqmExpr,
    pub(crate) direction: Option<Direction>,
    pub(crate) nulls: Option<NullPrecedence>,
}

#[derive(Debug)]
pub(crate) struct SqmUpdate {
    pub(crate) root: FromId,
    pub(crate) assignments: Vec<SqmAssignment>,
    pub(crate) filter: Option<SqmExpr>,
}

#[derive(Debug)]
pub(crate) struct SqmAssignment {
    /// An attribute or foreign key of the root
    pub(crate) target: SqmExpr,
    pub(crate) value: SqmExpr,
}

#[derive(Debug)]
pub(crate) struct SqmDelete {
    pub(crate) root: FromId,
    pub(crate) filter: Option<SqmExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct FromId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct SqmFrom {
    pub(crate) id: FromId,

    /// The entity this from element ranges over
    pub(crate) model: ModelId,

    pub(crate) alias: Option<String>,

    pub(crate) kind: SqmFromKind,

    /// Joins hanging off this element, in declaration order
    pub(crate) joins: Vec<FromId>,
}

#[derive(Debug, Clone)]
pub(crate) enum SqmFromKind {
    Root,

    /// An attribute join, explicit or created by navigating a to-one path.
    Join(SqmJoin),

    /// A subquery root navigating an association of an outer from element.
    Correlated { lhs: FromId, field: FieldId },
}

#[derive(Debug, Clone)]
pub(crate) struct SqmJoin {
    pub(crate) lhs: FromId,
    pub(crate) field: FieldId,
    pub(crate) kind: JoinKind,
    pub(crate) fetch: bool,
    pub(crate) implicit: bool,
    pub(crate) on: Option<SqmExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ParamId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct SqmParam {
    pub(crate) name: ParamName,

    /// Unified type of every context the parameter appears in
    pub(crate) ty: Type,

    /// Column mappings of the peer expression whose type won unification.
    /// A parameter compared with a multi-column path binds one value per
    /// column.
    pub(crate) mappings: Option<Vec<JdbcMapping>>,

    /// The parameter is the sole element of an IN list and may be bound to
    /// a list of values.
    pub(crate) list: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ParamName {
    Named(String),
    Positional(u32),
}

/// A path ending in a basic or embedded attribute. `fields[0]` belongs to
/// the from element's entity; each following field belongs to the
/// embeddable of the one before.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqmPath {
    pub(crate) from: FromId,
    pub(crate) fields: Vec<FieldId>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqmExpr {
    Attribute(SqmPath),

    /// A from element used as a value: its identifier columns
    Entity(FromId),

    /// A to-one association used as a value: its foreign key columns
    ForeignKey {
        from: FromId,
        field: FieldId,
    },

    Literal(Value),
    Param(ParamId),
    Arithmetic(Box<SqmExpr>, ArithmeticOp, Box<SqmExpr>),
    Negate(Box<SqmExpr>),
    Func(SqmFunc),
    CountStar,
    Subquery(Box<SqmSelect>),
    And(Vec<SqmExpr>),
    Or(Vec<SqmExpr>),
    Not(Box<SqmExpr>),
    Compare(Box<SqmExpr>, BinaryOp, Box<SqmExpr>),
    IsNull {
        expr: Box<SqmExpr>,
        negate: bool,
    },
    InList {
        expr: Box<SqmExpr>,
        list: Vec<SqmExpr>,
        negate: bool,
    },
    InSubquery {
        expr: Box<SqmExpr>,
        query: Box<SqmSelect>,
        negate: bool,
    },
    Like {
        expr: Box<SqmExpr>,
        pattern: Box<SqmExpr>,
        escape: Option<Box<SqmExpr>>,
        negate: bool,
    },
    Between {
        expr: Box<SqmExpr>,
        low: Box<SqmExpr>,
        high: Box<SqmExpr>,
        negate: bool,
    },
    Exists {
        query: Box<SqmSelect>,
        negate: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqmFunc {
    pub(crate) name: String,
    pub(crate) args: Vec<SqmExpr>,
    pub(crate) distinct: bool,
    pub(crate) ty: Type,
}

impl SqmStatement {
    pub(crate) fn from(&self, id: FromId) -> &SqmFrom {
        &self.froms[id.0]
    }

    pub(crate) fn param(&self, id: ParamId) -> &SqmParam {
        &self.params[id.0]
    }

    pub(crate) fn param_by_name(&self, name: &ParamName) -> Option<ParamId> {
        self.params
            .iter()
            .position(|param| param.name == *name)
            .map(ParamId)
    }

    pub(crate) fn as_select(&self) -> Option<&SqmSelect> {
        match &self.kind {
            SqmKind::Select(select) => Some(select),
            _ => None,
        }
    }
}

impl SqmFrom {
    pub(crate) fn as_join(&self) -> Option<&SqmJoin> {
        match &self.kind {
            SqmFromKind::Join(join) => Some(join),
            _ => None,
        }
    }
}

/// The mapping of a path's final attribute.
pub(crate) fn attribute_mapping<'a>(schema: &'a Schema, fields: &[FieldId]) -> &'a mapping::Field {
    let mut field = schema.mapping_for(fields[0].model).field(fields[0]);
    for id in &fields[1..] {
        field = &field.as_embedded().expect("path continues through an embeddable")[id.index];
    }
    field
}

/// Columns of a path's final attribute, in the owner's table.
pub(crate) fn attribute_columns(schema: &Schema, fields: &[FieldId]) -> Vec<ColumnId> {
    attribute_mapping(schema, fields).columns()
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamName::Named(name) => write!(f, ":{name}"),
            ParamName::Positional(position) => write!(f, "?{position}"),
        }
    }
}
