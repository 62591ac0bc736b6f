use super::{Component, Lower, ParamSource};
use crate::engine::sqm::{attribute_columns, FromId, ParamId, SqmExpr, SqmFunc, SqmParam};

use kiln_core::{
    schema::db::ColumnId,
    stmt::{self, ArithmeticOp, BinaryOp, Type, Value},
    types::JdbcMapping,
    Result,
};

/// A lowered value: one column, or one per column of a composite value.
#[derive(Debug)]
pub(super) enum Lowered {
    Single(stmt::Expr),
    Tuple(Vec<stmt::Expr>),
}

impl Lowered {
    fn from_vec(exprs: Vec<stmt::Expr>) -> Lowered {
        match <[stmt::Expr; 1]>::try_from(exprs) {
            Ok([expr]) => Lowered::Single(expr),
            Err(exprs) => Lowered::Tuple(exprs),
        }
    }

    pub(super) fn into_vec(self) -> Vec<stmt::Expr> {
        match self {
            Lowered::Single(expr) => vec![expr],
            Lowered::Tuple(exprs) => exprs,
        }
    }
}

pub(super) fn conjunction(operands: Vec<stmt::Expr>) -> stmt::Expr {
    stmt::Expr::and_from_vec(operands).unwrap_or(stmt::Expr::Value(Value::Bool(true)))
}

pub(super) fn disjunction(operands: Vec<stmt::Expr>) -> stmt::Expr {
    stmt::Expr::or_from_vec(operands).unwrap_or(stmt::Expr::Value(Value::Bool(false)))
}

impl Lower<'_> {
    pub(super) fn single(&mut self, expr: &SqmExpr) -> Result<stmt::Expr> {
        match self.expr(expr)? {
            Lowered::Single(expr) => Ok(expr),
            Lowered::Tuple(_) => Err(self.error("a multi-column value cannot be used here")),
        }
    }

    pub(super) fn expr(&mut self, expr: &SqmExpr) -> Result<Lowered> {
        use Lowered::Single;

        let schema = self.cx.schema;

        Ok(match expr {
            SqmExpr::Attribute(path) => {
                self.columns(path.from, &attribute_columns(schema, &path.fields))
            }
            SqmExpr::Entity(from) => {
                let model = self.sqm().from(*from).model;
                self.columns(*from, &schema.id_columns(model))
            }
            SqmExpr::ForeignKey { from, field } => {
                self.columns(*from, &schema.field_columns(*field))
            }
            SqmExpr::Literal(value) => Single(stmt::Expr::Value(value.clone())),
            SqmExpr::Param(id) => self.param(*id, None),
            SqmExpr::Arithmetic(lhs, op, rhs) => Single(stmt::Expr::Arithmetic(stmt::ExprArithmetic {
                lhs: Box::new(self.single(lhs)?),
                op: *op,
                rhs: Box::new(self.single(rhs)?),
            })),
            SqmExpr::Negate(expr) => Single(stmt::Expr::Negate(Box::new(self.single(expr)?))),
            SqmExpr::Func(func) => Single(self.func(func)?),
            SqmExpr::CountStar => Single(stmt::Expr::CountStar),
            SqmExpr::Subquery(query) => Single(stmt::Expr::Subquery(Box::new(self.subquery(query)?))),
            SqmExpr::And(operands) => {
                let operands = operands
                    .iter()
                    .map(|operand| self.single(operand))
                    .collect::<Result<_>>()?;
                Single(conjunction(operands))
            }
            SqmExpr::Or(operands) => {
                let operands = operands
                    .iter()
                    .map(|operand| self.single(operand))
                    .collect::<Result<_>>()?;
                Single(disjunction(operands))
            }
            SqmExpr::Not(expr) => Single(stmt::Expr::not(self.single(expr)?)),
            SqmExpr::Compare(lhs, op, rhs) => Single(self.compare(lhs, *op, rhs)?),
            SqmExpr::IsNull { expr, negate } => Single(match self.expr(expr)? {
                Lowered::Single(expr) => is_null(expr, *negate),
                // A composite is null when all of its columns are
                Lowered::Tuple(exprs) => {
                    let checks = exprs.into_iter().map(|expr| is_null(expr, *negate)).collect();
                    if *negate {
                        disjunction(checks)
                    } else {
                        conjunction(checks)
                    }
                }
            }),
            SqmExpr::InList { expr, list, negate } => Single(self.in_list(expr, list, *negate)?),
            SqmExpr::InSubquery {
                expr,
                query,
                negate,
            } => {
                let expr = match self.expr(expr)? {
                    Lowered::Single(expr) => expr,
                    Lowered::Tuple(exprs) => stmt::Expr::record(exprs),
                };
                Single(stmt::Expr::InSubquery(stmt::ExprInSubquery {
                    expr: Box::new(expr),
                    query: Box::new(self.subquery(query)?),
                    negate: *negate,
                }))
            }
            SqmExpr::Like {
                expr,
                pattern,
                escape,
                negate,
            } => Single(stmt::Expr::Like(stmt::ExprLike {
                expr: Box::new(self.single(expr)?),
                pattern: Box::new(self.single(pattern)?),
                escape: match escape {
                    Some(escape) => Some(Box::new(self.single(escape)?)),
                    None => None,
                },
                negate: *negate,
            })),
            SqmExpr::Between {
                expr,
                low,
                high,
                negate,
            } => Single(stmt::Expr::Between(stmt::ExprBetween {
                expr: Box::new(self.single(expr)?),
                low: Box::new(self.single(low)?),
                high: Box::new(self.single(high)?),
                negate: *negate,
            })),
            SqmExpr::Exists { query, negate } => Single(stmt::Expr::Exists(stmt::ExprExists {
                query: Box::new(self.subquery(query)?),
                negate: *negate,
            })),
        })
    }

    fn columns(&self, from: FromId, columns: &[ColumnId]) -> Lowered {
        let alias = self.alias_of(from);
        Lowered::from_vec(
            columns
                .iter()
                .map(|column| stmt::Expr::column(alias, *column))
                .collect(),
        )
    }

    /// One JDBC parameter per column the parameter binds.
    fn param(&mut self, id: ParamId, element: Option<usize>) -> Lowered {
        let mappings = self.param_mappings(self.sqm().param(id));

        if mappings.len() == 1 {
            let source = ParamSource::Query {
                param: id,
                element,
                component: None,
            };
            return Lowered::Single(self.push_param(source, mappings[0].clone()));
        }

        let width = mappings.len();
        Lowered::Tuple(
            mappings
                .into_iter()
                .enumerate()
                .map(|(index, mapping)| {
                    let source = ParamSource::Query {
                        param: id,
                        element,
                        component: Some(Component { index, width }),
                    };
                    self.push_param(source, mapping)
                })
                .collect(),
        )
    }

    fn param_mappings(&self, param: &SqmParam) -> Vec<JdbcMapping> {
        if let Some(mappings) = &param.mappings {
            return mappings.clone();
        }

        match &param.ty {
            Type::Record(tys) => tys.iter().map(|ty| self.cx.types.resolve(ty, None)).collect(),
            ty => vec![self.cx.types.resolve(ty, None)],
        }
    }

    fn compare(&mut self, lhs: &SqmExpr, op: BinaryOp, rhs: &SqmExpr) -> Result<stmt::Expr> {
        let lhs = self.expr(lhs)?;
        let rhs = self.expr(rhs)?;

        if let (Lowered::Single(lhs), Lowered::Single(rhs)) = (&lhs, &rhs) {
            return Ok(stmt::Expr::binary_op(lhs.clone(), op, rhs.clone()));
        }

        let (lhs, rhs) = (lhs.into_vec(), rhs.into_vec());
        if lhs.len() != rhs.len() {
            return Err(self.error(format!(
                "cannot compare a value of {} columns with a value of {} columns",
                lhs.len(),
                rhs.len()
            )));
        }

        let pairs = lhs
            .into_iter()
            .zip(rhs)
            .map(|(lhs, rhs)| stmt::Expr::binary_op(lhs, op, rhs))
            .collect();

        match op {
            BinaryOp::Eq => Ok(conjunction(pairs)),
            BinaryOp::Ne => Ok(disjunction(pairs)),
            _ => Err(self.error("multi-column values can only be compared for equality")),
        }
    }

    fn in_list(&mut self, expr: &SqmExpr, list: &[SqmExpr], negate: bool) -> Result<stmt::Expr> {
        let lhs = self.expr(expr)?;

        let mut items = vec![];
        for item in list {
            match item {
                SqmExpr::Param(id) if self.sqm().param(*id).list => {
                    match self.shape.list_sizes.get(id.0).copied().flatten() {
                        Some(len) => {
                            for element in 0..len {
                                items.push(self.param(*id, Some(element)));
                            }
                        }
                        None => items.push(self.param(*id, None)),
                    }
                }
                item => items.push(self.expr(item)?),
            }
        }

        match lhs {
            Lowered::Single(lhs) => {
                let list = items
                    .into_iter()
                    .map(|item| match item {
                        Lowered::Single(item) => Ok(item),
                        Lowered::Tuple(_) => Err(self.error("IN list element has too many columns")),
                    })
                    .collect::<Result<_>>()?;

                Ok(stmt::Expr::InList(stmt::ExprInList {
                    expr: Box::new(lhs),
                    list,
                    negate,
                }))
            }
            // Row value IN lists are not portable; expand to an OR of ANDs
            Lowered::Tuple(lhs) => {
                if items.is_empty() {
                    return Ok(stmt::Expr::InList(stmt::ExprInList {
                        expr: Box::new(stmt::Expr::record(lhs)),
                        list: vec![],
                        negate,
                    }));
                }

                let mut alternatives = vec![];
                for item in items {
                    let item = item.into_vec();
                    if item.len() != lhs.len() {
                        return Err(self.error(format!(
                            "IN list element has {} columns, expected {}",
                            item.len(),
                            lhs.len()
                        )));
                    }
                    alternatives.push(conjunction(
                        lhs.iter().cloned().zip(item).map(|(l, r)| stmt::Expr::eq(l, r)).collect(),
                    ));
                }

                let any = disjunction(alternatives);
                Ok(if negate { stmt::Expr::not(any) } else { any })
            }
        }
    }

    fn func(&mut self, func: &SqmFunc) -> Result<stmt::Expr> {
        let mut args = Vec::with_capacity(func.args.len());

        for arg in &func.args {
            match self.expr(arg)? {
                Lowered::Single(arg) => args.push(arg),
                // count(e) counts the first identifier column
                Lowered::Tuple(exprs) if func.name.eq_ignore_ascii_case("count") => {
                    args.extend(exprs.into_iter().next());
                }
                Lowered::Tuple(_) => {
                    return Err(self.error(format!(
                        "function `{}` does not accept multi-column arguments",
                        func.name
                    )))
                }
            }
        }

        Ok(stmt::Expr::Func(stmt::ExprFunc {
            name: func.name.to_ascii_lowercase(),
            args,
            distinct: func.distinct,
        }))
    }

    pub(super) fn subquery(&mut self, query: &crate::engine::sqm::SqmSelect) -> Result<stmt::Select> {
        for &root in &query.roots {
            self.assign_aliases(root);
        }

        let mut from = vec![];
        let mut filters = vec![];
        for &root in &query.roots {
            let (table, correlation) = self.from_clause(root)?;
            from.push(table);
            filters.extend(correlation);
        }

        let mut projection = vec![];
        for selection in &query.selections {
            projection.extend(self.expr(&selection.expr)?.into_vec());
        }

        if let Some(filter) = &query.filter {
            filters.push(self.single(filter)?);
        }

        let mut group_by = vec![];
        for expr in &query.group_by {
            group_by.extend(self.expr(expr)?.into_vec());
        }

        let having = query.having.as_ref().map(|having| self.single(having)).transpose()?;
        let order_by = self.order_by(&query.order_by)?;

        let limit = match (&query.limit, &query.offset) {
            (None, None) => None,
            (limit, offset) => Some(stmt::Limit {
                limit: limit.as_ref().map(|limit| self.single(limit)).transpose()?,
                offset: offset.as_ref().map(|offset| self.single(offset)).transpose()?,
            }),
        };

        Ok(stmt::Select {
            distinct: query.distinct,
            projection,
            from,
            filter: stmt::Expr::and_from_vec(filters),
            group_by,
            having,
            order_by,
            limit,
            for_update: false,
        })
    }

    /// The mapping a selected scalar expression is read back with.
    pub(super) fn mapping_of(&self, expr: &SqmExpr) -> JdbcMapping {
        let schema = self.cx.schema;
        let types = self.cx.types;

        let first_column = |columns: Vec<ColumnId>| match columns.first() {
            Some(column) => schema.column(*column).jdbc_mapping(),
            None => types.resolve(&Type::Unknown, None),
        };

        match expr {
            SqmExpr::Attribute(path) => first_column(attribute_columns(schema, &path.fields)),
            SqmExpr::Entity(from) => first_column(schema.id_columns(self.sqm().from(*from).model)),
            SqmExpr::ForeignKey { field, .. } => first_column(schema.field_columns(*field)),
            SqmExpr::Literal(value) => types.resolve_value(value),
            SqmExpr::Param(id) => self
                .param_mappings(self.sqm().param(*id))
                .into_iter()
                .next()
                .unwrap_or_else(|| types.resolve(&Type::Unknown, None)),
            SqmExpr::Func(func) => {
                // min(born) keeps the precision of the column
                if let Some(arg) = func.args.first() {
                    let mapping = self.mapping_of(arg);
                    if mapping.ty == func.ty {
                        return mapping;
                    }
                }
                types.resolve(&func.ty, None)
            }
            SqmExpr::CountStar => types.resolve(&Type::I64, None),
            SqmExpr::Arithmetic(_, ArithmeticOp::Concat, _) => types.resolve(&Type::String, None),
            SqmExpr::Arithmetic(lhs, _, rhs) => {
                let ty = self.mapping_of(lhs).ty.unify(&self.mapping_of(rhs).ty);
                types.resolve(&ty, None)
            }
            SqmExpr::Negate(expr) => self.mapping_of(expr),
            SqmExpr::Subquery(query) => match query.selections.first() {
                Some(selection) => self.mapping_of(&selection.expr),
                None => types.resolve(&Type::Unknown, None),
            },
            _ => types.resolve(&Type::Bool, None),
        }
    }
}

fn is_null(expr: stmt::Expr, negate: bool) -> stmt::Expr {
    stmt::Expr::IsNull(stmt::ExprIsNull {
        expr: Box::new(expr),
        negate,
    })
}
