use super::*;
use crate::engine::{parse, Cx};

use kiln_core::{
    schema::app::{Field, FieldTy},
    Error, Result,
};

use indexmap::IndexMap;
use std::collections::HashMap;

/// Binds a parsed statement to the mapping model.
pub(crate) fn resolve(cx: Cx<'_>, query: &str, ast: parse::Statement) -> Result<SqmStatement> {
    let mut resolver = Resolver {
        cx,
        query,
        froms: vec![],
        params: vec![],
        scopes: vec![],
        implicit_joins: HashMap::new(),
        bulk_root: None,
    };

    let kind = match ast {
        parse::Statement::Select(select) => SqmKind::Select(resolver.select(select, false)?),
        parse::Statement::Update(update) => SqmKind::Update(resolver.update(update)?),
        parse::Statement::Delete(delete) => SqmKind::Delete(resolver.delete(delete)?),
    };

    Ok(SqmStatement {
        query: query.to_string(),
        kind,
        froms: resolver.froms,
        params: resolver.params,
    })
}

struct Resolver<'a, 'q> {
    cx: Cx<'a>,
    query: &'q str,
    froms: Vec<SqmFrom>,
    params: Vec<SqmParam>,

    /// One scope per (sub)query being resolved, innermost last
    scopes: Vec<Scope>,

    /// Joins created by navigating to-one paths, reused on every later
    /// navigation of the same association.
    implicit_joins: HashMap<(FromId, FieldId), FromId>,

    /// Root of the update or delete being resolved
    bulk_root: Option<FromId>,
}

#[derive(Default)]
struct Scope {
    aliases: IndexMap<String, FromId>,
    roots: Vec<FromId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathCtx {
    /// A selected path; a trailing to-one selects the associated entity.
    Select,

    /// Any other position; a trailing to-one is its foreign key.
    Value,
}

/// What is known about an expression's type.
#[derive(Debug, Clone)]
struct Inferred {
    ty: Type,

    /// Column mappings, for expressions backed by columns
    mappings: Option<Vec<JdbcMapping>>,
}

impl Inferred {
    fn unknown() -> Inferred {
        Inferred {
            ty: Type::Unknown,
            mappings: None,
        }
    }

    fn of(ty: Type) -> Inferred {
        Inferred { ty, mappings: None }
    }

    fn width(&self) -> Option<usize> {
        match &self.mappings {
            Some(mappings) => Some(mappings.len()),
            None if self.ty.is_unknown() => None,
            None => Some(self.ty.width()),
        }
    }

    fn is_scalar(&self) -> bool {
        !matches!(
            self.ty,
            Type::Record(_) | Type::List(_) | Type::Null | Type::Unknown
        )
    }
}

impl<'a> Resolver<'a, '_> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::semantic(Some(self.query), message)
    }

    fn schema(&self) -> &'a Schema {
        self.cx.schema
    }

    fn select(&mut self, select: parse::Select, subquery: bool) -> Result<SqmSelect> {
        self.scopes.push(Scope::default());
        let ret = self.select_in_scope(select, subquery);
        self.scopes.pop();
        ret
    }

    fn select_in_scope(&mut self, select: parse::Select, subquery: bool) -> Result<SqmSelect> {
        let mut roots = vec![];

        for element in select.from {
            let root = self.root(element.root, subquery)?;
            roots.push(root);

            for join in element.joins {
                self.join(join)?;
            }
        }

        let mut selections = vec![];
        if select.selections.is_empty() {
            for &root in &roots {
                selections.push(SqmSelection {
                    expr: SqmExpr::Entity(root),
                    alias: None,
                });
            }
        } else {
            for selection in select.selections {
                let expr = match selection.expr {
                    parse::Expr::Path(path) => self.path(&path, PathCtx::Select)?,
                    expr => self.expr(expr)?,
                };
                selections.push(SqmSelection {
                    expr,
                    alias: selection.alias,
                });
            }
        }

        let filter = select.filter.map(|expr| self.expr(expr)).transpose()?;

        let group_by = select
            .group_by
            .into_iter()
            .map(|expr| self.expr(expr))
            .collect::<Result<Vec<_>>>()?;

        let having = select.having.map(|expr| self.expr(expr)).transpose()?;

        let mut order_by = vec![];
        for spec in select.order_by {
            let expr = match self.selection_alias(&spec.expr, &selections) {
                Some(expr) => expr,
                None => self.expr(spec.expr)?,
            };
            order_by.push(SqmSortSpec {
                expr,
                direction: spec.direction,
                nulls: spec.nulls,
            });
        }

        let limit = select
            .limit
            .map(|expr| self.row_count(expr, "LIMIT"))
            .transpose()?;
        let offset = select
            .offset
            .map(|expr| self.row_count(expr, "OFFSET"))
            .transpose()?;

        Ok(SqmSelect {
            distinct: select.distinct,
            selections,
            roots,
            filter,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    /// `ORDER BY n` where `n` aliases a selection.
    fn selection_alias(&self, expr: &parse::Expr, selections: &[SqmSelection]) -> Option<SqmExpr> {
        let parse::Expr::Path(path) = expr else {
            return None;
        };
        let [name] = &path.segments[..] else {
            return None;
        };
        if self.lookup_alias(name).is_some() {
            return None;
        }
        selections
            .iter()
            .find(|selection| selection.alias.as_deref() == Some(name))
            .map(|selection| selection.expr.clone())
    }

    fn row_count(&mut self, expr: parse::Expr, clause: &str) -> Result<SqmExpr> {
        let expr = self.expr(expr)?;
        match &expr {
            SqmExpr::Param(_) => self.infer(&expr, &Inferred::of(Type::I32)),
            SqmExpr::Literal(Value::I32(n)) if *n >= 0 => {}
            SqmExpr::Literal(Value::I64(n)) if *n >= 0 => {}
            _ => {
                return Err(self.error(format!(
                    "{clause} expects a non-negative integer literal or a parameter"
                )))
            }
        }
        Ok(expr)
    }

    fn update(&mut self, update: parse::Update) -> Result<SqmUpdate> {
        self.scopes.push(Scope::default());

        let root = self.entity_root(&update.entity, update.alias)?;
        self.bulk_root = Some(root);

        let mut assignments = vec![];
        for assignment in update.assignments {
            let (from, rest) = self.path_start(&assignment.path)?;
            let target = self.navigate(from, rest, PathCtx::Value)?;

            let assignable = match &target {
                SqmExpr::Attribute(path) => path.from == root,
                SqmExpr::ForeignKey { from, .. } => *from == root,
                _ => false,
            };
            if !assignable {
                return Err(self.error(format!(
                    "`{}` is not an assignable attribute of `{}`",
                    assignment.path.join("."),
                    update.entity
                )));
            }

            let mut value = self.expr(assignment.value)?;
            let target_info = self.info(&target);
            self.infer(&value, &target_info);
            self.coerce(&mut value, &target_info)?;

            assignments.push(SqmAssignment { target, value });
        }

        let filter = update.filter.map(|expr| self.expr(expr)).transpose()?;

        self.scopes.pop();

        Ok(SqmUpdate {
            root,
            assignments,
            filter,
        })
    }

    fn delete(&mut self, delete: parse::Delete) -> Result<SqmDelete> {
        self.scopes.push(Scope::default());

        let root = self.entity_root(&delete.entity, delete.alias)?;
        self.bulk_root = Some(root);

        let filter = delete.filter.map(|expr| self.expr(expr)).transpose()?;

        self.scopes.pop();

        Ok(SqmDelete { root, filter })
    }

    fn root(&mut self, root: parse::Root, subquery: bool) -> Result<FromId> {
        match root.source {
            parse::RootSource::Entity(name) => self.entity_root(&name, root.alias),
            parse::RootSource::Path(segments) => {
                if !subquery {
                    return Err(self.error(format!(
                        "`{}` is not an entity; paths are only allowed as subquery roots",
                        segments.join(".")
                    )));
                }

                let Some(lhs) = self.lookup_alias(&segments[0]) else {
                    return Err(self.error(format!(
                        "could not resolve alias `{}` of correlated root",
                        segments[0]
                    )));
                };

                let (lhs, field) = self.association_path(lhs, &segments[1..], &segments)?;
                let target = field.target().expect("associations have a target");

                let id = self.push_from(target, SqmFromKind::Correlated { lhs, field: field.id });
                self.register(id, root.alias)?;
                self.scope().roots.push(id);
                Ok(id)
            }
        }
    }

    fn entity_root(&mut self, name: &str, alias: Option<String>) -> Result<FromId> {
        let model = match self.schema().model_by_name(name) {
            Some(model) if model.is_entity() => model,
            _ => return Err(self.error(format!("could not resolve root entity `{name}`"))),
        };

        let id = self.push_from(model.id, SqmFromKind::Root);
        self.register(id, alias)?;
        self.scope().roots.push(id);
        Ok(id)
    }

    fn join(&mut self, join: parse::Join) -> Result<FromId> {
        if join.fetch && join.on.is_some() {
            return Err(self.error(format!(
                "a fetched association may not carry a join condition: `{}`",
                join.path.join(".")
            )));
        }

        let (lhs, rest) = self.path_start(&join.path)?;
        let (lhs, field) = self.association_path(lhs, rest, &join.path)?;
        let target = field.target().expect("associations have a target");

        let kind = match join.kind {
            parse::JoinKind::Inner => JoinKind::Inner,
            parse::JoinKind::Left => JoinKind::Left,
        };

        let id = self.push_from(
            target,
            SqmFromKind::Join(SqmJoin {
                lhs,
                field: field.id,
                kind,
                fetch: join.fetch,
                implicit: false,
                on: None,
            }),
        );
        self.register(id, join.alias)?;
        self.froms[lhs.0].joins.push(id);

        // The alias is visible in its own condition
        if let Some(on) = join.on {
            let on = self.expr(on)?;
            if let SqmFromKind::Join(join) = &mut self.froms[id.0].kind {
                join.on = Some(on);
            }
        }

        Ok(id)
    }

    /// Walks `segments` from `lhs` through to-one associations and returns
    /// the final association.
    fn association_path(
        &mut self,
        mut lhs: FromId,
        segments: &[String],
        full: &[String],
    ) -> Result<(FromId, &'a Field)> {
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(self.error(format!(
                "`{}` does not name an association",
                full.join(".")
            )));
        };

        for segment in intermediate {
            let field = self.field_of(lhs, segment)?;
            if field.ty.as_to_one().is_none() {
                return Err(self.error(format!(
                    "`{}` does not name an association",
                    full.join(".")
                )));
            }
            lhs = self.implicit_join(lhs, field)?;
        }

        let field = self.field_of(lhs, last)?;
        if !field.is_association() {
            return Err(self.error(format!(
                "`{}` does not name an association",
                full.join(".")
            )));
        }

        Ok((lhs, field))
    }

    fn field_of(&self, from: FromId, name: &str) -> Result<&'a Field> {
        let model = self.schema().model(self.froms[from.0].model);
        model.field_by_name(name).ok_or_else(|| {
            self.error(format!(
                "could not resolve attribute `{name}` of `{}`",
                model.name
            ))
        })
    }

    fn implicit_join(&mut self, lhs: FromId, field: &Field) -> Result<FromId> {
        if let Some(id) = self.implicit_joins.get(&(lhs, field.id)) {
            return Ok(*id);
        }

        if self.bulk_root == Some(lhs) {
            return Err(self.error(format!(
                "implicit join through `{}` is not allowed in a bulk statement",
                field.name
            )));
        }

        let target = field.target().expect("associations have a target");
        let id = self.push_from(
            target,
            SqmFromKind::Join(SqmJoin {
                lhs,
                field: field.id,
                kind: JoinKind::Inner,
                fetch: false,
                implicit: true,
                on: None,
            }),
        );
        self.froms[lhs.0].joins.push(id);
        self.implicit_joins.insert((lhs, field.id), id);
        Ok(id)
    }

    fn push_from(&mut self, model: ModelId, kind: SqmFromKind) -> FromId {
        let id = FromId(self.froms.len());
        self.froms.push(SqmFrom {
            id,
            model,
            alias: None,
            kind,
            joins: vec![],
        });
        id
    }

    fn register(&mut self, id: FromId, alias: Option<String>) -> Result<()> {
        let Some(alias) = alias else {
            return Ok(());
        };

        if self.lookup_alias(&alias).is_some() {
            return Err(self.error(format!("duplicate alias `{alias}`")));
        }

        self.froms[id.0].alias = Some(alias.clone());
        self.scope().aliases.insert(alias, id);
        Ok(())
    }

    fn scope(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("resolving inside a scope")
    }

    fn lookup_alias(&self, alias: &str) -> Option<FromId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.aliases.get(alias).copied())
    }

    /// Finds the from element a path starts at: an alias, or else the sole
    /// root of the innermost query.
    fn path_start<'s>(&self, segments: &'s [String]) -> Result<(FromId, &'s [String])> {
        if let Some(from) = self.lookup_alias(&segments[0]) {
            return Ok((from, &segments[1..]));
        }

        let roots = self.scopes.last().map(|scope| &scope.roots[..]).unwrap_or_default();
        match roots {
            [root] => Ok((*root, segments)),
            [] => Err(self.error(format!("could not resolve path `{}`", segments.join(".")))),
            _ => Err(self.error(format!(
                "ambiguous path `{}`: qualify it with an alias",
                segments.join(".")
            ))),
        }
    }

    fn path(&mut self, path: &parse::Path, ctx: PathCtx) -> Result<SqmExpr> {
        let (from, rest) = self.path_start(&path.segments)?;
        self.navigate(from, rest, ctx)
    }

    fn navigate(&mut self, mut from: FromId, segments: &[String], ctx: PathCtx) -> Result<SqmExpr> {
        let schema = self.schema();
        let mut i = 0;

        loop {
            let Some(segment) = segments.get(i) else {
                return Ok(SqmExpr::Entity(from));
            };

            let field = self.field_of(from, segment)?;
            let last = i + 1 == segments.len();

            match &field.ty {
                FieldTy::Basic(_) | FieldTy::Embedded(_) => {
                    return self.attribute(from, field, &segments[i + 1..]);
                }
                FieldTy::ToOne(to_one) => {
                    if last {
                        return Ok(match ctx {
                            PathCtx::Select => SqmExpr::Entity(self.implicit_join(from, field)?),
                            PathCtx::Value => SqmExpr::ForeignKey {
                                from,
                                field: field.id,
                            },
                        });
                    }

                    // `assoc.id` reads the foreign key without joining
                    if i + 2 == segments.len() {
                        let target = schema.model(to_one.target);
                        if target
                            .id_field()
                            .is_some_and(|id| id.name == segments[i + 1])
                        {
                            return Ok(SqmExpr::ForeignKey {
                                from,
                                field: field.id,
                            });
                        }
                    }

                    from = self.implicit_join(from, field)?;
                    i += 1;
                }
                FieldTy::Collection(_) => {
                    let owner = schema.model(field.id.model);
                    return Err(self.error(format!(
                        "cannot dereference collection `{}.{}` in an expression; join it instead",
                        owner.name, field.name
                    )));
                }
            }
        }
    }

    /// A basic or embedded attribute, possibly continuing into the
    /// embeddable's attributes.
    fn attribute(&self, from: FromId, field: &'a Field, rest: &[String]) -> Result<SqmExpr> {
        let schema = self.schema();
        let mut fields = vec![field.id];
        let mut current = field;

        for segment in rest {
            let FieldTy::Embedded(embedded) = &current.ty else {
                return Err(self.error(format!(
                    "cannot dereference basic attribute `{}`",
                    current.name
                )));
            };

            let target = schema.model(embedded.target);
            let Some(next) = target.field_by_name(segment) else {
                return Err(self.error(format!(
                    "could not resolve attribute `{segment}` of `{}`",
                    target.name
                )));
            };

            fields.push(next.id);
            current = next;
        }

        Ok(SqmExpr::Attribute(SqmPath { from, fields }))
    }

    fn param(&mut self, name: ParamName) -> Result<SqmExpr> {
        if let Some(id) = self.params.iter().position(|param| param.name == name) {
            return Ok(SqmExpr::Param(ParamId(id)));
        }

        let mixed = self.params.first().is_some_and(|first| {
            matches!(first.name, ParamName::Named(_)) != matches!(name, ParamName::Named(_))
        });
        if mixed {
            return Err(self.error("cannot mix named and positional parameters"));
        }

        let id = ParamId(self.params.len());
        self.params.push(SqmParam {
            name,
            ty: Type::Unknown,
            mappings: None,
            list: false,
        });
        Ok(SqmExpr::Param(id))
    }

    fn expr(&mut self, expr: parse::Expr) -> Result<SqmExpr> {
        Ok(match expr {
            parse::Expr::Path(path) => self.path(&path, PathCtx::Value)?,
            parse::Expr::Literal(value) => SqmExpr::Literal(value),
            parse::Expr::NamedParam(name) => self.param(ParamName::Named(name))?,
            parse::Expr::PositionalParam(position) => {
                self.param(ParamName::Positional(position))?
            }
            parse::Expr::Arithmetic(lhs, op, rhs) => {
                let mut lhs = self.expr(*lhs)?;
                let mut rhs = self.expr(*rhs)?;
                if op == ArithmeticOp::Concat {
                    let string = Inferred::of(Type::String);
                    self.infer(&lhs, &string);
                    self.infer(&rhs, &string);
                } else {
                    self.unify(&mut lhs, &mut rhs)?;
                }
                SqmExpr::Arithmetic(Box::new(lhs), op, Box::new(rhs))
            }
            parse::Expr::Negate(expr) => SqmExpr::Negate(Box::new(self.expr(*expr)?)),
            parse::Expr::Func(func) => self.func(func)?,
            parse::Expr::CountStar => SqmExpr::CountStar,
            parse::Expr::Subquery(select) => {
                let select = self.subquery(*select)?;
                SqmExpr::Subquery(Box::new(select))
            }
            parse::Expr::Compare(lhs, op, rhs) => {
                let mut lhs = self.expr(*lhs)?;
                let mut rhs = self.expr(*rhs)?;
                self.unify(&mut lhs, &mut rhs)?;
                SqmExpr::Compare(Box::new(lhs), op, Box::new(rhs))
            }
            parse::Expr::And(operands) => SqmExpr::And(
                operands
                    .into_iter()
                    .map(|operand| self.expr(operand))
                    .collect::<Result<_>>()?,
            ),
            parse::Expr::Or(operands) => SqmExpr::Or(
                operands
                    .into_iter()
                    .map(|operand| self.expr(operand))
                    .collect::<Result<_>>()?,
            ),
            parse::Expr::Not(expr) => SqmExpr::Not(Box::new(self.expr(*expr)?)),
            parse::Expr::IsNull { expr, negate } => SqmExpr::IsNull {
                expr: Box::new(self.expr(*expr)?),
                negate,
            },
            parse::Expr::InList { expr, list, negate } => {
                let mut expr = self.expr(*expr)?;
                let single = list.len() == 1;

                let mut items = vec![];
                for item in list {
                    let mut item = self.expr(item)?;
                    self.unify(&mut expr, &mut item)?;
                    if single {
                        if let SqmExpr::Param(id) = item {
                            self.params[id.0].list = true;
                        }
                    }
                    items.push(item);
                }

                SqmExpr::InList {
                    expr: Box::new(expr),
                    list: items,
                    negate,
                }
            }
            parse::Expr::InSubquery { expr, query, negate } => {
                let expr = self.expr(*expr)?;
                let query = self.subquery(*query)?;
                let selected = self.info(&query.selections[0].expr);
                self.infer(&expr, &selected);
                SqmExpr::InSubquery {
                    expr: Box::new(expr),
                    query: Box::new(query),
                    negate,
                }
            }
            parse::Expr::Like {
                expr,
                pattern,
                escape,
                negate,
            } => {
                let mut expr = self.expr(*expr)?;
                let mut pattern = self.expr(*pattern)?;
                self.unify(&mut expr, &mut pattern)?;

                let string = Inferred::of(Type::String);
                self.infer(&expr, &string);
                self.infer(&pattern, &string);

                let escape = match escape {
                    Some(escape) => {
                        let escape = self.expr(*escape)?;
                        self.infer(&escape, &string);
                        Some(Box::new(escape))
                    }
                    None => None,
                };

                SqmExpr::Like {
                    expr: Box::new(expr),
                    pattern: Box::new(pattern),
                    escape,
                    negate,
                }
            }
            parse::Expr::Between {
                expr,
                low,
                high,
                negate,
            } => {
                let mut expr = self.expr(*expr)?;
                let mut low = self.expr(*low)?;
                let mut high = self.expr(*high)?;
                self.unify(&mut expr, &mut low)?;
                self.unify(&mut expr, &mut high)?;
                SqmExpr::Between {
                    expr: Box::new(expr),
                    low: Box::new(low),
                    high: Box::new(high),
                    negate,
                }
            }
            parse::Expr::Exists { query, negate } => SqmExpr::Exists {
                query: Box::new(self.subquery(*query)?),
                negate,
            },
        })
    }

    fn subquery(&mut self, select: parse::Select) -> Result<SqmSelect> {
        let select = self.select(select, true)?;
        if select.selections.len() != 1 {
            return Err(self.error("a subquery must select exactly one value"));
        }
        Ok(select)
    }

    fn func(&mut self, func: parse::Func) -> Result<SqmExpr> {
        let args = func
            .args
            .into_iter()
            .map(|arg| self.expr(arg))
            .collect::<Result<Vec<_>>>()?;

        let arg_types: Vec<Type> = args.iter().map(|arg| self.info(arg).ty).collect();

        let ty = self
            .cx
            .functions
            .resolve(&func.name, &arg_types, func.distinct)
            .map_err(|err| self.error(err.to_string()))?;

        Ok(SqmExpr::Func(SqmFunc {
            name: func.name,
            args,
            distinct: func.distinct,
            ty,
        }))
    }

    /// Type information about an already resolved expression.
    fn info(&self, expr: &SqmExpr) -> Inferred {
        let schema = self.schema();

        let columns = |columns: Vec<ColumnId>| {
            let mappings: Vec<JdbcMapping> = columns
                .iter()
                .map(|column| schema.column(*column).jdbc_mapping())
                .collect();
            let ty = match &mappings[..] {
                [mapping] => mapping.ty.clone(),
                _ => Type::Record(mappings.iter().map(|mapping| mapping.ty.clone()).collect()),
            };
            Inferred {
                ty,
                mappings: Some(mappings),
            }
        };

        match expr {
            SqmExpr::Attribute(path) => columns(attribute_columns(schema, &path.fields)),
            SqmExpr::Entity(from) => columns(schema.id_columns(self.froms[from.0].model)),
            SqmExpr::ForeignKey { field, .. } => columns(schema.field_columns(*field)),
            SqmExpr::Literal(value) => Inferred::of(value.infer_ty()),
            SqmExpr::Param(id) => {
                let param = &self.params[id.0];
                Inferred {
                    ty: param.ty.clone(),
                    mappings: param.mappings.clone(),
                }
            }
            SqmExpr::Arithmetic(_, ArithmeticOp::Concat, _) => Inferred::of(Type::String),
            SqmExpr::Arithmetic(lhs, _, rhs) => {
                Inferred::of(self.info(lhs).ty.unify(&self.info(rhs).ty))
            }
            SqmExpr::Negate(expr) => Inferred::of(self.info(expr).ty),
            SqmExpr::Func(func) => Inferred::of(func.ty.clone()),
            SqmExpr::CountStar => Inferred::of(Type::I64),
            SqmExpr::Subquery(select) => match select.selections.first() {
                Some(selection) => self.info(&selection.expr),
                None => Inferred::unknown(),
            },
            SqmExpr::And(_)
            | SqmExpr::Or(_)
            | SqmExpr::Not(_)
            | SqmExpr::Compare(..)
            | SqmExpr::IsNull { .. }
            | SqmExpr::InList { .. }
            | SqmExpr::InSubquery { .. }
            | SqmExpr::Like { .. }
            | SqmExpr::Between { .. }
            | SqmExpr::Exists { .. } => Inferred::of(Type::Bool),
        }
    }

    /// Makes two operands agree: parameters learn their type from the other
    /// side and literals are cast to it.
    fn unify(&mut self, lhs: &mut SqmExpr, rhs: &mut SqmExpr) -> Result<()> {
        let l = self.info(lhs);
        let r = self.info(rhs);

        if let (Some(lw), Some(rw)) = (l.width(), r.width()) {
            if lw != rw {
                return Err(self.error(format!(
                    "cannot compare expressions of different arity ({lw} and {rw})"
                )));
            }
        }

        self.infer(lhs, &r);
        self.infer(rhs, &l);
        self.coerce(lhs, &r)?;
        self.coerce(rhs, &l)?;
        Ok(())
    }

    /// Refines a parameter's type with a context it appears in.
    fn infer(&mut self, expr: &SqmExpr, ctx: &Inferred) {
        let SqmExpr::Param(id) = expr else {
            return;
        };

        let param = &mut self.params[id.0];
        let ty = param.ty.unify(&ctx.ty);
        if ty == ctx.ty && ctx.mappings.is_some() {
            param.mappings = ctx.mappings.clone();
        }
        param.ty = ty;
    }

    fn coerce(&self, expr: &mut SqmExpr, ctx: &Inferred) -> Result<()> {
        let SqmExpr::Literal(value) = expr else {
            return Ok(());
        };

        if value.is_null() || !ctx.is_scalar() || value.infer_ty() == ctx.ty {
            return Ok(());
        }

        match ctx.ty.cast(value.clone()) {
            Ok(cast) => {
                *value = cast;
                Ok(())
            }
            Err(_) => Err(self.error(format!(
                "literal `{value}` is not compatible with {:?}",
                ctx.ty
            ))),
        }
    }
}
