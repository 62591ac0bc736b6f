//! Lowering: semantic trees become SQL syntax trees.
//!
//! Lowering assigns table aliases, joins fetched associations, expands
//! parameters into JDBC parameters and records, for every selected item,
//! which projected columns read it back. The result is rendered once for
//! the dialect and cached as a plan.

mod alias;
use alias::AliasGenerator;

mod expr;
use expr::conjunction;

mod fetch;

mod load;
pub(crate) use load::{collection_loader, entity_loader};

mod mutation;
pub(crate) use mutation::{JdbcMutation, MutationKind};

mod result;
pub(crate) use result::{
    AttrResult, BasicResult, CollectionResult, CompositeAttr, CompositeResult, DomainResult,
    EntityResult, ToOneResult,
};

use super::{
    sqm::{
        attribute_columns, FromId, ParamId, SqmAssignment, SqmExpr, SqmFromKind, SqmKind,
        SqmSelect, SqmSortSpec, SqmStatement,
    },
    Cx,
};

use kiln_core::{
    schema::{
        app::{FieldId, FieldTy},
        db::{ColumnId, TableId},
        mapping,
    },
    stmt::{self, Type, Value},
    types::JdbcMapping,
    Error, Result,
};
use kiln_sql::{ParameterBinder, Serializer};

use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// The parts of a plan that depend on how a query is executed rather than
/// on its text. Plans are cached per query text and shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct Shape {
    /// Number of values bound to each list parameter, indexed by
    /// [`ParamId`]. `None` when the parameter is bound to a single value.
    pub(crate) list_sizes: Vec<Option<usize>>,

    /// A first result was set on the query
    pub(crate) first_result: bool,

    /// A max results was set on the query
    pub(crate) max_results: bool,
}

/// A rendered select and how to read its rows back.
#[derive(Debug)]
pub(crate) struct JdbcSelect {
    pub(crate) sql: String,

    /// What each placeholder is bound to, in placeholder order
    pub(crate) binders: Vec<ParameterBinder>,

    /// Indexed by `JdbcParameterId`
    pub(crate) parameters: Vec<JdbcParameter>,

    /// One per selected item
    pub(crate) results: Vec<DomainResult>,

    /// Selection aliases, handed to result transformers
    pub(crate) aliases: Vec<Option<String>>,

    /// Tables read, for query cache invalidation and auto-flush
    pub(crate) tables: IndexSet<TableId>,

    /// Number of entity results, selected and joined
    pub(crate) slots: usize,

    /// A collection is join fetched, so rows repeat their owner
    pub(crate) collection_fetch: bool,

    pub(crate) pagination: Pagination,

    /// Set on loaders, which bind keys rather than query parameters
    pub(crate) keys: Option<KeyBatch>,
}

/// A rendered bulk update or delete.
#[derive(Debug)]
pub(crate) struct JdbcBulk {
    pub(crate) sql: String,
    pub(crate) binders: Vec<ParameterBinder>,
    pub(crate) parameters: Vec<JdbcParameter>,

    /// Tables read or written
    pub(crate) tables: IndexSet<TableId>,

    /// The mutated table
    pub(crate) table: TableId,
}

#[derive(Debug, Clone)]
pub(crate) struct JdbcParameter {
    pub(crate) source: ParamSource,
    pub(crate) mapping: JdbcMapping,
}

/// Where the value of a JDBC parameter comes from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParamSource {
    /// A query parameter. `element` picks from a bound list, `component`
    /// picks a column of a multi-column value.
    Query {
        param: ParamId,
        element: Option<usize>,
        component: Option<Component>,
    },

    /// The nth argument of a loader or mutation
    Arg(usize),

    Limit,
    Offset,
}

/// Column `index` of a value spanning `width` columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Component {
    pub(crate) index: usize,
    pub(crate) width: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Pagination {
    pub(crate) limit: Option<RowCount>,
    pub(crate) offset: Option<RowCount>,

    /// Rows are paginated after assembly instead of in SQL
    pub(crate) in_memory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RowCount {
    Literal(i64),
    Param(ParamId),

    /// Set through the query's first result or max results
    QueryOption,
}

/// How a loader binds the keys it is executed with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct KeyBatch {
    /// Keys per execution
    pub(crate) size: usize,

    /// Columns per key
    pub(crate) width: usize,

    /// Keys are bound as one array
    pub(crate) array: bool,

    /// Unused slots are bound to null rather than repeating the last key
    pub(crate) pad_with_null: bool,
}

impl KeyBatch {
    /// Loader arguments for `keys`, which must not exceed the batch size.
    pub(crate) fn args(&self, keys: &[Value]) -> Vec<Value> {
        debug_assert!(!keys.is_empty() && keys.len() <= self.size);

        if self.array {
            return vec![Value::List(keys.to_vec())];
        }

        let mut args = Vec::with_capacity(self.size * self.width);
        for i in 0..self.size {
            match keys.get(i) {
                Some(key) => key.flatten_into(&mut args),
                None if self.pad_with_null => {
                    args.extend(std::iter::repeat(Value::Null).take(self.width))
                }
                None => {
                    if let Some(last) = keys.last() {
                        last.flatten_into(&mut args);
                    }
                }
            }
        }
        args
    }
}

/// Lowers a select statement.
pub(crate) fn select(cx: Cx<'_>, sqm: &SqmStatement, shape: &Shape) -> Result<JdbcSelect> {
    let Some(query) = sqm.as_select() else {
        return Err(Error::semantic(
            Some(&sqm.query),
            "expected a select statement",
        ));
    };

    let mut lower = Lower::new(cx, Some(sqm), shape.clone());
    lower.select(query)
}

/// Lowers a bulk update or delete statement.
pub(crate) fn bulk(cx: Cx<'_>, sqm: &SqmStatement, shape: &Shape) -> Result<JdbcBulk> {
    let schema = cx.schema;
    let mut lower = Lower::new(cx, Some(sqm), shape.clone());

    let (root, stmt) = match &sqm.kind {
        SqmKind::Update(update) => {
            let table = lower.bulk_root(update.root);
            let assignments = lower.assignments(&update.assignments)?;
            let filter = update
                .filter
                .as_ref()
                .map(|filter| lower.single(filter))
                .transpose()?;
            let stmt = stmt::Update {
                table,
                assignments,
                filter,
            };
            (update.root, stmt::Statement::from(stmt))
        }
        SqmKind::Delete(delete) => {
            let table = lower.bulk_root(delete.root);
            let filter = delete
                .filter
                .as_ref()
                .map(|filter| lower.single(filter))
                .transpose()?;
            (delete.root, stmt::Delete { table, filter }.into())
        }
        SqmKind::Select(_) => {
            return Err(Error::semantic(
                Some(&sqm.query),
                "expected an update or delete statement",
            ))
        }
    };

    let tables = stmt.tables();
    let (sql, binders) = lower.render(&stmt);

    Ok(JdbcBulk {
        sql,
        binders,
        parameters: lower.parameters,
        tables,
        table: schema.table_id_for(sqm.from(root).model),
    })
}

struct Lower<'a> {
    cx: Cx<'a>,

    /// `None` when lowering a loader or mutation
    sqm: Option<&'a SqmStatement>,

    shape: Shape,

    aliases: AliasGenerator,

    /// Table alias of each lowered from element
    groups: HashMap<FromId, String>,

    parameters: Vec<JdbcParameter>,

    projection: Vec<stmt::Expr>,

    slots: usize,

    /// Roles of join fetched bags
    bags: Vec<String>,

    collection_fetch: bool,

    /// Fetch joins whose owner is part of an entity result
    consumed: HashSet<FromId>,
}

impl<'a> Lower<'a> {
    fn new(cx: Cx<'a>, sqm: Option<&'a SqmStatement>, shape: Shape) -> Lower<'a> {
        Lower {
            cx,
            sqm,
            shape,
            aliases: AliasGenerator::default(),
            groups: HashMap::new(),
            parameters: vec![],
            projection: vec![],
            slots: 0,
            bags: vec![],
            collection_fetch: false,
            consumed: HashSet::new(),
        }
    }

    fn sqm(&self) -> &'a SqmStatement {
        self.sqm.expect("lowering a query")
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::semantic(self.sqm.map(|sqm| sqm.query.as_str()), message)
    }

    fn select(&mut self, query: &SqmSelect) -> Result<JdbcSelect> {
        for &root in &query.roots {
            self.assign_aliases(root);
        }

        let mut from = Vec::with_capacity(query.roots.len());
        for &root in &query.roots {
            let (table, _) = self.from_clause(root)?;
            from.push(table);
        }

        let mut results = Vec::with_capacity(query.selections.len());
        let mut aliases = Vec::with_capacity(query.selections.len());
        for selection in &query.selections {
            results.push(self.selection(&selection.expr)?);
            aliases.push(selection.alias.clone());
        }

        self.check_fetches(query)?;

        let mut select = stmt::Select {
            distinct: query.distinct,
            projection: vec![],
            from,
            filter: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            for_update: false,
        };

        if let Some(filter) = &query.filter {
            select.filter = Some(self.single(filter)?);
        }

        for expr in &query.group_by {
            select.group_by.extend(self.expr(expr)?.into_vec());
        }

        if let Some(having) = &query.having {
            select.having = Some(self.single(having)?);
        }

        select.order_by = self.order_by(&query.order_by)?;

        let pagination = self.pagination(query, &mut select)?;

        Ok(self.finish(select, results, aliases, pagination, None))
    }

    /// Fetch joins only make sense when their owner is returned, and at most
    /// one bag may be fetched since the rows of two would multiply.
    fn check_fetches(&mut self, query: &SqmSelect) -> Result<()> {
        let sqm = self.sqm();
        let mut pending: Vec<FromId> = query.roots.clone();

        while let Some(id) = pending.pop() {
            let from = sqm.from(id);
            if let SqmFromKind::Join(join) = &from.kind {
                if join.fetch && !self.consumed.contains(&id) {
                    let field = self.cx.schema.field(join.field);
                    return Err(self.error(format!(
                        "query specified join fetching, but the owner of the fetched \
                         association `{}` was not present in the select list",
                        field.name
                    )));
                }
            }
            pending.extend(&from.joins);
        }

        if self.bags.len() > 1 {
            return Err(Error::multiple_bag_fetch(std::mem::take(&mut self.bags)));
        }

        Ok(())
    }

    fn selection(&mut self, expr: &SqmExpr) -> Result<DomainResult> {
        let schema = self.cx.schema;

        match expr {
            SqmExpr::Entity(from) => {
                let tree = self.query_fetch_tree(*from);
                Ok(DomainResult::Entity(self.entity_result(&tree)?))
            }
            SqmExpr::Attribute(path) => {
                let alias = self.alias_of(path.from).to_string();
                let field = schema.field(*path.fields.last().expect("paths are never empty"));
                let mut columns = attribute_columns(schema, &path.fields).into_iter();

                match &field.ty {
                    FieldTy::Embedded(embedded) => Ok(DomainResult::Composite(
                        self.composite_result(
                            &alias,
                            embedded.target,
                            embedded.create_empty_composites,
                            &mut columns,
                        ),
                    )),
                    _ => match columns.next() {
                        Some(column) => Ok(DomainResult::Basic(self.basic_result(&alias, column))),
                        None => Err(self.error(format!("`{}` cannot be selected", field.name))),
                    },
                }
            }
            SqmExpr::ForeignKey { from, field } => {
                let alias = self.alias_of(*from).to_string();
                Ok(DomainResult::Key(
                    self.key_result(&alias, &schema.field_columns(*field)),
                ))
            }
            expr => {
                let lowered = self.single(expr)?;
                let mapping = self.mapping_of(expr);
                let position = self.project(lowered);
                Ok(DomainResult::Basic(BasicResult { position, mapping }))
            }
        }
    }

    fn order_by(&mut self, specs: &[SqmSortSpec]) -> Result<Vec<stmt::OrderByExpr>> {
        let mut order_by = vec![];
        for spec in specs {
            for expr in self.expr(&spec.expr)?.into_vec() {
                order_by.push(stmt::OrderByExpr {
                    expr,
                    direction: spec.direction,
                    nulls: spec.nulls,
                });
            }
        }
        Ok(order_by)
    }

    /// First result and max results set on the query take precedence over
    /// `LIMIT` and `OFFSET` in its text.
    fn pagination(&mut self, query: &SqmSelect, select: &mut stmt::Select) -> Result<Pagination> {
        let limit = if self.shape.max_results {
            Some(RowCount::QueryOption)
        } else {
            query.limit.as_ref().map(|expr| self.row_count(expr)).transpose()?
        };

        let offset = if self.shape.first_result {
            Some(RowCount::QueryOption)
        } else {
            query.offset.as_ref().map(|expr| self.row_count(expr)).transpose()?
        };

        if limit.is_none() && offset.is_none() {
            return Ok(Pagination::default());
        }

        if self.collection_fetch {
            tracing::warn!(
                query = %self.sqm().query,
                "first result/max results specified with collection fetch; applying in memory"
            );
            return Ok(Pagination {
                limit,
                offset,
                in_memory: true,
            });
        }

        let mapping = self.cx.types.resolve(&Type::I64, None);
        let limit_expr = limit.map(|_| self.push_param(ParamSource::Limit, mapping.clone()));
        let offset_expr = offset.map(|_| self.push_param(ParamSource::Offset, mapping));
        select.limit = Some(stmt::Limit {
            limit: limit_expr,
            offset: offset_expr,
        });

        Ok(Pagination {
            limit,
            offset,
            in_memory: false,
        })
    }

    fn row_count(&self, expr: &SqmExpr) -> Result<RowCount> {
        match expr {
            SqmExpr::Literal(value) => Ok(RowCount::Literal(value.to_i64()?)),
            SqmExpr::Param(id) => Ok(RowCount::Param(*id)),
            _ => Err(self.error("row counts must be literals or parameters")),
        }
    }

    fn assignments(
        &mut self,
        assignments: &[SqmAssignment],
    ) -> Result<Vec<stmt::Assignment>> {
        let schema = self.cx.schema;
        let mut lowered = vec![];

        for assignment in assignments {
            let columns = match &assignment.target {
                SqmExpr::Attribute(path) => attribute_columns(schema, &path.fields),
                SqmExpr::ForeignKey { field, .. } => schema.field_columns(*field),
                _ => return Err(self.error("only attributes of the updated entity can be assigned")),
            };

            let values = match &assignment.value {
                // Bind one value per target column using the column's own type
                SqmExpr::Param(id) => {
                    let width = columns.len();
                    columns
                        .iter()
                        .enumerate()
                        .map(|(index, column)| {
                            let source = ParamSource::Query {
                                param: *id,
                                element: None,
                                component: (width > 1).then_some(Component { index, width }),
                            };
                            self.push_param(source, schema.column(*column).jdbc_mapping())
                        })
                        .collect()
                }
                SqmExpr::Literal(Value::Null) => columns.iter().map(|_| stmt::Expr::null()).collect(),
                value => self.expr(value)?.into_vec(),
            };

            if values.len() != columns.len() {
                tracing::warn!(
                    query = %self.sqm().query,
                    columns = columns.len(),
                    values = values.len(),
                    "assigned value does not match the columns of its target"
                );
            }

            for (column, value) in columns.into_iter().zip(values) {
                lowered.push(stmt::Assignment { column, value });
            }
        }

        Ok(lowered)
    }

    /// Bulk statements address their table by name.
    fn bulk_root(&mut self, root: FromId) -> TableId {
        let table = self.cx.schema.table_id_for(self.sqm().from(root).model);
        let name = self.cx.schema.table(table).name.clone();
        self.groups.insert(root, name);
        table
    }

    fn assign_aliases(&mut self, from: FromId) {
        let sqm = self.sqm();
        let name = &self.cx.schema.model(sqm.from(from).model).name;
        let alias = self.aliases.next(name);
        self.groups.insert(from, alias);

        for &join in &sqm.from(from).joins {
            self.assign_aliases(join);
        }
    }

    fn alias_of(&self, from: FromId) -> &str {
        self.groups
            .get(&from)
            .map(String::as_str)
            .expect("from element lowered before use")
    }

    /// The table of a root and its joins. Correlated roots also return the
    /// condition tying them to the outer query.
    fn from_clause(&mut self, root: FromId) -> Result<(stmt::TableWithJoins, Option<stmt::Expr>)> {
        let sqm = self.sqm();
        let from = sqm.from(root);
        let alias = self.alias_of(root).to_string();
        let table = self.cx.schema.table_id_for(from.model);

        let mut table = stmt::TableWithJoins::new(stmt::TableRef::new(table, alias.clone()));

        let correlation = match &from.kind {
            SqmFromKind::Correlated { lhs, field } => {
                let lhs_alias = self.alias_of(*lhs).to_string();
                Some(self.association_condition(&lhs_alias, *field, &alias)?)
            }
            _ => None,
        };

        self.joins(root, &mut table.joins)?;
        Ok((table, correlation))
    }

    fn joins(&mut self, from: FromId, out: &mut Vec<stmt::Join>) -> Result<()> {
        let sqm = self.sqm();

        for &id in &sqm.from(from).joins {
            let joined = sqm.from(id);
            let SqmFromKind::Join(join) = &joined.kind else {
                continue;
            };

            let lhs_alias = self.alias_of(join.lhs).to_string();
            let alias = self.alias_of(id).to_string();

            let mut on = self.association_condition(&lhs_alias, join.field, &alias)?;
            if let Some(extra) = &join.on {
                on = conjunction(vec![on, self.single(extra)?]);
            }

            out.push(stmt::Join {
                table: stmt::TableRef::new(self.cx.schema.table_id_for(joined.model), alias),
                kind: join.kind,
                on,
            });

            self.joins(id, out)?;
        }

        Ok(())
    }

    /// Equates the foreign key of an association with the identifier it
    /// references.
    fn association_condition(
        &self,
        lhs: &str,
        field: FieldId,
        rhs: &str,
    ) -> Result<stmt::Expr> {
        let schema = self.cx.schema;
        let pairs: Vec<(ColumnId, ColumnId)> = match schema.mapping_for(field.model).field(field) {
            mapping::Field::ToOne(foreign_key) => {
                let target = schema.field(field).target().expect("to-one fields have a target");
                foreign_key.iter().copied().zip(schema.id_columns(target)).collect()
            }
            mapping::Field::Collection { key_columns, .. } => schema
                .id_columns(field.model)
                .into_iter()
                .zip(key_columns.iter().copied())
                .collect(),
            _ => {
                return Err(Error::mapping(format!(
                    "`{}` is not an association",
                    schema.field(field).name
                )))
            }
        };

        Ok(conjunction(
            pairs
                .into_iter()
                .map(|(l, r)| stmt::Expr::eq(stmt::Expr::column(lhs, l), stmt::Expr::column(rhs, r)))
                .collect(),
        ))
    }

    fn push_param(&mut self, source: ParamSource, mapping: JdbcMapping) -> stmt::Expr {
        let id = stmt::JdbcParameterId(self.parameters.len());
        self.parameters.push(JdbcParameter { source, mapping });
        stmt::Expr::param(id)
    }

    /// Adds an expression to the projection, reusing an equal one.
    fn project(&mut self, expr: stmt::Expr) -> usize {
        match self.projection.iter().position(|projected| *projected == expr) {
            Some(position) => position,
            None => {
                self.projection.push(expr);
                self.projection.len() - 1
            }
        }
    }

    fn render(&self, stmt: &stmt::Statement) -> (String, Vec<ParameterBinder>) {
        let mut binders = vec![];
        let sql = Serializer::new(&self.cx.schema.db, self.cx.capability).serialize(stmt, &mut binders);
        (sql, binders)
    }

    fn finish(
        &mut self,
        mut select: stmt::Select,
        results: Vec<DomainResult>,
        aliases: Vec<Option<String>>,
        pagination: Pagination,
        keys: Option<KeyBatch>,
    ) -> JdbcSelect {
        select.projection = std::mem::take(&mut self.projection);

        let stmt = stmt::Statement::Select(select);
        let tables = stmt.tables();
        let (sql, binders) = self.render(&stmt);

        JdbcSelect {
            sql,
            binders,
            parameters: std::mem::take(&mut self.parameters),
            results,
            aliases,
            tables,
            slots: self.slots,
            collection_fetch: self.collection_fetch,
            pagination,
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{compile, fixture::Env};

    use pretty_assertions::assert_eq;
    use std_util::assert_err;

    fn lower(env: &Env, query: &str) -> Result<JdbcSelect> {
        lower_with(env, query, &Shape::default())
    }

    fn lower_with(env: &Env, query: &str, shape: &Shape) -> Result<JdbcSelect> {
        let sqm = compile(env.cx(), query)?;
        select(env.cx(), &sqm, shape)
    }

    #[test]
    fn eager_to_ones_are_delayed_unless_fetched() {
        let env = Env::new();
        let plan = lower(&env, "select p from Person p where p.age > 21").unwrap();

        assert_eq!(
            plan.sql,
            "SELECT p1_0.id, p1_0.name, p1_0.age, p1_0.born, p1_0.street, p1_0.city, \
             p1_0.employer_id, p1_0.parent_id FROM person p1_0 WHERE p1_0.age > ?1"
        );
        assert_eq!(plan.slots, 1);

        let DomainResult::Entity(person) = &plan.results[0] else {
            panic!("expected an entity result")
        };
        assert!(matches!(
            &person.attrs[5],
            AttrResult::ToOne(ToOneResult::Delayed { eager: true, .. })
        ));
        assert!(matches!(
            &person.attrs[6],
            AttrResult::ToOne(ToOneResult::Delayed { eager: false, .. })
        ));
    }

    #[test]
    fn fetch_joins_extend_the_projection() {
        let env = Env::new();
        let plan = lower(&env, "from Employer e join fetch e.staff s where e.name = :name").unwrap();

        assert_eq!(
            plan.sql,
            "SELECT e1_0.id, e1_0.name, p1_0.id, p1_0.name, p1_0.age, p1_0.born, p1_0.street, \
             p1_0.city, p1_0.employer_id, p1_0.parent_id FROM employer e1_0 JOIN person p1_0 \
             ON e1_0.id = p1_0.employer_id WHERE e1_0.name = ?1"
        );
        assert!(plan.collection_fetch);
        assert_eq!(plan.slots, 2);
    }

    #[test]
    fn fetching_two_bags_fails() {
        let env = Env::new();
        let err = assert_err!(lower(
            &env,
            "select e from Employer e join fetch e.staff s join fetch s.children c"
        ));
        assert!(err.is_multiple_bag_fetch());
        assert_eq!(
            err.bag_roles().unwrap(),
            ["Employer.staff".to_string(), "Person.children".to_string()]
        );
    }

    #[test]
    fn fetch_join_owner_must_be_selected() {
        let env = Env::new();
        let err = assert_err!(lower(&env, "select s.name from Employer e join fetch e.staff s"));
        assert!(err.is_semantic());
    }

    #[test]
    fn composite_keys_expand_per_column() {
        let env = Env::new();
        let plan = lower(&env, "select l from Line l where l.order = :order").unwrap();

        assert!(plan.sql.ends_with("WHERE l1_0.order_region = ?1 AND l1_0.order_number = ?2"));
        assert_eq!(
            plan.parameters.iter().map(|p| p.source.clone()).collect::<Vec<_>>(),
            [0, 1]
                .map(|index| ParamSource::Query {
                    param: ParamId(0),
                    element: None,
                    component: Some(Component { index, width: 2 }),
                })
                .to_vec()
        );
    }

    #[test]
    fn list_parameters_expand_per_element() {
        let env = Env::new();
        let shape = Shape {
            list_sizes: vec![Some(3)],
            ..Shape::default()
        };
        let plan = lower_with(&env, "select p.name from Person p where p.id in (:ids)", &shape).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT p1_0.name FROM person p1_0 WHERE p1_0.id IN (?1, ?2, ?3)"
        );

        let shape = Shape {
            list_sizes: vec![Some(0)],
            ..Shape::default()
        };
        let plan = lower_with(&env, "select p.name from Person p where p.id in (:ids)", &shape).unwrap();
        assert_eq!(plan.sql, "SELECT p1_0.name FROM person p1_0 WHERE 1 = 0");
    }

    #[test]
    fn pagination_binds_row_counts() {
        let env = Env::new();
        let shape = Shape {
            first_result: true,
            max_results: true,
            ..Shape::default()
        };
        let plan = lower_with(&env, "select p.name from Person p order by p.name", &shape).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT p1_0.name FROM person p1_0 ORDER BY p1_0.name LIMIT ?1 OFFSET ?2"
        );
        assert!(!plan.pagination.in_memory);
    }

    #[test]
    fn collection_fetch_paginates_in_memory() {
        let env = Env::new();
        let shape = Shape {
            max_results: true,
            ..Shape::default()
        };
        let plan = lower_with(&env, "from Employer e join fetch e.staff", &shape).unwrap();
        assert!(plan.pagination.in_memory);
        assert!(!plan.sql.contains("LIMIT"));
    }

    #[test]
    fn correlated_subqueries() {
        let env = Env::new();
        let plan = lower(
            &env,
            "select p.name from Person p where exists (select c.id from p.children c where c.age < 10)",
        )
        .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT p1_0.name FROM person p1_0 WHERE EXISTS (SELECT p2_0.id FROM person p2_0 \
             WHERE p1_0.id = p2_0.parent_id AND p2_0.age < ?1)"
        );
    }

    #[test]
    fn implicit_joins_are_inner() {
        let env = Env::new();
        let plan = lower(&env, "select p.name from Person p where p.employer.name = 'Acme'").unwrap();
        assert_eq!(
            plan.sql,
            "SELECT p1_0.name FROM person p1_0 JOIN employer e1_0 ON p1_0.employer_id = e1_0.id \
             WHERE e1_0.name = ?1"
        );
    }

    #[test]
    fn bulk_statements_use_table_names() {
        let env = Env::new();
        let sqm = compile(env.cx(), "update Person p set p.age = p.age + 1 where p.name = :name").unwrap();
        let plan = bulk(env.cx(), &sqm, &Shape::default()).unwrap();
        assert_eq!(
            plan.sql,
            "UPDATE person SET age = person.age + ?1 WHERE person.name = ?2"
        );
        assert_eq!(plan.table, TableId(0));

        let sqm = compile(env.cx(), "delete from Line l where l.qty = 0").unwrap();
        let plan = bulk(env.cx(), &sqm, &Shape::default()).unwrap();
        assert_eq!(plan.sql, "DELETE FROM line WHERE line.qty = ?1");
    }

    #[test]
    fn key_batches_pad_unused_slots() {
        let repeat = KeyBatch {
            size: 3,
            width: 1,
            array: false,
            pad_with_null: false,
        };
        assert_eq!(
            repeat.args(&[Value::I64(1), Value::I64(2)]),
            [Value::I64(1), Value::I64(2), Value::I64(2)]
        );

        let null = KeyBatch {
            pad_with_null: true,
            ..repeat
        };
        assert_eq!(
            null.args(&[Value::I64(1)]),
            [Value::I64(1), Value::Null, Value::Null]
        );
    }
}
