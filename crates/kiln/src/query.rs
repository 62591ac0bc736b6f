//! Executable queries created by [`Session::create_query`].

use crate::{
    engine::{
        assemble::Assembler,
        exec::{self, Bindings},
        lower::{JdbcSelect, Pagination, RowCount, Shape},
        sqm::{ParamId, ParamName, SqmKind, SqmStatement},
    },
    Object, Session,
};

use kiln_core::{stmt::Value, Error, Result};

use std::{fmt, ops::ControlFlow, rc::Rc, time::Duration};

/// Reshapes each result row. Receives the row's items and the selection
/// aliases, one per item.
pub trait RowTransformer {
    fn transform_tuple(&self, row: Vec<Object>, aliases: &[Option<String>]) -> Result<Object>;
}

impl<F> RowTransformer for F
where
    F: Fn(Vec<Object>, &[Option<String>]) -> Result<Object>,
{
    fn transform_tuple(&self, row: Vec<Object>, aliases: &[Option<String>]) -> Result<Object> {
        self(row, aliases)
    }
}

/// Names a query parameter: `"name"` or `":name"` for named parameters,
/// `"?1"` or `1u32` for positional ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
    Named(String),
    Positional(u32),
}

impl From<&str> for ParamKey {
    fn from(key: &str) -> Self {
        if let Some(position) = key.strip_prefix('?').and_then(|n| n.parse().ok()) {
            return ParamKey::Positional(position);
        }
        ParamKey::Named(key.strip_prefix(':').unwrap_or(key).to_string())
    }
}

impl From<u32> for ParamKey {
    fn from(position: u32) -> Self {
        ParamKey::Positional(position)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Named(name) => write!(f, ":{name}"),
            ParamKey::Positional(position) => write!(f, "?{position}"),
        }
    }
}

pub struct Query<'s> {
    session: &'s mut Session,
    sqm: Rc<SqmStatement>,

    /// Bound values indexed by parameter
    params: Vec<Option<Value>>,

    first_result: Option<usize>,
    max_results: Option<usize>,
    timeout: Option<Duration>,
    cacheable: bool,
    read_only: Option<bool>,
    transformer: Option<Box<dyn RowTransformer>>,
}

impl<'s> Query<'s> {
    pub(crate) fn new(session: &'s mut Session, sqm: Rc<SqmStatement>) -> Query<'s> {
        let timeout = session.shared().config.default_timeout;
        Query {
            params: vec![None; sqm.params.len()],
            session,
            sqm,
            first_result: None,
            max_results: None,
            timeout,
            cacheable: false,
            read_only: None,
            transformer: None,
        }
    }

    /// Binds a parameter. Entities bind their identifier and composites
    /// their columns.
    pub fn set_parameter(
        &mut self,
        key: impl Into<ParamKey>,
        value: impl Into<Object>,
    ) -> Result<&mut Self> {
        let id = self.param_id(key.into())?;
        self.params[id.0] = Some(value.into().to_bind_value());
        Ok(self)
    }

    /// Binds a parameter used as the sole element of an `IN` list to many
    /// values.
    pub fn set_parameter_list<I>(&mut self, key: impl Into<ParamKey>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<Object>,
    {
        let key = key.into();
        let id = self.param_id(key.clone())?;
        if !self.sqm.param(id).list {
            return Err(Error::parameter_binding(format!(
                "parameter `{key}` is not an IN list element and cannot be bound to a list"
            )));
        }

        let values = values
            .into_iter()
            .map(|value| value.into().to_bind_value())
            .collect();
        self.params[id.0] = Some(Value::list_from_vec(values));
        Ok(self)
    }

    pub fn set_first_result(&mut self, first_result: usize) -> &mut Self {
        self.first_result = Some(first_result);
        self
    }

    pub fn set_max_results(&mut self, max_results: usize) -> &mut Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Results are read from and stored in the query cache, when the
    /// session factory has one.
    pub fn set_cacheable(&mut self, cacheable: bool) -> &mut Self {
        self.cacheable = cacheable;
        self
    }

    /// Entities loaded by this query are read-only.
    pub fn set_read_only(&mut self, read_only: bool) -> &mut Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn set_row_transformer(&mut self, transformer: impl RowTransformer + 'static) -> &mut Self {
        self.transformer = Some(Box::new(transformer));
        self
    }

    /// Executes the select and returns every row.
    pub fn list(&mut self) -> Result<Vec<Object>> {
        let mut results = vec![];
        self.read_results(&mut |object| {
            results.push(object);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(results)
    }

    /// Executes the select and returns its only result, if any. Rows
    /// repeating the same result count once.
    pub fn unique_result(&mut self) -> Result<Option<Object>> {
        let mut results = self.list()?;
        match results.len() {
            0 | 1 => Ok(results.pop()),
            count => {
                if results.iter().all(|result| *result == results[0]) {
                    Ok(results.pop())
                } else {
                    Err(Error::non_unique_result(count))
                }
            }
        }
    }

    /// Executes the select and hands each result to `each` while the
    /// driver reads its row. Rows are not buffered unless the query is
    /// cacheable. Returning `ControlFlow::Break` stops the read.
    ///
    /// When a collection is fetched, a result is handed out once the rows
    /// of the next one start, so its collection is complete. Associations
    /// fetched by subsequent selects are loaded once the read ends.
    pub fn stream<F>(&mut self, mut each: F) -> Result<()>
    where
        F: FnMut(Object) -> Result<ControlFlow<()>>,
    {
        self.read_results(&mut each)
    }

    /// Executes the select and returns a cursor over its results. The
    /// cursor moves both ways, so results are read up front.
    pub fn scroll(&mut self) -> Result<ScrollableResults> {
        Ok(ScrollableResults::new(self.list()?))
    }

    /// Executes a bulk update or delete and returns the affected row count.
    /// Bulk statements bypass the persistence context.
    pub fn execute_update(&mut self) -> Result<u64> {
        self.session.ensure_open()?;
        if matches!(self.sqm.kind, SqmKind::Select(_)) {
            return Err(Error::from_args(format_args!(
                "`execute_update` requires an update or delete statement: {}",
                self.sqm.query
            )));
        }

        let shape = self.shape();
        let plan = self.session.bulk_plan(&self.sqm, &shape)?;
        self.session.auto_flush(&plan.tables)?;

        let bindings = Bindings {
            params: &self.params,
            ..Bindings::default()
        };
        let params = exec::bind(&plan.binders, &plan.parameters, &bindings)?;
        let count = exec::execute(self.session.connection()?, &plan.sql, &params, self.timeout)?;

        self.session.tables_written([&plan.table]);
        tracing::debug!(count, "bulk statement executed");
        Ok(count)
    }

    fn param_id(&self, key: ParamKey) -> Result<ParamId> {
        let name = match &key {
            ParamKey::Named(name) => ParamName::Named(name.clone()),
            ParamKey::Positional(position) => ParamName::Positional(*position),
        };
        self.sqm.param_by_name(&name).ok_or_else(|| {
            Error::parameter_binding(format!(
                "the query does not declare parameter `{key}`: {}",
                self.sqm.query
            ))
        })
    }

    fn shape(&self) -> Shape {
        Shape {
            list_sizes: self
                .params
                .iter()
                .map(|value| match value {
                    Some(Value::List(items)) => Some(items.len()),
                    _ => None,
                })
                .collect(),
            first_result: self.first_result.is_some(),
            max_results: self.max_results.is_some(),
        }
    }

    /// Plans, auto-flushes and binds the select.
    fn execute_select(&mut self) -> Result<SelectExecution> {
        self.session.ensure_open()?;
        if self.sqm.as_select().is_none() {
            return Err(Error::from_args(format_args!(
                "use `execute_update` for update and delete statements: {}",
                self.sqm.query
            )));
        }

        let shape = self.shape();
        let plan = self.session.select_plan(&self.sqm, &shape)?;
        self.session.auto_flush(&plan.tables)?;

        let (limit, offset) = self.row_counts(&plan.pagination)?;
        let in_memory = plan.pagination.in_memory;

        let bindings = Bindings {
            params: &self.params,
            limit: limit.filter(|_| !in_memory),
            offset: offset.filter(|_| !in_memory),
            ..Bindings::default()
        };
        let params = exec::bind(&plan.binders, &plan.parameters, &bindings)?;

        let in_memory = in_memory.then(|| {
            let skip = offset.unwrap_or(0).max(0) as usize;
            let take = limit.map_or(usize::MAX, |limit| limit.max(0) as usize);
            (skip, take)
        });

        Ok(SelectExecution {
            plan,
            params,
            read_only: self
                .read_only
                .unwrap_or_else(|| self.session.default_read_only()),
            in_memory,
        })
    }

    /// Runs the select and assembles each row as the driver reads it.
    fn read_results(&mut self, each: &mut dyn FnMut(Object) -> Result<ControlFlow<()>>) -> Result<()> {
        let execution = self.execute_select()?;
        let plan = execution.plan;
        let mut assembler = Assembler::new(
            &self.session.shared().schema,
            plan.clone(),
            execution.read_only,
        );

        let (skip, remaining) = match execution.in_memory {
            Some((skip, take)) => (skip, Some(take)),
            None => (0, None),
        };
        let mut sink = ResultSink {
            skip,
            remaining,
            transformer: self.transformer.as_deref(),
            aliases: &plan.aliases,
            each,
        };

        let hold_back = plan.collection_fetch;
        let mut pending = None;
        let mut stopped = false;
        self.session.read_rows(
            &plan,
            &execution.params,
            self.timeout,
            self.cacheable,
            &mut |context, row| {
                let Some(object) = assembler.row(context, row)? else {
                    return Ok(ControlFlow::Continue(()));
                };
                let ready = if hold_back {
                    pending.replace(object)
                } else {
                    Some(object)
                };
                let flow = match ready {
                    Some(object) => sink.emit(object)?,
                    None => ControlFlow::Continue(()),
                };
                stopped = flow.is_break();
                Ok(flow)
            },
        )?;

        if let (Some(object), false) = (pending, stopped) {
            sink.emit(object)?;
        }
        self.session.post_load(assembler.finish())
    }

    fn row_counts(&self, pagination: &Pagination) -> Result<(Option<i64>, Option<i64>)> {
        let limit = self.row_count(pagination.limit, self.max_results)?;
        let offset = self.row_count(pagination.offset, self.first_result)?;
        Ok((limit, offset))
    }

    fn row_count(&self, count: Option<RowCount>, option: Option<usize>) -> Result<Option<i64>> {
        match count {
            None => Ok(None),
            Some(RowCount::Literal(count)) => Ok(Some(count)),
            Some(RowCount::QueryOption) => Ok(option.map(|count| count as i64)),
            Some(RowCount::Param(id)) => {
                let Some(value) = &self.params[id.0] else {
                    return Err(Error::parameter_binding(format!(
                        "no value bound for parameter #{}",
                        id.0 + 1
                    )));
                };
                value.to_i64().map(Some)
            }
        }
    }
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("query", &self.sqm.query)
            .field("params", &self.params)
            .field("first_result", &self.first_result)
            .field("max_results", &self.max_results)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

struct SelectExecution {
    plan: Rc<JdbcSelect>,
    params: Vec<Value>,
    read_only: bool,

    /// Rows to skip and to return when pagination could not be rendered
    in_memory: Option<(usize, usize)>,
}

fn transform(
    transformer: Option<&dyn RowTransformer>,
    object: Object,
    aliases: &[Option<String>],
) -> Result<Object> {
    let Some(transformer) = transformer else {
        return Ok(object);
    };
    let row = match object {
        Object::Tuple(items) => items,
        item => vec![item],
    };
    transformer.transform_tuple(row, aliases)
}

/// Applies in-memory pagination and the row transformer to results on
/// their way to the caller.
struct ResultSink<'a> {
    skip: usize,
    remaining: Option<usize>,
    transformer: Option<&'a dyn RowTransformer>,
    aliases: &'a [Option<String>],
    each: &'a mut dyn FnMut(Object) -> Result<ControlFlow<()>>,
}

impl ResultSink<'_> {
    fn emit(&mut self, object: Object) -> Result<ControlFlow<()>> {
        if self.skip > 0 {
            self.skip -= 1;
            return Ok(ControlFlow::Continue(()));
        }
        match &mut self.remaining {
            Some(0) => return Ok(ControlFlow::Break(())),
            Some(remaining) => *remaining -= 1,
            None => {}
        }

        let flow = (self.each)(transform(self.transformer, object, self.aliases)?)?;
        if self.remaining == Some(0) {
            return Ok(ControlFlow::Break(()));
        }
        Ok(flow)
    }
}

/// A cursor over query results. The cursor starts before the first
/// result; results are read when the query is scrolled and do not reflect
/// later changes.
#[derive(Debug)]
pub struct ScrollableResults {
    results: Vec<Object>,

    /// `None` before the first result; `Some(len)` after the last
    position: Option<usize>,
}

impl ScrollableResults {
    fn new(results: Vec<Object>) -> ScrollableResults {
        ScrollableResults {
            results,
            position: None,
        }
    }

    /// Moves to the next result. Returns `false` past the last one.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |position| position + 1);
        self.position = Some(next.min(self.results.len()));
        self.get().is_some()
    }

    /// Moves to the previous result. Returns `false` before the first one.
    pub fn previous(&mut self) -> bool {
        self.position = match self.position {
            Some(position) if position > 0 => Some(position - 1),
            _ => None,
        };
        self.get().is_some()
    }

    pub fn first(&mut self) -> bool {
        self.set_row_number(0)
    }

    pub fn last(&mut self) -> bool {
        match self.results.len() {
            0 => false,
            len => self.set_row_number(len - 1),
        }
    }

    /// Moves `offset` results forward or backward.
    pub fn scroll(&mut self, offset: isize) -> bool {
        let current = self.position.map_or(-1, |position| position as isize);
        let target = current + offset;
        if target < 0 {
            self.position = None;
            return false;
        }
        self.position = Some((target as usize).min(self.results.len()));
        self.get().is_some()
    }

    /// The result at the cursor.
    pub fn get(&self) -> Option<&Object> {
        self.results.get(self.position?)
    }

    /// Zero-based index of the result at the cursor.
    pub fn row_number(&self) -> Option<usize> {
        self.position.filter(|position| *position < self.results.len())
    }

    pub fn set_row_number(&mut self, row: usize) -> bool {
        self.position = Some(row.min(self.results.len()));
        self.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
