//! Reading: running selects and loaders, consulting the query cache and
//! assembling rows into the persistence context.

use super::{
    context::{id_from_leaves, PersistenceContext},
    EntityKey, Session,
};
use crate::{
    cache::{cache_key, CachedRows},
    engine::{
        assemble::{Assembler, PostLoad},
        exec::{self, Bindings},
        lower::{JdbcBulk, JdbcSelect, Shape},
        sqm::SqmStatement,
        Cx,
    },
    entity::{Attr, EntityRef, Object, PersistentCollection},
};

use kiln_core::{
    driver::Rows,
    schema::app::{FieldId, ModelId},
    stmt::{Value, ValueRecord},
    Error, Result,
};

use indexmap::IndexMap;
use std::{ops::ControlFlow, rc::Rc, sync::Arc, time::Duration};

impl Session {
    pub(crate) fn select_plan(&mut self, sqm: &SqmStatement, shape: &Shape) -> Result<Rc<JdbcSelect>> {
        let shared = self.shared.clone();
        self.plans.select(Cx::new(&shared), sqm, shape)
    }

    pub(crate) fn bulk_plan(&mut self, sqm: &SqmStatement, shape: &Shape) -> Result<Rc<JdbcBulk>> {
        let shared = self.shared.clone();
        self.plans.bulk(Cx::new(&shared), sqm, shape)
    }

    /// Executes a select, handing each row to `each` along with the
    /// persistence context. Cacheable executions are served from the query
    /// cache while none of the tables they read changed; a miss keeps a copy
    /// of the rows and caches them once every row was read. Tables written
    /// by the active transaction bypass the cache.
    pub(crate) fn read_rows(
        &mut self,
        plan: &JdbcSelect,
        params: &[Value],
        timeout: Option<Duration>,
        cacheable: bool,
        each: &mut dyn FnMut(&mut PersistenceContext, &ValueRecord) -> Result<ControlFlow<()>>,
    ) -> Result<()> {
        let shared = self.shared.clone();
        let region = shared
            .query_cache
            .as_ref()
            .filter(|_| cacheable && !self.has_written(&plan.tables));
        let key = region.map(|_| cache_key(&plan.sql, params));

        if let (Some(region), Some(key)) = (region, &key) {
            if let Some(cached) = region.get(key) {
                if shared.timestamps.is_up_to_date(&plan.tables, cached.timestamp) {
                    tracing::debug!(sql = %plan.sql, rows = cached.rows.len(), "query cache hit");
                    for row in &cached.rows {
                        if each(&mut self.context, row)?.is_break() {
                            break;
                        }
                    }
                    return Ok(());
                }
                tracing::debug!(sql = %plan.sql, "stale query cache entry");
                region.evict(key);
            }
        }

        let timestamp = shared.timestamps.next_timestamp();
        let mut copy = region.map(|_| Vec::new());
        let mut complete = true;

        let (connection, context) = self.connection_and_context()?;
        exec::query_each(connection, &plan.sql, params, timeout, &mut |row| {
            let flow = each(&mut *context, &row)?;
            if flow.is_break() {
                complete = false;
            } else if let Some(copy) = &mut copy {
                copy.push(row);
            }
            Ok(flow)
        })?;

        if let (Some(region), Some(key), Some(rows), true) = (region, key, copy, complete) {
            region.put(key, Arc::new(CachedRows { timestamp, rows }));
        }
        Ok(())
    }

    /// Assembles every row, then loads the associations the result set
    /// left for later.
    pub(crate) fn assemble(
        &mut self,
        plan: Rc<JdbcSelect>,
        rows: &Rows,
        read_only: bool,
    ) -> Result<Vec<Object>> {
        let mut assembler = Assembler::new(&self.shared.schema, plan, read_only);
        let mut objects = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(object) = assembler.row(&mut self.context, row)? {
                objects.push(object);
            }
        }
        self.post_load(assembler.finish())?;
        Ok(objects)
    }

    pub(crate) fn post_load(&mut self, post: PostLoad) -> Result<()> {
        if post.is_empty() {
            return Ok(());
        }

        for entity in post.entities {
            if !entity.is_initialized() && self.context.entry(&entity).is_none() {
                let id = entity.id();
                self.load_entity_batch(entity.model(), &id)?;
            }
        }

        for (owner, role) in post.collections {
            let uninitialized = matches!(
                &owner.borrow().attrs[role.index],
                Attr::Collection(collection) if !collection.is_initialized()
            );
            if uninitialized {
                self.load_collection_batch(role, &owner.id())?;
            }
        }
        Ok(())
    }

    /// Loads `id` together with other queued proxies of the entity.
    pub(super) fn load_entity_batch(&mut self, model: ModelId, id: &Value) -> Result<()> {
        let size = self.batch_size(model);
        let ids = self.context.entity_batch(model, id, size);
        self.load_entities(model, &ids, size)
    }

    /// Loads `ids`, at most `batch` of them. A single key uses a single-key
    /// loader; otherwise unused key slots are padded.
    pub(super) fn load_entities(&mut self, model: ModelId, ids: &[Value], batch: usize) -> Result<()> {
        let size = if ids.len() == 1 { 1 } else { batch };
        let shared = self.shared.clone();
        let plan = self.plans.entity_loader(Cx::new(&shared), model, size)?;

        let rows = self.run_loader(&plan, ids)?;
        tracing::trace!(
            entity = %shared.schema.model(model).name,
            keys = ids.len(),
            rows = rows.len(),
            "batch loaded"
        );
        self.assemble(plan, &rows, self.default_read_only)?;

        // Keys without a row are not retried
        for id in ids {
            self.context.dequeue_entity(model, id);
        }
        Ok(())
    }

    /// Loads collection `role` of `owner` together with other queued owners
    /// of the role.
    pub(super) fn load_collection_batch(&mut self, role: FieldId, owner: &Value) -> Result<()> {
        let shared = self.shared.clone();
        let schema = &shared.schema;

        let batch = self.batch_size(role.model);
        let owners = self.context.collection_batch(role, owner, batch);
        let size = if owners.len() == 1 { 1 } else { batch };
        let plan = self.plans.collection_loader(Cx::new(&shared), role, size)?;

        let rows = self.run_loader(&plan, &owners)?;

        let mut grouped: IndexMap<Value, Vec<EntityRef>> =
            owners.iter().map(|owner| (owner.clone(), vec![])).collect();

        let mut assembler = Assembler::new(schema, plan, self.default_read_only);
        for row in &rows {
            let Some(object) = assembler.row(&mut self.context, row)? else {
                continue;
            };
            let (Some(element), Some(key)) = split_element_row(object) else {
                return Err(Error::mapping("collection loader rows must carry an element and its owner"));
            };

            let mut leaves = vec![];
            key.flatten_into(&mut leaves);
            let owner = id_from_leaves(schema, role.model, leaves);

            let elements = grouped.entry(owner).or_default();
            if !elements.iter().any(|e| e.ptr_eq(&element)) {
                elements.push(element);
            }
        }
        let post = assembler.finish();

        for (owner, elements) in grouped {
            let key = EntityKey {
                model: role.model,
                id: owner.clone(),
            };
            if let Some(instance) = self.context.get(&key) {
                let mut data = instance.borrow_mut();
                if matches!(&data.attrs[role.index], Attr::Collection(c) if !c.is_initialized()) {
                    data.attrs[role.index] =
                        Attr::Collection(PersistentCollection::initialized(role, elements));
                }
            }
            self.context.dequeue_collection(role, &owner);
        }

        tracing::trace!(?role, owners = owners.len(), rows = rows.len(), "collections loaded");
        self.post_load(post)
    }

    fn run_loader(&mut self, plan: &JdbcSelect, keys: &[Value]) -> Result<Rows> {
        let Some(batch) = plan.keys else {
            return Err(Error::mapping("loader plans bind keys"));
        };
        let args = batch.args(keys);
        let params = exec::bind(&plan.binders, &plan.parameters, &Bindings::args(&args))?;
        let timeout = self.shared.config.default_timeout;
        exec::query(self.connection()?, &plan.sql, &params, timeout)
    }
}

fn split_element_row(object: Object) -> (Option<EntityRef>, Option<Value>) {
    let Some(mut items) = object.into_tuple() else {
        return (None, None);
    };
    let key = items.pop().and_then(Object::into_value);
    let element = items.pop().and_then(Object::into_entity);
    (element, key)
}
