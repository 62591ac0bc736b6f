//! The unit of work.
//!
//! A session owns a persistence context (identity map and entity entries),
//! an action queue of pending inserts and deletes, and the compiled plans
//! of every query it ran. It is bound to one thread and holds a pooled
//! connection until it is closed.

pub(crate) mod context;
use context::{normalize_id, EntityKey, PersistenceContext, Status};

mod flush;
use flush::ActionQueue;

mod load;

mod plans;
use plans::Plans;

use crate::{
    db::{PoolConnection, Shared},
    engine::Cx,
    entity::{Attr, EntityData, EntityRef},
    Query,
};

use kiln_core::{
    driver::Connection,
    schema::{
        app::{IdGeneration, ModelId},
        db::TableId,
    },
    stmt::Value,
    Error, Result, Schema,
};

use by_address::ByAddress;
use indexmap::IndexSet;
use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc, sync::Arc};

type Visited = HashSet<ByAddress<Rc<RefCell<EntityData>>>>;

/// Options of [`Session::multi_load`].
#[derive(Debug, Clone, Copy)]
pub struct MultiLoadOptions {
    /// Keys per query; defaults to the entity's batch size
    pub batch_size: Option<usize>,

    /// Return one slot per requested identifier, in request order, with
    /// `None` for misses. Otherwise only found instances are returned.
    pub ordered: bool,

    /// Serve identifiers already managed by the session without querying
    pub session_check: bool,

    /// Return instances removed in this session but not yet flushed
    pub return_deleted: bool,
}

impl Default for MultiLoadOptions {
    fn default() -> MultiLoadOptions {
        MultiLoadOptions {
            batch_size: None,
            ordered: true,
            session_check: true,
            return_deleted: false,
        }
    }
}

pub struct Session {
    shared: Arc<Shared>,

    /// Checked out for the lifetime of the session; `None` once closed
    connection: Option<PoolConnection>,

    pub(crate) context: PersistenceContext,
    actions: ActionQueue,
    plans: Plans,

    in_transaction: bool,

    /// Tables written by the active transaction. Their cached results are
    /// neither read nor stored until it ends.
    written_tables: IndexSet<TableId>,

    /// Entities loaded by this session are read-only unless a query says
    /// otherwise
    default_read_only: bool,
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>, connection: PoolConnection) -> Session {
        Session {
            shared,
            connection: Some(connection),
            context: PersistenceContext::default(),
            actions: ActionQueue::default(),
            plans: Plans::default(),
            in_transaction: false,
            written_tables: IndexSet::new(),
            default_read_only: false,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.shared.schema
    }

    /// A new transient instance of `entity`.
    pub fn instantiate(&self, entity: &str) -> Result<EntityRef> {
        let model = self.entity_model(entity)?;
        Ok(EntityRef::new(&self.shared.schema, model))
    }

    /// Compiles an HQL query. Compiled plans are cached by the session.
    pub fn create_query(&mut self, query: &str) -> Result<Query<'_>> {
        self.ensure_open()?;
        let shared = self.shared.clone();
        let sqm = self.plans.sqm(Cx::new(&shared), query)?;
        Ok(Query::new(self, sqm))
    }

    /// Returns the instance of `entity` with identifier `id`, loading it
    /// with other queued keys of the entity when it is not managed yet.
    pub fn find(&mut self, entity: &str, id: impl Into<Value>) -> Result<Option<EntityRef>> {
        self.ensure_open()?;
        let model = self.entity_model(entity)?;
        let key = EntityKey {
            model,
            id: normalize_id(&self.shared.schema, model, &id.into())?,
        };

        if let Some(existing) = self.context.get(&key).cloned() {
            if let Some(entry) = self.context.entry(&existing) {
                return Ok((!entry.is_deleted()).then_some(existing));
            }
        }

        self.load_entity_batch(model, &key.id)?;
        Ok(self
            .context
            .get(&key)
            .filter(|entity| entity.is_initialized())
            .cloned())
    }

    /// Returns the managed instance or a proxy for it without querying.
    pub fn get_reference(&mut self, entity: &str, id: impl Into<Value>) -> Result<EntityRef> {
        self.ensure_open()?;
        let model = self.entity_model(entity)?;
        let key = EntityKey {
            model,
            id: normalize_id(&self.shared.schema, model, &id.into())?,
        };

        if let Some(existing) = self.context.get(&key) {
            return Ok(existing.clone());
        }

        let proxy = EntityRef::proxy(&self.shared.schema, model, &key.id);
        self.context.add_proxy(key, proxy.clone());
        Ok(proxy)
    }

    /// Loads an uninitialized proxy in place.
    pub fn initialize(&mut self, entity: &EntityRef) -> Result<()> {
        if entity.is_initialized() {
            return Ok(());
        }

        if self.connection.is_none() {
            return Err(Error::lazy_initialization(
                entity.entity_name(),
                "the session is closed",
            ));
        }

        if !self.context.is_associated(entity) {
            return Err(Error::lazy_initialization(
                entity.entity_name(),
                "the proxy is not associated with this session",
            ));
        }

        let id = entity.id();
        self.load_entity_batch(entity.model(), &id)?;

        if !entity.is_initialized() {
            return Err(Error::object_not_found(entity.entity_name(), id.to_string()));
        }
        Ok(())
    }

    /// Loads the collection `name` of `owner` if needed and returns its
    /// elements. Other queued owners of the same role are loaded with it.
    pub fn collection(&mut self, owner: &EntityRef, name: &str) -> Result<Vec<EntityRef>> {
        self.initialize(owner)?;

        let (role, initialized) = {
            let data = owner.borrow();
            let field = data.field_by_name(name)?;
            match &data.attrs[field.id.index] {
                Attr::Collection(collection) => (field.id, collection.is_initialized()),
                _ => {
                    return Err(Error::from_args(format_args!(
                        "`{}.{name}` is not a collection",
                        owner.entity_name()
                    )))
                }
            }
        };

        if !initialized {
            let role_name = format!("{}.{name}", owner.entity_name());
            if self.connection.is_none() {
                return Err(Error::lazy_initialization(role_name, "the session is closed"));
            }
            if self.context.entry(owner).is_none() {
                return Err(Error::lazy_initialization(
                    role_name,
                    "the owner is not associated with this session",
                ));
            }
            self.load_collection_batch(role, &owner.id())?;
        }

        let collection = owner.collection(name)?;
        Ok(collection.elements()?.to_vec())
    }

    /// Loads many instances of one entity by identifier.
    ///
    /// Identifiers are loaded in batches of `IN` restrictions. Repeated
    /// identifiers resolve to the same instance.
    pub fn multi_load<I>(
        &mut self,
        entity: &str,
        ids: I,
        options: MultiLoadOptions,
    ) -> Result<Vec<Option<EntityRef>>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.ensure_open()?;
        let schema = self.shared.schema.clone();
        let model = self.entity_model(entity)?;

        let keys = ids
            .into_iter()
            .map(|id| {
                Ok(EntityKey {
                    model,
                    id: normalize_id(&schema, model, &id.into())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut found: Vec<Option<EntityRef>> = vec![None; keys.len()];
        let mut pending = IndexSet::new();

        for (slot, key) in found.iter_mut().zip(&keys) {
            if options.session_check {
                if let Some(existing) = self.context.get(key) {
                    if let Some(entry) = self.context.entry(existing) {
                        if !entry.is_deleted() || options.return_deleted {
                            *slot = Some(existing.clone());
                        }
                        continue;
                    }
                }
            }
            pending.insert(key.id.clone());
        }

        let batch = options
            .batch_size
            .unwrap_or_else(|| self.batch_size(model))
            .max(1);
        let pending: Vec<Value> = pending.into_iter().collect();

        tracing::debug!(
            entity,
            requested = keys.len(),
            pending = pending.len(),
            batch,
            "multi-load"
        );

        for chunk in pending.chunks(batch) {
            self.load_entities(model, chunk, batch)?;
        }

        for (slot, key) in found.iter_mut().zip(&keys) {
            if slot.is_some() {
                continue;
            }
            let Some(entity) = self.context.get(key) else {
                continue;
            };
            if !entity.is_initialized() {
                continue;
            }
            let deleted = self
                .context
                .entry(entity)
                .is_some_and(|entry| entry.is_deleted());
            if !deleted || options.return_deleted {
                *slot = Some(entity.clone());
            }
        }

        if !options.ordered {
            found.retain(Option::is_some);
        }
        Ok(found)
    }

    /// Makes a transient instance managed.
    ///
    /// Assigned identifiers are inserted at flush; identity identifiers are
    /// inserted immediately. Associations cascading persist are persisted
    /// with it.
    pub fn persist(&mut self, entity: &EntityRef) -> Result<()> {
        self.ensure_open()?;
        self.persist_cascade(entity, &mut Visited::new())
    }

    /// Schedules a managed instance for deletion. Associations cascading
    /// remove are removed with it.
    pub fn remove(&mut self, entity: &EntityRef) -> Result<()> {
        self.ensure_open()?;
        if !entity.is_initialized() {
            self.initialize(entity)?;
        }
        self.remove_cascade(entity, &mut Visited::new())
    }

    /// Detaches an instance. Pending changes to it are discarded.
    pub fn evict(&mut self, entity: &EntityRef) {
        self.actions.forget(entity);
        if self.context.remove(entity).is_none() && self.context.is_associated(entity) {
            self.context.remove_key(&EntityKey {
                model: entity.model(),
                id: entity.id(),
            });
        }
    }

    /// Detaches every instance and discards pending changes.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.context.clear();
    }

    /// Returns `true` if `entity` is managed by this session and not
    /// scheduled for deletion.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.context
            .entry(entity)
            .is_some_and(|entry| !entry.is_deleted())
    }

    /// Read-only instances are never dirty checked. Switching back takes a
    /// fresh snapshot, so earlier modifications are not written.
    pub fn set_read_only(&mut self, entity: &EntityRef, read_only: bool) -> Result<()> {
        let Some(entry) = self.context.entry_mut(entity) else {
            return Err(Error::from_args(format_args!(
                "`{}` instance is not managed by this session",
                entity.entity_name()
            )));
        };

        match (entry.status, read_only) {
            (Status::Managed, true) => entry.status = Status::ReadOnly,
            (Status::ReadOnly, false) => {
                entry.status = Status::Managed;
                self.context.after_write(entity);
            }
            (Status::Managed | Status::ReadOnly, _) => {}
            (status, _) => {
                return Err(Error::from_args(format_args!(
                    "cannot change the read-only state of a `{}` instance in state {status:?}",
                    entity.entity_name()
                )))
            }
        }
        Ok(())
    }

    pub fn is_read_only(&self, entity: &EntityRef) -> bool {
        self.context
            .entry(entity)
            .is_some_and(|entry| entry.status == Status::ReadOnly)
    }

    /// Instances loaded afterwards are read-only unless a query overrides
    /// it.
    pub fn set_default_read_only(&mut self, read_only: bool) {
        self.default_read_only = read_only;
    }

    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::transaction("a transaction is already active"));
        }
        self.connection()?
            .begin()
            .map_err(|err| crate::engine::exec::convert_sql_error(err, "BEGIN"))?;
        self.in_transaction = true;
        tracing::debug!("transaction started");
        Ok(())
    }

    /// Flushes pending changes and commits. A failed flush rolls the
    /// transaction back.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::transaction("no transaction is active"));
        }

        if let Err(err) = self.flush_actions() {
            self.rollback()?;
            return Err(err);
        }

        self.connection()?
            .commit()
            .map_err(|err| crate::engine::exec::convert_sql_error(err, "COMMIT"))?;
        self.in_transaction = false;
        self.end_writes();
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Rolls back and clears the persistence context, whose state no
    /// longer matches the database.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::transaction("no transaction is active"));
        }
        self.in_transaction = false;
        self.actions.clear();
        self.context.clear();
        self.end_writes();

        self.connection()?
            .rollback()
            .map_err(|err| crate::engine::exec::convert_sql_error(err, "ROLLBACK"))?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    pub fn is_transaction_active(&self) -> bool {
        self.in_transaction
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the connection to the pool. An active transaction is rolled
    /// back.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        self.actions.clear();
        if self.in_transaction {
            tracing::warn!("session closed with an active transaction; rolling back");
            self.in_transaction = false;
            self.end_writes();
            connection
                .rollback()
                .map_err(|err| crate::engine::exec::convert_sql_error(err, "ROLLBACK"))?;
        }
        Ok(())
    }

    /// Invalidates cached results of `tables` after a write. Inside a
    /// transaction the tables stay uncacheable until it ends.
    pub(crate) fn tables_written<'a>(&mut self, tables: impl IntoIterator<Item = &'a TableId>) {
        let tables: Vec<_> = tables.into_iter().copied().collect();
        self.shared.timestamps.invalidate(&tables);
        if self.in_transaction {
            self.written_tables.extend(tables);
        }
    }

    /// Returns `true` if the active transaction wrote any of `tables`.
    pub(crate) fn has_written(&self, tables: &IndexSet<TableId>) -> bool {
        tables.iter().any(|table| self.written_tables.contains(table))
    }

    /// Results read while the transaction was open may include its writes.
    fn end_writes(&mut self) {
        let tables = std::mem::take(&mut self.written_tables);
        if !tables.is_empty() {
            self.shared.timestamps.invalidate(&tables);
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.connection.is_none() {
            return Err(Error::transaction("the session is closed"));
        }
        Ok(())
    }

    pub(crate) fn connection(&mut self) -> Result<&mut dyn Connection> {
        match &mut self.connection {
            Some(connection) => Ok(&mut **connection),
            None => Err(Error::transaction("the session is closed")),
        }
    }

    /// The connection together with the persistence context, for reading
    /// rows into the context while the connection is still stepping.
    pub(crate) fn connection_and_context(
        &mut self,
    ) -> Result<(&mut dyn Connection, &mut PersistenceContext)> {
        match &mut self.connection {
            Some(connection) => Ok((&mut **connection, &mut self.context)),
            None => Err(Error::transaction("the session is closed")),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn default_read_only(&self) -> bool {
        self.default_read_only
    }

    fn entity_model(&self, name: &str) -> Result<ModelId> {
        match self.shared.schema.model_by_name(name) {
            Some(model) if model.is_entity() => Ok(model.id),
            _ => Err(Error::mapping(format!("unknown entity `{name}`"))),
        }
    }

    fn batch_size(&self, model: ModelId) -> usize {
        self.shared
            .schema
            .model(model)
            .as_entity()
            .and_then(|root| root.batch_size)
            .unwrap_or(self.shared.config.default_batch_fetch_size)
            .max(1)
    }

    fn persist_cascade(&mut self, entity: &EntityRef, visited: &mut Visited) -> Result<()> {
        if !visited.insert(ByAddress(entity.rc().clone())) {
            return Ok(());
        }

        let (to_ones, collections) = cascaded(entity, |cascade| cascade.persist);

        for target in to_ones {
            self.persist_cascade(&target, visited)?;
        }

        self.persist_one(entity)?;

        for element in collections {
            self.persist_cascade(&element, visited)?;
        }
        Ok(())
    }

    fn persist_one(&mut self, entity: &EntityRef) -> Result<()> {
        if let Some(entry) = self.context.entry_mut(entity) {
            if entry.status == Status::Deleted {
                entry.status = Status::Managed;
                self.actions.cancel_delete(entity);
            }
            return Ok(());
        }

        if !entity.is_initialized() {
            return Err(Error::from_args(format_args!(
                "cannot persist an uninitialized `{}` proxy of another session",
                entity.entity_name()
            )));
        }

        let schema = self.shared.schema.clone();
        let model = schema.model(entity.model());
        let root = model.expect_entity();

        seed_version(entity);

        match root.identifier.generation {
            IdGeneration::Assigned => {
                let id = entity.id();
                if id.is_all_null() {
                    return Err(Error::from_args(format_args!(
                        "the identifier of `{}` must be assigned before persisting",
                        model.name
                    )));
                }

                let key = EntityKey {
                    model: model.id,
                    id: normalize_id(&schema, model.id, &id)?,
                };
                if self.context.get(&key).is_some() {
                    return Err(Error::from_args(format_args!(
                        "a different `{}` instance with identifier {} is already associated with the session",
                        model.name, key.id
                    )));
                }

                tracing::trace!(entity = %model.name, id = %key.id, "scheduling insert");
                self.context.add_new(key, entity.clone());
                self.actions.push_insert(entity.clone());
            }
            IdGeneration::Identity => {
                // Earlier inserts may be referenced by this row
                self.execute_pending_inserts()?;
                self.insert_with_identity(entity)?;
            }
        }
        Ok(())
    }

    fn remove_cascade(&mut self, entity: &EntityRef, visited: &mut Visited) -> Result<()> {
        if !visited.insert(ByAddress(entity.rc().clone())) {
            return Ok(());
        }

        let Some(entry) = self.context.entry(entity) else {
            return Err(Error::from_args(format_args!(
                "cannot remove a detached `{}` instance",
                entity.entity_name()
            )));
        };
        if entry.is_deleted() {
            return Ok(());
        }

        // Children are deleted before the row referencing them goes away
        let schema = self.shared.schema.clone();
        for field in &schema.model(entity.model()).fields {
            if field.ty.as_collection().is_some_and(|c| c.cascade.remove) {
                for element in self.collection(entity, &field.name)? {
                    if !element.is_initialized() {
                        self.initialize(&element)?;
                    }
                    self.remove_cascade(&element, visited)?;
                }
            }
        }

        self.remove_one(entity);

        let (to_ones, _) = cascaded(entity, |cascade| cascade.remove);
        for target in to_ones {
            if !target.is_initialized() {
                self.initialize(&target)?;
            }
            self.remove_cascade(&target, visited)?;
        }
        Ok(())
    }

    fn remove_one(&mut self, entity: &EntityRef) {
        if self.actions.cancel_insert(entity) {
            tracing::trace!(entity = %entity.entity_name(), "removed before its insert was flushed");
            self.context.remove(entity);
            return;
        }

        if let Some(entry) = self.context.entry_mut(entity) {
            entry.status = Status::Deleted;
        }
        self.actions.push_delete(entity.clone());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::error!(%err, "failed to release the session's connection");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.connection.is_some())
            .field("in_transaction", &self.in_transaction)
            .field("written_tables", &self.written_tables)
            .field("context", &self.context)
            .field("actions", &self.actions)
            .finish()
    }
}

/// Targets of the to-one associations and elements of the loaded
/// collections of `entity` whose cascade style matches.
fn cascaded(
    entity: &EntityRef,
    cascades: impl Fn(kiln_core::schema::app::Cascade) -> bool,
) -> (Vec<EntityRef>, Vec<EntityRef>) {
    let data = entity.borrow();
    let model = data.schema.model(data.model);

    let mut to_ones = vec![];
    let mut elements = vec![];
    for field in &model.fields {
        if !field.is_association() || !cascades(field.cascade()) {
            continue;
        }
        match &data.attrs[field.id.index] {
            Attr::ToOne(Some(target)) => to_ones.push(target.clone()),
            Attr::Collection(collection) => {
                elements.extend(collection.loaded().into_iter().flatten().cloned())
            }
            _ => {}
        }
    }
    (to_ones, elements)
}

/// Versioned entities start at version 0.
fn seed_version(entity: &EntityRef) {
    let mut data = entity.borrow_mut();
    let Some(version) = data.schema.model(data.model).version_field().map(|f| f.id) else {
        return;
    };
    if data.attrs[version.index].as_value().map_or(true, Value::is_null) {
        data.attrs[version.index] = Attr::Value(Value::I64(0));
    }
}
