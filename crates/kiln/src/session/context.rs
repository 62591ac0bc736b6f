use crate::entity::{EntityData, EntityRef};

use kiln_core::{
    schema::app::{FieldId, FieldTy, ModelId},
    stmt::Value,
    Error, Result, Schema,
};

use by_address::ByAddress;
use indexmap::{IndexMap, IndexSet};
use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

/// Identifies an instance within a persistence context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EntityKey {
    pub(crate) model: ModelId,

    /// Flat identifier; a record for composite identifiers
    pub(crate) id: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Managed,
    ReadOnly,
    Deleted,

    /// Being assembled from the current result set
    Loading,
}

/// Bookkeeping for a managed instance.
#[derive(Debug)]
pub(crate) struct EntityEntry {
    pub(crate) key: EntityKey,
    pub(crate) status: Status,

    /// Column values at load or at the last flush, aligned with
    /// `EntityData::column_state`. Absent until the row exists.
    pub(crate) loaded_state: Option<Vec<Value>>,

    pub(crate) version: Option<Value>,
}

impl EntityEntry {
    pub(crate) fn is_deleted(&self) -> bool {
        self.status == Status::Deleted
    }
}

/// Builds the flat identifier of `model` from its column values: a scalar
/// for basic identifiers, a record for embedded ones.
pub(crate) fn id_from_leaves(schema: &Schema, model: ModelId, mut leaves: Vec<Value>) -> Value {
    let model = schema.model(model);
    match model.field(model.expect_identifier().field).ty {
        FieldTy::Embedded(_) => Value::record_from_vec(leaves),
        _ if leaves.len() == 1 => leaves.swap_remove(0),
        _ => Value::record_from_vec(leaves),
    }
}

/// Converts a caller-supplied identifier to the flat form the identity map
/// is keyed by, casting each leaf to its column type.
pub(crate) fn normalize_id(schema: &Schema, model: ModelId, id: &Value) -> Result<Value> {
    let columns = schema.id_columns(model);
    let mut leaves = vec![];
    id.flatten_into(&mut leaves);

    if leaves.len() != columns.len() {
        return Err(Error::type_conversion(
            id.clone(),
            format!("identifier of `{}`", schema.model(model).name),
        ));
    }

    let leaves = leaves
        .into_iter()
        .zip(columns)
        .map(|(leaf, column)| schema.column(column).ty.cast(leaf))
        .collect::<Result<Vec<_>>>()?;

    Ok(id_from_leaves(schema, model, leaves))
}

type Identity = ByAddress<Rc<RefCell<EntityData>>>;

fn identity(entity: &EntityRef) -> Identity {
    ByAddress(entity.rc().clone())
}

/// The identity map and entity entries of one session.
///
/// At most one instance is registered per key. Proxies are registered in the
/// identity map without an entry until they are initialized.
#[derive(Default)]
pub(crate) struct PersistenceContext {
    entities: IndexMap<EntityKey, EntityRef>,
    entries: HashMap<Identity, EntityEntry>,

    /// Identifiers of registered, uninitialized proxies per entity
    pending_entities: IndexMap<ModelId, IndexSet<Value>>,

    /// Owner identifiers of uninitialized collections per role
    pending_collections: IndexMap<FieldId, IndexSet<Value>>,
}

impl PersistenceContext {
    pub(crate) fn get(&self, key: &EntityKey) -> Option<&EntityRef> {
        self.entities.get(key)
    }

    pub(crate) fn entry(&self, entity: &EntityRef) -> Option<&EntityEntry> {
        self.entries.get(&identity(entity))
    }

    pub(crate) fn entry_mut(&mut self, entity: &EntityRef) -> Option<&mut EntityEntry> {
        self.entries.get_mut(&identity(entity))
    }

    /// Registered instances with an entry, in registration order.
    pub(crate) fn managed(&self) -> impl Iterator<Item = (&EntityRef, &EntityEntry)> {
        self.entities
            .values()
            .filter_map(|entity| Some((entity, self.entries.get(&identity(entity))?)))
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }

    /// Registers an uninitialized proxy and queues its key for batch
    /// fetching.
    pub(crate) fn add_proxy(&mut self, key: EntityKey, proxy: EntityRef) {
        self.pending_entities
            .entry(key.model)
            .or_default()
            .insert(key.id.clone());
        self.entities.insert(key, proxy);
    }

    /// Registers an instance whose state is about to be read from a result
    /// set. It is visible to lookups before its attributes are populated.
    pub(crate) fn add_loading(&mut self, key: EntityKey, entity: EntityRef) {
        self.entries.insert(
            identity(&entity),
            EntityEntry {
                key: key.clone(),
                status: Status::Loading,
                loaded_state: None,
                version: None,
            },
        );
        self.entities.insert(key, entity);
    }

    /// Completes loading: snapshots the state for dirty checking and drops
    /// the key from the batch-fetch queue.
    pub(crate) fn finish_loading(&mut self, entity: &EntityRef, read_only: bool) {
        let (state, version) = snapshot(entity);
        let Some(entry) = self.entries.get_mut(&identity(entity)) else {
            return;
        };

        entry.status = if read_only {
            Status::ReadOnly
        } else {
            Status::Managed
        };
        entry.loaded_state = Some(state);
        entry.version = version;

        if let Some(pending) = self.pending_entities.get_mut(&entry.key.model) {
            pending.shift_remove(&entry.key.id);
        }
    }

    /// Registers a new instance scheduled for insertion.
    pub(crate) fn add_new(&mut self, key: EntityKey, entity: EntityRef) {
        self.entries.insert(
            identity(&entity),
            EntityEntry {
                key: key.clone(),
                status: Status::Managed,
                loaded_state: None,
                version: None,
            },
        );
        self.entities.insert(key, entity);
    }

    /// Records the row as written by a flush.
    pub(crate) fn after_write(&mut self, entity: &EntityRef) {
        let (state, version) = snapshot(entity);
        if let Some(entry) = self.entries.get_mut(&identity(entity)) {
            entry.loaded_state = Some(state);
            entry.version = version;
        }
    }

    /// Drops the instance from the identity map. Returns its entry.
    pub(crate) fn remove(&mut self, entity: &EntityRef) -> Option<EntityEntry> {
        let entry = self.entries.remove(&identity(entity))?;
        self.entities.shift_remove(&entry.key);
        Some(entry)
    }

    /// Drops a proxy or instance by key.
    pub(crate) fn remove_key(&mut self, key: &EntityKey) {
        if let Some(entity) = self.entities.shift_remove(key) {
            self.entries.remove(&identity(&entity));
        }
        if let Some(pending) = self.pending_entities.get_mut(&key.model) {
            pending.shift_remove(&key.id);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entities.clear();
        self.entries.clear();
        self.pending_entities.clear();
        self.pending_collections.clear();
    }

    /// `first` followed by up to `size - 1` other queued keys of `model`.
    pub(crate) fn entity_batch(&self, model: ModelId, first: &Value, size: usize) -> Vec<Value> {
        let mut batch = vec![first.clone()];
        if let Some(pending) = self.pending_entities.get(&model) {
            batch.extend(
                pending
                    .iter()
                    .filter(|id| *id != first)
                    .take(size.saturating_sub(1))
                    .cloned(),
            );
        }
        batch
    }

    /// Drops a key that matched no row from the batch-fetch queue.
    pub(crate) fn dequeue_entity(&mut self, model: ModelId, id: &Value) {
        if let Some(pending) = self.pending_entities.get_mut(&model) {
            pending.shift_remove(id);
        }
    }

    /// Returns `true` if `entity` is the instance registered for its key,
    /// managed or proxy.
    pub(crate) fn is_associated(&self, entity: &EntityRef) -> bool {
        if self.entries.contains_key(&identity(entity)) {
            return true;
        }
        let key = EntityKey {
            model: entity.model(),
            id: entity.id(),
        };
        self.entities
            .get(&key)
            .is_some_and(|registered| registered.ptr_eq(entity))
    }

    pub(crate) fn is_entity_pending(&self, model: ModelId, id: &Value) -> bool {
        self.pending_entities
            .get(&model)
            .is_some_and(|pending| pending.contains(id))
    }

    pub(crate) fn queue_collection(&mut self, role: FieldId, owner: Value) {
        self.pending_collections.entry(role).or_default().insert(owner);
    }

    pub(crate) fn dequeue_collection(&mut self, role: FieldId, owner: &Value) {
        if let Some(pending) = self.pending_collections.get_mut(&role) {
            pending.shift_remove(owner);
        }
    }

    pub(crate) fn collection_batch(&self, role: FieldId, first: &Value, size: usize) -> Vec<Value> {
        let mut batch = vec![first.clone()];
        if let Some(pending) = self.pending_collections.get(&role) {
            batch.extend(
                pending
                    .iter()
                    .filter(|owner| *owner != first)
                    .take(size.saturating_sub(1))
                    .cloned(),
            );
        }
        batch
    }
}

impl fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceContext")
            .field("entities", &self.entities)
            .field("pending_entities", &self.pending_entities)
            .field("pending_collections", &self.pending_collections)
            .finish()
    }
}

fn snapshot(entity: &EntityRef) -> (Vec<Value>, Option<Value>) {
    let data = entity.borrow();
    let state = data
        .column_state()
        .into_iter()
        .map(|(_, _, value)| value)
        .collect();

    let model = data.schema.model(data.model);
    let version = model
        .version_field()
        .and_then(|field| data.attrs[field.id.index].as_value().cloned());

    (state, version)
}
