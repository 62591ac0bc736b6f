//! Row-by-row reconstruction of domain objects.
//!
//! Every entity result owns a slot whose state advances through key
//! resolution, instance resolution and initialization while one row is
//! processed. Slots are reset when the row is finished.

use super::lower::{
    AttrResult, BasicResult, CollectionResult, CompositeAttr, CompositeResult, DomainResult,
    EntityResult, JdbcSelect, ToOneResult,
};
use crate::{
    entity::{Attr, Composite, EntityData, EntityRef, Object, PersistentCollection},
    session::context::{id_from_leaves, EntityKey, PersistenceContext},
};

use kiln_core::{
    schema::app::{FieldId, ModelId},
    stmt::{Value, ValueRecord},
    Result, Schema,
};

use by_address::ByAddress;
use std::{cell::RefCell, collections::HashSet, rc::Rc, sync::Arc};

/// Associations to load once the result set is consumed.
#[derive(Debug, Default)]
pub(crate) struct PostLoad {
    /// Eagerly fetched to-one targets that are still proxies
    pub(crate) entities: Vec<EntityRef>,

    /// Eagerly fetched collections that are still placeholders
    pub(crate) collections: Vec<(EntityRef, FieldId)>,
}

impl PostLoad {
    pub(crate) fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.collections.is_empty()
    }
}

/// Per-row scratch state of every entity result.
#[derive(Debug)]
struct RowState {
    slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
enum Slot {
    Unresolved,
    KeyResolved,

    /// Outer join matched nothing
    Missing,

    InstanceResolved(EntityRef),

    Initialized {
        entity: EntityRef,

        /// The attributes were read from this row
        loaded: bool,
    },
}

impl RowState {
    fn new(slots: usize) -> RowState {
        RowState {
            slots: vec![Slot::Unresolved; slots],
        }
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Unresolved;
        }
    }
}

type Identity = ByAddress<Rc<RefCell<EntityData>>>;

/// Reads the rows of one result set. Instances are registered in the
/// persistence context passed to each [`row`](Assembler::row) call.
pub(crate) struct Assembler {
    schema: Arc<Schema>,
    plan: Rc<JdbcSelect>,
    read_only: bool,
    state: RowState,

    /// Join-fetched collections being filled by this result set
    collecting: HashSet<(Identity, FieldId)>,

    /// Roots returned so far, when rows repeat their owner
    seen: Option<HashSet<Vec<Option<Identity>>>>,

    post_load: PostLoad,
}

/// What resolving one row borrows.
struct RowCx<'a> {
    schema: &'a Arc<Schema>,
    context: &'a mut PersistenceContext,
    state: &'a mut RowState,
    collecting: &'a mut HashSet<(Identity, FieldId)>,
    post_load: &'a mut PostLoad,
}

impl Assembler {
    pub(crate) fn new(schema: &Arc<Schema>, plan: Rc<JdbcSelect>, read_only: bool) -> Assembler {
        let dedupe = plan.collection_fetch
            && plan
                .results
                .iter()
                .all(|result| matches!(result, DomainResult::Entity(_)));

        Assembler {
            schema: schema.clone(),
            state: RowState::new(plan.slots),
            plan,
            read_only,
            collecting: HashSet::new(),
            seen: dedupe.then(HashSet::new),
            post_load: PostLoad::default(),
        }
    }

    pub(crate) fn plan(&self) -> &Rc<JdbcSelect> {
        &self.plan
    }

    /// Assembles one row. Returns `None` for a row repeating roots already
    /// returned.
    pub(crate) fn row(
        &mut self,
        context: &mut PersistenceContext,
        raw: &ValueRecord,
    ) -> Result<Option<Object>> {
        let mut cx = RowCx {
            schema: &self.schema,
            context,
            state: &mut self.state,
            collecting: &mut self.collecting,
            post_load: &mut self.post_load,
        };

        let mut items = Vec::with_capacity(self.plan.results.len());
        for result in &self.plan.results {
            items.push(cx.domain_result(result, raw)?);
        }

        cx.finish_up_row(self.read_only);

        if let Some(seen) = &mut self.seen {
            let identity = items
                .iter()
                .map(|item| item.as_entity().map(|entity| ByAddress(entity.rc().clone())))
                .collect();
            if !seen.insert(identity) {
                return Ok(None);
            }
        }

        Ok(Some(if items.len() == 1 {
            items.swap_remove(0)
        } else {
            Object::Tuple(items)
        }))
    }

    /// Completes the result set, handing back what still needs loading.
    pub(crate) fn finish(self) -> PostLoad {
        tracing::trace!(
            entities = self.post_load.entities.len(),
            collections = self.post_load.collections.len(),
            "result set assembled"
        );
        self.post_load
    }
}

impl RowCx<'_> {
    fn domain_result(&mut self, result: &DomainResult, row: &[Value]) -> Result<Object> {
        Ok(match result {
            DomainResult::Basic(basic) => Object::Value(read(basic, row)?),
            DomainResult::Composite(composite) => match self.composite(composite, row)? {
                Some(composite) => Object::Composite(composite),
                None => Object::Value(Value::Null),
            },
            DomainResult::Entity(entity) => Object::from(self.entity(entity, row)?),
            DomainResult::Key(key) => {
                let mut leaves = read_all(key, row)?;
                if leaves.len() == 1 {
                    Object::Value(leaves.swap_remove(0))
                } else {
                    Object::Value(Value::record_from_vec(leaves))
                }
            }
        })
    }

    fn entity(&mut self, result: &EntityResult, row: &[Value]) -> Result<Option<EntityRef>> {
        match &self.state.slots[result.slot] {
            Slot::Unresolved => {}
            Slot::Missing => return Ok(None),
            Slot::InstanceResolved(entity) | Slot::Initialized { entity, .. } => {
                return Ok(Some(entity.clone()))
            }
            Slot::KeyResolved => unreachable!("slot re-entered while resolving its key"),
        }

        let Some(key) = self.resolve_key(result, row)? else {
            self.state.slots[result.slot] = Slot::Missing;
            return Ok(None);
        };
        self.state.slots[result.slot] = Slot::KeyResolved;

        let (entity, load) = self.resolve_instance(key);
        self.state.slots[result.slot] = Slot::InstanceResolved(entity.clone());

        if load {
            self.initialize_instance(result, &entity, row)?;
        } else {
            self.resolve_joined(result, &entity, row)?;
        }

        self.state.slots[result.slot] = Slot::Initialized {
            entity: entity.clone(),
            loaded: load,
        };
        Ok(Some(entity))
    }

    fn resolve_key(&self, result: &EntityResult, row: &[Value]) -> Result<Option<EntityKey>> {
        let leaves = read_all(&result.key, row)?;
        if leaves.iter().all(Value::is_null) {
            return Ok(None);
        }

        Ok(Some(EntityKey {
            model: result.model,
            id: id_from_leaves(self.schema, result.model, leaves),
        }))
    }

    /// Finds the instance for `key`, registering a placeholder before any
    /// attribute is read so cycles resolve to it. Returns whether the
    /// instance must be populated from the row.
    fn resolve_instance(&mut self, key: EntityKey) -> (EntityRef, bool) {
        if let Some(existing) = self.context.get(&key) {
            let existing = existing.clone();
            if existing.is_initialized() || self.context.entry(&existing).is_some() {
                return (existing, false);
            }

            // A proxy: initialize in place so every holder sees the state
            self.context.add_loading(key, existing.clone());
            return (existing, true);
        }

        let entity = EntityRef::proxy(self.schema, key.model, &key.id);
        self.context.add_loading(key, entity.clone());
        (entity, true)
    }

    fn initialize_instance(
        &mut self,
        result: &EntityResult,
        entity: &EntityRef,
        row: &[Value],
    ) -> Result<()> {
        let schema = self.schema;
        let model = schema.model(result.model);
        let mut attrs = Vec::with_capacity(result.attrs.len());
        let mut joined_collections = vec![];

        for (field, attr) in model.fields.iter().zip(&result.attrs) {
            let value = match attr {
                AttrResult::Id => None,
                AttrResult::Basic(basic) => Some(Attr::Value(read(basic, row)?)),
                AttrResult::Composite(composite) => {
                    Some(Attr::Composite(self.composite(composite, row)?))
                }
                AttrResult::ToOne(ToOneResult::Joined(target)) => {
                    Some(Attr::ToOne(self.entity(target, row)?))
                }
                AttrResult::ToOne(ToOneResult::Delayed { key, eager }) => {
                    let target = field.target().expect("to-one has a target");
                    Some(Attr::ToOne(self.delayed_to_one(target, key, *eager, row)?))
                }
                AttrResult::Collection(CollectionResult::Joined(element)) => {
                    joined_collections.push((field.id, &**element));
                    Some(Attr::Collection(PersistentCollection::initialized(
                        field.id,
                        vec![],
                    )))
                }
                AttrResult::Collection(CollectionResult::Delayed { eager }) => {
                    if *eager {
                        self.post_load.collections.push((entity.clone(), field.id));
                    }
                    Some(Attr::Collection(PersistentCollection::uninitialized(field.id)))
                }
            };
            attrs.push(value);
        }

        let owner = entity.downgrade();
        let id = {
            let mut data = entity.borrow_mut();
            for (index, attr) in attrs.into_iter().enumerate() {
                let Some(mut attr) = attr else { continue };
                if let Attr::Composite(Some(composite)) = &mut attr {
                    composite.inject_parent(&owner);
                }
                data.attrs[index] = attr;
            }
            data.id()
        };

        for field in &model.fields {
            if let Some(AttrResult::Collection(CollectionResult::Delayed { .. })) =
                result.attrs.get(field.id.index)
            {
                self.context.queue_collection(field.id, id.clone());
            }
        }

        for (role, element) in joined_collections {
            self.context.dequeue_collection(role, &id);
            self.collecting.insert((ByAddress(entity.rc().clone()), role));
            self.collect(entity, role, element, row)?;
        }

        Ok(())
    }

    /// An instance already known to the session: its state is kept, but
    /// joined entities are still resolved and join-fetched collections
    /// still receive their elements.
    fn resolve_joined(&mut self, result: &EntityResult, entity: &EntityRef, row: &[Value]) -> Result<()> {
        for (index, attr) in result.attrs.iter().enumerate() {
            match attr {
                AttrResult::ToOne(ToOneResult::Joined(target)) => {
                    self.entity(target, row)?;
                }
                AttrResult::Collection(CollectionResult::Joined(element)) => {
                    let role = FieldId {
                        model: result.model,
                        index,
                    };
                    let identity = (ByAddress(entity.rc().clone()), role);

                    if !self.collecting.contains(&identity) {
                        let uninitialized = {
                            let data = entity.borrow();
                            matches!(&data.attrs[index], Attr::Collection(c) if !c.is_initialized())
                        };

                        if !uninitialized || !entity.is_initialized() {
                            self.entity(element, row)?;
                            continue;
                        }

                        entity.borrow_mut().attrs[index] =
                            Attr::Collection(PersistentCollection::initialized(role, vec![]));
                        self.context.dequeue_collection(role, &entity.id());
                        self.collecting.insert(identity);
                    }

                    self.collect(entity, role, element, row)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn collect(
        &mut self,
        owner: &EntityRef,
        role: FieldId,
        element: &EntityResult,
        row: &[Value],
    ) -> Result<()> {
        let Some(element) = self.entity(element, row)? else {
            return Ok(());
        };

        let mut data = owner.borrow_mut();
        if let Attr::Collection(collection) = &mut data.attrs[role.index] {
            let present = collection
                .loaded()
                .is_some_and(|elements| elements.iter().any(|e| e.ptr_eq(&element)));
            if !present {
                collection.push(element)?;
            }
        }
        Ok(())
    }

    fn delayed_to_one(
        &mut self,
        target: ModelId,
        key: &[BasicResult],
        eager: bool,
        row: &[Value],
    ) -> Result<Option<EntityRef>> {
        let leaves = read_all(key, row)?;
        if leaves.iter().all(Value::is_null) {
            return Ok(None);
        }

        let key = EntityKey {
            model: target,
            id: id_from_leaves(self.schema, target, leaves),
        };

        let entity = match self.context.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                let proxy = EntityRef::proxy(self.schema, target, &key.id);
                self.context.add_proxy(key, proxy.clone());
                proxy
            }
        };

        if eager && !entity.is_initialized() && self.context.entry(&entity).is_none() {
            self.post_load.entities.push(entity.clone());
        }

        Ok(Some(entity))
    }

    /// Null-composite policy: an embeddable whose columns are all null is
    /// absent unless the mapping asks for empty instances.
    fn composite(&mut self, result: &CompositeResult, row: &[Value]) -> Result<Option<Composite>> {
        let mut attrs = Vec::with_capacity(result.attrs.len());
        for attr in &result.attrs {
            attrs.push(match attr {
                CompositeAttr::Basic(basic) => Attr::Value(read(basic, row)?),
                CompositeAttr::Composite(nested) => Attr::Composite(self.composite(nested, row)?),
            });
        }

        let composite = Composite::from_attrs(self.schema, result.model, attrs);
        if !result.create_empty && composite.is_all_null() {
            return Ok(None);
        }
        Ok(Some(composite))
    }

    /// Marks instances populated from this row as initialized, snapshots
    /// them and resets every slot.
    fn finish_up_row(&mut self, read_only: bool) {
        for slot in &self.state.slots {
            if let Slot::Initialized {
                entity,
                loaded: true,
            } = slot
            {
                entity.borrow_mut().initialized = true;
                self.context.finish_loading(entity, read_only);
                tracing::trace!(?entity, "initialized");
            }
        }
        self.state.reset();
    }
}

fn read(result: &BasicResult, row: &[Value]) -> Result<Value> {
    result.mapping.extract(row[result.position].clone())
}

fn read_all(results: &[BasicResult], row: &[Value]) -> Result<Vec<Value>> {
    results.iter().map(|result| read(result, row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{compile, fixture::Env, lower},
        session::context::Status,
    };

    use kiln_core::stmt::Type;

    fn plan(env: &Env, query: &str) -> Rc<JdbcSelect> {
        let sqm = compile(env.cx(), query).unwrap();
        Rc::new(lower::select(env.cx(), &sqm, &lower::Shape::default()).unwrap())
    }

    /// Builds a raw row by naming projected columns; the rest are null.
    fn row(plan: &JdbcSelect, values: &[(&str, Value)]) -> ValueRecord {
        let list = plan.sql["SELECT ".len()..].split(" FROM ").next().unwrap();
        ValueRecord::from_vec(
            list.split(", ")
                .map(|column| {
                    values
                        .iter()
                        .find(|(name, _)| *name == column)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }

    fn assemble(
        env: &Env,
        plan: &Rc<JdbcSelect>,
        context: &mut PersistenceContext,
        rows: &[ValueRecord],
    ) -> (Vec<Object>, PostLoad) {
        let mut assembler = Assembler::new(&env.schema, plan.clone(), false);
        let mut objects = vec![];
        for raw in rows {
            objects.extend(assembler.row(context, raw).unwrap());
        }
        (objects, assembler.finish())
    }

    #[test]
    fn join_fetched_collections_group_by_owner() {
        let env = Env::new();
        let plan = plan(&env, "select e from Employer e left join fetch e.staff s");
        let rows = [
            row(&plan, &[("e1_0.id", Value::I64(1)), ("e1_0.name", "Acme".into()), ("p1_0.id", Value::I64(10)), ("p1_0.employer_id", Value::I64(1))]),
            row(&plan, &[("e1_0.id", Value::I64(1)), ("e1_0.name", "Acme".into()), ("p1_0.id", Value::I64(11)), ("p1_0.employer_id", Value::I64(1))]),
            row(&plan, &[("e1_0.id", Value::I64(2)), ("e1_0.name", "Initech".into())]),
        ];

        let mut context = PersistenceContext::default();
        let (objects, post_load) = assemble(&env, &plan, &mut context, &rows);

        assert_eq!(objects.len(), 2);
        let acme = objects[0].as_entity().unwrap();
        let staff = acme.collection("staff").unwrap();
        assert_eq!(staff.len().unwrap(), 2);

        // The element's eager employer is the owner already in the context
        let first = &staff.elements().unwrap()[0];
        assert!(first.to_one("employer").unwrap().unwrap().ptr_eq(acme));
        assert!(post_load.entities.is_empty());

        let initech = objects[1].as_entity().unwrap();
        assert!(initech.collection("staff").unwrap().is_empty().unwrap());
        assert_eq!(context.entry(acme).unwrap().status, Status::Managed);
    }

    #[test]
    fn proxies_are_initialized_in_place() {
        let env = Env::new();
        let employer = env.schema.model_by_name("Employer").unwrap().id;
        let mut context = PersistenceContext::default();

        let key = EntityKey {
            model: employer,
            id: Value::I64(1),
        };
        let proxy = EntityRef::proxy(&env.schema, employer, &key.id);
        context.add_proxy(key, proxy.clone());

        let plan = plan(&env, "select e from Employer e");
        let rows = [row(&plan, &[("e1_0.id", Value::I64(1)), ("e1_0.name", "Acme".into())])];
        let (objects, _) = assemble(&env, &plan, &mut context, &rows);

        assert!(objects[0].as_entity().unwrap().ptr_eq(&proxy));
        assert!(proxy.is_initialized());
        assert_eq!(proxy.get("name").unwrap(), Value::from("Acme"));
        assert!(!context.is_entity_pending(employer, &Value::I64(1)));
    }

    #[test]
    fn cycles_resolve_to_the_registered_instance() {
        let env = Env::new();
        let plan = plan(&env, "select p from Person p");
        let rows = [row(&plan, &[("p1_0.id", Value::I64(1)), ("p1_0.parent_id", Value::I64(1))])];

        let mut context = PersistenceContext::default();
        let (objects, post_load) = assemble(&env, &plan, &mut context, &rows);

        let person = objects[0].as_entity().unwrap();
        assert!(person.to_one("parent").unwrap().unwrap().ptr_eq(person));
        assert!(person.to_one("employer").unwrap().is_none());
        assert!(post_load.is_empty());
    }

    #[test]
    fn lazy_to_ones_become_queued_proxies() {
        let env = Env::new();
        let order = env.schema.model_by_name("Order").unwrap().id;
        let plan = plan(&env, "select l from Line l");
        let rows = [row(&plan, &[
            ("l1_0.id", Value::I64(1)),
            ("l1_0.qty", Value::I32(2)),
            ("l1_0.order_region", "eu".into()),
            ("l1_0.order_number", Value::I64(7)),
        ])];

        let mut context = PersistenceContext::default();
        let (objects, _) = assemble(&env, &plan, &mut context, &rows);

        let line = objects[0].as_entity().unwrap();
        let target = line.to_one("order").unwrap().unwrap();
        assert!(!target.is_initialized());

        let id = Value::record_from_vec(vec!["eu".into(), Value::I64(7)]);
        assert_eq!(target.id(), id);
        assert!(context.is_entity_pending(order, &id));
    }

    #[test]
    fn eager_select_fetches_are_loaded_afterwards() {
        let env = Env::new();
        let plan = plan(&env, "select p from Person p");
        let rows = [row(&plan, &[("p1_0.id", Value::I64(1)), ("p1_0.employer_id", Value::I64(5))])];

        let mut context = PersistenceContext::default();
        let (_, post_load) = assemble(&env, &plan, &mut context, &rows);

        assert_eq!(post_load.entities.len(), 1);
        assert_eq!(post_load.entities[0].id(), Value::I64(5));
    }

    #[test]
    fn all_null_composites_are_absent() {
        let env = Env::new();
        let plan = plan(&env, "select p.address from Person p");
        let mut context = PersistenceContext::default();

        let rows = [
            row(&plan, &[]),
            row(&plan, &[("p1_0.city", "Lyon".into())]),
        ];
        let (objects, _) = assemble(&env, &plan, &mut context, &rows);

        assert!(objects[0].is_null());
        let address = objects[1].as_composite().unwrap();
        assert_eq!(address.get("city").unwrap(), Value::from("Lyon"));
        assert!(address.get("street").unwrap().is_null());
    }

    #[test]
    fn empty_composites_when_configured() {
        let mut env = Env::new();
        env.schema = Arc::new(
            Schema::builder()
                .entity("Person", |m| {
                    m.id("id", Type::I64);
                    m.embedded("address", "Address").create_empty_composites(true);
                })
                .embeddable("Address", |m| {
                    m.basic("city", Type::String);
                })
                .build()
                .unwrap(),
        );

        let plan = plan(&env, "select p from Person p");
        let rows = [row(&plan, &[("p1_0.id", Value::I64(1))])];
        let mut context = PersistenceContext::default();
        let (objects, _) = assemble(&env, &plan, &mut context, &rows);

        let address = objects[0].as_entity().unwrap().composite("address").unwrap();
        assert!(address.unwrap().is_all_null());
    }
}
