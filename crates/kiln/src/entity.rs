mod collection;
pub use collection::PersistentCollection;

mod composite;
pub use composite::Composite;

mod object;
pub use object::Object;

use kiln_core::{
    schema::{
        app::{FieldId, FieldTy, ModelId},
        db::ColumnId,
        mapping,
    },
    stmt::Value,
    Error, Result, Schema,
};

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::{Rc, Weak},
    sync::Arc,
};

/// Handle to an entity instance.
///
/// Clones share the same instance; equality is identity. An instance is
/// either initialized (all attributes populated) or an uninitialized proxy
/// that only knows its identifier until the session loads it in place.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<EntityData>>);

pub(crate) type WeakEntityRef = Weak<RefCell<EntityData>>;

pub(crate) struct EntityData {
    pub(crate) schema: Arc<Schema>,
    pub(crate) model: ModelId,

    /// One slot per attribute of the model, in declaration order
    pub(crate) attrs: Vec<Attr>,

    pub(crate) initialized: bool,
}

/// The state of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Value(Value),
    Composite(Option<Composite>),
    ToOne(Option<EntityRef>),
    Collection(PersistentCollection),
}

impl EntityRef {
    /// A new transient instance with every attribute unset and empty
    /// collections.
    pub(crate) fn new(schema: &Arc<Schema>, model: ModelId) -> EntityRef {
        let attrs = schema
            .model(model)
            .fields
            .iter()
            .map(|field| Attr::default_for(&field.ty, field.id, true))
            .collect();

        EntityRef(Rc::new(RefCell::new(EntityData {
            schema: schema.clone(),
            model,
            attrs,
            initialized: true,
        })))
    }

    /// An uninitialized instance knowing only its identifier.
    pub(crate) fn proxy(schema: &Arc<Schema>, model: ModelId, id: &Value) -> EntityRef {
        let attrs = schema
            .model(model)
            .fields
            .iter()
            .map(|field| Attr::default_for(&field.ty, field.id, false))
            .collect();

        let entity = EntityRef(Rc::new(RefCell::new(EntityData {
            schema: schema.clone(),
            model,
            attrs,
            initialized: false,
        })));
        entity.set_id(id);
        entity
    }

    pub fn model(&self) -> ModelId {
        self.0.borrow().model
    }

    pub fn entity_name(&self) -> String {
        let data = self.0.borrow();
        data.schema.model(data.model).name.clone()
    }

    /// The identifier; composite identifiers are returned as a flat record.
    /// `Value::Null` until assigned or generated.
    pub fn id(&self) -> Value {
        self.0.borrow().id()
    }

    pub fn is_initialized(&self) -> bool {
        self.0.borrow().initialized
    }

    /// Returns `true` if both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Reads a basic attribute.
    pub fn get(&self, name: &str) -> Result<Value> {
        match self.attr(name)? {
            Attr::Value(value) => Ok(value),
            _ => Err(self.wrong_kind(name, "a basic attribute")),
        }
    }

    /// Writes a basic attribute, converting the value to the attribute type.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut data = self.0.borrow_mut();
        let field = data.field_by_name(name)?;
        let Some(basic) = field.ty.as_basic() else {
            return Err(Error::from_args(format_args!(
                "`{}` is not a basic attribute",
                field.name
            )));
        };
        let value = basic.ty.cast(value.into())?;
        let index = field.id.index;
        data.ensure_initialized(name)?;
        data.attrs[index] = Attr::Value(value);
        Ok(())
    }

    pub fn composite(&self, name: &str) -> Result<Option<Composite>> {
        match self.attr(name)? {
            Attr::Composite(composite) => Ok(composite),
            _ => Err(self.wrong_kind(name, "an embedded attribute")),
        }
    }

    pub fn set_composite(&self, name: &str, composite: Option<Composite>) -> Result<()> {
        let weak = Rc::downgrade(&self.0);
        let mut data = self.0.borrow_mut();
        let field = data.field_by_name(name)?;
        let Some(embedded) = field.ty.as_embedded() else {
            return Err(Error::from_args(format_args!(
                "`{}` is not an embedded attribute",
                field.name
            )));
        };

        if let Some(composite) = &composite {
            if composite.model() != embedded.target {
                return Err(Error::from_args(format_args!(
                    "`{}` expects a `{}` value",
                    field.name,
                    data.schema.model(embedded.target).name
                )));
            }
        }

        let index = field.id.index;
        data.ensure_initialized(name)?;
        data.attrs[index] = Attr::Composite(composite.map(|mut composite| {
            composite.inject_parent(&weak);
            composite
        }));
        Ok(())
    }

    pub fn to_one(&self, name: &str) -> Result<Option<EntityRef>> {
        match self.attr(name)? {
            Attr::ToOne(target) => Ok(target),
            _ => Err(self.wrong_kind(name, "a to-one association")),
        }
    }

    pub fn set_to_one(&self, name: &str, target: Option<&EntityRef>) -> Result<()> {
        let mut data = self.0.borrow_mut();
        let field = data.field_by_name(name)?;
        let Some(to_one) = field.ty.as_to_one() else {
            return Err(Error::from_args(format_args!(
                "`{}` is not a to-one association",
                field.name
            )));
        };

        if let Some(target) = target {
            if target.model() != to_one.target {
                return Err(Error::from_args(format_args!(
                    "`{}` expects a `{}` instance",
                    field.name,
                    data.schema.model(to_one.target).name
                )));
            }
        }

        let index = field.id.index;
        data.ensure_initialized(name)?;
        data.attrs[index] = Attr::ToOne(target.cloned());
        Ok(())
    }

    /// The collection handle. Reading elements of an uninitialized
    /// collection fails; initialize it through the session.
    pub fn collection(&self, name: &str) -> Result<PersistentCollection> {
        match self.attr(name)? {
            Attr::Collection(collection) => Ok(collection),
            _ => Err(self.wrong_kind(name, "a collection")),
        }
    }

    /// Appends an element to an initialized collection.
    pub fn add_to(&self, name: &str, element: &EntityRef) -> Result<()> {
        let mut data = self.0.borrow_mut();
        let index = data.field_by_name(name)?.id.index;
        data.ensure_initialized(name)?;

        match &mut data.attrs[index] {
            Attr::Collection(collection) => collection.push(element.clone()),
            _ => Err(Error::from_args(format_args!("`{name}` is not a collection"))),
        }
    }

    fn attr(&self, name: &str) -> Result<Attr> {
        let data = self.0.borrow();
        let field = data.field_by_name(name)?;
        let index = field.id.index;

        let is_id = data
            .schema
            .model(data.model)
            .identifier()
            .is_some_and(|identifier| identifier.field.index == index);

        if !is_id {
            data.ensure_initialized(name)?;
        }

        Ok(data.attrs[index].clone())
    }

    fn wrong_kind(&self, name: &str, expected: &str) -> Error {
        Error::from_args(format_args!(
            "`{}.{name}` is not {expected}",
            self.entity_name()
        ))
    }

    pub(crate) fn borrow(&self) -> Ref<'_, EntityData> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, EntityData> {
        self.0.borrow_mut()
    }

    pub(crate) fn rc(&self) -> &Rc<RefCell<EntityData>> {
        &self.0
    }

    pub(crate) fn downgrade(&self) -> WeakEntityRef {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_weak(weak: &WeakEntityRef) -> Option<EntityRef> {
        weak.upgrade().map(EntityRef)
    }

    /// Writes the identifier attribute from a (flat) identifier value.
    pub(crate) fn set_id(&self, id: &Value) {
        let weak = self.downgrade();
        let mut data = self.0.borrow_mut();
        let schema = data.schema.clone();
        let model = schema.model(data.model);
        let id_field = model.expect_identifier().field;

        data.attrs[id_field.index] = match &model.field(id_field).ty {
            FieldTy::Embedded(embedded) => {
                let mut leaves = Vec::new();
                id.flatten_into(&mut leaves);
                let mut composite = Composite::from_flat(&schema, embedded.target, &mut leaves.into_iter());
                composite.inject_parent(&weak);
                Attr::Composite(Some(composite))
            }
            _ => Attr::Value(id.clone()),
        };
    }
}

impl EntityData {
    pub(crate) fn id(&self) -> Value {
        let model = self.schema.model(self.model);
        match &self.attrs[model.expect_identifier().field.index] {
            Attr::Value(value) => value.clone(),
            Attr::Composite(Some(composite)) => composite.flat_value(),
            _ => Value::Null,
        }
    }

    /// The entity's row as the session would write it, one entry per column
    /// in attribute order. Collections contribute nothing; a to-one
    /// contributes the target's identifier.
    pub(crate) fn column_state(&self) -> Vec<(FieldId, ColumnId, Value)> {
        let model = self.schema.model(self.model);
        let mapping = self.schema.mapping_for(self.model);
        let mut state = vec![];

        for (field, attr) in model.fields.iter().zip(&self.attrs) {
            let columns = match mapping.field(field.id) {
                mapping::Field::Collection { .. } => continue,
                stored => stored.columns(),
            };

            let mut values = vec![];
            match attr {
                Attr::Value(value) => values.push(value.clone()),
                Attr::Composite(Some(composite)) => composite.flatten_into(&mut values),
                Attr::ToOne(Some(target)) => target.id().flatten_into(&mut values),
                Attr::Composite(None) | Attr::ToOne(None) | Attr::Collection(_) => {}
            }

            if values.len() != columns.len() {
                values = vec![Value::Null; columns.len()];
            }

            state.extend(
                columns
                    .into_iter()
                    .zip(values)
                    .map(|(column, value)| (field.id, column, value)),
            );
        }

        state
    }

    pub(crate) fn field_by_name(&self, name: &str) -> Result<&kiln_core::schema::app::Field> {
        let model = self.schema.model(self.model);
        model.field_by_name(name).ok_or_else(|| {
            Error::from_args(format_args!(
                "`{}` has no attribute named `{name}`",
                model.name
            ))
        })
    }

    fn ensure_initialized(&self, name: &str) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let model = self.schema.model(self.model);
        Err(Error::lazy_initialization(
            format!("{}.{name}", model.name),
            format!("`{}#{}` is an uninitialized proxy", model.name, self.id()),
        ))
    }
}

impl Attr {
    fn default_for(ty: &FieldTy, field: FieldId, initialized: bool) -> Attr {
        match ty {
            FieldTy::Basic(_) => Attr::Value(Value::Null),
            FieldTy::Embedded(_) => Attr::Composite(None),
            FieldTy::ToOne(_) => Attr::ToOne(None),
            FieldTy::Collection(_) if initialized => {
                Attr::Collection(PersistentCollection::initialized(field, vec![]))
            }
            FieldTy::Collection(_) => Attr::Collection(PersistentCollection::uninitialized(field)),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attr::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &EntityRef) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => {
                let name = &data.schema.model(data.model).name;
                if data.initialized {
                    write!(f, "{name}#{}", data.id())
                } else {
                    write!(f, "{name}#{} (proxy)", data.id())
                }
            }
            Err(_) => f.write_str("EntityRef(<borrowed>)"),
        }
    }
}
