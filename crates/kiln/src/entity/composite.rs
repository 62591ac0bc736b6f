use super::{Attr, EntityRef, WeakEntityRef};

use kiln_core::{
    schema::app::{FieldTy, ModelId},
    stmt::Value,
    Error, Result, Schema,
};

use std::{fmt, sync::Arc};

/// An embeddable value.
///
/// Composites are plain values: cloning copies the attributes. An
/// embeddable declaring a parent property holds a back-reference to the
/// entity owning it.
#[derive(Clone)]
pub struct Composite {
    schema: Arc<Schema>,
    model: ModelId,
    pub(crate) attrs: Vec<Attr>,
    parent: Option<WeakEntityRef>,
}

impl Composite {
    /// An instance of the named embeddable with every attribute null.
    pub fn new(schema: &Arc<Schema>, name: &str) -> Result<Composite> {
        let model = schema
            .model_by_name(name)
            .filter(|model| model.is_embeddable())
            .ok_or_else(|| Error::from_args(format_args!("unknown embeddable `{name}`")))?;
        Ok(Composite::empty(schema, model.id))
    }

    pub(crate) fn empty(schema: &Arc<Schema>, model: ModelId) -> Composite {
        let attrs = schema
            .model(model)
            .fields
            .iter()
            .map(|field| match &field.ty {
                FieldTy::Embedded(_) => Attr::Composite(None),
                _ => Attr::Value(Value::Null),
            })
            .collect();

        Composite {
            schema: schema.clone(),
            model,
            attrs,
            parent: None,
        }
    }

    /// Rebuilds a composite from its leaf values in column order. Nested
    /// composites are always instantiated.
    pub(crate) fn from_flat(
        schema: &Arc<Schema>,
        model: ModelId,
        leaves: &mut impl Iterator<Item = Value>,
    ) -> Composite {
        let mut composite = Composite::empty(schema, model);

        for (index, field) in schema.model(model).fields.iter().enumerate() {
            composite.attrs[index] = match &field.ty {
                FieldTy::Embedded(embedded) => Attr::Composite(Some(Composite::from_flat(
                    schema,
                    embedded.target,
                    leaves,
                ))),
                _ => Attr::Value(leaves.next().unwrap_or_default()),
            };
        }

        composite
    }

    pub(crate) fn from_attrs(schema: &Arc<Schema>, model: ModelId, attrs: Vec<Attr>) -> Composite {
        Composite {
            schema: schema.clone(),
            model,
            attrs,
            parent: None,
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        match &self.attrs[self.index_of(name)?] {
            Attr::Value(value) => Ok(value.clone()),
            _ => Err(Error::from_args(format_args!(
                "`{name}` is not a basic attribute"
            ))),
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.index_of(name)?;
        let field = &self.schema.model(self.model).fields[index];
        let Some(basic) = field.ty.as_basic() else {
            return Err(Error::from_args(format_args!(
                "`{name}` is not a basic attribute"
            )));
        };
        self.attrs[index] = Attr::Value(basic.ty.cast(value.into())?);
        Ok(())
    }

    pub fn composite(&self, name: &str) -> Result<Option<Composite>> {
        match &self.attrs[self.index_of(name)?] {
            Attr::Composite(composite) => Ok(composite.clone()),
            _ => Err(Error::from_args(format_args!(
                "`{name}` is not an embedded attribute"
            ))),
        }
    }

    pub fn set_composite(&mut self, name: &str, mut composite: Option<Composite>) -> Result<()> {
        let index = self.index_of(name)?;
        if let (Some(parent), Some(composite)) = (&self.parent, &mut composite) {
            composite.inject_parent(parent);
        }
        self.attrs[index] = Attr::Composite(composite);
        Ok(())
    }

    /// The entity owning this value, if the embeddable declares a parent
    /// property and the owner is still alive.
    pub fn parent(&self) -> Option<EntityRef> {
        self.parent.as_ref().and_then(EntityRef::from_weak)
    }

    /// Returns `true` if every leaf attribute is null.
    pub fn is_all_null(&self) -> bool {
        self.attrs.iter().all(|attr| match attr {
            Attr::Value(value) => value.is_null(),
            Attr::Composite(None) => true,
            Attr::Composite(Some(composite)) => composite.is_all_null(),
            _ => true,
        })
    }

    /// Leaf values in column order.
    pub(crate) fn flatten_into(&self, dst: &mut Vec<Value>) {
        for (attr, field) in self.attrs.iter().zip(&self.schema.model(self.model).fields) {
            match attr {
                Attr::Value(value) => dst.push(value.clone()),
                Attr::Composite(Some(composite)) => composite.flatten_into(dst),
                Attr::Composite(None) => {
                    if let FieldTy::Embedded(embedded) = &field.ty {
                        let width = Composite::empty(&self.schema, embedded.target).width();
                        dst.extend(std::iter::repeat(Value::Null).take(width));
                    }
                }
                _ => {}
            }
        }
    }

    /// The flat record of leaf values, as used for identifiers.
    pub(crate) fn flat_value(&self) -> Value {
        let mut leaves = vec![];
        self.flatten_into(&mut leaves);
        Value::record_from_vec(leaves)
    }

    fn width(&self) -> usize {
        let mut leaves = vec![];
        self.flatten_into(&mut leaves);
        leaves.len()
    }

    /// Sets the owner back-reference on this value and nested values that
    /// declare a parent property.
    pub(crate) fn inject_parent(&mut self, owner: &WeakEntityRef) {
        if self.schema.model(self.model).parent_property().is_some() {
            self.parent = Some(owner.clone());
        }

        for attr in &mut self.attrs {
            if let Attr::Composite(Some(nested)) = attr {
                nested.inject_parent(owner);
            }
        }
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        let model = self.schema.model(self.model);
        model
            .field_by_name(name)
            .map(|field| field.id.index)
            .ok_or_else(|| {
                Error::from_args(format_args!(
                    "`{}` has no attribute named `{name}`",
                    model.name
                ))
            })
    }
}

impl PartialEq for Composite {
    fn eq(&self, other: &Composite) -> bool {
        self.model == other.model && self.attrs == other.attrs
    }
}

impl fmt::Debug for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.schema.model(self.model);
        let mut s = f.debug_struct(&model.name);
        for (field, attr) in model.fields.iter().zip(&self.attrs) {
            match attr {
                Attr::Value(value) => s.field(&field.name, value),
                attr => s.field(&field.name, attr),
            };
        }
        s.finish()
    }
}
