use super::{Composite, EntityRef};

use kiln_core::stmt::Value;

/// One item of a query result.
///
/// A query selecting a single item yields that item per row; selecting
/// several yields a `Tuple`. A missing entity (outer join miss) is
/// `Value(Value::Null)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Value(Value),
    Entity(EntityRef),
    Composite(Composite),
    Tuple(Vec<Object>),
}

impl Object {
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Object::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Object::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Object::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<EntityRef> {
        match self {
            Object::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Object::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Object]> {
        match self {
            Object::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_tuple(self) -> Option<Vec<Object>> {
        match self {
            Object::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// The value bound when this object is a query parameter: entities bind
    /// their identifier, composites their flat leaf record.
    pub(crate) fn to_bind_value(&self) -> Value {
        match self {
            Object::Value(value) => value.clone(),
            Object::Entity(entity) => entity.id(),
            Object::Composite(composite) => composite.flat_value(),
            Object::Tuple(items) => {
                Value::record_from_vec(items.iter().map(Object::to_bind_value).collect())
            }
        }
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        Object::Value(value)
    }
}

impl From<EntityRef> for Object {
    fn from(entity: EntityRef) -> Self {
        Object::Entity(entity)
    }
}

impl From<Option<EntityRef>> for Object {
    fn from(entity: Option<EntityRef>) -> Self {
        match entity {
            Some(entity) => Object::Entity(entity),
            None => Object::Value(Value::Null),
        }
    }
}

impl From<&EntityRef> for Object {
    fn from(entity: &EntityRef) -> Self {
        Object::Entity(entity.clone())
    }
}

impl From<Composite> for Object {
    fn from(composite: Composite) -> Self {
        Object::Composite(composite)
    }
}

macro_rules! impl_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Object {
                fn from(value: $ty) -> Self {
                    Object::Value(value.into())
                }
            }
        )*
    };
}

impl_from_value!(bool, i32, i64, f64, &str, String, Vec<u8>, uuid::Uuid, chrono::NaiveDate, chrono::NaiveDateTime);
