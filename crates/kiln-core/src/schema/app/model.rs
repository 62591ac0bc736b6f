use super::{Field, FieldId};

use std::fmt;

#[derive(Debug, Clone)]
pub struct Model {
    /// Uniquely identifies the model within the schema
    pub id: ModelId,

    /// Entity or embeddable name as used in queries
    pub name: String,

    /// Attributes, in declaration order
    pub fields: Vec<Field>,

    pub kind: ModelKind,
}

#[derive(Debug, Clone)]
pub enum ModelKind {
    /// Has its own table and identity
    Entity(EntityRoot),

    /// Value type stored in its owner's columns
    Embeddable(EmbeddableInfo),
}

#[derive(Debug, Clone)]
pub struct EntityRoot {
    pub identifier: Identifier,

    /// Optimistic-lock version attribute
    pub version: Option<FieldId>,

    /// Number of keys loaded per batch-fetch round trip
    pub batch_size: Option<usize>,

    /// INSERT only non-null columns
    pub dynamic_insert: bool,

    /// UPDATE only changed columns
    pub dynamic_update: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Identifier {
    /// A basic attribute, or an embedded one for composite identifiers
    pub field: FieldId,

    pub generation: IdGeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGeneration {
    /// The application sets the id before persisting.
    Assigned,

    /// The database generates the id on insert.
    Identity,
}

#[derive(Debug, Clone, Default)]
pub struct EmbeddableInfo {
    /// Attribute receiving a back-reference to the owning entity.
    pub parent: Option<String>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub usize);

impl Model {
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, ModelKind::Entity(_))
    }

    pub fn is_embeddable(&self) -> bool {
        matches!(self.kind, ModelKind::Embeddable(_))
    }

    pub fn as_entity(&self) -> Option<&EntityRoot> {
        match &self.kind {
            ModelKind::Entity(root) => Some(root),
            ModelKind::Embeddable(_) => None,
        }
    }

    #[track_caller]
    pub fn expect_entity(&self) -> &EntityRoot {
        match &self.kind {
            ModelKind::Entity(root) => root,
            ModelKind::Embeddable(_) => panic!("expected entity; model={}", self.name),
        }
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.as_entity().map(|root| &root.identifier)
    }

    #[track_caller]
    pub fn expect_identifier(&self) -> &Identifier {
        &self.expect_entity().identifier
    }

    pub fn id_field(&self) -> Option<&Field> {
        self.identifier().map(|identifier| self.field(identifier.field))
    }

    pub fn version_field(&self) -> Option<&Field> {
        self.as_entity()
            .and_then(|root| root.version)
            .map(|id| self.field(id))
    }

    pub fn parent_property(&self) -> Option<&str> {
        match &self.kind {
            ModelKind::Embeddable(info) => info.parent.as_deref(),
            ModelKind::Entity(_) => None,
        }
    }

    pub fn field(&self, field: impl Into<FieldId>) -> &Field {
        let field_id = field.into();
        assert_eq!(self.id, field_id.model);
        &self.fields[field_id.index]
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl From<&Model> for ModelId {
    fn from(value: &Model) -> Self {
        value.id
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "ModelId({})", self.0)
    }
}
