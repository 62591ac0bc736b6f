use super::{Cascade, FetchMode, ModelId};
use crate::stmt;

use std::fmt;

#[derive(Debug, Clone)]
pub struct Field {
    /// Uniquely identifies the field within the containing model.
    pub id: FieldId,

    /// The attribute name
    pub name: String,

    /// Basic, embedded, association, ...
    pub ty: FieldTy,

    /// True if the attribute may be null
    pub nullable: bool,

    /// Included in INSERT statements
    pub insertable: bool,

    /// Included in UPDATE statements
    pub updatable: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    pub model: ModelId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub enum FieldTy {
    Basic(BasicField),
    Embedded(EmbeddedField),
    ToOne(ToOneField),
    Collection(CollectionField),
}

/// A single-column value.
#[derive(Debug, Clone)]
pub struct BasicField {
    pub ty: stmt::Type,

    /// Fractional-second digits for timestamp attributes
    pub precision: Option<u8>,
}

/// An embeddable value spread across several columns of the owner's table.
#[derive(Debug, Clone)]
pub struct EmbeddedField {
    pub target: ModelId,

    /// Instantiate the embeddable even when all of its columns are null.
    pub create_empty_composites: bool,
}

/// Many-to-one / one-to-one association owning a foreign key.
#[derive(Debug, Clone)]
pub struct ToOneField {
    pub target: ModelId,
    pub fetch: FetchMode,
    pub cascade: Cascade,
}

/// One-to-many association, the inverse of a to-one on the target.
#[derive(Debug, Clone)]
pub struct CollectionField {
    pub target: ModelId,

    /// The to-one attribute on the target that owns the foreign key.
    pub mapped_by: FieldId,

    pub semantics: CollectionSemantics,
    pub fetch: FetchMode,
    pub cascade: Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionSemantics {
    /// Unordered and non-unique. Two bags cannot be join fetched together.
    Bag,

    /// Unordered, each element at most once.
    Set,
}

impl Field {
    pub fn is_basic(&self) -> bool {
        matches!(self.ty, FieldTy::Basic(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.ty, FieldTy::Collection(_))
    }

    pub fn is_association(&self) -> bool {
        matches!(self.ty, FieldTy::ToOne(_) | FieldTy::Collection(_))
    }

    /// The associated or embedded model, if any.
    pub fn target(&self) -> Option<ModelId> {
        match &self.ty {
            FieldTy::Basic(_) => None,
            FieldTy::Embedded(embedded) => Some(embedded.target),
            FieldTy::ToOne(to_one) => Some(to_one.target),
            FieldTy::Collection(collection) => Some(collection.target),
        }
    }

    pub fn fetch(&self) -> Option<FetchMode> {
        match &self.ty {
            FieldTy::ToOne(to_one) => Some(to_one.fetch),
            FieldTy::Collection(collection) => Some(collection.fetch),
            _ => None,
        }
    }

    pub fn cascade(&self) -> Cascade {
        match &self.ty {
            FieldTy::ToOne(to_one) => to_one.cascade,
            FieldTy::Collection(collection) => collection.cascade,
            _ => Cascade::NONE,
        }
    }
}

impl FieldTy {
    pub fn as_basic(&self) -> Option<&BasicField> {
        match self {
            Self::Basic(basic) => Some(basic),
            _ => None,
        }
    }

    pub fn as_embedded(&self) -> Option<&EmbeddedField> {
        match self {
            Self::Embedded(embedded) => Some(embedded),
            _ => None,
        }
    }

    pub fn as_to_one(&self) -> Option<&ToOneField> {
        match self {
            Self::ToOne(to_one) => Some(to_one),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionField> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "FieldId({}/{})", self.model.0, self.index)
    }
}
