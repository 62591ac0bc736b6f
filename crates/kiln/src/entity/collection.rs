use super::EntityRef;

use kiln_core::{schema::app::FieldId, Error, Result};

/// The value of a collection attribute.
///
/// An uninitialized collection is a placeholder: it never queries on its
/// own. [`Session::collection`](crate::Session::collection) loads it.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentCollection {
    role: FieldId,
    elements: Option<Vec<EntityRef>>,
}

impl PersistentCollection {
    pub(crate) fn initialized(role: FieldId, elements: Vec<EntityRef>) -> PersistentCollection {
        PersistentCollection {
            role,
            elements: Some(elements),
        }
    }

    pub(crate) fn uninitialized(role: FieldId) -> PersistentCollection {
        PersistentCollection {
            role,
            elements: None,
        }
    }

    pub fn role(&self) -> FieldId {
        self.role
    }

    pub fn is_initialized(&self) -> bool {
        self.elements.is_some()
    }

    pub fn elements(&self) -> Result<&[EntityRef]> {
        self.elements.as_deref().ok_or_else(|| self.not_initialized())
    }

    pub fn len(&self) -> Result<usize> {
        self.elements().map(<[_]>::len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.elements().map(<[_]>::is_empty)
    }

    pub fn contains(&self, element: &EntityRef) -> Result<bool> {
        Ok(self.elements()?.iter().any(|e| e.ptr_eq(element)))
    }

    pub(crate) fn push(&mut self, element: EntityRef) -> Result<()> {
        match &mut self.elements {
            Some(elements) => {
                elements.push(element);
                Ok(())
            }
            None => Err(self.not_initialized()),
        }
    }

    /// Elements if loaded, without failing on a placeholder.
    pub(crate) fn loaded(&self) -> Option<&[EntityRef]> {
        self.elements.as_deref()
    }

    fn not_initialized(&self) -> Error {
        Error::lazy_initialization(
            format!("{:?}", self.role),
            "collection was not initialized",
        )
    }
}
