use super::Error;

/// Error when a row for an entity reference does not exist.
#[derive(Debug)]
pub(super) struct ObjectNotFoundError {
    entity: Box<str>,
    id: Box<str>,
}

impl std::error::Error for ObjectNotFoundError {}

impl core::fmt::Display for ObjectNotFoundError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "no row with the given identifier exists: [{}#{}]", self.entity, self.id)
    }
}

impl Error {
    /// Creates an object not found error.
    pub fn object_not_found(entity: impl Into<String>, id: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ObjectNotFound(ObjectNotFoundError {
            entity: entity.into().into(),
            id: id.into().into(),
        }))
    }

    /// Returns `true` if this error is an object not found error.
    pub fn is_object_not_found(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::ObjectNotFound(_)))
    }
}
