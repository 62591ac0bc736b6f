use super::Error;

/// Error when a row-count expectation fails after a mutation.
///
/// Usually an optimistic lock failure: the row was updated or deleted by
/// another transaction since it was read. Callers may retry the unit of work.
#[derive(Debug)]
pub(super) struct StaleStateError {
    entity: Box<str>,
    id: Option<Box<str>>,
    expected: u64,
    actual: u64,
}

impl std::error::Error for StaleStateError {}

impl core::fmt::Display for StaleStateError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "row was updated or deleted by another transaction (or unsaved-value mapping was incorrect): {}",
            self.entity
        )?;
        if let Some(ref id) = self.id {
            write!(f, "#{id}")?;
        }
        write!(
            f,
            "; expected row count {}, actual {}",
            self.expected, self.actual
        )
    }
}

impl Error {
    /// Creates a stale state error.
    pub fn stale_state(
        entity: impl Into<String>,
        id: Option<String>,
        expected: u64,
        actual: u64,
    ) -> Error {
        Error::from(super::ErrorKind::StaleState(StaleStateError {
            entity: entity.into().into(),
            id: id.map(Into::into),
            expected,
            actual,
        }))
    }

    /// Returns `true` if this error is a stale state (optimistic lock) error.
    pub fn is_stale_state(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::StaleState(_)))
    }
}
