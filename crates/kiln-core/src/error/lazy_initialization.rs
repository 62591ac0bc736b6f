use super::Error;

/// Error when a lazy proxy or collection cannot be initialized.
///
/// This occurs when:
/// - The owning session has been closed
/// - The instance is detached from the session that is asked to initialize it
/// - State of an uninitialized proxy is read without going through a session
#[derive(Debug)]
pub(super) struct LazyInitializationError {
    role: Box<str>,
    reason: Box<str>,
}

impl std::error::Error for LazyInitializationError {}

impl core::fmt::Display for LazyInitializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "failed to lazily initialize {}: {}", self.role, self.reason)
    }
}

impl Error {
    /// Creates a lazy initialization error for the given entity or collection role.
    pub fn lazy_initialization(role: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::LazyInitialization(
            LazyInitializationError {
                role: role.into().into(),
                reason: reason.into().into(),
            },
        ))
    }

    /// Returns `true` if this error is a lazy initialization error.
    pub fn is_lazy_initialization(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::LazyInitialization(_)))
    }
}
