use super::Error;

/// Error when a query expected to return at most one row returns several.
#[derive(Debug)]
pub(super) struct NonUniqueResultError {
    count: usize,
}

impl std::error::Error for NonUniqueResultError {}

impl core::fmt::Display for NonUniqueResultError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "query did not return a unique result: {}", self.count)
    }
}

impl Error {
    /// Creates a non-unique result error.
    pub fn non_unique_result(count: usize) -> Error {
        Error::from(super::ErrorKind::NonUniqueResult(NonUniqueResultError {
            count,
        }))
    }

    /// Returns `true` if this error is a non-unique result error.
    pub fn is_non_unique_result(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::NonUniqueResult(_)))
    }
}
