use super::Error;

/// Error binding query parameters.
///
/// Raised before any SQL is sent when a declared parameter has no value, a
/// value targets an unknown parameter, or the number of JDBC bindings does not
/// match the placeholders of the rendered statement.
#[derive(Debug)]
pub(super) struct ParameterBindingError {
    message: Box<str>,
}

impl std::error::Error for ParameterBindingError {}

impl core::fmt::Display for ParameterBindingError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "parameter binding failed: {}", self.message)
    }
}

impl Error {
    /// Creates a parameter binding error.
    pub fn parameter_binding(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ParameterBinding(ParameterBindingError {
            message: message.into().into(),
        }))
    }

    /// Creates an error for a binding count that does not match the statement.
    pub fn parameter_count_mismatch(expected: usize, actual: usize) -> Error {
        Error::parameter_binding(format!(
            "statement declares {expected} parameters but {actual} were bound"
        ))
    }

    /// Returns `true` if this error is a parameter binding error.
    pub fn is_parameter_binding(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::ParameterBinding(_)))
    }
}
