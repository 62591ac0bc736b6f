use super::Error;

/// Error raised by the connection pool.
#[derive(Debug)]
pub(super) struct ConnectionPoolError {
    message: Box<str>,
}

impl std::error::Error for ConnectionPoolError {}

impl core::fmt::Display for ConnectionPoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "connection pool error: {}", self.message)
    }
}

impl Error {
    /// Creates a connection pool error.
    pub fn connection_pool(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ConnectionPool(ConnectionPoolError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a connection pool error.
    pub fn is_connection_pool(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::ConnectionPool(_)))
    }
}
