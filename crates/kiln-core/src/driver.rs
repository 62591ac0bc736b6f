mod capability;
pub use capability::{Capability, Dialect};

mod connection;
pub use connection::{Connection, Rows};

use crate::Result;

use std::fmt::Debug;

/// Hands out connections to one database. This is the connection provider
/// the session factory pools.
pub trait Driver: Debug + Send + Sync + 'static {
    /// Describes the driver's capability, which informs SQL rendering and
    /// parameter padding.
    fn capability(&self) -> &Capability;

    /// Opens a new physical connection.
    fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Upper bound on open connections, if the database imposes one. An
    /// in-memory SQLite database lives and dies with its single connection.
    fn max_connections(&self) -> Option<usize> {
        None
    }
}
