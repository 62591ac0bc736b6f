pub mod driver;
pub use driver::{Connection, Driver};

mod error;
pub use error::{Error, IntoError, SqlError, SqlErrorKind};

pub mod schema;
pub use schema::Schema;

pub mod stmt;

pub mod types;

/// A Result type alias that uses Kiln's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
